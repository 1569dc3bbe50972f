//! Classification of a drained legacy reply.

/// Shape of a legacy reply once blank lines and the sentinel are removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    /// No lines: the store knows nothing under that name.
    Empty,
    /// Exactly one line: the secret.
    Single,
    /// More than one line: the name matched several entries.
    Ambiguous,
}

impl OutcomeKind {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Empty => "empty",
            OutcomeKind::Single => "single",
            OutcomeKind::Ambiguous => "ambiguous",
        }
    }
}

/// The lines collected for one query, and their classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseOutcome {
    kind: OutcomeKind,
    lines: Vec<String>,
}

impl ResponseOutcome {
    /// Classify collected lines. Callers must already have dropped blank
    /// lines and the sentinel.
    pub fn classify(lines: Vec<String>) -> Self {
        let kind = match lines.len() {
            0 => OutcomeKind::Empty,
            1 => OutcomeKind::Single,
            _ => OutcomeKind::Ambiguous,
        };
        Self { kind, lines }
    }

    pub fn kind(&self) -> OutcomeKind {
        self.kind
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// The secret, if the reply held exactly one line.
    pub fn secret(&self) -> Option<&str> {
        match self.kind {
            OutcomeKind::Single => self.lines.first().map(String::as_str),
            _ => None,
        }
    }

    /// Every line, each newline-terminated.
    pub fn joined(&self) -> String {
        self.lines.iter().fold(String::new(), |mut out, line| {
            out.push_str(line);
            out.push('\n');
            out
        })
    }
}
