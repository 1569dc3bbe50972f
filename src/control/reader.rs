//! Line reader/forwarder.
//!
//! Reads newline-delimited lines from the legacy store and forwards each one,
//! in order, onto the bounded line queue. A full queue stops the reader, which
//! in turn stops draining the socket.
//!
//! Bytes that are not valid UTF-8 are replaced, never rejected: a bad reply
//! is a per-request problem. An over-long line is treated like a read error.

use std::io;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::sync::mpsc;

use crate::lifecycle::fatal::{FatalError, FatalHandle};
use crate::observability::metrics;

/// Create the bounded queue between the reader and the bridge.
pub fn line_queue(capacity: usize) -> (mpsc::Sender<String>, mpsc::Receiver<String>) {
    mpsc::channel(capacity)
}

/// Forward lines from `reader` to `queue` until the connection ends.
///
/// A read error, a line longer than `max_line_bytes` and a clean close all
/// trip `fatal`: there is no way to operate without the legacy connection.
/// Returns early without tripping if the bridge side of the queue has gone
/// away.
pub async fn forward_lines<R>(
    reader: R,
    queue: mpsc::Sender<String>,
    max_line_bytes: usize,
    fatal: FatalHandle,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut raw = Vec::new();
    // Room for the longest allowed line plus its newline.
    let limit = max_line_bytes as u64 + 1;

    loop {
        raw.clear();
        match (&mut reader).take(limit).read_until(b'\n', &mut raw).await {
            Ok(0) => {
                fatal.trip(FatalError::ControlClosed);
                return;
            }
            Ok(_) => {}
            Err(e) => {
                fatal.trip(FatalError::ControlRead(e));
                return;
            }
        }

        if raw.last() != Some(&b'\n') && raw.len() > max_line_bytes {
            fatal.trip(FatalError::ControlRead(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("line longer than {} bytes", max_line_bytes),
            )));
            return;
        }

        let line = decode_line(&raw);
        // Secrets are logged as they arrive; operators rely on this trail.
        tracing::info!(line = ?line, "Got line from legacy store");
        metrics::record_control_line();
        if queue.send(line).await.is_err() {
            tracing::debug!("Line queue closed, reader stopping");
            return;
        }
    }
}

/// Strip the line terminator and decode, replacing invalid UTF-8.
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::fatal;
    use tokio::io::AsyncWriteExt;

    const MAX: usize = 64 * 1024;

    #[tokio::test]
    async fn forwards_lines_in_order() {
        let (mut store, bridge_side) = tokio::io::duplex(64);
        let (tx, mut rx) = line_queue(8);
        let (handle, _supervisor) = fatal::channel();
        let task = tokio::spawn(forward_lines(bridge_side, tx, MAX, handle.clone()));

        store.write_all(b"alice-pw\r\n\nsecond\ndone\n").await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), "alice-pw");
        assert_eq!(rx.recv().await.unwrap(), "");
        assert_eq!(rx.recv().await.unwrap(), "second");
        assert_eq!(rx.recv().await.unwrap(), "done");
        assert!(!handle.is_tripped());

        drop(store);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn clean_close_is_fatal() {
        let (store, bridge_side) = tokio::io::duplex(64);
        let (tx, mut rx) = line_queue(8);
        let (handle, supervisor) = fatal::channel();

        drop(store);
        forward_lines(bridge_side, tx, MAX, handle.clone()).await;

        assert!(handle.is_tripped());
        let error = supervisor.wait().await.unwrap();
        assert!(matches!(*error, FatalError::ControlClosed));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn invalid_utf8_is_forwarded_not_fatal() {
        let (mut store, bridge_side) = tokio::io::duplex(64);
        let (tx, mut rx) = line_queue(8);
        let (handle, _supervisor) = fatal::channel();
        let task = tokio::spawn(forward_lines(bridge_side, tx, MAX, handle.clone()));

        store.write_all(b"caf\xe9-pw\ndone\n").await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), "caf\u{FFFD}-pw");
        assert_eq!(rx.recv().await.unwrap(), "done");
        assert!(!handle.is_tripped());

        drop(store);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn line_at_limit_is_accepted() {
        let (mut store, bridge_side) = tokio::io::duplex(64);
        let (tx, mut rx) = line_queue(8);
        let (handle, _supervisor) = fatal::channel();
        let _task = tokio::spawn(forward_lines(bridge_side, tx, 8, handle.clone()));

        store.write_all(b"12345678\n").await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), "12345678");
        assert!(!handle.is_tripped());
    }

    #[tokio::test]
    async fn overlong_line_is_fatal() {
        let (mut store, bridge_side) = tokio::io::duplex(64);
        let (tx, mut rx) = line_queue(8);
        let (handle, supervisor) = fatal::channel();

        // Never terminated; the reader must give up rather than buffer it all.
        let writer = tokio::spawn(async move {
            let _ = store.write_all(&[b'x'; 4096]).await;
            store
        });
        forward_lines(bridge_side, tx, 100, handle).await;

        let error = supervisor.wait().await.unwrap();
        assert!(matches!(*error, FatalError::ControlRead(_)));
        assert!(rx.recv().await.is_none());
        drop(writer);
    }

    #[tokio::test]
    async fn full_queue_applies_backpressure() {
        let (mut store, bridge_side) = tokio::io::duplex(64);
        let (tx, mut rx) = line_queue(1);
        let (handle, _supervisor) = fatal::channel();
        let _task = tokio::spawn(forward_lines(bridge_side, tx, MAX, handle));

        store.write_all(b"one\ntwo\nthree\n").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert_eq!(rx.recv().await.unwrap(), "one");
        assert_eq!(rx.recv().await.unwrap(), "two");
        assert_eq!(rx.recv().await.unwrap(), "three");
    }
}
