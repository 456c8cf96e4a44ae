use std::time::Duration;

use bytes::Bytes;
use futures_util::{stream, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, warn};

use super::ByteStream;
use crate::error::UpstreamError;

/// Chunks buffered between the upstream reader and the client writer.
pub const PUMP_BUFFER_CHUNKS: usize = 8;

/// Copy an upstream body to the client through a spawned pump task.
///
/// The task reads upstream chunks into a bounded channel and the returned
/// stream serves them from the receiving end. Both directions run under the
/// idle window: an upstream read that produces nothing for `idle`, or a
/// client that leaves the channel full for `idle`, ends the transfer. The
/// upstream body is dropped at that point, which closes its connection and
/// releases its pool permit, whether or not the client is still polling.
///
/// Buffered chunks are still delivered; after them the stream yields one
/// error item, which makes the server abort the client connection since a
/// status and headers have already been sent. Dropping the returned stream
/// stops the pump on its next send.
///
/// Must be called from within a Tokio runtime.
pub fn pump_body(inner: ByteStream, idle: Duration, label: impl Into<String>) -> ByteStream {
    let (tx, rx) = mpsc::channel(PUMP_BUFFER_CHUNKS);
    let (failure_tx, failure_rx) = oneshot::channel();
    tokio::spawn(pump(inner, tx, failure_tx, idle, label.into()));

    stream::unfold((rx, Some(failure_rx)), |(mut rx, mut failure)| async move {
        match rx.recv().await {
            Some(chunk) => Some((Ok(chunk), (rx, failure))),
            None => {
                // The pump reports its failure before it closes the channel
                let err = failure.take()?.try_recv().ok()?;
                Some((Err(err), (rx, None)))
            }
        }
    })
    .boxed()
}

async fn pump(
    mut inner: ByteStream,
    tx: mpsc::Sender<Bytes>,
    failure: oneshot::Sender<UpstreamError>,
    idle: Duration,
    label: String,
) {
    let outcome = loop {
        let chunk = match timeout(idle, inner.next()).await {
            Ok(Some(Ok(chunk))) => chunk,
            Ok(Some(Err(err))) => {
                warn!(url = %label, error = %err, "Upstream body failed");
                break Some(err);
            }
            Ok(None) => break None,
            Err(_) => {
                warn!(url = %label, idle = ?idle, "Tile stream timeout: upstream stalled");
                break Some(UpstreamError::StreamStalled(idle));
            }
        };

        match timeout(idle, tx.send(chunk)).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => {
                debug!(url = %label, "Client went away");
                break None;
            }
            Err(_) => {
                warn!(url = %label, idle = ?idle, "Tile stream timeout: client stalled");
                break Some(UpstreamError::ClientStalled(idle));
            }
        }
    };

    drop(inner);
    if let Some(err) = outcome {
        let _ = failure.send(err);
    }
    drop(tx);
}
