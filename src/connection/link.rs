//! # ActiveLink: an established stream and its watcher.
//!
//! Attaching a link spawns one watcher task that owns the stream:
//! - inbound bytes are forwarded, in order and without loss, to one consumer
//!   queue; a full queue pauses reading (and so the peer) instead of dropping
//!   data, and a consumer that went away turns further reads into discards;
//! - outbound bytes queued through [`ActiveLink::writer`] are written in order;
//! - end-of-stream or an I/O error is reported once through the loss callback.
//!
//! Link loss is only ever detected by the watcher, never polled. Closing the
//! link through [`ActiveLink::close`] cancels the watcher without a loss report.

use std::fmt;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::connection::dialer::LinkStream;

const READ_CHUNK: usize = 8 * 1024;
const OUTBOUND_QUEUE: usize = 64;

/// Why a link stopped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkLoss {
    /// The worker closed its end.
    End,
    /// Read or write failed.
    Error(String),
}

impl fmt::Display for LinkLoss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkLoss::End => f.write_str("link ended"),
            LinkLoss::Error(e) => write!(f, "link error: {e}"),
        }
    }
}

/// Loss notification for one link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkLost {
    /// Link id given to [`ActiveLink::attach`].
    pub link: u64,
    /// Cause.
    pub loss: LinkLoss,
}

/// Established connection to the worker.
pub struct ActiveLink {
    id: u64,
    outbound: mpsc::Sender<Vec<u8>>,
    cancel: CancellationToken,
    watcher: JoinHandle<()>,
}

impl ActiveLink {
    /// Takes ownership of `stream` and starts watching it.
    ///
    /// `cancel` should be a child of the owner's shutdown token.
    pub fn attach(
        id: u64,
        stream: LinkStream,
        inbound: mpsc::Sender<Vec<u8>>,
        cancel: CancellationToken,
        on_loss: impl FnOnce(LinkLost) + Send + 'static,
    ) -> Self {
        let (outbound, rx) = mpsc::channel(OUTBOUND_QUEUE);
        let watcher = tokio::spawn(watch(id, stream, inbound, rx, cancel.clone(), on_loss));
        Self {
            id,
            outbound,
            cancel,
            watcher,
        }
    }

    /// Link id.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Queue handle for outbound bytes.
    pub fn writer(&self) -> mpsc::Sender<Vec<u8>> {
        self.outbound.clone()
    }

    /// Stops the watcher and closes the stream.
    pub async fn close(self) {
        self.cancel.cancel();
        if let Err(e) = self.watcher.await {
            tracing::warn!(link = self.id, error = %e, "link watcher failed");
        }
    }
}

async fn watch(
    id: u64,
    stream: LinkStream,
    inbound: mpsc::Sender<Vec<u8>>,
    mut outbound: mpsc::Receiver<Vec<u8>>,
    cancel: CancellationToken,
    on_loss: impl FnOnce(LinkLost),
) {
    let (mut reader, mut writer) = tokio::io::split(stream);
    let mut buf = vec![0u8; READ_CHUNK];
    let mut inbound = Some(inbound);

    let loss = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break None,
            read = reader.read(&mut buf) => match read {
                Ok(0) => break Some(LinkLoss::End),
                Ok(n) => {
                    let Some(tx) = &inbound else { continue };
                    let delivered = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break None,
                        sent = tx.send(buf[..n].to_vec()) => sent.is_ok(),
                    };
                    if !delivered {
                        tracing::debug!(link = id, "inbound consumer gone; discarding link data");
                        inbound = None;
                    }
                }
                Err(e) => break Some(LinkLoss::Error(e.to_string())),
            },
            Some(bytes) = outbound.recv() => {
                if let Err(e) = writer.write_all(&bytes).await {
                    break Some(LinkLoss::Error(e.to_string()));
                }
            }
        }
    };

    let Some(loss) = loss else {
        let _ = writer.shutdown().await;
        tracing::debug!(link = id, "link closed");
        return;
    };
    tracing::warn!(link = id, %loss, "link to worker lost");
    on_loss(LinkLost { link: id, loss });
}
