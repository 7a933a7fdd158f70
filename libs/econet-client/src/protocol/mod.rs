//! Protocol driver
//!
//! The driver owns the transport: a reader task decodes and dispatches
//! inbound frames, a writer task drains the outbound queue. Application
//! calls travel through [`LinkHandle`], which enqueues frames and
//! correlates responses.

pub mod correlation;
pub mod driver;
pub mod versions;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Notify};
use tokio::time::timeout;
use tracing::debug;

use econet_wire::{Frame, FrameData, FrameType};

use crate::config::REQUEST_RETRIES;
use crate::error::{Error, Result};

use correlation::Correlations;

/// Connection lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    /// Transport open, waiting for the controller's opening requests
    Handshake,
    /// First sensor broadcast seen; fully operational
    Ready,
    Closing,
    Closed,
}

impl ConnectionState {
    pub fn is_ready(&self) -> bool {
        matches!(self, ConnectionState::Ready)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "DISCONNECTED"),
            ConnectionState::Connecting => write!(f, "CONNECTING"),
            ConnectionState::Handshake => write!(f, "HANDSHAKE"),
            ConnectionState::Ready => write!(f, "READY"),
            ConnectionState::Closing => write!(f, "CLOSING"),
            ConnectionState::Closed => write!(f, "CLOSED"),
        }
    }
}

/// Outbound frame queue with depth tracking for `wait_until_done`
#[derive(Debug, Clone)]
pub(crate) struct WriteQueue {
    tx: mpsc::UnboundedSender<Frame>,
    depth: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

pub(crate) struct WriteQueueReceiver {
    rx: mpsc::UnboundedReceiver<Frame>,
    depth: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

pub(crate) fn write_queue() -> (WriteQueue, WriteQueueReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let depth = Arc::new(AtomicUsize::new(0));
    let idle = Arc::new(Notify::new());
    (
        WriteQueue {
            tx,
            depth: depth.clone(),
            idle: idle.clone(),
        },
        WriteQueueReceiver { rx, depth, idle },
    )
}

impl WriteQueue {
    pub fn push(&self, frame: Frame) -> Result<()> {
        self.depth.fetch_add(1, Ordering::SeqCst);
        self.tx.send(frame).map_err(|_| {
            self.depth.fetch_sub(1, Ordering::SeqCst);
            Error::ConnectionClosed
        })
    }

    /// Wait until every queued frame has been written out
    pub async fn wait_idle(&self) {
        loop {
            if self.depth.load(Ordering::SeqCst) == 0 {
                return;
            }
            let notified = self.idle.notified();
            if self.depth.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl WriteQueueReceiver {
    pub async fn recv(&mut self) -> Option<Frame> {
        self.rx.recv().await
    }

    /// Mark the last received frame as written
    pub fn mark_done(&self) {
        if self.depth.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// Handle the device model uses to reach the driver
#[derive(Clone)]
pub(crate) struct LinkHandle {
    pub queue: WriteQueue,
    pub pending: Arc<Correlations>,
    pub request_timeout: Duration,
}

impl LinkHandle {
    /// A handle whose queue is already closed, for tests
    #[cfg(test)]
    pub fn disconnected() -> Self {
        let (queue, receiver) = write_queue();
        drop(receiver);
        Self {
            queue,
            pending: Arc::new(Correlations::new()),
            request_timeout: Duration::from_millis(10),
        }
    }

    /// Enqueue a frame without waiting for any response
    pub fn send(&self, frame: Frame) -> Result<()> {
        self.queue.push(frame)
    }

    /// Enqueue a request and await its correlated response.
    ///
    /// Up to [`REQUEST_RETRIES`] attempts, each with a fresh correlation
    /// entry; a timed-out attempt removes its waiter before retrying.
    pub async fn request(
        &self,
        frame: Frame,
        expect: FrameType,
        index: Option<u8>,
    ) -> Result<FrameData> {
        for attempt in 1..=REQUEST_RETRIES {
            let (id, rx) = self.pending.register(expect, index);
            self.queue.push(frame.clone())?;

            match timeout(self.request_timeout, rx).await {
                Ok(Ok(data)) => return Ok(data),
                Ok(Err(_)) => return Err(Error::ConnectionClosed),
                Err(_) => {
                    self.pending.remove(expect, index, id);
                    debug!(
                        "request {:?} attempt {}/{} timed out",
                        expect, attempt, REQUEST_RETRIES
                    );
                },
            }
        }
        Err(Error::timeout(format!("request {expect:?}")))
    }
}
