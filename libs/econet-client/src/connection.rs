//! Connection facade
//!
//! The public entry point: build a connection over TCP, serial or an
//! in-process transport, connect, and talk to the controller through
//! the [`EcoMax`] handle. The driver reconnects on its own; `close`
//! tears everything down and fails outstanding waiters.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use econet_wire::NetworkInfo;

use crate::config::{ConnectionConfig, SerialConfig};
use crate::device::{Device, EcoMax};
use crate::error::{Error, Result};
use crate::protocol::correlation::Correlations;
use crate::protocol::driver::{self, Connector, DriverContext};
use crate::protocol::{write_queue, ConnectionState, LinkHandle};
use crate::stats::Statistics;
use crate::stream::RawLink;
use crate::transport::Transport;

/// A connection to one ecoNET bus
pub struct Connection {
    ctx: Arc<DriverContext>,
    connector: Mutex<Option<Connector>>,
    queue_rx: Mutex<Option<crate::protocol::WriteQueueReceiver>>,
    lifecycle: Mutex<Option<JoinHandle<()>>>,
    state_rx: watch::Receiver<ConnectionState>,
    ecomax: EcoMax,
}

/// Hands transports to an in-process connection, one per (re)connect
pub struct MemoryHub {
    tx: mpsc::UnboundedSender<Transport>,
}

impl MemoryHub {
    /// Create a transport pair, give one end to the connection and
    /// return the peer end for direct frame I/O
    pub fn attach(&self) -> Result<RawLink> {
        let (near, far) = Transport::memory_pair();
        self.tx
            .send(near)
            .map_err(|_| Error::ConnectionClosed)?;
        Ok(RawLink::new(far))
    }
}

impl Connection {
    fn build(connector: Connector, config: ConnectionConfig) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (queue, queue_rx) = write_queue();
        let pending = Arc::new(Correlations::new());
        let link = LinkHandle {
            queue,
            pending: pending.clone(),
            request_timeout: Duration::from_millis(config.request_timeout_ms),
        };
        let ecomax = EcoMax::new(link.clone());
        let network: NetworkInfo = config.network.to_network_info();

        let ctx = Arc::new(DriverContext::new(
            state_tx,
            pending,
            link,
            network,
            ecomax.clone(),
            Duration::from_millis(config.keepalive_idle_ms),
            config.reconnect,
            Duration::from_millis(config.reconnect_initial_backoff_ms),
            Duration::from_millis(config.reconnect_max_backoff_ms),
        ));

        // The queue receiver travels to the lifecycle task on connect
        Self {
            ctx,
            connector: Mutex::new(Some(connector)),
            queue_rx: Mutex::new(Some(queue_rx)),
            lifecycle: Mutex::new(None),
            state_rx,
            ecomax,
        }
    }

    /// Connection over TCP, typically to an ecoNET-compatible gateway
    pub fn tcp(host: impl Into<String>, port: u16, config: ConnectionConfig) -> Self {
        Self::build(
            Connector::Tcp {
                host: host.into(),
                port,
            },
            config,
        )
    }

    /// Connection over a local serial adapter
    pub fn serial(serial: SerialConfig, config: ConnectionConfig) -> Self {
        Self::build(Connector::Serial(serial), config)
    }

    /// In-process connection; the hub supplies transports on demand
    pub fn memory(config: ConnectionConfig) -> (Self, MemoryHub) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection = Self::build(Connector::Memory(tokio::sync::Mutex::new(rx)), config);
        (connection, MemoryHub { tx })
    }

    /// Direct frame-level access to a transport, bypassing the driver
    pub fn raw(transport: Transport) -> RawLink {
        RawLink::new(transport)
    }

    /// Start the driver
    pub async fn connect(&self) -> Result<()> {
        let connector = self
            .connector
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| Error::connection("already connected"))?;
        let queue_rx = self
            .queue_rx
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| Error::connection("already connected"))?;

        let handle = tokio::spawn(driver::run(self.ctx.clone(), connector, queue_rx));
        *self.lifecycle.lock().unwrap() = Some(handle);
        Ok(())
    }

    /// Stop the driver and fail outstanding waiters
    pub async fn close(&self) {
        self.ctx.set_state(ConnectionState::Closing);
        self.ctx.begin_shutdown();

        let handle = self.lifecycle.lock().unwrap().take();
        if let Some(handle) = handle {
            if tokio::time::timeout(Duration::from_secs(1), handle)
                .await
                .is_err()
            {
                debug!("lifecycle task did not stop in time");
            }
        }
        self.ctx.pending.fail_all();
        self.ctx.set_state(ConnectionState::Closed);
    }

    /// The controller handle, waiting for it to be observed on the bus
    pub async fn ecomax(&self, wait: Option<Duration>) -> Result<EcoMax> {
        self.ctx.wait_ecomax(wait).await?;
        Ok(self.ecomax.clone())
    }

    /// Device lookup by name; `"ecomax"` is the only root device
    pub async fn device(&self, name: &str, wait: Option<Duration>) -> Result<EcoMax> {
        match name {
            "ecomax" => self.ecomax(wait).await,
            other => Err(Error::not_available(format!("device '{other}'"))),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Watch lifecycle state changes
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Wait until every queued outbound frame has been written
    pub async fn wait_until_done(&self) {
        self.ctx.link.queue.wait_idle().await;
    }

    /// Snapshot of the connection counters
    pub fn statistics(&self) -> Statistics {
        self.ctx.stats.lock().unwrap().clone()
    }

    /// Diagnostic snapshot for logs and health endpoints
    pub fn diagnostics(&self) -> serde_json::Value {
        serde_json::json!({
            "state": self.state().to_string(),
            "statistics": self.statistics(),
            "ecomax": {
                "times": self.ecomax.times(),
                "cells": self.ecomax.data().len(),
                "mixers": self.ecomax.mixers().len(),
                "thermostats": self.ecomax.thermostats().len(),
            },
        })
    }
}
