//! Driver tasks
//!
//! The lifecycle task opens the transport, runs one reader loop and one
//! writer task per connection, and reconnects with exponential backoff
//! after transport errors. The reader answers handshake requests,
//! applies frames to the device model, completes correlated waiters and
//! feeds the version tracker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, watch, Notify};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use econet_wire::structures::alerts::AlertsRequest;
use econet_wire::structures::program_version::VersionInfo;
use econet_wire::{DecodeContext, DeviceAddress, Frame, FrameData, FrameType, NetworkInfo};

use crate::config::{timeouts, SerialConfig};
use crate::device::EcoMax;
use crate::error::{Error, Result};
use crate::stats::Statistics;
use crate::stream::{FrameReader, FrameWriter};
use crate::transport::Transport;

use super::correlation::Correlations;
use super::versions::{VersionTracker, RESOLUTION_ORDER};
use super::{ConnectionState, LinkHandle, WriteQueueReceiver};

/// Exponential reconnect backoff: initial, doubled per failure, capped
#[derive(Debug)]
pub(crate) struct Backoff {
    initial: Duration,
    cap: Duration,
    next: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, cap: Duration) -> Self {
        Self {
            initial,
            cap,
            next: initial,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = (delay * 2).min(self.cap);
        delay
    }

    pub fn reset(&mut self) {
        self.next = self.initial;
    }
}

/// How the lifecycle task (re)opens transports
pub(crate) enum Connector {
    Tcp { host: String, port: u16 },
    Serial(SerialConfig),
    /// Each reconnect takes the next transport from the channel
    Memory(tokio::sync::Mutex<mpsc::UnboundedReceiver<Transport>>),
}

impl Connector {
    async fn connect(&self) -> Result<Transport> {
        match self {
            Connector::Tcp { host, port } => Transport::connect_tcp(host, *port).await,
            Connector::Serial(config) => Transport::open_serial(config).await,
            Connector::Memory(receiver) => receiver
                .lock()
                .await
                .recv()
                .await
                .ok_or_else(|| Error::connection("no transport available")),
        }
    }
}

/// State shared between the driver tasks and the connection facade
pub(crate) struct DriverContext {
    pub state: watch::Sender<ConnectionState>,
    pub stats: Mutex<Statistics>,
    pub pending: Arc<Correlations>,
    pub link: LinkHandle,
    pub network: NetworkInfo,
    pub ecomax: EcoMax,
    pub versions: Mutex<VersionTracker>,
    pub keepalive_idle: Duration,
    pub reconnect: bool,
    pub backoff_initial: Duration,
    pub backoff_cap: Duration,
    shutdown: AtomicBool,
    shutdown_notify: Notify,
    ecomax_seen: AtomicBool,
    ecomax_notify: Notify,
}

impl DriverContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        state: watch::Sender<ConnectionState>,
        pending: Arc<Correlations>,
        link: LinkHandle,
        network: NetworkInfo,
        ecomax: EcoMax,
        keepalive_idle: Duration,
        reconnect: bool,
        backoff_initial: Duration,
        backoff_cap: Duration,
    ) -> Self {
        Self {
            state,
            stats: Mutex::new(Statistics::default()),
            pending,
            link,
            network,
            ecomax,
            versions: Mutex::new(VersionTracker::new()),
            keepalive_idle,
            reconnect,
            backoff_initial,
            backoff_cap,
            shutdown: AtomicBool::new(false),
            shutdown_notify: Notify::new(),
            ecomax_seen: AtomicBool::new(false),
            ecomax_notify: Notify::new(),
        }
    }

    pub fn set_state(&self, new_state: ConnectionState) {
        let old_state = *self.state.borrow();
        if old_state != new_state {
            info!("[STATUS] {} -> {}", old_state, new_state);
            let _ = self.state.send(new_state);
        }
    }

    pub fn begin_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.shutdown_notify.notify_waiters();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    fn mark_ecomax_seen(&self) {
        if !self.ecomax_seen.swap(true, Ordering::SeqCst) {
            self.ecomax_notify.notify_waiters();
        }
    }

    /// Wait until a frame from the controller has been observed
    pub async fn wait_ecomax(&self, wait: Option<Duration>) -> Result<()> {
        let observed = async {
            loop {
                if self.ecomax_seen.load(Ordering::SeqCst) {
                    return;
                }
                let notified = self.ecomax_notify.notified();
                if self.ecomax_seen.load(Ordering::SeqCst) {
                    return;
                }
                notified.await;
            }
        };
        match wait {
            None => {
                observed.await;
                Ok(())
            },
            Some(duration) => timeout(duration, observed)
                .await
                .map_err(|_| Error::timeout("waiting for ecoMAX")),
        }
    }

    /// Decode context assembled from current device knowledge
    pub fn decode_context(&self) -> DecodeContext {
        DecodeContext {
            regdata_schema: self.ecomax.regdata_schema(),
            thermostat_count: self.ecomax.thermostat_count(),
        }
    }
}

/// The request frame re-issued when a tracked type's version changes
fn request_frame_for(request_type: FrameType) -> Option<FrameData> {
    Some(match request_type {
        FrameType::Uid => FrameData::UidRequest,
        FrameType::RegulatorDataSchema => FrameData::RegulatorDataSchemaRequest,
        FrameType::EcomaxParameters => FrameData::EcomaxParametersRequest {
            start: 0,
            count: 255,
        },
        FrameType::MixerParameters => FrameData::MixerParametersRequest {
            start: 0,
            count: 255,
        },
        FrameType::ThermostatParameters => FrameData::ThermostatParametersRequest {
            start: 0,
            count: 255,
        },
        FrameType::Schedules => FrameData::SchedulesRequest,
        FrameType::Alerts => FrameData::AlertsRequest(AlertsRequest::default()),
        FrameType::Password => FrameData::PasswordRequest,
        _ => return None,
    })
}

/// Lifecycle task: connect, run, reconnect with backoff
pub(crate) async fn run(
    ctx: Arc<DriverContext>,
    connector: Connector,
    queue_rx: WriteQueueReceiver,
) {
    let queue_rx = Arc::new(tokio::sync::Mutex::new(queue_rx));
    let mut backoff = Backoff::new(ctx.backoff_initial, ctx.backoff_cap);

    while !ctx.is_shutdown() {
        ctx.set_state(ConnectionState::Connecting);
        let transport = match connector.connect().await {
            Ok(transport) => transport,
            Err(e) => {
                if ctx.is_shutdown() || !ctx.reconnect {
                    break;
                }
                let delay = backoff.next_delay();
                warn!("connect failed: {}; retrying in {:?}", e, delay);
                if sleep_or_shutdown(&ctx, delay).await {
                    break;
                }
                continue;
            },
        };

        ctx.stats.lock().unwrap().record_connected();
        let reached_ready = run_connection(&ctx, transport, queue_rx.clone()).await;

        if ctx.is_shutdown() {
            break;
        }

        ctx.stats.lock().unwrap().record_loss();
        ctx.versions.lock().unwrap().reset();
        ctx.set_state(ConnectionState::Connecting);
        if reached_ready {
            // A completed handshake resets the backoff ladder
            backoff.reset();
        }
        if !ctx.reconnect {
            break;
        }
        let delay = backoff.next_delay();
        warn!("connection lost; reconnecting in {:?}", delay);
        if sleep_or_shutdown(&ctx, delay).await {
            break;
        }
    }

    ctx.pending.fail_all();
    ctx.set_state(ConnectionState::Closed);
}

/// Sleep, returning true when shutdown interrupted the wait
async fn sleep_or_shutdown(ctx: &DriverContext, delay: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => ctx.is_shutdown(),
        _ = ctx.shutdown_notify.notified() => true,
    }
}

/// Run one connection to completion; returns whether Ready was reached
async fn run_connection(
    ctx: &Arc<DriverContext>,
    transport: Transport,
    queue_rx: Arc<tokio::sync::Mutex<WriteQueueReceiver>>,
) -> bool {
    let (read_half, write_half) = transport.split();
    let mut reader = FrameReader::new(read_half);
    let writer = FrameWriter::new(write_half);

    ctx.set_state(ConnectionState::Handshake);

    // Ask the controller to start broadcasting
    let _ = ctx
        .link
        .queue
        .push(Frame::new(DeviceAddress::Ecomax, FrameData::StartMaster));

    let writer_task = tokio::spawn(write_loop(ctx.clone(), writer, queue_rx));

    let mut ready = false;
    let result = read_loop(ctx, &mut reader, &mut ready).await;
    writer_task.abort();

    match result {
        Ok(()) => debug!("reader stopped for shutdown"),
        Err(e) => warn!("connection error: {}", e),
    }
    ready
}

async fn write_loop(
    ctx: Arc<DriverContext>,
    mut writer: FrameWriter,
    queue_rx: Arc<tokio::sync::Mutex<WriteQueueReceiver>>,
) {
    let mut queue_rx = queue_rx.lock().await;
    while let Some(frame) = queue_rx.recv().await {
        let context = ctx.decode_context();
        match writer.write_frame(&frame, &context).await {
            Ok(bytes) => {
                ctx.stats.lock().unwrap().record_sent(bytes);
                queue_rx.mark_done();
            },
            Err(e) => {
                warn!("write failed: {}", e);
                queue_rx.mark_done();
                // The reader notices the dead transport via keep-alive
                break;
            },
        }
    }
}

async fn read_loop(
    ctx: &Arc<DriverContext>,
    reader: &mut FrameReader,
    ready: &mut bool,
) -> Result<()> {
    loop {
        if ctx.is_shutdown() {
            return Ok(());
        }

        let idle = if *ready {
            ctx.keepalive_idle
        } else {
            Duration::from_millis(timeouts::HANDSHAKE_STEP_TIMEOUT_MS)
        };

        let context = ctx.decode_context();
        let frame = tokio::select! {
            _ = ctx.shutdown_notify.notified() => return Ok(()),
            read = timeout(idle, reader.read_frame(&context)) => match read {
                Err(_) => return Err(Error::timeout("keep-alive idle window elapsed")),
                Ok(Err(e)) if e.is_frame_fault() => {
                    warn!("dropping bad frame: {}", e);
                    ctx.stats.lock().unwrap().frame_errors += 1;
                    continue;
                },
                Ok(Err(e)) => return Err(e),
                Ok(Ok((frame, size))) => {
                    ctx.stats.lock().unwrap().record_received(size);
                    frame
                },
            },
        };

        handle_frame(ctx, frame, ready);
    }
}

fn handle_frame(ctx: &Arc<DriverContext>, frame: Frame, ready: &mut bool) {
    if frame.sender == u8::from(DeviceAddress::Ecomax) {
        ctx.mark_ecomax_seen();
    }

    // Model first: responses apply even with no waiter, and late
    // responses after cancellation still land here.
    ctx.ecomax.apply_frame(&frame.data);

    match &frame.data {
        FrameData::ProgramVersionRequest => {
            debug!("answering program version request");
            let reply = FrameData::ProgramVersion(VersionInfo {
                address: frame.sender,
                ..Default::default()
            });
            let _ = ctx.link.queue.push(reply_to(frame.sender, reply));
        },
        FrameData::CheckDevice => {
            debug!("answering check device request");
            let reply = FrameData::DeviceAvailable(ctx.network.clone());
            let _ = ctx.link.queue.push(reply_to(frame.sender, reply));
        },
        FrameData::SensorData(data) => {
            if !*ready {
                *ready = true;
                ctx.set_state(ConnectionState::Ready);
                initial_pull(ctx);
            }
            check_versions(ctx, &data.frame_versions);
        },
        FrameData::RegulatorData(data) => {
            check_versions(ctx, &data.frame_versions);
        },
        data => {
            if let Some(frame_type) = data.frame_type() {
                if frame_type.is_response() {
                    if let Some(request_type) =
                        FrameType::from_byte(frame_type.as_byte() & 0x7F)
                    {
                        ctx.versions.lock().unwrap().mark_answered(request_type);
                    }
                    ctx.pending.complete(frame_type, None, data);
                }
            }
        },
    }
}

fn reply_to(recipient: u8, data: FrameData) -> Frame {
    let recipient = DeviceAddress::from_byte(recipient).unwrap_or(DeviceAddress::Ecomax);
    Frame::new(recipient, data)
}

/// One-time pull of every tracked frame after the handshake completes
fn initial_pull(ctx: &Arc<DriverContext>) {
    debug!("ready; pulling initial device data");
    for request_type in RESOLUTION_ORDER.iter().chain([FrameType::Password].iter()) {
        if let Some(data) = request_frame_for(*request_type) {
            let _ = ctx.link.queue.push(Frame::new(DeviceAddress::Ecomax, data));
        }
    }
}

/// Re-request every frame type whose embedded version diverged
fn check_versions(ctx: &Arc<DriverContext>, versions: &[(u16, u16)]) {
    let outdated = ctx.versions.lock().unwrap().diff(versions);
    for request_type in outdated {
        debug!("version bump for {:?}; re-requesting", request_type);
        if let Some(data) = request_frame_for(request_type) {
            let _ = ctx.link.queue.push(Frame::new(DeviceAddress::Ecomax, data));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_sequence() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(30));
        let delays: Vec<u64> = (0..7).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 30, 30]);
    }

    #[test]
    fn test_backoff_reset() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(30));
        for _ in 0..5 {
            backoff.next_delay();
        }
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_request_frames_exist_for_tracked_types() {
        for request_type in RESOLUTION_ORDER {
            let data = request_frame_for(*request_type).unwrap();
            assert_eq!(data.frame_type(), Some(*request_type));
        }
        // Responses have no re-request frame
        assert!(request_frame_for(FrameType::UidResponse).is_none());
    }
}
