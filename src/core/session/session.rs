use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::core::protocol::{ControlOp, PortCommand};
use crate::core::session::engine::{EngineCommand, SessionEngine};
use crate::core::session::event::SessionEvent;
use crate::core::session::state::{CycleChanges, KeepaliveConfig, SessionCore, SessionStatus};
use crate::core::transport::{DefaultTransportFactory, TransportFactory};
use crate::domain::device::Device;
use crate::domain::error::{AircomError, AircomResult};
use crate::domain::line::{DataBits, FlowControl, Parity, StopBits};

/// Authentication credentials for devices that require them
#[derive(Debug, Clone)]
pub struct Credentials {
    pub user: String,
    pub secret: Vec<u8>,
}

/// Outcome of applying one demux cycle
pub(crate) struct CycleOutcome {
    pub overflow_started: bool,
}

/// State shared between the application surface and the engine task.
///
/// Events are emitted while the lock is held, so the queue order always
/// matches the order state changes took effect, and an attempt whose
/// generation has been superseded can never emit anything.
pub(crate) struct SessionShared {
    pub core: Mutex<SessionCore>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionShared {
    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    pub fn begin_connect(&self) -> Option<u64> {
        let mut core = self.core.lock();
        if core.status != SessionStatus::Disconnected {
            return None;
        }
        core.generation += 1;
        core.status = SessionStatus::Connecting;
        core.buffer.clear();
        let generation = core.generation;
        self.emit(SessionEvent::WillConnect);
        Some(generation)
    }

    pub fn connect_failed(&self, generation: u64, message: &str) {
        let mut core = self.core.lock();
        if core.generation != generation || core.status != SessionStatus::Connecting {
            return;
        }
        core.status = SessionStatus::Disconnected;
        core.resolve_connect_waiters(false);
        self.emit(SessionEvent::FailedToConnect {
            message: message.to_string(),
        });
    }

    /// Move an attempt from Connecting to Connected, handing back the
    /// queued intents to replay. `None` means the attempt was abandoned.
    pub fn connected(&self, generation: u64) -> Option<Vec<PortCommand>> {
        let mut core = self.core.lock();
        if core.generation != generation || core.status != SessionStatus::Connecting {
            return None;
        }
        core.status = SessionStatus::Connected;
        core.resolve_connect_waiters(true);
        let pending = std::mem::take(&mut core.pending);
        self.emit(SessionEvent::DidConnect);
        Some(pending)
    }

    pub fn begin_authenticating(&self, generation: u64) {
        let mut core = self.core.lock();
        if core.generation == generation && core.status == SessionStatus::Connected {
            core.status = SessionStatus::Authenticating;
        }
    }

    /// Mid-session transport loss, including keepalive timeout.
    pub fn transport_lost(&self, generation: u64, message: &str) {
        let mut core = self.core.lock();
        if core.generation != generation {
            return;
        }
        if core.status.is_connected() {
            core.status = SessionStatus::Disconnected;
            debug!(message, "transport lost");
            self.emit(SessionEvent::DidDisconnect);
        } else if core.status == SessionStatus::Connecting {
            core.status = SessionStatus::Disconnected;
            core.resolve_connect_waiters(false);
            self.emit(SessionEvent::FailedToConnect {
                message: message.to_string(),
            });
        }
    }

    /// Application-initiated disconnect. Returns true when an engine task
    /// needs to be torn down.
    pub fn disconnect(&self) -> bool {
        let mut core = self.core.lock();
        match core.status {
            SessionStatus::Disconnected => false,
            SessionStatus::Connecting => {
                // Abandoning an attempt suppresses its success or failure
                // notification; no disconnect fires because the session
                // never reported connected.
                core.generation += 1;
                core.status = SessionStatus::Disconnected;
                core.resolve_connect_waiters(false);
                true
            }
            _ => {
                core.generation += 1;
                core.status = SessionStatus::Disconnected;
                self.emit(SessionEvent::DidDisconnect);
                true
            }
        }
    }

    /// Apply one demux cycle's worth of inbound changes and emit the batch
    /// notifications. `None` means the attempt is stale and the engine must
    /// stop.
    pub fn apply_cycle(&self, generation: u64, changes: CycleChanges) -> Option<CycleOutcome> {
        let CycleChanges {
            data_runs,
            line_updates,
            msr_updates,
            signature,
            auth,
            battery,
        } = changes;

        let mut core = self.core.lock();
        if core.generation != generation || !core.status.is_connected() {
            return None;
        }

        let mut line_changed = false;
        for update in line_updates {
            if update.apply(&mut core.line) {
                line_changed = true;
            }
        }
        if line_changed {
            self.emit(SessionEvent::LinePropertiesChanged);
        }

        for msr in msr_updates {
            if msr != core.msr {
                core.prev_msr = core.msr;
                core.msr = msr;
                self.emit(SessionEvent::ModemStatusChanged {
                    msr: core.msr,
                    prev_msr: core.prev_msr,
                });
            }
        }

        if let Some(signature) = signature {
            if signature != core.signature {
                core.signature = signature.clone();
                self.emit(SessionEvent::SignatureChanged { signature });
            }
        }

        if let Some(accepted) = auth {
            if core.status == SessionStatus::Authenticating {
                if accepted {
                    core.status = SessionStatus::Authenticated;
                    self.emit(SessionEvent::DidAuthenticate);
                } else {
                    // Rejection is not a transport failure; the session
                    // stays connected, unauthenticated.
                    core.status = SessionStatus::Connected;
                    self.emit(SessionEvent::DidFailToAuthenticate);
                }
            }
        }

        if let Some(level) = battery {
            if level != core.battery_level {
                core.battery_level = level;
                self.emit(SessionEvent::BatteryLevelChanged { level });
            }
        }

        let mut appended_total = 0;
        let mut overflow_started = false;
        for run in data_runs {
            core.rx_bytes += run.len() as u64;
            let outcome = core.buffer.push_chunk(&run);
            appended_total += outcome.appended;
            overflow_started |= outcome.overflow_started;
        }
        if appended_total > 0 {
            let count = core.buffer.len();
            self.emit(SessionEvent::BytesAvailable { count });
        }
        if overflow_started {
            self.emit(SessionEvent::DidOverflow);
        }

        Some(CycleOutcome { overflow_started })
    }
}

/// A live or pending connection to one serial port on one device.
///
/// Created disconnected; `connect` spawns the protocol engine on the
/// ambient tokio runtime and the outcome arrives through the event queue.
/// The session is reusable across reconnect attempts but never shares a
/// live transport between them. All methods are non-blocking and safe to
/// call from one application thread concurrently with the engine.
pub struct Session {
    id: String,
    device: Device,
    port_number: u8,
    shared: Arc<SessionShared>,
    factory: Arc<dyn TransportFactory>,
    cmd_tx: Mutex<Option<mpsc::UnboundedSender<EngineCommand>>>,
    credentials: Mutex<Option<Credentials>>,
    keepalive: Mutex<KeepaliveConfig>,
    connect_timeout: Mutex<Duration>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<SessionEvent>>>,
    runtime: tokio::runtime::Handle,
}

impl Session {
    /// Session to port 1 of a device, using the built-in transports.
    ///
    /// Must be created within a tokio runtime; the engine task is spawned
    /// on it.
    pub fn new(device: Device) -> Self {
        Self::build(device, 1, Arc::new(DefaultTransportFactory::default()))
    }

    /// Session to a specific serial port of a multi-port device.
    /// `port_number` ranges from 1 to `device.port_count`.
    pub fn with_port(device: Device, port_number: u8) -> AircomResult<Self> {
        if port_number == 0 || port_number > device.port_count {
            return Err(AircomError::InvalidInput(format!(
                "port number {} out of range 1..={}",
                port_number, device.port_count
            )));
        }
        Ok(Self::build(
            device,
            port_number,
            Arc::new(DefaultTransportFactory::default()),
        ))
    }

    /// Session with a custom transport factory (tests, BLE providers).
    pub fn with_factory(
        device: Device,
        port_number: u8,
        factory: Arc<dyn TransportFactory>,
    ) -> AircomResult<Self> {
        if port_number == 0 || port_number > device.port_count {
            return Err(AircomError::InvalidInput(format!(
                "port number {} out of range 1..={}",
                port_number, device.port_count
            )));
        }
        Ok(Self::build(device, port_number, factory))
    }

    fn build(device: Device, port_number: u8, factory: Arc<dyn TransportFactory>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            device,
            port_number,
            shared: Arc::new(SessionShared {
                core: Mutex::new(SessionCore::new(65536)),
                events: events_tx,
            }),
            factory,
            cmd_tx: Mutex::new(None),
            credentials: Mutex::new(None),
            keepalive: Mutex::new(KeepaliveConfig::default()),
            connect_timeout: Mutex::new(Duration::from_millis(5000)),
            events_rx: Mutex::new(Some(events_rx)),
            runtime: tokio::runtime::Handle::current(),
        }
    }

    /// Take the event queue. Yields `Some` exactly once.
    pub fn take_events(&self) -> Option<mpsc::UnboundedReceiver<SessionEvent>> {
        self.events_rx.lock().take()
    }

    /// The device this session was created from
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Which physical serial port this session targets
    pub fn port_number(&self) -> u8 {
        self.port_number
    }

    pub fn status(&self) -> SessionStatus {
        self.shared.core.lock().status
    }

    pub fn connected(&self) -> bool {
        self.status().is_connected()
    }

    pub fn connecting(&self) -> bool {
        self.status() == SessionStatus::Connecting
    }

    pub fn authenticated(&self) -> bool {
        self.status() == SessionStatus::Authenticated
    }

    /// Current baud rate confirmed by the device.
    ///
    /// There is a delay between requesting a change and this value
    /// updating; the change is reflected only once the device confirms it.
    pub fn baud_rate(&self) -> u32 {
        self.shared.core.lock().line.baud_rate
    }

    pub fn data_bits(&self) -> DataBits {
        self.shared.core.lock().line.data_bits
    }

    pub fn parity(&self) -> Parity {
        self.shared.core.lock().line.parity
    }

    pub fn stop_bits(&self) -> StopBits {
        self.shared.core.lock().line.stop_bits
    }

    pub fn flow_control(&self) -> FlowControl {
        self.shared.core.lock().line.flow_control
    }

    pub fn dtr(&self) -> bool {
        self.shared.core.lock().line.dtr
    }

    pub fn rts(&self) -> bool {
        self.shared.core.lock().line.rts
    }

    /// Current modem status register (see the MSR_* masks)
    pub fn msr(&self) -> u8 {
        self.shared.core.lock().msr
    }

    /// Modem status register before the most recent change
    pub fn prev_msr(&self) -> u8 {
        self.shared.core.lock().prev_msr
    }

    /// Signature string reported by the device, empty until reported
    pub fn signature(&self) -> String {
        self.shared.core.lock().signature.clone()
    }

    /// Battery level 0..=100, or -1 when unavailable
    pub fn battery_level(&self) -> i8 {
        self.shared.core.lock().battery_level
    }

    pub fn rx_byte_count(&self) -> u64 {
        self.shared.core.lock().rx_bytes
    }

    pub fn tx_byte_count(&self) -> u64 {
        self.shared.core.lock().tx_bytes
    }

    pub fn keepalive(&self) -> KeepaliveConfig {
        *self.keepalive.lock()
    }

    /// Keepalive configuration applied to the next connection attempt
    pub fn set_keepalive(&self, config: KeepaliveConfig) {
        *self.keepalive.lock() = config;
    }

    /// Transport connect timeout applied to the next connection attempt
    pub fn set_connect_timeout(&self, timeout: Duration) {
        *self.connect_timeout.lock() = timeout;
    }

    /// Receive buffer capacity for subsequently buffered data
    pub fn set_buffer_capacity(&self, capacity: usize) {
        self.shared.core.lock().buffer.set_capacity(capacity);
    }

    /// Set authentication credentials. Only accepted before `connect`;
    /// once negotiation has begun the call is rejected.
    pub fn set_credentials(&self, user: &str, secret: &[u8]) -> AircomResult<()> {
        let core = self.shared.core.lock();
        if core.status != SessionStatus::Disconnected {
            return Err(AircomError::Session {
                message: "credentials must be set before connecting".to_string(),
            });
        }
        drop(core);
        *self.credentials.lock() = Some(Credentials {
            user: user.to_string(),
            secret: secret.to_vec(),
        });
        Ok(())
    }

    /// Start a connection attempt.
    ///
    /// Returns true when the attempt was accepted for processing; the
    /// outcome arrives as `DidConnect` or `FailedToConnect`. Returns false
    /// when the session is already connecting or connected.
    pub fn connect(&self) -> bool {
        let Some(generation) = self.shared.begin_connect() else {
            return false;
        };
        info!(session = %self.id, device = %self.device.address, port = self.port_number, "connecting");

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        *self.cmd_tx.lock() = Some(cmd_tx);

        let transport = match self.factory.create(&self.device, self.port_number) {
            Ok(transport) => transport,
            Err(error) => {
                self.shared.connect_failed(generation, &error.to_string());
                return true;
            }
        };

        let engine = SessionEngine::new(
            self.id.clone(),
            Arc::clone(&self.shared),
            generation,
            cmd_rx,
            self.credentials.lock().clone(),
            *self.keepalive.lock(),
            *self.connect_timeout.lock(),
        );
        self.runtime.spawn(engine.run(transport));
        true
    }

    /// Like `connect`, but resolves once the attempt's outcome is known.
    ///
    /// Do not await this from the task that drains the session's event
    /// queue; the events for the attempt are queued before it resolves.
    pub async fn connect_wait(&self) -> bool {
        let (started, receiver) = {
            let mut core = self.shared.core.lock();
            match core.status {
                SessionStatus::Disconnected => {
                    let (tx, rx) = oneshot::channel();
                    core.connect_waiters.push(tx);
                    (true, rx)
                }
                SessionStatus::Connecting => {
                    // Attach to the in-flight attempt
                    let (tx, rx) = oneshot::channel();
                    core.connect_waiters.push(tx);
                    (false, rx)
                }
                _ => return true,
            }
        };
        if started {
            self.connect();
        }
        receiver.await.unwrap_or(false)
    }

    /// Disconnect the session. Idempotent; a second call is a no-op.
    ///
    /// Abandons an in-flight connection attempt: its success notification
    /// will never fire.
    pub fn disconnect(&self) {
        if self.shared.disconnect() {
            if let Some(tx) = self.cmd_tx.lock().take() {
                let _ = tx.send(EngineCommand::Shutdown);
            }
            info!(session = %self.id, "disconnected");
        }
    }

    /// Send data to the remote serial port.
    ///
    /// Returns the number of input bytes accepted (the wire encoding may
    /// expand them); returns 0 when not connected. Never blocks.
    pub fn write(&self, data: &[u8]) -> usize {
        if data.is_empty() {
            return 0;
        }
        {
            let mut core = self.shared.core.lock();
            if !core.status.is_connected() {
                return 0;
            }
            core.tx_bytes += data.len() as u64;
        }
        self.send_engine(EngineCommand::Data(data.to_vec()));
        data.len()
    }

    /// Read received data in FIFO order, up to `out.len()` bytes.
    /// Non-blocking; returns 0 when the buffer is empty.
    pub fn read(&self, out: &mut [u8]) -> usize {
        let (count, resume) = {
            let mut core = self.shared.core.lock();
            let count = core.buffer.read(out);
            (count, core.buffer.take_resume_pending())
        };
        if resume {
            self.send_engine(EngineCommand::Control(PortCommand::FlowResume));
        }
        count
    }

    /// Number of received bytes ready for reading
    pub fn bytes_available(&self) -> usize {
        self.shared.core.lock().buffer.len()
    }

    /// Discard buffered received data and reset overflow state
    pub fn flush(&self) {
        let resume = {
            let mut core = self.shared.core.lock();
            let resume = core.buffer.has_resume_pending();
            core.buffer.clear();
            resume
        };
        if resume {
            self.send_engine(EngineCommand::Control(PortCommand::FlowResume));
        }
    }

    /// Request new line parameters.
    ///
    /// The request is sent immediately when connected, or queued for the
    /// next successful connect. The readable properties update only once
    /// the device confirms the change.
    pub fn set_line_parameters(
        &self,
        baud_rate: u32,
        data_bits: DataBits,
        parity: Parity,
        stop_bits: StopBits,
    ) {
        self.request(PortCommand::SetBaudRate(baud_rate));
        self.request(PortCommand::SetDataSize(data_bits));
        self.request(PortCommand::SetParity(parity));
        self.request(PortCommand::SetStopSize(stop_bits));
    }

    pub fn set_flow_control(&self, flow_control: FlowControl) {
        self.request(PortCommand::SetControl(ControlOp::FlowControl(
            flow_control,
        )));
    }

    pub fn set_dtr(&self, enabled: bool) {
        self.request(PortCommand::SetControl(ControlOp::Dtr(enabled)));
    }

    pub fn set_rts(&self, enabled: bool) {
        self.request(PortCommand::SetControl(ControlOp::Rts(enabled)));
    }

    /// Ask the device to hold its serial line in break for a moment
    pub fn send_break(&self) {
        self.request(PortCommand::SetControl(ControlOp::BreakOn));
        self.request(PortCommand::SetControl(ControlOp::BreakOff));
    }

    fn request(&self, command: PortCommand) {
        let mut core = self.shared.core.lock();
        if core.status.is_connected() {
            drop(core);
            self.send_engine(EngineCommand::Control(command));
        } else {
            core.queue_intent(command);
        }
    }

    fn send_engine(&self, command: EngineCommand) {
        if let Some(tx) = self.cmd_tx.lock().as_ref() {
            let _ = tx.send(command);
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transport::mock::MockTransportFactory;

    fn test_session() -> (Session, Arc<MockTransportFactory>) {
        let factory = Arc::new(MockTransportFactory::new());
        let device = Device::with_ip("Airconsole-4F", "10.0.0.5", 3696);
        let session = Session::with_factory(device, 1, factory.clone()).unwrap();
        (session, factory)
    }

    #[tokio::test]
    async fn test_new_session_is_disconnected() {
        let (session, _factory) = test_session();
        assert_eq!(session.status(), SessionStatus::Disconnected);
        assert!(!session.connected());
        assert_eq!(session.baud_rate(), 9600);
        assert_eq!(session.battery_level(), -1);
        assert_eq!(session.bytes_available(), 0);
    }

    #[tokio::test]
    async fn test_port_number_validation() {
        let device = Device::with_ip("Airconsole-4F", "10.0.0.5", 3696);
        assert!(Session::with_port(device.clone(), 0).is_err());
        assert!(Session::with_port(device.clone(), 2).is_err());
        assert!(Session::with_port(device, 1).is_ok());
    }

    #[tokio::test]
    async fn test_write_returns_zero_when_disconnected() {
        let (session, _factory) = test_session();
        assert_eq!(session.write(b"hello"), 0);
        assert_eq!(session.tx_byte_count(), 0);
    }

    #[tokio::test]
    async fn test_read_returns_zero_when_empty() {
        let (session, _factory) = test_session();
        let mut buf = [0u8; 8];
        assert_eq!(session.read(&mut buf), 0);
    }

    #[tokio::test]
    async fn test_credentials_rejected_while_connecting() {
        let (session, factory) = test_session();
        let _handle = factory.expect_connection();
        assert!(session.set_credentials("admin", b"secret").is_ok());
        assert!(session.connect());
        assert!(session.set_credentials("admin", b"secret").is_err());
    }

    #[tokio::test]
    async fn test_take_events_once() {
        let (session, _factory) = test_session();
        assert!(session.take_events().is_some());
        assert!(session.take_events().is_none());
    }

    #[tokio::test]
    async fn test_requests_queue_while_disconnected() {
        let (session, _factory) = test_session();
        session.set_line_parameters(19200, DataBits::Eight, Parity::None, StopBits::One);
        session.set_dtr(true);
        let core = session.shared.core.lock();
        assert_eq!(core.pending.len(), 5);
    }

    #[tokio::test]
    async fn test_double_connect_rejected() {
        let (session, factory) = test_session();
        let _handle = factory.expect_connection();
        assert!(session.connect());
        assert!(!session.connect());
    }
}
