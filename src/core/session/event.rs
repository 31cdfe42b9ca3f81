/// Notifications delivered to the application.
///
/// One session pushes its events, in occurrence order, into a single
/// single-consumer queue (`Session::take_events`). Consumers match only the
/// variants they care about; every subscription is optional. Handlers run
/// sequentially — events of one session are never delivered concurrently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// `connect` was accepted and a connection attempt is starting
    WillConnect,
    /// The transport is open and negotiation has been sent
    DidConnect,
    /// The connection attempt failed; the session stays disconnected
    FailedToConnect { message: String },
    /// The session lost its transport or was disconnected explicitly
    DidDisconnect,
    /// Received data is ready for reading; `count` is the total available
    BytesAvailable { count: usize },
    /// The receive buffer discarded data; read more often or faster
    DidOverflow,
    /// One or more of baud rate, data bits, parity, stop bits, flow
    /// control, DTR, RTS were confirmed as changed by the device
    LinePropertiesChanged,
    /// The modem status register changed (CTS, DSR, RI, DCD)
    ModemStatusChanged { msr: u8, prev_msr: u8 },
    /// The device reported its signature string
    SignatureChanged { signature: String },
    DidAuthenticate,
    DidFailToAuthenticate,
    /// Battery level report changed; -1 means unavailable
    BatteryLevelChanged { level: i8 },
}
