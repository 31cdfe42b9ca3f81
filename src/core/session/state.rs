use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::core::protocol::PortCommand;
use crate::core::session::buffer::RecvBuffer;
use crate::domain::line::{DataBits, FlowControl, LineSettings, Parity, StopBits};

/// Connection state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Disconnected,
    Connecting,
    Connected,
    Authenticating,
    Authenticated,
}

impl SessionStatus {
    /// True while a live transport is attached (authentication does not
    /// interrupt the data path)
    pub fn is_connected(&self) -> bool {
        matches!(
            self,
            SessionStatus::Connected | SessionStatus::Authenticating | SessionStatus::Authenticated
        )
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Disconnected => write!(f, "Disconnected"),
            SessionStatus::Connecting => write!(f, "Connecting"),
            SessionStatus::Connected => write!(f, "Connected"),
            SessionStatus::Authenticating => write!(f, "Authenticating"),
            SessionStatus::Authenticated => write!(f, "Authenticated"),
        }
    }
}

/// Application-level keepalive settings for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepaliveConfig {
    pub enabled: bool,
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(15),
        }
    }
}

/// Mutable state of a session, shared between the application surface and
/// the engine task, guarded by one lock.
///
/// `line` holds only device-confirmed values; requests not yet confirmed
/// live in `pending` (while disconnected) or on the wire.
pub(crate) struct SessionCore {
    pub status: SessionStatus,
    /// Connection-attempt generation. Bumped by every new attempt and by
    /// `disconnect`, so an abandoned attempt can never emit events.
    pub generation: u64,
    pub line: LineSettings,
    pub msr: u8,
    pub prev_msr: u8,
    pub signature: String,
    pub battery_level: i8,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub buffer: RecvBuffer,
    /// Intents queued while no transport is attached, replayed on connect
    pub pending: Vec<PortCommand>,
    /// Waiters blocked in `connect_wait`
    pub connect_waiters: Vec<tokio::sync::oneshot::Sender<bool>>,
}

impl SessionCore {
    pub fn new(buffer_capacity: usize) -> Self {
        Self {
            status: SessionStatus::Disconnected,
            generation: 0,
            line: LineSettings::default(),
            msr: 0,
            prev_msr: 0,
            signature: String::new(),
            battery_level: -1,
            rx_bytes: 0,
            tx_bytes: 0,
            buffer: RecvBuffer::new(buffer_capacity),
            pending: Vec::new(),
            connect_waiters: Vec::new(),
        }
    }

    /// Queue an intent, replacing any earlier request of the same kind
    /// (a newer baud-rate request supersedes an older one; breaks stack up).
    pub fn queue_intent(&mut self, command: PortCommand) {
        if let Some(kind) = command.intent_kind() {
            self.pending
                .retain(|queued| queued.intent_kind() != Some(kind));
        }
        self.pending.push(command);
    }

    pub fn resolve_connect_waiters(&mut self, outcome: bool) {
        for waiter in self.connect_waiters.drain(..) {
            let _ = waiter.send(outcome);
        }
    }
}

/// A single confirmed line-setting change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LineUpdate {
    BaudRate(u32),
    DataSize(DataBits),
    Parity(Parity),
    StopSize(StopBits),
    FlowControl(FlowControl),
    Dtr(bool),
    Rts(bool),
}

impl LineUpdate {
    /// Apply to the confirmed settings, returning true when the value
    /// actually changed.
    pub fn apply(self, line: &mut LineSettings) -> bool {
        match self {
            LineUpdate::BaudRate(value) => replace(&mut line.baud_rate, value),
            LineUpdate::DataSize(value) => replace(&mut line.data_bits, value),
            LineUpdate::Parity(value) => replace(&mut line.parity, value),
            LineUpdate::StopSize(value) => replace(&mut line.stop_bits, value),
            LineUpdate::FlowControl(value) => replace(&mut line.flow_control, value),
            LineUpdate::Dtr(value) => replace(&mut line.dtr, value),
            LineUpdate::Rts(value) => replace(&mut line.rts, value),
        }
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}

/// Everything one demux cycle wants to change, applied and notified as a
/// batch under the session lock.
#[derive(Default)]
pub(crate) struct CycleChanges {
    pub data_runs: Vec<Vec<u8>>,
    pub line_updates: Vec<LineUpdate>,
    pub msr_updates: Vec<u8>,
    pub signature: Option<String>,
    pub auth: Option<bool>,
    pub battery: Option<i8>,
}

impl CycleChanges {
    pub fn is_empty(&self) -> bool {
        self.data_runs.is_empty()
            && self.line_updates.is_empty()
            && self.msr_updates.is_empty()
            && self.signature.is_none()
            && self.auth.is_none()
            && self.battery.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::protocol::ControlOp;

    #[test]
    fn test_status_connected_predicate() {
        assert!(!SessionStatus::Disconnected.is_connected());
        assert!(!SessionStatus::Connecting.is_connected());
        assert!(SessionStatus::Connected.is_connected());
        assert!(SessionStatus::Authenticating.is_connected());
        assert!(SessionStatus::Authenticated.is_connected());
    }

    #[test]
    fn test_intent_replacement() {
        let mut core = SessionCore::new(16);
        core.queue_intent(PortCommand::SetBaudRate(9600));
        core.queue_intent(PortCommand::SetParity(Parity::Even));
        core.queue_intent(PortCommand::SetBaudRate(115200));

        assert_eq!(core.pending.len(), 2);
        assert!(core.pending.contains(&PortCommand::SetBaudRate(115200)));
        assert!(!core.pending.contains(&PortCommand::SetBaudRate(9600)));
    }

    #[test]
    fn test_breaks_are_not_replaced() {
        let mut core = SessionCore::new(16);
        core.queue_intent(PortCommand::SetControl(ControlOp::BreakOn));
        core.queue_intent(PortCommand::SetControl(ControlOp::BreakOff));
        assert_eq!(core.pending.len(), 2);
    }

    #[test]
    fn test_line_update_change_detection() {
        let mut line = LineSettings::default();
        // Default baud is 9600: confirming it again is not a change
        assert!(!LineUpdate::BaudRate(9600).apply(&mut line));
        assert!(LineUpdate::BaudRate(19200).apply(&mut line));
        assert_eq!(line.baud_rate, 19200);
        assert!(LineUpdate::Dtr(true).apply(&mut line));
        assert!(!LineUpdate::Dtr(true).apply(&mut line));
    }
}
