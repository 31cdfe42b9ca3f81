use crate::core::protocol::*;
use crate::domain::line::{DataBits, FlowControl, Parity, StopBits};

/// Which side of the link produced a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Request sent by the client
    Client,
    /// Confirmation or report sent by the device
    Host,
}

/// Line-control operations carried by a SET_CONTROL command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOp {
    FlowControl(FlowControl),
    BreakOn,
    BreakOff,
    Dtr(bool),
    Rts(bool),
}

impl ControlOp {
    fn to_wire(self) -> u8 {
        match self {
            ControlOp::FlowControl(FlowControl::None) => CONTROL_FLOW_NONE,
            ControlOp::FlowControl(FlowControl::Software) => CONTROL_FLOW_SOFTWARE,
            ControlOp::FlowControl(FlowControl::Hardware) => CONTROL_FLOW_HARDWARE,
            ControlOp::FlowControl(FlowControl::HardwareDsr) => CONTROL_FLOW_DSR,
            ControlOp::BreakOn => CONTROL_BREAK_ON,
            ControlOp::BreakOff => CONTROL_BREAK_OFF,
            ControlOp::Dtr(true) => CONTROL_DTR_ON,
            ControlOp::Dtr(false) => CONTROL_DTR_OFF,
            ControlOp::Rts(true) => CONTROL_RTS_ON,
            ControlOp::Rts(false) => CONTROL_RTS_OFF,
        }
    }

    fn from_wire(value: u8) -> Option<Self> {
        match value {
            CONTROL_FLOW_NONE => Some(ControlOp::FlowControl(FlowControl::None)),
            CONTROL_FLOW_SOFTWARE => Some(ControlOp::FlowControl(FlowControl::Software)),
            CONTROL_FLOW_HARDWARE => Some(ControlOp::FlowControl(FlowControl::Hardware)),
            CONTROL_FLOW_DSR => Some(ControlOp::FlowControl(FlowControl::HardwareDsr)),
            CONTROL_BREAK_ON => Some(ControlOp::BreakOn),
            CONTROL_BREAK_OFF => Some(ControlOp::BreakOff),
            CONTROL_DTR_ON => Some(ControlOp::Dtr(true)),
            CONTROL_DTR_OFF => Some(ControlOp::Dtr(false)),
            CONTROL_RTS_ON => Some(ControlOp::Rts(true)),
            CONTROL_RTS_OFF => Some(ControlOp::Rts(false)),
            _ => None,
        }
    }
}

/// Typed in-band control command
///
/// One enum covers both directions; `Origin` distinguishes a client request
/// from a device confirmation of the same command code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortCommand {
    /// Ask the device to report its signature (empty payload)
    SignatureRequest,
    /// Signature text reported by the device
    Signature(String),
    SetBaudRate(u32),
    SetDataSize(DataBits),
    SetParity(Parity),
    SetStopSize(StopBits),
    SetControl(ControlOp),
    NotifyLineState(u8),
    NotifyModemState(u8),
    FlowSuspend,
    FlowResume,
    SetLineStateMask(u8),
    SetModemStateMask(u8),
    PurgeData(u8),
    /// Authentication request with user name and shared secret
    Auth { user: String, secret: Vec<u8> },
    /// Authentication verdict from the device
    AuthResult(bool),
    KeepaliveProbe,
    KeepaliveResponse,
    /// Battery level report, 0..=100 or -1 when unavailable
    Battery(i8),
    /// Unrecognized command, kept for forward compatibility
    Unknown { code: u8, payload: Vec<u8> },
}

/// A command together with the side that sent it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedCommand {
    pub origin: Origin,
    pub command: PortCommand,
}

impl PortCommand {
    /// Discriminant used when replacing queued intents of the same kind
    pub(crate) fn intent_kind(&self) -> Option<IntentKind> {
        match self {
            PortCommand::SetBaudRate(_) => Some(IntentKind::BaudRate),
            PortCommand::SetDataSize(_) => Some(IntentKind::DataSize),
            PortCommand::SetParity(_) => Some(IntentKind::Parity),
            PortCommand::SetStopSize(_) => Some(IntentKind::StopSize),
            PortCommand::SetControl(ControlOp::FlowControl(_)) => Some(IntentKind::FlowControl),
            PortCommand::SetControl(ControlOp::Dtr(_)) => Some(IntentKind::Dtr),
            PortCommand::SetControl(ControlOp::Rts(_)) => Some(IntentKind::Rts),
            _ => None,
        }
    }

    /// Suboption code and payload for a client -> device request
    pub fn encode_client(&self) -> (u8, Vec<u8>) {
        self.encode_parts(Origin::Client)
    }

    /// Suboption code and payload for a device -> client confirmation.
    /// Used by device simulations in tests.
    pub fn encode_host(&self) -> (u8, Vec<u8>) {
        self.encode_parts(Origin::Host)
    }

    fn encode_parts(&self, origin: Origin) -> (u8, Vec<u8>) {
        let (code, payload) = match self {
            PortCommand::SignatureRequest => (CMD_SIGNATURE, Vec::new()),
            PortCommand::Signature(text) => (CMD_SIGNATURE, text.as_bytes().to_vec()),
            PortCommand::SetBaudRate(baud) => (CMD_SET_BAUDRATE, baud.to_be_bytes().to_vec()),
            PortCommand::SetDataSize(bits) => (CMD_SET_DATASIZE, vec![bits.to_wire()]),
            PortCommand::SetParity(parity) => (CMD_SET_PARITY, vec![parity.to_wire()]),
            PortCommand::SetStopSize(stop) => (CMD_SET_STOPSIZE, vec![stop.to_wire()]),
            PortCommand::SetControl(op) => (CMD_SET_CONTROL, vec![op.to_wire()]),
            PortCommand::NotifyLineState(state) => (CMD_NOTIFY_LINESTATE, vec![*state]),
            PortCommand::NotifyModemState(state) => (CMD_NOTIFY_MODEMSTATE, vec![*state]),
            PortCommand::FlowSuspend => (CMD_FLOW_SUSPEND, Vec::new()),
            PortCommand::FlowResume => (CMD_FLOW_RESUME, Vec::new()),
            PortCommand::SetLineStateMask(mask) => (CMD_SET_LINESTATE_MASK, vec![*mask]),
            PortCommand::SetModemStateMask(mask) => (CMD_SET_MODEMSTATE_MASK, vec![*mask]),
            PortCommand::PurgeData(what) => (CMD_PURGE_DATA, vec![*what]),
            PortCommand::Auth { user, secret } => {
                let mut payload = user.as_bytes().to_vec();
                payload.push(0);
                payload.extend_from_slice(secret);
                (CMD_AUTH, payload)
            }
            PortCommand::AuthResult(accepted) => (CMD_AUTH, vec![u8::from(*accepted)]),
            PortCommand::KeepaliveProbe | PortCommand::KeepaliveResponse => {
                (CMD_KEEPALIVE, Vec::new())
            }
            PortCommand::Battery(level) => {
                let wire = if *level < 0 {
                    BATTERY_UNAVAILABLE
                } else {
                    *level as u8
                };
                (CMD_BATTERY, vec![wire])
            }
            PortCommand::Unknown { code, payload } => (*code, payload.clone()),
        };
        match origin {
            Origin::Client => (code, payload),
            Origin::Host => (code.wrapping_add(HOST_OFFSET), payload),
        }
    }

    /// Decode a suboption into a typed command.
    ///
    /// Returns `None` for malformed payloads; the caller skips the frame
    /// without disturbing the rest of the stream.
    pub fn decode(code: u8, payload: &[u8]) -> Option<DecodedCommand> {
        let (origin, base) = if (HOST_OFFSET..HOST_OFFSET + 13).contains(&code)
            || (CMD_AUTH + HOST_OFFSET..=CMD_BATTERY + HOST_OFFSET).contains(&code)
        {
            (Origin::Host, code - HOST_OFFSET)
        } else {
            (Origin::Client, code)
        };

        let command = match base {
            CMD_SIGNATURE => {
                if payload.is_empty() {
                    PortCommand::SignatureRequest
                } else {
                    PortCommand::Signature(String::from_utf8_lossy(payload).into_owned())
                }
            }
            CMD_SET_BAUDRATE => {
                let bytes: [u8; 4] = payload.try_into().ok()?;
                PortCommand::SetBaudRate(u32::from_be_bytes(bytes))
            }
            CMD_SET_DATASIZE => PortCommand::SetDataSize(DataBits::from_wire(*payload.first()?)?),
            CMD_SET_PARITY => PortCommand::SetParity(Parity::from_wire(*payload.first()?)?),
            CMD_SET_STOPSIZE => PortCommand::SetStopSize(StopBits::from_wire(*payload.first()?)?),
            CMD_SET_CONTROL => PortCommand::SetControl(ControlOp::from_wire(*payload.first()?)?),
            CMD_NOTIFY_LINESTATE => PortCommand::NotifyLineState(*payload.first()?),
            CMD_NOTIFY_MODEMSTATE => PortCommand::NotifyModemState(*payload.first()?),
            CMD_FLOW_SUSPEND => PortCommand::FlowSuspend,
            CMD_FLOW_RESUME => PortCommand::FlowResume,
            CMD_SET_LINESTATE_MASK => PortCommand::SetLineStateMask(*payload.first()?),
            CMD_SET_MODEMSTATE_MASK => PortCommand::SetModemStateMask(*payload.first()?),
            CMD_PURGE_DATA => PortCommand::PurgeData(*payload.first()?),
            CMD_AUTH => match origin {
                Origin::Client => {
                    let split = payload.iter().position(|&b| b == 0)?;
                    PortCommand::Auth {
                        user: String::from_utf8_lossy(&payload[..split]).into_owned(),
                        secret: payload[split + 1..].to_vec(),
                    }
                }
                Origin::Host => PortCommand::AuthResult(*payload.first()? == 1),
            },
            CMD_KEEPALIVE => match origin {
                Origin::Client => PortCommand::KeepaliveProbe,
                Origin::Host => PortCommand::KeepaliveResponse,
            },
            CMD_BATTERY => {
                let wire = *payload.first()?;
                let level = if wire == BATTERY_UNAVAILABLE || wire > 100 {
                    -1
                } else {
                    wire as i8
                };
                PortCommand::Battery(level)
            }
            _ => PortCommand::Unknown {
                code,
                payload: payload.to_vec(),
            },
        };

        Some(DecodedCommand { origin, command })
    }
}

/// Kinds of line-setting intents that replace each other when queued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IntentKind {
    BaudRate,
    DataSize,
    Parity,
    StopSize,
    FlowControl,
    Dtr,
    Rts,
}
