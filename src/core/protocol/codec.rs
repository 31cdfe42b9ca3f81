use tracing::debug;

use crate::core::protocol::command::{DecodedCommand, PortCommand};
use crate::core::protocol::*;

/// A demultiplexed element of the inbound byte stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    /// A run of literal data octets, marker bytes already unescaped
    Data(Vec<u8>),
    /// A complete control command
    Command(DecodedCommand),
    /// A WILL/WONT/DO/DONT option negotiation verb
    Negotiate { verb: u8, option: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    /// Literal data
    Ground,
    /// Marker byte seen, next byte selects the sequence kind
    Iac,
    /// WILL/WONT/DO/DONT seen, next byte is the option
    Verb(u8),
    /// Inside a suboption, accumulating payload
    Sub,
    /// Marker byte seen inside a suboption
    SubIac,
}

/// Stateful stream decoder
///
/// A control sequence may be split across any number of transport
/// deliveries; the decoder carries its position between `push` calls.
/// Malformed or unrecognized commands are skipped without losing stream
/// position, so data around them survives intact.
pub struct FrameDecoder {
    state: DecodeState,
    sub: Vec<u8>,
    sub_overlong: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            state: DecodeState::Ground,
            sub: Vec::new(),
            sub_overlong: false,
        }
    }

    /// Feed a transport delivery through the decoder, returning the demuxed
    /// events in stream order.
    pub fn push(&mut self, input: &[u8]) -> Vec<FrameEvent> {
        let mut events = Vec::new();
        let mut data = Vec::new();

        for &byte in input {
            match self.state {
                DecodeState::Ground => {
                    if byte == IAC {
                        self.state = DecodeState::Iac;
                    } else {
                        data.push(byte);
                    }
                }
                DecodeState::Iac => self.handle_iac_byte(byte, &mut data, &mut events),
                DecodeState::Verb(verb) => {
                    flush_data(&mut data, &mut events);
                    events.push(FrameEvent::Negotiate { verb, option: byte });
                    self.state = DecodeState::Ground;
                }
                DecodeState::Sub => {
                    if byte == IAC {
                        self.state = DecodeState::SubIac;
                    } else {
                        self.accumulate_sub(byte);
                    }
                }
                DecodeState::SubIac => match byte {
                    SE => {
                        self.finish_suboption(&mut data, &mut events);
                        self.state = DecodeState::Ground;
                    }
                    IAC => {
                        self.accumulate_sub(IAC);
                        self.state = DecodeState::Sub;
                    }
                    other => {
                        // Marker inside a suboption followed by neither SE
                        // nor a doubled marker: the frame is broken. Drop it
                        // and resynchronize on the new sequence.
                        debug!(byte = other, "malformed suboption, resynchronizing");
                        self.sub.clear();
                        self.sub_overlong = false;
                        self.handle_iac_byte(other, &mut data, &mut events);
                    }
                },
            }
        }

        flush_data(&mut data, &mut events);
        events
    }

    fn handle_iac_byte(&mut self, byte: u8, data: &mut Vec<u8>, events: &mut Vec<FrameEvent>) {
        match byte {
            IAC => {
                // Doubled marker is a literal data byte
                data.push(IAC);
                self.state = DecodeState::Ground;
            }
            SB => {
                self.sub.clear();
                self.sub_overlong = false;
                self.state = DecodeState::Sub;
            }
            WILL | WONT | DO | DONT => {
                self.state = DecodeState::Verb(byte);
            }
            other => {
                // NOP, stray SE and any other single-byte command carry no
                // payload; skip them.
                if other != NOP {
                    debug!(cmd = other, "skipping single-byte command");
                }
                self.state = DecodeState::Ground;
            }
        }
    }

    fn accumulate_sub(&mut self, byte: u8) {
        if self.sub.len() >= MAX_SUBOPTION_LEN {
            self.sub_overlong = true;
        } else {
            self.sub.push(byte);
        }
    }

    fn finish_suboption(&mut self, data: &mut Vec<u8>, events: &mut Vec<FrameEvent>) {
        if self.sub_overlong {
            debug!(len = self.sub.len(), "discarding overlong suboption");
            self.sub.clear();
            self.sub_overlong = false;
            return;
        }
        let Some((&code, payload)) = self.sub.split_first() else {
            debug!("discarding empty suboption");
            return;
        };
        match PortCommand::decode(code, payload) {
            Some(decoded) => {
                flush_data(data, events);
                events.push(FrameEvent::Command(decoded));
            }
            None => {
                debug!(code, len = payload.len(), "skipping malformed command");
            }
        }
        self.sub.clear();
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn flush_data(data: &mut Vec<u8>, events: &mut Vec<FrameEvent>) {
    if !data.is_empty() {
        events.push(FrameEvent::Data(std::mem::take(data)));
    }
}

/// Escape literal data for the wire by doubling marker bytes
pub fn encode_data(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for &byte in data {
        out.push(byte);
        if byte == IAC {
            out.push(IAC);
        }
    }
    out
}

/// Wrap a suboption code and payload in IAC SB ... IAC SE framing,
/// doubling marker bytes inside the payload.
pub fn encode_suboption(code: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 6);
    out.extend_from_slice(&[IAC, SB, code]);
    for &byte in payload {
        out.push(byte);
        if byte == IAC {
            out.push(IAC);
        }
    }
    out.extend_from_slice(&[IAC, SE]);
    out
}

/// Encode a client -> device control command
pub fn encode_command(command: &PortCommand) -> Vec<u8> {
    let (code, payload) = command.encode_client();
    encode_suboption(code, &payload)
}

/// Encode a device -> client confirmation; used by device simulations.
pub fn encode_host_command(command: &PortCommand) -> Vec<u8> {
    let (code, payload) = command.encode_host();
    encode_suboption(code, &payload)
}

/// Encode a WILL/WONT/DO/DONT negotiation verb
pub fn encode_negotiate(verb: u8, option: u8) -> Vec<u8> {
    vec![IAC, verb, option]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::protocol::command::Origin;
    use proptest::prelude::*;

    fn decode_all(chunks: &[&[u8]]) -> Vec<FrameEvent> {
        let mut decoder = FrameDecoder::new();
        let mut events = Vec::new();
        for chunk in chunks {
            events.extend(decoder.push(chunk));
        }
        events
    }

    fn collect_data(events: &[FrameEvent]) -> Vec<u8> {
        events
            .iter()
            .filter_map(|e| match e {
                FrameEvent::Data(bytes) => Some(bytes.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    #[test]
    fn test_plain_data_passthrough() {
        let events = decode_all(&[b"hello"]);
        assert_eq!(events, vec![FrameEvent::Data(b"hello".to_vec())]);
    }

    #[test]
    fn test_escaped_marker_round_trip() {
        let original = vec![0x41, IAC, 0x42, IAC, IAC];
        let wire = encode_data(&original);
        let events = decode_all(&[&wire]);
        assert_eq!(collect_data(&events), original);
    }

    #[test]
    fn test_marker_split_across_deliveries() {
        let original = vec![0x41, IAC, 0x42];
        let wire = encode_data(&original);
        // Split between the doubled marker bytes
        let events = decode_all(&[&wire[..2], &wire[2..]]);
        assert_eq!(collect_data(&events), original);
    }

    #[test]
    fn test_command_split_across_deliveries() {
        let wire = encode_host_command(&PortCommand::SetBaudRate(9600));
        for split in 1..wire.len() {
            let events = decode_all(&[&wire[..split], &wire[split..]]);
            assert_eq!(
                events,
                vec![FrameEvent::Command(DecodedCommand {
                    origin: Origin::Host,
                    command: PortCommand::SetBaudRate(9600),
                })],
                "split at {}",
                split
            );
        }
    }

    #[test]
    fn test_data_and_command_order_preserved() {
        let mut wire = encode_data(b"ab");
        wire.extend(encode_host_command(&PortCommand::NotifyModemState(0x30)));
        wire.extend(encode_data(b"cd"));
        let events = decode_all(&[&wire]);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], FrameEvent::Data(b"ab".to_vec()));
        assert!(matches!(events[1], FrameEvent::Command(_)));
        assert_eq!(events[2], FrameEvent::Data(b"cd".to_vec()));
    }

    #[test]
    fn test_negotiation_verbs() {
        let wire = encode_negotiate(WILL, OPT_COM_PORT);
        let events = decode_all(&[&wire]);
        assert_eq!(
            events,
            vec![FrameEvent::Negotiate {
                verb: WILL,
                option: OPT_COM_PORT
            }]
        );
    }

    #[test]
    fn test_malformed_command_skipped_without_data_loss() {
        let mut wire = encode_data(b"before");
        // Parity confirm with an out-of-range value: skipped
        wire.extend(encode_suboption(CMD_SET_PARITY + HOST_OFFSET, &[99]));
        wire.extend(encode_data(b"after"));
        let events = decode_all(&[&wire]);
        assert_eq!(collect_data(&events), b"beforeafter".to_vec());
        assert!(!events.iter().any(|e| matches!(e, FrameEvent::Command(_))));
    }

    #[test]
    fn test_unknown_command_surfaced_not_dropped() {
        let wire = encode_suboption(90, &[1, 2]);
        let events = decode_all(&[&wire]);
        assert!(matches!(
            &events[0],
            FrameEvent::Command(DecodedCommand {
                command: PortCommand::Unknown { code: 90, .. },
                ..
            })
        ));
    }

    #[test]
    fn test_broken_suboption_resynchronizes() {
        // IAC SB <code> ... IAC WILL <opt> is a broken frame; the decoder
        // drops the suboption and still parses the verb that follows.
        let mut wire = vec![IAC, SB, CMD_SET_BAUDRATE, 0x01];
        wire.extend_from_slice(&[IAC, WILL, OPT_COM_PORT]);
        wire.extend(encode_data(b"x"));
        let events = decode_all(&[&wire]);
        assert_eq!(
            events,
            vec![
                FrameEvent::Negotiate {
                    verb: WILL,
                    option: OPT_COM_PORT
                },
                FrameEvent::Data(b"x".to_vec()),
            ]
        );
    }

    #[test]
    fn test_overlong_suboption_discarded() {
        let payload = vec![0x55; MAX_SUBOPTION_LEN + 32];
        let mut wire = encode_suboption(CMD_SIGNATURE + HOST_OFFSET, &payload);
        wire.extend(encode_data(b"ok"));
        let events = decode_all(&[&wire]);
        assert_eq!(collect_data(&events), b"ok".to_vec());
        assert!(!events.iter().any(|e| matches!(e, FrameEvent::Command(_))));
    }

    #[test]
    fn test_command_payload_containing_marker() {
        // A baud rate whose big-endian encoding contains 0xFF
        let baud = u32::from_be_bytes([0x00, 0x00, 0xFF, 0x00]);
        let wire = encode_host_command(&PortCommand::SetBaudRate(baud));
        let events = decode_all(&[&wire]);
        assert_eq!(
            events,
            vec![FrameEvent::Command(DecodedCommand {
                origin: Origin::Host,
                command: PortCommand::SetBaudRate(baud),
            })]
        );
    }

    proptest! {
        #[test]
        fn prop_data_round_trip(data in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let wire = encode_data(&data);
            let mut decoder = FrameDecoder::new();
            let events = decoder.push(&wire);
            prop_assert_eq!(collect_data(&events), data);
        }

        #[test]
        fn prop_data_round_trip_any_split(
            data in proptest::collection::vec(any::<u8>(), 1..512),
            split_seed in any::<u16>(),
        ) {
            let wire = encode_data(&data);
            let split = (split_seed as usize) % wire.len();
            let events = decode_all(&[&wire[..split], &wire[split..]]);
            prop_assert_eq!(collect_data(&events), data);
        }
    }
}
