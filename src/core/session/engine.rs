use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::core::protocol::{
    codec, FrameDecoder, FrameEvent, Origin, PortCommand, DO, DONT, OPT_COM_PORT, WILL, WONT,
};
use crate::core::session::session::{Credentials, SessionShared};
use crate::core::session::state::{CycleChanges, KeepaliveConfig, LineUpdate};
use crate::core::transport::{Transport, TransportSink};
use crate::domain::error::AircomResult;

/// Instructions from the session surface to its engine task
#[derive(Debug)]
pub(crate) enum EngineCommand {
    /// Application data to encode and send
    Data(Vec<u8>),
    /// A control command to send
    Control(PortCommand),
    /// Tear the connection down without emitting anything
    Shutdown,
}

/// Per-attempt protocol engine.
///
/// Owns the transport for exactly one connection attempt: opens it, runs
/// negotiation and authentication, demuxes the inbound stream, drives the
/// keepalive contract and tears everything down on loss or shutdown. State
/// visible to the application is only ever changed through `SessionShared`,
/// which drops the whole attempt once its generation is stale.
pub(crate) struct SessionEngine {
    session_id: String,
    shared: Arc<SessionShared>,
    generation: u64,
    cmd_rx: mpsc::UnboundedReceiver<EngineCommand>,
    credentials: Option<Credentials>,
    keepalive: KeepaliveConfig,
    connect_timeout: Duration,
    decoder: FrameDecoder,
    /// Device asked us to pause sending data
    suspended: bool,
    suspended_queue: Vec<Vec<u8>>,
}

impl SessionEngine {
    pub fn new(
        session_id: String,
        shared: Arc<SessionShared>,
        generation: u64,
        cmd_rx: mpsc::UnboundedReceiver<EngineCommand>,
        credentials: Option<Credentials>,
        keepalive: KeepaliveConfig,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            session_id,
            shared,
            generation,
            cmd_rx,
            credentials,
            keepalive,
            connect_timeout,
            decoder: FrameDecoder::new(),
            suspended: false,
            suspended_queue: Vec::new(),
        }
    }

    pub async fn run(mut self, transport: Box<dyn Transport>) {
        let opened = tokio::time::timeout(self.connect_timeout, transport.open()).await;
        let (mut sink, mut source) = match opened {
            Ok(Ok(halves)) => halves,
            Ok(Err(error)) => {
                self.shared
                    .connect_failed(self.generation, &error.to_string());
                return;
            }
            Err(_) => {
                self.shared
                    .connect_failed(self.generation, "connection attempt timed out");
                return;
            }
        };

        let Some(pending) = self.shared.connected(self.generation) else {
            // Attempt abandoned while the transport was opening
            sink.close().await;
            return;
        };

        if let Err(error) = self.send_hello(&mut *sink, pending).await {
            self.shared
                .transport_lost(self.generation, &error.to_string());
            sink.close().await;
            return;
        }

        let mut probe_deadline: Option<Instant> = None;
        let mut probe_timer =
            tokio::time::interval(self.keepalive.interval.max(Duration::from_millis(1)));
        probe_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        if self.keepalive.enabled {
            // Swallow the immediate tick so the first probe waits a full
            // interval
            probe_timer.tick().await;
        }

        loop {
            tokio::select! {
                delivery = source.recv() => match delivery {
                    Ok(bytes) => {
                        probe_deadline = None;
                        let events = self.decoder.push(&bytes);
                        let (changes, replies) = self.process_frames(events);
                        for reply in replies {
                            if let Err(error) = sink.send(&reply).await {
                                self.shared.transport_lost(self.generation, &error.to_string());
                                sink.close().await;
                                return;
                            }
                        }
                        if !changes.is_empty() {
                            let Some(outcome) = self.shared.apply_cycle(self.generation, changes) else {
                                sink.close().await;
                                return;
                            };
                            if outcome.overflow_started {
                                // Ask the device to hold off until the
                                // application drains the buffer
                                let wire = codec::encode_command(&PortCommand::FlowSuspend);
                                if sink.send(&wire).await.is_err() {
                                    self.shared.transport_lost(self.generation, "send failed");
                                    sink.close().await;
                                    return;
                                }
                            }
                        }
                        if !self.suspended && !self.suspended_queue.is_empty() {
                            for wire in std::mem::take(&mut self.suspended_queue) {
                                if sink.send(&wire).await.is_err() {
                                    self.shared.transport_lost(self.generation, "send failed");
                                    sink.close().await;
                                    return;
                                }
                            }
                        }
                    }
                    Err(error) => {
                        self.shared.transport_lost(self.generation, &error.to_string());
                        sink.close().await;
                        return;
                    }
                },
                command = self.cmd_rx.recv() => match command {
                    Some(EngineCommand::Data(data)) => {
                        let wire = codec::encode_data(&data);
                        if self.suspended {
                            self.suspended_queue.push(wire);
                        } else if let Err(error) = sink.send(&wire).await {
                            self.shared.transport_lost(self.generation, &error.to_string());
                            sink.close().await;
                            return;
                        }
                    }
                    Some(EngineCommand::Control(command)) => {
                        let wire = codec::encode_command(&command);
                        if let Err(error) = sink.send(&wire).await {
                            self.shared.transport_lost(self.generation, &error.to_string());
                            sink.close().await;
                            return;
                        }
                    }
                    Some(EngineCommand::Shutdown) | None => {
                        sink.close().await;
                        return;
                    }
                },
                _ = probe_timer.tick(), if self.keepalive.enabled => {
                    if probe_deadline.is_none() {
                        let wire = codec::encode_command(&PortCommand::KeepaliveProbe);
                        if sink.send(&wire).await.is_err() {
                            self.shared.transport_lost(self.generation, "send failed");
                            sink.close().await;
                            return;
                        }
                        probe_deadline = Some(Instant::now() + self.keepalive.timeout);
                    }
                },
                _ = tokio::time::sleep_until(probe_deadline.unwrap_or_else(Instant::now)),
                        if probe_deadline.is_some() => {
                    // No traffic since the probe went out: the link is dead
                    // even though the transport has not noticed.
                    warn!(session = %self.session_id, "keepalive timeout");
                    self.shared.transport_lost(self.generation, "keepalive timeout");
                    sink.close().await;
                    return;
                },
            }
        }
    }

    /// Initial negotiation: announce the control option, subscribe to modem
    /// state, request the signature, replay queued intents, then start
    /// authentication when credentials were supplied.
    async fn send_hello(
        &mut self,
        sink: &mut dyn TransportSink,
        pending: Vec<PortCommand>,
    ) -> AircomResult<()> {
        let mut wire = codec::encode_negotiate(WILL, OPT_COM_PORT);
        wire.extend(codec::encode_negotiate(DO, OPT_COM_PORT));
        wire.extend(codec::encode_command(&PortCommand::SetModemStateMask(
            0xFF,
        )));
        wire.extend(codec::encode_command(&PortCommand::SignatureRequest));
        for command in &pending {
            wire.extend(codec::encode_command(command));
        }
        sink.send(&wire).await?;

        if let Some(credentials) = self.credentials.take() {
            let wire = codec::encode_command(&PortCommand::Auth {
                user: credentials.user,
                secret: credentials.secret,
            });
            sink.send(&wire).await?;
            self.shared.begin_authenticating(self.generation);
        }
        Ok(())
    }

    /// Sort one push's worth of frame events into state changes and
    /// immediate wire replies.
    fn process_frames(&mut self, events: Vec<FrameEvent>) -> (CycleChanges, Vec<Vec<u8>>) {
        let mut changes = CycleChanges::default();
        let mut replies = Vec::new();

        for event in events {
            match event {
                FrameEvent::Data(bytes) => changes.data_runs.push(bytes),
                FrameEvent::Negotiate { verb, option } => {
                    if let Some(reply) = negotiate_reply(verb, option) {
                        replies.push(reply);
                    }
                }
                FrameEvent::Command(decoded) => {
                    if decoded.origin != Origin::Host {
                        debug!(session = %self.session_id, ?decoded, "ignoring client-side command");
                        continue;
                    }
                    self.process_host_command(decoded.command, &mut changes);
                }
            }
        }

        (changes, replies)
    }

    fn process_host_command(&mut self, command: PortCommand, changes: &mut CycleChanges) {
        match command {
            PortCommand::Signature(text) => changes.signature = Some(text),
            PortCommand::SetBaudRate(baud) => {
                changes.line_updates.push(LineUpdate::BaudRate(baud));
            }
            PortCommand::SetDataSize(bits) => {
                changes.line_updates.push(LineUpdate::DataSize(bits));
            }
            PortCommand::SetParity(parity) => {
                changes.line_updates.push(LineUpdate::Parity(parity));
            }
            PortCommand::SetStopSize(stop) => {
                changes.line_updates.push(LineUpdate::StopSize(stop));
            }
            PortCommand::SetControl(op) => {
                use crate::core::protocol::ControlOp;
                match op {
                    ControlOp::FlowControl(flow) => {
                        changes.line_updates.push(LineUpdate::FlowControl(flow));
                    }
                    ControlOp::Dtr(enabled) => {
                        changes.line_updates.push(LineUpdate::Dtr(enabled));
                    }
                    ControlOp::Rts(enabled) => {
                        changes.line_updates.push(LineUpdate::Rts(enabled));
                    }
                    ControlOp::BreakOn | ControlOp::BreakOff => {
                        // Break confirmations carry no client-visible state
                    }
                }
            }
            PortCommand::NotifyModemState(msr) => changes.msr_updates.push(msr),
            PortCommand::AuthResult(accepted) => changes.auth = Some(accepted),
            PortCommand::Battery(level) => changes.battery = Some(level),
            PortCommand::FlowSuspend => {
                debug!(session = %self.session_id, "device suspended our data flow");
                self.suspended = true;
            }
            PortCommand::FlowResume => {
                debug!(session = %self.session_id, "device resumed our data flow");
                self.suspended = false;
            }
            PortCommand::KeepaliveResponse => {
                // Any traffic already reset the probe deadline
            }
            PortCommand::Unknown { code, .. } => {
                // Forward compatibility: unknown commands are never fatal
                debug!(session = %self.session_id, code, "skipping unrecognized command");
            }
            other => {
                debug!(session = %self.session_id, ?other, "ignoring command");
            }
        }
    }
}

/// Telnet-style answer to an option negotiation verb: accept the serial
/// control option, refuse everything else.
fn negotiate_reply(verb: u8, option: u8) -> Option<Vec<u8>> {
    match (verb, option) {
        (WILL, OPT_COM_PORT) => Some(codec::encode_negotiate(DO, OPT_COM_PORT)),
        (DO, OPT_COM_PORT) => Some(codec::encode_negotiate(WILL, OPT_COM_PORT)),
        (WILL, other) => Some(codec::encode_negotiate(DONT, other)),
        (DO, other) => Some(codec::encode_negotiate(WONT, other)),
        _ => None,
    }
}
