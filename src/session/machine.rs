use log::{debug, info, warn};
use statig::{blocking::StateMachine, prelude::*};

use super::effects::{Effect, EffectBuffer, Outbound};
use super::error::SessionError;
use super::events::{ConnectionState, SessionEvent, Verdict};
use crate::ws::{
    frame::{self, FrameError, Opcode},
    handshake::{HandshakeRequest, HttpStatus, HEADER_TERMINATOR},
    ReceiveBuffer,
};

pub(super) struct SessionMachine {
    pub(super) buffer: ReceiveBuffer,
    pub(super) actuator: bool,
    pub(super) last_error: Option<SessionError>,
}

pub(super) struct DispatchContext {
    pub(super) effects: EffectBuffer,
    pub(super) verdict: Verdict,
}

impl Default for DispatchContext {
    fn default() -> Self {
        Self {
            effects: EffectBuffer::new(),
            verdict: Verdict::Handled,
        }
    }
}

enum FrameDrain {
    Pending,
    CloseRequested,
    Violation(FrameError),
}

impl SessionMachine {
    pub(super) fn new(actuator: bool) -> Self {
        Self {
            buffer: ReceiveBuffer::new(),
            actuator,
            last_error: None,
        }
    }

    /// Connection phase of `machine`, read from the statig state itself.
    pub(super) fn phase(machine: &StateMachine<Self>) -> ConnectionState {
        match machine.state() {
            State::Listening {} => ConnectionState::Listening,
            State::Handshaking {} => ConnectionState::Handshaking,
            State::Online {} => ConnectionState::Online,
        }
    }

    /// `notify` is set only when an upgraded client is there to be told.
    fn apply_actuator(&mut self, context: &mut DispatchContext, on: bool, notify: bool) {
        if on == self.actuator {
            debug!("ws_session: actuator already {}", on_off(on));
            return;
        }
        info!("ws_session: turning actuator {}", on_off(on));
        self.actuator = on;
        context.effects.push(Effect::Actuate(on));
        if notify {
            self.push_state(context);
        }
    }

    fn push_state(&self, context: &mut DispatchContext) {
        debug!("ws_session: sending state {}", on_off(self.actuator));
        context
            .effects
            .push(Effect::Send(Outbound::StateFrame(self.actuator)));
    }

    fn release(&mut self, context: &mut DispatchContext) -> Outcome<State> {
        context.effects.push(Effect::Close);
        self.buffer.clear();
        Transition(State::listening())
    }

    fn reject_request(
        &mut self,
        context: &mut DispatchContext,
        error: SessionError,
        status: HttpStatus,
        body: &'static str,
    ) -> Outcome<State> {
        warn!("ws_session: handshake failed err={} body={}", error.label(), body);
        self.last_error = Some(error);
        context
            .effects
            .push(Effect::Send(Outbound::HttpError { status, body }));
        self.release(context)
    }

    fn abort_online(&mut self, context: &mut DispatchContext, error: SessionError) -> Outcome<State> {
        match error {
            SessionError::ProtocolViolation(frame_error) => {
                warn!("ws_session: invalid frame err={}", frame_error.label())
            }
            other => warn!("ws_session: closing session err={}", other.label()),
        }
        self.last_error = Some(error);
        context.effects.push(Effect::Send(Outbound::CloseFrame));
        self.release(context)
    }

    fn close_by_client(&mut self, context: &mut DispatchContext) -> Outcome<State> {
        info!("ws_session: close frame received");
        context.effects.push(Effect::Send(Outbound::CloseFrame));
        self.release(context)
    }

    fn drop_transport(
        &mut self,
        context: &mut DispatchContext,
        error: Option<SessionError>,
    ) -> Outcome<State> {
        match error {
            Some(SessionError::Transport(code)) => warn!("ws_session: transport err code={}", code),
            _ => info!("ws_session: connection closed by peer"),
        }
        if error.is_some() {
            self.last_error = error;
        }
        self.release(context)
    }

    fn handshake_data(&mut self, context: &mut DispatchContext, chunk: &[u8]) -> Outcome<State> {
        let taken = self.buffer.fill(chunk);
        let rest = &chunk[taken..];
        let Some(end) = self.buffer.find(HEADER_TERMINATOR) else {
            if rest.is_empty() {
                return Handled;
            }
            return self.reject_request(
                context,
                SessionError::BufferOverflow,
                HttpStatus::PayloadTooLarge,
                "Request too large.",
            );
        };
        let block_len = end + HEADER_TERMINATOR.len();

        let validated = HandshakeRequest::parse(&self.buffer.as_slice()[..block_len])
            .and_then(|request| request.validate());
        let accept = match validated {
            Ok(accept) => accept,
            Err(err) => {
                return self.reject_request(
                    context,
                    SessionError::BadRequest(err),
                    HttpStatus::BadRequest,
                    err.body(),
                )
            }
        };

        info!("ws_session: handshake complete");
        context
            .effects
            .push(Effect::Send(Outbound::SwitchingProtocols(accept)));
        self.buffer.consume(block_len);
        // Bring the client UI in sync; "off" is what it assumes already.
        if self.actuator {
            self.push_state(context);
        }

        // Frames that trailed the header block are drained before the bytes
        // that did not fit are appended.
        match self.drain_frames(context) {
            FrameDrain::Pending => {}
            FrameDrain::CloseRequested => return self.close_by_client(context),
            FrameDrain::Violation(err) => {
                return self.abort_online(context, SessionError::ProtocolViolation(err))
            }
        }
        if self.buffer.append(rest).is_err() {
            return self.abort_online(context, SessionError::BufferOverflow);
        }
        self.after_frames(context, false)
    }

    fn online_data(&mut self, context: &mut DispatchContext, chunk: &[u8]) -> Outcome<State> {
        if self.buffer.append(chunk).is_err() {
            return self.abort_online(context, SessionError::BufferOverflow);
        }
        self.after_frames(context, true)
    }

    fn after_frames(&mut self, context: &mut DispatchContext, was_online: bool) -> Outcome<State> {
        match self.drain_frames(context) {
            FrameDrain::Pending if was_online => Handled,
            FrameDrain::Pending => Transition(State::online()),
            FrameDrain::CloseRequested => self.close_by_client(context),
            FrameDrain::Violation(err) => {
                self.abort_online(context, SessionError::ProtocolViolation(err))
            }
        }
    }

    fn drain_frames(&mut self, context: &mut DispatchContext) -> FrameDrain {
        loop {
            let frame = match frame::decode(self.buffer.as_slice()) {
                Ok(Some(frame)) => frame,
                Ok(None) => return FrameDrain::Pending,
                Err(err) => return FrameDrain::Violation(err),
            };
            self.buffer.consume(frame.wire_len());

            match frame.opcode {
                Opcode::Binary => {
                    let on = frame.unmasked_payload().unwrap_or(0) != 0;
                    debug!("ws_session: request to turn actuator {}", on_off(on));
                    self.apply_actuator(context, on, true);
                }
                Opcode::Close => return FrameDrain::CloseRequested,
                other => return FrameDrain::Violation(FrameError::UnsupportedOpcode(other)),
            }
        }
    }
}

#[state_machine(initial = "State::listening()")]
impl SessionMachine {
    #[state]
    fn listening(&mut self, context: &mut DispatchContext, event: &SessionEvent) -> Outcome<State> {
        match event {
            SessionEvent::Accepted => {
                info!("ws_session: client connected");
                self.buffer.clear();
                self.last_error = None;
                context.verdict = Verdict::Accepted;
                Transition(State::handshaking())
            }
            SessionEvent::Data(chunk) => {
                warn!("ws_session: {} bytes while listening; dropped", chunk.len());
                context.verdict = Verdict::Dropped;
                Handled
            }
            SessionEvent::SetActuator(on) => {
                self.apply_actuator(context, *on, false);
                Handled
            }
            SessionEvent::Closed | SessionEvent::TransportError(_) | SessionEvent::IdleTimeout => {
                debug!("ws_session: no client; transport event ignored");
                Handled
            }
        }
    }

    #[state]
    fn handshaking(
        &mut self,
        context: &mut DispatchContext,
        event: &SessionEvent,
    ) -> Outcome<State> {
        match event {
            SessionEvent::Accepted => {
                warn!("ws_session: client already connected; refusing");
                context.verdict = Verdict::Refused;
                Handled
            }
            SessionEvent::Data(chunk) => self.handshake_data(context, chunk),
            SessionEvent::SetActuator(on) => {
                self.apply_actuator(context, *on, false);
                Handled
            }
            SessionEvent::Closed => self.drop_transport(context, None),
            SessionEvent::TransportError(code) => {
                self.drop_transport(context, Some(SessionError::Transport(*code)))
            }
            SessionEvent::IdleTimeout => self.reject_request(
                context,
                SessionError::IdleTimeout,
                HttpStatus::RequestTimeout,
                "Request timed out.",
            ),
        }
    }

    #[state]
    fn online(&mut self, context: &mut DispatchContext, event: &SessionEvent) -> Outcome<State> {
        match event {
            SessionEvent::Accepted => {
                warn!("ws_session: client already connected; refusing");
                context.verdict = Verdict::Refused;
                Handled
            }
            SessionEvent::Data(chunk) => self.online_data(context, chunk),
            SessionEvent::SetActuator(on) => {
                self.apply_actuator(context, *on, true);
                Handled
            }
            SessionEvent::Closed => self.drop_transport(context, None),
            SessionEvent::TransportError(code) => {
                self.drop_transport(context, Some(SessionError::Transport(*code)))
            }
            SessionEvent::IdleTimeout => self.abort_online(context, SessionError::IdleTimeout),
        }
    }
}

fn on_off(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}
