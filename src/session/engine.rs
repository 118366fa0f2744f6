use log::debug;
use statig::blocking::IntoStateMachineExt as _;

use super::effects::{Effect, Outbound};
use super::error::SessionError;
use super::events::{ConnectionState, DataChunk, SessionEvent, TransportEvent, Verdict};
use super::machine::{DispatchContext, SessionMachine};
use crate::config::DATA_CHUNK_MAX;
use crate::ws::{frame, handshake};

/// The transport and actuator as seen from the session.
///
/// Writes are fire-and-forget; the session never waits for an
/// acknowledgement.
pub trait SessionIo {
    fn write(&mut self, bytes: &[u8]);
    fn close(&mut self);
    fn actuate(&mut self, on: bool);
}

/// Owns the single client session: connection state, reassembly buffer and
/// actuator state.
pub struct SessionEngine {
    machine: statig::blocking::StateMachine<SessionMachine>,
}

impl Default for SessionEngine {
    fn default() -> Self {
        Self::new(false)
    }
}

impl SessionEngine {
    pub fn new(actuator: bool) -> Self {
        Self {
            machine: SessionMachine::new(actuator).state_machine(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        SessionMachine::phase(&self.machine)
    }

    pub fn actuator(&self) -> bool {
        self.machine.inner().actuator
    }

    /// Why the most recent connection ended, if it ended badly.
    pub fn last_error(&self) -> Option<SessionError> {
        self.machine.inner().last_error
    }

    pub fn buffered(&self) -> usize {
        self.machine.inner().buffer.len()
    }

    pub fn dispatch(&mut self, event: TransportEvent<'_>, io: &mut impl SessionIo) -> Verdict {
        match event {
            TransportEvent::Accepted => self.step(SessionEvent::Accepted, io),
            TransportEvent::Data(bytes) => self.deliver(bytes, io),
            TransportEvent::Closed => self.step(SessionEvent::Closed, io),
            TransportEvent::Error(code) => self.step(SessionEvent::TransportError(code), io),
            TransportEvent::IdleTimeout => self.step(SessionEvent::IdleTimeout, io),
        }
    }

    /// Local actuator change; the client is told when one is connected.
    pub fn set_actuator(&mut self, on: bool, io: &mut impl SessionIo) {
        self.step(SessionEvent::SetActuator(on), io);
    }

    fn deliver(&mut self, bytes: &[u8], io: &mut impl SessionIo) -> Verdict {
        let mut verdict = Verdict::Handled;
        for (idx, chunk) in bytes.chunks(DATA_CHUNK_MAX).enumerate() {
            if idx > 0 && self.state() == ConnectionState::Listening {
                let discarded = bytes.len() - idx * DATA_CHUNK_MAX;
                debug!("ws_session: connection gone; discarding {} bytes", discarded);
                break;
            }
            let Ok(data) = DataChunk::from_slice(chunk) else {
                break;
            };
            verdict = self.step(SessionEvent::Data(data), io);
        }
        verdict
    }

    fn step(&mut self, event: SessionEvent, io: &mut impl SessionIo) -> Verdict {
        let mut context = DispatchContext::default();
        self.machine.handle_with_context(&event, &mut context);
        for effect in context.effects.iter() {
            match *effect {
                Effect::Send(outbound) => render(outbound, io),
                Effect::Actuate(on) => io.actuate(on),
                Effect::Close => io.close(),
            }
        }
        context.verdict
    }
}

fn render(outbound: Outbound, io: &mut impl SessionIo) {
    match outbound {
        Outbound::SwitchingProtocols(accept) => {
            handshake::write_switching_protocols(&accept, |bytes| io.write(bytes))
        }
        Outbound::HttpError { status, body } => {
            handshake::write_error_response(status, body, |bytes| io.write(bytes))
        }
        Outbound::StateFrame(on) => io.write(&frame::encode_state(on)),
        Outbound::CloseFrame => io.write(&frame::CLOSE_FRAME),
    }
}
