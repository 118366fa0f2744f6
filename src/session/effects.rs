use crate::config::SESSION_EFFECTS_MAX;
use crate::ws::{AcceptKey, HttpStatus};

/// A message for the client, rendered to bytes only when it is sent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outbound {
    SwitchingProtocols(AcceptKey),
    HttpError { status: HttpStatus, body: &'static str },
    StateFrame(bool),
    CloseFrame,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    Send(Outbound),
    Actuate(bool),
    Close,
}

#[derive(Clone, Copy, Debug)]
pub struct EffectBuffer {
    len: usize,
    slots: [Option<Effect>; SESSION_EFFECTS_MAX],
}

impl EffectBuffer {
    pub const MAX: usize = SESSION_EFFECTS_MAX;

    pub const fn new() -> Self {
        Self {
            len: 0,
            slots: [None; SESSION_EFFECTS_MAX],
        }
    }

    pub fn push(&mut self, effect: Effect) {
        if self.len >= Self::MAX {
            log::error!("ws_session: effect buffer full, dropping {:?}", effect);
            return;
        }
        self.slots[self.len] = Some(effect);
        self.len += 1;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Effect> {
        self.slots[..self.len].iter().filter_map(Option::as_ref)
    }

    pub fn closes_connection(&self) -> bool {
        self.iter().any(|effect| matches!(effect, Effect::Close))
    }
}

impl Default for EffectBuffer {
    fn default() -> Self {
        Self::new()
    }
}
