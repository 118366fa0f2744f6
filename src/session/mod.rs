mod effects;
mod engine;
mod error;
mod events;
mod machine;

pub use effects::{Effect, EffectBuffer, Outbound};
pub use engine::{SessionEngine, SessionIo};
pub use error::SessionError;
pub use events::{ConnectionState, TransportEvent, Verdict};
