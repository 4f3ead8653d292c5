//! # Colloquy Runtime
//!
//! The orchestration core: drives one response cycle from a pending user
//! turn to exactly one committed assistant turn, streaming every observable
//! event in order along the way.
//!
//! - [`EventEmitter`] delivers the ordered single-consumer event sequence
//! - [`ToolLoop`] bounds the reasoning-engine round trips and dispatches
//!   tool invocations between rounds
//! - [`CredentialResolver`] resolves the engine credential for a cycle
//! - [`SessionService`] is the boundary entry point gluing the above to the
//!   transcript store

pub mod credentials;
pub mod emitter;
pub mod session;
pub mod tool_loop;

pub use credentials::CredentialResolver;
pub use emitter::{EventEmitter, EventStream};
pub use session::{
    blocked_message, SessionConfig, SessionError, SessionService, MISSING_CREDENTIAL_MESSAGE,
};
pub use tool_loop::ToolLoop;
