//! Request protocol: wire shapes, the stable error taxonomy, and the
//! dispatch state machine.

pub mod handler;
pub mod wire;

pub use handler::RequestHandler;
pub use wire::{peek_fingerprint, ErrorCode, Operation, Outcome, SigningRequest};
