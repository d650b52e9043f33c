//! Core domain types shared by the client and the reconciler.

pub mod message;
pub mod session;

pub use message::*;
pub use session::*;
