//! Small async helpers.

pub mod timeout;

pub use timeout::with_deadline;
