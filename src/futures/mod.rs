//! Future sub-modules.
//!
//! These futures are the points at which a task can be parked by the
//! executor and later resumed by the reactor.
//!
//! - `timer`: Implements futures that complete once the executor's clock
//!   reaches a deadline.
pub mod timer;
