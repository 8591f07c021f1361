//! Record contract shared by every managed entity.
//!
//! # Responsibility
//! - Define the identity + timestamp shape repositories rely on.
//! - Own the clock reading and stamping rules applied at enqueue time.
//!
//! # Invariants
//! - `created` is written once, on the first create call.
//! - `created <= updated` for every stamped record.

pub mod record;
