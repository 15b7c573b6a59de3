//! Event types broadcast by the batch worker.
//!
//! All types derive `serde::Serialize` + `serde::Deserialize` so hosts can
//! forward them over whatever bus they use.

pub mod events;
