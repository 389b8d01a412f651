//! Bifrost over server-sent events.

pub mod endpoints;
mod pump;

pub use pump::{StreamEvent, StreamOutcome, frames, run_stream};
