//! Anti-forgery protection for state-changing calls.

mod antiforgery;
pub mod endpoints;

pub use antiforgery::{ANTIFORGERY_PURPOSE, Antiforgery, AntiforgeryError, IssuedAntiforgery};
