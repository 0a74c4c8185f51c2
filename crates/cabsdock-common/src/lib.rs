//! cabsdock-common - Shared error type and HTTP client used across all cabsdock crates.

pub mod error;
pub mod sandbox;

pub use error::{CabsError, Result};
pub use sandbox::SandboxClient;
