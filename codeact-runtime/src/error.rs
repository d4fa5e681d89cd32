//! Runtime error types
//!
//! Re-exports codeact-error so downstream crates can depend on the runtime alone.

pub use codeact_error::{Error, ErrorKind, ErrorStatus, Result};
