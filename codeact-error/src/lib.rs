//! # codeact-error
//!
//! Unified error handling for codeact.
//!
//! ## Design Philosophy
//!
//! - **ErrorKind**: Know what error occurred (e.g., InferenceFailed, ParseFailed)
//! - **ErrorStatus**: Decide how to handle it (Permanent, Temporary, Persistent)
//! - **Error Context**: Assist in locating the cause with rich context
//! - **Error Source**: Wrap underlying errors without leaking raw types
//!
//! ## Usage
//!
//! ```rust
//! use codeact_error::{Error, ErrorKind};
//!
//! fn example() -> Result<(), Error> {
//!     Err(Error::new(ErrorKind::InferenceFailed, "completion endpoint unreachable")
//!         .with_operation("agent::run")
//!         .with_context("step", "3")
//!         .with_context("model", "qwen-flash"))
//! }
//! ```
//!
//! ## Principles
//!
//! - Library functions return `Result<T, codeact_error::Error>`
//! - External errors are wrapped with `set_source(err)`
//! - Same error handled once, subsequent ops only append context
//! - Don't abuse `From<OtherError>` to prevent raw error leakage

mod error;
mod kind;
mod status;

pub use error::Error;
pub use kind::ErrorKind;
pub use status::ErrorStatus;

/// Result type alias using codeact Error
pub type Result<T> = std::result::Result<T, Error>;
