//! # codeact runtime
//!
//! The pieces the agent drives but does not own.
//!
//! ## Core Concepts
//! - **Provider**: Trait-based text-completion client (OpenAI-compatible HTTP)
//! - **Sandbox**: Runs generated Python in a throw-away process and returns
//!   its captured output, or a description of what went wrong, as text
//! - **Config**: Defaults, environment variables and overrides for both

pub mod config;
pub mod error;
pub mod provider;
pub mod sandbox;

pub use config::{ProviderConfig, SandboxConfig};
pub use error::{Error, ErrorKind, ErrorStatus, Result};
pub use provider::{
    LlmProvider, ProviderError,
    ChatMessage, Role, CompletionRequest, CompletionResponse, ResponseFormat,
    FinishReason, Usage, UsageTracker,
    OpenAIProvider,
};
pub use sandbox::{CodeExecutor, PythonSandbox, MISSING_DEPENDENCY_MESSAGE, NO_OUTPUT_MESSAGE};
