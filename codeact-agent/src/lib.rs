//! # codeact agent
//!
//! A ReAct loop that writes its own tools:
//! 1. The user's query seeds a fresh conversation
//! 2. The model replies with a JSON decision: thought, action, content
//! 3. CREATE_TOOL: a coder sub-agent writes Python for the requirement,
//!    the sandbox runs it, and the output returns as an observation
//! 4. FINAL_ANSWER ends the run with the content as the answer
//! 5. Malformed replies and unknown actions are answered with a correction
//! 6. Every model consultation spends one step of a fixed budget

mod agent;
mod coder;
mod decision;
pub mod prompts;

#[cfg(test)]
mod testing;

pub use agent::{Agent, AgentConfig, AgentResult, Conversation, RunOutcome, DEFAULT_MAX_STEPS};
pub use coder::{extract_code, CoderAgent};
pub use decision::{extract_json_object, parse_decision, Action, Decision, CREATE_TOOL, FINAL_ANSWER};
