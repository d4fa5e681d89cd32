//! Parsing the model's reply into a [`Decision`].
//!
//! The reply is expected to hold one JSON object, possibly wrapped in prose or
//! a markdown fence. The object is cut out by bracket scanning: everything
//! from the first `{` to the last `}`.

use codeact_error::{Error, Result};
use serde_json::{Map, Value};
use std::fmt;

pub const CREATE_TOOL: &str = "CREATE_TOOL";
pub const FINAL_ANSWER: &str = "FINAL_ANSWER";

/// What the model asked the loop to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Write code for the requirement in `content` and run it
    CreateTool,
    /// Stop and return `content`
    FinalAnswer,
    /// Anything else, including a missing action (empty string)
    Unsupported(String),
}

impl Action {
    pub fn parse(action: &str) -> Self {
        match action {
            CREATE_TOOL => Action::CreateTool,
            FINAL_ANSWER => Action::FinalAnswer,
            other => Action::Unsupported(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Action::CreateTool => CREATE_TOOL,
            Action::FinalAnswer => FINAL_ANSWER,
            Action::Unsupported(action) => action,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One parsed step decision. Lives only for the step that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub thought: String,
    pub action: Action,
    pub content: String,
}

/// Slice from the first `{` to the last `}` inclusive, or the whole text
/// when there is no such pair.
pub fn extract_json_object(text: &str) -> &str {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

/// Parse a model reply into a decision.
///
/// Fails with `ParseFailed` when the extracted text is not JSON or not a
/// JSON object. Missing fields default to empty.
pub fn parse_decision(text: &str) -> Result<Decision> {
    let candidate = extract_json_object(text);
    let value: Value = serde_json::from_str(candidate).map_err(|e| {
        Error::parse_failed(format!("response is not valid JSON: {}", e))
            .with_operation("decision::parse")
            .set_source(e)
    })?;

    let Value::Object(object) = value else {
        return Err(Error::parse_failed("response JSON is not an object")
            .with_operation("decision::parse"));
    };

    Ok(Decision {
        thought: field_text(&object, "thought"),
        action: Action::parse(&field_text(&object, "action")),
        content: field_text(&object, "content"),
    })
}

/// Strings verbatim; other JSON values as their JSON text.
fn field_text(object: &Map<String, Value>, key: &str) -> String {
    match object.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
