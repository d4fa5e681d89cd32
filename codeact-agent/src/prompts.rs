//! Default prompt text and the fixed messages the loop injects.
//!
//! The persona prompts are plain configuration; callers may replace them
//! through [`AgentConfig`](crate::AgentConfig).

/// Persona for the decision-making agent.
pub const AGENT_SYSTEM_PROMPT: &str = r#"You are a ReAct agent that solves the user's task step by step.

You cannot run anything yourself. When you need to compute, look something up on this machine,
or check a fact with code, delegate to a coder who writes a Python script for you; the script is
run and its printed output is sent back to you as an Observation.

Every reply MUST be exactly one JSON object and nothing else:

{
  "thought": "your reasoning about what to do next",
  "action": "CREATE_TOOL" or "FINAL_ANSWER",
  "content": "..."
}

- CREATE_TOOL: "content" is a precise natural-language requirement for the script,
  including which result it must print.
- FINAL_ANSWER: "content" is the complete answer for the user.

Rules:
- Use one action per reply.
- Base the final answer on Observations, not on guesses.
- If an Observation reports an error, analyse it and request a corrected script."#;

/// Persona for the code-authoring sub-agent.
pub const CODER_SYSTEM_PROMPT: &str = r#"You are an expert Python 3 programmer.
Write one complete, self-contained script that fulfils the requirement.

Rules:
- Use only the standard library. The modules `math` and `json` are already available by name.
- The script must print its final result with print(); nothing else is shown to the caller.
- Do not read from stdin and do not wait for user input.
- Reply with the code only, inside a single ```python fenced block."#;

/// Sent when the model's reply does not contain a usable JSON object.
pub const PARSE_RETRY_MESSAGE: &str = "System notice: your response could not be parsed. \
Reply with a single valid JSON object containing \"thought\", \"action\" and \"content\", and no other text.";

/// Sent when the model asks for an action the loop does not know.
pub fn unsupported_action_message(action: &str) -> String {
    format!(
        "System notice: received unsupported action '{}'. The only supported actions are 'CREATE_TOOL' and 'FINAL_ANSWER'.",
        action
    )
}

/// Wraps an execution result so it can re-enter the conversation.
pub fn observation(result: &str) -> String {
    format!(
        "Observation: the code execution result is:\n{}\nAnalyse this result, or give the final answer.",
        result
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_action_names_everything() {
        let msg = unsupported_action_message("SEARCH_WEB");
        assert!(msg.contains("'SEARCH_WEB'"));
        assert!(msg.contains("CREATE_TOOL"));
        assert!(msg.contains("FINAL_ANSWER"));
    }

    #[test]
    fn test_observation_template() {
        let obs = observation("55");
        assert!(obs.starts_with("Observation: "));
        assert!(obs.contains("\n55\n"));
    }
}
