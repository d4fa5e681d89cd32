//! Code-authoring sub-agent - turns a requirement into Python source

use crate::prompts::CODER_SYSTEM_PROMPT;
use codeact_error::Result;
use codeact_runtime::{ChatMessage, CompletionRequest, LlmProvider};
use std::sync::Arc;

/// Sub-agent that asks the model for code and cleans up the reply.
///
/// It does not validate what comes back; broken code shows up as an
/// execution error in the next observation.
pub struct CoderAgent<P> {
    provider: Arc<P>,
    system_prompt: String,
    temperature: Option<f32>,
}

impl<P: LlmProvider> CoderAgent<P> {
    pub fn new(provider: Arc<P>) -> Self {
        Self::with_prompt(provider, CODER_SYSTEM_PROMPT)
    }

    pub fn with_prompt(provider: Arc<P>, system_prompt: impl Into<String>) -> Self {
        Self {
            provider,
            system_prompt: system_prompt.into(),
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Ask the model for code fulfilling `requirement`.
    ///
    /// Errors only when the model call itself fails.
    pub async fn generate_code(&self, requirement: &str) -> Result<String> {
        tracing::debug!(requirement = %requirement, "coder_request");

        let mut request = CompletionRequest::new(vec![
            ChatMessage::system(&self.system_prompt),
            ChatMessage::user(format!("Requirement: {}", requirement)),
        ]);
        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }

        let raw = self
            .provider
            .complete_text(request)
            .await
            .map_err(|e| e.into_error("coder::generate_code"))?;

        Ok(extract_code(&raw))
    }
}

/// Interior of the first fenced block if there is one, else the text itself;
/// trimmed either way. A language tag on the opening fence is dropped.
pub fn extract_code(raw: &str) -> String {
    let Some((_, after_open)) = raw.split_once("```") else {
        return raw.trim().to_string();
    };

    let block = match after_open.split_once("```") {
        Some((inside, _)) => inside,
        None => after_open,
    };

    let body = match block.split_once('\n') {
        Some((first, rest)) if is_language_tag(first) => rest,
        _ => block,
    };

    body.trim().to_string()
}

fn is_language_tag(line: &str) -> bool {
    let tag = line.trim();
    tag.is_empty()
        || tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '_' | '.' | '#'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Event, ScriptedProvider};
    use codeact_error::ErrorKind;
    use codeact_runtime::{ProviderError, Role};

    #[test]
    fn test_extract_python_fence() {
        let raw = "Here you go:\n```python\nprint(2+2)\n```\nLet me know!";
        assert_eq!(extract_code(raw), "print(2+2)");
    }

    #[test]
    fn test_extract_untagged_fence() {
        let raw = "```\nx = 1\nprint(x)\n```";
        assert_eq!(extract_code(raw), "x = 1\nprint(x)");
    }

    #[test]
    fn test_extract_other_tag() {
        assert_eq!(extract_code("```py\nprint(1)\n```"), "print(1)");
        assert_eq!(extract_code("```python3 \nprint(1)\n```"), "print(1)");
    }

    #[test]
    fn test_extract_first_block_only() {
        let raw = "```python\nprint('a')\n```\nand also\n```python\nprint('b')\n```";
        assert_eq!(extract_code(raw), "print('a')");
    }

    #[test]
    fn test_extract_without_fence_is_trimmed_only() {
        let raw = "\n\n  import math\nprint(math.pi)  \n";
        assert_eq!(extract_code(raw), "import math\nprint(math.pi)");
    }

    #[test]
    fn test_extract_unterminated_fence() {
        assert_eq!(extract_code("```python\nprint(3)\n"), "print(3)");
    }

    #[test]
    fn test_extract_first_line_code_is_kept() {
        assert_eq!(extract_code("```print('hi')\n```"), "print('hi')");
        assert_eq!(extract_code("```x = 1\nprint(x)```"), "x = 1\nprint(x)");
    }

    #[tokio::test]
    async fn test_generate_code_sends_persona_and_requirement() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(
            "```python\nprint(55)\n```".to_string(),
        )]));
        let coder = CoderAgent::with_prompt(provider.clone(), "coder persona");

        let code = coder.generate_code("compute 10th fibonacci number").await.unwrap();
        assert_eq!(code, "print(55)");

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        let messages = &requests[0].messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, "coder persona");
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].content, "Requirement: compute 10th fibonacci number");
        assert_eq!(provider.events(), vec![Event::Complete]);
    }

    #[tokio::test]
    async fn test_generate_code_propagates_model_failure() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(ProviderError::Network(
            "connection reset".into(),
        ))]));
        let coder = CoderAgent::new(provider);

        let err = coder.generate_code("anything").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NetworkFailed);
        assert_eq!(err.operation(), "coder::generate_code");
    }
}
