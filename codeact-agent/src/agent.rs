//! Agent implementation - the decision loop between the model and the sandbox

use crate::coder::CoderAgent;
use crate::decision::{parse_decision, Action};
use crate::prompts;
use codeact_error::Result;
use codeact_runtime::{ChatMessage, CodeExecutor, CompletionRequest, LlmProvider, ResponseFormat};
use std::sync::Arc;

/// Default step budget for one run
pub const DEFAULT_MAX_STEPS: usize = 8;

/// Configuration for the agent
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Model consultations allowed before the run gives up
    pub max_steps: usize,
    /// Persona for the decision-making model
    pub agent_prompt: String,
    /// Persona for the code-authoring sub-agent
    pub coder_prompt: String,
    /// Ask the service for a JSON object directly; parsing still falls back
    /// to bracket scanning
    pub json_mode: bool,
    /// Sampling temperature for every request, service default when unset
    pub temperature: Option<f32>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            agent_prompt: prompts::AGENT_SYSTEM_PROMPT.to_string(),
            coder_prompt: prompts::CODER_SYSTEM_PROMPT.to_string(),
            json_mode: false,
            temperature: None,
        }
    }
}

/// Append-only message history owned by a single run.
///
/// Always starts with the system persona followed by the user's query.
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    fn new(system_prompt: &str, query: &str) -> Self {
        Self {
            messages: vec![ChatMessage::system(system_prompt), ChatMessage::user(query)],
        }
    }

    fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn into_messages(self) -> Vec<ChatMessage> {
        self.messages
    }
}

/// How a run ended, when it did not abort
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The model produced FINAL_ANSWER; its content, unmodified
    FinalAnswer(String),
    /// The step budget ran out first
    BudgetExhausted { max_steps: usize },
}

impl RunOutcome {
    pub fn answer(&self) -> Option<&str> {
        match self {
            RunOutcome::FinalAnswer(answer) => Some(answer),
            RunOutcome::BudgetExhausted { .. } => None,
        }
    }
}

/// Result from agent execution
#[derive(Debug, Clone)]
pub struct AgentResult {
    pub outcome: RunOutcome,
    /// Steps consumed, including corrective ones
    pub steps: usize,
    /// Full history of the run
    pub conversation: Conversation,
}

/// The agent orchestrator - manages the model <-> sandbox loop.
///
/// The provider is shared with the coder sub-agent. Each [`run`](Agent::run)
/// owns its own conversation, so one agent can serve several runs.
pub struct Agent<P, E> {
    provider: Arc<P>,
    executor: Arc<E>,
    coder: CoderAgent<P>,
    config: AgentConfig,
}

impl<P: LlmProvider, E: CodeExecutor> Agent<P, E> {
    /// Create a new agent with default configuration
    pub fn new(provider: Arc<P>, executor: Arc<E>) -> Self {
        Self::with_config(provider, executor, AgentConfig::default())
    }

    /// Create a new agent with custom configuration
    pub fn with_config(provider: Arc<P>, executor: Arc<E>, config: AgentConfig) -> Self {
        let coder = CoderAgent::with_prompt(provider.clone(), config.coder_prompt.clone())
            .with_temperature(config.temperature);
        Self {
            provider,
            executor,
            coder,
            config,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Run a query to completion.
    ///
    /// Returns the final answer or a budget-exhausted outcome. A failed model
    /// call (for a decision or for code) aborts the run with an error. Parse
    /// failures, unknown actions and execution failures are fed back to the
    /// model instead.
    pub async fn run(&self, query: &str) -> Result<AgentResult> {
        let max_steps = self.config.max_steps;
        let mut conversation = Conversation::new(&self.config.agent_prompt, query);

        tracing::info!(query = %query, max_steps, "task_started");

        for step in 1..=max_steps {
            tracing::debug!(step, messages = conversation.len(), "step_started");

            let response = self
                .provider
                .complete_text(self.decision_request(&conversation))
                .await
                .map_err(|e| {
                    let err = e
                        .into_error("agent::run")
                        .with_context("step", step.to_string());
                    tracing::error!(step, error = %err, "model_call_failed");
                    err
                })?;

            tracing::debug!(step, response = %response, "agent_response");
            conversation.push(ChatMessage::agent(&response));

            let decision = match parse_decision(&response) {
                Ok(decision) => decision,
                Err(err) => {
                    tracing::warn!(step, error = %err, "decision_unparsable");
                    conversation.push(ChatMessage::user(prompts::PARSE_RETRY_MESSAGE));
                    continue;
                }
            };

            if !decision.thought.is_empty() {
                tracing::info!(step, thought = %decision.thought, "thought");
            }

            match decision.action {
                Action::FinalAnswer => {
                    tracing::info!(step, answer = %decision.content, "task_completed");
                    return Ok(AgentResult {
                        outcome: RunOutcome::FinalAnswer(decision.content),
                        steps: step,
                        conversation,
                    });
                }
                Action::CreateTool => {
                    let result = self.create_tool(step, &decision.content).await?;
                    conversation.push(ChatMessage::user(prompts::observation(&result)));
                }
                Action::Unsupported(action) => {
                    tracing::warn!(step, action = %action, "unsupported_action");
                    conversation.push(ChatMessage::user(prompts::unsupported_action_message(&action)));
                }
            }
        }

        tracing::warn!(max_steps, "step_budget_exhausted");
        Ok(AgentResult {
            outcome: RunOutcome::BudgetExhausted { max_steps },
            steps: max_steps,
            conversation,
        })
    }

    fn decision_request(&self, conversation: &Conversation) -> CompletionRequest {
        let mut request = CompletionRequest::new(conversation.messages().to_vec());
        if self.config.json_mode {
            request = request.with_response_format(ResponseFormat::JsonObject);
        }
        if let Some(temperature) = self.config.temperature {
            request = request.with_temperature(temperature);
        }
        request
    }

    /// Have the coder write code for `requirement`, run it, return the result text.
    async fn create_tool(&self, step: usize, requirement: &str) -> Result<String> {
        tracing::info!(step, requirement = %requirement, "create_tool");

        let code = self.coder.generate_code(requirement).await.map_err(|err| {
            let err = err
                .with_operation("agent::run")
                .with_context("step", step.to_string());
            tracing::error!(step, error = %err, "model_call_failed");
            err
        })?;
        tracing::info!(step, code = %code, "generated_code");

        let result = self.executor.execute(&code).await;
        tracing::info!(step, output = %result, "execution_output");

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Event, EventLog, RecordingExecutor, ScriptedProvider};
    use codeact_error::ErrorKind;
    use codeact_runtime::{ProviderError, Role};

    const FINAL_55: &str = r#"{"thought":"done","action":"FINAL_ANSWER","content":"55"}"#;

    fn agent(
        provider: &Arc<ScriptedProvider>,
        executor: &Arc<RecordingExecutor>,
    ) -> Agent<ScriptedProvider, RecordingExecutor> {
        Agent::new(provider.clone(), executor.clone())
    }

    fn script(replies: &[&str]) -> Arc<ScriptedProvider> {
        Arc::new(ScriptedProvider::new(
            replies.iter().map(|r| Ok(r.to_string())).collect(),
        ))
    }

    #[tokio::test]
    async fn test_final_answer_returns_content_unmodified() {
        let answer = "  The answer is:\n\t55 ✓  ";
        let reply = serde_json::json!({"thought": "easy", "action": "FINAL_ANSWER", "content": answer})
            .to_string();
        let provider = script(&[&reply]);
        let executor = Arc::new(RecordingExecutor::new("unused"));

        let result = agent(&provider, &executor).run("what?").await.unwrap();

        assert_eq!(result.outcome, RunOutcome::FinalAnswer(answer.to_string()));
        assert_eq!(result.outcome.answer(), Some(answer));
        assert_eq!(result.steps, 1);
        assert_eq!(provider.requests().len(), 1);
        assert!(executor.codes().is_empty());
    }

    #[tokio::test]
    async fn test_conversation_starts_with_system_then_query() {
        let provider = script(&[FINAL_55]);
        let executor = Arc::new(RecordingExecutor::new("unused"));
        let config = AgentConfig {
            agent_prompt: "agent persona".into(),
            ..AgentConfig::default()
        };

        let result = Agent::with_config(provider.clone(), executor, config)
            .run("compute the 10th Fibonacci number")
            .await
            .unwrap();

        let requests = provider.requests();
        let first_request = &requests[0].messages;
        assert_eq!(first_request.len(), 2);
        assert_eq!(first_request[0], ChatMessage::system("agent persona"));
        assert_eq!(first_request[1], ChatMessage::user("compute the 10th Fibonacci number"));

        let messages = result.conversation.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2], ChatMessage::agent(FINAL_55));
    }

    #[tokio::test]
    async fn test_fibonacci_end_to_end() {
        let provider = script(&[
            r#"{"thought":"need code","action":"CREATE_TOOL","content":"compute 10th fibonacci number"}"#,
            "```python\ndef fib(n):\n    a, b = 0, 1\n    for _ in range(n):\n        a, b = b, a + b\n    return a\nprint(fib(10))\n```",
            FINAL_55,
        ]);
        let executor = Arc::new(RecordingExecutor::new("55"));

        let result = agent(&provider, &executor)
            .run("compute the 10th Fibonacci number")
            .await
            .unwrap();

        assert_eq!(result.outcome, RunOutcome::FinalAnswer("55".into()));
        assert_eq!(result.steps, 2);

        let codes = executor.codes();
        assert_eq!(codes.len(), 1);
        assert!(codes[0].starts_with("def fib(n):"));
        assert!(codes[0].ends_with("print(fib(10))"));

        let requests = provider.requests();
        assert_eq!(requests.len(), 3);
        let coder_messages = &requests[1].messages;
        assert_eq!(coder_messages[0].content, prompts::CODER_SYSTEM_PROMPT);
        assert_eq!(coder_messages[1].content, "Requirement: compute 10th fibonacci number");

        let roles: Vec<Role> = result.conversation.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Agent, Role::User, Role::Agent]);
        let observation = &result.conversation.messages()[3].content;
        assert!(observation.starts_with("Observation:"));
        assert!(observation.contains("55"));
        assert_eq!(requests[2].messages.last().unwrap().content, *observation);
    }

    #[tokio::test]
    async fn test_create_tool_runs_coder_and_sandbox_once_before_next_prompt() {
        let events = EventLog::default();
        let provider = Arc::new(ScriptedProvider::with_log(
            vec![
                Ok(r#"{"action":"CREATE_TOOL","content":"a"}"#.into()),
                Ok("print(1)".into()),
                Ok(r#"{"action":"CREATE_TOOL","content":"b"}"#.into()),
                Ok("print(2)".into()),
                Ok(FINAL_55.into()),
            ],
            events.clone(),
        ));
        let executor = Arc::new(RecordingExecutor::with_log("ok", events.clone()));

        agent(&provider, &executor).run("q").await.unwrap();

        assert_eq!(
            provider.events(),
            vec![
                Event::Complete,
                Event::Complete,
                Event::Execute,
                Event::Complete,
                Event::Complete,
                Event::Execute,
                Event::Complete,
            ]
        );
        assert_eq!(executor.codes(), vec!["print(1)".to_string(), "print(2)".to_string()]);
    }

    #[tokio::test]
    async fn test_unparsable_response_appends_one_corrective_message() {
        let provider = script(&["I think I should write some code first.", FINAL_55]);
        let executor = Arc::new(RecordingExecutor::new("unused"));

        let result = agent(&provider, &executor).run("q").await.unwrap();

        assert_eq!(result.outcome, RunOutcome::FinalAnswer("55".into()));
        assert_eq!(result.steps, 2);
        let messages = result.conversation.messages();
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[2], ChatMessage::agent("I think I should write some code first."));
        assert_eq!(messages[3], ChatMessage::user(prompts::PARSE_RETRY_MESSAGE));
    }

    #[tokio::test]
    async fn test_unsupported_action_is_corrected() {
        let provider = script(&[
            r#"{"thought":"search","action":"WEB_SEARCH","content":"fibonacci"}"#,
            r#"{"thought":"hmm","content":"no action"}"#,
            FINAL_55,
        ]);
        let executor = Arc::new(RecordingExecutor::new("unused"));

        let result = agent(&provider, &executor).run("q").await.unwrap();

        let messages = result.conversation.messages();
        assert_eq!(messages[3], ChatMessage::user(prompts::unsupported_action_message("WEB_SEARCH")));
        assert_eq!(messages[5], ChatMessage::user(prompts::unsupported_action_message("")));
        assert_eq!(result.steps, 3);
        assert!(executor.codes().is_empty());
    }

    #[tokio::test]
    async fn test_budget_exhaustion_terminates() {
        let provider = Arc::new(ScriptedProvider::repeating("not json", 100));
        let executor = Arc::new(RecordingExecutor::new("unused"));

        let result = agent(&provider, &executor).run("q").await.unwrap();

        assert_eq!(result.outcome, RunOutcome::BudgetExhausted { max_steps: DEFAULT_MAX_STEPS });
        assert_eq!(result.outcome.answer(), None);
        assert_eq!(result.steps, DEFAULT_MAX_STEPS);
        assert_eq!(provider.requests().len(), DEFAULT_MAX_STEPS);
        assert_eq!(result.conversation.len(), 2 + 2 * DEFAULT_MAX_STEPS);
    }

    #[tokio::test]
    async fn test_budget_counts_tool_steps() {
        let provider = Arc::new(ScriptedProvider::new(
            (0..3)
                .flat_map(|_| {
                    [
                        Ok(r#"{"action":"CREATE_TOOL","content":"again"}"#.to_string()),
                        Ok("print(0)".to_string()),
                    ]
                })
                .collect(),
        ));
        let executor = Arc::new(RecordingExecutor::new("0"));
        let config = AgentConfig {
            max_steps: 3,
            ..AgentConfig::default()
        };

        let result = Agent::with_config(provider.clone(), executor.clone(), config)
            .run("q")
            .await
            .unwrap();

        assert_eq!(result.outcome, RunOutcome::BudgetExhausted { max_steps: 3 });
        assert_eq!(executor.codes().len(), 3);
        assert_eq!(provider.requests().len(), 6);
    }

    #[tokio::test]
    async fn test_model_failure_aborts_run() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok("garbage".into()),
            Err(ProviderError::Network("connection refused".into())),
        ]));
        let executor = Arc::new(RecordingExecutor::new("unused"));

        let err = agent(&provider, &executor).run("q").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NetworkFailed);
        assert_eq!(err.operation(), "agent::run");
        assert!(err.context().iter().any(|(k, v)| *k == "step" && v == "2"));
        assert_eq!(provider.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_coder_failure_aborts_run() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(r#"{"action":"CREATE_TOOL","content":"x"}"#.into()),
            Err(ProviderError::AuthenticationFailed),
        ]));
        let executor = Arc::new(RecordingExecutor::new("unused"));

        let err = agent(&provider, &executor).run("q").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::AuthenticationFailed);
        assert_eq!(err.operation(), "agent::run");
        assert!(err.context().iter().any(|(k, v)| *k == "called" && v == "coder::generate_code"));
        assert!(executor.codes().is_empty());
    }

    #[tokio::test]
    async fn test_execution_failure_becomes_observation() {
        let provider = script(&[
            r#"{"action":"CREATE_TOOL","content":"divide"}"#,
            "print(1/0)",
            r#"{"action":"FINAL_ANSWER","content":"cannot divide by zero"}"#,
        ]);
        let executor = Arc::new(RecordingExecutor::new(
            "Runtime Error: division by zero\nTraceback (most recent call last):",
        ));

        let result = agent(&provider, &executor).run("q").await.unwrap();

        assert_eq!(result.outcome.answer(), Some("cannot divide by zero"));
        assert!(result.conversation.messages()[3].content.contains("division by zero"));
    }

    #[tokio::test]
    async fn test_json_mode_only_applies_to_decisions() {
        let provider = script(&[
            r#"{"action":"CREATE_TOOL","content":"x"}"#,
            "print(1)",
            FINAL_55,
        ]);
        let executor = Arc::new(RecordingExecutor::new("1"));
        let config = AgentConfig {
            json_mode: true,
            temperature: Some(0.1),
            ..AgentConfig::default()
        };

        Agent::with_config(provider.clone(), executor, config)
            .run("q")
            .await
            .unwrap();

        let requests = provider.requests();
        assert_eq!(requests[0].response_format, ResponseFormat::JsonObject);
        assert_eq!(requests[1].response_format, ResponseFormat::Text);
        assert_eq!(requests[2].response_format, ResponseFormat::JsonObject);
        assert!(requests.iter().all(|r| r.temperature == Some(0.1)));
    }

    #[tokio::test]
    async fn test_runs_do_not_share_history() {
        let provider = script(&[FINAL_55, FINAL_55]);
        let executor = Arc::new(RecordingExecutor::new("unused"));
        let agent = agent(&provider, &executor);

        agent.run("first").await.unwrap();
        let second = agent.run("second").await.unwrap();

        assert_eq!(second.conversation.len(), 3);
        assert_eq!(provider.requests()[1].messages[1].content, "second");
    }
}
