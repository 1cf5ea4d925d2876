//! The dispatch loop: model call, optional tool execution, follow-up call.
//!
//! ```text
//! ASSEMBLED → CALLING_MODEL ─┬─ no tool ─────────────────────────────→ DONE
//!                ▲           └─ tool → TOOL_EXECUTED ─┬─ follow-up ──→ DONE
//!                │                                    └─ needs more ─┐
//!                ├────────────────────────────────────────────────────┘
//!                └── RETRY ← ERROR (provider failure, budget left)
//! ```
//!
//! Provider failures and tool chains both spend the attempt budget; when it
//! runs out the turn ends with a fixed unavailability message.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use questweaver_core::event::{DomainEvent, EventBus};
use questweaver_core::identity::UserGuid;
use questweaver_core::message::{ConversationTurn, FunctionCall};
use questweaver_core::provider::{Provider, ProviderRequest, ToolDefinition};
use questweaver_core::tool::{ToolRegistry, is_identity_sensitive};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::args::parse_arguments;
use crate::codec::{decode, empty_object};

pub const SERVICE_UNAVAILABLE: &str = "Service temporarily unavailable. Please try again later.";
pub const AGENT_COMPLETED: &str = "Agent completed successfully";

/// What a turn produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchResult {
    /// Player-facing prose
    pub narrative: String,

    /// Structured payload for the client, always serialized JSON
    pub game_data: String,

    /// One entry per tool execution
    pub agent_logs: Vec<String>,
}

impl DispatchResult {
    /// A result with no game data and no logs.
    pub fn terminal(narrative: impl Into<String>) -> Self {
        Self {
            narrative: narrative.into(),
            game_data: empty_object().to_string(),
            agent_logs: Vec::new(),
        }
    }

    fn decoded(content: &str, agent_logs: Vec<String>) -> Self {
        let (narrative, game_data) = decode(content);
        Self {
            narrative,
            game_data: game_data.to_string(),
            agent_logs,
        }
    }

    pub fn agent_logs_joined(&self) -> String {
        self.agent_logs.join("\n")
    }
}

enum ToolStep {
    /// Result appended; ask the model again without a follow-up
    NeedsMore,
    /// Result appended; make the follow-up call
    Complete,
    /// The turn is over
    Terminal(DispatchResult),
}

/// Drives one turn against a provider and a tool registry.
pub struct DispatchLoop {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    event_bus: Arc<EventBus>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    max_retries: u32,
    retry_delay: Duration,
}

impl DispatchLoop {
    pub fn new(provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>, event_bus: Arc<EventBus>) -> Self {
        Self {
            provider,
            tools,
            event_bus,
            model: "gpt-4o".into(),
            temperature: 0.7,
            max_tokens: None,
            max_retries: 3,
            retry_delay: Duration::from_secs(2),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Total attempt budget per turn. Clamped to at least one.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Run a turn. Never fails: every failure mode maps to a result.
    pub async fn run(&self, mut messages: Vec<ConversationTurn>, user: &UserGuid) -> DispatchResult {
        let functions = self.tools.definitions();
        let mut agent_logs = Vec::new();
        let mut attempts: u32 = 0;

        loop {
            if attempts >= self.max_retries {
                return self.exhausted(attempts);
            }

            let reply = match self.call_model(&messages, &functions, attempts).await {
                Ok(reply) => reply,
                Err(reason) => match self.schedule_retry(&mut attempts, reason).await {
                    Some(result) => return result,
                    None => continue,
                },
            };

            let Some(call) = reply.function_call.clone() else {
                debug!(attempt = attempts + 1, "Direct model reply");
                return DispatchResult::decoded(&reply.content, agent_logs);
            };

            match self.execute_tool(&call, &reply.content, user, &mut messages, &mut agent_logs).await {
                ToolStep::Terminal(result) => return result,
                ToolStep::NeedsMore => {
                    attempts += 1;
                    debug!(tool = %call.name, attempt = attempts, "Tool asked for another model pass");
                    continue;
                }
                ToolStep::Complete => {}
            }

            match self.call_model(&messages, &functions, attempts).await {
                Ok(follow_up) => {
                    info!(tool = %call.name, logs = agent_logs.len(), "Turn complete after tool call");
                    return DispatchResult::decoded(&follow_up.content, agent_logs);
                }
                Err(reason) => {
                    if let Some(result) = self.schedule_retry(&mut attempts, reason).await {
                        return result;
                    }
                }
            }
        }
    }

    async fn call_model(
        &self,
        messages: &[ConversationTurn],
        functions: &[ToolDefinition],
        attempts: u32,
    ) -> Result<ConversationTurn, String> {
        self.event_bus.publish(DomainEvent::ModelCalled {
            attempt: attempts + 1,
            model: self.model.clone(),
            tools_offered: functions.len(),
            timestamp: Utc::now(),
        });

        let request = ProviderRequest {
            model: self.model.clone(),
            messages: messages.to_vec(),
            functions: functions.to_vec(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        match self.provider.complete(request).await {
            Ok(response) => {
                if let Some(usage) = &response.usage {
                    debug!(
                        prompt_tokens = usage.prompt_tokens,
                        completion_tokens = usage.completion_tokens,
                        "Model replied"
                    );
                }
                Ok(response.message)
            }
            Err(e) => Err(e.to_string()),
        }
    }

    /// Count a failed call. Returns the terminal result when the budget is
    /// spent, otherwise sleeps and returns `None`.
    async fn schedule_retry(&self, attempts: &mut u32, reason: String) -> Option<DispatchResult> {
        *attempts += 1;
        if *attempts >= self.max_retries {
            error!(attempt = *attempts, error = %reason, "Model call failed, no attempts left");
            return Some(self.exhausted(*attempts));
        }

        let delay_ms = u64::try_from(self.retry_delay.as_millis()).unwrap_or(u64::MAX);
        warn!(attempt = *attempts, delay_ms, error = %reason, "Model call failed, retrying");
        self.event_bus.publish(DomainEvent::RetryScheduled {
            attempt: *attempts,
            delay_ms,
            error_message: reason,
            timestamp: Utc::now(),
        });
        tokio::time::sleep(self.retry_delay).await;
        None
    }

    async fn execute_tool(
        &self,
        call: &FunctionCall,
        content: &str,
        user: &UserGuid,
        messages: &mut Vec<ConversationTurn>,
        agent_logs: &mut Vec<String>,
    ) -> ToolStep {
        let Some(tool) = self.tools.get(&call.name) else {
            warn!(tool = %call.name, "Model selected an unknown agent");
            return ToolStep::Terminal(self.failed(format!("Agent '{}' does not exist", call.name)));
        };

        let mut arguments = parse_arguments(&call.arguments);
        if is_identity_sensitive(tool) {
            arguments.insert("user_guid".into(), Value::String(user.to_string()));
        }

        debug!(tool = %call.name, user_guid = %user, args = arguments.len(), "Executing agent");
        let started = Instant::now();
        let outcome = tool.execute(arguments).await;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        self.event_bus.publish(DomainEvent::ToolExecuted {
            tool_name: call.name.clone(),
            success: outcome.is_ok(),
            duration_ms,
            timestamp: Utc::now(),
        });

        let output = match outcome {
            Ok(Some(output)) => output,
            Ok(None) => AGENT_COMPLETED.to_string(),
            Err(e) => {
                error!(tool = %call.name, error = %e, "Agent execution failed");
                return ToolStep::Terminal(self.failed(format!("Error executing agent: {e}")));
            }
        };

        info!(tool = %call.name, duration_ms, "Agent executed");
        agent_logs.push(format!("Performed {} and got result: {}", call.name, output));
        messages.push(ConversationTurn::assistant_call(content, &call.name, &call.arguments));
        messages.push(ConversationTurn::function(&call.name, &output));

        if needs_more(&output) {
            ToolStep::NeedsMore
        } else {
            ToolStep::Complete
        }
    }

    fn exhausted(&self, attempts: u32) -> DispatchResult {
        error!(attempts, max_retries = self.max_retries, "Attempt budget exhausted");
        self.failed(SERVICE_UNAVAILABLE)
    }

    fn failed(&self, reason: impl Into<String>) -> DispatchResult {
        let result = DispatchResult::terminal(reason);
        self.event_bus.publish(DomainEvent::TurnFailed {
            reason: result.narrative.clone(),
            timestamp: Utc::now(),
        });
        result
    }
}

/// Does a tool result ask for another model pass?
fn needs_more(output: &str) -> bool {
    let Ok(Value::Object(result)) = serde_json::from_str::<Value>(output) else {
        return false;
    };
    result.get("error").is_some_and(truthy)
        || result.get("status").and_then(Value::as_str) == Some("incomplete")
        || result.get("requires_additional_action") == Some(&Value::Bool(true))
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use questweaver_core::error::{ProviderError, ToolError};
    use questweaver_core::message::Role;
    use questweaver_core::provider::ProviderResponse;
    use questweaver_core::tool::{Tool, ToolArgs};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned replies and records every request.
    struct ScriptedProvider {
        replies: Mutex<VecDeque<Result<ConversationTurn, ProviderError>>>,
        requests: Mutex<Vec<ProviderRequest>>,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<Result<ConversationTurn, ProviderError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<ProviderRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            self.requests.lock().unwrap().push(request);
            let next = self.replies.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Err(ProviderError::Network("script exhausted".into())))
                .map(|message| ProviderResponse {
                    message,
                    usage: None,
                    model: "scripted".into(),
                })
        }
    }

    /// Returns queued outputs in order and records the arguments it saw.
    struct StubTool {
        name: &'static str,
        user_scoped: bool,
        outputs: Mutex<VecDeque<Result<Option<String>, ToolError>>>,
        seen: Mutex<Vec<ToolArgs>>,
    }

    impl StubTool {
        fn new(name: &'static str, outputs: Vec<Result<Option<String>, ToolError>>) -> Arc<Self> {
            Arc::new(Self {
                name,
                user_scoped: false,
                outputs: Mutex::new(outputs.into()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn scoped(name: &'static str, outputs: Vec<Result<Option<String>, ToolError>>) -> Arc<Self> {
            Arc::new(Self {
                name,
                user_scoped: true,
                outputs: Mutex::new(outputs.into()),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    struct Shared(Arc<StubTool>);

    #[async_trait]
    impl Tool for Shared {
        fn name(&self) -> &str {
            self.0.name
        }

        fn description(&self) -> &str {
            "stub agent"
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }

        fn user_scoped(&self) -> bool {
            self.0.user_scoped
        }

        async fn execute(&self, arguments: ToolArgs) -> Result<Option<String>, ToolError> {
            self.0.seen.lock().unwrap().push(arguments);
            self.0
                .outputs
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(Some("{}".into())))
        }
    }

    fn registry(tools: &[Arc<StubTool>]) -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        for tool in tools {
            registry.register(Box::new(Shared(tool.clone()))).unwrap();
        }
        Arc::new(registry)
    }

    fn call(name: &str, args: &str) -> Result<ConversationTurn, ProviderError> {
        Ok(ConversationTurn::assistant_call("", name, args))
    }

    fn reply(text: &str) -> Result<ConversationTurn, ProviderError> {
        Ok(ConversationTurn::assistant(text))
    }

    fn outage() -> Result<ConversationTurn, ProviderError> {
        Err(ProviderError::ApiError {
            status_code: 503,
            message: "overloaded".into(),
        })
    }

    fn dispatch(provider: Arc<ScriptedProvider>, tools: Arc<ToolRegistry>) -> DispatchLoop {
        DispatchLoop::new(provider, tools, Arc::new(EventBus::default()))
            .with_model("test-model")
            .with_retry_delay(Duration::ZERO)
    }

    fn start() -> Vec<ConversationTurn> {
        vec![ConversationTurn::system("prompt"), ConversationTurn::user("hello")]
    }

    #[tokio::test]
    async fn direct_reply_decoded() {
        let provider = ScriptedProvider::new(vec![reply(
            "The mists part.\n\n|||GAME_DATA|||\n{\"event\": \"reveal\"}",
        )]);
        let result = dispatch(provider.clone(), registry(&[])).run(start(), &UserGuid::fallback()).await;

        assert_eq!(result.narrative, "The mists part.");
        assert_eq!(result.game_data, r#"{"event":"reveal"}"#);
        assert!(result.agent_logs.is_empty());
        assert_eq!(provider.requests().len(), 1);
    }

    #[tokio::test]
    async fn request_carries_tools_and_settings() {
        let tool = StubTool::new("GameWorld", vec![]);
        let provider = ScriptedProvider::new(vec![reply("hi")]);
        dispatch(provider.clone(), registry(&[tool]))
            .with_temperature(0.2)
            .with_max_tokens(512)
            .run(start(), &UserGuid::fallback())
            .await;

        let request = &provider.requests()[0];
        assert_eq!(request.model, "test-model");
        assert_eq!(request.functions.len(), 1);
        assert_eq!(request.functions[0].name, "GameWorld");
        assert_eq!(request.max_tokens, Some(512));
        assert!((request.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(request.messages, start());
    }

    #[tokio::test]
    async fn tool_then_follow_up() {
        let tool = StubTool::new("GameWorld", vec![Ok(Some(r#"{"weather":"rain"}"#.into()))]);
        let provider = ScriptedProvider::new(vec![
            call("GameWorld", r#"{"action": "get_world_state"}"#),
            reply("Rain falls.\n|||GAME_DATA|||\n{\"weather\": \"rain\"}"),
        ]);
        let result = dispatch(provider.clone(), registry(&[tool])).run(start(), &UserGuid::fallback()).await;

        assert_eq!(result.narrative, "Rain falls.");
        assert_eq!(result.game_data, r#"{"weather":"rain"}"#);
        assert_eq!(
            result.agent_logs,
            vec![r#"Performed GameWorld and got result: {"weather":"rain"}"#.to_string()]
        );

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        let follow_up = &requests[1].messages;
        assert_eq!(follow_up.len(), 4);
        assert_eq!(follow_up[2].role, Role::Assistant);
        assert_eq!(follow_up[2].function_call.as_ref().map(|c| c.name.as_str()), Some("GameWorld"));
        assert_eq!(follow_up[3], ConversationTurn::function("GameWorld", r#"{"weather":"rain"}"#));
    }

    #[tokio::test]
    async fn unknown_tool_is_terminal() {
        let provider = ScriptedProvider::new(vec![call("DoesNotExist", "{}")]);
        let result = dispatch(provider.clone(), registry(&[])).run(start(), &UserGuid::fallback()).await;

        assert_eq!(result, DispatchResult::terminal("Agent 'DoesNotExist' does not exist"));
        assert_eq!(result.game_data, "{}");
        assert_eq!(provider.requests().len(), 1);
    }

    #[tokio::test]
    async fn tool_error_is_terminal_without_retry() {
        let tool = StubTool::new(
            "QuestGenerator",
            vec![Err(ToolError::ExecutionFailed {
                tool_name: "QuestGenerator".into(),
                reason: "no quests".into(),
            })],
        );
        let provider = ScriptedProvider::new(vec![call("QuestGenerator", "{}"), reply("unused")]);
        let result = dispatch(provider.clone(), registry(&[tool])).run(start(), &UserGuid::fallback()).await;

        assert!(result.narrative.starts_with("Error executing agent: "));
        assert!(result.narrative.contains("no quests"));
        assert_eq!(result.game_data, "{}");
        assert_eq!(provider.requests().len(), 1);
    }

    #[tokio::test]
    async fn empty_output_reported_as_completed() {
        let tool = StubTool::new("Silent", vec![Ok(None)]);
        let provider = ScriptedProvider::new(vec![call("Silent", "{}"), reply("Done.")]);
        let result = dispatch(provider, registry(&[tool])).run(start(), &UserGuid::fallback()).await;

        assert_eq!(result.agent_logs, vec!["Performed Silent and got result: Agent completed successfully"]);
    }

    #[tokio::test]
    async fn incomplete_result_loops_back() {
        let tool = StubTool::new(
            "QuestGenerator",
            vec![Ok(Some(r#"{"status": "incomplete"}"#.into())), Ok(Some(r#"{"quest": "Find the bell"}"#.into()))],
        );
        let provider = ScriptedProvider::new(vec![
            call("QuestGenerator", "{}"),
            call("QuestGenerator", r#"{"step": 2}"#),
            reply("A quest begins."),
        ]);
        let result = dispatch(provider.clone(), registry(&[tool])).run(start(), &UserGuid::fallback()).await;

        assert_eq!(result.narrative, "A quest begins.");
        assert_eq!(result.agent_logs.len(), 2);

        let requests = provider.requests();
        assert_eq!(requests.len(), 3);
        // second call sees the incomplete result
        let last = requests[1].messages.last().unwrap();
        assert_eq!(last.role, Role::Function);
        assert!(last.content.contains("incomplete"));
    }

    #[tokio::test]
    async fn incomplete_then_direct_reply() {
        let tool = StubTool::new("Scout", vec![Ok(Some(r#"{"requires_additional_action": true}"#.into()))]);
        let provider = ScriptedProvider::new(vec![call("Scout", "{}"), reply("You see nothing more.")]);
        let result = dispatch(provider.clone(), registry(&[tool])).run(start(), &UserGuid::fallback()).await;

        assert_eq!(result.narrative, "You see nothing more.");
        assert_eq!(provider.requests().len(), 2);
    }

    #[tokio::test]
    async fn endless_tool_chain_exhausts_budget() {
        let chained = (0..5).map(|_| Ok(Some(r#"{"error": "try again"}"#.to_string()))).collect();
        let tool = StubTool::new("Flaky", chained);
        let provider = ScriptedProvider::new((0..5).map(|_| call("Flaky", "{}")).collect());
        let result = dispatch(provider.clone(), registry(&[tool]))
            .with_max_retries(3)
            .run(start(), &UserGuid::fallback())
            .await;

        assert_eq!(result, DispatchResult::terminal(SERVICE_UNAVAILABLE));
        assert_eq!(provider.requests().len(), 3);
    }

    #[tokio::test]
    async fn transient_failure_retried() {
        let provider = ScriptedProvider::new(vec![outage(), reply("Back online.")]);
        let bus = Arc::new(EventBus::default());
        let mut events = bus.subscribe();
        let result = DispatchLoop::new(provider.clone(), registry(&[]), bus)
            .with_retry_delay(Duration::ZERO)
            .run(start(), &UserGuid::fallback())
            .await;

        assert_eq!(result.narrative, "Back online.");
        assert_eq!(provider.requests().len(), 2);

        let mut retries = 0;
        while let Ok(event) = events.try_recv() {
            if let DomainEvent::RetryScheduled { attempt, .. } = event.as_ref() {
                assert_eq!(*attempt, 1);
                retries += 1;
            }
        }
        assert_eq!(retries, 1);
    }

    #[tokio::test]
    async fn three_failures_exhaust() {
        let provider = ScriptedProvider::new(vec![outage(), outage(), outage(), reply("too late")]);
        let result = dispatch(provider.clone(), registry(&[]))
            .with_max_retries(3)
            .run(start(), &UserGuid::fallback())
            .await;

        assert_eq!(result.narrative, SERVICE_UNAVAILABLE);
        assert_eq!(result.game_data, "{}");
        assert!(result.agent_logs.is_empty());
        assert_eq!(provider.requests().len(), 3);
    }

    #[tokio::test]
    async fn follow_up_failure_retries_with_tool_result() {
        let tool = StubTool::new("GameWorld", vec![Ok(Some(r#"{"time_of_day": 14}"#.into()))]);
        let provider = ScriptedProvider::new(vec![call("GameWorld", "{}"), outage(), reply("Afternoon.")]);
        let result = dispatch(provider.clone(), registry(&[tool])).run(start(), &UserGuid::fallback()).await;

        assert_eq!(result.narrative, "Afternoon.");
        let requests = provider.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[2].messages.last().unwrap().role, Role::Function);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_waits_fixed_delay() {
        let provider = ScriptedProvider::new(vec![outage(), outage(), reply("ok")]);
        let started = tokio::time::Instant::now();
        let result = DispatchLoop::new(provider, registry(&[]), Arc::new(EventBus::default()))
            .with_retry_delay(Duration::from_millis(2000))
            .run(start(), &UserGuid::fallback())
            .await;

        assert_eq!(result.narrative, "ok");
        assert!(started.elapsed() >= Duration::from_millis(4000));
    }

    #[tokio::test]
    async fn user_scoped_tools_receive_identity() {
        let scoped = StubTool::scoped("Journal", vec![]);
        let listed = StubTool::new("ManageMemory", vec![]);
        let plain = StubTool::new("Dice", vec![]);
        let user = UserGuid::parse("123e4567-e89b-12d3-a456-426614174000").unwrap();

        for (tool, expect_guid) in [(&scoped, true), (&listed, true), (&plain, false)] {
            let provider = ScriptedProvider::new(vec![
                call(tool.name, r#"{"user_guid": "someone-else", "x": null}"#),
                reply("ok"),
            ]);
            dispatch(provider, registry(&[tool.clone()])).run(start(), &user).await;

            let seen = tool.seen.lock().unwrap();
            assert_eq!(seen[0]["x"], json!(""));
            if expect_guid {
                assert_eq!(seen[0]["user_guid"], json!(user.as_str()), "{}", tool.name);
            } else {
                assert_eq!(seen[0]["user_guid"], json!("someone-else"));
            }
        }
    }

    #[tokio::test]
    async fn malformed_arguments_still_execute() {
        let tool = StubTool::new("Dice", vec![]);
        let provider = ScriptedProvider::new(vec![call("Dice", "{'sides': 20,}"), reply("You rolled.")]);
        dispatch(provider, registry(&[tool.clone()])).run(start(), &UserGuid::fallback()).await;

        assert_eq!(tool.seen.lock().unwrap()[0]["sides"], json!(20));
    }

    #[test]
    fn needs_more_signals() {
        assert!(needs_more(r#"{"error": "boom"}"#));
        assert!(needs_more(r#"{"status": "incomplete"}"#));
        assert!(needs_more(r#"{"requires_additional_action": true}"#));
        assert!(!needs_more(r#"{"error": ""}"#));
        assert!(!needs_more(r#"{"error": null}"#));
        assert!(!needs_more(r#"{"status": "success"}"#));
        assert!(!needs_more(r#"{"requires_additional_action": "yes"}"#));
        assert!(!needs_more("plain text"));
        assert!(!needs_more(r#"["error"]"#));
    }

    #[test]
    fn logs_join_with_newlines() {
        let result = DispatchResult {
            narrative: String::new(),
            game_data: "{}".into(),
            agent_logs: vec!["a".into(), "b".into()],
        };
        assert_eq!(result.agent_logs_joined(), "a\nb");
    }
}
