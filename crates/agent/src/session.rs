//! Orchestrator and per-request sessions.
//!
//! The [`Orchestrator`] holds everything shared across requests: provider,
//! store, discovery and settings. A [`Session`] carries the mutable state of
//! one conversation (active identity and its memory snapshots) and is never
//! shared between requests.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use questweaver_config::AppConfig;
use questweaver_core::event::{DomainEvent, EventBus};
use questweaver_core::identity::{UserGuid, is_guid};
use questweaver_core::memory::MemoryStore;
use questweaver_core::provider::Provider;
use questweaver_core::tool::ToolRegistry;
use questweaver_tools::Discovery;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::context::{ConversationAssembler, Persona};
use crate::identity::{IdentitySources, guid_from_history, resolve};
use crate::loop_runner::{DispatchLoop, DispatchResult};
use crate::memory_context::MemoryContext;

pub const WORLD_INIT_NARRATIVE: &str = "Game world initialized. Your adventure awaits!";

/// One incoming turn.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TurnRequest {
    #[serde(default)]
    pub user_input: String,

    /// Raw history entries, any shape
    #[serde(default)]
    pub conversation_history: Vec<Value>,

    #[serde(default)]
    pub user_guid: Option<String>,
}

impl TurnRequest {
    pub fn new(user_input: impl Into<String>) -> Self {
        Self {
            user_input: user_input.into(),
            ..Self::default()
        }
    }

    pub fn with_history(mut self, history: Vec<Value>) -> Self {
        self.conversation_history = history;
        self
    }

    pub fn with_user_guid(mut self, guid: impl Into<String>) -> Self {
        self.user_guid = Some(guid.into());
        self
    }
}

/// The result of a turn and the identity it ran under.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub result: DispatchResult,
    pub user_guid: UserGuid,
}

/// Shared, immutable orchestration state.
pub struct Orchestrator {
    provider: Arc<dyn Provider>,
    store: Arc<dyn MemoryStore>,
    discovery: Discovery,
    event_bus: Arc<EventBus>,
    assembler: ConversationAssembler,
    model: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
    retry_delay: Duration,
    memory_budget: usize,
    discovery_ttl: Duration,
    cached_registry: Mutex<Option<(Instant, Arc<ToolRegistry>)>>,
}

impl Orchestrator {
    /// Build from configuration. Discovery uses the bundled agents plus the
    /// store's artifact namespaces.
    pub fn new(provider: Arc<dyn Provider>, store: Arc<dyn MemoryStore>, config: &AppConfig) -> Self {
        let discovery =
            Discovery::new(store.clone(), config.storage.resolved_scratch_dir()).with_default_agents();
        let persona = Persona::new(
            config.persona.assistant_name.clone(),
            config.persona.characteristic_description.clone(),
        );
        let orchestrator = &config.orchestrator;

        Self {
            provider,
            store,
            discovery,
            event_bus: Arc::new(EventBus::default()),
            assembler: ConversationAssembler::new(persona, orchestrator.history_limit),
            model: config.default_model.clone(),
            temperature: config.default_temperature,
            max_tokens: config.default_max_tokens,
            max_retries: orchestrator.max_retries,
            retry_delay: Duration::from_millis(orchestrator.retry_delay_ms),
            memory_budget: orchestrator.memory_budget_chars,
            discovery_ttl: Duration::from_secs(orchestrator.discovery_ttl_secs),
            cached_registry: Mutex::new(None),
        }
    }

    pub fn with_discovery(mut self, discovery: Discovery) -> Self {
        self.discovery = discovery;
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        self.event_bus.clone()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// The tool registry, rediscovered unless a cached one is younger than
    /// the discovery TTL.
    pub async fn registry(&self) -> Arc<ToolRegistry> {
        let mut cached = self.cached_registry.lock().await;
        if let Some((built, registry)) = cached.as_ref()
            && built.elapsed() < self.discovery_ttl
        {
            debug!(tools = registry.len(), "Using cached tool registry");
            return registry.clone();
        }

        let registry = Arc::new(self.discovery.discover().await);
        info!(tools = registry.len(), names = ?registry.names(), "Tool registry discovered");
        if !self.discovery_ttl.is_zero() {
            *cached = Some((Instant::now(), registry.clone()));
        }
        registry
    }

    /// Start a session with a freshly resolved registry and no identity.
    pub async fn session(&self) -> Session<'_> {
        Session {
            orchestrator: self,
            registry: self.registry().await,
            active: None,
            memory: MemoryContext::default(),
        }
    }

    /// Run a single stateless turn.
    pub async fn respond(&self, request: TurnRequest) -> TurnOutcome {
        self.session().await.turn(request).await
    }

    fn dispatch_loop(&self, registry: Arc<ToolRegistry>) -> DispatchLoop {
        DispatchLoop::new(self.provider.clone(), registry, self.event_bus.clone())
            .with_model(self.model.clone())
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
            .with_max_retries(self.max_retries)
            .with_retry_delay(self.retry_delay)
    }
}

/// Conversation state for one caller.
pub struct Session<'a> {
    orchestrator: &'a Orchestrator,
    registry: Arc<ToolRegistry>,
    active: Option<UserGuid>,
    memory: MemoryContext,
}

impl Session<'_> {
    pub fn active_user(&self) -> Option<&UserGuid> {
        self.active.as_ref()
    }

    pub fn memory(&self) -> &MemoryContext {
        &self.memory
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Resolve identity, refresh memory if it changed, then either
    /// acknowledge an identity-only utterance or run the dispatch loop.
    pub async fn turn(&mut self, request: TurnRequest) -> TurnOutcome {
        let orchestrator = self.orchestrator;
        let history = orchestrator.assembler.prepare_history(request.conversation_history);
        let history_guid = guid_from_history(&history);

        let user = resolve(IdentitySources {
            history: history_guid.as_ref(),
            explicit: request.user_guid.as_deref(),
            utterance: &request.user_input,
            active: self.active.as_ref(),
        });
        self.activate(&user).await;

        let utterance = request.user_input.trim();
        if is_guid(utterance) && user.matches(utterance) {
            info!(user_guid = %user, "Identity-only utterance, world initialized");
            return TurnOutcome {
                result: world_init(),
                user_guid: user,
            };
        }

        let messages = orchestrator.assembler.assemble(
            &history,
            &self.memory,
            &self.registry.definitions(),
            &request.user_input,
        );
        let result = orchestrator
            .dispatch_loop(self.registry.clone())
            .run(messages, &user)
            .await;

        TurnOutcome { result, user_guid: user }
    }

    async fn activate(&mut self, user: &UserGuid) {
        if self.active.as_ref() == Some(user) {
            return;
        }

        let orchestrator = self.orchestrator;
        self.memory = MemoryContext::load(orchestrator.store.as_ref(), user, orchestrator.memory_budget).await;
        self.active = Some(user.clone());
        info!(user_guid = %user, "Switched active identity");
        orchestrator.event_bus.publish(DomainEvent::ContextSwitched {
            user_guid: user.to_string(),
            timestamp: Utc::now(),
        });
    }
}

fn world_init() -> DispatchResult {
    DispatchResult {
        narrative: WORLD_INIT_NARRATIVE.to_string(),
        game_data: json!({"event": "world_init", "status": "ready"}).to_string(),
        agent_logs: Vec::new(),
    }
}
