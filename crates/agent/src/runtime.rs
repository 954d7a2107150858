use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use mall_core::config::{AppConfig, ResolverConfig};
use mall_core::domain::inventory::InventoryItem;
use mall_core::domain::store::{Coordinates, ResolvedStore, StoreCategory, StoreHandle};
use mall_core::errors::ResolutionError;
use mall_core::oracle::{QueryExecutor, QueryOracleAdapter};
use mall_core::schema::SchemaRegistry;
use mall_core::session::{SessionId, SessionStore};
use mall_core::summary::{format_guide_answer, SummaryFormatter};
use tracing::info;

use crate::decomposer::{LlmRequestDecomposer, RequestDecomposer};
use crate::llm::{HttpLlmClient, LlmClient};
use crate::prompts::PromptTemplates;
use crate::resolver::{InventoryResolver, StoreResolver};
use crate::translator::LlmTextToQuery;

/// Entry point for the dialogue/transport layer.
///
/// Resolution inside one session is sequential: store, then position, then
/// inventory. Distinct sessions share nothing but the read-only oracle.
pub struct ResolutionRuntime {
    stores: StoreResolver,
    inventory: InventoryResolver,
    sessions: Arc<dyn SessionStore>,
    formatter: SummaryFormatter,
}

impl ResolutionRuntime {
    pub fn new(
        oracle: QueryOracleAdapter,
        sessions: Arc<dyn SessionStore>,
        registry: SchemaRegistry,
        policy: ResolverConfig,
    ) -> Self {
        Self {
            stores: StoreResolver::new(oracle.clone(), sessions.clone(), registry.clone()),
            inventory: InventoryResolver::new(oracle, sessions.clone(), registry.clone(), policy),
            sessions,
            formatter: SummaryFormatter::new(registry),
        }
    }

    /// Wires the LLM-backed translator (and decomposer, when enabled) over
    /// `executor`, bounding every oracle round trip by `oracle.timeout_secs`.
    pub fn from_config(
        config: &AppConfig,
        executor: Arc<dyn QueryExecutor>,
        sessions: Arc<dyn SessionStore>,
    ) -> Result<Self> {
        let registry = SchemaRegistry::default();
        let llm: Arc<dyn LlmClient> = Arc::new(HttpLlmClient::from_config(&config.llm)?);
        let translator = LlmTextToQuery::new(
            llm.clone(),
            PromptTemplates::new().context("failed to load text-to-sql prompt")?,
            registry.clone(),
        );
        let oracle = QueryOracleAdapter::new(Arc::new(translator), executor)
            .with_deadline(Duration::from_secs(config.oracle.timeout_secs));

        let runtime = Self::new(oracle, sessions, registry, config.resolver.clone());
        if !config.resolver.decompose_requests {
            return Ok(runtime);
        }

        let decomposer = LlmRequestDecomposer::new(
            llm,
            PromptTemplates::new().context("failed to load decomposition prompt")?,
        );
        Ok(runtime.with_decomposer(Arc::new(decomposer)))
    }

    pub fn with_decomposer(mut self, decomposer: Arc<dyn RequestDecomposer>) -> Self {
        self.inventory = self.inventory.with_decomposer(decomposer);
        self
    }

    pub async fn resolve_store(
        &self,
        buyer_request: &str,
        session_id: &SessionId,
    ) -> Result<StoreHandle, ResolutionError> {
        self.stores.resolve_store(buyer_request, session_id).await
    }

    /// Store resolved earlier in this session, if any.
    pub async fn resolved_store(&self, session_id: &SessionId) -> Option<ResolvedStore> {
        self.sessions.get(session_id).await.and_then(|entry| entry.store)
    }

    pub async fn find_items(
        &self,
        buyer_request: &str,
        handle: StoreHandle,
        category: &StoreCategory,
        session_id: &SessionId,
    ) -> Vec<InventoryItem> {
        self.inventory.find_items(buyer_request, handle, category, session_id).await
    }

    pub fn format(&self, store: &ResolvedStore, items: &[InventoryItem]) -> String {
        self.formatter.format(store, items)
    }

    pub async fn store_coordinates(
        &self,
        handle: StoreHandle,
        session_id: &SessionId,
    ) -> Option<Coordinates> {
        self.stores.store_coordinates(handle, session_id).await
    }

    /// Full seller grounding: store header, position, then matching items.
    pub async fn stock_context(
        &self,
        buyer_request: &str,
        session_id: &SessionId,
    ) -> Result<String, ResolutionError> {
        let store = self.stores.resolve(buyer_request, session_id).await?;
        let coordinates = self.stores.store_coordinates(store.handle, session_id).await;
        let items = self
            .inventory
            .find_items(buyer_request, store.handle, &store.category, session_id)
            .await;
        Ok(self.formatter.format_stock_context(&store, coordinates, &items))
    }

    /// Where the store serving the request is, for the guide dialogue.
    pub async fn guide_answer(
        &self,
        buyer_request: &str,
        session_id: &SessionId,
    ) -> Result<String, ResolutionError> {
        let store = self.stores.resolve(buyer_request, session_id).await?;
        let coordinates = self.stores.store_coordinates(store.handle, session_id).await;
        Ok(format_guide_answer(&store, coordinates))
    }

    /// Session start or restart: cached resolutions are forgotten.
    pub async fn clear_session(&self, session_id: &SessionId) {
        self.sessions.clear(session_id).await;
        info!(event_name = "session.cleared", session_id = %session_id, "session cache cleared");
    }

    /// Disconnect: the session entry is dropped.
    pub async fn end_session(&self, session_id: &SessionId) {
        self.sessions.remove(session_id).await;
        info!(event_name = "session.ended", session_id = %session_id, "session cache removed");
    }
}
