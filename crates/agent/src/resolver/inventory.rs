//! Schema-aware inventory lookup with a sequential fallback waterfall.
//!
//! The in-stock snapshot is taken first and cached. Stages then run in the
//! configured order; the first non-empty stage wins and its items (or an empty
//! list when every stage comes back dry) are cached per session and category.

use std::sync::Arc;

use mall_core::config::{FallbackStage, ResolverConfig};
use mall_core::domain::inventory::InventoryItem;
use mall_core::domain::store::{StoreCategory, StoreHandle};
use mall_core::oracle::QueryOracleAdapter;
use mall_core::schema::{Schema, SchemaRegistry};
use mall_core::session::{SessionId, SessionStore, SessionUpdate};
use tracing::{debug, info};

use super::decode_items;
use crate::decomposer::RequestDecomposer;
use crate::instructions::{self, PriceBand};

pub struct InventoryResolver {
    oracle: QueryOracleAdapter,
    sessions: Arc<dyn SessionStore>,
    registry: SchemaRegistry,
    policy: ResolverConfig,
    decomposer: Option<Arc<dyn RequestDecomposer>>,
}

struct Lookup<'a> {
    buyer_request: &'a str,
    handle: StoreHandle,
    category: &'a StoreCategory,
    schema: Schema,
    snapshot: Vec<InventoryItem>,
}

impl InventoryResolver {
    pub fn new(
        oracle: QueryOracleAdapter,
        sessions: Arc<dyn SessionStore>,
        registry: SchemaRegistry,
        policy: ResolverConfig,
    ) -> Self {
        Self { oracle, sessions, registry, policy, decomposer: None }
    }

    pub fn with_decomposer(mut self, decomposer: Arc<dyn RequestDecomposer>) -> Self {
        self.decomposer = Some(decomposer);
        self
    }

    pub fn policy(&self) -> &ResolverConfig {
        &self.policy
    }

    /// Never fails; an empty list means nothing matched or could be suggested.
    pub async fn find_items(
        &self,
        buyer_request: &str,
        handle: StoreHandle,
        category: &StoreCategory,
        session_id: &SessionId,
    ) -> Vec<InventoryItem> {
        if let Some(entry) = self.sessions.get(session_id).await {
            if let Some(items) = entry.matching_items(category) {
                debug!(
                    event_name = "inventory.cache_hit",
                    session_id = %session_id,
                    category = %category,
                    row_count = items.len(),
                    "returning cached inventory"
                );
                return items.to_vec();
            }
        }

        let schema = self.registry.columns_for(category);
        let snapshot_instruction = instructions::in_stock_snapshot(handle, &schema);
        let snapshot = self.search_items(&snapshot_instruction, &schema, category).await;
        let update = SessionUpdate::Snapshot { category: category.clone(), items: snapshot.clone() };
        self.sessions.set(session_id, update).await;

        let lookup = Lookup { buyer_request, handle, category, schema, snapshot };
        let mut items = Vec::new();
        for stage in &self.policy.stages {
            items = self.run_stage(*stage, &lookup).await;
            info!(
                event_name = "inventory.stage.completed",
                session_id = %session_id,
                store_handle = handle.0,
                stage = stage.as_str(),
                row_count = items.len(),
                "fallback stage finished"
            );
            if !items.is_empty() {
                break;
            }
        }

        let update = SessionUpdate::MatchingItems { category: category.clone(), items: items.clone() };
        self.sessions.set(session_id, update).await;
        items
    }

    async fn run_stage(&self, stage: FallbackStage, lookup: &Lookup<'_>) -> Vec<InventoryItem> {
        match stage {
            FallbackStage::ExactFilter => {
                let instruction =
                    instructions::exact_filter(lookup.handle, &lookup.schema, lookup.buyer_request);
                self.search_items(&instruction, &lookup.schema, lookup.category).await
            }
            FallbackStage::DecomposedFilter => self.decomposed_filter(lookup).await,
            FallbackStage::SnapshotSimilarity => {
                similar_in_snapshot(&lookup.snapshot, &lookup.schema, lookup.buyer_request)
            }
            FallbackStage::PriceBand => {
                let reference = self.reference_price(lookup).await;
                let band = PriceBand::around(reference, self.policy.band_lower, self.policy.band_upper);
                debug!(
                    event_name = "inventory.price_band",
                    reference_price = reference,
                    min = band.min,
                    max = band.max,
                    "querying price band"
                );
                let instruction = instructions::price_band(lookup.handle, &lookup.schema, band);
                self.search_items(&instruction, &lookup.schema, lookup.category).await
            }
        }
    }

    async fn decomposed_filter(&self, lookup: &Lookup<'_>) -> Vec<InventoryItem> {
        let Some(decomposer) = self.decomposer.as_ref().filter(|_| self.policy.decompose_requests)
        else {
            return Vec::new();
        };
        let Some(fields) =
            decomposer.decompose(lookup.buyer_request, lookup.category, &lookup.schema).await
        else {
            return Vec::new();
        };

        let instruction = instructions::decomposed_filter(lookup.handle, &lookup.schema, &fields);
        self.search_items(&instruction, &lookup.schema, lookup.category).await
    }

    /// Price of a loosely matching product, or the configured default.
    async fn reference_price(&self, lookup: &Lookup<'_>) -> f64 {
        let search = self
            .oracle
            .search(&instructions::reference_price(lookup.handle, lookup.buyer_request))
            .await;
        search
            .rows
            .iter()
            .filter_map(|row| row.first()?.as_f64())
            .find(|price| *price > 0.0)
            .unwrap_or(self.policy.reference_price)
    }

    async fn search_items(
        &self,
        instruction: &str,
        schema: &Schema,
        category: &StoreCategory,
    ) -> Vec<InventoryItem> {
        let search = self.oracle.search(instruction).await;
        decode_items(&search.rows, schema, category)
    }
}

/// Case-insensitive substring match of the request against searchable columns.
pub fn similar_in_snapshot(
    snapshot: &[InventoryItem],
    schema: &Schema,
    buyer_request: &str,
) -> Vec<InventoryItem> {
    let needle = buyer_request.trim().to_lowercase();
    snapshot
        .iter()
        .filter(|item| {
            item.searchable_values(schema).any(|value| value.to_lowercase().contains(&needle))
        })
        .cloned()
        .collect()
}
