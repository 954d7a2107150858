use std::sync::Arc;

use mall_core::domain::store::{Coordinates, ResolvedStore, StoreCategory, StoreHandle, StoreId};
use mall_core::errors::{NoStoreReason, ResolutionError};
use mall_core::oracle::{QueryOracleAdapter, ResultRow};
use mall_core::schema::SchemaRegistry;
use mall_core::session::{SessionId, SessionStore, SessionUpdate};
use tracing::{debug, info, warn};

use crate::instructions;

/// Resolves the store serving a buyer request, once per session.
pub struct StoreResolver {
    oracle: QueryOracleAdapter,
    sessions: Arc<dyn SessionStore>,
    registry: SchemaRegistry,
}

impl StoreResolver {
    pub fn new(
        oracle: QueryOracleAdapter,
        sessions: Arc<dyn SessionStore>,
        registry: SchemaRegistry,
    ) -> Self {
        Self { oracle, sessions, registry }
    }

    /// Cached store for the session, or a fresh directory lookup.
    ///
    /// Later calls in the same session return the first resolution whatever
    /// the request text.
    pub async fn resolve(
        &self,
        buyer_request: &str,
        session_id: &SessionId,
    ) -> Result<ResolvedStore, ResolutionError> {
        if let Some(store) = self.sessions.get(session_id).await.and_then(|entry| entry.store) {
            debug!(
                event_name = "store.resolve.cache_hit",
                session_id = %session_id,
                store_handle = store.handle.0,
                "store already resolved for session"
            );
            return Ok(store);
        }

        let instruction = instructions::directory_lookup(&self.registry, buyer_request);
        let search = self.oracle.search(&instruction).await;
        let store = match select_store(&search.rows) {
            Ok(store) => store,
            Err(error) => {
                warn!(
                    event_name = "store.resolve.not_found",
                    session_id = %session_id,
                    row_count = search.rows.len(),
                    error = %error,
                    "no usable store for request"
                );
                return Err(error);
            }
        };

        self.sessions.set(session_id, SessionUpdate::Store(store.clone())).await;
        info!(
            event_name = "store.resolve.completed",
            session_id = %session_id,
            store_id = %store.id,
            category = %store.category,
            store_handle = store.handle.0,
            "store resolved"
        );
        Ok(store)
    }

    pub async fn resolve_store(
        &self,
        buyer_request: &str,
        session_id: &SessionId,
    ) -> Result<StoreHandle, ResolutionError> {
        self.resolve(buyer_request, session_id).await.map(|store| store.handle)
    }

    /// Position of the store, memoized per session including "not registered".
    pub async fn store_coordinates(
        &self,
        handle: StoreHandle,
        session_id: &SessionId,
    ) -> Option<Coordinates> {
        if let Some(cached) = self.sessions.get(session_id).await.and_then(|entry| entry.coordinates)
        {
            return cached;
        }

        let search = self.oracle.search(&instructions::position_lookup(handle)).await;
        let coordinates = search.rows.iter().find_map(parse_coordinates);
        if coordinates.is_none() {
            debug!(
                event_name = "store.position.missing",
                session_id = %session_id,
                store_handle = handle.0,
                "store position not registered"
            );
        }

        self.sessions.set(session_id, SessionUpdate::Coordinates(coordinates)).await;
        coordinates
    }
}

/// First row carrying an integer handle in its third column wins.
pub fn select_store(rows: &[ResultRow]) -> Result<ResolvedStore, ResolutionError> {
    if rows.is_empty() {
        return Err(ResolutionError::NoStoreFound(NoStoreReason::NoRows));
    }

    rows.iter()
        .find_map(|row| {
            let [id, category, handle, ..] = row.as_slice() else {
                return None;
            };
            Some(ResolvedStore {
                handle: StoreHandle(handle.as_i64()?),
                id: StoreId(id.as_text().unwrap_or_default()),
                category: StoreCategory::new(category.as_text().unwrap_or_default()),
            })
        })
        .ok_or(ResolutionError::NoStoreFound(NoStoreReason::NoValidHandle))
}

fn parse_coordinates(row: &ResultRow) -> Option<Coordinates> {
    let [x, y, z, ..] = row.as_slice() else {
        return None;
    };
    Some(Coordinates { x: x.as_i64()?, y: y.as_i64()?, z: z.as_i64()? })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mall_core::domain::store::{Coordinates, StoreHandle};
    use mall_core::errors::{NoStoreReason, ResolutionError};
    use mall_core::oracle::CellValue;
    use mall_core::schema::SchemaRegistry;
    use mall_core::session::{InMemorySessionStore, SessionId, SessionStore};

    use super::{select_store, StoreResolver};
    use crate::scripted::ScriptedOracle;

    fn text(value: &str) -> CellValue {
        CellValue::Text(value.to_string())
    }

    fn resolver(oracle: &Arc<ScriptedOracle>) -> (Arc<InMemorySessionStore>, StoreResolver) {
        let sessions = Arc::new(InMemorySessionStore::default());
        let resolver =
            StoreResolver::new(oracle.clone().adapter(), sessions.clone(), SchemaRegistry::default());
        (sessions, resolver)
    }

    #[test]
    fn skips_rows_without_integer_handle() {
        let rows = vec![
            vec![text("9"), text("Jogos"), text("N/A")],
            vec![text("2"), text("Jogos")],
            vec![CellValue::Integer(2), text("Jogos"), CellValue::Integer(105)],
        ];

        let store = select_store(&rows).expect("store");

        assert_eq!(store.handle, StoreHandle(105));
        assert_eq!(store.id.0, "2");
        assert_eq!(store.category.as_str(), "Jogos");
    }

    #[test]
    fn empty_and_unusable_results_are_distinct() {
        assert_eq!(
            select_store(&[]),
            Err(ResolutionError::NoStoreFound(NoStoreReason::NoRows))
        );
        assert_eq!(
            select_store(&[vec![text("1"), text("Roupas"), CellValue::Null]]),
            Err(ResolutionError::NoStoreFound(NoStoreReason::NoValidHandle))
        );
    }

    #[tokio::test]
    async fn resolution_is_memoized_per_session() {
        let oracle = Arc::new(ScriptedOracle::new().respond(
            "'lojas'",
            vec![vec![CellValue::Integer(3), text("Calçados"), CellValue::Integer(110)]],
        ));
        let (sessions, resolver) = resolver(&oracle);
        let session = SessionId::new("A");

        let first = resolver.resolve_store("tênis azul", &session).await.expect("first");
        let second = resolver.resolve_store("camiseta branca", &session).await.expect("second");

        assert_eq!(first, StoreHandle(110));
        assert_eq!(second, first);
        assert_eq!(oracle.count_matching("'lojas'"), 1);
        let entry = sessions.get(&session).await.expect("entry");
        assert_eq!(entry.store.map(|store| store.category.0), Some("Calçados".to_string()));
    }

    #[tokio::test]
    async fn failed_resolution_caches_nothing() {
        let oracle = Arc::new(ScriptedOracle::new());
        let (sessions, resolver) = resolver(&oracle);
        let session = SessionId::new("B");

        let result = resolver.resolve_store("algo", &session).await;

        assert_eq!(result, Err(ResolutionError::NoStoreFound(NoStoreReason::NoRows)));
        assert!(sessions.get(&session).await.is_none());
    }

    #[tokio::test]
    async fn missing_position_is_memoized_too() {
        let oracle = Arc::new(ScriptedOracle::new().respond(
            "numero = 105",
            vec![vec![text("bad"), CellValue::Integer(0), CellValue::Integer(7)]],
        ));
        let (_, resolver) = resolver(&oracle);
        let session = SessionId::new("C");

        assert_eq!(resolver.store_coordinates(StoreHandle(105), &session).await, None);
        assert_eq!(resolver.store_coordinates(StoreHandle(105), &session).await, None);
        assert_eq!(oracle.count_matching("'posicao'"), 1);
    }

    #[tokio::test]
    async fn coordinates_accept_real_cells() {
        let oracle = Arc::new(ScriptedOracle::new().respond(
            "numero = 100",
            vec![vec![CellValue::Real(12.0), CellValue::Integer(0), CellValue::Integer(-4)]],
        ));
        let (_, resolver) = resolver(&oracle);

        let coordinates =
            resolver.store_coordinates(StoreHandle(100), &SessionId::new("D")).await;

        assert_eq!(coordinates, Some(Coordinates { x: 12, y: 0, z: -4 }));
    }
}
