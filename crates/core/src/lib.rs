//! Domain core for resolving a buyer's free-text request to a mall store and
//! its matching inventory.

pub mod config;
pub mod domain;
pub mod errors;
pub mod oracle;
pub mod schema;
pub mod session;
pub mod summary;

pub use domain::inventory::{Attribute, InventoryItem, ItemDetails};
pub use domain::store::{Coordinates, ResolvedStore, StoreCategory, StoreHandle, StoreId};
pub use errors::{NoStoreReason, OracleError, ResolutionError, RowDecodeError};
pub use oracle::{CellValue, OracleSearch, QueryExecutor, QueryOracleAdapter, ResultRow, TextToQuery};
pub use schema::{Schema, SchemaRegistry};
pub use session::{InMemorySessionStore, SessionEntry, SessionId, SessionStore, SessionUpdate};
pub use summary::SummaryFormatter;
