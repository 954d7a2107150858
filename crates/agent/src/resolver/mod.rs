pub mod inventory;
pub mod store;

pub use inventory::InventoryResolver;
pub use store::StoreResolver;

use mall_core::domain::inventory::InventoryItem;
use mall_core::domain::store::StoreCategory;
use mall_core::oracle::ResultRow;
use mall_core::schema::Schema;
use tracing::debug;

/// Decodes rows positionally against `schema`; rows that do not fit are dropped.
pub(crate) fn decode_items(
    rows: &[ResultRow],
    schema: &Schema,
    category: &StoreCategory,
) -> Vec<InventoryItem> {
    rows.iter()
        .filter_map(|row| match InventoryItem::from_row(row, schema, category) {
            Ok(item) => Some(item),
            Err(error) => {
                debug!(
                    event_name = "inventory.row.dropped",
                    category = %category,
                    error = %error,
                    "dropping malformed inventory row"
                );
                None
            }
        })
        .collect()
}
