//! Text grounding handed to the seller/guide dialogue.
//!
//! Output is deterministic and self-contained: the dialogue layer treats it as
//! opaque context and cannot query further.

use crate::domain::inventory::InventoryItem;
use crate::domain::store::{Coordinates, ResolvedStore};
use crate::schema::SchemaRegistry;

pub const NO_ITEMS_LINE: &str = "(Nenhum item encontrado ou recomendado)";
pub const ITEMS_HEADER: &str = "Itens Disponíveis:";
pub const NO_POSITION_LINE: &str = "Posição da loja não cadastrada";

#[derive(Clone, Debug, Default)]
pub struct SummaryFormatter {
    registry: SchemaRegistry,
}

impl SummaryFormatter {
    pub fn new(registry: SchemaRegistry) -> Self {
        Self { registry }
    }

    /// Store header followed by one line per item, or the fixed no-items line.
    pub fn format(&self, store: &ResolvedStore, items: &[InventoryItem]) -> String {
        let mut lines = vec![store_line(store)];
        self.push_items(&mut lines, items);
        lines.join("\n")
    }

    /// Like [`format`](Self::format) with the store position after the header.
    pub fn format_stock_context(
        &self,
        store: &ResolvedStore,
        coordinates: Option<Coordinates>,
        items: &[InventoryItem],
    ) -> String {
        let mut lines = vec![store_line(store)];
        lines.push(match coordinates {
            Some(Coordinates { x, y, z }) => format!("Posição da loja: x={x}, y={y}, z={z}"),
            None => NO_POSITION_LINE.to_string(),
        });
        self.push_items(&mut lines, items);
        lines.join("\n")
    }

    pub fn item_line(&self, item: &InventoryItem) -> String {
        let schema = self.registry.columns_for(&item.category);
        let mut line = format!("- {} ({})", item.product, item.variant);
        for attribute in schema.details() {
            if let Some(value) = item.detail(attribute) {
                line.push_str(&format!(", {}={value}", attribute.column()));
            }
        }
        line.push_str(&format!(", qtd={}, R${}", item.quantity, format_price(item.price)));
        line
    }

    fn push_items(&self, lines: &mut Vec<String>, items: &[InventoryItem]) {
        if items.is_empty() {
            lines.push(NO_ITEMS_LINE.to_string());
            return;
        }

        lines.push(ITEMS_HEADER.to_string());
        lines.extend(items.iter().map(|item| self.item_line(item)));
    }
}

/// Answer for the guide agent: where the resolved store is.
pub fn format_guide_answer(store: &ResolvedStore, coordinates: Option<Coordinates>) -> String {
    match coordinates {
        Some(Coordinates { x, y, z }) => format!(
            "Loja encontrada: id={}, tipo='{}', número={}. Localização: x={x}, y={y}, z={z}.",
            store.id, store.category, store.handle
        ),
        None => format!(
            "Loja encontrada: id={}, tipo='{}', número={}, mas posição não cadastrada.",
            store.id, store.category, store.handle
        ),
    }
}

fn store_line(store: &ResolvedStore) -> String {
    format!("Loja encontrada: ID={}, tipo={}, numero={}", store.id, store.category, store.handle)
}

/// Whole prices keep one decimal place (`45.0`), others print as-is.
pub fn format_price(price: f64) -> String {
    if price.is_finite() && price.fract() == 0.0 {
        format!("{price:.1}")
    } else {
        format!("{price}")
    }
}

#[cfg(test)]
mod tests {
    use super::{format_guide_answer, format_price, SummaryFormatter, NO_ITEMS_LINE};
    use crate::domain::inventory::{InventoryItem, ItemDetails};
    use crate::domain::store::{Coordinates, ResolvedStore, StoreCategory, StoreHandle, StoreId};

    fn store(category: &str, handle: i64) -> ResolvedStore {
        ResolvedStore {
            id: StoreId("1".to_string()),
            category: StoreCategory::new(category),
            handle: StoreHandle(handle),
        }
    }

    fn shirt() -> InventoryItem {
        InventoryItem {
            category: StoreCategory::new("Roupas"),
            product: "Camiseta".to_string(),
            variant: "Branca".to_string(),
            quantity: 10,
            price: 45.0,
            details: ItemDetails {
                size: Some("M".to_string()),
                material: Some("Algodão".to_string()),
                print: Some("Sim".to_string()),
                ..ItemDetails::default()
            },
        }
    }

    #[test]
    fn clothing_item_renders_schema_attributes_in_order() {
        let text = SummaryFormatter::default().format(&store("Roupas", 100), &[shirt()]);

        assert_eq!(
            text,
            "Loja encontrada: ID=1, tipo=Roupas, numero=100\n\
             Itens Disponíveis:\n\
             - Camiseta (Branca), tamanho=M, material=Algodão, estampa=Sim, qtd=10, R$45.0"
        );
    }

    #[test]
    fn console_is_hidden_outside_game_schema() {
        let mut item = shirt();
        item.details.console = Some("PS5".to_string());

        let line = SummaryFormatter::default().item_line(&item);

        assert!(!line.contains("console="));
    }

    #[test]
    fn console_is_shown_for_game_schema() {
        let item = InventoryItem {
            category: StoreCategory::new("Jogos"),
            product: "FIFA 24".to_string(),
            variant: "Esporte".to_string(),
            quantity: 4,
            price: 299.9,
            details: ItemDetails { console: Some("PS5".to_string()), ..ItemDetails::default() },
        };

        let line = SummaryFormatter::default().item_line(&item);

        assert_eq!(line, "- FIFA 24 (Esporte), console=PS5, qtd=4, R$299.9");
    }

    #[test]
    fn absent_attributes_are_skipped() {
        let mut item = shirt();
        item.details.material = None;

        let line = SummaryFormatter::default().item_line(&item);

        assert_eq!(line, "- Camiseta (Branca), tamanho=M, estampa=Sim, qtd=10, R$45.0");
    }

    #[test]
    fn empty_items_render_fixed_line() {
        let text = SummaryFormatter::default().format(&store("Jogos", 105), &[]);

        assert_eq!(text.lines().last(), Some(NO_ITEMS_LINE));
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn stock_context_includes_position_line() {
        let formatter = SummaryFormatter::default();
        let with_position = formatter.format_stock_context(
            &store("Roupas", 100),
            Some(Coordinates { x: 10, y: 0, z: -5 }),
            &[],
        );
        let without_position = formatter.format_stock_context(&store("Roupas", 100), None, &[]);

        assert!(with_position.contains("Posição da loja: x=10, y=0, z=-5"));
        assert!(without_position.contains("Posição da loja não cadastrada"));
    }

    #[test]
    fn guide_answer_mentions_location_when_known() {
        let answer =
            format_guide_answer(&store("Jogos", 105), Some(Coordinates { x: 3, y: 0, z: 7 }));

        assert_eq!(
            answer,
            "Loja encontrada: id=1, tipo='Jogos', número=105. Localização: x=3, y=0, z=7."
        );
    }

    #[test]
    fn price_formatting_matches_grounding_contract() {
        assert_eq!(format_price(45.0), "45.0");
        assert_eq!(format_price(19.99), "19.99");
        assert_eq!(format_price(250.5), "250.5");
    }
}
