//! Natural-language instructions handed to the query oracle.
//!
//! Each instruction names the table, the columns to return (in schema order,
//! so rows decode positionally) and the filter, leaving only SQL spelling to
//! the translator.

use mall_core::domain::inventory::Attribute;
use mall_core::domain::store::StoreHandle;
use mall_core::schema::{Schema, SchemaRegistry};

/// Inclusive price window used by the last fallback stage.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PriceBand {
    pub min: f64,
    pub max: f64,
}

impl PriceBand {
    pub fn around(reference_price: f64, lower: f64, upper: f64) -> Self {
        Self { min: reference_price * lower, max: reference_price * upper }
    }

    /// Bounds at cent precision, widened outward so rounding never drops a price.
    fn cents(self) -> (f64, f64) {
        ((self.min * 100.0).floor() / 100.0, (self.max * 100.0).ceil() / 100.0)
    }
}

pub fn directory_lookup(registry: &SchemaRegistry, buyer_request: &str) -> String {
    let known = registry.categories().map(|(category, _)| category.to_string()).collect::<Vec<_>>();
    format!(
        "Na tabela 'lojas', retorne id, tipo, numero da loja cujo tipo vende o que o comprador quer: \"{}\". Tipos conhecidos: {}.",
        quote_text(buyer_request),
        known.join(", ")
    )
}

pub fn position_lookup(handle: StoreHandle) -> String {
    format!("Na tabela 'posicao', retorne x, y, z WHERE numero = {handle}")
}

pub fn in_stock_snapshot(handle: StoreHandle, schema: &Schema) -> String {
    format!(
        "Na tabela '{}', retorne {} WHERE qtd > 0 ORDER BY produto ASC",
        handle.partition_table(),
        schema.column_list()
    )
}

/// Buyer text matched against every searchable column of the schema.
pub fn exact_filter(handle: StoreHandle, schema: &Schema, buyer_request: &str) -> String {
    let pattern = like_pattern(buyer_request);
    let clauses = schema
        .searchable()
        .map(|attribute| format!("{} LIKE '{pattern}'", attribute.column()))
        .collect::<Vec<_>>();
    format!(
        "Na tabela '{}', retorne {} WHERE ({}) AND qtd > 0",
        handle.partition_table(),
        schema.column_list(),
        clauses.join(" OR ")
    )
}

/// Per-column values from a decomposed request, all of which must match.
pub fn decomposed_filter(
    handle: StoreHandle,
    schema: &Schema,
    fields: &[(Attribute, String)],
) -> String {
    let clauses = fields
        .iter()
        .map(|(attribute, value)| format!("{} LIKE '{}'", attribute.column(), like_pattern(value)))
        .collect::<Vec<_>>();
    format!(
        "Na tabela '{}', retorne {} WHERE {} AND qtd > 0",
        handle.partition_table(),
        schema.column_list(),
        clauses.join(" AND ")
    )
}

/// Price of any loosely matching product, regardless of stock.
pub fn reference_price(handle: StoreHandle, buyer_request: &str) -> String {
    format!(
        "Na tabela '{}', retorne preco WHERE produto LIKE '{}' LIMIT 1",
        handle.partition_table(),
        like_pattern(buyer_request)
    )
}

pub fn price_band(handle: StoreHandle, schema: &Schema, band: PriceBand) -> String {
    let (min, max) = band.cents();
    format!(
        "Na tabela '{}', retorne {} WHERE qtd > 0 AND preco BETWEEN {min:.2} AND {max:.2} ORDER BY preco ASC",
        handle.partition_table(),
        schema.column_list(),
    )
}

fn like_pattern(text: &str) -> String {
    format!("%{}%", quote_text(text))
}

fn quote_text(text: &str) -> String {
    text.trim().replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use mall_core::domain::inventory::Attribute;
    use mall_core::domain::store::{StoreCategory, StoreHandle};
    use mall_core::schema::SchemaRegistry;

    use super::{
        decomposed_filter, directory_lookup, exact_filter, in_stock_snapshot, price_band,
        reference_price, PriceBand,
    };

    #[test]
    fn default_band_is_plus_minus_twenty_percent() {
        let band = PriceBand::around(250.0, 0.8, 1.2);

        assert_eq!(band, PriceBand { min: 200.0, max: 300.0 });
    }

    #[test]
    fn price_band_instruction_orders_ascending() {
        let schema = SchemaRegistry::default().columns_for(&StoreCategory::new("Jogos"));
        let instruction =
            price_band(StoreHandle(105), &schema, PriceBand::around(250.0, 0.8, 1.2));

        assert_eq!(
            instruction,
            "Na tabela 'loja_105', retorne produto, tipo, qtd, preco, console \
             WHERE qtd > 0 AND preco BETWEEN 200.00 AND 300.00 ORDER BY preco ASC"
        );
    }

    #[test]
    fn uneven_band_bounds_round_outward() {
        let schema = SchemaRegistry::default().columns_for(&StoreCategory::new("Roupas"));
        let instruction =
            price_band(StoreHandle(100), &schema, PriceBand { min: 15.996, max: 23.994 });

        assert!(instruction.contains("preco BETWEEN 15.99 AND 24.00"), "{instruction}");
    }

    #[test]
    fn exact_filter_covers_searchable_columns_only() {
        let registry = SchemaRegistry::default();
        let shoes = registry.columns_for(&StoreCategory::new("Calçados"));

        let instruction = exact_filter(StoreHandle(110), &shoes, "asics");

        assert!(instruction.contains(
            "WHERE (produto LIKE '%asics%' OR tipo LIKE '%asics%' OR marca LIKE '%asics%') AND qtd > 0"
        ));
        assert!(!instruction.contains("cor LIKE"));
    }

    #[test]
    fn quotes_in_buyer_text_are_escaped() {
        let instruction = reference_price(StoreHandle(100), "camiseta d'água");

        assert!(instruction.contains("produto LIKE '%camiseta d''água%'"));
    }

    #[test]
    fn decomposed_filter_requires_every_field() {
        let schema = SchemaRegistry::default().columns_for(&StoreCategory::new("Roupas"));
        let fields = vec![
            (Attribute::Product, "camiseta".to_string()),
            (Attribute::Size, "M".to_string()),
        ];

        let instruction = decomposed_filter(StoreHandle(100), &schema, &fields);

        assert!(instruction
            .ends_with("WHERE produto LIKE '%camiseta%' AND tamanho LIKE '%M%' AND qtd > 0"));
    }

    #[test]
    fn snapshot_is_not_a_prefix_of_price_band() {
        let schema = SchemaRegistry::default().columns_for(&StoreCategory::new("Roupas"));
        let snapshot = in_stock_snapshot(StoreHandle(100), &schema);
        let band = price_band(StoreHandle(100), &schema, PriceBand::around(100.0, 0.8, 1.2));

        assert!(!band.contains(&snapshot));
    }

    #[test]
    fn directory_lookup_lists_known_categories() {
        let instruction = directory_lookup(&SchemaRegistry::default(), "tênis azul");

        assert!(instruction.starts_with("Na tabela 'lojas', retorne id, tipo, numero"));
        assert!(instruction.contains("\"tênis azul\""));
        assert!(instruction.contains("Roupas"));
    }
}
