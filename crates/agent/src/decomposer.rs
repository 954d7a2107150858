//! Optional decomposition of a free-text request into per-column values.
//!
//! Best effort only: any failure or unusable output yields `None` and the
//! decomposed-filter stage is skipped.

use std::sync::Arc;

use async_trait::async_trait;
use mall_core::domain::inventory::Attribute;
use mall_core::domain::store::StoreCategory;
use mall_core::schema::Schema;
use serde_json::{Map, Value};
use tracing::warn;

use crate::llm::LlmClient;
use crate::prompts::PromptTemplates;

pub type RequestFields = Vec<(Attribute, String)>;

#[async_trait]
pub trait RequestDecomposer: Send + Sync {
    async fn decompose(
        &self,
        buyer_request: &str,
        category: &StoreCategory,
        schema: &Schema,
    ) -> Option<RequestFields>;
}

pub struct LlmRequestDecomposer {
    llm: Arc<dyn LlmClient>,
    templates: PromptTemplates,
}

impl LlmRequestDecomposer {
    pub fn new(llm: Arc<dyn LlmClient>, templates: PromptTemplates) -> Self {
        Self { llm, templates }
    }
}

#[async_trait]
impl RequestDecomposer for LlmRequestDecomposer {
    async fn decompose(
        &self,
        buyer_request: &str,
        category: &StoreCategory,
        schema: &Schema,
    ) -> Option<RequestFields> {
        let prompt = match self.templates.decompose_request(category, schema, buyer_request) {
            Ok(prompt) => prompt,
            Err(error) => {
                warn!(event_name = "decomposer.prompt.failed", error = %error, "prompt rendering failed");
                return None;
            }
        };

        let raw = match self.llm.complete(&prompt).await {
            Ok(raw) => raw,
            Err(error) => {
                warn!(event_name = "decomposer.llm.failed", error = %error, "decomposition call failed");
                return None;
            }
        };

        let fields = parse_decomposition(&raw, schema);
        if fields.is_none() {
            warn!(
                event_name = "decomposer.output.malformed",
                category = %category,
                "decomposition output unusable; skipping stage"
            );
        }
        fields
    }
}

/// Extracts the outermost JSON object from `raw` and keeps the non-empty
/// values whose keys are descriptive columns of `schema`.
pub fn parse_decomposition(raw: &str, schema: &Schema) -> Option<RequestFields> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }

    let object: Map<String, Value> = serde_json::from_str(&raw[start..=end]).ok()?;
    let fields = schema
        .attributes()
        .iter()
        .filter(|attribute| !matches!(attribute, Attribute::Quantity | Attribute::Price))
        .filter_map(|attribute| {
            let value = match object.get(attribute.column())? {
                Value::String(text) => text.trim().to_string(),
                Value::Number(number) => number.to_string(),
                _ => return None,
            };
            (!value.is_empty()).then_some((*attribute, value))
        })
        .collect::<Vec<_>>();

    (!fields.is_empty()).then_some(fields)
}

#[cfg(test)]
mod tests {
    use mall_core::domain::inventory::Attribute;
    use mall_core::domain::store::StoreCategory;
    use mall_core::schema::SchemaRegistry;

    use super::parse_decomposition;

    fn clothing() -> mall_core::schema::Schema {
        SchemaRegistry::default().columns_for(&StoreCategory::new("Roupas"))
    }

    #[test]
    fn keeps_known_columns_in_schema_order() {
        let raw = r#"Claro! {"tamanho": "M", "produto": "camiseta", "console": "PS5"}"#;

        let fields = parse_decomposition(raw, &clothing()).expect("fields");

        assert_eq!(
            fields,
            vec![(Attribute::Product, "camiseta".to_string()), (Attribute::Size, "M".to_string())]
        );
    }

    #[test]
    fn stock_and_price_keys_are_ignored() {
        let raw = r#"{"qtd": 3, "preco": 45.0}"#;

        assert_eq!(parse_decomposition(raw, &clothing()), None);
    }

    #[test]
    fn malformed_or_empty_output_is_none() {
        assert_eq!(parse_decomposition("não sei", &clothing()), None);
        assert_eq!(parse_decomposition("{produto: camiseta", &clothing()), None);
        assert_eq!(parse_decomposition(r#"{"produto": "  "}"#, &clothing()), None);
        assert_eq!(parse_decomposition("} {", &clothing()), None);
    }
}
