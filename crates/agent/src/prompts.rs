use mall_core::domain::inventory::Attribute;
use mall_core::domain::store::StoreCategory;
use mall_core::schema::{Schema, SchemaRegistry};
use serde::Serialize;
use tera::{Context, Tera};

const TEXT_TO_SQL: &str = "text_to_sql.txt";
const DECOMPOSE_REQUEST: &str = "decompose_request.txt";

const TEXT_TO_SQL_TEMPLATE: &str = r#"You are an expert SQLite developer. The database schema is as follows:

TABLE `lojas`:
  - id (integer)
  - tipo (text)     --> store category
  - numero (integer) --> store number; its inventory lives in `loja_<numero>`

TABLE `posicao`:
  - numero (integer)
  - x (integer)
  - y (integer)
  - z (integer)

Inventory tables are named `loja_<numero>`. Their columns depend on the store category:
{% for partition in partitions %}  - {{ partition.category }}: {{ partition.columns }}
{% endfor %}  - any other category: {{ default_columns }}

IMPORTANT:
 - Do NOT reference columns that do not exist.
 - The table `lojas` only has columns: id, tipo, numero.
 - If the user mentions a color or size, never filter `lojas` by it; that belongs in `loja_<numero>`.
 - Use LIKE for text matching.
 - Produce exactly one read-only SELECT statement.

Given the user question, output a valid SQL query ONLY in the format:

SQLQuery: SELECT ...

No triple backticks or extra text. No explanations. Just the query.

User Question: {{ input }}
SQLQuery:"#;

const DECOMPOSE_REQUEST_TEMPLATE: &str = r#"You map a shopper's request to the inventory columns of a "{{ category }}" store.

Columns: {{ columns }}
Shopper request: "{{ request }}"

Return ONLY a JSON object whose keys are column names from the list above and whose
values are the words the shopper used for that column. Leave out columns the shopper
did not mention. Never include qtd or preco.

Example for "camiseta verde tamanho M": {"produto": "camiseta", "tipo": "verde", "tamanho": "M"}"#;

#[derive(Debug, Serialize)]
struct PartitionPrompt {
    category: String,
    columns: String,
}

/// Prompt templates rendered with tera.
#[derive(Debug)]
pub struct PromptTemplates {
    tera: Tera,
}

impl PromptTemplates {
    pub fn new() -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            (TEXT_TO_SQL, TEXT_TO_SQL_TEMPLATE),
            (DECOMPOSE_REQUEST, DECOMPOSE_REQUEST_TEMPLATE),
        ])?;
        Ok(Self { tera })
    }

    pub fn text_to_sql(&self, registry: &SchemaRegistry, input: &str) -> Result<String, tera::Error> {
        let partitions = registry
            .categories()
            .map(|(category, schema)| PartitionPrompt {
                category: category.to_string(),
                columns: schema.column_list(),
            })
            .collect::<Vec<_>>();

        let mut context = Context::new();
        context.insert("partitions", &partitions);
        context.insert("default_columns", &Schema::base().column_list());
        context.insert("input", input);
        self.tera.render(TEXT_TO_SQL, &context)
    }

    pub fn decompose_request(
        &self,
        category: &StoreCategory,
        schema: &Schema,
        request: &str,
    ) -> Result<String, tera::Error> {
        let columns = schema
            .attributes()
            .iter()
            .filter(|attribute| !matches!(attribute, Attribute::Quantity | Attribute::Price))
            .map(Attribute::column)
            .collect::<Vec<_>>()
            .join(", ");

        let mut context = Context::new();
        context.insert("category", category.as_str());
        context.insert("columns", &columns);
        context.insert("request", request);
        self.tera.render(DECOMPOSE_REQUEST, &context)
    }
}
