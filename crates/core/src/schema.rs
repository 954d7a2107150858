//! Category -> inventory attribute layout.
//!
//! Store partitions are structurally different per category (clothing exposes
//! size/material/print, games expose console, ...). Every schema starts with
//! the shared `produto, tipo, qtd, preco` columns so rows can be decoded
//! positionally; unknown categories resolve to exactly those four.

use std::collections::BTreeMap;

use crate::domain::inventory::Attribute;
use crate::domain::store::StoreCategory;

const BASE_ATTRIBUTES: [Attribute; 4] =
    [Attribute::Product, Attribute::Variant, Attribute::Quantity, Attribute::Price];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Schema {
    attributes: Vec<Attribute>,
}

impl Schema {
    /// Builds a schema from the category specific columns; shared columns are
    /// prepended and duplicates dropped.
    pub fn with_details(details: &[Attribute]) -> Self {
        let mut attributes = BASE_ATTRIBUTES.to_vec();
        for detail in details.iter().filter(|attribute| attribute.is_detail()) {
            if !attributes.contains(detail) {
                attributes.push(*detail);
            }
        }
        Self { attributes }
    }

    pub fn base() -> Self {
        Self { attributes: BASE_ATTRIBUTES.to_vec() }
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn details(&self) -> impl Iterator<Item = Attribute> + '_ {
        self.attributes.iter().copied().filter(Attribute::is_detail)
    }

    pub fn contains(&self, attribute: Attribute) -> bool {
        self.attributes.contains(&attribute)
    }

    pub fn searchable(&self) -> impl Iterator<Item = Attribute> + '_ {
        self.attributes.iter().copied().filter(Attribute::is_searchable)
    }

    /// Comma separated column list in schema order, for select clauses.
    pub fn column_list(&self) -> String {
        self.attributes.iter().map(Attribute::column).collect::<Vec<_>>().join(", ")
    }
}

#[derive(Clone, Debug)]
struct RegisteredSchema {
    label: StoreCategory,
    schema: Schema,
}

#[derive(Clone, Debug)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, RegisteredSchema>,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        use Attribute::*;

        Self::empty()
            .with_category("Roupas", &[Size, Material, Print])
            .with_category("Jogos", &[Console])
            .with_category("Calçados", &[Size, Brand, Color])
            .with_category("Livros", &[Author, Genre, Language])
            .with_category("Eletrônicos", &[Brand, Warranty])
            .with_category("Skate", &[Brand, Size, Color])
    }
}

impl SchemaRegistry {
    pub fn empty() -> Self {
        Self { schemas: BTreeMap::new() }
    }

    pub fn with_category(mut self, label: &str, details: &[Attribute]) -> Self {
        let label = StoreCategory::new(label);
        self.schemas.insert(
            label.normalized(),
            RegisteredSchema { label, schema: Schema::with_details(details) },
        );
        self
    }

    /// Total: unknown categories get the base schema.
    pub fn columns_for(&self, category: &StoreCategory) -> Schema {
        self.schemas
            .get(&category.normalized())
            .map(|registered| registered.schema.clone())
            .unwrap_or_else(Schema::base)
    }

    pub fn is_known(&self, category: &StoreCategory) -> bool {
        self.schemas.contains_key(&category.normalized())
    }

    pub fn categories(&self) -> impl Iterator<Item = (&StoreCategory, &Schema)> {
        self.schemas.values().map(|registered| (&registered.label, &registered.schema))
    }
}
