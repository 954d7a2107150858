use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::store::StoreCategory;
use crate::errors::RowDecodeError;
use crate::oracle::CellValue;
use crate::schema::Schema;

/// Inventory column known to any store partition. The first four are shared by
/// every category; the rest are category specific.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    Product,
    Variant,
    Quantity,
    Price,
    Size,
    Material,
    Print,
    Brand,
    Color,
    Console,
    Author,
    Genre,
    Language,
    Warranty,
}

impl Attribute {
    pub const ALL: [Attribute; 14] = [
        Self::Product,
        Self::Variant,
        Self::Quantity,
        Self::Price,
        Self::Size,
        Self::Material,
        Self::Print,
        Self::Brand,
        Self::Color,
        Self::Console,
        Self::Author,
        Self::Genre,
        Self::Language,
        Self::Warranty,
    ];

    /// Column name in the inventory partition tables.
    pub fn column(&self) -> &'static str {
        match self {
            Self::Product => "produto",
            Self::Variant => "tipo",
            Self::Quantity => "qtd",
            Self::Price => "preco",
            Self::Size => "tamanho",
            Self::Material => "material",
            Self::Print => "estampa",
            Self::Brand => "marca",
            Self::Color => "cor",
            Self::Console => "console",
            Self::Author => "autor",
            Self::Genre => "genero",
            Self::Language => "idioma",
            Self::Warranty => "garantia",
        }
    }

    pub fn from_column(column: &str) -> Option<Self> {
        let column = column.trim().to_lowercase();
        Self::ALL.into_iter().find(|attribute| attribute.column() == column)
    }

    /// Whether the attribute is category specific (everything past price).
    pub fn is_detail(&self) -> bool {
        !matches!(self, Self::Product | Self::Variant | Self::Quantity | Self::Price)
    }

    /// Free-text columns a buyer request can be matched against.
    pub fn is_searchable(&self) -> bool {
        matches!(self, Self::Product | Self::Variant | Self::Brand)
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDetails {
    pub size: Option<String>,
    pub material: Option<String>,
    pub print: Option<String>,
    pub brand: Option<String>,
    pub color: Option<String>,
    pub console: Option<String>,
    pub author: Option<String>,
    pub genre: Option<String>,
    pub language: Option<String>,
    pub warranty: Option<String>,
}

impl ItemDetails {
    pub fn get(&self, attribute: Attribute) -> Option<&str> {
        let slot = match attribute {
            Attribute::Size => &self.size,
            Attribute::Material => &self.material,
            Attribute::Print => &self.print,
            Attribute::Brand => &self.brand,
            Attribute::Color => &self.color,
            Attribute::Console => &self.console,
            Attribute::Author => &self.author,
            Attribute::Genre => &self.genre,
            Attribute::Language => &self.language,
            Attribute::Warranty => &self.warranty,
            Attribute::Product | Attribute::Variant | Attribute::Quantity | Attribute::Price => {
                return None
            }
        };
        slot.as_deref()
    }

    pub fn set(&mut self, attribute: Attribute, value: Option<String>) {
        let slot = match attribute {
            Attribute::Size => &mut self.size,
            Attribute::Material => &mut self.material,
            Attribute::Print => &mut self.print,
            Attribute::Brand => &mut self.brand,
            Attribute::Color => &mut self.color,
            Attribute::Console => &mut self.console,
            Attribute::Author => &mut self.author,
            Attribute::Genre => &mut self.genre,
            Attribute::Language => &mut self.language,
            Attribute::Warranty => &mut self.warranty,
            Attribute::Product | Attribute::Variant | Attribute::Quantity | Attribute::Price => {
                return
            }
        };
        *slot = value;
    }
}

/// One row of a store partition, shaped by the schema of the store's category.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub category: StoreCategory,
    pub product: String,
    pub variant: String,
    pub quantity: i64,
    pub price: f64,
    pub details: ItemDetails,
}

impl InventoryItem {
    /// Decodes a positional row whose columns follow `schema` order.
    pub fn from_row(
        row: &[CellValue],
        schema: &Schema,
        category: &StoreCategory,
    ) -> Result<Self, RowDecodeError> {
        let attributes = schema.attributes();
        if row.len() < attributes.len() {
            return Err(RowDecodeError::ColumnCount { expected: attributes.len(), found: row.len() });
        }

        let mut item = Self {
            category: category.clone(),
            product: String::new(),
            variant: String::new(),
            quantity: 0,
            price: 0.0,
            details: ItemDetails::default(),
        };

        for (attribute, cell) in attributes.iter().zip(row) {
            match attribute {
                Attribute::Product => {
                    item.product = cell.as_text().ok_or(RowDecodeError::Missing(*attribute))?;
                }
                Attribute::Variant => item.variant = cell.as_text().unwrap_or_default(),
                Attribute::Quantity => {
                    item.quantity = cell
                        .as_i64()
                        .ok_or_else(|| RowDecodeError::invalid(*attribute, cell))?;
                }
                Attribute::Price => {
                    item.price = cell
                        .as_f64()
                        .ok_or_else(|| RowDecodeError::invalid(*attribute, cell))?;
                }
                detail => item.details.set(*detail, cell.as_text()),
            }
        }

        Ok(item)
    }

    pub fn detail(&self, attribute: Attribute) -> Option<&str> {
        self.details.get(attribute)
    }

    /// Text values of the searchable columns present in `schema`.
    pub fn searchable_values<'a>(&'a self, schema: &'a Schema) -> impl Iterator<Item = &'a str> {
        schema.attributes().iter().filter(|attribute| attribute.is_searchable()).filter_map(
            move |attribute| match attribute {
                Attribute::Product => Some(self.product.as_str()),
                Attribute::Variant => Some(self.variant.as_str()),
                other => self.detail(*other),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{Attribute, InventoryItem};
    use crate::domain::store::StoreCategory;
    use crate::errors::RowDecodeError;
    use crate::oracle::CellValue;
    use crate::schema::SchemaRegistry;

    fn clothing_row() -> Vec<CellValue> {
        vec![
            CellValue::Text("Camiseta".to_string()),
            CellValue::Text("Branca".to_string()),
            CellValue::Integer(10),
            CellValue::Real(45.0),
            CellValue::Text("M".to_string()),
            CellValue::Text("Algodão".to_string()),
            CellValue::Text("Sim".to_string()),
        ]
    }

    #[test]
    fn decodes_row_in_schema_order() {
        let category = StoreCategory::new("Roupas");
        let schema = SchemaRegistry::default().columns_for(&category);

        let item = InventoryItem::from_row(&clothing_row(), &schema, &category).expect("decode");

        assert_eq!(item.product, "Camiseta");
        assert_eq!(item.variant, "Branca");
        assert_eq!(item.quantity, 10);
        assert_eq!(item.price, 45.0);
        assert_eq!(item.detail(Attribute::Size), Some("M"));
        assert_eq!(item.detail(Attribute::Print), Some("Sim"));
        assert_eq!(item.detail(Attribute::Console), None);
    }

    #[test]
    fn short_row_is_rejected() {
        let category = StoreCategory::new("Roupas");
        let schema = SchemaRegistry::default().columns_for(&category);
        let row = &clothing_row()[..3];

        let error = InventoryItem::from_row(row, &schema, &category).expect_err("short row");

        assert_eq!(error, RowDecodeError::ColumnCount { expected: 7, found: 3 });
    }

    #[test]
    fn textual_numbers_are_accepted() {
        let category = StoreCategory::new("Padaria");
        let schema = SchemaRegistry::default().columns_for(&category);
        let row = vec![
            CellValue::Text("Pão".to_string()),
            CellValue::Text("Francês".to_string()),
            CellValue::Text("12".to_string()),
            CellValue::Text("0.75".to_string()),
        ];

        let item = InventoryItem::from_row(&row, &schema, &category).expect("decode");

        assert_eq!(item.quantity, 12);
        assert_eq!(item.price, 0.75);
    }

    #[test]
    fn non_numeric_price_is_rejected() {
        let category = StoreCategory::new("Jogos");
        let schema = SchemaRegistry::default().columns_for(&category);
        let row = vec![
            CellValue::Text("Zelda".to_string()),
            CellValue::Text("Aventura".to_string()),
            CellValue::Integer(3),
            CellValue::Text("consulte".to_string()),
            CellValue::Text("Switch".to_string()),
        ];

        let error = InventoryItem::from_row(&row, &schema, &category).expect_err("bad price");

        assert!(matches!(error, RowDecodeError::InvalidValue { attribute: Attribute::Price, .. }));
    }

    #[test]
    fn column_names_round_trip() {
        for attribute in Attribute::ALL {
            assert_eq!(Attribute::from_column(attribute.column()), Some(attribute));
        }
        assert_eq!(Attribute::from_column(" PRECO "), Some(Attribute::Price));
        assert_eq!(Attribute::from_column("sabor"), None);
    }
}
