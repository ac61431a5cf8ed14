use bank::models::Money;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub supermarkets: Vec<SupermarketEntry>,
}

#[derive(Debug, Deserialize)]
pub struct SupermarketEntry {
    pub name: String,

    #[serde(default)]
    pub location: String,

    #[serde(default)]
    pub products: Vec<ProductEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ProductEntry {
    pub name: String,
    pub price: Price,

    #[serde(default)]
    pub category: String,

    #[serde(default)]
    pub calories: i64,

    #[serde(default)]
    pub protein: f64,

    #[serde(default)]
    pub carbohydrates: f64,

    #[serde(default)]
    pub fat: f64,

    #[serde(default)]
    pub is_healthy: bool,

    pub health_score: Option<i64>,

    /// Path under the static directory. Derived from the name when absent.
    pub image: Option<String>,
}

/// Prices show up both as `"10.99"` and as `10.99`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Price {
    Text(String),
    Number(f64),
}

impl Price {
    pub fn to_money(&self) -> bank::Result<Money> {
        match self {
            Price::Text(text) => text.parse(),
            Price::Number(number) => number.to_string().parse(),
        }
    }
}
