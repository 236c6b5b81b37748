use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SIZES: &str = "40-45";
pub const DEFAULT_IMAGE: &str = "images/default.jpg";

fn default_sizes() -> String {
    DEFAULT_SIZES.to_string()
}

fn default_image() -> String {
    DEFAULT_IMAGE.to_string()
}

/// A catalog record. `id` and `created` are assigned by the store and never
/// change afterwards; `updated` stays absent until the first update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub description: String,
    pub price: i64,
    #[serde(default = "default_sizes")]
    pub sizes: String,
    #[serde(default = "default_image")]
    pub image: String,
    pub created: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
}

/// Create payload. `price` is taken as a raw JSON value so the store can
/// accept both numbers and numeric strings.
#[derive(Debug, Default, Deserialize)]
pub struct NewProduct {
    pub name: Option<String>,
    pub category: Option<String>,
    pub price: Option<serde_json::Value>,
    pub description: Option<String>,
    pub sizes: Option<String>,
    pub image: Option<String>,
}

/// Partial update: only the supplied fields overwrite the stored record.
#[derive(Debug, Default, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub price: Option<serde_json::Value>,
    pub sizes: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub id: Option<ProductId>,
    #[serde(flatten)]
    pub patch: ProductPatch,
}

/// Product identifier as supplied by a caller. `17` and `"17"` address the
/// same record; normalization happens here, at the store boundary.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ProductId {
    Int(i64),
    Text(String),
}

impl ProductId {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ProductId::Int(n) => Some(*n),
            ProductId::Text(s) => s.trim().parse::<i64>().ok(),
        }
    }

    pub fn matches(&self, id: i64) -> bool {
        self.as_i64() == Some(id)
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProductId::Int(n) => write!(f, "{}", n),
            ProductId::Text(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub token: String,
    pub username: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Subject (admin username)
    pub jti: String, // Token id
    pub iat: usize,  // Issued at as UTC timestamp
    pub exp: usize,  // Expiration time as UTC timestamp
}

#[derive(Debug, Serialize)]
pub struct ProductList {
    pub products: Vec<Product>,
    pub total: usize,
}
