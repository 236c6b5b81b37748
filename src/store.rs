//! The product store: sole owner of the catalog collection, persisted as a
//! single JSON array that is rewritten in full on every mutation.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use log::{error, info};
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::AppError;
use crate::models::{NewProduct, Product, ProductId, ProductPatch, DEFAULT_IMAGE, DEFAULT_SIZES};

pub struct ProductStore {
    path: PathBuf,
    // Serializes the whole load-modify-persist cycle of mutating operations.
    // Readers skip it: the rename in `persist` keeps snapshots consistent.
    write_lock: Mutex<()>,
    next_id: AtomicI64,
}

impl ProductStore {
    /// Opens the store at `path`. The file does not have to exist yet; the
    /// id counter is seeded past the largest id already on disk.
    pub fn open(path: impl Into<PathBuf>) -> Result<ProductStore, AppError> {
        let store = ProductStore {
            path: path.into(),
            write_lock: Mutex::new(()),
            next_id: AtomicI64::new(1),
        };
        let seed = match store.load()? {
            Some(products) => products.iter().map(|p| p.id).max().unwrap_or(0) + 1,
            None => 1,
        };
        store.next_id.store(seed, Ordering::SeqCst);
        Ok(store)
    }

    pub fn create(&self, input: NewProduct) -> Result<Product, AppError> {
        let name = required_text(input.name, "name")?;
        let category = required_text(input.category, "category")?;
        let price = coerce_price(input.price.as_ref())?;

        let _guard = self.write_lock.lock();
        let mut products = self.load()?.unwrap_or_default();
        let product = Product {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            name,
            category,
            description: input.description.unwrap_or_default(),
            price,
            sizes: non_empty(input.sizes).unwrap_or_else(|| DEFAULT_SIZES.to_string()),
            image: non_empty(input.image).unwrap_or_else(|| DEFAULT_IMAGE.to_string()),
            created: Utc::now(),
            updated: None,
        };
        products.push(product.clone());
        self.persist(&products)?;
        info!("created product {} ({})", product.id, product.name);
        Ok(product)
    }

    pub fn get(&self, id: &ProductId) -> Result<Product, AppError> {
        let products = self.load()?.unwrap_or_default();
        products
            .into_iter()
            .find(|p| id.matches(p.id))
            .ok_or_else(|| AppError::NotFound("Product not found".to_string()))
    }

    /// Full collection in insertion order, or the subsequence whose category
    /// equals `category` exactly.
    pub fn list(&self, category: Option<&str>) -> Result<Vec<Product>, AppError> {
        let products = self.load()?.unwrap_or_default();
        Ok(match category {
            Some(wanted) => products.into_iter().filter(|p| p.category == wanted).collect(),
            None => products,
        })
    }

    /// Merges `patch` over the stored record. Fields absent from the patch
    /// keep their values; `id` and `created` can never be overwritten.
    pub fn update(&self, id: &ProductId, patch: ProductPatch) -> Result<Product, AppError> {
        let price = match patch.price.as_ref() {
            Some(value) => Some(coerce_price(Some(value))?),
            None => None,
        };

        let _guard = self.write_lock.lock();
        let mut products = self
            .load()?
            .ok_or_else(|| AppError::NotFound("Product data not found".to_string()))?;
        let slot = products
            .iter_mut()
            .find(|p| id.matches(p.id))
            .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

        if let Some(name) = patch.name {
            slot.name = name;
        }
        if let Some(category) = patch.category {
            slot.category = category;
        }
        if let Some(description) = patch.description {
            slot.description = description;
        }
        if let Some(price) = price {
            slot.price = price;
        }
        if let Some(sizes) = patch.sizes {
            slot.sizes = sizes;
        }
        if let Some(image) = patch.image {
            slot.image = image;
        }
        slot.updated = Some(Utc::now());

        let updated = slot.clone();
        self.persist(&products)?;
        info!("updated product {}", updated.id);
        Ok(updated)
    }

    /// Removes the first record matching `id`, preserving the relative order
    /// of the rest, and returns it.
    pub fn delete(&self, id: &ProductId) -> Result<Product, AppError> {
        let _guard = self.write_lock.lock();
        let mut products = self
            .load()?
            .ok_or_else(|| AppError::NotFound("Product data not found".to_string()))?;
        let index = products
            .iter()
            .position(|p| id.matches(p.id))
            .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;
        let removed = products.remove(index);
        self.persist(&products)?;
        info!("deleted product {} ({})", removed.id, removed.name);
        Ok(removed)
    }

    /// `Ok(None)` means the store has never been written. Unreadable or
    /// corrupt bytes are an error, never an empty catalog.
    fn load(&self) -> Result<Option<Vec<Product>>, AppError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                error!("failed to read {}: {}", self.path.display(), e);
                return Err(AppError::StoreUnavailable(format!(
                    "cannot read product data: {}",
                    e
                )));
            }
        };
        match serde_json::from_str(&raw) {
            Ok(products) => Ok(Some(products)),
            Err(e) => {
                error!("corrupt product data in {}: {}", self.path.display(), e);
                Err(AppError::StoreUnavailable(format!(
                    "corrupt product data: {}",
                    e
                )))
            }
        }
    }

    // Write-new-then-rename so readers never see a half-written file.
    fn persist(&self, products: &[Product]) -> Result<(), AppError> {
        let body = serde_json::to_string_pretty(products)
            .map_err(|e| AppError::Internal(format!("cannot encode product data: {}", e)))?;
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir).map_err(|e| {
                    AppError::StoreUnavailable(format!("cannot create data directory: {}", e))
                })?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body)
            .map_err(|e| AppError::StoreUnavailable(format!("cannot write product data: {}", e)))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| AppError::StoreUnavailable(format!("cannot write product data: {}", e)))?;
        Ok(())
    }
}

fn required_text(value: Option<String>, field: &str) -> Result<String, AppError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AppError::Validation(format!(
            "Missing required field: {}",
            field
        ))),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn coerce_price(value: Option<&Value>) -> Result<i64, AppError> {
    let value = value.ok_or_else(|| {
        AppError::Validation("Missing required field: price".to_string())
    })?;
    let coerced = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
        }
        _ => None,
    };
    coerced.ok_or_else(|| AppError::Validation("Product price must be numeric".to_string()))
}
