//! Seed the catalog from a YAML file.
//!
//! Categories are matched by name and reused if they already exist; products
//! already present under the same name are skipped, so re-running a seed file
//! is safe.
//!
//! ```yaml
//! categories:
//!   - name: Lighting
//!     description: Lamps and bulbs
//!     products:
//!       - name: Desk Lamp
//!         price: "45.00"
//!         stock: 12
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use shopline_core::catalog::{NewCategory, NewProduct};
use shopline_core::{Price, PriceError};
use shopline_storefront::db::{CatalogStore, RepositoryError};

use super::{ConnectError, connect};

/// Errors that can occur while seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid seed file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Product {product:?}: {source}")]
    InvalidPrice {
        product: String,
        source: PriceError,
    },

    #[error("Product {product:?}: stock must not be negative, got {stock}")]
    NegativeStock { product: String, stock: i32 },

    #[error("Empty name in seed file")]
    EmptyName,

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, Deserialize)]
struct SeedFile {
    #[serde(default)]
    categories: Vec<SeedCategory>,
}

#[derive(Debug, Deserialize)]
struct SeedCategory {
    name: String,
    description: Option<String>,
    #[serde(default)]
    products: Vec<SeedProduct>,
}

#[derive(Debug, Deserialize)]
struct SeedProduct {
    name: String,
    price: Decimal,
    #[serde(default)]
    stock: i32,
}

/// A validated seed file.
#[derive(Debug, PartialEq, Eq)]
pub struct CatalogSeed {
    pub categories: Vec<(NewCategory, Vec<NewProduct>)>,
}

impl CatalogSeed {
    /// Parse and validate YAML. Category ids on the products are filled in
    /// when the category is created.
    ///
    /// # Errors
    ///
    /// Returns `SeedError` for malformed YAML, empty names, negative prices,
    /// or negative stock.
    pub fn parse(yaml: &str) -> Result<Self, SeedError> {
        let file: SeedFile = serde_yaml::from_str(yaml)?;

        let categories = file
            .categories
            .into_iter()
            .map(|category| {
                if category.name.trim().is_empty() {
                    return Err(SeedError::EmptyName);
                }
                let products = category
                    .products
                    .into_iter()
                    .map(validate_product)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((
                    NewCategory {
                        name: category.name,
                        description: category.description,
                    },
                    products,
                ))
            })
            .collect::<Result<Vec<_>, SeedError>>()?;

        Ok(Self { categories })
    }

    /// Number of products across all categories.
    #[must_use]
    pub fn product_count(&self) -> usize {
        self.categories.iter().map(|(_, products)| products.len()).sum()
    }
}

fn validate_product(product: SeedProduct) -> Result<NewProduct, SeedError> {
    if product.name.trim().is_empty() {
        return Err(SeedError::EmptyName);
    }
    if product.stock < 0 {
        return Err(SeedError::NegativeStock {
            product: product.name,
            stock: product.stock,
        });
    }
    let price = Price::new(product.price).map_err(|source| SeedError::InvalidPrice {
        product: product.name.clone(),
        source,
    })?;

    Ok(NewProduct {
        category_id: None,
        name: product.name,
        price,
        stock: product.stock,
    })
}

/// Counts of what a seed run created.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub categories_created: usize,
    pub products_created: usize,
    pub products_skipped: usize,
}

/// Insert a validated seed into `store`.
///
/// # Errors
///
/// Returns `RepositoryError` if a write fails.
pub async fn apply<S: CatalogStore>(
    store: &S,
    seed: CatalogSeed,
) -> Result<SeedReport, RepositoryError> {
    let mut report = SeedReport::default();

    let mut category_ids: HashMap<String, _> = store
        .list_categories()
        .await?
        .into_iter()
        .map(|category| (category.name, category.id))
        .collect();
    let mut product_names: HashSet<String> = store
        .list_products()
        .await?
        .into_iter()
        .map(|product| product.name)
        .collect();

    for (category, products) in seed.categories {
        let category_id = if let Some(id) = category_ids.get(&category.name) {
            *id
        } else {
            let created = store.create_category(&category).await?;
            report.categories_created += 1;
            category_ids.insert(created.name, created.id);
            created.id
        };

        for mut product in products {
            if !product_names.insert(product.name.clone()) {
                report.products_skipped += 1;
                continue;
            }
            product.category_id = Some(category_id);
            store.create_product(&product).await?;
            report.products_created += 1;
        }
    }

    Ok(report)
}

/// Seed the catalog from a YAML file.
///
/// # Errors
///
/// Returns `SeedError` if the file is unreadable or invalid, or the database
/// cannot be reached or written.
pub async fn catalog(file_path: &Path) -> Result<SeedReport, SeedError> {
    info!(path = %file_path.display(), "Loading catalog seed");

    // Validate before connecting to the database
    let content = tokio::fs::read_to_string(file_path)
        .await
        .map_err(|source| SeedError::Read {
            path: file_path.display().to_string(),
            source,
        })?;
    let seed = CatalogSeed::parse(&content)?;
    info!(
        categories = seed.categories.len(),
        products = seed.product_count(),
        "Seed file validated"
    );

    let store = connect().await?;
    let report = apply(&store, seed).await?;

    info!(
        categories_created = report.categories_created,
        products_created = report.products_created,
        products_skipped = report.products_skipped,
        "Seeding complete"
    );
    Ok(report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use shopline_storefront::db::MemoryStore;

    use super::*;

    const SEED: &str = r#"
categories:
  - name: Lighting
    description: Lamps and bulbs
    products:
      - name: Desk Lamp
        price: "45.00"
        stock: 12
      - name: Bulb
        price: "3.50"
  - name: Seating
    products:
      - name: Stool
        price: "80.00"
        stock: 2
"#;

    #[test]
    fn test_parse_valid_seed() {
        let seed = CatalogSeed::parse(SEED).unwrap();

        assert_eq!(seed.categories.len(), 2);
        assert_eq!(seed.product_count(), 3);
        let (lighting, products) = &seed.categories[0];
        assert_eq!(lighting.name, "Lighting");
        assert_eq!(products[0].price.amount(), Decimal::new(4500, 2));
        assert_eq!(products[1].stock, 0);
    }

    #[test]
    fn test_parse_rejects_negative_price() {
        let yaml = r#"
categories:
  - name: Lighting
    products:
      - name: Lamp
        price: "-1.00"
"#;
        assert!(matches!(
            CatalogSeed::parse(yaml),
            Err(SeedError::InvalidPrice { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_negative_stock() {
        let yaml = r#"
categories:
  - name: Lighting
    products:
      - name: Lamp
        price: "1.00"
        stock: -3
"#;
        assert!(matches!(
            CatalogSeed::parse(yaml),
            Err(SeedError::NegativeStock { stock: -3, .. })
        ));
    }

    #[test]
    fn test_parse_rejects_empty_name() {
        let yaml = "categories:\n  - name: \"  \"\n";
        assert!(matches!(CatalogSeed::parse(yaml), Err(SeedError::EmptyName)));
    }

    #[tokio::test]
    async fn test_apply_is_rerunnable() {
        let store = MemoryStore::new();

        let first = apply(&store, CatalogSeed::parse(SEED).unwrap())
            .await
            .unwrap();
        assert_eq!(
            first,
            SeedReport {
                categories_created: 2,
                products_created: 3,
                products_skipped: 0,
            }
        );

        let second = apply(&store, CatalogSeed::parse(SEED).unwrap())
            .await
            .unwrap();
        assert_eq!(
            second,
            SeedReport {
                categories_created: 0,
                products_created: 0,
                products_skipped: 3,
            }
        );

        let products = store.list_products().await.unwrap();
        assert_eq!(products.len(), 3);
        assert!(products.iter().all(|p| p.category_id.is_some()));
    }
}
