use std::collections::{HashMap, HashSet};
use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use super::error::{CatalogError, Result};
use super::model::{CatalogData, Category, Product, ProductSales};

/// Catalog shipped with the crate; `menubot onboard` writes it out.
pub const SAMPLE_CATALOG: &str = include_str!("../../data/sample_catalog.json");

/// Read access to the menu catalog.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// All categories, in catalog order.
    async fn categories(&self) -> Result<Vec<Category>>;

    async fn category_by_slug(&self, slug: &str) -> Result<Option<Category>>;

    async fn products_in_category(&self, category_id: u32) -> Result<Vec<Product>>;

    /// Products whose name matches `name` (see [`names_match`]).
    async fn find_products(&self, name: &str) -> Result<Vec<Product>>;

    /// Units sold per product, best seller first. `category_id` narrows the
    /// ranking to one category.
    async fn sales(&self, category_id: Option<u32>) -> Result<Vec<ProductSales>>;
}

/// Case-insensitive, singular/plural tolerant name comparison: either
/// lower-cased name contains the other.
pub fn names_match(product_name: &str, query: &str) -> bool {
    let product = product_name.to_lowercase();
    let query = query.trim().to_lowercase();
    if product.is_empty() || query.is_empty() {
        return false;
    }
    product.contains(&query) || query.contains(&product)
}

/// Catalog held in memory, loaded from a JSON file.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    data: CatalogData,
}

impl InMemoryCatalog {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let data: CatalogData =
            serde_json::from_str(&content).map_err(|source| CatalogError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        let catalog = Self::from_data(data)?;
        info!(
            path = %path.display(),
            categories = catalog.data.categories.len(),
            products = catalog.data.products.len(),
            "Catalog loaded"
        );
        Ok(catalog)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_data(serde_json::from_str(json)?)
    }

    /// Build from parsed data, rejecting dangling references.
    pub fn from_data(data: CatalogData) -> Result<Self> {
        let categories: HashSet<u32> = data.categories.iter().map(|c| c.id).collect();
        let products: HashSet<u32> = data.products.iter().map(|p| p.id).collect();
        let orders: HashSet<u32> = data.orders.iter().map(|o| o.id).collect();

        if let Some(p) = data
            .products
            .iter()
            .find(|p| !categories.contains(&p.category_id))
        {
            return Err(CatalogError::DanglingCategory {
                product: p.id,
                category: p.category_id,
            });
        }

        for line in &data.order_lines {
            if !orders.contains(&line.order_id) {
                return Err(CatalogError::DanglingOrderLine {
                    line: line.id,
                    entity: "order",
                    id: line.order_id,
                });
            }
            if !products.contains(&line.product_id) {
                return Err(CatalogError::DanglingOrderLine {
                    line: line.id,
                    entity: "product",
                    id: line.product_id,
                });
            }
        }

        Ok(Self { data })
    }

    pub fn data(&self) -> &CatalogData {
        &self.data
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn categories(&self) -> Result<Vec<Category>> {
        Ok(self.data.categories.clone())
    }

    async fn category_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        Ok(self
            .data
            .categories
            .iter()
            .find(|c| c.slug.eq_ignore_ascii_case(slug))
            .cloned())
    }

    async fn products_in_category(&self, category_id: u32) -> Result<Vec<Product>> {
        Ok(self
            .data
            .products
            .iter()
            .filter(|p| p.category_id == category_id)
            .cloned()
            .collect())
    }

    async fn find_products(&self, name: &str) -> Result<Vec<Product>> {
        Ok(self
            .data
            .products
            .iter()
            .filter(|p| names_match(&p.name, name))
            .cloned()
            .collect())
    }

    async fn sales(&self, category_id: Option<u32>) -> Result<Vec<ProductSales>> {
        let mut totals: HashMap<u32, i64> = HashMap::new();
        for line in &self.data.order_lines {
            *totals.entry(line.product_id).or_default() += line.quantity;
        }

        let mut ranking: Vec<ProductSales> = self
            .data
            .products
            .iter()
            .filter(|p| category_id.map_or(true, |id| p.category_id == id))
            .filter_map(|p| {
                totals.get(&p.id).map(|&quantity| ProductSales {
                    product: p.clone(),
                    quantity,
                })
            })
            .collect();

        // Ties go to the lower product id.
        ranking.sort_by(|a, b| {
            b.quantity
                .cmp(&a.quantity)
                .then(a.product.id.cmp(&b.product.id))
        });
        Ok(ranking)
    }
}
