//! Menu catalog records, as stored in the catalog JSON file.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: u32,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: u32,
    pub name: String,
    /// Two decimal places, in the restaurant's currency.
    pub price: Decimal,
    pub stock: i64,
    #[serde(default)]
    pub image: Option<String>,
    pub category_id: u32,
}

impl Product {
    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: u32,
}

/// One product line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub id: u32,
    pub order_id: u32,
    pub product_id: u32,
    pub quantity: i64,
}

/// Whole catalog file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CatalogData {
    pub categories: Vec<Category>,
    pub products: Vec<Product>,
    pub orders: Vec<Order>,
    #[serde(rename = "orderProducts")]
    pub order_lines: Vec<OrderLine>,
}

/// Units of one product sold across all orders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSales {
    pub product: Product,
    pub quantity: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_product_from_json() {
        let json = r#"{"id": 3, "name": "Café", "price": "1.25", "stock": 0, "categoryId": 1}"#;
        let product: Product = serde_json::from_str(json).unwrap();
        assert_eq!(product.price, Decimal::from_str("1.25").unwrap());
        assert_eq!(product.category_id, 1);
        assert!(product.image.is_none());
        assert!(!product.in_stock());
    }

    #[test]
    fn test_order_lines_use_order_products_key() {
        let json = r#"{"orderProducts": [{"id": 1, "orderId": 2, "productId": 3, "quantity": 4}]}"#;
        let data: CatalogData = serde_json::from_str(json).unwrap();
        assert_eq!(data.order_lines.len(), 1);
        assert_eq!(data.order_lines[0].product_id, 3);
        assert!(data.categories.is_empty());
    }
}
