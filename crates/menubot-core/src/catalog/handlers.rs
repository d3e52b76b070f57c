//! Catalog queries behind the intents, rendered as Spanish replies.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::model::{Category, Product};
use super::store::CatalogStore;
use super::CategoryKind;
use crate::config::CatalogConfig;
use crate::intent::{HandlerId, IntentArgs, IntentHandlers, ReplySink};

pub const MISSING_NAME_MESSAGE: &str = "Por favor, indícame el nombre del producto.";

fn format_price(price: Decimal) -> String {
    format!("${:.2}", price)
}

/// Prefer an exact (case-insensitive) name over a partial one.
fn best_match<'a>(products: &'a [Product], name: &str) -> Option<&'a Product> {
    let lower = name.to_lowercase();
    products
        .iter()
        .find(|p| p.name.to_lowercase() == lower)
        .or_else(|| products.first())
}

pub struct CatalogHandlers {
    store: Arc<dyn CatalogStore>,
    slugs: HashMap<CategoryKind, String>,
    recommendation_limit: usize,
    max_recommended_price: Option<Decimal>,
}

impl CatalogHandlers {
    pub fn new(store: Arc<dyn CatalogStore>, config: &CatalogConfig) -> Self {
        let mut slugs: HashMap<CategoryKind, String> = CategoryKind::ALL
            .into_iter()
            .map(|kind| (kind, kind.default_slug().to_string()))
            .collect();

        for (key, slug) in &config.category_slugs {
            match key.parse::<CategoryKind>() {
                Ok(kind) => {
                    slugs.insert(kind, slug.clone());
                }
                Err(e) => warn!(key = %key, "Ignoring category slug override: {}", e),
            }
        }

        Self {
            store,
            slugs,
            recommendation_limit: config.recommendation_limit,
            max_recommended_price: config.max_recommended_price,
        }
    }

    pub fn slug(&self, kind: CategoryKind) -> &str {
        self.slugs
            .get(&kind)
            .map(String::as_str)
            .unwrap_or_else(|| kind.default_slug())
    }

    async fn category(&self, kind: CategoryKind) -> anyhow::Result<Option<Category>> {
        let slug = self.slug(kind);
        let category = self.store.category_by_slug(slug).await?;
        if category.is_none() {
            warn!(kind = %kind, slug, "Category slug not present in catalog");
        }
        Ok(category)
    }

    // ── Handlers ────────────────────────────────────────────────────

    async fn show_categories(&self) -> anyhow::Result<String> {
        let categories = self.store.categories().await?;
        if categories.is_empty() {
            return Ok("Por ahora no tenemos categorías disponibles.".into());
        }
        let mut out = String::from("📋 Este es nuestro menú:\n");
        for category in &categories {
            out.push_str(&format!("• {}\n", category.name));
        }
        out.push_str("\nPregúntame por cualquier categoría o producto.");
        Ok(out)
    }

    async fn most_ordered_product(&self) -> anyhow::Result<String> {
        let sales = self.store.sales(None).await?;
        Ok(match sales.first() {
            Some(top) => format!(
                "⭐ El producto más pedido es {} ({} unidades vendidas) a {}.",
                top.product.name,
                top.quantity,
                format_price(top.product.price)
            ),
            None => "Todavía no hay pedidos registrados.".into(),
        })
    }

    async fn most_sold(&self, kind: CategoryKind) -> anyhow::Result<String> {
        let Some(category) = self.category(kind).await? else {
            return Ok(format!("No encontré la categoría de {}.", kind.label()));
        };
        let sales = self.store.sales(Some(category.id)).await?;
        Ok(match sales.first() {
            Some(top) => format!(
                "⭐ Lo más vendido en {} es {} ({} unidades) a {}.",
                category.name,
                top.product.name,
                top.quantity,
                format_price(top.product.price)
            ),
            None => format!("Aún no hay ventas registradas en {}.", category.name),
        })
    }

    async fn recommend_by_price(&self, kind: CategoryKind) -> anyhow::Result<String> {
        let Some(category) = self.category(kind).await? else {
            return Ok(format!("No encontré la categoría de {}.", kind.label()));
        };

        let mut products: Vec<Product> = self
            .store
            .products_in_category(category.id)
            .await?
            .into_iter()
            .filter(Product::in_stock)
            .filter(|p| self.max_recommended_price.map_or(true, |max| p.price <= max))
            .collect();
        products.sort_by(|a, b| a.price.cmp(&b.price).then_with(|| a.name.cmp(&b.name)));
        products.truncate(self.recommendation_limit);

        if products.is_empty() {
            return Ok(format!(
                "No tengo recomendaciones de {} disponibles ahora mismo.",
                kind.label()
            ));
        }

        let mut out = format!(
            "💡 Te recomiendo estas opciones de {} al mejor precio:\n",
            category.name
        );
        for p in &products {
            out.push_str(&format!("• {} — {}\n", p.name, format_price(p.price)));
        }
        Ok(out.trim_end().to_string())
    }

    async fn product_by_name(&self, name: &str) -> anyhow::Result<String> {
        let products = self.store.find_products(name).await?;
        if products.is_empty() {
            return Ok(not_found(name));
        }
        let mut out = format!("🔎 Esto es lo que tenemos de \"{}\":\n", name);
        for p in &products {
            let availability = if p.in_stock() {
                format!("{} disponibles", p.stock)
            } else {
                "agotado".to_string()
            };
            out.push_str(&format!(
                "• {} — {} ({})\n",
                p.name,
                format_price(p.price),
                availability
            ));
        }
        Ok(out.trim_end().to_string())
    }

    async fn stock_for_order(&self, quantity: i64, name: &str) -> anyhow::Result<String> {
        if quantity <= 0 {
            return Ok("La cantidad debe ser mayor que cero.".into());
        }
        let products = self.store.find_products(name).await?;
        let Some(product) = best_match(&products, name) else {
            return Ok(not_found(name));
        };
        debug!(product = %product.name, stock = product.stock, quantity, "Stock check for order");

        Ok(if product.stock >= quantity {
            format!(
                "✅ ¡Sí! Tenemos {} de {} disponibles. Total: {}.",
                quantity,
                product.name,
                format_price(product.price * Decimal::from(quantity))
            )
        } else if product.in_stock() {
            format!(
                "❌ Lo siento, solo nos quedan {} unidades de {}.",
                product.stock, product.name
            )
        } else {
            format!("❌ Lo siento, {} está agotado.", product.name)
        })
    }

    async fn stock_by_product_name(&self, name: &str) -> anyhow::Result<String> {
        let products = self.store.find_products(name).await?;
        let Some(product) = best_match(&products, name) else {
            return Ok(not_found(name));
        };
        Ok(if product.in_stock() {
            format!("📦 Quedan {} unidades de {}.", product.stock, product.name)
        } else {
            format!("📦 {} está agotado por ahora.", product.name)
        })
    }

    async fn price_by_name(&self, name: &str) -> anyhow::Result<String> {
        let products = self.store.find_products(name).await?;
        let Some(product) = best_match(&products, name) else {
            return Ok(not_found(name));
        };
        Ok(format!(
            "💲 {} cuesta {}.",
            product.name,
            format_price(product.price)
        ))
    }
}

fn not_found(name: &str) -> String {
    format!("No encontré productos con el nombre \"{}\".", name)
}

#[async_trait]
impl IntentHandlers for CatalogHandlers {
    async fn handle(
        &self,
        handler: HandlerId,
        args: &IntentArgs,
        reply: &dyn ReplySink,
    ) -> anyhow::Result<()> {
        let text = match (handler, args) {
            (HandlerId::ShowCategories, _) => self.show_categories().await?,
            (HandlerId::MostOrderedProduct, _) => self.most_ordered_product().await?,
            (HandlerId::MostSold(kind), _) => self.most_sold(kind).await?,
            (HandlerId::RecommendByPrice(kind), _) => self.recommend_by_price(kind).await?,
            (
                HandlerId::ProductByName | HandlerId::StockByProductName | HandlerId::PriceByName,
                IntentArgs::Name(name),
            ) if name.is_empty() => MISSING_NAME_MESSAGE.to_string(),
            (HandlerId::ProductByName, IntentArgs::Name(name)) => {
                self.product_by_name(name).await?
            }
            (HandlerId::StockByProductName, IntentArgs::Name(name)) => {
                self.stock_by_product_name(name).await?
            }
            (HandlerId::PriceByName, IntentArgs::Name(name)) => self.price_by_name(name).await?,
            (HandlerId::StockForOrder, IntentArgs::QuantityAndName { name, .. })
                if name.is_empty() =>
            {
                MISSING_NAME_MESSAGE.to_string()
            }
            (HandlerId::StockForOrder, IntentArgs::QuantityAndName { quantity, name }) => {
                self.stock_for_order(*quantity, name).await?
            }
            (handler, args) => {
                anyhow::bail!("handler {} cannot take arguments {:?}", handler, args)
            }
        };
        reply.send(&text).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::error::Result as CatalogResult;
    use crate::catalog::model::ProductSales;
    use crate::catalog::store::tests::sample;
    use std::str::FromStr;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingReply {
        sent: Mutex<Vec<String>>,
    }

    impl RecordingReply {
        fn last(&self) -> String {
            self.sent.lock().unwrap().last().cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl ReplySink for RecordingReply {
        async fn send(&self, text: &str) {
            self.sent.lock().unwrap().push(text.to_string());
        }
    }

    fn handlers_with(config: CatalogConfig) -> CatalogHandlers {
        CatalogHandlers::new(Arc::new(sample()), &config)
    }

    fn handlers() -> CatalogHandlers {
        handlers_with(CatalogConfig::default())
    }

    async fn ask(handlers: &CatalogHandlers, handler: HandlerId, args: IntentArgs) -> String {
        let reply = RecordingReply::default();
        handlers.handle(handler, &args, &reply).await.unwrap();
        reply.last()
    }

    fn name(n: &str) -> IntentArgs {
        IntentArgs::Name(n.to_string())
    }

    #[tokio::test]
    async fn test_show_categories_lists_all() {
        let text = ask(&handlers(), HandlerId::ShowCategories, IntentArgs::None).await;
        assert!(text.contains("• Bebidas\n"));
        assert!(text.contains("• Almuerzos\n"));
    }

    #[tokio::test]
    async fn test_most_ordered_product() {
        let text = ask(&handlers(), HandlerId::MostOrderedProduct, IntentArgs::None).await;
        assert!(text.contains("Empanadas"), "{text}");
        assert!(text.contains("7 unidades"), "{text}");
    }

    #[tokio::test]
    async fn test_most_sold_in_category() {
        let h = handlers();
        let drink = ask(&h, HandlerId::MostSold(CategoryKind::Drink), IntentArgs::None).await;
        assert!(drink.contains("Limonada"), "{drink}");

        let snack = ask(&h, HandlerId::MostSold(CategoryKind::Snack), IntentArgs::None).await;
        assert_eq!(snack, "Aún no hay ventas registradas en Snacks.");
    }

    #[tokio::test]
    async fn test_recommend_cheapest_in_stock() {
        let text = ask(
            &handlers(),
            HandlerId::RecommendByPrice(CategoryKind::Drink),
            IntentArgs::None,
        )
        .await;
        // Café is cheapest but out of stock.
        assert!(!text.contains("Café"), "{text}");
        let limonada = text.find("Limonada").unwrap();
        let jugo = text.find("Jugo De Mora").unwrap();
        assert!(limonada < jugo);
    }

    #[tokio::test]
    async fn test_recommend_respects_limit_and_max_price() {
        let config = CatalogConfig {
            recommendation_limit: 1,
            max_recommended_price: Some(Decimal::from_str("2.00").unwrap()),
            ..CatalogConfig::default()
        };
        let text = ask(
            &handlers_with(config),
            HandlerId::RecommendByPrice(CategoryKind::SportDrink),
            IntentArgs::None,
        )
        .await;
        assert_eq!(text.lines().count(), 2, "{text}");
        assert!(text.contains("Powerade — $1.60"));

        let config = CatalogConfig {
            max_recommended_price: Some(Decimal::from_str("0.50").unwrap()),
            ..CatalogConfig::default()
        };
        let none = ask(
            &handlers_with(config),
            HandlerId::RecommendByPrice(CategoryKind::Starter),
            IntentArgs::None,
        )
        .await;
        assert_eq!(none, "No tengo recomendaciones de entradas disponibles ahora mismo.");
    }

    #[tokio::test]
    async fn test_slug_override() {
        let mut config = CatalogConfig::default();
        config
            .category_slugs
            .insert("main".into(), "segundos".into());
        config.category_slugs.insert("dessert".into(), "postres".into());
        let h = handlers_with(config);
        assert_eq!(h.slug(CategoryKind::Main), "segundos");

        let text = ask(&h, HandlerId::MostSold(CategoryKind::Main), IntentArgs::None).await;
        assert!(text.contains("Seco De Pollo"), "{text}");
    }

    #[tokio::test]
    async fn test_missing_category() {
        let mut config = CatalogConfig::default();
        config.category_slugs.insert("breakfast".into(), "brunch".into());
        let text = ask(
            &handlers_with(config),
            HandlerId::MostSold(CategoryKind::Breakfast),
            IntentArgs::None,
        )
        .await;
        assert_eq!(text, "No encontré la categoría de desayunos.");
    }

    #[tokio::test]
    async fn test_product_by_name_tolerates_plural() {
        let text = ask(&handlers(), HandlerId::ProductByName, name("Empanada")).await;
        assert!(text.contains("Empanadas — $1.50 (30 disponibles)"), "{text}");

        let sold_out = ask(&handlers(), HandlerId::ProductByName, name("Café")).await;
        assert!(sold_out.contains("agotado"), "{sold_out}");
    }

    #[tokio::test]
    async fn test_unknown_product() {
        let text = ask(&handlers(), HandlerId::PriceByName, name("Pizza")).await;
        assert_eq!(text, "No encontré productos con el nombre \"Pizza\".");
    }

    #[tokio::test]
    async fn test_empty_name_asks_for_it() {
        let h = handlers();
        assert_eq!(ask(&h, HandlerId::ProductByName, name("")).await, MISSING_NAME_MESSAGE);
        let order = IntentArgs::QuantityAndName {
            quantity: 2,
            name: String::new(),
        };
        assert_eq!(ask(&h, HandlerId::StockForOrder, order).await, MISSING_NAME_MESSAGE);
    }

    #[tokio::test]
    async fn test_stock_for_order() {
        let h = handlers();
        let order = |quantity, n: &str| IntentArgs::QuantityAndName {
            quantity,
            name: n.to_string(),
        };

        let ok = ask(&h, HandlerId::StockForOrder, order(3, "Empanadas")).await;
        assert!(ok.contains("Tenemos 3 de Empanadas"), "{ok}");
        assert!(ok.contains("$4.50"), "{ok}");

        let short = ask(&h, HandlerId::StockForOrder, order(5, "Hamburguesas")).await;
        assert_eq!(short, "❌ Lo siento, solo nos quedan 2 unidades de Hamburguesas.");

        let out = ask(&h, HandlerId::StockForOrder, order(1, "Café")).await;
        assert_eq!(out, "❌ Lo siento, Café está agotado.");

        let negative = ask(&h, HandlerId::StockForOrder, order(-2, "Empanadas")).await;
        assert_eq!(negative, "La cantidad debe ser mayor que cero.");
    }

    #[tokio::test]
    async fn test_stock_and_price_lookups() {
        let h = handlers();
        assert_eq!(
            ask(&h, HandlerId::StockByProductName, name("Ceviche")).await,
            "📦 Quedan 5 unidades de Ceviche."
        );
        assert_eq!(
            ask(&h, HandlerId::PriceByName, name("Jugo De Mora")).await,
            "💲 Jugo De Mora cuesta $2.50."
        );
    }

    #[test]
    fn test_exact_name_preferred() {
        let products = sample().data().products.clone();
        assert_eq!(best_match(&products, "limonada").map(|p| p.id), Some(2));
        assert_eq!(best_match(&products[1..], "jugo").map(|p| p.id), Some(2));
        assert!(best_match(&[], "jugo").is_none());
    }

    #[tokio::test]
    async fn test_arity_mismatch_is_error() {
        let reply = RecordingReply::default();
        let err = handlers()
            .handle(HandlerId::PriceByName, &IntentArgs::None, &reply)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("price_by_name"));
        assert!(reply.sent.lock().unwrap().is_empty());
    }

    struct BrokenStore;

    #[async_trait]
    impl CatalogStore for BrokenStore {
        async fn categories(&self) -> CatalogResult<Vec<Category>> {
            Err(serde_json::from_str::<Category>("{").unwrap_err().into())
        }
        async fn category_by_slug(&self, _slug: &str) -> CatalogResult<Option<Category>> {
            Ok(None)
        }
        async fn products_in_category(&self, _id: u32) -> CatalogResult<Vec<Product>> {
            Ok(Vec::new())
        }
        async fn find_products(&self, _name: &str) -> CatalogResult<Vec<Product>> {
            Ok(Vec::new())
        }
        async fn sales(&self, _id: Option<u32>) -> CatalogResult<Vec<ProductSales>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_store_error_propagates() {
        let h = CatalogHandlers::new(Arc::new(BrokenStore), &CatalogConfig::default());
        let reply = RecordingReply::default();
        assert!(h
            .handle(HandlerId::ShowCategories, &IntentArgs::None, &reply)
            .await
            .is_err());
    }
}
