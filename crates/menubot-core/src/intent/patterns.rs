//! The ordered intent catalog.
//!
//! Intents are tried in the order of [`DEFAULT_INTENTS`]; the first one with
//! a matching pattern wins. Exit patterns are checked before any of them.
//! All patterns run against lower-cased text and are compiled
//! case-insensitive.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use regex::Regex;
use tracing::{debug, info};

use super::error::{IntentError, Result};
use super::matcher::{self, MatchResult};
use crate::catalog::CategoryKind;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// How arguments are pulled out of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extraction {
    /// No argument.
    Flag,
    /// Capture 1 is a product name.
    Name,
    /// Capture 1 is an integer quantity, capture 2 a product name.
    QuantityAndName,
    /// Capture 1 is a product name whose stock is requested.
    StockLookup,
    /// Capture 1 is a product name whose price is requested.
    PriceLookup,
}

impl Extraction {
    /// Number of capture groups this extraction consumes.
    pub fn captures(&self) -> usize {
        match self {
            Self::Flag => 0,
            Self::Name | Self::StockLookup | Self::PriceLookup => 1,
            Self::QuantityAndName => 2,
        }
    }
}

/// Which catalog query answers an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerId {
    ShowCategories,
    MostOrderedProduct,
    MostSold(CategoryKind),
    RecommendByPrice(CategoryKind),
    ProductByName,
    StockForOrder,
    StockByProductName,
    PriceByName,
}

impl HandlerId {
    /// Number of extracted arguments the handler takes.
    pub fn arity(&self) -> usize {
        match self {
            Self::ShowCategories
            | Self::MostOrderedProduct
            | Self::MostSold(_)
            | Self::RecommendByPrice(_) => 0,
            Self::ProductByName | Self::StockByProductName | Self::PriceByName => 1,
            Self::StockForOrder => 2,
        }
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShowCategories => f.write_str("show_categories"),
            Self::MostOrderedProduct => f.write_str("most_ordered_product"),
            Self::MostSold(kind) => write!(f, "most_sold:{}", kind.key()),
            Self::RecommendByPrice(kind) => write!(f, "recommend:{}", kind.key()),
            Self::ProductByName => f.write_str("product_by_name"),
            Self::StockForOrder => f.write_str("stock_for_order"),
            Self::StockByProductName => f.write_str("stock_by_product_name"),
            Self::PriceByName => f.write_str("price_by_name"),
        }
    }
}

impl FromStr for HandlerId {
    type Err = IntentError;

    fn from_str(s: &str) -> Result<Self> {
        let unknown = || IntentError::UnknownHandler(s.to_string());
        if let Some(kind) = s.strip_prefix("most_sold:") {
            return kind.parse().map(Self::MostSold).map_err(|_| unknown());
        }
        if let Some(kind) = s.strip_prefix("recommend:") {
            return kind.parse().map(Self::RecommendByPrice).map_err(|_| unknown());
        }
        match s {
            "show_categories" => Ok(Self::ShowCategories),
            "most_ordered_product" => Ok(Self::MostOrderedProduct),
            "product_by_name" => Ok(Self::ProductByName),
            "stock_for_order" => Ok(Self::StockForOrder),
            "stock_by_product_name" => Ok(Self::StockByProductName),
            "price_by_name" => Ok(Self::PriceByName),
            _ => Err(unknown()),
        }
    }
}

/// One compiled intent.
#[derive(Debug, Clone)]
pub struct IntentDescriptor {
    pub name: &'static str,
    pub patterns: Vec<Regex>,
    pub extraction: Extraction,
    pub handler: HandlerId,
}

/// Static definition an [`IntentDescriptor`] is compiled from.
#[derive(Debug, Clone, Copy)]
pub struct IntentSpec {
    pub name: &'static str,
    pub patterns: &'static [&'static str],
    pub extraction: Extraction,
    pub handler: HandlerId,
}

/// Result of classifying one message.
#[derive(Debug)]
pub enum Classification<'a> {
    Exit,
    Intent(&'a IntentDescriptor, MatchResult),
    NoMatch,
}

// ---------------------------------------------------------------------------
// Pattern sets
// ---------------------------------------------------------------------------

pub const EXIT_PATTERNS: &[&str] = &[r"\bsalir\b", r"\bsalir del chat\b", r"\bterminar\b"];

const MENU_PATTERNS: &[&str] = &[
    r"\bmen[úu]\b",
    r"\bcarta\b",
    r"\bver opciones\b",
    r"\bver men[úu]\b",
    r"\bver carta\b",
];

const MOST_ORDERED_PRODUCT_PATTERNS: &[&str] = &[
    r"\bproducto m[aá]s pedido\b",
    r"\borden m[aá]s pedida\b",
    r"\bproducto m[aá]s vendido\b",
    r"\borden m[aá]s vendida\b",
    r"\bcu[aá]l es el producto más pedido\b",
];

const MOST_SOLD_DRINK_PATTERNS: &[&str] = &[
    r"\bbebida m[aá]s vendida\b",
    r"\bbebida m[aá]s popular\b",
    r"\bbebida m[aá]s pedida\b",
    r"\bcu[aá]l es la bebida más vendida\b",
    r"\bcu[aá]l es la bebida más popular\b",
];

const MOST_SOLD_SPORT_DRINK_PATTERNS: &[&str] = &[
    r"\bbebida deportiva m[aá]s vendida\b",
    r"\bbebida deportiva m[aá]s popular\b",
    r"\bbebida deportiva m[aá]s pedida\b",
    r"\bcu[aá]l es la bebida deportiva más vendida\b",
    r"\bcu[aá]l es la bebida deportiva más popular\b",
];

const MOST_SOLD_BREAKFAST_PATTERNS: &[&str] = &[
    r"\bdesayuno m[aá]s vendido\b",
    r"\bdesayuno m[aá]s popular\b",
    r"\bdesayuno m[aá]s pedido\b",
    r"\bcu[aá]l es el desayuno más vendido\b",
    r"\bcu[aá]l es el desayuno más popular\b",
];

const MOST_SOLD_STARTER_PATTERNS: &[&str] = &[
    r"\bentrada m[aá]s vendida\b",
    r"\bentrada m[aá]s popular\b",
    r"\bentrada m[aá]s pedida\b",
    r"\bcu[aá]l es la entrada más vendida\b",
    r"\bcu[aá]l es la entrada más popular\b",
];

const MOST_SOLD_SECOND_COURSE_PATTERNS: &[&str] = &[
    r"\bsegundo m[aá]s vendido\b",
    r"\bsegundo m[aá]s popular\b",
    r"\bsegundo m[aá]s pedido\b",
    r"\bcu[aá]l es el segundo más vendido\b",
    r"\bcu[aá]l es el segundo más popular\b",
];

const MOST_SOLD_SNACK_PATTERNS: &[&str] = &[
    r"\bsnack m[aá]s vendido\b",
    r"\bsnack m[aá]s popular\b",
    r"\bsnack m[aá]s pedido\b",
    r"\bcu[aá]l es el snack m[aá]s vendido\b",
    r"\bcu[aá]l es el snack m[aá]s popular\b",
];

const RECOMMEND_DRINK_PATTERNS: &[&str] = &[
    r"\bbebida recomendada\b",
    r"\bqu[eé] bebida recomiendas\b",
    r"\bqu[eé] bebida me recomiendas\b",
    r"\bqu[eé] bebida es buena\b",
    r"\bqu[eé] bebida econ[oó]mica me recomiendas\b",
    r"\bqu[eé] bebida es buena y econ[oó]mica\b",
];

const RECOMMEND_SPORT_DRINK_PATTERNS: &[&str] = &[
    r"\bbebida deportiva recomendada\b",
    r"\bqu[eé] bebida deportiva recomiendas\b",
    r"\bqu[eé] bebida deportiva me recomiendas\b",
    r"\bqu[eé] bebida deportiva es buena\b",
    r"\bqu[eé] bebida deportiva econ[oó]mica me recomiendas\b",
    r"\bqu[eé] bebida deportiva es buena y econ[oó]mica\b",
];

const RECOMMEND_BREAKFAST_PATTERNS: &[&str] = &[
    r"\bdesayuno recomendado\b",
    r"\bqu[eé] desayuno recomiendas\b",
    r"\bqu[eé] desayuno me recomiendas\b",
    r"\bqu[eé] desayuno es bueno\b",
    r"\bqu[eé] desayuno econ[oó]mico me recomiendas\b",
    r"\bqu[eé] desayuno es bueno y econ[oó]mico\b",
];

const RECOMMEND_STARTER_PATTERNS: &[&str] = &[
    r"\bentrada recomendada\b",
    r"\bqu[eé] entrada recomiendas\b",
    r"\bqu[eé] entrada me recomiendas\b",
    r"\bqu[eé] entrada es buena\b",
    r"\bqu[eé] entrada econ[oó]mica me recomiendas\b",
    r"\bqu[eé] entrada es buena y econ[oó]mica\b",
];

const RECOMMEND_SECOND_COURSE_PATTERNS: &[&str] = &[
    r"\bsegundo recomendado\b",
    r"\bqu[eé] segundo recomiendas\b",
    r"\bqu[eé] segundo me recomiendas\b",
    r"\bqu[eé] segundo es bueno\b",
    r"\bqu[eé] segundo econ[oó]mico me recomiendas\b",
    r"\bqu[eé] segundo es bueno y econ[oó]mico\b",
    r"\bqu[eé] plato fuerte recomiendas\b",
    r"\bqu[eé] plato fuerte me recomiendas\b",
    r"\bqu[eé] plato fuerte es bueno\b",
    r"\bqu[eé] plato fuerte econ[oó]mico me recomiendas\b",
    r"\bqu[eé] plato fuerte es bueno y econ[oó]mico\b",
];

const RECOMMEND_SNACK_PATTERNS: &[&str] = &[
    r"\bsnack recomendado\b",
    r"\bqu[eé] snack recomiendas\b",
    r"\bqu[eé] snack me recomiendas\b",
    r"\bqu[eé] snack es bueno\b",
    r"\bqu[eé] snack econ[oó]mico me recomiendas\b",
    r"\bqu[eé] snack es bueno y econ[oó]mico\b",
];

const RECOMMEND_MAIN_PATTERNS: &[&str] = &[
    r"\balmuerzo recomendado\b",
    r"\bqu[eé] almuerzo recomiendas\b",
    r"\bqu[eé] almuerzo me recomiendas\b",
    r"\bqu[eé] almuerzo es bueno\b",
    r"\bqu[eé] almuerzo econ[oó]mico me recomiendas\b",
    r"\bqu[eé] almuerzo es bueno y econ[oó]mico\b",
];

const PRODUCT_BY_NAME_PATTERNS: &[&str] = &[
    r"\btienes (\w+)\b",
    r"\bquiero un (\w+)\b",
    r"\bquiero una (\w+)\b",
    r"\bquisiera un (\w+)\b",
    r"\bquisiera una (\w+)\b",
    r"\bnecesito un (\w+)\b",
    r"\bnecesito una (\w+)\b",
    r"\bme gustar[ií]a un (\w+)\b",
    r"\bme gustar[ií]a una (\w+)\b",
    r"\bme gustar[ií]a pedir un (\w+)\b",
    r"\bme gustar[ií]a pedir una (\w+)\b",
    r"\bme gustar[ií]a ordenar un (\w+)\b",
    r"\bme gustar[ií]a ordenar una (\w+)\b",
    r"\bme gustar[ií]a pedir (\w+)\b",
    r"\bme gustar[ií]a ordenar (\w+)\b",
];

/// Quantity token: digits (possibly signed or malformed like `2.5`) or a
/// spelled-out Spanish number. Only digit-only tokens parse; the rest are
/// reported as an invalid quantity instead of falling through. `un`/`una`
/// are left out: as articles they belong to the product-by-name intent.
macro_rules! order_pattern {
    ($verb:literal) => {
        concat!(
            r"\b",
            $verb,
            r"\s+(-?\d[\d.,]*|",
            r"uno|dos|tres|cuatro|cinco|seis|siete|ocho|nueve|diez|once|doce|trece|catorce|quince|",
            r"dieci\p{L}+|veinte|veinti\p{L}+|treinta|cuarenta|cincuenta|sesenta|setenta|ochenta|noventa|",
            r"cien|ciento|quinient[oa]s|\p{L}+cient[oa]s|mil",
            r")\s+(.+)"
        )
    };
}

const PRODUCT_ORDER_PATTERNS: &[&str] = &[
    order_pattern!("quiero"),
    order_pattern!("quisiera"),
    order_pattern!("necesito"),
    order_pattern!(r"me gustar[ií]a"),
    order_pattern!(r"me gustar[ií]a pedir"),
    order_pattern!(r"me gustar[ií]a ordenar"),
];

const PRODUCT_QUANTITY_PATTERNS: &[&str] = &[
    r"\bcu[aá]nt[oa]s?\s+([\w\s]+)\s+(?:tienes|hay|quedan)(?:\s+en\s+(?:stock|inventario|existencia|bodega|almac[eé]n|dep[oó]sito|disponibles))?\b",
];

const PRODUCT_PRICE_PATTERNS: &[&str] = &[
    r"\bcu[aá]nto\s+(?:cuesta|vale|valen|cuestan)\s+(?:el|la|los|las)?\s*([\p{L}\s]+)\b",
    r"\bqu[eé]\s+(?:precio|valor|costo)\s+(?:tiene|tienen)\s+(?:el|la|los|las)?\s*([\p{L}\s]+)\b",
    r"\bprecio\s+(?:del|de\s+la|de\s+los|de\s+las)?\s*([\p{L}\s]+)\b",
    r"\bcosto\s+(?:del|de\s+la|de\s+los|de\s+las)?\s*([\p{L}\s]+)\b",
    r"\bvalor\s+(?:del|de\s+la|de\s+los|de\s+las)?\s*([\p{L}\s]+)\b",
];

const fn flag(name: &'static str, patterns: &'static [&'static str], handler: HandlerId) -> IntentSpec {
    IntentSpec {
        name,
        patterns,
        extraction: Extraction::Flag,
        handler,
    }
}

/// The default dispatch table, in priority order.
pub const DEFAULT_INTENTS: &[IntentSpec] = &[
    flag("menu", MENU_PATTERNS, HandlerId::ShowCategories),
    flag(
        "most_ordered_product",
        MOST_ORDERED_PRODUCT_PATTERNS,
        HandlerId::MostOrderedProduct,
    ),
    flag(
        "most_sold_drink",
        MOST_SOLD_DRINK_PATTERNS,
        HandlerId::MostSold(CategoryKind::Drink),
    ),
    flag(
        "most_sold_sport_drink",
        MOST_SOLD_SPORT_DRINK_PATTERNS,
        HandlerId::MostSold(CategoryKind::SportDrink),
    ),
    flag(
        "most_sold_breakfast",
        MOST_SOLD_BREAKFAST_PATTERNS,
        HandlerId::MostSold(CategoryKind::Breakfast),
    ),
    flag(
        "most_sold_starter",
        MOST_SOLD_STARTER_PATTERNS,
        HandlerId::MostSold(CategoryKind::Starter),
    ),
    flag(
        "most_sold_second_course",
        MOST_SOLD_SECOND_COURSE_PATTERNS,
        HandlerId::MostSold(CategoryKind::SecondCourse),
    ),
    flag(
        "most_sold_snack",
        MOST_SOLD_SNACK_PATTERNS,
        HandlerId::MostSold(CategoryKind::Snack),
    ),
    flag(
        "recommend_drink",
        RECOMMEND_DRINK_PATTERNS,
        HandlerId::RecommendByPrice(CategoryKind::Drink),
    ),
    flag(
        "recommend_sport_drink",
        RECOMMEND_SPORT_DRINK_PATTERNS,
        HandlerId::RecommendByPrice(CategoryKind::SportDrink),
    ),
    flag(
        "recommend_breakfast",
        RECOMMEND_BREAKFAST_PATTERNS,
        HandlerId::RecommendByPrice(CategoryKind::Breakfast),
    ),
    flag(
        "recommend_starter",
        RECOMMEND_STARTER_PATTERNS,
        HandlerId::RecommendByPrice(CategoryKind::Starter),
    ),
    flag(
        "recommend_second_course",
        RECOMMEND_SECOND_COURSE_PATTERNS,
        HandlerId::RecommendByPrice(CategoryKind::SecondCourse),
    ),
    flag(
        "recommend_snack",
        RECOMMEND_SNACK_PATTERNS,
        HandlerId::RecommendByPrice(CategoryKind::Snack),
    ),
    // Lunch recommendations answer with the best seller of the category.
    flag(
        "recommend_main",
        RECOMMEND_MAIN_PATTERNS,
        HandlerId::MostSold(CategoryKind::Main),
    ),
    IntentSpec {
        name: "product_by_name",
        patterns: PRODUCT_BY_NAME_PATTERNS,
        extraction: Extraction::Name,
        handler: HandlerId::ProductByName,
    },
    IntentSpec {
        name: "product_order",
        patterns: PRODUCT_ORDER_PATTERNS,
        extraction: Extraction::QuantityAndName,
        handler: HandlerId::StockForOrder,
    },
    IntentSpec {
        name: "product_quantity",
        patterns: PRODUCT_QUANTITY_PATTERNS,
        extraction: Extraction::StockLookup,
        handler: HandlerId::StockByProductName,
    },
    IntentSpec {
        name: "product_price",
        patterns: PRODUCT_PRICE_PATTERNS,
        extraction: Extraction::PriceLookup,
        handler: HandlerId::PriceByName,
    },
];

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Compiled, ordered intents plus the exit pattern set.
///
/// Built once at startup and shared read-only by every routing task.
#[derive(Debug, Clone)]
pub struct IntentCatalog {
    exit: Vec<Regex>,
    intents: Vec<IntentDescriptor>,
}

impl IntentCatalog {
    /// Compile the default dispatch table.
    pub fn new() -> Result<Self> {
        Self::from_specs(EXIT_PATTERNS, DEFAULT_INTENTS)
    }

    /// Compile the default table, then apply `intent name -> handler name`
    /// rebindings from configuration.
    pub fn with_bindings(bindings: &HashMap<String, String>) -> Result<Self> {
        let mut catalog = Self::new()?;
        for (intent, handler) in bindings {
            catalog.rebind(intent, handler.parse()?)?;
        }
        Ok(catalog)
    }

    /// Compile an arbitrary table.
    pub fn from_specs(exit: &[&str], specs: &[IntentSpec]) -> Result<Self> {
        let exit = compile_all("exit", exit, 0)?;
        let intents = specs
            .iter()
            .map(|spec| {
                Ok(IntentDescriptor {
                    name: spec.name,
                    patterns: compile_all(spec.name, spec.patterns, spec.extraction.captures())?,
                    extraction: spec.extraction,
                    handler: spec.handler,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(intents = intents.len(), "Compiled intent catalog");
        Ok(Self { exit, intents })
    }

    /// Bind an intent to a different handler with the same arity.
    pub fn rebind(&mut self, intent: &str, handler: HandlerId) -> Result<()> {
        let descriptor = self
            .intents
            .iter_mut()
            .find(|d| d.name == intent)
            .ok_or_else(|| IntentError::UnknownIntent(intent.to_string()))?;

        if handler.arity() != descriptor.extraction.captures() {
            return Err(IntentError::ArityMismatch {
                intent: intent.to_string(),
                handler: handler.to_string(),
                handler_arity: handler.arity(),
                extracted: descriptor.extraction.captures(),
            });
        }

        info!(intent, from = %descriptor.handler, to = %handler, "Rebound intent handler");
        descriptor.handler = handler;
        Ok(())
    }

    /// Intents in priority order.
    pub fn intents(&self) -> &[IntentDescriptor] {
        &self.intents
    }

    /// Whether the text asks to leave the chat.
    pub fn is_exit(&self, normalized: &str) -> bool {
        matcher::is_match(&self.exit, normalized)
    }

    /// Classify lower-cased text: exit first, then the first matching intent.
    pub fn classify(&self, normalized: &str) -> Classification<'_> {
        if self.is_exit(normalized) {
            return Classification::Exit;
        }

        self.intents
            .iter()
            .find_map(|intent| {
                matcher::find_first(&intent.patterns, normalized)
                    .map(|m| Classification::Intent(intent, m))
            })
            .unwrap_or(Classification::NoMatch)
    }
}

fn compile_all(intent: &str, sources: &[&str], needed: usize) -> Result<Vec<Regex>> {
    sources
        .iter()
        .map(|source| {
            let re = matcher::compile(source).map_err(|source| IntentError::InvalidPattern {
                intent: intent.to_string(),
                source,
            })?;
            let found = re.captures_len() - 1;
            if found < needed {
                return Err(IntentError::MissingCaptures {
                    intent: intent.to_string(),
                    pattern: source.to_string(),
                    needed,
                    found,
                });
            }
            Ok(re)
        })
        .collect()
}
