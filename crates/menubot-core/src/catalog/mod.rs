//! Menu catalog: records, the store trait, the JSON-backed store and the
//! handlers that answer intents from it.

pub mod error;
pub mod handlers;
pub mod model;
pub mod store;

use std::fmt;
use std::str::FromStr;

pub use error::CatalogError;
pub use handlers::CatalogHandlers;
pub use store::{CatalogStore, InMemoryCatalog};

/// Menu sections the intents know about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CategoryKind {
    Drink,
    SportDrink,
    Breakfast,
    Starter,
    SecondCourse,
    Snack,
    Main,
}

impl CategoryKind {
    pub const ALL: [CategoryKind; 7] = [
        Self::Drink,
        Self::SportDrink,
        Self::Breakfast,
        Self::Starter,
        Self::SecondCourse,
        Self::Snack,
        Self::Main,
    ];

    /// Stable name used in config and handler names.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Drink => "drink",
            Self::SportDrink => "sport_drink",
            Self::Breakfast => "breakfast",
            Self::Starter => "starter",
            Self::SecondCourse => "second_course",
            Self::Snack => "snack",
            Self::Main => "main",
        }
    }

    /// Category slug in the catalog unless overridden by `catalog.categorySlugs`.
    pub fn default_slug(&self) -> &'static str {
        match self {
            Self::Drink => "bebidas",
            Self::SportDrink => "bebidas-deportivas",
            Self::Breakfast => "desayunos",
            Self::Starter => "entradas",
            Self::SecondCourse => "segundos",
            Self::Snack => "snacks",
            Self::Main => "almuerzos",
        }
    }

    /// Plural label for replies.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Drink => "bebidas",
            Self::SportDrink => "bebidas deportivas",
            Self::Breakfast => "desayunos",
            Self::Starter => "entradas",
            Self::SecondCourse => "segundos",
            Self::Snack => "snacks",
            Self::Main => "almuerzos",
        }
    }
}

impl fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for CategoryKind {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.key() == s)
            .ok_or_else(|| CatalogError::UnknownCategoryKind(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_keys_round_trip() {
        for kind in CategoryKind::ALL {
            assert_eq!(kind.key().parse::<CategoryKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_kind() {
        assert!(matches!(
            "dessert".parse::<CategoryKind>(),
            Err(CatalogError::UnknownCategoryKind(k)) if k == "dessert"
        ));
    }
}
