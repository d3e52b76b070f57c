use std::path::PathBuf;

use thiserror::Error;

/// Errors from loading or querying the menu catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse catalog file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid catalog JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown category kind: {0}")]
    UnknownCategoryKind(String),

    #[error("product {product} references missing category {category}")]
    DanglingCategory { product: u32, category: u32 },

    #[error("order line {line} references missing {entity} {id}")]
    DanglingOrderLine {
        line: u32,
        entity: &'static str,
        id: u32,
    },
}

pub type Result<T> = std::result::Result<T, CatalogError>;
