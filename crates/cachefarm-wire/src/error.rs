use thiserror::Error;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed entry at index {index}: {source}")]
    Malformed {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("expected a json array, found {found}")]
    NotAnArray { found: &'static str },
}

impl WireError {
    pub fn malformed(index: usize, source: serde_json::Error) -> Self {
        Self::Malformed { index, source }
    }
}
