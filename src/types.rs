use serde::Deserialize;

/// A collection endpoint's body: either the paginated envelope or a bare array.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Listing<T> {
    Paginated {
        count: u64,
        #[serde(default)]
        next: Option<String>,
        #[serde(default)]
        previous: Option<String>,
        results: Vec<T>,
    },
    Bare(Vec<T>),
}

impl<T> Listing<T> {
    pub fn items(&self) -> &[T] {
        match self {
            Listing::Paginated { results, .. } => results,
            Listing::Bare(items) => items,
        }
    }

    pub fn into_items(self) -> Vec<T> {
        match self {
            Listing::Paginated { results, .. } => results,
            Listing::Bare(items) => items,
        }
    }

    /// Server-side total when paginated, otherwise the number of items.
    pub fn total(&self) -> u64 {
        match self {
            Listing::Paginated { count, .. } => *count,
            Listing::Bare(items) => items.len() as u64,
        }
    }
}
