//! Search results as produced by resources.

use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════════════
// HIT
// ═══════════════════════════════════════════════════════════════════════════════

/// A single search hit.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hit {
    /// Title shown to the user
    pub title: String,
    /// Link to the hit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Short snippet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Hit {
    /// Creates a hit with only a title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: None,
            description: None,
        }
    }

    /// Sets the URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SEARCH RESULT
// ═══════════════════════════════════════════════════════════════════════════════

/// The result of running a query against a resource.
///
/// Equality is domain equality: two results are equal when their hits are
/// equal, in order. The provenance fields (`query`, `resource_id`) are
/// annotations and do not make a result "changed".
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SearchResult {
    /// Ranked hits
    pub hits: Vec<Hit>,
    /// Query that produced this result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// Identity of the resource that produced this result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
}

impl SearchResult {
    /// Creates a result from ranked hits.
    pub fn new(hits: Vec<Hit>) -> Self {
        Self {
            hits,
            query: None,
            resource_id: None,
        }
    }

    /// Annotates the result with the query that produced it.
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Annotates the result with the resource that produced it.
    pub fn with_resource(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    /// Number of hits.
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Returns true if there are no hits.
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

impl PartialEq for SearchResult {
    fn eq(&self, other: &Self) -> bool {
        self.hits == other.hits
    }
}

impl Eq for SearchResult {}
