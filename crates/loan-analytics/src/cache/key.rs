//! Cache key types

use std::fmt;

use crate::query::{QueryDefinition, QueryDomain, ResolvedParameters};

/// Key of one cached result: domain namespace, canonical query name and
/// canonical parameter encoding
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    domain: QueryDomain,
    query: String,
    params: String,
}

impl CacheKey {
    pub fn new(domain: QueryDomain, query: impl Into<String>, params: impl Into<String>) -> Self {
        Self {
            domain,
            query: query.into(),
            params: params.into(),
        }
    }

    /// Key for a definition bound to resolved parameters
    ///
    /// Uses the definition's canonical name, so aliases share entries.
    #[must_use]
    pub fn for_query(definition: &QueryDefinition, params: &ResolvedParameters) -> Self {
        Self::new(definition.domain(), definition.name(), params.canonical())
    }

    pub const fn domain(&self) -> QueryDomain {
        self.domain
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn params(&self) -> &str {
        &self.params
    }

    /// Prefix shared by every key in a domain
    #[must_use]
    pub fn domain_prefix(domain: QueryDomain) -> String {
        format!("{}:", domain.as_str())
    }

    /// Prefix shared by every parameterization of one query
    #[must_use]
    pub fn query_prefix(domain: QueryDomain, query: &str) -> String {
        format!("{}:{query}:", domain.as_str())
    }

    #[must_use]
    pub fn to_key_string(&self) -> String {
        self.to_string()
    }

    pub fn starts_with(&self, prefix: &str) -> bool {
        self.to_key_string().starts_with(prefix)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.domain.as_str(), self.query, self.params)
    }
}
