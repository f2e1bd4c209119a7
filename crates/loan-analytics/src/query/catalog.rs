//! Registry of named query definitions

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use super::binder::{RawParams, bind};
use super::definition::{ParamInfo, QueryDefinition, QueryDomain, QueryInfo};
use super::placeholder;
use crate::config::TablesConfig;
use crate::error::{Error, Result};
use crate::validation::is_valid_identifier;

/// Fixed registry of query definitions, populated at startup
///
/// Registration needs `&mut self`; once the catalog is shared behind an
/// `Arc` it is read-only.
#[derive(Debug, Default)]
pub struct QueryCatalog {
    queries: HashMap<String, Arc<QueryDefinition>>,
    aliases: HashMap<String, String>,
    order: Vec<String>,
}

impl QueryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog holding every built-in loan, transaction and accounting query
    pub fn builtin(tables: &TablesConfig) -> Result<Self> {
        let mut catalog = Self::new();
        super::builtin::register_all(&mut catalog, tables)?;
        Ok(catalog)
    }

    /// Register a definition after checking its template against its parameters
    pub fn register(&mut self, definition: QueryDefinition) -> Result<()> {
        let name = definition.name().to_string();
        if self.queries.contains_key(&name) || self.aliases.contains_key(&name) {
            return Err(Error::DuplicateQuery(name));
        }
        check_definition(&definition)?;

        tracing::debug!(query = %name, domain = %definition.domain(), "Registered query");
        self.order.push(name.clone());
        self.queries.insert(name, Arc::new(definition));
        Ok(())
    }

    /// Register an alternative name for an already registered query
    pub fn register_alias(&mut self, alias: &str, target: &str) -> Result<()> {
        if self.queries.contains_key(alias) || self.aliases.contains_key(alias) {
            return Err(Error::DuplicateQuery(alias.to_string()));
        }
        if !self.queries.contains_key(target) {
            return Err(Error::UnknownQuery(target.to_string()));
        }
        self.aliases.insert(alias.to_string(), target.to_string());
        Ok(())
    }

    /// Resolve a query or alias name to its definition
    pub fn lookup(&self, name: &str) -> Result<Arc<QueryDefinition>> {
        let canonical = self.aliases.get(name).map_or(name, String::as_str);
        self.queries
            .get(canonical)
            .cloned()
            .ok_or_else(|| Error::UnknownQuery(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_ok()
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// Canonical query names in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Definitions in registration order
    pub fn definitions(&self) -> impl Iterator<Item = &Arc<QueryDefinition>> {
        self.order.iter().filter_map(|name| self.queries.get(name))
    }

    pub fn in_domain(&self, domain: QueryDomain) -> impl Iterator<Item = &Arc<QueryDefinition>> {
        self.definitions().filter(move |d| d.domain() == domain)
    }

    /// Listing for the presentation layer
    pub fn describe(&self) -> Vec<QueryInfo> {
        self.definitions()
            .map(|def| {
                let mut aliases: Vec<String> = self
                    .aliases
                    .iter()
                    .filter(|(_, target)| target.as_str() == def.name())
                    .map(|(alias, _)| alias.clone())
                    .collect();
                aliases.sort();
                QueryInfo {
                    name: def.name().to_string(),
                    domain: def.domain(),
                    description: def.description().to_string(),
                    parameters: def.params().iter().map(ParamInfo::from).collect(),
                    columns: def.result_columns().to_vec(),
                    aliases,
                }
            })
            .collect()
    }
}

fn check_definition(definition: &QueryDefinition) -> Result<()> {
    let name = definition.name();
    if !is_valid_identifier(name) {
        return Err(Error::Config(format!("Invalid query name: '{name}'")));
    }

    let mut declared = BTreeSet::new();
    for spec in definition.params() {
        if !declared.insert(spec.name.clone()) {
            return Err(Error::Config(format!(
                "Query '{name}' declares parameter '{}' twice",
                spec.name
            )));
        }
    }

    let used = placeholder::names(definition.template());
    if used != declared {
        let undeclared: Vec<_> = used.difference(&declared).cloned().collect();
        let unused: Vec<_> = declared.difference(&used).cloned().collect();
        return Err(Error::Config(format!(
            "Query '{name}' placeholders do not match declared parameters \
             (undeclared: [{}], unused: [{}])",
            undeclared.join(", "),
            unused.join(", ")
        )));
    }

    let mut columns = BTreeSet::new();
    for column in definition.result_columns() {
        if !columns.insert(column.name.as_str()) {
            return Err(Error::Config(format!(
                "Query '{name}' declares result column '{}' twice",
                column.name
            )));
        }
    }

    // defaults must themselves pass validation
    for spec in definition.params().iter().filter(|p| !p.is_required()) {
        let candidate = QueryDefinition::new(name, definition.domain(), "").param(spec.clone());
        bind(&candidate, &RawParams::new())
            .map_err(|e| Error::Config(format!("Query '{name}' has an invalid default: {e}")))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::value::{ParamKind, ParamSpec};
    use crate::types::ColumnType;

    fn simple(name: &str) -> QueryDefinition {
        QueryDefinition::new(name, QueryDomain::Loan, "SELECT COUNT(*) AS n FROM t")
            .column("n", ColumnType::Numeric)
    }

    #[test]
    fn test_register_and_lookup() {
        let mut catalog = QueryCatalog::new();
        catalog.register(simple("loan_count")).unwrap();
        assert_eq!(catalog.lookup("loan_count").unwrap().name(), "loan_count");
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_register_duplicate() {
        let mut catalog = QueryCatalog::new();
        catalog.register(simple("loan_count")).unwrap();
        let err = catalog.register(simple("loan_count")).unwrap_err();
        assert!(matches!(err, Error::DuplicateQuery(ref n) if n == "loan_count"));
    }

    #[test]
    fn test_lookup_unknown() {
        let catalog = QueryCatalog::new();
        let err = catalog.lookup("nonexistent_query").unwrap_err();
        assert!(err.is_unknown_query());
        assert_eq!(err.identifier(), Some("nonexistent_query"));
    }

    #[test]
    fn test_alias_resolves_to_canonical() {
        let mut catalog = QueryCatalog::new();
        catalog.register(simple("loan_summary")).unwrap();
        catalog.register_alias("overview", "loan_summary").unwrap();

        assert_eq!(catalog.lookup("overview").unwrap().name(), "loan_summary");
        assert!(catalog.register_alias("overview", "loan_summary").is_err());
        assert!(catalog.register_alias("x", "missing").unwrap_err().is_unknown_query());
        assert!(matches!(
            catalog.register(simple("overview")).unwrap_err(),
            Error::DuplicateQuery(_)
        ));
        assert_eq!(catalog.describe()[0].aliases, vec!["overview"]);
    }

    #[test]
    fn test_register_rejects_undeclared_placeholder() {
        let mut catalog = QueryCatalog::new();
        let def = QueryDefinition::new("q", QueryDomain::Loan, "SELECT * FROM t LIMIT :limit");
        let err = catalog.register(def).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("undeclared: [limit]"));
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_register_rejects_unused_parameter() {
        let mut catalog = QueryCatalog::new();
        let def = QueryDefinition::new("q", QueryDomain::Loan, "SELECT 1")
            .required("grade", ParamKind::Enum(&["A"]));
        assert!(catalog.register(def).unwrap_err().is_config());
    }

    #[test]
    fn test_register_rejects_invalid_default() {
        let mut catalog = QueryCatalog::new();
        let def = QueryDefinition::new("q", QueryDomain::Loan, "SELECT :d, :limit")
            .required("d", ParamKind::Date)
            .param(ParamSpec::required("limit", ParamKind::integer(1, 10)).with_default("50"));
        let err = catalog.register(def).unwrap_err();
        assert!(err.to_string().contains("invalid default"));
    }

    #[test]
    fn test_register_rejects_bad_name() {
        let mut catalog = QueryCatalog::new();
        assert!(catalog.register(simple("bad-name")).is_err());
    }

    #[test]
    fn test_names_in_registration_order() {
        let mut catalog = QueryCatalog::new();
        catalog.register(simple("b")).unwrap();
        catalog.register(simple("a")).unwrap();
        assert_eq!(catalog.names().collect::<Vec<_>>(), vec!["b", "a"]);
    }
}
