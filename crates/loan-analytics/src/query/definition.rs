//! Named, parameterized query definitions

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

use super::value::{ParamKind, ParamSpec};
use crate::types::ColumnType;

/// Business domain a query belongs to; also the cache namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryDomain {
    Loan,
    Transaction,
    Accounting,
}

impl QueryDomain {
    pub const ALL: [Self; 3] = [Self::Loan, Self::Transaction, Self::Accounting];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Loan => "loan",
            Self::Transaction => "transaction",
            Self::Accounting => "accounting",
        }
    }
}

impl fmt::Display for QueryDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryDomain {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "loan" | "loans" => Ok(Self::Loan),
            "transaction" | "transactions" => Ok(Self::Transaction),
            "accounting" => Ok(Self::Accounting),
            other => Err(crate::Error::Config(format!("Unknown query domain: {other}"))),
        }
    }
}

/// Declared result column
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSpec {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnSpec {
    /// `name:type` form used in schema mismatch reports
    #[must_use]
    pub fn signature(&self) -> String {
        format!("{}:{}", self.name, self.column_type)
    }
}

/// Immutable description of one catalog query
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDefinition {
    name: String,
    domain: QueryDomain,
    description: String,
    template: String,
    params: Vec<ParamSpec>,
    columns: Vec<ColumnSpec>,
    ttl: Option<Duration>,
}

impl QueryDefinition {
    pub fn new(name: impl Into<String>, domain: QueryDomain, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain,
            description: String::new(),
            template: template.into(),
            params: Vec::new(),
            columns: Vec::new(),
            ttl: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    /// Shorthand for a required parameter without description
    #[must_use]
    pub fn required(self, name: &str, kind: ParamKind) -> Self {
        self.param(ParamSpec::required(name, kind))
    }

    #[must_use]
    pub fn column(mut self, name: impl Into<String>, column_type: ColumnType) -> Self {
        self.columns.push(ColumnSpec {
            name: name.into(),
            column_type,
        });
        self
    }

    #[must_use]
    pub fn columns<'a>(
        mut self,
        columns: impl IntoIterator<Item = (&'a str, ColumnType)>,
    ) -> Self {
        for (name, column_type) in columns {
            self = self.column(name, column_type);
        }
        self
    }

    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn domain(&self) -> QueryDomain {
        self.domain
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn param_spec(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn result_columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub const fn ttl(&self) -> Option<Duration> {
        self.ttl
    }
}

/// Catalog listing entry for the presentation layer
#[derive(Debug, Clone, Serialize)]
pub struct QueryInfo {
    pub name: String,
    pub domain: QueryDomain,
    pub description: String,
    pub parameters: Vec<ParamInfo>,
    pub columns: Vec<ColumnSpec>,
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParamInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl From<&ParamSpec> for ParamInfo {
    fn from(spec: &ParamSpec) -> Self {
        Self {
            name: spec.name.clone(),
            kind: spec.kind.to_string(),
            required: spec.is_required(),
            default: spec.default.clone(),
            description: spec.description.clone(),
        }
    }
}
