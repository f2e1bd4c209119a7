//! Built-in dashboard queries over the loan_io tables

mod accounting;
mod loans;
mod transactions;

use super::catalog::QueryCatalog;
use crate::config::TablesConfig;
use crate::constants::{HISTORICAL_LOANS, RAW_TRANSACTIONS, REF_ACCOUNTING};
use crate::error::Result;

/// Older dashboard names kept working as aliases
pub const ALIASES: &[(&str, &str)] = &[
    ("overview", "loan_summary"),
    ("loan_status", "loan_status_distribution"),
    ("monthly_trends", "monthly_loan_trend"),
    ("transactions", "transaction_summary"),
    ("accounting", "accounting_treatment_analysis"),
];

/// Grades accepted by `risk_analysis`
pub const LOAN_GRADES: &[&str] = &["A", "B", "C", "D", "E", "F", "G"];

/// Statuses accepted by `payment_analysis`
pub const TRANSACTION_STATUSES: &[&str] = &[
    "active",
    "cancelled",
    "cancelled_payout_agreed",
    "transactional",
    "other",
];

// Column expressions shared by several templates
const LOAN_AMOUNT: &str = "CAST(loan_amnt AS DOUBLE)";
const INTEREST_RATE: &str = "CAST(REPLACE(int_rate, '%', '') AS DOUBLE)";
const ISSUE_DATE: &str = "TO_DATE(issue_d, 'MMM-yyyy')";
const VALID_LOANS: &str = "loan_amnt IS NOT NULL AND CAST(loan_amnt AS DOUBLE) > 0";
const TRANSACTION_BALANCE: &str = "CAST(balance AS DOUBLE)";
const TRANSACTION_INTEREST: &str = "CAST(accrued_interest AS DOUBLE)";
const ARREARS_AMOUNT: &str = "CAST(arrears_balance AS DOUBLE)";
const TRANSACTION_DATE: &str = "TO_DATE(date, 'yyyy-MM-dd')";
const NON_ZERO_BALANCE: &str = "balance IS NOT NULL AND CAST(balance AS DOUBLE) != 0";

/// Fully qualified names of the tables the templates read
#[derive(Debug, Clone)]
pub(super) struct Tables {
    pub loans: String,
    pub transactions: String,
    pub accounting: String,
}

impl Tables {
    fn resolve(config: &TablesConfig) -> Result<Self> {
        Ok(Self {
            loans: config.qualified(HISTORICAL_LOANS)?,
            transactions: config.qualified(RAW_TRANSACTIONS)?,
            accounting: config.qualified(REF_ACCOUNTING)?,
        })
    }
}

/// Register every built-in query and alias
pub fn register_all(catalog: &mut QueryCatalog, config: &TablesConfig) -> Result<()> {
    let tables = Tables::resolve(config)?;

    let definitions = loans::definitions(&tables)
        .into_iter()
        .chain(transactions::definitions(&tables))
        .chain(accounting::definitions(&tables));
    for definition in definitions {
        catalog.register(definition)?;
    }

    for (alias, target) in ALIASES {
        catalog.register_alias(alias, target)?;
    }

    tracing::debug!(
        queries = catalog.len(),
        aliases = ALIASES.len(),
        catalog = %config.catalog,
        schema = %config.schema,
        "Built-in query catalog ready"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;

    use super::*;
    use crate::query::binder::bind;
    use crate::query::definition::QueryDomain;

    fn catalog() -> QueryCatalog {
        QueryCatalog::builtin(&TablesConfig::default()).unwrap()
    }

    #[test]
    fn test_builtin_registers_sixteen_queries() {
        let catalog = catalog();
        assert_eq!(catalog.len(), 16);
        assert_eq!(catalog.in_domain(QueryDomain::Loan).count(), 8);
        assert_eq!(catalog.in_domain(QueryDomain::Transaction).count(), 4);
        assert_eq!(catalog.in_domain(QueryDomain::Accounting).count(), 4);
    }

    #[test]
    fn test_aliases_resolve() {
        let catalog = catalog();
        for (alias, target) in ALIASES {
            assert_eq!(catalog.lookup(alias).unwrap().name(), *target);
        }
    }

    #[test]
    fn test_templates_use_configured_tables() {
        let tables = TablesConfig {
            catalog: "main".into(),
            schema: "lending".into(),
        };
        let catalog = QueryCatalog::builtin(&tables).unwrap();
        let def = catalog.lookup("loan_summary").unwrap();
        assert!(def.template().contains("main.lending.historical_loans"));
        let def = catalog.lookup("accounting_treatment_analysis").unwrap();
        assert!(def.template().contains("main.lending.ref_accounting"));
    }

    #[test]
    fn test_rejects_invalid_table_config() {
        let tables = TablesConfig {
            catalog: "main; DROP".into(),
            schema: "lending".into(),
        };
        assert!(QueryCatalog::builtin(&tables).unwrap_err().is_config());
    }

    #[test]
    fn test_every_query_declares_columns() {
        for def in catalog().definitions() {
            assert!(!def.result_columns().is_empty(), "{}", def.name());
            assert!(!def.description().is_empty(), "{}", def.name());
        }
    }

    #[test]
    fn test_loan_status_distribution_binds_start_date() {
        let catalog = catalog();
        let def = catalog.lookup("loan_status_distribution").unwrap();
        let raw: BTreeMap<_, _> = [("start_date".to_string(), json!("2023-01-01"))].into();
        let resolved = bind(&def, &raw).unwrap();
        let sql = resolved.render_sql(def.template());
        assert!(sql.contains("DATE'2023-01-01'"));
        assert!(!sql.contains(":start_date"));
    }

    #[test]
    fn test_limit_defaults_apply() {
        let catalog = catalog();
        let def = catalog.lookup("state_distribution").unwrap();
        let resolved = bind(&def, &BTreeMap::new()).unwrap();
        assert!(resolved.get("limit").is_some());
    }

    #[test]
    fn test_risk_analysis_grade_enum() {
        let catalog = catalog();
        let def = catalog.lookup("risk_analysis").unwrap();
        let ok: BTreeMap<_, _> = [("grade".to_string(), json!("b"))].into();
        assert!(bind(&def, &ok).is_ok());
        let bad: BTreeMap<_, _> = [("grade".to_string(), json!("H"))].into();
        assert!(bind(&def, &bad).unwrap_err().is_validation());
    }
}
