//! Runtime checks of the loan_io tables against the columns the catalog reads

use serde::Serialize;

use crate::config::TablesConfig;
use crate::constants::{HISTORICAL_LOANS, RAW_TRANSACTIONS, REF_ACCOUNTING};
use crate::executor::QueryExecutor;
use crate::types::{ResultSet, Value};
use crate::warehouse::WarehouseClient;
use crate::Result;

/// Columns a table must expose for the built-in queries to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSchema {
    pub table: &'static str,
    pub key_columns: &'static [&'static str],
}

pub const TABLE_SCHEMAS: &[TableSchema] = &[
    TableSchema {
        table: HISTORICAL_LOANS,
        key_columns: &[
            "member_id",
            "loan_amnt",
            "loan_status",
            "grade",
            "purpose",
            "int_rate",
            "issue_d",
            "addr_state",
            "emp_length",
            "annual_inc",
        ],
    },
    TableSchema {
        table: RAW_TRANSACTIONS,
        key_columns: &[
            "id",
            "date",
            "type",
            "status",
            "purpose",
            "balance",
            "accrued_interest",
            "arrears_balance",
            "state_code",
            "accounting_treatment_id",
        ],
    },
    TableSchema {
        table: REF_ACCOUNTING,
        key_columns: &["id", "accounting_treatment"],
    },
];

/// Column as reported by `DESCRIBE TABLE`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableReport {
    pub table: String,
    pub full_name: String,
    pub columns: Vec<ColumnInfo>,
    pub missing: Vec<String>,
    /// Set when the table could not be described at all
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TableReport {
    pub const fn is_valid(&self) -> bool {
        self.error.is_none() && self.missing.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SchemaReport {
    pub valid: bool,
    pub tables: Vec<TableReport>,
}

/// Describe every loan_io table and report key columns it lacks
///
/// A table that cannot be described is reported, not returned as an error;
/// configuration errors still abort the whole check.
pub async fn validate_tables<W: WarehouseClient>(
    executor: &QueryExecutor<W>,
    tables: &TablesConfig,
) -> Result<SchemaReport> {
    let mut reports = Vec::with_capacity(TABLE_SCHEMAS.len());

    for schema in TABLE_SCHEMAS {
        let full_name = tables.qualified(schema.table)?;
        let report = match executor
            .execute_custom(&format!("DESCRIBE TABLE {full_name}"))
            .await
        {
            Ok(result) => {
                let columns = describe_columns(&result);
                let missing = missing_columns(schema, &columns);
                if missing.is_empty() {
                    tracing::info!(table = %full_name, columns = columns.len(), "Table schema ok");
                } else {
                    tracing::warn!(table = %full_name, missing = ?missing, "Table is missing key columns");
                }
                TableReport {
                    table: schema.table.to_string(),
                    full_name,
                    columns,
                    missing,
                    error: None,
                }
            }
            Err(e) if e.is_config() => return Err(e),
            Err(e) => {
                tracing::warn!(table = %full_name, error = %e, "Could not describe table");
                TableReport {
                    table: schema.table.to_string(),
                    full_name,
                    columns: Vec::new(),
                    missing: schema.key_columns.iter().map(ToString::to_string).collect(),
                    error: Some(e.to_string()),
                }
            }
        };
        reports.push(report);
    }

    Ok(SchemaReport {
        valid: reports.iter().all(TableReport::is_valid),
        tables: reports,
    })
}

/// Data columns of a `DESCRIBE TABLE` result
///
/// Stops at the first blank or `#` row, where partition and detail
/// sections begin.
fn describe_columns(result: &ResultSet) -> Vec<ColumnInfo> {
    result
        .rows
        .iter()
        .map_while(|row| {
            let name = row.get("col_name").and_then(Value::as_str)?.trim();
            if name.is_empty() || name.starts_with('#') {
                return None;
            }
            let data_type = row
                .get("data_type")
                .and_then(Value::as_str)
                .unwrap_or_default();
            Some(ColumnInfo {
                name: name.to_string(),
                data_type: data_type.to_string(),
            })
        })
        .collect()
}

fn missing_columns(schema: &TableSchema, columns: &[ColumnInfo]) -> Vec<String> {
    schema
        .key_columns
        .iter()
        .filter(|key| !columns.iter().any(|c| c.name.eq_ignore_ascii_case(key)))
        .map(ToString::to_string)
        .collect()
}
