use std::time::Duration;

use super::Tables;
use crate::query::definition::{QueryDefinition, QueryDomain};
use crate::query::value::{ParamKind, ParamSpec};
use crate::types::ColumnType::{Numeric, String as Text};

const BALANCE: &str = "CAST(COALESCE(balance, '0') AS DOUBLE)";
const ACCRUED_INTEREST: &str = "CAST(COALESCE(accrued_interest, '0') AS DOUBLE)";
const HAS_BALANCE: &str = "balance IS NOT NULL AND balance != ''";

/// Treatment lookups change rarely
const TREATMENT_TTL: Duration = Duration::from_secs(15 * 60);

pub(super) fn definitions(tables: &Tables) -> Vec<QueryDefinition> {
    let transactions = &tables.transactions;
    let accounting = &tables.accounting;

    vec![
        QueryDefinition::new(
            "accounting_treatment_analysis",
            QueryDomain::Accounting,
            format!(
                "SELECT
                    COALESCE(ra.accounting_treatment, 'Unknown') AS treatment_type,
                    COUNT(rt.id) AS transaction_count,
                    SUM(CAST(COALESCE(rt.balance, '0') AS DOUBLE)) AS total_balance,
                    AVG(CAST(COALESCE(rt.balance, '0') AS DOUBLE)) AS avg_balance,
                    SUM(CAST(COALESCE(rt.accrued_interest, '0') AS DOUBLE)) AS total_accrued_interest,
                    AVG(CAST(COALESCE(rt.accrued_interest, '0') AS DOUBLE)) AS avg_accrued_interest
                FROM {transactions} rt
                LEFT JOIN {accounting} ra
                    ON CAST(rt.accounting_treatment_id AS LONG) = ra.id
                WHERE rt.balance IS NOT NULL AND rt.balance != ''
                GROUP BY ra.accounting_treatment
                ORDER BY total_balance DESC"
            ),
        )
        .with_description("Accounting treatment analysis with lookups")
        .with_ttl(TREATMENT_TTL)
        .columns([
            ("treatment_type", Text),
            ("transaction_count", Numeric),
            ("total_balance", Numeric),
            ("avg_balance", Numeric),
            ("total_accrued_interest", Numeric),
            ("avg_accrued_interest", Numeric),
        ]),
        QueryDefinition::new(
            "balance_analysis",
            QueryDomain::Accounting,
            format!(
                "SELECT
                    COALESCE(type, 'Unknown') AS transaction_type,
                    COALESCE(status, 'Unknown') AS transaction_status,
                    COUNT(*) AS transaction_count,
                    SUM({BALANCE}) AS total_balance,
                    AVG({BALANCE}) AS avg_balance,
                    MIN({BALANCE}) AS min_balance,
                    MAX({BALANCE}) AS max_balance
                FROM {transactions}
                WHERE {HAS_BALANCE}
                GROUP BY type, status
                ORDER BY total_balance DESC"
            ),
        )
        .with_description("Balance analysis by type and status")
        .columns([
            ("transaction_type", Text),
            ("transaction_status", Text),
            ("transaction_count", Numeric),
            ("total_balance", Numeric),
            ("avg_balance", Numeric),
            ("min_balance", Numeric),
            ("max_balance", Numeric),
        ]),
        QueryDefinition::new(
            "accounting_by_state",
            QueryDomain::Accounting,
            format!(
                "SELECT
                    COALESCE(state_code, 'Unknown') AS state_code,
                    COUNT(*) AS transaction_count,
                    SUM({BALANCE}) AS total_balance,
                    AVG({BALANCE}) AS avg_balance,
                    SUM({ACCRUED_INTEREST}) AS total_accrued_interest,
                    COUNT(DISTINCT type) AS transaction_types
                FROM {transactions}
                WHERE {HAS_BALANCE} AND state_code IS NOT NULL
                GROUP BY state_code
                ORDER BY total_balance DESC
                LIMIT :limit"
            ),
        )
        .with_description("Accounting transactions by state")
        .param(
            ParamSpec::required("limit", ParamKind::integer(1, 60))
                .with_description("Maximum number of states")
                .with_default("60"),
        )
        .columns([
            ("state_code", Text),
            ("transaction_count", Numeric),
            ("total_balance", Numeric),
            ("avg_balance", Numeric),
            ("total_accrued_interest", Numeric),
            ("transaction_types", Numeric),
        ]),
        QueryDefinition::new(
            "interest_analysis",
            QueryDomain::Accounting,
            format!(
                "SELECT
                    COALESCE(type, 'Unknown') AS transaction_type,
                    COUNT(*) AS transaction_count,
                    SUM({ACCRUED_INTEREST}) AS total_accrued_interest,
                    AVG({ACCRUED_INTEREST}) AS avg_accrued_interest,
                    SUM({BALANCE}) AS total_balance,
                    CASE
                        WHEN SUM({BALANCE}) > 0
                        THEN SUM({ACCRUED_INTEREST}) / SUM({BALANCE}) * 100
                        ELSE 0
                    END AS interest_to_balance_ratio
                FROM {transactions}
                WHERE accrued_interest IS NOT NULL AND accrued_interest != ''
                    AND {HAS_BALANCE}
                GROUP BY type
                ORDER BY total_accrued_interest DESC"
            ),
        )
        .with_description("Accrued interest analysis")
        .columns([
            ("transaction_type", Text),
            ("transaction_count", Numeric),
            ("total_accrued_interest", Numeric),
            ("avg_accrued_interest", Numeric),
            ("total_balance", Numeric),
            ("interest_to_balance_ratio", Numeric),
        ]),
    ]
}
