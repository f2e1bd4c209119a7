use super::{
    ARREARS_AMOUNT, NON_ZERO_BALANCE, TRANSACTION_BALANCE, TRANSACTION_DATE, TRANSACTION_INTEREST,
    TRANSACTION_STATUSES, Tables,
};
use crate::query::definition::{QueryDefinition, QueryDomain};
use crate::query::value::{ParamKind, ParamSpec};
use crate::types::ColumnType::{Numeric, String as Text};

pub(super) fn definitions(tables: &Tables) -> Vec<QueryDefinition> {
    let transactions = &tables.transactions;

    vec![
        QueryDefinition::new(
            "transaction_summary",
            QueryDomain::Transaction,
            format!(
                "SELECT
                    COUNT(*) AS total_transactions,
                    COUNT(DISTINCT accounting_treatment_id) AS unique_treatments,
                    AVG({TRANSACTION_BALANCE}) AS avg_balance,
                    SUM({TRANSACTION_BALANCE}) AS total_balance,
                    COUNT(DISTINCT status) AS unique_statuses,
                    COUNT(DISTINCT type) AS unique_types,
                    COUNT(DISTINCT purpose) AS unique_purposes
                FROM {transactions}
                WHERE {NON_ZERO_BALANCE}
                    AND {TRANSACTION_DATE} BETWEEN :start_date AND :end_date"
            ),
        )
        .with_description("Overall accounting transaction summary")
        .param(
            ParamSpec::required("start_date", ParamKind::Date)
                .with_description("First transaction date to include"),
        )
        .param(
            ParamSpec::required("end_date", ParamKind::Date)
                .with_description("Last transaction date to include"),
        )
        .columns([
            ("total_transactions", Numeric),
            ("unique_treatments", Numeric),
            ("avg_balance", Numeric),
            ("total_balance", Numeric),
            ("unique_statuses", Numeric),
            ("unique_types", Numeric),
            ("unique_purposes", Numeric),
        ]),
        QueryDefinition::new(
            "transaction_by_status",
            QueryDomain::Transaction,
            format!(
                "SELECT
                    COALESCE(status, 'Unknown') AS transaction_status,
                    COUNT(*) AS transaction_count,
                    AVG({TRANSACTION_BALANCE}) AS avg_balance,
                    SUM({TRANSACTION_BALANCE}) AS total_balance,
                    AVG({TRANSACTION_INTEREST}) AS avg_accrued_interest,
                    ROUND(COUNT(*) * 100.0 / SUM(COUNT(*)) OVER (), 2) AS percentage
                FROM {transactions}
                WHERE {NON_ZERO_BALANCE}
                GROUP BY status
                ORDER BY transaction_count DESC"
            ),
        )
        .with_description("Accounting transactions by status")
        .columns([
            ("transaction_status", Text),
            ("transaction_count", Numeric),
            ("avg_balance", Numeric),
            ("total_balance", Numeric),
            ("avg_accrued_interest", Numeric),
            ("percentage", Numeric),
        ]),
        QueryDefinition::new(
            "transaction_by_purpose",
            QueryDomain::Transaction,
            format!(
                "SELECT
                    COALESCE(purpose, 'Unknown') AS transaction_purpose,
                    COUNT(*) AS transaction_count,
                    AVG({TRANSACTION_BALANCE}) AS avg_balance,
                    SUM({TRANSACTION_BALANCE}) AS total_balance,
                    AVG({TRANSACTION_INTEREST}) AS avg_accrued_interest,
                    ROUND(COUNT(*) * 100.0 / SUM(COUNT(*)) OVER (), 2) AS percentage
                FROM {transactions}
                WHERE {NON_ZERO_BALANCE} AND purpose IS NOT NULL
                GROUP BY purpose
                ORDER BY transaction_count DESC
                LIMIT :limit"
            ),
        )
        .with_description("Accounting transactions by purpose")
        .param(
            ParamSpec::required("limit", ParamKind::integer(1, 500))
                .with_description("Maximum number of purposes")
                .with_default("50"),
        )
        .columns([
            ("transaction_purpose", Text),
            ("transaction_count", Numeric),
            ("avg_balance", Numeric),
            ("total_balance", Numeric),
            ("avg_accrued_interest", Numeric),
            ("percentage", Numeric),
        ]),
        QueryDefinition::new(
            "payment_analysis",
            QueryDomain::Transaction,
            format!(
                "SELECT
                    COALESCE(type, 'Unknown') AS transaction_type,
                    COUNT(*) AS transaction_count,
                    AVG({TRANSACTION_BALANCE}) AS avg_balance,
                    SUM({TRANSACTION_BALANCE}) AS total_balance,
                    AVG({TRANSACTION_INTEREST}) AS avg_accrued_interest,
                    SUM({TRANSACTION_INTEREST}) AS total_accrued_interest,
                    AVG({ARREARS_AMOUNT}) AS avg_arrears,
                    COUNT(DISTINCT accounting_treatment_id) AS unique_treatments
                FROM {transactions}
                WHERE {NON_ZERO_BALANCE}
                    AND LOWER(COALESCE(status, 'other')) = :status
                GROUP BY type
                ORDER BY total_balance DESC"
            ),
        )
        .with_description("Accounting analysis by transaction type")
        .param(
            ParamSpec::required("status", ParamKind::Enum(TRANSACTION_STATUSES))
                .with_description("Transaction status to analyse"),
        )
        .columns([
            ("transaction_type", Text),
            ("transaction_count", Numeric),
            ("avg_balance", Numeric),
            ("total_balance", Numeric),
            ("avg_accrued_interest", Numeric),
            ("total_accrued_interest", Numeric),
            ("avg_arrears", Numeric),
            ("unique_treatments", Numeric),
        ]),
    ]
}
