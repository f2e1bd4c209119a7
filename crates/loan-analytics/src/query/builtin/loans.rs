use super::{INTEREST_RATE, ISSUE_DATE, LOAN_AMOUNT, LOAN_GRADES, Tables, VALID_LOANS};
use crate::query::definition::{QueryDefinition, QueryDomain};
use crate::query::value::{ParamKind, ParamSpec};
use crate::types::ColumnType::{Date, Numeric, String as Text};

fn start_date() -> ParamSpec {
    ParamSpec::required("start_date", ParamKind::Date)
        .with_description("Only loans issued on or after this date")
}

fn limit(default: &str, max: i64) -> ParamSpec {
    ParamSpec::required("limit", ParamKind::integer(1, max))
        .with_description("Maximum number of rows")
        .with_default(default)
}

pub(super) fn definitions(tables: &Tables) -> Vec<QueryDefinition> {
    let loans = &tables.loans;

    vec![
        QueryDefinition::new(
            "loan_summary",
            QueryDomain::Loan,
            format!(
                "SELECT
                    COUNT(*) AS total_loans,
                    AVG({LOAN_AMOUNT}) AS avg_loan_amount,
                    SUM({LOAN_AMOUNT}) AS total_loan_amount,
                    COUNT(DISTINCT member_id) AS unique_borrowers,
                    COUNT(DISTINCT grade) AS unique_grades,
                    MIN({LOAN_AMOUNT}) AS min_loan_amount,
                    MAX({LOAN_AMOUNT}) AS max_loan_amount,
                    STDDEV({LOAN_AMOUNT}) AS loan_amount_stddev
                FROM {loans}
                WHERE {VALID_LOANS}"
            ),
        )
        .with_description("Overall loan portfolio summary with key metrics")
        .columns([
            ("total_loans", Numeric),
            ("avg_loan_amount", Numeric),
            ("total_loan_amount", Numeric),
            ("unique_borrowers", Numeric),
            ("unique_grades", Numeric),
            ("min_loan_amount", Numeric),
            ("max_loan_amount", Numeric),
            ("loan_amount_stddev", Numeric),
        ]),
        QueryDefinition::new(
            "loan_status_distribution",
            QueryDomain::Loan,
            format!(
                "SELECT
                    loan_status,
                    COUNT(*) AS count,
                    AVG({LOAN_AMOUNT}) AS avg_amount,
                    SUM({LOAN_AMOUNT}) AS total_amount,
                    ROUND(COUNT(*) * 100.0 / SUM(COUNT(*)) OVER (), 2) AS percentage
                FROM {loans}
                WHERE {VALID_LOANS}
                    AND loan_status IS NOT NULL
                    AND {ISSUE_DATE} >= :start_date
                GROUP BY loan_status
                ORDER BY count DESC"
            ),
        )
        .with_description("Distribution of loans by status")
        .param(start_date())
        .columns([
            ("loan_status", Text),
            ("count", Numeric),
            ("avg_amount", Numeric),
            ("total_amount", Numeric),
            ("percentage", Numeric),
        ]),
        QueryDefinition::new(
            "grade_analysis",
            QueryDomain::Loan,
            format!(
                "SELECT
                    grade,
                    COUNT(*) AS loan_count,
                    AVG({LOAN_AMOUNT}) AS avg_loan_amount,
                    SUM({LOAN_AMOUNT}) AS total_amount,
                    AVG({INTEREST_RATE}) AS avg_interest_rate,
                    AVG(annual_inc) AS avg_annual_income,
                    AVG(dti) AS avg_debt_to_income,
                    ROUND(COUNT(*) * 100.0 / SUM(COUNT(*)) OVER (), 2) AS percentage
                FROM {loans}
                WHERE {VALID_LOANS}
                    AND grade IS NOT NULL AND grade != ''
                    AND {ISSUE_DATE} >= :start_date
                GROUP BY grade
                ORDER BY grade"
            ),
        )
        .with_description("Analysis by loan grade (A-G)")
        .param(start_date())
        .columns([
            ("grade", Text),
            ("loan_count", Numeric),
            ("avg_loan_amount", Numeric),
            ("total_amount", Numeric),
            ("avg_interest_rate", Numeric),
            ("avg_annual_income", Numeric),
            ("avg_debt_to_income", Numeric),
            ("percentage", Numeric),
        ]),
        QueryDefinition::new(
            "purpose_analysis",
            QueryDomain::Loan,
            format!(
                "SELECT
                    purpose,
                    COUNT(*) AS loan_count,
                    AVG({LOAN_AMOUNT}) AS avg_loan_amount,
                    SUM({LOAN_AMOUNT}) AS total_amount,
                    AVG({INTEREST_RATE}) AS avg_interest_rate,
                    ROUND(COUNT(*) * 100.0 / SUM(COUNT(*)) OVER (), 2) AS percentage
                FROM {loans}
                WHERE {VALID_LOANS}
                    AND purpose IS NOT NULL AND purpose != ''
                    AND {ISSUE_DATE} >= :start_date
                GROUP BY purpose
                ORDER BY loan_count DESC
                LIMIT :limit"
            ),
        )
        .with_description("Analysis by loan purpose")
        .param(start_date())
        .param(limit("20", 100))
        .columns([
            ("purpose", Text),
            ("loan_count", Numeric),
            ("avg_loan_amount", Numeric),
            ("total_amount", Numeric),
            ("avg_interest_rate", Numeric),
            ("percentage", Numeric),
        ]),
        QueryDefinition::new(
            "state_distribution",
            QueryDomain::Loan,
            format!(
                "SELECT
                    addr_state,
                    COUNT(*) AS loan_count,
                    AVG({LOAN_AMOUNT}) AS avg_loan_amount,
                    SUM({LOAN_AMOUNT}) AS total_amount,
                    AVG({INTEREST_RATE}) AS avg_interest_rate,
                    AVG(annual_inc) AS avg_annual_income
                FROM {loans}
                WHERE {VALID_LOANS}
                    AND addr_state IS NOT NULL AND addr_state != ''
                GROUP BY addr_state
                ORDER BY loan_count DESC
                LIMIT :limit"
            ),
        )
        .with_description("Geographic distribution by state")
        .param(limit("60", 60))
        .columns([
            ("addr_state", Text),
            ("loan_count", Numeric),
            ("avg_loan_amount", Numeric),
            ("total_amount", Numeric),
            ("avg_interest_rate", Numeric),
            ("avg_annual_income", Numeric),
        ]),
        QueryDefinition::new(
            "monthly_loan_trend",
            QueryDomain::Loan,
            format!(
                "SELECT
                    {ISSUE_DATE} AS month,
                    COUNT(*) AS loan_count,
                    SUM({LOAN_AMOUNT}) AS total_amount,
                    AVG({LOAN_AMOUNT}) AS avg_amount,
                    AVG({INTEREST_RATE}) AS avg_interest_rate
                FROM {loans}
                WHERE {VALID_LOANS}
                    AND issue_d IS NOT NULL
                    AND {ISSUE_DATE} BETWEEN :start_date AND :end_date
                GROUP BY {ISSUE_DATE}
                ORDER BY month
                LIMIT :limit"
            ),
        )
        .with_description("Monthly loan origination trends")
        .param(start_date())
        .param(
            ParamSpec::required("end_date", ParamKind::Date)
                .with_description("Only loans issued on or before this date"),
        )
        .param(limit("50", 120))
        .columns([
            ("month", Date),
            ("loan_count", Numeric),
            ("total_amount", Numeric),
            ("avg_amount", Numeric),
            ("avg_interest_rate", Numeric),
        ]),
        QueryDefinition::new(
            "risk_analysis",
            QueryDomain::Loan,
            format!(
                "SELECT
                    grade,
                    loan_status,
                    COUNT(*) AS loan_count,
                    AVG({LOAN_AMOUNT}) AS avg_loan_amount,
                    AVG({INTEREST_RATE}) AS avg_interest_rate,
                    AVG(dti) AS avg_debt_to_income,
                    ROUND(COUNT(*) * 100.0 / SUM(COUNT(*)) OVER (PARTITION BY grade), 2)
                        AS status_percentage_in_grade
                FROM {loans}
                WHERE {VALID_LOANS}
                    AND grade = :grade
                    AND loan_status IS NOT NULL
                GROUP BY grade, loan_status
                ORDER BY grade, loan_count DESC"
            ),
        )
        .with_description("Risk analysis by grade and status")
        .param(
            ParamSpec::required("grade", ParamKind::Enum(LOAN_GRADES))
                .with_description("Loan grade to analyse"),
        )
        .columns([
            ("grade", Text),
            ("loan_status", Text),
            ("loan_count", Numeric),
            ("avg_loan_amount", Numeric),
            ("avg_interest_rate", Numeric),
            ("avg_debt_to_income", Numeric),
            ("status_percentage_in_grade", Numeric),
        ]),
        QueryDefinition::new(
            "employment_analysis",
            QueryDomain::Loan,
            format!(
                "SELECT
                    CASE
                        WHEN emp_length = '< 1 year' THEN '< 1 year'
                        WHEN emp_length = '1 year' THEN '1 year'
                        WHEN emp_length IN ('2 years', '3 years', '4 years') THEN '2-4 years'
                        WHEN emp_length IN ('5 years', '6 years', '7 years', '8 years', '9 years')
                            THEN '5-9 years'
                        WHEN emp_length = '10+ years' THEN '10+ years'
                        ELSE 'Unknown'
                    END AS emp_length_group,
                    COUNT(*) AS loan_count,
                    AVG({LOAN_AMOUNT}) AS avg_loan_amount,
                    AVG(annual_inc) AS avg_annual_income,
                    AVG({INTEREST_RATE}) AS avg_interest_rate,
                    AVG(dti) AS avg_debt_to_income
                FROM {loans}
                WHERE {VALID_LOANS}
                GROUP BY emp_length_group
                ORDER BY
                    CASE emp_length_group
                        WHEN '< 1 year' THEN 1
                        WHEN '1 year' THEN 2
                        WHEN '2-4 years' THEN 3
                        WHEN '5-9 years' THEN 4
                        WHEN '10+ years' THEN 5
                        ELSE 6
                    END"
            ),
        )
        .with_description("Analysis by employment length")
        .columns([
            ("emp_length_group", Text),
            ("loan_count", Numeric),
            ("avg_loan_amount", Numeric),
            ("avg_annual_income", Numeric),
            ("avg_interest_rate", Numeric),
            ("avg_debt_to_income", Numeric),
        ]),
    ]
}
