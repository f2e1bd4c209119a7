//! Constants shared across the query layer

/// SQL statement used as the application-level liveness check
pub const HEALTH_CHECK_QUERY: &str = "SELECT 1 AS ok";

/// Default Unity Catalog catalog holding the loan dataset
pub const DEFAULT_CATALOG: &str = "efeld_cuj";

/// Default schema holding the loan dataset
pub const DEFAULT_SCHEMA: &str = "loan_io";

/// Loan-level facts table
pub const HISTORICAL_LOANS: &str = "historical_loans";

/// Accounting transactions table
pub const RAW_TRANSACTIONS: &str = "raw_transactions";

/// Accounting treatment lookup table
pub const REF_ACCOUNTING: &str = "ref_accounting";

/// All tables the built-in catalog reads from
pub const LOAN_IO_TABLES: &[&str] = &[HISTORICAL_LOANS, RAW_TRANSACTIONS, REF_ACCOUNTING];

/// Date format accepted for date parameters
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Connection status: success
pub const STATUS_OK: &str = "ok";

/// Connection status: failure
pub const STATUS_UNHEALTHY: &str = "unhealthy";

/// Service name used in logs and cache spans
pub const SERVICE_NAME: &str = "loan-analytics";
