//! SQL guard rails for identifiers and ad-hoc statements

use crate::Error;

/// Keywords that indicate write or DDL operations
const WRITE_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "CREATE", "ALTER", "TRUNCATE", "MERGE", "GRANT", "REVOKE",
    "COPY", "OPTIMIZE", "VACUUM", "CALL", "RESTORE", "UNDROP", "COMMENT", "REPAIR", "REFRESH", "SET",
];

/// Statements may only open with one of these
const READ_ONLY_PREFIXES: &[&str] = &["SELECT", "WITH", "DESCRIBE", "SHOW", "EXPLAIN", "VALUES"];

/// Unity Catalog object names are capped at 255 characters
const MAX_IDENTIFIER_LENGTH: usize = 255;

/// Validate a catalog/schema/table identifier before it is spliced into a template
pub fn is_valid_identifier(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_IDENTIFIER_LENGTH {
        return false;
    }

    if name.starts_with(|c: char| c.is_ascii_digit()) {
        return false;
    }

    name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Validate identifier and return error if invalid
pub fn validate_identifier(name: &str, context: &str) -> Result<(), Error> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Invalid {context}: '{name}'. \
             Must be 1-255 alphanumeric characters (a-z, A-Z, 0-9, _), \
             cannot start with a digit."
        )))
    }
}

/// Three-part table name after checking each part
pub fn qualified_table(catalog: &str, schema: &str, table: &str) -> Result<String, Error> {
    validate_identifier(catalog, "catalog name")?;
    validate_identifier(schema, "schema name")?;
    validate_identifier(table, "table name")?;
    Ok(format!("{catalog}.{schema}.{table}"))
}

/// Validate ad-hoc SQL for read-only execution
///
/// Handles comments and CTE (WITH) clauses. Every `;`-separated statement
/// must open with a read-only keyword and be free of write/DDL keywords.
pub fn validate_read_only_sql(sql: &str) -> Result<(), Error> {
    let cleaned = strip_sql_comments(sql);
    let sql_upper = cleaned.trim().to_uppercase();

    if sql_upper.is_empty() {
        return Err(Error::ReadOnlyViolation("empty statement".into()));
    }

    for statement in sql_upper.split(';') {
        let trimmed = statement.trim();
        if trimmed.is_empty() {
            continue;
        }

        let leading = leading_keyword(trimmed);
        if !READ_ONLY_PREFIXES.contains(&leading) {
            let shown = if leading.is_empty() { trimmed } else { leading };
            return Err(Error::ReadOnlyViolation(format!(
                "statements starting with {shown} are not allowed"
            )));
        }

        if let Some(keyword) = find_write_operation(trimmed) {
            return Err(Error::ReadOnlyViolation(format!(
                "{keyword} statements are not allowed"
            )));
        }
    }

    Ok(())
}

/// Strip SQL comments (both -- and /* */ style)
pub fn strip_sql_comments(sql: &str) -> String {
    let mut result = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    let mut in_single_quote = false;
    let mut in_backtick = false;

    while let Some(c) = chars.next() {
        if c == '\'' && !in_backtick {
            in_single_quote = !in_single_quote;
            result.push(c);
            continue;
        }
        if c == '`' && !in_single_quote {
            in_backtick = !in_backtick;
            result.push(c);
            continue;
        }

        if in_single_quote || in_backtick {
            result.push(c);
            continue;
        }

        if c == '-' && chars.peek() == Some(&'-') {
            chars.next();
            for ch in chars.by_ref() {
                if ch == '\n' {
                    result.push(' ');
                    break;
                }
            }
            continue;
        }

        if c == '/' && chars.peek() == Some(&'*') {
            chars.next();
            while let Some(ch) = chars.next() {
                if ch == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    result.push(' ');
                    break;
                }
            }
            continue;
        }

        result.push(c);
    }

    result
}

/// First word of an upper-cased statement, skipping opening parentheses
fn leading_keyword(statement: &str) -> &str {
    let body = statement.trim_start_matches(|c: char| c == '(' || c.is_whitespace());
    let end = body
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(body.len());
    &body[..end]
}

/// Blank out quoted literals and backtick identifiers so their contents are not matched
fn mask_literals(sql: &str) -> String {
    let mut in_quote = false;
    let mut in_backtick = false;
    sql.chars()
        .map(|c| {
            if c == '\'' && !in_backtick {
                in_quote = !in_quote;
                c
            } else if c == '`' && !in_quote {
                in_backtick = !in_backtick;
                c
            } else if in_quote || in_backtick {
                ' '
            } else {
                c
            }
        })
        .collect()
}

fn find_write_operation(sql: &str) -> Option<&'static str> {
    let masked = mask_literals(sql);
    WRITE_KEYWORDS.iter().copied().find(|keyword| {
        masked
            .match_indices(keyword)
            .any(|(pos, _)| is_word_boundary(&masked, pos, keyword.len()))
    })
}

fn is_word_boundary(sql: &str, pos: usize, len: usize) -> bool {
    let before = sql[..pos].chars().next_back();
    let after = sql[pos + len..].chars().next();
    let is_ident = |c: char| c.is_ascii_alphanumeric() || c == '_' || c == '.';
    !before.is_some_and(is_ident) && !after.is_some_and(is_ident)
}
