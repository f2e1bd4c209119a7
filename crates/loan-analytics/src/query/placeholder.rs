//! Named `:placeholder` scanning for SQL templates
//!
//! Quoted strings, backtick identifiers, comments and `::` casts are skipped,
//! as is `col:field` path syntax (a colon directly after an identifier).

use std::collections::BTreeSet;

/// Location of one `:name` marker in a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub name: String,
    /// Byte offset of the leading `:`
    pub start: usize,
    /// Byte offset one past the last name character
    pub end: usize,
}

const fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

const fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Scan a template for named placeholders in order of appearance
pub fn scan(template: &str) -> Vec<Placeholder> {
    let bytes = template.as_bytes();
    let mut found = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'\'' | b'"' | b'`') => {
                i += 1;
                while i < bytes.len() {
                    if bytes[i] == b'\\' && quote != b'`' {
                        i += 2;
                        continue;
                    }
                    if bytes[i] == quote {
                        break;
                    }
                    i += 1;
                }
                i += 1;
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i < bytes.len() && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                    i += 1;
                }
                i += 2;
            }
            b':' if bytes.get(i + 1) == Some(&b':') => i += 2,
            b':' => {
                let follows_ident = i > 0 && is_ident_char(bytes[i - 1]);
                let start = i;
                i += 1;
                if follows_ident || !bytes.get(i).copied().is_some_and(is_ident_start) {
                    continue;
                }
                while i < bytes.len() && is_ident_char(bytes[i]) {
                    i += 1;
                }
                found.push(Placeholder {
                    name: template[start + 1..i].to_string(),
                    start,
                    end: i,
                });
            }
            _ => i += 1,
        }
    }

    found
}

/// Distinct placeholder names used by a template
pub fn names(template: &str) -> BTreeSet<String> {
    scan(template).into_iter().map(|p| p.name).collect()
}

/// Replace each placeholder with the text produced by `render`
///
/// Placeholders for which `render` returns `None` are left untouched.
pub fn substitute<F>(template: &str, mut render: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for placeholder in scan(template) {
        if let Some(text) = render(&placeholder.name) {
            out.push_str(&template[last..placeholder.start]);
            out.push_str(&text);
            last = placeholder.end;
        }
    }
    out.push_str(&template[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_finds_named_markers() {
        let sql = "SELECT * FROM t WHERE d >= :start_date AND d <= :end_date LIMIT :limit";
        let names: Vec<_> = scan(sql).into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["start_date", "end_date", "limit"]);
    }

    #[test]
    fn test_scan_skips_casts_strings_and_comments() {
        let sql = "SELECT x::DOUBLE, ':not_me', `a:b` -- :comment\n\
                   /* :block */ FROM t WHERE y = :real";
        assert_eq!(names(sql).into_iter().collect::<Vec<_>>(), vec!["real"]);
    }

    #[test]
    fn test_scan_skips_path_syntax() {
        assert!(scan("SELECT raw:field FROM t").is_empty());
    }

    #[test]
    fn test_scan_handles_escaped_quote() {
        let sql = r"SELECT 'it\'s :x' FROM t WHERE a = :y";
        assert_eq!(names(sql).into_iter().collect::<Vec<_>>(), vec!["y"]);
    }

    #[test]
    fn test_names_deduplicates() {
        let sql = "SELECT :a, :a, :b";
        assert_eq!(names(sql).len(), 2);
    }

    #[test]
    fn test_substitute_replaces_known() {
        let out = substitute("WHERE a = :a AND b = :b", |name| {
            (name == "a").then(|| "'x'".to_string())
        });
        assert_eq!(out, "WHERE a = 'x' AND b = :b");
    }

    #[test]
    fn test_placeholder_offsets() {
        let p = &scan("a = :id")[0];
        assert_eq!((p.start, p.end), (4, 7));
    }
}
