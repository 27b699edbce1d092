//! Splitting of SQL scripts into individually executable statements.
//!
//! Drivers such as `mysql` execute one statement per call, so scripts are cut at the
//! split marker (`;` by default). A line of the form `DELIMITER <marker>` switches the
//! marker for the rest of the script, which allows procedure bodies containing `;`:
//!
//! ```
//! use patchline::splitter::split_statements;
//!
//! let script = "
//! CREATE TABLE counters (id INT, value INT);
//! DELIMITER //
//! CREATE PROCEDURE bump() BEGIN UPDATE counters SET value = value + 1; END//
//! DELIMITER ;
//! INSERT INTO counters VALUES (1, 0);
//! ";
//!
//! assert_eq!(
//!     split_statements(script),
//!     vec![
//!         "CREATE TABLE counters (id INT, value INT);",
//!         "CREATE PROCEDURE bump() BEGIN UPDATE counters SET value = value + 1; END;",
//!         "INSERT INTO counters VALUES (1, 0);",
//!     ]
//! );
//! ```

/// The marker statements are split at unless a `DELIMITER` line changes it.
pub const DEFAULT_SPLIT_MARKER: &str = ";";

/// The keyword introducing a marker change. Matched case-insensitively.
pub const DEFAULT_DELIMITER_KEYWORD: &str = "DELIMITER";

/// Split `sql` using [DEFAULT_SPLIT_MARKER] and [DEFAULT_DELIMITER_KEYWORD].
pub fn split_statements(sql: &str) -> Vec<String> {
    split_statements_with(sql, DEFAULT_SPLIT_MARKER, DEFAULT_DELIMITER_KEYWORD)
}

/// Split `sql` at the literal `marker`, honoring `<delimiter_keyword> <new marker>` lines.
///
/// Every returned statement is terminated with `;`, regardless of the marker that
/// separated it. Blank fragments are dropped.
pub fn split_statements_with(sql: &str, marker: &str, delimiter_keyword: &str) -> Vec<String> {
    let mut marker = marker.to_string();
    let mut remaining = sql;
    let mut statements = Vec::new();

    loop {
        remaining = remaining.trim_start_matches([' ', '\n', '\r']);
        if remaining.trim().is_empty() {
            break;
        }

        if let Some((delimiter, rest)) = parse_delimiter(remaining, delimiter_keyword) {
            marker = delimiter.to_string();
            remaining = rest;
            continue;
        }

        let (statement, rest) = if marker.is_empty() {
            (remaining, "")
        } else {
            remaining
                .split_once(marker.as_str())
                .unwrap_or((remaining, ""))
        };
        remaining = rest;

        if !statement.trim().is_empty() {
            statements.push(format!("{statement};"));
        }
    }

    statements
}

/// Match `<keyword> <marker>` at the start of `sql`, returning the marker and the text after it.
fn parse_delimiter<'a>(sql: &'a str, keyword: &str) -> Option<(&'a str, &'a str)> {
    if keyword.is_empty() {
        return None;
    }
    let head = sql.get(..keyword.len())?;
    if !head.eq_ignore_ascii_case(keyword) {
        return None;
    }
    let rest = sql[keyword.len()..].strip_prefix(' ')?;
    let end = rest.find([' ', '\n', '\r']).unwrap_or(rest.len());
    if end == 0 {
        return None;
    }
    Some((&rest[..end], &rest[end..]))
}
