//! Row-limit rewriting.
//!
//! Turning "limit N, skip M" into something an engine understands is two
//! moves: rewrite the statement to request `N + M` rows, then seek the
//! cursor forward `M` rows after execution. The rewrite here is the
//! `TOP n` insertion used by engines without a trailing limit clause;
//! backends with one override [`crate::Backend::rewrite_limit`] with
//! [`append_row_limit`].

/// Inserts a `TOP n` row cap immediately after the statement's leading
/// keyword, keeping a `DISTINCT` qualifier ahead of it.
///
/// The input is expected to be a single `SELECT [DISTINCT] ...` statement.
pub fn insert_row_cap(sql: &str, n: u64) -> String {
    let trimmed = sql.trim_start();
    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let head = parts.next().unwrap_or("");
    let rest = parts.next().unwrap_or("").trim_start();

    let mut tail_parts = rest.splitn(2, char::is_whitespace);
    let qualifier = tail_parts.next().unwrap_or("");
    if qualifier.eq_ignore_ascii_case("distinct") {
        let tail = tail_parts.next().unwrap_or("").trim_start();
        format!("{head} {qualifier} TOP {n} {tail}")
    } else {
        format!("{head} TOP {n} {rest}")
    }
}

/// Trailing-clause variant: `... LIMIT n`.
pub fn append_row_limit(sql: &str, n: u64) -> String {
    format!("{} LIMIT {}", sql.trim_end(), n)
}

/// Lexical check for a row-producing statement. Only these get an entry in
/// the open-handle registry; anything else has no cursor worth keeping.
pub fn is_row_producing(sql: &str) -> bool {
    sql.trim_start()
        .split_whitespace()
        .next()
        .is_some_and(|word| word.eq_ignore_ascii_case("select"))
}
