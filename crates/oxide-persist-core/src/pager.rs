//! Paging and counting by rewriting a base SELECT.
//!
//! Keywords are located with case-insensitive word-boundary patterns and only
//! matched outside parentheses and quoted text, so subqueries in the select
//! list or WHERE clause do not confuse the rewrite. When the query cannot be
//! understood it is returned unchanged.

use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

use crate::dialect::{Dialect, PagingStyle};

struct Keywords {
    select: Regex,
    from: Regex,
    distinct: Regex,
    order_by: Regex,
}

fn keywords() -> Option<&'static Keywords> {
    static KEYWORDS: OnceLock<Option<Keywords>> = OnceLock::new();
    KEYWORDS
        .get_or_init(|| {
            Some(Keywords {
                select: Regex::new(r"(?i)\bselect\b").ok()?,
                from: Regex::new(r"(?i)\bfrom\b").ok()?,
                distinct: Regex::new(r"(?i)^\s*distinct\b").ok()?,
                order_by: Regex::new(r"(?i)\border\s+by\b").ok()?,
            })
        })
        .as_ref()
}

/// Returns the parenthesis depth at each byte, or `None` inside quotes.
fn depth_map(sql: &str) -> Vec<Option<u32>> {
    let mut depths = Vec::with_capacity(sql.len());
    let mut depth = 0_u32;
    let mut quote: Option<u8> = None;
    for &byte in sql.as_bytes() {
        match quote {
            Some(q) => {
                depths.push(None);
                if byte == q {
                    quote = None;
                }
            }
            None => {
                match byte {
                    b'\'' | b'"' => {
                        quote = Some(byte);
                        depths.push(None);
                        continue;
                    }
                    b')' => depth = depth.saturating_sub(1),
                    _ => {}
                }
                depths.push(Some(depth));
                if byte == b'(' {
                    depth += 1;
                }
            }
        }
    }
    depths
}

fn top_level<'a>(
    re: &'a Regex,
    sql: &'a str,
    depths: &'a [Option<u32>],
) -> impl Iterator<Item = regex::Match<'a>> + 'a {
    re.find_iter(sql)
        .filter(move |m| depths.get(m.start()).copied().flatten() == Some(0))
}

fn trim_statement(sql: &str) -> &str {
    sql.trim().trim_end_matches(';').trim_end()
}

/// Appends dialect pagination to a base query.
///
/// A non-positive `limit` returns the base query unchanged; a negative
/// `offset` is treated as zero. SQL Server requires an ORDER BY before
/// `OFFSET ... FETCH`, so `ORDER BY (SELECT NULL)` is added when the base
/// query has none.
#[must_use]
pub fn build_paged(base: &str, limit: i64, offset: i64, dialect: Dialect) -> String {
    if limit <= 0 {
        return String::from(base);
    }
    let base = trim_statement(base);
    let offset = offset.max(0);

    match dialect.paging_style() {
        PagingStyle::LimitOffset => format!("{base} LIMIT {limit} OFFSET {offset}"),
        PagingStyle::OffsetFetch => {
            let needs_order = dialect == Dialect::SqlServer && !has_order_by(base);
            let order = if needs_order {
                " ORDER BY (SELECT NULL)"
            } else {
                ""
            };
            format!("{base}{order} OFFSET {offset} ROWS FETCH NEXT {limit} ROWS ONLY")
        }
    }
}

fn has_order_by(sql: &str) -> bool {
    keywords().is_some_and(|k| {
        let depths = depth_map(sql);
        let found = top_level(&k.order_by, sql, &depths).next().is_some();
        found
    })
}

/// Rewrites a base SELECT into a `SELECT COUNT(*)` over the same rows.
///
/// The select list is replaced and a trailing ORDER BY is dropped. A
/// `SELECT DISTINCT` query is wrapped as a subquery instead, since the
/// select list then determines the row count. Queries whose SELECT or FROM
/// cannot be located are returned unchanged.
#[must_use]
pub fn build_count(base: &str) -> String {
    match rewrite_count(base) {
        Some(count) => count,
        None => {
            warn!(query = %base, "Unable to derive count query, running base query");
            String::from(base)
        }
    }
}

fn rewrite_count(base: &str) -> Option<String> {
    let k = keywords()?;
    let sql = trim_statement(base);
    let depths = depth_map(sql);

    let select = top_level(&k.select, sql, &depths).next()?;
    let from = top_level(&k.from, sql, &depths).find(|m| m.start() > select.end())?;
    let end = top_level(&k.order_by, sql, &depths)
        .filter(|m| m.start() > from.end())
        .last()
        .map_or(sql.len(), |m| m.start());
    let body = sql[..end].trim_end();

    if k.distinct.is_match(&sql[select.end()..from.start()]) {
        return Some(format!("SELECT COUNT(*) FROM ({body}) count_q"));
    }
    Some(format!("SELECT COUNT(*) {}", &sql[from.start()..end].trim_end()))
}
