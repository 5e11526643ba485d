//! Queries expressed as a single string: `SELECT COL1, COL2 WHERE COL3 = 'x' AND COL4 like 'y%'`.
//!
//! Conditions are joined by `AND` outside quotes. Within one condition, `||` separates
//! alternatives for the same column (`COLL_NAME = '/a' || like '/a/%'`).

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{GridError, GridResult};

use super::query::{Condition, QueryCursor};

static SELECT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)^\s*SELECT\s+(.*)$").unwrap_or_else(|_| Regex::new("^$").unwrap()));
static COND_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^\s*([A-Za-z_][A-Za-z0-9_]*)\s*(=|<>|!=|<=|>=|<|>|(?i:not\s+like|like|in|between)\b)(.*)$")
        .unwrap_or_else(|_| Regex::new("^$").unwrap())
});
static COLUMN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap_or_else(|_| Regex::new("^$").unwrap()));

/// Render `SELECT <select> WHERE <cond>`, or `SELECT <select> ` when there is no condition.
pub fn make_query(select: &str, cond: &str) -> String {
    if cond.trim().is_empty() {
        format!("SELECT {} ", select)
    } else {
        format!("SELECT {} WHERE {}", select, cond)
    }
}

/// Byte offsets of `keyword` (case-insensitive, whitespace-delimited) outside single quotes.
fn keyword_positions(s: &str, keyword: &str) -> Vec<usize> {
    let bytes = s.as_bytes();
    let kw = keyword.as_bytes();
    let mut out = Vec::new();
    let mut in_quote = false;
    let mut i = 0usize;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\'' {
            in_quote = !in_quote;
        } else if !in_quote
            && i + kw.len() <= bytes.len()
            && bytes[i..i + kw.len()].eq_ignore_ascii_case(kw)
            && (i == 0 || bytes[i - 1].is_ascii_whitespace())
            && bytes.get(i + kw.len()).map_or(true, |c| c.is_ascii_whitespace())
        {
            out.push(i);
            i += kw.len();
            continue;
        }
        i += 1;
    }
    out
}

fn split_keyword<'a>(s: &'a str, keyword: &str) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut last = 0usize;
    for pos in keyword_positions(s, keyword) {
        parts.push(&s[last..pos]);
        last = pos + keyword.len();
    }
    parts.push(&s[last..]);
    parts
}

fn parse_condition(text: &str) -> GridResult<Condition> {
    let caps = COND_RE
        .captures(text)
        .ok_or_else(|| GridError::input(format!("malformed condition '{}'", text.trim())))?;
    let column = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    let op = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
    let rest = caps.get(3).map(|m| m.as_str()).unwrap_or_default();
    if rest.trim().is_empty() {
        return Err(GridError::input(format!("condition on {} has no value", column)));
    }
    if rest.matches('\'').count() % 2 != 0 {
        return Err(GridError::input(format!("unbalanced quote in condition on {}", column)));
    }
    let predicate = format!("{} {}", op, rest.trim());
    Ok(Condition::new(column, predicate.trim()))
}

/// Parse a query string into select columns and conditions.
pub fn parse_query(query: &str) -> GridResult<(Vec<String>, Vec<Condition>)> {
    let body = SELECT_RE
        .captures(query)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| GridError::input(format!("query must start with SELECT: '{}'", query.trim())))?;

    let mut halves = split_keyword(body, "WHERE").into_iter();
    let select_part = halves.next().unwrap_or_default();
    let where_part: Vec<&str> = halves.collect();
    if where_part.len() > 1 {
        return Err(GridError::input("query has more than one WHERE clause"));
    }

    let mut select = Vec::new();
    for col in select_part.split(',').map(str::trim).filter(|c| !c.is_empty()) {
        if !COLUMN_RE.is_match(col) {
            return Err(GridError::input(format!("bad select column '{}'", col)));
        }
        select.push(col.to_string());
    }
    if select.is_empty() {
        return Err(GridError::input("query has no select columns"));
    }

    let mut conditions = Vec::new();
    if let Some(w) = where_part.first() {
        for part in split_keyword(w, "AND") {
            if part.trim().is_empty() {
                return Err(GridError::input("empty condition in WHERE clause"));
            }
            conditions.push(parse_condition(part)?);
        }
    }
    Ok((select, conditions))
}

impl QueryCursor {
    /// Build an idle cursor from a `SELECT ... WHERE ...` string.
    pub fn from_str_cond(query: &str, page_size: i32) -> GridResult<Self> {
        let (select, conditions) = parse_query(query)?;
        Ok(QueryCursor::new(select, conditions, page_size))
    }
}

/// Split a predicate into its `||` alternatives, outside quotes.
pub fn alternatives(predicate: &str) -> Vec<&str> {
    let bytes = predicate.as_bytes();
    let mut out = Vec::new();
    let mut in_quote = false;
    let mut last = 0usize;
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => in_quote = !in_quote,
            b'|' if !in_quote && bytes.get(i + 1) == Some(&b'|') => {
                out.push(predicate[last..i].trim());
                i += 2;
                last = i;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    out.push(predicate[last..].trim());
    out
}
