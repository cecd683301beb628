// SECTION: SQL literal helpers

/// Escapes `s` for embedding as a single-quoted SQL string literal.
///
/// Every statement this crate builds goes out as plain SQL text with no
/// separate bound-parameter channel, so every literal goes through this
/// escape first.
#[must_use]
pub fn quote(s: &str) -> String {
    s.replace('\'', "''")
}

/// Splits a config-store key of the form `"<table>/<rowKey>"` into its
/// two parts.
///
/// Requires exactly one `/` separator: both `split_key("a")` and
/// `split_key("a/b/c")` are rejected.
#[must_use]
pub fn split_key(key: &str) -> Option<(&str, &str)> {
    let mut parts = key.splitn(2, '/');
    let table = parts.next()?;
    let row_key = parts.next()?;
    if table.is_empty() || row_key.is_empty() || row_key.contains('/') {
        return None;
    }
    Some((table, row_key))
}

/// Splits an Epoch-Store logical path of the form `"/<logid>/<column>"`.
///
/// Requires exactly two `/` separators, the first being the leading slash.
#[must_use]
pub fn split_znode_path(path: &str) -> Option<(&str, &str)> {
    let rest = path.strip_prefix('/')?;
    let mut parts = rest.splitn(2, '/');
    let logid = parts.next()?;
    let column = parts.next()?;
    if logid.is_empty() || column.is_empty() || column.contains('/') {
        return None;
    }
    Some((logid, column))
}
