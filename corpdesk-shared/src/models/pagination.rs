/// Limit/offset pagination for list endpoints
///
/// Every list endpoint accepts `?limit=&offset=` and answers with a
/// [`Page`] envelope: `{ "items": [...], "total": n, "limit": l, "offset": o }`.

use serde::{Deserialize, Serialize};

/// Default page size
pub const DEFAULT_LIMIT: i64 = 50;

/// Largest page a client may request
pub const MAX_LIMIT: i64 = 200;

/// Raw pagination query parameters
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PageParams {
    /// Page size, defaulting to 50 and clamped to `1..=200`
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    /// Offset, never negative
    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// One page of a list result
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, params: &PageParams) -> Self {
        Self {
            items,
            total,
            limit: params.limit(),
            offset: params.offset(),
        }
    }

    /// Converts every item, keeping the envelope
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            limit: self.limit,
            offset: self.offset,
        }
    }
}

/// Builds an `ILIKE` pattern matching `needle` anywhere, with `%`, `_` and
/// `\` in the needle matched literally
pub fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Trims a free-text filter, treating blank input as absent
pub fn search_term(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("ann"), "%ann%");
        assert_eq!(contains_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(contains_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn test_search_term() {
        assert_eq!(search_term(&None), None);
        assert_eq!(search_term(&Some("   ".to_string())), None);
        assert_eq!(search_term(&Some(" bob ".to_string())), Some("bob"));
    }

    #[test]
    fn test_defaults() {
        let params = PageParams::default();
        assert_eq!(params.limit(), 50);
        assert_eq!(params.offset(), 0);
    }

    #[test]
    fn test_limit_is_clamped() {
        let params = PageParams { limit: Some(0), offset: None };
        assert_eq!(params.limit(), 1);

        let params = PageParams { limit: Some(10_000), offset: None };
        assert_eq!(params.limit(), 200);

        let params = PageParams { limit: Some(-5), offset: None };
        assert_eq!(params.limit(), 1);
    }

    #[test]
    fn test_negative_offset_is_zero() {
        let params = PageParams { limit: None, offset: Some(-20) };
        assert_eq!(params.offset(), 0);
    }

    #[test]
    fn test_page_map_keeps_envelope() {
        let params = PageParams { limit: Some(2), offset: Some(4) };
        let page = Page::new(vec![1, 2], 10, &params).map(|n| n * 10);

        assert_eq!(page.items, vec![10, 20]);
        assert_eq!(page.total, 10);
        assert_eq!(page.limit, 2);
        assert_eq!(page.offset, 4);
    }
}
