use std::collections::HashMap;

use crate::config::{DEFAULT_PAGE_LIMIT, DEFAULT_PAGE_SKIP};

/// Parse query parameters from a URI string
///
/// Values are URL-decoded. Repeated keys keep the last value.
///
/// # Example
/// ```
/// use gamgyul::core::query_params::parse_query_params;
///
/// let params = parse_query_params("/path?skip=5&limit=2");
/// assert_eq!(params.get("skip"), Some(&"5".to_string()));
/// assert_eq!(params.get("limit"), Some(&"2".to_string()));
/// ```
pub fn parse_query_params(uri: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();

    if let Some(query_start) = uri.find('?') {
        let query = &uri[query_start + 1..];
        for param in query.split('&').filter(|p| !p.is_empty()) {
            if let Some(eq_idx) = param.find('=') {
                let key = &param[..eq_idx];
                let encoded_value = &param[eq_idx + 1..];
                let decoded = urlencoding::decode(encoded_value)
                    .unwrap_or(std::borrow::Cow::Borrowed(encoded_value))
                    .to_string();
                params.insert(key.to_string(), decoded);
            } else {
                params.insert(param.to_string(), String::new());
            }
        }
    }

    params
}

/// Get a non-negative integer parameter from its leading digits, so `"5abc"`
/// reads as 5 and `"2.5"` as 2. Falls back to `default` when the key is
/// missing, the value has no leading digits, or it is negative.
pub fn get_int(params: &HashMap<String, String>, key: &str, default: usize) -> usize {
    params
        .get(key)
        .and_then(|s| leading_int(s))
        .unwrap_or(default)
}

fn leading_int(value: &str) -> Option<usize> {
    let value = value.trim_start();
    let value = value.strip_prefix('+').unwrap_or(value);
    let end = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    // Too many digits saturates rather than falling back.
    match &value[..end] {
        "" => None,
        digits => Some(digits.parse().unwrap_or(usize::MAX)),
    }
}

/// A `skip`/`limit` window over an ordered id list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub skip: usize,
    pub limit: usize,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            skip: DEFAULT_PAGE_SKIP,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl Page {
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let limit = match get_int(params, "limit", DEFAULT_PAGE_LIMIT) {
            0 => DEFAULT_PAGE_LIMIT,
            n => n,
        };
        Self {
            skip: get_int(params, "skip", DEFAULT_PAGE_SKIP),
            limit,
        }
    }

    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = self.skip.min(items.len());
        let end = self.skip.saturating_add(self.limit).min(items.len());
        &items[start..end]
    }
}
