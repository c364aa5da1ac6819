//! Query-string builder with `URLSearchParams` semantics.

use url::form_urlencoded;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, key: &str, value: impl ToString) -> Self {
        self.pairs.push((key.to_string(), value.to_string()));
        self
    }

    pub fn push_opt<V: ToString>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.push(key, v),
            None => self,
        }
    }

    /// Appends `value` unless it is empty.
    pub fn push_non_empty(self, key: &str, value: &str) -> Self {
        if value.is_empty() {
            self
        } else {
            self.push(key, value)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn encode(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs.iter())
            .finish()
    }

    /// `path?query`, or bare `path` when there are no parameters.
    pub fn to_path(&self, path: &str) -> String {
        if self.pairs.is_empty() {
            path.to_string()
        } else {
            format!("{path}?{}", self.encode())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_like_url_search_params() {
        let q = QueryParams::new().push("q", "ram sita").push("limit", 20).push("x", "a&b");
        assert_eq!(q.encode(), "q=ram+sita&limit=20&x=a%26b");
    }

    #[test]
    fn optional_and_empty_values_are_skipped() {
        let q = QueryParams::new()
            .push_opt::<u32>("offset", None)
            .push_non_empty("action", "")
            .push_opt("page", Some(2));
        assert_eq!(q.to_path("/logs"), "/logs?page=2");
    }

    #[test]
    fn no_params_leaves_path_bare() {
        assert_eq!(QueryParams::new().to_path("/themes"), "/themes");
    }
}
