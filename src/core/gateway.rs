//! Purpose: Define the remote model gateway boundary the cache core depends on.
//! Exports: `Gateway`, `Context`, `Domain`, `SearchOptions`, `SearchResult`.
//! Role: The only seam between the relational cache and the wire; object-safe
//! so tests can substitute an in-process implementation.
//! Invariants: The gateway owns timeout/retry policy; the core never retries.
//! Invariants: `read` rows always include `id`; extra fields are permitted.

use crate::core::error::{ApiResult, Error, ErrorKind};
use serde_json::{Map, Value, json};

/// Read context forwarded verbatim to every remote call (locale, timezone,
/// company scoping and the like). Never partitions the cache.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Context {
    entries: Map<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.entries.insert(key.into(), value);
        self
    }

    pub fn with_lang(self, lang: impl Into<String>) -> Self {
        self.with("lang", Value::String(lang.into()))
    }

    pub fn with_tz(self, tz: impl Into<String>) -> Self {
        self.with("tz", Value::String(tz.into()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &Map<String, Value> {
        &self.entries
    }

    /// Thread this context into an `execute`-style kwargs table. A no-op when
    /// the context is empty.
    pub fn apply_to(&self, kwargs: &mut Map<String, Value>) {
        if !self.entries.is_empty() {
            kwargs.insert("context".to_string(), Value::Object(self.entries.clone()));
        }
    }
}

/// Search domain: a list of `(field, operator, value)` terms in the polish
/// prefix form the server expects. Terms are kept as raw JSON triples.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Domain {
    terms: Vec<Value>,
}

impl Domain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, field: &str, operator: &str, value: Value) -> Self {
        self.terms.push(json!([field, operator, value]));
        self
    }

    /// Logical connective (`"&"`, `"|"`, `"!"`) in prefix position.
    pub fn op(mut self, operator: &str) -> Self {
        self.terms.push(Value::String(operator.to_string()));
        self
    }

    pub fn from_json(value: Value) -> ApiResult<Self> {
        match value {
            Value::Array(terms) => Ok(Self { terms }),
            other => Err(Error::new(ErrorKind::Usage)
                .with_message(format!("domain must be a JSON array, got {other}"))),
        }
    }

    pub fn ids(ids: &[i64]) -> Self {
        Self::new().filter("id", "in", json!(ids))
    }

    pub fn to_value(&self) -> Value {
        Value::Array(self.terms.clone())
    }
}

#[derive(Clone, Debug, Default)]
pub struct SearchOptions {
    pub offset: Option<i64>,
    pub limit: Option<i64>,
    pub order: Option<String>,
    pub count: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SearchResult {
    Ids(Vec<i64>),
    Count(i64),
}

impl SearchResult {
    pub fn into_ids(self) -> ApiResult<Vec<i64>> {
        match self {
            SearchResult::Ids(ids) => Ok(ids),
            SearchResult::Count(_) => Err(Error::new(ErrorKind::Corrupt)
                .with_message("gateway returned a count for an id search")),
        }
    }

    pub fn into_count(self) -> ApiResult<i64> {
        match self {
            SearchResult::Count(count) => Ok(count),
            SearchResult::Ids(_) => Err(Error::new(ErrorKind::Corrupt)
                .with_message("gateway returned ids for a count search")),
        }
    }
}

/// Coarse-grained RPC surface of the remote store. Implementations are opaque,
/// possibly slow, possibly rate-limited; every method blocks to completion.
pub trait Gateway: Send + Sync {
    fn read(
        &self,
        model: &str,
        ids: &[i64],
        fields: &[String],
        context: &Context,
    ) -> ApiResult<Vec<Map<String, Value>>>;

    fn search(
        &self,
        model: &str,
        domain: &Domain,
        options: &SearchOptions,
        context: &Context,
    ) -> ApiResult<SearchResult>;

    fn write(
        &self,
        model: &str,
        ids: &[i64],
        values: &Map<String, Value>,
        context: &Context,
    ) -> ApiResult<bool>;

    fn create(&self, model: &str, values: &Map<String, Value>, context: &Context)
    -> ApiResult<i64>;

    fn unlink(&self, model: &str, ids: &[i64], context: &Context) -> ApiResult<bool>;

    fn execute(
        &self,
        model: &str,
        method: &str,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    ) -> ApiResult<Value>;

    /// Field metadata for one model. Must fail with `ErrorKind::UnknownModel`
    /// when the server reports the model as unregistered.
    fn fields_get(&self, model: &str) -> ApiResult<Map<String, Value>>;
}

#[cfg(test)]
mod tests {
    use super::{Context, Domain};
    use serde_json::json;

    #[test]
    fn domain_builds_prefix_terms_in_order() {
        let domain = Domain::new()
            .op("|")
            .filter("name", "ilike", json!("acme"))
            .filter("active", "=", json!(true));
        assert_eq!(
            domain.to_value(),
            json!(["|", ["name", "ilike", "acme"], ["active", "=", true]])
        );
    }

    #[test]
    fn domain_rejects_non_array_json() {
        assert!(Domain::from_json(json!({"name": "acme"})).is_err());
    }

    #[test]
    fn context_entries_round_trip() {
        let context = Context::new().with_lang("uk_UA").with_tz("Europe/Kyiv");
        assert_eq!(context.entries().get("lang"), Some(&json!("uk_UA")));
        assert_eq!(context.entries().get("tz"), Some(&json!("Europe/Kyiv")));
        assert!(!context.is_empty());
    }
}
