//! Purpose: Shared fixtures for the core unit tests.
//! Exports: `noop_cache`, `partner_schema`, `StaticGateway`.
//! Role: A cache wired to a gateway that panics on contact, for tests that
//! must prove an operation stays off the wire.

use crate::core::cache::RelationalCache;
use crate::core::error::ApiResult;
use crate::core::gateway::{Context, Domain, Gateway, SearchOptions, SearchResult};
use crate::core::schema::{FieldInfo, FieldKind, ModelSchema, SchemaCache};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

pub(crate) struct StaticGateway;

impl Gateway for StaticGateway {
    fn read(
        &self,
        _model: &str,
        _ids: &[i64],
        _fields: &[String],
        _context: &Context,
    ) -> ApiResult<Vec<Map<String, Value>>> {
        unreachable!("test gateway must stay off the wire")
    }

    fn search(
        &self,
        _model: &str,
        _domain: &Domain,
        _options: &SearchOptions,
        _context: &Context,
    ) -> ApiResult<SearchResult> {
        unreachable!("test gateway must stay off the wire")
    }

    fn write(
        &self,
        _model: &str,
        _ids: &[i64],
        _values: &Map<String, Value>,
        _context: &Context,
    ) -> ApiResult<bool> {
        unreachable!("test gateway must stay off the wire")
    }

    fn create(
        &self,
        _model: &str,
        _values: &Map<String, Value>,
        _context: &Context,
    ) -> ApiResult<i64> {
        unreachable!("test gateway must stay off the wire")
    }

    fn unlink(&self, _model: &str, _ids: &[i64], _context: &Context) -> ApiResult<bool> {
        unreachable!("test gateway must stay off the wire")
    }

    fn execute(
        &self,
        _model: &str,
        _method: &str,
        _args: Vec<Value>,
        _kwargs: Map<String, Value>,
    ) -> ApiResult<Value> {
        unreachable!("test gateway must stay off the wire")
    }

    fn fields_get(&self, _model: &str) -> ApiResult<Map<String, Value>> {
        unreachable!("test gateway must stay off the wire")
    }
}

pub(crate) fn noop_cache() -> Arc<RelationalCache> {
    let gateway: Arc<dyn Gateway> = Arc::new(StaticGateway);
    let schemas = Arc::new(SchemaCache::new(gateway.clone()));
    Arc::new(RelationalCache::new(gateway, schemas))
}

fn field(kind: FieldKind, relation: Option<&str>, relation_field: Option<&str>) -> FieldInfo {
    FieldInfo {
        kind,
        relation: relation.map(str::to_string),
        relation_field: relation_field.map(str::to_string),
        required: false,
        readonly: false,
        label: None,
    }
}

pub(crate) fn partner_schema() -> ModelSchema {
    let mut fields = HashMap::new();
    fields.insert("name".to_string(), field(FieldKind::Char, None, None));
    fields.insert(
        "country_id".to_string(),
        field(FieldKind::Many2One, Some("res.country"), None),
    );
    fields.insert(
        "bank_ids".to_string(),
        field(
            FieldKind::One2Many,
            Some("res.partner.bank"),
            Some("partner_id"),
        ),
    );
    ModelSchema {
        model: "res.partner".to_string(),
        fields,
    }
}
