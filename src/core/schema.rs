//! Purpose: Per-model field metadata and dotted-path resolution.
//! Exports: `FieldKind`, `FieldInfo`, `ModelSchema`, `SchemaCache`, `PathStep`,
//! `split_path`.
//! Role: Memoizing front for `Gateway::fields_get`; one wire call per model.
//! Invariants: A loaded schema is immutable; `invalidate` replaces it wholesale.
//! Invariants: Path resolution is pure once the schemas involved are loaded.

use crate::core::error::{ApiResult, Error, ErrorKind};
use crate::core::gateway::Gateway;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Char,
    Text,
    Html,
    Boolean,
    Integer,
    Float,
    Monetary,
    Date,
    Datetime,
    Binary,
    Selection,
    Reference,
    Many2One,
    One2Many,
    Many2Many,
    /// Server-side type this client has no special handling for.
    Other,
}

impl FieldKind {
    pub fn from_wire(tag: &str) -> Self {
        match tag {
            "char" => FieldKind::Char,
            "text" => FieldKind::Text,
            "html" => FieldKind::Html,
            "boolean" => FieldKind::Boolean,
            "integer" => FieldKind::Integer,
            "float" => FieldKind::Float,
            "monetary" => FieldKind::Monetary,
            "date" => FieldKind::Date,
            "datetime" => FieldKind::Datetime,
            "binary" => FieldKind::Binary,
            "selection" => FieldKind::Selection,
            "reference" => FieldKind::Reference,
            "many2one" => FieldKind::Many2One,
            "one2many" => FieldKind::One2Many,
            "many2many" => FieldKind::Many2Many,
            _ => FieldKind::Other,
        }
    }

    pub fn is_relational(self) -> bool {
        matches!(
            self,
            FieldKind::Many2One | FieldKind::One2Many | FieldKind::Many2Many
        )
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct FieldInfo {
    pub kind: FieldKind,
    /// Target model for relational kinds.
    pub relation: Option<String>,
    /// Inverse field on the target model (one2many only).
    pub relation_field: Option<String>,
    pub required: bool,
    pub readonly: bool,
    /// Human-readable field label, when the server sends one.
    pub label: Option<String>,
}

impl FieldInfo {
    fn from_wire(raw: &serde_json::Value) -> ApiResult<Self> {
        let table = raw.as_object().ok_or_else(|| {
            Error::new(ErrorKind::Corrupt).with_message("field metadata is not an object")
        })?;
        let tag = table.get("type").and_then(|v| v.as_str()).ok_or_else(|| {
            Error::new(ErrorKind::Corrupt).with_message("field metadata lacks a type tag")
        })?;
        Ok(Self {
            kind: FieldKind::from_wire(tag),
            relation: table
                .get("relation")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            relation_field: table
                .get("relation_field")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            required: table
                .get("required")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            readonly: table
                .get("readonly")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            label: table
                .get("string")
                .and_then(|v| v.as_str())
                .map(str::to_string),
        })
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ModelSchema {
    pub model: String,
    pub fields: HashMap<String, FieldInfo>,
}

impl ModelSchema {
    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.get(name)
    }

    /// Field lookup that fails with `InvalidFieldPath` naming the segment.
    pub fn require_field(&self, name: &str) -> ApiResult<&FieldInfo> {
        self.fields.get(name).ok_or_else(|| {
            Error::new(ErrorKind::InvalidFieldPath)
                .with_message("unknown field")
                .with_model(&self.model)
                .with_segment(name)
        })
    }
}

/// One hop of a resolved dotted path.
#[derive(Clone, Debug, PartialEq)]
pub struct PathStep {
    pub model: String,
    pub field: String,
    pub kind: FieldKind,
    /// Target model when the hop crosses a relation.
    pub relation: Option<String>,
}

/// Split a dotted path into its head field and the remaining sub-path.
pub fn split_path(path: &str) -> (&str, Option<&str>) {
    match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    }
}

/// Memoizing schema introspector. One `fields_get` per model per lifetime,
/// shared by reference across every record and collection of a client.
pub struct SchemaCache {
    gateway: Arc<dyn Gateway>,
    schemas: Mutex<HashMap<String, Arc<ModelSchema>>>,
}

impl SchemaCache {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self {
            gateway,
            schemas: Mutex::new(HashMap::new()),
        }
    }

    pub fn schema_for(&self, model: &str) -> ApiResult<Arc<ModelSchema>> {
        if let Some(schema) = self.lookup(model) {
            return Ok(schema);
        }
        let raw = self.gateway.fields_get(model)?;
        let mut fields = HashMap::with_capacity(raw.len());
        for (name, info) in &raw {
            fields.insert(name.clone(), FieldInfo::from_wire(info)?);
        }
        let schema = Arc::new(ModelSchema {
            model: model.to_string(),
            fields,
        });
        self.schemas
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .insert(model.to_string(), schema.clone());
        Ok(schema)
    }

    pub fn invalidate(&self, model: &str) {
        self.schemas
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .remove(model);
    }

    fn lookup(&self, model: &str) -> Option<Arc<ModelSchema>> {
        self.schemas
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .get(model)
            .cloned()
    }

    /// Walk a dotted path segment by segment, loading schemas as needed.
    /// Every hop but the last must cross a relation.
    pub fn resolve_path(&self, model: &str, path: &str) -> ApiResult<Vec<PathStep>> {
        if path.is_empty() {
            return Err(Error::new(ErrorKind::InvalidFieldPath)
                .with_message("empty field path")
                .with_model(model));
        }
        let mut steps = Vec::new();
        let mut current = model.to_string();
        let mut segments = path.split('.').peekable();
        while let Some(segment) = segments.next() {
            let schema = self.schema_for(&current)?;
            let info = schema.require_field(segment)?;
            let step = PathStep {
                model: current.clone(),
                field: segment.to_string(),
                kind: info.kind,
                relation: info.relation.clone(),
            };
            if segments.peek().is_some() {
                let Some(target) = &info.relation else {
                    return Err(Error::new(ErrorKind::InvalidFieldPath)
                        .with_message("cannot traverse a non-relational field")
                        .with_model(&current)
                        .with_segment(segment));
                };
                current = target.clone();
            }
            steps.push(step);
        }
        Ok(steps)
    }
}
