//! Purpose: The client-side relational cache: model → id → field dict.
//! Exports: `RelationalCache`, `FieldDict`, `NAME_GET_KEY`.
//! Role: Shared read-through store behind every record and collection;
//! batches and deduplicates wire reads, follows relations on absorption.
//! Invariants: Every id ever referenced has a field dict, minimally `{"id"}`.
//! Invariants: The lock is never held across a gateway call.
//! Invariants: A failed read absorbs nothing; only success mutates the cache.
//! Invariants: Reads fill; only `reset` removes cached fields.

use crate::core::error::{ApiResult, Error, ErrorKind};
use crate::core::ext::ExtRegistry;
use crate::core::gateway::{Context, Gateway};
use crate::core::schema::{ModelSchema, SchemaCache, split_path};
use crate::core::value::{FieldValue, classify};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Internal field-dict slot memoizing the display label that arrives
/// incidentally inside `[id, label]` many2one values.
pub const NAME_GET_KEY: &str = "__name_get_result";

/// Cached fields of one record. Always contains `"id"`.
pub type FieldDict = HashMap<String, Value>;

type Slices = HashMap<String, HashMap<i64, FieldDict>>;

pub struct RelationalCache {
    gateway: Arc<dyn Gateway>,
    schemas: Arc<SchemaCache>,
    exts: ExtRegistry,
    slices: Mutex<Slices>,
}

impl RelationalCache {
    pub fn new(gateway: Arc<dyn Gateway>, schemas: Arc<SchemaCache>) -> Self {
        Self {
            gateway,
            schemas,
            exts: ExtRegistry::new(),
            slices: Mutex::new(HashMap::new()),
        }
    }

    pub fn gateway(&self) -> &Arc<dyn Gateway> {
        &self.gateway
    }

    pub fn schemas(&self) -> &Arc<SchemaCache> {
        &self.schemas
    }

    pub fn exts(&self) -> &ExtRegistry {
        &self.exts
    }

    fn lock(&self) -> MutexGuard<'_, Slices> {
        self.slices.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    /// Insert `{"id": id}` for every id not already present. Idempotent.
    pub fn ensure_ids(&self, model: &str, ids: &[i64]) {
        let mut slices = self.lock();
        let slice = slices.entry(model.to_string()).or_default();
        for &id in ids {
            slice.entry(id).or_insert_with(|| minimal_dict(id));
        }
    }

    /// Every id in the model's slice whose field dict lacks at least one of
    /// the requested fields. This is the batching primitive: one pass yields
    /// the minimal id set that must be re-read. Sorted for stable wire calls.
    pub fn ids_missing_any(&self, model: &str, fields: &[String]) -> Vec<i64> {
        let slices = self.lock();
        let Some(slice) = slices.get(model) else {
            return Vec::new();
        };
        let mut missing: Vec<i64> = slice
            .iter()
            .filter(|(_, dict)| fields.iter().any(|field| !dict.contains_key(field)))
            .map(|(&id, _)| id)
            .collect();
        missing.sort_unstable();
        missing
    }

    pub fn cached_value(&self, model: &str, id: i64, field: &str) -> Option<Value> {
        self.lock().get(model)?.get(&id)?.get(field).cloned()
    }

    pub fn cached_label(&self, model: &str, id: i64) -> Option<String> {
        match self.cached_value(model, id, NAME_GET_KEY) {
            Some(Value::String(label)) => Some(label),
            _ => None,
        }
    }

    pub fn memoize_label(&self, model: &str, id: i64, label: &str) {
        let mut slices = self.lock();
        let dict = slices
            .entry(model.to_string())
            .or_default()
            .entry(id)
            .or_insert_with(|| minimal_dict(id));
        dict.insert(NAME_GET_KEY.to_string(), Value::String(label.to_string()));
    }

    /// Collapse one record's field dict back to `{"id": id}`. Does not cascade
    /// to related models; their cached fields stay intact.
    pub fn reset(&self, model: &str, id: i64) {
        let mut slices = self.lock();
        let slice = slices.entry(model.to_string()).or_default();
        slice.insert(id, minimal_dict(id));
    }

    /// Copy of one record's field dict, as currently cached.
    pub fn snapshot(&self, model: &str, id: i64) -> Option<FieldDict> {
        self.lock().get(model)?.get(&id).cloned()
    }

    /// Merge one freshly-read field into a record's dict. Relational values
    /// additionally seed the target model's slice with the referenced ids,
    /// memoizing the display label when the value carried one.
    pub fn absorb(
        &self,
        schema: &ModelSchema,
        id: i64,
        field: &str,
        value: &Value,
    ) -> ApiResult<()> {
        let mut slices = self.lock();
        absorb_locked(&mut slices, schema, id, field, value)
    }

    fn absorb_rows(
        &self,
        schema: &ModelSchema,
        rows: &[Map<String, Value>],
    ) -> ApiResult<()> {
        let mut slices = self.lock();
        for row in rows {
            let id = row.get("id").and_then(Value::as_i64).ok_or_else(|| {
                Error::new(ErrorKind::Corrupt)
                    .with_message("read row lacks an integer id")
                    .with_model(&schema.model)
            })?;
            for (field, value) in row {
                absorb_locked(&mut slices, schema, id, field, value)?;
            }
        }
        Ok(())
    }

    /// Batched, deduplicated fill rooted at `ids`. Each dotted path is split
    /// into its head field plus an optional sub-path on the related model;
    /// sub-paths resolving into the same model are merged before recursing, so
    /// N paths touching K distinct models cost at most K reads per level and
    /// already-cached ids/fields are never re-read.
    pub fn prefetch(
        &self,
        model: &str,
        ids: &[i64],
        paths: &[String],
        context: &Context,
    ) -> ApiResult<()> {
        self.ensure_ids(model, ids);
        let mut level: Vec<(String, Vec<String>)> = vec![(model.to_string(), paths.to_vec())];
        while !level.is_empty() {
            let mut next: Vec<(String, Vec<String>)> = Vec::new();
            for (model, paths) in level {
                let schema = self.schemas.schema_for(&model)?;
                let mut heads: Vec<String> = Vec::new();
                let mut tails: Vec<(String, String)> = Vec::new();
                for path in &paths {
                    let (head, rest) = split_path(path);
                    let info = schema.require_field(head)?;
                    if let Some(rest) = rest {
                        if !info.kind.is_relational() || info.relation.is_none() {
                            return Err(Error::new(ErrorKind::InvalidFieldPath)
                                .with_message("cannot traverse a non-relational field")
                                .with_model(&model)
                                .with_segment(head));
                        }
                        tails.push((head.to_string(), rest.to_string()));
                    }
                    if !heads.iter().any(|h| h == head) {
                        heads.push(head.to_string());
                    }
                }
                if heads.is_empty() {
                    continue;
                }
                let missing = self.ids_missing_any(&model, &heads);
                if !missing.is_empty() {
                    debug!(
                        model = %model,
                        ids = missing.len(),
                        fields = heads.len(),
                        "prefetch read"
                    );
                    let rows = self.gateway.read(&model, &missing, &heads, context)?;
                    self.absorb_rows(&schema, &rows)?;
                }
                for (field, sub_path) in tails {
                    let Some(target) = schema.field(&field).and_then(|i| i.relation.clone())
                    else {
                        continue;
                    };
                    match next.iter_mut().find(|(model, _)| *model == target) {
                        Some((_, sub_paths)) => {
                            if !sub_paths.contains(&sub_path) {
                                sub_paths.push(sub_path);
                            }
                        }
                        None => next.push((target, vec![sub_path])),
                    }
                }
            }
            level = next;
        }
        Ok(())
    }
}

fn minimal_dict(id: i64) -> FieldDict {
    let mut dict = FieldDict::new();
    dict.insert("id".to_string(), json!(id));
    dict
}

fn absorb_locked(
    slices: &mut Slices,
    schema: &ModelSchema,
    id: i64,
    field: &str,
    value: &Value,
) -> ApiResult<()> {
    let dict = slices
        .entry(schema.model.clone())
        .or_default()
        .entry(id)
        .or_insert_with(|| minimal_dict(id));
    dict.insert(field.to_string(), value.clone());

    // Relation-following is driven purely by the shape the schema promises;
    // fields the schema does not know are absorbed verbatim.
    let Some(info) = schema.field(field) else {
        return Ok(());
    };
    if !info.kind.is_relational() {
        return Ok(());
    }
    let Some(target) = &info.relation else {
        return Ok(());
    };
    match classify(info.kind, value)? {
        FieldValue::ManyToOne { id: target_id, label } => {
            let slice = slices.entry(target.clone()).or_default();
            let target_dict = slice.entry(target_id).or_insert_with(|| minimal_dict(target_id));
            if let Some(label) = label {
                target_dict.insert(NAME_GET_KEY.to_string(), Value::String(label));
            }
        }
        FieldValue::IdList(target_ids) => {
            let slice = slices.entry(target.clone()).or_default();
            for target_id in target_ids {
                slice.entry(target_id).or_insert_with(|| minimal_dict(target_id));
            }
        }
        FieldValue::Empty | FieldValue::Scalar(_) => {}
    }
    Ok(())
}
