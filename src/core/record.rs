//! Purpose: Identity-stable view over one slot of the relational cache.
//! Exports: `Record`, `Related`.
//! Role: Lazy per-record field access, relation following, and generic method
//! dispatch; never owns field data, only a reference to the shared cache.
//! Invariants: Equality and hashing cover `(model, id)` only.
//! Invariants: Dropping a record has no remote lifecycle implication.

use crate::core::cache::RelationalCache;
use crate::core::collection::Collection;
use crate::core::error::{ApiResult, Error, ErrorKind};
use crate::core::ext::ModelExt;
use crate::core::gateway::Context;
use crate::core::value::{FieldValue, classify};
use serde_json::{Map, Value, json};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

#[derive(Clone)]
pub struct Record {
    model: String,
    id: i64,
    cache: Arc<RelationalCache>,
    context: Context,
    ext: Option<Arc<dyn ModelExt>>,
}

/// Result of following a relation field.
#[derive(Debug)]
pub enum Related {
    /// many2one: the single related record, `None` when the value is unset.
    Single(Option<Record>),
    /// one2many / many2many: every related record, in server order.
    Many(Collection),
}

impl Related {
    pub fn into_record(self) -> ApiResult<Option<Record>> {
        match self {
            Related::Single(record) => Ok(record),
            Related::Many(_) => Err(Error::new(ErrorKind::Usage)
                .with_message("x2many relation accessed as a single record")),
        }
    }

    pub fn into_collection(self) -> ApiResult<Collection> {
        match self {
            Related::Many(collection) => Ok(collection),
            Related::Single(_) => Err(Error::new(ErrorKind::Usage)
                .with_message("many2one relation accessed as a collection")),
        }
    }
}

impl Record {
    pub(crate) fn new(model: &str, id: i64, cache: Arc<RelationalCache>, context: Context) -> Self {
        cache.ensure_ids(model, &[id]);
        let ext = cache.exts().resolve(model);
        Self {
            model: model.to_string(),
            id,
            cache,
            context,
            ext,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    /// Cached value verbatim; on a miss, a single-field single-id prefetch.
    /// Callers operating on many records should batch through a collection.
    pub fn get(&self, field: &str) -> ApiResult<Value> {
        if let Some(value) = self.cache.cached_value(&self.model, self.id, field) {
            return Ok(value);
        }
        self.cache.prefetch(
            &self.model,
            &[self.id],
            &[field.to_string()],
            &self.context,
        )?;
        self.cache
            .cached_value(&self.model, self.id, field)
            .ok_or_else(|| {
                Error::new(ErrorKind::Corrupt)
                    .with_message("read did not return the requested field")
                    .with_model(&self.model)
                    .with_field(field)
            })
    }

    /// Follow a relation field through the shared cache.
    pub fn related(&self, field: &str) -> ApiResult<Related> {
        let schema = self.cache.schemas().schema_for(&self.model)?;
        let info = schema.require_field(field)?;
        let (kind, target) = match (&info.relation, info.kind.is_relational()) {
            (Some(target), true) => (info.kind, target.clone()),
            _ => {
                return Err(Error::new(ErrorKind::NotARelation)
                    .with_message("field has no relation target")
                    .with_model(&self.model)
                    .with_field(field));
            }
        };
        let raw = self.get(field)?;
        match classify(kind, &raw)? {
            FieldValue::Empty => {
                if kind == crate::core::schema::FieldKind::Many2One {
                    Ok(Related::Single(None))
                } else {
                    Ok(Related::Many(Collection::new(
                        &target,
                        Vec::new(),
                        self.cache.clone(),
                        self.context.clone(),
                    )))
                }
            }
            FieldValue::ManyToOne { id, .. } => Ok(Related::Single(Some(Record::new(
                &target,
                id,
                self.cache.clone(),
                self.context.clone(),
            )))),
            FieldValue::IdList(ids) => Ok(Related::Many(Collection::new(
                &target,
                ids,
                self.cache.clone(),
                self.context.clone(),
            ))),
            FieldValue::Scalar(_) => Err(Error::new(ErrorKind::Corrupt)
                .with_message("relational field carried a scalar value")
                .with_model(&self.model)
                .with_field(field)),
        }
    }

    /// Forward an arbitrary remote method bound to this record's id. The
    /// data-field/server-method distinction is an explicit branch: callers use
    /// `get` for fields and `call` for everything else.
    pub fn call(
        &self,
        method: &str,
        args: Vec<Value>,
        mut kwargs: Map<String, Value>,
    ) -> ApiResult<Value> {
        reject_private(method)?;
        let mut full_args = vec![json!([self.id])];
        full_args.extend(args);
        self.context.apply_to(&mut kwargs);
        self.cache
            .gateway()
            .execute(&self.model, method, full_args, kwargs)
    }

    /// Display label. Uses the label memoized from many2one absorption, then
    /// the extension's display field, then one `name_get` round trip.
    pub fn name(&self) -> ApiResult<String> {
        if let Some(label) = self.cache.cached_label(&self.model, self.id) {
            return Ok(label);
        }
        if let Some(field) = self.ext.as_deref().and_then(ModelExt::display_field) {
            if let Value::String(label) = self.get(field)? {
                self.cache.memoize_label(&self.model, self.id, &label);
                return Ok(label);
            }
        }
        let result = self.call("name_get", Vec::new(), Map::new())?;
        let label = decode_name_get(&result, self.id).ok_or_else(|| {
            Error::new(ErrorKind::Corrupt)
                .with_message("name_get did not return a label for the record")
                .with_model(&self.model)
        })?;
        self.cache.memoize_label(&self.model, self.id, &label);
        Ok(label)
    }

    /// Write values remotely; on success this record's cached fields are
    /// dropped so dependent fields recomputed by the server are not stale.
    pub fn write(&self, values: Map<String, Value>) -> ApiResult<bool> {
        let ok = self
            .cache
            .gateway()
            .write(&self.model, &[self.id], &values, &self.context)?;
        self.cache.reset(&self.model, self.id);
        Ok(ok)
    }

    /// Delete the remote entity. The cache slot collapses to `{"id"}`.
    pub fn unlink(&self) -> ApiResult<bool> {
        let ok = self
            .cache
            .gateway()
            .unlink(&self.model, &[self.id], &self.context)?;
        self.cache.reset(&self.model, self.id);
        Ok(ok)
    }

    /// Drop this record's cached fields only; lazy re-fetch on next access.
    pub fn refresh(&self) {
        self.cache.reset(&self.model, self.id);
    }
}

pub(crate) fn reject_private(method: &str) -> ApiResult<()> {
    if method.starts_with('_') {
        return Err(Error::new(ErrorKind::PrivateMethod)
            .with_message("private methods are rejected locally")
            .with_field(method));
    }
    Ok(())
}

fn decode_name_get(result: &Value, id: i64) -> Option<String> {
    for pair in result.as_array()? {
        let pair = pair.as_array()?;
        if pair.first()?.as_i64()? == id {
            return pair.get(1)?.as_str().map(str::to_string);
        }
    }
    None
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.model == other.model && self.id == other.id
    }
}

impl Eq for Record {}

impl Hash for Record {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.model.hash(state);
        self.id.hash(state);
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Record({}, {})", self.model, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::{decode_name_get, reject_private};
    use crate::core::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn private_method_names_never_reach_the_wire() {
        let err = reject_private("_compute_totals").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PrivateMethod);
        assert!(reject_private("action_confirm").is_ok());
    }

    #[test]
    fn name_get_decoding_matches_by_id() {
        let payload = json!([[7, "Ukraine"], [9, "Poland"]]);
        assert_eq!(decode_name_get(&payload, 9), Some("Poland".to_string()));
        assert_eq!(decode_name_get(&payload, 8), None);
        assert_eq!(decode_name_get(&json!(true), 7), None);
    }
}
