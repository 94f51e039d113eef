//! Purpose: Ordered set of records sharing one relational cache.
//! Exports: `Collection`, `Mapped`.
//! Role: Batch prefetch, dotted-path mapping, bulk method dispatch, and
//! set-like membership operations over one model's ids.
//! Invariants: Membership changes never mutate the shared cache's field dicts.
//! Invariants: Every record produced here shares this collection's cache, so
//! prefetching through the collection is visible to each of them.

use crate::core::cache::RelationalCache;
use crate::core::error::{ApiResult, Error, ErrorKind};
use crate::core::ext::ModelExt;
use crate::core::gateway::{Context, Domain, SearchOptions};
use crate::core::record::{Record, reject_private};
use crate::core::value::classify;
use serde_json::{Map, Value, json};
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
pub struct Collection {
    model: String,
    ids: Vec<i64>,
    cache: Arc<RelationalCache>,
    context: Context,
    ext: Option<Arc<dyn ModelExt>>,
}

/// Result of `mapped`: scalar terminals flatten to deduplicated values,
/// relation terminals to the union of related records.
pub enum Mapped {
    Values(Vec<Value>),
    Records(Collection),
}

impl Mapped {
    pub fn into_values(self) -> ApiResult<Vec<Value>> {
        match self {
            Mapped::Values(values) => Ok(values),
            Mapped::Records(_) => Err(Error::new(ErrorKind::Usage)
                .with_message("path ends on a relation, not a scalar field")),
        }
    }

    pub fn into_records(self) -> ApiResult<Collection> {
        match self {
            Mapped::Records(records) => Ok(records),
            Mapped::Values(_) => Err(Error::new(ErrorKind::Usage)
                .with_message("path ends on a scalar field, not a relation")),
        }
    }
}

impl Collection {
    pub(crate) fn new(
        model: &str,
        ids: Vec<i64>,
        cache: Arc<RelationalCache>,
        context: Context,
    ) -> Self {
        cache.ensure_ids(model, &ids);
        let ext = cache.exts().resolve(model);
        Self {
            model: model.to_string(),
            ids,
            cache,
            context,
            ext,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.ids.contains(&id)
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    pub fn record_at(&self, index: usize) -> Option<Record> {
        let id = *self.ids.get(index)?;
        Some(Record::new(
            &self.model,
            id,
            self.cache.clone(),
            self.context.clone(),
        ))
    }

    pub fn records(&self) -> impl Iterator<Item = Record> + '_ {
        self.ids.iter().map(|&id| {
            Record::new(&self.model, id, self.cache.clone(), self.context.clone())
        })
    }

    /// Warm the cache for the given dotted paths, rooted at this collection's
    /// ids. With no paths, the model extension's default paths are used.
    /// Skipping this keeps records correct, just slower (one read per miss).
    pub fn prefetch(&self, paths: &[&str]) -> ApiResult<()> {
        let paths: Vec<String> = if paths.is_empty() {
            match &self.ext {
                Some(ext) => ext.default_prefetch(),
                None => Vec::new(),
            }
        } else {
            paths.iter().map(|p| p.to_string()).collect()
        };
        if paths.is_empty() {
            return Ok(());
        }
        self.cache
            .prefetch(&self.model, &self.ids, &paths, &self.context)
    }

    /// Resolve a dotted path for every member. Warms the path first, so no
    /// reads are issued beyond what `prefetch` would already have cached.
    pub fn mapped(&self, path: &str) -> ApiResult<Mapped> {
        let steps = self.cache.schemas().resolve_path(&self.model, path)?;
        self.prefetch(&[path])?;

        let mut model = self.model.clone();
        let mut ids: Vec<i64> = Vec::new();
        for &id in &self.ids {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }

        let last = steps.len() - 1;
        for (index, step) in steps.iter().enumerate() {
            if index == last && !step.kind.is_relational() {
                let mut values = Vec::new();
                for id in &ids {
                    if let Some(value) = self.cache.cached_value(&model, *id, &step.field) {
                        if !values.contains(&value) {
                            values.push(value);
                        }
                    }
                }
                return Ok(Mapped::Values(values));
            }
            let Some(target) = step.relation.clone() else {
                return Err(Error::new(ErrorKind::NotARelation)
                    .with_message("field has no relation target")
                    .with_model(&model)
                    .with_field(&step.field));
            };
            let mut next_ids: Vec<i64> = Vec::new();
            for id in &ids {
                let Some(raw) = self.cache.cached_value(&model, *id, &step.field) else {
                    continue;
                };
                for target_id in classify(step.kind, &raw)?.related_ids() {
                    if !next_ids.contains(&target_id) {
                        next_ids.push(target_id);
                    }
                }
            }
            model = target;
            ids = next_ids;
        }
        Ok(Mapped::Records(Collection::new(
            &model,
            ids,
            self.cache.clone(),
            self.context.clone(),
        )))
    }

    /// One remote call covering every member id.
    pub fn call(
        &self,
        method: &str,
        args: Vec<Value>,
        mut kwargs: Map<String, Value>,
    ) -> ApiResult<Value> {
        reject_private(method)?;
        let mut full_args = vec![json!(self.ids)];
        full_args.extend(args);
        self.context.apply_to(&mut kwargs);
        self.cache
            .gateway()
            .execute(&self.model, method, full_args, kwargs)
    }

    pub fn append(&mut self, id: i64) {
        self.ids.push(id);
        self.cache.ensure_ids(&self.model, &[id]);
    }

    pub fn insert(&mut self, index: usize, id: i64) {
        self.ids.insert(index, id);
        self.cache.ensure_ids(&self.model, &[id]);
    }

    pub fn remove(&mut self, index: usize) -> Option<i64> {
        if index < self.ids.len() {
            Some(self.ids.remove(index))
        } else {
            None
        }
    }

    /// Drop duplicate ids, keeping first occurrences.
    pub fn dedup(&mut self) {
        let mut seen = Vec::with_capacity(self.ids.len());
        self.ids.retain(|id| {
            if seen.contains(id) {
                false
            } else {
                seen.push(*id);
                true
            }
        });
    }

    /// Concatenation of two collections over the same model and cache.
    pub fn concat(&self, other: &Collection) -> ApiResult<Collection> {
        if self.model != other.model {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!(
                    "cannot concat collections of {} and {}",
                    self.model, other.model
                )));
        }
        let mut ids = self.ids.clone();
        ids.extend_from_slice(&other.ids);
        Ok(Collection::new(
            &self.model,
            ids,
            self.cache.clone(),
            self.context.clone(),
        ))
    }

    /// Sub-collection of ids the server confirms still exist, preserving this
    /// collection's order. One `search` call.
    pub fn existing(&self, uniquify: bool) -> ApiResult<Collection> {
        let mut ids = self.ids.clone();
        if uniquify {
            let mut seen = Vec::with_capacity(ids.len());
            ids.retain(|id| {
                if seen.contains(id) {
                    false
                } else {
                    seen.push(*id);
                    true
                }
            });
        }
        let alive = self
            .cache
            .gateway()
            .search(
                &self.model,
                &Domain::ids(&ids),
                &SearchOptions::default(),
                &self.context,
            )?
            .into_ids()?;
        ids.retain(|id| alive.contains(id));
        Ok(Collection::new(
            &self.model,
            ids,
            self.cache.clone(),
            self.context.clone(),
        ))
    }

    /// Bulk write-through; every member's cached fields are dropped on success.
    pub fn write(&self, values: Map<String, Value>) -> ApiResult<bool> {
        let ok = self
            .cache
            .gateway()
            .write(&self.model, &self.ids, &values, &self.context)?;
        for &id in &self.ids {
            self.cache.reset(&self.model, id);
        }
        Ok(ok)
    }

    pub fn unlink(&self) -> ApiResult<bool> {
        let ok = self
            .cache
            .gateway()
            .unlink(&self.model, &self.ids, &self.context)?;
        for &id in &self.ids {
            self.cache.reset(&self.model, id);
        }
        Ok(ok)
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Collection({}, {:?})", self.model, self.ids)
    }
}
