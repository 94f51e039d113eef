//! Purpose: Connected-client surface tying one gateway to one schema cache
//! and one relational cache.
//! Exports: `Client`, `ModelHandle`.
//! Role: Entry point for callers; hands out collections and records that all
//! share the client's cache instance. No ambient or static registries.
//! Invariants: One `SchemaCache` and one `RelationalCache` per client.
//! Invariants: Model handles validate the model against the server schema once.

use crate::api::remote::RemoteGateway;
use crate::core::cache::RelationalCache;
use crate::core::collection::Collection;
use crate::core::error::{ApiResult, Error, ErrorKind};
use crate::core::ext::ModelExt;
use crate::core::gateway::{Context, Domain, Gateway, SearchOptions, SearchResult};
use crate::core::record::{Record, reject_private};
use crate::core::schema::{ModelSchema, SchemaCache};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

pub struct Client {
    gateway: Arc<dyn Gateway>,
    schemas: Arc<SchemaCache>,
    cache: Arc<RelationalCache>,
    context: Context,
}

impl Client {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        let schemas = Arc::new(SchemaCache::new(gateway.clone()));
        let cache = Arc::new(RelationalCache::new(gateway.clone(), schemas.clone()));
        Self {
            gateway,
            schemas,
            cache,
            context: Context::new(),
        }
    }

    /// Connect and authenticate against a remote server in one step.
    pub fn connect(url: &str, database: &str, username: &str, password: &str) -> ApiResult<Self> {
        let gateway = RemoteGateway::new(url, database)?;
        gateway.login(username, password)?;
        Ok(Self::new(Arc::new(gateway)))
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn gateway(&self) -> &Arc<dyn Gateway> {
        &self.gateway
    }

    pub fn cache(&self) -> &Arc<RelationalCache> {
        &self.cache
    }

    pub fn schemas(&self) -> &Arc<SchemaCache> {
        &self.schemas
    }

    /// Install a per-model behavior extension. Resolved once whenever a record
    /// or collection for that model is constructed.
    pub fn register_ext(&self, ext: Arc<dyn ModelExt>) {
        self.cache.exts().register(ext);
    }

    /// Handle on one remote model. Loads (and memoizes) the model's schema,
    /// failing with `UnknownModel` when the server does not know it.
    pub fn model(&self, name: &str) -> ApiResult<ModelHandle> {
        let schema = self.schemas.schema_for(name)?;
        Ok(ModelHandle {
            schema,
            cache: self.cache.clone(),
            context: self.context.clone(),
        })
    }
}

pub struct ModelHandle {
    schema: Arc<ModelSchema>,
    cache: Arc<RelationalCache>,
    context: Context,
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModelHandle({})", self.schema.model)
    }
}

impl ModelHandle {
    pub fn name(&self) -> &str {
        &self.schema.model
    }

    pub fn schema(&self) -> &ModelSchema {
        &self.schema
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    /// Collection over the given ids. Lazy: no wire call until fields are
    /// prefetched or accessed.
    pub fn browse(&self, ids: &[i64]) -> Collection {
        Collection::new(
            &self.schema.model,
            ids.to_vec(),
            self.cache.clone(),
            self.context.clone(),
        )
    }

    pub fn record(&self, id: i64) -> Record {
        Record::new(
            &self.schema.model,
            id,
            self.cache.clone(),
            self.context.clone(),
        )
    }

    pub fn search(&self, domain: &Domain, options: &SearchOptions) -> ApiResult<Collection> {
        if options.count {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("use search_count for counting searches"));
        }
        let ids = self
            .cache
            .gateway()
            .search(&self.schema.model, domain, options, &self.context)?
            .into_ids()?;
        Ok(self.browse(&ids))
    }

    pub fn search_count(&self, domain: &Domain) -> ApiResult<i64> {
        let options = SearchOptions {
            count: true,
            ..SearchOptions::default()
        };
        match self
            .cache
            .gateway()
            .search(&self.schema.model, domain, &options, &self.context)?
        {
            SearchResult::Count(count) => Ok(count),
            SearchResult::Ids(ids) => Ok(ids.len() as i64),
        }
    }

    pub fn create(&self, values: Map<String, Value>) -> ApiResult<Record> {
        let id = self
            .cache
            .gateway()
            .create(&self.schema.model, &values, &self.context)?;
        self.cache.ensure_ids(&self.schema.model, &[id]);
        Ok(self.record(id))
    }

    /// Bulk write-through; the touched ids' cached fields are dropped on
    /// success so server-recomputed fields are re-fetched lazily.
    pub fn write(&self, ids: &[i64], values: Map<String, Value>) -> ApiResult<bool> {
        let ok = self
            .cache
            .gateway()
            .write(&self.schema.model, ids, &values, &self.context)?;
        for &id in ids {
            self.cache.reset(&self.schema.model, id);
        }
        Ok(ok)
    }

    pub fn unlink(&self, ids: &[i64]) -> ApiResult<bool> {
        let ok = self
            .cache
            .gateway()
            .unlink(&self.schema.model, ids, &self.context)?;
        for &id in ids {
            self.cache.reset(&self.schema.model, id);
        }
        Ok(ok)
    }

    /// Model-level method dispatch (no bound ids). Private names are rejected
    /// locally, as for records and collections.
    pub fn call(
        &self,
        method: &str,
        args: Vec<Value>,
        mut kwargs: Map<String, Value>,
    ) -> ApiResult<Value> {
        reject_private(method)?;
        self.context.apply_to(&mut kwargs);
        self.cache
            .gateway()
            .execute(&self.schema.model, method, args, kwargs)
    }
}
