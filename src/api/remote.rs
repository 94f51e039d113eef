//! Purpose: JSON-RPC 2.0 gateway to a remote model store over HTTP.
//! Exports: `RemoteGateway`.
//! Role: The production `Gateway` implementation; one blocking POST per call.
//! Invariants: Requests go to `<base>/jsonrpc`, services `common` and `object`.
//! Invariants: Server faults surface as `ErrorKind::Remote` with the fault
//! code and message kept verbatim; no retry happens at this layer.
//! Invariants: Everything past login is `execute_kw` on the `object` service.

use crate::core::error::{ApiResult, Error, ErrorKind};
use crate::core::gateway::{Context, Domain, Gateway, SearchOptions, SearchResult};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;
use url::Url;

#[derive(Clone)]
pub struct RemoteGateway {
    inner: Arc<RemoteInner>,
}

struct RemoteInner {
    endpoint: Url,
    database: String,
    agent: ureq::Agent,
    auth: Mutex<Option<Auth>>,
    next_id: AtomicU64,
}

#[derive(Clone)]
struct Auth {
    uid: i64,
    password: String,
}

#[derive(Deserialize)]
struct RpcEnvelope {
    result: Option<Value>,
    error: Option<RpcFault>,
}

#[derive(Deserialize)]
struct RpcFault {
    code: Option<i64>,
    message: Option<String>,
    data: Option<RpcFaultData>,
}

#[derive(Deserialize)]
struct RpcFaultData {
    message: Option<String>,
}

impl RemoteGateway {
    pub fn new(base_url: impl Into<String>, database: impl Into<String>) -> ApiResult<Self> {
        let endpoint = normalize_base_url(base_url.into())?;
        Ok(Self {
            inner: Arc::new(RemoteInner {
                endpoint,
                database: database.into(),
                agent: ureq::AgentBuilder::new().build(),
                auth: Mutex::new(None),
                next_id: AtomicU64::new(1),
            }),
        })
    }

    pub fn database(&self) -> &str {
        &self.inner.database
    }

    pub fn endpoint(&self) -> &Url {
        &self.inner.endpoint
    }

    /// Authenticate against the `common` service and remember the credentials
    /// for subsequent `object` calls.
    pub fn login(&self, username: &str, password: &str) -> ApiResult<i64> {
        let result = self.call(
            "common",
            "login",
            vec![
                json!(self.inner.database),
                json!(username),
                json!(password),
            ],
        )?;
        let uid = result.as_i64().filter(|uid| *uid > 0).ok_or_else(|| {
            Error::new(ErrorKind::Remote)
                .with_message(format!("login rejected for {username}"))
        })?;
        let mut auth = self.lock_auth();
        *auth = Some(Auth {
            uid,
            password: password.to_string(),
        });
        Ok(uid)
    }

    /// Server version banner from the `common` service; needs no login.
    pub fn version(&self) -> ApiResult<Value> {
        self.call("common", "version", Vec::new())
    }

    fn lock_auth(&self) -> std::sync::MutexGuard<'_, Option<Auth>> {
        self.inner
            .auth
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    fn execute_kw(
        &self,
        model: &str,
        method: &str,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    ) -> ApiResult<Value> {
        let auth = self
            .lock_auth()
            .clone()
            .ok_or_else(|| Error::new(ErrorKind::Usage).with_message("login required"))?;
        self.call(
            "object",
            "execute_kw",
            vec![
                json!(self.inner.database),
                json!(auth.uid),
                json!(auth.password),
                json!(model),
                json!(method),
                Value::Array(args),
                Value::Object(kwargs),
            ],
        )
    }

    fn call(&self, service: &str, method: &str, args: Vec<Value>) -> ApiResult<Value> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "method": "call",
            "id": id,
            "params": {
                "service": service,
                "method": method,
                "args": args,
            },
        });
        debug!(service, method, id, "jsonrpc call");
        let body: Value = match self
            .inner
            .agent
            .request("POST", self.inner.endpoint.as_str())
            .send_json(payload)
        {
            Ok(response) => response.into_json().map_err(|err| {
                Error::new(ErrorKind::Corrupt)
                    .with_message("response body is not JSON")
                    .with_source(err)
            })?,
            // Fault bodies may ride on an HTTP error status.
            Err(ureq::Error::Status(code, response)) => match response.into_json::<Value>() {
                Ok(body) => body,
                Err(_) => {
                    return Err(Error::new(ErrorKind::Remote)
                        .with_message("server rejected the request")
                        .with_fault(code.to_string()));
                }
            },
            Err(err) => {
                return Err(Error::new(ErrorKind::Remote)
                    .with_message("transport failure")
                    .with_source(err));
            }
        };
        let envelope: RpcEnvelope = serde_json::from_value(body).map_err(|err| {
            Error::new(ErrorKind::Corrupt)
                .with_message("malformed jsonrpc envelope")
                .with_source(err)
        })?;
        if let Some(fault) = envelope.error {
            return Err(fault_error(fault));
        }
        envelope.result.ok_or_else(|| {
            Error::new(ErrorKind::Corrupt).with_message("jsonrpc response lacks a result")
        })
    }
}

fn fault_error(fault: RpcFault) -> Error {
    let detail = fault
        .data
        .and_then(|data| data.message)
        .or(fault.message)
        .unwrap_or_else(|| "server fault".to_string());
    let mut err = Error::new(ErrorKind::Remote).with_message(detail);
    if let Some(code) = fault.code {
        err = err.with_fault(code.to_string());
    }
    err
}

/// The server words a missing model as `Object <name> doesn't exist` (older
/// releases) or `Unknown model` / a bare `KeyError` on newer ones.
fn is_unknown_model_fault(err: &Error) -> bool {
    let text = err.to_string();
    text.contains("doesn't exist") || text.contains("Unknown model") || text.contains("KeyError")
}

fn normalize_base_url(raw: String) -> ApiResult<Url> {
    let mut url = Url::parse(&raw).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("invalid server url: {raw}"))
            .with_source(err)
    })?;
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("unsupported url scheme: {other}")));
        }
    }
    if url.path() == "/" || url.path().is_empty() {
        url.set_path("/jsonrpc");
    }
    Ok(url)
}

impl Gateway for RemoteGateway {
    fn read(
        &self,
        model: &str,
        ids: &[i64],
        fields: &[String],
        context: &Context,
    ) -> ApiResult<Vec<Map<String, Value>>> {
        let mut kwargs = Map::new();
        kwargs.insert("fields".to_string(), json!(fields));
        context.apply_to(&mut kwargs);
        let result = self.execute_kw(model, "read", vec![json!(ids)], kwargs)?;
        serde_json::from_value(result).map_err(|err| {
            Error::new(ErrorKind::Corrupt)
                .with_message("read result is not a list of records")
                .with_model(model)
                .with_source(err)
        })
    }

    fn search(
        &self,
        model: &str,
        domain: &Domain,
        options: &SearchOptions,
        context: &Context,
    ) -> ApiResult<SearchResult> {
        let mut kwargs = Map::new();
        context.apply_to(&mut kwargs);
        if options.count {
            let result =
                self.execute_kw(model, "search_count", vec![domain.to_value()], kwargs)?;
            let count = result.as_i64().ok_or_else(|| {
                Error::new(ErrorKind::Corrupt)
                    .with_message("search_count result is not an integer")
                    .with_model(model)
            })?;
            return Ok(SearchResult::Count(count));
        }
        if let Some(offset) = options.offset {
            kwargs.insert("offset".to_string(), json!(offset));
        }
        if let Some(limit) = options.limit {
            kwargs.insert("limit".to_string(), json!(limit));
        }
        if let Some(order) = &options.order {
            kwargs.insert("order".to_string(), json!(order));
        }
        let result = self.execute_kw(model, "search", vec![domain.to_value()], kwargs)?;
        let ids = serde_json::from_value(result).map_err(|err| {
            Error::new(ErrorKind::Corrupt)
                .with_message("search result is not an id list")
                .with_model(model)
                .with_source(err)
        })?;
        Ok(SearchResult::Ids(ids))
    }

    fn write(
        &self,
        model: &str,
        ids: &[i64],
        values: &Map<String, Value>,
        context: &Context,
    ) -> ApiResult<bool> {
        let mut kwargs = Map::new();
        context.apply_to(&mut kwargs);
        let result = self.execute_kw(
            model,
            "write",
            vec![json!(ids), Value::Object(values.clone())],
            kwargs,
        )?;
        Ok(result.as_bool().unwrap_or(true))
    }

    fn create(
        &self,
        model: &str,
        values: &Map<String, Value>,
        context: &Context,
    ) -> ApiResult<i64> {
        let mut kwargs = Map::new();
        context.apply_to(&mut kwargs);
        let result =
            self.execute_kw(model, "create", vec![Value::Object(values.clone())], kwargs)?;
        result.as_i64().ok_or_else(|| {
            Error::new(ErrorKind::Corrupt)
                .with_message("create result is not an id")
                .with_model(model)
        })
    }

    fn unlink(&self, model: &str, ids: &[i64], context: &Context) -> ApiResult<bool> {
        let mut kwargs = Map::new();
        context.apply_to(&mut kwargs);
        let result = self.execute_kw(model, "unlink", vec![json!(ids)], kwargs)?;
        Ok(result.as_bool().unwrap_or(true))
    }

    fn execute(
        &self,
        model: &str,
        method: &str,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    ) -> ApiResult<Value> {
        self.execute_kw(model, method, args, kwargs)
    }

    fn fields_get(&self, model: &str) -> ApiResult<Map<String, Value>> {
        let mut kwargs = Map::new();
        kwargs.insert(
            "attributes".to_string(),
            json!(["type", "relation", "relation_field", "required", "readonly", "string"]),
        );
        let result = self
            .execute_kw(model, "fields_get", Vec::new(), kwargs)
            .map_err(|err| {
                if err.kind() == ErrorKind::Remote && is_unknown_model_fault(&err) {
                    Error::new(ErrorKind::UnknownModel)
                        .with_message("model is not registered on the server")
                        .with_model(model)
                        .with_source(err)
                } else {
                    err
                }
            })?;
        match result {
            Value::Object(fields) => Ok(fields),
            other => Err(Error::new(ErrorKind::Corrupt)
                .with_message(format!("fields_get returned {other}"))
                .with_model(model)),
        }
    }
}
