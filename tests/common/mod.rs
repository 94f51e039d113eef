//! Purpose: In-process recording gateway backing the integration tests.
//! Exports: `RecordingGateway`, `demo_gateway`, `CallRecord`.
//! Role: Scripted remote store that counts wire calls, so tests can assert
//! the batching and no-redundant-read guarantees exactly.
//! Invariants: Reads return only requested fields (plus id), `false` for
//! fields a row does not populate, and omit rows for unknown ids.
#![allow(dead_code)]

use remodel::api::{
    ApiResult, Context, Domain, Error, ErrorKind, Gateway, SearchOptions, SearchResult,
};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Clone, Debug, PartialEq)]
pub struct CallRecord {
    pub model: String,
    pub method: String,
    pub detail: Value,
}

#[derive(Default)]
pub struct RecordingGateway {
    fields: HashMap<String, Value>,
    rows: HashMap<String, HashMap<i64, Map<String, Value>>>,
    log: Mutex<Vec<CallRecord>>,
    next_id: Mutex<i64>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self {
            next_id: Mutex::new(1000),
            ..Self::default()
        }
    }

    pub fn with_model(mut self, model: &str, fields: Value) -> Self {
        self.fields.insert(model.to_string(), fields);
        self.rows.entry(model.to_string()).or_default();
        self
    }

    pub fn with_row(mut self, model: &str, id: i64, row: Value) -> Self {
        let Value::Object(row) = row else {
            panic!("row fixtures must be JSON objects");
        };
        self.rows.entry(model.to_string()).or_default().insert(id, row);
        self
    }

    pub fn calls(&self) -> Vec<CallRecord> {
        self.log.lock().unwrap().clone()
    }

    /// `(model, ids, fields)` for every `read` issued, in order.
    pub fn reads(&self) -> Vec<(String, Vec<i64>, Vec<String>)> {
        self.calls()
            .into_iter()
            .filter(|call| call.method == "read")
            .map(|call| {
                let ids = ids_from(&call.detail["ids"]);
                let fields = call.detail["fields"]
                    .as_array()
                    .unwrap()
                    .iter()
                    .map(|f| f.as_str().unwrap().to_string())
                    .collect();
                (call.model, ids, fields)
            })
            .collect()
    }

    pub fn read_count(&self) -> usize {
        self.calls().iter().filter(|call| call.method == "read").count()
    }

    fn record(&self, model: &str, method: &str, detail: Value) {
        self.log.lock().unwrap().push(CallRecord {
            model: model.to_string(),
            method: method.to_string(),
            detail,
        });
    }

    fn known_ids(&self, model: &str) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .rows
            .get(model)
            .map(|rows| rows.keys().copied().collect())
            .unwrap_or_default();
        ids.sort_unstable();
        ids
    }
}

fn ids_from(value: &Value) -> Vec<i64> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|id| id.as_i64().unwrap())
        .collect()
}

impl Gateway for RecordingGateway {
    fn read(
        &self,
        model: &str,
        ids: &[i64],
        fields: &[String],
        context: &Context,
    ) -> ApiResult<Vec<Map<String, Value>>> {
        self.record(
            model,
            "read",
            json!({
                "ids": ids,
                "fields": fields,
                "context": Value::Object(context.entries().clone()),
            }),
        );
        let rows = self.rows.get(model).ok_or_else(|| {
            Error::new(ErrorKind::Remote)
                .with_message("read on unknown model")
                .with_model(model)
        })?;
        let mut result = Vec::new();
        for id in ids {
            let Some(row) = rows.get(id) else {
                continue;
            };
            let mut out = Map::new();
            out.insert("id".to_string(), json!(id));
            for field in fields {
                let value = row.get(field).cloned().unwrap_or(Value::Bool(false));
                out.insert(field.clone(), value);
            }
            result.push(out);
        }
        Ok(result)
    }

    fn search(
        &self,
        model: &str,
        domain: &Domain,
        options: &SearchOptions,
        _context: &Context,
    ) -> ApiResult<SearchResult> {
        self.record(model, "search", json!({ "domain": domain.to_value() }));
        let known = self.known_ids(model);
        // The only domain shape the fixtures understand is [["id","in",[..]]].
        let matched: Vec<i64> = match domain.to_value().as_array().and_then(|terms| {
            let term = terms.first()?.as_array()?;
            if term.first()?.as_str()? == "id" && term.get(1)?.as_str()? == "in" {
                Some(ids_from(term.get(2)?))
            } else {
                None
            }
        }) {
            Some(requested) => requested.into_iter().filter(|id| known.contains(id)).collect(),
            None => known,
        };
        if options.count {
            return Ok(SearchResult::Count(matched.len() as i64));
        }
        Ok(SearchResult::Ids(matched))
    }

    fn write(
        &self,
        model: &str,
        ids: &[i64],
        values: &Map<String, Value>,
        _context: &Context,
    ) -> ApiResult<bool> {
        self.record(
            model,
            "write",
            json!({ "ids": ids, "values": Value::Object(values.clone()) }),
        );
        Ok(true)
    }

    fn create(
        &self,
        model: &str,
        values: &Map<String, Value>,
        _context: &Context,
    ) -> ApiResult<i64> {
        self.record(
            model,
            "create",
            json!({ "values": Value::Object(values.clone()) }),
        );
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        Ok(*next)
    }

    fn unlink(&self, model: &str, ids: &[i64], _context: &Context) -> ApiResult<bool> {
        self.record(model, "unlink", json!({ "ids": ids }));
        Ok(true)
    }

    fn execute(
        &self,
        model: &str,
        method: &str,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    ) -> ApiResult<Value> {
        self.record(
            model,
            method,
            json!({ "args": args, "kwargs": Value::Object(kwargs) }),
        );
        if method == "name_get" {
            let ids = ids_from(args.first().ok_or_else(|| {
                Error::new(ErrorKind::Remote).with_message("name_get without ids")
            })?);
            let rows = self.rows.get(model).ok_or_else(|| {
                Error::new(ErrorKind::Remote).with_message("name_get on unknown model")
            })?;
            let pairs: Vec<Value> = ids
                .iter()
                .filter_map(|id| {
                    let label = rows.get(id)?.get("name")?.clone();
                    Some(json!([id, label]))
                })
                .collect();
            return Ok(Value::Array(pairs));
        }
        Ok(json!({ "model": model, "method": method }))
    }

    fn fields_get(&self, model: &str) -> ApiResult<Map<String, Value>> {
        self.record(model, "fields_get", Value::Null);
        match self.fields.get(model) {
            Some(Value::Object(fields)) => Ok(fields.clone()),
            _ => Err(Error::new(ErrorKind::UnknownModel)
                .with_message("model is not registered on the server")
                .with_model(model)),
        }
    }
}

/// Three-model fixture: `m` records point at partners, partners at countries.
pub fn demo_gateway() -> RecordingGateway {
    RecordingGateway::new()
        .with_model(
            "m",
            json!({
                "name": {"type": "char", "required": true},
                "partner_id": {"type": "many2one", "relation": "res.partner"},
            }),
        )
        .with_model(
            "res.partner",
            json!({
                "name": {"type": "char", "required": true},
                "country_id": {"type": "many2one", "relation": "res.country"},
                "bank_ids": {
                    "type": "one2many",
                    "relation": "res.partner.bank",
                    "relation_field": "partner_id",
                },
            }),
        )
        .with_model(
            "res.country",
            json!({
                "name": {"type": "char"},
                "code": {"type": "char"},
            }),
        )
        .with_model(
            "res.partner.bank",
            json!({
                "acc_number": {"type": "char"},
                "partner_id": {"type": "many2one", "relation": "res.partner"},
            }),
        )
        .with_row("m", 1, json!({"name": "alpha", "partner_id": [10, "Partner Ten"]}))
        .with_row("m", 2, json!({"name": "beta", "partner_id": [11, "Partner Eleven"]}))
        .with_row("m", 3, json!({"name": "gamma", "partner_id": [10, "Partner Ten"]}))
        .with_row("m", 4, json!({"name": "delta", "partner_id": false}))
        .with_row(
            "res.partner",
            10,
            json!({"name": "Partner Ten", "country_id": [7, "Ukraine"], "bank_ids": [101, 102]}),
        )
        .with_row(
            "res.partner",
            11,
            json!({"name": "Partner Eleven", "country_id": [8, "Poland"], "bank_ids": []}),
        )
        .with_row("res.country", 7, json!({"name": "Ukraine", "code": "UA"}))
        .with_row("res.country", 8, json!({"name": "Poland", "code": "PL"}))
        .with_row("res.partner.bank", 101, json!({"acc_number": "UA01"}))
        .with_row("res.partner.bank", 102, json!({"acc_number": "UA02"}))
}
