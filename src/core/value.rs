//! Purpose: Classify raw wire values into the field-value union.
//! Exports: `FieldValue`, `classify`.
//! Role: Turn loose JSON payloads into typed shapes driven by the schema's
//! field kind, never by sniffing the payload itself.
//! Invariants: A many2one label is optional; servers may send a bare id.
//! Invariants: Empty relational values arrive as JSON `false` or `null`.

use crate::core::error::{ApiResult, Error, ErrorKind};
use crate::core::schema::FieldKind;
use serde_json::Value;

#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    /// Unset value (`false`/`null` on the wire, any field kind).
    Empty,
    /// Non-relational value, kept verbatim.
    Scalar(Value),
    /// Single related record; the display label rides along when the server
    /// chose to send an `[id, label]` pair.
    ManyToOne { id: i64, label: Option<String> },
    /// one2many / many2many id list, in server order.
    IdList(Vec<i64>),
}

impl FieldValue {
    /// Ids referenced by this value, in order. Empty for scalars.
    pub fn related_ids(&self) -> Vec<i64> {
        match self {
            FieldValue::ManyToOne { id, .. } => vec![*id],
            FieldValue::IdList(ids) => ids.clone(),
            FieldValue::Empty | FieldValue::Scalar(_) => Vec::new(),
        }
    }
}

pub fn classify(kind: FieldKind, raw: &Value) -> ApiResult<FieldValue> {
    if is_unset(raw) {
        return Ok(FieldValue::Empty);
    }
    match kind {
        FieldKind::Many2One => classify_many2one(raw),
        FieldKind::One2Many | FieldKind::Many2Many => classify_id_list(raw),
        _ => Ok(FieldValue::Scalar(raw.clone())),
    }
}

fn is_unset(raw: &Value) -> bool {
    matches!(raw, Value::Null | Value::Bool(false))
}

fn classify_many2one(raw: &Value) -> ApiResult<FieldValue> {
    match raw {
        Value::Number(n) => {
            let id = n.as_i64().ok_or_else(|| bad_shape("many2one", raw))?;
            Ok(FieldValue::ManyToOne { id, label: None })
        }
        Value::Array(pair) if !pair.is_empty() && pair.len() <= 2 => {
            let id = pair[0].as_i64().ok_or_else(|| bad_shape("many2one", raw))?;
            let label = pair.get(1).and_then(Value::as_str).map(str::to_string);
            Ok(FieldValue::ManyToOne { id, label })
        }
        _ => Err(bad_shape("many2one", raw)),
    }
}

fn classify_id_list(raw: &Value) -> ApiResult<FieldValue> {
    let Value::Array(items) = raw else {
        return Err(bad_shape("x2many", raw));
    };
    let mut ids = Vec::with_capacity(items.len());
    for item in items {
        ids.push(item.as_i64().ok_or_else(|| bad_shape("x2many", raw))?);
    }
    Ok(FieldValue::IdList(ids))
}

fn bad_shape(kind: &str, raw: &Value) -> Error {
    Error::new(ErrorKind::Corrupt).with_message(format!("unexpected {kind} wire value: {raw}"))
}

#[cfg(test)]
mod tests {
    use super::{FieldValue, classify};
    use crate::core::schema::FieldKind;
    use serde_json::json;

    #[test]
    fn many2one_accepts_bare_id_and_pair() {
        assert_eq!(
            classify(FieldKind::Many2One, &json!(7)).unwrap(),
            FieldValue::ManyToOne { id: 7, label: None }
        );
        assert_eq!(
            classify(FieldKind::Many2One, &json!([7, "Ukraine"])).unwrap(),
            FieldValue::ManyToOne {
                id: 7,
                label: Some("Ukraine".to_string())
            }
        );
    }

    #[test]
    fn false_and_null_mean_unset_for_any_kind() {
        assert_eq!(
            classify(FieldKind::Many2One, &json!(false)).unwrap(),
            FieldValue::Empty
        );
        assert_eq!(
            classify(FieldKind::Char, &json!(null)).unwrap(),
            FieldValue::Empty
        );
        assert_eq!(
            classify(FieldKind::One2Many, &json!(false)).unwrap(),
            FieldValue::Empty
        );
    }

    #[test]
    fn id_lists_keep_server_order() {
        assert_eq!(
            classify(FieldKind::Many2Many, &json!([3, 1, 2])).unwrap(),
            FieldValue::IdList(vec![3, 1, 2])
        );
    }

    #[test]
    fn malformed_relational_values_are_corrupt() {
        assert!(classify(FieldKind::Many2One, &json!("seven")).is_err());
        assert!(classify(FieldKind::One2Many, &json!([1, "two"])).is_err());
    }

    #[test]
    fn scalars_pass_through_verbatim() {
        assert_eq!(
            classify(FieldKind::Char, &json!("Acme")).unwrap(),
            FieldValue::Scalar(json!("Acme"))
        );
        assert_eq!(
            classify(FieldKind::Integer, &json!(0)).unwrap(),
            FieldValue::Scalar(json!(0))
        );
    }
}
