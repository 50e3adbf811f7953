//! Selector: the condition tree a criteria narrows documents with.
//!
//! Conditions are evaluated directly against attribute mappings by the
//! memory store and rendered to SQL by the Postgres store. Both follow
//! document-database semantics:
//! - equality against an array field matches when the array contains the value
//! - a `null` equality matches a missing field
//! - ordering comparisons only hold between values of the same kind
//!   (number/number, string/string)

use crate::attributes::Attributes;
use crate::error::LifeError;
use serde_json::Value;
use std::cmp::Ordering;

/// Ordering comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    fn holds(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Gte => ordering != Ordering::Less,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Lte => ordering != Ordering::Greater,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
        }
    }
}

/// A single condition over a document
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(String, Value),
    Ne(String, Value),
    Compare(String, CompareOp, Value),
    In(String, Vec<Value>),
    NotIn(String, Vec<Value>),
    All(String, Vec<Value>),
    Exists(String, bool),
    /// Case-insensitive substring match over top-level string fields
    Search(String),
    /// Field holds a two-number coordinate array
    Point(String),
    And(Vec<Condition>),
    Or(Vec<Condition>),
}

impl Condition {
    /// Evaluate against a document
    pub fn matches(&self, doc: &Attributes) -> bool {
        match self {
            Condition::Eq(field, value) => equals(doc.get_path(field), value),
            Condition::Ne(field, value) => !equals(doc.get_path(field), value),
            Condition::Compare(field, op, value) => match doc.get_path(field) {
                Some(Value::Array(items)) => items.iter().any(|item| compares(item, *op, value)),
                Some(found) => compares(found, *op, value),
                None => false,
            },
            Condition::In(field, values) => {
                let found = doc.get_path(field);
                values.iter().any(|value| equals(found, value))
            }
            Condition::NotIn(field, values) => {
                let found = doc.get_path(field);
                !values.iter().any(|value| equals(found, value))
            }
            Condition::All(field, values) => match doc.get_path(field) {
                Some(Value::Array(items)) => {
                    !values.is_empty()
                        && values.iter().all(|value| items.iter().any(|item| same_value(item, value)))
                }
                Some(found) => !values.is_empty() && values.iter().all(|value| same_value(value, found)),
                None => false,
            },
            Condition::Exists(field, expected) => doc.get_path(field).is_some() == *expected,
            Condition::Search(term) => {
                let term = term.to_lowercase();
                doc.iter().any(|(field, value)| match value {
                    Value::String(s) => field != crate::document::ID_FIELD && s.to_lowercase().contains(&term),
                    _ => false,
                })
            }
            Condition::Point(field) => point_at(doc, field).is_some(),
            Condition::And(conditions) => conditions.iter().all(|c| c.matches(doc)),
            Condition::Or(conditions) => conditions.iter().any(|c| c.matches(doc)),
        }
    }
}

/// Conjunction of conditions applied to every document a criteria reads
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selector {
    conditions: Vec<Condition>,
}

impl Selector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, condition: Condition) {
        self.conditions.push(condition);
    }

    pub fn extend(&mut self, conditions: impl IntoIterator<Item = Condition>) {
        self.conditions.extend(conditions);
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, doc: &Attributes) -> bool {
        self.conditions.iter().all(|c| c.matches(doc))
    }
}

/// Translate an attribute mapping into conditions.
///
/// Plain values become equality conditions. A value that is an object whose
/// keys all start with `$` is an operator document
/// (`{"age": {"$gte": 18, "$lt": 65}}`).
pub fn conditions_from(attrs: &Attributes) -> Result<Vec<Condition>, LifeError> {
    let mut conditions = Vec::with_capacity(attrs.len());
    for (field, value) in attrs.iter() {
        match operator_document(value) {
            Some(ops) => {
                for (op, operand) in ops {
                    conditions.push(operator_condition(field, op, operand)?);
                }
            }
            None => conditions.push(Condition::Eq(field.clone(), value.clone())),
        }
    }
    Ok(conditions)
}

fn operator_document(value: &Value) -> Option<&serde_json::Map<String, Value>> {
    match value {
        Value::Object(map) if !map.is_empty() && map.keys().all(|k| k.starts_with('$')) => Some(map),
        _ => None,
    }
}

fn operator_condition(field: &str, op: &str, operand: &Value) -> Result<Condition, LifeError> {
    let field = field.to_string();
    Ok(match op {
        "$eq" => Condition::Eq(field, operand.clone()),
        "$ne" => Condition::Ne(field, operand.clone()),
        "$gt" => Condition::Compare(field, CompareOp::Gt, operand.clone()),
        "$gte" => Condition::Compare(field, CompareOp::Gte, operand.clone()),
        "$lt" => Condition::Compare(field, CompareOp::Lt, operand.clone()),
        "$lte" => Condition::Compare(field, CompareOp::Lte, operand.clone()),
        "$in" => {
            let values = operand_list(&field, op, operand)?;
            Condition::In(field, values)
        }
        "$nin" => {
            let values = operand_list(&field, op, operand)?;
            Condition::NotIn(field, values)
        }
        "$all" => {
            let values = operand_list(&field, op, operand)?;
            Condition::All(field, values)
        }
        "$exists" => Condition::Exists(field, truthy(operand)),
        other => {
            return Err(LifeError::QueryError(format!(
                "Unsupported operator {other} on field {field}"
            )))
        }
    })
}

fn operand_list(field: &str, op: &str, operand: &Value) -> Result<Vec<Value>, LifeError> {
    match operand {
        Value::Array(items) => Ok(items.clone()),
        other => Err(LifeError::QueryError(format!(
            "Operator {op} on {field} expects an array, got {other}"
        ))),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        _ => true,
    }
}

fn equals(found: Option<&Value>, expected: &Value) -> bool {
    match (found, expected) {
        (None, Value::Null) => true,
        (None, _) => false,
        (Some(Value::Array(items)), expected) if !expected.is_array() => {
            items.iter().any(|item| same_value(item, expected))
        }
        (Some(found), expected) => same_value(found, expected),
    }
}

/// JSON equality where `1` and `1.0` are the same number
fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(a, b)| same_value(a, b))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter().all(|(k, v)| b.get(k).is_some_and(|w| same_value(v, w)))
        }
        (a, b) => a == b,
    }
}

fn compares(found: &Value, op: CompareOp, expected: &Value) -> bool {
    match (found, expected) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b).is_some_and(|o| op.holds(o)),
            _ => false,
        },
        (Value::String(a), Value::String(b)) => op.holds(a.as_str().cmp(b.as_str())),
        _ => false,
    }
}

/// Read a `[x, y]` coordinate from a document field
pub fn point_at(doc: &Attributes, field: &str) -> Option<[f64; 2]> {
    match doc.get_path(field)? {
        Value::Array(items) if items.len() == 2 => Some([items[0].as_f64()?, items[1].as_f64()?]),
        _ => None,
    }
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(_)) => 1,
        Some(Value::String(_)) => 2,
        Some(Value::Object(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Bool(_)) => 5,
    }
}

/// Total order over optional JSON values used for sorting.
///
/// Values of different kinds order by kind: missing/null, numbers, strings,
/// objects, arrays, booleans.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let by_rank = type_rank(a).cmp(&type_rank(b));
    if by_rank != Ordering::Equal {
        return by_rank;
    }
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Array(x)), Some(Value::Array(y))) => {
            for (l, r) in x.iter().zip(y.iter()) {
                let o = compare_values(Some(l), Some(r));
                if o != Ordering::Equal {
                    return o;
                }
            }
            x.len().cmp(&y.len())
        }
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
        _ => Ordering::Equal,
    }
}
