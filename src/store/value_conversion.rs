//! Value conversion utilities for SeaQuery to may_postgres.
//!
//! The Postgres store only ever binds text (JSON documents, paths, search
//! patterns), doubles (numeric comparisons, near points) and integers
//! (LIMIT/OFFSET). Values are collected into typed vectors first, then
//! referenced, so the references stay valid for the duration of the closure.

use crate::error::LifeError;
use may_postgres::types::ToSql;
use sea_query::Value;

enum Slot {
    Text(usize),
    Double(usize),
    BigInt(usize),
}

/// Convert SeaQuery values to may_postgres `ToSql` parameters and run `f`
/// with them.
///
/// # Errors
///
/// Returns `LifeError::QueryError` for value types the store never binds, or
/// for unsigned values beyond `i64::MAX`.
pub fn with_converted_params<F, R>(values: &sea_query::Values, f: F) -> Result<R, LifeError>
where
    F: FnOnce(&[&dyn ToSql]) -> Result<R, LifeError>,
{
    let mut texts: Vec<String> = Vec::new();
    let mut doubles: Vec<f64> = Vec::new();
    let mut big_ints: Vec<i64> = Vec::new();
    let mut slots = Vec::with_capacity(values.iter().count());

    // First pass: collect all values into typed vectors
    for value in values.iter() {
        match value {
            Value::String(Some(s)) => {
                slots.push(Slot::Text(texts.len()));
                texts.push(s.to_string());
            }
            Value::Double(Some(d)) => {
                slots.push(Slot::Double(doubles.len()));
                doubles.push(*d);
            }
            Value::Float(Some(d)) => {
                slots.push(Slot::Double(doubles.len()));
                doubles.push(f64::from(*d));
            }
            Value::BigInt(Some(i)) => {
                slots.push(Slot::BigInt(big_ints.len()));
                big_ints.push(*i);
            }
            Value::Int(Some(i)) => {
                slots.push(Slot::BigInt(big_ints.len()));
                big_ints.push(i64::from(*i));
            }
            Value::Unsigned(Some(u)) => {
                slots.push(Slot::BigInt(big_ints.len()));
                big_ints.push(i64::from(*u));
            }
            Value::BigUnsigned(Some(u)) => {
                let i = i64::try_from(*u).map_err(|_| {
                    LifeError::QueryError(format!(
                        "BigUnsigned value {u} exceeds i64::MAX, cannot be bound"
                    ))
                })?;
                slots.push(Slot::BigInt(big_ints.len()));
                big_ints.push(i);
            }
            other => {
                return Err(LifeError::QueryError(format!(
                    "Unsupported value type in document query: {other:?}"
                )));
            }
        }
    }

    // Second pass: create references to the stored values
    let params: Vec<&dyn ToSql> = slots
        .iter()
        .map(|slot| match slot {
            Slot::Text(i) => &texts[*i] as &dyn ToSql,
            Slot::Double(i) => &doubles[*i] as &dyn ToSql,
            Slot::BigInt(i) => &big_ints[*i] as &dyn ToSql,
        })
        .collect();

    f(&params)
}
