//! The plain-data query descriptor a criteria hands to a store.

use super::selector::{compare_values, point_at, Selector};
use crate::attributes::Attributes;
use crate::document::ID_FIELD;
use std::cmp::Ordering;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn reverse(self) -> Self {
        match self {
            Direction::Asc => Direction::Desc,
            Direction::Desc => Direction::Asc,
        }
    }

    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        }
    }
}

/// Field projection applied to every document read
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Projection {
    #[default]
    All,
    Only(Vec<String>),
    Without(Vec<String>),
}

impl Projection {
    /// Apply to a stored document; `_id` always survives
    pub fn apply(&self, doc: Attributes) -> Attributes {
        match self {
            Projection::All => doc,
            Projection::Only(fields) => doc
                .into_iter()
                .filter(|(field, _)| field == ID_FIELD || fields.iter().any(|f| f == field))
                .collect(),
            Projection::Without(fields) => doc
                .into_iter()
                .filter(|(field, _)| field == ID_FIELD || !fields.iter().any(|f| f == field))
                .collect(),
        }
    }
}

/// Geo ordering: documents closest to `point` first
#[derive(Debug, Clone, PartialEq)]
pub struct Near {
    pub field: String,
    pub point: [f64; 2],
    pub direction: Direction,
}

impl Near {
    pub fn distance(&self, doc: &Attributes) -> Option<f64> {
        let [x, y] = point_at(doc, &self.field)?;
        Some(((x - self.point[0]).powi(2) + (y - self.point[1]).powi(2)).sqrt())
    }
}

/// Everything a store needs to read a collection.
///
/// Always starts as `Query::default()`: no conditions, insertion order, no
/// paging, full documents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub selector: Selector,
    pub sort: Vec<(String, Direction)>,
    /// Direction of the insertion-order tie-break
    pub natural: Direction,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub projection: Projection,
    pub near: Option<Near>,
    /// Relations requested for eager loading; recorded, not executed
    pub inclusions: Vec<String>,
    /// Raw options not otherwise understood
    pub extras: Attributes,
}

impl Query {
    /// Same query in the opposite order (used by `last`)
    pub fn reversed(&self) -> Self {
        let mut query = self.clone();
        for (_, direction) in query.sort.iter_mut() {
            *direction = direction.reverse();
        }
        query.natural = query.natural.reverse();
        if let Some(near) = query.near.as_mut() {
            near.direction = near.direction.reverse();
        }
        query
    }

    /// Same selection without paging (used by `count`)
    pub fn unpaged(&self) -> Self {
        Self {
            skip: None,
            limit: None,
            ..self.clone()
        }
    }

    /// Compare two documents by near distance then sort keys.
    ///
    /// The insertion-order tie-break is left to the caller, which knows the
    /// insertion position.
    pub fn compare(&self, a: &Attributes, b: &Attributes) -> Ordering {
        if let Some(near) = &self.near {
            let da = near.distance(a).unwrap_or(f64::INFINITY);
            let db = near.distance(b).unwrap_or(f64::INFINITY);
            let ordering = near.direction.apply(da.partial_cmp(&db).unwrap_or(Ordering::Equal));
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        for (field, direction) in &self.sort {
            let ordering = direction.apply(compare_values(a.get_path(field), b.get_path(field)));
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    /// Apply skip and limit to an already ordered result
    pub fn page<T>(&self, items: Vec<T>) -> Vec<T> {
        let skip = self.skip.unwrap_or(0) as usize;
        let iter = items.into_iter().skip(skip);
        match self.limit {
            Some(limit) => iter.take(limit as usize).collect(),
            None => iter.collect(),
        }
    }
}
