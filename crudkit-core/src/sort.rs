//! Sorting criteria with an eagerly-validating chainable builder.

use serde::{Deserialize, Serialize};

use crate::error::{DbResult, db_errors};

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    #[serde(rename = "asc")]
    Asc,
    #[serde(rename = "desc")]
    Desc,
}

impl Order {
    /// The keyword used in ordering clauses.
    pub fn keyword(&self) -> &'static str {
        match self {
            Order::Asc => "asc",
            Order::Desc => "desc",
        }
    }
}

/// One (field, direction) pair of an ordered sort sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortCondition {
    pub field: String,
    pub order: Order,
}

/// An ordered sort sequence. Field uniqueness across the sequence is an
/// invariant enforced by [`Sorting`].
pub type Sort = Vec<SortCondition>;

/// Chainable sort builder.
///
/// Each `asc`/`desc` call validates immediately against the running field set
/// and fails with `DuplicatedSortingCondition` the moment a field repeats, in
/// either direction.
///
/// ```ignore
/// let sort = sort_by().asc(["name"])?.desc(["createdAt"])?.to_criteria();
/// ```
#[derive(Debug, Clone, Default)]
pub struct Sorting {
    sort: Sort,
    fields: Vec<String>,
}

impl Sorting {
    pub fn new() -> Self {
        Self::default()
    }

    fn add<I>(mut self, order: Order, fields: I) -> DbResult<Self>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        for field in fields {
            let field = field.into();
            if self.fields.contains(&field) {
                return Err(db_errors::duplicated_sorting_condition());
            }
            self.sort.push(SortCondition { field: field.clone(), order });
            self.fields.push(field);
        }
        Ok(self)
    }

    pub fn asc<I>(self, fields: I) -> DbResult<Self>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.add(Order::Asc, fields)
    }

    pub fn desc<I>(self, fields: I) -> DbResult<Self>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.add(Order::Desc, fields)
    }

    /// Returns the accumulated ordered sequence. Read-only; may be called any
    /// number of times.
    pub fn to_criteria(&self) -> Sort {
        self.sort.clone()
    }
}

/// Starts a new sort builder.
pub fn sort_by() -> Sorting {
    Sorting::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_in_call_order() {
        let sort = sort_by()
            .asc(["name", "email"])
            .unwrap()
            .desc(["createdAt"])
            .unwrap()
            .to_criteria();

        assert_eq!(sort.len(), 3);
        assert_eq!(sort[0].field, "name");
        assert_eq!(sort[0].order, Order::Asc);
        assert_eq!(sort[2].field, "createdAt");
        assert_eq!(sort[2].order, Order::Desc);
    }

    #[test]
    fn duplicate_field_fails_eagerly_in_either_direction() {
        let err = sort_by()
            .asc(["name"])
            .unwrap()
            .desc(["name"])
            .unwrap_err();
        assert_eq!(err.code, db_errors::duplicated_sorting_condition().code);

        let err = sort_by().asc(["age", "age"]).unwrap_err();
        assert_eq!(err.code, db_errors::duplicated_sorting_condition().code);
    }

    #[test]
    fn to_criteria_is_repeatable() {
        let sorting = sort_by().asc(["name"]).unwrap();
        assert_eq!(sorting.to_criteria(), sorting.to_criteria());
    }

    #[test]
    fn wire_shape_round_trips() {
        let sort = sort_by().desc(["places"]).unwrap().to_criteria();
        let json = serde_json::to_value(&sort).unwrap();
        assert_eq!(json[0]["field"], "places");
        assert_eq!(json[0]["order"], "desc");

        let parsed: Sort = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, sort);
    }
}
