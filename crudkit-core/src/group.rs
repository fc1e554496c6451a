//! Grouping and aggregation criteria.
//!
//! A [`Group`] is pure data accepted by the orchestrators as-is: entries
//! without an aggregate become both a selected column and a grouping key,
//! entries with an aggregate become `AGGREGATE(field) AS alias` computed
//! columns.

use serde::{Deserialize, Serialize};

/// Aggregate functions recognized by the group-by translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Aggregate {
    #[serde(rename = "COUNT")]
    Count,
    #[serde(rename = "MAX")]
    Max,
    #[serde(rename = "MIN")]
    Min,
    #[serde(rename = "SUM")]
    Sum,
    #[serde(rename = "AVG")]
    Avg,
}

impl Aggregate {
    /// The function keyword emitted into select clauses.
    pub fn keyword(&self) -> &'static str {
        match self {
            Aggregate::Count => "COUNT",
            Aggregate::Max => "MAX",
            Aggregate::Min => "MIN",
            Aggregate::Sum => "SUM",
            Aggregate::Avg => "AVG",
        }
    }
}

/// One entry of a group-by request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupCondition {
    pub field: String,
    pub alias: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<Aggregate>,
}

impl GroupCondition {
    /// A grouping key entry.
    pub fn key(field: impl Into<String>, alias: impl Into<String>) -> Self {
        Self { field: field.into(), alias: alias.into(), aggregate: None }
    }

    /// A computed aggregate column entry.
    pub fn aggregate(
        field: impl Into<String>,
        alias: impl Into<String>,
        aggregate: Aggregate,
    ) -> Self {
        Self {
            field: field.into(),
            alias: alias.into(),
            aggregate: Some(aggregate),
        }
    }
}

/// An ordered group-by request.
pub type Group = Vec<GroupCondition>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_shape_round_trips() {
        let group = vec![
            GroupCondition::key("officeCode", "office"),
            GroupCondition::aggregate("places", "totalPlaces", Aggregate::Sum),
        ];
        let json = serde_json::to_value(&group).unwrap();
        assert_eq!(json[0]["alias"], "office");
        assert!(json[0].get("aggregate").is_none());
        assert_eq!(json[1]["aggregate"], "SUM");

        let parsed: Group = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, group);
    }
}
