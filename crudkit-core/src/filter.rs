//! Filter criteria construction and compilation.
//!
//! A filter is a recursive boolean tree with two leaf kinds: a
//! [`FilterCondition`] (`field`, operation code, value) and a [`FilterGroup`]
//! (`AND`/`OR` over nested items). The tree is a plain wire shape — it
//! serializes with a `level` discriminant (`"c"` / `"g"`) — and compiles by
//! structural recursion into a [`FilterCriteria`]: a parameterized statement
//! plus its variable bindings, directly usable as a query fragment.
//!
//! ```ignore
//! use crudkit_core::filter::{Condition, Filter};
//!
//! let group = Filter::and([
//!     Condition::eq("country", "US").into(),
//!     Filter::or([
//!         Condition::gr("places", 50).into(),
//!         Condition::empty("closedAt").into(),
//!     ])
//!     .into(),
//! ]);
//! let criteria = Filter::to_criteria(&group)?;
//! // criteria.statement: ((country = :pqxrm) AND ((places > :kzjwv) OR (ISNULL(closedAt))))
//! # Ok::<(), crudkit_core::error::DbError>(())
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{DbResult, db_errors};
use crate::ident::generate_var_name;

/// Length of generated placeholder names.
const VAR_NAME_LENGTH: usize = 5;

/// The recognized condition operations with their wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperation {
    /// Equal, `=`.
    Eq,
    /// Not equal, `!=`.
    Neq,
    /// Greater, `>`.
    Gr,
    /// Greater or equal, `>=`.
    Gre,
    /// Less, `<`.
    Ls,
    /// Less or equal, `<=`.
    Lse,
    /// Case-insensitive pattern match, `like`.
    Like,
    /// Membership in a list value, `in`.
    In,
    /// Null check, `empty`. Binds no value.
    Empty,
}

impl FilterOperation {
    /// The wire-level operation code carried by a [`FilterCondition`].
    pub fn code(&self) -> &'static str {
        match self {
            FilterOperation::Eq => "=",
            FilterOperation::Neq => "!=",
            FilterOperation::Gr => ">",
            FilterOperation::Gre => ">=",
            FilterOperation::Ls => "<",
            FilterOperation::Lse => "<=",
            FilterOperation::Like => "like",
            FilterOperation::In => "in",
            FilterOperation::Empty => "empty",
        }
    }

    /// Resolves a wire code back to an operation.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "=" => Some(FilterOperation::Eq),
            "!=" => Some(FilterOperation::Neq),
            ">" => Some(FilterOperation::Gr),
            ">=" => Some(FilterOperation::Gre),
            "<" => Some(FilterOperation::Ls),
            "<=" => Some(FilterOperation::Lse),
            "like" => Some(FilterOperation::Like),
            "in" => Some(FilterOperation::In),
            "empty" => Some(FilterOperation::Empty),
            _ => None,
        }
    }

    /// Renders the parenthesized predicate for a field and placeholder name.
    fn operand(&self, field: &str, var: &str) -> String {
        match self {
            FilterOperation::Eq => format!("({field} = :{var})"),
            FilterOperation::Neq => format!("({field} != :{var})"),
            FilterOperation::Gr => format!("({field} > :{var})"),
            FilterOperation::Gre => format!("({field} >= :{var})"),
            FilterOperation::Ls => format!("({field} < :{var})"),
            FilterOperation::Lse => format!("({field} <= :{var})"),
            FilterOperation::Like => format!("(LOWER({field}) LIKE LOWER(:{var}))"),
            FilterOperation::In => format!("({field} IN :{var})"),
            FilterOperation::Empty => format!("(ISNULL({field}))"),
        }
    }
}

/// Boolean connective of a [`FilterGroup`], also used as the join operator for
/// property-based lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupOperation {
    #[serde(rename = "AND")]
    And,
    #[serde(rename = "OR")]
    Or,
}

impl fmt::Display for GroupOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupOperation::And => write!(f, "AND"),
            GroupOperation::Or => write!(f, "OR"),
        }
    }
}

/// Leaf of the filter tree: one field compared to one value.
///
/// The operation travels as its wire code so the shape round-trips losslessly;
/// an unrecognized code is rejected at compile time with
/// `UnsupportedFilterOperation`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    pub field: String,
    pub operation: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub value: Value,
}

/// Recursive node of the filter tree. An empty `items` sequence compiles to an
/// empty statement (matches everything), never an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterGroup {
    pub operation: GroupOperation,
    pub items: Vec<FilterItem>,
}

/// Tagged union over the two filter tree leaf kinds, discriminated by the
/// wire-level `level` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "level")]
pub enum FilterItem {
    #[serde(rename = "c")]
    Condition(FilterCondition),
    #[serde(rename = "g")]
    Group(FilterGroup),
}

impl From<FilterCondition> for FilterItem {
    fn from(condition: FilterCondition) -> Self {
        FilterItem::Condition(condition)
    }
}

impl From<FilterGroup> for FilterItem {
    fn from(group: FilterGroup) -> Self {
        FilterItem::Group(group)
    }
}

/// Compiled output: a parameterized statement and its variable bindings.
///
/// Every named placeholder in `statement` has exactly one entry in
/// `variables`, and every generated placeholder name is unique within one
/// compilation, so fragments merge without collisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCriteria {
    pub statement: String,
    pub variables: Map<String, Value>,
}

impl FilterCriteria {
    /// Criteria that matches everything.
    pub fn empty() -> Self {
        Self { statement: String::new(), variables: Map::new() }
    }

    pub fn new(statement: impl Into<String>, variables: Map<String, Value>) -> Self {
        Self { statement: statement.into(), variables }
    }

    pub fn is_empty(&self) -> bool {
        self.statement.trim().is_empty()
    }
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self::empty()
    }
}

/// Constructors and the compiler for single conditions.
pub struct Condition;

impl Condition {
    fn condition(field: impl Into<String>, operation: FilterOperation, value: Value) -> FilterCondition {
        FilterCondition {
            field: field.into(),
            operation: operation.code().to_string(),
            value,
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> FilterCondition {
        Self::condition(field, FilterOperation::Eq, value.into())
    }

    pub fn noteq(field: impl Into<String>, value: impl Into<Value>) -> FilterCondition {
        Self::condition(field, FilterOperation::Neq, value.into())
    }

    pub fn gr(field: impl Into<String>, value: impl Into<Value>) -> FilterCondition {
        Self::condition(field, FilterOperation::Gr, value.into())
    }

    pub fn gre(field: impl Into<String>, value: impl Into<Value>) -> FilterCondition {
        Self::condition(field, FilterOperation::Gre, value.into())
    }

    pub fn ls(field: impl Into<String>, value: impl Into<Value>) -> FilterCondition {
        Self::condition(field, FilterOperation::Ls, value.into())
    }

    pub fn lse(field: impl Into<String>, value: impl Into<Value>) -> FilterCondition {
        Self::condition(field, FilterOperation::Lse, value.into())
    }

    pub fn like(field: impl Into<String>, value: impl Into<Value>) -> FilterCondition {
        Self::condition(field, FilterOperation::Like, value.into())
    }

    pub fn is_in(field: impl Into<String>, value: impl Into<Value>) -> FilterCondition {
        Self::condition(field, FilterOperation::In, value.into())
    }

    pub fn empty(field: impl Into<String>) -> FilterCondition {
        Self::condition(field, FilterOperation::Empty, Value::Null)
    }

    /// Compiles a single condition into a parameterized fragment.
    pub fn to_criteria(condition: &FilterCondition) -> DbResult<FilterCriteria> {
        let mut compiler = Compiler::new();
        let statement = compiler.condition(condition)?;
        Ok(FilterCriteria::new(statement, compiler.variables))
    }
}

/// Constructors and the compiler for filter groups.
pub struct Filter;

impl Filter {
    pub fn and<I>(items: I) -> FilterGroup
    where
        I: IntoIterator<Item = FilterItem>,
    {
        FilterGroup {
            operation: GroupOperation::And,
            items: items.into_iter().collect(),
        }
    }

    pub fn or<I>(items: I) -> FilterGroup
    where
        I: IntoIterator<Item = FilterItem>,
    {
        FilterGroup {
            operation: GroupOperation::Or,
            items: items.into_iter().collect(),
        }
    }

    /// Compiles a filter group into a parameterized fragment.
    ///
    /// Blank children are skipped, the rest are joined with the group's
    /// operator and wrapped in parentheses; an empty group compiles to the
    /// empty criteria.
    pub fn to_criteria(group: &FilterGroup) -> DbResult<FilterCriteria> {
        let mut compiler = Compiler::new();
        let statement = compiler.group(group)?;
        Ok(FilterCriteria::new(statement, compiler.variables))
    }
}

/// Structural-recursion compiler sharing one variables map across the whole
/// tree, so placeholder names never collide when subtree fragments merge.
struct Compiler {
    variables: Map<String, Value>,
}

impl Compiler {
    fn new() -> Self {
        Self { variables: Map::new() }
    }

    fn fresh_var(&self) -> String {
        loop {
            let name = generate_var_name(VAR_NAME_LENGTH);
            if !self.variables.contains_key(&name) {
                return name;
            }
        }
    }

    fn condition(&mut self, condition: &FilterCondition) -> DbResult<String> {
        let operation = FilterOperation::from_code(&condition.operation)
            .ok_or_else(db_errors::unsupported_filter_operation)?;

        if operation == FilterOperation::Empty {
            return Ok(operation.operand(&condition.field, ""));
        }

        let var = self.fresh_var();
        let statement = operation.operand(&condition.field, &var);
        self.variables.insert(var, condition.value.clone());
        Ok(statement)
    }

    fn group(&mut self, group: &FilterGroup) -> DbResult<String> {
        if group.items.is_empty() {
            return Ok(String::new());
        }

        let mut parts = Vec::with_capacity(group.items.len());
        for item in &group.items {
            let statement = match item {
                FilterItem::Condition(condition) => self.condition(condition)?,
                FilterItem::Group(nested) => self.group(nested)?,
            };
            if !statement.trim().is_empty() {
                parts.push(statement);
            }
        }

        let joined = parts.join(&format!(" {} ", group.operation));
        if joined.trim().len() > 1 {
            Ok(format!("({joined})"))
        } else {
            Ok(String::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn empty_group_compiles_to_empty_criteria() {
        let criteria = Filter::to_criteria(&Filter::and([])).unwrap();
        assert_eq!(criteria.statement, "");
        assert!(criteria.variables.is_empty());
        assert!(criteria.is_empty());
    }

    #[test]
    fn condition_binds_one_placeholder() {
        let criteria = Condition::to_criteria(&Condition::eq("name", "Alice")).unwrap();
        assert_eq!(criteria.variables.len(), 1);

        let (var, value) = criteria.variables.iter().next().unwrap();
        assert_eq!(criteria.statement, format!("(name = :{var})"));
        assert_eq!(value, &json!("Alice"));
    }

    #[test]
    fn empty_operation_is_a_null_check_without_binding() {
        let criteria = Condition::to_criteria(&Condition::empty("deletedAt")).unwrap();
        assert_eq!(criteria.statement, "(ISNULL(deletedAt))");
        assert!(criteria.variables.is_empty());
    }

    #[test]
    fn and_of_two_conditions_binds_distinct_placeholders() {
        let group = Filter::and([
            Condition::eq("x", 1).into(),
            Condition::eq("y", 2).into(),
        ]);
        let criteria = Filter::to_criteria(&group).unwrap();

        assert_eq!(criteria.variables.len(), 2);
        assert!(criteria.statement.starts_with('('));
        assert!(criteria.statement.ends_with(')'));
        assert!(criteria.statement.contains(" AND "));
        for (var, _) in &criteria.variables {
            assert!(criteria.statement.contains(&format!(":{var}")));
        }
        let bound: Vec<&Value> = criteria.variables.values().collect();
        assert!(bound.contains(&&json!(1)));
        assert!(bound.contains(&&json!(2)));
    }

    #[test]
    fn nested_groups_merge_variables_without_collision() {
        let group = Filter::or([
            Filter::and([
                Condition::eq("a", 1).into(),
                Condition::gr("b", 2).into(),
            ])
            .into(),
            Condition::lse("c", 3).into(),
        ]);
        let criteria = Filter::to_criteria(&group).unwrap();

        assert_eq!(criteria.variables.len(), 3);
        assert!(criteria.statement.contains(" OR "));
        assert!(criteria.statement.contains(" AND "));
    }

    #[test]
    fn blank_children_are_skipped() {
        let group = Filter::and([
            Filter::or([]).into(),
            Condition::eq("x", 1).into(),
        ]);
        let criteria = Filter::to_criteria(&group).unwrap();
        assert!(!criteria.statement.contains("AND"));
        assert_eq!(criteria.variables.len(), 1);
    }

    #[test]
    fn unknown_operation_code_is_rejected() {
        let condition = FilterCondition {
            field: "x".to_string(),
            operation: "~=".to_string(),
            value: json!(1),
        };
        let err = Condition::to_criteria(&condition).unwrap_err();
        assert_eq!(err.code, db_errors::unsupported_filter_operation().code);

        let group = Filter::and([condition.into()]);
        let err = Filter::to_criteria(&group).unwrap_err();
        assert_eq!(err.code, db_errors::unsupported_filter_operation().code);
    }

    #[test]
    fn wire_shape_round_trips() {
        let group = Filter::and([
            Condition::eq("status", "active").into(),
            Filter::or([Condition::empty("archivedAt").into()]).into(),
        ]);
        let json = serde_json::to_value(&group).unwrap();
        assert_eq!(json["operation"], "AND");
        assert_eq!(json["items"][0]["level"], "c");
        assert_eq!(json["items"][0]["operation"], "=");
        assert_eq!(json["items"][1]["level"], "g");

        let parsed: FilterGroup = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, group);
    }

    #[test]
    fn like_compiles_case_insensitive() {
        let criteria = Condition::to_criteria(&Condition::like("name", "%ali%")).unwrap();
        let (var, _) = criteria.variables.iter().next().unwrap();
        assert_eq!(criteria.statement, format!("(LOWER(name) LIKE LOWER(:{var}))"));
    }
}
