//! Object model of a parsed query command.
pub use constraint::*;
use serde::{Deserialize, Serialize};
use std::fmt;
mod constraint;
pub mod visitor;

/// Table name used by the selector that covers every node in the workspace.
pub const ALL_NODES_NAME: &str = "__ALLNODES__";

/// Name of a table, view, or alias used within a query.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SelectorName(String);

impl SelectorName {
    pub fn new(name: &str) -> Self {
        SelectorName(name.to_string())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SelectorName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SelectorName {
    fn from(name: &str) -> Self {
        SelectorName::new(name)
    }
}

/// A named table (or the all-nodes table) with an optional alias.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Selector {
    pub name: SelectorName,
    pub alias: Option<SelectorName>,
}

impl Selector {
    pub fn named(name: &str) -> Self {
        Selector {
            name: SelectorName::new(name),
            alias: None,
        }
    }

    pub fn aliased(name: &str, alias: &str) -> Self {
        Selector {
            name: SelectorName::new(name),
            alias: Some(SelectorName::new(alias)),
        }
    }

    pub fn all_nodes() -> Self {
        Self::named(ALL_NODES_NAME)
    }

    /// The alias if there is one, otherwise the table name.
    pub fn alias_or_name(&self) -> &SelectorName {
        self.alias.as_ref().unwrap_or(&self.name)
    }

    pub fn is_all_nodes(&self) -> bool {
        self.name.name() == ALL_NODES_NAME
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.alias {
            Some(alias) => write!(f, "{} AS {}", self.name, alias),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Kinds of join.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinType {
    Inner,
    LeftOuter,
    RightOuter,
    FullOuter,
    Cross,
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let symbol = match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::LeftOuter => "LEFT OUTER JOIN",
            JoinType::RightOuter => "RIGHT OUTER JOIN",
            JoinType::FullOuter => "FULL OUTER JOIN",
            JoinType::Cross => "CROSS JOIN",
        };
        write!(f, "{}", symbol)
    }
}

/// Algorithm used to evaluate a join; the canonical plan always starts with nested loops.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinAlgorithm {
    NestedLoop,
    Merge,
}

impl fmt::Display for JoinAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            JoinAlgorithm::NestedLoop => write!(f, "NESTED_LOOP"),
            JoinAlgorithm::Merge => write!(f, "MERGE"),
        }
    }
}

/// A binary join of two sources.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Join {
    pub left: Source,
    pub right: Source,
    pub join_type: JoinType,
    pub condition: JoinCondition,
}

/// The FROM clause of a query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Source {
    Selector(Selector),
    Join(Box<Join>),
}

impl Source {
    pub fn join(left: Source, join_type: JoinType, right: Source, condition: JoinCondition) -> Self {
        Source::Join(Box::new(Join {
            left,
            right,
            join_type,
            condition,
        }))
    }
}

impl From<Selector> for Source {
    fn from(selector: Selector) -> Self {
        Source::Selector(selector)
    }
}

/// A projected column: a property of a selector, optionally renamed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Column {
    pub selector_name: SelectorName,
    pub property_name: String,
    pub column_name: String,
}

impl Column {
    /// Wildcard property name selecting every column of a selector.
    pub const WILDCARD: &'static str = "*";

    pub fn new(selector: &SelectorName, property: &str) -> Self {
        Self::aliased(selector, property, property)
    }

    pub fn aliased(selector: &SelectorName, property: &str, column: &str) -> Self {
        Column {
            selector_name: selector.clone(),
            property_name: property.to_string(),
            column_name: column.to_string(),
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.property_name == Column::WILDCARD
    }

    /// Returns a copy referring to another selector.
    pub fn with_selector(&self, selector: &SelectorName) -> Self {
        Column {
            selector_name: selector.clone(),
            property_name: self.property_name.clone(),
            column_name: self.column_name.clone(),
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.selector_name, self.property_name)?;
        if self.column_name != self.property_name {
            write!(f, " AS {}", self.column_name)?;
        }
        Ok(())
    }
}

/// Sort direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    Ascending,
    Descending,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ordering {
    pub operand: DynamicOperand,
    pub order: Order,
}

impl Ordering {
    pub fn ascending(operand: DynamicOperand) -> Self {
        Ordering {
            operand,
            order: Order::Ascending,
        }
    }

    pub fn descending(operand: DynamicOperand) -> Self {
        Ordering {
            operand,
            order: Order::Descending,
        }
    }
}

impl fmt::Display for Ordering {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.order {
            Order::Ascending => write!(f, "{} ASC", self.operand),
            Order::Descending => write!(f, "{} DESC", self.operand),
        }
    }
}

/// Row limit and offset of a query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limit {
    pub row_limit: usize,
    pub offset: usize,
}

impl Limit {
    pub const NONE: Limit = Limit {
        row_limit: usize::MAX,
        offset: 0,
    };

    pub fn rows(row_limit: usize) -> Self {
        Limit {
            row_limit,
            offset: 0,
        }
    }

    pub fn with_offset(&self, offset: usize) -> Self {
        Limit {
            row_limit: self.row_limit,
            offset,
        }
    }

    pub fn is_unlimited(&self) -> bool {
        self.row_limit == usize::MAX
    }

    pub fn is_offset(&self) -> bool {
        self.offset > 0
    }
}

impl Default for Limit {
    fn default() -> Self {
        Limit::NONE
    }
}

/// A single SELECT statement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub source: Source,
    pub constraint: Option<Constraint>,
    /// Empty means `SELECT *`.
    pub columns: Vec<Column>,
    pub orderings: Vec<Ordering>,
    pub limit: Limit,
    pub distinct: bool,
}

impl Query {
    /// Creates `SELECT * FROM source`.
    pub fn select_star(source: Source) -> Self {
        Query {
            source,
            constraint: None,
            columns: Vec::new(),
            orderings: Vec::new(),
            limit: Limit::NONE,
            distinct: false,
        }
    }

    pub fn with_columns(mut self, columns: Vec<Column>) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraint = Some(constraint);
        self
    }

    pub fn with_orderings(mut self, orderings: Vec<Ordering>) -> Self {
        self.orderings = orderings;
        self
    }

    pub fn with_limit(mut self, limit: Limit) -> Self {
        self.limit = limit;
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetOperation {
    Union,
    Intersect,
    Except,
}

impl fmt::Display for SetOperation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let symbol = match self {
            SetOperation::Union => "UNION",
            SetOperation::Intersect => "INTERSECT",
            SetOperation::Except => "EXCEPT",
        };
        write!(f, "{}", symbol)
    }
}

/// Two query commands combined with a set operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SetQuery {
    pub left: Box<QueryCommand>,
    pub right: Box<QueryCommand>,
    pub operation: SetOperation,
    pub all: bool,
    pub orderings: Vec<Ordering>,
    pub limit: Limit,
}

impl SetQuery {
    pub fn new(left: QueryCommand, operation: SetOperation, right: QueryCommand, all: bool) -> Self {
        SetQuery {
            left: Box::new(left),
            right: Box::new(right),
            operation,
            all,
            orderings: Vec::new(),
            limit: Limit::NONE,
        }
    }
}

/// Either a simple query or a set query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum QueryCommand {
    Query(Query),
    SetQuery(SetQuery),
}

impl QueryCommand {
    pub fn orderings(&self) -> &[Ordering] {
        match self {
            QueryCommand::Query(q) => &q.orderings,
            QueryCommand::SetQuery(s) => &s.orderings,
        }
    }

    pub fn limit(&self) -> Limit {
        match self {
            QueryCommand::Query(q) => q.limit,
            QueryCommand::SetQuery(s) => s.limit,
        }
    }
}

impl From<Query> for QueryCommand {
    fn from(query: Query) -> Self {
        QueryCommand::Query(query)
    }
}

impl From<SetQuery> for QueryCommand {
    fn from(query: SetQuery) -> Self {
        QueryCommand::SetQuery(query)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_selector_alias_or_name() {
        assert_eq!("t1", Selector::aliased("table", "t1").alias_or_name().name());
        assert_eq!("table", Selector::named("table").alias_or_name().name());
        assert!(Selector::all_nodes().is_all_nodes());
    }

    #[test]
    fn test_limit() {
        assert!(Limit::NONE.is_unlimited());
        assert!(!Limit::NONE.is_offset());
        let limit = Limit::rows(10).with_offset(5);
        assert!(!limit.is_unlimited());
        assert!(limit.is_offset());
    }

    #[test]
    fn test_column_display() {
        let t = SelectorName::new("t");
        assert_eq!("t.a", Column::new(&t, "a").to_string());
        assert_eq!("t.a AS b", Column::aliased(&t, "a", "b").to_string());
    }
}
