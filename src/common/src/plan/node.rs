use crate::query::{
    Column, Constraint, JoinAlgorithm, JoinCondition, JoinType, Ordering, SelectorName,
    SetOperation,
};
use crate::schemata::SchemaColumn;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// PlanNodeId is used to identify nodes in a PlanTree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlanNodeId(pub(crate) usize);

impl fmt::Display for PlanNodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of operation a plan node performs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    /// Boundary for a query that can be pushed down to a single source.
    Access,
    DupRemove,
    Join,
    Project,
    Select,
    Sort,
    Source,
    Group,
    /// A node that produces no results.
    Null,
    Limit,
    SetOperation,
    /// Runs its first child before the second, binding the first's results to a variable.
    DependentQuery,
}

impl NodeType {
    pub const ALL: [NodeType; 12] = [
        NodeType::Access,
        NodeType::DupRemove,
        NodeType::Join,
        NodeType::Project,
        NodeType::Select,
        NodeType::Sort,
        NodeType::Source,
        NodeType::Group,
        NodeType::Null,
        NodeType::Limit,
        NodeType::SetOperation,
        NodeType::DependentQuery,
    ];

    pub fn symbol(&self) -> &'static str {
        match self {
            NodeType::Access => "Access",
            NodeType::DupRemove => "DupRemoval",
            NodeType::Join => "Join",
            NodeType::Project => "Project",
            NodeType::Select => "Select",
            NodeType::Sort => "Sort",
            NodeType::Source => "Source",
            NodeType::Group => "Group",
            NodeType::Null => "Null",
            NodeType::Limit => "Limit",
            NodeType::SetOperation => "SetOperation",
            NodeType::DependentQuery => "DependentQuery",
        }
    }

    /// Finds the type with the given symbol, ignoring case and surrounding whitespace.
    pub fn for_symbol(symbol: &str) -> Option<NodeType> {
        let symbol = symbol.trim();
        NodeType::ALL
            .iter()
            .copied()
            .find(|t| t.symbol().eq_ignore_ascii_case(symbol))
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Keys of the property bag on a plan node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Property {
    IsDependent,
    SelectCriteria,
    SetOperation,
    SetUseAll,
    JoinType,
    JoinAlgorithm,
    JoinCondition,
    JoinConstraints,
    SourceName,
    SourceAlias,
    SourceColumns,
    ProjectColumns,
    ProjectColumnTypes,
    GroupColumns,
    SortOrderBy,
    LimitCount,
    LimitOffset,
    AccessNoResults,
    VariableName,
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Property::IsDependent => "IS_DEPENDENT",
            Property::SelectCriteria => "SELECT_CRITERIA",
            Property::SetOperation => "SET_OPERATION",
            Property::SetUseAll => "SET_USE_ALL",
            Property::JoinType => "JOIN_TYPE",
            Property::JoinAlgorithm => "JOIN_ALGORITHM",
            Property::JoinCondition => "JOIN_CONDITION",
            Property::JoinConstraints => "JOIN_CONSTRAINTS",
            Property::SourceName => "SOURCE_NAME",
            Property::SourceAlias => "SOURCE_ALIAS",
            Property::SourceColumns => "SOURCE_COLUMNS",
            Property::ProjectColumns => "PROJECT_COLUMNS",
            Property::ProjectColumnTypes => "PROJECT_COLUMN_TYPES",
            Property::GroupColumns => "GROUP_COLUMNS",
            Property::SortOrderBy => "SORT_ORDER_BY",
            Property::LimitCount => "LIMIT_COUNT",
            Property::LimitOffset => "LIMIT_OFFSET",
            Property::AccessNoResults => "ACCESS_NO_RESULTS",
            Property::VariableName => "VARIABLE_NAME",
        };
        write!(f, "{}", name)
    }
}

/// A property value together with the key it is stored under.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum NodeProperty {
    IsDependent(bool),
    SelectCriteria(Constraint),
    SetOperation(SetOperation),
    SetUseAll(bool),
    JoinType(JoinType),
    JoinAlgorithm(JoinAlgorithm),
    JoinCondition(JoinCondition),
    JoinConstraints(Vec<Constraint>),
    SourceName(SelectorName),
    SourceAlias(SelectorName),
    SourceColumns(Vec<SchemaColumn>),
    ProjectColumns(Vec<Column>),
    ProjectColumnTypes(Vec<String>),
    GroupColumns(Vec<Column>),
    SortOrderBy(Vec<Ordering>),
    LimitCount(usize),
    LimitOffset(usize),
    AccessNoResults(bool),
    VariableName(String),
}

impl NodeProperty {
    /// The key this value is stored under.
    pub fn kind(&self) -> Property {
        match self {
            NodeProperty::IsDependent(_) => Property::IsDependent,
            NodeProperty::SelectCriteria(_) => Property::SelectCriteria,
            NodeProperty::SetOperation(_) => Property::SetOperation,
            NodeProperty::SetUseAll(_) => Property::SetUseAll,
            NodeProperty::JoinType(_) => Property::JoinType,
            NodeProperty::JoinAlgorithm(_) => Property::JoinAlgorithm,
            NodeProperty::JoinCondition(_) => Property::JoinCondition,
            NodeProperty::JoinConstraints(_) => Property::JoinConstraints,
            NodeProperty::SourceName(_) => Property::SourceName,
            NodeProperty::SourceAlias(_) => Property::SourceAlias,
            NodeProperty::SourceColumns(_) => Property::SourceColumns,
            NodeProperty::ProjectColumns(_) => Property::ProjectColumns,
            NodeProperty::ProjectColumnTypes(_) => Property::ProjectColumnTypes,
            NodeProperty::GroupColumns(_) => Property::GroupColumns,
            NodeProperty::SortOrderBy(_) => Property::SortOrderBy,
            NodeProperty::LimitCount(_) => Property::LimitCount,
            NodeProperty::LimitOffset(_) => Property::LimitOffset,
            NodeProperty::AccessNoResults(_) => Property::AccessNoResults,
            NodeProperty::VariableName(_) => Property::VariableName,
        }
    }

    /// True for values holding a list.
    pub fn is_collection(&self) -> bool {
        matches!(
            self,
            NodeProperty::JoinConstraints(_)
                | NodeProperty::SourceColumns(_)
                | NodeProperty::ProjectColumns(_)
                | NodeProperty::ProjectColumnTypes(_)
                | NodeProperty::GroupColumns(_)
                | NodeProperty::SortOrderBy(_)
        )
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            NodeProperty::IsDependent(b)
            | NodeProperty::SetUseAll(b)
            | NodeProperty::AccessNoResults(b) => Some(*b),
            _ => None,
        }
    }
}

fn join_display<T: fmt::Display>(items: &[T]) -> String {
    let items: Vec<String> = items.iter().map(|i| i.to_string()).collect();
    format!("[{}]", items.join(", "))
}

impl fmt::Display for NodeProperty {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let value = match self {
            NodeProperty::IsDependent(b)
            | NodeProperty::SetUseAll(b)
            | NodeProperty::AccessNoResults(b) => b.to_string(),
            NodeProperty::SelectCriteria(c) => c.to_string(),
            NodeProperty::SetOperation(op) => op.to_string(),
            NodeProperty::JoinType(t) => t.to_string(),
            NodeProperty::JoinAlgorithm(a) => a.to_string(),
            NodeProperty::JoinCondition(c) => c.to_string(),
            NodeProperty::JoinConstraints(cs) => join_display(cs),
            NodeProperty::SourceName(s) | NodeProperty::SourceAlias(s) => s.to_string(),
            NodeProperty::SourceColumns(cols) => {
                let names: Vec<&str> = cols.iter().map(|c| c.name.as_str()).collect();
                join_display(&names)
            }
            NodeProperty::ProjectColumns(cols) | NodeProperty::GroupColumns(cols) => {
                join_display(cols)
            }
            NodeProperty::ProjectColumnTypes(types) => join_display(types),
            NodeProperty::SortOrderBy(orderings) => join_display(orderings),
            NodeProperty::LimitCount(n) | NodeProperty::LimitOffset(n) => n.to_string(),
            NodeProperty::VariableName(name) => name.clone(),
        };
        write!(f, "{}", value)
    }
}

/// Order in which a subtree is searched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Traversal {
    /// Breadth-first.
    LevelOrder,
    /// Depth-first, parent before children.
    PreOrder,
}

/// One slot of the plan arena.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlanNode {
    node_type: NodeType,
    pub(crate) parent: Option<PlanNodeId>,
    pub(crate) children: Vec<PlanNodeId>,
    selectors: BTreeSet<SelectorName>,
    properties: BTreeMap<Property, NodeProperty>,
}

impl PlanNode {
    pub(crate) fn new(node_type: NodeType) -> Self {
        PlanNode {
            node_type,
            parent: None,
            children: Vec::new(),
            selectors: BTreeSet::new(),
            properties: BTreeMap::new(),
        }
    }

    /// Copy of the node's own data with no parent or children.
    pub(crate) fn detached_copy(&self) -> Self {
        PlanNode {
            node_type: self.node_type,
            parent: None,
            children: Vec::new(),
            selectors: self.selectors.clone(),
            properties: self.properties.clone(),
        }
    }

    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    pub fn set_node_type(&mut self, node_type: NodeType) {
        self.node_type = node_type;
    }

    pub fn is(&self, node_type: NodeType) -> bool {
        self.node_type == node_type
    }

    pub fn is_not(&self, node_type: NodeType) -> bool {
        self.node_type != node_type
    }

    pub fn is_one_of(&self, types: &[NodeType]) -> bool {
        types.contains(&self.node_type)
    }

    pub fn parent(&self) -> Option<PlanNodeId> {
        self.parent
    }

    pub fn children(&self) -> &[PlanNodeId] {
        &self.children
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn first_child(&self) -> Option<PlanNodeId> {
        self.children.first().copied()
    }

    pub fn last_child(&self) -> Option<PlanNodeId> {
        self.children.last().copied()
    }

    // Selectors

    pub fn selectors(&self) -> &BTreeSet<SelectorName> {
        &self.selectors
    }

    pub fn add_selector(&mut self, selector: SelectorName) -> bool {
        self.selectors.insert(selector)
    }

    pub fn add_selectors<I: IntoIterator<Item = SelectorName>>(&mut self, selectors: I) {
        self.selectors.extend(selectors);
    }

    pub fn remove_selector(&mut self, selector: &SelectorName) -> bool {
        self.selectors.remove(selector)
    }

    /// Replaces `original` with `replacement` if present.
    pub fn replace_selector(&mut self, original: &SelectorName, replacement: &SelectorName) -> bool {
        if self.selectors.remove(original) {
            self.selectors.insert(replacement.clone());
            return true;
        }
        false
    }

    pub fn clear_selectors(&mut self) {
        self.selectors.clear();
    }

    // Properties

    /// Stores the value under its own key, returning the value it replaced.
    pub fn set_property(&mut self, value: NodeProperty) -> Option<NodeProperty> {
        self.properties.insert(value.kind(), value)
    }

    pub fn remove_property(&mut self, property: Property) -> Option<NodeProperty> {
        self.properties.remove(&property)
    }

    pub fn property(&self, property: Property) -> Option<&NodeProperty> {
        self.properties.get(&property)
    }

    pub fn has_property(&self, property: Property) -> bool {
        self.properties.contains_key(&property)
    }

    /// True if the property holds a non-empty list.
    pub fn has_collection_property(&self, property: Property) -> bool {
        match self.properties.get(&property) {
            Some(NodeProperty::JoinConstraints(v)) => !v.is_empty(),
            Some(NodeProperty::SourceColumns(v)) => !v.is_empty(),
            Some(NodeProperty::ProjectColumns(v)) | Some(NodeProperty::GroupColumns(v)) => {
                !v.is_empty()
            }
            Some(NodeProperty::ProjectColumnTypes(v)) => !v.is_empty(),
            Some(NodeProperty::SortOrderBy(v)) => !v.is_empty(),
            _ => false,
        }
    }

    /// True if the property holds `true`.
    pub fn has_boolean_property(&self, property: Property) -> bool {
        self.properties
            .get(&property)
            .and_then(|p| p.as_bool())
            .unwrap_or(false)
    }

    pub fn properties(&self) -> impl Iterator<Item = &NodeProperty> {
        self.properties.values()
    }

    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    pub fn select_criteria(&self) -> Option<&Constraint> {
        match self.property(Property::SelectCriteria) {
            Some(NodeProperty::SelectCriteria(c)) => Some(c),
            _ => None,
        }
    }

    pub fn join_condition(&self) -> Option<&JoinCondition> {
        match self.property(Property::JoinCondition) {
            Some(NodeProperty::JoinCondition(c)) => Some(c),
            _ => None,
        }
    }

    pub fn join_type(&self) -> Option<JoinType> {
        match self.property(Property::JoinType) {
            Some(NodeProperty::JoinType(t)) => Some(*t),
            _ => None,
        }
    }

    pub fn join_constraints(&self) -> Option<&[Constraint]> {
        match self.property(Property::JoinConstraints) {
            Some(NodeProperty::JoinConstraints(c)) => Some(c),
            _ => None,
        }
    }

    pub fn source_name(&self) -> Option<&SelectorName> {
        match self.property(Property::SourceName) {
            Some(NodeProperty::SourceName(s)) => Some(s),
            _ => None,
        }
    }

    pub fn source_alias(&self) -> Option<&SelectorName> {
        match self.property(Property::SourceAlias) {
            Some(NodeProperty::SourceAlias(s)) => Some(s),
            _ => None,
        }
    }

    pub fn source_columns(&self) -> Option<&[SchemaColumn]> {
        match self.property(Property::SourceColumns) {
            Some(NodeProperty::SourceColumns(c)) => Some(c),
            _ => None,
        }
    }

    pub fn project_columns(&self) -> Option<&[Column]> {
        match self.property(Property::ProjectColumns) {
            Some(NodeProperty::ProjectColumns(c)) => Some(c),
            _ => None,
        }
    }

    pub fn project_column_types(&self) -> Option<&[String]> {
        match self.property(Property::ProjectColumnTypes) {
            Some(NodeProperty::ProjectColumnTypes(t)) => Some(t),
            _ => None,
        }
    }

    pub fn sort_order_by(&self) -> Option<&[Ordering]> {
        match self.property(Property::SortOrderBy) {
            Some(NodeProperty::SortOrderBy(o)) => Some(o),
            _ => None,
        }
    }

    pub fn limit_count(&self) -> Option<usize> {
        match self.property(Property::LimitCount) {
            Some(NodeProperty::LimitCount(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn limit_offset(&self) -> Option<usize> {
        match self.property(Property::LimitOffset) {
            Some(NodeProperty::LimitOffset(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn variable_name(&self) -> Option<&str> {
        match self.property(Property::VariableName) {
            Some(NodeProperty::VariableName(v)) => Some(v),
            _ => None,
        }
    }

    /// Compares type, selectors, and properties, ignoring tree links.
    pub(crate) fn same_data(&self, other: &PlanNode) -> bool {
        self.node_type == other.node_type
            && self.selectors == other.selectors
            && self.properties == other.properties
    }

    /// The single-line form `Type [sel1, sel2] <PROP=value, ...>`.
    pub fn describe(&self) -> String {
        let mut s = String::from(self.node_type.symbol());
        if !self.selectors.is_empty() {
            let names: Vec<&str> = self.selectors.iter().map(|s| s.name()).collect();
            s.push_str(&format!(" [{}]", names.join(", ")));
        }
        if !self.properties.is_empty() {
            let props: Vec<String> = self
                .properties
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            s.push_str(&format!(" <{}>", props.join(", ")));
        }
        s
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_for_symbol() {
        for t in NodeType::ALL.iter() {
            assert_eq!(Some(*t), NodeType::for_symbol(t.symbol()));
        }
        assert_eq!(Some(NodeType::DupRemove), NodeType::for_symbol("  dupremoval "));
        assert_eq!(Some(NodeType::SetOperation), NodeType::for_symbol("SETOPERATION"));
        assert_eq!(None, NodeType::for_symbol("Unknown"));
    }

    #[test]
    fn test_properties_keyed_by_kind() {
        let mut node = PlanNode::new(NodeType::Limit);
        assert_eq!(None, node.set_property(NodeProperty::LimitCount(10)));
        assert_eq!(
            Some(NodeProperty::LimitCount(10)),
            node.set_property(NodeProperty::LimitCount(20))
        );
        assert_eq!(Some(20), node.limit_count());
        assert_eq!(None, node.limit_offset());
        assert!(node.remove_property(Property::LimitCount).is_some());
        assert!(!node.has_property(Property::LimitCount));
    }

    #[test]
    fn test_collection_and_boolean_properties() {
        let mut node = PlanNode::new(NodeType::Project);
        node.set_property(NodeProperty::ProjectColumns(Vec::new()));
        assert!(!node.has_collection_property(Property::ProjectColumns));
        node.set_property(NodeProperty::ProjectColumns(vec![Column::new(
            &SelectorName::new("t"),
            "c",
        )]));
        assert!(node.has_collection_property(Property::ProjectColumns));
        node.set_property(NodeProperty::IsDependent(true));
        assert!(node.has_boolean_property(Property::IsDependent));
        assert!(!node.has_boolean_property(Property::SetUseAll));
    }

    #[test]
    fn test_describe() {
        let mut node = PlanNode::new(NodeType::Source);
        node.add_selector(SelectorName::new("t2"));
        node.add_selector(SelectorName::new("t1"));
        node.set_property(NodeProperty::SourceName(SelectorName::new("table")));
        node.set_property(NodeProperty::SourceAlias(SelectorName::new("t1")));
        assert_eq!(
            "Source [t1, t2] <SOURCE_NAME=table, SOURCE_ALIAS=t1>",
            node.describe()
        );
    }
}
