//! Utilities used by the planner and by later plan rewrites: required-column inference,
//! selector renaming after a source is removed, view expansion, and subquery bind variables.
//!
//! The expression rewrites return [`Cow::Borrowed`] holding the input when nothing had to
//! change, so callers can skip updating a node that is already correct.
use super::QueryContext;
use common::plan::{NodeProperty, NodeType, PlanNodeId, PlanTree, Traversal};
use common::query::visitor;
use common::query::{
    ArithmeticOperator, Column, Constraint, DynamicOperand, JoinCondition, Ordering, QueryCommand,
    SelectorName, StaticOperand,
};
use common::schemata::{Schemata, Table};
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Prefix of the bind variables that stand in for subqueries.
pub const SUBQUERY_VARIABLE_PREFIX: &str = "__subquery";

fn unchanged<T: Clone>(value: &Cow<T>) -> bool {
    matches!(value, Cow::Borrowed(_))
}

/// Builds a replacement only when `selector` has a new name in `renames`.
fn rename<'o, T, F>(
    original: &'o T,
    selector: &SelectorName,
    renames: &HashMap<SelectorName, SelectorName>,
    build: F,
) -> Cow<'o, T>
where
    T: Clone,
    F: FnOnce(SelectorName) -> T,
{
    match renames.get(selector) {
        Some(replacement) => Cow::Owned(build(replacement.clone())),
        None => Cow::Borrowed(original),
    }
}

// Required columns

/// Collects the columns referenced against a fixed set of selectors.
struct RequiredColumns {
    names: HashSet<SelectorName>,
    seen: HashSet<(String, String)>,
    columns: Vec<Column>,
}

impl RequiredColumns {
    fn new(names: HashSet<SelectorName>) -> Self {
        RequiredColumns {
            names,
            seen: HashSet::new(),
            columns: Vec::new(),
        }
    }

    fn require(&mut self, selector: &SelectorName, property: &str, alias: Option<&str>) {
        if !self.names.contains(selector) {
            return;
        }
        let alias = alias.unwrap_or(property);
        if self.seen.insert((property.to_string(), alias.to_string())) {
            self.columns.push(Column::aliased(selector, property, alias));
        }
    }

    fn visit_constraint(&mut self, constraint: &Constraint) {
        match constraint {
            Constraint::And(left, right) | Constraint::Or(left, right) => {
                self.visit_constraint(left);
                self.visit_constraint(right);
            }
            Constraint::Not(c) => self.visit_constraint(c),
            Constraint::Comparison { operand1, .. } => self.visit_operand(operand1),
            Constraint::Between { operand, .. } | Constraint::SetCriteria { operand, .. } => {
                self.visit_operand(operand)
            }
            Constraint::PropertyExistence { selector, property } => {
                self.require(selector, property, None)
            }
            _ => {}
        }
    }

    fn visit_operand(&mut self, operand: &DynamicOperand) {
        match operand {
            DynamicOperand::PropertyValue { selector, property }
            | DynamicOperand::Length { selector, property } => self.require(selector, property, None),
            DynamicOperand::ReferenceValue {
                selector,
                property: Some(property),
            } => self.require(selector, property, None),
            DynamicOperand::LowerCase(inner) | DynamicOperand::UpperCase(inner) => {
                self.visit_operand(inner)
            }
            DynamicOperand::Arithmetic { left, right, .. } => {
                self.visit_operand(left);
                self.visit_operand(right);
            }
            _ => {}
        }
    }

    fn visit_join_condition(&mut self, condition: &JoinCondition) {
        if let JoinCondition::Equi {
            selector1,
            property1,
            selector2,
            property2,
        } = condition
        {
            self.require(selector1, property1, None);
            self.require(selector2, property2, None);
        }
    }
}

/// Finds the columns that the subtree at `node` must produce.
///
/// The result starts with the columns of the nearest PROJECT at or above `node`, then adds
/// the columns used by the JOIN, SELECT, and SORT nodes between `node` and the next PROJECT
/// above it. Only columns of the sources at or below `node` are included.
///
/// # Arguments
///
/// * `plan` - Plan tree holding the node.
/// * `node` - Top of the subtree whose columns are needed.
pub fn find_required_columns(plan: &PlanTree, node: PlanNodeId) -> Vec<Column> {
    let project = if plan.node(node).is(NodeType::Project) {
        Some(node)
    } else {
        plan.find_ancestor(node, &[NodeType::Project])
    };

    let mut names = HashSet::new();
    for source in plan.find_all_at_or_below(node, Traversal::PreOrder, &[NodeType::Source]) {
        let source = plan.node(source);
        names.extend(source.source_name().cloned());
        names.extend(source.source_alias().cloned());
    }

    let mut required = RequiredColumns::new(names);
    if let Some(columns) = project.and_then(|p| plan.node(p).project_columns()) {
        for column in columns {
            required.require(
                &column.selector_name,
                &column.property_name,
                Some(&column.column_name),
            );
        }
    }

    let mut current = Some(node);
    while let Some(id) = current {
        let n = plan.node(id);
        match n.node_type() {
            NodeType::Join => {
                for constraint in n.join_constraints().unwrap_or_default() {
                    required.visit_constraint(constraint);
                }
                if let Some(condition) = n.join_condition() {
                    required.visit_join_condition(condition);
                }
            }
            NodeType::Select => {
                if let Some(criteria) = n.select_criteria() {
                    required.visit_constraint(criteria);
                }
            }
            NodeType::Sort => {
                for ordering in n.sort_order_by().unwrap_or_default() {
                    required.visit_operand(&ordering.operand);
                }
            }
            NodeType::Project if id != node => break,
            _ => {}
        }
        current = plan.parent(id);
    }
    required.columns
}

/// Determines the type of each column as produced by the subtree at `node`.
///
/// Types come from the first PROJECT nodes below `node` when every column is found there;
/// otherwise from the SOURCE columns of the matching selector, falling back to the context's
/// default type for columns no source declares.
pub fn find_required_column_types<S: Schemata>(
    context: &QueryContext<S>,
    plan: &PlanTree,
    columns: &[Column],
    node: PlanNodeId,
) -> Vec<String> {
    let mut node = node;
    if plan.node(node).is(NodeType::Project) {
        if let Some(child) = plan.first_child(node) {
            node = child;
        }
    }

    let projects = plan.find_all_first_nodes_at_or_below(node, NodeType::Project);
    if !projects.is_empty() {
        let types: Vec<String> = columns
            .iter()
            .filter_map(|column| {
                projects.iter().find_map(|project| {
                    let project = plan.node(*project);
                    let types = project.project_column_types()?;
                    let projected = project.project_columns()?;
                    let index = projected.iter().position(|c| c == column)?;
                    types.get(index).cloned()
                })
            })
            .collect();
        if types.len() == columns.len() {
            return types;
        }
    }

    let sources = plan.find_all_at_or_below(node, Traversal::PreOrder, &[NodeType::Source]);
    columns
        .iter()
        .map(|column| {
            sources
                .iter()
                .map(|s| plan.node(*s))
                .filter(|s| {
                    s.source_alias() == Some(&column.selector_name)
                        || s.source_name() == Some(&column.selector_name)
                })
                .find_map(|s| {
                    s.source_columns()
                        .unwrap_or_default()
                        .iter()
                        .find(|c| c.name == column.column_name || c.name == column.property_name)
                        .map(|c| c.property_type.clone())
                })
                .unwrap_or_else(|| context.default_type().to_string())
        })
        .collect()
}

// Subqueries

/// Replaces every subquery operand in the constraint with a new bind variable.
///
/// Each variable is named `__subquery<N>` with the lowest N not already bound in the context,
/// is registered in the context with no value, and is recorded in `subqueries` together with
/// the query it replaced.
pub fn replace_subqueries_with_bind_variables<'c, S: Schemata>(
    context: &mut QueryContext<S>,
    constraint: &'c Constraint,
    subqueries: &mut BTreeMap<String, QueryCommand>,
) -> Cow<'c, Constraint> {
    match constraint {
        Constraint::And(left, right) | Constraint::Or(left, right) => {
            let new_left = replace_subqueries_with_bind_variables(context, left, subqueries);
            let new_right = replace_subqueries_with_bind_variables(context, right, subqueries);
            if unchanged(&new_left) && unchanged(&new_right) {
                return Cow::Borrowed(constraint);
            }
            let (l, r) = (new_left.into_owned(), new_right.into_owned());
            match constraint {
                Constraint::And(..) => Cow::Owned(Constraint::and(l, r)),
                _ => Cow::Owned(Constraint::or(l, r)),
            }
        }
        Constraint::Not(wrapped) => {
            match replace_subqueries_with_bind_variables(context, wrapped, subqueries) {
                Cow::Borrowed(_) => Cow::Borrowed(constraint),
                Cow::Owned(c) => Cow::Owned(Constraint::not(c)),
            }
        }
        Constraint::Comparison {
            operand1,
            operator,
            operand2,
        } => match bind_subquery(context, operand2, subqueries) {
            Cow::Borrowed(_) => Cow::Borrowed(constraint),
            Cow::Owned(operand2) => Cow::Owned(Constraint::Comparison {
                operand1: operand1.clone(),
                operator: *operator,
                operand2,
            }),
        },
        Constraint::Between {
            operand,
            lower,
            upper,
            lower_included,
            upper_included,
        } => {
            let new_lower = bind_subquery(context, lower, subqueries);
            let new_upper = bind_subquery(context, upper, subqueries);
            if unchanged(&new_lower) && unchanged(&new_upper) {
                return Cow::Borrowed(constraint);
            }
            Cow::Owned(Constraint::Between {
                operand: operand.clone(),
                lower: new_lower.into_owned(),
                upper: new_upper.into_owned(),
                lower_included: *lower_included,
                upper_included: *upper_included,
            })
        }
        Constraint::SetCriteria { operand, values } => {
            let new_values: Vec<Cow<StaticOperand>> = values
                .iter()
                .map(|v| bind_subquery(context, v, subqueries))
                .collect();
            if new_values.iter().all(unchanged) {
                return Cow::Borrowed(constraint);
            }
            Cow::Owned(Constraint::SetCriteria {
                operand: operand.clone(),
                values: new_values.into_iter().map(Cow::into_owned).collect(),
            })
        }
        _ => Cow::Borrowed(constraint),
    }
}

fn bind_subquery<'o, S: Schemata>(
    context: &mut QueryContext<S>,
    operand: &'o StaticOperand,
    subqueries: &mut BTreeMap<String, QueryCommand>,
) -> Cow<'o, StaticOperand> {
    match operand {
        StaticOperand::Subquery(query) => {
            let mut i = 1;
            while context.has_variable(&format!("{}{}", SUBQUERY_VARIABLE_PREFIX, i)) {
                i += 1;
            }
            let name = format!("{}{}", SUBQUERY_VARIABLE_PREFIX, i);
            context.set_variable(&name, None);
            subqueries.insert(name.clone(), (**query).clone());
            Cow::Owned(StaticOperand::BindVariable(name))
        }
        _ => Cow::Borrowed(operand),
    }
}

// Removed sources

/// Renames selectors throughout the subtree at `node` after sources were merged away.
///
/// Rewrites PROJECT columns, SELECT criteria, SORT orderings, JOIN conditions and
/// constraints, the alias of affected SOURCE nodes, and every node's selector set.
///
/// # Arguments
///
/// * `plan` - Plan tree to rewrite in place.
/// * `node` - Top of the subtree to rewrite.
/// * `renames` - Old selector name to the name that replaces it.
pub fn replace_references_to_removed_source(
    plan: &mut PlanTree,
    node: PlanNodeId,
    renames: &HashMap<SelectorName, SelectorName>,
) {
    let mut updates = Vec::new();
    let mut renamed_source = None;
    {
        let n = plan.node(node);
        match n.node_type() {
            NodeType::Project => {
                if let Some(columns) = n.project_columns() {
                    if columns.iter().any(|c| renames.contains_key(&c.selector_name)) {
                        let columns = columns
                            .iter()
                            .map(|c| match renames.get(&c.selector_name) {
                                Some(replacement) => c.with_selector(replacement),
                                None => c.clone(),
                            })
                            .collect();
                        updates.push(NodeProperty::ProjectColumns(columns));
                    }
                }
            }
            NodeType::Select => {
                if let Some(criteria) = n.select_criteria() {
                    if let Cow::Owned(c) = replace_removed_source_in_constraint(criteria, renames) {
                        updates.push(NodeProperty::SelectCriteria(c));
                    }
                }
            }
            NodeType::Sort => {
                if let Some(orderings) = n.sort_order_by() {
                    let rewritten: Vec<Cow<DynamicOperand>> = orderings
                        .iter()
                        .map(|o| replace_removed_source_in_operand(&o.operand, renames))
                        .collect();
                    if !rewritten.iter().all(unchanged) {
                        let orderings = orderings
                            .iter()
                            .zip(rewritten)
                            .map(|(o, operand)| Ordering {
                                operand: operand.into_owned(),
                                order: o.order,
                            })
                            .collect();
                        updates.push(NodeProperty::SortOrderBy(orderings));
                    }
                }
            }
            NodeType::Join => {
                if let Some(condition) = n.join_condition() {
                    if let Cow::Owned(c) = replace_removed_source_in_join_condition(condition, renames) {
                        updates.push(NodeProperty::JoinCondition(c));
                    }
                }
                if let Some(constraints) = n.join_constraints() {
                    let rewritten: Vec<Cow<Constraint>> = constraints
                        .iter()
                        .map(|c| replace_removed_source_in_constraint(c, renames))
                        .collect();
                    if !rewritten.iter().all(unchanged) {
                        let constraints = rewritten.into_iter().map(Cow::into_owned).collect();
                        updates.push(NodeProperty::JoinConstraints(constraints));
                    }
                }
            }
            NodeType::Source => {
                let alias = n.source_alias().cloned();
                let replacement = alias
                    .as_ref()
                    .and_then(|a| renames.get(a))
                    .or_else(|| n.source_name().and_then(|s| renames.get(s)))
                    .cloned();
                if let Some(replacement) = replacement {
                    updates.push(NodeProperty::SourceAlias(replacement.clone()));
                    renamed_source = Some((alias, replacement));
                }
            }
            _ => {}
        }
    }

    let n = plan.node_mut(node);
    for update in updates {
        n.set_property(update);
    }
    if let Some((alias, replacement)) = renamed_source {
        if let Some(alias) = alias {
            n.remove_selector(&alias);
        }
        n.add_selector(replacement);
    }
    let stale: Vec<SelectorName> = n
        .selectors()
        .iter()
        .filter(|s| renames.contains_key(*s))
        .cloned()
        .collect();
    for selector in stale {
        n.remove_selector(&selector);
        if let Some(replacement) = renames.get(&selector) {
            n.add_selector(replacement.clone());
        }
    }

    for child in plan.children(node).to_vec() {
        replace_references_to_removed_source(plan, child, renames);
    }
}

/// Renames the selectors an operand refers to.
pub fn replace_removed_source_in_operand<'o>(
    operand: &'o DynamicOperand,
    renames: &HashMap<SelectorName, SelectorName>,
) -> Cow<'o, DynamicOperand> {
    match operand {
        DynamicOperand::PropertyValue { selector, property } => {
            rename(operand, selector, renames, |s| DynamicOperand::PropertyValue {
                selector: s,
                property: property.clone(),
            })
        }
        DynamicOperand::ReferenceValue { selector, property } => {
            rename(operand, selector, renames, |s| DynamicOperand::ReferenceValue {
                selector: s,
                property: property.clone(),
            })
        }
        DynamicOperand::Length { selector, property } => {
            rename(operand, selector, renames, |s| DynamicOperand::Length {
                selector: s,
                property: property.clone(),
            })
        }
        DynamicOperand::LowerCase(inner) => match replace_removed_source_in_operand(inner, renames) {
            Cow::Borrowed(_) => Cow::Borrowed(operand),
            Cow::Owned(o) => Cow::Owned(DynamicOperand::LowerCase(Box::new(o))),
        },
        DynamicOperand::UpperCase(inner) => match replace_removed_source_in_operand(inner, renames) {
            Cow::Borrowed(_) => Cow::Borrowed(operand),
            Cow::Owned(o) => Cow::Owned(DynamicOperand::UpperCase(Box::new(o))),
        },
        DynamicOperand::NodeName(s) => rename(operand, s, renames, DynamicOperand::NodeName),
        DynamicOperand::NodeLocalName(s) => rename(operand, s, renames, DynamicOperand::NodeLocalName),
        DynamicOperand::NodeDepth(s) => rename(operand, s, renames, DynamicOperand::NodeDepth),
        DynamicOperand::NodePath(s) => rename(operand, s, renames, DynamicOperand::NodePath),
        DynamicOperand::FullTextSearchScore(s) => {
            rename(operand, s, renames, DynamicOperand::FullTextSearchScore)
        }
        DynamicOperand::Arithmetic {
            left,
            operator,
            right,
        } => {
            let new_left = replace_removed_source_in_operand(left, renames);
            let new_right = replace_removed_source_in_operand(right, renames);
            if unchanged(&new_left) && unchanged(&new_right) {
                return Cow::Borrowed(operand);
            }
            Cow::Owned(DynamicOperand::arithmetic(
                new_left.into_owned(),
                *operator,
                new_right.into_owned(),
            ))
        }
    }
}

/// Renames the selectors a constraint refers to.
pub fn replace_removed_source_in_constraint<'c>(
    constraint: &'c Constraint,
    renames: &HashMap<SelectorName, SelectorName>,
) -> Cow<'c, Constraint> {
    match constraint {
        Constraint::And(left, right) | Constraint::Or(left, right) => {
            let new_left = replace_removed_source_in_constraint(left, renames);
            let new_right = replace_removed_source_in_constraint(right, renames);
            if unchanged(&new_left) && unchanged(&new_right) {
                return Cow::Borrowed(constraint);
            }
            let (l, r) = (new_left.into_owned(), new_right.into_owned());
            match constraint {
                Constraint::And(..) => Cow::Owned(Constraint::and(l, r)),
                _ => Cow::Owned(Constraint::or(l, r)),
            }
        }
        Constraint::Not(wrapped) => match replace_removed_source_in_constraint(wrapped, renames) {
            Cow::Borrowed(_) => Cow::Borrowed(constraint),
            Cow::Owned(c) => Cow::Owned(Constraint::not(c)),
        },
        Constraint::SameNode { selector, path } => {
            rename(constraint, selector, renames, |s| Constraint::SameNode {
                selector: s,
                path: path.clone(),
            })
        }
        Constraint::ChildNode {
            selector,
            parent_path,
        } => rename(constraint, selector, renames, |s| Constraint::ChildNode {
            selector: s,
            parent_path: parent_path.clone(),
        }),
        Constraint::DescendantNode {
            selector,
            ancestor_path,
        } => rename(constraint, selector, renames, |s| Constraint::DescendantNode {
            selector: s,
            ancestor_path: ancestor_path.clone(),
        }),
        Constraint::PropertyExistence { selector, property } => {
            rename(constraint, selector, renames, |s| Constraint::PropertyExistence {
                selector: s,
                property: property.clone(),
            })
        }
        Constraint::FullTextSearch {
            selector,
            property,
            expression,
        } => rename(constraint, selector, renames, |s| Constraint::FullTextSearch {
            selector: s,
            property: property.clone(),
            expression: expression.clone(),
        }),
        Constraint::Comparison {
            operand1,
            operator,
            operand2,
        } => match replace_removed_source_in_operand(operand1, renames) {
            Cow::Borrowed(_) => Cow::Borrowed(constraint),
            Cow::Owned(operand1) => Cow::Owned(Constraint::Comparison {
                operand1,
                operator: *operator,
                operand2: operand2.clone(),
            }),
        },
        Constraint::Between { operand, .. } | Constraint::SetCriteria { operand, .. } => {
            match replace_removed_source_in_operand(operand, renames) {
                Cow::Borrowed(_) => Cow::Borrowed(constraint),
                Cow::Owned(new_operand) => Cow::Owned(with_operand(constraint, new_operand)),
            }
        }
    }
}

/// Copy of a BETWEEN or IN constraint over a different operand.
fn with_operand(constraint: &Constraint, new_operand: DynamicOperand) -> Constraint {
    let mut copy = constraint.clone();
    match &mut copy {
        Constraint::Between { operand, .. } | Constraint::SetCriteria { operand, .. } => {
            *operand = new_operand
        }
        _ => {}
    }
    copy
}

/// Renames the selectors a join condition refers to.
pub fn replace_removed_source_in_join_condition<'j>(
    condition: &'j JoinCondition,
    renames: &HashMap<SelectorName, SelectorName>,
) -> Cow<'j, JoinCondition> {
    let renamed = |s: &SelectorName| renames.get(s).unwrap_or(s).clone();
    let mentioned = visitor::selectors_in_join_condition(condition);
    if !mentioned.iter().any(|s| renames.contains_key(s)) {
        return Cow::Borrowed(condition);
    }
    Cow::Owned(match condition {
        JoinCondition::Equi {
            selector1,
            property1,
            selector2,
            property2,
        } => JoinCondition::Equi {
            selector1: renamed(selector1),
            property1: property1.clone(),
            selector2: renamed(selector2),
            property2: property2.clone(),
        },
        JoinCondition::SameNode {
            selector1,
            selector2,
            selector2_path,
        } => JoinCondition::SameNode {
            selector1: renamed(selector1),
            selector2: renamed(selector2),
            selector2_path: selector2_path.clone(),
        },
        JoinCondition::ChildNode { parent, child } => JoinCondition::ChildNode {
            parent: renamed(parent),
            child: renamed(child),
        },
        JoinCondition::DescendantNode {
            ancestor,
            descendant,
        } => JoinCondition::DescendantNode {
            ancestor: renamed(ancestor),
            descendant: renamed(descendant),
        },
    })
}

// Views

/// Maps the columns of a view (or aliased table) onto the columns that produce them.
#[derive(Clone, Debug)]
pub struct ColumnMapping {
    original_name: SelectorName,
    mapped_columns: HashMap<String, Column>,
    /// Distinct selectors of the mapped columns, in the order first mapped.
    mapped_selectors: Vec<SelectorName>,
}

impl ColumnMapping {
    pub fn new(original_name: SelectorName) -> Self {
        ColumnMapping {
            original_name,
            mapped_columns: HashMap::new(),
            mapped_selectors: Vec::new(),
        }
    }

    /// Records that `original_column` is produced by `projected`.
    pub fn map(&mut self, original_column: &str, projected: Column) {
        if !self.mapped_selectors.contains(&projected.selector_name) {
            self.mapped_selectors.push(projected.selector_name.clone());
        }
        self.mapped_columns.insert(original_column.to_string(), projected);
    }

    pub fn original_name(&self) -> &SelectorName {
        &self.original_name
    }

    pub fn mapped_column(&self, original_column: &str) -> Option<&Column> {
        self.mapped_columns.get(original_column)
    }

    pub fn mapped_selectors(&self) -> &[SelectorName] {
        &self.mapped_selectors
    }

    pub fn is_mapped_to_single_selector(&self) -> bool {
        self.mapped_selectors.len() == 1
    }

    /// The only mapped selector, if there is exactly one.
    pub fn single_mapped_selector(&self) -> Option<&SelectorName> {
        if self.is_mapped_to_single_selector() {
            self.mapped_selectors.first()
        } else {
            None
        }
    }

    fn is_original(&self, selector: &SelectorName) -> bool {
        &self.original_name == selector
    }
}

/// Builds the mapping for a view whose plan has been inserted at `view_plan`.
///
/// View columns are paired by position with the columns of the first PROJECT at or below
/// `view_plan`.
///
/// # Panics
///
/// Panics if there is no PROJECT node or the column counts differ.
pub fn create_mapping_for(view: &Table, plan: &PlanTree, view_plan: PlanNodeId) -> ColumnMapping {
    create_mapping_for_aliased_view(view.name(), view, plan, view_plan)
}

/// Like [`create_mapping_for`], but for a view referenced through `alias`.
pub fn create_mapping_for_aliased_view(
    alias: &SelectorName,
    view: &Table,
    plan: &PlanTree,
    view_plan: PlanNodeId,
) -> ColumnMapping {
    let project = plan
        .find_at_or_below(view_plan, Traversal::PreOrder, &[NodeType::Project])
        .expect("view plan has no PROJECT node");
    let projected = plan.node(project).project_columns().unwrap_or_default();
    let view_columns = view.columns();
    assert_eq!(
        view_columns.len(),
        projected.len(),
        "view {} has {} columns but its plan projects {}",
        view.name(),
        view_columns.len(),
        projected.len()
    );

    let mut mapping = ColumnMapping::new(alias.clone());
    for (view_column, column) in view_columns.iter().zip(projected) {
        mapping.map(&view_column.name, column.clone());
    }
    mapping
}

/// Builds the mapping for a table referenced through `alias`, using the columns projected by
/// the nearest PROJECT above `source`. Both the column name and the projected alias become
/// keys for the same table column.
pub fn create_mapping_for_aliased_table(
    alias: &SelectorName,
    table: &Table,
    plan: &PlanTree,
    source: PlanNodeId,
) -> ColumnMapping {
    let project = plan
        .find_ancestor(source, &[NodeType::Project])
        .expect("aliased source has no PROJECT ancestor");
    let mut mapping = ColumnMapping::new(alias.clone());
    for column in plan.node(project).project_columns().unwrap_or_default() {
        let in_table = column.with_selector(table.name());
        let name = table
            .column(&in_table.property_name)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| in_table.property_name.clone());
        mapping.map(&name, in_table.clone());
        if column.column_name != name {
            mapping.map(&column.column_name, in_table);
        }
    }
    mapping
}

/// Rewrites every reference to the mapped view from `top_of_view` up to the root, then
/// extracts the view's SOURCE nodes that no remaining ancestor refers to.
///
/// # Arguments
///
/// * `plan` - Plan tree to rewrite in place.
/// * `top_of_view` - Node where the view's own plan was attached.
/// * `mapping` - How the view's columns map onto its underlying columns.
pub fn replace_view_references(plan: &mut PlanTree, top_of_view: PlanNodeId, mapping: &ColumnMapping) {
    let view_name = mapping.original_name().clone();
    let mut removable = Vec::new();
    let mut current = Some(top_of_view);
    while let Some(id) = current {
        replace_view_references_in_node(plan, id, mapping, &mut removable);
        current = plan.parent(id);
    }

    for source in removable {
        let mut still_required = false;
        let mut ancestor = plan.parent(source);
        while let Some(a) = ancestor {
            if plan.node(a).selectors().contains(&view_name) {
                still_required = true;
                break;
            }
            ancestor = plan.parent(a);
        }
        if !still_required && plan.parent(source).is_some() {
            debug!("removing unused view source {} from plan", view_name);
            plan.extract_from_parent(source);
        }
    }
}

fn replace_view_references_in_node(
    plan: &mut PlanTree,
    id: PlanNodeId,
    mapping: &ColumnMapping,
    removable: &mut Vec<PlanNodeId>,
) {
    if !plan.node_mut(id).remove_selector(mapping.original_name()) {
        return;
    }
    let mut added = BTreeSet::new();
    match plan.node_type(id) {
        NodeType::Project => {
            let mut columns = plan.node(id).project_columns().unwrap_or_default().to_vec();
            for column in columns.iter_mut() {
                if !mapping.is_original(&column.selector_name) {
                    added.insert(column.selector_name.clone());
                    continue;
                }
                let replacement = match mapping.mapped_column(&column.property_name) {
                    Some(source) => Some(Column::aliased(
                        &source.selector_name,
                        &source.property_name,
                        &column.column_name,
                    )),
                    None => mapping.single_mapped_selector().map(|single| {
                        Column::aliased(single, &column.property_name, &column.column_name)
                    }),
                };
                if let Some(replacement) = replacement {
                    *column = replacement;
                }
                added.insert(column.selector_name.clone());
            }
            plan.node_mut(id).set_property(NodeProperty::ProjectColumns(columns));
        }
        NodeType::Select => {
            let rewritten = match plan.node(id).select_criteria() {
                Some(criteria) => match replace_view_references_in_constraint(criteria, mapping, &mut added) {
                    Cow::Owned(c) => Some(c),
                    Cow::Borrowed(_) => None,
                },
                None => None,
            };
            match rewritten {
                Some(criteria) => {
                    let n = plan.node_mut(id);
                    n.clear_selectors();
                    n.add_selectors(visitor::selectors_in_constraint(&criteria));
                    n.set_property(NodeProperty::SelectCriteria(criteria));
                }
                None => {
                    // Unchanged criteria still reference their selectors.
                    let selectors = plan
                        .node(id)
                        .select_criteria()
                        .map(visitor::selectors_in_constraint)
                        .unwrap_or_default();
                    plan.node_mut(id).add_selectors(selectors);
                }
            }
        }
        NodeType::Source => removable.push(id),
        NodeType::Join => {
            let condition = plan
                .node(id)
                .join_condition()
                .map(|c| replace_view_references_in_join_condition(c, mapping, &mut added).into_owned());
            let constraints: Option<Vec<Constraint>> = plan.node(id).join_constraints().map(|cs| {
                cs.iter()
                    .map(|c| replace_view_references_in_constraint(c, mapping, &mut added).into_owned())
                    .collect()
            });
            let n = plan.node_mut(id);
            n.clear_selectors();
            if let Some(condition) = condition {
                n.add_selectors(visitor::selectors_in_join_condition(&condition));
                n.set_property(NodeProperty::JoinCondition(condition));
            }
            if let Some(constraints) = constraints.filter(|cs| !cs.is_empty()) {
                for c in &constraints {
                    n.add_selectors(visitor::selectors_in_constraint(c));
                }
                n.set_property(NodeProperty::JoinConstraints(constraints));
            }
            return;
        }
        NodeType::Access => {
            for child in plan.children(id).to_vec() {
                let selectors = plan.node(child).selectors().clone();
                plan.node_mut(id).add_selectors(selectors);
            }
        }
        NodeType::Sort => {
            let orderings: Vec<Ordering> = plan
                .node(id)
                .sort_order_by()
                .unwrap_or_default()
                .iter()
                .map(|o| Ordering {
                    operand: replace_view_references_in_operand(&o.operand, mapping, &mut added)
                        .into_owned(),
                    order: o.order,
                })
                .collect();
            let n = plan.node_mut(id);
            n.clear_selectors();
            n.add_selectors(visitor::selectors_in_orderings(&orderings));
            n.set_property(NodeProperty::SortOrderBy(orderings));
            return;
        }
        _ => {}
    }
    plan.node_mut(id).add_selectors(added);
}

/// Rewrites view references within a constraint, collecting the underlying selectors used.
pub fn replace_view_references_in_constraint<'c>(
    constraint: &'c Constraint,
    mapping: &ColumnMapping,
    added: &mut BTreeSet<SelectorName>,
) -> Cow<'c, Constraint> {
    let single = || mapping.single_mapped_selector().cloned();
    match constraint {
        Constraint::And(left, right) | Constraint::Or(left, right) => {
            let new_left = replace_view_references_in_constraint(left, mapping, added);
            let new_right = replace_view_references_in_constraint(right, mapping, added);
            if unchanged(&new_left) && unchanged(&new_right) {
                return Cow::Borrowed(constraint);
            }
            let (l, r) = (new_left.into_owned(), new_right.into_owned());
            match constraint {
                Constraint::And(..) => Cow::Owned(Constraint::and(l, r)),
                _ => Cow::Owned(Constraint::or(l, r)),
            }
        }
        Constraint::Not(wrapped) => match replace_view_references_in_constraint(wrapped, mapping, added) {
            Cow::Borrowed(_) => Cow::Borrowed(constraint),
            Cow::Owned(c) => Cow::Owned(Constraint::not(c)),
        },
        Constraint::SameNode { selector, path } if mapping.is_original(selector) => match single() {
            Some(s) => {
                added.insert(s.clone());
                Cow::Owned(Constraint::SameNode {
                    selector: s,
                    path: path.clone(),
                })
            }
            None => Cow::Borrowed(constraint),
        },
        Constraint::ChildNode {
            selector,
            parent_path,
        } if mapping.is_original(selector) => match single() {
            Some(s) => {
                added.insert(s.clone());
                Cow::Owned(Constraint::ChildNode {
                    selector: s,
                    parent_path: parent_path.clone(),
                })
            }
            None => Cow::Borrowed(constraint),
        },
        Constraint::DescendantNode {
            selector,
            ancestor_path,
        } if mapping.is_original(selector) => match single() {
            Some(s) => {
                added.insert(s.clone());
                Cow::Owned(Constraint::DescendantNode {
                    selector: s,
                    ancestor_path: ancestor_path.clone(),
                })
            }
            None => Cow::Borrowed(constraint),
        },
        Constraint::PropertyExistence { selector, property } if mapping.is_original(selector) => {
            match mapping.mapped_column(property) {
                Some(source) => {
                    added.insert(source.selector_name.clone());
                    Cow::Owned(Constraint::PropertyExistence {
                        selector: source.selector_name.clone(),
                        property: source.property_name.clone(),
                    })
                }
                None => Cow::Borrowed(constraint),
            }
        }
        Constraint::FullTextSearch {
            selector,
            property,
            expression,
        } if mapping.is_original(selector) => {
            match property.as_deref().and_then(|p| mapping.mapped_column(p)) {
                Some(source) => {
                    added.insert(source.selector_name.clone());
                    Cow::Owned(Constraint::FullTextSearch {
                        selector: source.selector_name.clone(),
                        property: Some(source.property_name.clone()),
                        expression: expression.clone(),
                    })
                }
                None => match (property, single()) {
                    (None, Some(s)) => {
                        added.insert(s.clone());
                        Cow::Owned(Constraint::FullTextSearch {
                            selector: s,
                            property: None,
                            expression: expression.clone(),
                        })
                    }
                    _ => Cow::Borrowed(constraint),
                },
            }
        }
        Constraint::Comparison {
            operand1,
            operator,
            operand2,
        } => match replace_view_references_in_operand(operand1, mapping, added) {
            Cow::Borrowed(_) => Cow::Borrowed(constraint),
            Cow::Owned(operand1) => Cow::Owned(Constraint::Comparison {
                operand1,
                operator: *operator,
                operand2: operand2.clone(),
            }),
        },
        Constraint::Between { operand, .. } | Constraint::SetCriteria { operand, .. } => {
            match replace_view_references_in_operand(operand, mapping, added) {
                Cow::Borrowed(_) => Cow::Borrowed(constraint),
                Cow::Owned(new_operand) => Cow::Owned(with_operand(constraint, new_operand)),
            }
        }
        _ => Cow::Borrowed(constraint),
    }
}

/// Rewrites view references within an operand, collecting the underlying selectors used.
///
/// A full-text score of a view whose columns come from several selectors becomes the sum of
/// the scores of those selectors.
pub fn replace_view_references_in_operand<'o>(
    operand: &'o DynamicOperand,
    mapping: &ColumnMapping,
    added: &mut BTreeSet<SelectorName>,
) -> Cow<'o, DynamicOperand> {
    match operand {
        DynamicOperand::Arithmetic {
            left,
            operator,
            right,
        } => {
            let new_left = replace_view_references_in_operand(left, mapping, added);
            let new_right = replace_view_references_in_operand(right, mapping, added);
            if unchanged(&new_left) && unchanged(&new_right) {
                return Cow::Borrowed(operand);
            }
            Cow::Owned(DynamicOperand::arithmetic(
                new_left.into_owned(),
                *operator,
                new_right.into_owned(),
            ))
        }
        DynamicOperand::FullTextSearchScore(selector) if mapping.is_original(selector) => {
            let mut scores = mapping
                .mapped_selectors()
                .iter()
                .map(|s| DynamicOperand::FullTextSearchScore(s.clone()));
            match scores.next() {
                Some(first) => Cow::Owned(scores.fold(first, |sum, score| {
                    DynamicOperand::arithmetic(sum, ArithmeticOperator::Add, score)
                })),
                None => Cow::Borrowed(operand),
            }
        }
        DynamicOperand::LowerCase(inner) => match replace_view_references_in_operand(inner, mapping, added) {
            Cow::Borrowed(_) => Cow::Borrowed(operand),
            Cow::Owned(o) => Cow::Owned(DynamicOperand::LowerCase(Box::new(o))),
        },
        DynamicOperand::UpperCase(inner) => match replace_view_references_in_operand(inner, mapping, added) {
            Cow::Borrowed(_) => Cow::Borrowed(operand),
            Cow::Owned(o) => Cow::Owned(DynamicOperand::UpperCase(Box::new(o))),
        },
        DynamicOperand::PropertyValue { selector, property }
        | DynamicOperand::Length { selector, property }
            if mapping.is_original(selector) =>
        {
            let (selector, property) = match mapping.mapped_column(property) {
                Some(source) => (source.selector_name.clone(), source.property_name.clone()),
                None => match mapping.single_mapped_selector() {
                    Some(single) => (single.clone(), property.clone()),
                    None => return Cow::Borrowed(operand),
                },
            };
            added.insert(selector.clone());
            match operand {
                DynamicOperand::Length { .. } => Cow::Owned(DynamicOperand::Length { selector, property }),
                _ => Cow::Owned(DynamicOperand::PropertyValue { selector, property }),
            }
        }
        DynamicOperand::ReferenceValue {
            selector,
            property: Some(property),
        } if mapping.is_original(selector) => match mapping.mapped_column(property) {
            Some(source) => {
                added.insert(source.selector_name.clone());
                Cow::Owned(DynamicOperand::ReferenceValue {
                    selector: source.selector_name.clone(),
                    property: Some(source.property_name.clone()),
                })
            }
            None => Cow::Borrowed(operand),
        },
        DynamicOperand::NodeName(s)
        | DynamicOperand::NodeLocalName(s)
        | DynamicOperand::NodeDepth(s)
        | DynamicOperand::NodePath(s)
            if mapping.is_original(s) =>
        {
            let single = match mapping.single_mapped_selector() {
                Some(single) => single.clone(),
                None => return Cow::Borrowed(operand),
            };
            added.insert(single.clone());
            Cow::Owned(match operand {
                DynamicOperand::NodeName(_) => DynamicOperand::NodeName(single),
                DynamicOperand::NodeLocalName(_) => DynamicOperand::NodeLocalName(single),
                DynamicOperand::NodeDepth(_) => DynamicOperand::NodeDepth(single),
                _ => DynamicOperand::NodePath(single),
            })
        }
        _ => Cow::Borrowed(operand),
    }
}

/// Rewrites view references within a join condition, collecting the underlying selectors
/// used. Conditions other than equi-joins are rewritten only when the view maps onto a
/// single selector.
pub fn replace_view_references_in_join_condition<'j>(
    condition: &'j JoinCondition,
    mapping: &ColumnMapping,
    added: &mut BTreeSet<SelectorName>,
) -> Cow<'j, JoinCondition> {
    if let JoinCondition::Equi {
        selector1,
        property1,
        selector2,
        property2,
    } = condition
    {
        let side = |selector: &SelectorName, property: &String| {
            if mapping.is_original(selector) {
                if let Some(source) = mapping.mapped_column(property) {
                    return Some((source.selector_name.clone(), source.property_name.clone()));
                }
            }
            None
        };
        let (new1, new2) = (side(selector1, property1), side(selector2, property2));
        if new1.is_none() && new2.is_none() {
            return Cow::Borrowed(condition);
        }
        let (selector1, property1) = new1.unwrap_or_else(|| (selector1.clone(), property1.clone()));
        let (selector2, property2) = new2.unwrap_or_else(|| (selector2.clone(), property2.clone()));
        added.insert(selector1.clone());
        added.insert(selector2.clone());
        return Cow::Owned(JoinCondition::Equi {
            selector1,
            property1,
            selector2,
            property2,
        });
    }

    let single = match mapping.single_mapped_selector() {
        Some(single) => single,
        None => return Cow::Borrowed(condition),
    };
    if !visitor::selectors_in_join_condition(condition)
        .iter()
        .any(|s| mapping.is_original(s))
    {
        return Cow::Borrowed(condition);
    }
    let swap = |s: &SelectorName| {
        if mapping.is_original(s) {
            single.clone()
        } else {
            s.clone()
        }
    };
    let rewritten = match condition {
        JoinCondition::SameNode {
            selector1,
            selector2,
            selector2_path,
        } => JoinCondition::SameNode {
            selector1: swap(selector1),
            selector2: swap(selector2),
            selector2_path: selector2_path.clone(),
        },
        JoinCondition::ChildNode { parent, child } => JoinCondition::ChildNode {
            parent: swap(parent),
            child: swap(child),
        },
        JoinCondition::DescendantNode {
            ancestor,
            descendant,
        } => JoinCondition::DescendantNode {
            ancestor: swap(ancestor),
            descendant: swap(descendant),
        },
        JoinCondition::Equi { .. } => return Cow::Borrowed(condition),
    };
    added.extend(visitor::selectors_in_join_condition(&rewritten));
    Cow::Owned(rewritten)
}

/// Replaces the selector set of every node in the subtree with `selectors`.
pub fn set_selectors_on_subplan(
    plan: &mut PlanTree,
    subplan: PlanNodeId,
    selectors: &BTreeSet<SelectorName>,
) {
    for id in plan.walk(subplan, Traversal::PreOrder) {
        let n = plan.node_mut(id);
        n.clear_selectors();
        n.add_selectors(selectors.iter().cloned());
    }
}
