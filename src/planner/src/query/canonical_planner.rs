use super::plan_util;
use super::{QueryContext, Validator};
use common::plan::{NodeProperty, NodeType, PlanNodeId, PlanTree};
use common::query::visitor;
use common::query::{
    Column, Constraint, JoinAlgorithm, JoinType, Limit, Ordering, Query, QueryCommand,
    SelectorName, SetQuery, Source, StaticOperand,
};
use common::schemata::{Schemata, Table};
use std::collections::BTreeMap;

/// Selectors bound by a query's source, in the order they were bound.
type UsedSelectors<'a> = Vec<(SelectorName, &'a Table)>;

/// Builds the canonical plan of a query command.
///
/// A simple query becomes, from the bottom up: its SOURCE or JOIN nodes, one SELECT per
/// top-level conjunct, a PROJECT, then optional DUP_REMOVE, SORT, and LIMIT nodes, and finally
/// one DEPENDENT_QUERY per subquery. A set query becomes a SET_OPERATION over the plans of its
/// two operands, with optional SORT and LIMIT nodes on top.
///
/// Names that do not resolve are recorded as problems on the context; a plan is produced
/// regardless.
#[derive(Clone, Copy, Debug, Default)]
pub struct CanonicalPlanner {}

impl CanonicalPlanner {
    pub fn new() -> Self {
        CanonicalPlanner {}
    }

    /// Creates the canonical plan for a command.
    ///
    /// # Arguments
    ///
    /// * `context` - Schemata, hints, problems, and variables for this planning pass.
    /// * `command` - Query or set query to plan.
    pub fn create_plan<S: Schemata>(&self, context: &mut QueryContext<S>, command: &QueryCommand) -> PlanTree {
        let mut plan = PlanTree::new();
        let root = self.plan_command(context, &mut plan, command);
        plan.set_root(root);
        debug!("canonical plan:\n{}", plan);
        plan
    }

    fn plan_command<'a, S: Schemata>(
        &self,
        context: &mut QueryContext<'a, S>,
        plan: &mut PlanTree,
        command: &QueryCommand,
    ) -> PlanNodeId {
        match command {
            QueryCommand::Query(query) => self.plan_query(context, plan, query),
            QueryCommand::SetQuery(query) => self.plan_set_query(context, plan, query),
        }
    }

    fn plan_query<'a, S: Schemata>(
        &self,
        context: &mut QueryContext<'a, S>,
        plan: &mut PlanTree,
        query: &Query,
    ) -> PlanNodeId {
        let mut used = UsedSelectors::new();
        let mut top = self.create_plan_node(context, plan, &query.source, &mut used);

        let mut subqueries = BTreeMap::new();
        if let Some(constraint) = &query.constraint {
            top = self.attach_criteria(context, plan, top, constraint, &mut subqueries);
        }
        top = self.attach_project(context, plan, top, &query.columns, &used);
        if query.distinct {
            top = self.attach_duplicate_removal(plan, top);
        }
        top = self.attach_sorting(context, plan, top, &query.orderings);
        top = self.attach_limits(context, plan, top, query.limit);
        top = self.attach_subqueries(context, plan, top, &subqueries);

        Validator::new(&used).validate(context, query);

        // Each subquery is planned on its own so that it is validated too.
        for subquery in subqueries_of(query) {
            let mut scratch = PlanTree::new();
            self.plan_command(context, &mut scratch, subquery);
        }
        top
    }

    fn plan_set_query<'a, S: Schemata>(
        &self,
        context: &mut QueryContext<'a, S>,
        plan: &mut PlanTree,
        query: &SetQuery,
    ) -> PlanNodeId {
        let left = self.plan_command(context, plan, &query.left);
        let right = self.plan_command(context, plan, &query.right);

        let node = plan.add_node(NodeType::SetOperation);
        plan.add_children(node, &[left, right]);
        let n = plan.node_mut(node);
        n.set_property(NodeProperty::SetOperation(query.operation));
        n.set_property(NodeProperty::SetUseAll(query.all));
        context.hints_mut().has_set_queries = true;

        let top = self.attach_sorting(context, plan, node, &query.orderings);
        self.attach_limits(context, plan, top, query.limit)
    }

    fn create_plan_node<'a, S: Schemata>(
        &self,
        context: &mut QueryContext<'a, S>,
        plan: &mut PlanTree,
        source: &Source,
        used: &mut UsedSelectors<'a>,
    ) -> PlanNodeId {
        match source {
            Source::Selector(selector) => {
                let node = plan.add_node(NodeType::Source);
                let n = plan.node_mut(node);
                n.add_selector(selector.alias_or_name().clone());
                if let Some(alias) = &selector.alias {
                    n.set_property(NodeProperty::SourceAlias(alias.clone()));
                }
                n.set_property(NodeProperty::SourceName(selector.name.clone()));

                match context.schemata().table(&selector.name) {
                    Some(table) => {
                        if table.is_view() {
                            context.hints_mut().has_view = true;
                        }
                        let key = selector.alias_or_name();
                        match used.iter_mut().find(|(name, _)| name == key) {
                            Some(entry) => {
                                context
                                    .problems_mut()
                                    .add_error(format!("Selector '{}' is used more than once", key));
                                // The later table replaces the earlier one.
                                entry.1 = table;
                            }
                            None => used.push((key.clone(), table)),
                        }
                        plan.node_mut(node)
                            .set_property(NodeProperty::SourceColumns(table.columns().to_vec()));
                    }
                    None => {
                        context
                            .problems_mut()
                            .add_error(format!("Table '{}' does not exist", selector.name));
                    }
                }
                node
            }
            Source::Join(join) => {
                let node = plan.add_node(NodeType::Join);
                let n = plan.node_mut(node);
                n.set_property(NodeProperty::JoinType(join.join_type));
                n.set_property(NodeProperty::JoinAlgorithm(JoinAlgorithm::NestedLoop));
                n.set_property(NodeProperty::JoinCondition(join.condition.clone()));

                let hints = context.hints_mut();
                hints.has_join = true;
                if join.join_type == JoinType::LeftOuter {
                    hints.has_optional_join = true;
                }

                for side in &[&join.left, &join.right] {
                    let child = self.create_plan_node(context, plan, side, used);
                    plan.add_last_child(node, child);
                    let selectors = plan.node(child).selectors().clone();
                    plan.node_mut(node).add_selectors(selectors);
                }
                node
            }
        }
    }

    /// Wraps the plan in one SELECT per top-level conjunct, the first conjunct outermost.
    fn attach_criteria<'a, S: Schemata>(
        &self,
        context: &mut QueryContext<'a, S>,
        plan: &mut PlanTree,
        top: PlanNodeId,
        constraint: &Constraint,
        subqueries: &mut BTreeMap<String, QueryCommand>,
    ) -> PlanNodeId {
        context.hints_mut().has_criteria = true;
        let mut top = top;
        for criteria in visitor::separate_and_constraints(constraint).iter().rev() {
            let criteria =
                plan_util::replace_subqueries_with_bind_variables(context, criteria, subqueries)
                    .into_owned();
            if visitor::contains_full_text_search(&criteria) {
                context.hints_mut().has_full_text_search = true;
            }

            let select = plan.add_node(NodeType::Select);
            let n = plan.node_mut(select);
            n.add_selectors(visitor::selectors_in_constraint(&criteria));
            n.set_property(NodeProperty::SelectCriteria(criteria));
            plan.add_first_child(select, top);
            top = select;
        }
        if !subqueries.is_empty() {
            context.hints_mut().has_subqueries = true;
        }
        top
    }

    fn attach_project<'a, S: Schemata>(
        &self,
        context: &mut QueryContext<'a, S>,
        plan: &mut PlanTree,
        top: PlanNodeId,
        columns: &[Column],
        used: &UsedSelectors<'a>,
    ) -> PlanNodeId {
        let project = plan.add_node(NodeType::Project);
        let mut new_columns = Vec::new();
        let mut new_types = Vec::new();

        if columns.is_empty() {
            for (name, table) in used {
                plan.node_mut(project).add_selector(name.clone());
                all_columns_for(table, name, &mut new_columns, &mut new_types);
            }
        } else {
            for column in columns {
                let name = &column.selector_name;
                plan.node_mut(project).add_selector(name.clone());

                let table = match used.iter().find(|(n, _)| n == name) {
                    Some((_, table)) => *table,
                    None => {
                        context
                            .problems_mut()
                            .add_error(format!("Table '{}' does not exist", name));
                        continue;
                    }
                };
                if column.is_wildcard() {
                    all_columns_for(table, name, &mut new_columns, &mut new_types);
                    continue;
                }
                let schema_column = table.column(&column.property_name);
                if !new_columns.contains(column) {
                    new_columns.push(column.clone());
                    new_types.push(match schema_column {
                        Some(c) => c.property_type.clone(),
                        None => context.default_type().to_string(),
                    });
                }
                let strict = !context.hints().allow_unknown_columns && !table.has_extra_columns();
                if strict && schema_column.is_none() {
                    context.problems_mut().add_error(format!(
                        "Column '{}' does not exist on table '{}'",
                        column.property_name, name
                    ));
                }
            }
        }

        let n = plan.node_mut(project);
        n.set_property(NodeProperty::ProjectColumns(new_columns));
        n.set_property(NodeProperty::ProjectColumnTypes(new_types));
        plan.add_last_child(project, top);
        project
    }

    fn attach_duplicate_removal(&self, plan: &mut PlanTree, top: PlanNodeId) -> PlanNodeId {
        let node = plan.add_node(NodeType::DupRemove);
        plan.add_last_child(node, top);
        node
    }

    fn attach_sorting<'a, S: Schemata>(
        &self,
        context: &mut QueryContext<'a, S>,
        plan: &mut PlanTree,
        top: PlanNodeId,
        orderings: &[Ordering],
    ) -> PlanNodeId {
        if orderings.is_empty() {
            return top;
        }
        context.hints_mut().has_sort = true;
        let sort = plan.add_node(NodeType::Sort);
        let n = plan.node_mut(sort);
        n.add_selectors(visitor::selectors_in_orderings(orderings));
        n.set_property(NodeProperty::SortOrderBy(orderings.to_vec()));
        plan.add_last_child(sort, top);
        sort
    }

    /// Adds a LIMIT node carrying whichever of the offset and row count is constrained.
    fn attach_limits<'a, S: Schemata>(
        &self,
        context: &mut QueryContext<'a, S>,
        plan: &mut PlanTree,
        top: PlanNodeId,
        limit: Limit,
    ) -> PlanNodeId {
        if limit.is_unlimited() && !limit.is_offset() {
            return top;
        }
        context.hints_mut().has_limit = true;
        let node = plan.add_node(NodeType::Limit);
        let n = plan.node_mut(node);
        if limit.is_offset() {
            n.set_property(NodeProperty::LimitOffset(limit.offset));
        }
        if !limit.is_unlimited() {
            n.set_property(NodeProperty::LimitCount(limit.row_limit));
        }
        plan.add_last_child(node, top);
        node
    }

    /// Puts each subquery's plan in front of the plan under a DEPENDENT_QUERY node.
    ///
    /// Variables are attached in descending name order, so the first subquery ends up on top.
    fn attach_subqueries<'a, S: Schemata>(
        &self,
        context: &mut QueryContext<'a, S>,
        plan: &mut PlanTree,
        top: PlanNodeId,
        subqueries: &BTreeMap<String, QueryCommand>,
    ) -> PlanNodeId {
        let mut top = top;
        for (name, subquery) in subqueries.iter().rev() {
            let subplan = self.plan_command(context, plan, subquery);
            set_subquery_variable_name(plan, subplan, name);

            let dependent = plan.add_node(NodeType::DependentQuery);
            plan.add_children(dependent, &[subplan, top]);
            let mut selectors = plan.node(subplan).selectors().clone();
            selectors.extend(plan.node(top).selectors().iter().cloned());
            plan.node_mut(dependent).add_selectors(selectors);
            top = dependent;
        }
        top
    }
}

/// Appends every select-star column of the table, skipping ones already present.
fn all_columns_for(table: &Table, selector: &SelectorName, columns: &mut Vec<Column>, types: &mut Vec<String>) {
    for schema_column in table.select_star_columns() {
        let column = Column::new(selector, &schema_column.name);
        if !columns.contains(&column) {
            columns.push(column);
            types.push(schema_column.property_type.clone());
        }
    }
}

/// Sets the variable on the subplan, or on the plan that runs last when the subplan is itself
/// a dependent query.
fn set_subquery_variable_name(plan: &mut PlanTree, subplan: PlanNodeId, name: &str) {
    let mut node = subplan;
    while plan.node(node).is(NodeType::DependentQuery) {
        match plan.last_child(node) {
            Some(last) => node = last,
            None => break,
        }
    }
    plan.node_mut(node)
        .set_property(NodeProperty::VariableName(name.to_string()));
}

/// Subqueries used directly by the query's criteria, without those nested inside them.
fn subqueries_of(query: &Query) -> Vec<&QueryCommand> {
    let mut subqueries = Vec::new();
    if let Some(constraint) = &query.constraint {
        visitor::for_each_static_operand(constraint, &mut |operand| {
            if let StaticOperand::Subquery(subquery) = operand {
                subqueries.push(subquery.as_ref());
            }
        });
    }
    subqueries
}

#[cfg(test)]
mod test {
    use super::*;
    use common::plan::Traversal;
    use common::query::{DynamicOperand, Operator, Selector};
    use common::schemata::ImmutableSchemata;
    use common::testutil;
    use common::Value;
    use std::collections::BTreeSet;

    fn sel(name: &str) -> SelectorName {
        SelectorName::new(name)
    }

    fn selectors(names: &[&str]) -> BTreeSet<SelectorName> {
        names.iter().map(|n| sel(n)).collect()
    }

    fn some_table() -> ImmutableSchemata {
        let mut builder = ImmutableSchemata::builder();
        builder
            .add_table("someTable", &["column1", "column2", "column3"])
            .add_table("otherTable", &["columnA", "columnB"])
            .add_table("stillOther", &["columnX", "columnY"]);
        builder.build()
    }

    fn path_equals(selector: &str) -> Constraint {
        Constraint::comparison(
            DynamicOperand::NodePath(sel(selector)),
            Operator::EqualTo,
            StaticOperand::Literal(Value::Long(1)),
        )
    }

    fn columns(selector: &str, names: &[&str]) -> Vec<Column> {
        names.iter().map(|n| Column::new(&sel(selector), n)).collect()
    }

    fn column_names(plan: &PlanTree, node: PlanNodeId) -> Vec<String> {
        plan.node(node)
            .project_columns()
            .unwrap_or_default()
            .iter()
            .map(|c| c.column_name.clone())
            .collect()
    }

    fn source_column_names(plan: &PlanTree, node: PlanNodeId) -> Vec<String> {
        plan.node(node)
            .source_columns()
            .unwrap_or_default()
            .iter()
            .map(|c| c.name.clone())
            .collect()
    }

    fn create(schemata: &ImmutableSchemata, command: QueryCommand) -> (PlanTree, bool) {
        testutil::init();
        let mut ctx = QueryContext::new(schemata);
        let plan = CanonicalPlanner::new().create_plan(&mut ctx, &command);
        (plan, ctx.problems().has_errors())
    }

    #[test]
    fn test_select_star_from_all_nodes() {
        let mut builder = ImmutableSchemata::builder();
        builder.add_table("__ALLNODES__", &["column1", "column2", "column3"]);
        let schemata = builder.build();
        let mut ctx = QueryContext::new(&schemata);
        let query = Query::select_star(Selector::all_nodes().into());
        let plan = CanonicalPlanner::new().create_plan(&mut ctx, &query.into());

        assert!(ctx.problems().is_empty());
        let root = plan.root().unwrap();
        assert_eq!(NodeType::Project, plan.node_type(root));
        assert_eq!(vec!["column1", "column2", "column3"], column_names(&plan, root));
        assert_eq!(1, plan.child_count(root));
        let source = plan.first_child(root).unwrap();
        assert_eq!(NodeType::Source, plan.node_type(source));
        assert_eq!(Some(&sel("__ALLNODES__")), plan.node(source).source_name());
        assert!(plan.node(source).source_alias().is_none());
        assert_eq!(vec!["column1", "column2", "column3"], source_column_names(&plan, source));
        assert_eq!(0, plan.child_count(source));
    }

    #[test]
    fn test_missing_table_is_an_error() {
        let mut builder = ImmutableSchemata::builder();
        builder.add_table("someTable", &["column1"]);
        let schemata = builder.build();
        let (plan, has_errors) = create(&schemata, Query::select_star(Selector::all_nodes().into()).into());
        assert!(has_errors);
        // A plan is still produced.
        assert_eq!(NodeType::Project, plan.node_type(plan.root().unwrap()));
    }

    #[test]
    fn test_missing_column_is_an_error() {
        let schemata = some_table();
        let query = Query::select_star(Selector::named("someTable").into())
            .with_columns(columns("someTable", &["column1", "column4"]));
        let (_, has_errors) = create(&schemata, query.into());
        assert!(has_errors);
    }

    #[test]
    fn test_missing_column_allowed_by_hint() {
        let schemata = some_table();
        let query = Query::select_star(Selector::named("someTable").into())
            .with_columns(columns("someTable", &["column1", "column4"]));
        let mut ctx = QueryContext::new(&schemata);
        ctx.hints_mut().allow_unknown_columns = true;
        let plan = CanonicalPlanner::new().create_plan(&mut ctx, &query.into());
        assert!(ctx.problems().is_empty());
        let root = plan.root().unwrap();
        assert_eq!(
            Some(&["STRING".to_string(), "STRING".to_string()][..]),
            plan.node(root).project_column_types()
        );
    }

    #[test]
    fn test_select_star_from_table() {
        let schemata = some_table();
        let mut ctx = QueryContext::new(&schemata);
        let query = Query::select_star(Selector::named("someTable").into());
        let plan = CanonicalPlanner::new().create_plan(&mut ctx, &query.into());
        assert!(ctx.problems().is_empty());
        let root = plan.root().unwrap();
        assert_eq!(vec!["column1", "column2", "column3"], column_names(&plan, root));
        let source = plan.first_child(root).unwrap();
        assert_eq!(Some(&sel("someTable")), plan.node(source).source_name());
        assert_eq!(
            "Project [someTable] <PROJECT_COLUMNS=[someTable.column1, someTable.column2, someTable.column3], \
             PROJECT_COLUMN_TYPES=[STRING, STRING, STRING]>",
            plan.node(root).describe()
        );
    }

    #[test]
    fn test_columns_from_table_with_and_without_alias() {
        let schemata = some_table();
        let query = Query::select_star(Selector::named("someTable").into())
            .with_columns(columns("someTable", &["column1", "column2"]))
            .with_constraint(path_equals("someTable"));
        let (plan, has_errors) = create(&schemata, query.into());
        assert!(!has_errors);
        let root = plan.root().unwrap();
        assert_eq!(NodeType::Project, plan.node_type(root));
        assert_eq!(&selectors(&["someTable"]), plan.node(root).selectors());

        let query = Query::select_star(Selector::aliased("someTable", "t1").into())
            .with_columns(columns("t1", &["column1", "column2"]))
            .with_constraint(path_equals("t1"));
        let (plan, has_errors) = create(&schemata, query.into());
        assert!(!has_errors);
        let root = plan.root().unwrap();
        assert_eq!(&selectors(&["t1"]), plan.node(root).selectors());
        let source = plan
            .find_at_or_below(root, Traversal::PreOrder, &[NodeType::Source])
            .unwrap();
        assert_eq!(Some(&sel("someTable")), plan.node(source).source_name());
        assert_eq!(Some(&sel("t1")), plan.node(source).source_alias());
    }

    #[test]
    fn test_all_columns_from_table_with_alias() {
        let schemata = some_table();
        let query = Query::select_star(Selector::aliased("someTable", "t1").into()).with_constraint(path_equals("t1"));
        let (plan, has_errors) = create(&schemata, query.into());
        assert!(!has_errors);
        let root = plan.root().unwrap();
        assert_eq!(NodeType::Project, plan.node_type(root));
        assert_eq!(&selectors(&["t1"]), plan.node(root).selectors());
    }

    #[test]
    fn test_full_text_search_needs_searchable_columns() {
        let schemata = some_table();
        let search = |property: Option<&str>| Constraint::FullTextSearch {
            selector: sel("someTable"),
            property: property.map(String::from),
            expression: "term1".to_string(),
        };
        let base = Query::select_star(Selector::named("someTable").into())
            .with_columns(columns("someTable", &["column1", "column2"]));
        let (_, has_errors) = create(&schemata, base.clone().into());
        assert!(!has_errors);
        let (_, has_errors) = create(&schemata, base.clone().with_constraint(search(None)).into());
        assert!(has_errors);
        let (_, has_errors) = create(&schemata, base.with_constraint(search(Some("column2"))).into());
        assert!(has_errors);

        let mut builder = ImmutableSchemata::builder();
        builder
            .add_table("someTable", &["column1", "column2", "column3"])
            .make_searchable("someTable", "column1");
        let searchable = builder.build();
        let query = Query::select_star(Selector::named("someTable").into())
            .with_columns(columns("someTable", &["column1", "column2"]))
            .with_constraint(search(Some("column1")));
        let mut ctx = QueryContext::new(&searchable);
        CanonicalPlanner::new().create_plan(&mut ctx, &query.into());
        assert!(ctx.problems().is_empty());
        assert!(ctx.hints().has_full_text_search);
    }

    #[test]
    fn test_order_by_puts_sort_on_top() {
        let schemata = some_table();
        for operand in vec![
            DynamicOperand::property_value("t1", "column1"),
            DynamicOperand::FullTextSearchScore(sel("t1")),
        ] {
            let query = Query::select_star(Selector::aliased("someTable", "t1").into())
                .with_constraint(path_equals("t1"))
                .with_orderings(vec![Ordering::ascending(operand)]);
            let (plan, has_errors) = create(&schemata, query.into());
            assert!(!has_errors);
            let root = plan.root().unwrap();
            assert_eq!(NodeType::Sort, plan.node_type(root));
            assert_eq!(&selectors(&["t1"]), plan.node(root).selectors());
        }
    }

    #[test]
    fn test_each_conjunct_gets_a_select_first_outermost() {
        let schemata = some_table();
        let conjuncts: Vec<Constraint> = ["column1", "column2", "column3"]
            .iter()
            .map(|c| Constraint::PropertyExistence {
                selector: sel("someTable"),
                property: c.to_string(),
            })
            .collect();
        let constraint = Constraint::and(
            conjuncts[0].clone(),
            Constraint::and(conjuncts[1].clone(), conjuncts[2].clone()),
        );
        let query = Query::select_star(Selector::named("someTable").into()).with_constraint(constraint);
        let mut ctx = QueryContext::new(&schemata);
        let plan = CanonicalPlanner::new().create_plan(&mut ctx, &query.into());
        assert!(ctx.hints().has_criteria);

        let mut node = plan.first_child(plan.root().unwrap()).unwrap();
        for expected in &conjuncts {
            assert_eq!(NodeType::Select, plan.node_type(node));
            assert_eq!(Some(expected), plan.node(node).select_criteria());
            node = plan.first_child(node).unwrap();
        }
        assert_eq!(NodeType::Source, plan.node_type(node));
    }

    #[test]
    fn test_distinct_and_limits() {
        let schemata = some_table();
        let query = Query::select_star(Selector::named("someTable").into())
            .distinct()
            .with_limit(Limit::rows(10).with_offset(5));
        let mut ctx = QueryContext::new(&schemata);
        let plan = CanonicalPlanner::new().create_plan(&mut ctx, &query.into());
        let root = plan.root().unwrap();
        assert_eq!(NodeType::Limit, plan.node_type(root));
        assert_eq!(Some(10), plan.node(root).limit_count());
        assert_eq!(Some(5), plan.node(root).limit_offset());
        let dup = plan.first_child(root).unwrap();
        assert_eq!(NodeType::DupRemove, plan.node_type(dup));
        assert!(ctx.hints().has_limit);

        let offset_only = Query::select_star(Selector::named("someTable").into()).with_limit(Limit::NONE.with_offset(3));
        let plan = CanonicalPlanner::new().create_plan(&mut QueryContext::new(&schemata), &offset_only.into());
        let root = plan.root().unwrap();
        assert_eq!(NodeType::Limit, plan.node_type(root));
        assert_eq!(Some(3), plan.node(root).limit_offset());
        assert_eq!(None, plan.node(root).limit_count());
    }

    #[test]
    fn test_join_plan() {
        let schemata = some_table();
        let source = Source::join(
            Selector::aliased("someTable", "s").into(),
            JoinType::LeftOuter,
            Selector::aliased("otherTable", "o").into(),
            common::query::JoinCondition::equi("s", "column1", "o", "columnA"),
        );
        let query = Query::select_star(source);
        let mut ctx = QueryContext::new(&schemata);
        let plan = CanonicalPlanner::new().create_plan(&mut ctx, &query.into());
        assert!(ctx.problems().is_empty());
        assert!(ctx.hints().has_join);
        assert!(ctx.hints().has_optional_join);

        let root = plan.root().unwrap();
        assert_eq!(vec!["column1", "column2", "column3", "columnA", "columnB"], column_names(&plan, root));
        let join = plan.first_child(root).unwrap();
        assert_eq!(NodeType::Join, plan.node_type(join));
        assert_eq!(Some(JoinType::LeftOuter), plan.node(join).join_type());
        assert_eq!(&selectors(&["o", "s"]), plan.node(join).selectors());
        let left = plan.first_child(join).unwrap();
        assert_eq!(Some(&sel("s")), plan.node(left).source_alias());
    }

    #[test]
    fn test_duplicate_selector_uses_later_table() {
        let schemata = some_table();
        let source = Source::join(
            Selector::aliased("someTable", "s").into(),
            JoinType::Inner,
            Selector::aliased("otherTable", "s").into(),
            common::query::JoinCondition::equi("s", "column1", "s", "columnA"),
        );
        let mut ctx = QueryContext::new(&schemata);
        let plan = CanonicalPlanner::new().create_plan(&mut ctx, &Query::select_star(source).into());
        assert!(ctx.problems().has_errors());
        assert_eq!(vec!["columnA", "columnB"], column_names(&plan, plan.root().unwrap()));
    }

    #[test]
    fn test_set_query() {
        let schemata = some_table();
        let left = Query::select_star(Selector::named("someTable").into());
        let right = Query::select_star(Selector::named("otherTable").into());
        let command = SetQuery::new(left.into(), common::query::SetOperation::Union, right.into(), true);
        let mut ctx = QueryContext::new(&schemata);
        let plan = CanonicalPlanner::new().create_plan(&mut ctx, &command.into());
        let root = plan.root().unwrap();
        assert_eq!(NodeType::SetOperation, plan.node_type(root));
        assert_eq!(2, plan.child_count(root));
        assert!(plan.node(root).has_boolean_property(common::plan::Property::SetUseAll));
        assert!(ctx.hints().has_set_queries);
    }

    #[test]
    fn test_subquery() {
        let schemata = some_table();
        let subquery = Query::select_star(Selector::named("otherTable").into()).with_columns(columns("otherTable", &["columnA"]));
        let query = Query::select_star(Selector::named("someTable").into()).with_constraint(Constraint::comparison(
            DynamicOperand::NodePath(sel("someTable")),
            Operator::Like,
            StaticOperand::Subquery(Box::new(subquery.into())),
        ));
        let mut ctx = QueryContext::new(&schemata);
        let plan = CanonicalPlanner::new().create_plan(&mut ctx, &query.into());
        assert!(ctx.problems().is_empty());
        assert!(ctx.hints().has_subqueries);

        let root = plan.root().unwrap();
        assert_eq!(NodeType::DependentQuery, plan.node_type(root));
        assert_eq!(2, plan.child_count(root));

        let sub = plan.first_child(root).unwrap();
        assert_eq!(vec!["columnA"], column_names(&plan, sub));
        assert_eq!(Some("__subquery1"), plan.node(sub).variable_name());
        assert_eq!(&selectors(&["otherTable"]), plan.node(sub).selectors());
        let sub_source = plan.first_child(sub).unwrap();
        assert_eq!(vec!["columnA", "columnB"], source_column_names(&plan, sub_source));

        let main = plan.last_child(root).unwrap();
        assert_eq!(vec!["column1", "column2", "column3"], column_names(&plan, main));
        assert_eq!(&selectors(&["someTable"]), plan.node(main).selectors());
        let criteria = plan.first_child(main).unwrap();
        assert_eq!(NodeType::Select, plan.node_type(criteria));
        assert_eq!(
            Some(&Constraint::comparison(
                DynamicOperand::NodePath(sel("someTable")),
                Operator::Like,
                StaticOperand::BindVariable("__subquery1".to_string()),
            )),
            plan.node(criteria).select_criteria()
        );
        let source = plan.first_child(criteria).unwrap();
        assert_eq!(NodeType::Source, plan.node_type(source));
        assert_eq!(0, plan.child_count(source));
    }

    #[test]
    fn test_subquery_in_subquery() {
        let schemata = some_table();
        let inner = Query::select_star(Selector::named("stillOther").into())
            .with_columns(columns("stillOther", &["columnY"]))
            .with_constraint(Constraint::comparison(
                DynamicOperand::property_value("stillOther", "columnX"),
                Operator::LessThan,
                StaticOperand::Literal(Value::Long(3)),
            ));
        let outer = Query::select_star(Selector::named("otherTable").into())
            .with_columns(columns("otherTable", &["columnA"]))
            .with_constraint(Constraint::comparison(
                DynamicOperand::property_value("otherTable", "columnB"),
                Operator::EqualTo,
                StaticOperand::Subquery(Box::new(inner.into())),
            ));
        let query = Query::select_star(Selector::named("someTable").into()).with_constraint(Constraint::comparison(
            DynamicOperand::NodePath(sel("someTable")),
            Operator::Like,
            StaticOperand::Subquery(Box::new(outer.into())),
        ));
        let mut ctx = QueryContext::new(&schemata);
        let plan = CanonicalPlanner::new().create_plan(&mut ctx, &query.into());
        assert!(ctx.problems().is_empty());

        let root = plan.root().unwrap();
        assert_eq!(NodeType::DependentQuery, plan.node_type(root));
        let dep = plan.first_child(root).unwrap();
        assert_eq!(NodeType::DependentQuery, plan.node_type(dep));
        assert_eq!(2, plan.child_count(dep));

        let inner_plan = plan.first_child(dep).unwrap();
        assert_eq!(vec!["columnY"], column_names(&plan, inner_plan));
        assert_eq!(Some("__subquery2"), plan.node(inner_plan).variable_name());
        let outer_plan = plan.last_child(dep).unwrap();
        assert_eq!(vec!["columnA"], column_names(&plan, outer_plan));
        assert_eq!(Some("__subquery1"), plan.node(outer_plan).variable_name());
        assert_eq!(None, plan.node(dep).variable_name());
    }
}
