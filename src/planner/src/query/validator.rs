use super::QueryContext;
use common::query::{
    Constraint, DynamicOperand, JoinCondition, Ordering, Query, SelectorName, Source,
};
use common::schemata::{Schemata, Table};

/// Checks that every name a query refers to resolves against the tables the query selects.
///
/// Problems are recorded on the context rather than returned. Subquery bodies are not
/// visited; each subquery is validated when it is planned.
pub struct Validator<'v, 'a> {
    used_selectors: &'v [(SelectorName, &'a Table)],
}

impl<'v, 'a> Validator<'v, 'a> {
    /// Creates a new validator.
    ///
    /// # Arguments
    ///
    /// * `used_selectors` - Alias or name of each selector in the query with its table.
    pub fn new(used_selectors: &'v [(SelectorName, &'a Table)]) -> Self {
        Validator { used_selectors }
    }

    fn table(&self, selector: &SelectorName) -> Option<&'a Table> {
        self.used_selectors
            .iter()
            .find(|(name, _)| name == selector)
            .map(|(_, table)| *table)
    }

    /// Validates the source, criteria, and orderings of the query.
    pub fn validate<S: Schemata>(&self, context: &mut QueryContext<S>, query: &Query) {
        self.validate_source(context, &query.source);
        if let Some(constraint) = &query.constraint {
            self.validate_constraint(context, constraint);
        }
        self.validate_orderings(context, &query.orderings);
    }

    pub fn validate_orderings<S: Schemata>(&self, context: &mut QueryContext<S>, orderings: &[Ordering]) {
        for ordering in orderings {
            self.validate_operand(context, &ordering.operand);
        }
    }

    fn validate_source<S: Schemata>(&self, context: &mut QueryContext<S>, source: &Source) {
        if let Source::Join(join) = source {
            self.validate_source(context, &join.left);
            self.validate_source(context, &join.right);
            self.validate_join_condition(context, &join.condition);
        }
    }

    fn validate_join_condition<S: Schemata>(&self, context: &mut QueryContext<S>, condition: &JoinCondition) {
        match condition {
            JoinCondition::Equi {
                selector1,
                property1,
                selector2,
                property2,
            } => {
                self.validate_column(context, selector1, property1);
                self.validate_column(context, selector2, property2);
            }
            JoinCondition::SameNode {
                selector1,
                selector2,
                ..
            } => {
                self.validate_selector(context, selector1);
                self.validate_selector(context, selector2);
            }
            JoinCondition::ChildNode { parent, child } => {
                self.validate_selector(context, parent);
                self.validate_selector(context, child);
            }
            JoinCondition::DescendantNode {
                ancestor,
                descendant,
            } => {
                self.validate_selector(context, ancestor);
                self.validate_selector(context, descendant);
            }
        }
    }

    fn validate_constraint<S: Schemata>(&self, context: &mut QueryContext<S>, constraint: &Constraint) {
        match constraint {
            Constraint::And(left, right) | Constraint::Or(left, right) => {
                self.validate_constraint(context, left);
                self.validate_constraint(context, right);
            }
            Constraint::Not(c) => self.validate_constraint(context, c),
            Constraint::Comparison { operand1, .. } => self.validate_operand(context, operand1),
            Constraint::Between { operand, .. } | Constraint::SetCriteria { operand, .. } => {
                self.validate_operand(context, operand)
            }
            Constraint::PropertyExistence { selector, property } => {
                self.validate_column(context, selector, property)
            }
            Constraint::FullTextSearch {
                selector, property, ..
            } => self.validate_full_text_search(context, selector, property.as_deref()),
            Constraint::SameNode { selector, .. }
            | Constraint::ChildNode { selector, .. }
            | Constraint::DescendantNode { selector, .. } => {
                self.validate_selector(context, selector);
            }
        }
    }

    fn validate_operand<S: Schemata>(&self, context: &mut QueryContext<S>, operand: &DynamicOperand) {
        match operand {
            DynamicOperand::PropertyValue { selector, property }
            | DynamicOperand::Length { selector, property } => {
                self.validate_column(context, selector, property)
            }
            DynamicOperand::ReferenceValue { selector, property } => match property {
                Some(property) => self.validate_column(context, selector, property),
                None => {
                    self.validate_selector(context, selector);
                }
            },
            DynamicOperand::NodeName(selector)
            | DynamicOperand::NodeLocalName(selector)
            | DynamicOperand::NodeDepth(selector)
            | DynamicOperand::NodePath(selector)
            | DynamicOperand::FullTextSearchScore(selector) => {
                self.validate_selector(context, selector);
            }
            DynamicOperand::LowerCase(inner) | DynamicOperand::UpperCase(inner) => {
                self.validate_operand(context, inner)
            }
            DynamicOperand::Arithmetic { left, right, .. } => {
                self.validate_operand(context, left);
                self.validate_operand(context, right);
            }
        }
    }

    fn validate_selector<S: Schemata>(&self, context: &mut QueryContext<S>, selector: &SelectorName) -> Option<&'a Table> {
        let table = self.table(selector);
        if table.is_none() {
            context
                .problems_mut()
                .add_error(format!("Selector '{}' is not used in the query", selector));
        }
        table
    }

    fn validate_column<S: Schemata>(&self, context: &mut QueryContext<S>, selector: &SelectorName, property: &str) {
        if let Some(table) = self.validate_selector(context, selector) {
            let strict = !context.hints().allow_unknown_columns && !table.has_extra_columns();
            if strict && table.column(property).is_none() {
                context.problems_mut().add_error(format!(
                    "Column '{}' does not exist on table '{}'",
                    property,
                    table.name()
                ));
            }
        }
    }

    fn validate_full_text_search<S: Schemata>(
        &self,
        context: &mut QueryContext<S>,
        selector: &SelectorName,
        property: Option<&str>,
    ) {
        let table = match self.validate_selector(context, selector) {
            Some(table) => table,
            None => return,
        };
        match property {
            None if !table.has_full_text_searchable_columns() => {
                context.problems_mut().add_error(format!(
                    "Table '{}' has no full-text searchable columns",
                    table.name()
                ));
            }
            Some(property) => match table.column(property) {
                Some(column) if !column.full_text_searchable => {
                    context.problems_mut().add_error(format!(
                        "Column '{}' on table '{}' is not full-text searchable",
                        property,
                        table.name()
                    ));
                }
                Some(_) => {}
                None => self.validate_column(context, selector, property),
            },
            None => {}
        }
    }
}
