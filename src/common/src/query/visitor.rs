//! Read-only walks over constraint, operand, and join-condition trees.
//!
//! None of these descend into subquery bodies.
use super::{Constraint, DynamicOperand, JoinCondition, Ordering, SelectorName, StaticOperand};
use std::collections::BTreeSet;

/// Returns the selector names referenced anywhere within the constraint.
pub fn selectors_in_constraint(constraint: &Constraint) -> BTreeSet<SelectorName> {
    let mut selectors = BTreeSet::new();
    add_constraint_selectors(constraint, &mut selectors);
    selectors
}

/// Returns the selector names referenced by the operand.
pub fn selectors_in_operand(operand: &DynamicOperand) -> BTreeSet<SelectorName> {
    let mut selectors = BTreeSet::new();
    add_operand_selectors(operand, &mut selectors);
    selectors
}

/// Returns the selector names referenced by every ordering.
pub fn selectors_in_orderings(orderings: &[Ordering]) -> BTreeSet<SelectorName> {
    let mut selectors = BTreeSet::new();
    for ordering in orderings {
        add_operand_selectors(&ordering.operand, &mut selectors);
    }
    selectors
}

pub fn selectors_in_join_condition(condition: &JoinCondition) -> BTreeSet<SelectorName> {
    let mut selectors = BTreeSet::new();
    match condition {
        JoinCondition::Equi {
            selector1,
            selector2,
            ..
        }
        | JoinCondition::SameNode {
            selector1,
            selector2,
            ..
        } => {
            selectors.insert(selector1.clone());
            selectors.insert(selector2.clone());
        }
        JoinCondition::ChildNode { parent, child } => {
            selectors.insert(parent.clone());
            selectors.insert(child.clone());
        }
        JoinCondition::DescendantNode {
            ancestor,
            descendant,
        } => {
            selectors.insert(ancestor.clone());
            selectors.insert(descendant.clone());
        }
    }
    selectors
}

fn add_constraint_selectors(constraint: &Constraint, selectors: &mut BTreeSet<SelectorName>) {
    match constraint {
        Constraint::And(left, right) | Constraint::Or(left, right) => {
            add_constraint_selectors(left, selectors);
            add_constraint_selectors(right, selectors);
        }
        Constraint::Not(c) => add_constraint_selectors(c, selectors),
        Constraint::Comparison { operand1, .. } => add_operand_selectors(operand1, selectors),
        Constraint::Between { operand, .. } | Constraint::SetCriteria { operand, .. } => {
            add_operand_selectors(operand, selectors)
        }
        Constraint::PropertyExistence { selector, .. }
        | Constraint::FullTextSearch { selector, .. }
        | Constraint::SameNode { selector, .. }
        | Constraint::ChildNode { selector, .. }
        | Constraint::DescendantNode { selector, .. } => {
            selectors.insert(selector.clone());
        }
    }
}

fn add_operand_selectors(operand: &DynamicOperand, selectors: &mut BTreeSet<SelectorName>) {
    match operand {
        DynamicOperand::PropertyValue { selector, .. }
        | DynamicOperand::ReferenceValue { selector, .. }
        | DynamicOperand::Length { selector, .. } => {
            selectors.insert(selector.clone());
        }
        DynamicOperand::NodeName(selector)
        | DynamicOperand::NodeLocalName(selector)
        | DynamicOperand::NodeDepth(selector)
        | DynamicOperand::NodePath(selector)
        | DynamicOperand::FullTextSearchScore(selector) => {
            selectors.insert(selector.clone());
        }
        DynamicOperand::LowerCase(inner) | DynamicOperand::UpperCase(inner) => {
            add_operand_selectors(inner, selectors)
        }
        DynamicOperand::Arithmetic { left, right, .. } => {
            add_operand_selectors(left, selectors);
            add_operand_selectors(right, selectors);
        }
    }
}

/// True if a full-text search appears anywhere within the constraint.
pub fn contains_full_text_search(constraint: &Constraint) -> bool {
    match constraint {
        Constraint::FullTextSearch { .. } => true,
        Constraint::And(left, right) | Constraint::Or(left, right) => {
            contains_full_text_search(left) || contains_full_text_search(right)
        }
        Constraint::Not(c) => contains_full_text_search(c),
        _ => false,
    }
}

/// Splits the top-level AND tree into its independent constraints, in left-to-right order.
pub fn separate_and_constraints(constraint: &Constraint) -> Vec<Constraint> {
    let mut constraints = Vec::new();
    separate_into(constraint, &mut constraints);
    constraints
}

fn separate_into(constraint: &Constraint, constraints: &mut Vec<Constraint>) {
    match constraint {
        Constraint::And(left, right) => {
            separate_into(left, constraints);
            separate_into(right, constraints);
        }
        other => constraints.push(other.clone()),
    }
}

/// Calls `f` with every static operand directly held by the constraint tree.
pub fn for_each_static_operand<'a, F>(constraint: &'a Constraint, f: &mut F)
where
    F: FnMut(&'a StaticOperand),
{
    match constraint {
        Constraint::And(left, right) | Constraint::Or(left, right) => {
            for_each_static_operand(left, f);
            for_each_static_operand(right, f);
        }
        Constraint::Not(c) => for_each_static_operand(c, f),
        Constraint::Comparison { operand2, .. } => f(operand2),
        Constraint::Between { lower, upper, .. } => {
            f(lower);
            f(upper);
        }
        Constraint::SetCriteria { values, .. } => values.iter().for_each(|v| f(v)),
        _ => {}
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::query::{ArithmeticOperator, Operator};
    use crate::Value;

    fn exists(selector: &str, property: &str) -> Constraint {
        Constraint::PropertyExistence {
            selector: SelectorName::new(selector),
            property: property.to_string(),
        }
    }

    #[test]
    fn test_separate_and_constraints() {
        let c = Constraint::and(
            Constraint::and(exists("a", "p"), exists("b", "q")),
            Constraint::or(exists("c", "r"), exists("d", "s")),
        );
        let parts = separate_and_constraints(&c);
        assert_eq!(3, parts.len());
        assert_eq!(exists("a", "p"), parts[0]);
        assert_eq!(exists("b", "q"), parts[1]);
    }

    #[test]
    fn test_selectors_in_constraint() {
        let c = Constraint::or(
            exists("a", "p"),
            Constraint::comparison(
                DynamicOperand::arithmetic(
                    DynamicOperand::property_value("b", "x"),
                    ArithmeticOperator::Add,
                    DynamicOperand::NodeDepth(SelectorName::new("c")),
                ),
                Operator::LessThan,
                StaticOperand::Literal(Value::Long(3)),
            ),
        );
        let names: Vec<String> = selectors_in_constraint(&c)
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert_eq!(vec!["a", "b", "c"], names);
    }

    #[test]
    fn test_contains_full_text_search() {
        let fts = Constraint::FullTextSearch {
            selector: SelectorName::new("a"),
            property: None,
            expression: String::from("term"),
        };
        assert!(contains_full_text_search(&Constraint::not(fts)));
        assert!(!contains_full_text_search(&exists("a", "p")));
    }
}
