use super::{QueryCommand, SelectorName};
use crate::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparison operators.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    EqualTo,
    NotEqualTo,
    LessThan,
    LessThanOrEqualTo,
    GreaterThan,
    GreaterThanOrEqualTo,
    Like,
}

impl Operator {
    /// Flip the operator so the operands can be swapped.
    pub fn flip(&self) -> Self {
        match self {
            Operator::GreaterThan => Operator::LessThan,
            Operator::LessThan => Operator::GreaterThan,
            Operator::LessThanOrEqualTo => Operator::GreaterThanOrEqualTo,
            Operator::GreaterThanOrEqualTo => Operator::LessThanOrEqualTo,
            op => *op,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op_str = match self {
            Operator::EqualTo => "=",
            Operator::NotEqualTo => "!=",
            Operator::LessThan => "<",
            Operator::LessThanOrEqualTo => "<=",
            Operator::GreaterThan => ">",
            Operator::GreaterThanOrEqualTo => ">=",
            Operator::Like => "LIKE",
        };
        write!(f, "{}", op_str)
    }
}

/// Arithmetic operators usable between dynamic operands.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl fmt::Display for ArithmeticOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op_str = match self {
            ArithmeticOperator::Add => "+",
            ArithmeticOperator::Subtract => "-",
            ArithmeticOperator::Multiply => "*",
            ArithmeticOperator::Divide => "/",
        };
        write!(f, "{}", op_str)
    }
}

/// An operand whose value depends on the row being evaluated.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum DynamicOperand {
    PropertyValue {
        selector: SelectorName,
        property: String,
    },
    ReferenceValue {
        selector: SelectorName,
        property: Option<String>,
    },
    Length {
        selector: SelectorName,
        property: String,
    },
    LowerCase(Box<DynamicOperand>),
    UpperCase(Box<DynamicOperand>),
    NodeName(SelectorName),
    NodeLocalName(SelectorName),
    NodeDepth(SelectorName),
    NodePath(SelectorName),
    FullTextSearchScore(SelectorName),
    Arithmetic {
        left: Box<DynamicOperand>,
        operator: ArithmeticOperator,
        right: Box<DynamicOperand>,
    },
}

impl DynamicOperand {
    pub fn property_value(selector: &str, property: &str) -> Self {
        DynamicOperand::PropertyValue {
            selector: SelectorName::new(selector),
            property: property.to_string(),
        }
    }

    pub fn arithmetic(left: DynamicOperand, operator: ArithmeticOperator, right: DynamicOperand) -> Self {
        DynamicOperand::Arithmetic {
            left: Box::new(left),
            operator,
            right: Box::new(right),
        }
    }
}

impl fmt::Display for DynamicOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DynamicOperand::PropertyValue { selector, property } => {
                write!(f, "{}.{}", selector, property)
            }
            DynamicOperand::ReferenceValue { selector, property } => match property {
                Some(property) => write!(f, "REFERENCE({}.{})", selector, property),
                None => write!(f, "REFERENCE({})", selector),
            },
            DynamicOperand::Length { selector, property } => {
                write!(f, "LENGTH({}.{})", selector, property)
            }
            DynamicOperand::LowerCase(operand) => write!(f, "LOWER({})", operand),
            DynamicOperand::UpperCase(operand) => write!(f, "UPPER({})", operand),
            DynamicOperand::NodeName(selector) => write!(f, "NAME({})", selector),
            DynamicOperand::NodeLocalName(selector) => write!(f, "LOCALNAME({})", selector),
            DynamicOperand::NodeDepth(selector) => write!(f, "DEPTH({})", selector),
            DynamicOperand::NodePath(selector) => write!(f, "PATH({})", selector),
            DynamicOperand::FullTextSearchScore(selector) => write!(f, "SCORE({})", selector),
            DynamicOperand::Arithmetic {
                left,
                operator,
                right,
            } => write!(f, "({} {} {})", left, operator, right),
        }
    }
}

/// An operand that is fixed while the query runs.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum StaticOperand {
    Literal(Value),
    BindVariable(String),
    Subquery(Box<QueryCommand>),
}

impl fmt::Display for StaticOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaticOperand::Literal(Value::String(s)) => write!(f, "'{}'", s),
            StaticOperand::Literal(value) => write!(f, "{}", value),
            StaticOperand::BindVariable(name) => write!(f, "${}", name),
            StaticOperand::Subquery(_) => write!(f, "(subquery)"),
        }
    }
}

/// Criteria restricting the rows produced by a query.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Constraint {
    And(Box<Constraint>, Box<Constraint>),
    Or(Box<Constraint>, Box<Constraint>),
    Not(Box<Constraint>),
    Comparison {
        operand1: DynamicOperand,
        operator: Operator,
        operand2: StaticOperand,
    },
    Between {
        operand: DynamicOperand,
        lower: StaticOperand,
        upper: StaticOperand,
        lower_included: bool,
        upper_included: bool,
    },
    SetCriteria {
        operand: DynamicOperand,
        values: Vec<StaticOperand>,
    },
    PropertyExistence {
        selector: SelectorName,
        property: String,
    },
    FullTextSearch {
        selector: SelectorName,
        property: Option<String>,
        expression: String,
    },
    SameNode {
        selector: SelectorName,
        path: String,
    },
    ChildNode {
        selector: SelectorName,
        parent_path: String,
    },
    DescendantNode {
        selector: SelectorName,
        ancestor_path: String,
    },
}

impl Constraint {
    pub fn and(left: Constraint, right: Constraint) -> Self {
        Constraint::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Constraint, right: Constraint) -> Self {
        Constraint::Or(Box::new(left), Box::new(right))
    }

    pub fn not(constraint: Constraint) -> Self {
        Constraint::Not(Box::new(constraint))
    }

    pub fn comparison(operand1: DynamicOperand, operator: Operator, operand2: StaticOperand) -> Self {
        Constraint::Comparison {
            operand1,
            operator,
            operand2,
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::And(left, right) => write!(f, "({} AND {})", left, right),
            Constraint::Or(left, right) => write!(f, "({} OR {})", left, right),
            Constraint::Not(c) => write!(f, "NOT({})", c),
            Constraint::Comparison {
                operand1,
                operator,
                operand2,
            } => write!(f, "{} {} {}", operand1, operator, operand2),
            Constraint::Between {
                operand,
                lower,
                upper,
                lower_included,
                upper_included,
            } => {
                write!(f, "{} BETWEEN {}", operand, lower)?;
                if !lower_included {
                    write!(f, " EXCLUSIVE")?;
                }
                write!(f, " AND {}", upper)?;
                if !upper_included {
                    write!(f, " EXCLUSIVE")?;
                }
                Ok(())
            }
            Constraint::SetCriteria { operand, values } => {
                let values: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "{} IN ({})", operand, values.join(","))
            }
            Constraint::PropertyExistence { selector, property } => {
                write!(f, "{}.{} IS NOT NULL", selector, property)
            }
            Constraint::FullTextSearch {
                selector,
                property,
                expression,
            } => match property {
                Some(property) => {
                    write!(f, "CONTAINS({}.{},'{}')", selector, property, expression)
                }
                None => write!(f, "CONTAINS({},'{}')", selector, expression),
            },
            Constraint::SameNode { selector, path } => {
                write!(f, "ISSAMENODE({},'{}')", selector, path)
            }
            Constraint::ChildNode {
                selector,
                parent_path,
            } => write!(f, "ISCHILDNODE({},'{}')", selector, parent_path),
            Constraint::DescendantNode {
                selector,
                ancestor_path,
            } => write!(f, "ISDESCENDANTNODE({},'{}')", selector, ancestor_path),
        }
    }
}

/// Criteria relating the two sides of a join.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum JoinCondition {
    Equi {
        selector1: SelectorName,
        property1: String,
        selector2: SelectorName,
        property2: String,
    },
    SameNode {
        selector1: SelectorName,
        selector2: SelectorName,
        selector2_path: Option<String>,
    },
    ChildNode {
        parent: SelectorName,
        child: SelectorName,
    },
    DescendantNode {
        ancestor: SelectorName,
        descendant: SelectorName,
    },
}

impl JoinCondition {
    pub fn equi(selector1: &str, property1: &str, selector2: &str, property2: &str) -> Self {
        JoinCondition::Equi {
            selector1: SelectorName::new(selector1),
            property1: property1.to_string(),
            selector2: SelectorName::new(selector2),
            property2: property2.to_string(),
        }
    }
}

impl fmt::Display for JoinCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinCondition::Equi {
                selector1,
                property1,
                selector2,
                property2,
            } => write!(f, "{}.{} = {}.{}", selector1, property1, selector2, property2),
            JoinCondition::SameNode {
                selector1,
                selector2,
                selector2_path,
            } => match selector2_path {
                Some(path) => write!(f, "ISSAMENODE({},{},'{}')", selector1, selector2, path),
                None => write!(f, "ISSAMENODE({},{})", selector1, selector2),
            },
            JoinCondition::ChildNode { parent, child } => {
                write!(f, "ISCHILDNODE({},{})", child, parent)
            }
            JoinCondition::DescendantNode {
                ancestor,
                descendant,
            } => write!(f, "ISDESCENDANTNODE({},{})", descendant, ancestor),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_flip() {
        assert_eq!(Operator::GreaterThan, Operator::LessThan.flip());
        assert_eq!(Operator::Like, Operator::Like.flip());
    }

    #[test]
    fn test_display() {
        let c = Constraint::and(
            Constraint::comparison(
                DynamicOperand::property_value("t", "a"),
                Operator::EqualTo,
                StaticOperand::Literal(Value::String(String::from("x"))),
            ),
            Constraint::PropertyExistence {
                selector: SelectorName::new("t"),
                property: String::from("b"),
            },
        );
        assert_eq!("(t.a = 'x' AND t.b IS NOT NULL)", c.to_string());
        let j = JoinCondition::equi("t1", "id", "t2", "ref");
        assert_eq!("t1.id = t2.ref", j.to_string());
    }
}
