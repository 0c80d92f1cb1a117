//! Predicate types and compilation of conditions and logic groups into
//! SQL expressions.

use std::fmt;
use std::str::FromStr;

use segment_core::{SegmentError, SegmentResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::ast::{CmpOp, Expr, Term};
use crate::escape::{escape_array, escape_value, value_text, SqlLiteral};
use crate::schema::{self, FieldType};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOperator {
    #[default]
    #[serde(rename = "AND", alias = "and", alias = "And")]
    And,
    #[serde(rename = "OR", alias = "or", alias = "Or")]
    Or,
}

impl LogicalOperator {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

/// The closed set of condition operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    GreaterEqual,
    LessEqual,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    In,
    NotIn,
    IsNull,
    IsNotNull,
    Between,
    Regex,
    HasAny,
    HasAll,
}

impl Operator {
    pub const ALL: [Operator; 18] = [
        Self::Equals,
        Self::NotEquals,
        Self::GreaterThan,
        Self::LessThan,
        Self::GreaterEqual,
        Self::LessEqual,
        Self::Contains,
        Self::NotContains,
        Self::StartsWith,
        Self::EndsWith,
        Self::In,
        Self::NotIn,
        Self::IsNull,
        Self::IsNotNull,
        Self::Between,
        Self::Regex,
        Self::HasAny,
        Self::HasAll,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "not_equals",
            Self::GreaterThan => "greater_than",
            Self::LessThan => "less_than",
            Self::GreaterEqual => "greater_equal",
            Self::LessEqual => "less_equal",
            Self::Contains => "contains",
            Self::NotContains => "not_contains",
            Self::StartsWith => "starts_with",
            Self::EndsWith => "ends_with",
            Self::In => "in",
            Self::NotIn => "not_in",
            Self::IsNull => "is_null",
            Self::IsNotNull => "is_not_null",
            Self::Between => "between",
            Self::Regex => "regex",
            Self::HasAny => "has_any",
            Self::HasAll => "has_all",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|op| op.as_str() == s).ok_or(())
    }
}

/// One atomic condition. `operator` is kept as written in the payload and
/// resolved when the condition is compiled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentCondition {
    pub field: String,
    pub operator: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value2: Option<Value>,
}

impl SegmentCondition {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator: operator.as_str().to_string(),
            value: value.into(),
            value2: None,
        }
    }

    pub fn between(field: impl Into<String>, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Self {
            value2: Some(high.into()),
            ..Self::new(field, Operator::Between, low)
        }
    }

    /// Resolve the operator name.
    pub fn operator(&self) -> SegmentResult<Operator> {
        self.operator
            .parse()
            .map_err(|_| SegmentError::UnsupportedOperator {
                operator: self.operator.clone(),
                field: self.field.clone(),
            })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentGroup {
    #[serde(default)]
    pub logic: LogicalOperator,
    #[serde(default)]
    pub conditions: Vec<SegmentCondition>,
    #[serde(default)]
    pub groups: Vec<SegmentGroup>,
}

impl SegmentGroup {
    pub fn all(conditions: Vec<SegmentCondition>) -> Self {
        Self {
            logic: LogicalOperator::And,
            conditions,
            groups: Vec::new(),
        }
    }

    pub fn any(conditions: Vec<SegmentCondition>) -> Self {
        Self {
            logic: LogicalOperator::Or,
            conditions,
            groups: Vec::new(),
        }
    }

    pub fn with_group(mut self, group: SegmentGroup) -> Self {
        self.groups.push(group);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty() && self.groups.is_empty()
    }

    /// Depth-first walk over every condition in this group and its children.
    pub fn for_each_condition<'a>(&'a self, f: &mut impl FnMut(&'a SegmentCondition)) {
        self.conditions.iter().for_each(&mut *f);
        for group in &self.groups {
            group.for_each_condition(f);
        }
    }
}

/// Compile one condition against `table`. In aggregate context `field` is an
/// already-built aggregate expression and is emitted verbatim.
pub fn compile_condition(
    condition: &SegmentCondition,
    table: &str,
    aggregate: bool,
) -> SegmentResult<Expr> {
    let lhs = if aggregate {
        Term::raw(condition.field.as_str())
    } else {
        Term::column(condition.field.as_str())
    };
    compile_with(condition, lhs, schema::type_of(table, &condition.field))
}

/// Compile `condition` with an explicit left-hand side and value type.
pub(crate) fn compile_with(
    condition: &SegmentCondition,
    lhs: Term,
    ty: FieldType,
) -> SegmentResult<Expr> {
    let operator = condition.operator()?;
    let value = &condition.value;
    let literal = |v: &Value| Term::Literal(escape_value(v, ty));

    let expr = match operator {
        Operator::Equals => Expr::compare(lhs, CmpOp::Eq, literal(value)),
        Operator::NotEquals => Expr::compare(lhs, CmpOp::NotEq, literal(value)),
        Operator::GreaterThan => Expr::compare(lhs, CmpOp::Gt, literal(value)),
        Operator::LessThan => Expr::compare(lhs, CmpOp::Lt, literal(value)),
        Operator::GreaterEqual => Expr::compare(lhs, CmpOp::GtEq, literal(value)),
        Operator::LessEqual => Expr::compare(lhs, CmpOp::LtEq, literal(value)),
        Operator::Contains => like(lhs, false, value, true, true),
        Operator::NotContains => like(lhs, true, value, true, true),
        Operator::StartsWith => like(lhs, false, value, false, true),
        Operator::EndsWith => like(lhs, false, value, true, false),
        Operator::In => membership(lhs, false, value, ty),
        Operator::NotIn => membership(lhs, true, value, ty),
        Operator::IsNull => Expr::IsNull {
            lhs,
            negated: false,
        },
        Operator::IsNotNull => Expr::IsNull { lhs, negated: true },
        Operator::Between => {
            let high = condition
                .value2
                .as_ref()
                .filter(|v| !v.is_null())
                .ok_or_else(|| {
                    SegmentError::invalid(format!(
                        "`between` on `{}` requires value2",
                        condition.field
                    ))
                })?;
            Expr::Between {
                lhs,
                low: escape_value(value, ty),
                high: escape_value(high, ty),
            }
        }
        Operator::Regex => Expr::compare(
            Term::call("match", vec![lhs, literal(value)]),
            CmpOp::Eq,
            Term::Int(1),
        ),
        Operator::HasAny => {
            Expr::Predicate(Term::call("hasAny", vec![lhs, Term::Literal(escape_array(value))]))
        }
        Operator::HasAll => {
            Expr::Predicate(Term::call("hasAll", vec![lhs, Term::Literal(escape_array(value))]))
        }
    };
    Ok(expr)
}

fn like(lhs: Term, negated: bool, value: &Value, leading: bool, trailing: bool) -> Expr {
    Expr::Like {
        lhs,
        negated,
        pattern: SqlLiteral::pattern(&value_text(value), leading, trailing),
    }
}

fn membership(lhs: Term, negated: bool, value: &Value, ty: FieldType) -> Expr {
    let list = match value {
        Value::Array(items) => items.iter().map(|v| escape_value(v, ty)).collect(),
        scalar => vec![escape_value(scalar, ty)],
    };
    Expr::InList { lhs, negated, list }
}

/// Compile a logic group. Conditions come first, then each nested group in
/// parentheses, all joined by the group's operator. An empty group yields
/// `None`; the result itself is never parenthesized.
pub fn compile_group(group: &SegmentGroup, table: &str) -> SegmentResult<Option<Expr>> {
    let mut fragments = Vec::with_capacity(group.conditions.len() + group.groups.len());
    for condition in &group.conditions {
        fragments.push(compile_condition(condition, table, false)?);
    }
    for nested in &group.groups {
        if let Some(expr) = compile_group(nested, table)? {
            fragments.push(expr.nested());
        } else {
            debug!(table = table, "Skipping empty nested group");
        }
    }
    Ok(Expr::junction(group.logic, fragments))
}
