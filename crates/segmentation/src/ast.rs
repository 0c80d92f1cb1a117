//! SQL expression tree. Compilers build `Expr`/`SelectStatement` values and
//! all text is produced by the `Display` impls in this module.

use std::fmt;

use crate::escape::{escape_identifier, SqlLiteral};
use crate::predicates::LogicalOperator;

/// Operand of a predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    /// User-supplied column name, rendered backtick-quoted.
    Column(String),
    /// Trusted internal SQL text, rendered verbatim (fixed column names,
    /// synthesized aggregate expressions).
    Raw(String),
    /// `alias.column` with trusted parts.
    Qualified(&'static str, &'static str),
    Literal(SqlLiteral),
    Int(i64),
    Call(&'static str, Vec<Term>),
    Minus(Box<Term>, Box<Term>),
}

impl Term {
    pub fn column(name: impl Into<String>) -> Self {
        Self::Column(name.into())
    }

    pub fn raw(sql: impl Into<String>) -> Self {
        Self::Raw(sql.into())
    }

    pub fn call(name: &'static str, args: Vec<Term>) -> Self {
        Self::Call(name, args)
    }

    pub fn minus(self, rhs: Term) -> Self {
        Self::Minus(Box::new(self), Box::new(rhs))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Gt,
    Lt,
    GtEq,
    LtEq,
}

impl CmpOp {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::GtEq => ">=",
            Self::LtEq => "<=",
        }
    }
}

/// Boolean SQL fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Compare {
        lhs: Term,
        op: CmpOp,
        rhs: Term,
    },
    Like {
        lhs: Term,
        negated: bool,
        pattern: SqlLiteral,
    },
    InList {
        lhs: Term,
        negated: bool,
        list: Vec<SqlLiteral>,
    },
    Between {
        lhs: Term,
        low: SqlLiteral,
        high: SqlLiteral,
    },
    IsNull {
        lhs: Term,
        negated: bool,
    },
    /// Function call that already yields a boolean, e.g. `hasAny(...)`.
    Predicate(Term),
    InSubquery {
        lhs: Term,
        negated: bool,
        subquery: Box<SelectStatement>,
    },
    /// Operands joined by one logic operator, with no enclosing parentheses.
    Junction {
        logic: LogicalOperator,
        operands: Vec<Expr>,
    },
    /// Parenthesized sub-expression.
    Nested(Box<Expr>),
}

impl Expr {
    pub fn compare(lhs: Term, op: CmpOp, rhs: Term) -> Self {
        Self::Compare { lhs, op, rhs }
    }

    pub fn nested(self) -> Self {
        Self::Nested(Box::new(self))
    }

    /// Joins `operands` with `logic`. Returns `None` for an empty list and the
    /// single operand unwrapped for a list of one.
    pub fn junction(logic: LogicalOperator, mut operands: Vec<Expr>) -> Option<Self> {
        match operands.len() {
            0 => None,
            1 => operands.pop(),
            _ => Some(Self::Junction { logic, operands }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    All,
    /// `count(*) as <alias>`
    Count(&'static str),
    Columns(Vec<Term>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    pub name: Term,
    pub alias: Option<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub projection: Projection,
    pub from: TableRef,
    /// ANDed together without parentheses.
    pub selection: Vec<Expr>,
    pub group_by: Vec<Term>,
    pub having: Option<Expr>,
    pub order_by: Vec<(Term, SortOrder)>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl SelectStatement {
    pub fn new(projection: Projection, from: TableRef) -> Self {
        Self {
            projection,
            from,
            selection: Vec::new(),
            group_by: Vec::new(),
            having: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn and_where(&mut self, expr: Expr) -> &mut Self {
        self.selection.push(expr);
        self
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T], sep: &str) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Column(name) => f.write_str(&escape_identifier(name)),
            Term::Raw(sql) => f.write_str(sql),
            Term::Qualified(alias, column) => write!(f, "{alias}.{column}"),
            Term::Literal(lit) => write!(f, "{lit}"),
            Term::Int(n) => write!(f, "{n}"),
            Term::Call(name, args) => {
                write!(f, "{name}(")?;
                write_list(f, args, ", ")?;
                f.write_str(")")
            }
            Term::Minus(lhs, rhs) => write!(f, "{lhs} - {rhs}"),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Compare { lhs, op, rhs } => write!(f, "{lhs} {} {rhs}", op.as_sql()),
            Expr::Like {
                lhs,
                negated,
                pattern,
            } => {
                let not = if *negated { "NOT " } else { "" };
                write!(f, "{lhs} {not}LIKE {pattern}")
            }
            Expr::InList { lhs, negated, list } => {
                let not = if *negated { "NOT " } else { "" };
                write!(f, "{lhs} {not}IN (")?;
                write_list(f, list, ", ")?;
                f.write_str(")")
            }
            Expr::Between { lhs, low, high } => write!(f, "{lhs} BETWEEN {low} AND {high}"),
            Expr::IsNull { lhs, negated } => {
                let not = if *negated { " NOT" } else { "" };
                write!(f, "{lhs} IS{not} NULL")
            }
            Expr::Predicate(call) => write!(f, "{call}"),
            Expr::InSubquery {
                lhs,
                negated,
                subquery,
            } => {
                let not = if *negated { "NOT " } else { "" };
                write!(f, "{lhs} {not}IN ({subquery})")
            }
            Expr::Junction { logic, operands } => {
                write_list(f, operands, &format!(" {} ", logic.as_sql()))
            }
            Expr::Nested(inner) => write!(f, "({inner})"),
        }
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Projection::All => f.write_str("*"),
            Projection::Count(alias) => write!(f, "count(*) as {alias}"),
            Projection::Columns(columns) => write_list(f, columns, ", "),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(alias) = self.alias {
            write!(f, " {alias}")?;
        }
        Ok(())
    }
}

impl fmt::Display for SelectStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT {} FROM {}", self.projection, self.from)?;
        if !self.selection.is_empty() {
            f.write_str(" WHERE ")?;
            write_list(f, &self.selection, " AND ")?;
        }
        if !self.group_by.is_empty() {
            f.write_str(" GROUP BY ")?;
            write_list(f, &self.group_by, ", ")?;
        }
        if let Some(having) = &self.having {
            write!(f, " HAVING {having}")?;
        }
        for (i, (term, order)) in self.order_by.iter().enumerate() {
            f.write_str(if i == 0 { " ORDER BY " } else { ", " })?;
            let dir = match order {
                SortOrder::Ascending => "ASC",
                SortOrder::Descending => "DESC",
            };
            write!(f, "{term} {dir}")?;
        }
        if let Some(limit) = self.limit {
            write!(f, " LIMIT {limit}")?;
        }
        if let Some(offset) = self.offset {
            write!(f, " OFFSET {offset}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eq(col: &str, lit: &str) -> Expr {
        Expr::compare(Term::column(col), CmpOp::Eq, Term::Literal(SqlLiteral::string(lit)))
    }

    #[test]
    fn test_junction_has_no_outer_parentheses() {
        let expr = Expr::junction(LogicalOperator::Or, vec![eq("a", "1"), eq("b", "2")]).unwrap();
        assert_eq!(expr.to_string(), "`a` = '1' OR `b` = '2'");
        assert_eq!(expr.nested().to_string(), "(`a` = '1' OR `b` = '2')");
    }

    #[test]
    fn test_junction_of_one_is_unwrapped() {
        let expr = Expr::junction(LogicalOperator::And, vec![eq("a", "1")]).unwrap();
        assert!(matches!(expr, Expr::Compare { .. }));
        assert!(Expr::junction(LogicalOperator::And, Vec::new()).is_none());
    }

    #[test]
    fn test_interval_arithmetic() {
        let term = Term::call("now", vec![]).minus(Term::call("toIntervalDay", vec![Term::Int(7)]));
        assert_eq!(term.to_string(), "now() - toIntervalDay(7)");
    }

    #[test]
    fn test_select_clause_order() {
        let mut stmt = SelectStatement::new(
            Projection::All,
            TableRef {
                name: Term::raw("subscribers"),
                alias: Some("s"),
            },
        );
        stmt.and_where(eq("country", "US"));
        stmt.order_by.push((Term::Qualified("s", "updated_at"), SortOrder::Descending));
        stmt.limit = Some(10);
        stmt.offset = Some(20);
        assert_eq!(
            stmt.to_string(),
            "SELECT * FROM subscribers s WHERE `country` = 'US' ORDER BY s.updated_at DESC LIMIT 10 OFFSET 20"
        );
    }
}
