//! Timeframe resolution — explicit bounds or a relative window turned into a
//! predicate over the event `timestamp` column.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ast::{CmpOp, Expr, Term};
use crate::escape::SqlLiteral;
use crate::predicates::LogicalOperator;
use crate::schema::TIMESTAMP_COLUMN;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeframe {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative: Option<String>,
}

impl Timeframe {
    pub fn relative(window: RelativeWindow) -> Self {
        Self {
            relative: Some(window.as_str().to_string()),
            ..Default::default()
        }
    }

    pub fn between(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: Some(start.into()),
            end: Some(end.into()),
            relative: None,
        }
    }

    fn start(&self) -> Option<&str> {
        self.start.as_deref().filter(|s| !s.is_empty())
    }

    fn end(&self) -> Option<&str> {
        self.end.as_deref().filter(|s| !s.is_empty())
    }

    /// Predicate for this timeframe, or `None` when it constrains nothing.
    pub fn compile(&self) -> Option<Expr> {
        if self.start().is_some() || self.end().is_some() {
            let bounds = [(self.start(), CmpOp::GtEq), (self.end(), CmpOp::LtEq)]
                .into_iter()
                .filter_map(|(bound, op)| {
                    bound.map(|b| at(op, Term::Literal(SqlLiteral::string(b))))
                })
                .collect();
            return Expr::junction(LogicalOperator::And, bounds);
        }

        let window = self.relative.as_deref()?.parse::<RelativeWindow>().ok()?;
        Some(window.compile())
    }
}

/// Compile an optional timeframe; absence means no constraint.
pub fn compile_timeframe(timeframe: Option<&Timeframe>) -> Option<Expr> {
    timeframe.and_then(Timeframe::compile)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelativeWindow {
    Last7Days,
    Last30Days,
    Last90Days,
    LastYear,
    ThisMonth,
    LastMonth,
}

impl RelativeWindow {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Last7Days => "last_7_days",
            Self::Last30Days => "last_30_days",
            Self::Last90Days => "last_90_days",
            Self::LastYear => "last_year",
            Self::ThisMonth => "this_month",
            Self::LastMonth => "last_month",
        }
    }

    fn compile(self) -> Expr {
        match self {
            Self::Last7Days => at(CmpOp::GtEq, days_ago(7)),
            Self::Last30Days => at(CmpOp::GtEq, days_ago(30)),
            Self::Last90Days => at(CmpOp::GtEq, days_ago(90)),
            Self::LastYear => at(
                CmpOp::GtEq,
                now().minus(Term::call("toIntervalYear", vec![Term::Int(1)])),
            ),
            Self::ThisMonth => at(CmpOp::GtEq, start_of_month(now())),
            Self::LastMonth => Expr::Junction {
                logic: LogicalOperator::And,
                operands: vec![
                    at(
                        CmpOp::GtEq,
                        start_of_month(
                            now().minus(Term::call("toIntervalMonth", vec![Term::Int(1)])),
                        ),
                    ),
                    at(CmpOp::Lt, start_of_month(now())),
                ],
            },
        }
    }
}

impl FromStr for RelativeWindow {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "last_7_days" => Ok(Self::Last7Days),
            "last_30_days" => Ok(Self::Last30Days),
            "last_90_days" => Ok(Self::Last90Days),
            "last_year" => Ok(Self::LastYear),
            "this_month" => Ok(Self::ThisMonth),
            "last_month" => Ok(Self::LastMonth),
            _ => Err(()),
        }
    }
}

fn at(op: CmpOp, rhs: Term) -> Expr {
    Expr::compare(Term::raw(TIMESTAMP_COLUMN), op, rhs)
}

fn now() -> Term {
    Term::call("now", Vec::new())
}

fn days_ago(days: i64) -> Term {
    now().minus(Term::call("toIntervalDay", vec![Term::Int(days)]))
}

fn start_of_month(of: Term) -> Term {
    Term::call("toStartOfMonth", vec![of])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(timeframe: Timeframe) -> String {
        timeframe.compile().map(|e| e.to_string()).unwrap_or_default()
    }

    #[test]
    fn test_relative_windows() {
        let cases = [
            (RelativeWindow::Last7Days, "timestamp >= now() - toIntervalDay(7)"),
            (RelativeWindow::Last30Days, "timestamp >= now() - toIntervalDay(30)"),
            (RelativeWindow::Last90Days, "timestamp >= now() - toIntervalDay(90)"),
            (RelativeWindow::LastYear, "timestamp >= now() - toIntervalYear(1)"),
            (RelativeWindow::ThisMonth, "timestamp >= toStartOfMonth(now())"),
            (
                RelativeWindow::LastMonth,
                "timestamp >= toStartOfMonth(now() - toIntervalMonth(1)) AND timestamp < toStartOfMonth(now())",
            ),
        ];
        for (window, expected) in cases {
            assert_eq!(render(Timeframe::relative(window)), expected);
        }
    }

    #[test]
    fn test_explicit_bounds() {
        assert_eq!(
            render(Timeframe::between("2025-01-01", "2025-01-31T23:59:59Z")),
            "timestamp >= '2025-01-01' AND timestamp <= '2025-01-31T23:59:59Z'"
        );
        let start_only = Timeframe {
            start: Some("2025-01-01".into()),
            ..Default::default()
        };
        assert_eq!(render(start_only), "timestamp >= '2025-01-01'");
        let end_only = Timeframe {
            end: Some("2025-02-01".into()),
            ..Default::default()
        };
        assert_eq!(render(end_only), "timestamp <= '2025-02-01'");
    }

    #[test]
    fn test_explicit_bounds_override_relative() {
        let mixed = Timeframe {
            start: Some("2025-01-01".into()),
            end: None,
            relative: Some("last_7_days".into()),
        };
        let sql = render(mixed);
        assert_eq!(sql, "timestamp >= '2025-01-01'");
        assert!(!sql.contains("now()"));
    }

    #[test]
    fn test_bounds_are_escaped() {
        let hostile = Timeframe {
            start: Some("2025-01-01' OR 1=1 --".into()),
            ..Default::default()
        };
        assert_eq!(render(hostile), "timestamp >= '2025-01-01'' OR 1=1 --'");
    }

    #[test]
    fn test_unknown_or_absent_is_unconstrained() {
        let unknown = Timeframe {
            relative: Some("last_fortnight".into()),
            ..Default::default()
        };
        assert!(unknown.compile().is_none());
        assert!(Timeframe::default().compile().is_none());
        assert!(compile_timeframe(None).is_none());
    }
}
