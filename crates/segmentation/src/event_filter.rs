//! Event filters — correlated membership subqueries over the event tables,
//! optionally aggregated per subscriber with a HAVING condition.

use std::str::FromStr;

use segment_core::{SegmentError, SegmentResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::ast::{CmpOp, Expr, Projection, SelectStatement, TableRef, Term};
use crate::escape::{escape_identifier, SqlLiteral};
use crate::predicates::{self, compile_group, Operator, SegmentCondition, SegmentGroup};
use crate::schema::{self, FieldType, BASE_ALIAS, BASE_ID_COLUMN, CORRELATING_ID_COLUMN, STORE_COLUMN};
use crate::timeframe::{compile_timeframe, RelativeWindow, Timeframe};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFilter {
    pub table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeframe: Option<Timeframe>,
    #[serde(default)]
    pub conditions: SegmentGroup,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<Aggregation>,
    #[serde(default)]
    pub exclude: bool,
}

impl EventFilter {
    pub fn on(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            timeframe: None,
            conditions: SegmentGroup::default(),
            aggregation: None,
            exclude: false,
        }
    }

    pub fn within(mut self, window: RelativeWindow) -> Self {
        self.timeframe = Some(Timeframe::relative(window));
        self
    }

    pub fn between(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.timeframe = Some(Timeframe::between(start, end));
        self
    }

    pub fn matching(mut self, condition: SegmentCondition) -> Self {
        self.conditions.conditions.push(condition);
        self
    }

    pub fn aggregate(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = Some(aggregation);
        self
    }

    pub fn excluded(mut self) -> Self {
        self.exclude = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationType {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    DistinctCount,
}

impl AggregationType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
            Self::DistinctCount => "distinct_count",
        }
    }

    /// ClickHouse aggregate function name.
    pub fn function(self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
            Self::DistinctCount => "uniq",
        }
    }

    pub fn requires_field(self) -> bool {
        !matches!(self, Self::Count)
    }
}

impl FromStr for AggregationType {
    type Err = SegmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "count" => Ok(Self::Count),
            "sum" => Ok(Self::Sum),
            "avg" => Ok(Self::Avg),
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            "distinct_count" => Ok(Self::DistinctCount),
            other => Err(SegmentError::UnsupportedAggregationType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub having: Option<SegmentCondition>,
}

impl Aggregation {
    pub fn count() -> Self {
        Self {
            kind: AggregationType::Count.as_str().to_string(),
            field: None,
            having: None,
        }
    }

    pub fn of(kind: AggregationType, field: impl Into<String>) -> Self {
        Self {
            kind: kind.as_str().to_string(),
            field: Some(field.into()),
            having: None,
        }
    }

    /// Constrain the aggregate. The condition's field is replaced by the
    /// aggregate expression at compile time.
    pub fn having(mut self, operator: Operator, value: impl Into<Value>) -> Self {
        self.having = Some(SegmentCondition::new(self.kind.clone(), operator, value));
        self
    }

    pub fn kind(&self) -> SegmentResult<AggregationType> {
        self.kind.parse()
    }

    /// `func(field)` for this aggregation, plus the type its result compares as.
    fn expression(&self, table: &str) -> SegmentResult<(String, FieldType)> {
        let kind = self.kind()?;
        let field = self.field.as_deref().filter(|f| !f.is_empty());
        let argument = match field {
            Some(field) => escape_identifier(field),
            None if kind.requires_field() => {
                return Err(SegmentError::invalid(format!(
                    "aggregation `{}` requires a field",
                    kind.as_str()
                )))
            }
            None => "*".to_string(),
        };
        let result_type = match (kind, field) {
            (AggregationType::Min | AggregationType::Max, Some(field)) => {
                schema::type_of(table, field)
            }
            (AggregationType::Count | AggregationType::DistinctCount, _) => FieldType::Integer,
            _ => FieldType::Decimal,
        };
        Ok((format!("{}({argument})", kind.function()), result_type))
    }
}

/// Build the subquery selecting correlating ids for `filter`.
pub fn build_subquery(filter: &EventFilter, store_id: &str) -> SegmentResult<SelectStatement> {
    if filter.table.trim().is_empty() {
        return Err(SegmentError::invalid("event filter table must not be empty"));
    }
    let table = filter.table.as_str();
    if !schema::is_event_table(table) {
        debug!(table = table, "Event filter on unregistered table, fields escape as strings");
    }

    let mut subquery = SelectStatement::new(
        Projection::Columns(vec![Term::raw(CORRELATING_ID_COLUMN)]),
        TableRef {
            name: Term::column(table),
            alias: None,
        },
    );
    subquery.and_where(Expr::compare(
        Term::raw(STORE_COLUMN),
        CmpOp::Eq,
        Term::Literal(SqlLiteral::string(store_id)),
    ));
    if let Some(timeframe) = compile_timeframe(filter.timeframe.as_ref()) {
        subquery.and_where(timeframe);
    }
    if let Some(conditions) = compile_group(&filter.conditions, table)? {
        subquery.and_where(conditions);
    }

    if let Some(aggregation) = &filter.aggregation {
        let (expression, result_type) = aggregation.expression(table)?;
        subquery.group_by.push(Term::raw(CORRELATING_ID_COLUMN));
        if let Some(having) = &aggregation.having {
            let condition = SegmentCondition {
                field: expression.clone(),
                ..having.clone()
            };
            subquery.having = Some(predicates::compile_with(
                &condition,
                Term::raw(expression),
                result_type,
            )?);
        }
    }

    Ok(subquery)
}

/// Compile `filter` into `s.id [NOT] IN (subquery)`.
pub fn compile_event_filter(filter: &EventFilter, store_id: &str) -> SegmentResult<Expr> {
    Ok(Expr::InSubquery {
        lhs: Term::Qualified(BASE_ALIAS, BASE_ID_COLUMN),
        negated: filter.exclude,
        subquery: Box::new(build_subquery(filter, store_id)?),
    })
}
