//! Query assembler — turns a whole payload into one ClickHouse statement.

use segment_core::{CompilerConfig, SegmentError, SegmentResult};
use tracing::{debug, info};

use crate::ast::{CmpOp, Expr, Projection, SelectStatement, SortOrder, TableRef, Term};
use crate::escape::SqlLiteral;
use crate::event_filter::compile_event_filter;
use crate::payload::SegmentationPayload;
use crate::predicates::{compile_group, SegmentGroup};
use crate::schema::{self, BASE_ALIAS, BASE_TABLE, ORDER_COLUMN, STORE_COLUMN};

/// Stateless compiler; safe to share across threads.
#[derive(Debug, Clone, Default)]
pub struct SegmentCompiler {
    config: CompilerConfig,
}

impl SegmentCompiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile `payload` into SQL text.
    pub fn compile(&self, payload: &SegmentationPayload) -> SegmentResult<String> {
        let sql = self.build(payload)?.to_string();
        if self.config.debug {
            info!(store_id = %payload.store_id, sql = %sql, "Segmentation SQL");
        } else {
            debug!(store_id = %payload.store_id, sql = %sql, "Segmentation SQL");
        }
        Ok(sql)
    }

    /// Compile the count-only form of `payload`, whatever its own flag says.
    pub fn compile_count(&self, payload: &SegmentationPayload) -> SegmentResult<String> {
        self.compile(&payload.as_count())
    }

    /// Assemble the statement AST for `payload`.
    pub fn build(&self, payload: &SegmentationPayload) -> SegmentResult<SelectStatement> {
        let store_id = payload.store_id.trim();
        if store_id.is_empty() {
            return Err(SegmentError::invalid("store_id is required"));
        }
        if self.config.strict_fields {
            check_fields(payload)?;
        }

        let projection = if payload.return_count_only {
            Projection::Count("total")
        } else {
            Projection::All
        };
        let mut query = SelectStatement::new(
            projection,
            TableRef {
                name: Term::raw(BASE_TABLE),
                alias: Some(BASE_ALIAS),
            },
        );
        query.and_where(Expr::compare(
            Term::Qualified(BASE_ALIAS, STORE_COLUMN),
            CmpOp::Eq,
            Term::Literal(SqlLiteral::string(&payload.store_id)),
        ));

        if let Some(group) = &payload.base_conditions {
            if let Some(base) = compile_group(group, BASE_TABLE)? {
                query.and_where(base);
            }
        }
        for filter in &payload.event_filters {
            query.and_where(compile_event_filter(filter, &payload.store_id)?);
        }

        if !payload.return_count_only {
            query
                .order_by
                .push((Term::Qualified(BASE_ALIAS, ORDER_COLUMN), SortOrder::Descending));
            query.limit = payload
                .limit
                .or(self.config.default_limit)
                .filter(|limit| *limit > 0);
            query.offset = payload.offset;
        }

        Ok(query)
    }
}

/// Compile with the default (permissive) configuration.
pub fn compile(payload: &SegmentationPayload) -> SegmentResult<String> {
    SegmentCompiler::default().compile(payload)
}

/// Rejects condition and aggregation fields that are not registered for the
/// table they are compiled against. HAVING fields are aggregate expressions
/// and are not checked.
fn check_fields(payload: &SegmentationPayload) -> SegmentResult<()> {
    let mut unknown = None;
    let mut check = |table: &str, field: &str| {
        if unknown.is_none() && !schema::is_known(table, field) {
            unknown = Some(SegmentError::UnknownField {
                table: table.to_string(),
                field: field.to_string(),
            });
        }
    };

    let empty = SegmentGroup::default();
    let base = payload.base_conditions.as_ref().unwrap_or(&empty);
    base.for_each_condition(&mut |c| check(BASE_TABLE, &c.field));
    for filter in &payload.event_filters {
        filter
            .conditions
            .for_each_condition(&mut |c| check(&filter.table, &c.field));
        if let Some(field) = filter.aggregation.as_ref().and_then(|a| a.field.as_deref()) {
            check(&filter.table, field);
        }
    }

    unknown.map_or(Ok(()), Err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_filter::EventFilter;
    use crate::predicates::{Operator, SegmentCondition};

    fn payload(store_id: &str) -> SegmentationPayload {
        SegmentationPayload {
            store_id: store_id.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_minimal_row_query() {
        let sql = compile(&payload("s1")).unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM subscribers s WHERE s.store_id = 's1' ORDER BY s.updated_at DESC"
        );
    }

    #[test]
    fn test_missing_store_id() {
        for store_id in ["", "   "] {
            assert!(matches!(
                compile(&payload(store_id)),
                Err(SegmentError::InvalidPayload(_))
            ));
        }
    }

    #[test]
    fn test_store_id_is_escaped() {
        let sql = compile(&payload("it's")).unwrap();
        assert!(sql.contains("s.store_id = 'it''s'"));
    }

    #[test]
    fn test_pagination() {
        let mut p = payload("s1");
        p.limit = Some(20);
        p.offset = Some(40);
        assert!(compile(&p).unwrap().ends_with("ORDER BY s.updated_at DESC LIMIT 20 OFFSET 40"));

        p.limit = Some(0);
        p.offset = None;
        assert!(compile(&p).unwrap().ends_with("ORDER BY s.updated_at DESC"));
    }

    #[test]
    fn test_count_only_suppresses_ordering_and_pagination() {
        let mut p = payload("s1");
        p.limit = Some(20);
        p.offset = Some(40);
        p.return_count_only = true;
        let sql = compile(&p).unwrap();
        assert!(sql.starts_with("SELECT count(*) as total FROM subscribers s"));
        for clause in ["ORDER BY", "LIMIT", "OFFSET"] {
            assert!(!sql.contains(clause));
        }
    }

    #[test]
    fn test_default_limit() {
        let compiler = SegmentCompiler::new(CompilerConfig {
            default_limit: Some(100),
            ..Default::default()
        });
        let mut p = payload("s1");
        assert!(compiler.compile(&p).unwrap().ends_with("LIMIT 100"));
        p.limit = Some(5);
        assert!(compiler.compile(&p).unwrap().ends_with("LIMIT 5"));
        assert!(!compiler.compile_count(&p).unwrap().contains("LIMIT"));
    }

    #[test]
    fn test_empty_base_group_is_omitted() {
        let mut p = payload("s1");
        p.base_conditions = Some(SegmentGroup::default());
        p.return_count_only = true;
        assert_eq!(
            compile(&p).unwrap(),
            "SELECT count(*) as total FROM subscribers s WHERE s.store_id = 's1'"
        );
    }

    #[test]
    fn test_strict_fields() {
        let strict = SegmentCompiler::new(CompilerConfig {
            strict_fields: true,
            ..Default::default()
        });
        let mut p = payload("s1");
        p.base_conditions = Some(SegmentGroup::all(vec![SegmentCondition::new(
            "loyalty_points",
            Operator::GreaterThan,
            10,
        )]));
        match strict.compile(&p) {
            Err(SegmentError::UnknownField { table, field }) => {
                assert_eq!(table, "subscribers");
                assert_eq!(field, "loyalty_points");
            }
            other => panic!("expected UnknownField, got {other:?}"),
        }
        assert!(compile(&p).is_ok());

        p.base_conditions = None;
        p.event_filters = vec![EventFilter::on("pixel_events").matching(SegmentCondition::new(
            "event_type",
            Operator::Equals,
            "purchase",
        ))];
        assert!(strict.compile(&p).is_ok());
    }
}
