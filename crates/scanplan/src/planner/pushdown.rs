use tracing::{trace, warn};

use crate::config::PushdownErrorPolicy;
use crate::dialect::SqlDialect;
use crate::errors::{PlanError, Result};
use crate::expr::substitute::{ExprSubstitutionMap, substitute_list};
use crate::expr::{Expr, ExprKind, collect_slot_refs};

/// Filters rendered for an external source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslatedFilters {
    /// Rendered filters, in conjunct order.
    pub filters: Vec<String>,
    /// Descriptions of conjuncts that couldn't be rendered and were left out.
    ///
    /// Only populated with `PushdownErrorPolicy::SkipFilter`.
    pub skipped: Vec<String>,
}

/// Translate conjuncts into filters in the dialect of an external source.
///
/// Column references in the conjuncts are qualified with the table alias
/// used in the query. The pushed down filter runs against a single table in
/// the external source, so qualifiers are stripped before rendering. The
/// provided conjuncts are never modified.
pub fn translate_filters(
    dialect: &dyn SqlDialect,
    conjuncts: &[Expr],
    policy: PushdownErrorPolicy,
) -> Result<TranslatedFilters> {
    if conjuncts.is_empty() {
        return Ok(TranslatedFilters::default());
    }

    let mut map = ExprSubstitutionMap::new();
    for slot_expr in collect_slot_refs(conjuncts) {
        if let Some(slot) = slot_expr.as_slot_ref() {
            let unqualified = Expr::new(slot_expr.id(), ExprKind::SlotRef(slot.unqualified()));
            map.put(slot_expr, unqualified);
        }
    }
    trace!(num_slot_refs = map.len(), "built qualifier substitution map");

    let translated = substitute_list(conjuncts, &map);

    let mut out = TranslatedFilters::default();
    for (original, conjunct) in conjuncts.iter().zip(&translated) {
        match dialect.render_expr(conjunct) {
            Ok(filter) => out.filters.push(filter),
            Err(PlanError::UnsupportedPredicateShape {
                dialect: name,
                reason,
                ..
            }) => {
                if policy == PushdownErrorPolicy::Fail {
                    // Report the conjunct as the analyzer wrote it.
                    return Err(PlanError::UnsupportedPredicateShape {
                        dialect: name,
                        expr: original.to_string(),
                        reason,
                    });
                }
                warn!(dialect = name, %original, %reason, "skipping filter pushdown");
                out.skipped.push(original.to_string());
            }
            Err(e) => return Err(e),
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Column, DataType, TupleDescriptor, TupleId};
    use crate::dialect::mysql::MysqlDialect;
    use crate::expr::ExprBuilder;
    use crate::expr::operators::ComparisonOperator;

    fn test_desc() -> TupleDescriptor {
        TupleDescriptor::new(TupleId(0))
            .with_slot(Column::new("id", DataType::Int32), true)
            .with_slot(Column::new("name", DataType::Utf8), true)
    }

    #[test]
    fn empty_conjuncts() {
        for policy in [PushdownErrorPolicy::Fail, PushdownErrorPolicy::SkipFilter] {
            let out = translate_filters(&MysqlDialect, &[], policy).unwrap();
            assert!(out.filters.is_empty());
            assert!(out.skipped.is_empty());
        }
    }

    #[test]
    fn strips_qualifier() {
        let desc = test_desc();
        let mut b = ExprBuilder::new();
        let col = b.slot_ref(&desc.slots[0], Some("t"));
        let five = b.lit(5);
        let conjuncts = vec![b.eq(col, five)];

        let out = translate_filters(&MysqlDialect, &conjuncts, PushdownErrorPolicy::Fail).unwrap();
        assert_eq!(vec!["`id` = 5"], out.filters);
        assert!(!out.filters[0].contains("`t`"));
    }

    #[test]
    fn strips_nested_qualifiers() {
        let desc = test_desc();
        let mut b = ExprBuilder::new();

        let id = b.slot_ref(&desc.slots[0], Some("t"));
        let list = vec![b.lit(1), b.lit(2)];
        let in_list = b.in_list(id, list, false);
        let name = b.slot_ref(&desc.slots[1], Some("t"));
        let upper = b.function("upper", vec![name]);
        let lit = b.lit("A");
        let eq = b.eq(upper, lit);
        let or = b.or(vec![in_list, eq]);
        let name = b.slot_ref(&desc.slots[1], Some("t"));
        let not_null = b.is_null(name, true);

        let conjuncts = vec![or, not_null];
        let out = translate_filters(&MysqlDialect, &conjuncts, PushdownErrorPolicy::Fail).unwrap();

        assert_eq!(
            vec![
                "`id` IN (1, 2) OR UPPER(`name`) = 'A'",
                "`name` IS NOT NULL"
            ],
            out.filters
        );
    }

    #[test]
    fn nested_predicate_operands() {
        let desc = test_desc();
        let mut b = ExprBuilder::new();

        let id = b.slot_ref(&desc.slots[0], Some("t"));
        let not = b.not(id);
        let is_null = b.is_null(not, false);
        let name = b.slot_ref(&desc.slots[1], Some("t"));
        let pattern = b.lit("a%");
        let like = b.like(name, pattern, false);
        let t = b.lit(true);
        let eq = b.eq(like, t);

        let conjuncts = vec![is_null, eq];
        let out = translate_filters(&MysqlDialect, &conjuncts, PushdownErrorPolicy::Fail).unwrap();

        assert_eq!(
            vec!["(NOT (`id`)) IS NULL", "(`name` LIKE 'a%') = TRUE"],
            out.filters
        );
    }

    #[test]
    fn conjuncts_not_modified() {
        let desc = test_desc();
        let mut b = ExprBuilder::new();
        let col = b.slot_ref(&desc.slots[1], Some("t"));
        let lit = b.lit("a");
        let conjuncts = vec![b.cmp(ComparisonOperator::NotEq, col, lit)];
        let before = conjuncts.clone();

        translate_filters(&MysqlDialect, &conjuncts, PushdownErrorPolicy::Fail).unwrap();

        assert_eq!(before, conjuncts);
        assert_eq!("t.name != 'a'", conjuncts[0].to_string());
    }

    #[test]
    fn unsupported_fails_by_default() {
        let desc = test_desc();
        let mut b = ExprBuilder::new();
        let col = b.slot_ref(&desc.slots[0], Some("t"));
        let five = b.lit(5);
        let ok = b.eq(col, five);
        let col = b.slot_ref(&desc.slots[0], Some("t"));
        let sum = b.aggregate("sum", vec![col]);
        let one = b.lit(1);
        let bad = b.cmp(ComparisonOperator::Gt, sum, one);

        let err = translate_filters(&MysqlDialect, &[ok, bad], PushdownErrorPolicy::Fail)
            .unwrap_err();
        match err {
            PlanError::UnsupportedPredicateShape { expr, reason, .. } => {
                assert_eq!("sum(t.id) > 1", expr);
                assert_eq!("aggregate function 'sum'", reason);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unsupported_skipped_with_policy() {
        logutil::init_test();

        let desc = test_desc();
        let mut b = ExprBuilder::new();
        let col = b.slot_ref(&desc.slots[0], Some("t"));
        let udf = b.function("my_udf", vec![col]);
        let one = b.lit(1);
        let bad = b.eq(udf, one);
        let col = b.slot_ref(&desc.slots[0], Some("t"));
        let five = b.lit(5);
        let ok = b.cmp(ComparisonOperator::Lt, col, five);

        let out = translate_filters(&MysqlDialect, &[bad, ok], PushdownErrorPolicy::SkipFilter)
            .unwrap();
        assert_eq!(vec!["`id` < 5"], out.filters);
        assert_eq!(vec!["my_udf(t.id) = 1"], out.skipped);
    }
}
