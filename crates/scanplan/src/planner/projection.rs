use crate::descriptor::TupleDescriptor;
use crate::dialect::SqlDialect;

/// Projection used when no columns are materialized.
pub const SELECT_ALL: &str = "*";

/// Resolve the quoted names of the columns a scan needs to fetch.
///
/// Only materialized slots are fetched. If nothing is materialized (e.g. the
/// query is `SELECT count(*) FROM t`), `*` is returned instead since an empty
/// select list isn't valid SQL. The aggregate doesn't care which columns come
/// back.
pub fn resolve_columns(dialect: &dyn SqlDialect, desc: &TupleDescriptor) -> Vec<String> {
    let mut columns: Vec<_> = desc
        .materialized_slots()
        .map(|slot| dialect.quote_identifier(&slot.column.name))
        .collect();

    if columns.is_empty() {
        columns.push(SELECT_ALL.to_string());
    }

    columns
}
