pub mod mysql;

use crate::errors::Result;
use crate::expr::Expr;

/// Text rendering for an external SQL engine.
pub trait SqlDialect: Sync + Send {
    /// Name of the dialect, used in error messages.
    fn name(&self) -> &'static str;

    /// Quote an identifier (column or table name).
    ///
    /// Names are wrapped as-is. Validating that a name doesn't contain the
    /// quote character happens in the catalog.
    fn quote_identifier(&self, ident: &str) -> String;

    /// Render an expression as a filter usable in a WHERE clause.
    ///
    /// Errors if the expression contains anything the dialect can't express.
    fn render_expr(&self, expr: &Expr) -> Result<String>;
}
