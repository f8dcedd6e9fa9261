//! Full scan of a table in an external MySQL database.

use std::fmt::Write as _;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::payload::{MysqlScanPayload, PlanNodeKind, PlanNodePayload};
use super::projection::resolve_columns;
use super::pushdown::{TranslatedFilters, translate_filters};
use super::scan_range::ScanRangeLocations;
use super::{FinalizeContext, PlanNodeId, ScanNodeBase, ScanNodeOps};
use crate::descriptor::TupleDescriptor;
use crate::dialect::SqlDialect;
use crate::dialect::mysql::MysqlDialect;
use crate::errors::{PlanError, Result};
use crate::explain::{ExplainConfig, ExplainEntry, Explainable};
use crate::expr::Expr;

pub const MYSQL_SCAN_LABEL: &str = "SCAN MYSQL";

/// Catalog entry for a table living in MySQL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MysqlTable {
    pub database: String,
    /// Name of the table on the MySQL side.
    pub name: String,
}

impl MysqlTable {
    pub fn new(database: impl Into<String>, name: impl Into<String>) -> Self {
        MysqlTable {
            database: database.into(),
            name: name.into(),
        }
    }
}

/// Everything the scan resolved during finalize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMysqlScan {
    /// Quoted columns to select.
    pub columns: Vec<String>,
    /// Rendered filters, ANDed together.
    pub filters: Vec<String>,
    /// Conjuncts that couldn't be pushed down.
    pub skipped_filters: Vec<String>,
}

impl ResolvedMysqlScan {
    /// Build the query sent to MySQL for the given quoted table name.
    pub fn query_string(&self, table: &str) -> String {
        let mut query = format!("SELECT {} FROM {}", self.columns.join(", "), table);
        for (idx, filter) in self.filters.iter().enumerate() {
            let sep = if idx == 0 { " WHERE " } else { " AND " };
            // Writing to a string can't fail.
            let _ = write!(query, "{sep}({filter})");
        }
        query
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ScanState {
    Unresolved,
    Resolved(ResolvedMysqlScan),
}

#[derive(Debug)]
pub struct MysqlScanNode {
    base: ScanNodeBase,
    /// Quoted table name.
    table_name: String,
    state: ScanState,
}

impl MysqlScanNode {
    pub fn new(id: PlanNodeId, desc: Arc<TupleDescriptor>, table: &MysqlTable) -> Self {
        MysqlScanNode {
            base: ScanNodeBase::new(id, MYSQL_SCAN_LABEL, desc),
            table_name: MysqlDialect.quote_identifier(&table.name),
            state: ScanState::Unresolved,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn add_conjunct(&mut self, conjunct: Expr) {
        self.base.conjuncts.push(conjunct);
    }

    /// Get the resolved columns and filters, if finalized.
    pub fn resolved(&self) -> Option<&ResolvedMysqlScan> {
        match &self.state {
            ScanState::Resolved(resolved) => Some(resolved),
            ScanState::Unresolved => None,
        }
    }

    /// Query sent to MySQL, if finalized.
    pub fn query_string(&self) -> Option<String> {
        self.resolved()
            .map(|resolved| resolved.query_string(&self.table_name))
    }
}

impl ScanNodeOps for MysqlScanNode {
    fn id(&self) -> PlanNodeId {
        self.base.id
    }

    fn label(&self) -> &'static str {
        self.base.label
    }

    fn tuple_descriptor(&self) -> &Arc<TupleDescriptor> {
        &self.base.desc
    }

    fn conjuncts(&self) -> &[Expr] {
        &self.base.conjuncts
    }

    fn set_conjuncts(&mut self, conjuncts: Vec<Expr>) {
        self.base.conjuncts = conjuncts;
    }

    fn is_finalized(&self) -> bool {
        matches!(self.state, ScanState::Resolved(_))
    }

    fn debug_representation(&self) -> String {
        self.explain_entry(ExplainConfig { verbose: true })
            .to_string()
    }

    fn finalize(&mut self, ctx: &FinalizeContext) -> Result<()> {
        if self.is_finalized() {
            return Err(PlanError::FinalizeCalledTwice { node: self.base.id });
        }

        let columns = resolve_columns(&MysqlDialect, &self.base.desc);

        let translated = if ctx.config.enable_predicate_pushdown {
            translate_filters(
                &MysqlDialect,
                &self.base.conjuncts,
                ctx.config.pushdown_error_policy,
            )?
        } else {
            TranslatedFilters {
                filters: Vec::new(),
                skipped: self.base.conjuncts.iter().map(|c| c.to_string()).collect(),
            }
        };

        debug!(
            node = %self.base.id,
            table = %self.table_name,
            ?columns,
            filters = ?translated.filters,
            skipped = translated.skipped.len(),
            "finalized mysql scan"
        );

        self.state = ScanState::Resolved(ResolvedMysqlScan {
            columns,
            filters: translated.filters,
            skipped_filters: translated.skipped,
        });

        Ok(())
    }

    fn serialize(&self) -> Result<PlanNodePayload> {
        let resolved = self
            .resolved()
            .ok_or(PlanError::SerializeBeforeFinalize { node: self.base.id })?;

        Ok(PlanNodePayload {
            node_id: self.base.id,
            label: self.base.label.to_string(),
            row_tuples: vec![self.base.desc.id],
            conjunct_count: self.base.conjuncts.len(),
            node: PlanNodeKind::MysqlScanNode(MysqlScanPayload {
                tuple_id: self.base.desc.id,
                table_name: self.table_name.clone(),
                columns: resolved.columns.clone(),
                filters: resolved.filters.clone(),
            }),
        })
    }

    fn scan_range_locations(
        &self,
        _max_scan_range_length: u64,
    ) -> Result<Option<Vec<ScanRangeLocations>>> {
        if !self.is_finalized() {
            return Err(PlanError::ScanRangeBeforeFinalize { node: self.base.id });
        }
        // The executor connects to MySQL itself.
        Ok(None)
    }

    fn instance_count(&self) -> u32 {
        1
    }
}

impl Explainable for MysqlScanNode {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        let ent = self
            .base
            .explain_entry("MysqlScan", conf)
            .with_value("table", &self.table_name);

        match &self.state {
            ScanState::Unresolved => ent,
            ScanState::Resolved(resolved) => {
                let mut ent = ent
                    .with_values("columns", &resolved.columns)
                    .with_values("filters", &resolved.filters)
                    .with_value("query", resolved.query_string(&self.table_name));
                if !resolved.skipped_filters.is_empty() {
                    ent = ent.with_values("skipped_filters", &resolved.skipped_filters);
                }
                ent
            }
        }
    }
}
