//! Scan of a table stored locally, split into partitions of tablets.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::payload::{OlapScanPayload, PlanNodeKind, PlanNodePayload};
use super::scan_range::{
    NetworkAddress,
    ScanRange,
    ScanRangeLocation,
    ScanRangeLocations,
    TabletScanRange,
};
use super::{FinalizeContext, PlanNodeId, ScanNodeBase, ScanNodeOps};
use crate::descriptor::TupleDescriptor;
use crate::errors::{PlanError, Result};
use crate::explain::{ExplainConfig, ExplainEntry, Explainable};
use crate::expr::Expr;

pub const OLAP_SCAN_LABEL: &str = "SCAN OLAP";

/// Copy of a tablet on a single backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replica {
    pub backend_id: i64,
    pub host: String,
    pub port: u16,
}

impl Replica {
    fn location(&self) -> ScanRangeLocation {
        ScanRangeLocation {
            backend_id: self.backend_id,
            server: NetworkAddress {
                hostname: self.host.clone(),
                port: self.port,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tablet {
    pub id: i64,
    /// Size of the tablet's data in bytes.
    pub data_size: u64,
    pub replicas: Vec<Replica>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub id: i64,
    pub name: String,
    /// Version readers should see.
    pub visible_version: i64,
    pub tablets: Vec<Tablet>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OlapTable {
    pub name: String,
    pub key_columns: Vec<String>,
    pub partitions: Vec<Partition>,
}

impl OlapTable {
    pub fn get_partition(&self, id: i64) -> Option<&Partition> {
        self.partitions.iter().find(|p| p.id == id)
    }
}

/// A tablet picked for scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedTablet {
    pub partition_id: i64,
    pub version: i64,
    pub tablet: Tablet,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOlapScan {
    pub partition_ids: Vec<i64>,
    pub tablets: Vec<SelectedTablet>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ScanState {
    Unresolved,
    Resolved(ResolvedOlapScan),
}

#[derive(Debug)]
pub struct OlapScanNode {
    base: ScanNodeBase,
    table: Arc<OlapTable>,
    /// Partitions chosen by the planner. Scans all partitions if not set.
    partition_filter: Option<Vec<i64>>,
    state: ScanState,
}

impl OlapScanNode {
    pub fn new(id: PlanNodeId, desc: Arc<TupleDescriptor>, table: Arc<OlapTable>) -> Self {
        OlapScanNode {
            base: ScanNodeBase::new(id, OLAP_SCAN_LABEL, desc),
            table,
            partition_filter: None,
            state: ScanState::Unresolved,
        }
    }

    /// Restrict the scan to the given partitions.
    pub fn select_partitions(&mut self, partition_ids: Vec<i64>) {
        self.partition_filter = Some(partition_ids);
    }

    pub fn table(&self) -> &OlapTable {
        &self.table
    }

    pub fn resolved(&self) -> Option<&ResolvedOlapScan> {
        match &self.state {
            ScanState::Resolved(resolved) => Some(resolved),
            ScanState::Unresolved => None,
        }
    }

    fn selected_partitions(&self) -> Vec<&Partition> {
        match &self.partition_filter {
            None => self.table.partitions.iter().collect(),
            Some(ids) => ids
                .iter()
                .filter_map(|&id| {
                    let partition = self.table.get_partition(id);
                    if partition.is_none() {
                        warn!(table = %self.table.name, partition_id = id, "ignoring unknown partition");
                    }
                    partition
                })
                .collect(),
        }
    }
}

/// Split `size` bytes into ranges of at most `max_len` bytes.
///
/// A `max_len` of zero produces a single range. An empty tablet still gets a
/// single empty range.
fn split_ranges(size: u64, max_len: u64) -> Vec<(u64, u64)> {
    if max_len == 0 || size <= max_len {
        return vec![(0, size)];
    }

    let mut ranges = Vec::with_capacity(size.div_ceil(max_len) as usize);
    let mut offset = 0;
    while offset < size {
        let len = max_len.min(size - offset);
        ranges.push((offset, len));
        offset += len;
    }
    ranges
}

impl ScanNodeOps for OlapScanNode {
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

    fn finalize(&mut self, _ctx: &FinalizeContext) -> Result<()> {
        if self.is_finalized() {
            return Err(PlanError::FinalizeCalledTwice { node: self.base.id });
        }

        let partitions = self.selected_partitions();
        let partition_ids: Vec<_> = partitions.iter().map(|p| p.id).collect();
        let tablets: Vec<_> = partitions
            .iter()
            .flat_map(|partition| {
                partition.tablets.iter().map(|tablet| SelectedTablet {
                    partition_id: partition.id,
                    version: partition.visible_version,
                    tablet: tablet.clone(),
                })
            })
            .collect();

        debug!(
            node = %self.base.id,
            table = %self.table.name,
            ?partition_ids,
            num_tablets = tablets.len(),
            "finalized olap scan"
        );

        self.state = ScanState::Resolved(ResolvedOlapScan {
            partition_ids,
            tablets,
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
            node: PlanNodeKind::OlapScanNode(OlapScanPayload {
                tuple_id: self.base.desc.id,
                table_name: self.table.name.clone(),
                key_columns: self.table.key_columns.clone(),
                partition_ids: resolved.partition_ids.clone(),
            }),
        })
    }

    fn scan_range_locations(
        &self,
        max_scan_range_length: u64,
    ) -> Result<Option<Vec<ScanRangeLocations>>> {
        let resolved = self
            .resolved()
            .ok_or(PlanError::ScanRangeBeforeFinalize { node: self.base.id })?;

        let mut out = Vec::new();
        for selected in &resolved.tablets {
            let locations: Vec<_> = selected.tablet.replicas.iter().map(Replica::location).collect();
            for (offset, length) in split_ranges(selected.tablet.data_size, max_scan_range_length) {
                out.push(ScanRangeLocations {
                    scan_range: ScanRange::Tablet(TabletScanRange {
                        tablet_id: selected.tablet.id,
                        partition_id: selected.partition_id,
                        version: selected.version,
                        offset,
                        length,
                    }),
                    locations: locations.clone(),
                });
            }
        }

        Ok(Some(out))
    }

    fn instance_count(&self) -> u32 {
        match self.resolved() {
            Some(resolved) => u32::try_from(resolved.tablets.len())
                .unwrap_or(u32::MAX)
                .max(1),
            None => 1,
        }
    }
}

impl Explainable for OlapScanNode {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        let ent = self
            .base
            .explain_entry("OlapScan", conf)
            .with_value("table", &self.table.name);

        match &self.state {
            ScanState::Unresolved => ent,
            ScanState::Resolved(resolved) => ent
                .with_values("partitions", &resolved.partition_ids)
                .with_value("tablets", resolved.tablets.len()),
        }
    }
}
