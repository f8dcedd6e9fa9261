//! Scan nodes and the translation steps they drive.
//!
//! Every way of accessing a table is a variant of [`ScanNode`]. The scheduler
//! and serializer only go through [`ScanNodeOps`].
//!
//! A scan node moves through `Constructed -> Finalized` exactly once. Only a
//! finalized node may be serialized or asked for scan ranges, any number of
//! times.

pub mod mysql_scan;
pub mod olap_scan;
pub mod payload;
pub mod projection;
pub mod pushdown;
pub mod scan_range;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use self::mysql_scan::MysqlScanNode;
use self::olap_scan::OlapScanNode;
use self::payload::PlanNodePayload;
use self::scan_range::ScanRangeLocations;
use crate::config::ScanPlanConfig;
use crate::descriptor::TupleDescriptor;
use crate::errors::Result;
use crate::explain::{ExplainConfig, ExplainEntry, Explainable};
use crate::expr::Expr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlanNodeId(pub i32);

impl PlanNodeId {
    pub const fn new(id: i32) -> Self {
        PlanNodeId(id)
    }
}

impl fmt::Display for PlanNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything available to a scan node while finalizing.
#[derive(Debug, Clone, Copy)]
pub struct FinalizeContext<'a> {
    pub config: &'a ScanPlanConfig,
}

impl<'a> FinalizeContext<'a> {
    pub fn new(config: &'a ScanPlanConfig) -> Self {
        FinalizeContext { config }
    }
}

/// State shared by all scan node variants.
#[derive(Debug, Clone)]
pub struct ScanNodeBase {
    pub id: PlanNodeId,
    /// Human readable label, e.g. "SCAN MYSQL".
    pub label: &'static str,
    pub desc: Arc<TupleDescriptor>,
    /// Conjuncts assigned by the planner before finalizing.
    pub conjuncts: Vec<Expr>,
}

impl ScanNodeBase {
    pub fn new(id: PlanNodeId, label: &'static str, desc: Arc<TupleDescriptor>) -> Self {
        ScanNodeBase {
            id,
            label,
            desc,
            conjuncts: Vec::new(),
        }
    }

    /// Explain entry holding the identity of the node. Variants add their own
    /// state.
    pub fn explain_entry(&self, name: &str, conf: ExplainConfig) -> ExplainEntry {
        let mut ent = ExplainEntry::new(name)
            .with_value("id", self.id)
            .with_value("label", self.label)
            .with_value("tuple_id", self.desc.id);

        if conf.verbose {
            ent = ent.with_values("conjuncts", &self.conjuncts);
        }

        ent
    }
}

/// Operations every scan node variant implements.
pub trait ScanNodeOps {
    fn id(&self) -> PlanNodeId;

    fn label(&self) -> &'static str;

    fn tuple_descriptor(&self) -> &Arc<TupleDescriptor>;

    fn conjuncts(&self) -> &[Expr];

    /// Set the conjuncts this scan should evaluate.
    ///
    /// Must happen before finalizing.
    fn set_conjuncts(&mut self, conjuncts: Vec<Expr>);

    fn is_finalized(&self) -> bool;

    /// Human readable dump of the node, including variant specific state.
    fn debug_representation(&self) -> String;

    /// Resolve everything needed to serialize the node.
    ///
    /// Errors if the node has already been finalized.
    fn finalize(&mut self, ctx: &FinalizeContext) -> Result<()>;

    /// Produce the payload for the serialization layer.
    ///
    /// Errors if the node hasn't been finalized.
    fn serialize(&self) -> Result<PlanNodePayload>;

    /// Physical locations of the data this node scans.
    ///
    /// `Ok(None)` means there's no statically known location for the data,
    /// and the executor resolves it at execution time.
    ///
    /// Errors if the node hasn't been finalized.
    fn scan_range_locations(
        &self,
        max_scan_range_length: u64,
    ) -> Result<Option<Vec<ScanRangeLocations>>>;

    /// Number of parallel instances the scheduler should use for this scan.
    fn instance_count(&self) -> u32;
}

/// All table access strategies.
#[derive(Debug)]
pub enum ScanNode {
    Mysql(MysqlScanNode),
    Olap(OlapScanNode),
}

impl From<MysqlScanNode> for ScanNode {
    fn from(node: MysqlScanNode) -> Self {
        ScanNode::Mysql(node)
    }
}

impl From<OlapScanNode> for ScanNode {
    fn from(node: OlapScanNode) -> Self {
        ScanNode::Olap(node)
    }
}

macro_rules! dispatch {
    ($self:expr, $node:ident => $body:expr) => {
        match $self {
            ScanNode::Mysql($node) => $body,
            ScanNode::Olap($node) => $body,
        }
    };
}

impl ScanNodeOps for ScanNode {
    fn id(&self) -> PlanNodeId {
        dispatch!(self, n => n.id())
    }

    fn label(&self) -> &'static str {
        dispatch!(self, n => n.label())
    }

    fn tuple_descriptor(&self) -> &Arc<TupleDescriptor> {
        dispatch!(self, n => n.tuple_descriptor())
    }

    fn conjuncts(&self) -> &[Expr] {
        dispatch!(self, n => n.conjuncts())
    }

    fn set_conjuncts(&mut self, conjuncts: Vec<Expr>) {
        dispatch!(self, n => n.set_conjuncts(conjuncts))
    }

    fn is_finalized(&self) -> bool {
        dispatch!(self, n => n.is_finalized())
    }

    fn debug_representation(&self) -> String {
        dispatch!(self, n => n.debug_representation())
    }

    fn finalize(&mut self, ctx: &FinalizeContext) -> Result<()> {
        dispatch!(self, n => n.finalize(ctx))
    }

    fn serialize(&self) -> Result<PlanNodePayload> {
        dispatch!(self, n => n.serialize())
    }

    fn scan_range_locations(
        &self,
        max_scan_range_length: u64,
    ) -> Result<Option<Vec<ScanRangeLocations>>> {
        dispatch!(self, n => n.scan_range_locations(max_scan_range_length))
    }

    fn instance_count(&self) -> u32 {
        dispatch!(self, n => n.instance_count())
    }
}

impl Explainable for ScanNode {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        dispatch!(self, n => n.explain_entry(conf))
    }
}
