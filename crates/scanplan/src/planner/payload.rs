//! Plan node payloads handed to the serialization layer.
//!
//! The payloads only describe what a node contains. Encoding them for the
//! wire is the serializer's job.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::PlanNodeId;
use crate::descriptor::TupleId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanNodeType {
    MysqlScanNode,
    OlapScanNode,
}

impl fmt::Display for PlanNodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MysqlScanNode => write!(f, "MYSQL_SCAN_NODE"),
            Self::OlapScanNode => write!(f, "OLAP_SCAN_NODE"),
        }
    }
}

/// A serialized plan node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanNodePayload {
    pub node_id: PlanNodeId,
    pub label: String,
    /// Tuples produced by this node.
    pub row_tuples: Vec<TupleId>,
    /// Number of conjuncts assigned to the node.
    pub conjunct_count: usize,
    pub node: PlanNodeKind,
}

impl PlanNodePayload {
    pub fn node_type(&self) -> PlanNodeType {
        self.node.node_type()
    }
}

/// Variant specific part of the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "node_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanNodeKind {
    MysqlScanNode(MysqlScanPayload),
    OlapScanNode(OlapScanPayload),
}

impl PlanNodeKind {
    pub fn node_type(&self) -> PlanNodeType {
        match self {
            Self::MysqlScanNode(_) => PlanNodeType::MysqlScanNode,
            Self::OlapScanNode(_) => PlanNodeType::OlapScanNode,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MysqlScanPayload {
    pub tuple_id: TupleId,
    /// Quoted table name.
    pub table_name: String,
    /// Quoted column names to select.
    pub columns: Vec<String>,
    /// Filters to put in the WHERE clause, ANDed together.
    pub filters: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OlapScanPayload {
    pub tuple_id: TupleId,
    pub table_name: String,
    pub key_columns: Vec<String>,
    pub partition_ids: Vec<i64>,
}
