use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkAddress {
    pub hostname: String,
    pub port: u16,
}

impl fmt::Display for NetworkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.hostname, self.port)
    }
}

/// A candidate location for executing a scan range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRangeLocation {
    pub backend_id: i64,
    pub server: NetworkAddress,
}

/// Byte range within a single tablet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabletScanRange {
    pub tablet_id: i64,
    pub partition_id: i64,
    pub version: i64,
    pub offset: u64,
    pub length: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanRange {
    Tablet(TabletScanRange),
}

/// Assignment of a scan range to the locations able to execute it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRangeLocations {
    pub scan_range: ScanRange,
    pub locations: Vec<ScanRangeLocation>,
}
