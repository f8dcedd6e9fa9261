pub mod errors;
pub mod request;

use std::io::Write;
use std::path::Path;

use scanplan::config::ScanPlanConfig;
use scanplan::explain::{ExplainConfig, Explainable};
use scanplan::planner::payload::PlanNodePayload;
use scanplan::planner::scan_range::ScanRangeLocations;
use scanplan::planner::{FinalizeContext, ScanNode, ScanNodeOps};
use serde::Serialize;
use tracing::{debug, info};

use crate::errors::{CliError, Result};
use crate::request::ScanRequest;

/// Everything produced by planning a single scan.
#[derive(Debug, Clone, Serialize)]
pub struct PlanOutput {
    pub explain: String,
    /// Query sent to the remote database, for scans of external tables.
    pub query: Option<String>,
    pub instance_count: u32,
    pub payload: PlanNodePayload,
    pub scan_ranges: Option<Vec<ScanRangeLocations>>,
}

/// Load the config, optionally from a JSON file, and apply `name=value`
/// overrides on top.
pub fn load_config(path: Option<&Path>, overrides: &[String]) -> Result<ScanPlanConfig> {
    let mut config = match path {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            let file = std::fs::File::open(path)?;
            serde_json::from_reader(std::io::BufReader::new(file))?
        }
        None => ScanPlanConfig::default(),
    };

    for ov in overrides {
        let (name, value) = ov
            .split_once('=')
            .ok_or_else(|| CliError::InvalidOverride(ov.clone()))?;
        config.set_from_str(name.trim(), value.trim())?;
    }

    Ok(config)
}

pub fn read_request(path: &Path) -> Result<ScanRequest> {
    let file = std::fs::File::open(path)?;
    Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
}

/// Build, finalize and serialize the scan described by the request.
pub fn plan(request: &ScanRequest, config: &ScanPlanConfig) -> Result<PlanOutput> {
    let mut node = request.build_node()?;
    node.finalize(&FinalizeContext::new(config))?;
    info!(node = %node.id(), label = node.label(), "planned scan");

    let query = match &node {
        ScanNode::Mysql(mysql) => mysql.query_string(),
        ScanNode::Olap(_) => None,
    };

    Ok(PlanOutput {
        explain: node.explain_entry(ExplainConfig { verbose: true }).to_string(),
        query,
        instance_count: node.instance_count(),
        payload: node.serialize()?,
        scan_ranges: node.scan_range_locations(request.max_scan_range_length)?,
    })
}

/// Write a human readable report of the plan.
pub fn write_report(out: &mut impl Write, output: &PlanOutput) -> Result<()> {
    writeln!(out, "Explain: {}", output.explain)?;
    if let Some(query) = &output.query {
        writeln!(out, "Query: {query}")?;
    }
    writeln!(out, "Instances: {}", output.instance_count)?;
    writeln!(out, "Payload:")?;
    serde_json::to_writer_pretty(&mut *out, &output.payload)?;
    writeln!(out)?;
    match &output.scan_ranges {
        Some(ranges) => {
            writeln!(out, "Scan ranges:")?;
            serde_json::to_writer_pretty(&mut *out, ranges)?;
            writeln!(out)?;
        }
        None => writeln!(out, "Scan ranges: resolved at execution")?,
    }
    Ok(())
}
