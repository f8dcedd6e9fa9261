//! Planning of table scans, including pushing predicates down to external
//! MySQL tables.

pub mod config;
pub mod descriptor;
pub mod dialect;
pub mod errors;
pub mod explain;
pub mod expr;
pub mod planner;
