//! JSON description of a scan to plan.

use std::sync::Arc;

use scanplan::descriptor::{Column, DataType, TupleDescriptor, TupleId};
use scanplan::expr::operators::{ArithOperator, ComparisonOperator};
use scanplan::expr::scalar::ScalarValue;
use scanplan::expr::{Expr, ExprBuilder};
use scanplan::planner::mysql_scan::{MysqlScanNode, MysqlTable};
use scanplan::planner::olap_scan::{OlapScanNode, OlapTable};
use scanplan::planner::{PlanNodeId, ScanNode, ScanNodeOps};
use serde::Deserialize;

use crate::errors::{CliError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScanRequest {
    #[serde(default)]
    pub node_id: i32,
    #[serde(default)]
    pub tuple_id: i32,
    pub table: TableSpec,
    /// Alias the query uses for the table. Column references are qualified
    /// with it.
    #[serde(default)]
    pub alias: Option<String>,
    pub columns: Vec<ColumnSpec>,
    #[serde(default)]
    pub conjuncts: Vec<ExprSpec>,
    #[serde(default)]
    pub max_scan_range_length: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TableSpec {
    Mysql(MysqlTable),
    Olap {
        table: OlapTable,
        #[serde(default)]
        partitions: Option<Vec<i64>>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub datatype: DataType,
    #[serde(default = "default_materialized")]
    pub materialized: bool,
}

fn default_materialized() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "expr", rename_all = "snake_case")]
pub enum ExprSpec {
    Column {
        name: String,
    },
    Literal {
        value: ScalarValue,
    },
    Comparison {
        op: ComparisonOperator,
        left: Box<ExprSpec>,
        right: Box<ExprSpec>,
    },
    And {
        children: Vec<ExprSpec>,
    },
    Or {
        children: Vec<ExprSpec>,
    },
    Not {
        input: Box<ExprSpec>,
    },
    Arith {
        op: ArithOperator,
        left: Box<ExprSpec>,
        right: Box<ExprSpec>,
    },
    IsNull {
        input: Box<ExprSpec>,
        #[serde(default)]
        negated: bool,
    },
    InList {
        input: Box<ExprSpec>,
        list: Vec<ExprSpec>,
        #[serde(default)]
        negated: bool,
    },
    Between {
        input: Box<ExprSpec>,
        lower: Box<ExprSpec>,
        upper: Box<ExprSpec>,
        #[serde(default)]
        negated: bool,
    },
    Like {
        input: Box<ExprSpec>,
        pattern: Box<ExprSpec>,
        #[serde(default)]
        negated: bool,
    },
    Cast {
        input: Box<ExprSpec>,
        to: DataType,
    },
    Function {
        name: String,
        args: Vec<ExprSpec>,
    },
    Aggregate {
        name: String,
        args: Vec<ExprSpec>,
    },
}

impl ScanRequest {
    pub fn tuple_descriptor(&self) -> TupleDescriptor {
        self.columns
            .iter()
            .fold(TupleDescriptor::new(TupleId(self.tuple_id)), |desc, col| {
                desc.with_slot(Column::new(&col.name, col.datatype), col.materialized)
            })
    }

    /// Build the scan node with its conjuncts, ready to be finalized.
    pub fn build_node(&self) -> Result<ScanNode> {
        let desc = Arc::new(self.tuple_descriptor());

        let mut builder = ExprBuilder::new();
        let conjuncts = self
            .conjuncts
            .iter()
            .map(|spec| spec.build(&mut builder, &desc, self.alias.as_deref()))
            .collect::<Result<Vec<_>>>()?;

        let id = PlanNodeId::new(self.node_id);
        let mut node: ScanNode = match &self.table {
            TableSpec::Mysql(table) => MysqlScanNode::new(id, desc, table).into(),
            TableSpec::Olap { table, partitions } => {
                let mut node = OlapScanNode::new(id, desc, Arc::new(table.clone()));
                if let Some(partitions) = partitions {
                    node.select_partitions(partitions.clone());
                }
                node.into()
            }
        };
        node.set_conjuncts(conjuncts);

        Ok(node)
    }
}

impl ExprSpec {
    pub fn build(
        &self,
        b: &mut ExprBuilder,
        desc: &TupleDescriptor,
        alias: Option<&str>,
    ) -> Result<Expr> {
        Ok(match self {
            Self::Column { name } => {
                let slot = desc
                    .slots
                    .iter()
                    .find(|slot| &slot.column.name == name)
                    .ok_or_else(|| CliError::UnknownColumn(name.clone()))?;
                b.slot_ref(slot, alias)
            }
            Self::Literal { value } => b.lit(value.clone()),
            Self::Comparison { op, left, right } => {
                let left = left.build(b, desc, alias)?;
                let right = right.build(b, desc, alias)?;
                b.cmp(*op, left, right)
            }
            Self::And { children } => {
                let children = build_all(children, b, desc, alias)?;
                b.and(children)
            }
            Self::Or { children } => {
                let children = build_all(children, b, desc, alias)?;
                b.or(children)
            }
            Self::Not { input } => {
                let input = input.build(b, desc, alias)?;
                b.not(input)
            }
            Self::Arith { op, left, right } => {
                let left = left.build(b, desc, alias)?;
                let right = right.build(b, desc, alias)?;
                b.arith(*op, left, right)
            }
            Self::IsNull { input, negated } => {
                let input = input.build(b, desc, alias)?;
                b.is_null(input, *negated)
            }
            Self::InList {
                input,
                list,
                negated,
            } => {
                let input = input.build(b, desc, alias)?;
                let list = build_all(list, b, desc, alias)?;
                b.in_list(input, list, *negated)
            }
            Self::Between {
                input,
                lower,
                upper,
                negated,
            } => {
                let input = input.build(b, desc, alias)?;
                let lower = lower.build(b, desc, alias)?;
                let upper = upper.build(b, desc, alias)?;
                b.between(input, lower, upper, *negated)
            }
            Self::Like {
                input,
                pattern,
                negated,
            } => {
                let input = input.build(b, desc, alias)?;
                let pattern = pattern.build(b, desc, alias)?;
                b.like(input, pattern, *negated)
            }
            Self::Cast { input, to } => {
                let input = input.build(b, desc, alias)?;
                b.cast(input, *to)
            }
            Self::Function { name, args } => {
                let args = build_all(args, b, desc, alias)?;
                b.function(name, args)
            }
            Self::Aggregate { name, args } => {
                let args = build_all(args, b, desc, alias)?;
                b.aggregate(name, args)
            }
        })
    }
}

fn build_all(
    specs: &[ExprSpec],
    b: &mut ExprBuilder,
    desc: &TupleDescriptor,
    alias: Option<&str>,
) -> Result<Vec<Expr>> {
    specs.iter().map(|spec| spec.build(b, desc, alias)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_build_expr() {
        let json = r#"{
            "expr": "comparison",
            "op": "gt_eq",
            "left": {"expr": "column", "name": "id"},
            "right": {"expr": "literal", "value": {"int64": 10}}
        }"#;
        let spec: ExprSpec = serde_json::from_str(json).unwrap();

        let desc = TupleDescriptor::new(TupleId(0)).with_slot(Column::new("id", DataType::Int64), true);
        let expr = spec.build(&mut ExprBuilder::new(), &desc, Some("t")).unwrap();
        assert_eq!("t.id >= 10", expr.to_string());
    }

    #[test]
    fn unknown_column() {
        let spec = ExprSpec::Column {
            name: "missing".to_string(),
        };
        let desc = TupleDescriptor::new(TupleId(0));
        let err = spec.build(&mut ExprBuilder::new(), &desc, None).unwrap_err();
        assert!(matches!(err, CliError::UnknownColumn(name) if name == "missing"));
    }

    #[test]
    fn columns_default_to_materialized() {
        let json = r#"{
            "table": {"kind": "mysql", "database": "db", "name": "t"},
            "columns": [
                {"name": "a", "datatype": "int64"},
                {"name": "b", "datatype": "utf8", "materialized": false}
            ]
        }"#;
        let req: ScanRequest = serde_json::from_str(json).unwrap();
        let desc = req.tuple_descriptor();
        assert_eq!(2, desc.slots.len());
        assert!(desc.slots[0].materialized);
        assert!(!desc.slots[1].materialized);
    }
}
