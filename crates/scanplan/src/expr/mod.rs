//! Predicate expression trees.
//!
//! Every node carries an [`ExprId`] assigned when it's built. Ids give a node
//! an identity that's independent of its structure: two nodes may be equal
//! (`==` compares structure only) while still being different nodes. The
//! substitution map is keyed on ids, not on structure.

pub mod operators;
pub mod scalar;
pub mod substitute;

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use self::operators::{ArithOperator, ComparisonOperator, ConjunctionOperator};
use self::scalar::ScalarValue;
use crate::descriptor::{DataType, SlotDescriptor, SlotId};

/// Identity of a single node in an expression tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExprId(pub u64);

impl fmt::Display for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Generates unique expression ids.
///
/// Ids are only unique with respect to a single generator. All expressions
/// for a query should be built from the same generator.
#[derive(Debug, Default)]
pub struct ExprIdGen {
    next: u64,
}

impl ExprIdGen {
    pub fn next_id(&mut self) -> ExprId {
        let id = ExprId(self.next);
        self.next += 1;
        id
    }
}

/// Reference to a column, optionally qualified by the table alias it came
/// from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotRef {
    pub slot_id: SlotId,
    /// Table alias qualifying this column, e.g. the `t` in `t.c`.
    pub table: Option<String>,
    pub column: String,
}

impl SlotRef {
    /// Returns a copy of this slot ref with the table qualifier removed.
    pub fn unqualified(&self) -> Self {
        SlotRef {
            slot_id: self.slot_id,
            table: None,
            column: self.column.clone(),
        }
    }
}

impl fmt::Display for SlotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(table) => write!(f, "{table}.{}", self.column),
            None => write!(f, "{}", self.column),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    SlotRef(SlotRef),
    Literal(ScalarValue),
    Comparison {
        op: ComparisonOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// AND/OR over two or more children. Use `ExprBuilder::conjunction` to
    /// keep that guaranteed.
    Conjunction {
        op: ConjunctionOperator,
        children: Vec<Expr>,
    },
    Not(Box<Expr>),
    Arith {
        op: ArithOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    IsNull {
        negated: bool,
        input: Box<Expr>,
    },
    InList {
        negated: bool,
        input: Box<Expr>,
        list: Vec<Expr>,
    },
    /// <input> [NOT] BETWEEN <lower> AND <upper>
    Between {
        negated: bool,
        input: Box<Expr>,
        lower: Box<Expr>,
        upper: Box<Expr>,
    },
    Like {
        negated: bool,
        input: Box<Expr>,
        pattern: Box<Expr>,
    },
    Cast {
        input: Box<Expr>,
        to: DataType,
    },
    ScalarFunction {
        name: String,
        args: Vec<Expr>,
    },
    Aggregate {
        name: String,
        args: Vec<Expr>,
    },
}

/// A node in an expression tree.
///
/// Cloning is deep, a clone never shares children with the original.
#[derive(Debug, Clone)]
pub struct Expr {
    id: ExprId,
    pub kind: ExprKind,
}

/// Structural equality, ids are not compared.
impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Expr {
    pub fn new(id: ExprId, kind: ExprKind) -> Self {
        Expr { id, kind }
    }

    pub fn id(&self) -> ExprId {
        self.id
    }

    pub fn is_slot_ref(&self) -> bool {
        matches!(self.kind, ExprKind::SlotRef(_))
    }

    pub fn as_slot_ref(&self) -> Option<&SlotRef> {
        match &self.kind {
            ExprKind::SlotRef(slot) => Some(slot),
            _ => None,
        }
    }

    /// If this expression renders as a single unit that never needs parens
    /// when used as an operand.
    pub fn is_atomic(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::SlotRef(_)
                | ExprKind::Literal(_)
                | ExprKind::Cast { .. }
                | ExprKind::ScalarFunction { .. }
                | ExprKind::Aggregate { .. }
        )
    }

    /// Calls `func` on each direct child of this expression.
    pub fn for_each_child<'a, F>(&'a self, func: &mut F)
    where
        F: FnMut(&'a Expr),
    {
        match &self.kind {
            ExprKind::SlotRef(_) | ExprKind::Literal(_) => (),
            ExprKind::Comparison { left, right, .. } | ExprKind::Arith { left, right, .. } => {
                func(left);
                func(right);
            }
            ExprKind::Conjunction { children, .. } => children.iter().for_each(func),
            ExprKind::Not(input)
            | ExprKind::IsNull { input, .. }
            | ExprKind::Cast { input, .. } => func(input),
            ExprKind::InList { input, list, .. } => {
                func(input);
                list.iter().for_each(func);
            }
            ExprKind::Between {
                input,
                lower,
                upper,
                ..
            } => {
                func(input);
                func(lower);
                func(upper);
            }
            ExprKind::Like { input, pattern, .. } => {
                func(input);
                func(pattern);
            }
            ExprKind::ScalarFunction { args, .. } | ExprKind::Aggregate { args, .. } => {
                args.iter().for_each(func)
            }
        }
    }

    /// Calls `func` on each direct child of this expression, allowing the
    /// child to be modified in place.
    pub fn for_each_child_mut<F>(&mut self, func: &mut F)
    where
        F: FnMut(&mut Expr),
    {
        match &mut self.kind {
            ExprKind::SlotRef(_) | ExprKind::Literal(_) => (),
            ExprKind::Comparison { left, right, .. } | ExprKind::Arith { left, right, .. } => {
                func(left);
                func(right);
            }
            ExprKind::Conjunction { children, .. } => children.iter_mut().for_each(func),
            ExprKind::Not(input)
            | ExprKind::IsNull { input, .. }
            | ExprKind::Cast { input, .. } => func(input),
            ExprKind::InList { input, list, .. } => {
                func(input);
                list.iter_mut().for_each(func);
            }
            ExprKind::Between {
                input,
                lower,
                upper,
                ..
            } => {
                func(input);
                func(lower);
                func(upper);
            }
            ExprKind::Like { input, pattern, .. } => {
                func(input);
                func(pattern);
            }
            ExprKind::ScalarFunction { args, .. } | ExprKind::Aggregate { args, .. } => {
                args.iter_mut().for_each(func)
            }
        }
    }
}

/// Collects every slot ref appearing anywhere in `exprs`, including nested
/// inside operators.
///
/// Slot refs are deduplicated by identity and returned in pre-order.
pub fn collect_slot_refs(exprs: &[Expr]) -> Vec<&Expr> {
    fn inner<'a>(expr: &'a Expr, refs: &mut IndexMap<ExprId, &'a Expr>) {
        if expr.is_slot_ref() {
            refs.entry(expr.id).or_insert(expr);
        } else {
            expr.for_each_child(&mut |child| inner(child, refs));
        }
    }

    let mut refs = IndexMap::new();
    for expr in exprs {
        inner(expr, &mut refs);
    }

    refs.into_values().collect()
}

/// Writes an operand, wrapping it in parens unless it's atomic.
struct NestedDisplay<'a>(&'a Expr);

impl fmt::Display for NestedDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_atomic() {
            write!(f, "{}", self.0)
        } else {
            write!(f, "({})", self.0)
        }
    }
}

/// Writes a child of AND/OR, only wrapping nested conjunctions and arithmetic.
struct ConjunctDisplay<'a>(&'a Expr);

impl fmt::Display for ConjunctDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.kind {
            ExprKind::Conjunction { .. } | ExprKind::Arith { .. } => write!(f, "({})", self.0),
            _ => write!(f, "{}", self.0),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, exprs: &[Expr]) -> fmt::Result {
    for (idx, expr) in exprs.iter().enumerate() {
        if idx > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{expr}")?;
    }
    Ok(())
}

fn not_str(negated: bool) -> &'static str {
    if negated { "NOT " } else { "" }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::SlotRef(slot) => write!(f, "{slot}"),
            ExprKind::Literal(lit) => write!(f, "{lit}"),
            ExprKind::Comparison { op, left, right } => {
                write!(f, "{} {op} {}", NestedDisplay(left), NestedDisplay(right))
            }
            ExprKind::Conjunction { op, children } => {
                for (idx, child) in children.iter().enumerate() {
                    if idx > 0 {
                        write!(f, " {op} ")?;
                    }
                    write!(f, "{}", ConjunctDisplay(child))?;
                }
                Ok(())
            }
            ExprKind::Not(input) => write!(f, "NOT ({input})"),
            ExprKind::Arith { op, left, right } => {
                write!(f, "{} {op} {}", NestedDisplay(left), NestedDisplay(right))
            }
            ExprKind::IsNull { negated, input } => {
                write!(f, "{} IS {}NULL", NestedDisplay(input), not_str(*negated))
            }
            ExprKind::InList {
                negated,
                input,
                list,
            } => {
                write!(f, "{} {}IN (", NestedDisplay(input), not_str(*negated))?;
                write_list(f, list)?;
                write!(f, ")")
            }
            ExprKind::Between {
                negated,
                input,
                lower,
                upper,
            } => write!(
                f,
                "{} {}BETWEEN {} AND {}",
                NestedDisplay(input),
                not_str(*negated),
                NestedDisplay(lower),
                NestedDisplay(upper),
            ),
            ExprKind::Like {
                negated,
                input,
                pattern,
            } => write!(
                f,
                "{} {}LIKE {}",
                NestedDisplay(input),
                not_str(*negated),
                NestedDisplay(pattern)
            ),
            ExprKind::Cast { input, to } => write!(f, "CAST({input} AS {to})"),
            ExprKind::ScalarFunction { name, args } | ExprKind::Aggregate { name, args } => {
                write!(f, "{name}(")?;
                write_list(f, args)?;
                write!(f, ")")
            }
        }
    }
}

/// Helper for building expression trees with unique ids.
#[derive(Debug, Default)]
pub struct ExprBuilder {
    ids: ExprIdGen,
}

impl ExprBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn build(&mut self, kind: ExprKind) -> Expr {
        Expr::new(self.ids.next_id(), kind)
    }

    /// Column reference to a slot, qualified by `table` if provided.
    pub fn slot_ref(&mut self, slot: &SlotDescriptor, table: Option<&str>) -> Expr {
        self.column(slot.id, table, &slot.column.name)
    }

    pub fn column(&mut self, slot_id: SlotId, table: Option<&str>, column: &str) -> Expr {
        self.build(ExprKind::SlotRef(SlotRef {
            slot_id,
            table: table.map(|t| t.to_string()),
            column: column.to_string(),
        }))
    }

    pub fn lit(&mut self, value: impl Into<ScalarValue>) -> Expr {
        self.build(ExprKind::Literal(value.into()))
    }

    pub fn null(&mut self) -> Expr {
        self.build(ExprKind::Literal(ScalarValue::Null))
    }

    pub fn cmp(&mut self, op: ComparisonOperator, left: Expr, right: Expr) -> Expr {
        self.build(ExprKind::Comparison {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn eq(&mut self, left: Expr, right: Expr) -> Expr {
        self.cmp(ComparisonOperator::Eq, left, right)
    }

    /// AND/OR over `children`.
    ///
    /// Built conjunctions always have at least two children. A single child
    /// is returned as-is, and no children gives the identity of the operator
    /// (`TRUE` for AND, `FALSE` for OR).
    pub fn conjunction(&mut self, op: ConjunctionOperator, mut children: Vec<Expr>) -> Expr {
        match children.len() {
            0 => self.lit(op == ConjunctionOperator::And),
            1 => children.remove(0),
            _ => self.build(ExprKind::Conjunction { op, children }),
        }
    }

    pub fn and(&mut self, children: Vec<Expr>) -> Expr {
        self.conjunction(ConjunctionOperator::And, children)
    }

    pub fn or(&mut self, children: Vec<Expr>) -> Expr {
        self.conjunction(ConjunctionOperator::Or, children)
    }

    pub fn not(&mut self, input: Expr) -> Expr {
        self.build(ExprKind::Not(Box::new(input)))
    }

    pub fn arith(&mut self, op: ArithOperator, left: Expr, right: Expr) -> Expr {
        self.build(ExprKind::Arith {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn is_null(&mut self, input: Expr, negated: bool) -> Expr {
        self.build(ExprKind::IsNull {
            negated,
            input: Box::new(input),
        })
    }

    pub fn in_list(&mut self, input: Expr, list: Vec<Expr>, negated: bool) -> Expr {
        self.build(ExprKind::InList {
            negated,
            input: Box::new(input),
            list,
        })
    }

    pub fn between(&mut self, input: Expr, lower: Expr, upper: Expr, negated: bool) -> Expr {
        self.build(ExprKind::Between {
            negated,
            input: Box::new(input),
            lower: Box::new(lower),
            upper: Box::new(upper),
        })
    }

    pub fn like(&mut self, input: Expr, pattern: Expr, negated: bool) -> Expr {
        self.build(ExprKind::Like {
            negated,
            input: Box::new(input),
            pattern: Box::new(pattern),
        })
    }

    pub fn cast(&mut self, input: Expr, to: DataType) -> Expr {
        self.build(ExprKind::Cast {
            input: Box::new(input),
            to,
        })
    }

    pub fn function(&mut self, name: &str, args: Vec<Expr>) -> Expr {
        self.build(ExprKind::ScalarFunction {
            name: name.to_string(),
            args,
        })
    }

    pub fn aggregate(&mut self, name: &str, args: Vec<Expr>) -> Expr {
        self.build(ExprKind::Aggregate {
            name: name.to_string(),
            args,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Column, TupleDescriptor, TupleId};

    fn test_desc() -> TupleDescriptor {
        TupleDescriptor::new(TupleId(0))
            .with_slot(Column::new("id", DataType::Int32), true)
            .with_slot(Column::new("name", DataType::Utf8), true)
    }

    #[test]
    fn ids_are_unique() {
        let mut b = ExprBuilder::new();
        let a = b.lit(1);
        let c = b.lit(1);
        assert_eq!(a, c);
        assert_ne!(a.id(), c.id());
    }

    #[test]
    fn display_qualified() {
        let desc = test_desc();
        let mut b = ExprBuilder::new();

        let id = b.slot_ref(&desc.slots[0], Some("t"));
        let five = b.lit(5);
        let eq = b.eq(id, five);
        let name = b.slot_ref(&desc.slots[1], Some("t"));
        let null = b.is_null(name, true);
        let expr = b.or(vec![eq, null]);

        assert_eq!("t.id = 5 OR t.name IS NOT NULL", expr.to_string());
    }

    #[test]
    fn display_nested_conjunction() {
        let desc = test_desc();
        let mut b = ExprBuilder::new();

        let id1 = b.slot_ref(&desc.slots[0], None);
        let one = b.lit(1);
        let lt = b.cmp(ComparisonOperator::Lt, id1, one);
        let id2 = b.slot_ref(&desc.slots[0], None);
        let nine = b.lit(9);
        let gt = b.cmp(ComparisonOperator::Gt, id2, nine);
        let or = b.or(vec![lt, gt]);
        let name = b.slot_ref(&desc.slots[1], None);
        let pattern = b.lit("a%");
        let like = b.like(name, pattern, false);
        let and = b.and(vec![or, like]);

        assert_eq!("(id < 1 OR id > 9) AND name LIKE 'a%'", and.to_string());
    }

    #[test]
    fn display_nested_predicates() {
        let desc = test_desc();
        let mut b = ExprBuilder::new();

        let id = b.slot_ref(&desc.slots[0], None);
        let not = b.not(id);
        let expr = b.is_null(not, false);
        assert_eq!("(NOT (id)) IS NULL", expr.to_string());

        let id = b.slot_ref(&desc.slots[0], None);
        let name = b.slot_ref(&desc.slots[1], None);
        let is_null = b.is_null(name, false);
        let expr = b.eq(id, is_null);
        assert_eq!("id = (name IS NULL)", expr.to_string());
    }

    #[test]
    fn conjunction_arity() {
        let mut b = ExprBuilder::new();

        let and = b.and(vec![]);
        assert_eq!(ExprKind::Literal(ScalarValue::Boolean(true)), and.kind);
        let or = b.or(vec![]);
        assert_eq!(ExprKind::Literal(ScalarValue::Boolean(false)), or.kind);

        let one = b.lit(1);
        let two = b.lit(2);
        let eq = b.eq(one, two);
        let eq_id = eq.id();
        let single = b.and(vec![eq]);
        assert_eq!(eq_id, single.id());
        assert_eq!("1 = 2", single.to_string());
    }

    #[test]
    fn collect_nested_slot_refs() {
        let desc = test_desc();
        let mut b = ExprBuilder::new();

        let id = b.slot_ref(&desc.slots[0], Some("t"));
        let lo = b.lit(1);
        let hi = b.lit(10);
        let between = b.between(id, lo, hi, false);
        let name = b.slot_ref(&desc.slots[1], Some("t"));
        let upper = b.function("upper", vec![name]);
        let lit = b.lit("A");
        let eq = b.eq(upper, lit);

        let exprs = vec![between, eq];
        let refs = collect_slot_refs(&exprs);

        let cols: Vec<_> = refs
            .iter()
            .map(|e| e.as_slot_ref().unwrap().column.as_str())
            .collect();
        assert_eq!(vec!["id", "name"], cols);
    }

    #[test]
    fn collect_dedups_by_identity() {
        let desc = test_desc();
        let mut b = ExprBuilder::new();

        let id = b.slot_ref(&desc.slots[0], Some("t"));
        let one = b.lit(1);
        let eq = b.eq(id, one);

        // Same node listed twice, plus a structurally equal but distinct node.
        let id2 = b.slot_ref(&desc.slots[0], Some("t"));
        let two = b.lit(2);
        let eq2 = b.eq(id2, two);
        let exprs = vec![eq.clone(), eq, eq2];

        let refs = collect_slot_refs(&exprs);
        assert_eq!(2, refs.len());
        assert_eq!(refs[0], refs[1]);
        assert_ne!(refs[0].id(), refs[1].id());
    }

    #[test]
    fn collect_no_slot_refs() {
        let mut b = ExprBuilder::new();
        let one = b.lit(1);
        let two = b.lit(2);
        let exprs = vec![b.eq(one, two)];
        assert!(collect_slot_refs(&exprs).is_empty());
    }
}
