use indexmap::IndexMap;

use super::{Expr, ExprId, ExprKind};

/// Mapping from expression identity to a replacement expression.
///
/// Lookups are by exact identity only. A structurally equal expression with a
/// different id does not match.
#[derive(Debug, Clone, Default)]
pub struct ExprSubstitutionMap {
    entries: IndexMap<ExprId, Expr>,
}

impl ExprSubstitutionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace `original` with `replacement`.
    ///
    /// An existing entry for the same identity is overwritten.
    pub fn put(&mut self, original: &Expr, replacement: Expr) {
        self.entries.insert(original.id(), replacement);
    }

    pub fn get(&self, id: ExprId) -> Option<&Expr> {
        self.entries.get(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Produce a deep copy of `expr` with substitutions from `map` applied.
///
/// Replacements are inserted as-is and are not themselves searched for further
/// substitutions.
pub fn substitute(expr: &Expr, map: &ExprSubstitutionMap) -> Expr {
    if let Some(replacement) = map.get(expr.id()) {
        return replacement.clone();
    }

    let sub = |child: &Expr| substitute(child, map);
    let sub_box = |child: &Expr| Box::new(substitute(child, map));
    let sub_all = |children: &[Expr]| children.iter().map(sub).collect::<Vec<_>>();

    let kind = match &expr.kind {
        ExprKind::SlotRef(slot) => ExprKind::SlotRef(slot.clone()),
        ExprKind::Literal(lit) => ExprKind::Literal(lit.clone()),
        ExprKind::Comparison { op, left, right } => ExprKind::Comparison {
            op: *op,
            left: sub_box(left),
            right: sub_box(right),
        },
        ExprKind::Conjunction { op, children } => ExprKind::Conjunction {
            op: *op,
            children: sub_all(children),
        },
        ExprKind::Not(input) => ExprKind::Not(sub_box(input)),
        ExprKind::Arith { op, left, right } => ExprKind::Arith {
            op: *op,
            left: sub_box(left),
            right: sub_box(right),
        },
        ExprKind::IsNull { negated, input } => ExprKind::IsNull {
            negated: *negated,
            input: sub_box(input),
        },
        ExprKind::InList {
            negated,
            input,
            list,
        } => ExprKind::InList {
            negated: *negated,
            input: sub_box(input),
            list: sub_all(list),
        },
        ExprKind::Between {
            negated,
            input,
            lower,
            upper,
        } => ExprKind::Between {
            negated: *negated,
            input: sub_box(input),
            lower: sub_box(lower),
            upper: sub_box(upper),
        },
        ExprKind::Like {
            negated,
            input,
            pattern,
        } => ExprKind::Like {
            negated: *negated,
            input: sub_box(input),
            pattern: sub_box(pattern),
        },
        ExprKind::Cast { input, to } => ExprKind::Cast {
            input: sub_box(input),
            to: *to,
        },
        ExprKind::ScalarFunction { name, args } => ExprKind::ScalarFunction {
            name: name.clone(),
            args: sub_all(args),
        },
        ExprKind::Aggregate { name, args } => ExprKind::Aggregate {
            name: name.clone(),
            args: sub_all(args),
        },
    };

    Expr::new(expr.id(), kind)
}

/// Substitute each expression in `exprs`.
pub fn substitute_list(exprs: &[Expr], map: &ExprSubstitutionMap) -> Vec<Expr> {
    exprs.iter().map(|expr| substitute(expr, map)).collect()
}
