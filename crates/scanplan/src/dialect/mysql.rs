use std::fmt::Write as _;

use super::SqlDialect;
use crate::descriptor::DataType;
use crate::errors::{PlanError, Result};
use crate::expr::scalar::{ScalarValue, write_decimal};
use crate::expr::{Expr, ExprKind};

/// Scalar functions with identical semantics in MySQL.
///
/// Functions depending on session state (e.g. `now()`) must not be listed,
/// MySQL would evaluate them with its own state.
const PUSHABLE_FUNCTIONS: &[&str] = &[
    "abs",
    "ceil",
    "floor",
    "round",
    "lower",
    "upper",
    "length",
    "char_length",
    "substring",
    "concat",
    "trim",
    "ltrim",
    "rtrim",
    "coalesce",
    "ifnull",
    "year",
    "month",
    "day",
];

/// Renders expressions for MySQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlDialect;

impl MysqlDialect {
    fn unsupported(&self, expr: &Expr, reason: impl Into<String>) -> PlanError {
        PlanError::UnsupportedPredicateShape {
            dialect: self.name(),
            expr: expr.to_string(),
            reason: reason.into(),
        }
    }

    /// Write an expression that's an operand of some other operator.
    ///
    /// Anything that isn't atomic is wrapped in parens. MySQL puts `=`, `IS`
    /// and `LIKE` at the same precedence level and binds `NOT` looser than
    /// all of them, so e.g. `a = b IS NULL` reads as `(a = b) IS NULL`.
    fn write_operand(&self, expr: &Expr, buf: &mut String) -> Result<()> {
        if expr.is_atomic() {
            return self.write_expr(expr, buf);
        }
        buf.push('(');
        self.write_expr(expr, buf)?;
        buf.push(')');
        Ok(())
    }

    /// Write a child of AND/OR. Only nested conjunctions and arithmetic need
    /// parens, every other shape binds tighter.
    fn write_conjunct(&self, expr: &Expr, buf: &mut String) -> Result<()> {
        match &expr.kind {
            ExprKind::Conjunction { .. } | ExprKind::Arith { .. } => {
                buf.push('(');
                self.write_expr(expr, buf)?;
                buf.push(')');
            }
            _ => self.write_expr(expr, buf)?,
        }
        Ok(())
    }

    fn write_list(&self, exprs: &[Expr], buf: &mut String) -> Result<()> {
        for (idx, expr) in exprs.iter().enumerate() {
            if idx > 0 {
                buf.push_str(", ");
            }
            self.write_expr(expr, buf)?;
        }
        Ok(())
    }

    fn write_literal(&self, expr: &Expr, lit: &ScalarValue, buf: &mut String) -> Result<()> {
        match lit {
            ScalarValue::Null => buf.push_str("NULL"),
            ScalarValue::Boolean(true) => buf.push_str("TRUE"),
            ScalarValue::Boolean(false) => buf.push_str("FALSE"),
            ScalarValue::Int64(v) => write!(buf, "{v}")?,
            ScalarValue::Float64(v) => {
                if !v.is_finite() {
                    return Err(self.unsupported(expr, "non-finite float literal"));
                }
                // Debug keeps the fractional part for whole numbers.
                write!(buf, "{v:?}")?
            }
            ScalarValue::Decimal { value, scale } => write_decimal(buf, *value, *scale)?,
            ScalarValue::Utf8(v) => {
                buf.push('\'');
                for c in v.chars() {
                    match c {
                        '\'' => buf.push_str("\\'"),
                        '\\' => buf.push_str("\\\\"),
                        c => buf.push(c),
                    }
                }
                buf.push('\'');
            }
            ScalarValue::Date(v) => write!(buf, "'{}'", v.format("%Y-%m-%d"))?,
            ScalarValue::Datetime(v) => write!(buf, "'{}'", v.format("%Y-%m-%d %H:%M:%S%.f"))?,
        }
        Ok(())
    }

    fn cast_target(&self, expr: &Expr, to: &DataType) -> Result<String> {
        Ok(match to {
            DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 => {
                "SIGNED".to_string()
            }
            DataType::Float32 | DataType::Float64 => "DOUBLE".to_string(),
            DataType::Decimal { precision, scale } => {
                if *scale < 0 {
                    return Err(self.unsupported(expr, "negative decimal scale"));
                }
                format!("DECIMAL({precision},{scale})")
            }
            DataType::Utf8 => "CHAR".to_string(),
            DataType::Date => "DATE".to_string(),
            DataType::Datetime => "DATETIME".to_string(),
            DataType::Boolean => return Err(self.unsupported(expr, "cast to boolean")),
        })
    }

    fn write_expr(&self, expr: &Expr, buf: &mut String) -> Result<()> {
        match &expr.kind {
            ExprKind::SlotRef(slot) => {
                if let Some(table) = &slot.table {
                    buf.push_str(&self.quote_identifier(table));
                    buf.push('.');
                }
                buf.push_str(&self.quote_identifier(&slot.column));
            }
            ExprKind::Literal(lit) => self.write_literal(expr, lit, buf)?,
            ExprKind::Comparison { op, left, right } => {
                self.write_operand(left, buf)?;
                write!(buf, " {op} ")?;
                self.write_operand(right, buf)?;
            }
            ExprKind::Conjunction { op, children } => {
                if children.is_empty() {
                    return Err(self.unsupported(expr, "empty conjunction"));
                }
                for (idx, child) in children.iter().enumerate() {
                    if idx > 0 {
                        write!(buf, " {op} ")?;
                    }
                    self.write_conjunct(child, buf)?;
                }
            }
            ExprKind::Not(input) => {
                buf.push_str("NOT (");
                self.write_expr(input, buf)?;
                buf.push(')');
            }
            ExprKind::Arith { op, left, right } => {
                self.write_operand(left, buf)?;
                write!(buf, " {op} ")?;
                self.write_operand(right, buf)?;
            }
            ExprKind::IsNull { negated, input } => {
                self.write_operand(input, buf)?;
                buf.push_str(if *negated { " IS NOT NULL" } else { " IS NULL" });
            }
            ExprKind::InList {
                negated,
                input,
                list,
            } => {
                if list.is_empty() {
                    return Err(self.unsupported(expr, "empty IN list"));
                }
                self.write_operand(input, buf)?;
                buf.push_str(if *negated { " NOT IN (" } else { " IN (" });
                self.write_list(list, buf)?;
                buf.push(')');
            }
            ExprKind::Between {
                negated,
                input,
                lower,
                upper,
            } => {
                self.write_operand(input, buf)?;
                buf.push_str(if *negated { " NOT BETWEEN " } else { " BETWEEN " });
                self.write_operand(lower, buf)?;
                buf.push_str(" AND ");
                self.write_operand(upper, buf)?;
            }
            ExprKind::Like {
                negated,
                input,
                pattern,
            } => {
                self.write_operand(input, buf)?;
                buf.push_str(if *negated { " NOT LIKE " } else { " LIKE " });
                self.write_operand(pattern, buf)?;
            }
            ExprKind::Cast { input, to } => {
                let target = self.cast_target(expr, to)?;
                buf.push_str("CAST(");
                self.write_expr(input, buf)?;
                write!(buf, " AS {target})")?;
            }
            ExprKind::ScalarFunction { name, args } => {
                let lower = name.to_lowercase();
                if !PUSHABLE_FUNCTIONS.contains(&lower.as_str()) {
                    return Err(self.unsupported(expr, format!("function '{name}'")));
                }
                write!(buf, "{}(", lower.to_uppercase())?;
                self.write_list(args, buf)?;
                buf.push(')');
            }
            ExprKind::Aggregate { name, .. } => {
                return Err(self.unsupported(expr, format!("aggregate function '{name}'")));
            }
        }

        Ok(())
    }
}

impl SqlDialect for MysqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        format!("`{ident}`")
    }

    fn render_expr(&self, expr: &Expr) -> Result<String> {
        let mut buf = String::new();
        self.write_expr(expr, &mut buf)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::descriptor::SlotId;
    use crate::expr::ExprBuilder;
    use crate::expr::operators::{ArithOperator, ComparisonOperator};

    fn render(expr: &Expr) -> String {
        MysqlDialect.render_expr(expr).unwrap()
    }

    #[test]
    fn quote_identifier() {
        assert_eq!("`a`", MysqlDialect.quote_identifier("a"));
        // No escaping.
        assert_eq!("`a`b`", MysqlDialect.quote_identifier("a`b"));
    }

    #[test]
    fn slot_refs() {
        let mut b = ExprBuilder::new();
        let qualified = b.column(SlotId(0), Some("t"), "c");
        let unqualified = b.column(SlotId(0), None, "c");

        assert_eq!("`t`.`c`", render(&qualified));
        assert_eq!("`c`", render(&unqualified));
    }

    #[test]
    fn literals() {
        let mut b = ExprBuilder::new();

        assert_eq!("NULL", render(&b.null()));
        assert_eq!("TRUE", render(&b.lit(true)));
        assert_eq!("-4", render(&b.lit(-4)));
        assert_eq!("2.5", render(&b.lit(2.5)));
        assert_eq!("3.0", render(&b.lit(3.0)));
        assert_eq!("'it\\'s'", render(&b.lit("it's")));
        assert_eq!("'a\\\\b'", render(&b.lit("a\\b")));

        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!("'2024-02-29'", render(&b.lit(date)));
        let datetime = date.and_hms_opt(13, 4, 5).unwrap();
        assert_eq!("'2024-02-29 13:04:05'", render(&b.lit(datetime)));

        let dec = b.lit(ScalarValue::Decimal {
            value: -1050,
            scale: 3,
        });
        assert_eq!("-1.050", render(&dec));
    }

    #[test]
    fn non_finite_float_unsupported() {
        let mut b = ExprBuilder::new();
        let col = b.column(SlotId(0), None, "f");
        let nan = b.lit(f64::NAN);
        let expr = b.eq(col, nan);

        let err = MysqlDialect.render_expr(&expr).unwrap_err();
        assert!(matches!(err, PlanError::UnsupportedPredicateShape { .. }));
    }

    #[test]
    fn comparison_and_arith() {
        let mut b = ExprBuilder::new();
        let a = b.column(SlotId(0), None, "a");
        let one = b.lit(1);
        let add = b.arith(ArithOperator::Add, a, one);
        let two = b.lit(2);
        let mul = b.arith(ArithOperator::Mul, add, two);
        let ten = b.lit(10);
        let expr = b.cmp(ComparisonOperator::GtEq, mul, ten);

        assert_eq!("((`a` + 1) * 2) >= 10", render(&expr));
    }

    #[test]
    fn nested_conjunctions() {
        let mut b = ExprBuilder::new();
        let a = b.column(SlotId(0), None, "a");
        let a_null = b.is_null(a, false);
        let c = b.column(SlotId(1), None, "c");
        let five = b.lit(5);
        let c_eq = b.cmp(ComparisonOperator::EqForNull, c, five);
        let or = b.or(vec![a_null, c_eq]);
        let d = b.column(SlotId(2), None, "d");
        let d_not_null = b.is_null(d, true);
        let and = b.and(vec![or, d_not_null]);
        let expr = b.not(and);

        assert_eq!(
            "NOT ((`a` IS NULL OR `c` <=> 5) AND `d` IS NOT NULL)",
            render(&expr)
        );
    }

    #[test]
    fn not_as_operand() {
        let mut b = ExprBuilder::new();

        let x = b.column(SlotId(0), None, "x");
        let not = b.not(x);
        let expr = b.is_null(not, false);
        assert_eq!("(NOT (`x`)) IS NULL", render(&expr));

        let flag = b.column(SlotId(1), None, "flag");
        let x = b.column(SlotId(0), None, "x");
        let not = b.not(x);
        let expr = b.eq(flag, not);
        assert_eq!("`flag` = (NOT (`x`))", render(&expr));
    }

    #[test]
    fn predicates_as_comparison_operands() {
        fn flag_eq(b: &mut ExprBuilder, rhs: Expr) -> String {
            let flag = b.column(SlotId(1), None, "flag");
            render(&b.eq(flag, rhs))
        }

        let mut b = ExprBuilder::new();

        let a = b.column(SlotId(0), None, "a");
        let one = b.lit(1);
        let eq = b.eq(a, one);
        assert_eq!("`flag` = (`a` = 1)", flag_eq(&mut b, eq));

        let a = b.column(SlotId(0), None, "a");
        let is_null = b.is_null(a, false);
        assert_eq!("`flag` = (`a` IS NULL)", flag_eq(&mut b, is_null));

        let a = b.column(SlotId(0), None, "a");
        let list = vec![b.lit(1), b.lit(2)];
        let in_list = b.in_list(a, list, false);
        assert_eq!("`flag` = (`a` IN (1, 2))", flag_eq(&mut b, in_list));

        let a = b.column(SlotId(0), None, "a");
        let lo = b.lit(1);
        let hi = b.lit(5);
        let between = b.between(a, lo, hi, true);
        assert_eq!("`flag` = (`a` NOT BETWEEN 1 AND 5)", flag_eq(&mut b, between));

        let a = b.column(SlotId(0), None, "a");
        let pattern = b.lit("x%");
        let like = b.like(a, pattern, false);
        assert_eq!("`flag` = (`a` LIKE 'x%')", flag_eq(&mut b, like));
    }

    #[test]
    fn predicate_as_left_operand() {
        let mut b = ExprBuilder::new();
        let a = b.column(SlotId(0), None, "a");
        let one = b.lit(1);
        let eq = b.eq(a, one);
        let expr = b.is_null(eq, true);
        assert_eq!("(`a` = 1) IS NOT NULL", render(&expr));

        let a = b.column(SlotId(0), None, "a");
        let lo = b.lit(0);
        let hi = b.lit(1);
        let between = b.between(a, lo, hi, false);
        let t = b.lit(true);
        let expr = b.eq(between, t);
        assert_eq!("(`a` BETWEEN 0 AND 1) = TRUE", render(&expr));
    }

    #[test]
    fn atomic_operands_not_wrapped() {
        let mut b = ExprBuilder::new();
        let a = b.column(SlotId(0), None, "a");
        let cast = b.cast(a, DataType::Int64);
        let name = b.column(SlotId(1), None, "name");
        let upper = b.function("upper", vec![name]);
        let expr = b.eq(cast, upper);
        assert_eq!("CAST(`a` AS SIGNED) = UPPER(`name`)", render(&expr));
    }

    #[test]
    fn in_between_like() {
        let mut b = ExprBuilder::new();

        let a = b.column(SlotId(0), None, "a");
        let list = vec![b.lit(1), b.lit(2), b.lit(3)];
        let in_list = b.in_list(a, list, true);
        assert_eq!("`a` NOT IN (1, 2, 3)", render(&in_list));

        let a = b.column(SlotId(0), None, "a");
        let lo = b.lit(1);
        let hi = b.lit(9);
        let between = b.between(a, lo, hi, false);
        assert_eq!("`a` BETWEEN 1 AND 9", render(&between));

        let name = b.column(SlotId(1), None, "name");
        let pattern = b.lit("ab%");
        let like = b.like(name, pattern, false);
        assert_eq!("`name` LIKE 'ab%'", render(&like));
    }

    #[test]
    fn empty_in_list_unsupported() {
        let mut b = ExprBuilder::new();
        let a = b.column(SlotId(0), None, "a");
        let expr = b.in_list(a, Vec::new(), false);
        assert!(MysqlDialect.render_expr(&expr).is_err());
    }

    #[test]
    fn casts() {
        let mut b = ExprBuilder::new();
        let a = b.column(SlotId(0), None, "a");
        let cast = b.cast(
            a,
            DataType::Decimal {
                precision: 10,
                scale: 2,
            },
        );
        assert_eq!("CAST(`a` AS DECIMAL(10,2))", render(&cast));

        let a = b.column(SlotId(0), None, "a");
        let cast = b.cast(a, DataType::Boolean);
        assert!(MysqlDialect.render_expr(&cast).is_err());
    }

    #[test]
    fn functions() {
        let mut b = ExprBuilder::new();
        let name = b.column(SlotId(1), Some("t"), "name");
        let lower = b.function("Lower", vec![name]);
        let lit = b.lit("x");
        let expr = b.eq(lower, lit);
        assert_eq!("LOWER(`t`.`name`) = 'x'", render(&expr));

        let name = b.column(SlotId(1), None, "name");
        let custom = b.function("my_udf", vec![name]);
        let err = MysqlDialect.render_expr(&custom).unwrap_err();
        assert_eq!(
            "Unsupported predicate for mysql: my_udf(name) (function 'my_udf')",
            err.to_string()
        );
    }

    #[test]
    fn aggregates_unsupported() {
        let mut b = ExprBuilder::new();
        let a = b.column(SlotId(0), None, "a");
        let sum = b.aggregate("sum", vec![a]);
        let one = b.lit(1);
        let expr = b.cmp(ComparisonOperator::Gt, sum, one);

        let err = MysqlDialect.render_expr(&expr).unwrap_err();
        match err {
            PlanError::UnsupportedPredicateShape { expr, .. } => assert_eq!("sum(a)", expr),
            other => panic!("unexpected error: {other}"),
        }
    }
}
