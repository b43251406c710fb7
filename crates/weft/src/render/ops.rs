//! Arithmetic and comparison operators.
//!
//! Operators return `Err` with a message when they have no result;
//!     the renderer turns the message into a diagnostic.
//! The logical operators short-circuit and are evaluated by the renderer itself.

use std::cmp::Ordering;

use crate::ast::BinaryOp;
use crate::value::Value;

pub fn binary(op: BinaryOp, lhs: Option<&Value>, rhs: Option<&Value>) -> Result<Value, String> {
    let (lhs, rhs) = match (lhs, rhs) {
        (Some(lhs), Some(rhs)) => (lhs, rhs),
        (None, _) => return Err(format!("left operand of `{}` has no value", op.symbol())),
        (_, None) => return Err(format!("right operand of `{}` has no value", op.symbol())),
    };
    match op {
        BinaryOp::Equal => Ok(Value::Bool(lhs.loosely_equals(rhs))),
        BinaryOp::NotEqual => Ok(Value::Bool(!lhs.loosely_equals(rhs))),
        BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual => {
            let ordering = compare(lhs, rhs).ok_or_else(|| {
                format!(
                    "cannot compare {} with {} using `{}`",
                    lhs.type_name(),
                    rhs.type_name(),
                    op.symbol()
                )
            })?;
            Ok(Value::Bool(match op {
                BinaryOp::Less => ordering == Ordering::Less,
                BinaryOp::LessEqual => ordering != Ordering::Greater,
                BinaryOp::Greater => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }))
        }
        BinaryOp::Add if matches!(lhs, Value::String(_)) || matches!(rhs, Value::String(_)) => {
            Ok(Value::String(format!("{lhs}{rhs}")))
        }
        BinaryOp::Add
        | BinaryOp::Subtract
        | BinaryOp::Multiply
        | BinaryOp::Divide
        | BinaryOp::Modulo => arithmetic(op, lhs, rhs),
        BinaryOp::And | BinaryOp::Or => Ok(Value::Bool(match op {
            BinaryOp::And => Value::is_truthy(Some(lhs)) && Value::is_truthy(Some(rhs)),
            _ => Value::is_truthy(Some(lhs)) || Value::is_truthy(Some(rhs)),
        })),
    }
}

fn compare(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => lhs.as_float()?.partial_cmp(&rhs.as_float()?),
    }
}

fn arithmetic(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, String> {
    if let (Value::Int(a), Value::Int(b)) = (lhs, rhs) {
        if *b == 0 && matches!(op, BinaryOp::Divide | BinaryOp::Modulo) {
            return Err(format!("division by zero in `{a} {} {b}`", op.symbol()));
        }
        let result = match op {
            BinaryOp::Add => a.checked_add(*b),
            BinaryOp::Subtract => a.checked_sub(*b),
            BinaryOp::Multiply => a.checked_mul(*b),
            BinaryOp::Divide => a.checked_div(*b),
            _ => a.checked_rem(*b),
        };
        return result
            .map(Value::Int)
            .ok_or_else(|| format!("integer overflow in `{a} {} {b}`", op.symbol()));
    }
    let (a, b) = match (lhs.as_float(), rhs.as_float()) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(format!(
                "`{}` requires numbers, found {} and {}",
                op.symbol(),
                lhs.type_name(),
                rhs.type_name()
            ))
        }
    };
    if b == 0.0 && matches!(op, BinaryOp::Divide | BinaryOp::Modulo) {
        return Err(format!("division by zero in `{lhs} {} {rhs}`", op.symbol()));
    }
    Ok(Value::Float(match op {
        BinaryOp::Add => a + b,
        BinaryOp::Subtract => a - b,
        BinaryOp::Multiply => a * b,
        BinaryOp::Divide => a / b,
        _ => a % b,
    }))
}

pub fn negate(value: Option<&Value>) -> Result<Value, String> {
    match value {
        Some(Value::Int(i)) => i
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| format!("integer overflow negating {i}")),
        Some(Value::Float(f)) => Ok(Value::Float(-f)),
        Some(other) => Err(format!("cannot negate a {}", other.type_name())),
        None => Err("operand of `-` has no value".into()),
    }
}

/// The elements of `[from..to]`, ascending or descending.
/// The integer bounds of a range literal.
///
/// Bounds may be integers or strings holding integers.
pub fn range_bounds(from: Option<&Value>, to: Option<&Value>) -> Result<(i64, i64), String> {
    let bound = |v: Option<&Value>, which: &str| -> Result<i64, String> {
        match v {
            Some(Value::Int(i)) => Ok(*i),
            Some(Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| format!("{which} of the range is not an integer: {s:?}")),
            Some(other) => Err(format!(
                "{which} of the range must be an integer, not a {}",
                other.type_name()
            )),
            None => Err(format!("{which} of the range has no value")),
        }
    };
    Ok((bound(from, "start")?, bound(to, "end")?))
}

/// Number of elements of the range between two bounds, saturating at `usize::MAX`.
pub fn range_len(from: i64, to: i64) -> usize {
    usize::try_from(from.abs_diff(to))
        .unwrap_or(usize::MAX)
        .saturating_add(1)
}

/// The elements of a range, counting down when `from > to`.
pub fn range_values(from: i64, to: i64) -> impl Iterator<Item = Value> {
    let up = (from <= to).then_some(from..=to);
    let down = (from > to).then(|| (to..=from).rev());
    up.into_iter()
        .flatten()
        .chain(down.into_iter().flatten())
        .map(Value::Int)
}

/// Build the list of a range literal; ranges longer than `max_len` are an error.
pub fn range(from: Option<&Value>, to: Option<&Value>, max_len: usize) -> Result<Value, String> {
    let (from, to) = range_bounds(from, to)?;
    let len = range_len(from, to);
    if len > max_len {
        return Err(format!(
            "the range [{from}..{to}] has {len} elements, more than the limit of {max_len}"
        ));
    }
    Ok(Value::List(range_values(from, to).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! op_tests {
        ($( ($name: ident, $op: ident, $lhs: expr, $rhs: expr, $expected: expr), )+) => {
            $(
            #[test]
            fn $name() {
                let lhs: Option<Value> = $lhs;
                let rhs: Option<Value> = $rhs;
                let result = binary(BinaryOp::$op, lhs.as_ref(), rhs.as_ref()).ok();
                let expected: Option<Value> = $expected;
                assert_eq!(result, expected);
            }
            )+
        };
    }

    fn int(i: i64) -> Option<Value> {
        Some(Value::Int(i))
    }

    fn float(f: f64) -> Option<Value> {
        Some(Value::Float(f))
    }

    fn string(s: &str) -> Option<Value> {
        Some(Value::from(s))
    }

    fn boolean(b: bool) -> Option<Value> {
        Some(Value::Bool(b))
    }

    op_tests![
        (add_ints, Add, int(1), int(2), int(3)),
        (add_mixed_promotes, Add, int(1), float(0.5), float(1.5)),
        (add_string_concatenates, Add, string("a"), int(1), string("a1")),
        (add_overflow, Add, int(i64::MAX), int(1), None),
        (subtract_negative, Subtract, int(1), int(5), int(-4)),
        (multiply_floats, Multiply, float(1.5), float(2.0), float(3.0)),
        (divide_ints_truncates, Divide, int(7), int(2), int(3)),
        (divide_by_zero, Divide, int(1), int(0), None),
        (divide_float_by_zero, Divide, float(1.0), int(0), None),
        (divide_min_by_minus_one, Divide, int(i64::MIN), int(-1), None),
        (modulo, Modulo, int(7), int(3), int(1)),
        (modulo_by_zero, Modulo, int(7), int(0), None),
        (add_absent, Add, None, int(1), None),
        (multiply_string, Multiply, string("a"), int(2), None),
        (less_ints, Less, int(1), int(2), boolean(true)),
        (less_mixed, Less, float(1.5), int(2), boolean(true)),
        (greater_equal_equal, GreaterEqual, int(2), int(2), boolean(true)),
        (less_strings, Less, string("a"), string("b"), boolean(true)),
        (less_incomparable, Less, string("a"), int(1), None),
        (compare_absent, Greater, None, int(1), None),
        (equal_int_float, Equal, int(1), float(1.0), boolean(true)),
        (equal_by_text, Equal, int(3), string("3"), boolean(true)),
        (not_equal, NotEqual, string("a"), string("b"), boolean(true)),
    ];

    #[test]
    fn negate_values() {
        assert_eq!(negate(Some(&Value::Int(3))), Ok(Value::Int(-3)));
        assert_eq!(negate(Some(&Value::Float(0.5))), Ok(Value::Float(-0.5)));
        assert!(negate(Some(&Value::Int(i64::MIN))).is_err());
        assert!(negate(None).is_err());
    }

    #[test]
    fn ranges() {
        assert_eq!(
            range(Some(&Value::Int(1)), Some(&Value::Int(3)), 10),
            Ok(Value::from(vec![1, 2, 3]))
        );
        assert_eq!(
            range(Some(&Value::Int(2)), Some(&Value::Int(0)), 10),
            Ok(Value::from(vec![2, 1, 0]))
        );
        assert_eq!(
            range(Some(&Value::from("1")), Some(&Value::Int(1)), 10),
            Ok(Value::from(vec![1]))
        );
        assert!(range(None, Some(&Value::Int(1)), 10).is_err());
    }

    #[test]
    fn range_longer_than_limit() {
        assert!(range(Some(&Value::Int(1)), Some(&Value::Int(3)), 3).is_ok());
        assert!(range(Some(&Value::Int(1)), Some(&Value::Int(4)), 3).is_err());
        assert!(range(Some(&Value::Int(0)), Some(&Value::Int(i64::MAX)), 1_000).is_err());
        assert!(range(Some(&Value::Int(i64::MAX)), Some(&Value::Int(i64::MIN)), 1_000).is_err());
    }

    #[test]
    fn range_extremes() {
        assert_eq!(range_len(i64::MIN, i64::MAX), usize::MAX);
        assert_eq!(range_len(5, 5), 1);
        let top: Vec<Value> = range_values(i64::MAX, i64::MAX - 2).collect();
        assert_eq!(
            top,
            vec![Value::Int(i64::MAX), Value::Int(i64::MAX - 1), Value::Int(i64::MAX - 2)]
        );
        let mut huge = range_values(0, i64::MAX);
        assert_eq!(huge.next(), Some(Value::Int(0)));
        assert_eq!(huge.next(), Some(Value::Int(1)));
    }
}
