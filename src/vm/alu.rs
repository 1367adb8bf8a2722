use crate::spec::types::hw::{AluOp, Cond, Value};
use log::warn;
use std::num::Wrapping;

fn logical_shift(a: Value, count: Value, f: fn(u32, u32) -> Option<u32>) -> Value {
    f(a as u32, count as u32).unwrap_or(0) as Value
}

/// Evaluates an ALU operation. Results wrap around at 32 bits.
pub fn eval(op: AluOp, a: Value, b: Value) -> Value {
    match op {
        AluOp::Add => (Wrapping(a) + Wrapping(b)).0,
        AluOp::Sub => (Wrapping(a) - Wrapping(b)).0,
        AluOp::Mul => (Wrapping(a) * Wrapping(b)).0,
        AluOp::Div => {
            if b == 0 {
                warn!("division by zero ({} / 0), result is 0", a);
                0
            } else {
                a.wrapping_div(b)
            }
        }
        AluOp::ShiftRight => logical_shift(a, b, u32::checked_shr),
        AluOp::ShiftLeft => logical_shift(a, b, u32::checked_shl),
        AluOp::And => a & b,
        AluOp::Or => a | b,
    }
}

pub fn compare(cond: Cond, a: Value, b: Value) -> bool {
    match cond {
        Cond::Never => false,
        Cond::Greater => a > b,
        Cond::Equal => a == b,
        Cond::GreaterEqual => a >= b,
        Cond::Less => a < b,
        Cond::NotEqual => a != b,
        Cond::LessEqual => a <= b,
        Cond::Always => true,
    }
}
