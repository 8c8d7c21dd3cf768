use std::collections::HashMap;
use std::fmt;

use crate::assembler::{encode_number, Operand};
use crate::error::{BridgeError, BridgeResult};
use crate::registry::WrapperKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Neg,
    Eq,
    Lt,
    Le,
}

impl Operator {
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Pow => "^",
            Operator::Neg => "unary -",
            Operator::Eq => "==",
            Operator::Lt => "<",
            Operator::Le => "<=",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Operand classification used for slot lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandType {
    HostNumber,
    Numeric,
    Point,
    Vector,
    Boolean,
}

impl OperandType {
    pub fn of(operand: &Operand) -> Option<Self> {
        match operand {
            Operand::Number(_) => Some(OperandType::HostNumber),
            Operand::Object(wrapper) => match wrapper.kind() {
                WrapperKind::Numeric => Some(OperandType::Numeric),
                WrapperKind::Point => Some(OperandType::Point),
                WrapperKind::Vector => Some(OperandType::Vector),
                WrapperKind::Boolean => Some(OperandType::Boolean),
                _ => None,
            },
            _ => None,
        }
    }
}

/// What a slot does with its operands.
#[derive(Clone, Copy)]
pub enum Slot {
    /// Builds an engine expression from the operand fragments.
    Command(fn(&str, &str) -> String),
    /// Compares the operands' numeric values.
    Compare(fn(f64, f64) -> bool),
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Command(_) => f.write_str("Slot::Command"),
            Slot::Compare(_) => f.write_str("Slot::Compare"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct SlotKey {
    op: Operator,
    left: OperandType,
    right: Option<OperandType>,
}

/// (operator, operand types) to slot.
#[derive(Clone, Default)]
pub struct SlotTable {
    slots: HashMap<SlotKey, Slot>,
}

fn add(l: &str, r: &str) -> String {
    format!("({l})+({r})")
}

fn sub(l: &str, r: &str) -> String {
    format!("({l})-({r})")
}

fn mul(l: &str, r: &str) -> String {
    format!("({l})*({r})")
}

fn div(l: &str, r: &str) -> String {
    format!("({l})/({r})")
}

fn pow(l: &str, r: &str) -> String {
    format!("({l})^({r})")
}

fn neg(l: &str, _: &str) -> String {
    format!("-({l})")
}

impl SlotTable {
    pub fn empty() -> Self {
        SlotTable::default()
    }

    pub fn standard() -> Self {
        use OperandType::{HostNumber, Numeric, Point, Vector};

        let mut table = SlotTable::empty();
        let scalar_pairs = [(Numeric, Numeric), (Numeric, HostNumber), (HostNumber, Numeric)];
        for (l, r) in scalar_pairs {
            table.register(Operator::Add, l, Some(r), Slot::Command(add));
            table.register(Operator::Sub, l, Some(r), Slot::Command(sub));
            table.register(Operator::Mul, l, Some(r), Slot::Command(mul));
            table.register(Operator::Div, l, Some(r), Slot::Command(div));
            table.register(Operator::Pow, l, Some(r), Slot::Command(pow));
            table.register(Operator::Lt, l, Some(r), Slot::Compare(|a, b| a < b));
            table.register(Operator::Le, l, Some(r), Slot::Compare(|a, b| a <= b));
        }
        table.register(Operator::Eq, Numeric, Some(Numeric), Slot::Compare(|a, b| a == b));

        for (l, r) in [(Point, Point), (Point, Vector), (Vector, Vector)] {
            table.register(Operator::Add, l, Some(r), Slot::Command(add));
            table.register(Operator::Sub, l, Some(r), Slot::Command(sub));
        }
        for shape in [Point, Vector] {
            for scalar in [Numeric, HostNumber] {
                table.register(Operator::Mul, shape, Some(scalar), Slot::Command(mul));
                table.register(Operator::Mul, scalar, Some(shape), Slot::Command(mul));
                table.register(Operator::Div, shape, Some(scalar), Slot::Command(div));
            }
        }
        for operand in [Numeric, Point, Vector] {
            table.register(Operator::Neg, operand, None, Slot::Command(neg));
        }
        table
    }

    pub fn register(
        &mut self,
        op: Operator,
        left: OperandType,
        right: Option<OperandType>,
        slot: Slot,
    ) {
        self.slots.insert(SlotKey { op, left, right }, slot);
    }

    /// Finds the slot for `op` applied to the given operands. Missing
    /// combinations are TypeErrors; there is no identity fallback.
    pub fn lookup(
        &self,
        op: Operator,
        left: &Operand,
        right: Option<&Operand>,
    ) -> BridgeResult<Slot> {
        let missing = || match right {
            Some(right) => BridgeError::type_error(format!(
                "no operator '{op}' for {} and {}",
                left.describe(),
                right.describe()
            )),
            None => BridgeError::type_error(format!("no operator '{op}' for {}", left.describe())),
        };
        let left_type = OperandType::of(left).ok_or_else(missing)?;
        let right_type = match right {
            Some(operand) => Some(OperandType::of(operand).ok_or_else(missing)?),
            None => None,
        };
        self.slots
            .get(&SlotKey {
                op,
                left: left_type,
                right: right_type,
            })
            .copied()
            .ok_or_else(missing)
    }
}

/// Engine text for an operand inside a slot fragment.
pub fn fragment(operand: &Operand) -> BridgeResult<String> {
    match operand {
        Operand::Object(wrapper) => Ok(wrapper.label().to_string()),
        Operand::Number(value) => encode_number(*value),
        other => Err(BridgeError::type_error(format!(
            "{} cannot appear in an expression",
            other.describe()
        ))),
    }
}
