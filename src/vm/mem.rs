use crate::spec::types::hw::Value;
use std::{collections::BTreeMap, fmt::Display};

/// Sparse data memory, one `Value` per address. Cells never written read as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mem {
    cells: BTreeMap<Value, Value>,
}

impl Display for Mem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "MEM: {} cell(s) written", self.cells.len())?;
        for (addr, val) in &self.cells {
            writeln!(f, "  [{:>11}] {:>11} ({:#010X})", addr, val, val)?;
        }
        Ok(())
    }
}

impl Mem {
    pub fn new() -> Self {
        Mem::default()
    }

    pub fn load(&self, addr: Value) -> Value {
        self.cells.get(&addr).copied().unwrap_or(0)
    }

    pub fn store(&mut self, addr: Value, val: Value) {
        self.cells.insert(addr, val);
    }

    pub fn iter(&self) -> impl Iterator<Item = (Value, Value)> + '_ {
        self.cells.iter().map(|(a, v)| (*a, *v))
    }
}
