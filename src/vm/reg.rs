use super::mem::Mem;
use crate::spec::types::hw::{Reg, Value, BANK_COUNT};
use enum_map::EnumMap;
use std::fmt::Display;

/// The architectural registers. `M` and `T` have no storage of their own:
/// `M` is the memory cell addressed by `A`, and `T` is the scratch slot picked
/// by the bank index.
#[derive(Debug, Clone, Default)]
pub struct RegFile {
    regs: EnumMap<Reg, Value>,
    bank: usize,
    scratch: [Value; BANK_COUNT],
}

impl Display for RegFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "RA: {:>11} RC: {:>11} RD: {:>11}",
            self.regs[Reg::A],
            self.regs[Reg::C],
            self.regs[Reg::D]
        )?;
        writeln!(
            f,
            "RL: {:>11} RP: {:>11} RV: {:>11}",
            self.regs[Reg::L],
            self.regs[Reg::P],
            self.regs[Reg::V]
        )?;
        write!(f, "BANK: {} SCRATCH:", self.bank)?;
        for (idx, val) in self.scratch.iter().enumerate() {
            let mark = if idx == self.bank { "*" } else { "" };
            write!(f, " {}{}", val, mark)?;
        }
        writeln!(f)
    }
}

impl RegFile {
    pub fn new() -> Self {
        RegFile::default()
    }

    pub fn read(&self, r: Reg, mem: &Mem) -> Value {
        match r {
            Reg::M => mem.load(self.regs[Reg::A]),
            Reg::T => self.scratch[self.bank],
            _ => self.regs[r],
        }
    }

    pub fn write(&mut self, r: Reg, val: Value, mem: &mut Mem) {
        match r {
            Reg::M => mem.store(self.regs[Reg::A], val),
            Reg::T => self.scratch[self.bank] = val,
            _ => self.regs[r] = val,
        }
    }

    pub fn bank(&self) -> usize {
        self.bank
    }

    pub fn set_bank(&mut self, bank: usize) {
        self.bank = bank % BANK_COUNT;
    }

    pub fn scratch(&self) -> &[Value; BANK_COUNT] {
        &self.scratch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_register_goes_through_address() {
        let mut mem = Mem::new();
        let mut rf = RegFile::new();
        rf.write(Reg::A, 12, &mut mem);
        rf.write(Reg::M, 99, &mut mem);
        assert_eq!(mem.load(12), 99);
        assert_eq!(rf.read(Reg::M, &mem), 99);
        rf.write(Reg::A, 13, &mut mem);
        assert_eq!(rf.read(Reg::M, &mem), 0);
    }

    #[test]
    fn scratch_is_indexed_by_bank() {
        let mut mem = Mem::new();
        let mut rf = RegFile::new();
        rf.write(Reg::T, 5, &mut mem);
        rf.set_bank(7);
        assert_eq!(rf.read(Reg::T, &mem), 0);
        rf.write(Reg::T, -8, &mut mem);
        rf.set_bank(0);
        assert_eq!(rf.read(Reg::T, &mem), 5);
        assert_eq!(rf.scratch()[7], -8);
        assert_eq!(rf.bank(), 0);
    }

    #[test]
    fn plain_registers_are_independent() {
        let mut mem = Mem::new();
        let mut rf = RegFile::new();
        rf.write(Reg::D, 1, &mut mem);
        rf.write(Reg::V, 2, &mut mem);
        assert_eq!(rf.read(Reg::D, &mem), 1);
        assert_eq!(rf.read(Reg::V, &mem), 2);
        assert_eq!(rf.read(Reg::C, &mem), 0);
    }
}
