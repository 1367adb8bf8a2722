use super::{
    alu,
    mem::Mem,
    reg::RegFile,
    types::{Error, State},
};
use crate::assembler::Program;
use crate::spec::{
    inst::{sign_extend, ImmChain, Instruction},
    types::hw::{self, Byte, Reg, Value, Word, IMM_WIDTH},
};
use log::trace;
use std::fmt::Display;

pub struct Instance {
    prog: Vec<Word>,
    pc: usize,
    steps: u64,

    reg: RegFile,
    mem: Mem,
    pending: Option<ImmChain>,
}

impl Display for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "PC: {:#06X} STEPS: {} ({})",
            self.pc,
            self.steps,
            self.state()
        )?;
        write!(f, "{}", self.reg)?;
        write!(f, "{}", self.mem)
    }
}

impl Instance {
    pub fn new(bytes: &[Byte]) -> Result<Self, Error> {
        let prog = hw::bytes_to_words(bytes).ok_or(Error::OddLength(bytes.len()))?;
        Ok(Instance::from_words(prog))
    }

    pub fn from_program(prog: &Program) -> Self {
        Instance::from_words(prog.to_words())
    }

    fn from_words(prog: Vec<Word>) -> Self {
        Instance {
            prog,
            pc: 0,
            steps: 0,
            reg: RegFile::new(),
            mem: Mem::new(),
            pending: None,
        }
    }

    pub fn state(&self) -> State {
        if self.pc >= self.byte_len() {
            State::Finished
        } else {
            State::Running
        }
    }

    pub fn byte_len(&self) -> usize {
        self.prog.len() * hw::WORD_BYTES
    }

    /// Byte offset of the next instruction.
    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Reads a register as an instruction would, so `M` and `T` are resolved
    /// through the address register and the bank index.
    pub fn reg(&self, r: Reg) -> Value {
        self.reg.read(r, &self.mem)
    }

    pub fn regs(&self) -> &RegFile {
        &self.reg
    }

    pub fn mem(&self) -> &Mem {
        &self.mem
    }

    fn write(&mut self, r: Reg, val: Value) {
        self.reg.write(r, val, &mut self.mem)
    }

    fn jump(&mut self, target: Value) -> Result<(), Error> {
        if target < 0 || target as usize % hw::WORD_BYTES != 0 {
            return Err(Error::InvalidJumpTarget {
                offset: self.pc,
                target,
            });
        }
        self.pc = target as usize;
        Ok(())
    }

    fn execute(&mut self, inst: Instruction) -> Result<(), Error> {
        match inst {
            Instruction::LoadImm {
                chunk,
                continues: false,
            } => {
                self.pending = None;
                self.write(Reg::V, hw::wrap_value(sign_extend(chunk as u128, IMM_WIDTH)));
            }
            Instruction::LoadImm {
                chunk,
                continues: true,
            } => {
                let mut chain = ImmChain::default();
                chain.push(chunk);
                self.pending = Some(chain);
            }
            Instruction::ExtendImm { chunk, continues } => {
                let chain = self.pending.get_or_insert_with(ImmChain::default);
                chain.push(chunk);
                if !continues {
                    let val = hw::wrap_value(chain.finish());
                    self.pending = None;
                    self.write(Reg::V, val);
                }
            }
            Instruction::Copy { src, dst } => {
                let val = self.reg(src);
                self.write(dst, val);
            }
            Instruction::Jump { target, flag } => {
                if self.reg(flag) != 0 {
                    return self.jump(self.reg(target));
                }
            }
            Instruction::Compare { lhs, cond, rhs } => {
                let flag = alu::compare(cond, self.reg(lhs), self.reg(rhs));
                self.write(Reg::C, flag as Value);
            }
            Instruction::Alu { op, lhs, rhs, dst } => {
                let val = alu::eval(op, self.reg(lhs), self.reg(rhs));
                self.write(dst, val);
            }
            Instruction::SetBank(bank) => self.reg.set_bank(bank as usize),
        }

        self.pc += hw::WORD_BYTES;
        Ok(())
    }

    /// Executes one instruction. Once the program has finished this does nothing.
    pub fn step(&mut self) -> Result<State, Error> {
        if self.state() == State::Finished {
            return Ok(State::Finished);
        }

        let offset = self.pc;
        let raw = self.prog[offset / hw::WORD_BYTES];
        let inst = Instruction::decode(raw).map_err(|err| Error::Decode { offset, err })?;
        trace!("{:#06X}: {}", offset, inst);

        self.steps += 1;
        self.execute(inst)?;
        Ok(self.state())
    }

    /// Runs until the program finishes, or until `max_steps` more instructions
    /// have executed.
    pub fn run(&mut self, max_steps: Option<u64>) -> Result<State, Error> {
        let mut remaining = max_steps;
        while self.state() == State::Running {
            match &mut remaining {
                Some(0) => return Ok(State::Timeout),
                Some(n) => *n -= 1,
                None => (),
            }
            self.step()?;
        }
        Ok(State::Finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{
        inst,
        types::hw::{AluOp, Cond},
    };

    fn instance(insts: &[Instruction]) -> Instance {
        let words = insts.iter().map(Instruction::encode).collect::<Vec<_>>();
        Instance::new(&hw::words_to_bytes(&words)).unwrap()
    }

    fn load(v: i64) -> Vec<Instruction> {
        inst::encode_immediate(v)
    }

    #[test]
    fn odd_length_is_rejected() {
        assert_eq!(Instance::new(&[0, 0, 0]).err(), Some(Error::OddLength(3)));
    }

    #[test]
    fn empty_program_is_finished() {
        let mut vm = instance(&[]);
        assert_eq!(vm.state(), State::Finished);
        assert_eq!(vm.run(None), Ok(State::Finished));
        assert_eq!(vm.steps(), 0);
    }

    #[test]
    fn immediates_reach_v() {
        for v in &[0i64, -1, 2046, -2048, 2047, -2049, 1 << 30, -(1 << 31)] {
            let mut vm = instance(&load(*v));
            vm.run(None).unwrap();
            assert_eq!(vm.reg(Reg::V) as i64, *v);
        }
    }

    #[test]
    fn wide_immediates_wrap() {
        let mut vm = instance(&load(1 << 32));
        vm.run(None).unwrap();
        assert_eq!(vm.reg(Reg::V), 0);

        let mut vm = instance(&load((1 << 31) + 5));
        vm.run(None).unwrap();
        assert_eq!(vm.reg(Reg::V), Value::min_value() + 5);
    }

    #[test]
    fn orphan_extension_starts_a_chain() {
        let mut vm = instance(&[Instruction::ExtendImm {
            chunk: 0x7FF,
            continues: false,
        }]);
        vm.run(None).unwrap();
        assert_eq!(vm.reg(Reg::V), 0x7FF);
    }

    #[test]
    fn division_by_zero_continues() {
        let mut insts = load(9);
        insts.push(Instruction::Copy {
            src: Reg::V,
            dst: Reg::D,
        });
        insts.push(Instruction::Alu {
            op: AluOp::Div,
            lhs: Reg::D,
            rhs: Reg::C,
            dst: Reg::D,
        });
        insts.extend(load(4));
        let mut vm = instance(&insts);
        assert_eq!(vm.run(None), Ok(State::Finished));
        assert_eq!(vm.reg(Reg::D), 0);
        assert_eq!(vm.reg(Reg::V), 4);
    }

    #[test]
    fn memory_goes_through_a() {
        let mut insts = load(40);
        insts.push(Instruction::Copy {
            src: Reg::V,
            dst: Reg::A,
        });
        insts.extend(load(-3));
        insts.push(Instruction::Copy {
            src: Reg::V,
            dst: Reg::M,
        });
        let mut vm = instance(&insts);
        vm.run(None).unwrap();
        assert_eq!(vm.mem().load(40), -3);
        assert_eq!(vm.reg(Reg::M), -3);
    }

    #[test]
    fn set_bank_selects_scratch() {
        let mut insts = load(11);
        insts.push(Instruction::SetBank(3));
        insts.push(Instruction::Copy {
            src: Reg::V,
            dst: Reg::T,
        });
        insts.push(Instruction::SetBank(0));
        let mut vm = instance(&insts);
        vm.run(None).unwrap();
        assert_eq!(vm.reg(Reg::T), 0);
        assert_eq!(vm.regs().scratch()[3], 11);
    }

    #[test]
    fn taken_and_untaken_jumps() {
        // The first jump falls through with C = 0, the second skips the copy
        // and lands on the end of the program.
        let insts = [
            Instruction::LoadImm {
                chunk: 10,
                continues: false,
            },
            Instruction::Jump {
                target: Reg::V,
                flag: Reg::C,
            },
            Instruction::Compare {
                lhs: Reg::D,
                cond: Cond::Always,
                rhs: Reg::D,
            },
            Instruction::Jump {
                target: Reg::V,
                flag: Reg::C,
            },
            Instruction::Copy {
                src: Reg::V,
                dst: Reg::D,
            },
        ];
        let mut vm = instance(&insts);
        assert_eq!(vm.run(None), Ok(State::Finished));
        assert_eq!(vm.steps(), 4);
        assert_eq!(vm.reg(Reg::D), 0);
        assert_eq!(vm.pc(), 10);
    }

    #[test]
    fn bad_jump_targets() {
        for target in &[3i64, -2] {
            let mut insts = load(*target);
            insts.push(Instruction::Jump {
                target: Reg::V,
                flag: Reg::V,
            });
            let offset = (insts.len() - 1) * hw::WORD_BYTES;
            let mut vm = instance(&insts);
            assert_eq!(
                vm.run(None),
                Err(Error::InvalidJumpTarget {
                    offset,
                    target: *target as Value
                })
            );
        }
    }

    #[test]
    fn step_limit_times_out() {
        // Jumps back to 0 forever.
        let insts = [
            Instruction::LoadImm {
                chunk: 0,
                continues: false,
            },
            Instruction::Compare {
                lhs: Reg::D,
                cond: Cond::Always,
                rhs: Reg::D,
            },
            Instruction::Jump {
                target: Reg::V,
                flag: Reg::C,
            },
        ];
        let mut vm = instance(&insts);
        assert_eq!(vm.run(Some(100)), Ok(State::Timeout));
        assert_eq!(vm.steps(), 100);
        assert_eq!(vm.state(), State::Running);
    }

    #[test]
    fn decode_errors_keep_state() {
        let mut bytes = hw::words_to_bytes(&[Instruction::SetBank(2).encode()]);
        bytes.extend_from_slice(&[0xFF, 0xFF]);
        let mut vm = Instance::new(&bytes).unwrap();
        assert!(matches!(vm.run(None), Err(Error::Decode { offset: 2, .. })));
        assert_eq!(vm.regs().bank(), 2);
        assert_eq!(vm.pc(), 2);
    }
}
