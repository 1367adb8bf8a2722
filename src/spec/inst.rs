use super::types::hw::{
    AluOp, Cond, Opcode, Reg, Word, FIELD_MASK, FIELD_WIDTH, IMM_DIRECT_MAX, IMM_DIRECT_MIN,
    IMM_MASK, IMM_WIDTH,
};
use std::fmt::Display;

/*
    Instruction layout, most significant bit first (each character is a bit, `_` must be zero):

        LoadImmediate     000 VVVVVVVVVVVV K
        Copy              001 SSS DDD _______
        Jump              010 TTT FFF _______
        Compare           011 LLL CCC RRR ____
        AluOp             100 OOO LLL RRR DDD _
        ExtendImmediate   101 VVVVVVVVVVVV K
        SetBank           110 III __________

    `K` is the continuation flag: when set, the immediate carries on into the
    following `ExtendImmediate` word. Opcode `111` is unassigned.
*/

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    LoadImm { chunk: Word, continues: bool },
    Copy { src: Reg, dst: Reg },
    Jump { target: Reg, flag: Reg },
    Compare { lhs: Reg, cond: Cond, rhs: Reg },
    Alu { op: AluOp, lhs: Reg, rhs: Reg, dst: Reg },
    ExtendImm { chunk: Word, continues: bool },
    SetBank(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    InvalidOpcode(Word),
    NonZeroPadding(Word),
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::InvalidOpcode(raw) => write!(f, "Invalid opcode in word {:#06X}", raw),
            DecodeError::NonZeroPadding(raw) => {
                write!(f, "Unused bits are not zero in word {:#06X}", raw)
            }
        }
    }
}

/// Shift of the n-th 3-bit field following the opcode.
const fn field_shift(n: u32) -> u32 {
    Opcode::SHIFT - (n + 1) * FIELD_WIDTH
}

const fn field(raw: Word, n: u32) -> Word {
    (raw >> field_shift(n)) & FIELD_MASK
}

const fn pad_mask(fields: u32) -> Word {
    (1 << field_shift(fields - 1)) - 1
}

const IMM_SHIFT: u32 = 1;

/// Sign-extends the low `width` bits of `raw`.
pub fn sign_extend(raw: u128, width: u32) -> i128 {
    if width == 0 {
        0
    } else if width >= 128 {
        raw as i128
    } else {
        let shift = 128 - width;
        ((raw << shift) as i128) >> shift
    }
}

impl Instruction {
    pub fn opcode(&self) -> Opcode {
        match self {
            Instruction::LoadImm { .. } => Opcode::LoadImm,
            Instruction::Copy { .. } => Opcode::Copy,
            Instruction::Jump { .. } => Opcode::Jump,
            Instruction::Compare { .. } => Opcode::Compare,
            Instruction::Alu { .. } => Opcode::Alu,
            Instruction::ExtendImm { .. } => Opcode::ExtendImm,
            Instruction::SetBank(_) => Opcode::SetBank,
        }
    }

    pub fn encode(&self) -> Word {
        let body = match *self {
            Instruction::LoadImm { chunk, continues } | Instruction::ExtendImm { chunk, continues } => {
                ((chunk & IMM_MASK) << IMM_SHIFT) | continues as Word
            }
            Instruction::Copy { src, dst } => {
                (src.code() << field_shift(0)) | (dst.code() << field_shift(1))
            }
            Instruction::Jump { target, flag } => {
                (target.code() << field_shift(0)) | (flag.code() << field_shift(1))
            }
            Instruction::Compare { lhs, cond, rhs } => {
                (lhs.code() << field_shift(0))
                    | (cond.code() << field_shift(1))
                    | (rhs.code() << field_shift(2))
            }
            Instruction::Alu { op, lhs, rhs, dst } => {
                (op.code() << field_shift(0))
                    | (lhs.code() << field_shift(1))
                    | (rhs.code() << field_shift(2))
                    | (dst.code() << field_shift(3))
            }
            Instruction::SetBank(idx) => ((idx as Word) & FIELD_MASK) << field_shift(0),
        };

        self.opcode().encode() | body
    }

    pub fn decode(raw: Word) -> Result<Instruction, DecodeError> {
        let opcode = Opcode::decode(raw).ok_or(DecodeError::InvalidOpcode(raw))?;

        let padding = match opcode {
            Opcode::LoadImm | Opcode::ExtendImm => 0,
            Opcode::Copy | Opcode::Jump => pad_mask(2),
            Opcode::Compare => pad_mask(3),
            Opcode::Alu => pad_mask(4),
            Opcode::SetBank => pad_mask(1),
        };
        if raw & padding != 0 {
            return Err(DecodeError::NonZeroPadding(raw));
        }

        let chunk = (raw >> IMM_SHIFT) & IMM_MASK;
        let continues = raw & 1 != 0;

        Ok(match opcode {
            Opcode::LoadImm => Instruction::LoadImm { chunk, continues },
            Opcode::ExtendImm => Instruction::ExtendImm { chunk, continues },
            Opcode::Copy => Instruction::Copy {
                src: Reg::from_code(field(raw, 0)),
                dst: Reg::from_code(field(raw, 1)),
            },
            Opcode::Jump => Instruction::Jump {
                target: Reg::from_code(field(raw, 0)),
                flag: Reg::from_code(field(raw, 1)),
            },
            Opcode::Compare => Instruction::Compare {
                lhs: Reg::from_code(field(raw, 0)),
                cond: Cond::from_code(field(raw, 1)),
                rhs: Reg::from_code(field(raw, 2)),
            },
            Opcode::Alu => Instruction::Alu {
                op: AluOp::from_code(field(raw, 0)),
                lhs: Reg::from_code(field(raw, 1)),
                rhs: Reg::from_code(field(raw, 2)),
                dst: Reg::from_code(field(raw, 3)),
            },
            Opcode::SetBank => Instruction::SetBank(field(raw, 0) as u8),
        })
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Instruction::LoadImm {
                chunk,
                continues: false,
            } => write!(f, "inpv {}", sign_extend(chunk as u128, IMM_WIDTH)),
            Instruction::LoadImm {
                chunk,
                continues: true,
            } => write!(f, "inpv {:#05X} 1", chunk),
            Instruction::ExtendImm { chunk, continues } => {
                write!(f, "exte {:#05X} {}", chunk, continues as u8)
            }
            Instruction::Copy { src, dst } => write!(f, "copy ${} ${}", src, dst),
            Instruction::Jump { target, flag } => write!(f, "jump ${} ${}", target, flag),
            Instruction::Compare { lhs, cond, rhs } => {
                write!(f, "comp ${} {} ${}", lhs, cond, rhs)
            }
            Instruction::Alu { op, lhs, rhs, dst } => {
                write!(f, "{}r ${} ${} ${}", op, lhs, rhs, dst)
            }
            Instruction::SetBank(idx) => write!(f, "sett {}", idx),
        }
    }
}

pub fn is_direct_immediate(value: i64) -> bool {
    (IMM_DIRECT_MIN..=IMM_DIRECT_MAX).contains(&value)
}

/// Bit width of the chained form of `value`: one guard bit above its
/// magnitude, then rounded up past the next multiple of the chunk width.
fn chained_width(value: i64) -> u32 {
    let magnitude = (value as i128).unsigned_abs();
    let bits = (128 - magnitude.leading_zeros()) + 1;
    bits + IMM_WIDTH - bits % IMM_WIDTH
}

/// The number of instruction words `inpv value` assembles to.
pub fn immediate_words(value: i64) -> usize {
    if is_direct_immediate(value) {
        1
    } else {
        (chained_width(value) / IMM_WIDTH) as usize
    }
}

pub fn encode_immediate(value: i64) -> Vec<Instruction> {
    if is_direct_immediate(value) {
        return vec![Instruction::LoadImm {
            chunk: (value as Word) & IMM_MASK,
            continues: false,
        }];
    }

    let chunks = chained_width(value) / IMM_WIDTH;
    let pattern = value as i128 as u128;
    (0..chunks)
        .map(|i| {
            let shift = (chunks - 1 - i) * IMM_WIDTH;
            let chunk = (pattern >> shift) as Word & IMM_MASK;
            let continues = i + 1 < chunks;
            if i == 0 {
                Instruction::LoadImm { chunk, continues }
            } else {
                Instruction::ExtendImm { chunk, continues }
            }
        })
        .collect()
}

/// Accumulates the chunks of a chained immediate, most significant first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImmChain {
    bits: u128,
    width: u32,
}

impl ImmChain {
    pub fn push(&mut self, chunk: Word) {
        self.bits = (self.bits << IMM_WIDTH) | (chunk & IMM_MASK) as u128;
        self.width = self.width.saturating_add(IMM_WIDTH);
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    /// Interprets the accumulated bits as a two's complement integer. Chains
    /// wider than 128 bits keep only their low 128 bits.
    pub fn finish(&self) -> i128 {
        sign_extend(self.bits, self.width)
    }
}
