use enum_map::Enum;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use static_assertions::const_assert;
use std::convert::TryInto;
use strum_macros::{Display, EnumIter, EnumString};

pub type Byte = u8;
pub type Word = u16;

/// The width of every architectural register.
pub type Value = i32;

pub const BYTE_WIDTH: u32 = 8;
pub const WORD_WIDTH: u32 = 16;
pub const WORD_BYTES: usize = (WORD_WIDTH / BYTE_WIDTH) as usize;

pub const OPCODE_WIDTH: u32 = 3;
pub const FIELD_WIDTH: u32 = 3;
pub const IMM_WIDTH: u32 = 12;

const_assert!(OPCODE_WIDTH + IMM_WIDTH + 1 == WORD_WIDTH);
const_assert!(OPCODE_WIDTH + 4 * FIELD_WIDTH + 1 == WORD_WIDTH);

pub const FIELD_MASK: Word = (1 << FIELD_WIDTH) - 1;
pub const IMM_MASK: Word = (1 << IMM_WIDTH) - 1;

/// Literals in this (closed) range fit a single `inpv` word. Note that the
/// top of the range is one short of the largest 12-bit two's complement value.
pub const IMM_DIRECT_MIN: i64 = -2048;
pub const IMM_DIRECT_MAX: i64 = 2046;

pub const BANK_COUNT: usize = 8;

pub fn bytes_to_words_into_buff(buff: &mut [Word], bytes: &[Byte]) -> Option<()> {
    for (idx, ch) in bytes.chunks(WORD_BYTES).enumerate() {
        buff[idx] = Word::from_be_bytes(ch.try_into().ok()?)
    }
    Some(())
}

// Returns none if the data has bad parity.
pub fn bytes_to_words(bytes: &[Byte]) -> Option<Vec<Word>> {
    let mut buff = vec![0; bytes.len() / WORD_BYTES];
    bytes_to_words_into_buff(&mut buff, bytes).map(|_| buff)
}

/// Words are stored most-significant byte first, so the bit stream of a
/// program reads left to right exactly as the instruction fields are laid out.
pub fn words_to_bytes(v: &[Word]) -> Vec<Byte> {
    v.iter().flat_map(|w| w.to_be_bytes().to_vec()).collect()
}

/// Normalizes an intermediate result into `[-2^31, 2^31 - 1]` by adding or
/// subtracting multiples of `2^32`.
pub const fn wrap_value(v: i128) -> Value {
    v as Value
}

#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, FromPrimitive, Enum, EnumIter, EnumString,
)]
pub enum Reg {
    /// Address register, selects the memory cell behind `M`.
    A,
    /// Comparison flag, written by `comp`.
    C,
    D,
    /// Frame base of the current subroutine.
    L,
    /// Memory at the address held in `A`.
    M,
    /// Stack pointer, the next free stack cell.
    P,
    /// The scratch slot selected by the current bank index.
    T,
    /// Destination of immediate loads.
    V,
}

impl Default for Reg {
    fn default() -> Reg {
        Reg::A
    }
}

impl Reg {
    pub const fn code(self) -> Word {
        self as Word
    }

    pub fn from_code(code: Word) -> Reg {
        Reg::from_u16(code & FIELD_MASK).unwrap_or_default()
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, EnumIter, EnumString)]
pub enum Cond {
    #[strum(to_string = "nv")]
    Never,
    #[strum(to_string = ">")]
    Greater,
    #[strum(to_string = "==")]
    Equal,
    #[strum(to_string = ">=")]
    GreaterEqual,
    #[strum(to_string = "<")]
    Less,
    #[strum(to_string = "!=")]
    NotEqual,
    #[strum(to_string = "<=")]
    LessEqual,
    #[strum(to_string = "aw")]
    Always,
}

impl Cond {
    pub const fn code(self) -> Word {
        self as Word
    }

    pub fn from_code(code: Word) -> Cond {
        Cond::from_u16(code & FIELD_MASK).unwrap_or(Cond::Never)
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, EnumIter, EnumString)]
pub enum AluOp {
    #[strum(to_string = "add")]
    Add,
    #[strum(to_string = "sub")]
    Sub,
    #[strum(to_string = "mul")]
    Mul,
    #[strum(to_string = "div")]
    Div,
    #[strum(to_string = "rmv")]
    ShiftRight,
    #[strum(to_string = "lmv")]
    ShiftLeft,
    #[strum(to_string = "and")]
    And,
    #[strum(to_string = "or_")]
    Or,
}

impl AluOp {
    pub const fn code(self) -> Word {
        self as Word
    }

    pub fn from_code(code: Word) -> AluOp {
        AluOp::from_u16(code & FIELD_MASK).unwrap_or(AluOp::Add)
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum Opcode {
    LoadImm,
    Copy,
    Jump,
    Compare,
    Alu,
    ExtendImm,
    SetBank,
}

impl Opcode {
    pub const SHIFT: u32 = WORD_WIDTH - OPCODE_WIDTH;

    pub const fn encode(self) -> Word {
        (self as Word) << Opcode::SHIFT
    }

    pub fn decode(raw: Word) -> Option<Opcode> {
        Opcode::from_u16(raw >> Opcode::SHIFT)
    }
}
