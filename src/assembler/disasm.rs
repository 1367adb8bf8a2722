use super::model::{Imm, Op};
use crate::spec::{
    inst::{DecodeError, ImmChain, Instruction},
    types::hw::{self, Byte, Word},
};
use std::{convert::TryFrom, fmt::Display};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    OddLength(usize),
    Decode { offset: usize, err: DecodeError },
    DanglingExtension { offset: usize },
    UnterminatedImmediate { offset: usize },
    ImmediateTooWide { offset: usize, width: u32 },
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::OddLength(len) => {
                write!(f, "Stream length {} is not a whole number of words", len)
            }
            Error::Decode { offset, err } => write!(f, "@{:#06X}: {}", offset, err),
            Error::DanglingExtension { offset } => write!(
                f,
                "@{:#06X}: Extension word without a preceding immediate load",
                offset
            ),
            Error::UnterminatedImmediate { offset } => write!(
                f,
                "@{:#06X}: Immediate chain is never terminated",
                offset
            ),
            Error::ImmediateTooWide { offset, width } => write!(
                f,
                "@{:#06X}: Immediate chain of {} bits does not fit a 64-bit literal",
                offset, width
            ),
        }
    }
}

impl std::error::Error for Error {}

fn decode_words(bytes: &[Byte]) -> Result<Vec<Word>, Error> {
    hw::bytes_to_words(bytes).ok_or(Error::OddLength(bytes.len()))
}

fn finish_chain(start: usize, chain: &ImmChain) -> Result<Op, Error> {
    let too_wide = Error::ImmediateTooWide {
        offset: start,
        width: chain.width(),
    };
    if chain.width() > 128 {
        return Err(too_wide);
    }
    let value = i64::try_from(chain.finish()).map_err(|_| too_wide)?;
    Ok(Op::Inpv(Imm::Value(value)))
}

/// Decodes a byte stream back into reduced-vocabulary operations, folding each
/// immediate chain into a single `inpv`. Label names are not recovered.
pub fn disassemble(bytes: &[Byte]) -> Result<Vec<Op>, Error> {
    let words = decode_words(bytes)?;

    let mut ops = Vec::new();
    let mut open: Option<(usize, ImmChain)> = None;

    let mut idx = 0;
    while idx < words.len() {
        let offset = idx * hw::WORD_BYTES;
        let inst = Instruction::decode(words[idx]).map_err(|err| Error::Decode { offset, err })?;
        idx += 1;

        if let Some((start, _)) = &open {
            if !matches!(inst, Instruction::ExtendImm { .. }) {
                return Err(Error::UnterminatedImmediate { offset: *start });
            }
        }

        let op = match inst {
            Instruction::LoadImm {
                chunk,
                continues: true,
            } => {
                let mut chain = ImmChain::default();
                chain.push(chunk);
                open = Some((offset, chain));
                continue;
            }
            Instruction::ExtendImm { chunk, continues } => {
                let (start, chain) = match &mut open {
                    Some((start, chain)) => (*start, chain),
                    None => return Err(Error::DanglingExtension { offset }),
                };
                chain.push(chunk);
                if continues {
                    continue;
                }
                let op = finish_chain(start, chain)?;
                open = None;
                op
            }
            Instruction::LoadImm {
                chunk,
                continues: false,
            } => {
                let mut chain = ImmChain::default();
                chain.push(chunk);
                Op::Inpv(Imm::Value(chain.finish() as i64))
            }
            Instruction::Copy { src, dst } => Op::Copy(src, dst),
            Instruction::Jump { target, flag } => Op::Jump(target, flag),
            Instruction::Compare { lhs, cond, rhs } => Op::Comp(lhs, cond, rhs),
            Instruction::Alu { op, lhs, rhs, dst } => Op::Alu(op, lhs, rhs, dst),
            Instruction::SetBank(bank) => Op::Sett(bank),
        };
        ops.push(op);
    }

    match open {
        Some((start, _)) => Err(Error::UnterminatedImmediate { offset: start }),
        None => Ok(ops),
    }
}

/// Renders operations one per line, in the text form the assembler accepts.
pub fn to_text(ops: &[Op]) -> String {
    let mut text = String::new();
    for op in ops {
        text.push_str(&op.to_string());
        text.push('\n');
    }
    text
}

/// A word-by-word listing of the raw stream. Undecodable words are shown
/// rather than rejected.
pub fn listing(bytes: &[Byte]) -> Result<Vec<String>, Error> {
    Ok(decode_words(bytes)?
        .iter()
        .enumerate()
        .map(|(idx, raw)| {
            let text = match Instruction::decode(*raw) {
                Ok(inst) => inst.to_string(),
                Err(err) => format!("?? {}", err),
            };
            format!("{:#06X}: {:04X}  {}", idx * hw::WORD_BYTES, raw, text)
        })
        .collect())
}
