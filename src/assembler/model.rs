use super::phases::types::{LabelName, Located};
use crate::spec::{
    inst::{self, Instruction},
    types::hw::{self, AluOp, Byte, Cond, Reg, Word},
};
use itertools::Itertools;
use std::{collections::BTreeMap, fmt::Display, str::FromStr};

/// Label name to byte offset, scoped to one assembly run.
pub type LabelTable = BTreeMap<LabelName, usize>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Reg,
    Indirect,
    RegOrIndirect,
    Literal,
    Name,
}

impl Display for ArgKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArgKind::Reg => write!(f, "a register ($X)"),
            ArgKind::Indirect => write!(f, "an indirect register (@X)"),
            ArgKind::RegOrIndirect => write!(f, "a register ($X) or indirect register (@X)"),
            ArgKind::Literal => write!(f, "a decimal literal"),
            ArgKind::Name => write!(f, "a label name"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgError {
    UnknownRegister(String),
    Expected(ArgKind, String),
    MalformedLiteral(String),
    /// The register is overwritten by the instruction sequence before it is read.
    Clobbered(Reg),
}

impl Display for ArgError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArgError::UnknownRegister(tk) => write!(f, "Unknown register '{}'", tk),
            ArgError::Expected(kind, tk) => write!(f, "Expected {}, found '{}'", kind, tk),
            ArgError::MalformedLiteral(tk) => {
                write!(f, "Malformed literal '{}': not a 64-bit decimal integer", tk)
            }
            ArgError::Clobbered(r) => write!(
                f,
                "Register '${}' cannot be used here, this form overwrites it before reading it",
                r
            ),
        }
    }
}

/// An operand as written in assembly text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand<'a> {
    Reg(Reg),
    Indirect(Reg),
    Literal(i64),
    Name(&'a str),
}

fn is_literal_like(tk: &str) -> bool {
    let digits = tk.strip_prefix('-').or_else(|| tk.strip_prefix('+')).unwrap_or(tk);
    digits.starts_with(|c: char| c.is_ascii_digit())
}

impl<'a> Operand<'a> {
    pub fn parse(tk: &'a str) -> Result<Operand<'a>, ArgError> {
        let reg = |name: &str| {
            Reg::from_str(name).map_err(|_| ArgError::UnknownRegister(tk.to_owned()))
        };

        if let Some(name) = tk.strip_prefix('$') {
            Ok(Operand::Reg(reg(name)?))
        } else if let Some(name) = tk.strip_prefix('@') {
            Ok(Operand::Indirect(reg(name)?))
        } else if is_literal_like(tk) {
            i64::from_str(tk)
                .map(Operand::Literal)
                .map_err(|_| ArgError::MalformedLiteral(tk.to_owned()))
        } else {
            Ok(Operand::Name(tk))
        }
    }
}

impl<'a> Located<&'a str> {
    pub fn operand<E: From<ArgError>>(&self) -> Result<Operand<'a>, Located<E>> {
        Operand::parse(self.get()).map_err(|err| self.transfer(E::from(err)))
    }

    fn expect<S, E: From<ArgError>>(
        &self,
        kind: ArgKind,
        f: impl FnOnce(Operand<'a>) -> Option<S>,
    ) -> Result<S, Located<E>> {
        match f(self.operand()?) {
            Some(s) => Ok(s),
            None => self.err(E::from(ArgError::Expected(kind, self.get().to_string()))),
        }
    }

    pub fn reg<E: From<ArgError>>(&self) -> Result<Reg, Located<E>> {
        self.expect(ArgKind::Reg, |op| match op {
            Operand::Reg(r) => Some(r),
            _ => None,
        })
    }

    pub fn indirect<E: From<ArgError>>(&self) -> Result<Reg, Located<E>> {
        self.expect(ArgKind::Indirect, |op| match op {
            Operand::Indirect(r) => Some(r),
            _ => None,
        })
    }

    /// Checks that `r`, the register named by this token, is not one of
    /// `clobbered`.
    pub fn unclobbered<E: From<ArgError>>(
        &self,
        r: Reg,
        clobbered: &[Reg],
    ) -> Result<Reg, Located<E>> {
        if clobbered.contains(&r) {
            self.err(E::from(ArgError::Clobbered(r)))
        } else {
            Ok(r)
        }
    }

    pub fn literal<E: From<ArgError>>(&self) -> Result<i64, Located<E>> {
        self.expect(ArgKind::Literal, |op| match op {
            Operand::Literal(v) => Some(v),
            _ => None,
        })
    }

    pub fn name<E: From<ArgError>>(&self) -> Result<&'a str, Located<E>> {
        self.expect(ArgKind::Name, |op| match op {
            Operand::Name(n) => Some(n),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Imm {
    Value(i64),
    Label(LabelName),
}

/// A primitive operation of the reduced vocabulary. Apart from label
/// references, each maps onto exactly one `Instruction` (or one chain of them).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Inpv(Imm),
    Copy(Reg, Reg),
    Jump(Reg, Reg),
    Comp(Reg, Cond, Reg),
    Alu(AluOp, Reg, Reg, Reg),
    Sett(u8),
}

impl Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Op::Inpv(Imm::Value(v)) => write!(f, "inpv {}", v),
            Op::Inpv(Imm::Label(name)) => write!(f, "//getl {}", name),
            Op::Copy(src, dst) => write!(f, "copy ${} ${}", src, dst),
            Op::Jump(target, flag) => write!(f, "jump ${} ${}", target, flag),
            Op::Comp(lhs, cond, rhs) => write!(f, "comp ${} {} ${}", lhs, cond, rhs),
            Op::Alu(op, lhs, rhs, dst) => write!(f, "{}r ${} ${} ${}", op, lhs, rhs, dst),
            Op::Sett(idx) => write!(f, "sett {}", idx),
        }
    }
}

impl Op {
    /// Instruction words occupied once resolved; label references are sized by
    /// the resolver instead.
    pub fn words(&self) -> Option<usize> {
        match self {
            Op::Inpv(Imm::Value(v)) => Some(inst::immediate_words(*v)),
            Op::Inpv(Imm::Label(_)) => None,
            _ => Some(1),
        }
    }

    pub fn encode<F, E>(&self, resolver: F) -> Result<Vec<Instruction>, E>
    where
        F: FnOnce(&str) -> Result<i64, E>,
    {
        Ok(match self {
            Op::Inpv(Imm::Value(v)) => inst::encode_immediate(*v),
            Op::Inpv(Imm::Label(name)) => inst::encode_immediate(resolver(name)?),
            Op::Copy(src, dst) => vec![Instruction::Copy {
                src: *src,
                dst: *dst,
            }],
            Op::Jump(target, flag) => vec![Instruction::Jump {
                target: *target,
                flag: *flag,
            }],
            Op::Comp(lhs, cond, rhs) => vec![Instruction::Compare {
                lhs: *lhs,
                cond: *cond,
                rhs: *rhs,
            }],
            Op::Alu(op, lhs, rhs, dst) => vec![Instruction::Alu {
                op: *op,
                lhs: *lhs,
                rhs: *rhs,
                dst: *dst,
            }],
            Op::Sett(idx) => vec![Instruction::SetBank(*idx)],
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    LabelDef(LabelName),
    Op(Op),
}

impl Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Statement::LabelDef(name) => write!(f, "//setl {}", name),
            Statement::Op(op) => write!(f, "{}", op),
        }
    }
}

/// The output of one assembly run: the instruction stream and where each label landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    insts: Vec<Instruction>,
    labels: LabelTable,
}

impl Program {
    pub fn new(insts: Vec<Instruction>, labels: LabelTable) -> Self {
        Program { insts, labels }
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.insts
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    pub fn byte_len(&self) -> usize {
        self.insts.len() * hw::WORD_BYTES
    }

    pub fn to_words(&self) -> Vec<Word> {
        self.insts.iter().map(Instruction::encode).collect()
    }

    pub fn to_bytes(&self) -> Vec<Byte> {
        hw::words_to_bytes(&self.to_words())
    }
}

impl Display for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.insts.iter().join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operand_sigils() {
        assert_eq!(Operand::parse("$D"), Ok(Operand::Reg(Reg::D)));
        assert_eq!(Operand::parse("@P"), Ok(Operand::Indirect(Reg::P)));
        assert_eq!(Operand::parse("-12"), Ok(Operand::Literal(-12)));
        assert_eq!(Operand::parse("+7"), Ok(Operand::Literal(7)));
        assert_eq!(Operand::parse("main.loop"), Ok(Operand::Name("main.loop")));
    }

    #[test]
    fn operand_errors() {
        assert_eq!(
            Operand::parse("$Q"),
            Err(ArgError::UnknownRegister(String::from("$Q")))
        );
        assert_eq!(
            Operand::parse("12ab"),
            Err(ArgError::MalformedLiteral(String::from("12ab")))
        );
        assert_eq!(
            Operand::parse("99999999999999999999"),
            Err(ArgError::MalformedLiteral(String::from("99999999999999999999")))
        );
    }

    #[test]
    fn located_accessors_report_expected_kind() {
        let tk = Located::from("@A");
        assert_eq!(tk.indirect::<ArgError>(), Ok(Reg::A));
        assert_eq!(
            tk.reg::<ArgError>(),
            Err(Located::from(ArgError::Expected(
                ArgKind::Reg,
                String::from("@A")
            )))
        );
    }

    #[test]
    fn program_serializes_big_endian() {
        let prog = Program::new(
            vec![
                Instruction::SetBank(1),
                Instruction::Copy {
                    src: Reg::V,
                    dst: Reg::D,
                },
            ],
            LabelTable::new(),
        );
        assert_eq!(prog.byte_len(), 4);
        assert_eq!(prog.to_bytes(), vec![0xC4, 0x00, 0x3D, 0x00]);
        assert_eq!(prog.to_string(), "sett 1\ncopy $V $D");
    }
}
