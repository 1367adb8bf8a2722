use super::tokenize::{self, Line};
use super::types::Located;
use crate::assembler::model::{ArgError, Imm, Op, Statement};
use crate::spec::types::hw::{AluOp, Cond, BANK_COUNT};
use std::{convert::TryFrom, fmt::Display, str::FromStr};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    Arg(ArgError),
    WrongArity { mnemonic: String, found: usize },
    UnknownCommand(String),
    UnknownCondition(String),
    BankOutOfRange(i64),
}

impl From<ArgError> for Error {
    fn from(err: ArgError) -> Self {
        Error::Arg(err)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Arg(err) => write!(f, "{}", err),
            Error::WrongArity { mnemonic, found } => write!(
                f,
                "Unknown format: '{}' does not take {} argument(s)",
                mnemonic, found
            ),
            Error::UnknownCommand(cmd) => write!(f, "Unknown command: '{}'", cmd),
            Error::UnknownCondition(code) => write!(
                f,
                "Unknown condition code '{}', expected one of nv, >, ==, >=, <, !=, <=, aw",
                code
            ),
            Error::BankOutOfRange(idx) => write!(
                f,
                "Bank index {} out of range, must be in 0..{}",
                idx, BANK_COUNT
            ),
        }
    }
}

fn check_arity(toks: &[Located<&str>], n: usize) -> Result<(), Located<Error>> {
    if toks.len() == n + 1 {
        Ok(())
    } else {
        toks[0].err(Error::WrongArity {
            mnemonic: toks[0].get().to_string(),
            found: toks.len() - 1,
        })
    }
}

fn register_alu_op(mnemonic: &str) -> Option<AluOp> {
    AluOp::from_str(mnemonic.strip_suffix('r')?).ok()
}

impl Statement {
    pub fn parse_line(line: &Line) -> Result<Option<Located<Statement>>, Located<Error>> {
        let toks = tokenize::tokens(line);
        let first = match toks.first() {
            None => return Ok(None),
            Some(tk) => tk,
        };

        let stmt = match *first.get() {
            "//setl" => {
                check_arity(&toks, 1)?;
                Statement::LabelDef(toks[1].name::<Error>()?.to_owned())
            }
            "//getl" => {
                check_arity(&toks, 1)?;
                Statement::Op(Op::Inpv(Imm::Label(toks[1].name::<Error>()?.to_owned())))
            }
            "inpv" => {
                check_arity(&toks, 1)?;
                Statement::Op(Op::Inpv(Imm::Value(toks[1].literal::<Error>()?)))
            }
            "copy" => {
                check_arity(&toks, 2)?;
                Statement::Op(Op::Copy(toks[1].reg::<Error>()?, toks[2].reg::<Error>()?))
            }
            "jump" => {
                check_arity(&toks, 2)?;
                Statement::Op(Op::Jump(toks[1].reg::<Error>()?, toks[2].reg::<Error>()?))
            }
            "comp" => {
                check_arity(&toks, 3)?;
                let lhs = toks[1].reg::<Error>()?;
                let cond = Cond::from_str(toks[2].get())
                    .or_else(|_| toks[2].err(Error::UnknownCondition(toks[2].get().to_string())))?;
                let rhs = toks[3].reg::<Error>()?;
                Statement::Op(Op::Comp(lhs, cond, rhs))
            }
            "sett" => {
                check_arity(&toks, 1)?;
                let idx = toks[1].literal::<Error>()?;
                match u8::try_from(idx) {
                    Ok(i) if (i as usize) < BANK_COUNT => Statement::Op(Op::Sett(i)),
                    _ => return toks[1].err(Error::BankOutOfRange(idx)),
                }
            }
            cmd => match register_alu_op(cmd) {
                Some(op) => {
                    check_arity(&toks, 3)?;
                    Statement::Op(Op::Alu(
                        op,
                        toks[1].reg::<Error>()?,
                        toks[2].reg::<Error>()?,
                        toks[3].reg::<Error>()?,
                    ))
                }
                None => return first.err(Error::UnknownCommand(cmd.to_owned())),
            },
        };

        Ok(Some(line.transfer(stmt)))
    }
}

pub fn parse(lines: &[Line]) -> Result<Vec<Located<Statement>>, Located<Error>> {
    let mut stmts = Vec::with_capacity(lines.len());
    for line in lines {
        if let Some(stmt) = Statement::parse_line(line)? {
            stmts.push(stmt);
        }
    }
    Ok(stmts)
}
