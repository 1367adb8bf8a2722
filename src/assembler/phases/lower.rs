use super::tokenize::{self, Line};
use super::types::Located;
use crate::assembler::model::ArgError;
use crate::common;
use crate::spec::types::hw::{AluOp, Reg};
use std::{fmt::Display, str::FromStr};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    Arg(ArgError),
    WrongArity { mnemonic: String, found: usize },
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

/// `addv`, `subv`, ... name the ALU op with a trailing `v`.
fn immediate_alu_op(mnemonic: &str) -> Option<AluOp> {
    AluOp::from_str(mnemonic.strip_suffix('v')?).ok()
}

fn lower_line(line: &Line) -> Result<Vec<Line>, Located<Error>> {
    let toks = tokenize::tokens(line);
    let mnemonic = match toks.first() {
        None => return Ok(Vec::new()),
        Some(tk) => *tk.get(),
    };

    let out = match mnemonic {
        "setv" => {
            check_arity(&toks, 2)?;
            let dst = toks[1].reg::<Error>()?;
            let value = toks[2].literal::<Error>()?;
            vec![format!("inpv {}", value), format!("copy $V ${}", dst)]
        }
        "load" => {
            check_arity(&toks, 2)?;
            let addr = toks[1].indirect::<Error>()?;
            // `M` would name the cell at the new address.
            let dst = toks[2].reg::<Error>()?;
            let dst = toks[2].unclobbered::<Error>(dst, &[Reg::M])?;
            vec![format!("copy ${} $A", addr), format!("copy $M ${}", dst)]
        }
        "stor" => {
            check_arity(&toks, 2)?;
            let addr = toks[1].indirect::<Error>()?;
            let src = toks[2].reg::<Error>()?;
            let src = toks[2].unclobbered::<Error>(src, &[Reg::A, Reg::M])?;
            vec![format!("copy ${} $A", addr), format!("copy ${} $M", src)]
        }
        "setl" => {
            check_arity(&toks, 1)?;
            vec![format!("//setl {}", toks[1].name::<Error>()?)]
        }
        "getl" => {
            check_arity(&toks, 2)?;
            let dst = toks[1].reg::<Error>()?;
            let label = toks[2].name::<Error>()?;
            vec![format!("//getl {}", label), format!("copy $V ${}", dst)]
        }
        _ => match immediate_alu_op(mnemonic) {
            Some(op) => {
                check_arity(&toks, 3)?;
                let lhs = toks[1].reg::<Error>()?;
                let lhs = toks[1].unclobbered::<Error>(lhs, &[Reg::V])?;
                let value = toks[2].literal::<Error>()?;
                let dst = toks[3].reg::<Error>()?;
                vec![
                    format!("inpv {}", value),
                    format!("{}r ${} $V ${}", op, lhs, dst),
                ]
            }
            None => return Ok(vec![line.clone()]),
        },
    };

    Ok(out
        .into_iter()
        .map(|text| tokenize::derived(line, text))
        .collect())
}

pub fn lower(lines: Vec<Line>) -> Result<Vec<Line>, Located<Error>> {
    common::accumulate_vecs(lines.iter().map(lower_line))
}
