use super::tokenize::{self, Line};
use super::types::Located;
use crate::assembler::model::{ArgError, ArgKind, Operand};
use crate::common;
use crate::spec::types::hw::Reg;
use std::{convert::TryFrom, fmt::Display};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    Arg(ArgError),
    WrongArity { mnemonic: String, found: usize },
    UnknownFlag(String),
    BadArgCount(i64),
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
            Error::UnknownFlag(flag) => write!(
                f,
                "flag must be 'true', 'false' or 'all', found '{}'",
                flag
            ),
            Error::BadArgCount(n) => write!(f, "Argument count must be non-negative, found {}", n),
        }
    }
}

const RETURN_LABEL_PREFIX: &str = "__ret.";

const INTERNAL_MARKERS: [&str; 2] = ["//setl", "//getl"];

fn is_dropped(mnemonic: &str) -> bool {
    (mnemonic.starts_with("//") && !INTERNAL_MARKERS.contains(&mnemonic))
        || mnemonic.starts_with("debug")
}

fn push_from(reg: &str) -> [String; 2] {
    [format!("stor @P ${}", reg), "addv $P 1 $P".to_owned()]
}

fn check_arity(toks: &[Located<&str>], allowed: &[usize]) -> Result<(), Located<Error>> {
    let found = toks.len() - 1;
    if allowed.contains(&found) {
        Ok(())
    } else {
        toks[0].err(Error::WrongArity {
            mnemonic: toks[0].get().to_string(),
            found,
        })
    }
}

/// Expands the stack and control-flow macros. Holds the counter used to name
/// the return label of each `call`, so one `Expander` should see a whole program.
#[derive(Debug, Default)]
pub struct Expander {
    next_return: usize,
}

impl Expander {
    pub fn expand_line(&mut self, line: &Line) -> Result<Vec<Line>, Located<Error>> {
        let toks = tokenize::tokens(line);
        let mnemonic = match toks.first() {
            None => return Ok(Vec::new()),
            Some(tk) => *tk.get(),
        };

        if is_dropped(mnemonic) {
            return Ok(Vec::new());
        }

        let out = match mnemonic {
            "label" => {
                check_arity(&toks, &[1])?;
                vec![format!("setl {}", toks[1].name::<Error>()?)]
            }
            "push" => Expander::push(&toks)?,
            "pop" => Expander::pop(&toks)?,
            "goto" => Expander::goto(&toks)?,
            "call" => {
                check_arity(&toks, &[2])?;
                let target = toks[1].name::<Error>()?;
                let argc = toks[2].literal::<Error>()?;
                let argc = usize::try_from(argc).or_else(|_| toks[2].err(Error::BadArgCount(argc)))?;
                self.call(target, argc)
            }
            "return" => {
                check_arity(&toks, &[0])?;
                Expander::ret()
            }
            _ => return Ok(vec![line.clone()]),
        };

        Ok(out
            .into_iter()
            .map(|text| tokenize::derived(line, text))
            .collect())
    }

    fn push(toks: &[Located<&str>]) -> Result<Vec<String>, Located<Error>> {
        check_arity(toks, &[1, 2])?;
        let arg = &toks[1];
        let mut out = match (arg.operand::<Error>()?, toks.get(2)) {
            (Operand::Literal(v), None) => vec![format!("inpv {}", v), "stor @P $V".to_owned()],
            (Operand::Reg(r), None) => {
                // `stor` moves `P` into `A` first.
                let r = arg.unclobbered::<Error>(r, &[Reg::A, Reg::M])?;
                return Ok(push_from(&r.to_string()).to_vec());
            }
            (Operand::Indirect(r), None) => {
                vec![format!("load @{} $D", r), "stor @P $D".to_owned()]
            }
            (Operand::Reg(r), Some(k)) => {
                let r = arg.unclobbered::<Error>(r, &[Reg::V])?;
                vec![
                    format!("addv ${} {} $D", r, k.literal::<Error>()?),
                    "stor @P $D".to_owned(),
                ]
            }
            (Operand::Indirect(r), Some(k)) => {
                // The address is computed in bank 7 with `V` holding the offset.
                let r = arg.unclobbered::<Error>(r, &[Reg::T, Reg::V])?;
                vec![
                    "sett 7".to_owned(),
                    format!("addv ${} {} $T", r, k.literal::<Error>()?),
                    "load @T $D".to_owned(),
                    "sett 0".to_owned(),
                    "stor @P $D".to_owned(),
                ]
            }
            (_, k) => {
                let expected = if k.is_some() {
                    ArgKind::RegOrIndirect
                } else {
                    ArgKind::Literal
                };
                return arg.err(Error::Arg(ArgError::Expected(
                    expected,
                    arg.get().to_string(),
                )));
            }
        };
        out.push("addv $P 1 $P".to_owned());
        Ok(out)
    }

    // Every pop form first moves `P` into `A` and, except `pop $X`, the popped
    // value into `D`, and `subv` loads `V`.
    fn pop(toks: &[Located<&str>]) -> Result<Vec<String>, Located<Error>> {
        check_arity(toks, &[1, 2])?;
        let arg = &toks[1];
        let mut out = vec!["subv $P 1 $P".to_owned()];
        match (arg.operand::<Error>()?, toks.get(2)) {
            (Operand::Reg(r), None) => {
                let r = arg.unclobbered::<Error>(r, &[Reg::M])?;
                out.push(format!("load @P ${}", r));
            }
            (Operand::Indirect(r), None) => {
                let r = arg.unclobbered::<Error>(r, &[Reg::A, Reg::D, Reg::M, Reg::V])?;
                out.push("load @P $D".to_owned());
                out.push(format!("stor @{} $D", r));
            }
            (Operand::Indirect(r), Some(k)) => {
                let r = arg.unclobbered::<Error>(r, &[Reg::A, Reg::D, Reg::M, Reg::T, Reg::V])?;
                out.push("load @P $D".to_owned());
                out.push("sett 7".to_owned());
                out.push(format!("addv ${} {} $T", r, k.literal::<Error>()?));
                out.push("stor @T $D".to_owned());
                out.push("sett 0".to_owned());
            }
            (_, k) => {
                let expected = if k.is_some() {
                    ArgKind::Indirect
                } else {
                    ArgKind::RegOrIndirect
                };
                return arg.err(Error::Arg(ArgError::Expected(
                    expected,
                    arg.get().to_string(),
                )));
            }
        }
        Ok(out)
    }

    fn goto(toks: &[Located<&str>]) -> Result<Vec<String>, Located<Error>> {
        check_arity(toks, &[2])?;
        let target = toks[1].name::<Error>()?;

        let mut out = vec![format!("getl $T {}", target)];
        match *toks[2].get() {
            "true" => out.extend(vec![
                "subv $P 1 $P".to_owned(),
                "load @P $D".to_owned(),
                "copy $D $C".to_owned(),
            ]),
            "false" => out.extend(vec![
                "subv $P 1 $P".to_owned(),
                "load @P $D".to_owned(),
                "inpv 0".to_owned(),
                "comp $D == $V".to_owned(),
            ]),
            "all" => out.push("setv $C 1".to_owned()),
            flag => return toks[2].err(Error::UnknownFlag(flag.to_owned())),
        }
        out.push("jump $T $C".to_owned());
        Ok(out)
    }

    // Frame, relative to the callee's $L: return address at -3, outer stack
    // pointer at -2, caller's $L at -1, then the copied arguments.
    fn call(&mut self, target: &str, argc: usize) -> Vec<String> {
        let ret = format!("{}{}", RETURN_LABEL_PREFIX, self.next_return);
        self.next_return += 1;

        let mut out = vec![
            "copy $P $T".to_owned(),
            format!("subv $T {} $T", argc),
            format!("getl $D {}", ret),
        ];
        out.extend_from_slice(&push_from("D"));
        out.extend_from_slice(&push_from("T"));
        out.extend_from_slice(&push_from("L"));
        out.extend(vec![
            "sett 1".to_owned(),
            "copy $P $T".to_owned(),
            "sett 0".to_owned(),
        ]);
        for j in 0..argc {
            out.push(format!("addv $T {} $D", j));
            out.push("load @D $D".to_owned());
            out.extend_from_slice(&push_from("D"));
        }
        out.extend(vec![
            "sett 1".to_owned(),
            "copy $T $L".to_owned(),
            "sett 0".to_owned(),
            format!("getl $D {}", target),
            "inpv 1".to_owned(),
            "jump $D $V".to_owned(),
            format!("setl {}", ret),
        ]);
        out.extend_from_slice(&push_from("T"));
        out
    }

    fn ret() -> Vec<String> {
        [
            "subv $P 1 $P",
            "load @P $D",
            "copy $D $T",
            "subv $L 3 $L",
            "load @L $D",
            "addv $L 1 $L",
            "load @L $P",
            "addv $L 1 $L",
            "load @L $L",
            "inpv 1",
            "jump $D $V",
        ]
        .iter()
        .map(|s| (*s).to_owned())
        .collect()
    }
}

pub fn expand(lines: Vec<Line>) -> Result<Vec<Line>, Located<Error>> {
    let mut expander = Expander::default();
    common::accumulate_vecs(lines.iter().map(|line| expander.expand_line(line)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::phases::types::Loc;

    fn expand_str(src: &str) -> Result<Vec<String>, Located<Error>> {
        expand(tokenize::lines(src)).map(|ls| ls.into_iter().map(Located::value).collect())
    }

    #[test]
    fn push_forms() {
        assert_eq!(
            expand_str("push 10").unwrap(),
            vec!["inpv 10", "stor @P $V", "addv $P 1 $P"]
        );
        assert_eq!(
            expand_str("push $D").unwrap(),
            vec!["stor @P $D", "addv $P 1 $P"]
        );
        assert_eq!(
            expand_str("push @L").unwrap(),
            vec!["load @L $D", "stor @P $D", "addv $P 1 $P"]
        );
        assert_eq!(
            expand_str("push @L -2").unwrap(),
            vec![
                "sett 7",
                "addv $L -2 $T",
                "load @T $D",
                "sett 0",
                "stor @P $D",
                "addv $P 1 $P"
            ]
        );
    }

    #[test]
    fn pop_forms() {
        assert_eq!(
            expand_str("pop $D").unwrap(),
            vec!["subv $P 1 $P", "load @P $D"]
        );
        assert_eq!(
            expand_str("pop @L").unwrap(),
            vec!["subv $P 1 $P", "load @P $D", "stor @L $D"]
        );
        assert_eq!(
            expand_str("pop @L 1").unwrap(),
            vec![
                "subv $P 1 $P",
                "load @P $D",
                "sett 7",
                "addv $L 1 $T",
                "stor @T $D",
                "sett 0"
            ]
        );
    }

    #[test]
    fn goto_flags() {
        assert_eq!(
            expand_str("goto end all").unwrap(),
            vec!["getl $T end", "setv $C 1", "jump $T $C"]
        );
        assert_eq!(
            expand_str("goto loop false").unwrap(),
            vec![
                "getl $T loop",
                "subv $P 1 $P",
                "load @P $D",
                "inpv 0",
                "comp $D == $V",
                "jump $T $C"
            ]
        );
    }

    #[test]
    fn unknown_goto_flag_points_at_flag() {
        assert_eq!(
            expand_str("push 1\ngoto end maybe"),
            Err(Located::with_loc(
                Loc::new(2, 10),
                Error::UnknownFlag(String::from("maybe"))
            ))
        );
    }

    #[test]
    fn calls_get_distinct_return_labels() {
        let out = expand_str("call f 0\ncall g 2").unwrap();
        assert!(out.contains(&String::from("setl __ret.0")));
        assert!(out.contains(&String::from("setl __ret.1")));
        assert!(out.contains(&String::from("getl $D g")));
        assert_eq!(out.iter().filter(|l| *l == "load @D $D").count(), 2);
    }

    #[test]
    fn comments_and_debug_are_dropped() {
        assert_eq!(
            expand_str("// hello\n\ndebug 3\n//setl x\nlabel y\naddr $D $D $D").unwrap(),
            vec!["//setl x", "setl y", "addr $D $D $D"]
        );
    }

    #[test]
    fn overwritten_registers_are_rejected() {
        let clobbered = |src: &str| expand_str(src).map_err(Located::value);
        for (src, r) in &[
            ("push $A", Reg::A),
            ("push $M", Reg::M),
            ("push $V 3", Reg::V),
            ("push @T 1", Reg::T),
            ("push @V -1", Reg::V),
            ("pop $M", Reg::M),
            ("pop @A", Reg::A),
            ("pop @D", Reg::D),
            ("pop @V", Reg::V),
            ("pop @M 2", Reg::M),
            ("pop @T 0", Reg::T),
        ] {
            assert_eq!(
                clobbered(src),
                Err(Error::Arg(ArgError::Clobbered(*r))),
                "{}",
                src
            );
        }

        assert_eq!(
            expand_str("push 1
  pop $M"),
            Err(Located::with_loc(
                Loc::new(2, 7),
                Error::Arg(ArgError::Clobbered(Reg::M))
            ))
        );

        // Still fine: the register is read before anything overwrites it.
        for src in &["push $P", "push $T", "push $M 2", "push @M 1", "pop $A", "pop $V", "pop @T"] {
            assert!(expand_str(src).is_ok(), "{}", src);
        }
    }

    #[test]
    fn bad_operands() {
        assert_eq!(
            expand_str("push $X").map_err(Located::value),
            Err(Error::Arg(ArgError::UnknownRegister(String::from("$X"))))
        );
        assert!(matches!(
            expand_str("call f -1").map_err(Located::value),
            Err(Error::BadArgCount(-1))
        ));
        assert!(matches!(
            expand_str("return 1").map_err(Located::value),
            Err(Error::WrongArity { found: 1, .. })
        ));
    }
}
