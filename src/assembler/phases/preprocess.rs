use super::tokenize::{self, Line};
use once_cell::sync::Lazy;
use std::collections::HashMap;

const BUILT_IN_PREFIX: &str = "built_in.";

fn binary(op: &str) -> Vec<String> {
    vec![
        "pop $D".to_owned(),
        "pop $T".to_owned(),
        format!("{} $D $T $D", op),
        "push $D".to_owned(),
    ]
}

fn compare(cond: &str) -> Vec<String> {
    vec![
        "pop $D".to_owned(),
        "pop $T".to_owned(),
        format!("comp $D {} $T", cond),
        "push $C".to_owned(),
    ]
}

fn unary(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|s| (*s).to_owned()).collect()
}

/// Inline bodies of the operator subroutines, keyed by name, along with the
/// argument count each one takes.
static BUILT_INS: Lazy<HashMap<&'static str, (usize, Vec<String>)>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert(
        "neg",
        (1, unary(&["pop $D", "inpv 0", "subr $V $D $D", "push $D"])),
    );
    m.insert(
        "invert",
        (1, unary(&["pop $D", "inpv 0", "comp $V == $D", "push $C"])),
    );
    m.insert(
        "bool",
        (
            1,
            unary(&[
                "pop $D",
                "inpv 0",
                "comp $D == $V",
                "comp $C == $V",
                "push $C",
            ]),
        ),
    );

    for (name, op) in &[
        ("add", "addr"),
        ("sub", "subr"),
        ("mul", "mulr"),
        ("div", "divr"),
        ("or", "or_r"),
        ("and", "andr"),
        ("lm", "lmvr"),
        ("rm", "rmvr"),
    ] {
        m.insert(*name, (2, binary(op)));
    }

    for (name, cond) in &[
        ("eq", "=="),
        ("neq", "!="),
        ("geq", ">="),
        ("leq", "<="),
        ("gt", ">"),
        ("lt", "<"),
    ] {
        m.insert(*name, (2, compare(cond)));
    }

    m
});

fn built_in(line: &Line) -> Option<&'static [String]> {
    let toks = tokenize::tokens(line);
    match toks.as_slice() {
        [call, target, argc] if *call.get() == "call" => {
            let name = target.get().strip_prefix(BUILT_IN_PREFIX)?;
            let argc = argc.get().parse::<usize>().ok()?;
            match BUILT_INS.get(name) {
                Some((expected, body)) if *expected == argc => Some(body.as_slice()),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Replaces calls to the operator subroutines with their inline stack
/// sequences. An unknown operator is left alone and ends up as an ordinary call.
pub fn preprocess(lines: Vec<Line>) -> Vec<Line> {
    let mut out = Vec::with_capacity(lines.len());
    for line in lines {
        match built_in(&line) {
            Some(body) => out.extend(body.iter().map(|s| tokenize::derived(&line, s.clone()))),
            None => out.push(line),
        }
    }
    out
}
