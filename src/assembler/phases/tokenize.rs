use super::types::{Loc, Located};
use std::iter;

/// A single line of assembly text, located at the source line it originates from.
pub type Line = Located<String>;

pub fn lines(source: &str) -> Vec<Line> {
    source
        .lines()
        .enumerate()
        .map(|(idx, line)| Located::with_loc(Loc::new(idx + 1, 1), line.to_owned()))
        .collect()
}

pub fn join(lines: &[Line]) -> String {
    let mut text = lines
        .iter()
        .map(|line| line.get().as_str())
        .collect::<Vec<_>>()
        .join("\n");
    text.push('\n');
    text
}

/// A line generated from `origin` by one of the text phases. The generated text
/// has no columns of its own, so its tokens are all located at the first token of
/// the source line.
pub fn derived(origin: &Line, text: String) -> Line {
    match tokens(origin).first() {
        Some(first) if !origin.is_pinned() => first.pin(text),
        _ => origin.pin(text),
    }
}

fn locate<'a>(line: &Line, offset: usize, tok: &'a str) -> Located<&'a str> {
    match line.loc() {
        _ if line.is_pinned() => line.transfer(tok),
        Some(loc) => Located::with_loc(
            Loc::new(loc.line(), loc.col() + line.get()[..offset].chars().count()),
            tok,
        ),
        None => Located::from(tok),
    }
}

/// Splits a line at whitespace. Each token records its own column.
pub fn tokens(line: &Line) -> Vec<Located<&str>> {
    let text = line.get().as_str();
    let mut toks = Vec::new();
    let mut start = None;

    for (idx, ch) in text.char_indices().chain(iter::once((text.len(), ' '))) {
        match (start, ch.is_whitespace()) {
            (None, false) => start = Some(idx),
            (Some(s), true) => {
                toks.push(locate(line, s, &text[s..idx]));
                start = None;
            }
            _ => (),
        }
    }

    toks
}
