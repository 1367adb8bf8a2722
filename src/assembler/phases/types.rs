use super::{expand, lower, parse, resolve};
use derive_more::Constructor;
use std::fmt::Display;

/*
    Phases:

        1.  Preprocessing: calls to the `built_in.*` operator subroutines are replaced
            with their inline stack sequences.

        2.  Macro expansion: stack and control-flow macros (`push`, `pop`, `goto`,
            `call`, `return`, `label`) are expanded into the reduced vocabulary of
            indirect loads and stores, immediate arithmetic and label references.

        3.  Lowering: pseudo-ops carrying an inline literal or a label (`setv`, `load`,
            `stor`, `<op>v`, `setl`, `getl`) become an explicit `inpv` into `$V` followed
            by the primitive op consuming it. Label definitions and references become
            `//setl` and `//getl` markers.

        4.  Parsing: each primitive line is parsed into a `Statement`, either a
            `LabelDef` or an `Op` whose immediate may still name a label.

        5.  Resolution: label offsets are computed (widening label placeholders until
            the layout is stable), and every `Op` is encoded into instruction words.

    Phases 1-3 are text to text, and any line a phase does not recognise is passed
    through untouched for the next phase to deal with. Every line keeps the location
    of the source line it came from, so diagnostics always point at the input file.
*/

pub type LabelName = String;

#[derive(Debug, PartialEq, Clone, Eq, Constructor)]
pub struct Loc {
    line: usize,
    col: usize,
}

impl Loc {
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn col(&self) -> usize {
        self.col
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Located<T: Sized> {
    loc: Option<Loc>,
    val: T,
    // Set when `val` was generated rather than written by the user, in which
    // case positions inside it say nothing about the source.
    pinned: bool,
}

impl Display for Loc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(line: {}, col: {})", self.line, self.col)
    }
}

impl<T: Display> Display for Located<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.loc {
            None => write!(f, "@<unknown location>: {}", self.val),
            Some(loc) => write!(f, "@{}: {}", loc, self.val),
        }
    }
}

impl<T> Located<T> {
    fn new(loc: Option<Loc>, val: T) -> Self {
        Located {
            loc,
            val,
            pinned: false,
        }
    }

    pub fn with_loc(loc: Loc, val: T) -> Self {
        Located::new(Some(loc), val)
    }

    pub fn loc(&self) -> Option<&Loc> {
        self.loc.as_ref()
    }

    pub fn get(&self) -> &T {
        &self.val
    }

    pub fn value(self) -> T {
        self.val
    }

    /// Attaches this location to another value.
    pub fn transfer<S>(&self, s: S) -> Located<S> {
        Located::new(self.loc.clone(), s)
    }

    /// Like `transfer`, but everything located inside `s` is reported at this
    /// location as a whole.
    pub fn pin<S>(&self, s: S) -> Located<S> {
        Located {
            pinned: true,
            ..self.transfer(s)
        }
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    pub fn err<S, E>(&self, err: E) -> Result<S, Located<E>> {
        Err(self.transfer(err))
    }
}

impl<T> From<T> for Located<T> {
    fn from(val: T) -> Self {
        Located::new(None, val)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    Expand(Located<expand::Error>),
    Lower(Located<lower::Error>),
    Parse(Located<parse::Error>),
    Resolve(Located<resolve::Error>),
}

impl Error {
    pub fn loc(&self) -> Option<&Loc> {
        match self {
            Error::Expand(err) => err.loc(),
            Error::Lower(err) => err.loc(),
            Error::Parse(err) => err.loc(),
            Error::Resolve(err) => err.loc(),
        }
    }
}

impl From<Located<expand::Error>> for Error {
    fn from(err: Located<expand::Error>) -> Self {
        Error::Expand(err)
    }
}

impl From<Located<lower::Error>> for Error {
    fn from(err: Located<lower::Error>) -> Self {
        Error::Lower(err)
    }
}

impl From<Located<parse::Error>> for Error {
    fn from(err: Located<parse::Error>) -> Self {
        Error::Parse(err)
    }
}

impl From<Located<resolve::Error>> for Error {
    fn from(err: Located<resolve::Error>) -> Self {
        Error::Resolve(err)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Assembly Error (in ")?;
        match self {
            Error::Expand(_) => write!(f, "Macro Expander"),
            Error::Lower(_) => write!(f, "Lowerer"),
            Error::Parse(_) => write!(f, "Parser"),
            Error::Resolve(_) => write!(f, "Resolver"),
        }?;
        write!(f, "): ")?;
        match self {
            Error::Expand(err) => write!(f, "{}", err),
            Error::Lower(err) => write!(f, "{}", err),
            Error::Parse(err) => write!(f, "{}", err),
            Error::Resolve(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for Error {}
