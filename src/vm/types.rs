use crate::spec::{inst::DecodeError, types::hw::Value};
use std::fmt::Display;
use strum_macros::Display;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Running,
    /// The program counter has run off the end of the program.
    Finished,
    /// The step limit was reached first.
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    OddLength(usize),
    Decode { offset: usize, err: DecodeError },
    InvalidJumpTarget { offset: usize, target: Value },
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::OddLength(len) => write!(
                f,
                "Program length {} is not a whole number of instruction words",
                len
            ),
            Error::Decode { offset, err } => write!(f, "@{:#06X}: {}", offset, err),
            Error::InvalidJumpTarget { offset, target } => write!(
                f,
                "@{:#06X}: Jump target {} is not a valid instruction offset",
                offset, target
            ),
        }
    }
}

impl std::error::Error for Error {}
