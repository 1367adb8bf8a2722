pub mod disasm;
pub mod model;
pub mod phases;

pub use model::Program;
pub use phases::types::Error;

use crate::spec::types::hw::Byte;
use log::debug;
use phases::tokenize::{self, Line};

/// The textual intermediate stages of one assembly run, kept for inspection.
#[derive(Debug, Clone)]
pub struct Stages {
    /// After the built-in operators and the stack/control-flow macros are expanded.
    pub expanded: Vec<Line>,
    /// Reduced vocabulary, label markers still unresolved.
    pub lowered: Vec<Line>,
    pub program: Program,
}

impl Stages {
    pub fn expanded_text(&self) -> String {
        tokenize::join(&self.expanded)
    }

    pub fn lowered_text(&self) -> String {
        tokenize::join(&self.lowered)
    }
}

pub fn assemble_staged(source: &str) -> Result<Stages, Error> {
    let lines = tokenize::lines(source);
    debug!("assembling {} source lines", lines.len());

    let expanded = phases::expand(phases::preprocess(lines))?;
    debug!("macro expansion produced {} lines", expanded.len());

    let lowered = phases::lower(expanded.clone())?;
    debug!("lowering produced {} lines", lowered.len());

    let statements = phases::parse(&lowered)?;
    let program = phases::resolve(statements)?;
    debug!(
        "resolved {} labels, program is {} bytes",
        program.labels().len(),
        program.byte_len()
    );

    Ok(Stages {
        expanded,
        lowered,
        program,
    })
}

pub fn assemble(source: &str) -> Result<Program, Error> {
    Ok(assemble_staged(source)?.program)
}

pub fn assemble_bytes(source: &str) -> Result<Vec<Byte>, Error> {
    Ok(assemble(source)?.to_bytes())
}
