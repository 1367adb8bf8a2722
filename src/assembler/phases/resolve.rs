use super::types::{LabelName, Located};
use crate::assembler::model::{Imm, LabelTable, Op, Program, Statement};
use crate::spec::{inst, types::hw};
use std::{collections::btree_map::Entry, fmt::Display};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    DuplicateLabel(LabelName),
    UnknownLabel(LabelName),
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::DuplicateLabel(name) => write!(f, "Duplicate label: '{}'", name),
            Error::UnknownLabel(name) => write!(f, "Unknown label: '{}'", name),
        }
    }
}

fn label_ref(stmt: &Statement) -> Option<&LabelName> {
    match stmt {
        Statement::Op(Op::Inpv(Imm::Label(name))) => Some(name),
        _ => None,
    }
}

fn initial_width(stmt: &Statement) -> usize {
    match stmt {
        Statement::LabelDef(_) => 0,
        Statement::Op(op) => op.words().unwrap_or(1),
    }
}

fn layout(stmts: &[Located<Statement>], widths: &[usize]) -> Result<LabelTable, Located<Error>> {
    let mut labels = LabelTable::new();
    let mut offset = 0;
    for (stmt, width) in stmts.iter().zip(widths) {
        if let Statement::LabelDef(name) = stmt.get() {
            match labels.entry(name.clone()) {
                Entry::Occupied(_) => return stmt.err(Error::DuplicateLabel(name.clone())),
                Entry::Vacant(e) => {
                    e.insert(offset);
                }
            }
        }
        offset += width * hw::WORD_BYTES;
    }
    Ok(labels)
}

fn lookup(labels: &LabelTable, stmt: &Located<Statement>, name: &str) -> Result<usize, Located<Error>> {
    labels
        .get(name)
        .copied()
        .ok_or_else(|| stmt.transfer(Error::UnknownLabel(name.to_owned())))
}

/*
    Label references start out one word wide. Each round lays the program out,
    then widens every reference to fit the offset it now points at. A reference
    only ever grows, so offsets only ever grow too, and the loop stops at the
    first layout in which every reference already fits.
*/
pub fn resolve(stmts: Vec<Located<Statement>>) -> Result<Program, Located<Error>> {
    let mut widths: Vec<usize> = stmts.iter().map(|s| initial_width(s.get())).collect();

    let labels = loop {
        let labels = layout(&stmts, &widths)?;

        let mut changed = false;
        for (stmt, width) in stmts.iter().zip(widths.iter_mut()) {
            if let Some(name) = label_ref(stmt.get()) {
                let needed = inst::immediate_words(lookup(&labels, stmt, name)? as i64);
                if needed > *width {
                    *width = needed;
                    changed = true;
                }
            }
        }

        if !changed {
            break labels;
        }
    };

    let mut insts = Vec::new();
    for stmt in &stmts {
        if let Statement::Op(op) = stmt.get() {
            insts.append(&mut op.encode(|name| lookup(&labels, stmt, name).map(|o| o as i64))?);
        }
    }

    Ok(Program::new(insts, labels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::inst::Instruction;
    use crate::spec::types::hw::Reg;

    fn def(name: &str) -> Located<Statement> {
        Located::from(Statement::LabelDef(name.to_owned()))
    }

    fn get(name: &str) -> Located<Statement> {
        Located::from(Statement::Op(Op::Inpv(Imm::Label(name.to_owned()))))
    }

    fn nop() -> Located<Statement> {
        Located::from(Statement::Op(Op::Copy(Reg::D, Reg::D)))
    }

    #[test]
    fn forward_and_backward_references() {
        let prog = resolve(vec![def("start"), get("end"), nop(), def("end"), get("start")]).unwrap();
        assert_eq!(prog.labels().get("start"), Some(&0));
        assert_eq!(prog.labels().get("end"), Some(&4));
        assert_eq!(
            prog.instructions()[0],
            Instruction::LoadImm {
                chunk: 4,
                continues: false
            }
        );
        assert_eq!(
            prog.instructions()[2],
            Instruction::LoadImm {
                chunk: 0,
                continues: false
            }
        );
    }

    #[test]
    fn references_widen_past_direct_range() {
        // 1024 words of padding put `far` just past the direct range, at byte
        // 2048 + 4 once the reference before it has grown to two words.
        let mut stmts = vec![get("far")];
        stmts.extend((0..1024).map(|_| nop()));
        stmts.push(def("far"));

        let prog = resolve(stmts).unwrap();
        assert_eq!(prog.labels().get("far"), Some(&2052));
        assert_eq!(prog.instructions().len(), 1026);
        assert!(matches!(
            prog.instructions()[0],
            Instruction::LoadImm { continues: true, .. }
        ));
        assert_eq!(prog.byte_len(), 2052);
    }

    #[test]
    fn label_errors() {
        assert_eq!(
            resolve(vec![def("a"), nop(), def("a")]).map_err(Located::value),
            Err(Error::DuplicateLabel(String::from("a")))
        );
        assert_eq!(
            resolve(vec![get("missing")]).map_err(Located::value),
            Err(Error::UnknownLabel(String::from("missing")))
        );
    }
}
