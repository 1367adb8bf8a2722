#![allow(dead_code)]

use sm16::assembler;
use sm16::spec::types::hw::{Reg, Value};
use sm16::vm::{Instance, State};

pub const MAX_STEPS: u64 = 1_000_000;

pub const SUM_SRC: &str = include_str!("../../demos/sum.vm");
pub const FACTORIAL_SRC: &str = include_str!("../../demos/factorial.vm");

/// Assembles and runs `src` to completion, panicking on any error.
pub fn run_source(src: &str) -> Instance {
    let prog = assembler::assemble(src).unwrap_or_else(|err| panic!("{}", err));
    let mut vm = Instance::from_program(&prog);
    assert_eq!(vm.run(Some(MAX_STEPS)), Ok(State::Finished));
    vm
}

/// Runs `src` and checks that it leaves `expected` in `$D` with an empty stack.
pub fn check_result(src: &str, expected: Value) {
    let vm = run_source(src);
    assert_eq!(vm.reg(Reg::D), expected, "\n{}", vm);
    assert_eq!(vm.reg(Reg::P), 0, "stack not balanced\n{}", vm);
}
