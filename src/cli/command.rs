use crate::assembler::{self, disasm, phases::types::Loc, Stages};
use crate::assets::{self, Stage};
use crate::vm::{Instance, State};
use ansi_term::{Color, Style};
use anyhow::{anyhow, Context};
use log::{info, warn};
use std::{
    fmt::Display,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use structopt::StructOpt;

#[cfg(windows)]
pub fn terminal_init() {
    let _ = ansi_term::enable_ansi_support();
}

#[cfg(not(windows))]
pub fn terminal_init() {}

#[derive(StructOpt, Debug)]
#[structopt(name = "sm16")]
pub enum CommandRoot {
    /// Assemble a macro-assembly file into a binary
    Asm(SubcommandAsm),
    /// Execute a binary, or an assembly file after assembling it
    Vm(SubcommandVm),
    /// Assemble and execute a macro-assembly file
    Run(SubcommandRun),
    /// Decode a binary back into assembly text
    Disasm(SubcommandDisasm),
}

#[derive(StructOpt, Debug)]
struct LogOpts {
    /// Only report errors
    #[structopt(short, long)]
    quiet: bool,

    /// Log assembler phases (-v) or every executed instruction (-vv)
    #[structopt(short, long, parse(from_occurrences))]
    verbose: u8,
}

#[derive(StructOpt, Debug)]
#[structopt(name = "sm16-asm")]
pub struct SubcommandAsm {
    #[structopt(flatten)]
    log_opts: LogOpts,

    #[structopt(name = "in.vm", parse(from_os_str))]
    in_src: PathBuf,

    #[structopt(short, long = "out", name = "out.asm", parse(from_os_str))]
    out_bin: Option<PathBuf>,

    /// Also write the macro-expanded text to `<stem>_o0.vm`
    #[structopt(long)]
    o0: bool,

    /// Also write the lowered text to `<stem>_o1.vm`
    #[structopt(long)]
    o1: bool,

    /// Also write the disassembled binary to `<stem>_o2.vm`
    #[structopt(long)]
    o2: bool,
}

#[derive(StructOpt, Debug)]
struct VmOpts {
    #[structopt(flatten)]
    log_opts: LogOpts,

    /// Stop after this many instructions ("unlimited" by default)
    #[structopt(short, long, name = "max-steps")]
    max_steps: Option<StepLimit>,
}

#[derive(StructOpt, Debug)]
#[structopt(name = "sm16-vm")]
pub struct SubcommandVm {
    #[structopt(flatten)]
    vm_opts: VmOpts,

    #[structopt(name = "prog.asm", parse(from_os_str))]
    in_prog: PathBuf,
}

#[derive(StructOpt, Debug)]
pub struct SubcommandRun {
    #[structopt(flatten)]
    vm_opts: VmOpts,

    #[structopt(name = "prog.vm", parse(from_os_str))]
    in_prog_src: PathBuf,
}

#[derive(StructOpt, Debug)]
pub struct SubcommandDisasm {
    #[structopt(flatten)]
    log_opts: LogOpts,

    #[structopt(name = "prog.asm", parse(from_os_str))]
    in_prog_bin: PathBuf,

    /// Show every word with its offset instead of folded assembly text
    #[structopt(short, long)]
    listing: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StepLimit(Option<u64>);

impl Display for StepLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(lim) => write!(f, "{}", lim),
            None => write!(f, "unlimited"),
        }
    }
}

impl FromStr for StepLimit {
    type Err = <u64 as FromStr>::Err;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("unlimited") || s.eq_ignore_ascii_case("infinity") {
            Ok(StepLimit(None))
        } else {
            Ok(StepLimit(Some(u64::from_str(s)?)))
        }
    }
}

impl StepLimit {
    pub fn into_option(self) -> Option<u64> {
        self.0
    }
}

impl LogOpts {
    fn init_logger(&self) {
        let level = match (self.quiet, self.verbose) {
            (true, _) => "error",
            (false, 0) => "warn",
            (false, 1) => "debug",
            (false, _) => "trace",
        };
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
            .format_timestamp(None)
            .try_init();
    }
}

/// Renders an assembly error against the source it came from, pointing at
/// the offending line and column.
pub fn render_assembly_error(path: &Path, source: &str, err: &assembler::Error) -> String {
    let blue = Color::Blue.bold();
    let mut out = format!("{}", err);

    if let Some(loc) = err.loc() {
        out.push_str(&format!(
            "\n {} {}:{}:{}",
            blue.paint("-->"),
            path.display(),
            loc.line(),
            loc.col()
        ));
        if let Some(text) = source.lines().nth(loc.line() - 1) {
            out.push_str(&render_snippet(&blue, loc, text));
        }
    } else {
        out.push_str(&format!("\n {} {}", blue.paint("-->"), path.display()));
    }

    out
}

fn render_snippet(gutter: &Style, loc: &Loc, text: &str) -> String {
    let num = loc.line().to_string();
    let pad = " ".repeat(num.len());
    let caret = format!("{}^", " ".repeat(loc.col().saturating_sub(1)));
    format!(
        "\n{} {}\n{} {} {}\n{} {} {}",
        pad,
        gutter.paint("|"),
        gutter.paint(&num),
        gutter.paint("|"),
        text,
        pad,
        gutter.paint("|"),
        Color::Red.bold().paint(caret)
    )
}

fn read_source(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("Could not read '{}'", path.display()))
}

fn write_file(path: &Path, contents: impl AsRef<[u8]>) -> anyhow::Result<()> {
    fs::write(path, contents).with_context(|| format!("Could not write '{}'", path.display()))
}

pub fn assemble_path(path: &Path) -> anyhow::Result<Stages> {
    let source = read_source(path)?;
    assembler::assemble_staged(&source).map_err(|err| anyhow!(render_assembly_error(path, &source, &err)))
}

fn write_stage(src: &Path, stage: Stage, text: &str) -> anyhow::Result<()> {
    let path = assets::stage_path(src, stage)
        .ok_or_else(|| anyhow!("Cannot derive an output name from '{}'", src.display()))?;
    write_file(&path, text)?;
    info!("wrote {}", path.display());
    Ok(())
}

fn load_program(path: &Path) -> anyhow::Result<Instance> {
    if assets::is_source(path) {
        Ok(Instance::from_program(&assemble_path(path)?.program))
    } else {
        let bytes = fs::read(path).with_context(|| format!("Could not read '{}'", path.display()))?;
        Instance::new(&bytes).with_context(|| format!("Could not load '{}'", path.display()))
    }
}

fn execute(mut vm: Instance, path: &Path, opts: &VmOpts) -> anyhow::Result<State> {
    let limit = opts.max_steps.unwrap_or_default().into_option();

    let result = vm.run(limit);
    if !opts.log_opts.quiet {
        println!("{}", vm);
    }

    let state = result.with_context(|| format!("Execution of '{}' failed", path.display()))?;
    if state == State::Timeout {
        warn!("step limit of {} reached, program did not finish", vm.steps());
    }
    Ok(state)
}

fn state_to_exit_code(state: State) -> i32 {
    match state {
        State::Finished => 0,
        _ => 1,
    }
}

fn exit_with<T>(result: anyhow::Result<T>, code: impl FnOnce(T) -> i32) -> ! {
    match result {
        Ok(t) => std::process::exit(code(t)),
        Err(err) => {
            eprintln!("{} {:#}", Color::Red.bold().paint("error:"), err);
            std::process::exit(1)
        }
    }
}

pub fn root(cmd: CommandRoot) -> ! {
    match cmd {
        CommandRoot::Asm(scmd) => asm(scmd),
        CommandRoot::Vm(scmd) => vm(scmd),
        CommandRoot::Run(scmd) => run(scmd),
        CommandRoot::Disasm(scmd) => disassemble(scmd),
    };
}

fn do_asm(cmd: &SubcommandAsm) -> anyhow::Result<()> {
    let stages = assemble_path(&cmd.in_src)?;
    let bin = stages.program.to_bytes();

    if cmd.o0 {
        write_stage(&cmd.in_src, Stage::Expanded, &stages.expanded_text())?;
    }
    if cmd.o1 {
        write_stage(&cmd.in_src, Stage::Lowered, &stages.lowered_text())?;
    }
    if cmd.o2 {
        let ops = disasm::disassemble(&bin)?;
        write_stage(&cmd.in_src, Stage::Disassembled, &disasm::to_text(&ops))?;
    }

    let out_name = cmd
        .out_bin
        .clone()
        .unwrap_or_else(|| assets::binary_path(&cmd.in_src));
    write_file(&out_name, &bin)?;
    info!("wrote {} bytes to {}", bin.len(), out_name.display());
    Ok(())
}

pub fn asm(cmd: SubcommandAsm) -> ! {
    cmd.log_opts.init_logger();
    exit_with(do_asm(&cmd), |_| 0)
}

pub fn vm(cmd: SubcommandVm) -> ! {
    cmd.vm_opts.log_opts.init_logger();
    let result = load_program(&cmd.in_prog).and_then(|vm| execute(vm, &cmd.in_prog, &cmd.vm_opts));
    exit_with(result, state_to_exit_code)
}

pub fn run(cmd: SubcommandRun) -> ! {
    cmd.vm_opts.log_opts.init_logger();
    let result = assemble_path(&cmd.in_prog_src).and_then(|stages| {
        execute(
            Instance::from_program(&stages.program),
            &cmd.in_prog_src,
            &cmd.vm_opts,
        )
    });
    exit_with(result, state_to_exit_code)
}

fn do_disassemble(cmd: &SubcommandDisasm) -> anyhow::Result<()> {
    let path = &cmd.in_prog_bin;
    let bytes = fs::read(path).with_context(|| format!("Could not read '{}'", path.display()))?;

    if cmd.listing {
        for line in disasm::listing(&bytes)? {
            println!("{}", line);
        }
    } else {
        let ops = disasm::disassemble(&bytes)
            .with_context(|| format!("Could not disassemble '{}'", path.display()))?;
        print!("{}", disasm::to_text(&ops));
    }
    Ok(())
}

pub fn disassemble(cmd: SubcommandDisasm) -> ! {
    cmd.log_opts.init_logger();
    exit_with(do_disassemble(&cmd), |_| 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::types::hw::Reg;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("sm16-{}-{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn asm_writes_binary_and_stages() {
        let dir = scratch_dir("asm");
        let src = dir.join("prog.vm");
        let text = "push 10\npush 20\ncall built_in.add 2\npop $D\n";
        fs::write(&src, text).unwrap();

        let cmd = SubcommandAsm::from_iter_safe(&[
            "sm16-asm",
            src.to_str().unwrap(),
            "--o0",
            "--o1",
            "--o2",
        ])
        .unwrap();
        do_asm(&cmd).unwrap();

        let bin = fs::read(dir.join("prog.asm")).unwrap();
        assert_eq!(bin, assembler::assemble_bytes(text).unwrap());

        let expanded = fs::read_to_string(dir.join("prog_o0.vm")).unwrap();
        assert!(expanded.starts_with("inpv 10\nstor @P $V\n"));
        let lowered = fs::read_to_string(dir.join("prog_o1.vm")).unwrap();
        assert!(lowered.starts_with("inpv 10\ncopy $P $A\n"));
        let disassembled = fs::read_to_string(dir.join("prog_o2.vm")).unwrap();
        assert_eq!(assembler::assemble_bytes(&disassembled).unwrap(), bin);

        // The binary and its source load into the same program.
        for path in &[dir.join("prog.asm"), src.clone()] {
            let mut vm = load_program(path).unwrap();
            assert_eq!(vm.run(None).unwrap(), State::Finished);
            assert_eq!(vm.reg(Reg::D), 30);
        }

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn load_program_reports_bad_input() {
        let dir = scratch_dir("load");
        let src = dir.join("bad.vm");
        fs::write(&src, "push 1\nblorp $D\n").unwrap();
        let err = load_program(&src).err().unwrap();
        assert!(format!("{:#}", err).contains("Unknown command: 'blorp'"));

        let bin = dir.join("odd.asm");
        fs::write(&bin, [0u8, 1, 2]).unwrap();
        assert!(load_program(&bin).is_err());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn step_limit_parsing() {
        assert_eq!(StepLimit::from_str("100").unwrap().into_option(), Some(100));
        assert_eq!(StepLimit::from_str("unlimited").unwrap().into_option(), None);
        assert_eq!(StepLimit::default().into_option(), None);
        assert!(StepLimit::from_str("lots").is_err());
    }

    #[test]
    fn diagnostic_points_at_source() {
        let source = "push 1\n  pusj 2\n";
        let err = assembler::assemble(source).unwrap_err();
        let text = render_assembly_error(Path::new("prog.vm"), source, &err);
        assert!(text.contains("Unknown command: 'pusj'"));
        assert!(text.contains("prog.vm:2:3"));
        assert!(text.contains("  pusj 2"));
    }

    #[test]
    fn subcommands_parse() {
        let cmd = CommandRoot::from_iter_safe(&["sm16", "asm", "a.vm", "--o0", "-o", "b.asm"]).unwrap();
        match cmd {
            CommandRoot::Asm(scmd) => {
                assert!(scmd.o0 && !scmd.o1 && !scmd.o2);
                assert_eq!(scmd.out_bin, Some(PathBuf::from("b.asm")));
            }
            other => panic!("unexpected {:?}", other),
        }

        let cmd = CommandRoot::from_iter_safe(&["sm16", "vm", "--max-steps", "10", "-q", "a.asm"]).unwrap();
        match cmd {
            CommandRoot::Vm(scmd) => {
                assert!(scmd.vm_opts.log_opts.quiet);
                assert_eq!(scmd.vm_opts.max_steps.and_then(StepLimit::into_option), Some(10));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
