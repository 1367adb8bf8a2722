use std::path::{Path, PathBuf};

pub const DEFAULT_BINARY_EXT: &str = "asm";
pub const SOURCE_EXT: &str = "vm";

/// The intermediate text stages that can be written next to a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Expanded,
    Lowered,
    Disassembled,
}

impl Stage {
    fn suffix(self) -> &'static str {
        match self {
            Stage::Expanded => "_o0",
            Stage::Lowered => "_o1",
            Stage::Disassembled => "_o2",
        }
    }
}

fn with_stem_suffix(src: &Path, suffix: &str, ext: &str) -> Option<PathBuf> {
    let stem = src.file_stem()?.to_str()?;
    Some(src.with_file_name(format!("{}{}.{}", stem, suffix, ext)))
}

pub fn binary_path(src: &Path) -> PathBuf {
    src.with_extension(DEFAULT_BINARY_EXT)
}

pub fn stage_path(src: &Path, stage: Stage) -> Option<PathBuf> {
    with_stem_suffix(src, stage.suffix(), SOURCE_EXT)
}

/// Whether a program file holds assembly text rather than a binary.
pub fn is_source(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == SOURCE_EXT)
}
