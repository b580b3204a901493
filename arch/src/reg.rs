use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::{Display, EnumString};

use crate::unit::Unit;

/// How much of the register a spelling covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    /// 64 or 32 bit. A write defines the whole register.
    Full,
    /// 16 or 8 bit. A write keeps the remaining bits.
    Partial,
}

// Every spelling of a tracked register.
const SPELLINGS: [(Unit, &[(&str, Width)]); 8] = {
    use Width::*;
    [
        (Unit::AX, &[("rax", Full), ("eax", Full), ("ax", Partial), ("ah", Partial), ("al", Partial)]),
        (Unit::BX, &[("rbx", Full), ("ebx", Full), ("bx", Partial), ("bh", Partial), ("bl", Partial)]),
        (Unit::CX, &[("rcx", Full), ("ecx", Full), ("cx", Partial), ("ch", Partial), ("cl", Partial)]),
        (Unit::DX, &[("rdx", Full), ("edx", Full), ("dx", Partial), ("dh", Partial), ("dl", Partial)]),
        (Unit::SI, &[("rsi", Full), ("esi", Full), ("si", Partial), ("sil", Partial)]),
        (Unit::DI, &[("rdi", Full), ("edi", Full), ("di", Partial), ("dil", Partial)]),
        (Unit::BP, &[("rbp", Full), ("ebp", Full), ("bp", Partial), ("bpl", Partial)]),
        (Unit::SP, &[("rsp", Full), ("esp", Full), ("sp", Partial), ("spl", Partial)]),
    ]
};

pub static REGISTERS: Lazy<HashMap<&'static str, (Unit, Width)>> = Lazy::new(|| {
    SPELLINGS
        .iter()
        .flat_map(|(unit, names)| names.iter().map(move |(name, width)| (*name, (*unit, *width))))
        .collect()
});

// Registers outside the tracked unit set.
pub static UNTRACKED: Lazy<Vec<String>> = Lazy::new(|| {
    let mut names = vec![];
    for n in 8..16 {
        for suffix in ["", "d", "w", "b"] {
            names.push(format!("r{n}{suffix}"));
        }
    }
    for n in 0..16 {
        names.push(format!("xmm{n}"));
        names.push(format!("ymm{n}"));
    }
    for n in 0..8 {
        names.push(format!("st({n})"));
        names.push(format!("mm{n}"));
    }
    names
});

impl Unit {
    pub fn spellings(self) -> impl Iterator<Item = (&'static str, Width)> {
        SPELLINGS
            .iter()
            .filter(move |(unit, _)| *unit == self)
            .flat_map(|(_, names)| names.iter().copied())
    }
}

/// Register file flavour: decides stack pointer spelling and word size.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Mode {
    #[default]
    X86,
    X64,
}

impl Mode {
    pub fn word_size(self) -> u32 {
        match self {
            Mode::X86 => 4,
            Mode::X64 => 8,
        }
    }

    pub fn stack_pointer(self) -> &'static str {
        match self {
            Mode::X86 => "esp",
            Mode::X64 => "rsp",
        }
    }

    /// Full-width spelling used when synthesizing code for `unit`.
    /// A 32-bit write zero-extends in long mode, so it defines the whole unit in both modes.
    pub fn reg_name(self, unit: Unit) -> Option<&'static str> {
        if unit == Unit::SP {
            return Some(self.stack_pointer());
        }
        unit.spellings()
            .find(|(name, _)| name.starts_with('e'))
            .map(|(name, _)| name)
    }

    /// Word-sized spelling, as `push` and `pop` require.
    pub fn stack_name(self, unit: Unit) -> Option<&'static str> {
        let prefix = match self {
            Mode::X86 => 'e',
            Mode::X64 => 'r',
        };
        unit.spellings()
            .find(|(name, _)| name.starts_with(prefix))
            .map(|(name, _)| name)
    }
}
