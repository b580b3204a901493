use crate::reg::{Width, REGISTERS, UNTRACKED};
use crate::unit::Unit;

/// Characters that may flank a register or symbol name inside an operand.
pub const BOUNDARY: [char; 8] = ['[', ']', '+', '-', '*', ',', ' ', ':'];

fn is_boundary(c: Option<char>) -> bool {
    match c {
        None => true,
        Some(c) => BOUNDARY.contains(&c),
    }
}

/// Byte offsets of every occurrence of `word` in `text` flanked by boundaries.
pub fn find_word(text: &str, word: &str) -> Vec<usize> {
    if word.is_empty() {
        return vec![];
    }
    text.match_indices(word)
        .filter(|(at, _)| {
            is_boundary(text[..*at].chars().last())
                && is_boundary(text[at + word.len()..].chars().next())
        })
        .map(|(at, _)| at)
        .collect()
}

pub fn contains_word(text: &str, word: &str) -> bool {
    !find_word(text, word).is_empty()
}

/// Replace every boundary-flanked occurrence of `old` by `new`.
pub fn replace_word(text: &str, old: &str, new: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for at in find_word(text, old) {
        out.push_str(&text[last..at]);
        out.push_str(new);
        last = at + old.len();
    }
    out.push_str(&text[last..]);
    out
}

/// Split an operand list on commas outside brackets and quotes.
pub fn split_operands(text: &str) -> Vec<String> {
    let mut parts = vec![];
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut current = String::new();
    for c in text.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '[' | '(') => depth += 1,
            (None, ']' | ')') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                parts.push(current.trim().to_string());
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    if !current.trim().is_empty() || !parts.is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperandKind {
    Register,
    Memory,
    Immediate,
}

/// One operand with the tracked registers it mentions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operand {
    pub kind: OperandKind,
    pub regs: Vec<(Unit, Width)>,
    pub untracked: bool,
}

impl Operand {
    pub fn parse(text: &str) -> Operand {
        let lower = text.trim().to_ascii_lowercase();

        let regs: Vec<(Unit, Width)> = REGISTERS
            .iter()
            .filter(|(name, _)| contains_word(&lower, name))
            .map(|(_, reg)| *reg)
            .collect();
        let untracked = UNTRACKED.iter().any(|name| contains_word(&lower, name));

        let kind = if lower.contains('[') || lower.split_whitespace().any(|t| t == "ptr") {
            OperandKind::Memory
        } else if REGISTERS.contains_key(lower.as_str()) {
            OperandKind::Register
        } else if is_immediate(&lower) {
            OperandKind::Immediate
        } else {
            // A bare symbol names a storage location in MASM.
            OperandKind::Memory
        };

        Operand {
            kind,
            regs,
            untracked,
        }
    }

    pub fn is_pointer(&self) -> bool {
        self.kind == OperandKind::Memory
    }

    pub fn units(&self) -> impl Iterator<Item = Unit> + '_ {
        self.regs.iter().map(|(unit, _)| *unit)
    }

    pub fn is_partial(&self) -> bool {
        self.regs.iter().any(|(_, width)| *width == Width::Partial)
    }
}

fn is_immediate(s: &str) -> bool {
    if s.starts_with("offset ") || s.starts_with('\'') || s.starts_with('"') {
        return true;
    }
    let s = s.trim_start_matches(['-', '+']);
    match s.chars().next() {
        Some(c) if c.is_ascii_digit() => s
            .chars()
            .all(|c| c.is_ascii_hexdigit() || matches!(c, 'h' | 'o' | 'q' | 'x')),
        _ => false,
    }
}
