use arch::Instruction;
use indexmap::{IndexMap, IndexSet};
use std::fmt;

/// A source line outside any process, kept as written minus its comment.
pub type Line = String;

pub const DATA: &str = "_DATA";
pub const TEXT: &str = "_TEXT";

/// One `_TEXT SEGMENT` ... `_TEXT ENDS` block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextSegment {
    /// Segment-local `name = value` symbols.
    pub data: IndexMap<String, String>,
    pub processes: IndexMap<String, Vec<Instruction>>,
    /// Labels declared inside this segment.
    pub labels: Vec<String>,
}

impl TextSegment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instruction_count(&self) -> usize {
        self.processes.values().map(Vec::len).sum()
    }
}

/// A whole assembly listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    /// Lines before the first segment.
    pub segmentless: Vec<Line>,
    pub misc: IndexMap<String, Vec<Line>>,
    /// Contents of every `_DATA` segment, in order. `None` when the listing has none.
    pub data: Option<Vec<Line>>,
    pub texts: Vec<TextSegment>,
    /// Every label name used anywhere.
    pub labels: IndexSet<String>,
    /// Process name -> index into `texts`.
    pub functions: IndexMap<String, usize>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    /// Body of the named process.
    pub fn process(&self, name: &str) -> Option<&[Instruction]> {
        let seg = self.functions.get(name)?;
        self.texts
            .get(*seg)?
            .processes
            .get(name)
            .map(Vec::as_slice)
    }

    pub fn instruction_count(&self) -> usize {
        self.texts.iter().map(TextSegment::instruction_count).sum()
    }

    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.texts
            .iter()
            .flat_map(|seg| seg.processes.values())
            .flatten()
    }

    /// Same program with no text segment content. Everything else is copied.
    pub fn shell(&self) -> Program {
        Program {
            segmentless: self.segmentless.clone(),
            misc: self.misc.clone(),
            data: self.data.clone(),
            texts: vec![],
            labels: self.labels.clone(),
            functions: IndexMap::new(),
        }
    }

    /// Append a segment and index its processes.
    pub fn push_text(&mut self, seg: TextSegment) {
        let idx = self.texts.len();
        for name in seg.processes.keys() {
            self.functions.insert(name.clone(), idx);
        }
        self.texts.push(seg);
    }

    /// Rebuild a program by rewriting every process body independently.
    pub fn try_map_processes<E, F>(&self, mut f: F) -> Result<Program, E>
    where
        F: FnMut(&str, &[Instruction]) -> Result<Vec<Instruction>, E>,
    {
        let mut out = self.shell();
        for seg in &self.texts {
            let mut processes = IndexMap::new();
            for (name, body) in &seg.processes {
                processes.insert(name.clone(), f(name, body)?);
            }
            out.push_text(TextSegment {
                data: seg.data.clone(),
                processes,
                labels: seg.labels.clone(),
            });
        }
        Ok(out)
    }

    /// Source lines in order, ending with `END`.
    pub fn to_lines(&self) -> Vec<Line> {
        let mut lines = self.segmentless.clone();

        for (name, body) in &self.misc {
            lines.push(format!("{name} SEGMENT"));
            lines.extend(body.iter().cloned());
            lines.push(format!("{name} ENDS"));
        }

        if let Some(data) = &self.data {
            lines.push(format!("{DATA} SEGMENT"));
            lines.extend(data.iter().cloned());
            lines.push(format!("{DATA} ENDS"));
        }

        for seg in &self.texts {
            lines.push(format!("{TEXT} SEGMENT"));
            for (name, value) in &seg.data {
                lines.push(format!("{name} = {value}"));
            }
            for (name, body) in &seg.processes {
                lines.push(format!("{name} PROC"));
                lines.extend(body.iter().map(Instruction::to_string));
                lines.push(format!("{name} ENDP"));
            }
            lines.push(format!("{TEXT} ENDS"));
        }

        lines.push("END".to_string());
        lines
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.to_lines() {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}
