use color_print::cprintln;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("`{0} ENDS` without an open segment")]
    UnmatchedEnds(String),

    #[error("`{0} ENDS` does not close the open segment `{1}`")]
    MismatchedEnds(String, String),

    #[error("Segment `{0}` opened inside segment `{1}`")]
    NestedSegment(String, String),

    #[error("Segment `{0}` is not closed")]
    UnclosedSegment(String),

    #[error("`{0} PROC` outside of a text segment")]
    ProcOutsideText(String),

    #[error("Process `{0}` opened inside process `{1}`")]
    NestedProc(String, String),

    #[error("`{0} ENDP` does not close the open process `{1}`")]
    MismatchedEndp(String, String),

    #[error("`{0} ENDP` without an open process")]
    UnmatchedEndp(String),

    #[error("Process `{0}` is not closed")]
    UnclosedProc(String),

    #[error("Re-defined process: `{0}`")]
    RedefinedProc(String),

    #[error("Re-defined label: `{0}`")]
    RedefinedLabel(String),

    #[error("Unexpected line in text segment outside of a process")]
    UnexpectedLine,
}

/// A parse error at a source position.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line_no}: {kind}")]
pub struct Error {
    pub kind: ParseError,
    /// 1-based; 0 when the input ended.
    pub line_no: usize,
    pub content: String,
}

impl Error {
    pub fn new(kind: ParseError, line_no: usize, content: &str) -> Self {
        Error {
            kind,
            line_no,
            content: content.to_string(),
        }
    }

    /// Print error with diagnostic information showing file location and line content
    pub fn print_diag(&self, file: &str) {
        cprintln!("<red,bold>error</>: {}", self.kind);
        cprintln!("     <blue>--></> <underline>{}:{}</>", file, self.line_no);
        cprintln!("      <blue>|</>");
        cprintln!(" <blue>{:>4} |</> {}", self.line_no, self.content);
        cprintln!("      <blue>|</>");
    }
}
