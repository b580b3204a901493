use arch::Instruction;

use crate::error::{Error, ParseError};
use crate::lexer::{tokenize, SourceLine};
use crate::program::{Program, TextSegment, DATA, TEXT};

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Outside,
    Data,
    Text { proc: Option<String> },
    Misc(String),
}

impl State {
    fn segment(&self) -> &str {
        match self {
            State::Outside => "",
            State::Data => DATA,
            State::Text { .. } => TEXT,
            State::Misc(name) => name,
        }
    }

    /// Error for input that stops while this state is open.
    fn unclosed(&self) -> Option<ParseError> {
        match self {
            State::Outside => None,
            State::Text { proc: Some(name) } => Some(ParseError::UnclosedProc(name.clone())),
            state => Some(ParseError::UnclosedSegment(state.segment().to_string())),
        }
    }
}

/// Single pass segment state machine over token lines.
struct Parser {
    program: Program,
    state: State,
}

impl Parser {
    fn new() -> Self {
        Parser {
            program: Program::new(),
            state: State::Outside,
        }
    }

    fn text(&mut self) -> &mut TextSegment {
        if self.program.texts.is_empty() {
            self.program.texts.push(TextSegment::new());
        }
        let last = self.program.texts.len() - 1;
        &mut self.program.texts[last]
    }

    fn open_segment(&mut self, name: &str) -> State {
        match name {
            DATA => {
                self.program.data.get_or_insert_with(Vec::new);
                State::Data
            }
            TEXT => {
                self.program.texts.push(TextSegment::new());
                State::Text { proc: None }
            }
            _ => {
                self.program.misc.entry(name.to_string()).or_default();
                State::Misc(name.to_string())
            }
        }
    }

    fn open_proc(&mut self, name: &str) -> Result<State, ParseError> {
        if self.program.functions.contains_key(name) {
            return Err(ParseError::RedefinedProc(name.to_string()));
        }
        let idx = self.program.texts.len() - 1;
        self.text().processes.insert(name.to_string(), vec![]);
        self.program.functions.insert(name.to_string(), idx);
        Ok(State::Text {
            proc: Some(name.to_string()),
        })
    }

    fn push_instruction(&mut self, proc: &str, tokens: &[String]) -> Result<(), ParseError> {
        let inst = Instruction::new(tokens.to_vec());
        if let Some(label) = inst.label() {
            if !self.program.labels.insert(label.to_string()) {
                return Err(ParseError::RedefinedLabel(label.to_string()));
            }
            let label = label.to_string();
            self.text().labels.push(label);
        }
        if let Some(body) = self.text().processes.get_mut(proc) {
            body.push(inst);
        }
        Ok(())
    }

    fn step(&mut self, state: State, line: &SourceLine) -> Result<State, ParseError> {
        use ParseError::*;
        let words: Vec<&str> = line.tokens.iter().map(String::as_str).collect();

        match (state, words.as_slice()) {
            // Segment-less code
            (State::Outside, [name, "SEGMENT"]) => Ok(self.open_segment(name)),
            (State::Outside, [name, "ENDS"]) => Err(UnmatchedEnds(name.to_string())),
            (State::Outside, [name, "PROC"]) => Err(ProcOutsideText(name.to_string())),
            (State::Outside, [name, "ENDP"]) => Err(UnmatchedEndp(name.to_string())),
            (State::Outside, _) => {
                self.program.segmentless.push(line.text.clone());
                Ok(State::Outside)
            }

            // Data segment
            (State::Data, [DATA, "ENDS"]) => Ok(State::Outside),
            (State::Data, [name, "ENDS"]) => Err(MismatchedEnds(name.to_string(), DATA.into())),
            (State::Data, [name, "SEGMENT"]) => Err(NestedSegment(name.to_string(), DATA.into())),
            (State::Data, _) => {
                if let Some(data) = &mut self.program.data {
                    data.push(line.text.clone());
                }
                Ok(State::Data)
            }

            // Text segment, outside of any process
            (State::Text { proc: None }, [TEXT, "ENDS"]) => Ok(State::Outside),
            (State::Text { proc: None }, [name, "ENDS"]) => {
                Err(MismatchedEnds(name.to_string(), TEXT.into()))
            }
            (State::Text { proc: None }, [name, "SEGMENT"]) => {
                Err(NestedSegment(name.to_string(), TEXT.into()))
            }
            (State::Text { proc: None }, [name, "PROC"]) => self.open_proc(name),
            (State::Text { proc: None }, [name, "ENDP"]) => Err(UnmatchedEndp(name.to_string())),
            (State::Text { proc: None }, [name, "=", _, ..]) => {
                let value = line.text.split_once('=').map_or("", |(_, v)| v.trim());
                self.text().data.insert(name.to_string(), value.to_string());
                Ok(State::Text { proc: None })
            }
            (State::Text { proc: None }, _) => Err(UnexpectedLine),

            // Inside a process
            (State::Text { proc: Some(open) }, [name, "ENDP"]) if *name == open => {
                Ok(State::Text { proc: None })
            }
            (State::Text { proc: Some(open) }, [name, "ENDP"]) => {
                Err(MismatchedEndp(name.to_string(), open))
            }
            (State::Text { proc: Some(open) }, [name, "PROC"]) => {
                Err(NestedProc(name.to_string(), open))
            }
            (State::Text { proc: Some(open) }, [_, "SEGMENT" | "ENDS"]) => Err(UnclosedProc(open)),
            (State::Text { proc: Some(open) }, _) => {
                self.push_instruction(&open, &line.tokens)?;
                Ok(State::Text { proc: Some(open) })
            }

            // Miscellaneous segment
            (State::Misc(seg), [name, "ENDS"]) if *name == seg => Ok(State::Outside),
            (State::Misc(seg), [name, "ENDS"]) => Err(MismatchedEnds(name.to_string(), seg)),
            (State::Misc(seg), [name, "SEGMENT"]) => Err(NestedSegment(name.to_string(), seg)),
            (State::Misc(seg), _) => {
                if let Some(lines) = self.program.misc.get_mut(&seg) {
                    lines.push(line.text.clone());
                }
                Ok(State::Misc(seg))
            }
        }
    }
}

/// Build a [`Program`] from token lines. Parsing stops at an `END` line outside any segment.
pub fn parse_lines(lines: &[SourceLine]) -> Result<Program, Error> {
    let mut parser = Parser::new();

    for line in lines {
        let fail = |kind| Error::new(kind, line.line_no, &line.raw);
        if line.is(&["END"]) {
            return match parser.state.unclosed() {
                Some(kind) => Err(fail(kind)),
                None => Ok(parser.program),
            };
        }
        let state = std::mem::replace(&mut parser.state, State::Outside);
        parser.state = parser.step(state, line).map_err(fail)?;
    }

    match (parser.state.unclosed(), lines.last()) {
        (Some(kind), Some(last)) => Err(Error::new(kind, last.line_no, &last.raw)),
        (Some(kind), None) => Err(Error::new(kind, 0, "")),
        (None, _) => Ok(parser.program),
    }
}

impl Program {
    /// Parse listing text. Comments and blank lines are ignored.
    pub fn parse(text: &str) -> Result<Program, Error> {
        parse_lines(&tokenize(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn err(src: &str) -> ParseError {
        Program::parse(src).expect_err("should fail").kind
    }

    #[test]
    fn segments() {
        let src = "\
.686P
.model flat
CONST SEGMENT
$SG1 DB 'hi', 00H
CONST ENDS
_DATA SEGMENT
_g DD 01H
_DATA ENDS
_TEXT SEGMENT
_x$ = 8
_foo PROC
$LN2@foo:
  mov eax, DWORD PTR _x$[esp]
  ret 0
_foo ENDP
_TEXT ENDS
END
garbage after end
";
        let prog = Program::parse(src).unwrap();
        assert_eq!(prog.segmentless, vec![".686P", ".model flat"]);
        assert_eq!(prog.misc["CONST"], vec!["$SG1 DB 'hi', 00H"]);
        assert_eq!(prog.data, Some(vec!["_g DD 01H".to_string()]));
        assert_eq!(prog.texts.len(), 1);
        assert_eq!(prog.texts[0].data["_x$"], "8");
        assert_eq!(prog.functions["_foo"], 0);
        assert_eq!(prog.texts[0].labels, vec!["$LN2@foo"]);
        assert!(prog.labels.contains("$LN2@foo"));
        assert_eq!(prog.process("_foo").map(<[_]>::len), Some(3));
    }

    #[test]
    fn multiple_text_segments() {
        let src = "\
_TEXT SEGMENT
_a PROC
ret 0
_a ENDP
_TEXT ENDS
_TEXT SEGMENT
_b PROC
ret 0
_b ENDP
_TEXT ENDS
END
";
        let prog = Program::parse(src).unwrap();
        assert_eq!(prog.functions["_a"], 0);
        assert_eq!(prog.functions["_b"], 1);
        assert_eq!(prog.data, None);
    }

    #[test]
    fn raw_text_is_kept() {
        let src = "_DATA SEGMENT
$SG1 DB 'a  b', 00H ; padded
_DATA ENDS
_TEXT SEGMENT
_s$ = -8   ; size = 8
_TEXT ENDS
END
";
        let prog = Program::parse(src).unwrap();
        assert_eq!(prog.data, Some(vec!["$SG1 DB 'a  b', 00H".to_string()]));
        assert_eq!(prog.texts[0].data["_s$"], "-8");
    }

    #[test]
    fn errors() {
        assert_eq!(err("_TEXT ENDS\n"), ParseError::UnmatchedEnds("_TEXT".into()));
        assert_eq!(err("_foo PROC\n"), ParseError::ProcOutsideText("_foo".into()));
        assert_eq!(
            err("_TEXT SEGMENT\n_a PROC\nret\n_b ENDP\n"),
            ParseError::MismatchedEndp("_b".into(), "_a".into())
        );
        assert_eq!(
            err("_TEXT SEGMENT\n_a PROC\n_b PROC\n"),
            ParseError::NestedProc("_b".into(), "_a".into())
        );
        assert_eq!(
            err("_DATA SEGMENT\nCONST SEGMENT\n"),
            ParseError::NestedSegment("CONST".into(), "_DATA".into())
        );
        assert_eq!(err("_DATA SEGMENT\nEND\n"), ParseError::UnclosedSegment("_DATA".into()));
        assert_eq!(
            err("_TEXT SEGMENT\n_a PROC\nret\n"),
            ParseError::UnclosedProc("_a".into())
        );
        assert_eq!(err("_TEXT SEGMENT\nmov eax, 1\n"), ParseError::UnexpectedLine);
        assert_eq!(
            err("_TEXT SEGMENT\n_a PROC\nL1:\nL1:\nret\n_a ENDP\n_TEXT ENDS\n"),
            ParseError::RedefinedLabel("L1".into())
        );
        assert_eq!(
            err("_TEXT SEGMENT\n_a PROC\n_a ENDP\n_a PROC\n"),
            ParseError::RedefinedProc("_a".into())
        );
    }

    #[test]
    fn error_position() {
        let e = Program::parse("_TEXT SEGMENT\n\n_a PROC\n  ret ; done\n_b ENDP\n").unwrap_err();
        assert_eq!(e.line_no, 5);
        assert_eq!(e.content, "_b ENDP");
    }
}
