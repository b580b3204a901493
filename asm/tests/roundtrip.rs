use masm::Program;

fn assert(code: &str) {
    let first = Program::parse(code).unwrap_or_else(|e| panic!("{e}"));
    let text = first.to_string();
    println!("{text}");
    let second = Program::parse(&text).unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(first, second);
    assert_eq!(first.labels, second.labels);
    for (a, b) in first.instructions().zip(second.instructions()) {
        assert_eq!(a.tokens(), b.tokens());
    }
}

macro_rules! case {
    ($name:ident, $code:expr) => {
        #[test]
        fn $name() {
            assert($code);
        }
    };
}

case!(empty, "END");

case!(
    segmentless_only,
    ".686P\n.XMM\ninclude listing.inc\n.model flat\nINCLUDELIB LIBCMT\nEND"
);

case!(
    data_and_misc,
    "\
PUBLIC _main
CONST SEGMENT
$SG4 DB 'x; y', 00H ; keeps the quoted semicolon
CONST ENDS
_DATA SEGMENT
_counter DD 0aH
_DATA ENDS
END
"
);

case!(
    padded_string,
    "_DATA SEGMENT\n$SG1 DB 'a  b', 00H\n_DATA ENDS\nEND"
);

case!(
    procedure,
    "\
_TEXT SEGMENT
_x$ = 8 ; size = 4
_n$ = -4 ; size = 4
_foo PROC
  push ebp
  mov ebp, esp
  push ecx
  mov eax, DWORD PTR _x$[ebp]
  mov DWORD PTR _n$[ebp], eax
$LN3@foo:
  cmp DWORD PTR _n$[ebp], 0
  jle SHORT $LN1@foo
  dec DWORD PTR _n$[ebp]
  jmp SHORT $LN3@foo
$LN1@foo:
  mov esp, ebp
  pop ebp
  ret 4
_foo ENDP
_TEXT ENDS
END
"
);

case!(
    two_segments,
    "\
_TEXT SEGMENT
_a PROC
  ret 0
_a ENDP
_TEXT ENDS
pdata SEGMENT
$pdata$a DD imagerel $LN3
pdata ENDS
_TEXT SEGMENT
_b PROC
  call _a
  ret 0
_b ENDP
_TEXT ENDS
END
"
);

#[test]
fn short_is_dropped() {
    let prog = Program::parse("_TEXT SEGMENT\n_a PROC\njmp SHORT L1\nL1:\nret\n_a ENDP\n_TEXT ENDS\nEND\n")
        .unwrap();
    let body = prog.process("_a").unwrap();
    assert_eq!(body[0].to_string(), "jmp L1");
    assert_eq!(body[1].label(), Some("L1"));
}

#[test]
fn serialized_layout() {
    let prog = Program::parse("_TEXT SEGMENT\nnum = 5\n_a PROC\nret 0\n_a ENDP\n_TEXT ENDS\nEND\n")
        .unwrap();
    let text = prog.to_string();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines,
        vec![
            "_TEXT SEGMENT",
            "num = 5",
            "_a PROC",
            "ret 0",
            "_a ENDP",
            "_TEXT ENDS",
            "END",
        ]
    );
}

#[test]
fn raw_lines_keep_spacing() {
    let code = "\
.model  flat
_DATA SEGMENT
$SG1 DB 'a  b', 00H   ; two blanks
_DATA ENDS
CONST SEGMENT
$SG2 DB '   ', 00H
CONST ENDS
END
";
    let text = Program::parse(code).unwrap().to_string();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines,
        vec![
            ".model  flat",
            "CONST SEGMENT",
            "$SG2 DB '   ', 00H",
            "CONST ENDS",
            "_DATA SEGMENT",
            "$SG1 DB 'a  b', 00H",
            "_DATA ENDS",
            "END",
        ]
    );
}

#[test]
fn empty_data_segment_is_kept() {
    let text = Program::parse("_DATA SEGMENT\n_DATA ENDS\nEND\n").unwrap().to_string();
    assert_eq!(text, "_DATA SEGMENT\n_DATA ENDS\nEND\n");
    assert_eq!(Program::parse("END").unwrap().to_string(), "END\n");
}
