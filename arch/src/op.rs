use strum::{Display, EnumString};

/// Mnemonics with a hand-written use/def rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum OpKind {
    // Control flow
    CALL,
    RET,
    JMP,
    JE,
    JNE,
    JG,
    JGE,
    JA,
    JAE,
    JL,
    JLE,
    JB,
    JBE,
    JO,
    JNO,
    JZ,
    JNZ,
    JS,
    JNS,
    JC,
    JNC,
    JP,
    JNP,
    JPE,
    JPO,
    JNA,
    JNAE,
    JNB,
    JNBE,
    JNG,
    JNGE,
    JNL,
    JNLE,
    JCXZ,
    JECXZ,
    JRCXZ,
    LOOP,
    LOOPE,
    LOOPNE,
    LOOPNZ,
    LOOPZ,

    // No operand
    NOP,
    CDQ,

    // One operand
    PUSH,
    POP,
    INC,
    DEC,
    NOT,
    NEG,

    // Two operands
    MOV,
    ADD,
    SUB,
    AND,
    OR,
    XOR,
    ADC,
    SBB,
    CMP,
    TEST,
    LEA,
    XCHG,
}

impl OpKind {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_ascii_lowercase().parse::<Self>() {
            Ok(a) => Ok(a),
            Err(_) => Err(format!("Unknown mnemonic: {s}")),
        }
    }

    pub fn is_control_flow(&self) -> bool {
        self.arity().is_none()
    }

    /// Number of operands the rule is written for. `None` for control flow.
    pub fn arity(&self) -> Option<usize> {
        use OpKind::*;
        match self {
            NOP | CDQ => Some(0),
            PUSH | POP | INC | DEC | NOT | NEG => Some(1),
            MOV | ADD | SUB | AND | OR | XOR | ADC | SBB | CMP | TEST | LEA | XCHG => Some(2),
            _ => None,
        }
    }
}

#[test]
fn test() {
    assert_eq!(OpKind::parse("mov"), Ok(OpKind::MOV));
    assert_eq!(OpKind::parse("JNE"), Ok(OpKind::JNE));
    assert!(OpKind::parse("imul").is_err());
    assert!(OpKind::LOOPNZ.is_control_flow());
    assert!(!OpKind::LEA.is_control_flow());
    assert_eq!(OpKind::RET.arity(), None);
    assert_eq!(OpKind::XCHG.arity(), Some(2));
    assert_eq!(OpKind::CALL.to_string(), "call");
}
