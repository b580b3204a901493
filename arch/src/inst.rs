use color_print::cformat;
use std::fmt;

use crate::op::OpKind;
use crate::operand::{replace_word, split_operands, Operand};
use crate::unit::{Unit, UnitSet};

/// A tokenized source line inside a process, with the units it reads and writes.
#[derive(Debug, Clone)]
pub struct Instruction {
    tokens: Vec<String>,
    uses: UnitSet,
    changes: UnitSet,
    includes: UnitSet,
    classified: bool,
}

impl PartialEq for Instruction {
    fn eq(&self, other: &Self) -> bool {
        self.tokens == other.tokens
    }
}

impl Eq for Instruction {}

impl Instruction {
    pub fn new(tokens: Vec<String>) -> Self {
        let tokens: Vec<String> = tokens
            .into_iter()
            .filter(|token| !token.eq_ignore_ascii_case("SHORT"))
            .collect();
        let (effects, classified) = classify(&tokens);
        Instruction {
            includes: effects.uses.union(&effects.changes),
            uses: effects.uses,
            changes: effects.changes,
            classified,
            tokens,
        }
    }

    pub fn parse(line: &str) -> Self {
        Instruction::new(line.split_whitespace().map(str::to_string).collect())
    }

    pub fn label_def(name: &str) -> Self {
        Instruction::new(vec![format!("{name}:")])
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn mnemonic(&self) -> &str {
        self.tokens.first().map(String::as_str).unwrap_or("")
    }

    pub fn op(&self) -> Option<OpKind> {
        OpKind::parse(self.mnemonic()).ok()
    }

    pub fn operands(&self) -> Vec<String> {
        split_operands(&self.tokens.get(1..).unwrap_or_default().join(" "))
    }

    /// Name declared by a `name:` line.
    pub fn label(&self) -> Option<&str> {
        match self.tokens.as_slice() {
            [single] if single.len() > 1 => single.strip_suffix(':'),
            _ => None,
        }
    }

    pub fn uses(&self) -> &UnitSet {
        &self.uses
    }

    pub fn changes(&self) -> &UnitSet {
        &self.changes
    }

    pub fn includes(&self) -> &UnitSet {
        &self.includes
    }

    /// `false` when the conservative fallback was applied.
    pub fn is_classified(&self) -> bool {
        self.classified
    }

    /// Copy with every boundary-flanked `old` replaced by `new`.
    pub fn rename(&self, old: &str, new: &str) -> Instruction {
        Instruction::new(
            self.tokens
                .iter()
                .map(|token| replace_word(token, old, new))
                .collect(),
        )
    }

    pub fn cformat(&self) -> String {
        if let Some(label) = self.label() {
            return cformat!("<g>{}:</>", label);
        }
        let operands = self.operands().join(", ");
        if self.classified {
            cformat!("    <r>{:<6}</> <b>{}</>", self.mnemonic(), operands)
        } else {
            cformat!("    <r,u>{:<6}</> <b>{}</>", self.mnemonic(), operands)
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tokens.join(" "))
    }
}

// ----------------------------------------------------------------------------
// Classifier

#[derive(Debug, Default)]
struct Effects {
    uses: UnitSet,
    changes: UnitSet,
}

impl Effects {
    fn everything() -> Self {
        Effects {
            uses: UnitSet::all(),
            changes: UnitSet::all(),
        }
    }

    fn use_unit(&mut self, unit: Unit) {
        self.uses.insert(unit);
    }

    fn change_unit(&mut self, unit: Unit) {
        self.changes.insert(unit);
    }

    fn change_flags(&mut self, flags: &[Unit]) {
        for flag in flags {
            self.change_unit(*flag);
        }
    }

    fn read(&mut self, op: &Operand) {
        if op.is_pointer() {
            self.use_unit(Unit::MEM);
        }
        for unit in op.units() {
            self.use_unit(unit);
        }
    }

    fn write(&mut self, op: &Operand) {
        if op.is_pointer() {
            self.change_unit(Unit::MEM);
            for unit in op.units() {
                self.use_unit(unit);
            }
        } else {
            for unit in op.units() {
                self.change_unit(unit);
            }
            // Partial writes keep the upper bits alive.
            if op.is_partial() {
                for unit in op.units() {
                    self.use_unit(unit);
                }
            }
        }
    }

    fn read_write(&mut self, op: &Operand) {
        self.read(op);
        self.write(op);
    }

    fn stack(&mut self) {
        self.use_unit(Unit::SP);
        self.change_unit(Unit::SP);
        self.use_unit(Unit::MEM);
        self.change_unit(Unit::MEM);
    }
}

const ARITH_FLAGS: [Unit; 6] = Unit::FLAGS;
const INC_FLAGS: [Unit; 5] = [Unit::PF, Unit::AF, Unit::ZF, Unit::SF, Unit::OF];

/// Compute uses/changes of one tokenized line. The flag tells whether a rule applied.
fn classify(tokens: &[String]) -> (Effects, bool) {
    let Some(mnemonic) = tokens.first() else {
        return (Effects::default(), true);
    };

    // A label is a join point: nothing may move across it.
    if tokens.len() == 1 && mnemonic.len() > 1 && mnemonic.ends_with(':') {
        return (Effects::everything(), true);
    }

    let Ok(op) = OpKind::parse(mnemonic) else {
        return (Effects::everything(), false);
    };
    if op.is_control_flow() {
        return (Effects::everything(), true);
    }

    let args: Vec<Operand> = split_operands(&tokens[1..].join(" "))
        .iter()
        .map(|arg| Operand::parse(arg))
        .collect();
    if Some(args.len()) != op.arity() || args.iter().any(|arg| arg.untracked) {
        return (Effects::everything(), false);
    }

    use OpKind::*;
    let mut fx = Effects::default();
    match (op, args.as_slice()) {
        (NOP, []) => {}
        (CDQ, []) => {
            fx.use_unit(Unit::AX);
            fx.change_unit(Unit::DX);
        }
        (PUSH, [src]) => {
            fx.stack();
            fx.read(src);
        }
        (POP, [dst]) => {
            fx.stack();
            fx.write(dst);
        }
        (INC | DEC, [dst]) => {
            fx.change_flags(&INC_FLAGS);
            fx.read_write(dst);
        }
        (NOT, [dst]) => fx.read_write(dst),
        (NEG, [dst]) => {
            fx.change_flags(&ARITH_FLAGS);
            fx.read_write(dst);
        }
        (MOV, [dst, src]) => {
            fx.write(dst);
            fx.read(src);
        }
        (XOR | SUB, [dst, src]) if !dst.is_pointer() && dst == src && !dst.is_partial() => {
            // Zeroing idiom: the old value is never read.
            fx.change_flags(&ARITH_FLAGS);
            fx.write(dst);
        }
        (ADD | SUB | AND | OR | XOR | ADC | SBB, [dst, src]) => {
            if matches!(op, ADC | SBB) {
                fx.use_unit(Unit::CF);
            }
            fx.change_flags(&ARITH_FLAGS);
            fx.read_write(dst);
            fx.read(src);
        }
        (CMP | TEST, [lhs, rhs]) => {
            fx.change_flags(&ARITH_FLAGS);
            fx.read(lhs);
            fx.read(rhs);
        }
        (LEA, [dst, src]) => {
            fx.write(dst);
            fx.read(src);
        }
        (XCHG, [a, b]) => {
            fx.read_write(a);
            fx.read_write(b);
        }
        _ => return (Effects::everything(), false),
    }
    (fx, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use Unit::*;

    macro_rules! test_classify {
        ($($name:ident: $line:expr => [$($u:ident),*], [$($c:ident),*],)*) => {
            $(
                #[test]
                fn $name() {
                    let inst = Instruction::parse($line);
                    assert_eq!(inst.uses(), &UnitSet::of(&[$($u),*]), "uses of `{}`", $line);
                    assert_eq!(inst.changes(), &UnitSet::of(&[$($c),*]), "changes of `{}`", $line);
                    assert!(inst.is_classified());
                }
            )*
        }
    }

    test_classify! {
        test_nop: "nop" => [], [],
        test_cdq: "cdq" => [AX], [DX],
        test_mov_reg_imm: "mov eax, 1" => [], [AX],
        test_mov_reg_reg: "mov eax, ebx" => [BX], [AX],
        test_mov_load: "mov eax, DWORD PTR _x$[ebp]" => [BP, MEM], [AX],
        test_mov_store: "mov DWORD PTR [esi+4], ecx" => [SI, CX], [MEM],
        test_mov_partial: "mov al, 1" => [AX], [AX],
        test_add: "add eax, ebx" => [AX, BX], [AX, CF, PF, AF, ZF, SF, OF],
        test_add_mem: "add DWORD PTR [eax], 4" => [AX, MEM], [MEM, CF, PF, AF, ZF, SF, OF],
        test_adc: "adc edx, 0" => [DX, CF], [DX, CF, PF, AF, ZF, SF, OF],
        test_xor_zero: "xor eax, eax" => [], [AX, CF, PF, AF, ZF, SF, OF],
        test_cmp: "cmp ecx, DWORD PTR _n$[ebp]" => [CX, BP, MEM], [CF, PF, AF, ZF, SF, OF],
        test_test: "test eax, eax" => [AX], [CF, PF, AF, ZF, SF, OF],
        test_inc: "inc ecx" => [CX], [CX, PF, AF, ZF, SF, OF],
        test_inc_mem: "inc DWORD PTR [ebx]" => [BX, MEM], [MEM, PF, AF, ZF, SF, OF],
        test_not: "not edx" => [DX], [DX],
        test_push: "push ebp" => [SP, BP, MEM], [SP, MEM],
        test_push_imm: "push 5" => [SP, MEM], [SP, MEM],
        test_pop: "pop ebp" => [SP, MEM], [SP, BP, MEM],
        test_lea: "lea eax, DWORD PTR [ecx+edx*2]" => [CX, DX, MEM], [AX],
        test_xchg: "xchg eax, ecx" => [AX, CX], [AX, CX],
        test_x64: "mov rax, QWORD PTR [rsp+8]" => [SP, MEM], [AX],
    }

    #[test]
    fn control_flow_touches_everything() {
        for line in ["call _foo", "ret", "ret 8", "jmp SHORT $LN3@main", "jne $LN2@main", "loop $L1"] {
            let inst = Instruction::parse(line);
            assert_eq!(inst.uses(), &UnitSet::all(), "{line}");
            assert_eq!(inst.changes(), &UnitSet::all(), "{line}");
            assert!(inst.is_classified());
        }
    }

    #[test]
    fn fallback() {
        for line in ["imul eax, ecx", "rep stosd", "mov r8d, 1", "mov eax", "npad 2"] {
            let inst = Instruction::parse(line);
            assert_eq!(inst.includes(), &UnitSet::all(), "{line}");
            assert!(!inst.is_classified(), "{line}");
        }
    }

    #[test]
    fn labels() {
        let inst = Instruction::parse("$LN3@main:");
        assert_eq!(inst.label(), Some("$LN3@main"));
        assert_eq!(inst.includes(), &UnitSet::all());
        assert_eq!(Instruction::parse("mov eax, 1").label(), None);
        assert_eq!(Instruction::label_def("exit").to_string(), "exit:");
    }

    #[test]
    fn tokens_and_operands() {
        let inst = Instruction::parse("jmp SHORT $LN3@main");
        assert_eq!(inst.tokens(), ["jmp", "$LN3@main"]);
        assert_eq!(inst.operands(), vec!["$LN3@main"]);
        let inst = Instruction::parse("mov DWORD PTR _num$[ebp], eax");
        assert_eq!(inst.operands(), vec!["DWORD PTR _num$[ebp]", "eax"]);
        assert_eq!(inst.op(), Some(OpKind::MOV));
        assert_eq!(inst.to_string(), "mov DWORD PTR _num$[ebp], eax");
    }

    #[test]
    fn rename() {
        let inst = Instruction::parse("mov eax, DWORD PTR _num$[ebp]").rename("_num$", "_num$1");
        assert_eq!(inst.to_string(), "mov eax, DWORD PTR _num$1[ebp]");
        assert_eq!(inst.uses(), &UnitSet::of(&[BP, MEM]));
        let inst = Instruction::parse("jne $LN2@foo").rename("$LN2@foo", "$LN3@foo");
        assert_eq!(inst.to_string(), "jne $LN3@foo");
    }
}
