use arch::{Instruction, Mode, OpKind};
use indexmap::{IndexMap, IndexSet};
use masm::{Program, TextSegment};
use rand::rngs::StdRng;
use tracing::{debug, info};

use crate::error::Result;
use crate::names::fresh_name;
use crate::technique::Technique;

/// Replaces `call NAME` by the body of the process `NAME`, once per call site.
pub struct Inliner {
    mode: Mode,
}

/// Names visible while one caller is being rewritten.
struct Scope<'a> {
    data: &'a mut IndexMap<String, String>,
    seg_labels: &'a mut Vec<String>,
    labels: &'a mut IndexSet<String>,
    functions: &'a IndexMap<String, usize>,
}

impl Scope<'_> {
    fn taken(&self, name: &str) -> bool {
        self.labels.contains(name) || self.functions.contains_key(name) || self.data.contains_key(name)
    }

    fn declare_label(&mut self, candidate: &str) -> Result<String> {
        let name = fresh_name(candidate, |n| self.taken(n))?;
        self.labels.insert(name.clone());
        self.seg_labels.push(name.clone());
        Ok(name)
    }
}

impl Inliner {
    pub fn new(mode: Mode) -> Self {
        Inliner { mode }
    }

    pub fn inline(&self, source: &Program) -> Result<Program> {
        let mut out = source.shell();
        let mut sites = 0;
        for seg in &source.texts {
            let mut data = seg.data.clone();
            let mut seg_labels = seg.labels.clone();
            let mut processes = IndexMap::new();
            for (caller, body) in &seg.processes {
                let mut scope = Scope {
                    data: &mut data,
                    seg_labels: &mut seg_labels,
                    labels: &mut out.labels,
                    functions: &source.functions,
                };
                let mut lines = Vec::with_capacity(body.len());
                for inst in body {
                    match callee(source, inst) {
                        Some((name, callee_seg, callee_body)) => {
                            debug!(caller = caller.as_str(), callee = name, "inline call site");
                            lines.extend(self.expand(name, callee_seg, callee_body, &mut scope)?);
                            sites += 1;
                        }
                        None => lines.push(inst.clone()),
                    }
                }
                processes.insert(caller.clone(), lines);
            }
            out.push_text(TextSegment {
                data,
                processes,
                labels: seg_labels,
            });
        }
        info!(sites, "inlined call sites");
        Ok(out)
    }

    /// Callee body rewritten for one call site, with its names made unique in `scope`.
    fn expand(
        &self,
        name: &str,
        callee_seg: &TextSegment,
        callee_body: &[Instruction],
        scope: &mut Scope,
    ) -> Result<Vec<Instruction>> {
        let mut body = callee_body.to_vec();

        for (sym, value) in &callee_seg.data {
            if scope.data.get(sym) == Some(value) {
                continue;
            }
            // Callee symbols not merged yet still own their names.
            let fresh = fresh_name(sym, |n| {
                scope.taken(n) || (n != sym && callee_seg.data.contains_key(n))
            })?;
            if fresh != *sym {
                body = rename(&body, sym, &fresh);
            }
            scope.data.insert(fresh, value.clone());
        }

        let declared: Vec<String> = body
            .iter()
            .filter_map(|inst| inst.label().map(str::to_string))
            .collect();
        for label in declared {
            let fresh = scope.declare_label(&label)?;
            body = rename(&body, &label, &fresh);
        }

        let exit = scope.declare_label(&format!("$LN1@{name}"))?;
        let sp = self.mode.stack_pointer();
        let word = self.mode.word_size();

        // The reserved slot stands in for the return address the call would push.
        let mut lines = vec![Instruction::parse(&format!("sub {sp}, {word}"))];
        for inst in body {
            if inst.op() != Some(OpKind::RET) {
                lines.push(inst);
                continue;
            }
            if let Some(n) = popped_bytes(&inst) {
                lines.push(Instruction::parse(&format!("add {sp}, {n}")));
            }
            lines.push(Instruction::parse(&format!("jmp {exit}")));
        }
        lines.push(Instruction::label_def(&exit));
        lines.push(Instruction::parse(&format!("add {sp}, {word}")));
        Ok(lines)
    }
}

impl Technique for Inliner {
    fn name(&self) -> &'static str {
        "inline"
    }

    fn apply(&self, program: &Program, _rng: &mut StdRng) -> Result<Program> {
        self.inline(program)
    }
}

/// Target of a `call` into a process of this program that is safe to copy.
fn callee<'p>(
    program: &'p Program,
    inst: &Instruction,
) -> Option<(&'p str, &'p TextSegment, &'p [Instruction])> {
    if inst.op() != Some(OpKind::CALL) {
        return None;
    }
    let [target]: [String; 1] = inst.operands().try_into().ok()?;
    let (name, seg) = program.functions.get_key_value(target.as_str())?;
    let seg = program.texts.get(*seg)?;
    let body = seg.processes.get(name)?;
    let returns_plainly = body.iter().all(|i| {
        !matches!(
            i.mnemonic().to_ascii_lowercase().as_str(),
            "retn" | "retf" | "iret" | "iretd" | "iretq"
        )
    });
    returns_plainly.then_some((name.as_str(), seg, body.as_slice()))
}

fn rename(body: &[Instruction], old: &str, new: &str) -> Vec<Instruction> {
    body.iter().map(|inst| inst.rename(old, new)).collect()
}

/// Extra bytes released by `ret N`. `None` for a bare `ret` or `ret 0`.
fn popped_bytes(ret: &Instruction) -> Option<String> {
    let [n]: [String; 1] = ret.operands().try_into().ok()?;
    let digits = n.trim_end_matches(['h', 'H']);
    let zero = !digits.is_empty() && digits.chars().all(|c| c == '0');
    (!zero).then_some(n)
}
