use arch::{Instruction, Mode, Unit, UnitSet};
use masm::Program;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::info;

use crate::error::{Error, Result};
use crate::technique::Technique;

const ARITH: [&str; 5] = ["add", "sub", "xor", "and", "or"];

/// Inserts instructions that only write units nobody reads before the next write.
pub struct JunkInjector {
    mode: Mode,
    size: usize,
}

/// For each position, the units whose first reference at or after it is a read.
/// Everything is assumed read once the process ends.
pub fn next_use(body: &[Instruction]) -> Vec<UnitSet> {
    let mut live = UnitSet::all();
    let mut out = vec![UnitSet::none(); body.len()];
    for (i, inst) in body.iter().enumerate().rev() {
        for unit in inst.includes().iter() {
            live.set(unit, inst.uses().get(unit));
        }
        out[i] = live;
    }
    out
}

impl JunkInjector {
    /// `size` bounds how many junk instructions may precede one instruction.
    pub fn new(mode: Mode, size: usize) -> Self {
        JunkInjector { mode, size }
    }

    pub fn inject(&self, program: &Program, rng: &mut StdRng) -> Result<Program> {
        let mut added = 0;
        let out = program.try_map_processes(|_, body| {
            let spliced = self.splice(body, rng);
            added += spliced.len() - body.len();
            Ok::<_, Error>(spliced.into_iter().map(|(inst, _)| inst).collect())
        })?;
        info!(added, "injected junk instructions");
        Ok(out)
    }

    /// The body with junk in front of original instructions. `true` marks junk.
    fn splice(&self, body: &[Instruction], rng: &mut StdRng) -> Vec<(Instruction, bool)> {
        let live = next_use(body);
        let mut out = Vec::with_capacity(body.len());
        for (inst, live) in body.iter().zip(&live) {
            let dead: Vec<Unit> = Unit::REGS
                .into_iter()
                .filter(|unit| *unit != Unit::SP && !live.get(*unit))
                .collect();
            let flags_dead = Unit::FLAGS.iter().all(|flag| !live.get(*flag));
            if !dead.is_empty() {
                for _ in 0..rng.gen_range(0..=self.size) {
                    for line in self.pick(&dead, flags_dead, rng) {
                        out.push((Instruction::parse(&line), true));
                    }
                }
            }
            out.push((inst.clone(), false));
        }
        out
    }

    /// One junk unit: zero, one or two lines writing only `dead` registers.
    fn pick(&self, dead: &[Unit], flags_dead: bool, rng: &mut StdRng) -> Vec<String> {
        let imm: u32 = rng.gen_range(0..=0x7fff);
        let Some(&dst) = dead.choose(rng) else {
            return vec![];
        };
        let name = |unit: Unit| self.mode.reg_name(unit).unwrap_or_default();
        match rng.gen_range(0..100) {
            50..=59 if dead.len() >= 2 => {
                let other: Vec<Unit> = dead.iter().copied().filter(|r| *r != dst).collect();
                match other.choose(rng) {
                    Some(src) => vec![format!("xchg {}, {}", name(dst), name(*src))],
                    None => vec![],
                }
            }
            60..=74 if flags_dead => {
                let op = ARITH.choose(rng).copied().unwrap_or("add");
                vec![format!("{op} {}, {imm}", name(dst))]
            }
            75..=84 => {
                let sources: Vec<Unit> =
                    Unit::REGS.into_iter().filter(|unit| *unit != Unit::SP).collect();
                let src = match sources.choose(rng).and_then(|r| self.mode.stack_name(*r)) {
                    Some(reg) if rng.gen_bool(0.5) => reg.to_string(),
                    _ => imm.to_string(),
                };
                match self.mode.stack_name(dst) {
                    Some(dst) => vec![format!("push {src}"), format!("pop {dst}")],
                    None => vec![],
                }
            }
            85.. => vec![],
            _ => vec![format!("mov {}, {imm}", name(dst))],
        }
    }
}

impl Technique for JunkInjector {
    fn name(&self) -> &'static str {
        "inject-junk"
    }

    fn apply(&self, program: &Program, rng: &mut StdRng) -> Result<Program> {
        self.inject(program, rng)
    }
}
