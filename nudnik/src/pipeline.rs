use masm::Program;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use crate::config::{Config, TechniqueKind};
use crate::error::{Error, Result};
use crate::inline::Inliner;
use crate::junk::JunkInjector;
use crate::permute::Permuter;
use crate::technique::Technique;

/// Ordered list of techniques and the knobs shared by all of them.
pub struct Pipeline {
    passes: Vec<Box<dyn Technique>>,
    seed: Option<u64>,
    max_instructions: Option<usize>,
}

impl Pipeline {
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        let junk_size = config.junk_size as usize;
        let passes = config
            .passes()
            .map(|kind| -> Box<dyn Technique> {
                match kind {
                    TechniqueKind::Inline => Box::new(Inliner::new(config.mode)),
                    TechniqueKind::InjectJunk => Box::new(JunkInjector::new(config.mode, junk_size)),
                    TechniqueKind::Permute => Box::new(Permuter),
                }
            })
            .collect();
        Ok(Pipeline {
            passes,
            seed: config.seed,
            max_instructions: config.max_instructions,
        })
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|pass| pass.name()).collect()
    }

    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// Run every pass in order. The input is left untouched.
    pub fn apply(&self, program: &Program, rng: &mut StdRng) -> Result<Program> {
        let mut current = program.clone();
        for (idx, pass) in self.passes.iter().enumerate() {
            current = pass.apply(&current, rng)?;
            let count = current.instruction_count();
            info!(pass = idx + 1, technique = pass.name(), instructions = count, "applied");
            if let Some(limit) = self.max_instructions {
                if count > limit {
                    return Err(Error::InstructionLimit(count, limit));
                }
            }
        }
        Ok(current)
    }

    pub fn run(&self, program: &Program) -> Result<Program> {
        self.apply(program, &mut self.rng())
    }
}
