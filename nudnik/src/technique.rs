use masm::Program;
use rand::rngs::StdRng;

use crate::error::Result;

/// One program-to-program rewrite. Passes never mutate their input.
pub trait Technique {
    fn name(&self) -> &'static str;
    fn apply(&self, program: &Program, rng: &mut StdRng) -> Result<Program>;
}
