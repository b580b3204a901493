use arch::Mode;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;

use crate::error::{Error, Result};

pub const DEFAULT_JUNK_SIZE: i64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TechniqueKind {
    Inline,
    #[serde(alias = "junk")]
    InjectJunk,
    Permute,
}

/// One entry of the ordered technique list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Step {
    pub kind: TechniqueKind,
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default = "once")]
    pub repeat: i64,
}

fn enabled() -> bool {
    true
}

fn once() -> i64 {
    1
}

fn default_junk_size() -> i64 {
    DEFAULT_JUNK_SIZE
}

impl Step {
    pub fn new(kind: TechniqueKind, repeat: i64) -> Self {
        Step {
            kind,
            enabled: true,
            repeat,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub mode: Mode,
    /// Fixed seed for reproducible output. Fresh entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_junk_size")]
    pub junk_size: i64,
    /// Abort once a pass leaves more instructions than this.
    #[serde(default)]
    pub max_instructions: Option<usize>,
    #[serde(default)]
    pub techniques: Vec<Step>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            mode: Mode::default(),
            seed: None,
            junk_size: DEFAULT_JUNK_SIZE,
            max_instructions: None,
            techniques: vec![],
        }
    }
}

impl Config {
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &str) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::FileOpen(path.to_string(), e))?;
        let config: Config = serde_yaml::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.junk_size < 0 {
            return Err(Error::Config(format!(
                "junk_size must not be negative, got {}",
                self.junk_size
            )));
        }
        if self.max_instructions == Some(0) {
            return Err(Error::Config("max_instructions must be positive".to_string()));
        }
        for step in &self.techniques {
            if step.repeat <= 0 {
                return Err(Error::Config(format!(
                    "repeat of {:?} must be positive, got {}",
                    step.kind, step.repeat
                )));
            }
        }
        Ok(())
    }

    /// Enabled steps expanded by their repeat count.
    pub fn passes(&self) -> impl Iterator<Item = TechniqueKind> + '_ {
        self.techniques
            .iter()
            .filter(|step| step.enabled)
            .flat_map(|step| std::iter::repeat(step.kind).take(step.repeat.max(0) as usize))
    }
}
