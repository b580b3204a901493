use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] masm::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Cannot parse configuration: {0}")]
    ConfigSyntax(#[from] serde_yaml::Error),

    #[error("No free name derived from `{0}` after {1} attempts")]
    NameExhausted(String, usize),

    #[error("Program grew to {0} instructions, above the limit of {1}")]
    InstructionLimit(usize, usize),

    #[error("Reordering of `{0}` stalled with {1} instructions left")]
    Stalled(String, usize),

    #[error("Failed to open file: {0}")]
    FileOpen(String, #[source] std::io::Error),

    #[error("Failed to create file: {0}")]
    FileCreate(String, #[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
