pub mod config;
pub mod error;
pub mod inline;
pub mod junk;
pub mod msg;
pub mod names;
pub mod permute;
pub mod pipeline;
pub mod technique;

pub use config::{Config, Step, TechniqueKind};
pub use error::{Error, Result};
pub use pipeline::Pipeline;
pub use technique::Technique;
