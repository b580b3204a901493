mod error;
mod lexer;
mod parser;
mod program;
mod util;

pub use error::{Error, ParseError};
pub use lexer::{strip_comment, tokenize, SourceLine};
pub use parser::parse_lines;
pub use program::{Line, Program, TextSegment, DATA, TEXT};
pub use util::print_dump;
