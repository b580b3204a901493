pub mod inst;
pub mod op;
pub mod operand;
pub mod reg;
pub mod unit;

pub use inst::Instruction;
pub use op::OpKind;
pub use reg::Mode;
pub use unit::{Unit, UnitSet};
