pub mod build;
mod constraint;
mod operand;

pub use constraint::*;
pub use operand::*;
