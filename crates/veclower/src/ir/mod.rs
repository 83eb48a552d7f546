//! Minimal value graph driven by the lowering patterns.
//!
//! Every operation defines one typed value. Builders on [`Graph`] check
//! operand types and infer result types, so a graph that was built without
//! errors is well typed.

mod builder;
mod graph;
mod op;
mod print;

pub use graph::{Checkpoint, Graph};
pub use op::{ConstantValue, OpId, OpKind, Operation, OuterProductOp, Position, ValueId};
