//! C1: read-only SSA program facade.

pub mod program;
pub mod types;

pub use program::{
    BinOp, Block, BlockId, Callee, Const, Function, Instr, Position, Program, UnOp, ValueData,
    ValueId,
};
pub use types::{int_type_info, IntTypeInfo, Type};
