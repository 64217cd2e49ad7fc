//! Tree-walking evaluation of validated Sable programs.

mod builtins;
mod error;
mod eval;
mod scope;
mod sequence;
mod value;

pub use builtins::Builtin;
pub use error::RuntimeError;
pub use eval::Interpreter;
pub use scope::Scope;
pub use sequence::{Cursor, Sequence};
pub use value::{Closure, FunctionValue, Parameters, Value};

use sable_typeck::Program;

/// Declarations of the natively implemented builtins.
pub const PRELUDE: &str = include_str!("../../../std/prelude.sable");

/// Byte offset of user code in [`with_prelude`]'s output.
pub const PRELUDE_OFFSET: u32 = PRELUDE.len() as u32 + 1;

/// Prepend the prelude to `source`.
pub fn with_prelude(source: &str) -> String {
    format!("{}\n{}", PRELUDE, source)
}

pub fn evaluate_program(program: &Program) -> Result<Value, RuntimeError> {
    Interpreter::new(program).run()
}
