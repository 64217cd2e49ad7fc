//! Static semantics of Sable: name resolution, types, inference and validation.
//!
//! [`parse`] turns source text into a resolved [`Program`]; [`Program::validate`] then forces
//! every lazy type computation and reports the first failure.

pub mod builder;
mod error;
pub mod infer;
pub mod model;
pub mod scope;
pub mod types;
mod typing;
mod validate;

#[cfg(test)]
mod tests;

pub use error::{SableError, TypeCheckError};
pub use model::*;
pub use scope::{ScopedDeclaration, StaticScope, TypeAlike};
pub use types::{Argument, ArgumentList, FunctionType, Type, TypeVariable, UnionType};

use tracing::debug;

/// Parse and build a program. Resolution and type errors that the builder cannot see yet
/// are reported by [`Program::validate`].
pub fn parse(source_name: &str, source: &str) -> Result<Program, SableError> {
    let (file, errors) = sable_parser::parse(source);
    if !errors.is_empty() {
        debug!(source = source_name, errors = errors.len(), "parse failed");
        return Err(SableError::Parse(errors));
    }
    let program = builder::build(source_name, &file)?;
    debug!(
        source = source_name,
        exprs = program.exprs.len(),
        decls = program.decls.len(),
        "built program"
    );
    Ok(program)
}

/// [`parse`] followed by [`Program::validate`].
pub fn check(source_name: &str, source: &str) -> Result<Program, SableError> {
    let program = parse(source_name, source)?;
    program.validate()?;
    Ok(program)
}
