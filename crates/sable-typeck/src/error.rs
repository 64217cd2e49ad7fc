use sable_parser::ParseError;
use sable_syntax::Span;

/// A program that parsed but is not well-formed: unresolved names, ill-typed expressions,
/// loops in type determination.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("[{}:{}] {message}", .span.start, .span.end)]
pub struct TypeCheckError {
    pub message: String,
    pub span: Span,
}

impl TypeCheckError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SableError {
    #[error("{}", join_parse_errors(.0))]
    Parse(Vec<ParseError>),
    #[error(transparent)]
    TypeCheck(#[from] TypeCheckError),
}

fn join_parse_errors(errors: &[ParseError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
