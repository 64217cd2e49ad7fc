use sable_syntax::Span;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{}", render(.message, .span))]
pub struct RuntimeError {
    pub message: String,
    pub span: Option<Span>,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            span: None,
        }
    }

    pub fn with_span(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span: Some(span),
        }
    }
}

fn render(message: &str, span: &Option<Span>) -> String {
    match span {
        Some(span) => format!("[{}:{}] {}", span.start, span.end, message),
        None => message.to_string(),
    }
}
