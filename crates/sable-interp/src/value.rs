use crate::builtins::Builtin;
use crate::error::RuntimeError;
use crate::scope::Scope;
use crate::sequence::Sequence;
use num_bigint::BigInt;
use sable_syntax::Span;
use sable_typeck::FunctionBody;
use smol_str::SmolStr;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

// ── Value ────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub enum Value {
    Number(f64),
    Boolean(bool),
    BigInteger(BigInt),
    Null,
    List(Rc<Vec<Value>>),
    Sequence(Rc<Sequence>),
    Object(Rc<BTreeMap<SmolStr, Value>>),
    /// `payload # tag`. Every union value is one of these.
    Tagged(Rc<Value>, SmolStr),
    Function(FunctionValue),
}

#[derive(Clone, Debug)]
pub enum FunctionValue {
    User(Rc<Closure>),
    Builtin(Builtin),
    /// An `external def` the interpreter has no native implementation for.
    Unbound(SmolStr),
}

#[derive(Debug)]
pub struct Closure {
    /// `None` for lambdas. A named function sees itself under this name while it runs.
    pub name: Option<SmolStr>,
    pub parameters: Parameters,
    pub body: FunctionBody,
    pub scope: Scope,
}

#[derive(Debug, Clone)]
pub enum Parameters {
    Basic(Vec<SmolStr>),
    /// All arguments are collected into one list.
    Vararg(SmolStr),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::BigInteger(n) => write!(f, "{}n", n),
            Value::Null => write!(f, "null"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Sequence(_) => write!(f, "<sequence>"),
            Value::Object(fields) => {
                write!(f, "{{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, value)?;
                }
                write!(f, "}}")
            }
            Value::Tagged(payload, tag) => match **payload {
                Value::Tagged(..) => write!(f, "({}) # {}", payload, tag),
                _ => write!(f, "{} # {}", payload, tag),
            },
            Value::Function(FunctionValue::User(closure)) => match &closure.name {
                Some(name) => write!(f, "<fn {}>", name),
                None => write!(f, "<fn>"),
            },
            Value::Function(FunctionValue::Builtin(builtin)) => {
                write!(f, "<builtin {}>", builtin.name())
            }
            Value::Function(FunctionValue::Unbound(name)) => write!(f, "<external {}>", name),
        }
    }
}

/// Functions and sequences compare by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::BigInteger(a), Value::BigInteger(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Tagged(a, a_tag), Value::Tagged(b, b_tag)) => a_tag == b_tag && a == b,
            (Value::Sequence(a), Value::Sequence(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => match (a, b) {
                (FunctionValue::User(a), FunctionValue::User(b)) => Rc::ptr_eq(a, b),
                (FunctionValue::Builtin(a), FunctionValue::Builtin(b)) => a == b,
                (FunctionValue::Unbound(a), FunctionValue::Unbound(b)) => a == b,
                _ => false,
            },
            _ => false,
        }
    }
}

// ── Casting helpers ──────────────────────────────────────────────

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "Number",
            Value::Boolean(_) => "Boolean",
            Value::BigInteger(_) => "BigInteger",
            Value::Null => "Null",
            Value::List(_) => "List",
            Value::Sequence(_) => "Sequence",
            Value::Object(_) => "Object",
            Value::Tagged(..) => "Tagged",
            Value::Function(_) => "Function",
        }
    }

    fn mismatch(&self, expected: &str, span: Span) -> RuntimeError {
        RuntimeError::with_span(
            format!("expected {}, got {}", expected, self.kind_name()),
            span,
        )
    }

    pub fn as_number(&self, span: Span) -> Result<f64, RuntimeError> {
        match self {
            Value::Number(n) => Ok(*n),
            other => Err(other.mismatch("Number", span)),
        }
    }

    pub fn as_boolean(&self, span: Span) -> Result<bool, RuntimeError> {
        match self {
            Value::Boolean(b) => Ok(*b),
            other => Err(other.mismatch("Boolean", span)),
        }
    }

    pub fn as_list(&self, span: Span) -> Result<Rc<Vec<Value>>, RuntimeError> {
        match self {
            Value::List(items) => Ok(items.clone()),
            other => Err(other.mismatch("List", span)),
        }
    }

    pub fn as_sequence(&self, span: Span) -> Result<Rc<Sequence>, RuntimeError> {
        match self {
            Value::Sequence(sequence) => Ok(sequence.clone()),
            other => Err(other.mismatch("Sequence", span)),
        }
    }

    pub fn as_function(&self, span: Span) -> Result<&FunctionValue, RuntimeError> {
        match self {
            Value::Function(function) => Ok(function),
            other => Err(other.mismatch("Function", span)),
        }
    }

    /// `(tag, payload)`.
    pub fn as_tagged(&self, span: Span) -> Result<(&SmolStr, &Value), RuntimeError> {
        match self {
            Value::Tagged(payload, tag) => Ok((tag, payload)),
            other => Err(other.mismatch("a tagged value", span)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_print_without_trailing_zero() {
        assert_eq!(Value::Number(7.0).to_string(), "7");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
        assert_eq!(Value::Number(-3.0).to_string(), "-3");
    }

    #[test]
    fn display_compound_values() {
        let list = Value::List(Rc::new(vec![Value::Number(1.0), Value::Null]));
        assert_eq!(list.to_string(), "[1, null]");
        let object = Value::Object(Rc::new(BTreeMap::from([
            ("b".into(), Value::Boolean(true)),
            ("a".into(), Value::BigInteger(BigInt::from(12))),
        ])));
        assert_eq!(object.to_string(), "{a: 12n, b: true}");
        let tagged = Value::Tagged(Rc::new(Value::Number(5.0)), "Tag1".into());
        assert_eq!(tagged.to_string(), "5 # Tag1");
        let nested = Value::Tagged(Rc::new(tagged), "Outer".into());
        assert_eq!(nested.to_string(), "(5 # Tag1) # Outer");
    }

    #[test]
    fn tagged_equality_needs_same_tag() {
        let a = Value::Tagged(Rc::new(Value::Number(1.0)), "A".into());
        let b = Value::Tagged(Rc::new(Value::Number(1.0)), "B".into());
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn casting_reports_kind() {
        let err = Value::Boolean(true).as_number(Span::new(3, 7)).unwrap_err();
        assert_eq!(err.to_string(), "[3:7] expected Number, got Boolean");
    }
}
