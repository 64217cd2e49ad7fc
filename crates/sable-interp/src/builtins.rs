use crate::error::RuntimeError;
use crate::eval::Interpreter;
use crate::sequence::Sequence;
use crate::value::Value;
use num_bigint::BigInt;
use sable_syntax::Span;
use std::rc::Rc;

/// Native functions bound to the prelude's `external def`s of the same name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Builtin {
    Range,
    Naturals,
    Filter,
    Map,
    Take,
    List,
    Sequence,
    Length,
    Get,
    Sum,
    BigInt,
}

impl Builtin {
    pub const ALL: [Builtin; 11] = [
        Builtin::Range,
        Builtin::Naturals,
        Builtin::Filter,
        Builtin::Map,
        Builtin::Take,
        Builtin::List,
        Builtin::Sequence,
        Builtin::Length,
        Builtin::Get,
        Builtin::Sum,
        Builtin::BigInt,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Range => "range",
            Builtin::Naturals => "naturals",
            Builtin::Filter => "filter",
            Builtin::Map => "map",
            Builtin::Take => "take",
            Builtin::List => "list",
            Builtin::Sequence => "sequence",
            Builtin::Length => "length",
            Builtin::Get => "get",
            Builtin::Sum => "sum",
            Builtin::BigInt => "bigint",
        }
    }

    pub fn from_name(name: &str) -> Option<Builtin> {
        Self::ALL.into_iter().find(|b| b.name() == name)
    }
}

fn expect_args<const N: usize>(
    builtin: Builtin,
    args: Vec<Value>,
    span: Span,
) -> Result<[Value; N], RuntimeError> {
    let count = args.len();
    <[Value; N]>::try_from(args).map_err(|_| {
        RuntimeError::with_span(
            format!("{} expects {} arguments, got {}", builtin.name(), N, count),
            span,
        )
    })
}

/// A Number that is a whole, non-negative count or index.
fn as_index(value: &Value, builtin: Builtin, span: Span) -> Result<Option<usize>, RuntimeError> {
    let n = value.as_number(span)?;
    if !n.is_finite() || n.fract() != 0.0 {
        return Err(RuntimeError::with_span(
            format!("{} expects a whole number, got {}", builtin.name(), n),
            span,
        ));
    }
    Ok((n >= 0.0).then_some(n as usize))
}

pub(crate) fn call(
    interp: &mut Interpreter<'_>,
    builtin: Builtin,
    args: Vec<Value>,
    span: Span,
) -> Result<Value, RuntimeError> {
    match builtin {
        Builtin::Range => {
            let [from, to] = expect_args(builtin, args, span)?;
            Ok(Value::Sequence(Rc::new(Sequence::Range {
                start: from.as_number(span)?,
                end: Some(to.as_number(span)?),
            })))
        }
        Builtin::Naturals => {
            let [] = expect_args::<0>(builtin, args, span)?;
            Ok(Value::Sequence(Rc::new(Sequence::Range {
                start: 0.0,
                end: None,
            })))
        }
        Builtin::Filter => {
            let [items, keep] = expect_args(builtin, args, span)?;
            let source = items.as_sequence(span)?;
            keep.as_function(span)?;
            Ok(Value::Sequence(Rc::new(Sequence::Filter {
                source,
                predicate: keep,
            })))
        }
        Builtin::Map => {
            let [items, function] = expect_args(builtin, args, span)?;
            let source = items.as_sequence(span)?;
            function.as_function(span)?;
            Ok(Value::Sequence(Rc::new(Sequence::Map { source, function })))
        }
        Builtin::Take => {
            let [items, count] = expect_args(builtin, args, span)?;
            let source = items.as_sequence(span)?;
            let Some(count) = as_index(&count, builtin, span)? else {
                return Err(RuntimeError::with_span(
                    "take expects a non-negative count",
                    span,
                ));
            };
            let mut cursor = source.cursor();
            let mut taken = Vec::new();
            while taken.len() < count {
                match cursor.next(interp, span)? {
                    Some(item) => taken.push(item),
                    None => break,
                }
            }
            Ok(Value::List(Rc::new(taken)))
        }
        Builtin::List => Ok(Value::List(Rc::new(args))),
        Builtin::Sequence => {
            let [items] = expect_args(builtin, args, span)?;
            Ok(Value::Sequence(Rc::new(Sequence::Items(
                items.as_list(span)?,
            ))))
        }
        Builtin::Length => {
            let [items] = expect_args(builtin, args, span)?;
            Ok(Value::Number(items.as_list(span)?.len() as f64))
        }
        Builtin::Get => {
            let [items, index] = expect_args(builtin, args, span)?;
            let items = items.as_list(span)?;
            let item = as_index(&index, builtin, span)?.and_then(|i| items.get(i).cloned());
            Ok(item.unwrap_or(Value::Null))
        }
        Builtin::Sum => {
            let mut total = 0.0;
            for arg in &args {
                total += arg.as_number(span)?;
            }
            Ok(Value::Number(total))
        }
        Builtin::BigInt => {
            let [value] = expect_args(builtin, args, span)?;
            let n = value.as_number(span)?;
            if !n.is_finite() || n.fract() != 0.0 {
                return Err(RuntimeError::with_span(
                    format!("bigint expects a whole number, got {}", n),
                    span,
                ));
            }
            format!("{:.0}", n)
                .parse::<BigInt>()
                .map(Value::BigInteger)
                .map_err(|e| RuntimeError::with_span(e.to_string(), span))
        }
    }
}
