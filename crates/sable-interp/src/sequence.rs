//! Lazy sequences. A [`Sequence`] only describes how to produce items; every consumer
//! walks it with its own [`Cursor`], so a sequence can be consumed any number of times.

use crate::error::RuntimeError;
use crate::eval::Interpreter;
use crate::value::Value;
use sable_syntax::Span;
use std::rc::Rc;

#[derive(Debug)]
pub enum Sequence {
    /// `start, start + 1, ...` up to `end` (exclusive), or forever.
    Range { start: f64, end: Option<f64> },
    Items(Rc<Vec<Value>>),
    Filter { source: Rc<Sequence>, predicate: Value },
    Map { source: Rc<Sequence>, function: Value },
}

#[derive(Debug)]
pub enum Cursor {
    Range { next: f64, end: Option<f64> },
    Items { items: Rc<Vec<Value>>, index: usize },
    Filter { source: Box<Cursor>, predicate: Value },
    Map { source: Box<Cursor>, function: Value },
}

impl Sequence {
    pub fn cursor(&self) -> Cursor {
        match self {
            Sequence::Range { start, end } => Cursor::Range {
                next: *start,
                end: *end,
            },
            Sequence::Items(items) => Cursor::Items {
                items: items.clone(),
                index: 0,
            },
            Sequence::Filter { source, predicate } => Cursor::Filter {
                source: Box::new(source.cursor()),
                predicate: predicate.clone(),
            },
            Sequence::Map { source, function } => Cursor::Map {
                source: Box::new(source.cursor()),
                function: function.clone(),
            },
        }
    }
}

impl Cursor {
    /// Pull the next item. Filters and maps call back into the interpreter.
    pub fn next(
        &mut self,
        interp: &mut Interpreter<'_>,
        span: Span,
    ) -> Result<Option<Value>, RuntimeError> {
        match self {
            Cursor::Range { next, end } => {
                if end.is_some_and(|end| *next >= end) {
                    return Ok(None);
                }
                let value = *next;
                *next += 1.0;
                Ok(Some(Value::Number(value)))
            }
            Cursor::Items { items, index } => {
                let item = items.get(*index).cloned();
                *index += 1;
                Ok(item)
            }
            Cursor::Filter { source, predicate } => loop {
                let Some(item) = source.next(interp, span)? else {
                    return Ok(None);
                };
                let keep = interp.call(predicate, vec![item.clone()], span)?;
                if keep.as_boolean(span)? {
                    return Ok(Some(item));
                }
            },
            Cursor::Map { source, function } => match source.next(interp, span)? {
                Some(item) => interp.call(function, vec![item], span).map(Some),
                None => Ok(None),
            },
        }
    }
}
