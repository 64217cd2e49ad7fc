use crate::value::Value;
use smol_str::SmolStr;
use std::fmt;
use std::rc::Rc;

/// Runtime name → value bindings.
///
/// Persistent: `with` returns a new scope layered on top of the old one, which stays
/// unchanged for every closure that captured it.
#[derive(Clone, Default)]
pub struct Scope {
    head: Option<Rc<Frame>>,
}

struct Frame {
    name: SmolStr,
    value: Value,
    parent: Option<Rc<Frame>>,
}

impl Scope {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with(&self, name: SmolStr, value: Value) -> Self {
        Self {
            head: Some(Rc::new(Frame {
                name,
                value,
                parent: self.head.clone(),
            })),
        }
    }

    fn frames(&self) -> impl Iterator<Item = &Frame> {
        std::iter::successors(self.head.as_deref(), |frame| frame.parent.as_deref())
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.frames()
            .find(|frame| frame.name == name)
            .map(|frame| frame.value.clone())
    }

    pub fn len(&self) -> usize {
        self.frames().count()
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope").field("bindings", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shadowing_leaves_captured_scope_alone() {
        let outer = Scope::empty().with("x".into(), Value::Number(1.0));
        let captured = outer.clone();
        let inner = outer.with("x".into(), Value::Number(2.0));
        assert_eq!(inner.lookup("x"), Some(Value::Number(2.0)));
        assert_eq!(captured.lookup("x"), Some(Value::Number(1.0)));
        assert_eq!(inner.len(), 2);
    }

    #[test]
    fn missing_name() {
        let scope = Scope::empty().with("x".into(), Value::Null);
        assert_eq!(scope.lookup("y"), None);
        assert!(Scope::empty().is_empty());
    }
}
