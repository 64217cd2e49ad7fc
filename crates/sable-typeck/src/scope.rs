use crate::model::DeclId;
use crate::types::{Type, TypeVariable};
use smol_str::SmolStr;
use std::fmt;
use std::rc::Rc;

/// What a name in expression position resolves to.
#[derive(Clone, Debug, PartialEq)]
pub enum ScopedDeclaration {
    /// A fully bound declaration.
    Closed(DeclId),
    /// A function referenced from inside its own body.
    Open(DeclId),
    /// A declaration known to hold the `tag` alternative of its union type.
    Narrowed { declaration: DeclId, tag: SmolStr },
    /// A nullable declaration known not to hold `null`.
    NonNull(DeclId),
}

impl ScopedDeclaration {
    pub fn declaration(&self) -> DeclId {
        match self {
            ScopedDeclaration::Closed(id)
            | ScopedDeclaration::Open(id)
            | ScopedDeclaration::NonNull(id) => *id,
            ScopedDeclaration::Narrowed { declaration, .. } => *declaration,
        }
    }
}

/// What a name in type position resolves to.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeAlike {
    /// A named type, possibly generic: `type Pair[A] = {first: A, second: A}`.
    Alias {
        parameters: Vec<TypeVariable>,
        target: Type,
    },
    Variable(TypeVariable),
    Constructor(TypeConstructor),
}

/// Built-in one-argument type constructors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeConstructor {
    List,
    Sequence,
}

impl TypeConstructor {
    pub fn apply(self, element: Type) -> Type {
        match self {
            TypeConstructor::List => Type::List(Box::new(element)),
            TypeConstructor::Sequence => Type::Sequence(Box::new(element)),
        }
    }
}

impl fmt::Display for TypeConstructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeConstructor::List => write!(f, "List"),
            TypeConstructor::Sequence => write!(f, "Sequence"),
        }
    }
}

#[derive(Debug)]
enum Binding {
    Declaration(ScopedDeclaration),
    TypeAlike(TypeAlike),
}

#[derive(Debug)]
struct Frame {
    name: SmolStr,
    binding: Binding,
    parent: Option<Rc<Frame>>,
}

/// Persistent name → declaration / type-alike mapping used while building a program.
///
/// Extending a scope never changes it: it returns a new scope whose head points at the old
/// one, so a closure captured earlier keeps seeing the bindings that existed back then.
/// Declarations and type-alikes are separate namespaces.
#[derive(Clone, Debug, Default)]
pub struct StaticScope {
    head: Option<Rc<Frame>>,
}

impl StaticScope {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in types every program starts with.
    pub fn root() -> Self {
        let simple = |ty| TypeAlike::Alias {
            parameters: vec![],
            target: ty,
        };
        Self::empty()
            .with_type_alike("Number".into(), simple(Type::Number))
            .with_type_alike("Boolean".into(), simple(Type::Boolean))
            .with_type_alike("BigInteger".into(), simple(Type::BigInteger))
            .with_type_alike("Null".into(), simple(Type::Singleton))
            .with_type_alike(
                "List".into(),
                TypeAlike::Constructor(TypeConstructor::List),
            )
            .with_type_alike(
                "Sequence".into(),
                TypeAlike::Constructor(TypeConstructor::Sequence),
            )
    }

    fn push(&self, name: SmolStr, binding: Binding) -> Self {
        Self {
            head: Some(Rc::new(Frame {
                name,
                binding,
                parent: self.head.clone(),
            })),
        }
    }

    pub fn with_declaration(&self, name: SmolStr, declaration: ScopedDeclaration) -> Self {
        self.push(name, Binding::Declaration(declaration))
    }

    pub fn with_type_alike(&self, name: SmolStr, alike: TypeAlike) -> Self {
        self.push(name, Binding::TypeAlike(alike))
    }

    fn frames(&self) -> impl Iterator<Item = &Frame> {
        std::iter::successors(self.head.as_deref(), |frame| frame.parent.as_deref())
    }

    pub fn scoped_declaration(&self, name: &str) -> Option<&ScopedDeclaration> {
        self.frames().find_map(|frame| match &frame.binding {
            Binding::Declaration(d) if frame.name == name => Some(d),
            _ => None,
        })
    }

    pub fn type_alike(&self, name: &str) -> Option<&TypeAlike> {
        self.frames().find_map(|frame| match &frame.binding {
            Binding::TypeAlike(t) if frame.name == name => Some(t),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Declaration;
    use la_arena::Arena;

    fn ids() -> (DeclId, DeclId) {
        let mut arena: Arena<Declaration> = Arena::new();
        let param = |name: &str| {
            Declaration::Parameter(crate::model::Parameter {
                name: name.into(),
                span: Default::default(),
                ty: Type::Number,
            })
        };
        (arena.alloc(param("a")), arena.alloc(param("b")))
    }

    #[test]
    fn later_bindings_shadow_earlier_ones() {
        let (first, second) = ids();
        let outer = StaticScope::empty().with_declaration("x".into(), ScopedDeclaration::Closed(first));
        let inner = outer.with_declaration("x".into(), ScopedDeclaration::Closed(second));
        assert_eq!(
            inner.scoped_declaration("x"),
            Some(&ScopedDeclaration::Closed(second))
        );
        assert_eq!(
            outer.scoped_declaration("x"),
            Some(&ScopedDeclaration::Closed(first))
        );
    }

    #[test]
    fn namespaces_are_separate() {
        let (first, _) = ids();
        let scope = StaticScope::root().with_declaration("Number".into(), ScopedDeclaration::Closed(first));
        assert!(matches!(
            scope.type_alike("Number"),
            Some(TypeAlike::Alias { target: Type::Number, .. })
        ));
        assert!(scope.scoped_declaration("Number").is_some());
        assert!(scope.scoped_declaration("Boolean").is_none());
    }

    #[test]
    fn root_has_constructors() {
        let scope = StaticScope::root();
        assert_eq!(
            scope.type_alike("List"),
            Some(&TypeAlike::Constructor(TypeConstructor::List))
        );
        assert!(scope.type_alike("Map").is_none());
    }
}
