use crate::infer::Substitution;
use smol_str::SmolStr;
use std::collections::BTreeMap;
use std::fmt;

// ── Types ────────────────────────────────────────────────────────

/// A generic parameter. `id` tells apart same-named parameters of different declarations.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeVariable {
    pub name: SmolStr,
    pub id: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Type {
    Number,
    Boolean,
    BigInteger,
    /// The type of `null`, written `Null`.
    Singleton,
    List(Box<Type>),
    /// Lazy, possibly infinite stream.
    Sequence(Box<Type>),
    Object(BTreeMap<SmolStr, Type>),
    Function(Box<FunctionType>),
    Union(UnionType),
    /// A payload carrying a tag: the type of `value # Tag`.
    Tagged(Box<Type>, SmolStr),
    Nullable(Box<Type>),
    Variable(TypeVariable),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionType {
    pub type_variables: Vec<TypeVariable>,
    pub arguments: ArgumentList,
    pub return_type: Type,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArgumentList {
    Basic(Vec<Argument>),
    /// Matches zero or more trailing arguments of the element type.
    Vararg(Argument),
}

/// A named parameter slot. Names are documentation only: equality is by type.
#[derive(Clone, Debug)]
pub struct Argument {
    pub name: SmolStr,
    pub ty: Type,
}

impl PartialEq for Argument {
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty
    }
}

impl Eq for Argument {}

/// Tag → payload alternatives. A narrow union additionally pins one alternative.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnionType {
    pub alternatives: BTreeMap<SmolStr, Type>,
    pub narrowed: Option<SmolStr>,
}

impl UnionType {
    pub fn new(alternatives: BTreeMap<SmolStr, Type>) -> Self {
        Self {
            alternatives,
            narrowed: None,
        }
    }

    /// Pin `tag`, or `None` when `tag` is not an alternative.
    pub fn narrow(&self, tag: &str) -> Option<UnionType> {
        let (tag, _) = self.alternatives.get_key_value(tag)?;
        Some(UnionType {
            alternatives: self.alternatives.clone(),
            narrowed: Some(tag.clone()),
        })
    }

    pub fn widen(&self) -> UnionType {
        UnionType::new(self.alternatives.clone())
    }
}

// ── Errors ───────────────────────────────────────────────────────

/// A relation between two types that is not just "incompatible" but ill-formed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TypeRelationError {
    #[error("invalid tag '{tag}' for type {target}")]
    InvalidTag { tag: SmolStr, target: Type },
}

// ── Tag views ────────────────────────────────────────────────────

/// What `is`, `untag` and `match` see of a union or tagged type.
#[derive(Clone, Copy, Debug)]
pub enum TagView<'a> {
    Union(&'a UnionType),
    /// A tagged type acts as a union with one alternative, already narrowed.
    Tagged { payload: &'a Type, tag: &'a SmolStr },
}

impl<'a> TagView<'a> {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.payload(tag).is_some()
    }

    pub fn payload(&self, tag: &str) -> Option<&'a Type> {
        match *self {
            TagView::Union(union) => union.alternatives.get(tag),
            TagView::Tagged { payload, tag: own } => (own == tag).then_some(payload),
        }
    }

    /// The single alternative known to be present, if any.
    pub fn pinned(&self) -> Option<(&'a SmolStr, &'a Type)> {
        match *self {
            TagView::Union(union) => {
                let tag = union.narrowed.as_ref()?;
                union.alternatives.get_key_value(tag.as_str())
            }
            TagView::Tagged { payload, tag } => Some((tag, payload)),
        }
    }

    /// Tags a `match` must cover.
    pub fn required_tags(&self) -> Vec<&'a SmolStr> {
        match self.pinned() {
            Some((tag, _)) => vec![tag],
            None => match *self {
                TagView::Union(union) => union.alternatives.keys().collect(),
                TagView::Tagged { tag, .. } => vec![tag],
            },
        }
    }
}

// ── Construction & queries ───────────────────────────────────────

impl Type {
    /// `T?`; nullable of nullable collapses.
    pub fn nullable(inner: Type) -> Type {
        match inner {
            Type::Nullable(_) => inner,
            other => Type::Nullable(Box::new(other)),
        }
    }

    pub fn function(
        type_variables: Vec<TypeVariable>,
        arguments: ArgumentList,
        return_type: Type,
    ) -> Type {
        Type::Function(Box::new(FunctionType {
            type_variables,
            arguments,
            return_type,
        }))
    }

    pub fn tag_view(&self) -> Option<TagView<'_>> {
        match self {
            Type::Union(union) => Some(TagView::Union(union)),
            Type::Tagged(payload, tag) => Some(TagView::Tagged { payload, tag }),
            _ => None,
        }
    }

    /// Drop a smart-cast narrowing, if any.
    pub fn widened(&self) -> Type {
        match self {
            Type::Union(union) if union.narrowed.is_some() => Type::Union(union.widen()),
            other => other.clone(),
        }
    }

    pub fn mentions_any(&self, variables: &[TypeVariable]) -> bool {
        match self {
            Type::Variable(v) => variables.contains(v),
            Type::List(e) | Type::Sequence(e) | Type::Nullable(e) | Type::Tagged(e, _) => {
                e.mentions_any(variables)
            }
            Type::Object(fields) => fields.values().any(|t| t.mentions_any(variables)),
            Type::Union(union) => union.alternatives.values().any(|t| t.mentions_any(variables)),
            Type::Function(f) => {
                f.arguments.types().any(|t| t.mentions_any(variables))
                    || f.return_type.mentions_any(variables)
            }
            Type::Number | Type::Boolean | Type::BigInteger | Type::Singleton => false,
        }
    }

    // ── Assignability ────────────────────────────────────────────

    /// Whether a value of `self` may be used where `target` is required.
    ///
    /// Structural equality unless a variant says otherwise. Assigning a tagged type to a
    /// union that has no alternative for its tag is an error, not merely `false`.
    pub fn is_assignable_to(&self, target: &Type) -> Result<bool, TypeRelationError> {
        if self == target {
            return Ok(true);
        }
        match (self, target) {
            (Type::Function(own), Type::Function(required)) => own.is_assignable_to(required),
            (Type::Tagged(payload, tag), Type::Union(union)) => {
                let Some(alternative) = union.alternatives.get(tag) else {
                    return Err(TypeRelationError::InvalidTag {
                        tag: tag.clone(),
                        target: target.clone(),
                    });
                };
                if union.narrowed.as_ref().is_some_and(|pinned| pinned != tag) {
                    return Ok(false);
                }
                payload.is_assignable_to(alternative)
            }
            (Type::Union(own), Type::Union(required)) => Ok(own.narrowed.is_some()
                && required.narrowed.is_none()
                && own.alternatives == required.alternatives),
            (Type::Singleton, Type::Nullable(_)) => Ok(true),
            (Type::Nullable(own), Type::Nullable(required)) => own.is_assignable_to(required),
            (_, Type::Nullable(required)) => self.is_assignable_to(required),
            _ => Ok(false),
        }
    }
}

impl FunctionType {
    /// Parameters are compared by position and contravariantly; the return type must match
    /// exactly. Generic function types must bind the same number of type variables, which
    /// are matched up by position.
    pub fn is_assignable_to(&self, required: &FunctionType) -> Result<bool, TypeRelationError> {
        if self.type_variables.len() != required.type_variables.len() {
            return Ok(false);
        }
        if !self.type_variables.is_empty() {
            let renaming = Substitution::from_pairs(
                required
                    .type_variables
                    .iter()
                    .cloned()
                    .zip(self.type_variables.iter().cloned().map(Type::Variable)),
            );
            let renamed = FunctionType {
                type_variables: Vec::new(),
                arguments: renaming.apply_arguments(&required.arguments),
                return_type: renaming.apply(&required.return_type),
            };
            let own = FunctionType {
                type_variables: Vec::new(),
                arguments: self.arguments.clone(),
                return_type: self.return_type.clone(),
            };
            return own.is_assignable_to(&renamed);
        }
        if self.return_type != required.return_type {
            return Ok(false);
        }
        self.arguments.is_assignable_to(&required.arguments)
    }
}

impl ArgumentList {
    pub fn types(&self) -> impl Iterator<Item = &Type> {
        let slice = match self {
            ArgumentList::Basic(arguments) => arguments.as_slice(),
            ArgumentList::Vararg(argument) => std::slice::from_ref(argument),
        };
        slice.iter().map(|a| &a.ty)
    }

    /// Type expected for the argument at `index`.
    pub fn parameter_type(&self, index: usize) -> Option<&Type> {
        match self {
            ArgumentList::Basic(arguments) => arguments.get(index).map(|a| &a.ty),
            ArgumentList::Vararg(argument) => Some(&argument.ty),
        }
    }

    /// Whether a function taking `self` can stand in for one taking `required`:
    /// `self` is no longer, and every argument `required` accepts is accepted by `self`.
    pub fn is_assignable_to(&self, required: &ArgumentList) -> Result<bool, TypeRelationError> {
        match (self, required) {
            (ArgumentList::Basic(own), ArgumentList::Basic(required)) => {
                if own.len() > required.len() {
                    return Ok(false);
                }
                for (own, required) in own.iter().zip(required) {
                    if !required.ty.is_assignable_to(&own.ty)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            (ArgumentList::Vararg(own), ArgumentList::Basic(required)) => {
                for required in required {
                    if !required.ty.is_assignable_to(&own.ty)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            (ArgumentList::Vararg(own), ArgumentList::Vararg(required)) => {
                required.ty.is_assignable_to(&own.ty)
            }
            (ArgumentList::Basic(_), ArgumentList::Vararg(_)) => Ok(false),
        }
    }
}

// ── Pretty printing ──────────────────────────────────────────────

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Number => write!(f, "Number"),
            Type::Boolean => write!(f, "Boolean"),
            Type::BigInteger => write!(f, "BigInteger"),
            Type::Singleton => write!(f, "Null"),
            Type::List(elem) => write!(f, "List[{}]", elem),
            Type::Sequence(elem) => write!(f, "Sequence[{}]", elem),
            Type::Object(fields) => {
                write!(f, "{{")?;
                for (i, (name, ty)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, ty)?;
                }
                write!(f, "}}")
            }
            Type::Function(function) => write!(f, "{}", function),
            Type::Union(union) => {
                write!(f, "(")?;
                for (i, (tag, ty)) in union.alternatives.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{}: {}", tag, ty)?;
                }
                write!(f, ")")?;
                if let Some(tag) = &union.narrowed {
                    write!(f, " @{}", tag)?;
                }
                Ok(())
            }
            Type::Tagged(payload, tag) => write!(f, "{} # {}", payload, tag),
            Type::Nullable(inner) => match **inner {
                Type::Function(_) | Type::Tagged(..) => write!(f, "({})?", inner),
                _ => write!(f, "{}?", inner),
            },
            Type::Variable(v) => write!(f, "{}", v.name),
        }
    }
}

impl fmt::Display for FunctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.type_variables.is_empty() {
            write!(f, "[")?;
            for (i, v) in self.type_variables.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", v.name)?;
            }
            write!(f, "]")?;
        }
        write!(f, "{} -> {}", self.arguments, self.return_type)
    }
}

impl fmt::Display for ArgumentList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgumentList::Basic(arguments) => {
                write!(f, "(")?;
                for (i, a) in arguments.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", a.name, a.ty)?;
                }
                write!(f, ")")
            }
            ArgumentList::Vararg(a) => write!(f, "(...{}: {})", a.name, a.ty),
        }
    }
}
