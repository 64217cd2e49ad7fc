//! Type-argument inference for calls to generic functions.
//!
//! The declared parameter types (the *matchee*) are unified structurally against the
//! argument types at the call site (the *matcher*). Every variable occurrence yields a
//! mapping, and mappings from different positions must agree.

use crate::types::{Argument, ArgumentList, FunctionType, Type, TypeVariable, UnionType};
use smol_str::SmolStr;
use std::collections::HashMap;
use tracing::debug;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Substitution(HashMap<TypeVariable, Type>);

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InferenceError {
    #[error("ambiguous type for type argument {variable}: both {first} and {second}")]
    Ambiguous {
        variable: SmolStr,
        first: Type,
        second: Type,
    },
    #[error("could not infer type for type argument {0}")]
    Unmapped(SmolStr),
    #[error("type mismatch: expected {expected}, got {actual}")]
    Mismatch { expected: Type, actual: Type },
}

impl Substitution {
    pub fn single(variable: TypeVariable, ty: Type) -> Self {
        Self(HashMap::from([(variable, ty)]))
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (TypeVariable, Type)>) -> Self {
        Self(pairs.into_iter().collect())
    }

    pub fn get(&self, variable: &TypeVariable) -> Option<&Type> {
        self.0.get(variable)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Union of two mappings. A variable mapped to two different types is ambiguous.
    pub fn merge(mut self, other: Substitution) -> Result<Substitution, InferenceError> {
        for (variable, ty) in other.0 {
            match self.0.get(&variable) {
                Some(existing) if *existing != ty => {
                    return Err(InferenceError::Ambiguous {
                        variable: variable.name,
                        first: existing.clone(),
                        second: ty,
                    });
                }
                Some(_) => {}
                None => {
                    self.0.insert(variable, ty);
                }
            }
        }
        Ok(self)
    }

    pub fn apply(&self, ty: &Type) -> Type {
        if self.is_empty() {
            return ty.clone();
        }
        match ty {
            Type::Variable(v) => self.0.get(v).cloned().unwrap_or_else(|| ty.clone()),
            Type::List(e) => Type::List(Box::new(self.apply(e))),
            Type::Sequence(e) => Type::Sequence(Box::new(self.apply(e))),
            Type::Nullable(e) => Type::nullable(self.apply(e)),
            Type::Tagged(e, tag) => Type::Tagged(Box::new(self.apply(e)), tag.clone()),
            Type::Object(fields) => Type::Object(
                fields
                    .iter()
                    .map(|(name, t)| (name.clone(), self.apply(t)))
                    .collect(),
            ),
            Type::Union(union) => Type::Union(UnionType {
                alternatives: union
                    .alternatives
                    .iter()
                    .map(|(tag, t)| (tag.clone(), self.apply(t)))
                    .collect(),
                narrowed: union.narrowed.clone(),
            }),
            Type::Function(f) => Type::Function(Box::new(FunctionType {
                type_variables: f.type_variables.clone(),
                arguments: self.apply_arguments(&f.arguments),
                return_type: self.apply(&f.return_type),
            })),
            Type::Number | Type::Boolean | Type::BigInteger | Type::Singleton => ty.clone(),
        }
    }

    pub fn apply_arguments(&self, arguments: &ArgumentList) -> ArgumentList {
        let apply = |a: &Argument| Argument {
            name: a.name.clone(),
            ty: self.apply(&a.ty),
        };
        match arguments {
            ArgumentList::Basic(args) => ArgumentList::Basic(args.iter().map(apply).collect()),
            ArgumentList::Vararg(arg) => ArgumentList::Vararg(apply(arg)),
        }
    }
}

/// Unify a declared type against an actual one.
///
/// A matchee that mentions none of `variables` yields an empty mapping without looking at
/// the matcher; whether the two fit is left to the assignability check that follows.
pub fn unify(
    variables: &[TypeVariable],
    matchee: &Type,
    matcher: &Type,
) -> Result<Substitution, InferenceError> {
    if !matchee.mentions_any(variables) {
        return Ok(Substitution::default());
    }
    let mismatch = || InferenceError::Mismatch {
        expected: matchee.clone(),
        actual: matcher.clone(),
    };
    match (matchee, matcher) {
        (Type::Variable(v), _) => Ok(Substitution::single(v.clone(), matcher.widened())),
        (Type::List(a), Type::List(b)) | (Type::Sequence(a), Type::Sequence(b)) => {
            unify(variables, a, b)
        }
        (Type::Nullable(_), Type::Singleton) => Ok(Substitution::default()),
        (Type::Nullable(a), Type::Nullable(b)) => unify(variables, a, b),
        (Type::Nullable(a), _) => unify(variables, a, matcher),
        (Type::Tagged(a, own), Type::Tagged(b, tag)) if own == tag => unify(variables, a, b),
        (Type::Object(own), Type::Object(actual)) => {
            let mut result = Substitution::default();
            for (name, ty) in own {
                let actual = actual.get(name).ok_or_else(mismatch)?;
                result = result.merge(unify(variables, ty, actual)?)?;
            }
            Ok(result)
        }
        (Type::Union(own), Type::Union(actual)) => {
            let mut result = Substitution::default();
            for (tag, ty) in &own.alternatives {
                let actual = actual.alternatives.get(tag).ok_or_else(mismatch)?;
                result = result.merge(unify(variables, ty, actual)?)?;
            }
            Ok(result)
        }
        (Type::Union(own), Type::Tagged(payload, tag)) => {
            let alternative = own.alternatives.get(tag).ok_or_else(mismatch)?;
            unify(variables, alternative, payload)
        }
        (Type::Function(own), Type::Function(actual)) => {
            let arguments = unify_arguments(variables, &own.arguments, &actual.arguments)?;
            arguments.merge(unify(variables, &own.return_type, &actual.return_type)?)
        }
        _ => Err(mismatch()),
    }
}

fn unify_arguments(
    variables: &[TypeVariable],
    own: &ArgumentList,
    actual: &ArgumentList,
) -> Result<Substitution, InferenceError> {
    let pairs: Vec<(&Type, &Type)> = match (own, actual) {
        (ArgumentList::Basic(own), ArgumentList::Basic(actual)) => own
            .iter()
            .zip(actual)
            .map(|(o, a)| (&o.ty, &a.ty))
            .collect(),
        (ArgumentList::Vararg(own), ArgumentList::Vararg(actual)) => vec![(&own.ty, &actual.ty)],
        (ArgumentList::Vararg(own), ArgumentList::Basic(actual)) => {
            actual.iter().map(|a| (&own.ty, &a.ty)).collect()
        }
        (ArgumentList::Basic(own), ArgumentList::Vararg(actual)) => {
            own.iter().map(|o| (&o.ty, &actual.ty)).collect()
        }
    };
    let mut result = Substitution::default();
    for (own, actual) in pairs {
        result = result.merge(unify(variables, own, actual)?)?;
    }
    Ok(result)
}

/// Infer every type variable of a generic callee from the argument types of one call.
pub fn infer_call(
    variables: &[TypeVariable],
    declared: &ArgumentList,
    actual: &[Type],
) -> Result<Substitution, InferenceError> {
    let mut result = Substitution::default();
    for (index, ty) in actual.iter().enumerate() {
        let Some(expected) = declared.parameter_type(index) else {
            break;
        };
        result = result.merge(unify(variables, expected, ty)?)?;
    }
    if let Some(unmapped) = variables.iter().find(|v| result.get(v).is_none()) {
        return Err(InferenceError::Unmapped(unmapped.name.clone()));
    }
    debug!(
        mappings = result.len(),
        variables = ?variables.iter().map(|v| v.name.as_str()).collect::<Vec<_>>(),
        "inferred type arguments"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn var(name: &str, id: u32) -> TypeVariable {
        TypeVariable {
            name: name.into(),
            id,
        }
    }

    fn list(t: Type) -> Type {
        Type::List(Box::new(t))
    }

    fn basic(types: Vec<Type>) -> ArgumentList {
        ArgumentList::Basic(
            types
                .into_iter()
                .enumerate()
                .map(|(i, ty)| Argument {
                    name: format!("p{}", i).into(),
                    ty,
                })
                .collect(),
        )
    }

    #[test]
    fn infers_list_element() {
        let a = var("A", 0);
        let declared = basic(vec![list(Type::Variable(a.clone()))]);
        let subst = infer_call(
            std::slice::from_ref(&a),
            &declared,
            &[list(Type::Boolean)],
        )
        .expect("should infer");
        assert_eq!(subst.get(&a), Some(&Type::Boolean));
    }

    #[test]
    fn conflicting_positions_are_ambiguous() {
        let a = var("A", 0);
        let declared = basic(vec![Type::Variable(a.clone()), Type::Variable(a.clone())]);
        let err = infer_call(&[a], &declared, &[Type::Number, Type::Boolean]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "ambiguous type for type argument A: both Number and Boolean"
        );
    }

    #[test]
    fn agreeing_positions_merge() {
        let a = var("A", 0);
        let declared = basic(vec![Type::Variable(a.clone()), list(Type::Variable(a.clone()))]);
        let subst = infer_call(
            std::slice::from_ref(&a),
            &declared,
            &[Type::Number, list(Type::Number)],
        )
        .expect("should infer");
        assert_eq!(subst.get(&a), Some(&Type::Number));
    }

    #[test]
    fn unused_variable_is_unmapped() {
        let a = var("A", 0);
        let b = var("B", 1);
        let declared = basic(vec![Type::Variable(a.clone())]);
        let err = infer_call(&[a, b], &declared, &[Type::Number]).unwrap_err();
        assert_eq!(err.to_string(), "could not infer type for type argument B");
    }

    #[test]
    fn matchee_without_variables_maps_nothing() {
        let a = var("A", 0);
        let subst = unify(&[a], &Type::Number, &Type::Boolean).expect("no variables involved");
        assert!(subst.is_empty());
    }

    #[test]
    fn structural_mismatch_is_reported() {
        let a = var("A", 0);
        let err = unify(&[a.clone()], &list(Type::Variable(a)), &Type::Number).unwrap_err();
        assert_eq!(err.to_string(), "type mismatch: expected List[A], got Number");
    }

    #[test]
    fn vararg_unifies_every_argument_with_the_element() {
        let a = var("A", 0);
        let declared = ArgumentList::Vararg(Argument {
            name: "xs".into(),
            ty: Type::Variable(a.clone()),
        });
        let subst = infer_call(
            std::slice::from_ref(&a),
            &declared,
            &[Type::Number, Type::Number, Type::Number],
        )
        .expect("should infer");
        assert_eq!(subst.get(&a), Some(&Type::Number));
        assert!(infer_call(
            std::slice::from_ref(&a),
            &declared,
            &[Type::Number, Type::Boolean]
        )
        .is_err());
    }

    #[test]
    fn union_matchee_against_tagged_uses_one_alternative() {
        let a = var("A", 0);
        let b = var("B", 1);
        let option = Type::Union(UnionType::new(BTreeMap::from([
            ("Some".into(), Type::Variable(a.clone())),
            ("Other".into(), Type::Variable(b.clone())),
        ])));
        let tagged = Type::Tagged(Box::new(Type::Number), "Some".into());
        let subst = unify(&[a.clone(), b.clone()], &option, &tagged).expect("should unify");
        assert_eq!(subst.get(&a), Some(&Type::Number));
        assert_eq!(subst.get(&b), None);
    }

    #[test]
    fn function_arguments_and_return_are_unified() {
        let a = var("A", 0);
        let b = var("B", 1);
        let mapper = Type::function(
            vec![],
            basic(vec![Type::Variable(a.clone())]),
            Type::Variable(b.clone()),
        );
        let actual = Type::function(vec![], basic(vec![Type::Number]), Type::Boolean);
        let subst = unify(&[a.clone(), b.clone()], &mapper, &actual).expect("should unify");
        assert_eq!(subst.get(&a), Some(&Type::Number));
        assert_eq!(subst.get(&b), Some(&Type::Boolean));
        assert_eq!(
            subst.apply(&mapper).to_string(),
            "(p0: Number) -> Boolean"
        );
    }
}
