//! Type determination: the type of every expression and declaration, computed on demand
//! and memoized per expression.

use crate::error::TypeCheckError;
use crate::infer::{self, Substitution};
use crate::model::*;
use crate::scope::ScopedDeclaration;
use crate::types::{ArgumentList, Type, TagView};
use sable_syntax::Span;
use smol_str::SmolStr;
use std::collections::{BTreeMap, BTreeSet};

type Result<T> = std::result::Result<T, TypeCheckError>;

impl Program {
    /// Type of the program's `return` expression.
    pub fn result_type(&self) -> Result<Type> {
        self.type_of(self.body.result)
    }

    pub fn type_of(&self, id: ExprId) -> Result<Type> {
        if let Some(ty) = self.types.borrow().get(id) {
            return Ok(ty.clone());
        }
        // Self-reference through a function is reported by `reference_type` first; this
        // catches any cycle that reaches an expression without passing an open reference.
        if !self.visiting.borrow_mut().insert(id) {
            return Err(TypeCheckError::new(
                "type determination entered a loop",
                self.exprs[id].span,
            ));
        }
        let result = self.compute_type(id);
        self.visiting.borrow_mut().remove(&id);
        let ty = result?;
        self.types.borrow_mut().insert(id, ty.clone());
        Ok(ty)
    }

    pub fn declaration_type(&self, id: DeclId) -> Result<Type> {
        match &self.decls[id] {
            Declaration::Value(v) => match &v.declared_type {
                Some(ty) => Ok(ty.clone()),
                None => self.type_of(v.value),
            },
            Declaration::Function(f) => self.signature_type(&f.signature, f.body.as_ref()),
            Declaration::Parameter(p) => Ok(p.ty.clone()),
            Declaration::Payload(p) => {
                let ty = self.type_of(p.scrutinee)?;
                ty.tag_view()
                    .and_then(|view| view.payload(&p.tag))
                    .cloned()
                    .ok_or_else(|| {
                        TypeCheckError::new(
                            format!("invalid tag '{}' for type {}", p.tag, ty),
                            p.span,
                        )
                    })
            }
        }
    }

    /// Without an explicit return type, the body decides.
    fn signature_type(&self, signature: &Signature, body: Option<&FunctionBody>) -> Result<Type> {
        let return_type = match (&signature.return_type, body) {
            (Some(ty), _) => ty.clone(),
            (None, Some(body)) => self.type_of(body.result)?,
            (None, None) => {
                return Err(TypeCheckError::new(
                    "function without a body needs an explicit return type",
                    Span::default(),
                ))
            }
        };
        Ok(Type::function(
            signature.type_variables.clone(),
            signature.arguments.clone(),
            return_type,
        ))
    }

    fn reference_type(
        &self,
        name: &SmolStr,
        target: Option<&ScopedDeclaration>,
        span: Span,
    ) -> Result<Type> {
        match target {
            None => Err(TypeCheckError::new(
                format!("undefined variable '{}'", name),
                span,
            )),
            Some(ScopedDeclaration::Closed(id)) => self.declaration_type(*id),
            Some(ScopedDeclaration::Open(id)) => match &self.decls[*id] {
                Declaration::Function(f) if f.signature.return_type.is_some() => {
                    self.signature_type(&f.signature, None)
                }
                Declaration::Function(_) => Err(TypeCheckError::new(
                    format!(
                        "type determination entered a loop: recursive function '{}' needs an explicit return type",
                        name
                    ),
                    span,
                )),
                _ => self.declaration_type(*id),
            },
            Some(ScopedDeclaration::Narrowed { declaration, tag }) => {
                match self.declaration_type(*declaration)? {
                    Type::Union(union) => Ok(match union.narrow(tag) {
                        Some(narrow) => Type::Union(narrow),
                        None => Type::Union(union),
                    }),
                    other => Ok(other),
                }
            }
            Some(ScopedDeclaration::NonNull(id)) => match self.declaration_type(*id)? {
                Type::Nullable(inner) => Ok(*inner),
                other => Ok(other),
            },
        }
    }

    fn compute_type(&self, id: ExprId) -> Result<Type> {
        let expr = &self.exprs[id];
        let span = expr.span;
        match &expr.kind {
            ExpressionKind::Number(_) => Ok(Type::Number),
            ExpressionKind::BigInteger(_) => Ok(Type::BigInteger),
            ExpressionKind::Boolean(_) => Ok(Type::Boolean),
            ExpressionKind::Null => Ok(Type::Singleton),
            ExpressionKind::Object(fields) => {
                let mut types = BTreeMap::new();
                for (name, value) in fields {
                    let ty = self.type_of(*value)?;
                    if types.insert(name.clone(), ty).is_some() {
                        return Err(TypeCheckError::new(
                            format!("duplicate field '{}' in object literal", name),
                            span,
                        ));
                    }
                }
                Ok(Type::Object(types))
            }
            ExpressionKind::Arithmetic { op, lhs, rhs } => {
                let lhs = self.type_of(*lhs)?;
                let rhs = self.type_of(*rhs)?;
                match (&lhs, &rhs) {
                    (Type::Number, Type::Number) => Ok(Type::Number),
                    (Type::BigInteger, Type::BigInteger) if op.supports_big_integers() => {
                        Ok(Type::BigInteger)
                    }
                    _ => Err(operator_error(op.symbol(), &lhs, &rhs, span)),
                }
            }
            ExpressionKind::Negate(operand) => match self.type_of(*operand)? {
                ty @ (Type::Number | Type::BigInteger) => Ok(ty),
                other => Err(TypeCheckError::new(
                    format!("operator '-' cannot be applied to {}", other),
                    span,
                )),
            },
            ExpressionKind::Comparison { op, lhs, rhs } => {
                let lhs = self.type_of(*lhs)?;
                let rhs = self.type_of(*rhs)?;
                let comparable = match op {
                    ComparisonOp::Eq => {
                        let (l, r) = (lhs.widened(), rhs.widened());
                        assignable(&l, &r) || assignable(&r, &l)
                    }
                    ComparisonOp::Lt | ComparisonOp::Gt => matches!(
                        (&lhs, &rhs),
                        (Type::Number, Type::Number) | (Type::BigInteger, Type::BigInteger)
                    ),
                };
                if comparable {
                    Ok(Type::Boolean)
                } else {
                    Err(operator_error(op.symbol(), &lhs, &rhs, span))
                }
            }
            ExpressionKind::Logical { op, lhs, rhs } => {
                let lhs = self.type_of(*lhs)?;
                let rhs = self.type_of(*rhs)?;
                if lhs == Type::Boolean && rhs == Type::Boolean {
                    Ok(Type::Boolean)
                } else {
                    let symbol = match op {
                        LogicalOp::And => "and",
                        LogicalOp::Or => "or",
                    };
                    Err(operator_error(symbol, &lhs, &rhs, span))
                }
            }
            ExpressionKind::Not(operand) => match self.type_of(*operand)? {
                Type::Boolean => Ok(Type::Boolean),
                other => Err(TypeCheckError::new(
                    format!("operator 'not' cannot be applied to {}", other),
                    span,
                )),
            },
            ExpressionKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let condition_type = self.type_of(*condition)?;
                if condition_type != Type::Boolean {
                    return Err(TypeCheckError::new(
                        format!("if condition must be Boolean, got {}", condition_type),
                        self.exprs[*condition].span,
                    ));
                }
                let then_type = self.type_of(*then_branch)?;
                let else_type = self.type_of(*else_branch)?;
                agreeing(&then_type, &else_type).ok_or_else(|| {
                    TypeCheckError::new(
                        format!(
                            "if branches have different types: {} and {}",
                            then_type, else_type
                        ),
                        span,
                    )
                })
            }
            ExpressionKind::Reference { name, target } => {
                self.reference_type(name, target.as_ref(), span)
            }
            ExpressionKind::Call {
                callee,
                type_arguments,
                arguments,
            } => self.call_type(*callee, type_arguments, arguments, span),
            ExpressionKind::Lambda(lambda) => {
                self.signature_type(&lambda.signature, Some(&lambda.body))
            }
            ExpressionKind::Field { object, field } => {
                let object_type = self.type_of(*object)?;
                let field_type = match &object_type {
                    Type::Object(fields) => fields.get(field).cloned(),
                    _ => None,
                };
                field_type.ok_or_else(|| {
                    TypeCheckError::new(
                        format!("type {} has no field '{}'", object_type, field),
                        span,
                    )
                })
            }
            ExpressionKind::Tag { value, tag } => {
                Ok(Type::Tagged(Box::new(self.type_of(*value)?), tag.clone()))
            }
            ExpressionKind::Is { value, tag } => {
                let ty = self.type_of(*value)?;
                let view = tag_view(&ty, "is", span)?;
                if !view.has_tag(tag) {
                    return Err(invalid_tag(tag, &ty, span));
                }
                Ok(Type::Boolean)
            }
            ExpressionKind::Untag(value) => {
                let ty = self.type_of(*value)?;
                let view = tag_view(&ty, "untag", span)?;
                match view.pinned() {
                    Some((_, payload)) => Ok(payload.clone()),
                    None => Err(TypeCheckError::new(
                        format!(
                            "cannot untag a value of type {} that is not narrowed to one alternative",
                            ty
                        ),
                        span,
                    )),
                }
            }
            ExpressionKind::Match { scrutinee, arms } => self.match_type(*scrutinee, arms, span),
        }
    }

    fn call_type(
        &self,
        callee: ExprId,
        type_arguments: &[Type],
        arguments: &[ExprId],
        span: Span,
    ) -> Result<Type> {
        let callee_type = self.type_of(callee)?;
        let Type::Function(function) = &callee_type else {
            return Err(TypeCheckError::new(
                format!("cannot call a value of type {}", callee_type),
                span,
            ));
        };
        let described = self.describe_callee(callee);
        let argument_types = arguments
            .iter()
            .map(|&a| self.type_of(a))
            .collect::<Result<Vec<_>>>()?;

        if let ArgumentList::Basic(parameters) = &function.arguments {
            if parameters.len() != arguments.len() {
                return Err(TypeCheckError::new(
                    format!(
                        "{} expects {} arguments, got {}",
                        described,
                        parameters.len(),
                        arguments.len()
                    ),
                    span,
                ));
            }
        }

        let substitution = if !type_arguments.is_empty() {
            if type_arguments.len() != function.type_variables.len() {
                return Err(TypeCheckError::new(
                    format!(
                        "{} expects {} type arguments, got {}",
                        described,
                        function.type_variables.len(),
                        type_arguments.len()
                    ),
                    span,
                ));
            }
            Substitution::from_pairs(
                function
                    .type_variables
                    .iter()
                    .cloned()
                    .zip(type_arguments.iter().cloned()),
            )
        } else if function.type_variables.is_empty() {
            Substitution::default()
        } else {
            infer::infer_call(
                &function.type_variables,
                &function.arguments,
                &argument_types,
            )
            .map_err(|e| TypeCheckError::new(e.to_string(), span))?
        };

        let expected_arguments = substitution.apply_arguments(&function.arguments);
        for (index, actual) in argument_types.iter().enumerate() {
            let Some(expected) = expected_arguments.parameter_type(index) else {
                continue;
            };
            let argument_span = self.exprs[arguments[index]].span;
            self.check_assignable(actual, expected, argument_span)?;
        }
        Ok(substitution.apply(&function.return_type))
    }

    fn describe_callee(&self, callee: ExprId) -> String {
        match &self.exprs[callee].kind {
            ExpressionKind::Reference { name, .. } => format!("function '{}'", name),
            _ => "function".to_string(),
        }
    }

    fn match_type(&self, scrutinee: ExprId, arms: &[MatchArm], span: Span) -> Result<Type> {
        let ty = self.type_of(scrutinee)?;
        let view = tag_view(&ty, "match", span)?;
        let mut seen = BTreeSet::new();
        let mut result: Option<Type> = None;
        for arm in arms {
            if !view.has_tag(&arm.tag) {
                return Err(invalid_tag(&arm.tag, &ty, arm.span));
            }
            if !seen.insert(arm.tag.clone()) {
                return Err(TypeCheckError::new(
                    format!("duplicate match arm for tag '{}'", arm.tag),
                    arm.span,
                ));
            }
            let arm_type = self.type_of(arm.body)?;
            result = match result {
                None => Some(arm_type),
                Some(first) => match agreeing(&first, &arm_type) {
                    Some(agreed) => Some(agreed),
                    None => {
                        return Err(TypeCheckError::new(
                            format!("match arms have different types: {} and {}", first, arm_type),
                            arm.span,
                        ))
                    }
                },
            };
        }
        let missing: Vec<&str> = view
            .required_tags()
            .into_iter()
            .filter(|tag| !seen.contains(*tag))
            .map(SmolStr::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(TypeCheckError::new(
                format!("non-exhaustive match: missing tags: {}", missing.join(", ")),
                span,
            ));
        }
        result.ok_or_else(|| TypeCheckError::new("match needs at least one arm", span))
    }

    pub(crate) fn check_assignable(&self, actual: &Type, expected: &Type, span: Span) -> Result<()> {
        let assignable = actual
            .is_assignable_to(expected)
            .map_err(|e| TypeCheckError::new(e.to_string(), span))?;
        if assignable {
            Ok(())
        } else {
            Err(TypeCheckError::new(
                format!("type mismatch: expected {}, got {}", expected, actual),
                span,
            ))
        }
    }
}

fn tag_view<'a>(ty: &'a Type, construct: &str, span: Span) -> Result<TagView<'a>> {
    ty.tag_view().ok_or_else(|| {
        TypeCheckError::new(
            format!("'{}' requires a union or tagged value, got {}", construct, ty),
            span,
        )
    })
}

fn invalid_tag(tag: &str, ty: &Type, span: Span) -> TypeCheckError {
    TypeCheckError::new(format!("invalid tag '{}' for type {}", tag, ty), span)
}

fn operator_error(symbol: &str, lhs: &Type, rhs: &Type, span: Span) -> TypeCheckError {
    TypeCheckError::new(
        format!("operator '{}' cannot be applied to {} and {}", symbol, lhs, rhs),
        span,
    )
}

fn assignable(actual: &Type, expected: &Type) -> bool {
    matches!(actual.is_assignable_to(expected), Ok(true))
}

/// Branch types agree when equal, or when they are narrowings of the same union; the
/// result is then the wide union.
fn agreeing(a: &Type, b: &Type) -> Option<Type> {
    if a == b {
        return Some(a.clone());
    }
    let wide = a.widened();
    (wide == b.widened()).then_some(wide)
}
