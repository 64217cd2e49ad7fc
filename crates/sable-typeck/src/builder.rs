//! Lowers a parsed [`SourceFile`] into a [`Program`]: resolves names against a
//! [`StaticScope`], turns type expressions into [`Type`]s and records smart-cast narrowing.

use crate::error::TypeCheckError;
use crate::infer::Substitution;
use crate::model::*;
use crate::scope::{ScopedDeclaration, StaticScope, TypeAlike};
use crate::types::{Argument, ArgumentList, Type, TypeVariable, UnionType};
use la_arena::Arena;
use num_bigint::BigInt;
use sable_syntax as syntax;
use sable_syntax::{BinaryOp, ExprKind, Generic, Params, SourceFile, Span, TypeExprKind, UnaryOp};
use smol_str::SmolStr;
use std::collections::BTreeMap;
use tracing::debug;

type Result<T> = std::result::Result<T, TypeCheckError>;

pub fn build(source_name: &str, file: &SourceFile) -> Result<Program> {
    let mut builder = Builder {
        file,
        exprs: Arena::new(),
        decls: Arena::new(),
        next_type_variable: 0,
    };
    let (body, _) = builder.build_body(&StaticScope::root(), &file.body)?;
    Ok(Program::new(
        source_name.into(),
        builder.exprs,
        builder.decls,
        body,
    ))
}

struct Builder<'a> {
    file: &'a SourceFile,
    exprs: Arena<Expression>,
    decls: Arena<Declaration>,
    next_type_variable: u32,
}

impl<'a> Builder<'a> {
    // ── Bodies & declarations ────────────────────────────────────

    fn build_body(
        &mut self,
        scope: &StaticScope,
        body: &syntax::Body,
    ) -> Result<(FunctionBody, StaticScope)> {
        let mut scope = scope.clone();
        let mut declarations = Vec::new();
        for decl in &body.declarations {
            let (built, extended) = self.build_declaration(&scope, decl)?;
            declarations.extend(built);
            scope = extended;
        }
        let result = self.build_expr(&scope, body.result)?;
        Ok((
            FunctionBody {
                declarations,
                result,
            },
            scope,
        ))
    }

    /// Type aliases and unions only extend the scope; they produce no declaration.
    fn build_declaration(
        &mut self,
        scope: &StaticScope,
        decl: &syntax::Declaration,
    ) -> Result<(Option<DeclId>, StaticScope)> {
        match decl {
            syntax::Declaration::Value(v) => {
                let declared_type = v
                    .type_ann
                    .map(|t| self.build_type(scope, t))
                    .transpose()?;
                let value = self.build_expr(scope, v.value)?;
                let id = self.decls.alloc(Declaration::Value(ValueDeclaration {
                    name: v.name.clone(),
                    span: v.span,
                    declared_type,
                    value,
                }));
                debug!(name = %v.name, "bound value");
                Ok((
                    Some(id),
                    scope.with_declaration(v.name.clone(), ScopedDeclaration::Closed(id)),
                ))
            }
            syntax::Declaration::Function(f) => self.build_function(scope, f),
            syntax::Declaration::TypeAlias(t) => {
                let (parameters, inner) = self.build_generics(scope, &t.generics)?;
                let target = self.build_type(&inner, t.target)?;
                Ok((
                    None,
                    scope.with_type_alike(t.name.clone(), TypeAlike::Alias { parameters, target }),
                ))
            }
            syntax::Declaration::Union(u) => {
                let (parameters, inner) = self.build_generics(scope, &u.generics)?;
                let mut alternatives = BTreeMap::new();
                for alt in &u.alternatives {
                    let payload = self.build_type(&inner, alt.payload)?;
                    if alternatives.insert(alt.tag.clone(), payload).is_some() {
                        return Err(TypeCheckError::new(
                            format!("duplicate tag '{}' in union {}", alt.tag, u.name),
                            alt.span,
                        ));
                    }
                }
                let target = Type::Union(UnionType::new(alternatives));
                Ok((
                    None,
                    scope.with_type_alike(u.name.clone(), TypeAlike::Alias { parameters, target }),
                ))
            }
        }
    }

    /// The declaration is allocated before its body is built so the body can refer to it
    /// as `Open`; the surrounding scope sees it `Closed`.
    fn build_function(
        &mut self,
        scope: &StaticScope,
        f: &syntax::FunctionDecl,
    ) -> Result<(Option<DeclId>, StaticScope)> {
        let (type_variables, generic_scope) = self.build_generics(scope, &f.generics)?;
        let (arguments, parameters) = self.build_parameters(&generic_scope, &f.params)?;
        let return_type = f
            .return_type
            .map(|t| self.build_type(&generic_scope, t))
            .transpose()?;
        if f.body.is_none() && return_type.is_none() {
            return Err(TypeCheckError::new(
                format!("external function '{}' needs an explicit return type", f.name),
                f.span,
            ));
        }
        let id = self.decls.alloc(Declaration::Function(FunctionDeclaration {
            name: f.name.clone(),
            span: f.span,
            signature: Signature {
                type_variables,
                arguments,
                parameters: parameters.clone(),
                return_type,
            },
            body: None,
        }));

        if let Some(syntax_body) = &f.body {
            let recursive =
                generic_scope.with_declaration(f.name.clone(), ScopedDeclaration::Open(id));
            let body_scope = self.bind_parameters(&recursive, &parameters);
            let (body, _) = self.build_body(&body_scope, syntax_body)?;
            if let Declaration::Function(function) = &mut self.decls[id] {
                function.body = Some(body);
            }
        }
        debug!(name = %f.name, external = f.body.is_none(), "bound function");
        Ok((
            Some(id),
            scope.with_declaration(f.name.clone(), ScopedDeclaration::Closed(id)),
        ))
    }

    fn build_generics(
        &mut self,
        scope: &StaticScope,
        generics: &[Generic],
    ) -> Result<(Vec<TypeVariable>, StaticScope)> {
        let mut scope = scope.clone();
        let mut variables: Vec<TypeVariable> = Vec::with_capacity(generics.len());
        for generic in generics {
            if variables.iter().any(|v| v.name == generic.name) {
                return Err(TypeCheckError::new(
                    format!("duplicate type parameter '{}'", generic.name),
                    generic.span,
                ));
            }
            let variable = TypeVariable {
                name: generic.name.clone(),
                id: self.next_type_variable,
            };
            self.next_type_variable += 1;
            scope = scope.with_type_alike(generic.name.clone(), TypeAlike::Variable(variable.clone()));
            variables.push(variable);
        }
        Ok((variables, scope))
    }

    fn build_argument_list(&mut self, scope: &StaticScope, params: &Params) -> Result<ArgumentList> {
        Ok(match params {
            Params::Basic(params) => ArgumentList::Basic(
                params
                    .iter()
                    .map(|p| {
                        Ok(Argument {
                            name: p.name.clone(),
                            ty: self.build_type(scope, p.type_ann)?,
                        })
                    })
                    .collect::<Result<_>>()?,
            ),
            Params::Vararg(p) => ArgumentList::Vararg(Argument {
                name: p.name.clone(),
                ty: self.build_type(scope, p.type_ann)?,
            }),
        })
    }

    /// The argument list plus one `Parameter` declaration per argument.
    fn build_parameters(
        &mut self,
        scope: &StaticScope,
        params: &Params,
    ) -> Result<(ArgumentList, Vec<DeclId>)> {
        let arguments = self.build_argument_list(scope, params)?;
        let spans: Vec<Span> = match params {
            Params::Basic(params) => params.iter().map(|p| p.span).collect(),
            Params::Vararg(p) => vec![p.span],
        };
        let parameters = match &arguments {
            ArgumentList::Basic(args) => args
                .iter()
                .zip(&spans)
                .map(|(a, &span)| {
                    self.decls.alloc(Declaration::Parameter(Parameter {
                        name: a.name.clone(),
                        span,
                        ty: a.ty.clone(),
                    }))
                })
                .collect(),
            ArgumentList::Vararg(a) => vec![self.decls.alloc(Declaration::Parameter(Parameter {
                name: a.name.clone(),
                span: spans[0],
                ty: Type::List(Box::new(a.ty.clone())),
            }))],
        };
        Ok((arguments, parameters))
    }

    fn bind_parameters(&self, scope: &StaticScope, parameters: &[DeclId]) -> StaticScope {
        parameters.iter().fold(scope.clone(), |scope, &id| {
            scope.with_declaration(self.decls[id].name().clone(), ScopedDeclaration::Closed(id))
        })
    }

    // ── Types ────────────────────────────────────────────────────

    fn build_type(&mut self, scope: &StaticScope, id: syntax::TypeExprId) -> Result<Type> {
        let file = self.file;
        let type_expr = &file.type_exprs[id];
        let span = type_expr.span;
        match &type_expr.kind {
            TypeExprKind::Named { name, args } => {
                let args = args
                    .iter()
                    .map(|&a| self.build_type(scope, a))
                    .collect::<Result<Vec<_>>>()?;
                match scope.type_alike(name) {
                    None => Err(TypeCheckError::new(format!("unknown type '{}'", name), span)),
                    Some(TypeAlike::Variable(variable)) => {
                        if args.is_empty() {
                            Ok(Type::Variable(variable.clone()))
                        } else {
                            Err(TypeCheckError::new(
                                format!("type variable '{}' does not take type arguments", name),
                                span,
                            ))
                        }
                    }
                    Some(TypeAlike::Constructor(constructor)) => match <[Type; 1]>::try_from(args) {
                        Ok([element]) => Ok(constructor.apply(element)),
                        Err(args) => Err(TypeCheckError::new(
                            format!(
                                "type {} expects 1 type argument, got {}",
                                constructor,
                                args.len()
                            ),
                            span,
                        )),
                    },
                    Some(TypeAlike::Alias { parameters, target }) => {
                        if parameters.len() != args.len() {
                            return Err(TypeCheckError::new(
                                format!(
                                    "type {} expects {} type arguments, got {}",
                                    name,
                                    parameters.len(),
                                    args.len()
                                ),
                                span,
                            ));
                        }
                        let substitution =
                            Substitution::from_pairs(parameters.iter().cloned().zip(args));
                        Ok(substitution.apply(target))
                    }
                }
            }
            TypeExprKind::Object(fields) => {
                let mut types = BTreeMap::new();
                for (name, field) in fields {
                    let ty = self.build_type(scope, *field)?;
                    if types.insert(name.clone(), ty).is_some() {
                        return Err(TypeCheckError::new(
                            format!("duplicate field '{}' in object type", name),
                            span,
                        ));
                    }
                }
                Ok(Type::Object(types))
            }
            TypeExprKind::Function {
                generics,
                params,
                return_type,
            } => {
                let (type_variables, inner) = self.build_generics(scope, generics)?;
                let arguments = self.build_argument_list(&inner, params)?;
                let return_type = self.build_type(&inner, *return_type)?;
                Ok(Type::function(type_variables, arguments, return_type))
            }
            TypeExprKind::Nullable(inner) => Ok(Type::nullable(self.build_type(scope, *inner)?)),
        }
    }

    // ── Expressions ──────────────────────────────────────────────

    fn build_expr(&mut self, scope: &StaticScope, id: syntax::ExprId) -> Result<ExprId> {
        let file = self.file;
        let expr = &file.exprs[id];
        let span = expr.span;
        let kind = match &expr.kind {
            ExprKind::Number(n) => ExpressionKind::Number(*n),
            ExprKind::BigInteger(digits) => {
                let value = digits.parse::<BigInt>().map_err(|_| {
                    TypeCheckError::new(format!("invalid integer literal '{}n'", digits), span)
                })?;
                ExpressionKind::BigInteger(value)
            }
            ExprKind::Bool(b) => ExpressionKind::Boolean(*b),
            ExprKind::Null => ExpressionKind::Null,
            ExprKind::Object(fields) => {
                let mut built = Vec::with_capacity(fields.len());
                for field in fields {
                    built.push((field.name.clone(), self.build_expr(scope, field.value)?));
                }
                ExpressionKind::Object(built)
            }
            ExprKind::Var(name) => ExpressionKind::Reference {
                name: name.clone(),
                target: scope.scoped_declaration(name).cloned(),
            },
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.build_expr(scope, *lhs)?;
                let rhs = self.build_expr(scope, *rhs)?;
                let arithmetic = |op| ExpressionKind::Arithmetic { op, lhs, rhs };
                let comparison = |op| ExpressionKind::Comparison { op, lhs, rhs };
                let logical = |op| ExpressionKind::Logical { op, lhs, rhs };
                match op {
                    BinaryOp::Add => arithmetic(ArithmeticOp::Add),
                    BinaryOp::Sub => arithmetic(ArithmeticOp::Sub),
                    BinaryOp::Mul => arithmetic(ArithmeticOp::Mul),
                    BinaryOp::Div => arithmetic(ArithmeticOp::Div),
                    BinaryOp::FloorDiv => arithmetic(ArithmeticOp::FloorDiv),
                    BinaryOp::Rem => arithmetic(ArithmeticOp::Rem),
                    BinaryOp::Lt => comparison(ComparisonOp::Lt),
                    BinaryOp::Gt => comparison(ComparisonOp::Gt),
                    BinaryOp::Eq => comparison(ComparisonOp::Eq),
                    BinaryOp::And => logical(LogicalOp::And),
                    BinaryOp::Or => logical(LogicalOp::Or),
                }
            }
            ExprKind::Unary { op, operand } => {
                let operand = self.build_expr(scope, *operand)?;
                match op {
                    UnaryOp::Not => ExpressionKind::Not(operand),
                    UnaryOp::Neg => ExpressionKind::Negate(operand),
                }
            }
            ExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let (then_scope, else_scope) = self.branch_scopes(scope, *condition);
                ExpressionKind::If {
                    condition: self.build_expr(scope, *condition)?,
                    then_branch: self.build_expr(&then_scope, *then_branch)?,
                    else_branch: self.build_expr(&else_scope, *else_branch)?,
                }
            }
            ExprKind::Call {
                callee,
                type_args,
                args,
            } => {
                let callee = self.build_expr(scope, *callee)?;
                let type_arguments = type_args
                    .iter()
                    .map(|&t| self.build_type(scope, t))
                    .collect::<Result<Vec<_>>>()?;
                let arguments = args
                    .iter()
                    .map(|&a| self.build_expr(scope, a))
                    .collect::<Result<Vec<_>>>()?;
                ExpressionKind::Call {
                    callee,
                    type_arguments,
                    arguments,
                }
            }
            ExprKind::Lambda {
                generics,
                params,
                return_type,
                body,
            } => {
                let (type_variables, generic_scope) = self.build_generics(scope, generics)?;
                let (arguments, parameters) = self.build_parameters(&generic_scope, params)?;
                let return_type = return_type
                    .map(|t| self.build_type(&generic_scope, t))
                    .transpose()?;
                let body_scope = self.bind_parameters(&generic_scope, &parameters);
                let result = self.build_expr(&body_scope, *body)?;
                ExpressionKind::Lambda(Box::new(Lambda {
                    signature: Signature {
                        type_variables,
                        arguments,
                        parameters,
                        return_type,
                    },
                    body: FunctionBody {
                        declarations: Vec::new(),
                        result,
                    },
                }))
            }
            ExprKind::Field { object, field } => ExpressionKind::Field {
                object: self.build_expr(scope, *object)?,
                field: field.clone(),
            },
            ExprKind::Tag { value, tag } => ExpressionKind::Tag {
                value: self.build_expr(scope, *value)?,
                tag: tag.clone(),
            },
            ExprKind::Is { value, tag } => ExpressionKind::Is {
                value: self.build_expr(scope, *value)?,
                tag: tag.clone(),
            },
            ExprKind::Untag(value) => ExpressionKind::Untag(self.build_expr(scope, *value)?),
            ExprKind::Match { scrutinee, arms } => {
                let subject = *scrutinee;
                let scrutinee = self.build_expr(scope, subject)?;
                let mut built = Vec::with_capacity(arms.len());
                for arm in arms {
                    let binding = self.decls.alloc(Declaration::Payload(PayloadBinding {
                        name: arm.binding.clone(),
                        span: arm.binding_span,
                        scrutinee,
                        tag: arm.tag.clone(),
                    }));
                    let arm_scope = self
                        .narrowed(scope, subject, &arm.tag)
                        .with_declaration(arm.binding.clone(), ScopedDeclaration::Closed(binding));
                    built.push(MatchArm {
                        tag: arm.tag.clone(),
                        binding,
                        body: self.build_expr(&arm_scope, arm.body)?,
                        span: arm.span,
                    });
                }
                ExpressionKind::Match {
                    scrutinee,
                    arms: built,
                }
            }
        };
        Ok(self.exprs.alloc(Expression { kind, span }))
    }

    /// Scopes for the two branches of an `if`. `x is T` narrows `x` in the then branch;
    /// `x == null` marks `x` non-null in the else branch.
    fn branch_scopes(
        &self,
        scope: &StaticScope,
        condition: syntax::ExprId,
    ) -> (StaticScope, StaticScope) {
        match &self.file.exprs[condition].kind {
            ExprKind::Is { value, tag } => (self.narrowed(scope, *value, tag), scope.clone()),
            ExprKind::Binary {
                op: BinaryOp::Eq,
                lhs,
                rhs,
            } => {
                let subject = match (
                    &self.file.exprs[*lhs].kind,
                    &self.file.exprs[*rhs].kind,
                ) {
                    (_, ExprKind::Null) => *lhs,
                    (ExprKind::Null, _) => *rhs,
                    _ => return (scope.clone(), scope.clone()),
                };
                (scope.clone(), self.non_null(scope, subject))
            }
            _ => (scope.clone(), scope.clone()),
        }
    }

    fn non_null(&self, scope: &StaticScope, subject: syntax::ExprId) -> StaticScope {
        let ExprKind::Var(name) = &self.file.exprs[subject].kind else {
            return scope.clone();
        };
        match scope.scoped_declaration(name) {
            Some(ScopedDeclaration::Closed(declaration) | ScopedDeclaration::NonNull(declaration)) => {
                scope.with_declaration(name.clone(), ScopedDeclaration::NonNull(*declaration))
            }
            _ => scope.clone(),
        }
    }

    /// Only plain references to bound declarations are narrowed.
    fn narrowed(&self, scope: &StaticScope, subject: syntax::ExprId, tag: &SmolStr) -> StaticScope {
        let ExprKind::Var(name) = &self.file.exprs[subject].kind else {
            return scope.clone();
        };
        match scope.scoped_declaration(name) {
            Some(
                ScopedDeclaration::Closed(declaration)
                | ScopedDeclaration::Narrowed { declaration, .. },
            ) => scope.with_declaration(
                name.clone(),
                ScopedDeclaration::Narrowed {
                    declaration: *declaration,
                    tag: tag.clone(),
                },
            ),
            _ => scope.clone(),
        }
    }
}
