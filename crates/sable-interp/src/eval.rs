use crate::builtins::{self, Builtin};
use crate::error::RuntimeError;
use crate::scope::Scope;
use crate::value::{Closure, FunctionValue, Parameters, Value};
use num_bigint::{BigInt, Sign};
use sable_syntax::Span;
use sable_typeck::{
    ArgumentList, ArithmeticOp, ComparisonOp, Declaration, ExprId, ExpressionKind, FunctionBody,
    LogicalOp, Program, Signature,
};
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::trace;

type Result<T> = std::result::Result<T, RuntimeError>;

pub struct Interpreter<'a> {
    program: &'a Program,
    depth: usize,
}

impl<'a> Interpreter<'a> {
    pub fn new(program: &'a Program) -> Self {
        Self { program, depth: 0 }
    }

    pub fn run(&mut self) -> Result<Value> {
        let program = self.program;
        self.eval_body(&Scope::empty(), &program.body)
    }

    // ── Bodies & declarations ────────────────────────────────────

    /// Declarations are bound left to right, each seeing the ones before it.
    fn eval_body(&mut self, scope: &Scope, body: &FunctionBody) -> Result<Value> {
        let mut scope = scope.clone();
        for &declaration in &body.declarations {
            scope = self.bind_declaration(&scope, declaration)?;
        }
        self.eval(&scope, body.result)
    }

    fn bind_declaration(&mut self, scope: &Scope, id: sable_typeck::DeclId) -> Result<Scope> {
        let program = self.program;
        match &program.decls[id] {
            Declaration::Value(v) => {
                let value = self.eval(scope, v.value)?;
                Ok(scope.with(v.name.clone(), value))
            }
            Declaration::Function(f) => {
                let function = match &f.body {
                    Some(body) => FunctionValue::User(Rc::new(Closure {
                        name: Some(f.name.clone()),
                        parameters: self.parameters(&f.signature),
                        body: body.clone(),
                        scope: scope.clone(),
                    })),
                    None => match Builtin::from_name(&f.name) {
                        Some(builtin) => FunctionValue::Builtin(builtin),
                        None => FunctionValue::Unbound(f.name.clone()),
                    },
                };
                Ok(scope.with(f.name.clone(), Value::Function(function)))
            }
            // Bound by calls and match arms.
            Declaration::Parameter(_) | Declaration::Payload(_) => Ok(scope.clone()),
        }
    }

    fn parameters(&self, signature: &Signature) -> Parameters {
        let name = |id: &sable_typeck::DeclId| self.program.decls[*id].name().clone();
        match signature.arguments {
            ArgumentList::Vararg(ref argument) => Parameters::Vararg(
                signature
                    .parameters
                    .first()
                    .map(name)
                    .unwrap_or_else(|| argument.name.clone()),
            ),
            ArgumentList::Basic(_) => Parameters::Basic(signature.parameters.iter().map(name).collect()),
        }
    }

    // ── Expressions ──────────────────────────────────────────────

    fn eval(&mut self, scope: &Scope, id: ExprId) -> Result<Value> {
        let program = self.program;
        let expr = &program.exprs[id];
        let span = expr.span;
        match &expr.kind {
            ExpressionKind::Number(n) => Ok(Value::Number(*n)),
            ExpressionKind::BigInteger(n) => Ok(Value::BigInteger(n.clone())),
            ExpressionKind::Boolean(b) => Ok(Value::Boolean(*b)),
            ExpressionKind::Null => Ok(Value::Null),
            ExpressionKind::Object(fields) => {
                let mut values = BTreeMap::new();
                for (name, value) in fields {
                    values.insert(name.clone(), self.eval(scope, *value)?);
                }
                Ok(Value::Object(Rc::new(values)))
            }
            ExpressionKind::Arithmetic { op, lhs, rhs } => {
                let lhs = self.eval(scope, *lhs)?;
                let rhs = self.eval(scope, *rhs)?;
                arithmetic(*op, lhs, rhs, span)
            }
            ExpressionKind::Negate(operand) => match self.eval(scope, *operand)? {
                Value::Number(n) => Ok(Value::Number(-n)),
                Value::BigInteger(n) => Ok(Value::BigInteger(-n)),
                other => Err(RuntimeError::with_span(
                    format!("operator '-' cannot be applied to {}", other.kind_name()),
                    span,
                )),
            },
            ExpressionKind::Comparison { op, lhs, rhs } => {
                let lhs = self.eval(scope, *lhs)?;
                let rhs = self.eval(scope, *rhs)?;
                compare(*op, &lhs, &rhs, span).map(Value::Boolean)
            }
            ExpressionKind::Logical { op, lhs, rhs } => {
                let lhs = self.eval(scope, *lhs)?.as_boolean(span)?;
                let result = match (op, lhs) {
                    (LogicalOp::And, false) => false,
                    (LogicalOp::Or, true) => true,
                    _ => self.eval(scope, *rhs)?.as_boolean(span)?,
                };
                Ok(Value::Boolean(result))
            }
            ExpressionKind::Not(operand) => {
                let value = self.eval(scope, *operand)?.as_boolean(span)?;
                Ok(Value::Boolean(!value))
            }
            ExpressionKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval(scope, *condition)?.as_boolean(span)? {
                    self.eval(scope, *then_branch)
                } else {
                    self.eval(scope, *else_branch)
                }
            }
            ExpressionKind::Reference { name, .. } => scope.lookup(name).ok_or_else(|| {
                RuntimeError::with_span(format!("undefined variable '{}'", name), span)
            }),
            ExpressionKind::Call {
                callee, arguments, ..
            } => {
                let function = self.eval(scope, *callee)?;
                let arguments = arguments
                    .iter()
                    .map(|&a| self.eval(scope, a))
                    .collect::<Result<Vec<_>>>()?;
                self.call(&function, arguments, span)
            }
            ExpressionKind::Lambda(lambda) => {
                Ok(Value::Function(FunctionValue::User(Rc::new(Closure {
                    name: None,
                    parameters: self.parameters(&lambda.signature),
                    body: lambda.body.clone(),
                    scope: scope.clone(),
                }))))
            }
            ExpressionKind::Field { object, field } => match self.eval(scope, *object)? {
                Value::Object(fields) => fields.get(field).cloned().ok_or_else(|| {
                    RuntimeError::with_span(format!("object has no field '{}'", field), span)
                }),
                other => Err(RuntimeError::with_span(
                    format!("cannot read field '{}' of {}", field, other.kind_name()),
                    span,
                )),
            },
            ExpressionKind::Tag { value, tag } => {
                let payload = self.eval(scope, *value)?;
                Ok(Value::Tagged(Rc::new(payload), tag.clone()))
            }
            ExpressionKind::Is { value, tag } => {
                let value = self.eval(scope, *value)?;
                let (own, _) = value.as_tagged(span)?;
                Ok(Value::Boolean(own == tag))
            }
            ExpressionKind::Untag(value) => {
                let value = self.eval(scope, *value)?;
                let (_, payload) = value.as_tagged(span)?;
                Ok(payload.clone())
            }
            ExpressionKind::Match { scrutinee, arms } => {
                let value = self.eval(scope, *scrutinee)?;
                let (tag, payload) = value.as_tagged(span)?;
                let arm = arms.iter().find(|arm| arm.tag == *tag).ok_or_else(|| {
                    RuntimeError::with_span(format!("no match arm for tag '{}'", tag), span)
                })?;
                let binding = program.decls[arm.binding].name().clone();
                self.eval(&scope.with(binding, payload.clone()), arm.body)
            }
        }
    }

    // ── Calls ────────────────────────────────────────────────────

    pub fn call(&mut self, function: &Value, arguments: Vec<Value>, span: Span) -> Result<Value> {
        match function.as_function(span)? {
            FunctionValue::User(closure) => self.call_closure(closure, arguments, span),
            FunctionValue::Builtin(builtin) => {
                trace!(function = builtin.name(), arguments = arguments.len(), "builtin call");
                builtins::call(self, *builtin, arguments, span)
            }
            FunctionValue::Unbound(name) => Err(RuntimeError::with_span(
                format!("external function '{}' has no implementation", name),
                span,
            )),
        }
    }

    /// Parameters are layered over the captured scope, after the function's own name.
    /// Arguments beyond the declared parameters are ignored: a function may stand in for
    /// one that takes more arguments.
    fn call_closure(
        &mut self,
        closure: &Rc<Closure>,
        arguments: Vec<Value>,
        span: Span,
    ) -> Result<Value> {
        trace!(
            function = closure.name.as_deref().unwrap_or("<lambda>"),
            arguments = arguments.len(),
            depth = self.depth,
            "call"
        );
        let mut scope = closure.scope.clone();
        if let Some(name) = &closure.name {
            scope = scope.with(
                name.clone(),
                Value::Function(FunctionValue::User(closure.clone())),
            );
        }
        match &closure.parameters {
            Parameters::Basic(names) => {
                if arguments.len() < names.len() {
                    return Err(RuntimeError::with_span(
                        format!("expected {} arguments, got {}", names.len(), arguments.len()),
                        span,
                    ));
                }
                for (name, argument) in names.iter().zip(arguments) {
                    scope = scope.with(name.clone(), argument);
                }
            }
            Parameters::Vararg(name) => {
                scope = scope.with(name.clone(), Value::List(Rc::new(arguments)));
            }
        }
        self.depth += 1;
        let result = self.eval_body(&scope, &closure.body);
        self.depth -= 1;
        result
    }
}

// ── Operators ────────────────────────────────────────────────────

fn division_by_zero(span: Span) -> RuntimeError {
    RuntimeError::with_span("division by zero", span)
}

fn arithmetic(op: ArithmeticOp, lhs: Value, rhs: Value, span: Span) -> Result<Value> {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => {
            if b == 0.0 && matches!(op, ArithmeticOp::Div | ArithmeticOp::FloorDiv | ArithmeticOp::Rem) {
                return Err(division_by_zero(span));
            }
            Ok(Value::Number(match op {
                ArithmeticOp::Add => a + b,
                ArithmeticOp::Sub => a - b,
                ArithmeticOp::Mul => a * b,
                ArithmeticOp::Div => a / b,
                ArithmeticOp::FloorDiv => (a / b).floor(),
                ArithmeticOp::Rem => a % b,
            }))
        }
        (Value::BigInteger(a), Value::BigInteger(b)) => match op {
            ArithmeticOp::Add => Ok(Value::BigInteger(a + b)),
            ArithmeticOp::Sub => Ok(Value::BigInteger(a - b)),
            ArithmeticOp::Mul => Ok(Value::BigInteger(a * b)),
            ArithmeticOp::FloorDiv => {
                if b.sign() == Sign::NoSign {
                    return Err(division_by_zero(span));
                }
                Ok(Value::BigInteger(floor_div(&a, &b)))
            }
            ArithmeticOp::Div | ArithmeticOp::Rem => Err(RuntimeError::with_span(
                format!("operator '{}' cannot be applied to BigInteger", op.symbol()),
                span,
            )),
        },
        (lhs, rhs) => Err(RuntimeError::with_span(
            format!(
                "operator '{}' cannot be applied to {} and {}",
                op.symbol(),
                lhs.kind_name(),
                rhs.kind_name()
            ),
            span,
        )),
    }
}

/// Division rounding toward negative infinity. `BigInt`'s `/` truncates toward zero.
fn floor_div(a: &BigInt, b: &BigInt) -> BigInt {
    let quotient = a / b;
    let exact = (a % b).sign() == Sign::NoSign;
    if !exact && (a.sign() == Sign::Minus) != (b.sign() == Sign::Minus) {
        quotient - BigInt::from(1)
    } else {
        quotient
    }
}

fn compare(op: ComparisonOp, lhs: &Value, rhs: &Value, span: Span) -> Result<bool> {
    match op {
        ComparisonOp::Eq => Ok(lhs == rhs),
        ComparisonOp::Lt | ComparisonOp::Gt => {
            let ordering = match (lhs, rhs) {
                (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
                (Value::BigInteger(a), Value::BigInteger(b)) => Some(a.cmp(b)),
                _ => {
                    return Err(RuntimeError::with_span(
                        format!(
                            "operator '{}' cannot be applied to {} and {}",
                            op.symbol(),
                            lhs.kind_name(),
                            rhs.kind_name()
                        ),
                        span,
                    ))
                }
            };
            Ok(match op {
                ComparisonOp::Lt => ordering == Some(std::cmp::Ordering::Less),
                _ => ordering == Some(std::cmp::Ordering::Greater),
            })
        }
    }
}
