//! The resolved program: every name is bound to a declaration and every type annotation is
//! a [`Type`]. Built once by [`crate::builder`], then queried for types and evaluated.

use crate::scope::ScopedDeclaration;
use crate::types::{ArgumentList, Type, TypeVariable};
use la_arena::{Arena, ArenaMap, Idx};
use num_bigint::BigInt;
use sable_syntax::Span;
use smol_str::SmolStr;
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;

pub type ExprId = Idx<Expression>;
pub type DeclId = Idx<Declaration>;

// ── Declarations ─────────────────────────────────────────────────

/// `declaration* return result`. A lambda body has no declarations.
#[derive(Debug, Clone)]
pub struct FunctionBody {
    pub declarations: Vec<DeclId>,
    pub result: ExprId,
}

#[derive(Debug, Clone)]
pub enum Declaration {
    Value(ValueDeclaration),
    Function(FunctionDeclaration),
    Parameter(Parameter),
    /// The name bound by a `match` arm.
    Payload(PayloadBinding),
}

impl Declaration {
    pub fn name(&self) -> &SmolStr {
        match self {
            Declaration::Value(d) => &d.name,
            Declaration::Function(d) => &d.name,
            Declaration::Parameter(d) => &d.name,
            Declaration::Payload(d) => &d.name,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Declaration::Value(d) => d.span,
            Declaration::Function(d) => d.span,
            Declaration::Parameter(d) => d.span,
            Declaration::Payload(d) => d.span,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValueDeclaration {
    pub name: SmolStr,
    pub span: Span,
    pub declared_type: Option<Type>,
    pub value: ExprId,
}

#[derive(Debug, Clone)]
pub struct FunctionDeclaration {
    pub name: SmolStr,
    pub span: Span,
    pub signature: Signature,
    /// `None` for `external def`.
    pub body: Option<FunctionBody>,
}

/// Shared by named functions and lambdas.
#[derive(Debug, Clone)]
pub struct Signature {
    pub type_variables: Vec<TypeVariable>,
    pub arguments: ArgumentList,
    /// One `Parameter` declaration per argument, in order.
    pub parameters: Vec<DeclId>,
    pub return_type: Option<Type>,
}

impl Signature {
    pub fn is_vararg(&self) -> bool {
        matches!(self.arguments, ArgumentList::Vararg(_))
    }
}

/// Inside the body a vararg parameter `...xs: T` has type `List[T]`.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: SmolStr,
    pub span: Span,
    pub ty: Type,
}

#[derive(Debug, Clone)]
pub struct PayloadBinding {
    pub name: SmolStr,
    pub span: Span,
    pub scrutinee: ExprId,
    pub tag: SmolStr,
}

// ── Expressions ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ExpressionKind {
    Number(f64),
    BigInteger(BigInt),
    Boolean(bool),
    Null,
    Object(Vec<(SmolStr, ExprId)>),
    Arithmetic {
        op: ArithmeticOp,
        lhs: ExprId,
        rhs: ExprId,
    },
    Negate(ExprId),
    Comparison {
        op: ComparisonOp,
        lhs: ExprId,
        rhs: ExprId,
    },
    /// Short-circuiting.
    Logical {
        op: LogicalOp,
        lhs: ExprId,
        rhs: ExprId,
    },
    Not(ExprId),
    If {
        condition: ExprId,
        then_branch: ExprId,
        else_branch: ExprId,
    },
    /// `target` is `None` when the name was not in scope.
    Reference {
        name: SmolStr,
        target: Option<ScopedDeclaration>,
    },
    Call {
        callee: ExprId,
        /// Empty unless given explicitly; then inferred.
        type_arguments: Vec<Type>,
        arguments: Vec<ExprId>,
    },
    Lambda(Box<Lambda>),
    Field {
        object: ExprId,
        field: SmolStr,
    },
    Tag {
        value: ExprId,
        tag: SmolStr,
    },
    Is {
        value: ExprId,
        tag: SmolStr,
    },
    Untag(ExprId),
    Match {
        scrutinee: ExprId,
        arms: Vec<MatchArm>,
    },
}

#[derive(Debug, Clone)]
pub struct Lambda {
    pub signature: Signature,
    pub body: FunctionBody,
}

#[derive(Debug, Clone)]
pub struct MatchArm {
    pub tag: SmolStr,
    /// A `Payload` declaration.
    pub binding: DeclId,
    pub body: ExprId,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Rem,
}

impl ArithmeticOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Sub => "-",
            ArithmeticOp::Mul => "*",
            ArithmeticOp::Div => "/",
            ArithmeticOp::FloorDiv => "//",
            ArithmeticOp::Rem => "%",
        }
    }

    /// `/` and `%` are Number-only.
    pub fn supports_big_integers(self) -> bool {
        matches!(
            self,
            ArithmeticOp::Add | ArithmeticOp::Sub | ArithmeticOp::Mul | ArithmeticOp::FloorDiv
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Lt,
    Gt,
    Eq,
}

impl ComparisonOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ComparisonOp::Lt => "<",
            ComparisonOp::Gt => ">",
            ComparisonOp::Eq => "==",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

// ── Program ──────────────────────────────────────────────────────

pub struct Program {
    pub source_name: SmolStr,
    pub exprs: Arena<Expression>,
    pub decls: Arena<Declaration>,
    pub body: FunctionBody,
    /// Memoized expression types.
    pub(crate) types: RefCell<ArenaMap<ExprId, Type>>,
    /// Expressions whose type is being determined right now.
    pub(crate) visiting: RefCell<HashSet<ExprId>>,
}

impl Program {
    pub(crate) fn new(
        source_name: SmolStr,
        exprs: Arena<Expression>,
        decls: Arena<Declaration>,
        body: FunctionBody,
    ) -> Self {
        Self {
            source_name,
            exprs,
            decls,
            body,
            types: RefCell::new(ArenaMap::default()),
            visiting: RefCell::new(HashSet::new()),
        }
    }

    /// The function declaration with this name in the top-level body, if any.
    pub fn function(&self, name: &str) -> Option<&FunctionDeclaration> {
        self.body
            .declarations
            .iter()
            .rev()
            .find_map(|&id| match &self.decls[id] {
                Declaration::Function(f) if f.name == name => Some(f),
                _ => None,
            })
    }
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program")
            .field("source_name", &self.source_name)
            .field("exprs", &self.exprs.len())
            .field("decls", &self.decls.len())
            .field("body", &self.body)
            .finish_non_exhaustive()
    }
}
