use la_arena::{Arena, Idx};
use smol_str::SmolStr;
pub use sable_lexer::Span;

// ── ID types ──────────────────────────────────────────────────────

pub type ExprId = Idx<Expr>;
pub type TypeExprId = Idx<TypeExpr>;

// ── Source file ───────────────────────────────────────────────────

/// A parsed source file: one top-level body plus the node arenas it indexes into.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub body: Body,
    pub exprs: Arena<Expr>,
    pub type_exprs: Arena<TypeExpr>,
}

/// `declaration* return expr`
#[derive(Debug, Clone)]
pub struct Body {
    pub declarations: Vec<Declaration>,
    pub result: ExprId,
    pub span: Span,
}

// ── Declarations ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum Declaration {
    Value(ValueDecl),
    Function(FunctionDecl),
    TypeAlias(TypeAliasDecl),
    Union(UnionDecl),
}

impl Declaration {
    pub fn span(&self) -> Span {
        match self {
            Declaration::Value(d) => d.span,
            Declaration::Function(d) => d.span,
            Declaration::TypeAlias(d) => d.span,
            Declaration::Union(d) => d.span,
        }
    }
}

/// `val name (: type)? = expr`
#[derive(Debug, Clone)]
pub struct ValueDecl {
    pub name: SmolStr,
    pub name_span: Span,
    pub type_ann: Option<TypeExprId>,
    pub value: ExprId,
    pub span: Span,
}

/// `def name[generics](params): type = body`, or `external def ...` when `body` is `None`.
#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: SmolStr,
    pub name_span: Span,
    pub generics: Vec<Generic>,
    pub params: Params,
    pub return_type: Option<TypeExprId>,
    pub body: Option<Body>,
    pub span: Span,
}

/// A generic parameter name: the `A` in `[A, B]`.
#[derive(Debug, Clone)]
pub struct Generic {
    pub name: SmolStr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Params {
    /// `(a: T, b: U)`
    Basic(Vec<Param>),
    /// `(...items: T)`
    Vararg(Param),
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: SmolStr,
    pub name_span: Span,
    pub type_ann: TypeExprId,
    pub span: Span,
}

/// `type Name[generics] = type`
#[derive(Debug, Clone)]
pub struct TypeAliasDecl {
    pub name: SmolStr,
    pub name_span: Span,
    pub generics: Vec<Generic>,
    pub target: TypeExprId,
    pub span: Span,
}

/// `union Name[generics] = Tag: type | Tag: type`
#[derive(Debug, Clone)]
pub struct UnionDecl {
    pub name: SmolStr,
    pub name_span: Span,
    pub generics: Vec<Generic>,
    pub alternatives: Vec<Alternative>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Alternative {
    pub tag: SmolStr,
    pub payload: TypeExprId,
    pub span: Span,
}

// ── Expressions ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Number(f64),
    /// Decimal digits of a `123n` literal.
    BigInteger(SmolStr),
    Bool(bool),
    Null,
    /// Object literal: `{ a: 1, b: true }`
    Object(Vec<FieldInit>),
    Var(SmolStr),
    Binary {
        op: BinaryOp,
        lhs: ExprId,
        rhs: ExprId,
    },
    Unary {
        op: UnaryOp,
        operand: ExprId,
    },
    If {
        condition: ExprId,
        then_branch: ExprId,
        else_branch: ExprId,
    },
    /// `callee[type_args](args)`
    Call {
        callee: ExprId,
        type_args: Vec<TypeExprId>,
        args: Vec<ExprId>,
    },
    /// `fn[generics](params): type => body`
    Lambda {
        generics: Vec<Generic>,
        params: Params,
        return_type: Option<TypeExprId>,
        body: ExprId,
    },
    /// `object.field`
    Field {
        object: ExprId,
        field: SmolStr,
    },
    /// `value # Tag`
    Tag {
        value: ExprId,
        tag: SmolStr,
    },
    /// `value is Tag`
    Is {
        value: ExprId,
        tag: SmolStr,
    },
    /// `untag value`
    Untag(ExprId),
    /// `match scrutinee { Tag x => body, ... }`
    Match {
        scrutinee: ExprId,
        arms: Vec<MatchArm>,
    },
}

#[derive(Debug, Clone)]
pub struct FieldInit {
    pub name: SmolStr,
    pub value: ExprId,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Rem,
    Lt,
    Gt,
    Eq,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::FloorDiv => "//",
            BinaryOp::Rem => "%",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Eq => "==",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone)]
pub struct MatchArm {
    pub tag: SmolStr,
    pub tag_span: Span,
    pub binding: SmolStr,
    pub binding_span: Span,
    pub body: ExprId,
    pub span: Span,
}

// ── Type expressions ──────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TypeExpr {
    pub kind: TypeExprKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum TypeExprKind {
    /// `Number`, `List[Number]`, `Pair[A]`, `A`
    Named {
        name: SmolStr,
        args: Vec<TypeExprId>,
    },
    /// `{ name: type, ... }`
    Object(Vec<(SmolStr, TypeExprId)>),
    /// `[generics](params) -> type`
    Function {
        generics: Vec<Generic>,
        params: Params,
        return_type: TypeExprId,
    },
    /// `type?`
    Nullable(TypeExprId),
}

// ── Pretty printer ────────────────────────────────────────────────

pub fn pretty_print(file: &SourceFile) -> String {
    let mut printer = PrettyPrinter {
        file,
        buf: String::new(),
        indent: 0,
    };
    printer.print_body(&file.body);
    printer.buf
}

struct PrettyPrinter<'a> {
    file: &'a SourceFile,
    buf: String,
    indent: usize,
}

impl<'a> PrettyPrinter<'a> {
    fn write_indent(&mut self) {
        for _ in 0..self.indent {
            self.buf.push_str("  ");
        }
    }

    fn writeln(&mut self, s: &str) {
        self.write_indent();
        self.buf.push_str(s);
        self.buf.push('\n');
    }

    fn print_body(&mut self, body: &Body) {
        for decl in &body.declarations {
            self.print_declaration(decl);
        }
        self.write_indent();
        self.buf.push_str("(return ");
        self.print_expr(body.result);
        self.buf.push_str(")\n");
    }

    fn print_declaration(&mut self, decl: &Declaration) {
        match decl {
            Declaration::Value(d) => {
                self.write_indent();
                self.buf.push_str(&format!("(val {}", d.name));
                if let Some(t) = d.type_ann {
                    self.buf.push_str(" : ");
                    self.print_type_expr(t);
                }
                self.buf.push(' ');
                self.print_expr(d.value);
                self.buf.push_str(")\n");
            }
            Declaration::Function(d) => self.print_function(d),
            Declaration::TypeAlias(d) => {
                self.write_indent();
                self.buf.push_str(&format!("(type {}", d.name));
                self.print_generics(&d.generics);
                self.buf.push(' ');
                self.print_type_expr(d.target);
                self.buf.push_str(")\n");
            }
            Declaration::Union(d) => {
                self.write_indent();
                self.buf.push_str(&format!("(union {}", d.name));
                self.print_generics(&d.generics);
                for alt in &d.alternatives {
                    self.buf.push_str(&format!(" ({} ", alt.tag));
                    self.print_type_expr(alt.payload);
                    self.buf.push(')');
                }
                self.buf.push_str(")\n");
            }
        }
    }

    fn print_function(&mut self, d: &FunctionDecl) {
        let keyword = if d.body.is_some() {
            "def"
        } else {
            "external def"
        };
        self.write_indent();
        self.buf.push_str(&format!("({} {}", keyword, d.name));
        self.print_generics(&d.generics);
        self.buf.push(' ');
        self.print_params(&d.params);
        if let Some(ret) = d.return_type {
            self.buf.push_str(" : ");
            self.print_type_expr(ret);
        }
        match &d.body {
            Some(body) => {
                self.buf.push('\n');
                self.indent += 1;
                self.print_body(body);
                self.indent -= 1;
                self.writeln(")");
            }
            None => self.buf.push_str(")\n"),
        }
    }

    fn print_generics(&mut self, generics: &[Generic]) {
        if generics.is_empty() {
            return;
        }
        self.buf.push('[');
        for (i, g) in generics.iter().enumerate() {
            if i > 0 {
                self.buf.push(' ');
            }
            self.buf.push_str(&g.name);
        }
        self.buf.push(']');
    }

    fn print_params(&mut self, params: &Params) {
        self.buf.push('(');
        match params {
            Params::Basic(params) => {
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        self.buf.push(' ');
                    }
                    self.buf.push_str(&format!("({} : ", p.name));
                    self.print_type_expr(p.type_ann);
                    self.buf.push(')');
                }
            }
            Params::Vararg(p) => {
                self.buf.push_str(&format!("(...{} : ", p.name));
                self.print_type_expr(p.type_ann);
                self.buf.push(')');
            }
        }
        self.buf.push(')');
    }

    fn print_expr(&mut self, id: ExprId) {
        let expr = &self.file.exprs[id];
        match &expr.kind {
            ExprKind::Number(n) => self.buf.push_str(&format!("{:?}", n)),
            ExprKind::BigInteger(digits) => {
                self.buf.push_str(digits);
                self.buf.push('n');
            }
            ExprKind::Bool(b) => self.buf.push_str(if *b { "true" } else { "false" }),
            ExprKind::Null => self.buf.push_str("null"),
            ExprKind::Object(fields) => {
                self.buf.push('{');
                for (i, f) in fields.iter().enumerate() {
                    if i > 0 {
                        self.buf.push(' ');
                    }
                    self.buf.push_str(&format!(":{} ", f.name));
                    self.print_expr(f.value);
                }
                self.buf.push('}');
            }
            ExprKind::Var(name) => self.buf.push_str(name),
            ExprKind::Binary { op, lhs, rhs } => {
                self.buf.push_str(&format!("({} ", op.symbol()));
                self.print_expr(*lhs);
                self.buf.push(' ');
                self.print_expr(*rhs);
                self.buf.push(')');
            }
            ExprKind::Unary { op, operand } => {
                let symbol = match op {
                    UnaryOp::Not => "not",
                    UnaryOp::Neg => "-",
                };
                self.buf.push_str(&format!("({} ", symbol));
                self.print_expr(*operand);
                self.buf.push(')');
            }
            ExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.buf.push_str("(if ");
                self.print_expr(*condition);
                self.buf.push(' ');
                self.print_expr(*then_branch);
                self.buf.push(' ');
                self.print_expr(*else_branch);
                self.buf.push(')');
            }
            ExprKind::Call {
                callee,
                type_args,
                args,
            } => {
                self.buf.push('(');
                self.print_expr(*callee);
                if !type_args.is_empty() {
                    self.buf.push_str(" [");
                    for (i, &t) in type_args.iter().enumerate() {
                        if i > 0 {
                            self.buf.push(' ');
                        }
                        self.print_type_expr(t);
                    }
                    self.buf.push(']');
                }
                for &arg in args {
                    self.buf.push(' ');
                    self.print_expr(arg);
                }
                self.buf.push(')');
            }
            ExprKind::Lambda {
                generics,
                params,
                return_type,
                body,
            } => {
                self.buf.push_str("(fn");
                self.print_generics(generics);
                self.buf.push(' ');
                self.print_params(params);
                if let Some(ret) = return_type {
                    self.buf.push_str(" : ");
                    self.print_type_expr(*ret);
                }
                self.buf.push(' ');
                self.print_expr(*body);
                self.buf.push(')');
            }
            ExprKind::Field { object, field } => {
                self.buf.push_str(&format!("(.{} ", field));
                self.print_expr(*object);
                self.buf.push(')');
            }
            ExprKind::Tag { value, tag } => {
                self.buf.push_str("(tag ");
                self.print_expr(*value);
                self.buf.push_str(&format!(" {})", tag));
            }
            ExprKind::Is { value, tag } => {
                self.buf.push_str("(is ");
                self.print_expr(*value);
                self.buf.push_str(&format!(" {})", tag));
            }
            ExprKind::Untag(value) => {
                self.buf.push_str("(untag ");
                self.print_expr(*value);
                self.buf.push(')');
            }
            ExprKind::Match { scrutinee, arms } => {
                self.buf.push_str("(match ");
                self.print_expr(*scrutinee);
                for arm in arms {
                    self.buf.push_str(&format!(" ({} {} ", arm.tag, arm.binding));
                    self.print_expr(arm.body);
                    self.buf.push(')');
                }
                self.buf.push(')');
            }
        }
    }

    fn print_type_expr(&mut self, id: TypeExprId) {
        let ty = &self.file.type_exprs[id];
        match &ty.kind {
            TypeExprKind::Named { name, args } => {
                if args.is_empty() {
                    self.buf.push_str(name);
                } else {
                    self.buf.push_str(&format!("({}", name));
                    for &a in args {
                        self.buf.push(' ');
                        self.print_type_expr(a);
                    }
                    self.buf.push(')');
                }
            }
            TypeExprKind::Object(fields) => {
                self.buf.push('{');
                for (i, (name, t)) in fields.iter().enumerate() {
                    if i > 0 {
                        self.buf.push(' ');
                    }
                    self.buf.push_str(&format!(":{} ", name));
                    self.print_type_expr(*t);
                }
                self.buf.push('}');
            }
            TypeExprKind::Function {
                generics,
                params,
                return_type,
            } => {
                self.buf.push_str("(Fn");
                self.print_generics(generics);
                self.buf.push(' ');
                self.print_params(params);
                self.buf.push(' ');
                self.print_type_expr(*return_type);
                self.buf.push(')');
            }
            TypeExprKind::Nullable(inner) => {
                self.buf.push_str("(Nullable ");
                self.print_type_expr(*inner);
                self.buf.push(')');
            }
        }
    }
}
