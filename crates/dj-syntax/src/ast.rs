//! Closed-enum Java syntax tree.
//!
//! Every expression, statement and declaration carries a [`NodeId`] so later phases can
//! attach information (static types, resolved members) in side tables instead of mutating
//! the tree.

use dj_core::{Modifiers, NodeId, PrimitiveType, Span};

#[derive(Debug, Clone, PartialEq)]
pub struct CompilationUnit {
    pub package: Option<PackageDecl>,
    pub imports: Vec<ImportDecl>,
    pub types: Vec<TypeDecl>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDecl {
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDecl {
    pub is_static: bool,
    pub is_star: bool,
    pub path: String,
    pub span: Span,
}

/// One top-level item of an interactive entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Package(PackageDecl),
    Import(ImportDecl),
    Type(TypeDecl),
    Method(MethodDecl),
    Stmt(Stmt),
    /// A trailing expression written without `;`, whose value is displayed.
    Expr(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Class,
    Interface,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeDecl {
    pub id: NodeId,
    pub kind: TypeKind,
    pub modifiers: Modifiers,
    pub name: String,
    pub name_span: Span,
    pub type_params: Vec<TypeParam>,
    /// Superclass of a class (at most one) or superinterfaces of an interface.
    pub extends: Vec<TypeRef>,
    pub implements: Vec<TypeRef>,
    pub members: Vec<MemberDecl>,
    pub span: Span,
}

impl TypeDecl {
    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    pub fn methods(&self) -> impl Iterator<Item = &MethodDecl> {
        self.members.iter().filter_map(|m| match m {
            MemberDecl::Method(method) => Some(method),
            _ => None,
        })
    }

    pub fn constructors(&self) -> impl Iterator<Item = &ConstructorDecl> {
        self.members.iter().filter_map(|m| match m {
            MemberDecl::Constructor(ctor) => Some(ctor),
            _ => None,
        })
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldDecl> {
        self.members.iter().filter_map(|m| match m {
            MemberDecl::Field(field) => Some(field),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeParam {
    pub name: String,
    pub bounds: Vec<TypeRef>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MemberDecl {
    Field(FieldDecl),
    Method(MethodDecl),
    Constructor(ConstructorDecl),
    Initializer(InitializerDecl),
    Type(TypeDecl),
}

/// One declarator of a field declaration; `int a, b;` produces two of these.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub id: NodeId,
    pub modifiers: Modifiers,
    pub ty: TypeRef,
    pub name: String,
    pub name_span: Span,
    pub init: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodDecl {
    pub id: NodeId,
    pub modifiers: Modifiers,
    pub type_params: Vec<TypeParam>,
    pub return_ty: TypeRef,
    pub name: String,
    pub name_span: Span,
    pub params: Vec<Param>,
    pub throws: Vec<TypeRef>,
    pub body: Option<Block>,
    pub span: Span,
}

impl MethodDecl {
    pub fn is_var_args(&self) -> bool {
        self.params.last().is_some_and(|p| p.var_args)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorDecl {
    pub id: NodeId,
    pub modifiers: Modifiers,
    pub name: String,
    pub name_span: Span,
    pub params: Vec<Param>,
    pub throws: Vec<TypeRef>,
    pub body: Block,
    pub span: Span,
}

impl ConstructorDecl {
    pub fn is_var_args(&self) -> bool {
        self.params.last().is_some_and(|p| p.var_args)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InitializerDecl {
    pub id: NodeId,
    pub is_static: bool,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub id: NodeId,
    pub is_final: bool,
    /// Declared type. For a varargs parameter this is already the array type.
    pub ty: TypeRef,
    pub var_args: bool,
    pub name: String,
    pub name_span: Span,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeRef {
    pub kind: TypeRefKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeRefKind {
    Primitive(PrimitiveType),
    Void,
    /// A possibly qualified class name with type arguments on its last segment.
    Named { name: String, args: Vec<TypeArg> },
    Array(Box<TypeRef>),
}

impl TypeRef {
    pub fn array_of(self, dims: usize, span: Span) -> TypeRef {
        (0..dims).fold(self, |elem, _| TypeRef {
            kind: TypeRefKind::Array(Box::new(elem)),
            span,
        })
    }

    pub fn is_void(&self) -> bool {
        matches!(self.kind, TypeRefKind::Void)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeArg {
    Type(TypeRef),
    Wildcard {
        bound: Option<(WildcardKind, TypeRef)>,
        span: Span,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WildcardKind {
    Extends,
    Super,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: NodeId,
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub id: NodeId,
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    LocalVar {
        is_final: bool,
        declarators: Vec<VarDeclarator>,
    },
    Expr(Expr),
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
    },
    For {
        init: Vec<Stmt>,
        cond: Option<Expr>,
        update: Vec<Expr>,
        body: Box<Stmt>,
    },
    ForEach {
        is_final: bool,
        var: VarDeclarator,
        iterable: Expr,
        body: Box<Stmt>,
    },
    Labeled {
        label: String,
        body: Box<Stmt>,
    },
    Break(Option<String>),
    Continue(Option<String>),
    Return(Option<Expr>),
    Throw(Expr),
    Try {
        body: Block,
        catches: Vec<CatchClause>,
        finally: Option<Block>,
    },
    Switch {
        selector: Expr,
        cases: Vec<SwitchCase>,
    },
    Block(Block),
    /// Explicit `this(...)` or `super(...)` at the start of a constructor body.
    ConstructorCall {
        is_super: bool,
        args: Vec<Expr>,
    },
    Empty,
}

/// A declared local: `int x = 1` in a local declaration, or the variable of a foreach.
#[derive(Debug, Clone, PartialEq)]
pub struct VarDeclarator {
    pub id: NodeId,
    pub ty: TypeRef,
    pub name: String,
    pub name_span: Span,
    pub init: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    pub id: NodeId,
    /// Alternatives of a multi-catch; usually a single type.
    pub types: Vec<TypeRef>,
    pub name: String,
    pub name_span: Span,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    /// Constant labels; empty together with `is_default` for `default:`.
    pub labels: Vec<Expr>,
    pub is_default: bool,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    /// UTF-16 code unit.
    Char(u16),
    String(String),
    Boolean(bool),
    Null,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    /// A simple identifier: local, field, type or the first segment of a package.
    Name(String),
    /// `receiver.name`, also used for qualified type and package names until resolved.
    FieldAccess {
        receiver: Box<Expr>,
        name: String,
        name_span: Span,
    },
    ArrayAccess {
        array: Box<Expr>,
        index: Box<Expr>,
    },
    MethodCall {
        receiver: Option<Box<Expr>>,
        name: String,
        name_span: Span,
        args: Vec<Expr>,
    },
    This,
    /// Only valid as the receiver of a field access or method call.
    Super,
    New {
        ty: TypeRef,
        args: Vec<Expr>,
    },
    NewArray {
        elem: TypeRef,
        dims: Vec<Expr>,
        extra_dims: usize,
        init: Option<Box<Expr>>,
    },
    /// `{a, b}` in a variable initializer or after `new T[]`.
    ArrayInit(Vec<Expr>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `target = value` when `op` is `None`, otherwise the compound form `target op= value`.
    Assign {
        op: Option<BinaryOp>,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Conditional {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    Cast {
        ty: TypeRef,
        expr: Box<Expr>,
    },
    InstanceOf {
        expr: Box<Expr>,
        ty: TypeRef,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Plus,
    Minus,
    Not,
    BitNot,
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}

impl UnaryOp {
    pub fn is_increment(self) -> bool {
        matches!(
            self,
            UnaryOp::PreInc | UnaryOp::PreDec | UnaryOp::PostInc | UnaryOp::PostDec
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Shl,
    Shr,
    UShr,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitXor,
    BitOr,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::UShr => ">>>",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitXor => "^",
            BinaryOp::BitOr => "|",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }

    pub(crate) fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::BitOr => 3,
            BinaryOp::BitXor => 4,
            BinaryOp::BitAnd => 5,
            BinaryOp::Eq | BinaryOp::Ne => 6,
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => 7,
            BinaryOp::Shl | BinaryOp::Shr | BinaryOp::UShr => 8,
            BinaryOp::Add | BinaryOp::Sub => 9,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 10,
        }
    }
}
