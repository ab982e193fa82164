//! Abstract syntax tree
//!
//! Types in this module represent the pieces a translation unit of the C
//! subset can contain. Naming loosely follows C11 grammar conventions.
//!
//! Every node owns its children outright: dropping a [`Program`] drops the
//! whole tree exactly once. Expression payloads carry an optional resolved
//! type that the semantic pass fills in; the parser leaves it `None`.

use crate::ty::{StorageClass, TypeInfo};

/// One translation unit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub decls: Vec<ExternalDecl>,
}

/// Top-level declarations (C11 6.9).
#[derive(Debug, Clone, PartialEq)]
pub enum ExternalDecl {
    Function(Box<FunctionDef>),
    Declaration(Box<Declaration>),
    Array(Box<ArrayDecl>),
    Struct(Box<RecordDecl>),
    Union(Box<RecordDecl>),
    Enum(Box<EnumDecl>),
    Typedef(Box<TypedefDecl>),
}

/// Function definition or prototype; a prototype has no body.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub return_type: TypeInfo,
    pub params: Vec<ParamDecl>,
    pub variadic: bool,
    pub storage: StorageClass,
    pub body: Option<Stmt>,
}

impl FunctionDef {
    pub fn is_defined(&self) -> bool {
        self.body.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamDecl {
    pub ty: TypeInfo,
    pub name: String,
}

/// Scalar or pointer variable declaration with an optional initializer.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub ty: TypeInfo,
    pub name: String,
    pub init: Option<Expr>,
}

/// Array declaration. The element type is `ty` with `is_array` set; `size`
/// is duplicated here so the emitter does not have to dig it out of the
/// descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayDecl {
    pub ty: TypeInfo,
    pub name: String,
    pub size: Option<Expr>,
    pub is_vla: bool,
}

/// Struct or union declaration (C11 6.7.2.1); the two share a shape and
/// differ only in layout.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordDecl {
    pub name: String,
    pub members: Vec<MemberDecl>,
    pub is_definition: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberDecl {
    pub name: String,
    pub ty: TypeInfo,
}

/// Enum declaration (C11 6.7.2.2).
#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub name: String,
    pub values: Vec<EnumValueDecl>,
    pub is_definition: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumValueDecl {
    pub name: String,
    pub value: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypedefDecl {
    pub ty: TypeInfo,
    pub name: String,
}

/// Statements (C11 6.8).
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Compound(Vec<Stmt>),
    Declaration(Box<Declaration>),
    Array(Box<ArrayDecl>),
    Struct(Box<RecordDecl>),
    Union(Box<RecordDecl>),
    Enum(Box<EnumDecl>),
    Typedef(Box<TypedefDecl>),
    If(Box<IfStmt>),
    While(Box<WhileStmt>),
    DoWhile(Box<DoWhileStmt>),
    For(Box<ForStmt>),
    Switch(Box<SwitchStmt>),
    Case(Box<CaseStmt>),
    Default(Box<DefaultStmt>),
    Break,
    Continue,
    Goto(String),
    Label(Box<LabelStmt>),
    Return(Option<Expr>),
    Expr(Expr),
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub condition: Expr,
    pub then_stmt: Stmt,
    pub else_stmt: Option<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhileStmt {
    pub condition: Expr,
    pub body: Stmt,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DoWhileStmt {
    pub body: Stmt,
    pub condition: Expr,
}

/// `for (init; condition; update) body`; the init clause runs in its own
/// scope that also encloses the condition, update and body.
#[derive(Debug, Clone, PartialEq)]
pub struct ForStmt {
    pub init: Option<Stmt>,
    pub condition: Option<Expr>,
    pub update: Option<Expr>,
    pub body: Stmt,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchStmt {
    pub expression: Expr,
    pub body: Stmt,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseStmt {
    pub value: Expr,
    pub statement: Stmt,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DefaultStmt {
    pub statement: Stmt,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelStmt {
    pub label: String,
    pub statement: Stmt,
}

/// Expressions (C11 6.5).
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Integer constant. Character constants are a separate variant so the
    /// emitter can tell the two literal kinds apart.
    Number(i64),
    Character(u8),
    StringLiteral(String),
    Identifier(Box<IdentifierExpr>),
    Call(Box<CallExpr>),
    Binary(Box<BinaryExpr>),
    Unary(Box<UnaryExpr>),
    Assign(Box<AssignExpr>),
    Conditional(Box<ConditionalExpr>),
    Cast(Box<CastExpr>),
    Sizeof(Box<SizeofExpr>),
    AddressOf(Box<AddressOfExpr>),
    Dereference(Box<DerefExpr>),
    /// `base[index]`
    Index(Box<IndexExpr>),
    /// Both `.` and `->` access; see [`MemberOperator`].
    Member(Box<MemberExpr>),
    InitializerList(Vec<Expr>),
}

impl Expr {
    /// Whether this node is a literal the emitter prints inline instead of
    /// materializing a temporary.
    pub fn is_literal(&self) -> bool {
        matches!(self, Expr::Number(_) | Expr::Character(_))
    }

    /// Fold a constant expression down to an integer, if it is one.
    ///
    /// Used for enum values, fixed array lengths and global initializers;
    /// anything it cannot fold is by definition not a compile-time
    /// constant in this subset.
    pub fn const_value(&self) -> Option<i64> {
        match self {
            Expr::Number(n) => Some(*n),
            Expr::Character(c) => Some(i64::from(*c)),
            Expr::Cast(cast) => cast.expression.const_value(),
            Expr::Unary(unary) => {
                let v = unary.operand.const_value()?;
                match unary.op {
                    UnaryOp::Minus => Some(-v),
                    UnaryOp::Complement => Some(!v),
                    UnaryOp::Negate => Some(i64::from(v == 0)),
                    _ => None,
                }
            }
            Expr::Binary(binary) => {
                let l = binary.lhs.const_value()?;
                let r = binary.rhs.const_value()?;
                use BinaryOp::*;
                match binary.op {
                    Add => Some(l.wrapping_add(r)),
                    Sub => Some(l.wrapping_sub(r)),
                    Mul => Some(l.wrapping_mul(r)),
                    Div if r != 0 => Some(l / r),
                    Mod if r != 0 => Some(l % r),
                    BitAnd => Some(l & r),
                    BitOr => Some(l | r),
                    BitXor => Some(l ^ r),
                    Shl => Some(l << (r & 63)),
                    Shr => Some(l >> (r & 63)),
                    Eq => Some(i64::from(l == r)),
                    Ne => Some(i64::from(l != r)),
                    Lt => Some(i64::from(l < r)),
                    Le => Some(i64::from(l <= r)),
                    Gt => Some(i64::from(l > r)),
                    Ge => Some(i64::from(l >= r)),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IdentifierExpr {
    pub name: String,
    pub ty: Option<TypeInfo>,
}

impl IdentifierExpr {
    pub fn new(name: &str) -> Self {
        IdentifierExpr {
            name: name.to_string(),
            ty: None,
        }
    }
}

/// Direct call through a function name; the subset has no function
/// pointers, so the callee is always an identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct CallExpr {
    pub name: String,
    pub args: Vec<Expr>,
    pub ty: Option<TypeInfo>,
}

/// All operators with two operands (C11 6.5.5 -- 6.5.14).
///
/// Compound assignment is *not* here: `a += b` is an [`AssignExpr`]
/// carrying `Some(BinaryOp::Add)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LogicalAnd,
    LogicalOr,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        use BinaryOp::*;
        matches!(self, Eq | Ne | Lt | Le | Gt | Ge)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::LogicalAnd | BinaryOp::LogicalOr)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpr {
    pub op: BinaryOp,
    pub lhs: Expr,
    pub rhs: Expr,
    pub ty: Option<TypeInfo>,
}

/// All operators with one operand, prefix and postfix (C11 6.5.2, 6.5.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `-operand`
    Minus,
    /// `!operand`
    Negate,
    /// `~operand`
    Complement,
    /// `++operand`
    PreIncrement,
    /// `operand++`
    PostIncrement,
    /// `--operand`
    PreDecrement,
    /// `operand--`
    PostDecrement,
}

impl UnaryOp {
    pub fn is_increment(self) -> bool {
        use UnaryOp::*;
        matches!(
            self,
            PreIncrement | PostIncrement | PreDecrement | PostDecrement
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnaryExpr {
    pub op: UnaryOp,
    pub operand: Expr,
    pub ty: Option<TypeInfo>,
}

/// Assignment target: either a plain name or a full lvalue expression
/// (array element, dereference, member access).
#[derive(Debug, Clone, PartialEq)]
pub enum AssignTarget {
    Name(String),
    Lvalue(Expr),
}

/// Simple or compound assignment; `op` is the folded-in operator for the
/// compound forms.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignExpr {
    pub target: AssignTarget,
    pub op: Option<BinaryOp>,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalExpr {
    pub condition: Expr,
    pub then_expr: Expr,
    pub else_expr: Expr,
    pub ty: Option<TypeInfo>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CastExpr {
    pub target: TypeInfo,
    pub expression: Expr,
}

/// `sizeof expr` or `sizeof(type)`. The semantic pass records the computed
/// byte size so the emitter can substitute the constant.
#[derive(Debug, Clone, PartialEq)]
pub struct SizeofExpr {
    pub arg: SizeofArg,
    pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SizeofArg {
    Expr(Expr),
    Type(TypeInfo),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AddressOfExpr {
    pub operand: Expr,
    pub ty: Option<TypeInfo>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DerefExpr {
    pub operand: Expr,
    pub ty: Option<TypeInfo>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexExpr {
    pub base: Expr,
    pub index: Expr,
    /// Element type, filled by the semantic pass.
    pub ty: Option<TypeInfo>,
}

/// Struct or union member access, both direct (`.`) and indirect (`->`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberOperator {
    /// `expression.identifier`
    Direct,
    /// `expression->identifier`
    Indirect,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberExpr {
    pub operator: MemberOperator,
    pub object: Expr,
    pub member: String,
    /// Member type, filled by the semantic pass.
    pub ty: Option<TypeInfo>,
}
