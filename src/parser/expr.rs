use crate::analyzer::{Constant, PType};
use crate::lexer::Location;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOpKind {
    Or,
    And,
    LessThan,
    LessEqual,
    NotEqual,
    GreaterEqual,
    GreaterThan,
    Equal,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinOpKind {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOpKind::Or => "or",
            BinOpKind::And => "and",
            BinOpKind::LessThan => "<",
            BinOpKind::LessEqual => "<=",
            BinOpKind::NotEqual => "<>",
            BinOpKind::GreaterEqual => ">=",
            BinOpKind::GreaterThan => ">",
            BinOpKind::Equal => "=",
            BinOpKind::Add => "+",
            BinOpKind::Sub => "-",
            BinOpKind::Mul => "*",
            BinOpKind::Div => "/",
            BinOpKind::Mod => "mod",
        }
    }

    pub fn is_relational(&self) -> bool {
        matches!(
            self,
            BinOpKind::LessThan
                | BinOpKind::LessEqual
                | BinOpKind::NotEqual
                | BinOpKind::GreaterEqual
                | BinOpKind::GreaterThan
                | BinOpKind::Equal
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOpKind {
    Neg,
    Not,
}

impl UnaryOpKind {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOpKind::Neg => "neg",
            UnaryOpKind::Not => "not",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Invocation {
    pub name: String,
    pub args: Vec<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VariableRef {
    pub name: String,
    pub indices: Vec<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Binary(BinOpKind, Box<Expr>, Box<Expr>),
    Unary(UnaryOpKind, Box<Expr>),
    Invocation(Invocation),
    VariableRef(VariableRef),
    Constant(Constant),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub loc: Location,
    pub kind: ExprKind,
    ty: Option<PType>,
}

impl Expr {
    pub fn new(loc: Location, kind: ExprKind) -> Self {
        Self {
            loc,
            kind,
            ty: None,
        }
    }

    /// The type the analyzer resolved, or `None` if resolution failed and was reported.
    pub fn ty(&self) -> Option<&PType> {
        self.ty.as_ref()
    }

    /// Annotates the expression. The slot is write-once.
    pub fn set_ty(&mut self, ty: PType) {
        assert!(
            self.ty.is_none(),
            "expression at {} already annotated with {:?}",
            self.loc,
            self.ty
        );
        self.ty = Some(ty);
    }

    pub fn as_variable_ref(&self) -> Option<&VariableRef> {
        match &self.kind {
            ExprKind::VariableRef(v) => Some(v),
            _ => None,
        }
    }

    /// The value of an integer literal, looking through unary negation.
    pub fn as_integer_literal(&self) -> Option<i64> {
        match &self.kind {
            ExprKind::Constant(Constant::Integer(v)) => Some(*v),
            ExprKind::Unary(UnaryOpKind::Neg, e) => e.as_integer_literal().map(|v| -v),
            _ => None,
        }
    }
}
