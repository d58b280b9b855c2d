use crate::analyzer::{Constant, PType};
use crate::lexer::Location;

use super::Expr;

/// Stable identity of a scoping node; keys the symbol tables captured during analysis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    pub id: NodeId,
    pub loc: Location,
    pub name: String,
    pub decls: Vec<Decl>,
    pub functions: Vec<Function>,
    pub body: CompoundStmt,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Function {
    pub id: NodeId,
    pub loc: Location,
    pub name: String,
    pub params: Vec<Decl>,
    pub return_type: PType,
    /// `None` for a bare declaration.
    pub body: Option<CompoundStmt>,
}

impl Function {
    pub fn param_types(&self) -> impl Iterator<Item = &PType> {
        self.params
            .iter()
            .flat_map(|d| d.vars.iter())
            .map(|v| &v.ty)
    }

    pub fn param_count(&self) -> usize {
        self.params.iter().map(|d| d.vars.len()).sum()
    }

    /// Parameter types joined by `", "`, the form stored as a function's attribute.
    pub fn signature(&self) -> String {
        self.param_types()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// `var a, b: integer;` or `var c: 10;`.
#[derive(Clone, Debug, PartialEq)]
pub struct Decl {
    pub loc: Location,
    pub vars: Vec<Variable>,
}

impl Decl {
    pub fn is_constant(&self) -> bool {
        self.vars.iter().any(|v| v.constant.is_some())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Variable {
    pub loc: Location,
    pub name: String,
    pub ty: PType,
    pub constant: Option<Constant>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompoundStmt {
    pub id: NodeId,
    pub loc: Location,
    pub decls: Vec<Decl>,
    pub stmts: Vec<Stmt>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    Compound(CompoundStmt),
    Assignment(Assignment),
    Print(Print),
    Read(Read),
    If(If),
    While(While),
    For(For),
    Return(Return),
    /// A function invocation whose result is discarded.
    Invocation(Expr),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Assignment {
    pub loc: Location,
    /// Always a variable reference.
    pub lhs: Expr,
    pub rhs: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Print {
    pub loc: Location,
    pub target: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Read {
    pub loc: Location,
    /// Always a variable reference.
    pub target: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct If {
    pub loc: Location,
    pub condition: Expr,
    pub body: CompoundStmt,
    pub else_body: Option<CompoundStmt>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct While {
    pub loc: Location,
    pub condition: Expr,
    pub body: CompoundStmt,
}

#[derive(Clone, Debug, PartialEq)]
pub struct For {
    pub id: NodeId,
    pub loc: Location,
    pub loop_var: Decl,
    pub init: Assignment,
    pub end: Expr,
    pub body: CompoundStmt,
}

impl For {
    pub fn loop_var_name(&self) -> Option<&str> {
        self.loop_var.vars.first().map(|v| v.name.as_str())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Return {
    pub loc: Location,
    pub value: Expr,
}
