use crate::analyzer::{Constant, PType, Primitive};
use crate::lexer::{Location, Token, TokenKind};

use super::{
    Assignment, BinOpKind, CompoundStmt, Decl, Expr, ExprKind, For, Function, If, Invocation,
    NodeId, Print, Program, Read, Return, Stmt, UnaryOpKind, Variable, VariableRef, While,
};

#[derive(thiserror::Error, Clone, Debug, PartialEq)]
pub enum ParseError {
    #[error("{loc}: expected {expected}, found {found}")]
    Unexpected {
        expected: String,
        found: String,
        loc: Location,
    },
    #[error("unexpected end of input, expected {expected}")]
    Eof { expected: String },
    #[error("{loc}: array dimension {value} is out of range")]
    DimensionOutOfRange { value: i64, loc: Location },
}

#[derive(Debug)]
pub struct Parser {
    tokens: Vec<Token>,
    index: usize,
    next_id: u32,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            index: 0,
            next_id: 0,
        }
    }

    pub fn parse(&mut self) -> Result<Program, ParseError> {
        self.parse_program()
    }

    fn is_eof(&self) -> bool {
        self.index >= self.tokens.len()
    }

    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.index).map(|t| &t.kind)
    }

    fn peek_nth(&self, n: usize) -> Option<&TokenKind> {
        self.tokens.get(self.index + n).map(|t| &t.kind)
    }

    fn loc(&self) -> Location {
        self.tokens
            .get(self.index)
            .or_else(|| self.tokens.last())
            .map(|t| t.loc)
            .unwrap_or_default()
    }

    fn new_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn unexpected(&self, expected: impl Into<String>) -> ParseError {
        let expected = expected.into();
        match self.tokens.get(self.index) {
            Some(t) => ParseError::Unexpected {
                expected,
                found: format!("{:?}", t.kind),
                loc: t.loc,
            },
            None => ParseError::Eof { expected },
        }
    }

    fn consume(&mut self, kind: &TokenKind) -> bool {
        if self.peek() != Some(kind) {
            return false;
        }
        self.index += 1;
        true
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<Location, ParseError> {
        let loc = self.loc();
        if !self.consume(kind) {
            return Err(self.unexpected(format!("{:?}", kind)));
        }
        Ok(loc)
    }

    fn expect_ident(&mut self) -> Result<(String, Location), ParseError> {
        let loc = self.loc();
        if let Some(TokenKind::Ident(name)) = self.peek() {
            let name = name.clone();
            self.index += 1;
            return Ok((name, loc));
        }
        Err(self.unexpected("identifier"))
    }

    fn expect_int(&mut self) -> Result<(i64, Location), ParseError> {
        let loc = self.loc();
        if let Some(TokenKind::IntLiteral(v)) = self.peek() {
            let v = *v;
            self.index += 1;
            return Ok((v, loc));
        }
        Err(self.unexpected("integer literal"))
    }

    /// program = "program"? ident ";" decl* function* compound "end"?
    fn parse_program(&mut self) -> Result<Program, ParseError> {
        self.consume(&TokenKind::Program);
        let (name, loc) = self.expect_ident()?;
        self.expect(&TokenKind::SemiColon)?;
        let id = self.new_id();

        let mut decls = vec![];
        while self.peek() == Some(&TokenKind::Var) {
            decls.push(self.parse_declaration()?);
        }

        let mut functions = vec![];
        while let Some(TokenKind::Ident(_)) = self.peek() {
            functions.push(self.parse_function()?);
        }

        let body = self.parse_compound()?;
        self.consume(&TokenKind::End);
        if !self.is_eof() {
            return Err(self.unexpected("end of input"));
        }

        Ok(Program {
            id,
            loc,
            name,
            decls,
            functions,
            body,
        })
    }

    /// ident_list = ident ("," ident)*
    fn parse_ident_list(&mut self) -> Result<Vec<(String, Location)>, ParseError> {
        let mut idents = vec![self.expect_ident()?];
        while self.consume(&TokenKind::Comma) {
            idents.push(self.expect_ident()?);
        }
        Ok(idents)
    }

    /// decl = "var" ident_list ":" (type | literal) ";"
    fn parse_declaration(&mut self) -> Result<Decl, ParseError> {
        let loc = self.expect(&TokenKind::Var)?;
        let idents = self.parse_ident_list()?;
        self.expect(&TokenKind::Colon)?;

        let (ty, constant) = match self.parse_literal_constant()? {
            Some(c) => (c.ty(), Some(c)),
            None => (self.parse_type()?, None),
        };
        self.expect(&TokenKind::SemiColon)?;

        let vars = idents
            .into_iter()
            .map(|(name, loc)| Variable {
                loc,
                name,
                ty: ty.clone(),
                constant: constant.clone(),
            })
            .collect();
        Ok(Decl { loc, vars })
    }

    /// literal = "-"? int | "-"? real | string | "true" | "false"
    fn parse_literal_constant(&mut self) -> Result<Option<Constant>, ParseError> {
        let negative = self.peek() == Some(&TokenKind::Minus)
            && matches!(
                self.peek_nth(1),
                Some(TokenKind::IntLiteral(_) | TokenKind::RealLiteral(_))
            );
        if negative {
            self.index += 1;
        }

        let constant = match self.peek() {
            Some(TokenKind::IntLiteral(v)) => Constant::Integer(*v),
            Some(TokenKind::RealLiteral(v)) => Constant::Real(*v),
            Some(TokenKind::StringLiteral(s)) => Constant::String(s.clone()),
            Some(TokenKind::True) => Constant::Boolean(true),
            Some(TokenKind::False) => Constant::Boolean(false),
            _ => return Ok(None),
        };
        self.index += 1;

        if negative {
            Ok(constant.negated())
        } else {
            Ok(Some(constant))
        }
    }

    /// scalar = "integer" | "real" | "string" | "boolean"
    fn parse_scalar_type(&mut self) -> Option<Primitive> {
        let primitive = match self.peek()? {
            TokenKind::Integer => Primitive::Integer,
            TokenKind::Real => Primitive::Real,
            TokenKind::String => Primitive::String,
            TokenKind::Boolean => Primitive::Boolean,
            _ => return None,
        };
        self.index += 1;
        Some(primitive)
    }

    /// type = scalar | "array" int "of" type
    fn parse_type(&mut self) -> Result<PType, ParseError> {
        let mut dims = vec![];
        while self.consume(&TokenKind::Array) {
            let (value, loc) = self.expect_int()?;
            let dim = u32::try_from(value)
                .map_err(|_| ParseError::DimensionOutOfRange { value, loc })?;
            dims.push(dim);
            self.expect(&TokenKind::Of)?;
        }

        match self.parse_scalar_type() {
            Some(primitive) => Ok(PType::array(primitive, dims)),
            None => Err(self.unexpected("type")),
        }
    }

    /// function = ident "(" (formal (";" formal)*)? ")" (":" scalar)? (";" | compound "end"?)
    fn parse_function(&mut self) -> Result<Function, ParseError> {
        let (name, loc) = self.expect_ident()?;
        let id = self.new_id();

        self.expect(&TokenKind::OpenParen)?;
        let mut params = vec![];
        if !self.consume(&TokenKind::CloseParen) {
            params.push(self.parse_formal()?);
            while self.consume(&TokenKind::SemiColon) {
                params.push(self.parse_formal()?);
            }
            self.expect(&TokenKind::CloseParen)?;
        }

        let return_type = if self.consume(&TokenKind::Colon) {
            match self.parse_scalar_type() {
                Some(primitive) => PType::new(primitive),
                None => return Err(self.unexpected("return type")),
            }
        } else {
            PType::void()
        };

        let body = if self.consume(&TokenKind::SemiColon) {
            None
        } else {
            let body = self.parse_compound()?;
            self.consume(&TokenKind::End);
            Some(body)
        };

        Ok(Function {
            id,
            loc,
            name,
            params,
            return_type,
            body,
        })
    }

    /// formal = ident_list ":" type
    fn parse_formal(&mut self) -> Result<Decl, ParseError> {
        let idents = self.parse_ident_list()?;
        self.expect(&TokenKind::Colon)?;
        let ty = self.parse_type()?;

        let loc = idents[0].1;
        let vars = idents
            .into_iter()
            .map(|(name, loc)| Variable {
                loc,
                name,
                ty: ty.clone(),
                constant: None,
            })
            .collect();
        Ok(Decl { loc, vars })
    }

    /// compound = "begin" decl* stmt* "end"
    fn parse_compound(&mut self) -> Result<CompoundStmt, ParseError> {
        let loc = self.expect(&TokenKind::Begin)?;
        let id = self.new_id();

        let mut decls = vec![];
        while self.peek() == Some(&TokenKind::Var) {
            decls.push(self.parse_declaration()?);
        }

        let mut stmts = vec![];
        while !self.consume(&TokenKind::End) {
            stmts.push(self.parse_stmt()?);
        }

        Ok(CompoundStmt {
            id,
            loc,
            decls,
            stmts,
        })
    }

    /// stmt = compound
    ///      | ref ":=" expr ";"
    ///      | "print" expr ";"
    ///      | "read" ref ";"
    ///      | "if" expr "then" compound ("else" compound)? "end" "if"
    ///      | "while" expr "do" compound "end" "do"
    ///      | "for" ident ":=" int "to" int "do" compound "end" "do"
    ///      | "return" expr ";"
    ///      | ident "(" args ")" ";"
    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        let loc = self.loc();
        match self.peek() {
            Some(TokenKind::Begin) => Ok(Stmt::Compound(self.parse_compound()?)),
            Some(TokenKind::Print) => {
                self.index += 1;
                let target = self.parse_expr()?;
                self.expect(&TokenKind::SemiColon)?;
                Ok(Stmt::Print(Print { loc, target }))
            }
            Some(TokenKind::Read) => {
                self.index += 1;
                let target = self.parse_variable_ref()?;
                self.expect(&TokenKind::SemiColon)?;
                Ok(Stmt::Read(Read { loc, target }))
            }
            Some(TokenKind::If) => self.parse_if(),
            Some(TokenKind::While) => self.parse_while(),
            Some(TokenKind::For) => self.parse_for(),
            Some(TokenKind::Return) => {
                self.index += 1;
                let value = self.parse_expr()?;
                self.expect(&TokenKind::SemiColon)?;
                Ok(Stmt::Return(Return { loc, value }))
            }
            Some(TokenKind::Ident(_)) if self.peek_nth(1) == Some(&TokenKind::OpenParen) => {
                let call = self.parse_primary()?;
                self.expect(&TokenKind::SemiColon)?;
                Ok(Stmt::Invocation(call))
            }
            Some(TokenKind::Ident(_)) => {
                let lhs = self.parse_variable_ref()?;
                let loc = self.expect(&TokenKind::Assign)?;
                let rhs = self.parse_expr()?;
                self.expect(&TokenKind::SemiColon)?;
                Ok(Stmt::Assignment(Assignment { loc, lhs, rhs }))
            }
            _ => Err(self.unexpected("statement")),
        }
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        let loc = self.expect(&TokenKind::If)?;
        let condition = self.parse_expr()?;
        self.expect(&TokenKind::Then)?;
        let body = self.parse_compound()?;
        let else_body = if self.consume(&TokenKind::Else) {
            Some(self.parse_compound()?)
        } else {
            None
        };
        self.expect(&TokenKind::End)?;
        self.expect(&TokenKind::If)?;

        Ok(Stmt::If(If {
            loc,
            condition,
            body,
            else_body,
        }))
    }

    fn parse_while(&mut self) -> Result<Stmt, ParseError> {
        let loc = self.expect(&TokenKind::While)?;
        let condition = self.parse_expr()?;
        self.expect(&TokenKind::Do)?;
        let body = self.parse_compound()?;
        self.expect(&TokenKind::End)?;
        self.expect(&TokenKind::Do)?;

        Ok(Stmt::While(While {
            loc,
            condition,
            body,
        }))
    }

    fn parse_for(&mut self) -> Result<Stmt, ParseError> {
        let loc = self.expect(&TokenKind::For)?;
        let id = self.new_id();
        let (name, name_loc) = self.expect_ident()?;
        let assign_loc = self.expect(&TokenKind::Assign)?;
        let (lower, lower_loc) = self.expect_int()?;
        self.expect(&TokenKind::To)?;
        let (upper, upper_loc) = self.expect_int()?;
        self.expect(&TokenKind::Do)?;
        let body = self.parse_compound()?;
        self.expect(&TokenKind::End)?;
        self.expect(&TokenKind::Do)?;

        let loop_var = Decl {
            loc: name_loc,
            vars: vec![Variable {
                loc: name_loc,
                name: name.clone(),
                ty: PType::integer(),
                constant: None,
            }],
        };
        let init = Assignment {
            loc: assign_loc,
            lhs: Expr::new(
                name_loc,
                ExprKind::VariableRef(VariableRef {
                    name,
                    indices: vec![],
                }),
            ),
            rhs: Expr::new(lower_loc, ExprKind::Constant(Constant::Integer(lower))),
        };
        let end = Expr::new(upper_loc, ExprKind::Constant(Constant::Integer(upper)));

        Ok(Stmt::For(For {
            id,
            loc,
            loop_var,
            init,
            end,
            body,
        }))
    }

    /// ref = ident ("[" expr "]")*
    fn parse_variable_ref(&mut self) -> Result<Expr, ParseError> {
        let (name, loc) = self.expect_ident()?;
        let mut indices = vec![];
        while self.consume(&TokenKind::OpenSquareBrace) {
            indices.push(self.parse_expr()?);
            self.expect(&TokenKind::CloseSquareBrace)?;
        }
        Ok(Expr::new(
            loc,
            ExprKind::VariableRef(VariableRef { name, indices }),
        ))
    }

    fn binary(op: BinOpKind, loc: Location, lhs: Expr, rhs: Expr) -> Expr {
        Expr::new(loc, ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)))
    }

    /// expr = and ("or" and)*
    pub fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_and()?;
        while self.peek() == Some(&TokenKind::Or) {
            let loc = self.loc();
            self.index += 1;
            let rhs = self.parse_and()?;
            lhs = Self::binary(BinOpKind::Or, loc, lhs, rhs);
        }
        Ok(lhs)
    }

    /// and = not ("and" not)*
    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_not()?;
        while self.peek() == Some(&TokenKind::And) {
            let loc = self.loc();
            self.index += 1;
            let rhs = self.parse_not()?;
            lhs = Self::binary(BinOpKind::And, loc, lhs, rhs);
        }
        Ok(lhs)
    }

    /// not = "not" not | relational
    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        if self.peek() == Some(&TokenKind::Not) {
            let loc = self.loc();
            self.index += 1;
            let operand = self.parse_not()?;
            return Ok(Expr::new(
                loc,
                ExprKind::Unary(UnaryOpKind::Not, Box::new(operand)),
            ));
        }
        self.parse_relational()
    }

    /// relational = additive (("<" | "<=" | "<>" | ">=" | ">" | "=") additive)?
    fn parse_relational(&mut self) -> Result<Expr, ParseError> {
        let lhs = self.parse_additive()?;
        let op = match self.peek() {
            Some(TokenKind::LessThan) => BinOpKind::LessThan,
            Some(TokenKind::LessEqual) => BinOpKind::LessEqual,
            Some(TokenKind::NotEqual) => BinOpKind::NotEqual,
            Some(TokenKind::GreaterEqual) => BinOpKind::GreaterEqual,
            Some(TokenKind::GreaterThan) => BinOpKind::GreaterThan,
            Some(TokenKind::Equal) => BinOpKind::Equal,
            _ => return Ok(lhs),
        };
        let loc = self.loc();
        self.index += 1;
        let rhs = self.parse_additive()?;
        Ok(Self::binary(op, loc, lhs, rhs))
    }

    /// additive = multiplicative (("+" | "-") multiplicative)*
    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(TokenKind::Plus) => BinOpKind::Add,
                Some(TokenKind::Minus) => BinOpKind::Sub,
                _ => return Ok(lhs),
            };
            let loc = self.loc();
            self.index += 1;
            let rhs = self.parse_multiplicative()?;
            lhs = Self::binary(op, loc, lhs, rhs);
        }
    }

    /// multiplicative = unary (("*" | "/" | "mod") unary)*
    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(TokenKind::Star) => BinOpKind::Mul,
                Some(TokenKind::Slash) => BinOpKind::Div,
                Some(TokenKind::Mod) => BinOpKind::Mod,
                _ => return Ok(lhs),
            };
            let loc = self.loc();
            self.index += 1;
            let rhs = self.parse_unary()?;
            lhs = Self::binary(op, loc, lhs, rhs);
        }
    }

    /// unary = "-" unary | primary
    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.peek() == Some(&TokenKind::Minus) {
            let loc = self.loc();
            self.index += 1;
            let operand = self.parse_unary()?;
            return Ok(Expr::new(
                loc,
                ExprKind::Unary(UnaryOpKind::Neg, Box::new(operand)),
            ));
        }
        self.parse_primary()
    }

    /// primary = "(" expr ")" | literal | ident "(" (expr ("," expr)*)? ")" | ref
    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let loc = self.loc();
        let constant = match self.peek() {
            Some(TokenKind::OpenParen) => {
                self.index += 1;
                let expr = self.parse_expr()?;
                self.expect(&TokenKind::CloseParen)?;
                return Ok(expr);
            }
            Some(TokenKind::IntLiteral(v)) => Constant::Integer(*v),
            Some(TokenKind::RealLiteral(v)) => Constant::Real(*v),
            Some(TokenKind::StringLiteral(s)) => Constant::String(s.clone()),
            Some(TokenKind::True) => Constant::Boolean(true),
            Some(TokenKind::False) => Constant::Boolean(false),
            Some(TokenKind::Ident(_)) if self.peek_nth(1) == Some(&TokenKind::OpenParen) => {
                let (name, loc) = self.expect_ident()?;
                self.expect(&TokenKind::OpenParen)?;
                let mut args = vec![];
                if !self.consume(&TokenKind::CloseParen) {
                    args.push(self.parse_expr()?);
                    while self.consume(&TokenKind::Comma) {
                        args.push(self.parse_expr()?);
                    }
                    self.expect(&TokenKind::CloseParen)?;
                }
                return Ok(Expr::new(
                    loc,
                    ExprKind::Invocation(Invocation { name, args }),
                ));
            }
            Some(TokenKind::Ident(_)) => return self.parse_variable_ref(),
            _ => return Err(self.unexpected("expression")),
        };
        self.index += 1;
        Ok(Expr::new(loc, ExprKind::Constant(constant)))
    }
}
