use log::{debug, trace};

use crate::lexer::Location;
use crate::parser::{
    Assignment, BinOpKind, CompoundStmt, Decl, Expr, ExprKind, For, Function, If, Invocation,
    NodeId, Print, Program, Read, Stmt, UnaryOpKind, Variable, VariableRef, While,
};

use super::{
    Attribute, CapturedScopes, Diagnostic, PType, Primitive, SemanticError, SymbolEntry,
    SymbolKind, SymbolManager,
};

/// Everything the analysis pass hands to later stages.
#[derive(Debug, Default)]
pub struct Analysis {
    pub scopes: CapturedScopes,
    pub diagnostics: Vec<Diagnostic>,
    pub table_dump: String,
}

impl Analysis {
    pub fn has_error(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

/// What a declared variable becomes in the symbol table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DeclKind {
    Variable,
    Constant,
    Parameter,
    LoopVar,
}

impl DeclKind {
    fn of(decl: &Decl) -> Self {
        if decl.is_constant() {
            DeclKind::Constant
        } else {
            DeclKind::Variable
        }
    }

    fn symbol_kind(self) -> SymbolKind {
        match self {
            DeclKind::Variable => SymbolKind::Variable,
            DeclKind::Constant => SymbolKind::Constant,
            DeclKind::Parameter => SymbolKind::Parameter,
            DeclKind::LoopVar => SymbolKind::LoopVar,
        }
    }
}

pub struct SemanticVisitor {
    symbols: SymbolManager,
    scopes: CapturedScopes,
    diagnostics: Vec<Diagnostic>,
    table_dump: String,
    dump_table: bool,
}

impl SemanticVisitor {
    pub fn new(dump_table: bool) -> Self {
        Self {
            symbols: SymbolManager::new(),
            scopes: CapturedScopes::new(),
            diagnostics: vec![],
            table_dump: String::new(),
            dump_table,
        }
    }

    fn error(&mut self, loc: Location, error: SemanticError) {
        trace!("{}: {}", loc, error);
        self.diagnostics.push(Diagnostic::new(loc, error));
    }

    fn declare(&mut self, entry: SymbolEntry) -> Option<&mut SymbolEntry> {
        self.symbols.current_mut().map(|t| t.insert(entry))
    }

    fn close_scope(&mut self, id: NodeId) {
        if let Some(table) = self.symbols.pop_scope() {
            if self.dump_table {
                self.table_dump.push_str(&table.dump());
            }
            self.scopes.insert(id, table);
        }
    }

    pub fn visit_program(mut self, program: &mut Program) -> Analysis {
        debug!("analyzing program '{}'", program.name);
        self.symbols.push_scope();
        let level = self.symbols.level();
        self.declare(SymbolEntry::new(
            &program.name,
            program.loc,
            SymbolKind::Program,
            level,
            PType::void(),
        ));

        for decl in &program.decls {
            self.visit_decl(decl, DeclKind::of(decl));
        }
        for function in program.functions.iter_mut() {
            self.visit_function(function);
        }
        self.visit_compound(&mut program.body, true);

        for stmt in &program.body.stmts {
            if let Stmt::Return(r) = stmt {
                if r.value.ty().is_some() {
                    self.error(r.loc, SemanticError::ReturnFromVoid);
                }
            }
        }
        self.close_scope(program.id);

        Analysis {
            scopes: self.scopes,
            diagnostics: self.diagnostics,
            table_dump: self.table_dump,
        }
    }

    fn visit_decl(&mut self, decl: &Decl, kind: DeclKind) {
        for var in &decl.vars {
            self.visit_variable(var, kind);
        }
    }

    fn visit_variable(&mut self, var: &Variable, kind: DeclKind) {
        if self.symbols.lookup_local(&var.name).is_some() {
            self.error(var.loc, SemanticError::Redeclared(var.name.clone()));
            return;
        }
        // Loop variables cannot be shadowed from inside their loop.
        if let Some(SymbolKind::LoopVar) = self.symbols.lookup_decl(&var.name).map(|e| e.kind) {
            self.error(var.loc, SemanticError::Redeclared(var.name.clone()));
            return;
        }

        let level = self.symbols.level();
        let mut entry = SymbolEntry::new(
            &var.name,
            var.loc,
            kind.symbol_kind(),
            level,
            var.ty.clone(),
        );
        if let Some(c) = &var.constant {
            entry = entry.with_attribute(Attribute::Constant(c.clone()));
        }

        let valid = var.ty.has_valid_dims();
        entry.invalid = !valid;
        self.declare(entry);
        if !valid {
            self.error(var.loc, SemanticError::NonPositiveDimension(var.name.clone()));
        }
    }

    fn visit_function(&mut self, function: &mut Function) {
        debug!("analyzing function '{}'", function.name);
        let level = self.symbols.level();
        let redeclared = match self.symbols.lookup_decl(&function.name) {
            Some(e) => !(e.level == 0 && level != 0),
            None => false,
        };
        if redeclared {
            self.error(
                function.loc,
                SemanticError::Redeclared(function.name.clone()),
            );
        } else {
            let entry = SymbolEntry::new(
                &function.name,
                function.loc,
                SymbolKind::Function,
                level,
                function.return_type.clone(),
            )
            .with_attribute(Attribute::Signature(function.signature()));
            self.declare(entry);
        }

        // Parameters and the body's own declarations share one scope.
        self.symbols.push_scope();
        for param in &function.params {
            self.visit_decl(param, DeclKind::Parameter);
        }
        if let Some(body) = function.body.as_mut() {
            self.visit_compound(body, false);
            self.check_returns(body, &function.return_type);
        }
        self.close_scope(function.id);
    }

    fn check_returns(&mut self, body: &CompoundStmt, return_type: &PType) {
        for stmt in &body.stmts {
            let Stmt::Return(r) = stmt else { continue };
            let Some(ty) = r.value.ty() else { continue };

            if return_type.is_void() {
                self.error(r.loc, SemanticError::ReturnFromVoid);
            } else if !ty.is_compatible_with(return_type) {
                self.error(
                    r.value.loc,
                    SemanticError::IncompatibleReturn {
                        expected: return_type.clone(),
                        found: ty.clone(),
                    },
                );
            }
        }
    }

    fn visit_compound(&mut self, compound: &mut CompoundStmt, opens_scope: bool) {
        if opens_scope {
            self.symbols.push_scope();
        }
        for decl in &compound.decls {
            self.visit_decl(decl, DeclKind::of(decl));
        }
        for stmt in compound.stmts.iter_mut() {
            self.visit_stmt(stmt);
        }
        if opens_scope {
            self.close_scope(compound.id);
        }
    }

    fn visit_stmt(&mut self, stmt: &mut Stmt) {
        match stmt {
            Stmt::Compound(c) => self.visit_compound(c, true),
            Stmt::Assignment(a) => self.visit_assignment(a, false),
            Stmt::Print(p) => self.visit_print(p),
            Stmt::Read(r) => self.visit_read(r),
            Stmt::If(i) => self.visit_if(i),
            Stmt::While(w) => self.visit_while(w),
            Stmt::For(f) => self.visit_for(f),
            Stmt::Return(r) => self.visit_expr(&mut r.value),
            Stmt::Invocation(e) => self.visit_expr(e),
        }
    }

    /// `loop_init` permits the single write a for loop makes to its own variable.
    fn visit_assignment(&mut self, assignment: &mut Assignment, loop_init: bool) {
        self.visit_expr(&mut assignment.lhs);
        self.visit_expr(&mut assignment.rhs);

        if let Some(r) = assignment.lhs.as_variable_ref() {
            match self.symbols.lookup_decl(&r.name).map(|e| e.kind) {
                Some(SymbolKind::Constant) => {
                    let name = r.name.clone();
                    self.error(assignment.lhs.loc, SemanticError::AssignToConstant(name));
                    return;
                }
                Some(SymbolKind::LoopVar) if !loop_init => {
                    self.error(assignment.lhs.loc, SemanticError::AssignToLoopVar);
                    return;
                }
                _ => (),
            }
        }

        let (Some(target), Some(value)) = (assignment.lhs.ty(), assignment.rhs.ty()) else {
            return;
        };
        if !target.is_scalar() {
            self.error(assignment.lhs.loc, SemanticError::ArrayAssignment);
        } else if !value.is_scalar() {
            self.error(assignment.rhs.loc, SemanticError::ArrayAssignment);
        } else if !value.is_compatible_with(target) {
            let error = SemanticError::IncompatibleAssignment {
                target: target.clone(),
                found: value.clone(),
            };
            self.error(assignment.loc, error);
        }
    }

    fn visit_print(&mut self, print: &mut Print) {
        self.visit_expr(&mut print.target);
        let Some(ty) = print.target.ty() else { return };
        if ty.is_void() || !ty.is_scalar() {
            self.error(print.target.loc, SemanticError::PrintNonScalar);
        }
    }

    fn visit_read(&mut self, read: &mut Read) {
        self.visit_expr(&mut read.target);
        let Some(ty) = read.target.ty() else { return };
        if !ty.is_scalar() {
            self.error(read.target.loc, SemanticError::ReadNonScalar);
            return;
        }

        let kind = read
            .target
            .as_variable_ref()
            .and_then(|r| self.symbols.lookup_decl(&r.name))
            .map(|e| e.kind);
        if let Some(SymbolKind::Constant | SymbolKind::LoopVar) = kind {
            self.error(read.target.loc, SemanticError::ReadConstantOrLoopVar);
        }
    }

    fn visit_if(&mut self, stmt: &mut If) {
        self.visit_expr(&mut stmt.condition);
        self.visit_compound(&mut stmt.body, true);
        if let Some(else_body) = stmt.else_body.as_mut() {
            self.visit_compound(else_body, true);
        }

        if let Some(ty) = stmt.condition.ty() {
            if !ty.is_scalar_of(Primitive::Boolean) {
                self.error(stmt.condition.loc, SemanticError::NonBooleanCondition);
            }
        }
    }

    // The condition type of a while loop is not checked.
    fn visit_while(&mut self, stmt: &mut While) {
        self.visit_expr(&mut stmt.condition);
        self.visit_compound(&mut stmt.body, true);
    }

    fn visit_for(&mut self, stmt: &mut For) {
        self.symbols.push_scope();
        self.visit_decl(&stmt.loop_var, DeclKind::LoopVar);
        self.visit_assignment(&mut stmt.init, true);
        self.visit_expr(&mut stmt.end);

        // Only literal bounds are compared.
        let lower = stmt.init.rhs.as_integer_literal();
        let upper = stmt.end.as_integer_literal();
        if let (Some(lower), Some(upper)) = (lower, upper) {
            if upper < lower {
                self.error(stmt.loc, SemanticError::NonIncrementalLoop);
            }
        }

        self.visit_compound(&mut stmt.body, true);
        self.close_scope(stmt.id);
    }

    /// Resolves the type of `expr` bottom-up. A subexpression left without a
    /// type has already been reported and silences checks above it.
    fn visit_expr(&mut self, expr: &mut Expr) {
        let loc = expr.loc;
        let ty = match &mut expr.kind {
            ExprKind::Binary(op, lhs, rhs) => {
                self.visit_expr(lhs);
                self.visit_expr(rhs);
                self.binary_type(*op, loc, lhs.ty(), rhs.ty())
            }
            ExprKind::Unary(op, operand) => {
                self.visit_expr(operand);
                self.unary_type(*op, loc, operand.ty())
            }
            ExprKind::Invocation(invocation) => self.visit_invocation(invocation, loc),
            ExprKind::VariableRef(r) => self.visit_variable_ref(r, loc),
            ExprKind::Constant(c) => Some(c.ty()),
        };
        if let Some(ty) = ty {
            expr.set_ty(ty);
        }
    }

    fn binary_type(
        &mut self,
        op: BinOpKind,
        loc: Location,
        lhs: Option<&PType>,
        rhs: Option<&PType>,
    ) -> Option<PType> {
        let (lhs, rhs) = (lhs?, rhs?);
        let both = |p: Primitive| lhs.is_scalar_of(p) && rhs.is_scalar_of(p);
        let numeric = lhs.is_numeric() && rhs.is_numeric();
        let widened = || {
            if lhs.primitive() == Primitive::Real || rhs.primitive() == Primitive::Real {
                PType::real()
            } else {
                PType::integer()
            }
        };

        let ty = match op {
            BinOpKind::Add if both(Primitive::String) => Some(PType::string()),
            BinOpKind::Add | BinOpKind::Sub | BinOpKind::Mul | BinOpKind::Div if numeric => {
                Some(widened())
            }
            BinOpKind::Mod if both(Primitive::Integer) => Some(PType::integer()),
            BinOpKind::And | BinOpKind::Or if both(Primitive::Boolean) => Some(PType::boolean()),
            op if op.is_relational() && numeric => Some(PType::boolean()),
            _ => None,
        };

        if ty.is_none() {
            let error = SemanticError::InvalidBinaryOperand {
                op: op.symbol(),
                lhs: lhs.clone(),
                rhs: rhs.clone(),
            };
            self.error(loc, error);
        }
        ty
    }

    fn unary_type(
        &mut self,
        op: UnaryOpKind,
        loc: Location,
        operand: Option<&PType>,
    ) -> Option<PType> {
        let operand = operand?;
        let ty = match op {
            UnaryOpKind::Not if operand.is_scalar_of(Primitive::Boolean) => Some(PType::boolean()),
            UnaryOpKind::Neg if operand.is_numeric() => Some(operand.clone()),
            _ => None,
        };

        if ty.is_none() {
            let error = SemanticError::InvalidUnaryOperand {
                op: op.symbol(),
                operand: operand.clone(),
            };
            self.error(loc, error);
        }
        ty
    }

    fn visit_invocation(&mut self, invocation: &mut Invocation, loc: Location) -> Option<PType> {
        for arg in invocation.args.iter_mut() {
            self.visit_expr(arg);
        }

        let Some(entry) = self.symbols.lookup_decl(&invocation.name).cloned() else {
            self.error(loc, SemanticError::Undeclared(invocation.name.clone()));
            return None;
        };
        if entry.kind != SymbolKind::Function {
            self.error(loc, SemanticError::NonFunction(invocation.name.clone()));
            return None;
        }

        let params = entry.param_types().ok()?;
        if params.len() != invocation.args.len() {
            self.error(
                loc,
                SemanticError::ArgumentCountMismatch(invocation.name.clone()),
            );
            return None;
        }

        for (arg, param) in invocation.args.iter().zip(params) {
            let found = arg.ty()?;
            if !found.is_compatible_with(&param) {
                let error = SemanticError::IncompatibleArgument {
                    expected: param,
                    found: found.clone(),
                };
                self.error(arg.loc, error);
                return None;
            }
        }

        Some(entry.ty)
    }

    fn visit_variable_ref(&mut self, r: &mut VariableRef, loc: Location) -> Option<PType> {
        for index in r.indices.iter_mut() {
            self.visit_expr(index);
        }

        let Some(entry) = self.symbols.lookup_decl(&r.name).cloned() else {
            self.error(loc, SemanticError::Undeclared(r.name.clone()));
            return None;
        };
        if entry.kind == SymbolKind::Function {
            self.error(loc, SemanticError::NonVariable(r.name.clone()));
            return None;
        }
        if entry.invalid {
            return None;
        }

        for index in &r.indices {
            if !index.ty()?.is_scalar_of(Primitive::Integer) {
                self.error(index.loc, SemanticError::NonIntegerIndex);
                return None;
            }
        }

        let ty = entry.ty.strip_dims(r.indices.len());
        if ty.is_none() {
            self.error(loc, SemanticError::OverArraySubscript(r.name.clone()));
        }
        ty
    }
}
