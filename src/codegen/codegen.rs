use log::debug;

use crate::{
    analyzer::{CapturedScopes, PType, Primitive, SymbolManager},
    parser::{
        Assignment, BinOpKind, CompoundStmt, Decl, Expr, ExprKind, For, Function, If, Invocation,
        NodeId, Program, Stmt, UnaryOpKind, While,
    },
};

const FRAME_SIZE: i32 = 128;
/// Below the saved `ra` and `s0`.
const FIRST_SLOT_OFFSET: i32 = -12;
const ARGUMENT_REGISTERS: usize = 8;
const MAX_ARGUMENTS: usize = 13;

#[derive(thiserror::Error, Clone, Debug, PartialEq)]
pub enum CodegenError {
    #[error("no captured scope for node {0:?}")]
    MissingScope(NodeId),
    #[error("unresolved symbol '{0}'")]
    UnresolvedSymbol(String),
    #[error("locals of '{0}' do not fit in a 128-byte frame")]
    FrameOverflow(String),
    #[error("'{name}' takes {count} arguments, at most 13 are supported")]
    TooManyArguments { name: String, count: usize },
    #[error("{0} has no 32-bit integer lowering")]
    Unsupported(String),
}

/// Whether a variable reference pushes its address or its value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RefMode {
    Address,
    Value,
}

macro_rules! emit {
    ($self:ident, $($arg:tt)*) => {{
        $self.out.push_str(&format!($($arg)*));
        $self.out.push('\n');
    }};
}

fn is_word(ty: &PType) -> bool {
    ty.is_scalar() && matches!(ty.primitive(), Primitive::Integer | Primitive::Boolean)
}

fn check_word(ty: &PType, what: impl FnOnce() -> String) -> Result<(), CodegenError> {
    if is_word(ty) {
        Ok(())
    } else {
        Err(CodegenError::Unsupported(format!("{} of type '{}'", what(), ty)))
    }
}

fn argument_register(index: usize) -> String {
    if index < ARGUMENT_REGISTERS {
        format!("a{}", index)
    } else {
        format!("t{}", index - ARGUMENT_REGISTERS + 2)
    }
}

/// The branch taken when the comparison `op` is false.
fn inverse_branch(op: BinOpKind) -> Option<&'static str> {
    match op {
        BinOpKind::Equal => Some("bne"),
        BinOpKind::NotEqual => Some("beq"),
        BinOpKind::LessThan => Some("bge"),
        BinOpKind::GreaterThan => Some("ble"),
        BinOpKind::LessEqual => Some("bgt"),
        BinOpKind::GreaterEqual => Some("blt"),
        _ => None,
    }
}

/// Lowers an analyzed program to RISC-V assembly for a 32-bit stack machine.
///
/// Every expression leaves exactly one word on the stack and every statement
/// leaves the stack as it found it.
pub struct Codegen {
    scopes: CapturedScopes,
    symbols: SymbolManager,
    source_name: String,
    out: String,
    label_index: usize,
    frame_offset: i32,
    frame_name: String,
}

impl Codegen {
    pub fn new(scopes: CapturedScopes, source_name: &str) -> Self {
        Self {
            scopes,
            symbols: SymbolManager::new(),
            source_name: source_name.to_string(),
            out: String::new(),
            label_index: 1,
            frame_offset: 0,
            frame_name: String::new(),
        }
    }

    pub fn generate(mut self, program: &Program) -> Result<String, CodegenError> {
        self.gen_program(program)?;
        Ok(self.out)
    }

    fn new_label(&mut self) -> String {
        let s = format!("L{}", self.label_index);
        self.label_index += 1;
        s
    }

    fn push_t0(&mut self) {
        emit!(self, "    addi sp, sp, -4");
        emit!(self, "    sw t0, 0(sp)");
    }

    fn pop(&mut self, reg: &str) {
        emit!(self, "    lw {}, 0(sp)", reg);
        emit!(self, "    addi sp, sp, 4");
    }

    fn prologue(&mut self, name: &str) {
        emit!(self, "");
        emit!(self, ".section    .text");
        emit!(self, "    .align 2");
        emit!(self, "    .globl {}", name);
        emit!(self, "    .type {}, @function", name);
        emit!(self, "{}:", name);
        emit!(self, "    addi sp, sp, -{}", FRAME_SIZE);
        emit!(self, "    sw ra, {}(sp)", FRAME_SIZE - 4);
        emit!(self, "    sw s0, {}(sp)", FRAME_SIZE - 8);
        emit!(self, "    addi s0, sp, {}", FRAME_SIZE);

        self.frame_name = name.to_string();
        self.frame_offset = FIRST_SLOT_OFFSET + 4;
    }

    fn epilogue(&mut self) {
        emit!(self, "    lw ra, {}(sp)", FRAME_SIZE - 4);
        emit!(self, "    lw s0, {}(sp)", FRAME_SIZE - 8);
        emit!(self, "    addi sp, sp, {}", FRAME_SIZE);
        emit!(self, "    jr ra");
    }

    fn enter_scope(&mut self, id: NodeId) -> Result<(), CodegenError> {
        let table = self.scopes.take(id).ok_or(CodegenError::MissingScope(id))?;
        self.symbols.push_table(table);
        Ok(())
    }

    fn exit_scope(&mut self) {
        self.symbols.pop_scope();
    }

    /// Assigns the next frame slot to `name` in the innermost scope.
    fn alloc_slot(&mut self, name: &str) -> Result<i32, CodegenError> {
        self.frame_offset -= 4;
        if self.frame_offset < -FRAME_SIZE {
            return Err(CodegenError::FrameOverflow(self.frame_name.clone()));
        }
        let offset = self.frame_offset;
        let entry = self
            .symbols
            .lookup_local_mut(name)
            .ok_or_else(|| CodegenError::UnresolvedSymbol(name.to_string()))?;
        entry.offset = Some(offset);
        Ok(offset)
    }

    fn gen_program(&mut self, program: &Program) -> Result<(), CodegenError> {
        emit!(self, "    .file \"{}\"", self.source_name);
        emit!(self, "    .option nopic");

        self.enter_scope(program.id)?;
        for decl in &program.decls {
            self.gen_global_decl(decl)?;
        }
        for function in &program.functions {
            self.gen_function(function)?;
        }

        debug!("lowering program body as 'main'");
        self.prologue("main");
        self.gen_compound(&program.body, true)?;
        self.epilogue();
        emit!(self, "    .size main, .-main");
        self.exit_scope();
        Ok(())
    }

    fn gen_global_decl(&mut self, decl: &Decl) -> Result<(), CodegenError> {
        for var in &decl.vars {
            check_word(&var.ty, || format!("global '{}'", var.name))?;
            match var.constant.as_ref().and_then(|c| c.asm_value()) {
                Some(value) => {
                    emit!(self, ".section    .rodata");
                    emit!(self, "    .align 2");
                    emit!(self, "    .globl {}", var.name);
                    emit!(self, "    .type {}, @object", var.name);
                    emit!(self, "{}:", var.name);
                    emit!(self, "    .word {}", value);
                }
                None => emit!(self, ".comm {}, 4, 4", var.name),
            }
        }
        Ok(())
    }

    fn gen_local_decl(&mut self, decl: &Decl) -> Result<(), CodegenError> {
        for var in &decl.vars {
            check_word(&var.ty, || format!("local '{}'", var.name))?;
            let offset = self.alloc_slot(&var.name)?;
            if let Some(value) = var.constant.as_ref().and_then(|c| c.asm_value()) {
                emit!(self, "    li t0, {}", value);
                emit!(self, "    sw t0, {}(s0)", offset);
            }
        }
        Ok(())
    }

    fn gen_function(&mut self, function: &Function) -> Result<(), CodegenError> {
        self.enter_scope(function.id)?;
        let Some(body) = &function.body else {
            self.exit_scope();
            return Ok(());
        };
        debug!("lowering function '{}'", function.name);

        let count = function.param_count();
        if count > MAX_ARGUMENTS {
            return Err(CodegenError::TooManyArguments {
                name: function.name.clone(),
                count,
            });
        }

        self.prologue(&function.name);
        let params = function.params.iter().flat_map(|d| d.vars.iter());
        for (i, var) in params.enumerate() {
            check_word(&var.ty, || format!("parameter '{}'", var.name))?;
            let offset = self.alloc_slot(&var.name)?;
            emit!(self, "    sw {}, {}(s0)", argument_register(i), offset);
        }

        self.gen_compound(body, false)?;
        self.epilogue();
        emit!(self, "    .size {}, .-{}", function.name, function.name);
        self.exit_scope();
        Ok(())
    }

    fn gen_compound(
        &mut self,
        compound: &CompoundStmt,
        opens_scope: bool,
    ) -> Result<(), CodegenError> {
        if opens_scope {
            self.enter_scope(compound.id)?;
        }
        for decl in &compound.decls {
            self.gen_local_decl(decl)?;
        }
        for stmt in &compound.stmts {
            self.gen_stmt(stmt)?;
        }
        if opens_scope {
            self.exit_scope();
        }
        Ok(())
    }

    fn gen_stmt(&mut self, stmt: &Stmt) -> Result<(), CodegenError> {
        match stmt {
            Stmt::Compound(c) => self.gen_compound(c, true)?,
            Stmt::Assignment(a) => self.gen_assignment(a)?,
            Stmt::Print(p) => {
                self.gen_expr(&p.target)?;
                self.pop("a0");
                emit!(self, "    jal ra, printInt");
            }
            Stmt::Read(r) => {
                self.gen_ref(&r.target, RefMode::Address)?;
                emit!(self, "    jal ra, readInt");
                self.pop("t0");
                emit!(self, "    sw a0, 0(t0)");
            }
            Stmt::If(i) => self.gen_if(i)?,
            Stmt::While(w) => self.gen_while(w)?,
            Stmt::For(f) => self.gen_for(f)?,
            Stmt::Return(r) => {
                self.gen_expr(&r.value)?;
                self.pop("a0");
                self.epilogue();
            }
            Stmt::Invocation(e) => {
                self.gen_expr(e)?;
                self.pop("t0");
            }
        };
        Ok(())
    }

    fn gen_assignment(&mut self, assignment: &Assignment) -> Result<(), CodegenError> {
        self.gen_ref(&assignment.lhs, RefMode::Address)?;
        self.gen_expr(&assignment.rhs)?;
        self.pop("t0");
        self.pop("t1");
        emit!(self, "    sw t0, 0(t1)");
        Ok(())
    }

    /// Branches to `false_label` when `condition` is false, fusing relational
    /// operators into a single compare-and-branch.
    fn gen_condition(
        &mut self,
        condition: &Expr,
        false_label: &str,
    ) -> Result<(), CodegenError> {
        if let ExprKind::Binary(op, lhs, rhs) = &condition.kind {
            if let Some(branch) = inverse_branch(*op) {
                self.gen_expr(lhs)?;
                self.gen_expr(rhs)?;
                self.pop("t0");
                self.pop("t1");
                emit!(self, "    {} t1, t0, {}", branch, false_label);
                return Ok(());
            }
        }

        self.gen_expr(condition)?;
        self.pop("t0");
        emit!(self, "    beqz t0, {}", false_label);
        Ok(())
    }

    fn gen_if(&mut self, stmt: &If) -> Result<(), CodegenError> {
        let else_label = self.new_label();
        let end_label = match stmt.else_body {
            Some(_) => self.new_label(),
            None => else_label.clone(),
        };

        self.gen_condition(&stmt.condition, &else_label)?;
        self.gen_compound(&stmt.body, true)?;
        if let Some(else_body) = &stmt.else_body {
            emit!(self, "    j {}", end_label);
            emit!(self, "{}:", else_label);
            self.gen_compound(else_body, true)?;
        }
        emit!(self, "{}:", end_label);
        Ok(())
    }

    fn gen_while(&mut self, stmt: &While) -> Result<(), CodegenError> {
        let begin_label = self.new_label();
        let end_label = self.new_label();

        emit!(self, "{}:", begin_label);
        self.gen_condition(&stmt.condition, &end_label)?;
        self.gen_compound(&stmt.body, true)?;
        emit!(self, "    j {}", begin_label);
        emit!(self, "{}:", end_label);
        Ok(())
    }

    /// The loop runs while the variable is below the end value.
    fn gen_for(&mut self, stmt: &For) -> Result<(), CodegenError> {
        self.enter_scope(stmt.id)?;
        for var in &stmt.loop_var.vars {
            self.alloc_slot(&var.name)?;
        }
        let name = stmt.loop_var_name().unwrap_or_default();
        let offset = self
            .symbols
            .lookup_local(name)
            .and_then(|e| e.offset)
            .ok_or_else(|| CodegenError::UnresolvedSymbol(name.to_string()))?;

        self.gen_assignment(&stmt.init)?;

        let begin_label = self.new_label();
        let end_label = self.new_label();
        emit!(self, "{}:", begin_label);
        emit!(self, "    lw t0, {}(s0)", offset);
        self.push_t0();
        self.gen_expr(&stmt.end)?;
        self.pop("t0");
        self.pop("t1");
        emit!(self, "    bge t1, t0, {}", end_label);

        self.gen_compound(&stmt.body, true)?;

        emit!(self, "    lw t0, {}(s0)", offset);
        emit!(self, "    addi t0, t0, 1");
        emit!(self, "    sw t0, {}(s0)", offset);
        emit!(self, "    j {}", begin_label);
        emit!(self, "{}:", end_label);
        self.exit_scope();
        Ok(())
    }

    fn gen_ref(&mut self, expr: &Expr, mode: RefMode) -> Result<(), CodegenError> {
        let ExprKind::VariableRef(r) = &expr.kind else {
            return Err(CodegenError::Unsupported("a non-variable reference".to_string()));
        };
        if !r.indices.is_empty() {
            return Err(CodegenError::Unsupported(format!("element of '{}'", r.name)));
        }

        let entry = self
            .symbols
            .lookup_decl(&r.name)
            .ok_or_else(|| CodegenError::UnresolvedSymbol(r.name.clone()))?;
        check_word(&entry.ty, || format!("'{}'", r.name))?;
        let offset = match entry.is_global() {
            true => None,
            false => Some(
                entry
                    .offset
                    .ok_or_else(|| CodegenError::UnresolvedSymbol(r.name.clone()))?,
            ),
        };

        match (offset, mode) {
            (None, RefMode::Address) => emit!(self, "    la t0, {}", r.name),
            (None, RefMode::Value) => {
                emit!(self, "    la t0, {}", r.name);
                emit!(self, "    lw t0, 0(t0)");
            }
            (Some(offset), RefMode::Address) => emit!(self, "    addi t0, s0, {}", offset),
            (Some(offset), RefMode::Value) => emit!(self, "    lw t0, {}(s0)", offset),
        }
        self.push_t0();
        Ok(())
    }

    fn gen_expr(&mut self, expr: &Expr) -> Result<(), CodegenError> {
        // A procedure call yields no value; its `a0` push is discarded by the caller.
        if let Some(ty) = expr.ty().filter(|t| !t.is_void()) {
            check_word(ty, || format!("expression at {}", expr.loc))?;
        }

        match &expr.kind {
            ExprKind::Constant(c) => {
                let value = c
                    .asm_value()
                    .ok_or_else(|| CodegenError::Unsupported(format!("literal '{}'", c)))?;
                emit!(self, "    li t0, {}", value);
                self.push_t0();
            }
            ExprKind::VariableRef(_) => self.gen_ref(expr, RefMode::Value)?,
            ExprKind::Binary(op, lhs, rhs) => {
                self.gen_expr(lhs)?;
                self.gen_expr(rhs)?;
                self.pop("t0");
                self.pop("t1");
                self.gen_binop(*op);
                self.push_t0();
            }
            ExprKind::Unary(op, operand) => {
                self.gen_expr(operand)?;
                self.pop("t0");
                match op {
                    UnaryOpKind::Neg => emit!(self, "    neg t0, t0"),
                    UnaryOpKind::Not => emit!(self, "    seqz t0, t0"),
                }
                self.push_t0();
            }
            ExprKind::Invocation(invocation) => self.gen_invocation(invocation)?,
        }
        Ok(())
    }

    /// Combines `t1` (left) and `t0` (right) into `t0`.
    fn gen_binop(&mut self, op: BinOpKind) {
        match op {
            BinOpKind::Add => emit!(self, "    add t0, t1, t0"),
            BinOpKind::Sub => emit!(self, "    sub t0, t1, t0"),
            BinOpKind::Mul => emit!(self, "    mul t0, t1, t0"),
            BinOpKind::Div => emit!(self, "    div t0, t1, t0"),
            BinOpKind::Mod => emit!(self, "    rem t0, t1, t0"),
            BinOpKind::And => emit!(self, "    and t0, t1, t0"),
            BinOpKind::Or => emit!(self, "    or t0, t1, t0"),
            BinOpKind::Equal => {
                emit!(self, "    sub t0, t1, t0");
                emit!(self, "    seqz t0, t0");
            }
            BinOpKind::NotEqual => {
                emit!(self, "    sub t0, t1, t0");
                emit!(self, "    snez t0, t0");
            }
            BinOpKind::LessThan => emit!(self, "    slt t0, t1, t0"),
            BinOpKind::GreaterThan => emit!(self, "    slt t0, t0, t1"),
            BinOpKind::LessEqual => {
                emit!(self, "    slt t0, t0, t1");
                emit!(self, "    xori t0, t0, 1");
            }
            BinOpKind::GreaterEqual => {
                emit!(self, "    slt t0, t1, t0");
                emit!(self, "    xori t0, t0, 1");
            }
        }
    }

    fn gen_invocation(&mut self, invocation: &Invocation) -> Result<(), CodegenError> {
        let count = invocation.args.len();
        if count > MAX_ARGUMENTS {
            return Err(CodegenError::TooManyArguments {
                name: invocation.name.clone(),
                count,
            });
        }

        for arg in &invocation.args {
            self.gen_expr(arg)?;
        }
        for i in (0..count).rev() {
            self.pop(&argument_register(i));
        }
        emit!(self, "    jal ra, {}", invocation.name);
        emit!(self, "    mv t0, a0");
        self.push_t0();
        Ok(())
    }
}
