pub mod analyzer;
pub mod codegen;
pub mod lexer;
pub mod parser;

use log::debug;

use analyzer::{Analysis, Diagnostic, SemanticVisitor};
use codegen::{Codegen, CodegenError};
use lexer::{LexError, Lexer};
use parser::{ParseError, Parser, Program};

#[derive(Clone, Debug, Default)]
pub struct CompileOptions {
    /// Dump each symbol table as its scope closes. A `//&D+` or `//&D-`
    /// pseudo-comment in the source takes precedence.
    pub dump_table: bool,
    /// Recorded in the `.file` directive.
    pub source_name: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Compilation {
    pub assembly: String,
    pub table_dump: String,
}

#[derive(thiserror::Error, Debug)]
pub enum CompileError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("found {} semantic error(s)", .diagnostics.len())]
    Semantic {
        diagnostics: Vec<Diagnostic>,
        table_dump: String,
    },
    #[error("internal code generation error: {0}")]
    Codegen(#[from] CodegenError),
}

/// Runs the front-end and the semantic analysis. The returned tree carries
/// the inferred expression types.
pub fn analyze(
    source: &str,
    options: &CompileOptions,
) -> Result<(Program, Analysis), CompileError> {
    let lexed = Lexer::tokenize(source)?;
    let dump_table = lexed.dump_table.unwrap_or(options.dump_table);

    let mut program = Parser::new(lexed.tokens).parse()?;
    let analysis = SemanticVisitor::new(dump_table).visit_program(&mut program);
    debug!(
        "analysis of '{}' finished with {} diagnostic(s)",
        program.name,
        analysis.diagnostics.len()
    );
    Ok((program, analysis))
}

/// Compiles P source text to RISC-V assembly. Code generation only runs on
/// a program that analyzed cleanly.
pub fn compile(source: &str, options: &CompileOptions) -> Result<Compilation, CompileError> {
    let (program, analysis) = analyze(source, options)?;
    if analysis.has_error() {
        return Err(CompileError::Semantic {
            diagnostics: analysis.diagnostics,
            table_dump: analysis.table_dump,
        });
    }

    let assembly = Codegen::new(analysis.scopes, &options.source_name).generate(&program)?;
    Ok(Compilation {
        assembly,
        table_dump: analysis.table_dump,
    })
}
