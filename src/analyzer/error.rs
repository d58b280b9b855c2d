use std::fmt;

use crate::lexer::Location;

use super::PType;

#[derive(thiserror::Error, Clone, Debug, PartialEq)]
pub enum SemanticError {
    #[error("symbol '{0}' is redeclared")]
    Redeclared(String),
    #[error("use of undeclared symbol '{0}'")]
    Undeclared(String),
    #[error("use of non-variable symbol '{0}'")]
    NonVariable(String),
    #[error("call of non-function symbol '{0}'")]
    NonFunction(String),
    #[error("'{0}' declared as an array with an index that is not greater than 0")]
    NonPositiveDimension(String),
    #[error("there is an over array subscript on '{0}'")]
    OverArraySubscript(String),
    #[error("index of array reference must be an integer")]
    NonIntegerIndex,
    #[error("invalid operands to binary operator '{op}' ('{lhs}' and '{rhs}')")]
    InvalidBinaryOperand {
        op: &'static str,
        lhs: PType,
        rhs: PType,
    },
    #[error("invalid operand to unary operator '{op}' ('{operand}')")]
    InvalidUnaryOperand { op: &'static str, operand: PType },
    #[error("too few/much arguments provided for function '{0}'")]
    ArgumentCountMismatch(String),
    #[error("incompatible type passing '{found}' to parameter of type '{expected}'")]
    IncompatibleArgument { expected: PType, found: PType },
    #[error("expression of print statement must be scalar type")]
    PrintNonScalar,
    #[error("variable reference of read statement must be scalar type")]
    ReadNonScalar,
    #[error("variable reference of read statement cannot be a constant or loop variable")]
    ReadConstantOrLoopVar,
    #[error("array assignment is not allowed")]
    ArrayAssignment,
    #[error("cannot assign to variable '{0}' which is a constant")]
    AssignToConstant(String),
    #[error("the value of loop variable cannot be modified inside the loop body")]
    AssignToLoopVar,
    #[error("assigning to '{target}' from incompatible type '{found}'")]
    IncompatibleAssignment { target: PType, found: PType },
    #[error("the expression of condition must be boolean type")]
    NonBooleanCondition,
    #[error("the lower bound and upper bound of iteration count must be in the incremental order")]
    NonIncrementalLoop,
    #[error("program/procedure should not return a value")]
    ReturnFromVoid,
    #[error("return '{found}' from a function with return type '{expected}'")]
    IncompatibleReturn { expected: PType, found: PType },
}

/// A semantic error anchored at a source location.
#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    pub loc: Location,
    pub error: SemanticError,
}

impl Diagnostic {
    pub fn new(loc: Location, error: SemanticError) -> Self {
        Self { loc, error }
    }

    /// The report line followed by the offending source line and a caret under the column.
    pub fn render(&self, source: &str) -> String {
        let line = source
            .lines()
            .nth(self.loc.line.saturating_sub(1) as usize)
            .unwrap_or_default();
        let indent = " ".repeat(self.loc.col.saturating_sub(1) as usize);
        format!("{}\n    {}\n    {}^\n", self, line, indent)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Error> Found in {}: {}", self.loc, self.error)
    }
}
