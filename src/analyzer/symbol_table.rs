use std::collections::HashMap;
use std::fmt::{self, Write};

use log::{debug, trace};

use crate::lexer::Location;
use crate::parser::NodeId;

use super::{Constant, PType};

const RULE_WIDTH: usize = 110;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymbolKind {
    Program,
    Function,
    Parameter,
    Variable,
    LoopVar,
    Constant,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Program => "program",
            SymbolKind::Function => "function",
            SymbolKind::Parameter => "parameter",
            SymbolKind::Variable => "variable",
            SymbolKind::LoopVar => "loop_var",
            SymbolKind::Constant => "constant",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Attribute {
    Constant(Constant),
    /// Parameter types joined by `", "`.
    Signature(String),
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attribute::Constant(c) => write!(f, "{}", c),
            Attribute::Signature(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SymbolEntry {
    pub name: String,
    pub loc: Location,
    pub kind: SymbolKind,
    pub level: usize,
    pub ty: PType,
    pub attribute: Option<Attribute>,
    /// Set when the declared shape is rejected; references to it stay silent.
    pub invalid: bool,
    /// Frame offset from `s0`, assigned during code generation.
    pub offset: Option<i32>,
}

impl SymbolEntry {
    pub fn new(name: &str, loc: Location, kind: SymbolKind, level: usize, ty: PType) -> Self {
        Self {
            name: name.to_string(),
            loc,
            kind,
            level,
            ty,
            attribute: None,
            invalid: false,
            offset: None,
        }
    }

    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attribute = Some(attribute);
        self
    }

    pub fn is_global(&self) -> bool {
        self.level == 0
    }

    /// Parameter types recovered from a function's signature attribute.
    pub fn param_types(&self) -> Result<Vec<PType>, super::ParsePTypeError> {
        match &self.attribute {
            Some(Attribute::Signature(s)) => s
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::parse::<PType>)
                .collect(),
            _ => Ok(vec![]),
        }
    }

    fn dump_row(&self, out: &mut String) -> fmt::Result {
        let level = if self.is_global() {
            "0(global)".to_string()
        } else {
            format!("{}(local)", self.level)
        };
        let attribute = match (&self.kind, &self.attribute) {
            (SymbolKind::Constant | SymbolKind::Function, Some(a)) => a.to_string(),
            _ => String::new(),
        };
        writeln!(
            out,
            "{:<33}{:<11}{:<11}{:<17}{:<11}",
            self.name,
            self.kind.as_str(),
            level,
            self.ty.to_string(),
            attribute
        )
    }
}

/// Entries of one lexical scope, in declaration order.
#[derive(Clone, Debug, PartialEq)]
pub struct SymbolTable {
    level: usize,
    entries: Vec<SymbolEntry>,
}

impl SymbolTable {
    pub fn new(level: usize) -> Self {
        Self {
            level,
            entries: vec![],
        }
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn entries(&self) -> &[SymbolEntry] {
        &self.entries
    }

    pub fn lookup(&self, name: &str) -> Option<&SymbolEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn lookup_mut(&mut self, name: &str) -> Option<&mut SymbolEntry> {
        self.entries.iter_mut().find(|e| e.name == name)
    }

    pub fn insert(&mut self, entry: SymbolEntry) -> &mut SymbolEntry {
        trace!(
            "declare {} '{}' at level {}",
            entry.kind.as_str(),
            entry.name,
            self.level
        );
        self.entries.push(entry);
        let last = self.entries.len() - 1;
        &mut self.entries[last]
    }

    /// Fixed-width listing of the scope, framed by rule lines.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_dump(&mut out);
        out
    }

    fn write_dump(&self, out: &mut String) -> fmt::Result {
        writeln!(out, "{}", "=".repeat(RULE_WIDTH))?;
        writeln!(
            out,
            "{:<33}{:<11}{:<11}{:<17}{:<11}",
            "Name", "Kind", "Level", "Type", "Attribute"
        )?;
        writeln!(out, "{}", "-".repeat(RULE_WIDTH))?;
        for entry in &self.entries {
            entry.dump_row(out)?;
        }
        writeln!(out, "{}", "-".repeat(RULE_WIDTH))
    }
}

/// Stack of open scopes. The top of the stack is the innermost scope.
#[derive(Clone, Debug, Default)]
pub struct SymbolManager {
    tables: Vec<SymbolTable>,
}

impl SymbolManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open scopes; the next pushed scope gets this level.
    pub fn depth(&self) -> usize {
        self.tables.len()
    }

    /// Level of the innermost scope.
    pub fn level(&self) -> usize {
        self.tables.last().map_or(0, SymbolTable::level)
    }

    pub fn push_scope(&mut self) {
        let level = self.depth();
        debug!("push scope at level {}", level);
        self.tables.push(SymbolTable::new(level));
    }

    /// Re-enters a scope built by an earlier pass.
    pub fn push_table(&mut self, table: SymbolTable) {
        debug!("re-enter scope at level {}", table.level());
        self.tables.push(table);
    }

    pub fn pop_scope(&mut self) -> Option<SymbolTable> {
        let table = self.tables.pop();
        if let Some(t) = &table {
            debug!("pop scope at level {}", t.level());
        }
        table
    }

    pub fn current(&self) -> Option<&SymbolTable> {
        self.tables.last()
    }

    pub fn current_mut(&mut self) -> Option<&mut SymbolTable> {
        self.tables.last_mut()
    }

    /// Searches the innermost scope only.
    pub fn lookup_local(&self, name: &str) -> Option<&SymbolEntry> {
        self.current().and_then(|t| t.lookup(name))
    }

    pub fn lookup_local_mut(&mut self, name: &str) -> Option<&mut SymbolEntry> {
        self.current_mut().and_then(|t| t.lookup_mut(name))
    }

    /// Searches from the innermost scope outwards; inner declarations shadow outer ones.
    pub fn lookup_decl(&self, name: &str) -> Option<&SymbolEntry> {
        self.tables.iter().rev().find_map(|t| t.lookup(name))
    }
}

/// Scopes captured during analysis, keyed by the node that opened them.
///
/// Each scope can be taken exactly once.
#[derive(Clone, Debug, Default)]
pub struct CapturedScopes {
    scopes: HashMap<NodeId, SymbolTable>,
}

impl CapturedScopes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: NodeId, table: SymbolTable) {
        self.scopes.insert(id, table);
    }

    pub fn take(&mut self, id: NodeId) -> Option<SymbolTable> {
        self.scopes.remove(&id)
    }

    pub fn get(&self, id: NodeId) -> Option<&SymbolTable> {
        self.scopes.get(&id)
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}
