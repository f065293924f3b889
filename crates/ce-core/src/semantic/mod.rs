//! The semantic-analysis service seen from the engine, plus an in-memory implementation.

mod builder;

pub use builder::{CompilationBuilder, SOURCE_ASSEMBLY};

use crate::diagnostics::{has_errors, Diagnostic};
use crate::error::{Error, Result};
use crate::ops::Operation;
use crate::symbols::{SymbolId, SymbolTable, SyntaxId};
use std::collections::HashMap;

common_enum! {
    #[derive(Copy, Eq, Hash)]
    pub enum SyntaxKind {
        /// Method, accessor or constructor body.
        Body,
        /// Field or property initializer.
        Initializer,
    }
}

common_struct! {
    pub struct SyntaxNode {
        pub id: SyntaxId,
        pub kind: SyntaxKind,
        pub owner: SymbolId,
    }
}

/// Result of analyzing one syntax node.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub operation: Operation,
    pub diagnostics: Vec<Diagnostic>,
}

impl Analysis {
    pub fn has_errors(&self) -> bool {
        has_errors(&self.diagnostics)
    }
}

pub trait SemanticModel: Send + Sync {
    fn symbols(&self) -> &SymbolTable;

    /// Analyzed-operation tree for `syntax` with its diagnostics.
    fn analyze(&self, syntax: SyntaxId) -> Result<Analysis>;

    fn declaring_syntax(&self, symbol: SymbolId) -> Vec<SyntaxNode>;

    /// Diagnostics reported against a type or any of its members.
    fn type_diagnostics(&self, ty: SymbolId) -> Vec<Diagnostic>;

    fn body_of(&self, symbol: SymbolId) -> Option<SyntaxNode> {
        self.declaring_syntax(symbol)
            .into_iter()
            .find(|node| node.kind == SyntaxKind::Body)
    }

    fn initializer_of(&self, symbol: SymbolId) -> Option<SyntaxNode> {
        self.declaring_syntax(symbol)
            .into_iter()
            .find(|node| node.kind == SyntaxKind::Initializer)
    }
}

/// A finished in-memory compilation produced by [`CompilationBuilder`].
#[derive(Debug, Clone)]
pub struct Compilation {
    symbols: SymbolTable,
    syntax: Vec<(SyntaxNode, Analysis)>,
    by_symbol: HashMap<SymbolId, Vec<SyntaxId>>,
    diagnostics: HashMap<SymbolId, Vec<Diagnostic>>,
}

impl SemanticModel for Compilation {
    fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    fn analyze(&self, syntax: SyntaxId) -> Result<Analysis> {
        self.syntax
            .get(syntax.0 as usize)
            .map(|(_, analysis)| analysis.clone())
            .ok_or_else(|| Error::resolution(format!("no syntax node {}", syntax)))
    }

    fn declaring_syntax(&self, symbol: SymbolId) -> Vec<SyntaxNode> {
        self.by_symbol
            .get(&symbol)
            .into_iter()
            .flatten()
            .filter_map(|id| self.syntax.get(id.0 as usize).map(|(node, _)| node.clone()))
            .collect()
    }

    fn type_diagnostics(&self, ty: SymbolId) -> Vec<Diagnostic> {
        self.diagnostics.get(&ty).cloned().unwrap_or_default()
    }
}
