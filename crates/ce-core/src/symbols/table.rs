use super::*;
use crate::error::{Error, Result};
use std::collections::HashMap;

/// Arena of interned symbols for one compilation.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    types_by_name: HashMap<(String, String, usize), SymbolId>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Reserve the next id; the caller must immediately [`SymbolTable::insert`] a symbol with it.
    pub fn next_id(&self) -> SymbolId {
        SymbolId(self.symbols.len() as u32)
    }

    pub fn insert(&mut self, symbol: Symbol) -> SymbolId {
        let id = self.next_id();
        debug_assert_eq!(symbol.id(), id, "symbols must be inserted in id order");
        if let Symbol::Type(ty) = &symbol {
            self.types_by_name
                .insert((ty.namespace.clone(), ty.name.clone(), ty.arity()), id);
        }
        self.symbols.push(symbol);
        id
    }

    /// Refresh the by-name index after a type gained generic parameters.
    pub(crate) fn reindex_type(&mut self, id: SymbolId, previous_arity: usize) -> Result<()> {
        let ty = self.type_symbol(id)?;
        let key = (ty.namespace.clone(), ty.name.clone(), ty.arity());
        let previous = (key.0.clone(), key.1.clone(), previous_arity);
        if self.types_by_name.get(&previous) == Some(&id) {
            self.types_by_name.remove(&previous);
        }
        self.types_by_name.insert(key, id);
        Ok(())
    }

    pub fn get(&self, id: SymbolId) -> Result<&Symbol> {
        self.symbols
            .get(id.0 as usize)
            .ok_or_else(|| Error::resolution(format!("unknown symbol {}", id)))
    }

    pub fn get_mut(&mut self, id: SymbolId) -> Result<&mut Symbol> {
        self.symbols
            .get_mut(id.0 as usize)
            .ok_or_else(|| Error::resolution(format!("unknown symbol {}", id)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }

    pub fn type_symbol(&self, id: SymbolId) -> Result<&TypeSymbol> {
        match self.get(id)? {
            Symbol::Type(ty) => Ok(ty),
            other => Err(mismatch(id, "type", other)),
        }
    }

    pub fn type_parameter(&self, id: SymbolId) -> Result<&TypeParameterSymbol> {
        match self.get(id)? {
            Symbol::TypeParameter(param) => Ok(param),
            other => Err(mismatch(id, "type parameter", other)),
        }
    }

    pub fn method(&self, id: SymbolId) -> Result<&MethodSymbol> {
        match self.get(id)? {
            Symbol::Method(method) => Ok(method),
            other => Err(mismatch(id, "method", other)),
        }
    }

    pub fn field(&self, id: SymbolId) -> Result<&FieldSymbol> {
        match self.get(id)? {
            Symbol::Field(field) => Ok(field),
            other => Err(mismatch(id, "field", other)),
        }
    }

    pub fn property(&self, id: SymbolId) -> Result<&PropertySymbol> {
        match self.get(id)? {
            Symbol::Property(property) => Ok(property),
            other => Err(mismatch(id, "property", other)),
        }
    }

    pub fn event(&self, id: SymbolId) -> Result<&EventSymbol> {
        match self.get(id)? {
            Symbol::Event(event) => Ok(event),
            other => Err(mismatch(id, "event", other)),
        }
    }

    pub fn find_type(&self, namespace: &str, name: &str, arity: usize) -> Option<SymbolId> {
        self.types_by_name
            .get(&(namespace.to_string(), name.to_string(), arity))
            .copied()
    }

    /// Members declared directly on `ty`, in declaration order.
    pub fn members_of(&self, ty: SymbolId) -> Result<Vec<&Symbol>> {
        let declaring = self.type_symbol(ty)?;
        declaring
            .members
            .iter()
            .map(|member| self.get(*member))
            .collect()
    }

    /// Find a declared member by name (first match in declaration order).
    pub fn member_named(&self, ty: SymbolId, name: &str) -> Result<SymbolId> {
        self.members_of(ty)?
            .into_iter()
            .find(|member| member.name() == name)
            .map(Symbol::id)
            .ok_or_else(|| {
                Error::resolution(format!("type {} has no member named `{}`", ty, name))
            })
    }
}

fn mismatch(id: SymbolId, expected: &str, found: &Symbol) -> Error {
    Error::state(format!(
        "symbol {} is a {}, expected a {}",
        id,
        found.kind_name(),
        expected
    ))
}
