//! Explicit mutable state threaded through a resolution run.
//!
//! The invalid-object counter and the fresh-symbol registry are both genuinely mutable, but
//! neither needs to outlive a single resolution run, and a file-scope `static` counter would
//! make this crate's resolver non-reentrant for no reason. `Session` collects both into one
//! value the caller owns and threads through every `rewrite`/`deref` call.

use crate::types::Type;

/// Per-run mutable state: the invalid-object counter and the symbol table entries created for
/// failed symbols along the way.
#[derive(Debug, Default)]
pub struct Session {
    invalid_counter: u32,
    fresh_symbols: Vec<FreshSymbol>,
}

/// A symbol table entry synthesized for a `make_failed_symbol` equivalent: a well-typed free
/// value standing in for a dereference that could not be resolved to anything.
#[derive(Debug, Clone, PartialEq)]
pub struct FreshSymbol {
    pub name: String,
    pub ty: Type,
}

impl Session {
    pub fn new() -> Session {
        Session::default()
    }

    /// Allocate and register a fresh `symex::invalid_objectN` symbol of `ty`. Each call bumps
    /// the counter, so names never collide within one `Session`.
    pub fn make_failed_symbol(&mut self, ty: Type) -> FreshSymbol {
        let name = format!("symex::invalid_object{}", self.invalid_counter);
        self.invalid_counter += 1;
        let symbol = FreshSymbol { name, ty };
        self.fresh_symbols.push(symbol.clone());
        symbol
    }

    pub fn fresh_symbols(&self) -> &[FreshSymbol] {
        &self.fresh_symbols
    }

    pub fn invalid_symbol_count(&self) -> u32 {
        self.invalid_counter
    }
}
