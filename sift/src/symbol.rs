//! Unique symbols.
//!
//! A [`Symbol`] is a process-wide unique identifier with an optional,
//! purely descriptive name. Descriptions may repeat; identity never
//! does. Descriptions live in a global registry so that symbols stay
//! `Copy` and cheap to compare and hash.

use std::fmt;
use std::sync::RwLock;

use once_cell::sync::Lazy;

static REGISTRY: Lazy<RwLock<Vec<Option<String>>>> = Lazy::new(|| RwLock::new(Vec::new()));

/// A unique symbol.
///
/// Equality is identity: two symbols compare equal only when they
/// originate from the same [`Symbol::new`] or [`Symbol::anonymous`]
/// call.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(u32);

impl Symbol {
    /// Mint a fresh symbol carrying a description.
    pub fn new(description: impl Into<String>) -> Symbol {
        Symbol::mint(Some(description.into()))
    }

    /// Mint a fresh symbol without a description.
    pub fn anonymous() -> Symbol {
        Symbol::mint(None)
    }

    fn mint(description: Option<String>) -> Symbol {
        let mut registry = REGISTRY.write().unwrap();
        let id = registry.len() as u32;
        registry.push(description);
        Symbol(id)
    }

    /// The description supplied when the symbol was minted.
    pub fn description(&self) -> Option<String> {
        REGISTRY.read().unwrap()[self.0 as usize].clone()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.description() {
            Some(description) => write!(f, "Symbol({description})"),
            None => write!(f, "Symbol()"),
        }
    }
}
