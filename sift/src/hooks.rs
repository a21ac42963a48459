//! The hook registry.
//!
//! Aliased nodes can be re-interpreted by a registered handler: when
//! the interpreter reaches a `TypeAlias` whose identifier has a hook,
//! the handler receives the compiled type-parameter parsers and its
//! result replaces the aliased body. Registration happens once per
//! identifier during schema construction; there is no removal, so
//! readers need no coordination beyond the lock.

use std::collections::hash_map::Entry;
use std::sync::{Arc, RwLock};

use fxhash::FxHashMap;
use once_cell::sync::Lazy;

use crate::parse::Parser;

/// A hook handler: compiled type parameters in, parser out.
pub type Hook = Arc<dyn Fn(&[Parser]) -> Parser + Send + Sync>;

static HOOKS: Lazy<RwLock<FxHashMap<String, Hook>>> =
    Lazy::new(|| RwLock::new(FxHashMap::default()));

/// Register a handler for an alias identifier.
///
/// The first registration wins; returns `false` when the identifier
/// already has a handler.
pub fn register(
    identifier: impl Into<String>,
    hook: impl Fn(&[Parser]) -> Parser + Send + Sync + 'static,
) -> bool {
    let mut hooks = HOOKS.write().unwrap();
    match hooks.entry(identifier.into()) {
        Entry::Occupied(_) => false,
        Entry::Vacant(entry) => {
            entry.insert(Arc::new(hook));
            true
        }
    }
}

/// Look up the handler registered for an identifier.
pub fn lookup(identifier: &str) -> Option<Hook> {
    HOOKS.read().unwrap().get(identifier).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporting::ParseResult;

    #[test]
    fn first_registration_wins() {
        let handler = |_: &[Parser]| -> Parser {
            Arc::new(|input: &crate::value::Value, _: &crate::parse::ParseOptions| {
                ParseResult::Success(input.clone())
            })
        };

        assert!(lookup("hooks-test-alias").is_none());
        assert!(register("hooks-test-alias", handler));
        assert!(!register("hooks-test-alias", handler));
        assert!(lookup("hooks-test-alias").is_some());
    }
}
