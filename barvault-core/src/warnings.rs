//! Once-per-symbol warnings.

use crate::domain::Symbol;
use std::collections::HashSet;
use std::sync::Mutex;

/// Remembers which symbols have already been warned about.
///
/// Entries are never removed; the set lives as long as its owner.
#[derive(Debug, Default)]
pub struct WarningRegistry {
    warned: Mutex<HashSet<Symbol>>,
}

impl WarningRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log `message` the first time this is called for `symbol`.
    ///
    /// Returns true when the message was emitted.
    pub fn warn_once(&self, symbol: &Symbol, message: &str) -> bool {
        let first = self
            .warned
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(symbol.clone());
        if first {
            tracing::warn!(symbol = %symbol, "{message}");
        }
        first
    }

    pub fn has_warned(&self, symbol: &Symbol) -> bool {
        self.warned
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(symbol)
    }

    pub fn len(&self) -> usize {
        self.warned
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
