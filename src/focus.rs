// src/focus.rs

use std::sync::Mutex;

/// The plugin the UI last entered, by name.
///
/// Only names are kept; the registry stays the owner of the plugin itself.
#[derive(Debug, Default)]
pub struct FocusState {
    current: Mutex<Option<String>>,
}

impl FocusState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<String> {
        match self.current.lock() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn set(&self, name: &str) {
        self.with_slot(|slot| *slot = Some(name.to_string()));
    }

    /// Clear focus, returning whoever had it.
    pub fn clear(&self) -> Option<String> {
        let mut previous = None;
        self.with_slot(|slot| previous = slot.take());
        previous
    }

    /// Clear focus only if `name` holds it.
    pub fn clear_if(&self, name: &str) -> bool {
        let mut cleared = false;
        self.with_slot(|slot| {
            if slot.as_deref() == Some(name) {
                *slot = None;
                cleared = true;
            }
        });
        cleared
    }

    fn with_slot(&self, f: impl FnOnce(&mut Option<String>)) {
        let mut guard = match self.current.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard);
    }
}
