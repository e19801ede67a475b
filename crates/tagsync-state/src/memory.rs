//! Process-local [`StateBackend`] kept in a `HashMap`.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::backend::StateBackend;
use crate::error::{self, StateError};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Value {
    Str(String),
    Int(i64),
}

/// Non-durable state, lost when the process exits.
#[derive(Debug, Default)]
pub struct InMemoryStateBackend {
    entries: Mutex<HashMap<String, Value>>,
}

impl InMemoryStateBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::LockPoisoned`] if a writer panicked.
    pub fn len(&self) -> error::Result<usize> {
        Ok(self.lock()?.len())
    }

    /// # Errors
    ///
    /// Returns [`StateError::LockPoisoned`] if a writer panicked.
    pub fn is_empty(&self) -> error::Result<bool> {
        Ok(self.lock()?.is_empty())
    }

    fn lock(&self) -> error::Result<MutexGuard<'_, HashMap<String, Value>>> {
        self.entries.lock().map_err(|_| StateError::LockPoisoned)
    }
}

impl StateBackend for InMemoryStateBackend {
    fn get_string(&self, key: &str) -> error::Result<Option<String>> {
        Ok(match self.lock()?.get(key) {
            Some(Value::Str(s)) => Some(s.clone()),
            _ => None,
        })
    }

    fn put_string(&self, key: &str, value: &str) -> error::Result<()> {
        self.lock()?
            .insert(key.to_string(), Value::Str(value.to_string()));
        Ok(())
    }

    fn get_i64(&self, key: &str) -> error::Result<Option<i64>> {
        Ok(match self.lock()?.get(key) {
            Some(Value::Int(v)) => Some(*v),
            _ => None,
        })
    }

    fn put_i64(&self, key: &str, value: i64) -> error::Result<()> {
        self.lock()?.insert(key.to_string(), Value::Int(value));
        Ok(())
    }

    fn remove(&self, key: &str) -> error::Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}
