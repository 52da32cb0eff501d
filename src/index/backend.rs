use rustc_hash::FxHashMap;

use crate::error::Result;

/// Key/value contract behind the synonym and exclusion stores.
///
/// `get_entry` returns the stored value or `None`. `set_entry` overwrites the
/// value, and `set_entry(key, None)` deletes it. Implementations backed by
/// durable storage report failures as errors; the stores propagate them
/// without retrying.
pub trait IndexBackend<E> {
    /// Returns the entry stored under `key`.
    fn get_entry(&self, key: &str) -> Result<Option<E>>;

    /// Replaces (or with `None`, deletes) the entry stored under `key`.
    fn set_entry(&mut self, key: &str, entry: Option<E>) -> Result<()>;
}

impl<E, B: IndexBackend<E> + ?Sized> IndexBackend<E> for Box<B> {
    fn get_entry(&self, key: &str) -> Result<Option<E>> {
        (**self).get_entry(key)
    }

    fn set_entry(&mut self, key: &str, entry: Option<E>) -> Result<()> {
        (**self).set_entry(key, entry)
    }
}

/// In-process backend holding every entry in a hash map.
#[derive(Debug)]
pub struct MemoryBackend<E> {
    entries: FxHashMap<String, E>,
}

impl<E> MemoryBackend<E> {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self {
            entries: FxHashMap::default(),
        }
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over stored keys in arbitrary order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl<E> Default for MemoryBackend<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Clone> IndexBackend<E> for MemoryBackend<E> {
    fn get_entry(&self, key: &str) -> Result<Option<E>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set_entry(&mut self, key: &str, entry: Option<E>) -> Result<()> {
        match entry {
            Some(entry) => {
                self.entries.insert(key.to_string(), entry);
            }
            None => {
                self.entries.remove(key);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_none_deletes() -> Result<()> {
        let mut backend = MemoryBackend::new();
        backend.set_entry("a", Some(1u32))?;
        assert_eq!(backend.get_entry("a")?, Some(1));
        backend.set_entry("a", Some(2))?;
        assert_eq!(backend.get_entry("a")?, Some(2));
        backend.set_entry("a", None)?;
        assert_eq!(backend.get_entry("a")?, None);
        assert!(backend.is_empty());
        Ok(())
    }
}
