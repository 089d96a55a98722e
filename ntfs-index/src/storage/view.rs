//! Typed access to a sorted index.
//!
//! An [`IndexView`] binds a key type and a value type to a [`SortedIndex`].
//! Nothing typed is cached: every call serializes its arguments, goes to the
//! index bytes, and decodes what comes back.

use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

use crate::storage::index::{IndexError, IndexIter, SortedIndex};
use crate::types::{MalformedRecord, RecordCodec};

/// A map-like view over a sorted index with typed keys and values.
///
/// `I` is any handle to the index: `&SortedIndex` gives a read-only view,
/// `&mut SortedIndex` additionally allows `set` and `remove`.
pub struct IndexView<I, K, V> {
    index: I,
    _types: PhantomData<fn() -> (K, V)>,
}

impl<I, K, V> IndexView<I, K, V>
where
    I: Deref<Target = SortedIndex>,
    K: RecordCodec,
    V: RecordCodec,
{
    /// Wrap an index handle.
    #[must_use]
    pub const fn new(index: I) -> Self {
        Self {
            index,
            _types: PhantomData,
        }
    }

    /// Look up the value stored under `key`.
    pub fn get(&self, key: &K) -> Result<Option<V>, IndexError> {
        self.index
            .search(&key.to_bytes())?
            .map(|bytes| decode_exact(&bytes))
            .transpose()
            .map_err(IndexError::from)
    }

    /// Whether an entry exists for `key`.
    pub fn contains(&self, key: &K) -> Result<bool, IndexError> {
        Ok(self.index.search(&key.to_bytes())?.is_some())
    }

    /// Number of entries in the index.
    pub fn len(&self) -> Result<usize, IndexError> {
        self.index.len()
    }

    /// Whether the index holds no entries.
    pub fn is_empty(&self) -> Result<bool, IndexError> {
        self.index.is_empty()
    }

    /// All entries in ascending key order.
    ///
    /// Each call starts a new scan; entries are decoded as they are yielded.
    #[must_use]
    pub fn entries(&self) -> TypedEntries<'_, K, V> {
        TypedEntries::new(self.index.iter())
    }

    /// Entries whose serialized key is `>=` that of `start`.
    #[must_use]
    pub fn entries_from(&self, start: &K) -> TypedEntries<'_, K, V> {
        TypedEntries::new(self.index.iter_from(&start.to_bytes()))
    }
}

impl<'a, K, V> IndexView<&'a SortedIndex, K, V>
where
    K: RecordCodec,
    V: RecordCodec,
{
    /// Consume a borrowed view, yielding entries that borrow the index
    /// itself.
    #[must_use]
    pub fn into_entries(self) -> TypedEntries<'a, K, V> {
        TypedEntries::new(self.index.iter())
    }
}

impl<I, K, V> IndexView<I, K, V>
where
    I: DerefMut<Target = SortedIndex>,
    K: RecordCodec,
    V: RecordCodec,
{
    /// Store `value` under `key`, replacing any existing value.
    pub fn set(&mut self, key: &K, value: &V) -> Result<(), IndexError> {
        self.index.upsert(&key.to_bytes(), &value.to_bytes())
    }

    /// Remove the entry for `key`, returning whether it existed.
    pub fn remove(&mut self, key: &K) -> Result<bool, IndexError> {
        self.index.delete(&key.to_bytes())
    }
}

/// Decode a record that must occupy all of `bytes`.
fn decode_exact<T: RecordCodec>(bytes: &[u8]) -> Result<T, MalformedRecord> {
    let record = T::from_bytes(bytes)?;
    if bytes.len() != T::SIZE {
        return Err(MalformedRecord::InvalidHeader("record length"));
    }
    Ok(record)
}

/// Iterator over the decoded entries of an [`IndexView`].
pub struct TypedEntries<'a, K, V> {
    inner: IndexIter<'a>,
    _types: PhantomData<fn() -> (K, V)>,
}

impl<'a, K, V> TypedEntries<'a, K, V> {
    const fn new(inner: IndexIter<'a>) -> Self {
        Self {
            inner,
            _types: PhantomData,
        }
    }
}

impl<K: RecordCodec, V: RecordCodec> Iterator for TypedEntries<'_, K, V> {
    type Item = Result<(K, V), IndexError>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.inner.next()?;
        Some(entry.and_then(|(key, value)| {
            Ok((decode_exact(&key)?, decode_exact(&value)?))
        }))
    }
}
