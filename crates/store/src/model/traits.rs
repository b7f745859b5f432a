use crate::model::{KvTraverse, KvTraverseMut, RawValue, StoreError, StoreReadError};

/// Trait for ordered key-value stores with read/write transactions.
///
/// This is the top-level trait for store backends. It is a transaction
/// factory: all access goes through a [`RawKvRead`] or [`RawKvWrite`]
/// transaction.
///
/// When implementing this trait, consult the [`model`] module documentation
/// for details on the associated types and their requirements.
///
/// [`model`]: crate::model
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait RawKv {
    /// The read-only transaction type.
    type RoTx: RawKvRead;
    /// The read-write transaction type.
    type RwTx: RawKvWrite;

    /// Create a read-only transaction.
    fn reader(&self) -> Result<Self::RoTx, StoreError>;

    /// Create a read-write transaction.
    ///
    /// This is allowed to fail with [`Err(StoreError::WriteLocked)`] if
    /// multiple write transactions are not supported concurrently.
    ///
    /// # Returns
    ///
    /// - `Ok(tx)` if the write transaction was created successfully.
    /// - [`Err(StoreError::WriteLocked)`] if there is already a write
    ///   transaction in progress.
    /// - [`Err(StoreError::Inner)`] if there was an error creating the
    ///   transaction.
    ///
    /// [`Err(StoreError::Inner)`]: StoreError::Inner
    /// [`Err(StoreError::WriteLocked)`]: StoreError::WriteLocked
    fn writer(&self) -> Result<Self::RwTx, StoreError>;
}

/// Trait for store read transactions.
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait RawKvRead {
    /// Error type for read operations.
    type Error: StoreReadError;

    /// The cursor type for traversing key-value pairs.
    type Traverse<'a>: KvTraverse<Self::Error>
    where
        Self: 'a;

    /// Get a raw cursor to traverse the keyspace.
    ///
    /// The cursor is unpositioned until one of its positioning methods is
    /// called.
    fn raw_traverse<'a>(&'a self) -> Result<Self::Traverse<'a>, Self::Error>;

    /// Get a raw value by key.
    fn raw_get<'a>(&'a self, key: &[u8]) -> Result<Option<RawValue<'a>>, Self::Error>;

    /// Check whether a key is present, without copying its value out.
    fn raw_contains(&self, key: &[u8]) -> Result<bool, Self::Error> {
        self.raw_get(key).map(|v| v.is_some())
    }
}

/// Trait for store write transactions.
///
/// This extends the [`RawKvRead`] trait with write capabilities. Writes are
/// queued and only become visible to other transactions after
/// [`RawKvWrite::raw_commit`]. Reads made through the transaction itself
/// observe its queued writes.
pub trait RawKvWrite: RawKvRead {
    /// The mutable cursor type for traversing key-value pairs.
    type TraverseMut<'a>: KvTraverseMut<Self::Error>
    where
        Self: 'a;

    /// Get a raw mutable cursor to traverse the keyspace.
    ///
    /// The cursor sees committed entries merged with this transaction's
    /// queued writes.
    fn raw_traverse_mut<'a>(&'a self) -> Result<Self::TraverseMut<'a>, Self::Error>;

    /// Queue a raw put operation.
    fn queue_raw_put(&self, key: &[u8], value: &[u8]) -> Result<(), Self::Error>;

    /// Queue a raw delete operation.
    fn queue_raw_delete(&self, key: &[u8]) -> Result<(), Self::Error>;

    /// Queue removal of every entry in the store.
    fn queue_raw_clear(&self) -> Result<(), Self::Error>;

    /// Commit the transaction, applying all queued operations atomically.
    fn raw_commit(self) -> Result<(), Self::Error>;

    /// Queue a put for each entry, in iteration order.
    fn queue_put_many<'k, I>(&self, entries: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = (&'k [u8], &'k [u8])>,
    {
        entries.into_iter().try_for_each(|(key, value)| self.queue_raw_put(key, value))
    }

    /// Queue a delete for each key.
    fn queue_delete_many<'k, I>(&self, keys: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = &'k [u8]>,
    {
        keys.into_iter().try_for_each(|key| self.queue_raw_delete(key))
    }

    /// Queue deletion of every entry whose key starts with `prefix`.
    ///
    /// An empty prefix clears the whole store.
    fn clear_prefix(&self, prefix: &[u8]) -> Result<(), Self::Error> {
        if prefix.is_empty() {
            return self.queue_raw_clear();
        }
        let mut cursor = self.raw_traverse_mut()?;
        cursor.delete_prefix(prefix)
    }
}
