//! Typed record access over the shared state store
//!
//! Every entity kind lives in the same key space, addressed by its `id`.
//! Records are stored as JSON with a `docType` discriminator, and every read
//! checks the discriminator against the kind the caller asked for: a
//! mismatch is an ID collision or corruption, never absence.

use crate::{
    error::{Error, Result},
    storage::StateStore,
    types::EntityKind,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;

/// A persisted entity
pub trait Record: Serialize + DeserializeOwned {
    /// Discriminator written with, and checked on, every record of this type
    const KIND: EntityKind;

    /// Store key
    fn id(&self) -> &str;
}

#[derive(Serialize)]
struct Envelope<'r, R> {
    #[serde(rename = "docType")]
    doc_type: &'static str,
    #[serde(flatten)]
    record: &'r R,
}

#[derive(Deserialize)]
struct Header {
    #[serde(rename = "docType", default)]
    doc_type: String,
}

/// Typed access to records in a [`StateStore`]
pub struct Repository<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for Repository<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: ?Sized> std::fmt::Debug for Repository<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository").finish_non_exhaustive()
    }
}

impl<S: StateStore + ?Sized> Repository<S> {
    /// Wrap a store
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Underlying store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Read a record; absence is `NotFound`
    pub fn get<R: Record>(&self, id: &str) -> Result<R> {
        self.try_get(id)?.ok_or_else(|| Error::NotFound {
            kind: R::KIND,
            id: id.to_string(),
        })
    }

    /// Read a record; absence is `None`
    pub fn try_get<R: Record>(&self, id: &str) -> Result<Option<R>> {
        let Some(bytes) = self.store.get(id)? else {
            return Ok(None);
        };

        let header: Header = serde_json::from_slice(&bytes)?;
        if header.doc_type != R::KIND.as_str() {
            tracing::error!(
                id,
                expected = R::KIND.as_str(),
                found = header.doc_type.as_str(),
                "Discriminator mismatch on read"
            );
            return Err(Error::TypeMismatch {
                id: id.to_string(),
                expected: R::KIND,
                found: header.doc_type,
            });
        }

        let record: R = serde_json::from_slice(&bytes)?;
        tracing::debug!(id, kind = R::KIND.as_str(), "Record read");
        Ok(Some(record))
    }

    /// True when any record (of any kind) is stored under `id`
    pub fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.store.get(id)?.is_some())
    }

    /// Write a record, replacing whatever is stored under its key
    pub fn put<R: Record>(&self, record: &R) -> Result<()> {
        let value = serde_json::to_vec(&Envelope {
            doc_type: R::KIND.as_str(),
            record,
        })?;
        self.store.put(record.id(), &value)?;

        tracing::debug!(id = record.id(), kind = R::KIND.as_str(), "Record written");
        Ok(())
    }

    /// Write a new record; fails without writing if the key is taken
    pub fn insert<R: Record>(&self, record: &R) -> Result<()> {
        if self.exists(record.id())? {
            tracing::warn!(id = record.id(), kind = R::KIND.as_str(), "Record already exists");
            return Err(Error::AlreadyExists {
                kind: R::KIND,
                id: record.id().to_string(),
            });
        }
        self.put(record)
    }

    /// Administrative delete of a single document
    pub fn delete(&self, id: &str) -> Result<()> {
        if id.is_empty() {
            return Err(Error::InvalidArgument("cannot delete empty ID".to_string()));
        }
        self.store.delete(id)?;
        tracing::info!(id, "Document deleted");
        Ok(())
    }

    /// Administrative bulk purge of every record of the given kinds
    ///
    /// Records whose discriminator is unknown or not listed are left alone.
    pub fn purge(&self, kinds: &[EntityKind]) -> Result<usize> {
        let mut deleted = 0;

        for key in self.store.keys()? {
            let Some(bytes) = self.store.get(&key)? else {
                continue;
            };

            let kind = serde_json::from_slice::<Header>(&bytes)
                .ok()
                .and_then(|h| EntityKind::parse(&h.doc_type));

            if matches!(kind, Some(k) if kinds.contains(&k)) {
                self.store.delete(&key)?;
                deleted += 1;
            }
        }

        tracing::info!(deleted, ?kinds, "Purge complete");
        Ok(deleted)
    }
}
