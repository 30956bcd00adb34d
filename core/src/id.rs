//! Stable identifiers for pipeline rows.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a fresh random identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID.
            #[must_use]
            pub const fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Returns the inner UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

uuid_id! {
    /// Opaque identifier of an ingested document.
    DocumentId
}
uuid_id! {
    /// Identifier of one workflow run; scopes graph nodes and saga logs.
    WorkflowId
}
uuid_id! {
    /// Identifier of a canonical (document-agnostic) entity.
    CanonicalEntityId
}
uuid_id! {
    /// Identifier of an entity relationship row.
    RelationshipId
}
uuid_id! {
    /// Identifier of a persisted section extraction.
    ExtractionId
}

/// Content-hash identifier of a hybrid chunk.
///
/// Derived from the chunk text and section type, so two runs over the same
/// input produce identical ids and downstream references stay reproducible.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkId(String);

impl ChunkId {
    /// Wraps a precomputed content hash.
    #[must_use]
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable identifier of an extracted table.
///
/// Derived from `(document, page, table index)` so re-extraction yields the
/// same id and SOV/loss-run rows keep their references.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableId(String);

impl TableId {
    /// Derives the id for a table at `(page_number, table_index)` of a document.
    #[must_use]
    pub fn derive(document_id: DocumentId, page_number: u32, table_index: u32) -> Self {
        Self(format!("{document_id}-p{page_number}-t{table_index}"))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_id_is_deterministic() {
        let doc = DocumentId::generate();
        assert_eq!(TableId::derive(doc, 3, 0), TableId::derive(doc, 3, 0));
        assert_ne!(TableId::derive(doc, 3, 0), TableId::derive(doc, 3, 1));
    }

    #[test]
    fn document_id_round_trips_through_serde() {
        let id = DocumentId::generate();
        let json = serde_json::to_string(&id).unwrap();
        let back: DocumentId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
