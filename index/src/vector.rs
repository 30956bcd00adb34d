//! Vector embedding generation.

use bindery_core::{
    BinderyError, CanonicalEntity, DocumentId, EmbeddingClient, HybridChunk, Result,
    VectorEmbeddingRow,
};
use tracing::info;
use uuid::Uuid;

/// Batch size per embedding call.
const EMBED_BATCH: usize = 64;

/// Embeds chunks and canonical entities into vector rows.
#[derive(Debug, Clone, Default)]
pub struct VectorIndexer;

impl VectorIndexer {
    /// Creates an indexer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Embeds every chunk, keyed by `(document, section_type)` with page
    /// provenance.
    ///
    /// # Errors
    ///
    /// Propagates embedding-client failures and dimension mismatches.
    pub async fn embed_chunks<E: EmbeddingClient>(
        &self,
        client: &E,
        document_id: DocumentId,
        chunks: &[HybridChunk],
    ) -> Result<Vec<VectorEmbeddingRow>> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embed_batched(client, &texts).await?;

        let rows = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, embedding)| VectorEmbeddingRow {
                id: Uuid::new_v4(),
                document_id,
                chunk_id: Some(chunk.id.clone()),
                canonical_entity_id: None,
                section_type: Some(chunk.section_type),
                entity_type: None,
                content: chunk.text.clone(),
                embedding,
                page_numbers: chunk.pages.clone(),
            })
            .collect::<Vec<_>>();

        info!(document_id = %document_id, rows = rows.len(), "chunk embeddings generated");
        Ok(rows)
    }

    /// Embeds canonical entities that carry textual content.
    ///
    /// # Errors
    ///
    /// Propagates embedding-client failures and dimension mismatches.
    pub async fn embed_entities<E: EmbeddingClient>(
        &self,
        client: &E,
        document_id: DocumentId,
        entities: &[CanonicalEntity],
    ) -> Result<Vec<VectorEmbeddingRow>> {
        let embeddable: Vec<&CanonicalEntity> =
            entities.iter().filter(|e| !e.name.trim().is_empty()).collect();
        let texts: Vec<String> = embeddable.iter().map(|e| entity_text(e)).collect();
        let vectors = embed_batched(client, &texts).await?;

        let rows = embeddable
            .iter()
            .zip(texts)
            .zip(vectors)
            .map(|((entity, content), embedding)| VectorEmbeddingRow {
                id: Uuid::new_v4(),
                document_id,
                chunk_id: None,
                canonical_entity_id: Some(entity.id),
                section_type: None,
                entity_type: Some(entity.entity_type),
                content,
                embedding,
                page_numbers: Vec::new(),
            })
            .collect::<Vec<_>>();

        info!(document_id = %document_id, rows = rows.len(), "entity embeddings generated");
        Ok(rows)
    }
}

/// Text rendition of an entity for embedding: name plus salient attributes.
fn entity_text(entity: &CanonicalEntity) -> String {
    let mut text = format!("{}: {}", entity.entity_type.as_str(), entity.name);
    for (key, value) in &entity.attributes {
        if let Some(string) = value.as_str() {
            text.push_str(&format!("; {key}: {string}"));
        }
    }
    text
}

async fn embed_batched<E: EmbeddingClient>(client: &E, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    let mut vectors = Vec::with_capacity(texts.len());
    for batch in texts.chunks(EMBED_BATCH) {
        let batch_vectors = client.embed(batch).await?;
        if batch_vectors.len() != batch.len() {
            return Err(BinderyError::InvariantViolation(format!(
                "embedding client returned {} vectors for {} texts",
                batch_vectors.len(),
                batch.len()
            )));
        }
        for vector in &batch_vectors {
            if vector.len() != client.dim() {
                return Err(BinderyError::InvariantViolation(format!(
                    "embedding dimension {} does not match client dimension {}",
                    vector.len(),
                    client.dim()
                )));
            }
        }
        vectors.extend(batch_vectors);
    }
    Ok(vectors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bindery_core::{ChunkId, EntityType, SectionType};
    use std::collections::BTreeMap;

    struct HashEmbedder {
        dim: usize,
    }

    impl EmbeddingClient for HashEmbedder {
        fn dim(&self) -> usize {
            self.dim
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = vec![0.0f32; self.dim];
                    for (i, b) in t.bytes().enumerate() {
                        v[i % self.dim] += f32::from(b) / 255.0;
                    }
                    v
                })
                .collect())
        }
    }

    fn chunk(text: &str, pages: Vec<u32>) -> HybridChunk {
        HybridChunk {
            id: ChunkId::new(format!("id-{text}")),
            document_id: DocumentId::generate(),
            text: text.to_owned(),
            token_count: 5,
            section_type: SectionType::Coverages,
            pages,
        }
    }

    #[tokio::test]
    async fn chunk_rows_carry_provenance() {
        let client = HashEmbedder { dim: 8 };
        let doc = DocumentId::generate();
        let rows = VectorIndexer::new()
            .embed_chunks(&client, doc, &[chunk("coverage text", vec![1, 3])])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].page_numbers, vec![1, 3]);
        assert_eq!(rows[0].section_type, Some(SectionType::Coverages));
        assert_eq!(rows[0].embedding.len(), 8);
        assert!(rows[0].chunk_id.is_some());
        assert!(rows[0].canonical_entity_id.is_none());
    }

    #[tokio::test]
    async fn entity_rows_reference_the_canonical_entity() {
        let client = HashEmbedder { dim: 4 };
        let doc = DocumentId::generate();
        let entity = CanonicalEntity {
            id: bindery_core::CanonicalEntityId::generate(),
            entity_type: EntityType::Policy,
            name: "POL-1".to_owned(),
            fingerprint: "policy:pol 1:".to_owned(),
            attributes: BTreeMap::new(),
            confidence: 0.9,
            mention_count: 1,
        };
        let rows = VectorIndexer::new()
            .embed_entities(&client, doc, &[entity.clone()])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].canonical_entity_id, Some(entity.id));
        assert_eq!(rows[0].entity_type, Some(EntityType::Policy));
        assert!(rows[0].content.contains("POL-1"));
    }

    #[tokio::test]
    async fn empty_input_embeds_nothing() {
        let client = HashEmbedder { dim: 4 };
        let rows = VectorIndexer::new()
            .embed_chunks(&client, DocumentId::generate(), &[])
            .await
            .unwrap();
        assert!(rows.is_empty());
    }
}
