//! Qdrant collection store backend.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PointStruct, SearchPointsBuilder, UpsertPointsBuilder,
    VectorParamsBuilder, value::Kind,
};

use super::{CollectionStore, ScoredChunk};
use crate::error::VectorStoreError;
use crate::models::{Chunk, VectorStoreConfig};

pub struct QdrantStore {
    client: Qdrant,
    embedding_dim: u64,
}

impl QdrantStore {
    pub fn new(config: &VectorStoreConfig, embedding_dim: u64) -> Result<Self, VectorStoreError> {
        let mut builder =
            Qdrant::from_url(&config.url).timeout(Duration::from_secs(config.timeout_secs));

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
        }

        let client = builder
            .build()
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            embedding_dim,
        })
    }

    async fn collection_exists(&self, name: &str) -> Result<bool, VectorStoreError> {
        match self.client.collection_info(name).await {
            Ok(_) => Ok(true),
            Err(e) => {
                let msg = e.to_string();
                if msg.contains("not found") || msg.contains("doesn't exist") {
                    Ok(false)
                } else {
                    Err(VectorStoreError::CollectionError(msg))
                }
            }
        }
    }
}

fn payload_str(payload: &HashMap<String, qdrant_client::qdrant::Value>, key: &str) -> String {
    payload
        .get(key)
        .and_then(|v| match &v.kind {
            Some(Kind::StringValue(s)) => Some(s.clone()),
            _ => None,
        })
        .unwrap_or_default()
}

fn payload_u32(payload: &HashMap<String, qdrant_client::qdrant::Value>, key: &str) -> u32 {
    payload
        .get(key)
        .and_then(|v| match &v.kind {
            Some(Kind::IntegerValue(n)) => Some(*n as u32),
            _ => None,
        })
        .unwrap_or_default()
}

#[async_trait]
impl CollectionStore for QdrantStore {
    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        self.client
            .health_check()
            .await
            .map(|_| true)
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))
    }

    async fn create(&self, name: &str) -> Result<(), VectorStoreError> {
        if self.collection_exists(name).await? {
            return Ok(());
        }

        let create = CreateCollectionBuilder::new(name).vectors_config(VectorParamsBuilder::new(
            self.embedding_dim,
            Distance::Cosine,
        ));

        self.client
            .create_collection(create)
            .await
            .map_err(|e| VectorStoreError::CollectionError(e.to_string()))?;

        Ok(())
    }

    async fn exists(&self, name: &str) -> Result<bool, VectorStoreError> {
        self.collection_exists(name).await
    }

    async fn append(&self, name: &str, chunks: Vec<Chunk>) -> Result<(), VectorStoreError> {
        if chunks.is_empty() {
            return Ok(());
        }
        if !self.collection_exists(name).await? {
            return Err(VectorStoreError::CollectionNotFound(name.to_string()));
        }

        let points: Vec<PointStruct> = chunks
            .into_iter()
            .map(|chunk| {
                let id = Chunk::point_id(name, chunk.chunk_index);
                let mut payload: HashMap<String, qdrant_client::qdrant::Value> = HashMap::new();
                payload.insert("text".to_string(), chunk.text.into());
                payload.insert("filename".to_string(), chunk.filename.into());
                payload.insert("page".to_string(), i64::from(chunk.page).into());
                payload.insert(
                    "chunk_index".to_string(),
                    i64::from(chunk.chunk_index).into(),
                );
                payload.insert("start_offset".to_string(), (chunk.start_offset as i64).into());
                payload.insert("end_offset".to_string(), (chunk.end_offset as i64).into());

                PointStruct::new(id, chunk.embedding, payload)
            })
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(name, points))
            .await
            .map_err(|e| VectorStoreError::AppendError(e.to_string()))?;

        Ok(())
    }

    async fn search(
        &self,
        name: &str,
        query_vector: &[f32],
        top_n: usize,
    ) -> Result<Vec<ScoredChunk>, VectorStoreError> {
        let search =
            SearchPointsBuilder::new(name, query_vector.to_vec(), top_n as u64).with_payload(true);

        let results = self.client.search_points(search).await.map_err(|e| {
            let msg = e.to_string();
            if msg.contains("not found") || msg.contains("doesn't exist") {
                VectorStoreError::CollectionNotFound(name.to_string())
            } else {
                VectorStoreError::SearchError(msg)
            }
        })?;

        Ok(results
            .result
            .into_iter()
            .map(|point| ScoredChunk {
                text: payload_str(&point.payload, "text"),
                filename: payload_str(&point.payload, "filename"),
                page: payload_u32(&point.payload, "page"),
                chunk_index: payload_u32(&point.payload, "chunk_index"),
                score: point.score,
            })
            .collect())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, VectorStoreError> {
        let response = self
            .client
            .list_collections()
            .await
            .map_err(|e| VectorStoreError::CollectionError(e.to_string()))?;

        let mut names: Vec<String> = response
            .collections
            .into_iter()
            .map(|c| c.name)
            .filter(|name| name.starts_with(prefix))
            .collect();
        names.sort();
        Ok(names)
    }

    async fn count(&self, name: &str) -> Result<u64, VectorStoreError> {
        match self.client.collection_info(name).await {
            Ok(info) => Ok(info.result.map_or(0, |r| r.points_count.unwrap_or(0))),
            Err(e) => {
                let msg = e.to_string();
                if msg.contains("not found") || msg.contains("doesn't exist") {
                    Err(VectorStoreError::CollectionNotFound(name.to_string()))
                } else {
                    Err(VectorStoreError::CollectionError(msg))
                }
            }
        }
    }

    async fn delete(&self, name: &str) -> Result<(), VectorStoreError> {
        if !self.collection_exists(name).await? {
            return Err(VectorStoreError::CollectionNotFound(name.to_string()));
        }

        self.client
            .delete_collection(name)
            .await
            .map_err(|e| VectorStoreError::DeleteError(e.to_string()))?;

        Ok(())
    }
}
