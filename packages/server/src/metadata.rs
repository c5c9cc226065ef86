//! Records linking stored blobs to their owning entity.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder, Set,
};
use thiserror::Error;
use uuid::Uuid;

use crate::entity::screenshot_attachment;

/// Metadata for one stored screenshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAttachment {
    pub id: Uuid,
    pub owner_entity_id: String,
    pub caller_id: String,
    pub blob_path: String,
    pub content_type: String,
    pub size: i64,
    pub content_hash: String,
    pub source_url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("database error: {0}")]
    Database(#[from] DbErr),
    #[error("duplicate attachment record: {0}")]
    Duplicate(String),
}

#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn insert(&self, record: &StoredAttachment) -> Result<(), MetadataError>;

    /// The caller's records for one entity, newest first.
    async fn list_for_owner(
        &self,
        caller_id: &str,
        owner_entity_id: &str,
    ) -> Result<Vec<StoredAttachment>, MetadataError>;

    /// A single record, only if it belongs to `caller_id`.
    async fn get(&self, caller_id: &str, id: Uuid)
    -> Result<Option<StoredAttachment>, MetadataError>;
}

/// Postgres-backed store using the `screenshot_attachment` table.
pub struct SeaOrmMetadataStore {
    db: DatabaseConnection,
}

impl SeaOrmMetadataStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

impl From<screenshot_attachment::Model> for StoredAttachment {
    fn from(model: screenshot_attachment::Model) -> Self {
        Self {
            id: model.id,
            owner_entity_id: model.owner_entity_id,
            caller_id: model.caller_id,
            blob_path: model.blob_path,
            content_type: model.content_type,
            size: model.size,
            content_hash: model.content_hash,
            source_url: model.source_url,
            created_at: model.created_at,
        }
    }
}

#[async_trait]
impl MetadataStore for SeaOrmMetadataStore {
    async fn insert(&self, record: &StoredAttachment) -> Result<(), MetadataError> {
        let model = screenshot_attachment::ActiveModel {
            id: Set(record.id),
            owner_entity_id: Set(record.owner_entity_id.clone()),
            caller_id: Set(record.caller_id.clone()),
            blob_path: Set(record.blob_path.clone()),
            content_type: Set(record.content_type.clone()),
            size: Set(record.size),
            content_hash: Set(record.content_hash.clone()),
            source_url: Set(record.source_url.clone()),
            created_at: Set(record.created_at),
        };

        screenshot_attachment::Entity::insert(model)
            .exec_without_returning(&self.db)
            .await?;
        Ok(())
    }

    async fn list_for_owner(
        &self,
        caller_id: &str,
        owner_entity_id: &str,
    ) -> Result<Vec<StoredAttachment>, MetadataError> {
        let rows = screenshot_attachment::Entity::find()
            .filter(screenshot_attachment::Column::CallerId.eq(caller_id))
            .filter(screenshot_attachment::Column::OwnerEntityId.eq(owner_entity_id))
            .order_by_desc(screenshot_attachment::Column::CreatedAt)
            .all(&self.db)
            .await?;

        Ok(rows.into_iter().map(StoredAttachment::from).collect())
    }

    async fn get(
        &self,
        caller_id: &str,
        id: Uuid,
    ) -> Result<Option<StoredAttachment>, MetadataError> {
        let row = screenshot_attachment::Entity::find_by_id(id)
            .filter(screenshot_attachment::Column::CallerId.eq(caller_id))
            .one(&self.db)
            .await?;

        Ok(row.map(StoredAttachment::from))
    }
}

/// In-process store for local runs and tests. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryMetadataStore {
    records: DashMap<Uuid, StoredAttachment>,
    /// Unique index on `blob_path`.
    paths: DashMap<String, Uuid>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn insert(&self, record: &StoredAttachment) -> Result<(), MetadataError> {
        match self.paths.entry(record.blob_path.clone()) {
            Entry::Occupied(_) => Err(MetadataError::Duplicate(record.blob_path.clone())),
            Entry::Vacant(slot) => {
                slot.insert(record.id);
                self.records.insert(record.id, record.clone());
                Ok(())
            }
        }
    }

    async fn list_for_owner(
        &self,
        caller_id: &str,
        owner_entity_id: &str,
    ) -> Result<Vec<StoredAttachment>, MetadataError> {
        let mut rows: Vec<StoredAttachment> = self
            .records
            .iter()
            .filter(|entry| entry.caller_id == caller_id && entry.owner_entity_id == owner_entity_id)
            .map(|entry| entry.value().clone())
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn get(
        &self,
        caller_id: &str,
        id: Uuid,
    ) -> Result<Option<StoredAttachment>, MetadataError> {
        Ok(self
            .records
            .get(&id)
            .filter(|entry| entry.caller_id == caller_id)
            .map(|entry| entry.value().clone()))
    }
}
