use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "screenshot_attachment")]
pub struct Model {
    /// UUIDv7 primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Business record (contact, company) the screenshot belongs to.
    pub owner_entity_id: String,

    /// Identity-provider user id of the uploader.
    pub caller_id: String,

    /// Blob sink path, `{caller_id}/{owner_entity_id}/{millis}.{ext}`.
    #[sea_orm(unique)]
    pub blob_path: String,

    pub content_type: String,

    pub size: i64,

    /// SHA-256 of the stored bytes.
    pub content_hash: String,

    /// URL the bytes were actually downloaded from.
    pub source_url: String,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
