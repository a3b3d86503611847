//! Remote CRUD API access

mod client;

pub use client::ApiClient;

use async_trait::async_trait;

use crate::errors::Result;
use crate::models::CollectionFull;

/// Source of full collections for scheduled runs
#[async_trait]
pub trait CollectionSource: Send + Sync {
    async fn get_collection(&self, collection_id: &str) -> Result<CollectionFull>;
}
