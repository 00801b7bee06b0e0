//! Database listing collaborator
//!
//! Consumed once at session setup to populate the database choice; the ask
//! pipeline only needs the `database_id` values returned here.

use tracing::debug;

use super::types::{DatabaseInfo, DatabaseListResponse};
use super::ApiClient;
use crate::error::GenBiError;

impl ApiClient {
    /// List all databases indexed on the backend
    pub async fn list_databases(&self) -> Result<Vec<DatabaseInfo>, GenBiError> {
        let response = self.get("/api/v1/databases").send().await?;
        let response = self.handle_error_response(response).await?;
        let list: DatabaseListResponse = response.json().await?;
        debug!("Listed {} databases", list.databases.len());
        Ok(list.databases)
    }
}
