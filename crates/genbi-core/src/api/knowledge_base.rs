//! Knowledge base collaborator
//!
//! Instructions and question/SQL pairs that steer future generations. The
//! ask session's save action goes through [`ApiClient::add_sql_pair`];
//! everything else is plain CRUD for the management screens.

use tracing::info;

use super::types::{KnowledgeBaseInstruction, KnowledgeBaseListing, KnowledgeBaseSqlPair};
use super::ApiClient;
use crate::error::GenBiError;

impl ApiClient {
    /// Fetch all knowledge base entries for a database
    pub async fn knowledge_base(
        &self,
        database_id: &str,
    ) -> Result<KnowledgeBaseListing, GenBiError> {
        let path = format!("/api/v1/databases/{database_id}/knowledge-base");
        let response = self.get(&path).send().await?;
        let response = self.handle_error_response(response).await?;
        Ok(response.json().await?)
    }

    /// Store a question/SQL pair as an example for future queries
    pub async fn add_sql_pair(
        &self,
        database_id: &str,
        question: &str,
        sql: &str,
        description: Option<&str>,
    ) -> Result<KnowledgeBaseSqlPair, GenBiError> {
        let path = format!("/api/v1/databases/{database_id}/knowledge-base/sql-pairs");
        let body = serde_json::json!({
            "database_id": database_id,
            "question": question,
            "sql": sql,
            "description": description,
        });

        let response = self.post(&path).json(&body).send().await?;
        let response = self.handle_error_response(response).await?;
        let pair: KnowledgeBaseSqlPair = response.json().await?;
        info!("Saved SQL pair to knowledge base for {database_id}");
        Ok(pair)
    }

    /// Store a free-form instruction about a database
    pub async fn add_instruction(
        &self,
        database_id: &str,
        title: &str,
        content: &str,
    ) -> Result<KnowledgeBaseInstruction, GenBiError> {
        let path = format!("/api/v1/databases/{database_id}/knowledge-base/instructions");
        let body = serde_json::json!({
            "database_id": database_id,
            "title": title,
            "content": content,
        });

        let response = self.post(&path).json(&body).send().await?;
        let response = self.handle_error_response(response).await?;
        Ok(response.json().await?)
    }

    /// Delete an instruction by id
    pub async fn delete_instruction(&self, instruction_id: &str) -> Result<(), GenBiError> {
        let path = format!("/api/v1/knowledge-base/instructions/{instruction_id}");
        let response = self.delete(&path).send().await?;
        self.handle_error_response(response).await?;
        Ok(())
    }

    /// Delete a question/SQL pair by id
    pub async fn delete_sql_pair(&self, pair_id: &str) -> Result<(), GenBiError> {
        let path = format!("/api/v1/knowledge-base/sql-pairs/{pair_id}");
        let response = self.delete(&path).send().await?;
        self.handle_error_response(response).await?;
        Ok(())
    }
}
