//! Response types for the GenBI REST API

use chrono::NaiveDateTime;
use serde::Deserialize;

/// A configured database, as returned by the listing endpoint
///
/// Credentials are never returned by the backend; this is display data only.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseInfo {
    pub database_id: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub database_name: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DatabaseListResponse {
    pub databases: Vec<DatabaseInfo>,
}

/// Free-form guidance about a database (business rules, value meanings)
#[derive(Debug, Clone, Deserialize)]
pub struct KnowledgeBaseInstruction {
    #[serde(default)]
    pub id: Option<String>,
    pub database_id: String,
    pub title: String,
    pub content: String,
    pub created_at: NaiveDateTime,
}

/// A question/SQL example used to guide future generations
#[derive(Debug, Clone, Deserialize)]
pub struct KnowledgeBaseSqlPair {
    #[serde(default)]
    pub id: Option<String>,
    pub database_id: String,
    pub question: String,
    pub sql: String,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
}

/// All knowledge base entries for one database
#[derive(Debug, Deserialize)]
pub struct KnowledgeBaseListing {
    pub instructions: Vec<KnowledgeBaseInstruction>,
    pub sql_pairs: Vec<KnowledgeBaseSqlPair>,
    pub total_count: usize,
}
