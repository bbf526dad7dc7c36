//! Wire types for the extraction backend.
//!
//! Error responses are JSON with an `error` string field; extraction
//! responses are plain text bodies except the repos, Slack-context, filter
//! and enhance endpoints, which return JSON.

use serde::{Deserialize, Serialize};

/// One repository from `GET /api/github/repos`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoInfo {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReposResponse {
    #[serde(default)]
    pub repos: Vec<RepoInfo>,
}

#[derive(Debug, Deserialize)]
pub struct SlackContextData {
    pub context_text: String,
}

#[derive(Debug, Deserialize)]
pub struct SlackContextResponse {
    pub data: SlackContextData,
}

/// Body for `POST /api/extract/github`: either the legacy personal-access
/// -token form or the OAuth-identity form.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum GithubExtractRequest {
    Token {
        token: String,
        username: String,
        repo: Option<String>,
    },
    User {
        user_id: String,
        username: String,
        repo: String,
    },
}

#[derive(Debug, Serialize)]
pub struct WebsiteExtractRequest {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct FirebaseExtractRequest {
    #[serde(rename = "projectId")]
    pub project_id: String,
    #[serde(rename = "serviceAccountKey")]
    pub service_account_key: String,
}

#[derive(Debug, Serialize)]
pub struct SupabaseExtractRequest {
    #[serde(rename = "projectUrl")]
    pub project_url: String,
    #[serde(rename = "serviceRoleKey")]
    pub service_role_key: String,
}

#[derive(Debug, Serialize)]
pub struct FilterRequest {
    pub context: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilterStats {
    pub original_size: u64,
    pub filtered_size: u64,
    pub reduction_percent: f64,
}

#[derive(Debug, Deserialize)]
pub struct FilterResponse {
    #[serde(rename = "filteredContext")]
    pub filtered_context: String,
    pub stats: FilterStats,
}

#[derive(Debug, Serialize)]
pub struct EnhanceRequest {
    pub prompt: String,
    #[serde(rename = "contextSummary")]
    pub context_summary: String,
}

#[derive(Debug, Deserialize)]
pub struct EnhanceResponse {
    #[serde(rename = "enhancedPrompt")]
    pub enhanced_prompt: String,
}

/// The backend's error body shape.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
