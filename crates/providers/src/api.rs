//! HTTP client for the extraction backend.
//!
//! All error responses are JSON with an `error` string; extraction bodies
//! are plain text except the repos, Slack-context, filter and enhance
//! endpoints. A non-2xx status maps to `ContextError::Backend`, a transport
//! rejection to `ContextError::Network`; neither is retried.

use reqwest::{Client, RequestBuilder, Response};
use shared::backend_api::{
    EnhanceRequest, EnhanceResponse, ErrorResponse, FilterRequest, FilterResponse,
    FirebaseExtractRequest, GithubExtractRequest, RepoInfo, ReposResponse, SlackContextResponse,
    SupabaseExtractRequest, WebsiteExtractRequest,
};
use shared::error::ContextError;
use shared::settings::AppSettings;

/// Header expected by the tunneling proxy in front of the backend.
const BYPASS_HEADER: &str = "ngrok-skip-browser-warning";

#[derive(Debug, Clone)]
pub struct BackendClient {
    http: Client,
    base_url: String,
    send_bypass_header: bool,
}

impl BackendClient {
    pub fn new(settings: &AppSettings) -> Self {
        Self {
            http: Client::new(),
            base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            send_bypass_header: settings.send_bypass_header,
        }
    }

    /// Client against an explicit base URL with default settings.
    pub fn from_base_url(base_url: impl Into<String>) -> Self {
        let settings = AppSettings {
            api_base_url: base_url.into(),
            ..AppSettings::default()
        };
        Self::new(&settings)
    }

    /// Browser-navigable OAuth start for GitHub.
    pub fn github_install_url(&self) -> String {
        format!("{}/api/github/install", self.base_url)
    }

    /// Browser-navigable OAuth start for Slack.
    pub fn slack_install_url(&self) -> String {
        format!("{}/api/slack/install", self.base_url)
    }

    pub async fn list_repos(&self, user_id: &str) -> Result<Vec<RepoInfo>, ContextError> {
        let resp = self
            .get("/api/github/repos")
            .query(&[("user_id", user_id)])
            .send()
            .await
            .map_err(reject)?;
        let body: ReposResponse = expect_ok(resp).await?.json().await.map_err(reject)?;
        Ok(body.repos)
    }

    pub async fn extract_github(&self, req: &GithubExtractRequest) -> Result<String, ContextError> {
        self.extract("/api/extract/github", req).await
    }

    pub async fn slack_context(&self, session_id: &str) -> Result<String, ContextError> {
        let resp = self
            .get(&format!("/api/slack/context/{}", session_id))
            .send()
            .await
            .map_err(reject)?;
        let body: SlackContextResponse = expect_ok(resp).await?.json().await.map_err(reject)?;
        Ok(body.data.context_text)
    }

    pub async fn extract_website(&self, url: &str) -> Result<String, ContextError> {
        self.extract(
            "/api/extract/website",
            &WebsiteExtractRequest {
                url: url.to_string(),
            },
        )
        .await
    }

    pub async fn extract_firebase(
        &self,
        req: &FirebaseExtractRequest,
    ) -> Result<String, ContextError> {
        self.extract("/api/extract/firebase", req).await
    }

    pub async fn extract_supabase(
        &self,
        req: &SupabaseExtractRequest,
    ) -> Result<String, ContextError> {
        self.extract("/api/extract/supabase", req).await
    }

    pub async fn filter_context(&self, context: &str) -> Result<FilterResponse, ContextError> {
        let resp = self
            .post("/api/filter-context")
            .json(&FilterRequest {
                context: context.to_string(),
            })
            .send()
            .await
            .map_err(reject)?;
        expect_ok(resp).await?.json().await.map_err(reject)
    }

    pub async fn enhance_prompt(
        &self,
        prompt: &str,
        context_summary: &str,
    ) -> Result<String, ContextError> {
        let resp = self
            .post("/api/enhance-prompt")
            .json(&EnhanceRequest {
                prompt: prompt.to_string(),
                context_summary: context_summary.to_string(),
            })
            .send()
            .await
            .map_err(reject)?;
        let body: EnhanceResponse = expect_ok(resp).await?.json().await.map_err(reject)?;
        Ok(body.enhanced_prompt)
    }

    /// POST a JSON body and return the plain-text extraction result.
    async fn extract<B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<String, ContextError> {
        let resp = self.post(path).json(body).send().await.map_err(reject)?;
        expect_ok(resp).await?.text().await.map_err(reject)
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.decorate(self.http.get(format!("{}{}", self.base_url, path)))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.decorate(self.http.post(format!("{}{}", self.base_url, path)))
    }

    fn decorate(&self, builder: RequestBuilder) -> RequestBuilder {
        if self.send_bypass_header {
            builder.header(BYPASS_HEADER, "true")
        } else {
            builder
        }
    }
}

fn reject(e: reqwest::Error) -> ContextError {
    ContextError::network(e.to_string())
}

/// Map a non-2xx response to `Backend`, preferring the JSON `error` field.
async fn expect_ok(resp: Response) -> Result<Response, ContextError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(err) => err.error,
        Err(_) => body.trim().to_string(),
    };
    let message = if message.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        message
    };
    Err(ContextError::Backend {
        status: status.as_u16(),
        message,
    })
}
