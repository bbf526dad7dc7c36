//! The authorization bridge.
//!
//! Bridges provider authorization flows back into the session's context
//! store: popup-based OAuth results arrive over the typed message bus,
//! redirect-style callbacks arrive as query strings from the loopback
//! listener, and direct extractions go straight to the backend. The bridge
//! is constructed with an explicit role instead of sniffing its environment:
//! a `Popup` bridge forwards results to its opener and asks to be closed, a
//! `Main` bridge appends to the store itself.

use std::sync::Arc;

use parking_lot::Mutex;
use url::Url;

use shared::backend_api::{
    FirebaseExtractRequest, GithubExtractRequest, RepoInfo, SupabaseExtractRequest,
};
use shared::context::{ContextItem, ContextStore, SourceKind};
use shared::error::ContextError;
use shared::flow::ProviderFlows;
use shared::message::{BridgeMessage, SlackRedirect};

use crate::api::BackendClient;
use crate::bus::BusSender;

/// Which window this bridge instance serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeRole {
    /// The long-lived session window; results are appended locally.
    Main,
    /// A transient authorization window; results are forwarded to the
    /// opener and the window asks to close.
    Popup,
}

/// Established GitHub identity from a `github_connected` message.
#[derive(Debug, Clone)]
pub struct GithubUser {
    pub user_id: String,
    pub username: String,
}

/// Result of starting the GitHub flow.
#[derive(Debug)]
pub enum GithubStart {
    /// An identity already exists; repositories are ready for selection.
    ReposLoaded(Vec<RepoInfo>),
    /// The authorization page was opened in the browser.
    AuthorizationOpened,
}

/// Result of processing one bus message.
#[derive(Debug)]
pub enum MessageOutcome {
    /// A context item was appended to the store.
    Appended { kind: SourceKind, name: String },
    /// GitHub identity established; repositories ready for selection.
    ReposLoaded(Vec<RepoInfo>),
}

/// Result of processing a pending redirect callback.
#[derive(Debug)]
pub enum RedirectOutcome {
    /// Main role: the extracted context was appended to the store.
    Appended { name: String },
    /// Popup role: the result was forwarded to the opener; the host should
    /// close this window.
    ForwardedToOpener { name: String },
    /// The callback carried error markers or the context fetch failed;
    /// `close` is set in popup role.
    Failed { message: String, close: bool },
    /// No pending redirect, or no recognizable markers.
    Ignored,
}

type Opener = Box<dyn Fn(&str) -> anyhow::Result<()> + Send + Sync>;

pub struct OAuthBridge {
    role: BridgeRole,
    client: BackendClient,
    store: Arc<Mutex<ContextStore>>,
    bus: BusSender,
    flows: ProviderFlows,
    github_user: Option<GithubUser>,
    pending_redirect: Option<SlackRedirect>,
    opener: Opener,
}

impl OAuthBridge {
    pub fn new(
        role: BridgeRole,
        client: BackendClient,
        store: Arc<Mutex<ContextStore>>,
        bus: BusSender,
    ) -> Self {
        Self {
            role,
            client,
            store,
            bus,
            flows: ProviderFlows::new(),
            github_user: None,
            pending_redirect: None,
            opener: Box::new(|target| open::that(target).map_err(Into::into)),
        }
    }

    /// Replace the browser opener (tests).
    pub fn with_opener(mut self, opener: Opener) -> Self {
        self.opener = opener;
        self
    }

    pub fn role(&self) -> BridgeRole {
        self.role
    }

    pub fn flows(&self) -> &ProviderFlows {
        &self.flows
    }

    pub fn github_user(&self) -> Option<&GithubUser> {
        self.github_user.as_ref()
    }

    /// Start the GitHub flow: with an established identity skip straight to
    /// the repository listing, otherwise open the authorization page.
    pub async fn start_github(&mut self) -> Result<GithubStart, ContextError> {
        if let Some(user) = self.github_user.clone() {
            let repos = self.client.list_repos(&user.user_id).await?;
            return Ok(GithubStart::ReposLoaded(repos));
        }
        if !self.flows.begin(SourceKind::GitHub) {
            return Err(ContextError::user_input(
                "GitHub authorization is already in progress",
            ));
        }
        if let Err(e) = self.open_browser(&self.client.github_install_url()) {
            self.flows.fail(SourceKind::GitHub);
            self.flows.settle(SourceKind::GitHub);
            return Err(e);
        }
        Ok(GithubStart::AuthorizationOpened)
    }

    /// Open the Slack authorization page; the result comes back either over
    /// the bus or as a redirect callback.
    pub fn start_slack(&mut self) -> Result<(), ContextError> {
        if !self.flows.begin(SourceKind::Slack) {
            return Err(ContextError::user_input(
                "Slack authorization is already in progress",
            ));
        }
        if let Err(e) = self.open_browser(&self.client.slack_install_url()) {
            self.flows.fail(SourceKind::Slack);
            self.flows.settle(SourceKind::Slack);
            return Err(e);
        }
        Ok(())
    }

    /// Record an incoming callback query string. Loads without result
    /// markers are ignored. The stored redirect is consumed exactly once by
    /// `handle_slack_redirect`; reprocessing after that sees nothing.
    pub fn deliver_redirect(&mut self, query: &str) {
        if let Some(redirect) = SlackRedirect::from_query(query) {
            self.pending_redirect = Some(redirect);
        }
    }

    /// Process the pending redirect, if any.
    pub async fn handle_slack_redirect(&mut self) -> RedirectOutcome {
        let Some(redirect) = self.pending_redirect.take() else {
            return RedirectOutcome::Ignored;
        };

        match redirect {
            SlackRedirect::Error { message } => {
                self.flows.fail(SourceKind::Slack);
                self.flows.settle(SourceKind::Slack);
                RedirectOutcome::Failed {
                    message: format!(
                        "Slack OAuth error: {}",
                        message.as_deref().unwrap_or("Unknown error occurred")
                    ),
                    close: self.role == BridgeRole::Popup,
                }
            }
            success @ SlackRedirect::Success { .. } => {
                let name = success.context_name();
                let SlackRedirect::Success { session, .. } = &success else {
                    unreachable!("matched Success above");
                };
                match self.client.slack_context(session).await {
                    Ok(text) => {
                        self.flows.complete(SourceKind::Slack);
                        let outcome = match self.role {
                            BridgeRole::Popup => {
                                self.bus.post(BridgeMessage::SlackContext {
                                    name: name.clone(),
                                    content: text,
                                });
                                RedirectOutcome::ForwardedToOpener { name }
                            }
                            BridgeRole::Main => {
                                self.append_item(SourceKind::Slack, &name, text);
                                RedirectOutcome::Appended { name }
                            }
                        };
                        self.flows.settle(SourceKind::Slack);
                        outcome
                    }
                    Err(e) => {
                        self.flows.fail(SourceKind::Slack);
                        self.flows.settle(SourceKind::Slack);
                        RedirectOutcome::Failed {
                            message: e.to_string(),
                            close: self.role == BridgeRole::Popup,
                        }
                    }
                }
            }
        }
    }

    /// Process one validated bus message.
    pub async fn handle_message(
        &mut self,
        message: BridgeMessage,
    ) -> Result<MessageOutcome, ContextError> {
        match message {
            BridgeMessage::SlackContext { name, content } => {
                self.flows.complete(SourceKind::Slack);
                self.append_item(SourceKind::Slack, &name, content);
                self.flows.settle(SourceKind::Slack);
                Ok(MessageOutcome::Appended {
                    kind: SourceKind::Slack,
                    name,
                })
            }
            BridgeMessage::GithubConnected { user_id, username } => {
                self.github_user = Some(GithubUser {
                    user_id: user_id.clone(),
                    username,
                });
                match self.client.list_repos(&user_id).await {
                    Ok(repos) => {
                        self.flows.complete(SourceKind::GitHub);
                        self.flows.settle(SourceKind::GitHub);
                        Ok(MessageOutcome::ReposLoaded(repos))
                    }
                    Err(e) => {
                        self.flows.fail(SourceKind::GitHub);
                        self.flows.settle(SourceKind::GitHub);
                        Err(e)
                    }
                }
            }
        }
    }

    /// Extract the chosen repository using the established identity.
    pub async fn select_repository(&mut self, repo: &RepoInfo) -> Result<String, ContextError> {
        let user = self
            .github_user
            .clone()
            .ok_or_else(|| ContextError::user_input("Connect GitHub before selecting a repository"))?;
        if !self.flows.begin(SourceKind::GitHub) {
            return Err(ContextError::user_input(
                "A GitHub extraction is already in progress",
            ));
        }
        let request = GithubExtractRequest::User {
            user_id: user.user_id,
            username: user.username,
            repo: repo.full_name.clone(),
        };
        match self.client.extract_github(&request).await {
            Ok(text) => Ok(self.settle_ok(SourceKind::GitHub, repo.full_name.clone(), text)),
            Err(e) => Err(self.settle_err(SourceKind::GitHub, e)),
        }
    }

    /// Legacy path: a personal access token plus username, with an optional
    /// repository, skipping the identity step entirely.
    pub async fn extract_github_token(
        &mut self,
        token: &str,
        username: &str,
        repo: Option<&str>,
    ) -> Result<String, ContextError> {
        if token.trim().is_empty() || username.trim().is_empty() {
            return Err(ContextError::user_input(
                "Please provide at least a GitHub token and username",
            ));
        }
        if !self.flows.begin(SourceKind::GitHub) {
            return Err(ContextError::user_input(
                "A GitHub extraction is already in progress",
            ));
        }
        let name = match repo {
            Some(repo) => format!("{}/{}", username, repo),
            None => format!("{} (all repos)", username),
        };
        let request = GithubExtractRequest::Token {
            token: token.to_string(),
            username: username.to_string(),
            repo: repo.map(str::to_string),
        };
        match self.client.extract_github(&request).await {
            Ok(text) => Ok(self.settle_ok(SourceKind::GitHub, name, text)),
            Err(e) => Err(self.settle_err(SourceKind::GitHub, e)),
        }
    }

    /// Direct website extraction. A scheme-less URL gets `https://`
    /// prepended; the item is named after the host without a leading `www.`.
    pub async fn extract_website(&mut self, raw_url: &str) -> Result<String, ContextError> {
        let raw_url = raw_url.trim();
        if raw_url.is_empty() {
            return Err(ContextError::user_input("Please enter a website URL"));
        }
        let full_url = if raw_url.starts_with("http://") || raw_url.starts_with("https://") {
            raw_url.to_string()
        } else {
            format!("https://{}", raw_url)
        };
        let name = host_label(&full_url)?;
        if !self.flows.begin(SourceKind::Website) {
            return Err(ContextError::user_input(
                "A website extraction is already in progress",
            ));
        }
        match self.client.extract_website(&full_url).await {
            Ok(text) => Ok(self.settle_ok(SourceKind::Website, name, text)),
            Err(e) => Err(self.settle_err(SourceKind::Website, e)),
        }
    }

    /// Firebase extraction; no item is appended on any failure.
    pub async fn extract_firebase(
        &mut self,
        project_id: &str,
        service_account_key: &str,
    ) -> Result<String, ContextError> {
        if project_id.trim().is_empty() || service_account_key.trim().is_empty() {
            return Err(ContextError::user_input(
                "Please provide Firebase Project ID and Service Account Key",
            ));
        }
        if !self.flows.begin(SourceKind::Firebase) {
            return Err(ContextError::user_input(
                "A Firebase extraction is already in progress",
            ));
        }
        let request = FirebaseExtractRequest {
            project_id: project_id.to_string(),
            service_account_key: service_account_key.to_string(),
        };
        match self.client.extract_firebase(&request).await {
            Ok(text) => Ok(self.settle_ok(SourceKind::Firebase, project_id.to_string(), text)),
            Err(e) => Err(self.settle_err(SourceKind::Firebase, e)),
        }
    }

    /// Supabase extraction; the item is named after the project host.
    pub async fn extract_supabase(
        &mut self,
        project_url: &str,
        service_role_key: &str,
    ) -> Result<String, ContextError> {
        if project_url.trim().is_empty() || service_role_key.trim().is_empty() {
            return Err(ContextError::user_input(
                "Please provide Supabase Project URL and Service Role Key",
            ));
        }
        let name = host_label(project_url)?;
        if !self.flows.begin(SourceKind::Supabase) {
            return Err(ContextError::user_input(
                "A Supabase extraction is already in progress",
            ));
        }
        let request = SupabaseExtractRequest {
            project_url: project_url.to_string(),
            service_role_key: service_role_key.to_string(),
        };
        match self.client.extract_supabase(&request).await {
            Ok(text) => Ok(self.settle_ok(SourceKind::Supabase, name, text)),
            Err(e) => Err(self.settle_err(SourceKind::Supabase, e)),
        }
    }

    fn append_item(&self, kind: SourceKind, name: &str, content: String) {
        self.store
            .lock()
            .append(ContextItem::new(kind, name, content));
    }

    fn settle_ok(&mut self, kind: SourceKind, name: String, content: String) -> String {
        self.flows.complete(kind);
        self.append_item(kind, &name, content);
        self.flows.settle(kind);
        tracing::info!(kind = kind.display_name(), name = %name, "context item appended");
        name
    }

    fn settle_err(&mut self, kind: SourceKind, err: ContextError) -> ContextError {
        self.flows.fail(kind);
        self.flows.settle(kind);
        tracing::warn!(kind = kind.display_name(), error = %err, "extraction failed");
        err
    }

    fn open_browser(&self, target: &str) -> Result<(), ContextError> {
        (self.opener)(target).map_err(|e| ContextError::UnsupportedPlatform {
            reason: format!("could not open the browser: {}", e),
        })
    }
}

/// Host of a URL, without a leading `www.`.
fn host_label(url: &str) -> Result<String, ContextError> {
    let parsed = Url::parse(url)
        .map_err(|_| ContextError::user_input(format!("{} is not a valid URL", url)))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| ContextError::user_input(format!("{} has no host", url)))?;
    Ok(host.strip_prefix("www.").unwrap_or(host).to_string())
}
