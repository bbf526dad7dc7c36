//! Session wiring: one context store, one bridge, one enhancement flow.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use zeroize::Zeroizing;

use providers::bridge::{GithubStart, MessageOutcome, RedirectOutcome};
use providers::{bus, BackendClient, BridgeRole, OAuthBridge};
use services::{FolderAccess, FolderHandle};
use shared::backend_api::RepoInfo;
use shared::context::{ContextStore, SourceKind};
use shared::error::ContextError;
use shared::settings::AppSettings;

use crate::animation::{TextTransition, TransitionTiming};
use crate::flow::PromptEnhancementFlow;

/// The main-window session: owns the store, drives the bridge, drains the
/// bus one message per turn, and persists through the enhancement flow.
pub struct ContextSession {
    store: Arc<Mutex<ContextStore>>,
    bridge: OAuthBridge,
    bus_tx: bus::BusSender,
    bus_rx: bus::BusReceiver,
    folder: Option<FolderHandle>,
    folder_access: Arc<FolderAccess>,
    flow: PromptEnhancementFlow,
}

impl ContextSession {
    pub fn new(settings: AppSettings) -> Result<Self, ContextError> {
        let folder_access = Arc::new(match &settings.download_dir {
            Some(dir) => FolderAccess::with_downloads_dir(dir.clone()),
            None => FolderAccess::new()?,
        });
        Self::with_folder_access(settings, folder_access)
    }

    pub fn with_folder_access(
        settings: AppSettings,
        folder_access: Arc<FolderAccess>,
    ) -> Result<Self, ContextError> {
        let client = BackendClient::new(&settings);
        let store = Arc::new(Mutex::new(ContextStore::new()));
        let (bus_tx, bus_rx) = bus::channel();
        let bridge = OAuthBridge::new(BridgeRole::Main, client.clone(), store.clone(), bus_tx.clone());
        let transition = Arc::new(TextTransition::with_timing(TransitionTiming::default()));
        let flow = PromptEnhancementFlow::new(
            client,
            folder_access.clone(),
            transition,
            settings.context_filename.clone(),
        );

        Ok(Self {
            store,
            bridge,
            bus_tx,
            bus_rx,
            folder: None,
            folder_access,
            flow,
        })
    }

    /// Sender half of the bus, for popup-role bridges (and tests) to post
    /// results into this session.
    pub fn bus_sender(&self) -> bus::BusSender {
        self.bus_tx.clone()
    }

    pub fn folder(&self) -> Option<&FolderHandle> {
        self.folder.as_ref()
    }

    /// Grant (or revoke, with `None`) the session's folder capability.
    pub fn choose_folder(
        &mut self,
        selection: Option<&Path>,
    ) -> Result<Option<String>, ContextError> {
        self.folder = self.folder_access.acquire_folder(selection)?;
        Ok(self.folder.as_ref().map(|f| f.name().to_string()))
    }

    /// Drain pending bus messages, one per turn, preserving append order.
    pub async fn pump_messages(&mut self) -> Vec<Result<MessageOutcome, ContextError>> {
        let mut outcomes = Vec::new();
        while let Some(message) = self.bus_rx.try_next() {
            outcomes.push(self.bridge.handle_message(message).await);
        }
        outcomes
    }

    pub async fn start_github(&mut self) -> Result<GithubStart, ContextError> {
        self.bridge.start_github().await
    }

    pub fn start_slack(&mut self) -> Result<(), ContextError> {
        self.bridge.start_slack()
    }

    pub fn deliver_redirect(&mut self, query: &str) {
        self.bridge.deliver_redirect(query);
    }

    pub async fn process_redirect(&mut self) -> RedirectOutcome {
        self.bridge.handle_slack_redirect().await
    }

    pub async fn select_repository(&mut self, repo: &RepoInfo) -> Result<String, ContextError> {
        self.bridge.select_repository(repo).await
    }

    pub async fn extract_github_token(
        &mut self,
        token: Zeroizing<String>,
        username: &str,
        repo: Option<&str>,
    ) -> Result<String, ContextError> {
        self.bridge.extract_github_token(&token, username, repo).await
    }

    pub async fn extract_website(&mut self, url: &str) -> Result<String, ContextError> {
        self.bridge.extract_website(url).await
    }

    pub async fn extract_firebase(
        &mut self,
        project_id: &str,
        service_account_key: Zeroizing<String>,
    ) -> Result<String, ContextError> {
        self.bridge
            .extract_firebase(project_id, &service_account_key)
            .await
    }

    pub async fn extract_supabase(
        &mut self,
        project_url: &str,
        service_role_key: Zeroizing<String>,
    ) -> Result<String, ContextError> {
        self.bridge
            .extract_supabase(project_url, &service_role_key)
            .await
    }

    pub async fn enhance(&self, prompt: &str) -> Result<String, ContextError> {
        let items = self.store.lock().items().to_vec();
        self.flow.enhance(prompt, &items).await
    }

    pub async fn download_all(&self) -> Result<Option<std::path::PathBuf>, ContextError> {
        self.flow.download_all(&self.store, self.folder.as_ref()).await
    }

    pub fn prompt(&self) -> String {
        self.flow.prompt()
    }

    /// (kind, name) pairs for display, in insertion order.
    pub fn item_labels(&self) -> Vec<(SourceKind, String)> {
        self.store
            .lock()
            .items()
            .iter()
            .map(|item| (item.kind, item.name.clone()))
            .collect()
    }

    pub fn clear_items(&self) {
        self.store.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::message::BridgeMessage;
    use tempfile::TempDir;

    fn session() -> (ContextSession, TempDir) {
        let temp = TempDir::new().unwrap();
        let mut settings = AppSettings::default();
        settings.download_dir = Some(temp.path().join("downloads"));
        (ContextSession::new(settings).unwrap(), temp)
    }

    #[tokio::test]
    async fn test_pumped_messages_append_in_post_order() {
        let (mut session, _temp) = session();
        let tx = session.bus_sender();
        tx.post(BridgeMessage::SlackContext {
            name: "first".into(),
            content: "A".into(),
        });
        tx.post(BridgeMessage::SlackContext {
            name: "second".into(),
            content: "B".into(),
        });

        let outcomes = session.pump_messages().await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.is_ok()));

        let labels = session.item_labels();
        assert_eq!(labels[0].1, "first");
        assert_eq!(labels[1].1, "second");
    }

    #[tokio::test]
    async fn test_choose_folder_cancellation_keeps_session_usable() {
        let (mut session, _temp) = session();
        assert!(session.choose_folder(None).unwrap().is_none());
        assert!(session.folder().is_none());
    }

    #[tokio::test]
    async fn test_choose_folder_reports_name() {
        let (mut session, temp) = session();
        let granted = temp.path().join("notes");
        std::fs::create_dir(&granted).unwrap();
        let name = session.choose_folder(Some(&granted)).unwrap();
        assert_eq!(name.as_deref(), Some("notes"));
    }

    #[tokio::test]
    async fn test_clear_items_empties_the_store() {
        let (mut session, _temp) = session();
        session.bus_sender().post(BridgeMessage::SlackContext {
            name: "n".into(),
            content: "c".into(),
        });
        session.pump_messages().await;
        assert_eq!(session.item_labels().len(), 1);
        session.clear_items();
        assert!(session.item_labels().is_empty());
    }
}
