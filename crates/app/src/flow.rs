//! Prompt enhancement and the download-all cycle.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;

use providers::BackendClient;
use services::{FolderAccess, FolderHandle};
use shared::context::{render_filtered, ContextItem, ContextStore, SourceKind};
use shared::error::ContextError;

use crate::animation::{TextTransition, TransitionError};

pub struct PromptEnhancementFlow {
    client: BackendClient,
    folder_access: Arc<FolderAccess>,
    transition: Arc<TextTransition>,
    filename: String,
}

impl PromptEnhancementFlow {
    pub fn new(
        client: BackendClient,
        folder_access: Arc<FolderAccess>,
        transition: Arc<TextTransition>,
        filename: impl Into<String>,
    ) -> Self {
        Self {
            client,
            folder_access,
            transition,
            filename: filename.into(),
        }
    }

    /// The current prompt value (the shared text slot the animation drives).
    pub fn prompt(&self) -> String {
        self.transition.text()
    }

    /// Enhance `prompt` against the distinct set of context types present,
    /// animate the replacement in, and install the enhanced text as the new
    /// prompt value. Fails fast, before any network call, on an empty prompt
    /// or an empty context set, and rejects re-entry while an enhancement is
    /// still animating.
    pub async fn enhance(
        &self,
        prompt: &str,
        items: &[ContextItem],
    ) -> Result<String, ContextError> {
        if prompt.trim().is_empty() {
            return Err(ContextError::user_input("Please enter an instruction first"));
        }
        if items.is_empty() {
            return Err(ContextError::user_input(
                "Please add some context (GitHub, Slack, Website, or Database) before enhancing",
            ));
        }
        if self.transition.is_active() {
            return Err(ContextError::user_input(
                "An enhancement is already in progress",
            ));
        }

        let summary = context_summary(items);
        let enhanced = self.client.enhance_prompt(prompt, &summary).await?;

        match self.transition.run(prompt, &enhanced).await {
            Ok(()) => {}
            Err(TransitionError::Busy) => {
                return Err(ContextError::user_input(
                    "An enhancement is already in progress",
                ));
            }
            // A cancelled animation still installs the enhanced text.
            Err(TransitionError::Cancelled) => self.transition.set_text(&enhanced),
        }
        Ok(enhanced)
    }

    /// Serialize the store, filter it through the backend, and persist the
    /// result. A filtering failure writes the unfiltered document instead;
    /// exactly one write happens either way. The store is cleared once the
    /// artifact is on disk. No-op on an empty store.
    pub async fn download_all(
        &self,
        store: &Mutex<ContextStore>,
        handle: Option<&FolderHandle>,
    ) -> Result<Option<PathBuf>, ContextError> {
        let (combined, total_items) = {
            let store = store.lock();
            if store.is_empty() {
                return Ok(None);
            }
            (store.serialize_combined(Utc::now()), store.len())
        };

        let document = match self.client.filter_context(&combined).await {
            Ok(filtered) => {
                tracing::info!(
                    original = filtered.stats.original_size,
                    filtered = filtered.stats.filtered_size,
                    reduction = filtered.stats.reduction_percent,
                    "context filtered"
                );
                render_filtered(
                    &filtered.filtered_context,
                    &filtered.stats,
                    total_items,
                    Utc::now(),
                )
            }
            Err(e) => {
                tracing::warn!(error = %e, "context filtering failed, writing unfiltered document");
                store.lock().serialize_unfiltered(Utc::now())
            }
        };

        let path = self
            .folder_access
            .write_file(handle, &self.filename, &document)?;
        store.lock().clear();
        Ok(Some(path))
    }
}

/// Distinct context types present, in order of first occurrence.
fn context_summary(items: &[ContextItem]) -> String {
    let mut kinds: Vec<SourceKind> = Vec::new();
    for item in items {
        if !kinds.contains(&item.kind) {
            kinds.push(item.kind);
        }
    }
    kinds
        .iter()
        .map(|k| k.display_name())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::TransitionTiming;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;
    use tiny_http::{Header, Response as StubResponse, Server};

    struct Fixture {
        flow: Arc<PromptEnhancementFlow>,
        store: Mutex<ContextStore>,
        downloads: PathBuf,
        hits: Arc<AtomicUsize>,
        _temp: TempDir,
    }

    fn fixture<F>(handler: F) -> Fixture
    where
        F: Fn(&mut tiny_http::Request) -> StubResponse<std::io::Cursor<Vec<u8>>>
            + Send
            + 'static,
    {
        fixture_with_timing(handler, TransitionTiming {
            delete_step: Duration::ZERO,
            pause: Duration::ZERO,
            type_step: Duration::ZERO,
        })
    }

    fn fixture_with_timing<F>(handler: F, timing: TransitionTiming) -> Fixture
    where
        F: Fn(&mut tiny_http::Request) -> StubResponse<std::io::Cursor<Vec<u8>>>
            + Send
            + 'static,
    {
        let server = Server::http("127.0.0.1:0").unwrap();
        let port = server.server_addr().to_ip().unwrap().port();
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = hits.clone();
        std::thread::spawn(move || {
            for mut request in server.incoming_requests() {
                seen.fetch_add(1, Ordering::SeqCst);
                let response = handler(&mut request);
                let _ = request.respond(response);
            }
        });

        let temp = TempDir::new().unwrap();
        let downloads = temp.path().join("downloads");
        let flow = Arc::new(PromptEnhancementFlow::new(
            BackendClient::from_base_url(format!("http://127.0.0.1:{}", port)),
            Arc::new(FolderAccess::with_downloads_dir(&downloads)),
            Arc::new(TextTransition::with_timing(timing)),
            "context.txt",
        ));

        Fixture {
            flow,
            store: Mutex::new(ContextStore::new()),
            downloads,
            hits,
            _temp: temp,
        }
    }

    fn json_response(body: &str) -> StubResponse<std::io::Cursor<Vec<u8>>> {
        StubResponse::from_string(body)
            .with_header("Content-Type: application/json".parse::<Header>().unwrap())
    }

    fn files_in(dir: &PathBuf) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .map(|entries| entries.filter_map(|e| e.ok()).map(|e| e.path()).collect())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_download_all_on_empty_store_is_a_no_op() {
        let fx = fixture(|_| StubResponse::from_string("unused"));
        let written = fx.flow.download_all(&fx.store, None).await.unwrap();
        assert!(written.is_none());
        assert_eq!(fx.hits.load(Ordering::SeqCst), 0);
        assert!(files_in(&fx.downloads).is_empty());
    }

    #[tokio::test]
    async fn test_download_all_writes_filtered_document_and_clears() {
        let fx = fixture(|_| {
            json_response(
                r#"{"filteredContext": "just the code",
                    "stats": {"original_size": 500, "filtered_size": 100, "reduction_percent": 80.0}}"#,
            )
        });
        fx.store
            .lock()
            .append(ContextItem::new(SourceKind::GitHub, "octo/repo", "A"));

        let path = fx.flow.download_all(&fx.store, None).await.unwrap().unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("FILTERED CONTEXT FILE"));
        assert!(written.contains("Reduction: 80%"));
        assert!(written.ends_with("just the code"));
        assert!(fx.store.lock().is_empty());
        assert_eq!(files_in(&fx.downloads).len(), 1);
    }

    #[tokio::test]
    async fn test_filter_failure_still_writes_exactly_once() {
        let fx = fixture(|_| json_response(r#"{"error": "model overloaded"}"#).with_status_code(503));
        fx.store
            .lock()
            .append(ContextItem::new(SourceKind::Slack, "Acme (2 channels, 5 messages)", "B"));

        let path = fx.flow.download_all(&fx.store, None).await.unwrap().unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("COMBINED CONTEXT FILE (UNFILTERED)"));
        assert!(written.contains("Note: Filtering failed, this is raw unfiltered content"));
        assert!(written.contains("ITEM 1: Slack - Acme (2 channels, 5 messages)"));
        assert_eq!(files_in(&fx.downloads).len(), 1);
        assert!(fx.store.lock().is_empty());
    }

    #[tokio::test]
    async fn test_enhance_rejects_empty_prompt_before_any_call() {
        let fx = fixture(|_| StubResponse::from_string("unused"));
        let items = vec![ContextItem::new(SourceKind::GitHub, "octo/repo", "A")];
        let err = fx.flow.enhance("", &items).await.unwrap_err();
        assert!(matches!(err, ContextError::UserInput { .. }));
        assert_eq!(fx.hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_enhance_rejects_empty_context_before_any_call() {
        let fx = fixture(|_| StubResponse::from_string("unused"));
        let err = fx.flow.enhance("do the thing", &[]).await.unwrap_err();
        assert!(matches!(err, ContextError::UserInput { .. }));
        assert_eq!(fx.hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_enhance_sends_first_occurrence_type_summary() {
        let fx = fixture(|request| {
            let mut body = String::new();
            use std::io::Read;
            request.as_reader().read_to_string(&mut body).unwrap();
            assert!(body.contains(r#""contextSummary":"GitHub, Slack""#));
            json_response(r#"{"enhancedPrompt": "sharper prompt"}"#)
        });

        let items = vec![
            ContextItem::new(SourceKind::GitHub, "octo/repo", "A"),
            ContextItem::new(SourceKind::Slack, "Acme", "B"),
            ContextItem::new(SourceKind::GitHub, "octo/other", "C"),
        ];
        let enhanced = fx.flow.enhance("fix the bug", &items).await.unwrap();
        assert_eq!(enhanced, "sharper prompt");
        assert_eq!(fx.flow.prompt(), "sharper prompt");
    }

    #[tokio::test]
    async fn test_enhance_is_single_flight() {
        let fx = fixture_with_timing(
            |_| json_response(r#"{"enhancedPrompt": "slow and steady"}"#),
            TransitionTiming {
                delete_step: Duration::from_millis(20),
                pause: Duration::from_millis(20),
                type_step: Duration::from_millis(20),
            },
        );
        let items = vec![ContextItem::new(SourceKind::Website, "docs.rs", "A")];

        let flow = fx.flow.clone();
        let first_items = items.clone();
        let first =
            tokio::spawn(async move { flow.enhance("original prompt", &first_items).await });

        tokio::time::sleep(Duration::from_millis(30)).await;
        let err = fx.flow.enhance("second prompt", &items).await.unwrap_err();
        assert!(matches!(err, ContextError::UserInput { .. }));

        first.await.unwrap().unwrap();
        assert_eq!(fx.flow.prompt(), "slow and steady");
    }
}
