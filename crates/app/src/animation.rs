//! Animated text transition for the prompt field.
//!
//! One shared text slot mutated by a timed task: the original text is
//! deleted in chunks, then the replacement is typed back in. The task is
//! single-flight (starting a second transition while one runs is rejected)
//! and cancellable from outside.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{AbortHandle, Abortable, Aborted};
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy)]
pub struct TransitionTiming {
    /// Delay between deletion steps.
    pub delete_step: Duration,
    /// Pause between the cleared field and the first typed characters.
    pub pause: Duration,
    /// Delay between typing steps.
    pub type_step: Duration,
}

impl Default for TransitionTiming {
    fn default() -> Self {
        Self {
            delete_step: Duration::from_millis(10),
            pause: Duration::from_millis(200),
            type_step: Duration::from_millis(15),
        }
    }
}

/// Characters typed per step.
const TYPE_CHUNK: usize = 2;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("a text transition is already running")]
    Busy,
    #[error("the text transition was cancelled")]
    Cancelled,
}

pub struct TextTransition {
    text: Arc<Mutex<String>>,
    timing: TransitionTiming,
    active: Arc<AtomicBool>,
    abort: Mutex<Option<AbortHandle>>,
}

impl TextTransition {
    pub fn new() -> Self {
        Self::with_timing(TransitionTiming::default())
    }

    pub fn with_timing(timing: TransitionTiming) -> Self {
        Self {
            text: Arc::new(Mutex::new(String::new())),
            timing,
            active: Arc::new(AtomicBool::new(false)),
            abort: Mutex::new(None),
        }
    }

    /// Current value of the shared text slot.
    pub fn text(&self) -> String {
        self.text.lock().clone()
    }

    pub fn set_text(&self, value: impl Into<String>) {
        *self.text.lock() = value.into();
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Abort a running transition, leaving the text wherever it was.
    pub fn cancel(&self) {
        if let Some(handle) = self.abort.lock().take() {
            handle.abort();
        }
    }

    /// Animate `from` into `to`, resolving once the full target text is in
    /// place. Rejects with `Busy` while another transition runs.
    pub async fn run(&self, from: &str, to: &str) -> Result<(), TransitionError> {
        if self.active.swap(true, Ordering::SeqCst) {
            return Err(TransitionError::Busy);
        }
        let (handle, registration) = AbortHandle::new_pair();
        *self.abort.lock() = Some(handle);

        let text = self.text.clone();
        let timing = self.timing;
        let from = from.to_string();
        let to = to.to_string();
        let animation = Abortable::new(
            async move {
                let source: Vec<char> = from.chars().collect();
                let delete_chunk = (source.len() / 20).max(5);
                let mut remaining = source.len();
                loop {
                    *text.lock() = source[..remaining].iter().collect();
                    tokio::time::sleep(timing.delete_step).await;
                    if remaining == 0 {
                        break;
                    }
                    remaining = remaining.saturating_sub(delete_chunk);
                }
                tokio::time::sleep(timing.pause).await;

                let target: Vec<char> = to.chars().collect();
                let mut typed = 0;
                while typed < target.len() {
                    typed = (typed + TYPE_CHUNK).min(target.len());
                    *text.lock() = target[..typed].iter().collect();
                    tokio::time::sleep(timing.type_step).await;
                }
                *text.lock() = to;
            },
            registration,
        );

        let result = animation.await;
        self.abort.lock().take();
        self.active.store(false, Ordering::SeqCst);
        match result {
            Ok(()) => Ok(()),
            Err(Aborted) => Err(TransitionError::Cancelled),
        }
    }
}

impl Default for TextTransition {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instant_timing() -> TransitionTiming {
        TransitionTiming {
            delete_step: Duration::ZERO,
            pause: Duration::ZERO,
            type_step: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_run_replaces_text_and_completes() {
        let transition = TextTransition::with_timing(instant_timing());
        transition.set_text("old prompt");
        transition.run("old prompt", "new prompt").await.unwrap();
        assert_eq!(transition.text(), "new prompt");
        assert!(!transition.is_active());
    }

    #[tokio::test]
    async fn test_second_start_is_rejected_while_running() {
        let transition = Arc::new(TextTransition::with_timing(TransitionTiming {
            delete_step: Duration::from_millis(20),
            pause: Duration::from_millis(20),
            type_step: Duration::from_millis(20),
        }));

        let running = transition.clone();
        let first = tokio::spawn(async move { running.run("aaaaaaaaaa", "bbbbbbbbbb").await });

        // Give the first transition time to take the slot.
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(
            transition.run("x", "y").await,
            Err(TransitionError::Busy)
        );

        first.await.unwrap().unwrap();
        assert_eq!(transition.text(), "bbbbbbbbbb");
    }

    #[tokio::test]
    async fn test_cancel_aborts_a_running_transition() {
        let transition = Arc::new(TextTransition::with_timing(TransitionTiming {
            delete_step: Duration::from_millis(50),
            pause: Duration::from_millis(50),
            type_step: Duration::from_millis(50),
        }));

        let running = transition.clone();
        let task = tokio::spawn(async move { running.run("some long prompt", "target").await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        transition.cancel();

        assert_eq!(task.await.unwrap(), Err(TransitionError::Cancelled));
        assert!(!transition.is_active());
        // The slot can be used again after cancellation.
        transition.run("", "fresh").await.unwrap();
        assert_eq!(transition.text(), "fresh");
    }

    #[tokio::test]
    async fn test_multibyte_text_animates_on_char_boundaries() {
        let transition = TextTransition::with_timing(instant_timing());
        transition.run("héllo wörld", "日本語のテキスト").await.unwrap();
        assert_eq!(transition.text(), "日本語のテキスト");
    }
}
