//! Pre-programmed collaborators for deterministic tests without network calls.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use gopad_core::{CollaboratorError, CompileEvent, CompileResult, Compiler, Formatter, Publisher};
use parking_lot::Mutex;

/// Formatter returning a fixed reply.
pub struct MockFormatter {
    reply: Result<String, CollaboratorError>,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
}

impl MockFormatter {
    /// Always succeeds with `formatted`.
    pub fn ok(formatted: impl Into<String>) -> Self {
        Self {
            reply: Ok(formatted.into()),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always fails with `error`.
    pub fn failing(error: CollaboratorError) -> Self {
        Self {
            reply: Err(error),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Sleep before replying.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sources passed to `format`, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Formatter for MockFormatter {
    async fn format(&self, source: &str) -> Result<String, CollaboratorError> {
        self.calls.lock().push(source.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply.clone()
    }
}

/// Compiler returning a fixed result.
pub struct MockCompiler {
    reply: Result<CompileResult, CollaboratorError>,
    call_count: AtomicUsize,
}

impl MockCompiler {
    /// Program that prints `output` once.
    pub fn printing(output: impl Into<String>) -> Self {
        Self::with_result(CompileResult {
            errors: String::new(),
            events: vec![CompileEvent {
                message: Some(output.into()),
                kind: Some("stdout".into()),
                delay: 0,
            }],
        })
    }

    /// Program that produces no events.
    pub fn silent() -> Self {
        Self::with_result(CompileResult::default())
    }

    /// Arbitrary result.
    pub fn with_result(result: CompileResult) -> Self {
        Self {
            reply: Ok(result),
            call_count: AtomicUsize::new(0),
        }
    }

    /// Always fails with `error`.
    pub fn failing(error: CollaboratorError) -> Self {
        Self {
            reply: Err(error),
            call_count: AtomicUsize::new(0),
        }
    }

    /// Number of `compile` calls so far.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Compiler for MockCompiler {
    async fn compile(&self, _source: &str) -> Result<CompileResult, CollaboratorError> {
        let _ = self.call_count.fetch_add(1, Ordering::Relaxed);
        self.reply.clone()
    }
}

/// Publisher that records what it was asked to publish.
pub struct MockPublisher {
    reply: Result<String, CollaboratorError>,
    published: Mutex<Vec<(String, String)>>,
}

impl MockPublisher {
    /// Always succeeds with `url`.
    pub fn ok(url: impl Into<String>) -> Self {
        Self {
            reply: Ok(url.into()),
            published: Mutex::new(Vec::new()),
        }
    }

    /// Always fails with `error`.
    pub fn failing(error: CollaboratorError) -> Self {
        Self {
            reply: Err(error),
            published: Mutex::new(Vec::new()),
        }
    }

    /// `(description, content)` pairs received, in call order.
    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().clone()
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    async fn publish(&self, description: &str, content: &str) -> Result<String, CollaboratorError> {
        self.published
            .lock()
            .push((description.to_string(), content.to_string()));
        self.reply.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn formatter_records_calls() {
        let fmt = MockFormatter::ok("out");
        assert_eq!(fmt.format("in").await.unwrap(), "out");
        assert_eq!(fmt.calls(), vec!["in".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn formatter_delay_is_honoured() {
        let fmt = MockFormatter::ok("out").with_delay(Duration::from_secs(5));
        let start = tokio::time::Instant::now();
        let _ = fmt.format("in").await;
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn compiler_counts_calls() {
        let compiler = MockCompiler::printing("hi\n");
        let result = compiler.compile("src").await.unwrap();
        assert_eq!(result.message(), Some("hi\n"));
        assert_eq!(compiler.call_count(), 1);
        assert!(MockCompiler::silent().compile("x").await.unwrap().message().is_none());
    }

    #[tokio::test]
    async fn publisher_failure_still_records() {
        let publisher = MockPublisher::failing(CollaboratorError::Network("down".into()));
        assert!(publisher.publish("d", "c").await.is_err());
        assert_eq!(publisher.published(), vec![("d".to_string(), "c".to_string())]);
    }
}
