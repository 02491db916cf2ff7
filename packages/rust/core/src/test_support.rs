//! In-process completion fakes shared by the unit tests.

use std::path::PathBuf;
use std::sync::Mutex;

use docsmith_completion::{CompletionClient, CompletionRequest};
use docsmith_shared::Result;

type Responder = Box<dyn Fn(&CompletionRequest) -> Result<String> + Send + Sync>;

/// Answers each request with a closure and records every request it saw.
pub(crate) struct FakeClient {
    respond: Responder,
    seen: Mutex<Vec<CompletionRequest>>,
}

impl FakeClient {
    pub(crate) fn new(
        respond: impl Fn(&CompletionRequest) -> Result<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            respond: Box::new(respond),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Always reply with `text`.
    pub(crate) fn replying(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_| Ok(text.clone()))
    }

    pub(crate) fn requests(&self) -> Vec<CompletionRequest> {
        self.seen.lock().unwrap().clone()
    }
}

impl CompletionClient for FakeClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.seen.lock().unwrap().push(request.clone());
        (self.respond)(request)
    }
}

/// A fresh empty directory under the system temp dir.
pub(crate) fn temp_dir(prefix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("{prefix}_{}", uuid::Uuid::now_v7()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
