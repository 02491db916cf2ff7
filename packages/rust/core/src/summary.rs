//! Rolling context summary.
//!
//! After a batch, the model is asked for a one-line recap of what was done
//! and the recap is appended to the summary log. The log is append-only: a
//! failed call leaves it untouched.

use std::io::Write;
use std::path::Path;

use docsmith_completion::{CompletionClient, CompletionRequest};
use docsmith_shared::{DocsmithError, Result};
use tracing::{info, instrument};

const SUMMARY_SYSTEM_PROMPT: &str = "你是一个负责项目记录的助手，擅长编写精简的摘要。";

const SUMMARY_REQUEST: &str = "请为以下操作提供一个极其简短的中文摘要（不超过30字），用于记录项目进度：";

/// Describe a batch of processed files for the summary request.
pub fn describe_processed<S: AsRef<str>>(files: &[S]) -> String {
    let names: Vec<&str> = files.iter().map(AsRef::as_ref).collect();
    format!("处理了文件: {}", names.join(", "))
}

/// Build the summary request for `description`.
pub fn summary_request(description: &str) -> CompletionRequest {
    CompletionRequest::new(
        SUMMARY_SYSTEM_PROMPT,
        format!("{SUMMARY_REQUEST}\n{description}"),
    )
}

/// Ask the model for a recap of `description` and append it to `summary_path`.
///
/// Returns the appended line's text (without the list marker).
#[instrument(skip_all, fields(path = %summary_path.display()))]
pub async fn update_summary<C: CompletionClient>(
    client: &C,
    summary_path: &Path,
    description: &str,
) -> Result<String> {
    let reply = client.complete(&summary_request(description)).await?;

    let summary = single_line(&reply);
    if summary.is_empty() {
        return Err(DocsmithError::Completion(
            "summary response was empty".into(),
        ));
    }

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(summary_path)
        .map_err(|e| DocsmithError::io(summary_path, e))?;
    write!(file, "\n- {summary}").map_err(|e| DocsmithError::io(summary_path, e))?;

    info!(%summary, "summary appended");
    Ok(summary)
}

/// Trim and fold line breaks so the entry occupies one line.
fn single_line(reply: &str) -> String {
    reply.split_whitespace().collect::<Vec<_>>().join(" ")
}
