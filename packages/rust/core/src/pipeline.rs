//! End-to-end `run` pipeline: doc/ → prompt → completion → result/ → summary.
//!
//! Strictly sequential. Each input is read, prompted, completed and written
//! before the next one starts, and the rolling summary is updated once at
//! the end of the batch.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use docsmith_completion::{CompletionClient, CompletionRequest};
use docsmith_reader::read_to_text;
use docsmith_shared::{DocsmithError, Result};

use crate::layout::{WorkspaceLayout, file_name_of, list_visible_files, read_optional};
use crate::prompt::{PromptInputs, assemble_prompt};
use crate::summary::{describe_processed, update_summary};

/// Prefix written in place of model output when the completion call fails.
pub const FAILURE_PREFIX: &str = "API Error: ";

/// Configuration for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Resolved working-directory paths.
    pub layout: WorkspaceLayout,
    /// Template file name inside the template dir; first in sorted order if `None`.
    pub template: Option<String>,
    /// System-role instruction for document processing.
    pub system_prompt: String,
}

/// What happened to a single input document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// The model's text was written to the output file.
    Completed,
    /// The completion call failed; the failure text was written instead.
    Failed { reason: String },
}

/// One input document and the output written for it.
#[derive(Debug, Clone)]
pub struct ProcessedFile {
    pub input: String,
    pub output_path: PathBuf,
    pub outcome: FileOutcome,
}

/// Result of the end-of-batch summary update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryStatus {
    /// The recap that was appended.
    Appended(String),
    /// Why nothing was appended.
    Failed(String),
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Template used for every document.
    pub template: PathBuf,
    /// Documents in processing order.
    pub files: Vec<ProcessedFile>,
    pub summary: SummaryStatus,
    /// Total elapsed time.
    pub elapsed: Duration,
}

impl RunReport {
    pub fn completed_count(&self) -> usize {
        self.files
            .iter()
            .filter(|f| f.outcome == FileOutcome::Completed)
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.files.len() - self.completed_count()
    }
}

/// How a run ended.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed(RunReport),
    /// The template directory had no usable file; nothing was written.
    NoTemplate { template_dir: PathBuf },
    /// The input directory had no usable file; nothing was written.
    NoInputs { doc_dir: PathBuf },
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before an input document is processed.
    fn file_started(&self, name: &str, current: usize, total: usize);
    /// Called after the output for a document is written.
    fn file_saved(&self, file: &ProcessedFile);
    /// Called after a recap was appended to the summary log.
    fn summary_updated(&self, path: &Path, summary: &str);
    /// Called when the summary update failed; the log is unchanged.
    fn summary_failed(&self, reason: &str);
    /// Called when the pipeline completes.
    fn done(&self, report: &RunReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn file_started(&self, _name: &str, _current: usize, _total: usize) {}
    fn file_saved(&self, _file: &ProcessedFile) {}
    fn summary_updated(&self, _path: &Path, _summary: &str) {}
    fn summary_failed(&self, _reason: &str) {}
    fn done(&self, _report: &RunReport) {}
}

/// Run the full pipeline.
///
/// 1. Setup: create doc/template/result directories
/// 2. Load background knowledge and context summary
/// 3. Select the template (abort if none)
/// 4. List inputs (abort if none)
/// 5. Process each input in order
/// 6. Append a recap to the context summary
#[instrument(skip_all, fields(doc_dir = %config.layout.doc_dir.display()))]
pub async fn run_pipeline<C: CompletionClient>(
    config: &PipelineConfig,
    client: &C,
    progress: &dyn ProgressReporter,
) -> Result<RunOutcome> {
    let start = Instant::now();
    let layout = &config.layout;

    // --- Phase 1: Setup ---
    progress.phase("Preparing directories");
    layout.ensure_dirs()?;

    // --- Phase 2: Context ---
    progress.phase("Loading context");
    let background = read_optional(&layout.background_file)?;
    let context_summary = read_optional(&layout.summary_file)?;

    // --- Phase 3: Template ---
    let Some(template_path) = select_template(&layout.template_dir, config.template.as_deref())?
    else {
        warn!(dir = %layout.template_dir.display(), "no template found");
        return Ok(RunOutcome::NoTemplate {
            template_dir: layout.template_dir.clone(),
        });
    };
    info!(template = %template_path.display(), "using template");
    let template = read_to_text(&template_path);

    // --- Phase 4: Inputs ---
    let inputs = list_visible_files(&layout.doc_dir)?;
    if inputs.is_empty() {
        warn!(dir = %layout.doc_dir.display(), "no input documents found");
        return Ok(RunOutcome::NoInputs {
            doc_dir: layout.doc_dir.clone(),
        });
    }

    // --- Phase 5: Per-file loop ---
    progress.phase("Processing documents");
    let total = inputs.len();
    let mut files = Vec::with_capacity(total);

    for (i, input_path) in inputs.iter().enumerate() {
        let name = file_name_of(input_path);
        progress.file_started(&name, i + 1, total);
        info!(file = %name, "processing");

        let content = read_to_text(input_path);
        let prompt = assemble_prompt(&PromptInputs {
            background: &background,
            context_summary: &context_summary,
            template: &template,
            content: &content,
        });
        let request = CompletionRequest::new(config.system_prompt.as_str(), prompt);

        let (text, outcome) = match client.complete(&request).await {
            Ok(text) => (text, FileOutcome::Completed),
            Err(e) => {
                let reason = failure_reason(&e);
                warn!(file = %name, error = %reason, "completion failed");
                (
                    format!("{FAILURE_PREFIX}{reason}"),
                    FileOutcome::Failed { reason },
                )
            }
        };

        let output_path = layout.result_path(&name);
        std::fs::write(&output_path, text).map_err(|e| DocsmithError::io(&output_path, e))?;

        let processed = ProcessedFile {
            input: name,
            output_path,
            outcome,
        };
        progress.file_saved(&processed);
        files.push(processed);
    }

    // --- Phase 6: Summary ---
    progress.phase("Updating context summary");
    let names: Vec<&str> = files.iter().map(|f| f.input.as_str()).collect();
    let summary = match update_summary(client, &layout.summary_file, &describe_processed(&names))
        .await
    {
        Ok(line) => {
            progress.summary_updated(&layout.summary_file, &line);
            SummaryStatus::Appended(line)
        }
        Err(e) => {
            let reason = failure_reason(&e);
            warn!(error = %reason, "failed to update summary");
            progress.summary_failed(&reason);
            SummaryStatus::Failed(reason)
        }
    };

    let report = RunReport {
        template: template_path,
        files,
        summary,
        elapsed: start.elapsed(),
    };

    info!(
        processed = report.files.len(),
        failed = report.failed_count(),
        elapsed_ms = report.elapsed.as_millis() as u64,
        "run complete"
    );
    progress.done(&report);

    Ok(RunOutcome::Completed(report))
}

/// Pick the template: `requested` by name, else the first visible file.
fn select_template(dir: &Path, requested: Option<&str>) -> Result<Option<PathBuf>> {
    let candidates = list_visible_files(dir)?;

    if let Some(name) = requested {
        return candidates
            .into_iter()
            .find(|p| file_name_of(p) == name)
            .map(Some)
            .ok_or_else(|| {
                DocsmithError::validation(format!(
                    "template '{name}' not found in {}",
                    dir.display()
                ))
            });
    }

    if candidates.len() > 1 {
        warn!(
            count = candidates.len(),
            chosen = %file_name_of(&candidates[0]),
            "multiple templates found, using the first in name order"
        );
    }
    Ok(candidates.into_iter().next())
}

/// The underlying failure message, without the error-kind prefix.
fn failure_reason(err: &DocsmithError) -> String {
    match err {
        DocsmithError::Completion(message) => message.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use docsmith_shared::WorkspaceConfig;

    use super::*;
    use crate::test_support::{FakeClient, temp_dir};

    fn config_for(root: &Path) -> PipelineConfig {
        PipelineConfig {
            layout: WorkspaceLayout::new(root, &WorkspaceConfig::default()),
            template: None,
            system_prompt: "system".into(),
        }
    }

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    fn result_names(root: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(root.join("result"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    /// Processing requests echo their prompt; summary requests get a recap.
    fn echo_client() -> FakeClient {
        FakeClient::new(|req| {
            if req.system == "system" {
                Ok(format!("OUT<{}>", req.user))
            } else {
                Ok("处理了一批文件".into())
            }
        })
    }

    fn expect_report(outcome: RunOutcome) -> RunReport {
        match outcome {
            RunOutcome::Completed(report) => report,
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_template_dir_aborts_before_output() {
        let root = temp_dir("docsmith_pipe");
        write(&root, "doc/a.txt", "hello");
        let client = echo_client();

        let outcome = run_pipeline(&config_for(&root), &client, &SilentProgress)
            .await
            .unwrap();

        assert!(matches!(outcome, RunOutcome::NoTemplate { .. }));
        assert!(result_names(&root).is_empty());
        assert!(client.requests().is_empty());
        assert!(!root.join("context_summary.md").exists());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn empty_doc_dir_aborts() {
        let root = temp_dir("docsmith_pipe");
        write(&root, "template/t.txt", "Name: {}");
        write(&root, "doc/.DS_Store", "");
        let client = echo_client();

        let outcome = run_pipeline(&config_for(&root), &client, &SilentProgress)
            .await
            .unwrap();

        assert!(matches!(outcome, RunOutcome::NoInputs { .. }));
        assert!(result_names(&root).is_empty());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn creates_missing_directories() {
        let root = temp_dir("docsmith_pipe");
        let outcome = run_pipeline(&config_for(&root), &echo_client(), &SilentProgress)
            .await
            .unwrap();

        assert!(matches!(outcome, RunOutcome::NoTemplate { .. }));
        for dir in ["doc", "template", "result"] {
            assert!(root.join(dir).is_dir(), "{dir} missing");
        }

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn one_output_per_input() {
        let root = temp_dir("docsmith_pipe");
        write(&root, "template/t.txt", "Name: {}");
        write(&root, "doc/a.txt", "hello");
        write(&root, "doc/b.csv", "name,qty\nbolt,4\n");
        write(&root, "doc/c.pdf", "%PDF");
        write(&root, "doc/.hidden", "skip me");

        let report = expect_report(
            run_pipeline(&config_for(&root), &echo_client(), &SilentProgress)
                .await
                .unwrap(),
        );

        assert_eq!(report.files.len(), 3);
        assert_eq!(
            result_names(&root),
            vec!["result_a.txt.txt", "result_b.csv.txt", "result_c.pdf.txt"]
        );

        // Unsupported inputs still go through the model with a placeholder.
        let pdf_out = std::fs::read_to_string(root.join("result/result_c.pdf.txt")).unwrap();
        assert!(pdf_out.contains("Unsupported file type: .pdf"));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn output_embeds_input_and_template_sections() {
        let root = temp_dir("docsmith_pipe");
        write(&root, "template/t.txt", "Name: {}");
        write(&root, "doc/a.txt", "hello");
        write(&root, "background_knowledge.md", "FOB 船上交货");

        let client = echo_client();
        expect_report(
            run_pipeline(&config_for(&root), &client, &SilentProgress)
                .await
                .unwrap(),
        );

        let out = std::fs::read_to_string(root.join("result/result_a.txt.txt")).unwrap();
        let expected_prompt = assemble_prompt(&PromptInputs {
            background: "FOB 船上交货",
            context_summary: "",
            template: "Name: {}",
            content: "hello",
        });
        assert_eq!(out, format!("OUT<{expected_prompt}>"));

        let requests = client.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].system, "system");
        assert!(requests[1].user.contains("a.txt"));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn failed_completion_still_writes_output_and_continues() {
        let root = temp_dir("docsmith_pipe");
        write(&root, "template/t.txt", "T");
        write(&root, "doc/a.txt", "poison");
        write(&root, "doc/b.txt", "fine");

        let client = FakeClient::new(|req| {
            if req.user.contains("poison") {
                Err(DocsmithError::Completion("HTTP 500: upstream down".into()))
            } else {
                Ok("ok".into())
            }
        });

        let report = expect_report(
            run_pipeline(&config_for(&root), &client, &SilentProgress)
                .await
                .unwrap(),
        );

        assert_eq!(report.completed_count(), 1);
        assert_eq!(report.failed_count(), 1);
        assert_eq!(
            report.files[0].outcome,
            FileOutcome::Failed {
                reason: "HTTP 500: upstream down".into()
            }
        );

        let a = std::fs::read_to_string(root.join("result/result_a.txt.txt")).unwrap();
        assert_eq!(a, "API Error: HTTP 500: upstream down");
        let b = std::fs::read_to_string(root.join("result/result_b.txt.txt")).unwrap();
        assert_eq!(b, "ok");

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn summary_gets_exactly_one_new_line() {
        let root = temp_dir("docsmith_pipe");
        let prior = "# 进度\n- 上次整理了报价单";
        write(&root, "template/t.txt", "T");
        write(&root, "doc/a.txt", "x");
        write(&root, "doc/b.txt", "y");
        write(&root, "context_summary.md", prior);

        let client = echo_client();
        let report = expect_report(
            run_pipeline(&config_for(&root), &client, &SilentProgress)
                .await
                .unwrap(),
        );
        assert_eq!(
            report.summary,
            SummaryStatus::Appended("处理了一批文件".into())
        );

        let after = std::fs::read_to_string(root.join("context_summary.md")).unwrap();
        assert!(after.starts_with(prior));
        assert_eq!(&after[prior.len()..], "\n- 处理了一批文件");

        // The prior summary fed every processing prompt.
        let requests = client.requests();
        assert!(requests[0].user.contains("上次整理了报价单"));
        assert!(requests[2].user.ends_with("处理了文件: a.txt, b.txt"));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn summary_failure_is_not_fatal() {
        let root = temp_dir("docsmith_pipe");
        write(&root, "template/t.txt", "T");
        write(&root, "doc/a.txt", "x");
        write(&root, "context_summary.md", "- prior");

        let client = FakeClient::new(|req| {
            if req.system == "system" {
                Ok("done".into())
            } else {
                Err(DocsmithError::Completion("rate limited".into()))
            }
        });

        let report = expect_report(
            run_pipeline(&config_for(&root), &client, &SilentProgress)
                .await
                .unwrap(),
        );
        assert_eq!(report.summary, SummaryStatus::Failed("rate limited".into()));
        assert_eq!(
            std::fs::read_to_string(root.join("context_summary.md")).unwrap(),
            "- prior"
        );
        assert!(root.join("result/result_a.txt.txt").exists());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn first_template_by_name_wins() {
        let root = temp_dir("docsmith_pipe");
        write(&root, "template/z.txt", "ZZZ");
        write(&root, "template/m.txt", "MMM");
        write(&root, "template/.hidden.txt", "HIDDEN");
        write(&root, "doc/a.txt", "x");

        let client = echo_client();
        let report = expect_report(
            run_pipeline(&config_for(&root), &client, &SilentProgress)
                .await
                .unwrap(),
        );
        assert_eq!(file_name_of(&report.template), "m.txt");
        assert!(client.requests()[0].user.contains("MMM"));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn explicit_template_selection() {
        let root = temp_dir("docsmith_pipe");
        write(&root, "template/a.txt", "AAA");
        write(&root, "template/b.txt", "BBB");
        write(&root, "doc/x.txt", "x");

        let mut config = config_for(&root);
        config.template = Some("b.txt".into());
        let client = echo_client();
        let report = expect_report(run_pipeline(&config, &client, &SilentProgress).await.unwrap());
        assert_eq!(file_name_of(&report.template), "b.txt");
        assert!(client.requests()[0].user.contains("BBB"));

        config.template = Some("missing.txt".into());
        let err = run_pipeline(&config, &client, &SilentProgress)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("missing.txt"));

        let _ = std::fs::remove_dir_all(&root);
    }
}
