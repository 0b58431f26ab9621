use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, info_span, warn};

use crate::config::AppConfig;
use crate::error::Result;
use crate::model::catalog::Catalog;
use crate::model::work::Batch;
use crate::services::{
    ai::{complete_with_retry, CompletionRequest, CompletionService, RetryPolicy},
    catalog::CatalogProvider,
    chunker,
    compile::{compile_if_stale, Compiler},
    merge,
    prompt,
    report::{BatchFailure, BatchStage, FileReport},
    response, store,
};

const DRY_RUN_PREVIEW_CHARS: usize = 1000;

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub batch_size: usize,
    pub max_chars: usize,
    pub delay: Duration,
    pub backup: bool,
    pub keep_responses: bool,
    pub debug_dir: PathBuf,
    pub retry: RetryPolicy,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl PipelineOptions {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            batch_size: cfg.batch.size,
            max_chars: cfg.batch.max_chars,
            delay: cfg.inter_batch_delay(),
            backup: cfg.run.backup,
            keep_responses: cfg.run.keep_responses,
            debug_dir: cfg.run.debug_dir.clone(),
            retry: RetryPolicy::from_config(&cfg.service),
            model: cfg.service.model.clone(),
            max_tokens: cfg.service.max_tokens,
            temperature: cfg.service.temperature,
        }
    }
}

/// Where batches go: nowhere (dry run) or a live completion service.
#[derive(Clone, Copy)]
pub enum Backend<'a> {
    DryRun,
    Live(&'a dyn CompletionService),
}

/// Drives one catalog file from load to compiled artifact.
pub struct FilePipeline<'a> {
    pub provider: &'a dyn CatalogProvider,
    pub compiler: &'a dyn Compiler,
    pub options: &'a PipelineOptions,
}

impl<'a> FilePipeline<'a> {
    pub fn run(&self, path: &Path, language: &str, backend: Backend<'_>) -> Result<FileReport> {
        let span = info_span!("file", file = %path.display(), lang = language);
        let _enter = span.enter();

        let dry_run = matches!(backend, Backend::DryRun);
        let mut report = FileReport {
            catalog: path.to_path_buf(),
            language: language.to_string(),
            dry_run,
            ..FileReport::default()
        };

        let mut catalog = self.provider.load(path)?;

        let pending = catalog.pending_indices();
        report.pending = pending.len();

        if pending.is_empty() {
            info!("no untranslated entries");
            if !dry_run {
                report.compiled = self.compile(path);
            }
            return Ok(report);
        }

        let batches = chunker::chunk(
            catalog.units(),
            &pending,
            self.options.batch_size,
            self.options.max_chars,
        );
        report.batches = batches.len();

        info!(
            pending = pending.len(),
            batches = batches.len(),
            batch_size = self.options.batch_size,
            max_chars = self.options.max_chars,
            "untranslated entries batched"
        );

        let service = match backend {
            Backend::Live(service) => service,
            Backend::DryRun => {
                self.preview(&catalog, &batches, path, language);
                return Ok(report);
            }
        };

        if self.options.backup {
            match store::snapshot(path) {
                Ok(bak) => info!(backup = %bak.display(), "backup written"),
                Err(err) => {
                    error!(error = %err, "backup failed, file left untouched");
                    report.failed = pending.len();
                    report.batch_failures.push(BatchFailure {
                        batch: 0,
                        units: pending.len(),
                        stage: BatchStage::Backup,
                        error: err.to_string(),
                        artifact: None,
                    });
                    return Ok(report);
                }
            }
        }

        let file_label = path.display().to_string();
        let nplurals = catalog.nplurals();
        let total = batches.len();

        for (k, batch) in batches.iter().enumerate() {
            let batch_no = k + 1;
            info!(batch = batch_no, total, units = batch.len(), "translating batch");

            let request = CompletionRequest {
                prompt: prompt::build_prompt(catalog.units(), batch, &file_label, language, nplurals),
                model: self.options.model.clone(),
                max_tokens: self.options.max_tokens,
                temperature: self.options.temperature,
            };

            let raw = match complete_with_retry(service, &request, self.options.retry) {
                Ok(text) => text,
                Err(err) => {
                    error!(batch = batch_no, error = %err, "batch skipped");
                    report.failed += batch.len();
                    report.batch_failures.push(BatchFailure {
                        batch: batch_no,
                        units: batch.len(),
                        stage: BatchStage::ServiceCall,
                        error: err.to_string(),
                        artifact: None,
                    });
                    self.pause(batch_no, total);
                    continue;
                }
            };

            let parsed = match response::parse_response(&raw) {
                Ok(v) => v,
                Err(err) => {
                    let artifact = self.keep_response(path, language, batch_no, &raw);
                    error!(batch = batch_no, error = %err, "unparsable response");
                    report.failed += batch.len();
                    report.batch_failures.push(BatchFailure {
                        batch: batch_no,
                        units: batch.len(),
                        stage: BatchStage::Parse,
                        error: err.to_string(),
                        artifact,
                    });
                    self.pause(batch_no, total);
                    continue;
                }
            };

            if self.options.keep_responses {
                self.keep_response(path, language, batch_no, &raw);
            }

            let keyed = response::into_keyed(parsed, batch.start);
            let outcome = merge::merge_batch(catalog.units_mut(), batch, &keyed, nplurals);
            info!(
                batch = batch_no,
                succeeded = outcome.succeeded,
                failed = outcome.failed,
                "batch merged"
            );

            report.failed += outcome.failed;
            report.unit_failures.extend(outcome.failures);

            // Persist every batch so a crash loses at most the one in flight.
            if let Err(err) = self.provider.save(&catalog, path) {
                let unsaved = outcome.succeeded + batches[k + 1..].iter().map(Batch::len).sum::<usize>();
                error!(batch = batch_no, error = %err, "catalog not saved, stopping");
                report.failed += unsaved;
                report.batch_failures.push(BatchFailure {
                    batch: batch_no,
                    units: unsaved,
                    stage: BatchStage::Save,
                    error: err.to_string(),
                    artifact: None,
                });
                break;
            }
            report.succeeded += outcome.succeeded;
            debug!("catalog saved");

            if self.compile(path) {
                report.compiled = true;
            }

            self.pause(batch_no, total);
        }

        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            "file done"
        );

        Ok(report)
    }

    fn compile(&self, path: &Path) -> bool {
        match compile_if_stale(self.compiler, path) {
            Ok(done) => done,
            Err(err) => {
                warn!(error = %err, "compilation failed");
                false
            }
        }
    }

    fn keep_response(&self, path: &Path, language: &str, batch_no: usize, raw: &str) -> Option<PathBuf> {
        match store::save_artifact(&self.options.debug_dir, language, path, batch_no, raw) {
            Ok(p) => {
                info!(artifact = %p.display(), "raw response saved");
                Some(p)
            }
            Err(err) => {
                warn!(error = %err, "could not save raw response");
                None
            }
        }
    }

    fn pause(&self, batch_no: usize, total: usize) {
        if batch_no < total && !self.options.delay.is_zero() {
            thread::sleep(self.options.delay);
        }
    }

    fn preview(&self, catalog: &Catalog, batches: &[Batch], path: &Path, language: &str) {
        let file_label = path.display().to_string();
        let nplurals = catalog.nplurals();

        for (k, batch) in batches.iter().enumerate() {
            let text = prompt::build_prompt(catalog.units(), batch, &file_label, language, nplurals);
            let preview: String = text.chars().take(DRY_RUN_PREVIEW_CHARS).collect();
            info!(batch = k + 1, units = batch.len(), "dry run, prompt not sent");
            debug!("prompt preview:\n{preview}");
        }
    }
}
