use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::model::work::WorkItem;
use crate::services::{
    ai::CompletionService,
    catalog::CatalogProvider,
    compile::Compiler,
    pipeline::{Backend, FilePipeline, PipelineOptions},
    report::{RunReport, WorkOutcome},
};

const MESSAGES_DIR: &str = "LC_MESSAGES";

/// Builds a fresh completion client. Called inside the worker that uses it.
pub trait ServiceFactory: Sync {
    fn create(&self) -> Result<Box<dyn CompletionService>>;
}

impl<F> ServiceFactory for F
where
    F: Fn() -> Result<Box<dyn CompletionService>> + Sync,
{
    fn create(&self) -> Result<Box<dyn CompletionService>> {
        self()
    }
}

/// Expands the requested languages into work items.
///
/// Every `.po` file below `<root>/<lang>/LC_MESSAGES` becomes one `Translate`
/// item, in sorted path order. The source language becomes a single
/// `BuildFromSource` item.
pub fn enumerate_work(root: &Path, languages: &[String], source_language: &str) -> Result<Vec<WorkItem>> {
    if !root.is_dir() {
        return Err(Error::config(format!("locale directory not found: {}", root.display())));
    }

    let mut seen: Vec<&str> = Vec::new();
    let mut items = Vec::new();

    for lang in languages {
        let lang = lang.trim();
        if lang.is_empty() {
            continue;
        }
        if seen.contains(&lang) {
            warn!(lang, "language requested twice, ignoring repeat");
            continue;
        }
        seen.push(lang);

        if lang == source_language {
            items.push(WorkItem::BuildFromSource {
                language: lang.to_string(),
            });
            continue;
        }

        let base = root.join(lang).join(MESSAGES_DIR);
        if !base.is_dir() {
            return Err(Error::config(format!("path not found: {}", base.display())));
        }

        let mut files: Vec<PathBuf> = Vec::new();
        for entry in WalkDir::new(&base).sort_by_file_name() {
            let entry = entry.map_err(|e| Error::config(format!("cannot walk {}: {e}", base.display())))?;
            let path = entry.path();
            if entry.file_type().is_file() && path.extension().map(|e| e == "po").unwrap_or(false) {
                files.push(path.to_path_buf());
            }
        }

        if files.is_empty() {
            warn!(lang, dir = %base.display(), "no catalogs found");
        }

        items.extend(files.into_iter().map(|catalog| WorkItem::Translate {
            catalog,
            language: lang.to_string(),
        }));
    }

    Ok(items)
}

/// What to tell the user for the source language.
pub fn build_from_source_instruction(language: &str) -> String {
    format!(
        "`{language}` is the source language: nothing to translate. Build it directly from the \
         source text, e.g. `sphinx-build -b html -D language={language} <sourcedir> <outdir>`."
    )
}

/// Fans work items out to a fixed-size pool of workers.
pub struct Coordinator<'a> {
    pub provider: &'a dyn CatalogProvider,
    pub compiler: &'a dyn Compiler,
    pub options: &'a PipelineOptions,
    pub factory: &'a dyn ServiceFactory,
    pub workers: usize,
    pub dry_run: bool,
}

impl<'a> Coordinator<'a> {
    pub fn run(&self, items: &[WorkItem]) -> Result<RunReport> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers.max(1))
            .thread_name(|i| format!("po-worker-{i}"))
            .build()
            .map_err(|e| Error::config(format!("worker pool: {e}")))?;

        info!(items = items.len(), workers = self.workers, "dispatching work");

        let outcomes: Vec<WorkOutcome> =
            pool.install(|| items.par_iter().map(|item| self.process(item)).collect());

        Ok(RunReport::from_outcomes(outcomes))
    }

    fn process(&self, item: &WorkItem) -> WorkOutcome {
        let (catalog, language) = match item {
            WorkItem::BuildFromSource { language } => {
                info!(lang = %language, "source language, skipping translation");
                return WorkOutcome::BuiltFromSource {
                    language: language.clone(),
                    instruction: build_from_source_instruction(language),
                };
            }
            WorkItem::Translate { catalog, language } => (catalog, language),
        };

        let pipeline = FilePipeline {
            provider: self.provider,
            compiler: self.compiler,
            options: self.options,
        };

        let result = if self.dry_run {
            pipeline.run(catalog, language, Backend::DryRun)
        } else {
            // Each item gets its own client; clients never leave this worker.
            self.factory
                .create()
                .and_then(|service| pipeline.run(catalog, language, Backend::Live(service.as_ref())))
        };

        match result {
            Ok(report) => WorkOutcome::Translated(report),
            Err(err) => {
                error!(file = %catalog.display(), lang = %language, error = %err, "file failed");
                WorkOutcome::Failed {
                    catalog: catalog.clone(),
                    language: language.clone(),
                    error: err.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ai::tests::no_delay;
    use crate::services::ai::{CompletionRequest, ServiceError};
    use crate::services::catalog::PoFileProvider;
    use crate::services::compile::MoCompiler;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct EchoService;

    impl CompletionService for EchoService {
        fn complete(&self, request: &CompletionRequest) -> std::result::Result<String, ServiceError> {
            // Answer every "### ENTRY n" with a translation of n.
            let entries: serde_json::Map<String, serde_json::Value> = request
                .prompt
                .lines()
                .filter_map(|l| l.strip_prefix("### ENTRY "))
                .map(|n| (n.trim().to_string(), serde_json::json!({ "translation": format!("T{}", n.trim()) })))
                .collect();
            Ok(serde_json::Value::Object(entries).to_string())
        }
    }

    fn options(dir: &Path) -> PipelineOptions {
        PipelineOptions {
            batch_size: 10,
            max_chars: 1000,
            delay: Duration::ZERO,
            backup: false,
            keep_responses: false,
            debug_dir: dir.join("responses"),
            retry: no_delay(1),
            model: "m".into(),
            max_tokens: 64,
            temperature: 0.0,
        }
    }

    fn locale_tree(root: &Path) {
        let fr = root.join("fr").join(MESSAGES_DIR);
        fs::create_dir_all(fr.join("api")).unwrap();
        fs::write(fr.join("index.po"), "msgid \"Hello\"\nmsgstr \"\"\n").unwrap();
        fs::write(fr.join("api").join("core.po"), "msgid \"Core\"\nmsgstr \"\"\n").unwrap();
        fs::write(fr.join("notes.txt"), "ignored").unwrap();

        let de = root.join("de").join(MESSAGES_DIR);
        fs::create_dir_all(&de).unwrap();
        fs::write(de.join("index.po"), "msgid \"Hello\"\nmsgstr \"\"\n").unwrap();
    }

    fn langs(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn enumerates_po_files_per_language() {
        let dir = tempfile::tempdir().unwrap();
        locale_tree(dir.path());

        let items = enumerate_work(dir.path(), &langs(&["fr", "en", "de", "fr"]), "en").unwrap();

        let fr = dir.path().join("fr").join(MESSAGES_DIR);
        assert_eq!(
            items,
            vec![
                WorkItem::Translate {
                    catalog: fr.join("api").join("core.po"),
                    language: "fr".into()
                },
                WorkItem::Translate {
                    catalog: fr.join("index.po"),
                    language: "fr".into()
                },
                WorkItem::BuildFromSource {
                    language: "en".into()
                },
                WorkItem::Translate {
                    catalog: dir.path().join("de").join(MESSAGES_DIR).join("index.po"),
                    language: "de".into()
                },
            ]
        );
    }

    #[test]
    fn missing_directories_are_config_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            enumerate_work(&dir.path().join("nope"), &langs(&["fr"]), "en"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            enumerate_work(dir.path(), &langs(&["it"]), "en"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn each_item_builds_its_own_client() {
        let dir = tempfile::tempdir().unwrap();
        locale_tree(dir.path());
        let items = enumerate_work(dir.path(), &langs(&["fr", "de", "en"]), "en").unwrap();

        let created = AtomicUsize::new(0);
        let factory = || -> Result<Box<dyn CompletionService>> {
            created.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(EchoService))
        };

        let opts = options(dir.path());
        let coord = Coordinator {
            provider: &PoFileProvider,
            compiler: &MoCompiler,
            options: &opts,
            factory: &factory,
            workers: 2,
            dry_run: false,
        };

        let report = coord.run(&items).unwrap();

        assert_eq!(created.load(Ordering::SeqCst), 3);
        assert_eq!(report.succeeded, 3);
        assert!(report.is_clean());
        assert!(matches!(
            report.outcomes[3],
            WorkOutcome::BuiltFromSource { ref language, .. } if language == "en"
        ));

        let cat = PoFileProvider
            .load(&dir.path().join("de").join(MESSAGES_DIR).join("index.po"))
            .unwrap();
        assert_eq!(cat.units()[0].translated_text.as_deref(), Some("T1"));
    }

    #[test]
    fn client_failure_fails_only_that_item() {
        let dir = tempfile::tempdir().unwrap();
        locale_tree(dir.path());
        let items = enumerate_work(dir.path(), &langs(&["de", "en"]), "en").unwrap();

        let factory =
            || -> Result<Box<dyn CompletionService>> { Err(Error::config("environment variable KEY is not set")) };

        let opts = options(dir.path());
        let coord = Coordinator {
            provider: &PoFileProvider,
            compiler: &MoCompiler,
            options: &opts,
            factory: &factory,
            workers: 1,
            dry_run: false,
        };

        let report = coord.run(&items).unwrap();

        assert_eq!(report.files_failed, 1);
        assert!(matches!(report.outcomes[0], WorkOutcome::Failed { .. }));
        assert!(matches!(report.outcomes[1], WorkOutcome::BuiltFromSource { .. }));
    }

    #[test]
    fn dry_run_never_builds_clients() {
        let dir = tempfile::tempdir().unwrap();
        locale_tree(dir.path());
        let items = enumerate_work(dir.path(), &langs(&["fr"]), "en").unwrap();

        let created = AtomicUsize::new(0);
        let factory = || -> Result<Box<dyn CompletionService>> {
            created.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(EchoService))
        };

        let opts = options(dir.path());
        let coord = Coordinator {
            provider: &PoFileProvider,
            compiler: &MoCompiler,
            options: &opts,
            factory: &factory,
            workers: 2,
            dry_run: true,
        };

        let report = coord.run(&items).unwrap();

        assert_eq!(created.load(Ordering::SeqCst), 0);
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.succeeded, 0);
    }
}
