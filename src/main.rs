use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use po_translator::config::AppConfig;
use po_translator::services::ai::{ChatClient, CompletionService};
use po_translator::services::catalog::PoFileProvider;
use po_translator::services::compile::MoCompiler;
use po_translator::services::coordinator::{enumerate_work, Coordinator};
use po_translator::services::pipeline::PipelineOptions;
use po_translator::services::report::{RunReport, WorkOutcome};

#[derive(Parser, Debug)]
#[command(name = "po-translator")]
#[command(about = "Batch-translate gettext .po catalogs with a chat-completion model", long_about = None)]
struct Args {
    /// Locale root containing <lang>/LC_MESSAGES/*.po
    #[arg(long, default_value = "locales", value_name = "DIR")]
    locale_dir: PathBuf,

    /// Target language codes, comma-separated
    #[arg(long, default_value = "zh_CN", value_delimiter = ',')]
    lang: Vec<String>,

    /// Maximum entries per batch
    #[arg(long)]
    batch_size: Option<usize>,

    /// Maximum source characters per batch
    #[arg(long)]
    max_chars: Option<usize>,

    /// Seconds to wait between batches
    #[arg(long)]
    sleep: Option<f64>,

    /// Build prompts only; never call the service or write files
    #[arg(long)]
    dry_run: bool,

    /// Do not write <file>.po.bak before translating
    #[arg(long)]
    no_backup: bool,

    /// Worker threads (default: available parallelism)
    #[arg(long)]
    workers: Option<usize>,

    /// Config file (default: ./po-translator.toml if present)
    #[arg(long, value_name = "TOML")]
    config: Option<PathBuf>,

    /// Model name sent to the service
    #[arg(long)]
    model: Option<String>,

    /// Service provider: deepseek, openai or custom
    #[arg(long)]
    provider: Option<String>,

    /// Language the catalogs are written in; it is never translated
    #[arg(long)]
    source_lang: Option<String>,

    /// Where raw responses are kept for review
    #[arg(long, value_name = "DIR")]
    debug_dir: Option<PathBuf>,

    /// Keep every raw response, not only unparsable ones
    #[arg(long)]
    keep_responses: bool,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn apply(&self, cfg: &mut AppConfig) {
        if let Some(v) = self.batch_size {
            cfg.batch.size = v;
        }
        if let Some(v) = self.max_chars {
            cfg.batch.max_chars = v;
        }
        if let Some(v) = self.sleep {
            cfg.batch.sleep_secs = v;
        }
        if self.no_backup {
            cfg.run.backup = false;
        }
        if self.keep_responses {
            cfg.run.keep_responses = true;
        }
        if let Some(v) = self.workers {
            cfg.run.workers = Some(v);
        }
        if let Some(v) = &self.model {
            cfg.service.model = v.clone();
        }
        if let Some(v) = &self.provider {
            cfg.service.provider = v.clone();
        }
        if let Some(v) = &self.source_lang {
            cfg.run.source_language = v.clone();
        }
        if let Some(v) = &self.debug_dir {
            cfg.run.debug_dir = v.clone();
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(&args) {
        Ok(report) => {
            if let Err(e) = print_report(&report, args.json) {
                error!("failed to write report: {e}");
                return ExitCode::FAILURE;
            }
            if report.is_clean() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            }
        }
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> anyhow::Result<RunReport> {
    let mut cfg = AppConfig::load(args.config.as_deref()).context("load config")?;
    args.apply(&mut cfg);
    cfg.validate().context("invalid settings")?;

    let items = enumerate_work(&args.locale_dir, &args.lang, &cfg.run.source_language)
        .context("collect catalogs")?;

    info!(
        items = items.len(),
        dry_run = args.dry_run,
        model = %cfg.service.model,
        "starting"
    );

    let options = PipelineOptions::from_config(&cfg);
    let service_cfg = cfg.service.clone();
    let factory = move || -> po_translator::Result<Box<dyn CompletionService>> {
        Ok(Box::new(ChatClient::from_config(&service_cfg)?))
    };

    let coordinator = Coordinator {
        provider: &PoFileProvider,
        compiler: &MoCompiler,
        options: &options,
        factory: &factory,
        workers: cfg.workers(),
        dry_run: args.dry_run,
    };

    let report = coordinator.run(&items).context("run workers")?;
    Ok(report)
}

fn print_report(report: &RunReport, json: bool) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(report)?)?;
        return Ok(());
    }

    for outcome in &report.outcomes {
        match outcome {
            WorkOutcome::Translated(file) => {
                let mode = if file.dry_run { " (dry run)" } else { "" };
                writeln!(
                    out,
                    "[{}] {}: {} pending, {} ok, {} failed{}",
                    file.language,
                    file.catalog.display(),
                    file.pending,
                    file.succeeded,
                    file.failed,
                    mode
                )?;
            }
            WorkOutcome::BuiltFromSource { language, instruction } => {
                writeln!(out, "[{language}] {instruction}")?;
            }
            WorkOutcome::Failed {
                catalog,
                language,
                error,
            } => {
                writeln!(out, "[{language}] {}: FAILED: {error}", catalog.display())?;
            }
        }
    }

    writeln!(
        out,
        "total: {} ok, {} failed, {} file(s) failed",
        report.succeeded, report.failed, report.files_failed
    )?;
    out.flush()?;

    Ok(())
}
