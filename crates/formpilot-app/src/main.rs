use std::process;
use std::sync::Arc;

use tracing_subscriber::{filter::LevelFilter, fmt};

use formpilot_app::cli::{Cli, Commands, RunArgs, RunMode};
use formpilot_app::config;
use formpilot_app::error::AppError;
use formpilot_app::services::{
    PipelineOrchestrator, ProcessMode, RunOptions, build_run_context, fmt_duration,
};
use formpilot_app::services::collaborators::{DocumentParser, FormExecutor, NotesGenerator};
use formpilot_app::services::local::{DryRunExecutor, PassthroughParser, UnavailableGenerator};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let log_level = determine_log_level(&cli);
    init_tracing(log_level);

    if let Err(err) = run(cli).await {
        eprintln!("{err}");
        process::exit(1);
    }
}

fn init_tracing(level: LevelFilter) {
    let subscriber = fmt().with_max_level(level).with_target(false).finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::warn!("Tracing subscriber already set; skipping re-initialization.");
    }
}

fn determine_log_level(cli: &Cli) -> LevelFilter {
    match cli.verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    match cli.command {
        Some(Commands::Run(args)) => run_automation(args).await,
        None => {
            Cli::print_help();
            Ok(())
        }
    }
}

async fn run_automation(args: RunArgs) -> Result<(), AppError> {
    if !args.document.is_file() {
        return Err(AppError::MissingDocument {
            path: args.document,
        });
    }

    let config = config::load()?;
    let context = build_run_context(&config, args.fast)?;

    let parser: Arc<dyn DocumentParser> = Arc::new(PassthroughParser);
    let generator: Arc<dyn NotesGenerator> = Arc::new(UnavailableGenerator);
    let executor: Arc<dyn FormExecutor> = Arc::new(DryRunExecutor);
    if !args.dry_run {
        // The live browser executor plugs in here; until one is configured
        // every run rehearses against the dry-run executor.
        tracing::warn!(
            event = "executor_dry_run_only",
            target = %config.automation.target_url,
            "no live executor configured, running in dry-run mode"
        );
    }

    let options = RunOptions {
        mode: match args.mode {
            RunMode::Sequential => ProcessMode::Sequential,
            RunMode::Batched => ProcessMode::Batched,
        },
        batch_size: args.batch_size.max(1),
        interactive: args.interactive,
        confirm_before_save: args.confirm_before_save,
        fast_mode: args.fast,
        max_attempts: config.automation.max_attempts.max(1),
    };

    let orchestrator = PipelineOrchestrator::new(
        parser,
        generator,
        executor,
        context.cache,
        context.backoff,
        options,
    );
    let report = orchestrator.run(args.document).await?;

    println!();
    println!(
        "Done in {}: {} parsed, {} valid, {} invalid{}",
        fmt_duration(report.elapsed),
        report.parsed,
        report.valid,
        report.invalid,
        if report.aborted { " (aborted)" } else { "" },
    );
    if report.is_empty() {
        println!("No records found in the document.");
    } else {
        println!(
            "  submissions: {} attempted, {} saved, {} failed",
            report.total_submitted(),
            report.succeeded.len(),
            report.failed.len()
        );
    }
    for (title, reason) in &report.failed {
        println!("  failed: {title}: {reason}");
    }
    Ok(())
}
