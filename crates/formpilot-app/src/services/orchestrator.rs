//! End-to-end pipeline: parse the source document, decode and validate
//! records, enrich them, resolve technology options, and submit each record
//! with failure isolation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};

use crate::pipeline::{
    DEFAULT_AUDIENCE, OptionSet, Record, TechChoice, choose, extract_discovered, resolve,
};
use crate::services::backoff::BackoffController;
use crate::services::cache::ArtifactCache;
use crate::services::collaborators::{DocumentParser, FormExecutor, NotesGenerator};
use crate::services::context::{PipelineError, PipelineResult};
use crate::services::enrich::Enricher;
use crate::services::submission::{SubmissionController, build_directive, inter_record_pause};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessMode {
    /// One record at a time, no batch pauses.
    Sequential,
    /// Records grouped into batches with an optional pause between batches.
    Batched,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub mode: ProcessMode,
    pub batch_size: usize,
    /// Pause for operator confirmation before saves and between batches.
    pub interactive: bool,
    /// Fill the form but stop before saving.
    pub confirm_before_save: bool,
    pub fast_mode: bool,
    pub max_attempts: u32,
}

impl RunOptions {
    /// Operator prompts only fire in interactive runs that are not in fast
    /// mode; fast mode exists to remove every avoidable wait.
    pub fn prompts_enabled(&self) -> bool {
        self.interactive && !self.fast_mode
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            mode: ProcessMode::Batched,
            batch_size: 3,
            interactive: false,
            confirm_before_save: false,
            fast_mode: false,
            max_attempts: crate::services::submission::DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Outcome of one pipeline run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub parsed: usize,
    pub valid: usize,
    pub invalid: usize,
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, String)>,
    /// Set when the run stopped early, on operator request or because no
    /// record survived validation.
    pub aborted: bool,
    pub elapsed: Duration,
    /// Wall-clock time per submitted record, in submission order.
    pub record_elapsed: Vec<(String, Duration)>,
    /// Wall-clock time per batch, in partition order.
    pub batch_elapsed: Vec<Duration>,
}

impl RunReport {
    pub fn is_empty(&self) -> bool {
        self.parsed == 0
    }

    pub fn total_submitted(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

pub struct PipelineOrchestrator {
    parser: Arc<dyn DocumentParser>,
    generator: Arc<dyn NotesGenerator>,
    executor: Arc<dyn FormExecutor>,
    cache: ArtifactCache,
    backoff: BackoffController,
    options: RunOptions,
}

impl PipelineOrchestrator {
    pub fn new(
        parser: Arc<dyn DocumentParser>,
        generator: Arc<dyn NotesGenerator>,
        executor: Arc<dyn FormExecutor>,
        cache: ArtifactCache,
        backoff: BackoffController,
        options: RunOptions,
    ) -> Self {
        Self {
            parser,
            generator,
            executor,
            cache,
            backoff,
            options,
        }
    }

    /// Run the pipeline over one source document. The executor is shut down
    /// on every exit path, success and error alike.
    pub async fn run(mut self, document: PathBuf) -> PipelineResult<RunReport> {
        let started = Instant::now();
        let outcome = self.run_stages(&document).await;
        self.executor.shutdown().await;
        tracing::info!(event = "executor_shutdown");
        let mut report = outcome?;
        report.elapsed = started.elapsed();
        Ok(report)
    }

    async fn run_stages(&mut self, document: &PathBuf) -> PipelineResult<RunReport> {
        let mut report = RunReport::default();

        tracing::info!(event = "parse_start", document = %document.display());
        let raw_text = self.parser.parse(document).await?;
        let mut records = decode_records(&raw_text)?;
        report.parsed = records.len();
        println!("Parsed {} record(s) from {}", records.len(), document.display());

        let mut enricher = Enricher::new(self.generator.as_ref(), &mut self.cache);
        enricher.ensure_internal_notes(&mut records).await;
        enricher.enforce_field_limits(&mut records).await;

        // Derived fields are filled before the validation gate so a record is
        // only rejected for data nothing downstream can supply.
        let option_set = self.tech_option_set().await;
        let audience_pool = self.audience_pool();
        for record in &mut records {
            if record.audience.is_empty() {
                record.audience = audience_pool.clone();
            }
            let needs_main = record.main_technology.trim().is_empty();
            let needs_additional = record.additional_technologies.iter().all(|s| s.is_empty());
            if needs_main || needs_additional {
                let chosen = choose(&record.title, &record.description, &option_set);
                let resolved = resolve(&chosen, &option_set);
                if needs_main {
                    record.main_technology = resolved.main;
                }
                if needs_additional {
                    record.additional_technologies = resolved.additional;
                }
            } else {
                // Author-provided values are still snapped onto the live
                // pools so the executor never targets a missing entry.
                let provided = TechChoice {
                    main: record.main_technology.clone(),
                    additional: record.additional_technologies.clone(),
                };
                let resolved = resolve(&provided, &option_set);
                record.main_technology = resolved.main;
                record.additional_technologies = resolved.additional;
            }
        }

        let mut valid = Vec::new();
        for record in records {
            let missing = record.missing_fields();
            if missing.is_empty() {
                valid.push(record);
            } else {
                report.invalid += 1;
                println!(
                    "Skipping '{}': missing {}",
                    record.display_title(),
                    missing.join(", ")
                );
                tracing::warn!(
                    event = "record_invalid",
                    title = %record.display_title(),
                    missing = %missing.join(",")
                );
            }
        }
        report.valid = valid.len();
        if valid.is_empty() {
            println!("No valid records to submit.");
            report.aborted = true;
            return Ok(report);
        }

        self.submit_all(valid, &mut report).await;
        Ok(report)
    }

    /// Pools from the cache, else a discovery pass against the live form,
    /// else the built-in fallback. Whatever wins is stored so later runs
    /// skip the lookup.
    async fn tech_option_set(&mut self) -> OptionSet {
        if let Some(set) = self.cache.tech_options() {
            tracing::debug!(
                event = "tech_options_cached",
                primary = set.primary.len(),
                additional = set.additional.len()
            );
            return set;
        }
        if let Some(set) = self.discover_option_set().await {
            return set;
        }
        let fallback = OptionSet::fallback();
        self.cache.set_tech_options(&fallback);
        self.cache.save();
        tracing::info!(event = "tech_options_fallback");
        fallback
    }

    async fn discover_option_set(&mut self) -> Option<OptionSet> {
        let payload = match self.executor.discover_options().await {
            Ok(Some(payload)) => payload,
            Ok(None) => return None,
            Err(err) => {
                tracing::debug!(event = "discovery_failed", error = %err);
                return None;
            }
        };
        let (set, audience) = extract_discovered(&payload);
        if let Some(audience) = audience {
            self.cache.set_target_audience(&audience);
        }
        let set = set.filter(|s| !s.is_empty())?;
        self.cache.set_tech_options(&set);
        self.cache.save();
        tracing::info!(
            event = "tech_options_discovered",
            primary = set.primary.len(),
            additional = set.additional.len()
        );
        Some(set)
    }

    fn audience_pool(&mut self) -> Vec<String> {
        if let Some(audience) = self.cache.target_audience() {
            return audience;
        }
        let fallback: Vec<String> = DEFAULT_AUDIENCE.iter().map(|s| s.to_string()).collect();
        self.cache.set_target_audience(&fallback);
        self.cache.save();
        fallback
    }

    async fn submit_all(&mut self, records: Vec<Record>, report: &mut RunReport) {
        let total = records.len();
        let batch_size = match self.options.mode {
            ProcessMode::Sequential => 1,
            ProcessMode::Batched => self.options.batch_size.max(1),
        };
        let batches: Vec<&[Record]> = records.chunks(batch_size).collect();
        let batch_count = batches.len();

        let mut position = 0usize;
        'run: for (batch_index, batch) in batches.iter().enumerate() {
            let batch_started = Instant::now();
            if self.options.mode == ProcessMode::Batched {
                tracing::info!(
                    event = "batch_start",
                    batch = batch_index + 1,
                    batches = batch_count,
                    size = batch.len()
                );
            }
            for record in *batch {
                position += 1;
                println!(
                    "Submitting record {position}/{total}: {}",
                    record.display_title()
                );

                if self.options.prompts_enabled() && !self.confirm_submission(record) {
                    println!("Skipped '{}'", record.display_title());
                    continue;
                }

                let directive = build_directive(
                    record,
                    self.options.confirm_before_save,
                    self.options.fast_mode,
                );
                let mut controller = SubmissionController::new(
                    self.executor.as_ref(),
                    &mut self.backoff,
                    self.options.max_attempts,
                );
                let record_started = Instant::now();
                let outcome = controller.submit(&directive, record).await;
                let record_elapsed = record_started.elapsed();
                report
                    .record_elapsed
                    .push((record.display_title().to_string(), record_elapsed));
                match outcome {
                    Ok(_) => {
                        println!("  -> saved in {}", fmt_duration(record_elapsed));
                        report.succeeded.push(record.title.clone());
                    }
                    Err(err) => {
                        println!("  -> failed after {}: {err}", fmt_duration(record_elapsed));
                        report
                            .failed
                            .push((record.display_title().to_string(), err.to_string()));
                        if self.options.prompts_enabled() && !self.confirm_continue() {
                            report.aborted = true;
                            report.batch_elapsed.push(batch_started.elapsed());
                            break 'run;
                        }
                    }
                }

                if position < total {
                    tokio::time::sleep(inter_record_pause(self.options.fast_mode)).await;
                }
            }
            let batch_elapsed = batch_started.elapsed();
            report.batch_elapsed.push(batch_elapsed);
            if self.options.mode == ProcessMode::Batched {
                println!(
                    "Batch {}/{} done in {}",
                    batch_index + 1,
                    batch_count,
                    fmt_duration(batch_elapsed)
                );
            }
            let last_batch = batch_index + 1 == batch_count;
            if self.options.mode == ProcessMode::Batched
                && self.options.prompts_enabled()
                && !last_batch
                && !self.confirm_next_batch(batch_index + 2, batch_count)
            {
                report.aborted = true;
                break;
            }
        }
    }

    fn confirm_submission(&self, record: &Record) -> bool {
        let prompt = format!("Submit '{}'?", record.display_title());
        // A failed prompt (non-interactive terminal) counts as a yes; the
        // operator opted in to the run itself.
        inquire::Confirm::new(&prompt)
            .with_default(true)
            .prompt()
            .unwrap_or(true)
    }

    fn confirm_continue(&self) -> bool {
        inquire::Confirm::new("A record failed. Continue with the rest?")
            .with_default(true)
            .prompt()
            .unwrap_or(true)
    }

    fn confirm_next_batch(&self, next: usize, total: usize) -> bool {
        let prompt = format!("Continue with batch {next}/{total}?");
        inquire::Confirm::new(&prompt)
            .with_default(true)
            .prompt()
            .unwrap_or(true)
    }
}

/// Decode a JSON array of record objects from parser output. Code fences are
/// stripped and the payload narrowed to the outermost `[...]` span before
/// decoding.
pub fn decode_records(raw: &str) -> PipelineResult<Vec<Record>> {
    let payload = extract_json_array(raw);
    let objects: Vec<Map<String, Value>> =
        serde_json::from_str(payload).map_err(|err| PipelineError::Parse {
            reason: err.to_string(),
            raw: snippet(raw),
        })?;
    Ok(objects.iter().map(Record::from_raw).collect())
}

fn extract_json_array(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(stripped) = text.strip_prefix("```") {
        // Drop the fence line ("```json" or bare "```") and the closing fence.
        text = stripped
            .split_once('\n')
            .map(|(_, rest)| rest)
            .unwrap_or(stripped);
        text = text.strip_suffix("```").unwrap_or(text).trim();
    }
    match (text.find('['), text.rfind(']')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

fn snippet(raw: &str) -> String {
    const LIMIT: usize = 400;
    if raw.chars().count() <= LIMIT {
        return raw.to_string();
    }
    raw.chars().take(LIMIT).collect()
}

/// Render an elapsed duration as `HH:MM:SS.mmm`.
pub fn fmt_duration(elapsed: Duration) -> String {
    let total_secs = elapsed.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    let millis = elapsed.subsec_millis();
    format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
}
