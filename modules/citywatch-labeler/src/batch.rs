use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use citywatch_common::{CitywatchError, Config, Entry, OutputRecord, TaskResult};

use crate::labeler::{LabelExtractor, Labeler};
use crate::limiter::Limiter;
use crate::retry::RetryPolicy;

/// Emit a progress line every this many completions (and on the last one).
pub const PROGRESS_EVERY: usize = 10;

/// Stats from a labeling run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchStats {
    pub entries: usize,
    pub labeled: usize,
    pub failed: usize,
    pub date_warnings: usize,
    pub place_warnings: usize,
    pub attempts: u64,
    pub backoff: Duration,
    pub peak_in_flight: usize,
}

impl BatchStats {
    pub fn from_results(results: &[TaskResult]) -> Self {
        let mut stats = Self {
            entries: results.len(),
            ..Self::default()
        };
        for result in results {
            stats.attempts += u64::from(result.attempts);
            stats.backoff += result.backoff;
            match result.labels() {
                Some(labels) => {
                    stats.labeled += 1;
                    if labels.date_warning.is_some() {
                        stats.date_warnings += 1;
                    }
                    if labels.place_warning.is_some() {
                        stats.place_warnings += 1;
                    }
                }
                None => stats.failed += 1,
            }
        }
        stats
    }
}

impl fmt::Display for BatchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n=== Labeling Run Complete ===")?;
        writeln!(f, "Entries:          {}", self.entries)?;
        writeln!(f, "Labeled:          {}", self.labeled)?;
        writeln!(f, "Failed:           {}", self.failed)?;
        writeln!(f, "Date warnings:    {}", self.date_warnings)?;
        writeln!(f, "Place warnings:   {}", self.place_warnings)?;
        writeln!(f, "API attempts:     {}", self.attempts)?;
        writeln!(f, "Backoff slept:    {:.1}s", self.backoff.as_secs_f64())?;
        write!(f, "Peak in flight:   {}", self.peak_in_flight)
    }
}

pub fn should_report_progress(done: usize, total: usize) -> bool {
    done % PROGRESS_EVERY == 0 || done == total
}

/// Fan out one labeling task per entry and collect results as they finish.
///
/// Results come back in completion order, not input order.
pub async fn label_batch(labeler: &Labeler, entries: Vec<Entry>) -> Vec<TaskResult> {
    let total = entries.len();
    let mut pending: FuturesUnordered<_> = entries
        .into_iter()
        .map(|entry| labeler.label(entry))
        .collect();

    let mut results = Vec::with_capacity(total);
    while let Some(result) = pending.next().await {
        results.push(result);
        let done = results.len();
        if should_report_progress(done, total) {
            info!(done, total, "processed {done}/{total}");
        }
    }
    results
}

/// Read the input array. Unreadable files and malformed JSON are fatal.
pub async fn load_entries(path: &Path) -> Result<Vec<Entry>, CitywatchError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CitywatchError::Input {
            path: path.to_path_buf(),
            source,
        })?;
    serde_json::from_str(&raw).map_err(|source| CitywatchError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Write the output array, creating parent directories as needed.
pub async fn write_output(path: &Path, records: &[OutputRecord]) -> Result<(), CitywatchError> {
    let output_err = |source: std::io::Error| CitywatchError::Output {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(output_err)?;
    }

    let json = serde_json::to_string_pretty(records).map_err(|source| CitywatchError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    tokio::fs::write(path, json).await.map_err(output_err)
}

/// Run one full batch: load, label, write.
///
/// A batch where every entry failed still writes its (error-only) output.
pub async fn run_batch(
    config: &Config,
    extractor: Arc<dyn LabelExtractor>,
) -> Result<BatchStats, CitywatchError> {
    let policy = RetryPolicy::default().with_max_attempts(config.max_retries);
    run_batch_with_policy(config, extractor, policy).await
}

pub async fn run_batch_with_policy(
    config: &Config,
    extractor: Arc<dyn LabelExtractor>,
    policy: RetryPolicy,
) -> Result<BatchStats, CitywatchError> {
    let entries = load_entries(&config.input_path).await?;

    let run_id = Uuid::new_v4();
    let span = info_span!("label_batch", %run_id, entries = entries.len());

    async move {
        info!(
            input = %config.input_path.display(),
            max_concurrency = config.max_concurrency,
            max_attempts = policy.max_attempts,
            "Starting labeling run"
        );

        let limiter = Arc::new(Limiter::new(config.max_concurrency));
        let labeler = Labeler::new(extractor, limiter.clone(), policy);

        let results = label_batch(&labeler, entries).await;

        let mut stats = BatchStats::from_results(&results);
        stats.peak_in_flight = limiter.peak();

        let records: Vec<OutputRecord> = results.into_iter().map(TaskResult::into_record).collect();
        write_output(&config.output_path, &records).await?;

        info!("{stats}");
        info!(output = %config.output_path.display(), "Labeled output written");
        Ok::<_, CitywatchError>(stats)
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use citywatch_common::{LabelSet, TaskOutcome, DATE_WARNING, PLACE_WARNING};

    #[test]
    fn progress_every_ten_and_on_last() {
        let reported: Vec<usize> = (1..=25).filter(|&d| should_report_progress(d, 25)).collect();
        assert_eq!(reported, vec![10, 20, 25]);

        let reported: Vec<usize> = (1..=20).filter(|&d| should_report_progress(d, 20)).collect();
        assert_eq!(reported, vec![10, 20]);

        assert!(should_report_progress(3, 3));
        assert!(!should_report_progress(2, 3));
    }

    #[test]
    fn stats_count_outcomes_and_warnings() {
        let ok = TaskResult {
            entry: Entry::default(),
            outcome: TaskOutcome::Labeled(LabelSet {
                date_warning: Some(DATE_WARNING.into()),
                place_warning: Some(PLACE_WARNING.into()),
                ..Default::default()
            }),
            attempts: 2,
            backoff: Duration::from_millis(500),
        };
        let clean = TaskResult {
            entry: Entry::default(),
            outcome: TaskOutcome::Labeled(LabelSet::default()),
            attempts: 1,
            backoff: Duration::ZERO,
        };
        let failed = TaskResult {
            entry: Entry::default(),
            outcome: TaskOutcome::Failed("boom".into()),
            attempts: 5,
            backoff: Duration::from_secs(31),
        };

        let stats = BatchStats::from_results(&[ok, clean, failed]);
        assert_eq!(stats.entries, 3);
        assert_eq!(stats.labeled, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.date_warnings, 1);
        assert_eq!(stats.place_warnings, 1);
        assert_eq!(stats.attempts, 8);
        assert_eq!(stats.backoff, Duration::from_millis(31_500));

        let text = stats.to_string();
        assert!(text.contains("Labeled:          2"));
        assert!(text.contains("Failed:           1"));
    }
}
