// Test mocks for the labeling pipeline.
//
// - ScriptedExtractor (LabelExtractor): per-URL queue of scripted replies,
//   with call counting and an in-flight high-water mark.
//
// Plus helpers for building entries and model arguments.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use ai_client::{AiError, ToolDefinition};
use async_trait::async_trait;
use serde_json::{json, Value};

use citywatch_common::Entry;

use crate::labeler::LabelExtractor;
use crate::retry::RetryPolicy;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn test_entry(url: &str, title: &str) -> Entry {
    Entry {
        url: url.to_string(),
        title: title.to_string(),
        body: format!("{title}. Police attended the scene."),
        is_protest: Some(false),
        is_crime: Some(true),
        raw_date: "2025-10-04".to_string(),
        ..Default::default()
    }
}

/// Well-formed `set_labels` arguments for `url`.
pub fn good_args(url: &str) -> Value {
    json!({
        "miejsce": "12 Mare Street, Hackney",
        "data": "2025-10-04T13:45:00+01:00",
        "szacowany_czas_zakonczenia": "2025-10-04T18:00:00+01:00",
        "poziom_zagrozenia": 3,
        "komfort": 2,
        "podsumowanie": "Napad na sklep",
        "adres_url": url
    })
}

/// Millisecond-scale retry policy so tests don't sleep for seconds.
pub fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_backoff: Duration::from_millis(4),
        max_backoff: Duration::from_millis(64),
        jitter: Duration::from_millis(1),
        structural_delay: Duration::from_millis(2),
    }
}

// ---------------------------------------------------------------------------
// ScriptedExtractor
// ---------------------------------------------------------------------------

/// One scripted reply from the fake model.
#[derive(Debug, Clone)]
pub enum Step {
    /// Model calls the function with these arguments.
    Args(Value),
    /// Model calls the function with this raw (possibly broken) argument text.
    RawArgs(String),
    /// Model answers in free text, without the forced call.
    NoToolCall,
    RateLimited,
    Timeout,
    Connection,
    /// Non-transient HTTP failure.
    ServerError,
}

impl Step {
    fn into_result(self) -> Result<String, AiError> {
        match self {
            Step::Args(value) => Ok(value.to_string()),
            Step::RawArgs(raw) => Ok(raw),
            Step::NoToolCall => Err(AiError::MissingToolCall("set_labels".into())),
            Step::RateLimited => Err(AiError::RateLimited {
                status: 429,
                message: "Rate limit reached".into(),
            }),
            Step::Timeout => Err(AiError::Timeout("Request timed out".into())),
            Step::Connection => Err(AiError::Connection("connection refused".into())),
            Step::ServerError => Err(AiError::Api {
                status: 500,
                message: "internal error".into(),
            }),
        }
    }
}

/// URL-keyed fake model. Each URL pops its next scripted step; once a
/// script runs dry its last step repeats. Unscripted URLs get the fallback.
pub struct ScriptedExtractor {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    last: Mutex<HashMap<String, Step>>,
    fallback: Step,
    latency: Duration,
    calls: Mutex<HashMap<String, u32>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedExtractor {
    /// Every unscripted entry gets well-formed arguments echoing nothing
    /// back for the URL, so the validator backfills it.
    pub fn new() -> Self {
        let mut args = good_args("");
        if let Some(map) = args.as_object_mut() {
            map.remove("adres_url");
        }
        Self::with_fallback(Step::Args(args))
    }

    pub fn with_fallback(fallback: Step) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            last: Mutex::new(HashMap::new()),
            fallback,
            latency: Duration::ZERO,
            calls: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn on(self, url: &str, steps: impl IntoIterator<Item = Step>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(url.to_string(), steps.into_iter().collect());
        self
    }

    /// Simulated network latency per call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self, url: &str) -> u32 {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.calls.lock().unwrap().values().sum()
    }

    /// Most calls that were ever in progress at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn next_step(&self, url: &str) -> Step {
        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(VecDeque::pop_front);
        let mut last = self.last.lock().unwrap();
        match scripted {
            Some(step) => {
                last.insert(url.to_string(), step.clone());
                step
            }
            None => last.get(url).cloned().unwrap_or_else(|| self.fallback.clone()),
        }
    }
}

impl Default for ScriptedExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LabelExtractor for ScriptedExtractor {
    async fn extract(
        &self,
        entry: &Entry,
        _system: &str,
        _user: &str,
        _tool: &ToolDefinition,
    ) -> Result<String, AiError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(entry.url.clone())
            .or_insert(0) += 1;

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let step = self.next_step(&entry.url);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        step.into_result()
    }
}
