use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

// --- Entry ---

/// One scraped news item or post, pre-classified upstream.
///
/// Field names follow the scrapers' JSON. Older feeds use the English
/// spellings, accepted as aliases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(
        default,
        rename = "tytul",
        alias = "title",
        deserialize_with = "null_as_default"
    )]
    pub title: String,
    #[serde(
        default,
        rename = "tresc",
        alias = "context",
        alias = "body",
        deserialize_with = "null_as_default"
    )]
    pub body: String,
    #[serde(default, rename = "czy_demonstracja", alias = "demonstration")]
    pub is_protest: Option<bool>,
    #[serde(default, rename = "czy_przestepstwo", alias = "crime")]
    pub is_crime: Option<bool>,
    /// Publication date as the source gave it; no particular format.
    #[serde(default, rename = "data", deserialize_with = "null_as_default")]
    pub raw_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_account: Option<String>,
    /// Area names the scraper matched in the text.
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "null_as_default",
    )]
    pub locations: Vec<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// --- LabelSet ---

pub const DATE_WARNING: &str = "date failed ISO 8601 validation";
pub const PLACE_WARNING: &str = "place too generic; refine it or estimate the nearest named place";

/// Normalized labels for one entry.
///
/// Serialized keys are the ones downstream consumers read. Warnings are
/// advisory: a `LabelSet` carrying them is still a successful result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSet {
    #[serde(rename = "miejsce", default, skip_serializing_if = "Option::is_none")]
    pub place: Option<String>,
    #[serde(rename = "data", default, skip_serializing_if = "Option::is_none")]
    pub event_time: Option<String>,
    #[serde(
        rename = "szacowany_czas_zakonczenia",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub estimated_end: Option<String>,
    /// 1-5, `None` when the model gave nothing usable.
    #[serde(rename = "poziom_zagrozenia", default)]
    pub danger: Option<u8>,
    /// 1-5, `None` when the model gave nothing usable.
    #[serde(rename = "komfort", default)]
    pub comfort: Option<u8>,
    #[serde(
        rename = "podsumowanie",
        default,
        skip_serializing_if = "Option::is_none",
    )]
    pub summary: Option<String>,
    #[serde(rename = "adres_url", default)]
    pub source_url: String,
    #[serde(
        rename = "data_warning",
        default,
        skip_serializing_if = "Option::is_none",
    )]
    pub date_warning: Option<String>,
    #[serde(
        rename = "miejsce_warning",
        default,
        skip_serializing_if = "Option::is_none",
    )]
    pub place_warning: Option<String>,
}

impl LabelSet {
    pub fn warnings(&self) -> Vec<&str> {
        [&self.date_warning, &self.place_warning]
            .into_iter()
            .filter_map(|w| w.as_deref())
            .collect()
    }

    pub fn has_warnings(&self) -> bool {
        self.date_warning.is_some() || self.place_warning.is_some()
    }
}

// --- TaskResult ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Labeled(LabelSet),
    Failed(String),
}

/// What became of one entry. Produced exactly once per entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskResult {
    pub entry: Entry,
    pub outcome: TaskOutcome,
    /// External calls made, successful one included.
    pub attempts: u32,
    /// Total time spent waiting between attempts.
    pub backoff: Duration,
}

impl TaskResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, TaskOutcome::Labeled(_))
    }

    pub fn labels(&self) -> Option<&LabelSet> {
        match &self.outcome {
            TaskOutcome::Labeled(labels) => Some(labels),
            TaskOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            TaskOutcome::Labeled(_) => None,
            TaskOutcome::Failed(error) => Some(error),
        }
    }

    /// Project to the shape written to the output file.
    pub fn into_record(self) -> OutputRecord {
        let labels = match self.outcome {
            TaskOutcome::Labeled(labels) => OutputLabels::Labels(labels),
            TaskOutcome::Failed(error) => OutputLabels::Error { error },
        };
        OutputRecord { labels }
    }
}

// --- Output ---

/// One element of the output array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub labels: OutputLabels,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputLabels {
    // Must stay first: every LabelSet field is optional, so an error object
    // would otherwise deserialize as an empty LabelSet.
    Error { error: String },
    Labels(LabelSet),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entry_reads_scraper_keys() {
        let entry: Entry = serde_json::from_value(json!({
            "url": "https://example.com/a",
            "tytul": "Robbery on Unknown St",
            "tresc": "Two men robbed a shop.",
            "czy_demonstracja": false,
            "czy_przestepstwo": true,
            "data": "2025-10-04"
        }))
        .unwrap();
        assert_eq!(entry.title, "Robbery on Unknown St");
        assert_eq!(entry.body, "Two men robbed a shop.");
        assert_eq!(entry.is_protest, Some(false));
        assert_eq!(entry.is_crime, Some(true));
        assert_eq!(entry.raw_date, "2025-10-04");
        assert!(entry.locations.is_empty());
    }

    #[test]
    fn entry_reads_english_aliases() {
        let entry: Entry = serde_json::from_value(json!({
            "url": "https://example.com/b",
            "title": "Stabbing in Hackney",
            "context": "Police were called to Mare Street.",
            "demonstration": false,
            "crime": true,
            "data": "Sat, 04 Oct 2025 10:00:00 GMT",
            "source_account": "newsapi",
            "locations": ["Hackney"]
        }))
        .unwrap();
        assert_eq!(entry.title, "Stabbing in Hackney");
        assert_eq!(entry.body, "Police were called to Mare Street.");
        assert_eq!(entry.is_crime, Some(true));
        assert_eq!(entry.source_account.as_deref(), Some("newsapi"));
        assert_eq!(entry.locations, vec!["Hackney".to_string()]);
    }

    #[test]
    fn entry_tolerates_missing_and_null_fields() {
        let entry: Entry = serde_json::from_value(json!({"url": null, "tytul": "x"})).unwrap();
        assert_eq!(entry.url, "");
        assert_eq!(entry.title, "x");
        assert_eq!(entry.is_protest, None);
        assert_eq!(entry.raw_date, "");
    }

    #[test]
    fn label_set_serializes_downstream_keys() {
        let labels = LabelSet {
            place: Some("Mare Street, Hackney".into()),
            event_time: Some("2025-10-04T13:45:00+01:00".into()),
            estimated_end: Some("2025-10-04T18:00:00+01:00".into()),
            danger: Some(4),
            comfort: None,
            summary: Some("Napad na sklep".into()),
            source_url: "https://example.com/a".into(),
            date_warning: None,
            place_warning: None,
        };
        let value = serde_json::to_value(&labels).unwrap();
        assert_eq!(value["miejsce"], "Mare Street, Hackney");
        assert_eq!(value["poziom_zagrozenia"], 4);
        assert!(value["komfort"].is_null());
        assert_eq!(value["adres_url"], "https://example.com/a");
        assert!(value.get("data_warning").is_none());
        assert!(value.get("miejsce_warning").is_none());
    }

    #[test]
    fn warnings_are_listed() {
        let labels = LabelSet {
            place_warning: Some(PLACE_WARNING.into()),
            ..Default::default()
        };
        assert!(labels.has_warnings());
        assert_eq!(labels.warnings(), vec![PLACE_WARNING]);
    }

    #[test]
    fn records_have_exactly_one_shape() {
        let ok = TaskResult {
            entry: Entry::default(),
            outcome: TaskOutcome::Labeled(LabelSet {
                source_url: "https://example.com".into(),
                ..Default::default()
            }),
            attempts: 1,
            backoff: Duration::ZERO,
        };
        let failed = TaskResult {
            entry: Entry::default(),
            outcome: TaskOutcome::Failed("connection refused".into()),
            attempts: 5,
            backoff: Duration::from_secs(31),
        };

        let ok = serde_json::to_value(ok.into_record()).unwrap();
        assert_eq!(ok["labels"]["adres_url"], "https://example.com");
        assert!(ok["labels"].get("error").is_none());

        let failed = serde_json::to_value(failed.into_record()).unwrap();
        assert_eq!(failed, json!({"labels": {"error": "connection refused"}}));
    }

    #[test]
    fn records_read_back_into_the_right_variant() {
        let error: OutputRecord =
            serde_json::from_value(json!({"labels": {"error": "timeout"}})).unwrap();
        assert_eq!(
            error.labels,
            OutputLabels::Error {
                error: "timeout".into()
            }
        );

        let labels: OutputRecord = serde_json::from_value(json!({
            "labels": {
                "miejsce": "Oxford Circus station",
                "poziom_zagrozenia": 2,
                "komfort": 3,
                "adres_url": "u"
            }
        }))
        .unwrap();
        assert!(matches!(labels.labels, OutputLabels::Labels(ref l) if l.danger == Some(2)));
    }
}
