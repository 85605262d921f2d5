use ai_client::ToolDefinition;
use schemars::gen::SchemaGenerator;
use schemars::schema::{InstanceType, Schema, SchemaObject};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use citywatch_common::{Entry, LabelSet};

/// Name of the one function the model is forced to call.
pub const LABEL_FUNCTION: &str = "set_labels";

pub const PLACE_LANGUAGE: &str = "English";
pub const SUMMARY_LANGUAGE: &str = "Polish";

pub const SYSTEM_PROMPT: &str = "You return labels as JSON through function calling. \
Follow ISO 8601 for the 'data' field and give the location below city level.";

/// Arguments of the `set_labels` call.
///
/// The advertised schema is strict (all seven fields required, scales bounded
/// 1-5), but parsing is lenient: scales are kept as raw JSON so the validator
/// can clamp or drop them instead of failing the attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LabelArgs {
    /// Exact place (street and number / intersection / square / station / landmark, plus
    /// district or arrondissement), in English. If none is given, estimate the nearest named place.
    #[serde(rename = "miejsce", default)]
    #[schemars(with = "String")]
    pub place: Option<String>,

    /// Date and time of the event in ISO 8601 with a timezone offset, e.g.
    /// 2025-10-04T13:45:00+02:00. If only the date is known, use 00:00 for the time.
    #[serde(rename = "data", default)]
    #[schemars(schema_with = "iso_datetime_schema")]
    pub event_time: Option<String>,

    /// Estimated end of the situation based on similar past events (preferably ISO 8601
    /// with a timezone offset, e.g. 2025-10-04T13:45:00+02:00).
    #[serde(rename = "szacowany_czas_zakonczenia", default)]
    #[schemars(with = "String")]
    pub estimated_end: Option<String>,

    /// Scale 1-5: how dangerous the area is.
    #[serde(rename = "poziom_zagrozenia", default)]
    #[schemars(schema_with = "scale_schema")]
    pub danger: Option<serde_json::Value>,

    /// Scale 1-5: impact on getting around the city comfortably.
    #[serde(rename = "komfort", default)]
    #[schemars(schema_with = "scale_schema")]
    pub comfort: Option<serde_json::Value>,

    /// A few words of summary, in Polish.
    #[serde(rename = "podsumowanie", default)]
    #[schemars(with = "String")]
    pub summary: Option<String>,

    /// URL of the source.
    #[serde(rename = "adres_url", default)]
    #[schemars(with = "String")]
    pub source_url: Option<String>,
}

impl From<&LabelSet> for LabelArgs {
    fn from(labels: &LabelSet) -> Self {
        Self {
            place: labels.place.clone(),
            event_time: labels.event_time.clone(),
            estimated_end: labels.estimated_end.clone(),
            danger: labels.danger.map(serde_json::Value::from),
            comfort: labels.comfort.map(serde_json::Value::from),
            summary: labels.summary.clone(),
            source_url: Some(labels.source_url.clone()),
        }
    }
}

fn iso_datetime_schema(_: &mut SchemaGenerator) -> Schema {
    SchemaObject {
        instance_type: Some(InstanceType::String.into()),
        format: Some("date-time".to_string()),
        ..Default::default()
    }
    .into()
}

fn scale_schema(_: &mut SchemaGenerator) -> Schema {
    let mut schema = SchemaObject {
        instance_type: Some(InstanceType::Integer.into()),
        ..Default::default()
    };
    schema.number().minimum = Some(1.0);
    schema.number().maximum = Some(5.0);
    schema.into()
}

/// The function definition handed to the model with forced selection.
pub fn label_tool() -> ToolDefinition {
    ToolDefinition::for_output::<LabelArgs>(
        LABEL_FUNCTION,
        "Assign labels to a news entry about an event in the city.",
    )
}

fn flag(value: Option<bool>) -> &'static str {
    match value {
        Some(true) => "true",
        Some(false) => "false",
        None => "unknown",
    }
}

/// Render the per-entry extraction request.
pub fn build_user_prompt(entry: &Entry) -> String {
    let mut prompt = format!(
        "Extract labels from the press data according to the schema.\n\
         Requirements:\n\
         - 'miejsce' must be more specific than a country or city. Give the street and number, \
         or an intersection / square / station / landmark, plus the district or arrondissement, \
         in {PLACE_LANGUAGE}. If it is not stated outright, estimate the nearest named place.\n\
         - 'data' must be ISO 8601 (with T and a timezone), e.g. 2025-10-04T13:45:00+02:00. \
         If only the date is known, use 00:00 and the correct timezone offset.\n\
         - 'szacowany_czas_zakonczenia': estimate it from similar past events.\n\
         - 'poziom_zagrozenia' and 'komfort' are integers from 1 to 5.\n\
         - 'podsumowanie': a few words, factual, in {SUMMARY_LANGUAGE}.\n\
         - Return only function arguments that match the schema.\n\n\
         Input data:\n\
         - url: {url}\n\
         - title: {title}\n\
         - body: {body}\n\
         - is_protest: {protest}\n\
         - is_crime: {crime}\n\
         - raw_date: {date}\n",
        url = entry.url,
        title = entry.title,
        body = entry.body,
        protest = flag(entry.is_protest),
        crime = flag(entry.is_crime),
        date = entry.raw_date,
    );

    if !entry.locations.is_empty() {
        prompt.push_str(&format!(
            "- areas mentioned: {}\n",
            entry.locations.join(", ")
        ));
    }

    prompt
}
