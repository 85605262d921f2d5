//! Post-validation of model output.
//!
//! Nothing here fails: bad values are clamped, dropped to `None`, or flagged
//! with a warning, and the caller always gets a `LabelSet` back.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use citywatch_common::{Entry, LabelSet, DATE_WARNING, PLACE_WARNING};

use crate::prompt::LabelArgs;

pub const SCALE_MIN: i64 = 1;
pub const SCALE_MAX: i64 = 5;

static ISO_DATETIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}(:\d{2})?(?:\.\d+)?([+-]\d{2}:\d{2}|Z)$").unwrap()
});
static DIGIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d").unwrap());
static ARRONDISSEMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})(er|e)?\s*arr").unwrap());

/// City, region and country names that say nothing about where in the city.
const GENERIC_PLACES: &[&str] = &[
    "francja",
    "france",
    "paryż",
    "paris",
    "ile-de-france",
    "ile de france",
    "polska",
    "warszawa",
    "warsaw",
];

/// Substrings that mark a sub-city location: street types, squares,
/// stations, crossings.
const PLACE_TOKENS: &[&str] = &[
    "ul.",
    "ulica",
    "rue",
    "avenue",
    "av.",
    "boulevard",
    "bd",
    "place",
    "pl.",
    "square",
    "quai",
    "pont",
    "gare",
    "station",
    "stacja",
    "skrzyżowanie",
    "cross",
    "rond-point",
    "rue de",
    "rue du",
    "rue des",
    "bd ",
    "boul.",
    "allee",
    "allée",
];

pub fn is_iso_datetime(value: &str) -> bool {
    ISO_DATETIME_RE.is_match(value.trim())
}

/// Whether `place` names something finer than a city or country.
pub fn is_specific_place(place: &str) -> bool {
    let s = place.trim().to_lowercase();
    if s.is_empty() || GENERIC_PLACES.contains(&s.as_str()) {
        return false;
    }
    if s.chars().count() < 5 {
        return false;
    }
    if PLACE_TOKENS.iter().any(|token| s.contains(token)) {
        return true;
    }
    // House numbers, zones, "X / Y" intersections
    if DIGIT_RE.is_match(&s) || s.contains('/') {
        return true;
    }
    ARRONDISSEMENT_RE.is_match(&s) || s.contains("arrondissement")
}

/// Coerce a model-supplied scale to an integer in `[SCALE_MIN, SCALE_MAX]`.
///
/// Floats truncate, numeric strings parse, booleans count as 0/1. Anything
/// else (missing, null, text, arrays) is unknown.
pub fn clamp_scale(value: Option<&Value>) -> Option<u8> {
    let n = match value? {
        Value::Number(n) => match n.as_i64() {
            Some(i) => i,
            None => {
                let f = n.as_f64().filter(|f| f.is_finite())?;
                f.trunc() as i64
            }
        },
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        Value::Bool(b) => i64::from(*b),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    Some(n.clamp(SCALE_MIN, SCALE_MAX) as u8)
}

/// Normalize the arguments of one `set_labels` call for `entry`.
pub fn post_validate(entry: &Entry, args: LabelArgs) -> LabelSet {
    // The model is never the only source of the URL.
    let source_url = args
        .source_url
        .filter(|url| !url.is_empty())
        .unwrap_or_else(|| entry.url.clone());

    let date_warning = args
        .event_time
        .as_deref()
        .filter(|date| !is_iso_datetime(date))
        .map(|_| DATE_WARNING.to_string());

    let place_warning = (!is_specific_place(args.place.as_deref().unwrap_or_default()))
        .then(|| PLACE_WARNING.to_string());

    LabelSet {
        danger: clamp_scale(args.danger.as_ref()),
        comfort: clamp_scale(args.comfort.as_ref()),
        place: args.place,
        event_time: args.event_time,
        estimated_end: args.estimated_end,
        summary: args.summary,
        source_url,
        date_warning,
        place_warning,
    }
}

/// Run an already-normalized `LabelSet` through validation again.
pub fn revalidate(entry: &Entry, labels: &LabelSet) -> LabelSet {
    post_validate(entry, LabelArgs::from(labels))
}
