use chrono::{DateTime, NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;

use super::InferenceOptions;
use crate::graph::{StringTypes, TransformedStringKind};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StrC {
    pub types: StringTypes,
}

static UUID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("uuid pattern is valid")
});

static INTEGER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?(0|[1-9][0-9]*)$").expect("integer pattern is valid"));

impl StrC {
    /// A recognised sub-format is recorded instead of the literal.
    pub(super) fn observe(s: &str, options: InferenceOptions) -> Self {
        let detected = if options.detect_formats { detect_format(s) } else { None };
        let types = match detected {
            Some(kind) => StringTypes::from_transformation(kind),
            None => StringTypes::from_case(s, 1),
        };
        Self { types }
    }

    pub(super) fn join(a: &Self, b: &Self) -> Self {
        Self { types: a.types.union(&b.types) }
    }
}

pub fn detect_format(s: &str) -> Option<TransformedStringKind> {
    if looks_like_integer(s) {
        Some(TransformedStringKind::IntegerString)
    } else if s == "true" || s == "false" {
        Some(TransformedStringKind::BoolString)
    } else if UUID.is_match(s) {
        Some(TransformedStringKind::Uuid)
    } else if DateTime::parse_from_rfc3339(s).is_ok() {
        Some(TransformedStringKind::DateTime)
    } else if NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok() {
        Some(TransformedStringKind::Date)
    } else if NaiveTime::parse_from_str(s, "%H:%M:%S%.f").is_ok() {
        Some(TransformedStringKind::Time)
    } else if looks_like_uri(s) {
        Some(TransformedStringKind::Uri)
    } else {
        None
    }
}

/// Integer text that fits an i64.
fn looks_like_integer(s: &str) -> bool {
    INTEGER.is_match(s) && s.parse::<i64>().is_ok()
}

pub fn looks_like_uri(s: &str) -> bool {
    s.starts_with("http://")
        || s.starts_with("https://")
        || s.starts_with("mailto:")
        || s.starts_with("tel:")
}
