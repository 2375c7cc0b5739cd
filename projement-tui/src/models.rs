//! Domain models for the Projement API.
//!
//! These structs match the JSON served by the projects endpoints and use serde
//! for (de)serialization. Hour values are decimals on the server and arrive
//! either as JSON numbers or as decimal strings ("12.50"), so both are accepted.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Server-side primary key of a project
pub type ProjectId = i64;

/// Upper bound of a single actual-hours field (DecimalField(max_digits=6, decimal_places=2))
pub const MAX_ACTUAL_HOURS: f64 = 9999.99;

// ============================================
// Hour helpers
// ============================================

/// Round an hour value to two decimal places
pub fn round_hours(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    Text(String),
}

fn deserialize_hours<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| serde::de::Error::custom(format!("invalid hours '{}': {}", s, e))),
    }
}

fn serialize_hours_fixed<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format!("{:.2}", round_hours(*value)))
}

// ============================================
// Tags and companies
// ============================================

/// Bootstrap palette name attached to a tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TagColor {
    Primary,
    Secondary,
    Success,
    Danger,
    Warning,
    Info,
    Light,
    Dark,
    /// Any name the server sends that is not in the palette
    Other(String),
}

impl TagColor {
    pub fn as_str(&self) -> &str {
        match self {
            TagColor::Primary => "primary",
            TagColor::Secondary => "secondary",
            TagColor::Success => "success",
            TagColor::Danger => "danger",
            TagColor::Warning => "warning",
            TagColor::Info => "info",
            TagColor::Light => "light",
            TagColor::Dark => "dark",
            TagColor::Other(name) => name,
        }
    }
}

impl From<String> for TagColor {
    fn from(value: String) -> Self {
        match value.as_str() {
            "primary" => TagColor::Primary,
            "secondary" => TagColor::Secondary,
            "success" => TagColor::Success,
            "danger" => TagColor::Danger,
            "warning" => TagColor::Warning,
            "info" => TagColor::Info,
            "light" => TagColor::Light,
            "dark" => TagColor::Dark,
            _ => TagColor::Other(value),
        }
    }
}

impl From<TagColor> for String {
    fn from(color: TagColor) -> Self {
        color.as_str().to_string()
    }
}

impl fmt::Display for TagColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub color: TagColor,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Company {
    #[serde(default)]
    pub name: String,
}

// ============================================
// Projects
// ============================================

/// Project record as served by `/api/projects`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub title: String,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub has_ended: bool,
    #[serde(default)]
    pub is_over_budget: bool,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub company: Company,

    #[serde(default)]
    pub estimated_design: u32,
    #[serde(default)]
    pub estimated_development: u32,
    #[serde(default)]
    pub estimated_testing: u32,

    #[serde(default, deserialize_with = "deserialize_hours")]
    pub actual_design: f64,
    #[serde(default, deserialize_with = "deserialize_hours")]
    pub actual_development: f64,
    #[serde(default, deserialize_with = "deserialize_hours")]
    pub actual_testing: f64,

    #[serde(default, deserialize_with = "deserialize_hours")]
    pub total_estimated_hours: f64,
    #[serde(default, deserialize_with = "deserialize_hours")]
    pub total_actual_hours: f64,
}

impl Project {
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            "Untitled Project"
        } else {
            &self.title
        }
    }

    /// Whether the end date is on or before `today` (the title gets struck through)
    pub fn ended_on(&self, today: NaiveDate) -> bool {
        self.end_date.is_some_and(|end| end <= today)
    }

    /// Sum of the estimated hour fields, as the server computes it
    pub fn computed_total_estimated_hours(&self) -> u32 {
        self.estimated_design + self.estimated_development + self.estimated_testing
    }

    /// Sum of the actual hour fields, as the server computes it
    pub fn computed_total_actual_hours(&self) -> f64 {
        round_hours(self.actual_design + self.actual_development + self.actual_testing)
    }

    /// Current actual-hours counters as an update payload
    pub fn actual_hours(&self) -> HoursUpdate {
        HoursUpdate {
            actual_design: self.actual_design,
            actual_development: self.actual_development,
            actual_testing: self.actual_testing,
        }
    }
}

/// Actual-hours payload sent with `PUT /api/projects/{id}/`
///
/// The three fields are cumulative counters: a delta entered by the user is
/// added to the stored values before it is sent.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HoursUpdate {
    #[serde(serialize_with = "serialize_hours_fixed", deserialize_with = "deserialize_hours")]
    pub actual_design: f64,
    #[serde(serialize_with = "serialize_hours_fixed", deserialize_with = "deserialize_hours")]
    pub actual_development: f64,
    #[serde(serialize_with = "serialize_hours_fixed", deserialize_with = "deserialize_hours")]
    pub actual_testing: f64,
}

impl HoursUpdate {
    pub fn new(actual_design: f64, actual_development: f64, actual_testing: f64) -> Self {
        Self {
            actual_design,
            actual_development,
            actual_testing,
        }
    }

    /// Add `self` (a delta) to the stored counters, rounding each to 2 decimals
    pub fn accumulate_onto(&self, stored: &HoursUpdate) -> HoursUpdate {
        HoursUpdate {
            actual_design: round_hours(stored.actual_design + self.actual_design),
            actual_development: round_hours(stored.actual_development + self.actual_development),
            actual_testing: round_hours(stored.actual_testing + self.actual_testing),
        }
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        let fields = [self.actual_design, self.actual_development, self.actual_testing];
        if fields.iter().any(|h| !h.is_finite()) {
            return Err("Hours must be numbers");
        }
        if fields.iter().any(|h| *h < 0.0) {
            return Err("Hours cannot be negative");
        }
        if fields.iter().any(|h| *h > MAX_ACTUAL_HOURS) {
            return Err("Hours cannot exceed 9999.99");
        }
        Ok(())
    }
}

// ============================================
// Validation errors
// ============================================

/// Body of an HTTP 400 answer to an update, kept exactly as the server sent it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(pub Value);

impl ValidationErrors {
    pub fn body(&self) -> &Value {
        &self.0
    }

    /// Messages reported for a single field
    pub fn messages_for(&self, field: &str) -> Vec<String> {
        self.0
            .get(field)
            .map(flatten_messages)
            .unwrap_or_default()
    }

    /// Every `(field, messages)` pair, ordered by field name
    pub fn field_messages(&self) -> Vec<(String, Vec<String>)> {
        match &self.0 {
            Value::Object(map) => map
                .iter()
                .map(|(field, messages)| (field.clone(), flatten_messages(messages)))
                .collect(),
            other => vec![("non_field_errors".to_string(), flatten_messages(other))],
        }
    }

    /// One-line summary for logs and popups
    pub fn summary(&self) -> String {
        self.field_messages()
            .into_iter()
            .map(|(field, messages)| format!("{}: {}", field, messages.join(", ")))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

fn flatten_messages(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().flat_map(flatten_messages).collect(),
        Value::String(s) => vec![s.clone()],
        Value::Null => Vec::new(),
        Value::Object(map) => map
            .iter()
            .flat_map(|(key, nested)| {
                flatten_messages(nested)
                    .into_iter()
                    .map(move |msg| format!("{}: {}", key, msg))
            })
            .collect(),
        other => vec![other.to_string()],
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// A project with sensible defaults, in the shape the API returns
    pub fn project(id: ProjectId) -> Project {
        Project {
            id,
            title: format!("Test Project {}", id),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            end_date: NaiveDate::from_ymd_opt(2030, 1, 1),
            has_ended: false,
            is_over_budget: false,
            tags: Vec::new(),
            company: Company {
                name: "Test Company".to_string(),
            },
            estimated_design: 5,
            estimated_development: 3,
            estimated_testing: 2,
            actual_design: 1.5,
            actual_development: 2.0,
            actual_testing: 1.5,
            total_estimated_hours: 10.0,
            total_actual_hours: 5.0,
        }
    }

    pub fn projects(count: i64) -> Vec<Project> {
        (1..=count).map(project).collect()
    }
}
