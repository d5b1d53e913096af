use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A clinical-trial aggregate as returned by the remote trial API.
///
/// `overview` is always present. Every one-to-many collection may be empty
/// and an explicit `null` in the payload is read as empty.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub(crate) struct Trial {
    pub(crate) trial_id: String,
    pub(crate) overview: Overview,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) outcomes: Vec<Outcome>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) criteria: Vec<Criteria>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) timing: Vec<Timing>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) results: Vec<TrialResult>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) sites: Vec<Site>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) other: Vec<OtherSource>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) logs: Vec<LogEntry>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) notes: Vec<Note>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub(crate) struct Overview {
    pub(crate) id: Option<String>,
    pub(crate) therapeutic_area: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub(crate) trial_identifier: Vec<String>,
    pub(crate) trial_phase: Option<String>,
    pub(crate) status: Option<String>,
    pub(crate) primary_drugs: Option<String>,
    pub(crate) other_drugs: Option<String>,
    pub(crate) title: Option<String>,
    pub(crate) disease_type: Option<String>,
    pub(crate) patient_segment: Option<String>,
    pub(crate) line_of_therapy: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub(crate) reference_links: Vec<String>,
    pub(crate) trial_tags: Option<String>,
    pub(crate) sponsor_collaborators: Option<String>,
    pub(crate) sponsor_field_of_activity: Option<String>,
    pub(crate) associated_cro: Option<String>,
    pub(crate) countries: Option<String>,
    pub(crate) region: Option<String>,
    pub(crate) trial_record_status: Option<String>,
    pub(crate) created_at: Option<String>,
    pub(crate) updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub(crate) struct Outcome {
    pub(crate) id: Option<String>,
    pub(crate) purpose_of_trial: Option<String>,
    pub(crate) summary: Option<String>,
    pub(crate) primary_outcome_measure: Option<String>,
    pub(crate) other_outcome_measure: Option<String>,
    pub(crate) study_design_keywords: Option<String>,
    pub(crate) study_design: Option<String>,
    pub(crate) treatment_regimen: Option<String>,
    #[serde(deserialize_with = "lenient_number")]
    pub(crate) number_of_arms: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub(crate) struct Criteria {
    pub(crate) id: Option<String>,
    pub(crate) inclusion_criteria: Option<String>,
    pub(crate) exclusion_criteria: Option<String>,
    pub(crate) age_from: Option<String>,
    pub(crate) age_to: Option<String>,
    pub(crate) subject_type: Option<String>,
    pub(crate) sex: Option<String>,
    pub(crate) healthy_volunteers: Option<String>,
    #[serde(deserialize_with = "lenient_number")]
    pub(crate) target_no_volunteers: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub(crate) actual_enrolled_volunteers: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub(crate) struct Timing {
    pub(crate) id: Option<String>,
    pub(crate) start_date_estimated: Option<String>,
    pub(crate) trial_end_date_estimated: Option<String>,
    pub(crate) enrollment_closed_actual: Option<String>,
    pub(crate) result_published_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub(crate) struct TrialResult {
    pub(crate) id: Option<String>,
    pub(crate) results_available: Option<String>,
    pub(crate) trial_outcome: Option<String>,
    pub(crate) trial_outcome_content: Option<String>,
    pub(crate) adverse_event_reported: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub(crate) struct Site {
    pub(crate) id: Option<String>,
    #[serde(deserialize_with = "lenient_number")]
    pub(crate) total: Option<f64>,
    pub(crate) notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub(crate) struct LogEntry {
    pub(crate) id: Option<String>,
    pub(crate) trial_changes_log: Option<String>,
    pub(crate) trial_added_date: Option<String>,
    pub(crate) last_modified_date: Option<String>,
    pub(crate) last_modified_user: Option<String>,
    pub(crate) full_review_user: Option<String>,
    pub(crate) next_review_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub(crate) struct Note {
    pub(crate) id: Option<String>,
    pub(crate) date_type: Option<String>,
    pub(crate) notes: Option<String>,
    pub(crate) link: Option<String>,
}

/// One entry of the free-form `other` collection, parsed once on arrival.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(from = "RawOtherSource", into = "RawOtherSource")]
pub(crate) struct OtherSource {
    pub(crate) id: Option<String>,
    pub(crate) entry: SourceEntry,
}

/// Structured content of an `other` entry, keyed on its embedded `type`.
///
/// Typed variants keep the whole decoded JSON object. Anything that is not a
/// JSON object with a known `type` becomes `Unstructured` with the raw text.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SourceEntry {
    PipelineData(Value),
    PressReleases(Value),
    Publications(Value),
    TrialRegistries(Value),
    AssociatedStudies(Value),
    Legacy(Value),
    Unstructured(String),
}

impl SourceEntry {
    pub(crate) fn parse(data: Value) -> Self {
        let value = match data {
            Value::String(text) => match serde_json::from_str::<Value>(&text) {
                Ok(value @ Value::Object(_)) => value,
                _ => return Self::Unstructured(text),
            },
            value @ Value::Object(_) => value,
            Value::Null => return Self::Unstructured(String::new()),
            other => return Self::Unstructured(other.to_string()),
        };
        let kind = value.get("type").and_then(Value::as_str).unwrap_or_default();
        match kind {
            "pipeline_data" => Self::PipelineData(value),
            "press_releases" => Self::PressReleases(value),
            "publications" => Self::Publications(value),
            "trial_registries" => Self::TrialRegistries(value),
            "associated_studies" => Self::AssociatedStudies(value),
            "legacy" => Self::Legacy(value),
            _ => Self::Unstructured(value.to_string()),
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::PipelineData(_) => "pipeline_data",
            Self::PressReleases(_) => "press_releases",
            Self::Publications(_) => "publications",
            Self::TrialRegistries(_) => "trial_registries",
            Self::AssociatedStudies(_) => "associated_studies",
            Self::Legacy(_) => "legacy",
            Self::Unstructured(_) => "unstructured",
        }
    }

    /// The entry re-encoded the way it travels on the wire.
    pub(crate) fn raw(&self) -> String {
        match self {
            Self::PipelineData(v)
            | Self::PressReleases(v)
            | Self::Publications(v)
            | Self::TrialRegistries(v)
            | Self::AssociatedStudies(v)
            | Self::Legacy(v) => v.to_string(),
            Self::Unstructured(text) => text.clone(),
        }
    }
}

#[derive(Deserialize, Serialize)]
struct RawOtherSource {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    data: Value,
}

impl From<RawOtherSource> for OtherSource {
    fn from(raw: RawOtherSource) -> Self {
        Self {
            id: raw.id,
            entry: SourceEntry::parse(raw.data),
        }
    }
}

impl From<OtherSource> for RawOtherSource {
    fn from(source: OtherSource) -> Self {
        Self {
            id: source.id,
            data: Value::String(source.entry.raw()),
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts a JSON number or a numeric string. Anything else, including NaN
/// and infinities, reads as absent.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let number: Option<f64> = match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    Ok(number.filter(|n| n.is_finite()))
}
