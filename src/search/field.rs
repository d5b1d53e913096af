use std::borrow::Cow;

use async_graphql::Enum;
use serde::{Deserialize, Serialize};

use crate::database::Trial;

/// A trial attribute that can be searched, filtered or sorted on.
#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum TrialField {
    TrialId,
    TherapeuticArea,
    DiseaseType,
    PrimaryDrugs,
    OtherDrugs,
    Title,
    Status,
    TrialPhase,
    PatientSegment,
    LineOfTherapy,
    Countries,
    Region,
    SponsorCollaborators,
    SponsorFieldOfActivity,
    AssociatedCro,
    TrialTags,
    TrialRecordStatus,
    TrialIdentifier,
    Sex,
    HealthyVolunteers,
    TargetNoVolunteers,
    ActualEnrolledVolunteers,
    TotalSites,
    StartDate,
    EndDate,
    CreatedAt,
    UpdatedAt,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum FieldValue<'a> {
    Text(&'a str),
    Number(f64),
}

impl FieldValue<'_> {
    pub(crate) fn as_text(&self) -> Cow<'_, str> {
        match self {
            Self::Text(s) => Cow::Borrowed(s),
            Self::Number(n) => Cow::Owned(n.to_string()),
        }
    }
}

impl TrialField {
    /// Every value of this field on `trial`.
    ///
    /// Fields backed by a one-to-many collection yield one value per entry
    /// that has it, so callers see all entries rather than just the first.
    /// An empty result means the field is missing.
    pub(crate) fn values(self, trial: &Trial) -> Vec<FieldValue<'_>> {
        let ov = &trial.overview;
        match self {
            Self::TrialId => vec![FieldValue::Text(&trial.trial_id)],
            Self::TherapeuticArea => single(&ov.therapeutic_area),
            Self::DiseaseType => single(&ov.disease_type),
            Self::PrimaryDrugs => single(&ov.primary_drugs),
            Self::OtherDrugs => single(&ov.other_drugs),
            Self::Title => single(&ov.title),
            Self::Status => single(&ov.status),
            Self::TrialPhase => single(&ov.trial_phase),
            Self::PatientSegment => single(&ov.patient_segment),
            Self::LineOfTherapy => single(&ov.line_of_therapy),
            Self::Countries => single(&ov.countries),
            Self::Region => single(&ov.region),
            Self::SponsorCollaborators => single(&ov.sponsor_collaborators),
            Self::SponsorFieldOfActivity => single(&ov.sponsor_field_of_activity),
            Self::AssociatedCro => single(&ov.associated_cro),
            Self::TrialTags => single(&ov.trial_tags),
            Self::TrialRecordStatus => single(&ov.trial_record_status),
            Self::CreatedAt => single(&ov.created_at),
            Self::UpdatedAt => single(&ov.updated_at),
            Self::TrialIdentifier => ov
                .trial_identifier
                .iter()
                .map(|id| FieldValue::Text(id.as_str()))
                .collect(),
            Self::Sex => texts(trial.criteria.iter().map(|c| &c.sex)),
            Self::HealthyVolunteers => {
                texts(trial.criteria.iter().map(|c| &c.healthy_volunteers))
            }
            Self::TargetNoVolunteers => {
                numbers(trial.criteria.iter().map(|c| c.target_no_volunteers))
            }
            Self::ActualEnrolledVolunteers => {
                numbers(trial.criteria.iter().map(|c| c.actual_enrolled_volunteers))
            }
            Self::TotalSites => numbers(trial.sites.iter().map(|s| s.total)),
            Self::StartDate => texts(trial.timing.iter().map(|t| &t.start_date_estimated)),
            Self::EndDate => texts(trial.timing.iter().map(|t| &t.trial_end_date_estimated)),
        }
    }

    pub(crate) fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::TargetNoVolunteers | Self::ActualEnrolledVolunteers | Self::TotalSites
        )
    }
}

fn single(value: &Option<String>) -> Vec<FieldValue<'_>> {
    value.as_deref().map(FieldValue::Text).into_iter().collect()
}

fn texts<'a>(iter: impl Iterator<Item = &'a Option<String>>) -> Vec<FieldValue<'a>> {
    iter.filter_map(|v| v.as_deref().map(FieldValue::Text))
        .collect()
}

fn numbers<'a>(iter: impl Iterator<Item = Option<f64>>) -> Vec<FieldValue<'a>> {
    iter.flatten().map(FieldValue::Number).collect()
}

#[cfg(test)]
mod tests {
    use super::{FieldValue, TrialField};
    use crate::database::trial::{Criteria, Site, Trial};

    #[test]
    fn collection_fields_yield_every_entry() {
        let trial = Trial {
            trial_id: "T-1".to_string(),
            criteria: vec![
                Criteria {
                    sex: Some("Male".to_string()),
                    ..Default::default()
                },
                Criteria::default(),
                Criteria {
                    sex: Some("Female".to_string()),
                    ..Default::default()
                },
            ],
            sites: vec![Site {
                total: Some(4.0),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert_eq!(
            TrialField::Sex.values(&trial),
            vec![FieldValue::Text("Male"), FieldValue::Text("Female")]
        );
        assert_eq!(
            TrialField::TotalSites.values(&trial),
            vec![FieldValue::Number(4.0)]
        );
        assert!(TrialField::Title.values(&trial).is_empty());
        assert_eq!(
            TrialField::TrialId.values(&trial),
            vec![FieldValue::Text("T-1")]
        );
    }

    #[test]
    fn field_names_are_snake_case() {
        let field: TrialField = serde_json::from_str("\"disease_type\"").unwrap();
        assert_eq!(field, TrialField::DiseaseType);
        assert_eq!(
            serde_json::to_string(&TrialField::SponsorFieldOfActivity).unwrap(),
            "\"sponsor_field_of_activity\""
        );
    }
}
