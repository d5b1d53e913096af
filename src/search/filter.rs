use async_graphql::Enum;
use serde::{Deserialize, Serialize};

use super::field::TrialField;
use crate::database::Trial;

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) enum FilterCategory {
    TherapeuticAreas,
    Statuses,
    DiseaseTypes,
    PrimaryDrugs,
    Phases,
    PatientSegments,
    LineOfTherapy,
    Countries,
    Sponsors,
    FieldOfActivity,
    AssociatedCro,
    TrialTags,
    Sex,
    HealthyVolunteers,
}

enum MatchRule {
    Substring,
    Equality,
    /// "Phase I" and "I" match in either direction.
    Containment,
}

impl FilterCategory {
    pub(crate) const ALL: [FilterCategory; 14] = [
        Self::TherapeuticAreas,
        Self::Statuses,
        Self::DiseaseTypes,
        Self::PrimaryDrugs,
        Self::Phases,
        Self::PatientSegments,
        Self::LineOfTherapy,
        Self::Countries,
        Self::Sponsors,
        Self::FieldOfActivity,
        Self::AssociatedCro,
        Self::TrialTags,
        Self::Sex,
        Self::HealthyVolunteers,
    ];

    pub(crate) fn field(self) -> TrialField {
        match self {
            Self::TherapeuticAreas => TrialField::TherapeuticArea,
            Self::Statuses => TrialField::Status,
            Self::DiseaseTypes => TrialField::DiseaseType,
            Self::PrimaryDrugs => TrialField::PrimaryDrugs,
            Self::Phases => TrialField::TrialPhase,
            Self::PatientSegments => TrialField::PatientSegment,
            Self::LineOfTherapy => TrialField::LineOfTherapy,
            Self::Countries => TrialField::Countries,
            Self::Sponsors => TrialField::SponsorCollaborators,
            Self::FieldOfActivity => TrialField::SponsorFieldOfActivity,
            Self::AssociatedCro => TrialField::AssociatedCro,
            Self::TrialTags => TrialField::TrialTags,
            Self::Sex => TrialField::Sex,
            Self::HealthyVolunteers => TrialField::HealthyVolunteers,
        }
    }

    fn rule(self) -> MatchRule {
        match self {
            Self::Statuses | Self::Sex | Self::HealthyVolunteers => MatchRule::Equality,
            Self::Phases => MatchRule::Containment,
            _ => MatchRule::Substring,
        }
    }

    /// Whether a comma-separated value still matches each of its parts.
    pub(super) fn splits_values(self) -> bool {
        !matches!(self.rule(), MatchRule::Equality)
    }

    /// Whether `trial` has a value in this category matching `selected`.
    pub(super) fn accepts(self, trial: &Trial, selected: &str) -> bool {
        let selected = selected.to_lowercase();
        let rule = self.rule();
        self.field().values(trial).iter().any(|value| {
            let value = value.as_text().to_lowercase();
            match rule {
                MatchRule::Substring => value.contains(&selected),
                MatchRule::Equality => value == selected,
                MatchRule::Containment => value.contains(&selected) || selected.contains(&value),
            }
        })
    }
}

/// Multi-select category constraints. An empty list places no constraint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct FilterState {
    pub(crate) therapeutic_areas: Vec<String>,
    pub(crate) statuses: Vec<String>,
    pub(crate) disease_types: Vec<String>,
    pub(crate) primary_drugs: Vec<String>,
    pub(crate) phases: Vec<String>,
    pub(crate) patient_segments: Vec<String>,
    pub(crate) line_of_therapy: Vec<String>,
    pub(crate) countries: Vec<String>,
    pub(crate) sponsors: Vec<String>,
    pub(crate) field_of_activity: Vec<String>,
    pub(crate) associated_cro: Vec<String>,
    pub(crate) trial_tags: Vec<String>,
    pub(crate) sex: Vec<String>,
    pub(crate) healthy_volunteers: Vec<String>,
}

impl FilterState {
    pub(crate) fn selected(&self, category: FilterCategory) -> &[String] {
        match category {
            FilterCategory::TherapeuticAreas => &self.therapeutic_areas,
            FilterCategory::Statuses => &self.statuses,
            FilterCategory::DiseaseTypes => &self.disease_types,
            FilterCategory::PrimaryDrugs => &self.primary_drugs,
            FilterCategory::Phases => &self.phases,
            FilterCategory::PatientSegments => &self.patient_segments,
            FilterCategory::LineOfTherapy => &self.line_of_therapy,
            FilterCategory::Countries => &self.countries,
            FilterCategory::Sponsors => &self.sponsors,
            FilterCategory::FieldOfActivity => &self.field_of_activity,
            FilterCategory::AssociatedCro => &self.associated_cro,
            FilterCategory::TrialTags => &self.trial_tags,
            FilterCategory::Sex => &self.sex,
            FilterCategory::HealthyVolunteers => &self.healthy_volunteers,
        }
    }

    /// AND across categories with a selection, OR within each category.
    pub(crate) fn matches(&self, trial: &Trial) -> bool {
        FilterCategory::ALL.iter().all(|category| {
            let selected = self.selected(*category);
            selected.is_empty() || selected.iter().any(|v| category.accepts(trial, v))
        })
    }
}
