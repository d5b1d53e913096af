pub(crate) mod criterion;
pub(crate) mod field;
pub(crate) mod filter;

use std::{cmp::Ordering, collections::BTreeSet};

use async_graphql::Enum;
use serde::{Deserialize, Serialize};

pub(crate) use self::criterion::{Logic, Operator, SearchCriterion};
pub(crate) use self::field::TrialField;
pub(crate) use self::filter::{FilterCategory, FilterState};
use self::field::FieldValue;
use crate::database::Trial;

/// Fields matched by the free-text search box.
const SEARCH_FIELDS: [TrialField; 5] = [
    TrialField::TrialId,
    TrialField::TherapeuticArea,
    TrialField::DiseaseType,
    TrialField::PrimaryDrugs,
    TrialField::Title,
];

#[derive(Enum, Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub(crate) struct SortSpec {
    pub(crate) field: TrialField,
    #[serde(default)]
    pub(crate) direction: SortDirection,
}

/// Everything that narrows and orders the trial list.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct TrialQuery {
    pub(crate) search_term: String,
    pub(crate) filters: FilterState,
    pub(crate) criteria: Vec<SearchCriterion>,
    pub(crate) sort: Option<SortSpec>,
}

impl TrialQuery {
    /// Search text AND filters AND criteria.
    pub(crate) fn matches(&self, trial: &Trial) -> bool {
        matches_search(&self.search_term, trial)
            && self.filters.matches(trial)
            && criterion::matches_criteria(&self.criteria, trial)
    }
}

/// Case-insensitive substring match of `term` against the search fields. An
/// empty term matches every trial.
pub(crate) fn matches_search(term: &str, trial: &Trial) -> bool {
    if term.is_empty() {
        return true;
    }
    let term = term.to_lowercase();
    SEARCH_FIELDS.iter().any(|field| {
        field
            .values(trial)
            .iter()
            .any(|v| v.as_text().to_lowercase().contains(&term))
    })
}

/// Filters and orders `trials` without modifying them.
///
/// Without a sort field the input order is kept. Sorting is stable.
pub(crate) fn evaluate<'a>(trials: &'a [Trial], query: &TrialQuery) -> Vec<&'a Trial> {
    let mut matched: Vec<&Trial> = trials.iter().filter(|t| query.matches(t)).collect();
    if let Some(sort) = query.sort {
        matched.sort_by(|a, b| {
            let ord = compare_by(sort.field, a, b);
            match sort.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            }
        });
    }
    matched
}

#[derive(Debug)]
enum SortKey {
    Number(f64),
    Text(String),
}

impl SortKey {
    /// Numbers sort before text.
    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Number(_), Self::Text(_)) => Ordering::Less,
            (Self::Text(_), Self::Number(_)) => Ordering::Greater,
        }
    }
}

/// The key a trial sorts by: the first value of the field. Text is compared
/// lower-cased, numbers by value, and a missing value sorts first.
fn sort_key(field: TrialField, trial: &Trial) -> Option<SortKey> {
    let value = field.values(trial).into_iter().next()?;
    Some(match value {
        FieldValue::Number(n) if n.is_finite() => SortKey::Number(n),
        FieldValue::Number(_) => return None,
        FieldValue::Text(s) if field.is_numeric() => {
            SortKey::Number(s.trim().parse().ok().filter(|n: &f64| n.is_finite())?)
        }
        FieldValue::Text(s) => SortKey::Text(s.to_lowercase()),
    })
}

fn compare_by(field: TrialField, a: &Trial, b: &Trial) -> Ordering {
    match (sort_key(field, a), sort_key(field, b)) {
        (Some(a), Some(b)) => a.compare(&b),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Distinct values of a category across `trials`, for filter pickers.
///
/// Comma-separated values such as "Germany, France" are split, except in
/// categories matched by whole-value equality.
pub(crate) fn distinct_values(trials: &[Trial], category: FilterCategory) -> Vec<String> {
    let field = category.field();
    let split = category.splits_values();
    trials
        .iter()
        .flat_map(|t| field.values(t))
        .flat_map(|v| {
            let text = v.as_text();
            let parts: Vec<&str> = if split {
                text.split(',').collect()
            } else {
                vec![&*text]
            };
            parts
                .into_iter()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{
        distinct_values, evaluate, FilterCategory, FilterState, Operator, SearchCriterion,
        SortDirection, SortSpec, TrialField, TrialQuery,
    };
    use crate::{
        database::trial::{Overview, Site, Trial},
        search::Logic,
    };

    fn trial(id: &str, title: &str, disease: &str, drug: &str) -> Trial {
        Trial {
            trial_id: id.to_string(),
            overview: Overview {
                title: Some(title.to_string()),
                disease_type: Some(disease.to_string()),
                primary_drugs: Some(drug.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn sample() -> Vec<Trial> {
        vec![
            trial("NCT-3", "beta study", "Lung Non-small cell", "Osimertinib"),
            trial("NCT-1", "Alpha study", "Breast", "Tamoxifen"),
            trial("NCT-2", "gamma trial", "Lung small cell", "Cisplatin, Etoposide"),
        ]
    }

    fn ids(trials: &[&Trial]) -> Vec<String> {
        trials.iter().map(|t| t.trial_id.clone()).collect()
    }

    #[test]
    fn empty_query_is_identity() {
        let trials = sample();
        let result = evaluate(&trials, &TrialQuery::default());
        assert_eq!(ids(&result), vec!["NCT-3", "NCT-1", "NCT-2"]);
    }

    #[test]
    fn search_is_sound_and_complete() {
        let trials = sample();
        for term in ["lung", "STUDY", "nct-2", "tamox", "zzz"] {
            let query = TrialQuery {
                search_term: term.to_string(),
                ..Default::default()
            };
            let result = evaluate(&trials, &query);
            let lower = term.to_lowercase();
            let hit = |t: &Trial| {
                [
                    Some(&t.trial_id),
                    t.overview.therapeutic_area.as_ref(),
                    t.overview.disease_type.as_ref(),
                    t.overview.primary_drugs.as_ref(),
                    t.overview.title.as_ref(),
                ]
                .into_iter()
                .flatten()
                .any(|s| s.to_lowercase().contains(&lower))
            };
            assert!(result.iter().all(|t| hit(*t)), "{term}");
            let expected = trials.iter().filter(|t| hit(*t)).count();
            assert_eq!(result.len(), expected, "{term}");
        }
    }

    #[test]
    fn groups_are_anded() {
        let trials = sample();
        let query = TrialQuery {
            search_term: "study".to_string(),
            filters: FilterState {
                disease_types: vec!["lung".to_string()],
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(ids(&evaluate(&trials, &query)), vec!["NCT-3"]);

        let query = TrialQuery {
            criteria: vec![SearchCriterion {
                field: TrialField::DiseaseType,
                operator: Operator::StartsWith,
                value: "Lung".to_string(),
                logic: Logic::And,
            }],
            search_term: "cisplatin".to_string(),
            ..Default::default()
        };
        assert_eq!(ids(&evaluate(&trials, &query)), vec!["NCT-2"]);
    }

    #[test]
    fn sort_by_text_ignores_case_and_reverses() {
        let trials = sample();
        let mut query = TrialQuery {
            sort: Some(SortSpec {
                field: TrialField::Title,
                direction: SortDirection::Asc,
            }),
            ..Default::default()
        };
        let asc = ids(&evaluate(&trials, &query));
        assert_eq!(asc, vec!["NCT-1", "NCT-3", "NCT-2"]);

        query.sort = Some(SortSpec {
            field: TrialField::Title,
            direction: SortDirection::Desc,
        });
        let mut desc = ids(&evaluate(&trials, &query));
        desc.reverse();
        assert_eq!(desc, asc);
    }

    #[test]
    fn sort_by_number() {
        let mut trials = sample();
        for (t, total) in trials.iter_mut().zip([10.0, 9.0, 100.0]) {
            t.sites = vec![Site {
                total: Some(total),
                ..Default::default()
            }];
        }
        let query = TrialQuery {
            sort: Some(SortSpec {
                field: TrialField::TotalSites,
                direction: SortDirection::Asc,
            }),
            ..Default::default()
        };
        assert_eq!(
            ids(&evaluate(&trials, &query)),
            vec!["NCT-1", "NCT-3", "NCT-2"]
        );
    }

    #[test]
    fn sort_with_nan_totals_is_total() {
        let mut trials: Vec<Trial> = (0..40)
            .map(|i| trial(&format!("NCT-{i}"), "study", "Lung", "Drug"))
            .collect();
        for (i, t) in trials.iter_mut().enumerate() {
            let total = if i % 3 == 0 { f64::NAN } else { (i % 7) as f64 };
            t.sites = vec![Site {
                total: Some(total),
                ..Default::default()
            }];
        }
        let query = TrialQuery {
            sort: Some(SortSpec {
                field: TrialField::TotalSites,
                direction: SortDirection::Asc,
            }),
            ..Default::default()
        };
        let sorted = evaluate(&trials, &query);
        assert_eq!(sorted.len(), 40);
        let totals: Vec<f64> = sorted.iter().filter_map(|t| t.sites[0].total).collect();
        let nan = totals.iter().take_while(|n| n.is_nan()).count();
        assert_eq!(nan, 14);
        assert!(totals[nan..].windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn evaluate_does_not_touch_input() {
        let trials = sample();
        let before = trials.clone();
        let query = TrialQuery {
            sort: Some(SortSpec {
                field: TrialField::TrialId,
                direction: SortDirection::Desc,
            }),
            ..Default::default()
        };
        let _ = evaluate(&trials, &query);
        assert_eq!(trials, before);
    }

    #[test]
    fn every_option_matches_a_trial() {
        let mut trials = sample();
        trials[0].overview.status = Some("Open, not recruiting".to_string());
        trials[1].overview.status = Some("Open".to_string());
        trials[2].overview.trial_phase = Some("Phase I, Phase II".to_string());
        trials[2].overview.countries = Some("Germany, France".to_string());

        assert_eq!(
            distinct_values(&trials, FilterCategory::Statuses),
            vec!["Open", "Open, not recruiting"]
        );
        for category in FilterCategory::ALL {
            for option in distinct_values(&trials, category) {
                assert!(
                    trials.iter().any(|t| category.accepts(t, &option)),
                    "{category:?} {option}"
                );
            }
        }
    }

    #[test]
    fn distinct_drug_names() {
        let trials = sample();
        assert_eq!(
            distinct_values(&trials, FilterCategory::PrimaryDrugs),
            vec!["Cisplatin", "Etoposide", "Osimertinib", "Tamoxifen"]
        );
    }
}
