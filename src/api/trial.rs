use std::sync::Mutex;

use async_graphql::{Context, InputObject, Json, Object, Result, SimpleObject};
use jiff::Timestamp;

use crate::{
    api::{lock, ExportDir, Trials},
    database::Trial,
    export,
    pagination::{PageSize, ViewState},
    preferences::Favorites,
    search::{
        self, FilterCategory, FilterState, Logic, Operator, SearchCriterion, SortDirection,
        SortSpec, TrialField,
    },
};

/// Selected values per filter category. Omitted categories are
/// unconstrained.
#[derive(InputObject, Debug, Default)]
pub(crate) struct TrialFilterInput {
    therapeutic_areas: Option<Vec<String>>,
    statuses: Option<Vec<String>>,
    disease_types: Option<Vec<String>>,
    primary_drugs: Option<Vec<String>>,
    phases: Option<Vec<String>>,
    patient_segments: Option<Vec<String>>,
    line_of_therapy: Option<Vec<String>>,
    countries: Option<Vec<String>>,
    sponsors: Option<Vec<String>>,
    field_of_activity: Option<Vec<String>>,
    associated_cro: Option<Vec<String>>,
    trial_tags: Option<Vec<String>>,
    sex: Option<Vec<String>>,
    healthy_volunteers: Option<Vec<String>>,
}

impl From<TrialFilterInput> for FilterState {
    fn from(input: TrialFilterInput) -> Self {
        Self {
            therapeutic_areas: input.therapeutic_areas.unwrap_or_default(),
            statuses: input.statuses.unwrap_or_default(),
            disease_types: input.disease_types.unwrap_or_default(),
            primary_drugs: input.primary_drugs.unwrap_or_default(),
            phases: input.phases.unwrap_or_default(),
            patient_segments: input.patient_segments.unwrap_or_default(),
            line_of_therapy: input.line_of_therapy.unwrap_or_default(),
            countries: input.countries.unwrap_or_default(),
            sponsors: input.sponsors.unwrap_or_default(),
            field_of_activity: input.field_of_activity.unwrap_or_default(),
            associated_cro: input.associated_cro.unwrap_or_default(),
            trial_tags: input.trial_tags.unwrap_or_default(),
            sex: input.sex.unwrap_or_default(),
            healthy_volunteers: input.healthy_volunteers.unwrap_or_default(),
        }
    }
}

#[derive(InputObject, Debug)]
pub(crate) struct CriterionInput {
    field: TrialField,
    operator: Operator,
    value: String,
    /// How this criterion combines with the next one. Defaults to `AND`.
    logic: Option<Logic>,
}

impl From<CriterionInput> for SearchCriterion {
    fn from(input: CriterionInput) -> Self {
        Self {
            field: input.field,
            operator: input.operator,
            value: input.value,
            logic: input.logic.unwrap_or_default(),
        }
    }
}

#[derive(InputObject, Debug)]
struct SortInput {
    field: TrialField,
    direction: Option<SortDirection>,
}

pub(crate) struct TrialNode {
    trial: Trial,
    favorite: bool,
}

impl TrialNode {
    fn new(trial: &Trial, favorites: &Favorites) -> Self {
        Self {
            trial: trial.clone(),
            favorite: favorites.contains(&trial.trial_id),
        }
    }
}

#[Object]
impl TrialNode {
    async fn trial_id(&self) -> &str {
        &self.trial.trial_id
    }

    async fn title(&self) -> Option<&str> {
        self.trial.overview.title.as_deref()
    }

    async fn status(&self) -> Option<&str> {
        self.trial.overview.status.as_deref()
    }

    async fn trial_phase(&self) -> Option<&str> {
        self.trial.overview.trial_phase.as_deref()
    }

    async fn therapeutic_area(&self) -> Option<&str> {
        self.trial.overview.therapeutic_area.as_deref()
    }

    async fn favorite(&self) -> bool {
        self.favorite
    }

    /// Every value of `field` on this trial, as text. Empty when missing.
    async fn values(&self, field: TrialField) -> Vec<String> {
        field
            .values(&self.trial)
            .iter()
            .map(|v| v.as_text().into_owned())
            .collect()
    }

    /// The entries of the `other` collection with their kind, e.g.
    /// `publications`.
    async fn other_sources(&self) -> Vec<OtherSourceNode> {
        self.trial
            .other
            .iter()
            .map(|o| OtherSourceNode {
                id: o.id.clone(),
                kind: o.entry.kind().to_string(),
                data: o.entry.raw(),
            })
            .collect()
    }

    /// The complete record.
    async fn record(&self) -> Json<Trial> {
        Json(self.trial.clone())
    }
}

#[derive(SimpleObject)]
struct OtherSourceNode {
    id: Option<String>,
    kind: String,
    data: String,
}

#[derive(SimpleObject)]
struct TrialPageNode {
    nodes: Vec<TrialNode>,
    total_count: usize,
    total_pages: usize,
    current_page: usize,
}

#[derive(SimpleObject)]
struct TrialExport {
    file_name: String,
    json: String,
    /// The file written, when an export directory is configured.
    path: Option<String>,
}

fn nodes<'a>(
    ctx: &Context<'_>,
    trials: impl IntoIterator<Item = &'a Trial>,
) -> Result<Vec<TrialNode>> {
    let favorites = lock(ctx.data::<Mutex<Favorites>>()?)?;
    Ok(trials
        .into_iter()
        .map(|t| TrialNode::new(t, &favorites))
        .collect())
}

#[derive(Default)]
pub(super) struct TrialQuery {}

#[Object]
impl TrialQuery {
    /// One page of the trial list after search, filters, criteria and sort.
    #[allow(clippy::too_many_arguments)]
    async fn trials(
        &self,
        ctx: &Context<'_>,
        search: Option<String>,
        filters: Option<TrialFilterInput>,
        criteria: Option<Vec<CriterionInput>>,
        sort: Option<SortInput>,
        page: Option<i32>,
        page_size: Option<i32>,
    ) -> Result<TrialPageNode> {
        let mut view = ViewState::default();
        view.set_search_term(search.unwrap_or_default());
        view.set_filters(filters.map(FilterState::from).unwrap_or_default());
        view.set_criteria(
            criteria
                .unwrap_or_default()
                .into_iter()
                .map(SearchCriterion::from)
                .collect(),
        );
        view.set_sort(sort.map(|s| SortSpec {
            field: s.field,
            direction: s.direction.unwrap_or_default(),
        }));
        if let Some(size) = page_size {
            view.set_page_size(PageSize::try_from(usize::try_from(size)?)?);
        }
        view.go_to_page(usize::try_from(page.unwrap_or(1)).unwrap_or(1));

        let trials = ctx.data::<Trials>()?.trials(Timestamp::now()).await?;
        let filtered = view.evaluate(&trials);
        let page = view.paginate(&filtered);
        Ok(TrialPageNode {
            nodes: nodes(ctx, page.trials.iter().copied())?,
            total_count: page.total_count,
            total_pages: page.total_pages,
            current_page: view.current_page(),
        })
    }

    async fn trial(&self, ctx: &Context<'_>, id: String) -> Result<Option<TrialNode>> {
        let trials = ctx.data::<Trials>()?.trials(Timestamp::now()).await?;
        Ok(nodes(ctx, trials.iter().find(|t| t.trial_id == id))?.pop())
    }

    /// The trials named in a comma-separated list such as `T-1,T-2`, in that
    /// order. Unknown ids are skipped.
    async fn trials_by_ids(&self, ctx: &Context<'_>, ids: String) -> Result<Vec<TrialNode>> {
        let trials = ctx.data::<Trials>()?.trials(Timestamp::now()).await?;
        nodes(ctx, export::trials_by_ids(&trials, &ids))
    }

    /// The distinct values of a filter category, sorted.
    async fn filter_options(
        &self,
        ctx: &Context<'_>,
        category: FilterCategory,
    ) -> Result<Vec<String>> {
        let trials = ctx.data::<Trials>()?.trials(Timestamp::now()).await?;
        Ok(search::distinct_values(&trials, category))
    }
}

#[derive(Default)]
pub(super) struct TrialMutation {}

#[Object]
impl TrialMutation {
    /// Fetches the trial list now, regardless of the cache age, and returns
    /// the number of trials.
    async fn refresh_trials(&self, ctx: &Context<'_>) -> Result<usize> {
        let trials = ctx.data::<Trials>()?.refresh(Timestamp::now()).await?;
        Ok(trials.len())
    }

    async fn export_trial(&self, ctx: &Context<'_>, id: String) -> Result<TrialExport> {
        let trials = ctx.data::<Trials>()?.trials(Timestamp::now()).await?;
        let trial = trials
            .iter()
            .find(|t| t.trial_id == id)
            .ok_or_else(|| format!("unknown trial id {id}"))?;
        let path = match &ctx.data::<ExportDir>()?.0 {
            Some(dir) => Some(export::write_export(dir, trial)?.display().to_string()),
            None => None,
        };
        Ok(TrialExport {
            file_name: export::file_name(trial),
            json: export::export_json(trial)?,
            path,
        })
    }
}
