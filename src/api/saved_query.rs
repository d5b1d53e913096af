use async_graphql::{Context, Json, Object, Result};
use jiff::Timestamp;

use crate::{
    api::trial::{CriterionInput, TrialFilterInput},
    saved_query::{QueryData, QueryRepository, SavedQueries, SavedQuery},
    search::{FilterState, SearchCriterion},
};

struct SavedQueryNode(SavedQuery);

#[Object]
impl SavedQueryNode {
    async fn id(&self) -> &str {
        &self.0.id
    }

    async fn title(&self) -> &str {
        &self.0.title
    }

    async fn description(&self) -> Option<&str> {
        self.0.description.as_deref()
    }

    async fn created_at(&self) -> Option<&str> {
        self.0.created_at.as_deref()
    }

    async fn search_term(&self) -> &str {
        &self.0.query_data.search_term
    }

    async fn filters(&self) -> Json<FilterState> {
        Json(self.0.query_data.filters.clone())
    }

    async fn criteria(&self) -> Json<Vec<SearchCriterion>> {
        Json(self.0.query_data.search_criteria.clone())
    }

    async fn saved_at(&self) -> Option<&str> {
        self.0.query_data.saved_at.as_deref()
    }
}

#[derive(Default)]
pub(super) struct SavedQueryQuery {}

#[Object]
impl SavedQueryQuery {
    /// Saved queries from the API, or from the local store when the API
    /// fails or has none.
    async fn saved_queries(&self, ctx: &Context<'_>) -> Result<Vec<SavedQueryNode>> {
        let queries = ctx.data::<SavedQueries>()?.list().await?;
        Ok(queries.into_iter().map(SavedQueryNode).collect())
    }
}

#[derive(Default)]
pub(super) struct SavedQueryMutation {}

#[Object]
impl SavedQueryMutation {
    /// Saves the current search. Passing the `id` of a saved query replaces
    /// it.
    #[allow(clippy::too_many_arguments)]
    async fn save_query(
        &self,
        ctx: &Context<'_>,
        id: Option<String>,
        title: String,
        description: Option<String>,
        search: Option<String>,
        filters: Option<TrialFilterInput>,
        criteria: Option<Vec<CriterionInput>>,
    ) -> Result<SavedQueryNode> {
        if title.trim().is_empty() {
            return Err("title must not be empty".into());
        }
        let now = Timestamp::now().to_string();
        let query = SavedQuery {
            id: id.unwrap_or_default(),
            title,
            description,
            query_data: QueryData {
                search_term: search.unwrap_or_default(),
                filters: filters.map(FilterState::from).unwrap_or_default(),
                search_criteria: criteria
                    .unwrap_or_default()
                    .into_iter()
                    .map(SearchCriterion::from)
                    .collect(),
                saved_at: Some(now.clone()),
            },
            created_at: Some(now),
        };
        let saved = ctx.data::<SavedQueries>()?.save(query).await?;
        Ok(SavedQueryNode(saved))
    }

    async fn delete_query(&self, ctx: &Context<'_>, id: String) -> Result<bool> {
        ctx.data::<SavedQueries>()?.delete(&id).await?;
        Ok(true)
    }
}
