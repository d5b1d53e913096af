use std::future::Future;

use anyhow::Result;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    database::{keys, Database},
    outbound::ApiClient,
    search::{FilterState, SearchCriterion},
};

/// A named, persisted search: term, filters and criteria.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub(crate) struct SavedQuery {
    #[serde(default)]
    pub(crate) id: String,
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) description: Option<String>,
    pub(crate) query_data: QueryData,
    #[serde(default)]
    pub(crate) created_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct QueryData {
    pub(crate) search_term: String,
    pub(crate) filters: FilterState,
    pub(crate) search_criteria: Vec<SearchCriterion>,
    pub(crate) saved_at: Option<String>,
}

/// Where saved queries live.
pub(crate) trait QueryRepository: Send + Sync {
    fn list(&self) -> impl Future<Output = Result<Vec<SavedQuery>>> + Send;
    fn save(&self, query: SavedQuery) -> impl Future<Output = Result<SavedQuery>> + Send;
    fn delete(&self, id: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Saved queries kept by the remote API.
pub(crate) struct RemoteQueryRepository {
    client: ApiClient,
}

impl RemoteQueryRepository {
    pub(crate) fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

impl QueryRepository for RemoteQueryRepository {
    async fn list(&self) -> Result<Vec<SavedQuery>> {
        self.client.saved_queries().await
    }

    async fn save(&self, query: SavedQuery) -> Result<SavedQuery> {
        self.client.save_query(&query).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.client.delete_query(id).await
    }
}

/// Saved queries kept in the local store under
/// [`keys::SAVED_QUERIES`].
pub(crate) struct LocalQueryRepository {
    db: Database,
}

impl LocalQueryRepository {
    pub(crate) fn new(db: Database) -> Self {
        Self { db }
    }

    fn load(&self) -> Result<Vec<SavedQuery>> {
        Ok(self.db.get(keys::SAVED_QUERIES)?.unwrap_or_default())
    }
}

impl QueryRepository for LocalQueryRepository {
    async fn list(&self) -> Result<Vec<SavedQuery>> {
        self.load()
    }

    /// Replaces the query with the same id, or appends it. A query without
    /// an id gets a locally generated one.
    async fn save(&self, mut query: SavedQuery) -> Result<SavedQuery> {
        let mut queries = self.load()?;
        if query.id.is_empty() {
            query.id = format!("local-{}", Timestamp::now().as_millisecond());
        }
        if let Some(existing) = queries.iter_mut().find(|q| q.id == query.id) {
            existing.clone_from(&query);
        } else {
            queries.push(query.clone());
        }
        self.db.set(keys::SAVED_QUERIES, &queries)?;
        Ok(query)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut queries = self.load()?;
        queries.retain(|q| q.id != id);
        self.db.set(keys::SAVED_QUERIES, &queries)
    }
}

/// Tries `remote` first and uses `local` when it fails.
///
/// Listing also uses `local` when `remote` succeeds with no queries, since
/// accounts that were never migrated get an empty list from the API. The two
/// stores are never reconciled.
pub(crate) struct FallbackQueryRepository<R, L> {
    remote: R,
    local: L,
}

impl<R, L> FallbackQueryRepository<R, L> {
    pub(crate) fn new(remote: R, local: L) -> Self {
        Self { remote, local }
    }
}

impl<R, L> QueryRepository for FallbackQueryRepository<R, L>
where
    R: QueryRepository,
    L: QueryRepository,
{
    async fn list(&self) -> Result<Vec<SavedQuery>> {
        match self.remote.list().await {
            Ok(queries) if !queries.is_empty() => Ok(queries),
            Ok(_) => {
                info!("No saved queries from the API, reading the local store");
                self.local.list().await
            }
            Err(e) => {
                warn!("Failed to list saved queries from the API: {e:#}");
                self.local.list().await
            }
        }
    }

    async fn save(&self, query: SavedQuery) -> Result<SavedQuery> {
        match self.remote.save(query.clone()).await {
            Ok(saved) => Ok(saved),
            Err(e) => {
                warn!("Failed to save query through the API, saving locally: {e:#}");
                self.local.save(query).await
            }
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        match self.remote.delete(id).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!("Failed to delete query through the API, deleting locally: {e:#}");
                self.local.delete(id).await
            }
        }
    }
}

pub(crate) type SavedQueries = FallbackQueryRepository<RemoteQueryRepository, LocalQueryRepository>;
