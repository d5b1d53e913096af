mod preference;
mod saved_query;
mod session;
mod trial;

use std::{
    path::PathBuf,
    sync::{Mutex, MutexGuard},
};

use async_graphql::{EmptySubscription, MergedObject, Result};
use jiff::SignedDuration;

use crate::{
    auth::SessionStore,
    cache::{TrialCache, TrialService},
    database::Database,
    outbound::ApiClient,
    preferences::{ColumnSettings, Favorites, Selection},
    saved_query::{LocalQueryRepository, RemoteQueryRepository, SavedQueries},
    settings::Auth,
};

pub(crate) type Trials = TrialService<ApiClient>;

/// Where `exportTrial` writes files, if anywhere.
pub(crate) struct ExportDir(pub(crate) Option<PathBuf>);

/// A set of queries defined in the schema.
///
/// This is exposed only for [`Schema`], and not used directly.
#[derive(Default, MergedObject)]
pub(crate) struct Query(
    trial::TrialQuery,
    preference::PreferenceQuery,
    saved_query::SavedQueryQuery,
    session::SessionQuery,
);

/// A set of mutations defined in the schema.
#[derive(Default, MergedObject)]
pub(crate) struct Mutation(
    trial::TrialMutation,
    preference::PreferenceMutation,
    saved_query::SavedQueryMutation,
    session::SessionMutation,
);

pub(crate) type Schema = async_graphql::Schema<Query, Mutation, EmptySubscription>;

pub(crate) fn schema(
    database: Database,
    client: ApiClient,
    cache_ttl: SignedDuration,
    auth: Auth,
    export_dir: Option<PathBuf>,
) -> Schema {
    let trials = Trials::new(TrialCache::new(database.clone(), cache_ttl), client.clone());
    let saved_queries = SavedQueries::new(
        RemoteQueryRepository::new(client.clone()),
        LocalQueryRepository::new(database.clone()),
    );
    let favorites = Favorites::load(database.clone());
    let columns = ColumnSettings::load(database, &preference::DEFAULT_COLUMNS);

    Schema::build(Query::default(), Mutation::default(), EmptySubscription)
        .data(trials)
        .data(saved_queries)
        .data(client)
        .data(auth)
        .data(SessionStore::default())
        .data(Mutex::new(favorites))
        .data(Mutex::new(columns))
        .data(Mutex::new(Selection::default()))
        .data(ExportDir(export_dir))
        .finish()
}

fn lock<T>(state: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    state.lock().map_err(|_| "state lock poisoned".into())
}

#[cfg(test)]
struct TestSchema {
    _dir: tempfile::TempDir, // to prevent the data directory from being deleted while the test is running
    db: Database,
    schema: Schema,
}

#[cfg(test)]
impl TestSchema {
    fn new() -> Self {
        Self::build(Auth::default(), None)
    }

    /// A schema whose API is unreachable, so every remote call fails and
    /// only the local store answers.
    fn build(auth: Auth, export_dir: Option<PathBuf>) -> Self {
        let db_dir = tempfile::tempdir().unwrap();
        let db = Database::connect(db_dir.path()).unwrap();
        let client = ApiClient::new(&crate::settings::Api {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: Some(1),
        })
        .unwrap();
        let schema = schema(
            db.clone(),
            client,
            crate::cache::DEFAULT_TTL,
            auth,
            export_dir,
        );
        Self {
            _dir: db_dir,
            db,
            schema,
        }
    }

    /// Fills the cache as if the trials had just been fetched.
    fn seed(&self, trials: &[crate::database::Trial]) {
        TrialCache::new(self.db.clone(), crate::cache::DEFAULT_TTL)
            .store(trials, jiff::Timestamp::now());
    }

    async fn execute(&self, query: &str) -> async_graphql::Response {
        let request: async_graphql::Request = query.into();
        self.schema.execute(request).await
    }
}
