use std::{future::Future, time::Duration};

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::{auth::Authenticator, database::Trial, saved_query::SavedQuery, settings::Api};

const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
const TRIALS_PATH: &str = "/api/v1/therapeutic/all-trials-with-data";
const SAVED_QUERIES_PATH: &str = "/api/v1/queries/saved";
const DASHBOARD_QUERIES_PATH: &str = "/api/v1/queries/saved/user/dashboard-queries";
const LOGIN_PATH: &str = "/api/v1/auth/login";

/// Anything that can produce the full trial list.
pub(crate) trait TrialSource: Send + Sync + 'static {
    fn fetch_trials(&self) -> impl Future<Output = Result<Vec<Trial>>> + Send;
}

#[derive(Debug, Deserialize)]
pub(crate) struct TrialsResponse {
    #[serde(default)]
    pub(crate) message: Option<String>,
    #[serde(default)]
    pub(crate) total_trials: Option<usize>,
    #[serde(default)]
    pub(crate) trials: Vec<Value>,
}

impl TrialsResponse {
    /// Parses each record on its own; malformed records are logged and
    /// skipped.
    pub(crate) fn into_trials(self) -> Vec<Trial> {
        self.trials
            .into_iter()
            .enumerate()
            .filter_map(|(i, raw)| match serde_json::from_value(raw) {
                Ok(trial) => Some(trial),
                Err(e) => {
                    warn!("Skipping malformed trial record #{i}: {e}");
                    None
                }
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct DataResponse<T> {
    data: Option<T>,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LoginResponse {
    pub(crate) token: String,
    pub(crate) user: LoginUser,
    #[serde(default)]
    pub(crate) roles: Vec<LoginRole>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LoginUser {
    #[serde(deserialize_with = "string_or_number")]
    pub(crate) id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LoginRole {
    pub(crate) role_name: String,
}

/// Client for the remote trial API.
///
/// Cookies set by the API are kept and sent back on every call.
#[derive(Clone)]
pub(crate) struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub(crate) fn new(api: &Api) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent(APP_USER_AGENT)
            .cookie_store(true);
        if let Some(secs) = api.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            client: builder.build()?,
            base_url: api.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub(crate) async fn saved_queries(&self) -> Result<Vec<SavedQuery>> {
        let resp: DataResponse<Vec<SavedQuery>> =
            send(self.client.get(self.url(DASHBOARD_QUERIES_PATH))).await?;
        Ok(resp.data.unwrap_or_default())
    }

    /// Stores `query` remotely and returns the stored copy, which carries the
    /// id assigned by the API when it sends one back.
    pub(crate) async fn save_query(&self, query: &SavedQuery) -> Result<SavedQuery> {
        let resp: DataResponse<SavedQuery> =
            send(self.client.post(self.url(SAVED_QUERIES_PATH)).json(query)).await?;
        Ok(resp.data.unwrap_or_else(|| query.clone()))
    }

    pub(crate) async fn delete_query(&self, id: &str) -> Result<()> {
        self.client
            .delete(self.url(&format!("{SAVED_QUERIES_PATH}/{id}")))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

impl TrialSource for ApiClient {
    async fn fetch_trials(&self) -> Result<Vec<Trial>> {
        let resp: TrialsResponse = send(self.client.get(self.url(TRIALS_PATH)))
            .await
            .context("failed to fetch trials")?;
        if let Some(total) = resp.total_trials.filter(|n| *n != resp.trials.len()) {
            warn!("API reported {total} trials but sent {}", resp.trials.len());
        }
        let message = resp.message.clone();
        let trials = resp.into_trials();
        info!(
            "Fetched {} trials ({})",
            trials.len(),
            message.as_deref().unwrap_or("no message")
        );
        Ok(trials)
    }
}

impl Authenticator for ApiClient {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse> {
        send(
            self.client
                .post(self.url(LOGIN_PATH))
                .json(&LoginRequest { email, password }),
        )
        .await
        .context("login failed")
    }
}

async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
    let resp: Response = request.send().await?.error_for_status()?;
    Ok(resp.json().await?)
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number, found {other}"
        ))),
    }
}
