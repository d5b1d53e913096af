use std::sync::{Arc, RwLock};

use anyhow::{anyhow, Result};
use async_graphql::SimpleObject;
use serde::Serialize;
use tracing::info;

use crate::{outbound::LoginResponse, settings::Auth};

const DEMO_TOKEN: &str = "demo-token";
const DEMO_USER_ID: &str = "demo-user";
const DEMO_ROLE: &str = "demo";

/// The signed-in user for this process. Nothing here is persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, SimpleObject)]
pub(crate) struct Session {
    pub(crate) token: String,
    pub(crate) user_id: String,
    pub(crate) role_name: Option<String>,
}

impl From<LoginResponse> for Session {
    fn from(resp: LoginResponse) -> Self {
        Self {
            token: resp.token,
            user_id: resp.user.id,
            role_name: resp.roles.into_iter().next().map(|r| r.role_name),
        }
    }
}

/// Remote login service.
pub(crate) trait Authenticator: Send + Sync {
    fn login(
        &self,
        email: &str,
        password: &str,
    ) -> impl std::future::Future<Output = Result<LoginResponse>> + Send;
}

#[derive(Clone, Default)]
pub(crate) struct SessionStore {
    inner: Arc<RwLock<Option<Session>>>,
}

impl SessionStore {
    pub(crate) fn current(&self) -> Option<Session> {
        self.inner.read().ok().and_then(|s| s.clone())
    }

    fn replace(&self, session: Option<Session>) -> Result<()> {
        let mut guard = self
            .inner
            .write()
            .map_err(|_| anyhow!("session lock poisoned"))?;
        *guard = session;
        Ok(())
    }

    /// Signs in, skipping `authenticator` when the credentials equal the
    /// configured offline demo credential.
    pub(crate) async fn login<A: Authenticator>(
        &self,
        authenticator: &A,
        demo: &Auth,
        email: &str,
        password: &str,
    ) -> Result<Session> {
        let session = if is_demo(demo, email, password) {
            info!("Signed in with the offline demo credential");
            Session {
                token: demo.demo_token.clone().unwrap_or_else(|| DEMO_TOKEN.to_string()),
                user_id: demo
                    .demo_user_id
                    .clone()
                    .unwrap_or_else(|| DEMO_USER_ID.to_string()),
                role_name: Some(demo.demo_role.clone().unwrap_or_else(|| DEMO_ROLE.to_string())),
            }
        } else {
            let session = Session::from(authenticator.login(email, password).await?);
            info!("Signed in as user {}", session.user_id);
            session
        };
        self.replace(Some(session.clone()))?;
        Ok(session)
    }

    pub(crate) fn logout(&self) -> Result<()> {
        self.replace(None)
    }
}

fn is_demo(demo: &Auth, email: &str, password: &str) -> bool {
    match (&demo.demo_email, &demo.demo_password) {
        (Some(e), Some(p)) => e == email && p == password,
        _ => false,
    }
}
