use async_graphql::{Context, Object, Result};

use crate::{
    auth::{Session, SessionStore},
    outbound::ApiClient,
    settings::Auth,
};

#[derive(Default)]
pub(super) struct SessionQuery {}

#[Object]
impl SessionQuery {
    /// The signed-in user, if any.
    async fn session(&self, ctx: &Context<'_>) -> Result<Option<Session>> {
        Ok(ctx.data::<SessionStore>()?.current())
    }
}

#[derive(Default)]
pub(super) struct SessionMutation {}

#[Object]
impl SessionMutation {
    async fn login(&self, ctx: &Context<'_>, email: String, password: String) -> Result<Session> {
        let store = ctx.data::<SessionStore>()?;
        let client = ctx.data::<ApiClient>()?;
        let demo = ctx.data::<Auth>()?;
        Ok(store.login(client, demo, &email, &password).await?)
    }

    async fn logout(&self, ctx: &Context<'_>) -> Result<bool> {
        ctx.data::<SessionStore>()?.logout()?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use crate::{api::TestSchema, settings::Auth};

    fn demo() -> Auth {
        Auth {
            demo_email: Some("demo@example.com".to_string()),
            demo_password: Some("demo".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn demo_login_and_logout() {
        let schema = TestSchema::build(demo(), None);
        let query = r#"
        mutation {
            login(email: "demo@example.com", password: "demo") {
                token
                userId
                roleName
            }
        }"#;
        let data = schema.execute(query).await.data.into_json().unwrap();
        assert_eq!(data["login"]["token"], "demo-token");
        assert_eq!(data["login"]["userId"], "demo-user");
        assert_eq!(data["login"]["roleName"], "demo");

        let data = schema
            .execute("{ session { userId } }")
            .await
            .data
            .into_json()
            .unwrap();
        assert_eq!(data["session"]["userId"], "demo-user");

        schema.execute("mutation { logout }").await;
        let data = schema
            .execute("{ session { userId } }")
            .await
            .data
            .into_json()
            .unwrap();
        assert!(data["session"].is_null());
    }

    #[tokio::test]
    async fn remote_login_failure_is_an_error() {
        let schema = TestSchema::build(demo(), None);
        let res = schema
            .execute(r#"mutation { login(email: "a@example.com", password: "x") { token } }"#)
            .await;
        assert!(!res.errors.is_empty());
    }
}
