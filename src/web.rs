use std::{convert::Infallible, net::SocketAddr};

use async_graphql::http::GraphiQLSource;
use async_graphql_warp::GraphQLResponse;
use tracing::info;
use warp::Filter;

use crate::api::Schema;

/// Serves the schema at `/graphql` until the process ends. A GET on
/// `/graphiql` returns an in-browser query editor.
pub async fn serve(schema: Schema, addr: SocketAddr) {
    let graphql = warp::path!("graphql")
        .and(async_graphql_warp::graphql(schema))
        .and_then(|(schema, request): (Schema, async_graphql::Request)| async move {
            Ok::<_, Infallible>(GraphQLResponse::from(schema.execute(request).await))
        });
    let graphiql = warp::path!("graphiql")
        .and(warp::get())
        .map(|| warp::reply::html(GraphiQLSource::build().endpoint("/graphql").finish()));

    info!("Listening on {addr}");
    warp::serve(graphql.or(graphiql)).run(addr).await;
}
