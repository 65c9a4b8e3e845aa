//! Request handlers for the server endpoints

pub mod websocket;

use std::convert::Infallible;
use std::sync::Arc;

use warp::Filter;

use crate::bot::ReplyPipeline;
use crate::constants::WS_PATH;
use crate::core::server::SharedChatServer;

// Re-export the websocket handler
pub use websocket::handle_ws_client;

/// The full route set: the WebSocket upgrade endpoint plus a health
/// check. Built here so the binary and the integration tests serve
/// exactly the same thing.
pub fn chat_routes(
    server: SharedChatServer,
    pipeline: Option<Arc<ReplyPipeline>>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let ws_route = warp::path(WS_PATH)
        .and(warp::ws())
        .and(with_server(server))
        .and(with_pipeline(pipeline))
        .map(
            |ws: warp::ws::Ws, server: SharedChatServer, pipeline: Option<Arc<ReplyPipeline>>| {
                ws.on_upgrade(move |socket| handle_ws_client(socket, server, pipeline))
            },
        );

    let health_route = warp::path("health").map(|| "OK");

    ws_route.or(health_route)
}

// Helper filter to include the coordinator in each request
fn with_server(
    server: SharedChatServer,
) -> impl Filter<Extract = (SharedChatServer,), Error = Infallible> + Clone {
    warp::any().map(move || server.clone())
}

fn with_pipeline(
    pipeline: Option<Arc<ReplyPipeline>>,
) -> impl Filter<Extract = (Option<Arc<ReplyPipeline>>,), Error = Infallible> + Clone {
    warp::any().map(move || pipeline.clone())
}
