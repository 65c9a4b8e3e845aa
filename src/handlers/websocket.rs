use std::sync::Arc;

use chrono::Utc;
use futures_util::sink::SinkExt;
use futures_util::stream::StreamExt;
use log::{debug, error, warn};
use tokio::sync::mpsc;
use uuid::Uuid;
use warp::ws::WebSocket;

use crate::bot::ReplyPipeline;
use crate::constants::MAX_FRAME_BYTES;
use crate::core::events::{ClientEvent, ServerEvent};
use crate::core::server::SharedChatServer;

// Handle one WebSocket connection from upgrade to disconnect
pub async fn handle_ws_client(
    ws: WebSocket,
    server: SharedChatServer,
    pipeline: Option<Arc<ReplyPipeline>>,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    // Forward queued outbound frames onto the socket until either side
    // goes away.
    tokio::task::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(e) = ws_tx.send(message).await {
                debug!("Failed to send WebSocket message: {}", e);
                break;
            }
        }
    });

    let connection_id = Uuid::new_v4();
    server.connect(connection_id, tx).await;

    while let Some(result) = ws_rx.next().await {
        let msg = match result {
            Ok(msg) => msg,
            Err(e) => {
                debug!("WebSocket error on {}: {}", connection_id, e);
                break;
            }
        };

        // Any frame proves the peer is alive, pings included.
        server.touch(connection_id).await;

        if msg.is_close() {
            break;
        }
        if !msg.is_text() {
            continue;
        }

        process_frame(&msg, connection_id, &server, pipeline.as_ref()).await;
    }

    server.disconnect(connection_id, Utc::now()).await;
}

// Parse and dispatch one inbound text frame
async fn process_frame(
    msg: &warp::ws::Message,
    connection_id: Uuid,
    server: &SharedChatServer,
    pipeline: Option<&Arc<ReplyPipeline>>,
) {
    if msg.as_bytes().len() > MAX_FRAME_BYTES {
        warn!(
            "Dropping oversized frame from {} ({} bytes)",
            connection_id,
            msg.as_bytes().len()
        );
        reject(server, connection_id, "Message too large").await;
        return;
    }

    let text = match msg.to_str() {
        Ok(text) => text,
        Err(_) => {
            warn!("Failed to extract text from frame on {}", connection_id);
            return;
        }
    };

    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            debug!("Unparseable frame from {}: {}", connection_id, e);
            reject(server, connection_id, "Unrecognized message format").await;
            return;
        }
    };

    match event {
        ClientEvent::SetUsername { username } => {
            server.set_username(connection_id, &username, Utc::now()).await;
        }
        ClientEvent::SendMessage { message } => {
            let accepted = server.send_message(connection_id, &message, Utc::now()).await;

            // Enrichment starts only after acceptance and broadcast; the
            // reply is a separate later message.
            if let (Some(message), Some(pipeline)) = (accepted, pipeline) {
                if message.mentions_bot {
                    let server = Arc::clone(server);
                    let pipeline = Arc::clone(pipeline);
                    tokio::spawn(async move {
                        pipeline.handle_mention(&server, message).await;
                    });
                }
            }
        }
    }
}

async fn reject(server: &SharedChatServer, connection_id: Uuid, reason: &str) {
    let event = ServerEvent::ErrorMessage {
        message: reason.to_string(),
    };
    if !server.notify(connection_id, &event).await {
        error!("Failed to notify {} of rejected frame", connection_id);
    }
}
