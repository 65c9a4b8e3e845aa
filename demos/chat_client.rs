//! Interactive chat client example
//!
//! This example demonstrates how to talk to a parlor chat server with
//! the bundled reconnecting client.

use tokio::io::{AsyncBufReadExt, BufReader};

use parlor::client::{ChatClient, ClientConfig, ClientNotification, ConnectionStatus};
use parlor::core::message::ChatMessage;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let endpoint = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ws://127.0.0.1:3002/ws".to_string());

    println!("🛋️ Parlor Chat Client");
    println!("Chat server: {}", endpoint);

    let config = ClientConfig::new(endpoint)?;
    let (client, mut notifications) = ChatClient::new(config);

    println!("📝 Use /name <username> to join (connects automatically)");
    println!("📝 Use /leave to leave the room");
    println!("📝 Use /reconnect if the client has given up");
    println!("📝 Use /quit to exit");
    println!("📝 Anything else is sent to the room");
    println!();

    let stdin = tokio::io::stdin();
    let mut stdin_reader = BufReader::new(stdin).lines();

    loop {
        tokio::select! {
            // Handle client notifications
            notification = notifications.recv() => {
                match notification {
                    Some(notification) => render_notification(&notification),
                    None => {
                        println!("🔌 Client stopped");
                        break;
                    }
                }
            }

            // Handle user input
            line = stdin_reader.next_line() => {
                match line {
                    Ok(Some(input)) => {
                        let input = input.trim();

                        if input == "/quit" {
                            break;
                        } else if let Some(name) = input.strip_prefix("/name ") {
                            client.set_username(name);
                        } else if input == "/leave" {
                            client.clear_identity();
                        } else if input == "/reconnect" {
                            client.reconnect();
                        } else if !input.is_empty() {
                            client.send_message(input);
                        }
                    }
                    Ok(None) => {
                        println!("📝 Input stream ended");
                        break;
                    }
                    Err(e) => {
                        println!("❌ Input error: {}", e);
                        break;
                    }
                }
            }
        }
    }

    client.shutdown().await;
    println!("👋 Goodbye!");
    Ok(())
}

fn render_notification(notification: &ClientNotification) {
    match notification {
        ClientNotification::Status { status, attempts } => match status {
            ConnectionStatus::Connected => println!("✅ Connected"),
            ConnectionStatus::Connecting => println!("⏳ Connecting..."),
            ConnectionStatus::Reconnecting => {
                println!("🔁 Reconnecting (attempt {})", attempts)
            }
            ConnectionStatus::Disconnected => println!("🔌 Disconnected"),
            ConnectionStatus::Failed => println!("❌ Gave up; use /reconnect to try again"),
        },

        ClientNotification::History(messages) => {
            println!("📜 Last {} messages:", messages.len());
            for message in messages {
                render_message(message);
            }
        }

        ClientNotification::Message(message) => render_message(message),

        ClientNotification::UserCount(count) => println!("👥 {} in the room", count),

        ClientNotification::Error(message) => println!("❌ {}", message),
    }
}

fn render_message(message: &ChatMessage) {
    let time = message.timestamp.format("%H:%M:%S");
    if message.is_system {
        println!("   [{}] * {}", time, message.body);
    } else if message.is_bot {
        println!("💬 [{}] 🤖 {}: {}", time, message.sender_name, message.body);
    } else {
        println!("💬 [{}] {}: {}", time, message.sender_name, message.body);
    }
}
