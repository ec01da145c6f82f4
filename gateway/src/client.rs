//! Interactive command-line chat against a running gateway
//!
//! Reads lines from stdin and sends them as downstream `{"content": ...}`
//! frames. Replies are printed as they arrive from a separate task so the
//! prompt never waits on the server.

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::debug;

const EXIT_WORDS: [&str; 3] = ["exit", "quit", "bye"];

/// Connect to `server` and relay stdin until an exit word or EOF
pub async fn run_chat(server: &str) -> anyhow::Result<()> {
    let (stream, _) = connect_async(server)
        .await
        .with_context(|| format!("failed to connect to {server}"))?;
    let (mut sink, mut source) = stream.split();

    println!("Connected to {server}. Type 'exit' to quit.");

    let reader = tokio::spawn(async move {
        while let Some(frame) = source.next().await {
            match frame {
                Ok(Message::Text(text)) => println!("Agent: {}", format_reply(text.as_str())),
                Ok(Message::Close(frame)) => {
                    match frame {
                        Some(frame) if !frame.reason.is_empty() => {
                            println!("Connection closed: {}", frame.reason.as_str())
                        }
                        _ => println!("Connection closed"),
                    }
                    break;
                }
                Ok(other) => debug!("Ignoring frame: {:?}", other),
                Err(e) => {
                    eprintln!("Connection error: {e}");
                    break;
                }
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if is_exit_word(line) {
            break;
        }
        if reader.is_finished() {
            break;
        }

        let payload = json!({ "content": line }).to_string();
        if let Err(e) = sink.send(Message::Text(payload.into())).await {
            eprintln!("Failed to send message: {e}");
            break;
        }
    }

    let _ = sink.close().await;
    reader.abort();
    println!("Goodbye.");
    Ok(())
}

fn is_exit_word(line: &str) -> bool {
    EXIT_WORDS.iter().any(|word| line.eq_ignore_ascii_case(word))
}

/// Human-readable form of a downstream frame: its `content`, else the raw text
pub fn format_reply(frame: &str) -> String {
    serde_json::from_str::<Value>(frame)
        .ok()
        .and_then(|value| {
            value
                .get("content")
                .and_then(Value::as_str)
                .map(str::to_owned)
        })
        .unwrap_or_else(|| frame.to_string())
}
