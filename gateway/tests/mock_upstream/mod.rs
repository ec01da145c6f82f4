//! Mock upstream agent server
//!
//! Speaks the agent side of the LLM WebSocket protocol: answers every
//! `response_required` with a two-fragment streamed response and records the
//! request paths and frames it receives.

// Not every test binary uses every helper
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{
    accept_hdr_async,
    tungstenite::{
        Message,
        handshake::server::{Request, Response},
    },
};

/// What the mock agent does on each connection
#[derive(Clone, Debug, Default)]
pub struct MockBehavior {
    /// Frames sent right after the handshake
    pub on_connect: Vec<Value>,
    /// Answer turn requests with "Hello" + "world"
    pub echo: bool,
    /// Close the connection this long after the handshake
    pub close_after: Option<Duration>,
}

impl MockBehavior {
    pub fn echo() -> Self {
        Self {
            echo: true,
            ..Self::default()
        }
    }

    pub fn tool_calls() -> Self {
        Self {
            on_connect: vec![
                json!({
                    "response_type": "tool_call_invocation",
                    "tool_call_id": "call_1",
                    "name": "lookup_patient",
                    "arguments": "{\"room\":\"4B\"}"
                }),
                json!({
                    "response_type": "tool_call_result",
                    "tool_call_id": "call_1",
                    "content": "found"
                }),
            ],
            ..Self::default()
        }
    }

    pub fn ping() -> Self {
        Self {
            on_connect: vec![json!({"response_type": "ping_pong", "timestamp": 1})],
            ..Self::default()
        }
    }

    pub fn close_after(delay: Duration) -> Self {
        Self {
            close_after: Some(delay),
            ..Self::default()
        }
    }
}

#[derive(Default)]
pub struct MockUpstreamState {
    pub paths: Mutex<Vec<String>>,
    pub frames: Mutex<Vec<Value>>,
    pub connections: AtomicUsize,
    pub disconnections: AtomicUsize,
}

pub struct MockUpstream {
    pub addr: SocketAddr,
    pub state: Arc<MockUpstreamState>,
}

impl MockUpstream {
    pub async fn start(behavior: MockBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(MockUpstreamState::default());

        let server_state = state.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let state = server_state.clone();
                let behavior = behavior.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, state.clone(), behavior).await {
                        eprintln!("Mock upstream error: {}", e);
                    }
                    state.disconnections.fetch_add(1, Ordering::SeqCst);
                });
            }
        });

        Self { addr, state }
    }

    /// Base URL the gateway should append call ids to
    pub fn url(&self) -> String {
        format!("ws://{}/llm-websocket", self.addr)
    }

    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    pub fn disconnections(&self) -> usize {
        self.state.disconnections.load(Ordering::SeqCst)
    }

    pub fn paths(&self) -> Vec<String> {
        self.state.paths.lock().clone()
    }

    pub fn frames(&self) -> Vec<Value> {
        self.state.frames.lock().clone()
    }

    /// Poll until `condition` holds or two seconds pass
    pub async fn wait_for(&self, condition: impl Fn(&Self) -> bool) -> bool {
        for _ in 0..200 {
            if condition(self) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        condition(self)
    }
}

async fn handle_connection(
    stream: TcpStream,
    state: Arc<MockUpstreamState>,
    behavior: MockBehavior,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let paths = state.clone();
    let ws_stream = accept_hdr_async(stream, move |request: &Request, response: Response| {
        paths.paths.lock().push(request.uri().path().to_string());
        Ok(response)
    })
    .await?;
    state.connections.fetch_add(1, Ordering::SeqCst);

    let (mut write, mut read) = ws_stream.split();

    for frame in &behavior.on_connect {
        write.send(Message::Text(frame.to_string().into())).await?;
    }

    let close_timer = async {
        match behavior.close_after {
            Some(delay) => tokio::time::sleep(delay).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(close_timer);

    loop {
        tokio::select! {
            _ = &mut close_timer => {
                write.send(Message::Close(None)).await?;
                break;
            }
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let Ok(frame) = serde_json::from_str::<Value>(text.as_str()) else {
                        continue;
                    };
                    state.frames.lock().push(frame.clone());

                    if behavior.echo
                        && frame.get("interaction_type").and_then(Value::as_str)
                            == Some("response_required")
                    {
                        let response_id = frame["response_id"].clone();
                        for (content, complete) in [("Hello", false), ("world", true)] {
                            let reply = json!({
                                "response_type": "response",
                                "response_id": response_id,
                                "content": content,
                                "content_complete": complete
                            });
                            write.send(Message::Text(reply.to_string().into())).await?;
                        }
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    write.send(Message::Pong(data)).await?;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    Ok(())
}
