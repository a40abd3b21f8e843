//! End-to-end samples against an in-process WebSocket server.

use futures::{SinkExt, StreamExt};
use std::future::Future;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use wsprobe::{
    run_plan, ConnectionRegistry, SamplerConfig, SessionRunner, SessionState, TestPlan,
};

async fn spawn_server<F, Fut>(handler: F) -> String
where
    F: Fn(WebSocketStream<TcpStream>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handler = Arc::new(handler);
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                if let Ok(ws) = tokio_tungstenite::accept_async(stream).await {
                    handler(ws).await;
                }
            });
        }
    });
    format!("ws://{addr}/stomp")
}

/// Answers CONNECT with CONNECTED and SUBSCRIBE with two MESSAGE frames
async fn stomp_broker(mut ws: WebSocketStream<TcpStream>) {
    while let Some(Ok(message)) = ws.next().await {
        let Message::Text(text) = message else {
            continue;
        };
        let text = text.as_str();
        if text.contains("SUBSCRIBE") {
            for n in 1..=2 {
                let frame = format!("MESSAGE\ndestination:/topic/prices\n\nprice:{n}");
                if ws.send(Message::Text(frame.into())).await.is_err() {
                    return;
                }
            }
        } else if text.contains("CONNECT") {
            let frame = "CONNECTED\nversion:1.1".to_string();
            if ws.send(Message::Text(frame.into())).await.is_err() {
                return;
            }
        }
    }
}

/// Reads one frame, then drops the TCP stream without a close handshake
async fn dropping_server(mut ws: WebSocketStream<TcpStream>) {
    let _ = ws.next().await;
    drop(ws);
}

fn stomp_config(url: &str, streaming: bool) -> SamplerConfig {
    let mut config = SamplerConfig::for_url(url);
    config.name = "prices".to_string();
    config.connection_id = "price-feed".to_string();
    config.streaming_connection = streaming;
    config.connect_payload = "CONNECT\\naccept-version:1.1,1.0".to_string();
    config.connect_pattern = "CONNECTED".to_string();
    config.connection_timeout = "5000".to_string();
    config.response_timeout = "5000".to_string();
    config
}

fn runner() -> SessionRunner {
    SessionRunner::tungstenite(Arc::new(ConnectionRegistry::new()))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn streaming_sample_subscribes_and_is_reused() {
    let url = spawn_server(stomp_broker).await;
    let runner = runner();
    let mut config = stomp_config(&url, true);
    config.subscribe_payload = "SUBSCRIBE\\ndestination:/topic/prices".to_string();
    config.subscribe_pattern = "MESSAGE".to_string();
    config.responses_count = "2".to_string();

    let first = runner.sample(&config).await;
    assert!(first.successful, "{}", first.response_message);
    assert_eq!(first.response_code, "200");
    assert!(first.connected);
    assert_eq!(first.message_count, 3);
    assert!(first.response_data.starts_with("[Message 1]\nCONNECTED"));
    assert!(first.response_data.contains("[Message 3]\nMESSAGE"));
    assert!(first.sampler_data.starts_with("[\"CONNECT"));

    let session = runner.registry().get("price-feed").unwrap();
    assert_eq!(session.state(), SessionState::Open);

    let second = runner.sample(&config).await;
    assert!(second.successful, "{}", second.response_message);
    assert!(second
        .response_message
        .contains(" - Reusing existing connection"));
    assert!(second.response_data.contains("MESSAGE"));
    assert!(Arc::ptr_eq(
        &session,
        &runner.registry().get("price-feed").unwrap()
    ));

    assert_eq!(runner.finish(), 1);
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn non_streaming_sample_closes_after_connect() {
    let url = spawn_server(stomp_broker).await;
    let runner = runner();
    let result = runner.sample(&stomp_config(&url, false)).await;

    assert!(result.successful, "{}", result.response_message);
    assert!(!result.connected);
    assert!(result.response_data.contains("CONNECTED\nversion:1.1"));
    assert!(result
        .response_message
        .contains(" - WebSocket session closed by the client"));
    assert!(runner.registry().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dropped_connection_reports_abnormal_close() {
    let url = spawn_server(dropping_server).await;
    let runner = runner();
    let result = runner.sample(&stomp_config(&url, true)).await;

    assert!(!result.successful);
    assert_eq!(result.error_code, 1006);
    assert_eq!(result.response_code, "1006");
    assert!(result
        .response_message
        .contains("closed unexpectedly by the server: [1006]"));
    assert!(runner.registry().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unreachable_server_fails_sample() {
    let runner = runner();
    let mut config = stomp_config("ws://127.0.0.1:1/", false);
    config.connection_timeout = "2000".to_string();
    let result = runner.sample(&config).await;

    assert!(!result.successful);
    assert_eq!(result.error_code, 1006);
    assert!(result
        .response_message
        .contains(" - Cannot connect to the remote server"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn plan_runs_every_user_against_server() {
    let url = spawn_server(stomp_broker).await;
    let yaml = format!(
        "name: smoke\nusers: 3\niterations: 2\nsamples:\n  - name: connect\n    context_path: {url}\n    connect_payload: CONNECT\n    connect_pattern: CONNECTED\n    response_timeout: 5000\n"
    );
    let plan = TestPlan::from_yaml_str(&yaml).unwrap();
    let report = run_plan(&plan, Arc::new(runner())).await.unwrap();

    assert_eq!(report.total, 6);
    assert!(report.all_passed(), "{:?}", report.labels);
    assert_eq!(report.labels["connect"].successful, 6);
    assert!(report.latency_p99_ms >= report.latency_p50_ms);
}
