//! End-to-end tests for the speech relay
//! Tests: HTTP client -> relay -> synthesizer stream -> chunked audio response

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde_json::json;

use crate::common::*;
use crate::helpers::{spawn_server, speech_url};

#[tokio::test]
async fn test_audio_is_streamed_over_http() {
    let addr = spawn_server(test_state(Arc::new(EchoSynthesizer::new(5)))).await;

    let response = reqwest::Client::new()
        .post(speech_url(addr))
        .json(&json!({ "text": "The quick brown fox jumps over the lazy dog" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-type"], "audio/mpeg");
    assert!(response.headers().get("x-request-id").is_some());
    let body = response.bytes().await.unwrap();
    assert_eq!(body, "The quick brown fox jumps over the lazy dog");
}

#[tokio::test]
async fn test_upstream_rejection_over_http() {
    let addr = spawn_server(test_state(Arc::new(RejectingSynthesizer::new()))).await;

    let response = reqwest::Client::new()
        .post(speech_url(addr))
        .json(&json!({ "text": "Hello" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 500);
    assert_eq!(response.headers()["content-type"], "application/json");
    assert_eq!(response.text().await.unwrap(), r#"{"error":"Failed to fetch speech audio"}"#);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_clients_get_independent_streams() {
    let addr = spawn_server(test_state(Arc::new(EchoSynthesizer::new(2)))).await;
    let client = reqwest::Client::new();

    let requests = (0..6).map(|i| {
        let client = client.clone();
        let text = format!("client-{i}:{}", i.to_string().repeat(40));
        async move {
            let response = client
                .post(speech_url(addr))
                .json(&json!({ "text": text }))
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), 200);
            (text, response.bytes().await.unwrap())
        }
    });

    for (text, body) in join_all(requests).await {
        assert_eq!(body, text.as_bytes());
    }
}

#[tokio::test]
async fn test_mid_stream_failure_breaks_the_response() {
    let addr = spawn_server(test_state(Arc::new(ScriptedSynthesizer::failing_after(&[
        b"first-chunk",
        b"second-chunk",
    ]))))
    .await;

    let sent = reqwest::Client::new()
        .post(speech_url(addr))
        .json(&json!({ "text": "Hello" }))
        .send()
        .await;

    // No second response: either the connection drops before the head is
    // read, or the status stays 200 and the body is cut short.
    match sent {
        Ok(response) => {
            assert_eq!(response.status(), 200);
            assert!(response.bytes().await.is_err());
        }
        Err(e) => assert!(e.is_request() || e.is_body(), "unexpected error: {e}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_client_disconnect_stops_upstream() {
    let synth = Arc::new(EndlessSynthesizer::new(Duration::from_millis(10)));
    let live = synth.live.clone();
    let state = test_state(synth);
    let metrics = state.metrics.clone();
    let addr = spawn_server(state).await;

    let mut response = reqwest::Client::new()
        .post(speech_url(addr))
        .json(&json!({ "text": "never ending story" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.chunk().await.unwrap().is_some());
    assert_eq!(live.load(Ordering::SeqCst), 1);

    drop(response);

    let mut released = false;
    for _ in 0..500 {
        if live.load(Ordering::SeqCst) == 0 {
            released = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(released, "upstream stream still alive after client disconnect");
    assert_eq!(metrics.streams.stats().cancelled, 1);
}
