#![allow(clippy::unwrap_used, clippy::expect_used)]

use maestro_a2a::{A2aClient, A2aError, AgentCard, DispatchMode, ExternalAgent, HttpTimeouts};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn agent(base_url: &str, card: serde_json::Value, token: Option<&str>) -> ExternalAgent {
    ExternalAgent::from_card(
        "fx",
        base_url,
        AgentCard::from_value(card).unwrap(),
        false,
        token.map(str::to_string),
    )
}

fn client(mode: DispatchMode) -> A2aClient {
    A2aClient::new(
        HttpTimeouts {
            connect_secs: 2,
            read_secs: 5,
            request_secs: 5,
        },
        mode,
    )
    .unwrap()
}

#[tokio::test]
async fn batch_reply_is_extracted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_partial_json(json!({
            "message": {"role": "user", "parts": [{"kind": "text", "text": "do it"}]}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"message": {"parts": [{"kind": "text", "text": "done"}]}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reply = client(DispatchMode::Batch)
        .send(&agent(&server.uri(), json!({}), None), "do it")
        .await
        .unwrap();
    assert_eq!(reply, "done");
}

#[tokio::test]
async fn posts_to_card_url_with_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rpc"))
        .and(header("Authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"content": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let card = json!({"url": format!("{}/rpc", server.uri())});
    let reply = client(DispatchMode::Batch)
        .send(&agent("http://unused.invalid", card, Some("tok")), "hi")
        .await
        .unwrap();
    assert_eq!(reply, "ok");
}

#[tokio::test]
async fn unparseable_reply_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "weird", "n": 3})))
        .mount(&server)
        .await;

    let err = client(DispatchMode::Batch)
        .send(&agent(&server.uri(), json!({}), None), "hi")
        .await
        .unwrap_err();
    assert!(matches!(err, A2aError::InvalidResponse(_)));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn server_error_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .mount(&server)
        .await;

    let err = client(DispatchMode::Batch)
        .send(&agent(&server.uri(), json!({}), None), "hi")
        .await
        .unwrap_err();
    assert!(matches!(err, A2aError::HttpError { status: 503, .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn streaming_reply_is_accumulated() {
    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"result\":{\"message\":{\"parts\":[{\"kind\":\"text\",\"text\":\"one \"}]}}}\n\n",
        ": heartbeat\n\n",
        "data: {\"result\":{\"message\":{\"parts\":[{\"kind\":\"text\",\"text\":\"two\"}]}}}\n\n",
    );
    Mock::given(method("POST"))
        .and(header("Accept", "text/event-stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let reply = client(DispatchMode::Streaming)
        .send(&agent(&server.uri(), json!({}), None), "hi")
        .await
        .unwrap();
    assert_eq!(reply, "one two");
}

#[tokio::test]
async fn connection_refused_is_network_error() {
    let err = client(DispatchMode::Batch)
        .send(&agent("http://127.0.0.1:1", json!({}), None), "hi")
        .await
        .unwrap_err();
    assert!(err.is_transient());
}
