#![allow(clippy::unwrap_used, clippy::expect_used)]

use maestro_a2a::{AgentEndpointConfig, AgentRegistry, HttpTimeouts, RegistrySource};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn registry() -> AgentRegistry {
    AgentRegistry::new(HttpTimeouts {
        connect_secs: 2,
        read_secs: 5,
        request_secs: 5,
    })
    .unwrap()
}

async fn mount_public_card(server: &MockServer, card: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/.well-known/agent-card.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(card))
        .mount(server)
        .await;
}

#[tokio::test]
async fn discovers_public_card() {
    let server = MockServer::start().await;
    mount_public_card(
        &server,
        json!({
            "name": "Remote Writer",
            "description": "Writes docs",
            "skills": [{"name": "markdown"}],
            "metadata": {"capabilities": ["english"]}
        }),
    )
    .await;

    let reg = registry();
    let agent = reg.discover("docs", &server.uri(), None).await.unwrap();

    assert_eq!(agent.name, "docs");
    assert_eq!(agent.description, "Writes docs");
    assert_eq!(agent.capabilities, vec!["Writes docs", "markdown", "english"]);
    assert!(!agent.supports_extended_card);
    assert!(!agent.auth_required);
    assert!(reg.contains("docs").await);
}

#[tokio::test]
async fn uses_extended_card_with_token() {
    let server = MockServer::start().await;
    mount_public_card(
        &server,
        json!({"description": "public", "supportsAuthenticatedExtendedCard": true}),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/agent/authenticatedExtendedCard"))
        .and(header("Authorization", "Bearer tok-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"description": "extended", "skills": ["secret-skill"]})),
        )
        .mount(&server)
        .await;

    let agent = registry()
        .discover("ext", &server.uri(), Some("tok-1"))
        .await
        .unwrap();
    assert_eq!(agent.description, "extended");
    assert_eq!(agent.capabilities, vec!["extended", "secret-skill"]);
    assert!(agent.supports_extended_card);
    assert!(agent.auth_required);
}

#[tokio::test]
async fn extended_card_failure_falls_back_to_public() {
    let server = MockServer::start().await;
    mount_public_card(
        &server,
        json!({"description": "public only", "supportsAuthenticatedExtendedCard": true}),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/agent/authenticatedExtendedCard"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let agent = registry()
        .discover("ext", &server.uri(), Some("bad-token"))
        .await
        .unwrap();
    assert_eq!(agent.description, "public only");
}

#[tokio::test]
async fn extended_card_not_fetched_without_opt_in() {
    let server = MockServer::start().await;
    mount_public_card(&server, json!({"description": "plain"})).await;
    Mock::given(method("GET"))
        .and(path("/agent/authenticatedExtendedCard"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"description": "nope"})))
        .expect(0)
        .mount(&server)
        .await;

    let agent = registry()
        .discover("plain", &server.uri(), Some("tok"))
        .await
        .unwrap();
    assert_eq!(agent.description, "plain");
}

#[tokio::test]
async fn missing_public_card_is_an_error() {
    let server = MockServer::start().await;
    let reg = registry();
    assert!(reg.discover("ghost", &server.uri(), None).await.is_err());
    assert!(reg.list().await.is_empty());
}

#[tokio::test]
async fn two_aliases_for_one_remote() {
    let server = MockServer::start().await;
    mount_public_card(&server, json!({"name": "Same", "description": "same remote"})).await;

    let reg = registry();
    reg.discover("alpha", &server.uri(), None).await.unwrap();
    reg.discover("beta", &server.uri(), None).await.unwrap();

    let names: Vec<String> = reg.list().await.into_iter().map(|a| a.name).collect();
    assert_eq!(names, vec!["alpha", "beta"]);
}

#[tokio::test]
async fn discover_many_skips_failures() {
    let server = MockServer::start().await;
    mount_public_card(&server, json!({"description": "up"})).await;

    let reg = registry();
    let found = reg
        .discover_many(&[
            AgentEndpointConfig {
                name: "up".into(),
                base_url: server.uri(),
                auth_token: None,
            },
            AgentEndpointConfig {
                name: "down".into(),
                base_url: "http://127.0.0.1:1".into(),
                auth_token: None,
            },
        ])
        .await;

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name, "up");
    assert!(reg.get("down").await.is_none());

    reg.reset().await;
    assert!(reg.list().await.is_empty());
}

#[tokio::test]
async fn inline_bootstrap_with_unreachable_agent_yields_empty_list() {
    let reg = registry();
    let found = reg
        .init_from_source(Some(RegistrySource::Inline(
            r#"[{"name":"fx","base_url":"http://127.0.0.1:1"}]"#.into(),
        )))
        .await
        .unwrap();
    assert!(found.is_empty());
    assert!(reg.list().await.is_empty());
}

#[tokio::test]
async fn no_source_is_not_an_error() {
    let found = registry().init_from_source(None).await.unwrap();
    assert!(found.is_empty());
}
