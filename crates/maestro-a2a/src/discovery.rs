use crate::card::{AgentCard, ExternalAgent};
use crate::error::A2aError;
use tracing::{debug, info, warn};

/// Well-known path of the public agent card.
pub const PUBLIC_CARD_PATH: &str = "/.well-known/agent-card.json";
/// Path of the authenticated extended agent card.
pub const EXTENDED_CARD_PATH: &str = "/agent/authenticatedExtendedCard";

/// Join `base_url` and `path`, tolerating trailing slashes on the base.
pub fn card_url(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

/// GET a card document, optionally with a bearer token.
pub async fn fetch_card(
    client: &reqwest::Client,
    url: &str,
    token: Option<&str>,
) -> Result<AgentCard, A2aError> {
    let mut req = client.get(url).header("Accept", "application/json");
    if let Some(token) = token {
        req = req.bearer_auth(token);
    }
    let response = req.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(A2aError::HttpError {
            status: status.as_u16(),
            body,
        });
    }
    let value: serde_json::Value = response
        .json()
        .await
        .map_err(|e| A2aError::InvalidAgentCard(format!("{url}: {e}")))?;
    AgentCard::from_value(value)
        .ok_or_else(|| A2aError::InvalidAgentCard(format!("{url}: card is not a JSON object")))
}

/// Run the discovery protocol against `base_url`.
///
/// The public card is mandatory. The extended card is tried only when the
/// public card opts in and a token was given; any failure there falls back
/// to the public card.
pub async fn discover_agent(
    client: &reqwest::Client,
    name: &str,
    base_url: &str,
    auth_token: Option<&str>,
) -> Result<ExternalAgent, A2aError> {
    let public_url = card_url(base_url, PUBLIC_CARD_PATH);
    debug!(agent = %name, url = %public_url, "Fetching public agent card");
    let public = fetch_card(client, &public_url, None).await?;
    let supports_extended = public.supports_extended_card();

    let card = match auth_token {
        Some(token) if supports_extended => {
            let extended_url = card_url(base_url, EXTENDED_CARD_PATH);
            match fetch_card(client, &extended_url, Some(token)).await {
                Ok(extended) => {
                    info!(agent = %name, "Using extended agent card");
                    extended
                }
                Err(e) => {
                    warn!(agent = %name, error = %e, "Extended card unavailable, using public card");
                    public
                }
            }
        }
        _ => public,
    };

    Ok(ExternalAgent::from_card(
        name,
        base_url,
        card,
        supports_extended,
        auth_token.map(str::to_string),
    ))
}
