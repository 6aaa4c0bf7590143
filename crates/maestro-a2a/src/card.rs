use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The capability descriptor an agent publishes for discovery.
///
/// Kept as the raw JSON document so it can be forwarded verbatim; typed
/// accessors read the few fields the orchestrator cares about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentCard(pub Value);

impl AgentCard {
    /// Wrap a parsed card, rejecting anything that is not a JSON object.
    pub fn from_value(value: Value) -> Option<Self> {
        value.is_object().then_some(Self(value))
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// The agent's self-reported name.
    pub fn name(&self) -> Option<&str> {
        self.str_field("name")
    }

    /// Card description, if any.
    pub fn description(&self) -> Option<&str> {
        self.str_field("description").filter(|s| !s.is_empty())
    }

    /// Endpoint for message dispatch, if the card names one.
    pub fn url(&self) -> Option<&str> {
        self.str_field("url").filter(|s| !s.is_empty())
    }

    /// True when the card advertises an authenticated extended card.
    pub fn supports_extended_card(&self) -> bool {
        ["supportsAuthenticatedExtendedCard", "supports_authenticated_extended_card"]
            .iter()
            .any(|k| self.0.get(*k).and_then(Value::as_bool).unwrap_or(false))
    }

    /// Skill labels. A skill is either a plain string or an object whose
    /// `name`, `id` or `description` is used, in that order.
    pub fn skills(&self) -> Vec<String> {
        let Some(skills) = self.0.get("skills").and_then(Value::as_array) else {
            return Vec::new();
        };
        skills
            .iter()
            .filter_map(|s| match s {
                Value::String(s) => Some(s.clone()),
                Value::Object(o) => ["name", "id", "description"]
                    .iter()
                    .find_map(|k| o.get(*k).and_then(Value::as_str))
                    .map(str::to_string),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Strings listed under `metadata.capabilities`.
    pub fn metadata_capabilities(&self) -> Vec<String> {
        self.0
            .pointer("/metadata/capabilities")
            .and_then(Value::as_array)
            .map(|caps| {
                caps.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Capability list: the description, then skills, then
    /// `metadata.capabilities`.
    pub fn capabilities(&self) -> Vec<String> {
        let mut caps = Vec::new();
        if let Some(desc) = self.description() {
            caps.push(desc.to_string());
        }
        caps.extend(self.skills());
        caps.extend(self.metadata_capabilities());
        caps
    }
}

/// A discovered remote agent, keyed by the operator-chosen `name`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalAgent {
    /// Local alias.
    pub name: String,
    /// Root URL the card was fetched from.
    pub base_url: String,
    /// Human-readable description.
    pub description: String,
    /// Description, skills, then metadata capabilities.
    pub capabilities: Vec<String>,
    /// The raw card.
    pub card: AgentCard,
    /// Card opts in to the extended card.
    pub supports_extended_card: bool,
    /// A token was configured for this agent.
    pub auth_required: bool,
    /// Bearer token. Never serialized.
    #[serde(skip_serializing, default)]
    pub auth_token: Option<String>,
}

impl ExternalAgent {
    /// Build the descriptor from a fetched card.
    pub fn from_card(
        name: impl Into<String>,
        base_url: impl Into<String>,
        card: AgentCard,
        supports_extended_card: bool,
        auth_token: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            description: card.description().unwrap_or_default().to_string(),
            capabilities: card.capabilities(),
            supports_extended_card,
            auth_required: auth_token.is_some(),
            auth_token,
            card,
        }
    }

    /// Where dispatch requests go: the card's `url`, else the base url.
    pub fn endpoint(&self) -> &str {
        self.card.url().unwrap_or(&self.base_url)
    }

    /// Planner-facing view without the secret.
    pub fn summary(&self) -> AgentSummary {
        AgentSummary {
            name: self.name.clone(),
            description: self.description.clone(),
            capabilities: self.capabilities.clone(),
            base_url: self.base_url.clone(),
            supports_extended_card: self.supports_extended_card,
            auth_required: self.auth_required,
        }
    }
}

/// Public metadata about a registered agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSummary {
    /// Local alias.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Advertised capabilities.
    pub capabilities: Vec<String>,
    /// Root URL.
    pub base_url: String,
    /// Card opts in to the extended card.
    pub supports_extended_card: bool,
    /// A token was configured.
    pub auth_required: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn card() -> AgentCard {
        AgentCard::from_value(json!({
            "name": "Remote Reviewer",
            "description": "Reviews pull requests",
            "url": "http://reviewer.local/rpc",
            "supportsAuthenticatedExtendedCard": true,
            "skills": ["lint", {"id": "security-audit"}, {"name": "style", "id": "s1"}, 7],
            "metadata": {"capabilities": ["python", "rust"]}
        }))
        .unwrap()
    }

    #[test]
    fn capabilities_are_description_skills_then_metadata() {
        assert_eq!(
            card().capabilities(),
            vec![
                "Reviews pull requests",
                "lint",
                "security-audit",
                "style",
                "python",
                "rust"
            ]
        );
    }

    #[test]
    fn minimal_card_degrades_to_empty() {
        let c = AgentCard::from_value(json!({})).unwrap();
        assert!(c.capabilities().is_empty());
        assert!(!c.supports_extended_card());
        assert!(c.url().is_none());
    }

    #[test]
    fn non_object_is_not_a_card() {
        assert!(AgentCard::from_value(json!(["x"])).is_none());
    }

    #[test]
    fn endpoint_prefers_card_url() {
        let agent = ExternalAgent::from_card("rev", "http://base", card(), true, None);
        assert_eq!(agent.endpoint(), "http://reviewer.local/rpc");
        let bare = ExternalAgent::from_card(
            "rev",
            "http://base",
            AgentCard::from_value(json!({})).unwrap(),
            false,
            None,
        );
        assert_eq!(bare.endpoint(), "http://base");
    }

    #[test]
    fn token_is_never_serialized() {
        let agent = ExternalAgent::from_card("rev", "http://base", card(), true, Some("s3cret".into()));
        assert!(agent.auth_required);
        let json = serde_json::to_string(&agent).unwrap();
        assert!(!json.contains("s3cret"));
        assert!(!serde_json::to_string(&agent.summary()).unwrap().contains("s3cret"));
    }
}
