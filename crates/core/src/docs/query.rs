use std::collections::HashSet;
use std::sync::OnceLock;

const FILLER_WORDS: &[&str] = &[
    "how", "do", "i", "can", "what", "is", "the", "a", "an", "to", "my", "me", "with", "in", "on",
    "for", "of", "it", "does", "should", "would", "could", "please", "show", "tell", "about",
    "using", "use", "set", "up", "get", "make", "protect", "secure", "configure", "setup",
    "create", "add", "enable", "implement", "apply", "want", "need", "endpoint", "endpoints",
    "tunnel", "tunnels", "service", "services", "server", "application", "app", "api", "request",
    "requests", "response", "connection",
];

const KUBERNETES_INTENT_MARKERS: &[&str] = &["kubernetes", "k8s", "ingress", "operator", "crd", "helm"];

const KUBERNETES_CATEGORY_MARKERS: &[&str] = &[
    "kubernetes",
    "k8s",
    "kubectl",
    "helm",
    "operator",
    "crd",
    "agentendpoint",
    "cloudendpoint",
    "manifest",
];

const API_CATEGORY_MARKERS: &[&str] = &["api", "curl", "rest", "api call", "programmatic"];

fn filler_words() -> &'static HashSet<&'static str> {
    static WORDS: OnceLock<HashSet<&'static str>> = OnceLock::new();
    WORDS.get_or_init(|| FILLER_WORDS.iter().copied().collect())
}

/// Splits text into lowercase `[a-z0-9]+` runs.
pub fn alphanumeric_tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|ch: char| !(ch.is_ascii_lowercase() || ch.is_ascii_digit()))
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Reduces a natural-language question to its topic words.
pub fn extract_keywords(query: &str) -> String {
    alphanumeric_tokens(query)
        .into_iter()
        .filter(|word| word.len() > 1 && !filler_words().contains(word.as_str()))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn wants_kubernetes(query: &str) -> bool {
    let lowered = query.to_lowercase();
    KUBERNETES_INTENT_MARKERS.iter().any(|marker| lowered.contains(marker))
}

/// Primary search round: the keyword form first, then the question verbatim.
pub fn search_queries(query: &str) -> Vec<String> {
    let keywords = extract_keywords(query);
    let mut queries = vec![keywords.clone()];
    if keywords != query {
        queries.push(query.to_owned());
    }
    queries
}

/// Fallback round used when every primary hit was Kubernetes-specific.
pub fn retry_queries(query: &str) -> Vec<String> {
    let keywords = extract_keywords(query);
    let words: Vec<&str> = keywords.split_whitespace().collect();

    let mut queries = vec![format!("{keywords} action")];
    if words.len() > 1 {
        queries.extend(words.iter().map(|word| format!("{word} action")));
    }
    queries.push(keywords.clone());
    queries
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryCategory {
    Kubernetes,
    Api,
    Agent,
}

impl QueryCategory {
    pub fn classify(query: &str) -> Self {
        let lowered = query.to_lowercase();
        if KUBERNETES_CATEGORY_MARKERS.iter().any(|marker| lowered.contains(marker)) {
            return Self::Kubernetes;
        }
        if API_CATEGORY_MARKERS.iter().any(|marker| lowered.contains(marker)) {
            return Self::Api;
        }
        Self::Agent
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kubernetes => "kubernetes",
            Self::Api => "api",
            Self::Agent => "agent",
        }
    }

    /// Steering paragraph placed in the LLM system prompt.
    pub fn context_instruction(&self) -> &'static str {
        match self {
            Self::Kubernetes => {
                "The user is asking about Kubernetes / k8s. \
                 Use Kubernetes-specific examples (kind:, apiVersion:, AgentEndpoint, CloudEndpoint CRDs) from the documentation. \
                 Do NOT show ngrok agent config YAML (version: 3, endpoints:) unless the user asks for it."
            }
            Self::Api => {
                "The user is asking about the ngrok API. \
                 Use API examples (curl, REST endpoints) from the documentation. \
                 Do NOT show Kubernetes CRD YAML or ngrok agent config YAML unless the user asks for it."
            }
            Self::Agent => {
                "The user is asking about the ngrok agent / CLI. \
                 Use ngrok agent configuration examples (version: 3, endpoints:, traffic_policy:) from the documentation. \
                 Do NOT show Kubernetes examples (kind:, apiVersion:, AgentEndpoint, CloudEndpoint, metadata:, namespace:) \
                 even if they appear in the documentation context. The user did not ask about Kubernetes."
            }
        }
    }
}
