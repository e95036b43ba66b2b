use clap::ValueEnum;
use judge_llm::{
    AnthropicAdapter, AnthropicAdapterConfig, Client, OpenAIAdapter, OpenAIAdapterConfig,
    ProviderAdapter, SDKError, TracingMiddleware,
};
use std::fmt::{self, Display};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ProviderKind {
    #[value(name = "anthropic")]
    Anthropic,
    #[value(name = "openai")]
    OpenAi,
    #[value(name = "openrouter")]
    OpenRouter,
}

impl ProviderKind {
    /// Auto-detection tries credentials in this order.
    pub const DETECTION_ORDER: [ProviderKind; 3] = [
        ProviderKind::Anthropic,
        ProviderKind::OpenAi,
        ProviderKind::OpenRouter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
            Self::OpenRouter => "openrouter",
        }
    }

    pub fn api_key_var(&self) -> &'static str {
        match self {
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::OpenAi => "OPENAI_API_KEY",
            Self::OpenRouter => "OPENROUTER_API_KEY",
        }
    }

    pub fn base_url_var(&self) -> &'static str {
        match self {
            Self::Anthropic => "ANTHROPIC_BASE_URL",
            Self::OpenAi => "OPENAI_BASE_URL",
            Self::OpenRouter => "OPENROUTER_BASE_URL",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Anthropic => "claude-sonnet-4-20250514",
            Self::OpenAi => "gpt-4o",
            Self::OpenRouter => "anthropic/claude-sonnet-4",
        }
    }
}

impl Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderSelection {
    pub kind: ProviderKind,
    pub api_key: String,
    pub model: String,
    pub base_url: Option<String>,
}

/// Picks the provider and credentials. `env` looks up environment variables;
/// blank values count as unset.
pub fn select_provider(
    requested: Option<ProviderKind>,
    model: Option<String>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ProviderSelection, String> {
    let lookup = |name: &str| {
        env(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };

    let (kind, api_key) = match requested {
        Some(kind) => {
            let api_key = lookup(kind.api_key_var()).ok_or_else(|| {
                format!(
                    "{} is not set; it is required for --provider {kind}",
                    kind.api_key_var()
                )
            })?;
            (kind, api_key)
        }
        None => ProviderKind::DETECTION_ORDER
            .iter()
            .find_map(|kind| lookup(kind.api_key_var()).map(|key| (*kind, key)))
            .ok_or_else(|| {
                let vars: Vec<&str> = ProviderKind::DETECTION_ORDER
                    .iter()
                    .map(ProviderKind::api_key_var)
                    .collect();
                format!(
                    "no model provider credentials found; set one of {}",
                    vars.join(", ")
                )
            })?,
    };

    let model = model
        .map(|model| model.trim().to_string())
        .filter(|model| !model.is_empty())
        .unwrap_or_else(|| kind.default_model().to_string());

    Ok(ProviderSelection {
        kind,
        api_key,
        model,
        base_url: lookup(kind.base_url_var()),
    })
}

/// A client with exactly one adapter, registered under the selection's name.
pub fn build_client(selection: &ProviderSelection) -> Result<Arc<Client>, SDKError> {
    let adapter: Arc<dyn ProviderAdapter> = match selection.kind {
        ProviderKind::Anthropic => {
            let mut config = AnthropicAdapterConfig::new(selection.api_key.clone());
            if let Some(base_url) = &selection.base_url {
                config.base_url = base_url.clone();
            }
            Arc::new(AnthropicAdapter::new(config)?)
        }
        ProviderKind::OpenAi | ProviderKind::OpenRouter => {
            let mut config = if selection.kind == ProviderKind::OpenAi {
                OpenAIAdapterConfig::new(selection.api_key.clone())
            } else {
                OpenAIAdapterConfig::openrouter(selection.api_key.clone())
            };
            if let Some(base_url) = &selection.base_url {
                config.base_url = base_url.clone();
            }
            Arc::new(OpenAIAdapter::new(config)?)
        }
    };

    let mut client = Client::default();
    client.register_provider(adapter)?;
    client.add_middleware(Arc::new(TracingMiddleware));
    Ok(Arc::new(client))
}
