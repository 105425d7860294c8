//! Completion-service backends.
//!
//! Every backend implements [`Provider`]: a prompt goes in, generated text
//! comes out. [`create_provider`] maps a configured provider name to a
//! concrete backend.

pub mod compatible;
pub mod scripted;
pub mod traits;

pub use compatible::OpenAiCompatibleProvider;
pub use scripted::ScriptedProvider;
pub use traits::Provider;

const MAX_API_ERROR_CHARS: usize = 200;

const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434/v1";
const OPENAI_DEFAULT_URL: &str = "https://api.openai.com/v1";

fn is_secret_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':')
}

fn token_end(input: &str, from: usize) -> usize {
    let mut end = from;
    for (i, c) in input[from..].char_indices() {
        if is_secret_char(c) {
            end = from + i + c.len_utf8();
        } else {
            break;
        }
    }
    end
}

/// Scrub known secret-like token prefixes from provider error strings.
pub fn scrub_secret_patterns(input: &str) -> String {
    const PREFIXES: [&str; 3] = ["sk-", "sk_", "Bearer "];

    let mut scrubbed = input.to_string();

    for prefix in PREFIXES {
        let mut search_from = 0;
        loop {
            let Some(rel) = scrubbed[search_from..].find(prefix) else {
                break;
            };

            let start = search_from + rel;
            let content_start = start + prefix.len();
            let end = token_end(&scrubbed, content_start);

            if end == content_start {
                search_from = content_start;
                continue;
            }

            scrubbed.replace_range(start..end, "[REDACTED]");
            search_from = start + "[REDACTED]".len();
        }
    }

    scrubbed
}

/// Sanitize API error text by scrubbing secrets and truncating length.
pub fn sanitize_api_error(input: &str) -> String {
    let scrubbed = scrub_secret_patterns(input);

    if scrubbed.chars().count() <= MAX_API_ERROR_CHARS {
        return scrubbed;
    }

    let mut end = MAX_API_ERROR_CHARS;
    while end > 0 && !scrubbed.is_char_boundary(end) {
        end -= 1;
    }

    format!("{}...", &scrubbed[..end])
}

/// Build a sanitized provider error from a failed HTTP response.
pub async fn api_error(provider: &str, response: reqwest::Response) -> anyhow::Error {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read provider error body>".to_string());
    let sanitized = sanitize_api_error(&body);
    anyhow::anyhow!("{provider} API error ({status}): {sanitized}")
}

/// Factory: create the right provider from config.
///
/// `custom:<url>` targets any OpenAI-compatible endpoint.
pub fn create_provider(
    name: &str,
    api_key: Option<&str>,
    api_url: Option<&str>,
    model: &str,
    temperature: f64,
) -> anyhow::Result<Box<dyn Provider>> {
    let key = api_key.map(str::trim).filter(|k| !k.is_empty());

    match name.trim() {
        "ollama" => Ok(Box::new(OpenAiCompatibleProvider::new(
            "ollama",
            api_url.unwrap_or(OLLAMA_DEFAULT_URL),
            key,
            model,
            temperature,
        ))),
        "openai" => Ok(Box::new(
            OpenAiCompatibleProvider::new(
                "openai",
                api_url.unwrap_or(OPENAI_DEFAULT_URL),
                key,
                model,
                temperature,
            )
            .requiring_key(),
        )),
        other => {
            if let Some(url) = other.strip_prefix("custom:") {
                if url.trim().is_empty() {
                    anyhow::bail!("custom provider requires a URL, e.g. custom:http://host/v1");
                }
                return Ok(Box::new(OpenAiCompatibleProvider::new(
                    "custom",
                    url.trim(),
                    key,
                    model,
                    temperature,
                )));
            }
            anyhow::bail!(
                "Unknown provider: {other}. Supported: \"ollama\", \"openai\", \"custom:<url>\"."
            )
        }
    }
}

/// Information about a supported provider for display purposes.
pub struct ProviderInfo {
    pub name: &'static str,
    pub display_name: &'static str,
    /// Whether the provider runs locally (no API key required)
    pub local: bool,
}

pub fn list_providers() -> Vec<ProviderInfo> {
    vec![
        ProviderInfo {
            name: "ollama",
            display_name: "Ollama",
            local: true,
        },
        ProviderInfo {
            name: "openai",
            display_name: "OpenAI",
            local: false,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_ollama_without_key() {
        let p = create_provider("ollama", None, None, "llama3", 0.7).unwrap();
        assert_eq!(p.name(), "ollama");
    }

    #[test]
    fn factory_openai() {
        assert!(create_provider("openai", Some("provider-test-credential"), None, "gpt-4o", 0.2).is_ok());
    }

    #[test]
    fn factory_custom_url() {
        let p = create_provider("custom:http://10.0.0.5:8080/v1", None, None, "m", 0.0).unwrap();
        assert_eq!(p.name(), "custom");
        assert!(create_provider("custom:", None, None, "m", 0.0).is_err());
    }

    #[test]
    fn factory_unknown_provider_errors() {
        let p = create_provider("nonexistent", None, None, "m", 0.7);
        let msg = p.err().unwrap().to_string();
        assert!(msg.contains("Unknown provider"));
    }

    #[test]
    fn listed_providers_are_constructible() {
        for info in list_providers() {
            assert!(
                create_provider(info.name, Some("k"), None, "m", 0.7).is_ok(),
                "provider should be constructible: {}",
                info.name
            );
        }
    }

    #[test]
    fn sanitize_scrubs_sk_prefix() {
        let input = "request failed: sk-1234567890abcdef";
        let out = sanitize_api_error(input);
        assert!(!out.contains("sk-1234567890abcdef"));
        assert!(out.contains("[REDACTED]"));
    }

    #[test]
    fn sanitize_truncates_long_error() {
        let long = "a".repeat(400);
        let result = sanitize_api_error(&long);
        assert!(result.len() <= 203);
        assert!(result.ends_with("..."));
    }

    #[test]
    fn sanitize_no_secret_no_change() {
        let input = "model 'llama3' not found";
        assert_eq!(sanitize_api_error(input), input);
    }
}
