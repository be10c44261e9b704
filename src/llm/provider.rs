//! Provider-specific URL handling.
//!
//! Every supported provider speaks the Chat Completions protocol; they differ
//! only in where the endpoint lives.

/// Supported LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// Google Gemini through its OpenAI-compatible endpoint.
    Gemini,
    /// `OpenAI` (api.openai.com)
    OpenAI,
    /// `OpenRouter` (openrouter.ai)
    OpenRouter,
    /// Generic OpenAI-compatible provider (local gateways, proxies, mocks).
    Generic,
}

impl Provider {
    /// Detect provider from base URL.
    ///
    /// # Example
    ///
    /// ```rust
    /// use carbon_agent::llm::Provider;
    ///
    /// let provider = Provider::detect_from_url("https://generativelanguage.googleapis.com");
    /// assert_eq!(provider, Provider::Gemini);
    /// ```
    #[must_use]
    pub fn detect_from_url(base_url: &str) -> Self {
        let lower = base_url.to_lowercase();

        if lower.contains("generativelanguage.googleapis.com") {
            Self::Gemini
        } else if lower.contains("openrouter.ai") {
            Self::OpenRouter
        } else if lower.contains("openai.com") {
            Self::OpenAI
        } else {
            Self::Generic
        }
    }

    /// Build the chat completions URL for this provider.
    #[must_use]
    pub fn build_chat_url(&self, base_url: &str) -> String {
        let base = base_url.trim_end_matches('/');

        match self {
            Self::Gemini if base.contains("/openai") => format!("{base}/chat/completions"),
            Self::Gemini => format!("{base}/v1beta/openai/chat/completions"),
            Self::OpenRouter if !base.ends_with("/api/v1") => {
                format!("{base}/api/v1/chat/completions")
            }
            _ if base.ends_with("/v1") => format!("{base}/chat/completions"),
            _ => format!("{base}/v1/chat/completions"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_gemini() {
        let provider = Provider::detect_from_url("https://generativelanguage.googleapis.com");
        assert_eq!(provider, Provider::Gemini);
    }

    #[test]
    fn test_detect_openai() {
        let provider = Provider::detect_from_url("https://api.openai.com");
        assert_eq!(provider, Provider::OpenAI);
    }

    #[test]
    fn test_detect_openrouter() {
        let provider = Provider::detect_from_url("https://openrouter.ai");
        assert_eq!(provider, Provider::OpenRouter);
    }

    #[test]
    fn test_detect_generic() {
        let provider = Provider::detect_from_url("http://127.0.0.1:9000");
        assert_eq!(provider, Provider::Generic);
    }

    #[test]
    fn test_build_url_gemini() {
        let url = Provider::Gemini.build_chat_url("https://generativelanguage.googleapis.com/");
        assert_eq!(
            url,
            "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions"
        );
    }

    #[test]
    fn test_build_url_gemini_with_openai_path() {
        let url = Provider::Gemini
            .build_chat_url("https://generativelanguage.googleapis.com/v1beta/openai");
        assert_eq!(
            url,
            "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions"
        );
    }

    #[test]
    fn test_build_url_openai() {
        let url = Provider::OpenAI.build_chat_url("https://api.openai.com");
        assert_eq!(url, "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn test_build_url_openrouter() {
        let url = Provider::OpenRouter.build_chat_url("https://openrouter.ai");
        assert_eq!(url, "https://openrouter.ai/api/v1/chat/completions");
    }

    #[test]
    fn test_build_url_generic_with_v1_suffix() {
        let url = Provider::Generic.build_chat_url("http://localhost:8080/v1");
        assert_eq!(url, "http://localhost:8080/v1/chat/completions");
    }
}
