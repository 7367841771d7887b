use anyhow::{ensure, Context, Result};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    pub api_key: String,
    #[serde(default = "default_openai_api_base")]
    pub api_base: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HuggingFaceConfig {
    pub api_key: String,
    #[serde(default = "default_huggingface_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_image_to_text_model")]
    pub image_to_text_model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub openai: Option<OpenAiConfig>,
    pub huggingface: Option<HuggingFaceConfig>,
    pub functions_path: PathBuf,
}

impl AppConfig {
    /// Build configuration from well-known environment variables.
    pub fn load_from_env() -> Result<Self> {
        preload_env_files();
        Self::from_source(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup, e.g. a map in tests.
    pub fn from_source<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let openai = non_empty("OPENAI_API_KEY").map(|api_key| OpenAiConfig {
            api_key,
            api_base: non_empty("OPENAI_API_BASE").unwrap_or_else(default_openai_api_base),
        });

        let huggingface = non_empty("HUGGINGFACE_API_KEY").map(|api_key| HuggingFaceConfig {
            api_key,
            endpoint: non_empty("HUGGINGFACE_ENDPOINT")
                .unwrap_or_else(default_huggingface_endpoint),
            image_to_text_model: non_empty("HUGGINGFACE_IMAGE_TO_TEXT_MODEL")
                .unwrap_or_else(default_image_to_text_model),
        });

        let functions_path = match non_empty("FUNCTIONS_PATH") {
            Some(path) => PathBuf::from(path),
            None => env::current_dir()
                .context("无法确定当前工作目录，请设置 FUNCTIONS_PATH")?
                .join("functions.json"),
        };

        Ok(Self {
            openai,
            huggingface,
            functions_path,
        })
    }

    /// Helper that forces the presence of OpenAI credentials.
    pub fn require_openai_config(&self) -> Result<&OpenAiConfig> {
        let config = self.openai.as_ref().context(
            "未找到 OpenAI 凭证：请在当前目录创建 .env（可参考 .env.example），并设置 OPENAI_API_KEY",
        )?;

        ensure!(
            !config.api_key.trim().is_empty() && !config.api_base.trim().is_empty(),
            "OpenAI 配置不能为空：请在 .env 中填写 OPENAI_API_KEY"
        );

        Ok(config)
    }

    /// Helper that forces the presence of Hugging Face credentials.
    pub fn require_huggingface_config(&self) -> Result<&HuggingFaceConfig> {
        let config = self.huggingface.as_ref().context(
            "未找到 Hugging Face 凭证：请在当前目录创建 .env（可参考 .env.example），并设置 HUGGINGFACE_API_KEY",
        )?;

        ensure!(
            !config.api_key.trim().is_empty() && !config.endpoint.trim().is_empty(),
            "Hugging Face 配置不能为空：请在 .env 中填写 HUGGINGFACE_API_KEY"
        );

        Ok(config)
    }
}

/// First eight characters of a secret followed by an ellipsis, for logs.
pub fn mask_secret(secret: &str) -> String {
    let prefix: String = secret.chars().take(8).collect();
    format!("{prefix}...")
}

fn default_openai_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_huggingface_endpoint() -> String {
    "https://api-inference.huggingface.co".to_string()
}

fn default_image_to_text_model() -> String {
    "Salesforce/blip-image-captioning-large".to_string()
}

fn preload_env_files() {
    // 自动加载当前目录或上层目录中的 .env 文件（如果存在）
    let _ = dotenv();

    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let workspace_env = manifest_dir.join("../../.env");
    if workspace_env.exists() {
        let _ = dotenvy::from_path(workspace_env);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn source(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn reads_credentials_and_applies_defaults() {
        let config = AppConfig::from_source(source(&[
            ("OPENAI_API_KEY", "sk-test-123456789"),
            ("HUGGINGFACE_API_KEY", "hf_abcdefghijk"),
            ("FUNCTIONS_PATH", "/tmp/functions.json"),
        ]))
        .unwrap();

        let openai = config.require_openai_config().unwrap();
        assert_eq!(openai.api_key, "sk-test-123456789");
        assert_eq!(openai.api_base, "https://api.openai.com/v1");

        let hf = config.require_huggingface_config().unwrap();
        assert_eq!(hf.endpoint, "https://api-inference.huggingface.co");
        assert_eq!(hf.image_to_text_model, "Salesforce/blip-image-captioning-large");
        assert_eq!(config.functions_path, PathBuf::from("/tmp/functions.json"));
    }

    #[test]
    fn blank_credentials_are_treated_as_missing() {
        let config = AppConfig::from_source(source(&[
            ("OPENAI_API_KEY", "   "),
            ("FUNCTIONS_PATH", "functions.json"),
        ]))
        .unwrap();

        assert!(config.openai.is_none());
        assert!(config.require_openai_config().is_err());
        assert!(config.require_huggingface_config().is_err());
    }

    #[test]
    fn functions_path_defaults_to_working_directory() {
        let config = AppConfig::from_source(source(&[])).unwrap();
        let expected = env::current_dir().unwrap().join("functions.json");
        assert_eq!(config.functions_path, expected);
    }

    #[test]
    fn mask_secret_keeps_only_prefix() {
        assert_eq!(mask_secret("sk-abcdefghijklmnop"), "sk-abcde...");
        assert_eq!(mask_secret("abc"), "abc...");
    }
}
