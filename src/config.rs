//! Configuração do cloudsolve carregada a partir de `cloudsolve.toml`.
//!
//! A struct [`CloudSolveConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! A variável de ambiente `CLOUDSOLVE_URL` tem precedência sobre o arquivo.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Nome do arquivo de configuração procurado no diretório atual.
pub const CONFIG_FILE: &str = "cloudsolve.toml";

/// Configuração de nível superior carregada de `cloudsolve.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct CloudSolveConfig {
    /// URL base da API REST do cluster.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Intervalo entre consultas de status do poller, em segundos.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Timeout total de uma requisição comum, em segundos.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Timeout de conexão, em segundos.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Timeout do download de resultados, em segundos.
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,

    /// Limite mínimo do erro alvo (%) aceito pelo cluster.
    #[serde(default = "default_min_error_threshold")]
    pub min_error_threshold: f64,

    /// Arquivo onde o par de tokens é persistido.
    #[serde(default)]
    pub token_file: Option<PathBuf>,

    /// Página de cadastro citada quando o usuário precisa se autenticar.
    #[serde(default)]
    pub signup_url: Option<String>,
}

// Valor padrão da URL base: servidor local.
fn default_base_url() -> String {
    "http://127.0.0.1:8000/api".to_string()
}

// Valor padrão do intervalo de polling: 10s.
fn default_poll_interval_secs() -> u64 {
    10
}

// Valor padrão do timeout de requisição: 30s.
fn default_request_timeout_secs() -> u64 {
    30
}

// Valor padrão do timeout de conexão: 10s.
fn default_connect_timeout_secs() -> u64 {
    10
}

// Valor padrão do timeout de download: 10min.
fn default_download_timeout_secs() -> u64 {
    600
}

// Valor padrão do limite de erro: 2.5%.
fn default_min_error_threshold() -> f64 {
    2.5
}

impl Default for CloudSolveConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            poll_interval_secs: default_poll_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            download_timeout_secs: default_download_timeout_secs(),
            min_error_threshold: default_min_error_threshold(),
            token_file: None,
            signup_url: None,
        }
    }
}

impl CloudSolveConfig {
    /// Carrega a configuração de `cloudsolve.toml` no diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Carrega a configuração de um caminho explícito.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            toml::from_str::<CloudSolveConfig>(&contents)
                .with_context(|| format!("parsing {}", path.display()))?
        } else {
            Self::default()
        };

        // Variável de ambiente tem precedência sobre o arquivo para a URL.
        if let Ok(url) = std::env::var("CLOUDSOLVE_URL") {
            if !url.is_empty() {
                config.base_url = url;
            }
        }

        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    /// Caminho do arquivo de tokens: o configurado ou
    /// `<config dir>/cloudsolve/tokens.json`.
    pub fn token_path(&self) -> PathBuf {
        self.token_file.clone().unwrap_or_else(|| {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("cloudsolve")
                .join("tokens.json")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = CloudSolveConfig::default();
        assert_eq!(config.poll_interval_secs, 10);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.download_timeout_secs, 600);
        assert_eq!(config.min_error_threshold, 2.5);
        assert!(config.token_file.is_none());
        assert!(config.signup_url.is_none());
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            base_url = "https://cluster.example.com/api"
            poll_interval_secs = 3
        "#;
        let config: CloudSolveConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.base_url, "https://cluster.example.com/api");
        assert_eq!(config.poll_interval(), Duration::from_secs(3));
        assert_eq!(config.connect_timeout_secs, 10);
        assert_eq!(config.min_error_threshold, 2.5);
    }

    #[test]
    fn zero_poll_interval_is_floored() {
        let config: CloudSolveConfig = toml::from_str("poll_interval_secs = 0").unwrap();
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn load_from_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = CloudSolveConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.poll_interval_secs, 10);
    }

    #[test]
    fn explicit_token_file_wins() {
        let config: CloudSolveConfig = toml::from_str(r#"token_file = "/tmp/t.json""#).unwrap();
        assert_eq!(config.token_path(), PathBuf::from("/tmp/t.json"));
    }
}
