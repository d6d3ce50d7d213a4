//! Configuração do retrylab carregada a partir de `retrylab.toml`.
//!
//! A struct [`RetrylabConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! A variável de ambiente `RETRYLAB_WORKERS` tem precedência sobre o arquivo.

use std::path::Path;

use serde::Deserialize;

use crate::error::RetrylabError;

/// Configuração de nível superior carregada de `retrylab.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrylabConfig {
    /// Número de workers no pool do dispatcher.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Intervalo de polling em milissegundos para workers ociosos.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Teto de tentativas padrão para submissões que não o especificam.
    #[serde(default = "default_max_attempts")]
    pub default_max_attempts: u32,
}

// Valor padrão para o pool de workers: 4.
fn default_workers() -> usize {
    4
}

// Valor padrão para o intervalo de polling: 100ms.
fn default_poll_interval_ms() -> u64 {
    100
}

// Valor padrão para o teto de tentativas: 3.
fn default_max_attempts() -> u32 {
    3
}

impl Default for RetrylabConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            poll_interval_ms: default_poll_interval_ms(),
            default_max_attempts: default_max_attempts(),
        }
    }
}

impl RetrylabConfig {
    /// Carrega a configuração de `retrylab.toml` no diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load() -> Result<Self, RetrylabError> {
        Self::load_from(Path::new("retrylab.toml"))
    }

    /// Carrega a configuração do caminho indicado.
    pub fn load_from(path: &Path) -> Result<Self, RetrylabError> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<RetrylabConfig>(&contents)?
        } else {
            Self::default()
        };

        // Variável de ambiente tem precedência sobre o arquivo de configuração.
        if let Ok(value) = std::env::var("RETRYLAB_WORKERS")
            && !value.is_empty()
        {
            config.workers = value.parse().map_err(|_| {
                RetrylabError::Config(format!("invalid RETRYLAB_WORKERS value: {value}"))
            })?;
        }

        Ok(config)
    }
}
