//! Interface de linha de comando do retrylab baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (run, demo)
//! e flags globais (--workers, --max-attempts, --verbose).

use clap::{Parser, Subcommand};

/// retrylab — Motor de execução de jobs com retries simulados.
#[derive(Debug, Parser)]
#[command(name = "retrylab", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Número de workers do pool nesta sessão.
    #[arg(long, global = true)]
    pub workers: Option<usize>,

    /// Teto de tentativas para jobs que não o especificam.
    #[arg(long, global = true)]
    pub max_attempts: Option<u32>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Submete jobs e os processa até o estado terminal.
    Run {
        /// Tipo do job a submeter (ex.: send-email).
        job_type: Option<String>,

        /// Payload JSON do job (ex.: '{"force":"fail"}').
        #[arg(long)]
        payload: Option<String>,

        /// Caminho para um arquivo JSON contendo definições de jobs.
        #[arg(long)]
        file: Option<String>,
    },

    /// Executa a demonstração embutida do motor de retry.
    Demo,
}
