//! Interface de linha de comando do cloudsolve baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (prepare, submit,
//! jobs, pull, cancel, remove, status, auth) e flags globais
//! (--dir, --name, --config, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// cloudsolve: submete e acompanha jobs de análise em um cluster remoto.
#[derive(Debug, Parser)]
#[command(name = "cloudsolve", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Diretório de trabalho com os arquivos de entrada e resultados.
    #[arg(long, short, global = true, default_value = ".")]
    pub dir: PathBuf,

    /// Nome do documento; padrão é o nome do diretório de trabalho.
    #[arg(long, short, global = true)]
    pub name: Option<String>,

    /// Caminho para o arquivo de configuração.
    #[arg(long, global = true, env = "CLOUDSOLVE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Valida a análise e escreve a entrada do solver.
    Prepare {
        /// Arquivo TOML descrevendo a análise.
        #[arg(long)]
        analysis: PathBuf,
    },

    /// Empacota os arquivos de entrada e envia o job.
    Submit {
        /// Continua exibindo o status do cluster até a fila esvaziar.
        #[arg(long)]
        watch: bool,
    },

    /// Lista os jobs do usuário.
    Jobs,

    /// Baixa e extrai os resultados de um job.
    Pull {
        /// Id do job (completo, como listado por `jobs`).
        job_id: Option<String>,
    },

    /// Cancela um job na fila ou em processamento.
    Cancel {
        job_id: Option<String>,

        /// Não pede confirmação.
        #[arg(long, short)]
        yes: bool,
    },

    /// Remove um job e seus resultados do cluster.
    Remove {
        job_id: Option<String>,

        /// Não pede confirmação.
        #[arg(long, short)]
        yes: bool,
    },

    /// Verifica a sessão e mostra o status do cluster.
    Status {
        /// Continua exibindo o status do cluster até a fila esvaziar.
        #[arg(long)]
        watch: bool,
    },

    /// Faz login, ou logout se a sessão atual for válida.
    Auth {
        #[arg(long, env = "CLOUDSOLVE_EMAIL")]
        email: Option<String>,

        #[arg(long, env = "CLOUDSOLVE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
}

impl Cli {
    /// Nome do documento: o informado ou o último componente do diretório.
    pub fn document_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        std::fs::canonicalize(&self.dir)
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "job".to_string())
    }
}
