//! Tipos de dados para requisições e respostas da API REST do cluster.
//!
//! Todas as structs derivam `Serialize` ou `Deserialize` conforme o formato
//! JSON esperado pelos endpoints `token/`, `checkin/`, `upload/`, `fetch/`,
//! `download/`, `cancel/` e `remove/`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Corpo da requisição para o endpoint `token/`.
#[derive(Debug, Clone, Serialize)]
pub struct TokenRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Resposta do endpoint `token/`. Qualquer um dos tokens pode faltar;
/// quem chama decide se o par está completo.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access: Option<String>,
    #[serde(default)]
    pub refresh: Option<String>,
}

/// Posição do próximo job pendente na fila: `[job_id, posição]`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "(String, u64)")]
pub struct QueueSlot {
    pub job_id: String,
    pub position: u64,
}

impl From<(String, u64)> for QueueSlot {
    fn from((job_id, position): (String, u64)) -> Self {
        Self { job_id, position }
    }
}

/// Contadores retornados pelo endpoint `checkin/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClusterCounts {
    #[serde(default)]
    pub completed: u64,
    #[serde(default)]
    pub processing: u64,
    #[serde(default)]
    pub queued: u64,
    /// Id do job em processamento, quando existe.
    #[serde(default)]
    pub is_processed: Option<String>,
    /// Primeiro job pendente na fila, quando existe.
    #[serde(default)]
    pub next_queue: Option<QueueSlot>,
}

impl ClusterCounts {
    /// Verdadeiro quando nada está em processamento nem na fila.
    pub fn is_idle(&self) -> bool {
        self.processing == 0 && self.queued == 0
    }
}

/// Resposta do endpoint `upload/`.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    pub job_id: String,
}

/// Resposta do endpoint `fetch/`.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchResponse {
    #[serde(default)]
    pub jobs: Vec<JobEntry>,
}

/// Resposta de `cancel/` e `remove/`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: Option<String>,
}

/// Corpo estruturado de `download/` quando o resultado ainda não existe.
#[derive(Debug, Clone, Deserialize)]
pub struct NotReadyResponse {
    #[serde(rename = "not-ready")]
    pub not_ready: Option<String>,
}

/// Estado de um job remoto.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    /// Qualquer valor que o cliente não conhece, preservado como veio.
    Other(String),
}

impl From<String> for JobStatus {
    fn from(raw: String) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "queued" | "pending" => JobStatus::Queued,
            "processing" | "running" => JobStatus::Processing,
            "completed" | "done" | "finished" => JobStatus::Completed,
            _ => JobStatus::Other(raw),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Other(s) => write!(f, "{s}"),
        }
    }
}

/// Uma linha da lista de jobs: `[label, status, job_id]` no JSON.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "(String, String, String)")]
pub struct JobEntry {
    pub label: String,
    pub status: JobStatus,
    pub job_id: String,
}

impl From<(String, String, String)> for JobEntry {
    fn from((label, status, job_id): (String, String, String)) -> Self {
        Self {
            label,
            status: status.into(),
            job_id,
        }
    }
}

/// Trunca um id para exibição: os primeiros 8 caracteres, sem assumir
/// largura fixa.
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(8) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}
