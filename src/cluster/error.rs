//! Tipos de erro para o cliente da API do cluster.
//!
//! Define [`ClientError`], que traduz falhas de transporte e respostas HTTP
//! em três situações: sucesso (o `Ok`), autenticação necessária
//! ([`ClientError::needs_auth`]) e erro transitório (todo o resto).

use thiserror::Error;

/// Erros que podem ocorrer ao interagir com a API do cluster.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Nenhum token armazenado: a requisição nem foi enviada.
    #[error("not authenticated")]
    NotAuthenticated,

    /// O servidor retornou HTTP 401.
    #[error("401 Unauthorized")]
    Unauthorized,

    /// Qualquer outro status HTTP de erro.
    #[error("{status} {reason}")]
    Status {
        status: u16,
        reason: String,
        body: String,
    },

    /// Resposta estruturada `{"not-ready": msg}` do download.
    /// Não é uma falha: o resultado apenas ainda não existe.
    #[error("{0}")]
    NotReady(String),

    /// Falha de rede subjacente (DNS, conexão recusada, timeout).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// URL base do cluster inválida na configuração.
    #[error("invalid cluster url: {0}")]
    InvalidUrl(String),

    /// O corpo da resposta não tinha o formato esperado.
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ClientError {
    /// Sem token ou 401: quem chama deve pedir login.
    pub fn needs_auth(&self) -> bool {
        matches!(self, ClientError::NotAuthenticated | ClientError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_display() {
        let err = ClientError::Status {
            status: 503,
            reason: "Service Unavailable".into(),
            body: String::new(),
        };
        assert_eq!(err.to_string(), "503 Service Unavailable");
        assert!(!err.needs_auth());
    }

    #[test]
    fn auth_variants_need_auth() {
        assert!(ClientError::NotAuthenticated.needs_auth());
        assert!(ClientError::Unauthorized.needs_auth());
        assert!(!ClientError::NotReady("later".into()).needs_auth());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ClientError>();
    }
}
