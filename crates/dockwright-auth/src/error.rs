use std::path::PathBuf;
use thiserror::Error;

/// 呼び出し元まで伝播する認証エラー
#[derive(Debug, Error)]
pub enum AuthError {
    /// config.json の `auth` が `username:password` の base64 になっていない
    #[error("Invalid auth configuration for registry '{registry}': {message}")]
    InvalidAuthToken { registry: String, message: String },

    #[error("Invalid image reference '{reference}': {message}")]
    InvalidReference { reference: String, message: String },
}

impl AuthError {
    /// ユーザー向けの分かりやすいエラーメッセージ
    pub fn user_message(&self) -> String {
        match self {
            AuthError::InvalidAuthToken { registry, .. } => format!(
                "{}\n\
                 \n\
                 Docker config.json の '{}' エントリが壊れています。\n\
                 `docker login {}` で認証情報を作り直してください。",
                self, registry, registry
            ),
            _ => format!("{}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;

/// ルックアップ手順ごとの失敗
///
/// `Auth` だけがロケーターの外へ伝播し、それ以外はログに残して
/// 「認証情報なし」として扱われる。
#[derive(Debug, Error)]
pub enum LookupFailure {
    #[error("failed to read {}: {source}", .path.display())]
    ReadConfig {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    ParseConfig {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to run credential helper {command}: {source}")]
    Launch {
        command: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    Auth(#[from] AuthError),
}
