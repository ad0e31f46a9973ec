use dockwright_auth::AuthError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Dockerfile not found: {0}")]
    DockerfileNotFound(PathBuf),

    #[error("Build context directory not found: {0}")]
    ContextNotFound(PathBuf),

    #[error("Docker connection error: {0}")]
    DockerConnection(#[from] bollard::errors::Error),

    #[error("Build failed: {0}")]
    BuildFailed(String),

    #[error("Push failed: {message}")]
    PushFailed { message: String },

    #[error("Pull failed: {message}")]
    PullFailed { message: String },

    #[error("Invalid tag: {tag}")]
    InvalidTag { tag: String },

    #[error("No images configured for {operation} operation.")]
    NoImages { operation: &'static str },

    #[error("Registry authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Invalid build configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BuildError {
    /// ユーザー向けの分かりやすいエラーメッセージ
    pub fn user_message(&self) -> String {
        match self {
            BuildError::DockerfileNotFound(path) => {
                format!(
                    "Dockerfileが見つかりません: {}\n\
                     \n\
                     解決方法:\n\
                     1. Dockerfileのパスを確認してください\n\
                     2. --dockerfile で明示的にパスを指定してください",
                    path.display()
                )
            }
            BuildError::BuildFailed(msg) => {
                format!(
                    "ビルドに失敗しました: {}\n\
                     \n\
                     Dockerfileの内容を確認してください。",
                    msg
                )
            }
            BuildError::ContextNotFound(path) => {
                format!(
                    "ビルドコンテキストが見つかりません: {}\n\
                     \n\
                     --context のパスを確認してください。",
                    path.display()
                )
            }
            BuildError::Auth(e) => e.user_message(),
            _ => format!("{}", self),
        }
    }
}

pub type BuildResult<T> = std::result::Result<T, BuildError>;
pub type Result<T> = BuildResult<T>;
