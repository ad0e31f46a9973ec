//! イメージプッシュ処理
//!
//! ビルドしたイメージをコンテナレジストリにプッシュします。

use crate::error::{BuildError, BuildResult};
use bollard::Docker;
use bollard::models::PushImageInfo;
use colored::Colorize;
use dockwright_auth::reference::parse_repository_tag;
use dockwright_auth::{RegistryAuthLocator, RegistryCredentials};
use futures_util::StreamExt;
use std::io::Write;

/// イメージプッシュを実行するハンドラ
pub struct ImagePusher {
    docker: Docker,
    auth: RegistryAuthLocator,
}

impl ImagePusher {
    /// 新しい ImagePusher を作成
    pub fn new(docker: Docker) -> Self {
        Self {
            docker,
            auth: RegistryAuthLocator::new(),
        }
    }

    /// 認証情報ロケーターを指定して作成
    pub fn with_auth(docker: Docker, auth: RegistryAuthLocator) -> Self {
        Self { docker, auth }
    }

    /// 指定された全イメージをプッシュ
    ///
    /// イメージが 1 つもない場合は Docker に接続する前にエラーを返す。
    pub async fn push_images(
        &self,
        images: &[String],
        credentials: &RegistryCredentials,
    ) -> BuildResult<Vec<String>> {
        if images.is_empty() {
            return Err(BuildError::NoImages { operation: "push" });
        }

        let mut pushed = Vec::with_capacity(images.len());
        for image in images {
            pushed.push(self.push(image, credentials).await?);
        }
        Ok(pushed)
    }

    /// イメージをレジストリにプッシュ
    ///
    /// # Returns
    /// プッシュ成功時は完全なイメージ名を返す
    pub async fn push(&self, image: &str, credentials: &RegistryCredentials) -> BuildResult<String> {
        let auth_config = self.auth.lookup_auth_config(image, credentials)?;
        let registry = auth_config
            .registry_address
            .clone()
            .unwrap_or_else(|| credentials.url.clone());

        let (name, tag) = split_image_tag(image);
        validate_tag(&tag)?;

        let full_image = format!("{}:{}", name, tag);
        tracing::info!("Pushing image '{}' to {}.", full_image, registry);
        println!("  → {} {}", full_image.cyan(), format!("({})", registry).dimmed());

        #[allow(deprecated)]
        let options = bollard::image::PushImageOptions::<String> { tag: tag.clone() };

        #[allow(deprecated)]
        let mut stream = self
            .docker
            .push_image(&name, Some(options), Some(auth_config.into()));

        let mut last_status = String::new();
        let mut error_message: Option<String> = None;

        while let Some(result) = stream.next().await {
            match result {
                Ok(info) => {
                    if let Some(err) = info.error {
                        error_message = Some(err);
                    } else {
                        handle_progress(&info, &mut last_status);
                    }
                }
                Err(e) => {
                    return Err(BuildError::PushFailed {
                        message: e.to_string(),
                    });
                }
            }
        }

        println!();

        if let Some(err) = error_message {
            return Err(BuildError::PushFailed { message: err });
        }

        Ok(full_image)
    }
}

/// タグのバリデーション
///
/// - 128文字以下
/// - 英数字、ピリオド、ハイフン、アンダースコアのみ
/// - 先頭はピリオドまたはハイフンではない
pub(crate) fn validate_tag(tag: &str) -> BuildResult<()> {
    if tag.is_empty() {
        return Err(BuildError::InvalidTag {
            tag: "(empty)".to_string(),
        });
    }

    if tag.len() > 128 {
        return Err(BuildError::InvalidTag {
            tag: format!("Tag too long ({} characters, max 128)", tag.len()),
        });
    }

    if tag.starts_with('.') || tag.starts_with('-') {
        return Err(BuildError::InvalidTag {
            tag: tag.to_string(),
        });
    }

    if let Some(c) = tag
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && *c != '.' && *c != '-' && *c != '_')
    {
        return Err(BuildError::InvalidTag {
            tag: format!("Invalid character '{}' in tag: {}", c, tag),
        });
    }

    Ok(())
}

fn handle_progress(info: &PushImageInfo, last_status: &mut String) {
    let Some(status) = &info.status else {
        return;
    };
    let progress = info.progress.as_deref().unwrap_or("");

    match status.as_str() {
        "Pushing" => {
            print!("\r  ↑ {} {}     ", status, progress);
            std::io::stdout().flush().ok();
        }
        "Pushed" => {
            println!("\r  {} Pushed                    ", "✓".green());
        }
        "Layer already exists" => {
            println!("\r  {} Layer already exists      ", "✓".green());
        }
        // ノイズ軽減
        "Preparing" | "Waiting" => {}
        _ => {
            if status != last_status {
                println!("\r  ℹ {}                    ", status);
                *last_status = status.clone();
            }
        }
    }
}

/// イメージ名とタグを分離
///
/// ダイジェストは取り除き、タグがなければ `latest` を使う。
///
/// # Examples
/// - `ghcr.io/org/app:v1.0` -> `("ghcr.io/org/app", "v1.0")`
/// - `ghcr.io/org/app` -> `("ghcr.io/org/app", "latest")`
/// - `redis:7` -> `("redis", "7")`
/// - `localhost:5000/app:dev` -> `("localhost:5000/app", "dev")`
pub fn split_image_tag(image: &str) -> (String, String) {
    let image = image.split_once('@').map_or(image, |(name, _)| name);
    let (name, tag) = parse_repository_tag(image);

    if tag.is_empty() {
        return (name, "latest".to_string());
    }
    (name, tag)
}
