//! イメージプル処理

use crate::error::{BuildError, BuildResult};
use crate::pusher::split_image_tag;
use bollard::Docker;
use bollard::models::CreateImageInfo;
use colored::Colorize;
use dockwright_auth::{RegistryAuthLocator, RegistryCredentials};
use futures_util::StreamExt;
use std::io::Write;

/// レジストリからイメージを取得するハンドラ
pub struct ImagePuller {
    docker: Docker,
    auth: RegistryAuthLocator,
}

impl ImagePuller {
    pub fn new(docker: Docker) -> Self {
        Self {
            docker,
            auth: RegistryAuthLocator::new(),
        }
    }

    pub fn with_auth(docker: Docker, auth: RegistryAuthLocator) -> Self {
        Self { docker, auth }
    }

    /// イメージをプル
    ///
    /// `platform` は `linux/arm64` のような形式。ダイジェスト付きの参照は
    /// そのまま渡す。
    pub async fn pull(
        &self,
        image: &str,
        platform: Option<&str>,
        credentials: &RegistryCredentials,
    ) -> BuildResult<()> {
        if image.trim().is_empty() {
            return Err(BuildError::InvalidConfig(
                "No image configured for pull operation.".to_string(),
            ));
        }

        let auth_config = self.auth.lookup_auth_config(image, credentials)?;
        let registry = auth_config
            .registry_address
            .clone()
            .unwrap_or_else(|| credentials.url.clone());

        tracing::info!("Pulling image '{}' from {}.", image, registry);
        println!("  ↓ {} {}", image.cyan(), format!("({})", registry).dimmed());

        let (from_image, tag) = if image.contains('@') {
            (image.to_string(), String::new())
        } else {
            split_image_tag(image)
        };

        #[allow(deprecated)]
        let options = bollard::image::CreateImageOptions::<String> {
            from_image,
            tag,
            platform: platform.unwrap_or_default().to_string(),
            ..Default::default()
        };

        #[allow(deprecated)]
        let mut stream = self
            .docker
            .create_image(Some(options), None, Some(auth_config.into()));

        while let Some(info) = stream.next().await {
            match info {
                Ok(CreateImageInfo {
                    error: Some(error), ..
                }) => {
                    println!();
                    return Err(BuildError::PullFailed { message: error });
                }
                Ok(CreateImageInfo {
                    status: Some(status),
                    progress: Some(progress),
                    ..
                }) => {
                    print!("\r  ↓ {}: {}", status, progress);
                    std::io::stdout().flush()?;
                }
                Ok(CreateImageInfo {
                    status: Some(status),
                    ..
                }) => {
                    print!("\r  ↓ {}                    ", status);
                    std::io::stdout().flush()?;
                }
                Err(e) => {
                    println!();
                    return Err(BuildError::PullFailed {
                        message: e.to_string(),
                    });
                }
                _ => {}
            }
        }

        println!();
        println!("  {} Pulled {}", "✓".green(), image);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pull_rejects_empty_image() {
        let docker = Docker::connect_with_local_defaults().unwrap();
        let puller = ImagePuller::new(docker);

        let result = puller.pull("  ", None, &RegistryCredentials::new()).await;
        assert!(matches!(result, Err(BuildError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_pull_rejects_invalid_reference_before_connecting() {
        let docker = Docker::connect_with_local_defaults().unwrap();
        let puller = ImagePuller::new(docker);

        let result = puller
            .pull("https://ghcr.io/org/app", None, &RegistryCredentials::new())
            .await;
        assert!(matches!(result, Err(BuildError::Auth(_))));
    }

    #[tokio::test]
    #[ignore] // Docker接続が必要なため、通常のテストではスキップ
    async fn test_pull_public_image() {
        let docker = Docker::connect_with_local_defaults().unwrap();
        let puller = ImagePuller::new(docker);

        let result = puller
            .pull("alpine:3.20", Some("linux/amd64"), &RegistryCredentials::new())
            .await;
        assert!(result.is_ok());
    }
}
