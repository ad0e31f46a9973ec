use crate::context::ContextBuilder;
use crate::error::{BuildError, Result};
use crate::id_file;
use crate::path::ResolvablePath;
use crate::pusher::{split_image_tag, validate_tag};
use bollard::Docker;
use bytes::Bytes;
use colored::Colorize;
use dockwright_auth::{RegistryAuthLocator, RegistryCredentials, build_credentials};
use futures_util::stream::StreamExt;
use http_body_util::{Either, Full};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// イメージビルドの入力
#[derive(Debug, Default)]
pub struct BuildRequest {
    pub context: PathBuf,
    /// 省略時は `<context>/Dockerfile`
    pub dockerfile: Option<PathBuf>,
    /// 先頭のタグでビルドし、残りは後から付与する
    pub tags: Vec<String>,
    pub build_args: HashMap<String, String>,
    pub target: Option<String>,
    pub platform: Option<String>,
    pub no_cache: bool,
    pub pull: bool,
    /// ビルドで宣言されたレジストリ認証情報
    pub credentials: RegistryCredentials,
    pub image_id_file: Option<ResolvablePath>,
}

impl BuildRequest {
    pub fn new(context: impl Into<PathBuf>) -> Self {
        Self {
            context: context.into(),
            ..Default::default()
        }
    }

    pub fn with_dockerfile(mut self, dockerfile: impl Into<PathBuf>) -> Self {
        self.dockerfile = Some(dockerfile.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_build_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.build_args.insert(key.into(), value.into());
        self
    }

    pub fn with_credentials(mut self, credentials: RegistryCredentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_image_id_file(mut self, path: impl Into<ResolvablePath>) -> Self {
        self.image_id_file = Some(path.into());
        self
    }

    fn validate(&self) -> Result<&str> {
        let Some(primary) = self.tags.first() else {
            return Err(BuildError::InvalidConfig(
                "At least one tag is required for build operation.".to_string(),
            ));
        };

        for image in &self.tags {
            let (_, tag) = split_image_tag(image);
            validate_tag(&tag)?;
        }

        Ok(primary.as_str())
    }
}

pub struct ImageBuilder {
    docker: Docker,
    auth: RegistryAuthLocator,
}

impl ImageBuilder {
    pub fn new(docker: Docker) -> Self {
        Self {
            docker,
            auth: RegistryAuthLocator::new(),
        }
    }

    pub fn with_auth(docker: Docker, auth: RegistryAuthLocator) -> Self {
        Self { docker, auth }
    }

    /// イメージをビルドし、イメージ ID を返す
    ///
    /// config.json から見つかる全レジストリの認証情報をビルドに渡すため、
    /// マルチステージビルドで複数のレジストリから pull できる。
    pub async fn build(&self, request: &BuildRequest) -> Result<String> {
        let primary_tag = request.validate()?;
        let context = ContextBuilder::create_context(&request.context, request.dockerfile.as_deref())?;

        let auth_configs = self
            .auth
            .lookup_all_auth_configs_with_credentials(&request.credentials)?;
        let credentials = build_credentials(&auth_configs);
        tracing::debug!(
            "Build auth configs for registries: {:?}",
            credentials.keys().collect::<Vec<_>>()
        );

        tracing::info!("Building image: {}", primary_tag);

        let build_args: HashMap<&str, &str> = request
            .build_args
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        #[allow(deprecated)]
        let options = bollard::image::BuildImageOptions {
            dockerfile: context.dockerfile.as_str(),
            t: primary_tag,
            buildargs: build_args,
            target: request.target.as_deref().unwrap_or(""),
            platform: request.platform.as_deref().unwrap_or(""),
            nocache: request.no_cache,
            pull: request.pull,
            rm: true,
            forcerm: true,
            ..Default::default()
        };

        tracing::debug!("Build options: {:?}", options);

        let body = Full::new(Bytes::from(context.archive));
        let mut stream = self
            .docker
            .build_image(options, Some(credentials), Some(Either::Left(body)));

        while let Some(msg) = stream.next().await {
            self.handle_build_output(msg?)?;
        }

        for extra in &request.tags[1..] {
            self.tag_image(primary_tag, extra).await?;
        }

        let image_id = self
            .docker
            .inspect_image(primary_tag)
            .await?
            .id
            .ok_or_else(|| {
                BuildError::BuildFailed(format!("No image id reported for {}", primary_tag))
            })?;

        if let Some(id_file) = &request.image_id_file {
            id_file::write_id(&id_file.resolve(), &image_id)?;
        }

        tracing::info!("Successfully built: {} ({})", primary_tag, image_id);
        Ok(image_id)
    }

    /// ID ファイルに記録されたイメージがまだ存在するか
    pub async fn is_up_to_date(&self, id_file: &Path) -> Result<bool> {
        match id_file::read_id(id_file)? {
            Some(image_id) => self.image_exists(&image_id).await,
            None => Ok(false),
        }
    }

    /// イメージの存在確認
    pub async fn image_exists(&self, image: &str) -> Result<bool> {
        match self.docker.inspect_image(image).await {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404,
                ..
            }) => Ok(false),
            Err(e) => Err(BuildError::DockerConnection(e)),
        }
    }

    async fn tag_image(&self, source: &str, target: &str) -> Result<()> {
        let (repo, tag) = split_image_tag(target);
        tracing::debug!("Tagging {} as {}:{}", source, repo, tag);

        #[allow(deprecated)]
        let options = bollard::image::TagImageOptions::<String> { repo, tag };
        self.docker.tag_image(source, Some(options)).await?;
        Ok(())
    }

    /// ビルド出力の処理
    fn handle_build_output(&self, output: bollard::models::BuildInfo) -> Result<()> {
        if let Some(stream) = output.stream {
            print!("{}", stream);
        }

        if let Some(error) = output.error {
            return Err(BuildError::BuildFailed(error));
        }

        if let Some(error_detail) = output.error_detail {
            let error_msg = error_detail
                .message
                .unwrap_or_else(|| "Unknown build error".to_string());
            return Err(BuildError::BuildFailed(error_msg));
        }

        // pull 等のステータス
        if let Some(status) = output.status {
            println!("{}", status.cyan());
        }

        Ok(())
    }
}
