//! サブコマンドの実装

use anyhow::Context;
use bollard::Docker;
use colored::Colorize;
use dockwright_auth::{AuthConfig, AuthError, RegistryAuthLocator, RegistryCredentials};
use dockwright_build::{BuildError, BuildRequest, ImageBuilder, ImagePuller, ImagePusher};
use std::collections::HashMap;

pub fn registry(locator: &RegistryAuthLocator, image: &str) -> anyhow::Result<()> {
    println!("{}", locator.get_registry(image)?);
    Ok(())
}

pub fn auth(
    locator: &RegistryAuthLocator,
    image: &str,
    credentials: &RegistryCredentials,
) -> anyhow::Result<()> {
    let config = locator.lookup_auth_config(image, credentials)?;
    print_auth_config(&config);
    Ok(())
}

pub fn auth_all(
    locator: &RegistryAuthLocator,
    credentials: &RegistryCredentials,
) -> anyhow::Result<()> {
    let configs = locator.lookup_all_auth_configs_with_credentials(credentials)?;

    if configs.is_empty() {
        println!("{}", "No registry credentials found".dimmed());
        return Ok(());
    }

    for config in &configs {
        println!(
            "{}  {}",
            or_none(&config.registry_address).bold(),
            or_none(&config.username)
        );
    }
    Ok(())
}

pub async fn push(
    locator: RegistryAuthLocator,
    images: &[String],
    credentials: &RegistryCredentials,
) -> anyhow::Result<()> {
    let pusher = ImagePusher::with_auth(connect()?, locator);
    let pushed = pusher.push_images(images, credentials).await?;

    for image in pushed {
        println!("{} {}", "✓".green(), image);
    }
    Ok(())
}

pub async fn pull(
    locator: RegistryAuthLocator,
    image: &str,
    platform: Option<&str>,
    credentials: &RegistryCredentials,
) -> anyhow::Result<()> {
    let puller = ImagePuller::with_auth(connect()?, locator);
    puller.pull(image, platform, credentials).await?;
    Ok(())
}

pub async fn build(locator: RegistryAuthLocator, request: &BuildRequest) -> anyhow::Result<()> {
    let builder = ImageBuilder::with_auth(connect()?, locator);
    let image_id = builder.build(request).await?;
    println!("{} {}", "✓".green(), image_id);
    Ok(())
}

/// `KEY=VALUE` 形式のビルド引数をパース
pub fn parse_build_args(args: &[String]) -> anyhow::Result<HashMap<String, String>> {
    args.iter()
        .map(|arg| -> anyhow::Result<(String, String)> {
            let (key, value) = arg
                .split_once('=')
                .with_context(|| format!("Invalid build arg '{}', expected KEY=VALUE", arg))?;
            Ok((key.to_string(), value.to_string()))
        })
        .collect()
}

/// エラー表示用メッセージ（既知のエラーは詳しい説明に置き換える）
pub fn error_message(error: &anyhow::Error) -> String {
    if let Some(e) = error.downcast_ref::<BuildError>() {
        return e.user_message();
    }
    if let Some(e) = error.downcast_ref::<AuthError>() {
        return e.user_message();
    }
    format!("{:#}", error)
}

fn connect() -> anyhow::Result<Docker> {
    Docker::connect_with_local_defaults().context("Failed to connect to Docker")
}

fn print_auth_config(config: &AuthConfig) {
    println!("{} {}", "Registry:".bold(), or_none(&config.registry_address));
    println!("{} {}", "Username:".bold(), or_none(&config.username));
    println!(
        "{} {}",
        "Password:".bold(),
        if config.password.is_some() { "***" } else { "(none)" }
    );
    println!("{} {}", "Email:   ".bold(), or_none(&config.email));
    if config.identity_token.is_some() {
        println!("{} ***", "Identity token:".bold());
    }
}

fn or_none(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("(none)")
}
