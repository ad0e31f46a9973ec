//! Docker CLI config.json の読み込み

use crate::error::LookupFailure;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// config.json のディレクトリを上書きする環境変数
pub const DOCKER_CONFIG_ENV: &str = "DOCKER_CONFIG";

const DOCKER_DIR: &str = ".docker";
const CONFIG_JSON: &str = "config.json";

/// デフォルトの config.json パスを取得
///
/// `$DOCKER_CONFIG/config.json`、未設定なら `~/.docker/config.json`
pub fn default_config_path() -> PathBuf {
    std::env::var_os(DOCKER_CONFIG_ENV)
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            dirs::home_dir()
                .map(|h| h.join(DOCKER_DIR))
                .unwrap_or_else(|| PathBuf::from(DOCKER_DIR))
        })
        .join(CONFIG_JSON)
}

/// Docker config.json の構造
///
/// 値の型が想定と違うエントリ（文字列でない helper 名など）は無視する。
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerConfigFile {
    /// 認証情報 (レジストリ -> エントリ)
    #[serde(default)]
    auths: Option<BTreeMap<String, Value>>,
    /// レジストリごとの credential helper 名
    #[serde(default)]
    cred_helpers: Option<BTreeMap<String, Value>>,
    /// 全レジストリ共通の credential helper 名 (例: "osxkeychain", "desktop")
    #[serde(default)]
    creds_store: Option<Value>,
}

impl DockerConfigFile {
    /// config.json を読み込み
    pub fn load(path: &Path) -> Result<Self, LookupFailure> {
        let content = std::fs::read_to_string(path).map_err(|source| LookupFailure::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_json(&content).map_err(|source| LookupFailure::ParseConfig {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(content: &str) -> serde_json::Result<Self> {
        serde_json::from_str(content)
    }

    /// `auths` からレジストリに一致するエントリを探す
    ///
    /// キーの完全一致を優先し、次に `https://<registry>` のような
    /// スキーム付きのキーを末尾一致で探す。
    pub fn find_auth_entry(&self, registry: &str) -> Option<(&str, &Value)> {
        let auths = self.auths.as_ref()?;

        if let Some((key, value)) = auths.get_key_value(registry) {
            return Some((key.as_str(), value));
        }

        let scheme_suffix = format!("://{}", registry);
        auths
            .iter()
            .find(|(key, _)| key.ends_with(&scheme_suffix))
            .map(|(key, value)| (key.as_str(), value))
    }

    pub fn auth_addresses(&self) -> Vec<String> {
        self.auths
            .as_ref()
            .map(|auths| auths.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// `credHelpers` に登録された helper 名
    pub fn cred_helper(&self, registry: &str) -> Option<&str> {
        self.cred_helpers.as_ref()?.get(registry)?.as_str()
    }

    pub fn cred_helper_addresses(&self) -> Vec<String> {
        self.cred_helpers
            .as_ref()
            .map(|helpers| helpers.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn creds_store(&self) -> Option<&str> {
        self.creds_store.as_ref()?.as_str()
    }
}
