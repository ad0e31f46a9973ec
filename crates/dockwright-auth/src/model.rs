//! 認証情報のデータモデル

use crate::error::{AuthError, Result};
use base64::Engine;
use bollard::auth::DockerCredentials;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// デフォルトレジストリ (Docker Hub) のインデックス URL
pub const DEFAULT_REGISTRY_URL: &str = "https://index.docker.io/v1/";

/// 1 つのレジストリに対する認証情報
///
/// config.json の `auths.<registry>` エントリと同じフィールド名で
/// デシリアライズできる。
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(rename = "serveraddress", default, skip_serializing_if = "Option::is_none")]
    pub registry_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Base64エンコードされた "username:password"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "identitytoken", default, skip_serializing_if = "Option::is_none")]
    pub identity_token: Option<String>,
    #[serde(rename = "registrytoken", default, skip_serializing_if = "Option::is_none")]
    pub registry_token: Option<String>,
}

impl AuthConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry_address(mut self, address: impl Into<String>) -> Self {
        self.registry_address = Some(address.into());
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_auth(mut self, auth: impl Into<String>) -> Self {
        self.auth = Some(auth.into());
        self
    }

    /// レジストリ・ユーザー名・パスワードが揃っているか
    ///
    /// 揃っている場合はビルド側で明示的に設定された認証情報とみなし、
    /// config.json より優先する。
    pub fn is_complete(&self) -> bool {
        self.registry_address.is_some() && self.username.is_some() && self.password.is_some()
    }

    /// `auth` トークンを username / password に展開する
    ///
    /// 展開後は `auth` を空にする。トークンが `username:password` の
    /// base64 でない場合は設定ファイルの破損としてエラーを返す。
    pub fn decode_auth(mut self) -> Result<Self> {
        let Some(token) = self.auth.take() else {
            return Ok(self);
        };

        let registry = self.registry_address.clone().unwrap_or_default();
        let invalid = |message: String| AuthError::InvalidAuthToken {
            registry: registry.clone(),
            message,
        };

        let decoded = base64::engine::general_purpose::STANDARD
            .decode(token.as_bytes())
            .map_err(|e| invalid(format!("auth is not valid base64: {}", e)))?;

        let auth_str = String::from_utf8(decoded)
            .map_err(|e| invalid(format!("auth is not valid UTF-8: {}", e)))?;

        let (username, password) = auth_str
            .split_once(':')
            .ok_or_else(|| invalid("auth must have the form username:password".to_string()))?;

        self.username = Some(username.to_string());
        self.password = Some(password.to_string());
        Ok(self)
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("registry_address", &self.registry_address)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("auth", &self.auth.as_ref().map(|_| "***"))
            .field("email", &self.email)
            .field("identity_token", &self.identity_token.as_ref().map(|_| "***"))
            .field("registry_token", &self.registry_token.as_ref().map(|_| "***"))
            .finish()
    }
}

impl From<AuthConfig> for DockerCredentials {
    fn from(config: AuthConfig) -> Self {
        DockerCredentials {
            username: config.username,
            password: config.password,
            auth: config.auth,
            email: config.email,
            serveraddress: config.registry_address,
            identitytoken: config.identity_token,
            registrytoken: config.registry_token,
            ..Default::default()
        }
    }
}

/// ビルド API 向けにレジストリアドレスをキーにしたマップへ変換
///
/// 同じアドレスが複数ある場合は後ろのエントリで上書きする。
pub fn build_credentials(configs: &[AuthConfig]) -> HashMap<String, DockerCredentials> {
    configs
        .iter()
        .filter_map(|config| {
            let address = config.registry_address.clone()?;
            Some((address, DockerCredentials::from(config.clone())))
        })
        .collect()
}

/// ビルド設定で宣言されたレジストリ認証情報
#[derive(Clone, PartialEq, Eq)]
pub struct RegistryCredentials {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
}

impl Default for RegistryCredentials {
    fn default() -> Self {
        Self {
            url: DEFAULT_REGISTRY_URL.to_string(),
            username: None,
            password: None,
            email: None,
        }
    }
}

impl RegistryCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// AuthConfig に変換（レジストリ URL は常に設定される）
    pub fn to_auth_config(&self) -> AuthConfig {
        AuthConfig {
            registry_address: Some(self.url.clone()),
            username: self.username.clone(),
            password: self.password.clone(),
            email: self.email.clone(),
            ..Default::default()
        }
    }
}

impl fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("email", &self.email)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(value: &str) -> String {
        base64::engine::general_purpose::STANDARD.encode(value)
    }

    #[test]
    fn test_decode_auth_splits_username_and_password() {
        let config = AuthConfig::new()
            .with_registry_address("ghcr.io")
            .with_auth(encode("octocat:s3cret"))
            .decode_auth()
            .unwrap();

        assert_eq!(config.username.as_deref(), Some("octocat"));
        assert_eq!(config.password.as_deref(), Some("s3cret"));
        assert_eq!(config.auth, None);
    }

    #[test]
    fn test_decode_auth_keeps_colons_in_password() {
        let config = AuthConfig::new()
            .with_auth(encode("user:pa:ss"))
            .decode_auth()
            .unwrap();

        assert_eq!(config.username.as_deref(), Some("user"));
        assert_eq!(config.password.as_deref(), Some("pa:ss"));
    }

    #[test]
    fn test_decode_auth_without_token_is_noop() {
        let original = AuthConfig::new()
            .with_registry_address("ghcr.io")
            .with_username("u")
            .with_password("p");

        let decoded = original.clone().decode_auth().unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_decode_auth_rejects_token_without_separator() {
        let result = AuthConfig::new()
            .with_registry_address("ghcr.io")
            .with_auth(encode("no-separator"))
            .decode_auth();

        match result {
            Err(AuthError::InvalidAuthToken { registry, .. }) => assert_eq!(registry, "ghcr.io"),
            other => panic!("expected InvalidAuthToken, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_auth_rejects_invalid_base64() {
        let result = AuthConfig::new().with_auth("!!not-base64!!").decode_auth();
        assert!(matches!(result, Err(AuthError::InvalidAuthToken { .. })));
    }

    #[test]
    fn test_is_complete() {
        let partial = AuthConfig::new().with_registry_address("r").with_username("u");
        assert!(!partial.is_complete());
        assert!(partial.with_password("p").is_complete());
    }

    #[test]
    fn test_registry_credentials_default_url() {
        let config = RegistryCredentials::new().to_auth_config();
        assert_eq!(config.registry_address.as_deref(), Some(DEFAULT_REGISTRY_URL));
        assert_eq!(config.username, None);
        assert_eq!(config.password, None);
        assert_eq!(config.email, None);
    }

    #[test]
    fn test_registry_credentials_copies_present_fields() {
        let config = RegistryCredentials::new()
            .with_url("registry.example.com")
            .with_username("alice")
            .with_email("alice@example.com")
            .to_auth_config();

        assert_eq!(config.registry_address.as_deref(), Some("registry.example.com"));
        assert_eq!(config.username.as_deref(), Some("alice"));
        assert_eq!(config.password, None);
        assert_eq!(config.email.as_deref(), Some("alice@example.com"));
    }

    #[test]
    fn test_debug_masks_secrets() {
        let config = AuthConfig::new().with_username("u").with_password("hunter2");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("***"));

        let credentials = RegistryCredentials::new().with_password("hunter2");
        assert!(!format!("{:?}", credentials).contains("hunter2"));
    }

    #[test]
    fn test_auth_config_from_auth_entry_json() {
        let json = r#"{"auth":"dTpw","email":"u@example.com","identitytoken":"tok","extra":1}"#;
        let config: AuthConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.auth.as_deref(), Some("dTpw"));
        assert_eq!(config.email.as_deref(), Some("u@example.com"));
        assert_eq!(config.identity_token.as_deref(), Some("tok"));
    }

    #[test]
    fn test_build_credentials_later_entry_wins() {
        let configs = vec![
            AuthConfig::new().with_registry_address("ghcr.io").with_username("first"),
            AuthConfig::new().with_username("no-address"),
            AuthConfig::new().with_registry_address("ghcr.io").with_username("second"),
        ];

        let map = build_credentials(&configs);
        assert_eq!(map.len(), 1);
        assert_eq!(map["ghcr.io"].username.as_deref(), Some("second"));
        assert_eq!(map["ghcr.io"].serveraddress.as_deref(), Some("ghcr.io"));
    }
}
