//! レジストリ認証情報の解決
//!
//! ビルドで宣言された認証情報、Docker config.json の `auths`、
//! `credHelpers`、`credsStore` の順に認証情報を探します。

use crate::config::{DockerConfigFile, default_config_path};
use crate::error::{LookupFailure, Result};
use crate::helper::{
    CommandRunner, CredentialHelper, DEFAULT_HELPER_PREFIX, DEFAULT_HELPER_SUFFIX,
    SystemCommandRunner,
};
use crate::model::{AuthConfig, RegistryCredentials};
use crate::reference;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::Dispatch;

/// レジストリ認証情報を解決するロケーター
///
/// config.json は呼び出しのたびに読み直す（キャッシュしない）。
pub struct RegistryAuthLocator {
    config_file: PathBuf,
    command_path_prefix: String,
    helper_suffix: String,
    runner: Box<dyn CommandRunner>,
    logger: Option<Dispatch>,
}

impl Default for RegistryAuthLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RegistryAuthLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryAuthLocator")
            .field("config_file", &self.config_file)
            .field("command_path_prefix", &self.command_path_prefix)
            .field("helper_suffix", &self.helper_suffix)
            .finish_non_exhaustive()
    }
}

impl RegistryAuthLocator {
    /// 新しい RegistryAuthLocator を作成
    ///
    /// デフォルトで `$DOCKER_CONFIG/config.json` または ~/.docker/config.json を使用
    pub fn new() -> Self {
        Self::with_config(default_config_path())
    }

    /// 指定したパスの config.json を使用
    pub fn with_config(config_file: impl Into<PathBuf>) -> Self {
        Self::with_config_and_command(config_file, DEFAULT_HELPER_PREFIX, DEFAULT_HELPER_SUFFIX)
    }

    /// config.json と credential helper のコマンド名の前後を指定
    pub fn with_config_and_command(
        config_file: impl Into<PathBuf>,
        command_path_prefix: impl Into<String>,
        helper_suffix: impl Into<String>,
    ) -> Self {
        Self {
            config_file: config_file.into(),
            command_path_prefix: command_path_prefix.into(),
            helper_suffix: helper_suffix.into(),
            runner: Box::new(SystemCommandRunner),
            logger: None,
        }
    }

    /// credential helper の実行方法を差し替える
    pub fn with_runner(mut self, runner: impl CommandRunner + 'static) -> Self {
        self.runner = Box::new(runner);
        self
    }

    /// ログ出力先を指定
    pub fn with_logger(mut self, logger: Dispatch) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn set_logger(&mut self, logger: Dispatch) {
        self.logger = Some(logger);
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// イメージをプッシュ/プルするための認証情報を取得
    ///
    /// ビルドで宣言された認証情報が揃っていればそれをそのまま返す。
    /// 揃っていなければ config.json から探し、見つからなければ
    /// 宣言された（不完全な）認証情報を返す。
    pub fn lookup_auth_config(
        &self,
        image: &str,
        credentials: &RegistryCredentials,
    ) -> Result<AuthConfig> {
        self.with_logging(|| {
            let default_config = credentials.to_auth_config();

            if default_config.is_complete() {
                tracing::debug!(
                    "Using registry credentials provided by the build for {}",
                    image
                );
                return Ok(default_config);
            }

            self.lookup_with_fallback(image, default_config)
        })
    }

    /// config.json のみから認証情報を取得（見つからなければ空の AuthConfig）
    pub fn lookup_auth_config_with_default(&self, image: &str) -> Result<AuthConfig> {
        self.with_logging(|| self.lookup_with_fallback(image, AuthConfig::default()))
    }

    /// レジストリの認証情報を config.json から探す
    ///
    /// # Returns
    /// * `Ok(Some(config))` - 認証情報が見つかった場合
    /// * `Ok(None)` - config.json が無い、該当エントリが無い、または読み込みや helper の実行に失敗した場合
    /// * `Err(e)` - `auth` トークンが壊れている場合
    pub fn lookup_auth_config_for_registry(&self, registry: &str) -> Result<Option<AuthConfig>> {
        self.with_logging(|| self.lookup_for_registry(registry))
    }

    /// config.json から分かる全レジストリの認証情報を取得
    ///
    /// `additional` が揃った認証情報なら末尾に追加する（重複は除去しない）。
    pub fn lookup_all_auth_configs(
        &self,
        additional: Option<&AuthConfig>,
    ) -> Result<Vec<AuthConfig>> {
        self.with_logging(|| {
            let mut configs = self.lookup_discovered()?;

            if let Some(extra) = additional
                && extra.is_complete()
            {
                configs.push(extra.clone());
            }

            Ok(configs)
        })
    }

    /// ビルドで宣言された認証情報を加えて全レジストリの認証情報を取得
    pub fn lookup_all_auth_configs_with_credentials(
        &self,
        credentials: &RegistryCredentials,
    ) -> Result<Vec<AuthConfig>> {
        self.lookup_all_auth_configs(Some(&credentials.to_auth_config()))
    }

    /// イメージ名からレジストリを抽出
    ///
    /// # Examples
    /// - `ghcr.io/org/app:tag` -> `ghcr.io`
    /// - `myuser/app:tag` -> `https://index.docker.io/v1/`
    /// - `localhost:5000/app` -> `localhost:5000`
    pub fn get_registry(&self, image: &str) -> Result<String> {
        reference::registry_of(image)
    }

    fn with_logging<T>(&self, f: impl FnOnce() -> T) -> T {
        match &self.logger {
            Some(logger) => tracing::dispatcher::with_default(logger, f),
            None => f(),
        }
    }

    fn lookup_with_fallback(&self, image: &str, default_config: AuthConfig) -> Result<AuthConfig> {
        let registry = self.get_registry(image)?;
        Ok(self
            .lookup_for_registry(&registry)?
            .unwrap_or(default_config))
    }

    fn log_configuration(&self) {
        tracing::debug!(
            "Docker config file: {} ({}), credential helper prefix: {}",
            self.config_file.display(),
            if self.config_file.exists() {
                "exists"
            } else {
                "does not exist"
            },
            self.command_path_prefix
        );
    }

    fn lookup_for_registry(&self, registry: &str) -> Result<Option<AuthConfig>> {
        tracing::debug!("Looking up auth config for registry: {}", registry);
        self.log_configuration();

        // config.json が存在しない場合は認証なしで続行
        if !self.config_file.is_file() {
            return Ok(None);
        }

        match self.try_lookup(registry) {
            Ok(found) => Ok(found),
            Err(LookupFailure::Auth(e)) => Err(e),
            Err(failure) => {
                tracing::error!(
                    "Failed to look up auth config (registry: {}, config file: {}), \
                     falling back to defaults: {}",
                    registry,
                    self.config_file.display(),
                    failure
                );
                Ok(None)
            }
        }
    }

    fn try_lookup(&self, registry: &str) -> std::result::Result<Option<AuthConfig>, LookupFailure> {
        let config = DockerConfigFile::load(&self.config_file)?;

        // 1. auths セクションを確認
        if let Some(existing) = self.find_existing_auth_config(&config, registry) {
            return Ok(Some(existing.decode_auth()?));
        }

        // 2. credHelpers を確認
        if let Some(from_helper) = self.auth_config_using_helper(&config, registry)? {
            return Ok(Some(from_helper.decode_auth()?));
        }

        // 3. credsStore を確認
        if let Some(from_store) = self.auth_config_using_store(&config, registry)? {
            return Ok(Some(from_store.decode_auth()?));
        }

        tracing::debug!("No credentials found for {}", registry);
        Ok(None)
    }

    fn find_existing_auth_config(
        &self,
        config: &DockerConfigFile,
        registry: &str,
    ) -> Option<AuthConfig> {
        let found = config.find_auth_entry(registry).and_then(|(key, entry)| {
            let fields = entry.as_object().filter(|fields| !fields.is_empty())?;
            match serde_json::from_value::<AuthConfig>(serde_json::Value::Object(fields.clone())) {
                Ok(auth_config) => Some(auth_config.with_registry_address(key)),
                Err(e) => {
                    tracing::debug!("Failure parsing the auth entry for {}: {}", key, e);
                    None
                }
            }
        });

        if found.is_none() {
            tracing::debug!("No existing AuthConfig found");
        }
        found
    }

    fn auth_config_using_helper(
        &self,
        config: &DockerConfigFile,
        registry: &str,
    ) -> std::result::Result<Option<AuthConfig>, LookupFailure> {
        match config.cred_helper(registry) {
            Some(helper) => self.run_credential_provider(registry, helper),
            None => {
                tracing::debug!("No helper found in the credHelpers section");
                Ok(None)
            }
        }
    }

    fn auth_config_using_store(
        &self,
        config: &DockerConfigFile,
        registry: &str,
    ) -> std::result::Result<Option<AuthConfig>, LookupFailure> {
        match config.creds_store() {
            Some(store) => self.run_credential_provider(registry, store),
            None => {
                tracing::debug!("No helper found in the credsStore section");
                Ok(None)
            }
        }
    }

    fn credential_helper(&self, name: &str) -> CredentialHelper<'_> {
        CredentialHelper::new(
            &self.command_path_prefix,
            name,
            &self.helper_suffix,
            self.runner.as_ref(),
        )
    }

    fn run_credential_provider(
        &self,
        registry: &str,
        helper_name: &str,
    ) -> std::result::Result<Option<AuthConfig>, LookupFailure> {
        let helper = self.credential_helper(helper_name);
        tracing::debug!(
            "Executing docker credential helper: {} to locate auth config for: {}",
            helper.command(),
            registry
        );

        let Some(reply) = helper.get(registry)? else {
            return Ok(None);
        };

        tracing::debug!("Credential helper provided auth config for: {}", registry);
        Ok(Some(reply.into_auth_config(registry)))
    }

    fn lookup_discovered(&self) -> Result<Vec<AuthConfig>> {
        self.log_configuration();

        if !self.config_file.is_file() {
            return Ok(Vec::new());
        }

        let addresses = match self.discover_registry_addresses() {
            Ok(addresses) => addresses,
            Err(LookupFailure::Auth(e)) => return Err(e),
            Err(failure) => {
                tracing::error!(
                    "Failed to look up auth configs (config file: {}), \
                     falling back to defaults: {}",
                    self.config_file.display(),
                    failure
                );
                return Ok(Vec::new());
            }
        };

        let mut configs = Vec::new();
        for address in &addresses {
            if let Some(found) = self.lookup_for_registry(address)? {
                configs.push(found);
            }
        }
        Ok(configs)
    }

    /// auths・credHelpers・credsStore の list からレジストリアドレスを集める
    fn discover_registry_addresses(
        &self,
    ) -> std::result::Result<BTreeSet<String>, LookupFailure> {
        let config = DockerConfigFile::load(&self.config_file)?;
        let mut addresses = BTreeSet::new();

        let from_auths = config.auth_addresses();
        tracing::debug!("Found registries in docker auths section: {:?}", from_auths);
        addresses.extend(from_auths);

        let from_helpers = config.cred_helper_addresses();
        tracing::debug!(
            "Found registries in docker credHelpers section: {:?}",
            from_helpers
        );
        addresses.extend(from_helpers);

        if let Some(store) = config.creds_store() {
            let helper = self.credential_helper(store);
            tracing::debug!(
                "Executing docker credential helper: {} to locate auth configs",
                helper.command()
            );
            let from_store = helper.list()?;
            tracing::debug!(
                "Found registries in docker credential helper: {:?}",
                from_store
            );
            addresses.extend(from_store);
        }

        Ok(addresses)
    }
}
