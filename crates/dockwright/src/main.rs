mod commands;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use dockwright_auth::{
    DEFAULT_HELPER_PREFIX, DEFAULT_HELPER_SUFFIX, DEFAULT_REGISTRY_URL, RegistryAuthLocator,
    RegistryCredentials, default_config_path,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dockwright")]
#[command(version)]
#[command(about = "Docker registry credentials for image push, pull and build", long_about = None)]
struct Cli {
    /// Docker CLI の config.json（省略時は $DOCKER_CONFIG/config.json か ~/.docker/config.json）
    #[arg(long, global = true, value_name = "PATH")]
    docker_config: Option<PathBuf>,

    /// credential helper のコマンド接頭辞
    #[arg(long, global = true, default_value = DEFAULT_HELPER_PREFIX)]
    helper_prefix: String,

    /// credential helper のコマンド接尾辞（Windows なら .exe など）
    #[arg(long, global = true, default_value = DEFAULT_HELPER_SUFFIX)]
    helper_suffix: String,

    /// デバッグログを表示
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// ビルド側で宣言するレジストリ認証情報
#[derive(Args, Debug)]
pub struct CredentialArgs {
    /// レジストリ URL
    #[arg(long, env = "DOCKWRIGHT_REGISTRY_URL", default_value = DEFAULT_REGISTRY_URL)]
    registry_url: String,
    #[arg(long, env = "DOCKWRIGHT_REGISTRY_USERNAME")]
    username: Option<String>,
    #[arg(long, env = "DOCKWRIGHT_REGISTRY_PASSWORD", hide_env_values = true)]
    password: Option<String>,
    #[arg(long, env = "DOCKWRIGHT_REGISTRY_EMAIL")]
    email: Option<String>,
}

impl CredentialArgs {
    fn to_credentials(&self) -> RegistryCredentials {
        RegistryCredentials {
            url: self.registry_url.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            email: self.email.clone(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// イメージ名からレジストリを表示
    Registry {
        /// イメージ名 (例: ghcr.io/org/app:v1)
        image: String,
    },
    /// イメージに使われる認証情報を表示（パスワードは伏せる）
    Auth {
        image: String,
        #[command(flatten)]
        credentials: CredentialArgs,
    },
    /// config.json から分かる全レジストリの認証情報を表示
    AuthAll {
        #[command(flatten)]
        credentials: CredentialArgs,
    },
    /// イメージをレジストリにプッシュ
    Push {
        images: Vec<String>,
        #[command(flatten)]
        credentials: CredentialArgs,
    },
    /// イメージをプル
    Pull {
        image: String,
        /// プラットフォーム (例: linux/arm64)
        #[arg(long)]
        platform: Option<String>,
        #[command(flatten)]
        credentials: CredentialArgs,
    },
    /// イメージをビルド
    Build {
        /// ビルドコンテキスト
        #[arg(long, default_value = ".")]
        context: PathBuf,
        /// Dockerfile のパス（省略時は <context>/Dockerfile）
        #[arg(long)]
        dockerfile: Option<PathBuf>,
        /// イメージタグ（複数指定可）
        #[arg(short, long = "tag", required = true)]
        tags: Vec<String>,
        /// ビルド引数 (KEY=VALUE)
        #[arg(long = "build-arg", value_name = "KEY=VALUE")]
        build_args: Vec<String>,
        /// マルチステージビルドのターゲット
        #[arg(long)]
        target: Option<String>,
        #[arg(long)]
        platform: Option<String>,
        /// キャッシュを使わない
        #[arg(long)]
        no_cache: bool,
        /// ベースイメージを常に pull
        #[arg(long)]
        pull: bool,
        /// ビルドしたイメージ ID の書き込み先
        #[arg(long, value_name = "PATH")]
        image_id_file: Option<PathBuf>,
        #[command(flatten)]
        credentials: CredentialArgs,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("{} {}", "✗".red().bold(), commands::error_message(&e).red());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_file = cli.docker_config.unwrap_or_else(default_config_path);
    let locator =
        RegistryAuthLocator::with_config_and_command(config_file, cli.helper_prefix, cli.helper_suffix);

    match cli.command {
        Commands::Registry { image } => commands::registry(&locator, &image),
        Commands::Auth { image, credentials } => {
            commands::auth(&locator, &image, &credentials.to_credentials())
        }
        Commands::AuthAll { credentials } => {
            commands::auth_all(&locator, &credentials.to_credentials())
        }
        Commands::Push {
            images,
            credentials,
        } => commands::push(locator, &images, &credentials.to_credentials()).await,
        Commands::Pull {
            image,
            platform,
            credentials,
        } => {
            commands::pull(
                locator,
                &image,
                platform.as_deref(),
                &credentials.to_credentials(),
            )
            .await
        }
        Commands::Build {
            context,
            dockerfile,
            tags,
            build_args,
            target,
            platform,
            no_cache,
            pull,
            image_id_file,
            credentials,
        } => {
            let request = dockwright_build::BuildRequest {
                context,
                dockerfile,
                tags,
                build_args: commands::parse_build_args(&build_args)?,
                target,
                platform,
                no_cache,
                pull,
                credentials: credentials.to_credentials(),
                image_id_file: image_id_file.map(Into::into),
            };
            commands::build(locator, &request).await
        }
    }
}
