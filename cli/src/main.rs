use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use userdir::{ClientConfig, ConfigError, User, UserCreationParams, UserManager, UserManagerError, UserUpdateParams};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("transport setup failed: {0}")]
    Setup(#[from] userdir::TransportError),
    #[error(transparent)]
    Manager(#[from] UserManagerError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "userdir", about = "User directory CLI (rate-limited, one request per interval)")]
struct Cli {
    #[arg(long, env = "USERDIR_APP_ID")]
    app_id: Option<String>,

    #[arg(long, env = "USERDIR_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// Service root; derived from the app id when omitted.
    #[arg(long, env = "USERDIR_BASE_URL")]
    base_url: Option<String>,

    /// Minimum gap between requests (default 1000).
    #[arg(long, env = "USERDIR_MIN_INTERVAL_MS")]
    min_interval_ms: Option<u64>,

    /// Per-request timeout (default 30).
    #[arg(long, env = "USERDIR_REQUEST_TIMEOUT_SECS")]
    request_timeout_secs: Option<u64>,

    /// Connect timeout (default 10).
    #[arg(long, env = "USERDIR_CONNECT_TIMEOUT_SECS")]
    connect_timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create one user.
    Create(CreateArgs),
    /// Create up to ten users, one per nickname, with generated ids.
    CreateBatch {
        #[arg(long = "nickname", required = true)]
        nicknames: Vec<String>,
        #[arg(long)]
        profile_url: Option<String>,
    },
    /// Update a user's nickname and/or profile URL.
    Update {
        user_id: String,
        #[arg(long)]
        nickname: Option<String>,
        #[arg(long)]
        profile_url: Option<String>,
    },
    /// Fetch one user by id.
    Get { user_id: String },
    /// Fetch users by exact nickname.
    Find { nickname: String },
}

#[derive(Args, Debug)]
struct CreateArgs {
    /// User id; a random UUID when omitted.
    #[arg(long)]
    user_id: Option<String>,
    #[arg(long)]
    nickname: Option<String>,
    #[arg(long)]
    profile_url: Option<String>,
}

impl Cli {
    /// Resolved flag-or-env value for a `USERDIR_*` setting.
    fn setting(&self, key: &str) -> Option<String> {
        match key {
            "USERDIR_APP_ID" => self.app_id.clone(),
            "USERDIR_API_TOKEN" => self.api_token.clone(),
            "USERDIR_BASE_URL" => self.base_url.clone(),
            "USERDIR_MIN_INTERVAL_MS" => self.min_interval_ms.map(|v| v.to_string()),
            "USERDIR_REQUEST_TIMEOUT_SECS" => self.request_timeout_secs.map(|v| v.to_string()),
            "USERDIR_CONNECT_TIMEOUT_SECS" => self.connect_timeout_secs.map(|v| v.to_string()),
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = ClientConfig::from_lookup(|key| cli.setting(key))?;
    let manager = UserManager::from_config(&config)?;

    match cli.command {
        Command::Create(args) => run_create(&manager, args).await,
        Command::CreateBatch { nicknames, profile_url } => run_create_batch(&manager, nicknames, profile_url).await,
        Command::Update { user_id, nickname, profile_url } => {
            let params = UserUpdateParams { user_id, nickname, profile_url };
            let user = manager.update_user(&params).await?;
            print_user(&user)
        }
        Command::Get { user_id } => {
            let user = manager.get_user(&user_id).await?;
            print_user(&user)
        }
        Command::Find { nickname } => {
            let users = manager.get_users(&nickname).await?;
            print_json(&serde_json::to_value(&users)?)
        }
    }
}

async fn run_create(manager: &UserManager, args: CreateArgs) -> Result<(), CliError> {
    let params = UserCreationParams {
        user_id: args.user_id.unwrap_or_else(new_user_id),
        nickname: args.nickname,
        profile_url: args.profile_url,
    };
    let user = manager.create_user(&params).await?;
    print_user(&user)
}

async fn run_create_batch(
    manager: &UserManager,
    nicknames: Vec<String>,
    profile_url: Option<String>,
) -> Result<(), CliError> {
    let params: Vec<_> = nicknames
        .into_iter()
        .map(|nickname| UserCreationParams {
            user_id: new_user_id(),
            nickname: Some(nickname),
            profile_url: profile_url.clone(),
        })
        .collect();

    match manager.create_users(&params).await {
        Ok(users) => print_json(&serde_json::to_value(&users)?),
        Err(UserManagerError::PartialSuccess { users, errors }) => {
            print_json(&serde_json::to_value(&users)?)?;
            for error in &errors {
                eprintln!("failed: {error}");
            }
            Err(UserManagerError::PartialSuccess { users, errors }.into())
        }
        Err(e) => Err(e.into()),
    }
}

fn new_user_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn print_user(user: &User) -> Result<(), CliError> {
    print_json(&serde_json::to_value(user)?)
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_flow_into_client_config() {
        let cli = Cli::try_parse_from([
            "userdir",
            "--app-id",
            "APP",
            "--api-token",
            "tok",
            "--base-url",
            "http://localhost:9000/v3/",
            "--min-interval-ms",
            "250",
            "--request-timeout-secs",
            "5",
            "--connect-timeout-secs",
            "2",
            "get",
            "u1",
        ])
        .unwrap();

        let config = ClientConfig::from_lookup(|key| cli.setting(key)).unwrap();

        assert_eq!(config.app_id, "APP");
        assert_eq!(config.base_url.as_deref(), Some("http://localhost:9000/v3"));
        assert_eq!(config.min_interval, std::time::Duration::from_millis(250));
        assert_eq!(config.timeouts.request_secs, 5);
        assert_eq!(config.timeouts.connect_secs, 2);
    }

    #[test]
    fn missing_app_id_is_a_config_error() {
        let cli = Cli::try_parse_from(["userdir", "--api-token", "tok", "find", "nick"]).unwrap();
        let err = ClientConfig::from_lookup(|key| cli.setting(key)).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { var: "USERDIR_APP_ID" }));
    }
}
