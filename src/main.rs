use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::Value;
use taskdesk::config::{ClientConfig, ConfigError};
use taskdesk::net::types::{Credentials, Registration, Task, TaskDraft, TaskId, TaskQuery, TaskStatus};
use taskdesk::net::{ApiClient, ApiError, HttpTransport};
use taskdesk::services::session::SessionManager;
use taskdesk::services::tasks::TaskStore;
use taskdesk::storage::FileStorage;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("http client setup failed: {0}")]
    Client(#[from] ApiError),
    #[error("{0}")]
    Failed(String),
    #[error("not logged in; run `taskdesk login` first")]
    NotLoggedIn,
    #[error("could not load profile")]
    Profile,
    #[error("token refresh failed; session cleared")]
    Refresh,
    #[error("could not fetch statistics: {0}")]
    Statistics(String),
    #[error("input read failed: {0}")]
    Input(#[from] io::Error),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "taskdesk", about = "Task manager REST client")]
struct Cli {
    #[arg(long, env = "TASKDESK_API_URL")]
    api_url: Option<String>,

    #[arg(long, env = "TASKDESK_SESSION_FILE")]
    session_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
    },
    Logout,
    /// Print the current user's profile.
    Whoami,
    Refresh,
    Tasks(TasksCommand),
}

#[derive(Args, Debug)]
struct TasksCommand {
    #[command(subcommand)]
    command: TasksSubcommand,
}

#[derive(Subcommand, Debug)]
enum TasksSubcommand {
    List(ListArgs),
    Show {
        id: TaskId,
    },
    Create(CreateArgs),
    Update {
        id: TaskId,
        #[arg(long)]
        data: String,
    },
    Delete {
        id: TaskId,
    },
    BulkUpdate {
        #[arg(required = true)]
        ids: Vec<TaskId>,
        #[arg(long)]
        data: String,
    },
    BulkDelete {
        #[arg(required = true)]
        ids: Vec<TaskId>,
    },
    BulkCreate {
        #[arg(long, default_value = "-", help = "JSONL file of task drafts, or - for stdin")]
        input: String,
    },
    Stats,
}

#[derive(Args, Debug)]
struct ListArgs {
    #[arg(long, value_parser = parse_status)]
    status: Option<TaskStatus>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    priority: Option<u8>,
    #[arg(long)]
    search: Option<String>,
    #[arg(long)]
    ordering: Option<String>,
    #[arg(long, value_enum)]
    view: Option<View>,
}

#[derive(Args, Debug)]
struct CreateArgs {
    #[arg(long)]
    title: String,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    priority: Option<u8>,
    #[arg(long, value_parser = parse_status)]
    status: Option<TaskStatus>,
    #[arg(long)]
    due_date: Option<String>,
    #[arg(long = "tag")]
    tags: Vec<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum View {
    Pending,
    InProgress,
    Completed,
    Overdue,
}

struct Stores {
    session: SessionManager,
    tasks: TaskStore,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let stores = build_stores(cli.api_url, cli.session_file)?;

    match cli.command {
        Command::Login { username, password } => {
            stores
                .session
                .login(&Credentials { username, password })
                .await
                .map_err(CliError::Failed)?;
            print_user(&stores.session)
        }
        Command::Register { username, email, password, first_name, last_name } => {
            let registration = Registration { username, email, password, first_name, last_name };
            stores
                .session
                .register(&registration)
                .await
                .map_err(CliError::Failed)?;
            print_user(&stores.session)
        }
        Command::Logout => {
            stores.session.logout().await;
            println!("logged out");
            Ok(())
        }
        Command::Whoami => {
            require_login(&stores.session)?;
            if !stores.session.load_user().await {
                return Err(CliError::Profile);
            }
            print_user(&stores.session)
        }
        Command::Refresh => {
            if !stores.session.refresh_auth().await {
                return Err(CliError::Refresh);
            }
            println!("access token refreshed");
            Ok(())
        }
        Command::Tasks(tasks) => {
            require_login(&stores.session)?;
            run_tasks(&stores.tasks, tasks.command).await
        }
    }
}

fn build_stores(api_url: Option<String>, session_file: Option<PathBuf>) -> Result<Stores, CliError> {
    let mut config = ClientConfig::from_env()?;
    if let Some(url) = api_url {
        config.api_url = url.trim_end_matches('/').to_owned();
    }
    if let Some(path) = session_file {
        config.session_file = path;
    }
    tracing::debug!(api_url = %config.api_url, session_file = %config.session_file.display(), "client config");

    let transport = HttpTransport::new(&config.api_url, config.timeouts)?;
    let api = Arc::new(ApiClient::new(Arc::new(transport)));
    let storage = Arc::new(FileStorage::new(config.session_file));

    Ok(Stores { session: SessionManager::new(api.clone(), storage), tasks: TaskStore::new(api) })
}

async fn run_tasks(store: &TaskStore, command: TasksSubcommand) -> Result<(), CliError> {
    match command {
        TasksSubcommand::List(args) => {
            let query = TaskQuery {
                status: args.status,
                category: args.category,
                priority: args.priority,
                search: args.search,
                ordering: args.ordering,
            };
            store.fetch_tasks_with(&query).await.map_err(CliError::Failed)?;
            let tasks = match args.view {
                None => store.tasks(),
                Some(View::Pending) => store.pending_tasks(),
                Some(View::InProgress) => store.in_progress_tasks(),
                Some(View::Completed) => store.completed_tasks(),
                Some(View::Overdue) => store.overdue_tasks(),
            };
            print_tasks(&tasks)
        }
        TasksSubcommand::Show { id } => {
            let task = store.fetch_task(&id).await.map_err(CliError::Failed)?;
            print_json(&serde_json::to_value(task)?)
        }
        TasksSubcommand::Create(args) => {
            let draft = TaskDraft {
                title: Some(args.title),
                description: args.description,
                category: args.category,
                priority: args.priority,
                status: args.status,
                due_date: args.due_date,
                tags: args.tags,
            };
            let task = store.create_task(&draft).await.map_err(CliError::Failed)?;
            print_json(&serde_json::to_value(task)?)
        }
        TasksSubcommand::Update { id, data } => {
            let body = serde_json::from_str::<Value>(&data)?;
            let task = store.update_task(&id, &body).await.map_err(CliError::Failed)?;
            print_json(&serde_json::to_value(task)?)
        }
        TasksSubcommand::Delete { id } => {
            store.delete_task(&id).await.map_err(CliError::Failed)?;
            println!("deleted {id}");
            Ok(())
        }
        TasksSubcommand::BulkUpdate { ids, data } => {
            let body = serde_json::from_str::<Value>(&data)?;
            store.bulk_update_tasks(&ids, &body).await.map_err(CliError::Failed)?;
            if let Some(message) = store.error() {
                eprintln!("warning: updated, but the list could not be reloaded: {message}");
            }
            print_tasks(&store.tasks())
        }
        TasksSubcommand::BulkDelete { ids } => {
            store.bulk_delete_tasks(&ids).await.map_err(CliError::Failed)?;
            println!("deleted {} task(s)", ids.len());
            Ok(())
        }
        TasksSubcommand::BulkCreate { input } => {
            let drafts = read_jsonl(&input)?;
            let created = store.bulk_create_tasks(&drafts).await.map_err(CliError::Failed)?;
            print_tasks(&created)
        }
        TasksSubcommand::Stats => match store.get_task_statistics().await {
            Some(stats) => print_json(&stats),
            None => Err(CliError::Statistics(store.error().unwrap_or_default())),
        },
    }
}

fn require_login(session: &SessionManager) -> Result<(), CliError> {
    if session.is_authenticated() { Ok(()) } else { Err(CliError::NotLoggedIn) }
}

fn parse_status(raw: &str) -> Result<TaskStatus, String> {
    match raw {
        "pending" => Ok(TaskStatus::Pending),
        "in_progress" | "in-progress" => Ok(TaskStatus::InProgress),
        "completed" => Ok(TaskStatus::Completed),
        other => Err(format!("unknown status `{other}` (expected pending, in_progress or completed)")),
    }
}

/// One JSON object per non-blank line.
fn read_jsonl(input: &str) -> Result<Vec<Value>, CliError> {
    let reader: Box<dyn BufRead> = if input == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        Box::new(BufReader::new(File::open(input)?))
    };

    let mut drafts = Vec::new();
    for line in reader.lines() {
        if let Some(draft) = parse_jsonl_line(&line?)? {
            drafts.push(draft);
        }
    }
    Ok(drafts)
}

fn parse_jsonl_line(line: &str) -> Result<Option<Value>, CliError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let value = serde_json::from_str::<Value>(trimmed)?;
    Ok(value.is_object().then_some(value))
}

fn print_user(session: &SessionManager) -> Result<(), CliError> {
    let user = session.user().map_or(Value::Null, |user| user.as_value().clone());
    print_json(&user)
}

fn print_tasks(tasks: &[Task]) -> Result<(), CliError> {
    print_json(&serde_json::to_value(tasks)?)
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
