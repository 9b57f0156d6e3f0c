use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, ValueEnum)]
pub enum StoreKind {
    Json,
    Sqlite,
}

#[derive(Debug, Parser, Clone)]
#[command(name = "lingua", version, about = "Lingua flashcard scheduler and progress tracker")]
pub struct Cli {
    /// Storage backend
    #[arg(long, value_enum, env = "LINGUA_STORE", default_value_t = StoreKind::Json)]
    pub store: StoreKind,

    /// JSON store file when --store json (defaults to app data dir)
    #[arg(long, env = "LINGUA_JSON_PATH")]
    pub json_path: Option<PathBuf>,

    /// SQLite DB path when --store sqlite (defaults to app data dir)
    #[arg(long, env = "LINGUA_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// User the CLI acts as
    #[arg(long, env = "LINGUA_USER", default_value = "local")]
    pub user: String,

    /// Attempts per operation when a concurrent write is detected
    #[arg(long, env = "LINGUA_MAX_ATTEMPTS", default_value_t = 3)]
    pub max_attempts: u32,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Flashcard operations
    #[command(subcommand)]
    Card(CardCmd),
    /// List cards due for review now
    Due,
    /// Grade a review: again, hard, good or easy
    Review { card_id: String, grade: String },
    /// Record study activity for a language
    Activity(ActivityCmd),
    /// Show the current streak
    Streak,
    /// Show per-language progress
    Progress { language: Option<String> },
    /// Show learning statistics
    Stats,
    /// Export data
    #[command(subcommand)]
    Export(ExportCmd),
    /// Launch Axum HTTP API
    Api(ApiCmd),
}

#[derive(Debug, Subcommand, Clone)]
pub enum CardCmd {
    Add { vocabulary_id: String },
    List,
    Rm { card_id: String },
}

#[derive(Debug, Args, Clone)]
pub struct ActivityCmd {
    pub language: String,
    /// Minutes spent
    #[arg(long, allow_negative_numbers = true)]
    pub minutes: Option<i64>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum ExportCmd {
    Json { path: PathBuf },
    Csv { path: PathBuf },
}

#[derive(Debug, Args, Clone)]
pub struct ApiCmd {
    /// Bind address (host:port)
    #[arg(long, env = "LINGUA_ADDR", default_value = "127.0.0.1:8080")]
    pub addr: String,
}
