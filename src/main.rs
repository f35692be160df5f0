use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use clipfeed::config::Config;
use clipfeed::engine::{
    self, Action, Direction, Effect, FeedController, FeedInput, KindFilter, LoadState, Presenter,
    ScrollProximity,
};
use clipfeed::storage::{Database, DatabaseError, NewRecord};
use clipfeed::store::{ImageDimensions, Record, RecordKind, RecordStore, StoreError};
use clipfeed::util::{human_size, preview};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Rows the browse view shows around the selection.
const VIEWPORT_ROWS: usize = 10;

/// Columns reserved for a record preview in listings.
const PREVIEW_WIDTH: usize = 60;

/// Get the config directory path (~/.config/clipfeed/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("clipfeed"))
}

#[derive(Parser, Debug)]
#[command(name = "clipfeed", about = "Clipboard history feed over SQLite")]
struct Cli {
    /// Config file (defaults to ~/.config/clipfeed/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// History database (overrides `database_path` from the config)
    #[arg(long, global = true, value_name = "FILE")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store a clipboard capture
    Add(AddArgs),
    /// Print the newest records
    List {
        /// Case-insensitive substring over text and file records
        #[arg(long)]
        keyword: Option<String>,
        /// all, text, image, file or favorite
        #[arg(long, default_value = "all")]
        kind: KindFilter,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Toggle the favorite flag of a record
    Favorite { id: i64 },
    /// Choose a record and print its value
    Choose { id: i64 },
    /// Delete all history except the newest record
    Clear,
    /// Interactive line-driven session over the feed engine
    Browse,
}

#[derive(Args, Debug)]
struct AddArgs {
    #[arg(long, default_value = "text")]
    kind: RecordKind,
    value: String,
    #[arg(long)]
    thumbnail: Option<String>,
    /// Size in bytes (files default to their size on disk)
    #[arg(long)]
    size: Option<u64>,
    #[arg(long, requires = "height")]
    width: Option<u32>,
    #[arg(long, requires = "width")]
    height: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so `list --json` and `choose` stay pipeable.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_dir = get_config_dir()?;
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let db_path = match cli.db.clone().or_else(|| config.database_path.clone()) {
        Some(path) => path,
        None => {
            if !config_dir.exists() {
                std::fs::create_dir_all(&config_dir)
                    .context("Failed to create config directory")?;
            }
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let perms = std::fs::Permissions::from_mode(0o700);
                if let Err(e) = std::fs::set_permissions(&config_dir, perms) {
                    tracing::warn!(
                        path = %config_dir.display(),
                        error = %e,
                        "Failed to set config directory permissions to 0700"
                    );
                }
            }
            config_dir.join("history.db")
        }
    };

    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!("Error: {}", DatabaseError::InstanceLocked);
            std::process::exit(1);
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to open database: {}", e)),
    };

    match cli.command {
        Command::Add(args) => add(&db, args).await,
        Command::List {
            keyword,
            kind,
            limit,
            json,
        } => list(&db, keyword.as_deref().unwrap_or(""), kind, limit, json).await,
        Command::Favorite { id } => {
            match db
                .toggle_favorite(id)
                .await
                .context("Failed to toggle favorite")?
            {
                Some(true) => println!("{} is now a favorite", id),
                Some(false) => println!("{} is no longer a favorite", id),
                None => anyhow::bail!("No record with id {}", id),
            }
            Ok(())
        }
        Command::Choose { id } => choose(&db, id).await,
        Command::Clear => {
            let removed = db.clear_history().await.context("Failed to clear history")?;
            println!("Removed {} records", removed);
            Ok(())
        }
        Command::Browse => browse(db, &config).await,
    }
}

// ============================================================================
// One-shot Commands
// ============================================================================

async fn add(db: &Database, args: AddArgs) -> Result<()> {
    let dimensions = match (args.width, args.height) {
        (Some(width), Some(height)) => Some(ImageDimensions { width, height }),
        _ => None,
    };
    let size = match (args.size, args.kind) {
        (Some(size), _) => Some(size),
        (None, RecordKind::File) => tokio::fs::metadata(&args.value).await.ok().map(|m| m.len()),
        (None, RecordKind::Text) => Some(args.value.len() as u64),
        (None, RecordKind::Image) => None,
    };
    let record = NewRecord {
        kind: args.kind,
        value: args.value,
        thumbnail: args.thumbnail,
        size,
        image_dimensions: dimensions,
    };
    let id = db.add_record(&record).await.context("Failed to add record")?;
    println!("{}", id);
    Ok(())
}

async fn list(db: &Database, keyword: &str, kind: KindFilter, limit: usize, json: bool) -> Result<()> {
    let filter = engine::Filter::new(keyword, kind);
    let cursor = engine::Cursor {
        limit: limit.max(1),
        ..engine::Cursor::first_page(&filter, limit)
    };
    let records = db
        .query_records(&cursor)
        .await
        .context("Failed to query records")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }
    if records.is_empty() {
        println!("No records.");
    }
    for record in &records {
        println!("{}", format_row(record, false));
    }
    Ok(())
}

async fn choose(db: &Database, id: i64) -> Result<()> {
    let Some(record) = db.get_record(id).await.context("Failed to load record")? else {
        eprintln!("missing: no record with id {}", id);
        std::process::exit(1);
    };
    match RecordStore::activate(db, &record).await {
        Ok(()) => {
            println!("{}", record.value);
            Ok(())
        }
        Err(StoreError::NotFound(_)) => {
            eprintln!("missing: {} no longer exists", record.value);
            std::process::exit(1);
        }
        Err(e) => Err(e).context("Failed to choose record"),
    }
}

fn format_row(record: &Record, selected: bool) -> String {
    let marker = if selected { '>' } else { ' ' };
    let star = if record.favorite { '*' } else { ' ' };
    let body = match record.kind {
        RecordKind::Image => match record.image_dimensions {
            Some(d) => format!("[image {}x{}]", d.width, d.height),
            None => "[image]".to_string(),
        },
        _ => preview(&record.value, PREVIEW_WIDTH),
    };
    let size = record.size.map(human_size).unwrap_or_default();
    let missing = if record.soft_deleted { " (missing)" } else { "" };
    format!(
        "{}{} {:>6} {:<5} {}{} {}",
        marker,
        star,
        record.id,
        record.kind.as_str(),
        body,
        missing,
        size
    )
}

// ============================================================================
// Browse Session
// ============================================================================

async fn browse(db: Database, config: &Config) -> Result<()> {
    let store: Arc<dyn RecordStore> = Arc::new(db.clone());
    let (mut controller, events) = FeedController::new(store, config.engine_settings());
    let (input_tx, input_rx) = mpsc::channel::<FeedInput>(32);

    println!("Commands: /KEYWORD  :KIND  j k g G  click ID  enter  f  more  focus  clear  esc  q");

    let reader_tx = input_tx.clone();
    let reader = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut keyword = String::new();
        let mut kind = KindFilter::All;
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read stdin");
                    break;
                }
            };
            let input = match parse_command(line.trim(), &mut keyword, &mut kind) {
                Ok(Some(ParsedCommand::Input(input))) => input,
                Ok(Some(ParsedCommand::ClearHistory)) => {
                    if let Err(e) = db.clear_history().await {
                        eprintln!("Failed to clear history: {}", e);
                        continue;
                    }
                    FeedInput::HistoryCleared
                }
                Ok(None) => continue,
                Err(message) => {
                    eprintln!("{}", message);
                    continue;
                }
            };
            if reader_tx.send(input).await.is_err() {
                break;
            }
        }
    });

    let mut presenter = LinePresenter::new(input_tx);
    let result = engine::run(&mut controller, events, input_rx, &mut presenter).await;
    reader.abort();
    result
}

enum ParsedCommand {
    Input(FeedInput),
    ClearHistory,
}

/// Translate one stdin line into an engine input.
///
/// `keyword` and `kind` hold the filter typed so far, since `/` and `:`
/// each change only one half of it.
fn parse_command(
    line: &str,
    keyword: &mut String,
    kind: &mut KindFilter,
) -> Result<Option<ParsedCommand>, String> {
    let set_filter = |keyword: &str, kind: KindFilter| {
        Some(ParsedCommand::Input(FeedInput::SetFilter {
            keyword: keyword.to_string(),
            kind,
        }))
    };

    if let Some(rest) = line.strip_prefix('/') {
        *keyword = rest.to_string();
        return Ok(set_filter(keyword.as_str(), *kind));
    }
    if let Some(rest) = line.strip_prefix(':') {
        *kind = rest.trim().parse()?;
        if *kind == KindFilter::Kind(RecordKind::Image) {
            keyword.clear();
        }
        return Ok(set_filter(keyword.as_str(), *kind));
    }
    if let Some(rest) = line.strip_prefix("click ") {
        let id = rest
            .trim()
            .parse::<i64>()
            .map_err(|e| format!("Invalid record id '{}': {}", rest.trim(), e))?;
        return Ok(Some(ParsedCommand::Input(FeedInput::Press(id))));
    }

    let input = match line {
        "" => return Ok(None),
        "j" => FeedInput::Move(Direction::Next),
        "k" => FeedInput::Move(Direction::Prev),
        "g" => FeedInput::First,
        "G" => FeedInput::Last,
        "enter" => FeedInput::ActivateSelected,
        "f" => FeedInput::ToggleFavoriteSelected,
        "more" => FeedInput::LoadMore,
        "focus" => FeedInput::FocusRegained,
        "esc" => FeedInput::Cancel,
        "q" => FeedInput::Quit,
        "clear" => return Ok(Some(ParsedCommand::ClearHistory)),
        other => return Err(format!("Unknown command '{}'", other)),
    };
    Ok(Some(ParsedCommand::Input(input)))
}

/// Prints the visible rows whenever the window or selection changes.
struct LinePresenter {
    inputs: mpsc::Sender<FeedInput>,
    last_frame: Option<String>,
}

impl LinePresenter {
    fn new(inputs: mpsc::Sender<FeedInput>) -> Self {
        Self {
            inputs,
            last_frame: None,
        }
    }

    fn render(controller: &FeedController) -> String {
        let records = controller.records();
        let selected = controller.selected_index();
        let start = selected
            .unwrap_or(0)
            .saturating_sub(VIEWPORT_ROWS / 2)
            .min(records.len().saturating_sub(VIEWPORT_ROWS));

        let mut frame = String::new();
        let filter = controller.filter();
        frame.push_str(&format!(
            "-- {} [{}] {} loaded{}{} --\n",
            filter.keyword().unwrap_or("*"),
            filter.kind(),
            records.len(),
            if controller.window().is_exhausted() { ", end" } else { "" },
            match controller.state() {
                LoadState::Loading => ", loading",
                LoadState::Empty => ", empty",
                LoadState::Ready => "",
            },
        ));
        for (index, record) in records.iter().enumerate().skip(start).take(VIEWPORT_ROWS) {
            frame.push_str(&format_row(record, Some(index) == selected));
            frame.push('\n');
        }
        frame
    }
}

impl Presenter for LinePresenter {
    fn present(&mut self, controller: &FeedController, effects: Vec<Effect>) -> Result<Action> {
        let mut action = Action::Continue;
        for effect in effects {
            match effect {
                Effect::Reveal { index, .. } => {
                    // The selection is the viewport here, so the rows left
                    // below it are the remaining scroll distance.
                    let remaining = controller.records().len().saturating_sub(index + 1);
                    let proximity =
                        ScrollProximity::new(remaining as f64, VIEWPORT_ROWS as f64);
                    if let Err(e) = self.inputs.try_send(FeedInput::Scrolled(proximity)) {
                        tracing::debug!(error = %e, "Dropped scroll report");
                    }
                }
                Effect::Activated { id } => {
                    if let Some(record) = controller.window().get(id) {
                        println!("{}", record.value);
                    }
                }
                Effect::Dismiss => action = Action::Quit,
                Effect::Failed { operation, message } => {
                    eprintln!("{} failed: {}", operation, message);
                }
            }
        }

        let frame = Self::render(controller);
        if self.last_frame.as_deref() != Some(frame.as_str()) {
            print!("{}", frame);
            self.last_frame = Some(frame);
        }
        Ok(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str, keyword: &mut String, kind: &mut KindFilter) -> Option<FeedInput> {
        match parse_command(line, keyword, kind) {
            Ok(Some(ParsedCommand::Input(input))) => Some(input),
            _ => None,
        }
    }

    #[test]
    fn test_filter_commands_keep_other_half() {
        let mut keyword = String::new();
        let mut kind = KindFilter::All;

        assert_eq!(
            parse("/hello", &mut keyword, &mut kind),
            Some(FeedInput::SetFilter {
                keyword: "hello".into(),
                kind: KindFilter::All
            })
        );
        assert_eq!(
            parse(":favorite", &mut keyword, &mut kind),
            Some(FeedInput::SetFilter {
                keyword: "hello".into(),
                kind: KindFilter::Favorite
            })
        );
        assert_eq!(
            parse(":image", &mut keyword, &mut kind),
            Some(FeedInput::SetFilter {
                keyword: String::new(),
                kind: KindFilter::Kind(RecordKind::Image)
            })
        );
    }

    #[test]
    fn test_navigation_commands() {
        let mut keyword = String::new();
        let mut kind = KindFilter::All;
        assert_eq!(
            parse("j", &mut keyword, &mut kind),
            Some(FeedInput::Move(Direction::Next))
        );
        assert_eq!(
            parse("click 42", &mut keyword, &mut kind),
            Some(FeedInput::Press(42))
        );
        assert!(matches!(
            parse_command("clear", &mut keyword, &mut kind),
            Ok(Some(ParsedCommand::ClearHistory))
        ));
        assert!(parse_command("click x", &mut keyword, &mut kind).is_err());
        assert!(parse_command(":audio", &mut keyword, &mut kind).is_err());
        assert!(matches!(parse_command("", &mut keyword, &mut kind), Ok(None)));
    }
}
