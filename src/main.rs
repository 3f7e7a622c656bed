use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rustyline::{
    completion::Completer, highlight::Highlighter, history::FileHistory, validate::Validator,
    CompletionType, Config, Editor, Helper,
};

use tavolata::config::{AppConfig, CliConfig, FileConfig};
use tavolata::dinner_store::{DinnerStore, FamilyMember, SqliteDinnerStore};
use tavolata::planner::DinnerPlanner;

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory containing the dinner database file.
    /// Can also be specified in config file.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,
}

impl From<&CliArgs> for CliConfig {
    fn from(args: &CliArgs) -> Self {
        CliConfig {
            db_dir: args.db_dir.clone(),
        }
    }
}

#[derive(Parser)]
#[command(name = "")]
struct InnerCli {
    #[command(subcommand)]
    command: InnerCommand,
}

#[derive(Subcommand)]
enum InnerCommand {
    /// Schedules a dinner on the given date and time for the named attendees.
    Schedule {
        date: String,
        time: String,
        attendees: Vec<String>,
    },

    /// Adds a family member with the given name and role.
    AddMember { name: String, role: String },

    /// Removes the family member with the given id.
    RemoveMember { id: i64 },

    /// Flips the online status of the family member with the given id.
    Toggle { id: i64 },

    /// Shows a random conversation starter.
    Topic,

    /// Lists all scheduled dinners, newest first.
    Dinners,

    /// Lists all family members.
    Members,

    /// Shows row counts of the dinner database.
    Stats,

    /// Shows the path of the current dinner db.
    Where,

    /// Close this program.
    Exit,
}

enum CommandExecutionResult {
    Ok,
    Exit,
    Error(String),
}

const PROMPT: &str = ">> ";

fn find_member(planner: &DinnerPlanner, id: i64) -> Option<FamilyMember> {
    planner
        .family_members()
        .borrow()
        .iter()
        .find(|m| m.id == id)
        .cloned()
}

fn execute_command(
    line: String,
    planner: &DinnerPlanner,
    store: &Arc<SqliteDinnerStore>,
    runtime: &tokio::runtime::Runtime,
    db_path: &str,
) -> CommandExecutionResult {
    if line.is_empty() {
        return CommandExecutionResult::Ok;
    }

    let args =
        shlex::split(&line).unwrap_or_else(|| line.split_whitespace().map(String::from).collect());

    let cli = InnerCli::try_parse_from(std::iter::once(" ").chain(args.iter().map(String::as_str)));

    match cli {
        Ok(cli) => {
            match cli.command {
                InnerCommand::Schedule {
                    date,
                    time,
                    attendees,
                } => {
                    // The planner takes date and time verbatim; rejecting blank
                    // input is this layer's job.
                    if date.trim().is_empty() || time.trim().is_empty() {
                        return CommandExecutionResult::Error(
                            "date and time must not be blank".to_string(),
                        );
                    }
                    planner.schedule_dinner(&date, &time, &attendees);
                    println!("Dinner scheduled on {} at {}", date, time);
                }
                InnerCommand::AddMember { name, role } => {
                    if name.trim().is_empty() || role.trim().is_empty() {
                        return CommandExecutionResult::Error(
                            "name and role must not be blank".to_string(),
                        );
                    }
                    planner.add_family_member(&name, &role);
                    println!("Added {} ({})", name, role);
                }
                InnerCommand::RemoveMember { id } => {
                    let member = match find_member(planner, id) {
                        Some(member) => member,
                        None => {
                            return CommandExecutionResult::Error(format!(
                                "No family member with id {}",
                                id
                            ));
                        }
                    };
                    println!("Removing {} (#{})", member.name, member.id);
                    planner.remove_family_member(member);
                }
                InnerCommand::Toggle { id } => {
                    let member = match find_member(planner, id) {
                        Some(member) => member,
                        None => {
                            return CommandExecutionResult::Error(format!(
                                "No family member with id {}",
                                id
                            ));
                        }
                    };
                    println!(
                        "Setting {} (#{}) {}",
                        member.name,
                        member.id,
                        if member.is_online { "offline" } else { "online" }
                    );
                    planner.toggle_online_status(&member);
                }
                InnerCommand::Topic => {
                    match runtime.block_on(planner.random_topic()) {
                        Ok(Some(topic)) => println!("[{}] {}", topic.category, topic.text),
                        Ok(None) => println!("No topics available."),
                        Err(err) => return CommandExecutionResult::Error(format!("{}", err)),
                    };
                }
                InnerCommand::Dinners => {
                    let dinners = planner.dinners().borrow().clone();
                    if dinners.is_empty() {
                        println!("No dinners scheduled.");
                    }
                    for dinner in dinners {
                        println!(
                            "#{} {} {} with {}",
                            dinner.id, dinner.date, dinner.time, dinner.attendees
                        );
                    }
                }
                InnerCommand::Members => {
                    let members = planner.family_members().borrow().clone();
                    if members.is_empty() {
                        println!("No family members.");
                    }
                    for member in members {
                        println!(
                            "#{} {} ({}) [{}]",
                            member.id,
                            member.name,
                            member.role,
                            if member.is_online { "online" } else { "offline" }
                        );
                    }
                }
                InnerCommand::Stats => match store.stats() {
                    Ok(stats) => println!(
                        "{} dinners, {} family members, {} topics",
                        stats.dinners, stats.family_members, stats.topics
                    ),
                    Err(err) => return CommandExecutionResult::Error(format!("{}", err)),
                },
                InnerCommand::Where => {
                    println!("{}", db_path);
                }
                InnerCommand::Exit => return CommandExecutionResult::Exit,
            }
        }

        Err(e) => {
            if e.print().is_err() {
                println!("{}", e);
            }
        }
    }
    CommandExecutionResult::Ok
}

#[derive(rustyline_derive::Hinter)]
struct ReplHelper {
    commands_names: Vec<String>,
}

impl ReplHelper {
    pub fn new() -> Self {
        let commands_names: Vec<String> = InnerCli::command()
            .get_subcommands()
            .map(|sc| sc.get_name().to_string())
            .collect();

        ReplHelper { commands_names }
    }
}

impl Completer for ReplHelper {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        _pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        if line.contains(' ') {
            return Ok((0, Vec::with_capacity(0)));
        }
        let matches = self
            .commands_names
            .iter()
            .filter(|c| c.starts_with(line))
            .map(|c| c.to_string())
            .collect::<Vec<_>>();

        Ok((0, matches))
    }
}

impl Highlighter for ReplHelper {}
impl Validator for ReplHelper {}
impl Helper for ReplHelper {}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    // Load TOML config if provided
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };

    // Resolve final configuration (TOML overrides CLI)
    let cli_config: CliConfig = (&cli_args).into();
    let app_config = AppConfig::resolve(&cli_config, file_config)?;

    info!("Configuration loaded:");
    info!("  db_dir: {:?}", app_config.db_dir);

    if !app_config.dinner_db_path().exists() {
        info!(
            "Creating new dinner database at {:?}",
            app_config.dinner_db_path()
        );
    }
    let store = Arc::new(SqliteDinnerStore::new(app_config.dinner_db_path())?);

    // The planner's worker task needs a runtime context to spawn into.
    let runtime = tokio::runtime::Runtime::new()?;
    let planner = {
        let _guard = runtime.enter();
        DinnerPlanner::new(store.clone() as Arc<dyn DinnerStore>)
    };

    InnerCli::command().print_long_help()?;

    let config = Config::builder()
        .completion_type(CompletionType::List)
        .build();

    let mut rl = Editor::<ReplHelper, FileHistory>::with_config(config)?;
    rl.set_helper(Some(ReplHelper::new()));

    let db_path = app_config.dinner_db_path().display().to_string();
    loop {
        let readline = rl.readline(PROMPT);

        match readline {
            Ok(line) => {
                let _ = rl.add_history_entry(&line);
                match execute_command(line, &planner, &store, &runtime, &db_path) {
                    CommandExecutionResult::Ok => {}
                    CommandExecutionResult::Exit => {
                        break;
                    }
                    CommandExecutionResult::Error(err) => {
                        eprintln!("Error: {:?}", err);
                        continue;
                    }
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                println!("CTRL-D: exiting.");
                break;
            }
            Err(e) => {
                println!("Error: {:?}", e);
                break;
            }
        }
    }

    runtime.block_on(planner.shutdown());
    Ok(())
}
