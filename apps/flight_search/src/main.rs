mod config;
mod render;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use search_core::{SearchContext, SearchViewModel, ViewState};
use shared::domain::Airport;
use storage::install_bundled_dataset;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::{wrappers::LinesStream, StreamExt};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Settings;

#[derive(Parser, Debug)]
#[command(
    name = "flight_search",
    version,
    about = "Search airports, browse routes and bookmark favorite flights"
)]
struct Args {
    #[arg(long, global = true, default_value = config::CONFIG_FILE)]
    config: PathBuf,
    #[arg(long, global = true)]
    database_url: Option<String>,
    #[arg(long, global = true)]
    bundled_dataset: Option<PathBuf>,
    /// Print the view state as JSON.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the screen as restored from the last session.
    Show,
    /// Type search text. An empty string shows saved routes.
    Search { text: String },
    /// Pick a departure airport by IATA code.
    Select { code: String },
    /// Save or unsave a route.
    Toggle {
        departure: String,
        destination: String,
    },
    /// Lay saved routes out as a grid or a list.
    Layout { layout: Layout },
    /// Look up a single airport.
    Airport { code: String },
    /// Read actions from stdin, one per line.
    Repl,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Layout {
    Grid,
    List,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Action {
    Show,
    Search(String),
    Select(String),
    ClearSelection,
    Toggle(String, String),
    Layout(Layout),
    Airport(String),
}

enum Output {
    State,
    Message(String),
    Airport(Airport),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = config::load_settings(&args.config);
    if let Some(url) = args.database_url {
        settings.database_url = Some(url);
    }
    if let Some(path) = args.bundled_dataset {
        settings.bundled_dataset = Some(path);
    }

    let database_url = settings.database_url();
    install_dataset(&settings, &database_url)?;

    let ctx = SearchContext::open(&database_url)
        .await
        .with_context(|| format!("failed to open database '{database_url}'"))?;
    let view_model = SearchViewModel::new(ctx);
    view_model.ready().await;
    info!(%database_url, "flight search ready");

    let result = match args.command.unwrap_or(Command::Show) {
        Command::Repl => repl(&view_model, args.json).await,
        command => {
            let output = apply(&view_model, action_for(command)).await;
            output.and_then(|output| print_output(&view_model, output, args.json))
        }
    };
    view_model.flush_preferences().await;
    result
}

fn install_dataset(settings: &Settings, database_url: &str) -> Result<()> {
    let (Some(bundled), Some(target)) = (
        settings.bundled_dataset.as_deref(),
        storage::sqlite_path(database_url),
    ) else {
        return Ok(());
    };
    install_bundled_dataset(bundled, &target)
        .context("cannot start without the airport dataset")?;
    Ok(())
}

fn action_for(command: Command) -> Action {
    match command {
        Command::Show | Command::Repl => Action::Show,
        Command::Search { text } => Action::Search(text),
        Command::Select { code } => Action::Select(code),
        Command::Toggle {
            departure,
            destination,
        } => Action::Toggle(departure, destination),
        Command::Layout { layout } => Action::Layout(layout),
        Command::Airport { code } => Action::Airport(code),
    }
}

async fn apply(view_model: &SearchViewModel, action: Action) -> Result<Output> {
    match action {
        Action::Show => Ok(Output::State),
        Action::Search(text) => {
            view_model.on_search_text_changed(&text).await?;
            Ok(Output::State)
        }
        Action::Select(code) => {
            let airport = lookup_airport(view_model, &code).await?;
            view_model.on_airport_selected(airport).await?;
            Ok(Output::State)
        }
        Action::ClearSelection => {
            view_model.clear_selected_airport().await?;
            Ok(Output::State)
        }
        Action::Toggle(departure, destination) => {
            let (departure, destination) = (departure.to_uppercase(), destination.to_uppercase());
            let saved = view_model.toggle_favorite(&departure, &destination).await?;
            let verb = if saved { "Saved" } else { "Removed" };
            Ok(Output::Message(format!("{verb} {departure} -> {destination}")))
        }
        Action::Layout(layout) => {
            view_model.set_favorites_grid(layout == Layout::Grid).await?;
            Ok(Output::State)
        }
        Action::Airport(code) => Ok(Output::Airport(lookup_airport(view_model, &code).await?)),
    }
}

async fn lookup_airport(view_model: &SearchViewModel, code: &str) -> Result<Airport> {
    let code = code.trim().to_uppercase();
    view_model
        .airport_by_code(&code)
        .await?
        .with_context(|| format!("unknown airport code '{code}'"))
}

fn print_output(view_model: &SearchViewModel, output: Output, json: bool) -> Result<()> {
    match output {
        Output::Airport(airport) if json => println!("{}", serde_json::to_string_pretty(&airport)?),
        Output::Airport(airport) => println!(
            "{} {} ({} passengers)",
            airport.iata_code, airport.name, airport.passengers
        ),
        Output::Message(message) => {
            if !json {
                println!("{message}");
            }
            print_state(&view_model.snapshot(), json)?;
        }
        Output::State => print_state(&view_model.snapshot(), json)?,
    }
    Ok(())
}

fn print_state(state: &ViewState, json: bool) -> Result<()> {
    if json {
        println!("{}", render::to_json(state)?);
        return Ok(());
    }
    match render::to_text(state) {
        Ok(text) => print!("{text}"),
        Err(unresolved) => {
            warn!(%unresolved, "view state has no display mode");
            println!("{unresolved}");
        }
    }
    Ok(())
}

async fn repl(view_model: &SearchViewModel, json: bool) -> Result<()> {
    print_state(&view_model.snapshot(), json)?;
    let mut lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());
    while let Some(line) = lines.next().await {
        let line = line.context("failed to read stdin")?;
        let action = match parse_repl_line(&line) {
            Ok(Some(action)) => action,
            Ok(None) => break,
            Err(usage) => {
                eprintln!("{usage}");
                continue;
            }
        };
        match apply(view_model, action).await {
            Ok(output) => print_output(view_model, output, json)?,
            Err(error) => eprintln!("error: {error:#}"),
        }
    }
    Ok(())
}

/// `Ok(None)` ends the session. Lines without a leading `:` are search text.
fn parse_repl_line(line: &str) -> Result<Option<Action>, String> {
    let Some(command) = line.strip_prefix(':') else {
        return Ok(Some(Action::Search(line.to_string())));
    };
    let words: Vec<&str> = command.split_whitespace().collect();
    let action = match words.as_slice() {
        ["q" | "quit"] => return Ok(None),
        ["show"] => Action::Show,
        ["select", code] => Action::Select(code.to_string()),
        ["clear"] => Action::ClearSelection,
        ["toggle", departure, destination] => {
            Action::Toggle(departure.to_string(), destination.to_string())
        }
        ["grid"] => Action::Layout(Layout::Grid),
        ["list"] => Action::Layout(Layout::List),
        ["airport", code] => Action::Airport(code.to_string()),
        _ => {
            return Err(format!(
                "unknown command ':{command}'. Try :select CODE, :toggle FROM TO, :clear, \
                 :grid, :list, :airport CODE, :show or :quit"
            ))
        }
    };
    Ok(Some(action))
}
