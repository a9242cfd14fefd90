use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use pitch_contracts::campaigns::{CampaignInput, ReferenceCorpus};
use pitch_contracts::chat::{parse_intent, Intent, CHAT_HELP_COMMANDS};
use pitch_contracts::library::{CampaignLibrary, ElementRatings};
use pitch_engine::{
    default_embedder, ActiveCampaign, CampaignEngine, CampaignError, CreativePass, EngineConfig,
    ReferenceSelection, ReferenceSelector, SessionOptions,
};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "pitch", version, about = "Campaign concept generator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show which reference campaigns a brief would be matched with.
    References(ReferencesArgs),
    /// Generate one campaign, optionally with creative passes.
    Generate(GenerateArgs),
    /// Generate a campaign and refine it interactively.
    Chat(ChatArgs),
    /// Inspect or prune a saved campaign library.
    Library(LibraryArgs),
}

#[derive(Debug, Args)]
struct EngineFlags {
    /// Completion model (overrides PITCH_COMPLETION_MODEL).
    #[arg(long)]
    model: Option<String>,
    /// Reference corpus JSON file; defaults to the built-in corpus.
    #[arg(long)]
    corpus: Option<PathBuf>,
    /// Maximum references to match (overrides PITCH_REFERENCE_LIMIT).
    #[arg(long)]
    limit: Option<usize>,
    /// Use the offline provider; no network calls are made.
    #[arg(long)]
    dryrun: bool,
}

#[derive(Debug, Args)]
struct ReferencesArgs {
    #[arg(long)]
    brief: PathBuf,
    #[command(flatten)]
    engine: EngineFlags,
}

#[derive(Debug, Args)]
struct GenerateArgs {
    #[arg(long)]
    brief: PathBuf,
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    creative_director: bool,
    #[arg(long)]
    disruptive: bool,
    /// Save the final campaign to the library.
    #[arg(long)]
    save: bool,
    /// Library file; defaults to `<out>/library.json`.
    #[arg(long)]
    library: Option<PathBuf>,
    #[command(flatten)]
    engine: EngineFlags,
}

#[derive(Debug, Args)]
struct ChatArgs {
    #[arg(long)]
    brief: PathBuf,
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    library: Option<PathBuf>,
    #[command(flatten)]
    engine: EngineFlags,
}

#[derive(Debug, Args)]
struct LibraryArgs {
    #[arg(long)]
    library: PathBuf,
    #[command(subcommand)]
    action: LibraryAction,
}

#[derive(Debug, Subcommand)]
enum LibraryAction {
    List,
    Show { id: String },
    Delete { id: String },
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("pitch error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Command::References(args) => run_references(args),
        Command::Generate(args) => run_generate(args),
        Command::Chat(args) => {
            run_chat(args)?;
            Ok(0)
        }
        Command::Library(args) => run_library(args),
    }
}

const DEFAULT_LOG_DIRECTIVES: &str = "pitch=info,pitch_engine=info,pitch_contracts=info";

fn init_tracing() {
    let from_env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(from_env.as_deref()))
        .with_writer(io::stderr)
        .init();
}

// RUST_LOG wins whole; the defaults apply only when it is unset or unusable.
fn log_filter(from_env: Option<&str>) -> EnvFilter {
    from_env
        .map(str::trim)
        .filter(|directives| !directives.is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_DIRECTIVES))
}

fn engine_config(flags: &EngineFlags) -> Result<EngineConfig> {
    let mut config = EngineConfig::from_env()?;
    if let Some(model) = flags.model.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
        config.completion.model = model.to_string();
    }
    if let Some(limit) = flags.limit {
        config.matching.limit = limit;
    }
    Ok(config)
}

fn load_corpus(flags: &EngineFlags) -> Result<ReferenceCorpus> {
    match flags.corpus.as_deref() {
        Some(path) => ReferenceCorpus::load(path),
        None => ReferenceCorpus::builtin(),
    }
}

fn load_brief(path: &Path) -> Result<CampaignInput> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed reading brief {}", path.display()))?;
    let input: CampaignInput = serde_json::from_str(&raw)
        .with_context(|| format!("brief {} is not a valid campaign input", path.display()))?;
    let input = input.normalized();
    if input.brand.is_empty() || input.industry.is_empty() {
        bail!("brief {} must name a brand and an industry", path.display());
    }
    Ok(input)
}

fn open_engine(
    flags: &EngineFlags,
    out: &Path,
    library: Option<&Path>,
) -> Result<CampaignEngine> {
    let mut options = SessionOptions::new(out);
    options.library_path = library.map(Path::to_path_buf);
    options.corpus = Some(load_corpus(flags)?);
    options.dryrun = flags.dryrun;
    Ok(CampaignEngine::new(engine_config(flags)?, options)?)
}

fn run_references(args: ReferencesArgs) -> Result<i32> {
    let input = load_brief(&args.brief)?;
    let config = engine_config(&args.engine)?;
    let corpus = load_corpus(&args.engine)?;
    let mut selector = ReferenceSelector::new(config.matching);
    if let Some(embedder) = default_embedder(&config, args.engine.dryrun)? {
        selector = selector.with_embedder(embedder);
    }
    let selection = selector.select(&input, &corpus);
    print_selection(&selection);
    Ok(0)
}

fn print_selection(selection: &ReferenceSelection) {
    match selection.fallback_reason() {
        Some(reason) => println!("Path: {} ({reason})", selection.path()),
        None => println!("Path: {}", selection.path()),
    }
    for (rank, ranked) in selection.references().iter().enumerate() {
        println!(
            "{}. {} [{}] {} / {} score={:.3}",
            rank + 1,
            ranked.campaign.name,
            ranked.campaign.id,
            ranked.campaign.brand,
            ranked.campaign.industry,
            ranked.score
        );
    }
}

fn run_generate(args: GenerateArgs) -> Result<i32> {
    let input = load_brief(&args.brief)?;
    let mut engine = open_engine(&args.engine, &args.out, args.library.as_deref())?;
    let passes = CreativePass::requested(args.creative_director, args.disruptive);
    tracing::info!(
        session = %engine.session_id(),
        passes = passes.len(),
        "generating campaign"
    );
    let outcome = engine.generate(&input, &passes);
    let campaign = match outcome {
        Ok(campaign) => campaign,
        Err(err) => {
            engine.finish()?;
            return Err(err.into());
        }
    };
    println!("{}", campaign.to_pretty_json());
    if args.save {
        let saved = engine.save_active()?;
        eprintln!("Saved to library as {}", saved.id);
    }
    engine.finish()?;
    Ok(0)
}

fn run_chat(args: ChatArgs) -> Result<()> {
    let input = load_brief(&args.brief)?;
    let mut engine = open_engine(&args.engine, &args.out, args.library.as_deref())?;

    println!("Generating a first concept for {}...", input.brand);
    let campaign = engine.generate(&input, &[])?;
    println!("{}", campaign.to_pretty_json());
    println!("Pitch chat started. Type /help for commands.");

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let intent = parse_intent(line.trim_end_matches(['\n', '\r']));
        match intent.action.as_str() {
            "noop" => continue,
            "quit" => break,
            "help" => {
                println!("Commands:");
                for command in CHAT_HELP_COMMANDS {
                    println!("  {command}");
                }
                println!("Anything else is sent to the advisor.");
            }
            "message" => {
                let message = intent.message.clone().unwrap_or_default();
                report(engine.chat(&message).map(|reply| println!("{reply}")));
            }
            "apply_refinement" => {
                report(
                    engine
                        .refine_from_chat()
                        .map(|campaign| println!("{}", campaign.to_pretty_json())),
                );
            }
            "rate" => {
                let (overall, ratings, comment) = rating_from_intent(&intent)?;
                report(
                    engine
                        .refine_from_feedback(overall, ratings, &comment)
                        .map(|campaign| println!("{}", campaign.to_pretty_json())),
                );
            }
            "creative_director" | "disruptive_device" => {
                let pass = if intent.action == "creative_director" {
                    CreativePass::CreativeDirector
                } else {
                    CreativePass::DisruptiveDevice
                };
                report(
                    engine
                        .apply_pass(pass)
                        .map(|campaign| println!("{}", campaign.to_pretty_json())),
                );
            }
            "save" => {
                report(engine.save_active().map(|saved| println!("Saved as {}", saved.id)));
            }
            "show" => match engine.active() {
                Some(active) => {
                    println!("Version {}", active.version_id);
                    println!("{}", active.campaign.to_pretty_json());
                }
                None => println!("No active campaign."),
            },
            "export" => {
                let path = value_as_non_empty_string(intent.command_args.get("path"));
                let Some(path) = path else {
                    println!("/export requires a path");
                    continue;
                };
                let Some(active) = engine.active() else {
                    println!("No active campaign.");
                    continue;
                };
                match export_active(active, Path::new(&path)) {
                    Ok(()) => println!("Exported {} to {path}", active.version_id),
                    Err(err) => println!("Export failed: {err:#}"),
                }
            }
            "set_model" => {
                let Some(model) = value_as_non_empty_string(intent.command_args.get("model")) else {
                    println!("Current model: {}", engine.model());
                    continue;
                };
                match engine.set_model(&model) {
                    Ok(selection) => match selection.fallback_reason {
                        Some(reason) => println!("Model set to {} ({reason})", selection.model.name),
                        None => println!("Model set to {}", selection.model.name),
                    },
                    Err(err) => println!("Model change failed: {err}"),
                }
            }
            "invalid" => {
                let reason = value_as_non_empty_string(intent.command_args.get("reason"))
                    .unwrap_or_else(|| "invalid command".to_string());
                println!("{reason}");
            }
            _ => {
                let command = value_as_non_empty_string(intent.command_args.get("command"))
                    .unwrap_or_default();
                println!("Unknown command /{command}. Type /help for commands.");
            }
        }
    }

    let summary = engine.finish()?;
    println!(
        "Session {} finished: {} generated, {} passes, {} refinements, {} saved.",
        summary.session_id,
        summary.generations,
        summary.passes,
        summary.refinements,
        summary.saved_campaign_ids.len()
    );
    Ok(())
}

// A failed round is printed and the chat continues.
fn report(outcome: std::result::Result<(), CampaignError>) {
    match outcome {
        Ok(()) => {}
        Err(CampaignError::NothingToApply) => {
            println!("Nothing to apply yet. Chat about the campaign first.");
        }
        Err(CampaignError::NoOriginalInput) => {
            println!("No campaign to work on yet.");
        }
        Err(err) => println!("Failed ({}): {err}", err.kind()),
    }
}

fn export_active(active: &ActiveCampaign, path: &Path) -> Result<()> {
    fs::write(path, active.campaign.to_pretty_json())
        .with_context(|| format!("failed writing {}", path.display()))
}

fn rating_from_intent(intent: &Intent) -> Result<(u8, ElementRatings, String)> {
    let overall = intent
        .command_args
        .get("overall")
        .and_then(Value::as_u64)
        .and_then(|value| u8::try_from(value).ok())
        .context("rate intent without an overall rating")?;
    let ratings = match intent.command_args.get("ratings") {
        Some(value) => serde_json::from_value::<ElementRatings>(value.clone())
            .context("rate intent carried malformed element ratings")?,
        None => ElementRatings::default(),
    };
    let comment = value_as_non_empty_string(intent.command_args.get("comment")).unwrap_or_default();
    Ok((overall, ratings, comment))
}

fn run_library(args: LibraryArgs) -> Result<i32> {
    let mut library = CampaignLibrary::new(&args.library);
    match args.action {
        LibraryAction::List => {
            let entries = library.list()?;
            if entries.is_empty() {
                println!("Library is empty.");
            }
            for entry in entries {
                println!(
                    "{}  {}  {} / {}  {}",
                    entry.id, entry.saved_at, entry.brand, entry.industry, entry.campaign.campaign_name
                );
            }
            Ok(0)
        }
        LibraryAction::Show { id } => match library.get(&id)? {
            Some(entry) => {
                println!("{}", serde_json::to_string_pretty(&entry)?);
                Ok(0)
            }
            None => {
                eprintln!("No saved campaign with id {id}");
                Ok(1)
            }
        },
        LibraryAction::Delete { id } => {
            if library.delete(&id)? {
                println!("Deleted {id}");
                Ok(0)
            } else {
                eprintln!("No saved campaign with id {id}");
                Ok(1)
            }
        }
    }
}

fn value_as_non_empty_string(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
