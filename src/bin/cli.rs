//! Binary entry point for the locality consolidator CLI.
#![forbid(unsafe_code)]

#[path = "cli/ui.rs"]
mod ui;

use std::error::Error;
use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use serde_json::json;
use time::macros::format_description;
use time::{Date, OffsetDateTime};
use tracing_subscriber::{fmt, EnvFilter};

use locality_consolidator::config::{self, CliConfig};
use locality_consolidator::locality::{derive_terms, sorted_phonetic_series};
use locality_consolidator::{
    Consolidation, ConsolidationEvent, ConsolidationSummary, Dataset, LocalityMatch,
    PhoneticEncoder, RegionId,
};

use ui::Ui;

#[derive(Parser, Debug)]
#[command(
    name = "consolidator",
    version,
    about = "Find likely duplicate localities region by region",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        env = "CONSOLIDATOR_CONFIG",
        help = "Configuration file (defaults to the user config directory)"
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_enum,
        help = "Output format for structured responses"
    )]
    format: Option<OutputFormat>,

    #[arg(long, global = true, value_enum, help = "Color text output")]
    color: Option<ColorArg>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct RunCmd {
    #[arg(value_name = "DATASET", help = "JSON dataset to consolidate")]
    dataset: PathBuf,

    #[arg(
        long = "domain",
        value_name = "ID",
        action = ArgAction::Append,
        help = "Region to deduplicate (repeatable; defaults to the dataset's domain)"
    )]
    domain: Vec<u32>,

    #[arg(long, value_name = "ID", help = "Region to start the traversal from")]
    start: Option<u32>,

    #[arg(
        long,
        value_name = "YYYY-MM-DD",
        value_parser = parse_since,
        help = "Only compare pairs where an in-domain locality changed on or after this date"
    )]
    since: Option<OffsetDateTime>,

    #[arg(long, value_name = "N", help = "Driver steps between cooperative yields")]
    yield_interval: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum ConfigCmd {
    #[command(about = "Print the effective configuration")]
    Show,
    #[command(about = "Print the configuration file path")]
    Path,
    #[command(about = "Write the effective configuration to its file")]
    Init,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Consolidate a dataset and list candidate duplicates")]
    Run(RunCmd),

    #[command(about = "Show the words and phonetic codes derived from a name")]
    Phonetic {
        #[arg(value_name = "TEXT")]
        text: String,
    },

    #[command(subcommand, about = "Inspect the configuration file")]
    Config(ConfigCmd),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

impl From<config::OutputFormat> for OutputFormat {
    fn from(format: config::OutputFormat) -> Self {
        match format {
            config::OutputFormat::Text => OutputFormat::Text,
            config::OutputFormat::Json => OutputFormat::Json,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum ColorArg {
    Auto,
    Always,
    Never,
}

impl From<ColorArg> for config::ColorChoice {
    fn from(color: ColorArg) -> Self {
        match color {
            ColorArg::Auto => config::ColorChoice::Auto,
            ColorArg::Always => config::ColorChoice::Always,
            ColorArg::Never => config::ColorChoice::Never,
        }
    }
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("locality_consolidator=info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let mut config = CliConfig::load(cli.config.clone())?;
    if let Some(color) = cli.color {
        config.data_mut().output.color = color.into();
    }
    let format = cli
        .format
        .unwrap_or_else(|| config.data().output.format.into());
    let ui = Ui::new(config.data().output.color);

    match cli.command {
        Command::Run(cmd) => run_consolidation(&cmd, &mut config, format, &ui)?,
        Command::Phonetic { text } => print_phonetic(&text, &config, format, &ui)?,
        Command::Config(cmd) => print_config(&cmd, &config, format, &ui)?,
    }
    Ok(())
}

fn run_consolidation(
    cmd: &RunCmd,
    config: &mut CliConfig,
    format: OutputFormat,
    ui: &Ui,
) -> Result<(), Box<dyn Error>> {
    if let Some(interval) = cmd.yield_interval {
        config.data_mut().consolidation.yield_interval = interval;
    }
    let mut options = config.consolidation_options();
    if let Some(start) = cmd.start {
        options = options.start_region(RegionId(start));
    }
    if let Some(since) = cmd.since {
        options = options.baseline(since);
    }

    let dataset = Dataset::load(&cmd.dataset)?;
    let localities = dataset.localities.len();
    let requested: Vec<RegionId> = cmd.domain.iter().copied().map(RegionId).collect();
    let ctx = dataset.into_context(options, &requested)?;
    let mut run = Consolidation::new(ctx);

    let mut matches: Vec<LocalityMatch> = Vec::new();
    let mut regions = Vec::new();
    while let Some(event) = run.next_event()? {
        match event {
            ConsolidationEvent::Tick => {}
            ConsolidationEvent::Region(region) => regions.push(region),
            ConsolidationEvent::Match(found) => {
                if format == OutputFormat::Text {
                    ui.locality_match(matches.len() + 1, &found);
                }
                matches.push(*found);
            }
        }
    }
    let summary = run.summary().clone();

    match format {
        OutputFormat::Json => {
            let report = json!({
                "dataset": cmd.dataset.display().to_string(),
                "localities": localities,
                "regions": regions,
                "matches": matches,
                "summary": summary,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            if matches.is_empty() {
                ui.info("no candidate duplicates found");
            }
            ui.spacer();
            print_summary(ui, localities, &summary);
        }
    }
    Ok(())
}

fn print_summary(ui: &Ui, localities: usize, summary: &ConsolidationSummary) {
    ui.section(
        "Summary",
        [
            ("localities", localities),
            ("regions processed", summary.regions_processed),
            ("regions completed", summary.regions_completed),
            ("comparisons", summary.comparisons),
            ("matches", summary.matches_emitted),
            ("suppressed", summary.matches_suppressed),
            ("peak cached", summary.peak_cached_localities),
        ],
    );
}

fn print_phonetic(
    text: &str,
    config: &CliConfig,
    format: OutputFormat,
    ui: &Ui,
) -> Result<(), Box<dyn Error>> {
    let mut encoder = PhoneticEncoder::new(config.data().consolidation.phonetic_memo_capacity);
    let (words, codes) = derive_terms(text, &mut encoder).unwrap_or_default();
    let series = sorted_phonetic_series(&codes);

    match format {
        OutputFormat::Json => {
            let report = json!({
                "name": text,
                "words": words,
                "phonetic_codes": codes,
                "sorted_phonetic_series": series,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            if words.is_empty() {
                ui.warn(&format!("{text:?} has no matchable words"));
                return Ok(());
            }
            ui.list(
                "Words",
                words
                    .iter()
                    .zip(&codes)
                    .map(|(word, code)| format!("{word} -> {code}")),
            );
            ui.section("Series", [("sorted phonetic series", series)]);
        }
    }
    Ok(())
}

fn print_config(
    cmd: &ConfigCmd,
    config: &CliConfig,
    format: OutputFormat,
    ui: &Ui,
) -> Result<(), Box<dyn Error>> {
    match cmd {
        ConfigCmd::Show => match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(config.data())?),
            OutputFormat::Text => print!("{}", config.render()?),
        },
        ConfigCmd::Path => match config.path() {
            Some(path) => println!("{}", path.display()),
            None => return Err("no configuration directory is available".into()),
        },
        ConfigCmd::Init => {
            let path = config.persist()?;
            ui.info(&format!("configuration written to {}", path.display()));
        }
    }
    Ok(())
}

fn parse_since(raw: &str) -> Result<OffsetDateTime, String> {
    let format = format_description!("[year]-[month]-[day]");
    Date::parse(raw.trim(), &format)
        .map(|date| date.midnight().assume_utc())
        .map_err(|err| format!("expected YYYY-MM-DD: {err}"))
}
