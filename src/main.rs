use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{ArgGroup, Parser};
use env_logger::Env;

use mail_threads::ingest::load_eml_dir;
use mail_threads::{
    DisplayRowMap, DisplayedForest, ExpansionState, Forest, MessageSummary, SortOrder,
    ThreadingConfig, reconcile,
};

#[derive(Parser, Debug)]
#[command(
    name = "thread-dump",
    about = "Thread a folder of message summaries and print the result",
    group(ArgGroup::new("source").required(true).args(["input", "eml"]))
)]
struct Args {
    /// JSON file holding an array of message summaries.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Directory of `*.eml` files to ingest instead of JSON.
    #[arg(long)]
    eml: Option<PathBuf>,

    /// Earlier summaries; prints the row changes from their threads to the current ones.
    #[arg(long)]
    previous: Option<PathBuf>,

    /// Collapse-marker file applied to the displayed threads.
    #[arg(long)]
    collapsed: Option<PathBuf>,

    /// Disable subject grouping.
    #[arg(long)]
    no_subject: bool,

    /// Sort siblings oldest first.
    #[arg(long)]
    ascending: bool,
}

fn read_summaries(path: &Path) -> Result<Vec<MessageSummary>, Box<dyn std::error::Error>> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args = Args::parse();

    let mut config = ThreadingConfig::from_env();
    if args.no_subject {
        config.subject_grouping = false;
    }
    if args.ascending {
        config.sort_order = SortOrder::Ascending;
    }

    let summaries = match (&args.input, &args.eml) {
        (Some(path), _) => read_summaries(path)?,
        (None, Some(dir)) => load_eml_dir(dir)?,
        (None, None) => return Err("one of --input or --eml is required".into()),
    };
    log::info!("threading {} messages", summaries.len());

    let expansion = match &args.collapsed {
        Some(path) => ExpansionState::load_from_disk(path)?,
        None => ExpansionState::new(),
    };

    let forest = Forest::build(&summaries, &config);
    forest.verify()?;

    let mut stdout = io::stdout().lock();

    let Some(previous_path) = &args.previous else {
        if args.collapsed.is_some() {
            let mut displayed = DisplayedForest::new();
            displayed.populate(forest, expansion, &config, &mut DisplayRowMap::new());
            write!(stdout, "{}", displayed.render())?;
        } else {
            write!(stdout, "{}", forest.render())?;
        }
        return Ok(());
    };

    let previous = read_summaries(previous_path)?;
    let mut displayed = DisplayedForest::new();
    let mut row_map = DisplayRowMap::new();
    displayed.populate(
        Forest::build(&previous, &config),
        expansion,
        &config,
        &mut row_map,
    );

    let report = reconcile(&mut displayed, forest, &mut row_map);
    log::info!(
        "{} added, {} removed, {} moved",
        report.added(),
        report.removed(),
        report.moved()
    );
    for change in report.changes() {
        writeln!(stdout, "{}", serde_json::to_string(change)?)?;
    }

    Ok(())
}
