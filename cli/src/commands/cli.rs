use clap::{Args as ClapArgs, Parser, Subcommand};
use gator_core::api::TaskKind;

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindArg {
    Assignments,
    Recordings,
    Transcript,
}

impl From<KindArg> for TaskKind {
    fn from(k: KindArg) -> Self {
        match k {
            KindArg::Assignments => TaskKind::Assignments,
            KindArg::Recordings => TaskKind::Recordings,
            KindArg::Transcript => TaskKind::Transcript,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "gator", version, about = "Extract course assignments, recordings and transcripts")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file to use instead of ~/.gator/config.toml or ./config.toml.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Print tasks as JSON.
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ScrapeArgs {
    #[arg(value_enum)]
    pub kind: KindArg,

    /// Course page, inbox page or recording page, depending on the kind.
    #[arg(long)]
    pub url: String,

    /// Submit the result to the backend when the task completes.
    #[arg(long)]
    pub submit: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a task and wait for its result. Ctrl-C cancels it.
    Scrape(ScrapeArgs),
    /// List active tasks.
    Status,
    /// Print one task.
    Show { id: String },
    /// Cancel the active task of a kind.
    Cancel {
        #[arg(value_enum)]
        kind: KindArg,
    },
    /// Remove expired and abandoned tasks now.
    Sweep,
}
