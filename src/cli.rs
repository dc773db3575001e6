use clap::builder::styling::{AnsiColor, Color, Style, Styles};
use clap::{ColorChoice, Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};

use crate::config::Config;
use crate::gatherer::ContextGatherer;
use crate::llm::pick_summarizer;
use crate::{AppResult, repo, snapshot};

const STYLES: Styles = Styles::styled()
    .header(Style::new().bold())
    .usage(Style::new().bold())
    .error(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Red))))
    .literal(
        Style::new()
            .bold()
            .fg_color(Some(Color::Ansi(AnsiColor::Green))),
    )
    .placeholder(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Yellow))))
    .valid(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Cyan))))
    .invalid(Style::new().fg_color(Some(Color::Ansi(AnsiColor::BrightRed))))
    .context(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Magenta))))
    .context_value(
        Style::new()
            .bold()
            .fg_color(Some(Color::Ansi(AnsiColor::Cyan))),
    );

/// Long-form CLI description shown in `--help`.
const LONG_ABOUT: &str = "Flightdeck - keep an evolving AI briefing of your project

Run it from anywhere inside a git repository. It gathers a context snapshot
(working tree status, recent commits, remote activity, and any extra commands
you configure), compares it against the snapshot from the previous run, and
has a language model summarize what changed. State lives in a .flightdeck/
directory at the repository root.";

/// Flightdeck - summarize what changed in your project since the last run.
#[derive(Parser, Debug, Clone)]
#[command(author, version, propagate_version = true, about, long_about = Some(LONG_ABOUT), styles = STYLES)]
pub struct Cli {
    /// Color choice for the output
    #[arg(long, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Subcommand to run
    #[command(subcommand)]
    pub cmd: Option<Cmd>,
}

/// Top-level commands supported by the CLI.
#[derive(Subcommand, Debug, Clone)]
pub enum Cmd {
    /// Gather a context snapshot, diff it against the previous run, and
    /// summarize the changes
    ///
    /// This is the default command
    Run {
        #[command(flatten)]
        verbosity: Verbosity<InfoLevel>,
    },

    /// Gather the context snapshot and print it without summarizing
    ///
    /// This is useful for debugging or if you want to inspect the gathered
    /// context before feeding it to a model
    Context {
        #[command(flatten)]
        verbosity: Verbosity<InfoLevel>,
    },
}

impl Default for Cmd {
    fn default() -> Self {
        Cmd::Run {
            verbosity: Verbosity::default(),
        }
    }
}

/// Helper trait for accessing verbosity flags on commands.
pub trait GetVerbosity {
    fn get_verbosity(&self) -> &Verbosity<InfoLevel>;
}

impl GetVerbosity for Cmd {
    fn get_verbosity(&self) -> &Verbosity<InfoLevel> {
        match self {
            Cmd::Run { verbosity } => verbosity,
            Cmd::Context { verbosity } => verbosity,
        }
    }
}

impl Cmd {
    /// Execute the chosen top-level command.
    #[tracing::instrument(name = "Running command", level = "info", skip(self))]
    pub async fn run(&self) -> AppResult<()> {
        let git_root = repo::find_git_root()?;
        let cfg = Config::load()?;

        match self {
            Cmd::Run { .. } => {
                let summarizer = pick_summarizer(&cfg)?;
                let current = ContextGatherer::new(&git_root, &cfg).gather().await?;
                snapshot::compare_and_summarize(&cfg, &git_root, summarizer.as_ref(), &current)
                    .await?;
                Ok(())
            }
            Cmd::Context { .. } => {
                let current = ContextGatherer::new(&git_root, &cfg).gather().await?;
                println!("{current}");
                Ok(())
            }
        }
    }
}
