use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "neuromap",
    version,
    about = "Structural graph, telemetry overlay and impact analysis for Python projects",
    after_help = r#"Examples:
  neuromap impact --root . --node requests
  neuromap snapshot --root . > brain.json
  neuromap request --method mount --params '{"root":"."}'
  neuromap request --root . --method analyze_impact --params '{"node":"app/models.py::User"}'
  neuromap request --root . --method send_telemetry --params '{"node":"app/api.py::handler","event_type":"execution"}'
  neuromap serve --root .
"#
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run JSONL request loop over stdin/stdout.
    Serve {
        /// Project mounted before the first request.
        #[arg(long)]
        root: Option<PathBuf>,
        /// Include files ignored by .gitignore.
        #[arg(long)]
        no_ignore: bool,
    },
    /// Run a single request and exit.
    Request {
        /// Project mounted before the request (not needed for `mount`).
        #[arg(long)]
        root: Option<PathBuf>,
        #[arg(long)]
        method: String,
        #[arg(long, default_value = "{}")]
        params: String,
        #[arg(long, value_name = "PATH")]
        params_file: Option<PathBuf>,
        #[arg(long, default_value = "1")]
        id: String,
        /// Include files ignored by .gitignore.
        #[arg(long)]
        no_ignore: bool,
    },
    /// Print the graph snapshot with overlay state.
    Snapshot {
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// Include files ignored by .gitignore.
        #[arg(long)]
        no_ignore: bool,
    },
    /// Predict the impact of changing one node.
    Impact {
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// Node id, or a suffix of one.
        #[arg(long, alias = "target")]
        node: String,
        /// Include files ignored by .gitignore.
        #[arg(long)]
        no_ignore: bool,
    },
}
