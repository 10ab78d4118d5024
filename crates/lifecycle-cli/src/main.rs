mod cmd;
mod input;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "lifecycle",
    about = "User lifecycle state machine, content audit gate and data repair",
    version,
    propagate_version = true
)]
struct Cli {
    /// Data root (default: nearest directory with lifecycle.yaml, else cwd)
    #[arg(long, global = true, env = "LIFECYCLE_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default lifecycle.yaml into the data root
    Init,

    /// Derive a user's lifecycle state
    State {
        /// Snapshot file (YAML or JSON)
        snapshot: Option<PathBuf>,

        /// Build the snapshot from the record store instead
        #[arg(long, conflicts_with = "snapshot")]
        user: Option<String>,
    },

    /// Check whether a state transition is allowed
    Transition {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        /// Reason code, e.g. inactivity or cancellation
        #[arg(long)]
        reason: String,
        /// Snapshot to check for inconsistencies (YAML or JSON)
        #[arg(long)]
        snapshot: Option<PathBuf>,
        /// Load the snapshot for this user from the record store instead
        #[arg(long, conflicts_with = "snapshot")]
        user: Option<String>,
    },

    /// Run a content candidate through the audit gate
    Audit {
        /// Candidate file (YAML or JSON)
        candidate: PathBuf,
        /// Business context file
        #[arg(long)]
        context: Option<PathBuf>,
        /// List of already-issued items
        #[arg(long)]
        existing: Option<PathBuf>,
    },

    /// Extract actionable content from a chat message
    Extract {
        /// Message text (omit to use --file)
        text: Option<String>,
        #[arg(long, conflicts_with = "text")]
        file: Option<PathBuf>,
    },

    /// Extract, audit and group chat content by dashboard module
    Route {
        text: Option<String>,
        #[arg(long, conflicts_with = "text")]
        file: Option<PathBuf>,
        #[arg(long)]
        context: Option<PathBuf>,
        #[arg(long)]
        existing: Option<PathBuf>,
    },

    /// Apply idempotent data repairs to the record store
    Repair {
        /// File with a list of repair actions (YAML or JSON)
        actions: Option<PathBuf>,
        /// Propose repairs from this user's inconsistencies instead
        #[arg(long, conflicts_with = "actions")]
        user: Option<String>,
        /// Print the actions without applying them
        #[arg(long)]
        dry_run: bool,
    },

    /// Show or validate lifecycle.yaml
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root, cli.json),
        Commands::State { snapshot, user } => {
            cmd::state::run(&root, snapshot.as_deref(), user.as_deref(), cli.json)
        }
        Commands::Transition {
            from,
            to,
            reason,
            snapshot,
            user,
        } => cmd::transition::run(
            &root,
            cmd::transition::TransitionArgs {
                from,
                to,
                reason,
                snapshot,
                user,
            },
            cli.json,
        ),
        Commands::Audit {
            candidate,
            context,
            existing,
        } => cmd::audit::run(
            &root,
            &candidate,
            context.as_deref(),
            existing.as_deref(),
            cli.json,
        ),
        Commands::Extract { text, file } => {
            cmd::extract::run_extract(text.as_deref(), file.as_deref(), cli.json)
        }
        Commands::Route {
            text,
            file,
            context,
            existing,
        } => cmd::extract::run_route(
            &root,
            cmd::extract::RouteArgs {
                text,
                file,
                context,
                existing,
            },
            cli.json,
        ),
        Commands::Repair {
            actions,
            user,
            dry_run,
        } => cmd::repair::run(&root, actions.as_deref(), user.as_deref(), dry_run, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
