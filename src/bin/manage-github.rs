use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use org_policy::config::PolicyConfig;
use org_policy::execute::{Driver, Mode, StdinPrompt};
use org_policy::github::GithubDirectory;
use org_policy::plan::Planner;

/// Apply policy to the GitHub organization.
///
/// Runs in one of three modes:
/// --dry-run: analyse changes, but do not apply
/// --exec: analyse changes and apply immediately
/// default: analyse changes and ask for confirmation before applying them
#[derive(Parser, Debug)]
#[command(name = "manage-github", version, about)]
struct Args {
    /// The team config (YAML, or TOML with a .toml extension)
    config: PathBuf,

    /// Automatically execute commands
    #[arg(long = "exec")]
    execute: bool,

    /// Just print what would change and exit
    #[arg(long)]
    dry_run: bool,

    /// Seconds to wait for confirmation before giving up
    #[arg(long, default_value_t = 30)]
    confirm_timeout: u64,
}

impl Args {
    fn mode(&self) -> Mode {
        if self.dry_run {
            Mode::DryRun
        } else if self.execute {
            Mode::Execute
        } else {
            Mode::Confirm
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let directory = GithubDirectory::from_env().unwrap_or_else(|e| {
        eprintln!("{e}");
        std::process::exit(1);
    });
    let config = PolicyConfig::load(&args.config)?;

    let mut driver = Driver::new(&directory, args.mode(), std::io::stdout(), StdinPrompt)
        .with_timeout(Duration::from_secs(args.confirm_timeout));
    driver.start()?;
    Planner::new(&directory, &config).run(&mut driver).await?;
    driver.finish().await?;

    Ok(())
}
