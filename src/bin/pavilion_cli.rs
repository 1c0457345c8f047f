use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};

use pavilion::Host;

#[derive(Parser)]
#[command(name = "pavilion", version, about = "Site deploy bundle tooling")]
struct Cli {
    /// Data root holding one directory per site.
    #[arg(long = "root", default_value = "data")]
    root: PathBuf,
    /// Listen port handed to hot-reloaded server code.
    #[arg(long = "port", default_value_t = 3000)]
    port: u16,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show deploy status for every site, or one site.
    Status { site: Option<String> },
    /// Download a bundle and make it live.
    Deploy { site: String, url: String },
    /// Activate a retained timestamp (rollback).
    Redeploy { site: String, ts: u64 },
    /// List retained deploy timestamps.
    List { site: String },
    /// Delete a retained deploy. The live one is refused.
    Prune { site: String, ts: u64 },
    /// Bind or unbind a hostname.
    Domain {
        site: String,
        #[arg(long = "add")]
        add: Option<String>,
        #[arg(long = "remove")]
        remove: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let host = Host::load(&cli.root, cli.port, None).await?;

    let site_handle = |site: &str| {
        host.site(site)
            .ok_or_else(|| anyhow!("unknown site {site} under {}", cli.root.display()))
    };

    match &cli.command {
        Commands::Status { site } => match site {
            Some(site) => print_status(site_handle(site)?.status())?,
            None => {
                for (_, handle) in host.sites() {
                    print_status(handle.status())?;
                }
            }
        },
        Commands::Deploy { site, url } => {
            let status = site_handle(site)?.coordinator().deploy(url).await?;
            print_status(status)?;
        }
        Commands::Redeploy { site, ts } => {
            let status = site_handle(site)?.coordinator().redeploy(*ts).await?;
            print_status(status)?;
        }
        Commands::List { site } => {
            let handle = site_handle(site)?;
            let current = handle.coordinator().store().current();
            for ts in handle.coordinator().store().retained() {
                let marker = if ts == current { " (current)" } else { "" };
                println!("{ts}{marker}");
            }
        }
        Commands::Prune { site, ts } => {
            site_handle(site)?.coordinator().delete_deploy(*ts)?;
        }
        Commands::Domain { site, add, remove } => {
            let store = site_handle(site)?.coordinator().store();
            if let Some(domain) = add {
                store.add_domain(domain)?;
            }
            if let Some(domain) = remove {
                store.remove_domain(domain)?;
            }
            for domain in store.domains() {
                println!("{domain}");
            }
        }
    }
    Ok(())
}

fn print_status(status: pavilion::DeployStatus) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
