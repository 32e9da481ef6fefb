//! Rangekeeper - IP address allocator
//!
//! Manages a single CIDR block with state persisted between runs.

mod cli;

use cli::{Cli, Commands};
use rangekeeper::range::Allocator;
use rangekeeper::{Result, Session, config};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse_args();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Run a command, returning the process exit code
fn run(cli: Cli) -> Result<i32> {
    // Commands that don't require config
    if let Commands::Completion { shell } = cli.command {
        Cli::generate_completion(shell);
        return Ok(0);
    }

    let config = config::load(&cli.config)?;
    let session = Session::open(&config)?;

    match cli.command {
        Commands::Allocate { ip } => {
            session.allocate(ip)?;
            println!("{}", ip);
        }
        Commands::Next => {
            let ip = session.allocate_next()?;
            println!("{}", ip);
        }
        Commands::Release { ip } => {
            session.release(ip)?;
            println!("Released {}", ip);
        }
        Commands::Has { ip } => {
            if session.range().has(ip) {
                println!("{} is allocated", ip);
            } else {
                println!("{} is free", ip);
                return Ok(1);
            }
        }
        Commands::List { json } => {
            let ips = session.list();
            if json {
                println!("{}", serde_json::to_string_pretty(&ips)?);
            } else if ips.is_empty() {
                println!("No addresses allocated in {}.", session.range().cidr());
            } else {
                for ip in ips {
                    println!("{}", ip);
                }
            }
        }
        Commands::Status { json } => {
            let status = session.status();
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!("Range: {}", status.cidr);
                println!("  Usable: {}", status.size);
                println!("  Used:   {}", status.used);
                println!("  Free:   {}", status.free);
            }
        }
        Commands::Reset => {
            let path = session.state_path().to_path_buf();
            if session.reset()? {
                println!("Removed state file {}", path.display());
            } else {
                println!("No state file at {}", path.display());
            }
        }
        Commands::Completion { .. } => unreachable!("handled before loading config"),
    }

    Ok(0)
}
