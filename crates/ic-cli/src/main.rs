use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ic_addr::AddressResolver;
use ic_core::{Family, Settings};
use ic_rules::{Pipeline, Rendered, diff_dump, dump_to_commands};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "iptcanon")]
#[command(version, about = "Canonical iptables-save output from firewall command scripts", long_about = None)]
struct Cli {
    /// Settings file (DNS behaviour, static hosts, diagnostics)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log per-line decisions to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render canonical dump stanzas
    Render {
        /// Command script, or - for stdin
        file: String,
        #[arg(long)]
        ipv4_out: Option<PathBuf>,
        #[arg(long)]
        ipv6_out: Option<PathBuf>,
        /// Print only this family to stdout
        #[arg(long)]
        family: Option<Family>,
    },
    /// Show the per-family command lines produced by macro expansion
    Expand {
        file: String,
    },
    /// Validate a command script without printing the result
    Check {
        file: String,
    },
    /// Compare a live dump with the canonical rendering (exit 1 on drift)
    Diff {
        file: String,
        #[arg(long)]
        family: Family,
        /// Output of iptables-save / ip6tables-save
        #[arg(long)]
        against: PathBuf,
        /// Re-parse the live dump before comparing
        #[arg(long)]
        canonicalize: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = Settings::load(cli.config.as_deref())?;
    let resolver = AddressResolver::from_settings(&settings).context("Failed to set up address resolver")?;
    let pipeline = Pipeline::new(resolver);

    match cli.command {
        Commands::Render {
            file,
            ipv4_out,
            ipv6_out,
            family,
        } => render(&pipeline, &file, ipv4_out.as_deref(), ipv6_out.as_deref(), family)?,
        Commands::Expand { file } => expand(&pipeline, &file)?,
        Commands::Check { file } => check(&pipeline, &file)?,
        Commands::Diff {
            file,
            family,
            against,
            canonicalize,
        } => {
            if !diff(&pipeline, &file, family, &against, canonicalize)? {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Read a command script, dropping blank lines and `#` comments.
fn read_script(file: &str) -> Result<Vec<String>> {
    let content = if file == "-" {
        let mut content = String::new();
        std::io::stdin()
            .read_to_string(&mut content)
            .context("Failed to read script from stdin")?;
        content
    } else {
        std::fs::read_to_string(file).context(format!("Failed to read script from {file}"))?
    };

    let lines: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect();
    debug!(file, lines = lines.len(), "read script");
    Ok(lines)
}

fn run(pipeline: &Pipeline, file: &str) -> Result<Rendered> {
    let lines = read_script(file)?;
    pipeline.run(&lines).context(format!("Failed to render {file}"))
}

fn render(
    pipeline: &Pipeline,
    file: &str,
    ipv4_out: Option<&Path>,
    ipv6_out: Option<&Path>,
    family: Option<Family>,
) -> Result<()> {
    let rendered = run(pipeline, file)?;

    let outputs = [(Family::Ipv4, ipv4_out), (Family::Ipv6, ipv6_out)];
    let mut wrote = false;
    for (family, path) in outputs {
        if let Some(path) = path {
            std::fs::write(path, rendered.get(family))
                .context(format!("Failed to write {family} output to {path:?}"))?;
            info!(%family, path = ?path, "wrote rule set");
            wrote = true;
        }
    }

    match family {
        Some(family) => print!("{}", rendered.get(family)),
        None if !wrote => {
            for family in Family::ALL {
                let text = rendered.get(family);
                if !text.is_empty() {
                    println!("# {family}");
                    print!("{text}");
                }
            }
        }
        None => {}
    }
    Ok(())
}

fn expand(pipeline: &Pipeline, file: &str) -> Result<()> {
    let lines = read_script(file)?;
    let expansion = pipeline.expand(&lines).context(format!("Failed to expand {file}"))?;
    for family in Family::ALL {
        for line in expansion.lines(family) {
            println!("{line}");
        }
    }
    Ok(())
}

fn check(pipeline: &Pipeline, file: &str) -> Result<()> {
    let rendered = run(pipeline, file)?;
    let rules = |family| {
        rendered
            .get(family)
            .lines()
            .filter(|line| line.starts_with("-A "))
            .count()
    };
    println!(
        "{file}: ok ({} IPv4 rules, {} IPv6 rules)",
        rules(Family::Ipv4),
        rules(Family::Ipv6)
    );
    Ok(())
}

/// Returns whether the live dump matches the canonical rendering.
fn diff(pipeline: &Pipeline, file: &str, family: Family, against: &Path, canonicalize: bool) -> Result<bool> {
    let rendered = run(pipeline, file)?;
    let mut live = std::fs::read_to_string(against).context(format!("Failed to read dump from {against:?}"))?;

    if canonicalize {
        let commands = dump_to_commands(family, &live).context(format!("Failed to read dump {against:?}"))?;
        live = pipeline
            .render_family(family, &commands)
            .context(format!("Failed to canonicalize dump {against:?}"))?;
    }

    let result = diff_dump(family, &live, rendered.get(family))?;
    match result.diff {
        Some(diff) => {
            print!("{diff}");
            Ok(false)
        }
        None => {
            info!(%family, "no drift");
            Ok(true)
        }
    }
}
