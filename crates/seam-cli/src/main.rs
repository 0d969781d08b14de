use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use seam_bridge::{fix_bridges, FixBridgesConfig, Outcome};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "seam", version, about = "Mapping repair for compiled JVM class libraries")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Detect compiler-synthesized bridge methods and align each
    /// corrective namespace's names with the methods they bridge to
    #[command(name = "fixBridges")]
    FixBridges(FixBridgesArgs),
}

#[derive(Args)]
struct FixBridgesArgs {
    /// Class library to analyze: a jar or an exploded class directory
    library: PathBuf,
    /// Input tiny-v1 mapping file
    mappings_in: PathBuf,
    /// Output mapping file; refuses to overwrite
    mappings_out: PathBuf,
    /// Namespace carrying the library's native names
    library_namespace: String,
    /// Namespaces whose names get corrected to the bridge's own
    #[arg(required = true)]
    corrective_namespaces: Vec<String>,
    /// Only analyze classes under this internal-name prefix
    /// (e.g. `com/example/`); vendored code stays outside it
    #[arg(long)]
    filter: Option<String>,
    /// Extra jar/class-dir for resolving ancestors declared outside the
    /// library (repeatable)
    #[arg(long)]
    classpath: Vec<PathBuf>,
    /// Emit a JSON run summary suitable for CI
    #[arg(long)]
    json: bool,
}

fn main() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("SEAM_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            2
        }
    };

    std::process::exit(exit_code);
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::FixBridges(args) => {
            let config = FixBridgesConfig {
                library: args.library,
                mappings_in: args.mappings_in,
                mappings_out: args.mappings_out,
                library_namespace: args.library_namespace,
                corrective_namespaces: args.corrective_namespaces,
                filter_prefix: args.filter,
                classpath: args.classpath,
            };
            let outcome = fix_bridges(&config).context("fixBridges failed")?;

            if args.json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_summary(&outcome);
            }

            // Unresolvable ambiguities were excluded from the rewrite;
            // surface them in the exit code.
            Ok(if outcome.unresolved_targets > 0 { 1 } else { 0 })
        }
    }
}

fn print_summary(outcome: &Outcome) {
    if outcome.copied_verbatim {
        println!(
            "No bridges found in {} analyzed classes; mappings copied verbatim.",
            outcome.classes_analyzed
        );
        return;
    }

    println!(
        "Found {} bridges across {} analyzed classes; rewrote {} mapping lines.",
        outcome.bridges_found, outcome.classes_analyzed, outcome.lines_rewritten
    );
    if outcome.improvised_rewrites > 0 {
        println!(
            "Improvised {} rewrites whose bridge had no mapping entry.",
            outcome.improvised_rewrites
        );
    }
    if outcome.direct_references > 0 {
        println!(
            "Found {} direct references to bridge methods (see log).",
            outcome.direct_references
        );
    }
    if outcome.unresolved_targets > 0 {
        println!(
            "{} targets had unorderable bridge claimants and were left untouched.",
            outcome.unresolved_targets
        );
    }
}
