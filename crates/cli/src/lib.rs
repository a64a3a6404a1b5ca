mod build;
mod extract;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use build::BuildArgs;

#[derive(Parser)]
#[command(
    name = "rejar",
    version,
    about = "Relocate and repackage JVM dependency archives",
    long_about = "Rejar merges a set of input jars into one output jar, rewriting package \
                  prefixes both in entry paths and inside classfile constant pools so the \
                  bundled copies cannot collide with other copies elsewhere on a classpath. \
                  It can optionally drop classes unreachable from the primary code and \
                  extract the result as a directory tree."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Merge, relocate and emit a shaded jar
    #[command(
        long_about = "Resolves the declared inputs, merges their entries, applies the \
                      relocation rules, optionally minimizes against the primary root set, \
                      and writes one deterministic output jar. Options extend or override \
                      the JSON configuration file when both are given."
    )]
    Build(BuildArgs),
    /// Unpack a jar into a directory tree
    Extract {
        /// The archive to unpack
        #[arg(value_name = "JAR")]
        jar: PathBuf,
        /// Destination directory; a previous tree there is replaced
        #[arg(long = "into", value_name = "DIR")]
        destination: PathBuf,
        /// Omit directories that contain no files
        #[arg(long)]
        skip_empty_dirs: bool,
    },
}

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let _guard = rejar_core::logging::init_logging("cli", true);

    match cli.command {
        Commands::Build(args) => build::run(args),
        Commands::Extract {
            jar,
            destination,
            skip_empty_dirs,
        } => extract::run(jar, destination, skip_empty_dirs),
    }
}
