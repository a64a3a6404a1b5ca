use clap::Args;
use std::path::PathBuf;
use tracing::info;

use rejar_core::{
    BuildConfig, DuplicatePolicy, ExclusionRule, ExtractSpec, InputSpec, RelocationRule,
    Repackager,
};

#[derive(Args)]
pub struct BuildArgs {
    /// JSON configuration file; flags extend or override it
    #[arg(value_name = "CONFIG")]
    pub config: Option<PathBuf>,

    /// Shaded input, a path or group:artifact:version coordinate; repeatable
    #[arg(long = "input", value_name = "ARTIFACT")]
    pub inputs: Vec<String>,

    /// Primary input: never minimized, seeds the reachability roots; repeatable
    #[arg(long = "primary", value_name = "ARTIFACT")]
    pub primary: Vec<String>,

    /// Relocation rule as dotted prefixes; repeatable
    #[arg(long = "relocate", value_name = "FROM=TO")]
    pub relocations: Vec<String>,

    /// Drop a resolved input by provenance; repeatable
    #[arg(long = "exclude", value_name = "GROUP:NAME")]
    pub exclusions: Vec<String>,

    /// Drop shaded classes unreachable from the root set
    #[arg(long)]
    pub minimize: bool,

    /// Extra reachability root class (dotted name); repeatable
    #[arg(long = "root", value_name = "CLASS")]
    pub roots: Vec<String>,

    /// Keep the later copy when entries collide instead of failing
    #[arg(long)]
    pub last_wins: bool,

    /// Where to write the output jar
    #[arg(long, value_name = "JAR")]
    pub output: Option<PathBuf>,

    /// Extract the output jar into this directory after the build
    #[arg(long = "extract-to", value_name = "DIR")]
    pub extract_to: Option<PathBuf>,

    /// Omit directories left empty by relocation or minimization when extracting
    #[arg(long)]
    pub skip_empty_dirs: bool,
}

pub fn run(args: BuildArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = assemble(args)?;
    let summary = Repackager::new(config)?.build()?;

    info!(
        "Wrote {} ({} entries)",
        summary.output.display(),
        summary.entries
    );
    if summary.minimized_away > 0 {
        info!("Minimized away {} entries", summary.minimized_away);
    }
    if let Some(dir) = summary.extracted_to {
        info!("Extracted into {}", dir.display());
    }
    Ok(())
}

fn assemble(args: BuildArgs) -> Result<BuildConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => BuildConfig::from_file(path)?,
        None => BuildConfig {
            inputs: vec![],
            exclusions: vec![],
            relocations: vec![],
            minimize: false,
            roots: vec![],
            duplicates: DuplicatePolicy::default(),
            output: PathBuf::new(),
            extract: None,
        },
    };

    config
        .inputs
        .extend(args.inputs.into_iter().map(InputSpec::shaded));
    config
        .inputs
        .extend(args.primary.into_iter().map(InputSpec::primary));

    for rule in args.relocations {
        let (from, to) = rule
            .split_once('=')
            .ok_or_else(|| format!("relocation '{rule}' must be written as FROM=TO"))?;
        config.relocations.push(RelocationRule::new(from, to));
    }
    for rule in args.exclusions {
        let (group, name) = rule
            .split_once(':')
            .ok_or_else(|| format!("exclusion '{rule}' must be written as GROUP:NAME"))?;
        config.exclusions.push(ExclusionRule::new(group, name));
    }

    if args.minimize {
        config.minimize = true;
    }
    config.roots.extend(args.roots);
    if args.last_wins {
        config.duplicates = DuplicatePolicy::LastWins;
    }
    if let Some(output) = args.output {
        config.output = output;
    }
    if config.output.as_os_str().is_empty() {
        return Err("no output path: pass --output or set it in the configuration".into());
    }
    if let Some(destination) = args.extract_to {
        config.extract = Some(ExtractSpec {
            destination,
            include_empty_dirs: !args.skip_empty_dirs,
        });
    }

    Ok(config)
}
