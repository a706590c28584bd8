//! usdcat - inspect and convert USD files.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use tinyusdz::loader::read_layer_file;
use tinyusdz::prelude::*;
use tinyusdz::stage::value_json;
use tinyusdz::usdc::read_bootstrap;

#[derive(Parser, Debug)]
#[command(name = "usdcat", author, version, about, long_about = None)]
struct Args {
    /// More output (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only report errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Do not follow payload arcs.
    #[arg(long, global = true)]
    no_payload: bool,

    /// Variant selection override, `PRIM:SET=VARIANT` (repeatable).
    #[arg(long = "variant", value_name = "SELECTION", global = true)]
    variants: Vec<String>,

    /// Extra directory searched for asset paths (repeatable).
    #[arg(long = "search-path", short = 'I', value_name = "DIR", global = true)]
    search_paths: Vec<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a file as usda.
    Dump {
        file: PathBuf,
        /// Compose the stage first; `--flatten=false` prints the root layer only.
        #[arg(long, default_value_t = true, action = ArgAction::Set)]
        flatten: bool,
    },
    /// Convert to `.usda` or `.json` (picked from the output extension).
    Convert { input: PathBuf, output: PathBuf },
    /// Show one composed prim.
    Resolve {
        file: PathBuf,
        #[arg(value_name = "PRIM_PATH")]
        prim: String,
    },
    /// Format, version and counts.
    Info { file: PathBuf },
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn options(args: &Args) -> Result<LoadOptions> {
    let mut opts = LoadOptions::default().with_payload(!args.no_payload);
    for dir in &args.search_paths {
        opts = opts.with_search_path(dir);
    }
    for spec in &args.variants {
        let (prim, selection) = spec
            .split_once(':')
            .with_context(|| format!("variant `{spec}` is not PRIM:SET=VARIANT"))?;
        let (set, variant) = selection
            .split_once('=')
            .with_context(|| format!("variant `{spec}` is not PRIM:SET=VARIANT"))?;
        opts = opts.with_variant_selection(prim, set, variant)?;
    }
    Ok(opts)
}

fn load_stage(path: &Path, opts: &LoadOptions) -> Result<Stage> {
    let stage = load_file(path, opts).with_context(|| format!("loading {}", path.display()))?;
    for w in stage.warnings() {
        tracing::warn!("{w}");
    }
    Ok(stage)
}

fn cmd_dump(path: &Path, flatten: bool, opts: &LoadOptions) -> Result<()> {
    if flatten {
        print!("{}", load_stage(path, opts)?.export_usda()?);
    } else {
        let (layer, _) = read_layer_file(path, opts, false).with_context(|| format!("reading {}", path.display()))?;
        print!("{}", layer.to_usda());
    }
    Ok(())
}

fn cmd_convert(input: &Path, output: &Path, opts: &LoadOptions) -> Result<()> {
    let stage = load_stage(input, opts)?;
    let text = match Format::from_extension(output) {
        Some(Format::Usda) => stage.export_usda()?,
        _ if output.extension().is_some_and(|e| e.eq_ignore_ascii_case("json")) => {
            serde_json::to_string_pretty(&stage.to_json())?
        }
        _ => bail!("cannot write {}: expected a .usda or .json output", output.display()),
    };
    std::fs::write(output, text).with_context(|| format!("writing {}", output.display()))?;
    debug!(input = %input.display(), output = %output.display(), prims = stage.len(), "converted");
    Ok(())
}

fn cmd_resolve(path: &Path, prim_path: &str, opts: &LoadOptions) -> Result<()> {
    let stage = load_stage(path, opts)?;
    let target = tinyusdz::Path::new(prim_path)?;
    let Some(prim) = stage.find_prim_at_path(&target) else {
        bail!("no prim at {prim_path}");
    };

    println!("{} {}", prim.specifier(), prim.path());
    println!("  id:       {}", prim.prim_id());
    if let Some(t) = prim.type_name() {
        println!("  type:     {t}");
    }
    if let Some(kind) = prim.kind() {
        println!("  kind:     {kind}");
    }
    let arcs = prim.arcs();
    for r in &arcs.references {
        println!("  ref:      {r}");
    }
    for p in &arcs.payloads {
        println!("  payload:  {p}");
    }
    for c in arcs.inherits.iter().chain(&arcs.specializes) {
        println!("  class:    {c}");
    }
    for (set, variant) in &arcs.variant_selection {
        println!("  variant:  {set} = {variant}");
    }
    for property in prim.properties() {
        match property.get(SampleTime::Default) {
            Ok(v) => println!("  .{} = {}", property.name, value_json(&v)),
            Err(_) if property.as_relationship().is_some() => {
                let targets: Vec<String> = property.targets().iter().map(ToString::to_string).collect();
                println!("  .{} -> [{}]", property.name, targets.join(", "));
            }
            Err(_) => println!("  .{}", property.name),
        }
    }
    let children: Vec<&str> = stage.children(prim).map(Prim::name).collect();
    if !children.is_empty() {
        println!("  children: {}", children.join(", "));
    }
    Ok(())
}

fn cmd_info(path: &Path, opts: &LoadOptions) -> Result<()> {
    let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let format = Format::detect(&data)
        .or_else(|| Format::from_extension(path))
        .with_context(|| format!("{}: not a USD file", path.display()))?;
    let version = match format {
        Format::Usdc => {
            let (v, _) = read_bootstrap(&data)?;
            format!("{}.{}.{}", v[0], v[1], v[2])
        }
        Format::Usda => String::from_utf8_lossy(&data)
            .trim_start()
            .lines()
            .next()
            .and_then(|l| l.strip_prefix("#usda"))
            .map(|v| v.trim().to_owned())
            .unwrap_or_default(),
        Format::Usdz => {
            let archive = tinyusdz::usdz::UsdzArchive::open(&data, &opts.limits)?;
            let root = archive.default_root().map(|m| m.name.clone()).unwrap_or_default();
            println!("members:  {}", archive.members().len());
            format!("root {root}")
        }
    };
    let stage = load_stage(path, opts)?;
    println!("file:     {}", path.display());
    println!("format:   {}", format.name());
    println!("version:  {version}");
    println!("prims:    {}", stage.len());
    if let Some(p) = stage.default_prim() {
        println!("default:  {}", p.path());
    }
    if let Some(axis) = stage.up_axis() {
        println!("upAxis:   {axis}");
    }
    println!("warnings: {}", stage.warnings().len());
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);
    let opts = options(&args)?;

    match &args.command {
        Command::Dump { file, flatten } => cmd_dump(file, *flatten, &opts),
        Command::Convert { input, output } => cmd_convert(input, output, &opts),
        Command::Resolve { file, prim } => cmd_resolve(file, prim, &opts),
        Command::Info { file } => cmd_info(file, &opts),
    }
}
