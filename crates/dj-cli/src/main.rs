mod check;
mod repl;

use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dj_classpath::{ClasspathEntry, ClasspathIndex};
use dj_config::DjConfig;
use dj_core::Options;
use dj_types::{ClassLibrary, ClassLoader, JdkLoader, Library, LibraryContext};

#[derive(Parser)]
#[command(name = "dynjava", version, about = "DynamicJava checker and interactive interpreter")]
struct Cli {
    /// Configuration file (defaults to `dynjava.toml` in the working directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse and check `.java` files as one program
    Check(CheckArgs),
    /// Read entries from stdin and evaluate them
    Repl(ReplArgs),
}

#[derive(Args)]
struct CommonArgs {
    /// Class directories and jars, separated like `PATH` (overrides the config file)
    #[arg(long)]
    classpath: Option<String>,
    /// Require semicolons, declared variable types and access checks
    #[arg(long)]
    strict: bool,
}

#[derive(Args)]
struct CheckArgs {
    /// Files or directories searched recursively for `.java` files
    #[arg(required = true)]
    roots: Vec<PathBuf>,
    #[command(flatten)]
    common: CommonArgs,
    /// Emit JSON suitable for CI
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ReplArgs {
    #[command(flatten)]
    common: CommonArgs,
}

fn main() {
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
    let config = load_config(cli.config.as_deref())?;
    dj_config::init_tracing(&config.logging);
    match cli.command {
        Command::Check(args) => {
            let options = options(&config, &args.common);
            let classpath = classpath(&config, &args.common);
            let roots = args.roots;
            let report = on_large_stack("dynjava-check", config.repl.stack_mib, move || {
                let env = library(&classpath)?;
                Ok(check::check_roots(&roots, env, options))
            })?;
            check::print_report(&report, args.json)?;
            Ok(if report.summary.errors > 0 { 1 } else { 0 })
        }
        Command::Repl(args) => {
            let settings = repl::Settings {
                options: options(&config, &args.common),
                classpath: classpath(&config, &args.common),
                max_depth: config.repl.max_depth,
                stack_mib: config.repl.stack_mib,
            };
            repl::run(settings)?;
            Ok(0)
        }
    }
}

fn load_config(explicit: Option<&Path>) -> Result<DjConfig> {
    if let Some(path) = explicit {
        return DjConfig::load_from_path(path)
            .with_context(|| format!("loading {}", path.display()));
    }
    let cwd = std::env::current_dir().context("reading the working directory")?;
    let (config, _) = dj_config::load_for_dir(&cwd)?;
    Ok(config)
}

fn options(config: &DjConfig, args: &CommonArgs) -> Options {
    if args.strict {
        Options::strict()
    } else {
        config.options
    }
}

fn classpath(config: &DjConfig, args: &CommonArgs) -> Vec<ClasspathEntry> {
    match &args.classpath {
        Some(list) => ClasspathEntry::parse_list(list),
        None => config
            .classpath
            .iter()
            .cloned()
            .map(ClasspathEntry::from_path)
            .collect(),
    }
}

/// Runs `f` on a thread of its own so deeply nested sources and deeply recursive guest
/// code have room before the stack runs out.
fn on_large_stack<T, F>(name: &str, stack_mib: usize, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let handle = std::thread::Builder::new()
        .name(name.into())
        .stack_size(stack_mib.max(1) << 20)
        .spawn(f)
        .with_context(|| format!("starting the {name} thread"))?;
    handle
        .join()
        .map_err(|_| anyhow::anyhow!("the {name} thread panicked"))?
}

/// The JDK classes followed by the user classpath. JDK classes cannot be shadowed.
fn library(classpath: &[ClasspathEntry]) -> Result<LibraryContext> {
    let index = ClasspathIndex::build(classpath).context("indexing the classpath")?;
    tracing::debug!(target: "dj.cli", entries = classpath.len(), classes = index.len(), "classpath ready");
    let loaders: Vec<Box<dyn ClassLoader>> = vec![Box::new(JdkLoader::new()), Box::new(index)];
    let classes: Rc<dyn Library> = Rc::new(ClassLibrary::new(loaders));
    Ok(LibraryContext::new(vec![classes]))
}
