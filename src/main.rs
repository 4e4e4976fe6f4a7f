use anyhow::{Context, Result};
use clap::Parser;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

use svuid_gen::artifact::{self, ClassLocator};
use svuid_gen::cache::{self, Cache};
use svuid_gen::config::{ClassFilter, Config, SourceConfig};
use svuid_gen::report::{self, Format, Report, ReportEntry};
use svuid_gen::{compute_structural_id_from_descriptor, reader, scanner};
use svuid_gen::{ClassDescriptor, CoreError, ErrorKind, Grammar};

#[derive(Parser)]
#[command(name = "svuid-gen")]
#[command(about = "Compute default serialVersionUIDs from compiled class files")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "svuid.config.toml")]
    config: PathBuf,

    /// Ignore the cache and recompute every id
    #[arg(short, long)]
    force: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Watch mode: monitor class files for changes and recompute
    #[arg(short, long)]
    watch: bool,

    /// Run the configured [rebuild] command when a class file is unavailable
    #[arg(long)]
    rebuild: bool,

    /// Canonical grammar: workbench (default) or runtime
    #[arg(long)]
    grammar: Option<Grammar>,

    /// Output format: json, text or java
    #[arg(long)]
    format: Option<Format>,

    /// Class output directory for resolving binary names (repeatable)
    #[arg(long = "classpath", value_name = "DIR")]
    classpath: Vec<PathBuf>,

    /// Class files, or binary names when --classpath is given. Skips the config file.
    targets: Vec<String>,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn resolve(project_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_root.join(path)
    }
}

fn display_source(project_root: &Path, path: &Path) -> String {
    let relative = if project_root.as_os_str().is_empty() {
        path.to_path_buf()
    } else {
        pathdiff::diff_paths(path, project_root).unwrap_or_else(|| path.to_path_buf())
    };
    relative.to_string_lossy().replace('\\', "/")
}

/// Compute ids for explicit targets, printing them instead of writing a report.
fn run_targets(cli: &Cli) -> Result<()> {
    let grammar = cli.grammar.unwrap_or_default();
    let format = cli.format.unwrap_or(Format::Text);
    let locator = ClassLocator::new(cli.classpath.iter().cloned());

    let rebuild = if cli.rebuild {
        let config = Config::load(&cli.config).with_context(|| {
            format!("--rebuild needs a config file, failed to load {:?}", cli.config)
        })?;
        let project_root = cli
            .config
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        let rebuild = config
            .rebuild
            .context("--rebuild needs a [rebuild] section in the config file")?;
        Some((rebuild, project_root))
    } else {
        None
    };

    let mut entries = Vec::new();
    let mut failed = 0;
    for target in &cli.targets {
        let by_name = !cli.classpath.is_empty() && !target.ends_with(".class");
        let fetch = || {
            if by_name {
                locator.load(target)
            } else {
                artifact::load(Path::new(target))
            }
        };

        let result = match &rebuild {
            Some((config, root)) => artifact::compute_with_rebuild(
                fetch,
                artifact::command_rebuilder(config.command.clone(), root.clone()),
                config.attempts,
                grammar,
            )
            .map(|(desc, uid)| (desc.binary_name, uid)),
            None => fetch().and_then(|bytes| {
                let desc = reader::read(&bytes)?;
                let uid = compute_structural_id_from_descriptor(&desc, grammar)?;
                Ok((desc.binary_name, uid))
            }),
        };

        match result {
            Ok((binary_name, uid)) => entries.push(ReportEntry {
                binary_name,
                source: target.clone(),
                uid,
            }),
            Err(e) => {
                eprintln!("Error: {}: {}", target, e);
                failed += 1;
            }
        }
    }

    let report = Report::new(grammar, entries);
    print!("{}", report.render(format)?);

    if failed > 0 {
        anyhow::bail!("{} of {} target(s) failed", failed, cli.targets.len());
    }
    Ok(())
}

struct Job {
    path: PathBuf,
    source: String,
}

enum Outcome {
    Computed {
        entry: ReportEntry,
        hash: String,
        cached: bool,
    },
    Filtered(String),
    Failed {
        job_index: usize,
        error: CoreError,
    },
}

struct RunContext<'a> {
    cache: &'a Cache,
    cached_names: HashMap<&'a str, &'a str>,
    filter: &'a ClassFilter,
    grammar: Grammar,
}

fn process(job_index: usize, job: &Job, ctx: &RunContext<'_>) -> Outcome {
    let failed = |error: CoreError| Outcome::Failed { job_index, error };

    let bytes = match artifact::load(&job.path) {
        Ok(bytes) => bytes,
        Err(e) => return failed(e),
    };
    let hash = cache::fingerprint(&bytes);

    if let Some(name) = ctx.cached_names.get(job.source.as_str()) {
        if let Some(uid) = ctx.cache.lookup(name, &hash) {
            if !ctx.filter.accepts(name) {
                return Outcome::Filtered(name.to_string());
            }
            return Outcome::Computed {
                entry: ReportEntry {
                    binary_name: name.to_string(),
                    source: job.source.clone(),
                    uid,
                },
                hash,
                cached: true,
            };
        }
    }

    let desc = match reader::read(&bytes) {
        Ok(desc) => desc,
        Err(e) => return failed(e.into()),
    };
    if !ctx.filter.accepts(&desc.binary_name) {
        return Outcome::Filtered(desc.binary_name);
    }
    match compute_structural_id_from_descriptor(&desc, ctx.grammar) {
        Ok(uid) => Outcome::Computed {
            entry: ReportEntry {
                binary_name: desc.binary_name,
                source: job.source.clone(),
                uid,
            },
            hash,
            cached: false,
        },
        Err(e) => failed(e),
    }
}

fn kind_label(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::ArtifactUnavailable => "unavailable",
        ErrorKind::MalformedArtifact => "malformed",
        ErrorKind::AlgorithmUnavailable => "environment",
        ErrorKind::InvalidInput => "invalid",
    }
}

fn load_descriptors(path: &Path) -> Result<Vec<ClassDescriptor>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read descriptor file {:?}", path))?;
    let descriptors: Vec<ClassDescriptor> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse descriptor file {:?}", path))?;
    Ok(descriptors)
}

/// Run the computation once
fn run_generation(cli: &Cli, config: &Config, project_root: &Path) -> Result<()> {
    let start = Instant::now();
    let grammar = cli.grammar.unwrap_or(config.hash.grammar);
    let format = cli.format.unwrap_or(config.output.format);
    let filter = ClassFilter::new(&config.filter)?;

    println!("svuid-gen v{} ({} grammar)", env!("CARGO_PKG_VERSION"), grammar);
    println!("{}", "=".repeat(50));

    let cache_path = resolve(project_root, &config.output.cache_file);
    let previous = if cli.force {
        println!("[Force mode] Ignoring cache, recomputing all ids...");
        Cache::new(grammar)
    } else {
        Cache::load(&cache_path, grammar).unwrap_or_else(|e| {
            tracing::warn!("Discarding unreadable cache {:?}: {}", cache_path, e);
            Cache::new(grammar)
        })
    };

    println!("\n[1/3] Scanning sources...");
    let mut class_files: Vec<PathBuf> = Vec::new();
    let mut descriptor_files: Vec<PathBuf> = Vec::new();
    for source in &config.sources {
        match source {
            SourceConfig::Directory { path } => {
                let resolved = resolve(project_root, path);
                if !resolved.is_dir() {
                    anyhow::bail!("Source directory not found: {:?}", resolved);
                }
                class_files.extend(scanner::scan_directory(&resolved)?);
            }
            SourceConfig::File { path } => class_files.push(resolve(project_root, path)),
            SourceConfig::Files { paths } => {
                class_files.extend(paths.iter().map(|p| resolve(project_root, p)));
            }
            SourceConfig::Glob { pattern } => {
                let resolved_pattern = if Path::new(pattern).is_absolute() {
                    pattern.clone()
                } else {
                    project_root.join(pattern).to_string_lossy().to_string()
                };
                class_files.extend(scanner::expand_glob(&resolved_pattern)?);
            }
            SourceConfig::Descriptors { path } => {
                descriptor_files.push(resolve(project_root, path));
            }
        }
    }
    let mut seen = HashSet::new();
    class_files.retain(|p| seen.insert(p.clone()));
    println!(
        "  Found {} class files, {} descriptor files",
        class_files.len(),
        descriptor_files.len()
    );

    println!("\n[2/3] Computing ids...");
    let jobs: Vec<Job> = class_files
        .into_iter()
        .map(|path| Job {
            source: display_source(project_root, &path),
            path,
        })
        .collect();
    let ctx = RunContext {
        cache: &previous,
        cached_names: previous.source_index(),
        filter: &filter,
        grammar,
    };

    let mut outcomes: Vec<Outcome> = jobs
        .par_iter()
        .enumerate()
        .map(|(i, job)| process(i, job, &ctx))
        .collect();

    if cli.rebuild {
        if let Some(rebuild) = &config.rebuild {
            let mut rebuild_step =
                artifact::command_rebuilder(rebuild.command.clone(), project_root.to_path_buf());
            for attempt in 1..=rebuild.attempts {
                let pending: Vec<usize> = outcomes
                    .iter()
                    .filter_map(|o| match o {
                        Outcome::Failed { job_index, error }
                            if error.kind() == ErrorKind::ArtifactUnavailable =>
                        {
                            Some(*job_index)
                        }
                        _ => None,
                    })
                    .collect();
                if pending.is_empty() {
                    break;
                }
                println!(
                    "  {} class file(s) unavailable, rebuilding (attempt {}/{})...",
                    pending.len(),
                    attempt,
                    rebuild.attempts
                );
                if let Err(e) = rebuild_step() {
                    eprintln!("  Rebuild failed: {}", e);
                    break;
                }
                let retried: Vec<Outcome> = pending
                    .par_iter()
                    .map(|&i| process(i, &jobs[i], &ctx))
                    .collect();
                outcomes.retain(|o| {
                    !matches!(o, Outcome::Failed { job_index, .. } if pending.contains(job_index))
                });
                outcomes.extend(retried);
            }
        } else {
            tracing::warn!("--rebuild given but the config has no [rebuild] section");
        }
    }

    let mut next_cache = Cache::new(grammar);
    let mut entries: Vec<ReportEntry> = Vec::new();
    let mut names: HashSet<String> = HashSet::new();
    let (mut cached, mut computed, mut filtered, mut failed) = (0, 0, 0, 0);

    for outcome in outcomes {
        match outcome {
            Outcome::Computed {
                entry,
                hash,
                cached: was_cached,
            } => {
                if !names.insert(entry.binary_name.clone()) {
                    tracing::warn!(
                        "Duplicate class {} in {}, keeping the first",
                        entry.binary_name,
                        entry.source
                    );
                    continue;
                }
                if was_cached {
                    cached += 1;
                } else {
                    computed += 1;
                }
                if cli.verbose {
                    let tag = if was_cached { "cached" } else { "update" };
                    println!(
                        "  [{}] {} = {}",
                        tag,
                        entry.binary_name,
                        report::java_literal(entry.uid)
                    );
                }
                next_cache.set_entry(&entry.binary_name, &entry.source, &hash, entry.uid);
                entries.push(entry);
            }
            Outcome::Filtered(name) => {
                filtered += 1;
                if cli.verbose {
                    println!("  [skip] {}", name);
                }
            }
            Outcome::Failed { job_index, error } => {
                failed += 1;
                tracing::warn!(
                    "[{}] {}: {}",
                    kind_label(error.kind()),
                    jobs[job_index].source,
                    error
                );
            }
        }
    }

    for path in &descriptor_files {
        let source = display_source(project_root, path);
        let descriptors = match load_descriptors(path) {
            Ok(descriptors) => descriptors,
            Err(e) => {
                failed += 1;
                tracing::warn!("[invalid] {}: {:#}", source, e);
                continue;
            }
        };
        for desc in descriptors {
            if !filter.accepts(&desc.binary_name) {
                filtered += 1;
                continue;
            }
            let uid = match compute_structural_id_from_descriptor(&desc, grammar) {
                Ok(uid) => uid,
                Err(error) => {
                    failed += 1;
                    tracing::warn!(
                        "[{}] {} ({}): {}",
                        kind_label(error.kind()),
                        source,
                        desc.binary_name,
                        error
                    );
                    continue;
                }
            };
            if !names.insert(desc.binary_name.clone()) {
                tracing::warn!(
                    "Duplicate class {} in {}, keeping the first",
                    desc.binary_name,
                    source
                );
                continue;
            }
            computed += 1;
            entries.push(ReportEntry {
                binary_name: desc.binary_name,
                source: source.clone(),
                uid,
            });
        }
    }

    println!(
        "  Cached: {}, Computed: {}, Skipped: {}, Failed: {}",
        cached, computed, filtered, failed
    );

    println!("\n[3/3] Writing report...");
    let total = entries.len();
    let report = Report::new(grammar, entries);
    let output_path = resolve(project_root, &config.output.path);
    if report::write_if_changed(&output_path, &report.render(format)?)? {
        println!("  Written {} ids to {:?}", total, output_path);
    } else {
        println!("  No changes for {:?}", output_path);
    }

    next_cache.save(&cache_path)?;

    println!("\n{}", "=".repeat(50));
    println!("Done! {} ids in {:?}", total, start.elapsed());

    if failed > 0 {
        anyhow::bail!("{} artifact(s) could not be processed", failed);
    }
    Ok(())
}

fn watch_paths(config: &Config, project_root: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = Vec::new();
    for source in &config.sources {
        match source {
            SourceConfig::Directory { path } => paths.push(resolve(project_root, path)),
            SourceConfig::File { path } | SourceConfig::Descriptors { path } => {
                if let Some(parent) = resolve(project_root, path).parent() {
                    paths.push(parent.to_path_buf());
                }
            }
            SourceConfig::Files { paths: files } => {
                for file in files {
                    if let Some(parent) = resolve(project_root, file).parent() {
                        paths.push(parent.to_path_buf());
                    }
                }
            }
            SourceConfig::Glob { pattern } => {
                let resolved_pattern = if Path::new(pattern).is_absolute() {
                    pattern.clone()
                } else {
                    project_root.join(pattern).to_string_lossy().to_string()
                };
                if let Ok(files) = scanner::expand_glob(&resolved_pattern) {
                    paths.extend(files.iter().filter_map(|f| f.parent().map(Path::to_path_buf)));
                }
            }
        }
    }
    paths.sort();
    paths.dedup();
    paths.retain(|p| p.exists());
    paths
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if !cli.targets.is_empty() {
        return run_targets(&cli);
    }

    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load config from {:?}", cli.config))?;
    let project_root = cli.config.parent().unwrap_or_else(|| Path::new("."));

    if !cli.watch {
        return run_generation(&cli, &config, project_root);
    }

    println!("Watch mode enabled. Monitoring for changes...");
    println!("Press Ctrl+C to stop.\n");

    let paths = watch_paths(&config, project_root);
    if paths.is_empty() {
        println!("No valid paths to watch. Exiting.");
        return Ok(());
    }

    println!("Watching paths:");
    for path in &paths {
        println!("  {}", path.display());
    }
    println!();

    if let Err(e) = run_generation(&cli, &config, project_root) {
        eprintln!("Error during generation: {:#}", e);
    }

    let (tx, rx) = channel();
    let mut watcher: RecommendedWatcher = Watcher::new(
        move |res: Result<Event, notify::Error>| {
            if let Ok(event) = res {
                if let Err(e) = tx.send(event) {
                    tracing::error!("Failed to send file event: {}", e);
                }
            }
        },
        notify::Config::default(),
    )?;
    for path in &paths {
        watcher.watch(path, RecursiveMode::Recursive)?;
    }

    const DEBOUNCE_MS: u64 = 300;
    let mut last_change_time = Instant::now();
    let mut pending_generation = false;

    loop {
        if let Ok(event) = rx.recv_timeout(Duration::from_millis(100)) {
            if matches!(
                event.kind,
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) | EventKind::Any
            ) && event.paths.iter().any(|p| {
                scanner::is_class_file(p) || p.extension().is_some_and(|ext| ext == "json")
            }) && !event.paths.iter().any(|p| is_own_output(p, &config, project_root))
            {
                pending_generation = true;
                last_change_time = Instant::now();
            }
        }

        if pending_generation && last_change_time.elapsed().as_millis() as u64 >= DEBOUNCE_MS {
            println!("\nChanges detected, recomputing...");
            if let Err(e) = run_generation(&cli, &config, project_root) {
                eprintln!("Error during generation: {:#}", e);
            }
            println!("\nWatching for changes (press Ctrl+C to stop)...\n");
            pending_generation = false;
        }
    }
}

/// The report and cache live next to the sources; their writes must not retrigger a run.
fn is_own_output(path: &Path, config: &Config, project_root: &Path) -> bool {
    let own = [
        resolve(project_root, &config.output.path),
        resolve(project_root, &config.output.cache_file),
    ];
    own.iter().any(|o| {
        o == path
            || match (o.canonicalize(), path.canonicalize()) {
                (Ok(a), Ok(b)) => a == b,
                _ => false,
            }
    })
}
