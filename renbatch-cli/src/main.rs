use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local, NaiveDate, TimeZone};
use clap::{Args, Parser, Subcommand};
use renbatch_core::{
    BatchHandle, BatchJob, BatchOutcome, Config, Engine, FailedItem, FileFilter, FileRecord, History,
    Pipeline, RealFileSystem, Transformed, list_files, paths, spawn_batch,
};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tabled::{Table, Tabled};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// List the files in a directory
    List {
        dir: PathBuf,
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long)]
        json: bool,
    },
    /// Preview renames
    Preview {
        dir: PathBuf,
        #[arg(short, long)]
        rules: PathBuf,
        /// Put renamed files in this directory instead of next to the originals
        #[arg(short, long)]
        target: Option<PathBuf>,
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long)]
        json: bool,
    },
    /// Execute renames
    Apply {
        dir: PathBuf,
        #[arg(short, long)]
        rules: PathBuf,
        #[arg(short, long)]
        target: Option<PathBuf>,
        #[command(flatten)]
        filter: FilterArgs,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Interactive session with undo and redo, reading commands from stdin
    Session { dir: PathBuf },
}

#[derive(Args, Default)]
struct FilterArgs {
    /// Only files with this extension (repeatable)
    #[arg(long = "ext")]
    extensions: Vec<String>,
    /// Minimum size in bytes
    #[arg(long)]
    min_size: Option<u64>,
    /// Maximum size in bytes
    #[arg(long)]
    max_size: Option<u64>,
    /// Modified on or after this date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_day_start)]
    after: Option<DateTime<Local>>,
    /// Modified on or before this date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_day_end)]
    before: Option<DateTime<Local>>,
}

impl FilterArgs {
    /// Command-line bounds win over the configured ones.
    fn merge_into(self, base: &FileFilter) -> FileFilter {
        FileFilter {
            extensions: if self.extensions.is_empty() { base.extensions.clone() } else { self.extensions },
            min_size: self.min_size.or(base.min_size),
            max_size: self.max_size.or(base.max_size),
            modified_after: self.after.or(base.modified_after),
            modified_before: self.before.or(base.modified_before),
        }
    }
}

fn parse_day(s: &str, h: u32, m: u32, sec: u32) -> Result<DateTime<Local>, String> {
    let day = NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| e.to_string())?;
    let naive = day.and_hms_opt(h, m, sec).ok_or("invalid time")?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| format!("{} does not exist in the local timezone", s))
}

fn parse_day_start(s: &str) -> Result<DateTime<Local>, String> {
    parse_day(s, 0, 0, 0)
}

fn parse_day_end(s: &str) -> Result<DateTime<Local>, String> {
    parse_day(s, 23, 59, 59)
}

#[derive(Tabled)]
struct FileRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Modified")]
    modified: String,
}

#[derive(Tabled)]
struct PreviewRow {
    #[tabled(rename = "Original")]
    original: String,
    #[tabled(rename = "New Name")]
    new_name: String,
    #[tabled(rename = "Status")]
    status: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => Config::default(),
    };
    tracing::debug!(?config, "configuration");
    let fs = Arc::new(RealFileSystem::with_case_sensitivity(!config.case_insensitive));

    match cli.command {
        Commands::List { dir, filter, json } => {
            let files = load_files(&*fs, &dir, &filter.merge_into(&config.filter))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&files)?);
            } else {
                let rows: Vec<FileRow> = files
                    .iter()
                    .map(|f| FileRow {
                        name: f.file_name(),
                        size: format_size(f.size),
                        modified: f.modified.format("%Y-%m-%d %H:%M").to_string(),
                    })
                    .collect();
                println!("{}", Table::new(rows));
            }
        }
        Commands::Preview { dir, rules, target, filter, json } => {
            let pipeline = load_pipeline(&rules)?;
            let files = load_files(&*fs, &dir, &filter.merge_into(&config.filter))?;
            let Transformed { mappings, skipped } =
                Engine::new(&*fs).transform(&paths(&files), &pipeline)?;
            let plan = Engine::new(&*fs).plan(&mappings, target.as_deref())?;
            print_skipped(&skipped);

            if json {
                println!("{}", serde_json::to_string_pretty(&plan.preview_items())?);
            } else {
                print_preview(&plan);
            }
        }
        Commands::Apply { dir, rules, target, filter, yes } => {
            let pipeline = load_pipeline(&rules)?;
            let files = load_files(&*fs, &dir, &filter.merge_into(&config.filter))?;
            let Transformed { mappings, skipped } =
                Engine::new(&*fs).transform(&paths(&files), &pipeline)?;
            print_skipped(&skipped);
            if mappings.is_empty() {
                println!("No files to rename.");
                return Ok(());
            }

            let plan = Engine::new(&*fs).plan(&mappings, target.as_deref())?;
            if !plan.is_clean() {
                print_preview(&plan);
                bail!("Cannot apply: {} conflicts detected.", plan.rejected.len());
            }

            let question = match &target {
                Some(t) => format!("Rename {} files into {}?", mappings.len(), t.display()),
                None => format!("Rename {} files?", mappings.len()),
            };
            if !yes && !confirm(&question)? {
                println!("Cancelled.");
                return Ok(());
            }

            let handle = spawn_batch(fs.clone(), config.cross_dir_mode, BatchJob::Apply {
                mappings,
                target_dir: target,
            });
            let mut outcome = wait_with_progress(handle)?;
            let executed = std::mem::replace(&mut outcome.failed, skipped);
            outcome.failed.extend(executed);
            print_outcome("Renamed", &outcome);
            if !outcome.is_clean() {
                bail!("{} files could not be renamed.", outcome.failed.len());
            }
        }
        Commands::Session { dir } => {
            let stdin = io::stdin();
            run_session(fs, &config, &dir, stdin.lock())?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_pipeline(path: &Path) -> Result<Pipeline> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read rules file: {:?}", path))?;
    Pipeline::from_json(&content).with_context(|| "Failed to parse rules JSON")
}

fn load_files(fs: &RealFileSystem, dir: &Path, filter: &FileFilter) -> Result<Vec<FileRecord>> {
    let files = list_files(fs, dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?;
    Ok(filter.apply(files))
}

fn print_preview(plan: &renbatch_core::Plan) {
    let rows: Vec<PreviewRow> = plan
        .preview_items()
        .into_iter()
        .map(|item| {
            let status = if item.conflicts.is_empty() {
                "OK".to_string()
            } else {
                format!("CONFLICT: {:?}", item.conflicts)
            };
            PreviewRow {
                original: item.original_path.file_name().unwrap_or_default().to_string_lossy().to_string(),
                new_name: item.new_path.file_name().unwrap_or_default().to_string_lossy().to_string(),
                status,
            }
        })
        .collect();
    println!("{}", Table::new(rows));
}

fn print_skipped(skipped: &[FailedItem]) {
    for item in skipped {
        eprintln!("skipped {}: {}", item.source.display(), item.error);
    }
}

fn wait_with_progress(handle: BatchHandle) -> Result<BatchOutcome> {
    let result = handle.wait(|percent| {
        eprint!("\r{:>3}%", percent);
        let _ = io::stderr().flush();
    });
    eprintln!();
    result.map_err(anyhow::Error::msg)
}

fn print_outcome(verb: &str, outcome: &BatchOutcome) {
    println!("{} {} files", verb, outcome.succeeded.len());
    if outcome.failed.is_empty() {
        return;
    }
    println!("{} failed:", outcome.failed.len());
    for item in outcome.failed.iter().take(5) {
        let name = item.source.file_name().unwrap_or_default().to_string_lossy();
        println!("- {}: {}", name, item.error);
    }
    if outcome.failed.len() > 5 {
        println!("... and {} more", outcome.failed.len() - 5);
    }
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", size, UNITS[unit])
    }
}

fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N] ", question);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

/// State kept alive across the commands of one session.
struct Session {
    fs: Arc<RealFileSystem>,
    config: Config,
    dir: PathBuf,
    pipeline: Option<Pipeline>,
    target: Option<PathBuf>,
    history: History,
}

impl Session {
    fn mappings(&self) -> Result<Transformed> {
        let Some(pipeline) = &self.pipeline else {
            bail!("no rule set; use `rule <json>` first");
        };
        let files = load_files(&self.fs, &self.dir, &self.config.filter)?;
        Ok(Engine::new(&*self.fs).transform(&paths(&files), pipeline)?)
    }

    fn run(&self, job: BatchJob) -> Result<BatchOutcome> {
        wait_with_progress(spawn_batch(self.fs.clone(), self.config.cross_dir_mode, job))
    }

    fn handle(&mut self, line: &str) -> Result<bool> {
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();
        match command {
            "" => {}
            "rule" => {
                self.pipeline = Some(Pipeline::from_json(rest)?);
                println!("Rule set.");
            }
            "target" => {
                self.target = match rest {
                    "" | "none" => None,
                    dir => Some(PathBuf::from(dir)),
                };
            }
            "list" => {
                for file in load_files(&self.fs, &self.dir, &self.config.filter)? {
                    println!("{}", file.file_name());
                }
            }
            "preview" => {
                let Transformed { mappings, skipped } = self.mappings()?;
                print_skipped(&skipped);
                print_preview(&Engine::new(&*self.fs).plan(&mappings, self.target.as_deref())?);
            }
            "apply" => {
                let Transformed { mappings, skipped } = self.mappings()?;
                let mut outcome = self.run(BatchJob::Apply { mappings, target_dir: self.target.clone() })?;
                let executed = std::mem::replace(&mut outcome.failed, skipped);
                outcome.failed.extend(executed);
                print_outcome("Renamed", &outcome);
                self.history.record(outcome.succeeded);
            }
            "undo" => {
                let steps = self.history.undo(&*self.fs)?;
                if steps.is_empty() {
                    println!("Nothing to undo.");
                } else {
                    let outcome = self.run(BatchJob::Steps(steps))?;
                    print_outcome("Restored", &outcome);
                }
            }
            "redo" => {
                let steps = self.history.redo(&*self.fs)?;
                if steps.is_empty() {
                    println!("Nothing to redo.");
                } else {
                    let outcome = self.run(BatchJob::Steps(steps))?;
                    print_outcome("Renamed", &outcome);
                }
            }
            "history" => {
                for op in self.history.undo_entries() {
                    println!("undo  {}  {}  {}", op.id, op.timestamp.format("%H:%M:%S"), op.description);
                }
                for op in self.history.redo_entries() {
                    println!("redo  {}  {}  {}", op.id, op.timestamp.format("%H:%M:%S"), op.description);
                }
            }
            "clear" => {
                self.history.clear();
                println!("History cleared.");
            }
            "quit" | "exit" => return Ok(false),
            other => println!("Unknown command: {}", other),
        }
        Ok(true)
    }
}

fn run_session(fs: Arc<RealFileSystem>, config: &Config, dir: &Path, input: impl BufRead) -> Result<()> {
    let mut session = Session {
        fs,
        config: config.clone(),
        dir: dir.to_path_buf(),
        pipeline: None,
        target: None,
        history: History::with_capacity(config.max_history),
    };

    for line in input.lines() {
        let line = line?;
        match session.handle(line.trim()) {
            Ok(true) => {}
            Ok(false) => break,
            // Errors end the command, not the session
            Err(err) => eprintln!("error: {:#}", err),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_session_apply_undo_redo() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::write(dir.path().join("b.txt"), "b").unwrap();

        let script = [
            r#"rule {"type":"prefix_suffix","prefix":"new_"}"#,
            "apply",
            "undo",
            "redo",
            "quit",
            "undo",
        ]
        .join("\n");

        let fsys = Arc::new(RealFileSystem::with_case_sensitivity(true));
        let config = Config::default();
        run_session(fsys, &config, dir.path(), script.as_bytes()).unwrap();

        assert!(dir.path().join("new_a.txt").exists());
        assert!(dir.path().join("new_b.txt").exists());
        assert!(!dir.path().join("a.txt").exists());
    }

    #[test]
    fn test_filter_args_override_config() {
        let base = FileFilter { extensions: vec!["jpg".to_string()], min_size: Some(1), ..Default::default() };
        let args = FilterArgs { max_size: Some(9), ..Default::default() };
        let merged = args.merge_into(&base);
        assert_eq!(merged.extensions, vec!["jpg".to_string()]);
        assert_eq!(merged.min_size, Some(1));
        assert_eq!(merged.max_size, Some(9));
    }

    #[test]
    fn test_parse_day_bounds() {
        let start = parse_day_start("2024-02-29").unwrap();
        let end = parse_day_end("2024-02-29").unwrap();
        assert!(start < end);
        assert!(parse_day_start("2024-13-01").is_err());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.00 KB");
    }
}
