// SPDX-License-Identifier: MIT
//
// n-notepad — headless driver for the n-editor engine.
//
// Each subcommand opens one document in a Session, runs one operation,
// and exits. The same calls a windowed shell would make:
//
//   find       → Session::search + find_all
//   replace    → Session::search + replace_all + save (with backups)
//   highlight  → Session::set_language + highlight_step
//   stats      → Document::stats
//   recover    → RecoveryStore listing, restore, discard
//
// Configuration comes from config.toml (see n_editor::config); logging
// goes to stderr through env_logger, filtered by RUST_LOG or -v.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use n_editor::config::{self, EditorConfig};
use n_editor::recovery::{RecoveryHandle, RecoveryStore};
use n_editor::{SaveMode, SearchOptions, Session};
use n_syntax::Language;

// ─── Command line ───────────────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(name = "n-notepad", version, about = "Headless driver for the n-notepad editing engine")]
struct Cli {
    /// Configuration file (default: the platform config dir)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print every match of PATTERN as line:col:text
    Find {
        file: PathBuf,
        pattern: String,
        #[command(flatten)]
        search: SearchFlags,
    },

    /// Replace every match of PATTERN and save the file
    Replace {
        file: PathBuf,
        pattern: String,
        /// Replacement text; `$1` / `${1}` refer to groups with --regex
        replacement: String,
        #[command(flatten)]
        search: SearchFlags,
        /// Report the count without writing
        #[arg(long)]
        dry_run: bool,
        /// Substitute characters the file's encoding cannot hold
        #[arg(long)]
        lossy: bool,
    },

    /// Print the token spans of every line
    Highlight {
        file: PathBuf,
        /// Grammar to use instead of the one picked from the extension
        #[arg(short, long)]
        language: Option<Language>,
    },

    /// Print line, character and word counts
    Stats { file: PathBuf },

    /// Inspect and act on crash-recovery snapshots
    #[command(subcommand)]
    Recover(RecoverCommand),
}

#[derive(Debug, Subcommand)]
enum RecoverCommand {
    /// List pending snapshots, newest first
    List,
    /// Print a snapshot's content
    Show { identity: String },
    /// Write a snapshot back to a file and drop it
    Restore {
        identity: String,
        /// Destination; required for untitled documents
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Drop a snapshot without restoring it
    Discard { identity: String },
}

/// Flags overriding the `[search]` section of the config.
#[derive(Debug, Default, Args)]
struct SearchFlags {
    #[arg(short = 's', long)]
    case_sensitive: bool,
    #[arg(short, long)]
    whole_word: bool,
    #[arg(short = 'e', long)]
    regex: bool,
}

impl SearchFlags {
    const fn apply(&self, mut options: SearchOptions) -> SearchOptions {
        options.case_sensitive |= self.case_sensitive;
        options.whole_word |= self.whole_word;
        options.use_regex |= self.regex;
        options
    }
}

// ─── Commands ───────────────────────────────────────────────────────────────

fn load_config(path: Option<&Path>) -> Result<EditorConfig> {
    let path = path.map_or_else(config::default_config_file, Path::to_path_buf);
    let mut config = EditorConfig::load(&path)?;
    // One-shot commands: no background worker.
    config.autosave.enabled = false;
    config.autosave.snapshot_on_commit = false;
    Ok(config)
}

fn open(file: &Path, config: &EditorConfig) -> Result<Session> {
    Session::open(file, config.clone()).with_context(|| format!("cannot open {}", file.display()))
}

fn run(cli: Cli, out: &mut impl Write) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Find { file, pattern, search } => {
            let mut session = open(&file, &config)?;
            session.compile_and_search(&pattern, search.apply(config.search))?;
            for m in session.find_all()? {
                writeln!(out, "{}:{}:{}", m.range.start.line + 1, m.range.start.col + 1, m.text())?;
            }
        }

        Command::Replace {
            file,
            pattern,
            replacement,
            search,
            dry_run,
            lossy,
        } => {
            let mut session = open(&file, &config)?;
            session.compile_and_search(&pattern, search.apply(config.search))?;
            if dry_run {
                let count = session.find_all()?.len();
                writeln!(out, "{count} matches")?;
                return Ok(());
            }
            let (count, _) = session.replace_all(&replacement)?;
            if count > 0 {
                let mode = if lossy { SaveMode::Lossy } else { SaveMode::Strict };
                session.save(mode)?;
            }
            writeln!(out, "{count} replacements")?;
        }

        Command::Highlight { file, language } => {
            let mut session = open(&file, &config)?;
            if let Some(language) = language {
                session.set_language(language);
            }
            session.highlight_step(usize::MAX);
            for line in 0..session.document().buffer().line_count() {
                for span in session.line_tokens(line).unwrap_or_default() {
                    writeln!(out, "{}:{}-{} {}", line + 1, span.start.col, span.end.col, span.kind)?;
                }
            }
        }

        Command::Stats { file } => {
            let session = open(&file, &config)?;
            let doc = session.document();
            let stats = doc.stats();
            writeln!(
                out,
                "{} lines, {} chars, {} words ({}, {}, {})",
                stats.lines,
                stats.chars,
                stats.words,
                doc.encoding(),
                doc.line_ending(),
                doc.language()
            )?;
        }

        Command::Recover(cmd) => recover(cmd, &config, out)?,
    }
    Ok(())
}

fn recover(cmd: RecoverCommand, config: &EditorConfig, out: &mut impl Write) -> Result<()> {
    let store = RecoveryStore::new(config.recovery_dir());

    match cmd {
        RecoverCommand::List => {
            for handle in store.list_pending()? {
                writeln!(out, "{}\t{}\t{}", handle.timestamp_ms, handle.encoding, handle.identity)?;
            }
        }

        RecoverCommand::Show { identity } => {
            let record = store
                .find(&identity)?
                .ok_or_else(|| anyhow!("no snapshot for {identity}"))?;
            out.write_all(record.content.as_bytes())?;
        }

        RecoverCommand::Restore { identity, out: dest } => {
            let handle = pending(&store, &identity)?;
            let dest = match dest {
                Some(dest) => dest,
                None if Path::new(&identity).is_absolute() => PathBuf::from(&identity),
                None => bail!("{identity} has no path; pass --out"),
            };

            let mut session = if dest.exists() {
                open(&dest, config)?
            } else {
                Session::untitled(config.clone())
            };
            session.accept_recovery(&handle)?;
            session
                .save_as(&dest, SaveMode::Strict)
                .with_context(|| format!("cannot write {}", dest.display()))?;
            session.close()?;
            store.discard(&identity)?;
            writeln!(out, "restored {identity} to {}", dest.display())?;
        }

        RecoverCommand::Discard { identity } => {
            if !store.discard(&identity)? {
                bail!("no snapshot for {identity}");
            }
        }
    }
    Ok(())
}

fn pending(store: &RecoveryStore, identity: &str) -> Result<RecoveryHandle> {
    store
        .list_pending()?
        .into_iter()
        .find(|h| h.identity == identity)
        .ok_or_else(|| anyhow!("no snapshot for {identity}"))
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let stdout = io::stdout();
    if let Err(e) = run(cli, &mut stdout.lock()) {
        eprintln!("n-notepad: {e:#}");
        process::exit(1);
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use n_editor::Encoding;
    use std::fs;

    /// Parse `args` (without the program name) with a config pointing into
    /// `dir`.
    fn cli(dir: &Path, args: &[&str]) -> Cli {
        let config = dir.join("config.toml");
        if !config.exists() {
            let recovery = dir.join("recovery");
            let backups = dir.join("backups");
            fs::write(
                &config,
                format!(
                    "[autosave]\ndirectory = {:?}\n[files]\nbackup_directory = {:?}\n",
                    recovery.display().to_string(),
                    backups.display().to_string()
                ),
            )
            .unwrap();
        }
        let config = config.display().to_string();
        let mut argv = vec!["n-notepad", "--config", config.as_str()];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    fn run_ok(cli: Cli) -> String {
        let mut out = Vec::new();
        run(cli, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    // ── Parsing ───────────────────────────────────────────────────────────

    #[test]
    fn parses_search_flags() {
        let cli = Cli::try_parse_from(["n-notepad", "find", "a.txt", "fo+", "-e", "-w"]).unwrap();
        let Command::Find { pattern, search, .. } = cli.command else {
            panic!("expected find");
        };
        assert_eq!(pattern, "fo+");
        let options = search.apply(SearchOptions::default());
        assert!(options.use_regex);
        assert!(options.whole_word);
        assert!(!options.case_sensitive);
    }

    #[test]
    fn parses_language_names() {
        let cli = Cli::try_parse_from(["n-notepad", "highlight", "x", "--language", "py"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Highlight {
                language: Some(Language::Python),
                ..
            }
        ));
        assert!(Cli::try_parse_from(["n-notepad", "highlight", "x", "-l", "cobol"]).is_err());
    }

    #[test]
    fn verbosity_counts() {
        let cli = Cli::try_parse_from(["n-notepad", "-vv", "recover", "list"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Command::Recover(RecoverCommand::List)));
    }

    // ── Running ───────────────────────────────────────────────────────────

    #[test]
    fn find_prints_one_based_positions() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.txt");
        fs::write(&file, "one two\ntwo\n").unwrap();

        let out = run_ok(cli(dir.path(), &["find", file.to_str().unwrap(), "two"]));
        assert_eq!(out, "1:5:two\n2:1:two\n");
    }

    #[test]
    fn replace_saves_and_backs_up() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.txt");
        fs::write(&file, "foo bar foo\n").unwrap();

        let out = run_ok(cli(dir.path(), &["replace", file.to_str().unwrap(), "foo", "baz"]));
        assert_eq!(out, "2 replacements\n");
        assert_eq!(fs::read_to_string(&file).unwrap(), "baz bar baz\n");
        assert_eq!(fs::read_dir(dir.path().join("backups")).unwrap().count(), 1);
    }

    #[test]
    fn dry_run_leaves_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.txt");
        fs::write(&file, "foo foo").unwrap();

        let out = run_ok(cli(
            dir.path(),
            &["replace", file.to_str().unwrap(), "foo", "x", "--dry-run"],
        ));
        assert_eq!(out, "2 matches\n");
        assert_eq!(fs::read_to_string(&file).unwrap(), "foo foo");
    }

    #[test]
    fn bad_regex_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.txt");
        fs::write(&file, "[").unwrap();

        let mut out = Vec::new();
        let err = run(cli(dir.path(), &["find", file.to_str().unwrap(), "[", "--regex"]), &mut out).unwrap_err();
        assert!(err.to_string().contains('['));
    }

    #[test]
    fn stats_reports_counts() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.py");
        fs::write(&file, "x = 1\ny = 2\n").unwrap();

        let out = run_ok(cli(dir.path(), &["stats", file.to_str().unwrap()]));
        assert!(out.starts_with("3 lines, 12 chars, 4 words"), "{out}");
        assert!(out.contains("python"), "{out}");
    }

    #[test]
    fn highlight_prints_spans() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.json");
        fs::write(&file, "{\"a\": 1}").unwrap();

        let out = run_ok(cli(dir.path(), &["highlight", file.to_str().unwrap()]));
        assert!(out.lines().all(|l| l.starts_with("1:")), "{out}");
        assert!(out.contains("number"), "{out}");
    }

    #[test]
    fn restore_writes_snapshot_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("draft.txt");
        fs::write(&file, "old").unwrap();

        let store = RecoveryStore::new(dir.path().join("recovery"));
        let identity = fs::canonicalize(&file).unwrap().display().to_string();
        store.snapshot(&identity, Encoding::Utf8, "recovered text").unwrap();

        let out = run_ok(cli(dir.path(), &["recover", "list"]));
        assert!(out.contains(&identity), "{out}");

        let out = run_ok(cli(dir.path(), &["recover", "show", &identity]));
        assert_eq!(out, "recovered text");

        run_ok(cli(dir.path(), &["recover", "restore", &identity]));
        assert_eq!(fs::read_to_string(&file).unwrap(), "recovered text");
        assert!(store.list_pending().unwrap().is_empty());
    }

    #[test]
    fn untitled_restore_needs_destination() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecoveryStore::new(dir.path().join("recovery"));
        store.snapshot("untitled-3", Encoding::Utf8, "scratch").unwrap();

        let mut out = Vec::new();
        assert!(run(cli(dir.path(), &["recover", "restore", "untitled-3"]), &mut out).is_err());

        let dest = dir.path().join("scratch.txt");
        run_ok(cli(
            dir.path(),
            &["recover", "restore", "untitled-3", "--out", dest.to_str().unwrap()],
        ));
        assert_eq!(fs::read_to_string(&dest).unwrap(), "scratch");
    }

    #[test]
    fn discard_unknown_snapshot_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut out = Vec::new();
        assert!(run(cli(dir.path(), &["recover", "discard", "nothing"]), &mut out).is_err());
    }
}
