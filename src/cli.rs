/// CLI argument parsing and the interactive menu

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use regex::Regex;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

// Build timestamp injected at compile time
pub const VERSION_WITH_BUILD: &str = concat!(env!("CARGO_PKG_VERSION"), " (built: ", env!("BUILD_TIMESTAMP"), ")");

#[derive(Parser)]
#[command(name = "fleet-restore")]
#[command(author, version = VERSION_WITH_BUILD, about, long_about = None)]
pub struct Cli {
    /// Config file (default: <config dir>/fleet-restore/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Database server URL
    #[arg(long, global = true)]
    pub server_url: Option<String>,

    /// Directory holding the dump files
    #[arg(long, global = true)]
    pub backup_dir: Option<PathBuf>,

    /// Dump tool executable
    #[arg(long, global = true)]
    pub tool_path: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print the run report as JSON instead of a table
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Export databases to dump files
    Export {
        /// Export only this database
        #[arg(short, long, conflicts_with = "filter")]
        database: Option<String>,

        /// Export only databases whose name matches this regex
        #[arg(short, long)]
        filter: Option<Regex>,
    },

    /// Recreate databases from dump files
    Import {
        /// Import only this database
        #[arg(short, long, conflicts_with = "filter")]
        database: Option<String>,

        /// Import only dump files whose database name matches this regex
        #[arg(short, long)]
        filter: Option<Regex>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// View the effective configuration
    View,

    /// Validate configuration
    Validate,

    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// What one run of the tool does
#[derive(Debug, Clone)]
pub enum Job {
    ExportAll(Option<Regex>),
    ImportAll(Option<Regex>),
    ExportOne(String),
    ImportOne(String),
}

impl Job {
    pub fn export(database: Option<String>, filter: Option<Regex>) -> Self {
        match database {
            Some(name) => Job::ExportOne(name),
            None => Job::ExportAll(filter),
        }
    }

    pub fn import(database: Option<String>, filter: Option<Regex>) -> Self {
        match database {
            Some(name) => Job::ImportOne(name),
            None => Job::ImportAll(filter),
        }
    }
}

const MENU: &str = "\
1 - Export all databases
2 - Import all databases
3 - Export one database
4 - Import one database";

/// Show the numbered menu on stdout and read the choice from stdin.
/// `None` means the choice was not one of the listed numbers.
pub fn prompt_menu() -> Result<Option<Job>> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();
    menu_choice(&mut input, &mut output)
}

fn menu_choice<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> Result<Option<Job>> {
    writeln!(output, "{}", MENU)?;
    let choice = read_answer(input, output, "Choice: ")?;

    let job = match choice.as_str() {
        "1" => Job::ExportAll(None),
        "2" => Job::ImportAll(None),
        "3" => Job::ExportOne(read_answer(input, output, "Database name: ")?),
        "4" => Job::ImportOne(read_answer(input, output, "Database name: ")?),
        _ => return Ok(None),
    };

    Ok(Some(job))
}

fn read_answer<R: BufRead, W: Write>(input: &mut R, output: &mut W, prompt: &str) -> Result<String> {
    write!(output, "{}", prompt)?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line).context("Failed to read from stdin")?;
    Ok(line.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn choose(answers: &str) -> Option<Job> {
        let mut output = Vec::new();
        menu_choice(&mut Cursor::new(answers.as_bytes()), &mut output).unwrap()
    }

    #[test]
    fn test_menu_choices() {
        assert!(matches!(choose("1\n"), Some(Job::ExportAll(None))));
        assert!(matches!(choose("2\n"), Some(Job::ImportAll(None))));
        assert!(matches!(choose("3\ncs.RA.orders\n"), Some(Job::ExportOne(n)) if n == "cs.RA.orders"));
        assert!(matches!(choose(" 4 \r\n shop \n"), Some(Job::ImportOne(n)) if n == "shop"));
    }

    #[test]
    fn test_menu_rejects_anything_else() {
        assert!(choose("5\n").is_none());
        assert!(choose("export\n").is_none());
        assert!(choose("").is_none());
    }

    #[test]
    fn test_blank_name_is_passed_through() {
        // The orchestrator decides what a blank name means
        assert!(matches!(choose("3\n\n"), Some(Job::ExportOne(n)) if n.is_empty()));
    }

    #[test]
    fn test_cli_parses_filters() {
        let cli = Cli::try_parse_from(["fleet-restore", "import", "--filter", "^cs\\.RA", "--json"]).unwrap();
        match cli.command {
            Some(Commands::Import { database: None, filter: Some(re) }) => assert!(re.is_match("cs.RA.orders")),
            _ => panic!("unexpected command"),
        }
        assert!(cli.json);

        assert!(Cli::try_parse_from(["fleet-restore", "export", "--filter", "(unclosed"]).is_err());
        assert!(Cli::try_parse_from(["fleet-restore", "export", "-d", "a", "-f", "b"]).is_err());
    }

    #[test]
    fn test_job_selection() {
        assert!(matches!(Job::export(Some("a".into()), None), Job::ExportOne(_)));
        assert!(matches!(Job::import(None, None), Job::ImportAll(None)));
    }
}
