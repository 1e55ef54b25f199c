//! Line-oriented catalog shell.
//!
//! # Responsibility
//! - Parse one command per input line.
//! - Map each command onto one store query or ingest use-case.
//!
//! # Invariants
//! - Unrecognized input prints an error and the shell keeps reading.
//! - `quit` and end of input both end the session normally.

use contentdex_core::{
    CatalogQuery, CatalogStore, ContentId, IngestService, RepoId, ScanOptions, ScanReport,
};
use std::io::{self, BufRead, Write};

const INDENT: &str = "      ";

/// One parsed shell command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Quit,
    ListFiles,
    ListRepositories,
    AddRepository {
        path: String,
        description: String,
        allow_duplicate: bool,
    },
    Scan(RepoId),
    Where(ContentId),
    Empty,
}

/// Parses one input line.
pub fn parse_command(line: &str) -> Result<Command, String> {
    let trimmed = line.trim();
    let lowered = trimmed.to_ascii_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().collect();

    match words.as_slice() {
        [] => Ok(Command::Empty),
        ["h"] | ["help"] => Ok(Command::Help),
        ["q"] | ["quit"] | ["exit"] => Ok(Command::Quit),
        ["f"] | ["files"] | ["list", "files"] => Ok(Command::ListFiles),
        ["r"] | ["repos"] | ["list", "repositories"] => Ok(Command::ListRepositories),
        ["add", "repository", ..] | ["add", "repository!", ..] => {
            let allow_duplicate = words[1].ends_with('!');
            let rest = strip_words(trimmed, 2);
            let (path, description) = split_first_argument(rest)
                .ok_or_else(|| "usage: add repository <path> <description>".to_string())?;
            if description.is_empty() {
                return Err("usage: add repository <path> <description>".to_string());
            }
            Ok(Command::AddRepository {
                path,
                description: description.to_string(),
                allow_duplicate,
            })
        }
        ["scan", id] => id
            .parse::<RepoId>()
            .map(Command::Scan)
            .map_err(|_| format!("invalid repository id `{id}`")),
        ["where", id] => ContentId::parse(id)
            .map(Command::Where)
            .map_err(|err| err.to_string()),
        _ => Err(format!(
            "Command '{trimmed}' not recognized, type 'h' for help."
        )),
    }
}

/// Drops the first `count` whitespace-separated words, keeping original case.
fn strip_words(line: &str, count: usize) -> &str {
    let mut rest = line.trim_start();
    for _ in 0..count {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        rest = rest[end..].trim_start();
    }
    rest
}

/// Splits `"<path>" rest` or `<path> rest`; quotes allow spaces in paths.
fn split_first_argument(input: &str) -> Option<(String, &str)> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if let Some(quoted) = input.strip_prefix('"') {
        let end = quoted.find('"')?;
        return Some((quoted[..end].to_string(), quoted[end + 1..].trim()));
    }
    let end = input.find(char::is_whitespace).unwrap_or(input.len());
    Some((input[..end].to_string(), input[end..].trim()))
}

/// Interactive session bound to one catalog.
pub struct Shell<S: CatalogStore + CatalogQuery> {
    service: IngestService<S>,
    prompt: String,
}

impl<S: CatalogStore + CatalogQuery> Shell<S> {
    pub fn new(service: IngestService<S>, prompt: impl Into<String>) -> Self {
        Self {
            service,
            prompt: prompt.into(),
        }
    }

    /// Reads commands until `quit` or end of input.
    pub fn run(&self, input: impl BufRead, mut output: impl Write) -> io::Result<()> {
        let mut lines = input.lines();
        loop {
            write!(output, "{}> ", self.prompt)?;
            output.flush()?;
            let Some(line) = lines.next().transpose()? else {
                writeln!(output)?;
                return Ok(());
            };

            match parse_command(&line) {
                Ok(Command::Quit) => {
                    writeln!(output, "{INDENT}Bye Bye...")?;
                    return Ok(());
                }
                Ok(command) => self.execute(command, &mut output)?,
                Err(message) => writeln!(output, "{INDENT}{message}")?,
            }
        }
    }

    fn execute(&self, command: Command, out: &mut impl Write) -> io::Result<()> {
        match command {
            Command::Empty | Command::Quit => Ok(()),
            Command::Help => print_help(out),
            Command::ListFiles => self.list_files(out),
            Command::ListRepositories => self.list_repositories(out),
            Command::AddRepository {
                path,
                description,
                allow_duplicate,
            } => self.add_repository(&path, &description, allow_duplicate, out),
            Command::Scan(repo_id) => self.scan(repo_id, out),
            Command::Where(content_id) => self.where_is(&content_id, out),
        }
    }

    fn list_files(&self, out: &mut impl Write) -> io::Result<()> {
        match self.service.store().list_contents() {
            Ok(records) => {
                for record in &records {
                    writeln!(out, "{INDENT} {}", record.content_id)?;
                }
                writeln!(out, "{INDENT}{} Total record(s)", records.len())
            }
            Err(err) => writeln!(out, "{INDENT}error: {err}"),
        }
    }

    fn list_repositories(&self, out: &mut impl Write) -> io::Result<()> {
        match self.service.store().list_repositories() {
            Ok(repositories) => {
                for repo in &repositories {
                    writeln!(
                        out,
                        "{INDENT} [{}] {} ({})",
                        repo.repo_id, repo.path, repo.description
                    )?;
                }
                writeln!(out, "{INDENT}{} Total repositories", repositories.len())
            }
            Err(err) => writeln!(out, "{INDENT}error: {err}"),
        }
    }

    fn add_repository(
        &self,
        path: &str,
        description: &str,
        allow_duplicate: bool,
        out: &mut impl Write,
    ) -> io::Result<()> {
        match self
            .service
            .add_repository(path, description, allow_duplicate)
        {
            Ok(Some(repo_id)) => {
                writeln!(out, "{INDENT}Added repository {repo_id}")?;
                self.scan_path(repo_id, path, out)
            }
            Ok(None) => writeln!(
                out,
                "{INDENT}A repository with path '{path}' already exists; use 'add repository!' to add it anyway."
            ),
            Err(err) => writeln!(out, "{INDENT}error: {err}"),
        }
    }

    fn scan(&self, repo_id: RepoId, out: &mut impl Write) -> io::Result<()> {
        match self.service.store().get_repository(repo_id) {
            Ok(Some(repo)) => self.scan_path(repo_id, &repo.path, out),
            Ok(None) => writeln!(out, "{INDENT}error: unknown repository: {repo_id}"),
            Err(err) => writeln!(out, "{INDENT}error: {err}"),
        }
    }

    fn scan_path(&self, repo_id: RepoId, path: &str, out: &mut impl Write) -> io::Result<()> {
        match self
            .service
            .scan_into_repository(path, repo_id, &ScanOptions::default())
        {
            Ok(report) => print_report(&report, out),
            Err(err) => writeln!(out, "{INDENT}error: {err}"),
        }
    }

    fn where_is(&self, content_id: &ContentId, out: &mut impl Write) -> io::Result<()> {
        match self.service.store().list_locations(content_id) {
            Ok(locations) => {
                for location in &locations {
                    writeln!(
                        out,
                        "{INDENT} [{}] {}",
                        location.repo_id, location.observed_path
                    )?;
                }
                writeln!(out, "{INDENT}{} Total location(s)", locations.len())
            }
            Err(err) => writeln!(out, "{INDENT}error: {err}"),
        }
    }
}

fn print_report(report: &ScanReport, out: &mut impl Write) -> io::Result<()> {
    writeln!(
        out,
        "{INDENT}Scanned {} file(s): {} new content, {} new location(s)",
        report.files_seen, report.content_created, report.locations_created
    )?;
    for skipped in &report.skipped {
        writeln!(
            out,
            "{INDENT}  skipped {}: {}",
            skipped.path.display(),
            skipped.cause
        )?;
    }
    for failure in &report.partial_failures {
        writeln!(out, "{INDENT}  could not read {failure}")?;
    }
    if report.cancelled {
        writeln!(out, "{INDENT}  scan cancelled")?;
    }
    Ok(())
}

fn print_help(out: &mut impl Write) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "  Available commands")?;
    writeln!(out, "  ------------------")?;
    writeln!(out, "     q | quit                --> Exit the program")?;
    writeln!(out, "     h | help                --> Show this message")?;
    writeln!(out, "     f | list files          --> Show content table")?;
    writeln!(out, "     r | list repositories   --> Show repository table")?;
    writeln!(
        out,
        "     add repository <p> <d>  --> Register directory 'p' and scan it"
    )?;
    writeln!(
        out,
        "     add repository! <p> <d> --> Same, even if 'p' is already registered"
    )?;
    writeln!(out, "     scan <id>               --> Re-scan repository 'id'")?;
    writeln!(out, "     where <content>         --> Show locations of a content id")?;
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::{parse_command, Command, Shell};
    use contentdex_core::db::open_db_in_memory;
    use contentdex_core::{Fingerprinter, IngestService, SqliteCatalogStore};
    use std::io::Cursor;

    #[test]
    fn parses_aliases_case_insensitively() {
        assert_eq!(parse_command("  H "), Ok(Command::Help));
        assert_eq!(parse_command("QUIT"), Ok(Command::Quit));
        assert_eq!(parse_command("list files"), Ok(Command::ListFiles));
        assert_eq!(parse_command("r"), Ok(Command::ListRepositories));
        assert_eq!(parse_command(""), Ok(Command::Empty));
        assert_eq!(parse_command("scan 3"), Ok(Command::Scan(3)));
    }

    #[test]
    fn add_repository_keeps_path_case_and_quoted_spaces() {
        assert_eq!(
            parse_command("add repository \"/Volumes/My Disk\" Blue USB drive"),
            Ok(Command::AddRepository {
                path: "/Volumes/My Disk".to_string(),
                description: "Blue USB drive".to_string(),
                allow_duplicate: false,
            })
        );
        assert_eq!(
            parse_command("ADD REPOSITORY! /mnt/Usb Second"),
            Ok(Command::AddRepository {
                path: "/mnt/Usb".to_string(),
                description: "Second".to_string(),
                allow_duplicate: true,
            })
        );
    }

    #[test]
    fn rejects_incomplete_or_unknown_commands() {
        assert!(parse_command("add repository /tmp").is_err());
        assert!(parse_command("add repository").is_err());
        assert!(parse_command("scan abc").is_err());
        assert!(parse_command("where 1234").is_err());
        let err = parse_command("frobnicate").expect_err("unknown command");
        assert!(err.contains("not recognized"));
    }

    #[test]
    fn session_adds_scans_and_lists() {
        let dir = tempfile::tempdir().expect("create temp dir");
        std::fs::write(dir.path().join("a.txt"), "Hello World!").expect("write fixture");
        std::fs::write(dir.path().join("b.txt"), "Hello World!").expect("write fixture");

        let conn = open_db_in_memory().expect("open in-memory db");
        let store = SqliteCatalogStore::try_new(&conn).expect("create store");
        let shell = Shell::new(IngestService::new(store, Fingerprinter::default()), "test");

        let script = format!(
            "add repository {root} Temp\nadd repository {root} Again\nf\nr\nwhere ed076287532e86365e841e92bfc50d8c\nbogus\nq\nf\n",
            root = dir.path().display()
        );
        let mut output = Vec::new();
        shell.run(Cursor::new(script), &mut output).expect("run shell session");
        let text = String::from_utf8(output).expect("utf8 output");

        assert!(text.contains("Added repository 1"));
        assert!(text.contains("Scanned 2 file(s): 1 new content, 2 new location(s)"));
        assert!(text.contains("already exists"));
        assert!(text.contains("ed076287532e86365e841e92bfc50d8c"));
        assert!(text.contains("1 Total record(s)"));
        assert!(text.contains("1 Total repositories"));
        assert!(text.contains("2 Total location(s)"));
        assert!(text.contains("Command 'bogus' not recognized"));
        assert!(text.trim_end().ends_with("Bye Bye..."));
    }

    #[test]
    fn end_of_input_ends_session() {
        let conn = open_db_in_memory().expect("open in-memory db");
        let store = SqliteCatalogStore::try_new(&conn).expect("create store");
        let shell = Shell::new(IngestService::new(store, Fingerprinter::default()), "test");

        let mut output = Vec::new();
        shell.run(Cursor::new("r\n"), &mut output).expect("run shell session");
        let text = String::from_utf8(output).expect("utf8 output");
        assert!(text.contains("0 Total repositories"));
    }
}
