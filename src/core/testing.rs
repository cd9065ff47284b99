//! In-memory admin API and scripted dump tool for tests.
//!
//! Both fakes write into one [`Journal`] so tests can assert the order of
//! admin calls and tool runs across components. [`CapturedLogs`] collects
//! the formatted log lines emitted on the test's thread.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

use crate::core::admin::{AdminApi, DatabaseDocument, IndexInfo};
use crate::core::error::{AdminError, ToolError};
use crate::core::process::{ToolCommand, ToolOutput, ToolRunner};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Create { database: String, bundles: Vec<String> },
    Delete { database: String, hard: bool },
    Tool { action: String, database: String, file: String },
    ListIndexes { database: String },
    ResetIndex { database: String, index: String },
    SaveDocument { database: String, bundles: Vec<String>, allow_bundles_change: bool },
}

#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Event>>>);

impl Journal {
    pub fn push(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    pub fn tool_runs(&self, database: &str) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Tool { database: d, .. } if d == database))
            .count()
    }

    /// Dump file handed to each tool run, in order
    pub fn tool_files(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Tool { file, .. } => Some(file),
                _ => None,
            })
            .collect()
    }

    /// Events reduced to "kind:database" strings, index resets and saves dropped
    pub fn outline(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Create { database, .. } => Some(format!("create:{}", database)),
                Event::Delete { database, .. } => Some(format!("delete:{}", database)),
                Event::Tool { action, database, .. } => Some(format!("{}:{}", action, database)),
                Event::ListIndexes { database } => Some(format!("finalize:{}", database)),
                Event::ResetIndex { .. } | Event::SaveDocument { .. } => None,
            })
            .collect()
    }
}

#[derive(Debug, Default)]
struct FakeState {
    databases: BTreeMap<String, DatabaseDocument>,
    indexes: HashMap<String, Vec<IndexInfo>>,
    failing_resets: HashSet<(String, String)>,
    failing_index_listing: HashSet<String>,
    failing_creates: HashSet<String>,
    failing_saves: bool,
    document_fetches: usize,
    name_pages: usize,
}

/// Admin API backed by a map of database documents
#[derive(Debug, Default)]
pub struct FakeAdmin {
    journal: Journal,
    state: Mutex<FakeState>,
}

impl FakeAdmin {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            state: Mutex::new(FakeState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn with_database(self, name: &str, disabled: bool) -> Self {
        let mut doc = DatabaseDocument::new(name);
        doc.disabled = disabled;
        self.state().databases.insert(name.to_string(), doc);
        self
    }

    pub fn with_indexes(self, database: &str, indexes: Vec<IndexInfo>) -> Self {
        self.state().indexes.insert(database.to_string(), indexes);
        self
    }

    pub fn with_failing_reset(self, database: &str, index: &str) -> Self {
        self.state()
            .failing_resets
            .insert((database.to_string(), index.to_string()));
        self
    }

    pub fn with_failing_index_listing(self, database: &str) -> Self {
        self.state().failing_index_listing.insert(database.to_string());
        self
    }

    pub fn with_failing_create(self, database: &str) -> Self {
        self.state().failing_creates.insert(database.to_string());
        self
    }

    pub fn with_failing_saves(self) -> Self {
        self.state().failing_saves = true;
        self
    }

    pub fn has_database(&self, name: &str) -> bool {
        self.state().databases.contains_key(name)
    }

    pub fn database_count(&self) -> usize {
        self.state().databases.len()
    }

    pub fn document(&self, name: &str) -> Option<DatabaseDocument> {
        self.state().databases.get(name).cloned()
    }

    pub fn document_fetches(&self) -> usize {
        self.state().document_fetches
    }

    pub fn name_pages(&self) -> usize {
        self.state().name_pages
    }

    fn server_error(what: &str) -> AdminError {
        AdminError::Status {
            method: "FAKE".to_string(),
            url: what.to_string(),
            status: 500,
            body: "injected failure".to_string(),
        }
    }
}

impl AdminApi for FakeAdmin {
    async fn database_names(&self, start: usize, page_size: usize) -> Result<Vec<String>, AdminError> {
        let mut state = self.state();
        state.name_pages += 1;
        Ok(state
            .databases
            .keys()
            .skip(start)
            .take(page_size)
            .cloned()
            .collect())
    }

    async fn database_exists(&self, name: &str) -> Result<bool, AdminError> {
        Ok(self.has_database(name))
    }

    async fn database_document(&self, name: &str) -> Result<Option<DatabaseDocument>, AdminError> {
        let mut state = self.state();
        state.document_fetches += 1;
        Ok(state.databases.get(name).cloned())
    }

    async fn create_database(&self, document: &DatabaseDocument) -> Result<(), AdminError> {
        if self.state().failing_creates.contains(&document.id) {
            return Err(Self::server_error(&document.id));
        }
        self.journal.push(Event::Create {
            database: document.id.clone(),
            bundles: document.active_bundles(),
        });
        self.state()
            .databases
            .insert(document.id.clone(), document.clone());
        Ok(())
    }

    async fn delete_database(&self, name: &str, hard_delete: bool) -> Result<(), AdminError> {
        self.journal.push(Event::Delete {
            database: name.to_string(),
            hard: hard_delete,
        });
        self.state().databases.remove(name);
        Ok(())
    }

    async fn save_database_document(
        &self,
        document: &DatabaseDocument,
        allow_bundles_change: bool,
    ) -> Result<(), AdminError> {
        if self.state().failing_saves {
            return Err(Self::server_error(&document.id));
        }
        self.journal.push(Event::SaveDocument {
            database: document.id.clone(),
            bundles: document.active_bundles(),
            allow_bundles_change,
        });
        self.state()
            .databases
            .insert(document.id.clone(), document.clone());
        Ok(())
    }

    async fn indexes(&self, database: &str, start: usize, page_size: usize) -> Result<Vec<IndexInfo>, AdminError> {
        if start == 0 {
            self.journal.push(Event::ListIndexes {
                database: database.to_string(),
            });
        }
        let state = self.state();
        if state.failing_index_listing.contains(database) {
            return Err(Self::server_error(database));
        }
        Ok(state
            .indexes
            .get(database)
            .map(|all| all.iter().skip(start).take(page_size).cloned().collect())
            .unwrap_or_default())
    }

    async fn reset_index(&self, database: &str, index: &str) -> Result<(), AdminError> {
        if self
            .state()
            .failing_resets
            .contains(&(database.to_string(), index.to_string()))
        {
            return Err(Self::server_error(index));
        }
        self.journal.push(Event::ResetIndex {
            database: database.to_string(),
            index: index.to_string(),
        });
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Exit(i32),
    Timeout,
    SpawnFailure,
}

/// Tool runner that plays back per-database scripts; unscripted runs exit 0
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    journal: Journal,
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
}

impl ScriptedRunner {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            scripts: Mutex::new(HashMap::new()),
        }
    }

    fn script(self, database: &str, steps: impl IntoIterator<Item = Step>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(database.to_string())
            .or_default()
            .extend(steps);
        self
    }

    pub fn with_exit_codes(self, database: &str, codes: impl IntoIterator<Item = i32>) -> Self {
        self.script(database, codes.into_iter().map(Step::Exit))
    }

    pub fn with_timeouts(self, database: &str, count: usize) -> Self {
        self.script(database, std::iter::repeat(Step::Timeout).take(count))
    }

    pub fn with_spawn_failure(self, database: &str) -> Self {
        self.script(database, [Step::SpawnFailure])
    }
}

impl ToolRunner for ScriptedRunner {
    async fn run(&self, command: &ToolCommand) -> Result<ToolOutput, ToolError> {
        let action = command.args.first().cloned().unwrap_or_default();
        let database = command
            .args
            .iter()
            .find_map(|a| a.strip_prefix("--database="))
            .unwrap_or_default()
            .to_string();

        self.journal.push(Event::Tool {
            action,
            database: database.clone(),
            file: command.args.get(2).cloned().unwrap_or_default(),
        });

        let step = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&database)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Step::Exit(0));

        match step {
            Step::Exit(code) => Ok(ToolOutput {
                exit_code: Some(code),
                stdout: format!("scripted exit {}", code),
                stderr: String::new(),
                elapsed: Duration::from_millis(10),
            }),
            Step::Timeout => Err(ToolError::TimedOut {
                program: command.program_display(),
                timeout: Duration::from_secs(1),
            }),
            Step::SpawnFailure => Err(ToolError::Spawn {
                program: command.program_display(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "scripted"),
            }),
        }
    }
}

/// Log lines written while the returned guard is alive.
/// The subscriber is thread-local, so tests must stay on one thread.
#[derive(Debug, Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn install() -> (Self, DefaultGuard) {
        let logs = Self::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        (logs, guard)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    /// Lines at WARN level
    pub fn warnings(&self) -> Vec<String> {
        self.contents()
            .lines()
            .filter(|line| line.contains(" WARN "))
            .map(str::to_string)
            .collect()
    }

    pub fn has_warning(&self, text: &str) -> bool {
        self.warnings().iter().any(|line| line.contains(text))
    }
}

pub struct CapturedWriter(Arc<Mutex<Vec<u8>>>);

impl io::Write for CapturedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedWriter;

    fn make_writer(&'a self) -> Self::Writer {
        CapturedWriter(self.0.clone())
    }
}
