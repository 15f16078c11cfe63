/*!
The Java workspace: an editable set of source files for one named project.

The workspace owns the file list and the output log, and coordinates its
collaborators, none of which it knows concretely:

  * a `StoragePort` for local persistence,
  * optionally a `RemoteProjects` store, present once the user has signed in,
  * a `JavaRuntime` handed to `run()`,
  * a `StdinGuest` handed to `run()` along with it; the front end keeps the
    matching `StdinHost` to answer the program's input requests.

Failures during interactive operations are appended to the output log as
well as returned, so a front end can simply show the log.
*/
use std::sync::{Arc, Weak};
use std::time::Duration;

use thiserror::Error;
use time::{format_description::well_known::Rfc3339, macros::format_description, OffsetDateTime};
use tokio::{sync::Mutex, task::JoinHandle, time::MissedTickBehavior};

use crate::project::{RemoteProject, SourceFile, INPUT_ADAPTER_FILENAME};

pub mod archive;
pub mod remote;
pub mod runtime;
pub mod stdin;
pub mod storage;

use remote::{RemoteError, RemoteProjects};
use runtime::{
    class_name_from_file, input_adapter_source, javac_args, Console, JavaRuntime,
    ProgramIo, RuntimeError, CLASSPATH, INPUT_ADAPTER_CLASS, JAVAC_MAIN, SOURCE_DIR,
};
use stdin::StdinGuest;
use storage::{project_key, SavedProject, StorageError, StoragePort};

pub const DEFAULT_PROJECT: &str = "My Java Project";
pub const AUTOSAVE_PERIOD: Duration = Duration::from_secs(30);
/// How long a running program waits for each line of input.
pub const STDIN_TIMEOUT: Duration = Duration::from_secs(60 * 5);

const MAIN_FILENAME: &str = "Main.java";

const DEFAULT_MAIN: &str = r#"import java.util.Scanner;

public class Main {
    public static void main(String args[]) {
        Scanner scan = new Scanner(System.in);
        System.out.println("Enter an integer");
        int a = scan.nextInt();
        System.out.println("Your integer: " + a);
    }
}
"#;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputKind {
    Output,
    Error,
    System,
    Input,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OutputItem {
    pub text: String,
    pub kind: OutputKind,
    /// Wall-clock `HH:MM:SS`, UTC.
    pub timestamp: String,
}

fn rfc3339(t: OffsetDateTime) -> String {
    t.format(&Rfc3339).unwrap_or_default()
}

fn clock_time(t: OffsetDateTime) -> String {
    t.format(format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_default()
}

#[derive(Debug, Default)]
pub struct OutputLog {
    items: Vec<OutputItem>,
}

impl OutputLog {
    pub fn push<S: Into<String>>(&mut self, text: S, kind: OutputKind) {
        self.items.push(OutputItem {
            text: text.into(),
            kind,
            timestamp: clock_time(OffsetDateTime::now_utc()),
        });
    }

    pub fn items(&self) -> &[OutputItem] { &self.items }

    pub fn clear(&mut self) { self.items.clear(); }
}

impl Console for OutputLog {
    fn stdout(&mut self, text: &str) { self.push(text, OutputKind::Output); }
    fn stderr(&mut self, text: &str) { self.push(text, OutputKind::Error); }
    fn input(&mut self, text: &str) { self.push(format!("> {}", text), OutputKind::Input); }
}

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("Cannot delete the last file")]
    LastFile,

    #[error("No file named {0:?}")]
    NoSuchFile(String),

    #[error("A file with the name {0:?} already exists.")]
    FileExists(String),

    #[error("Failed to open ZIP file: {0}")]
    Zip(String),

    #[error("Failed to build ZIP file: {0}")]
    Archive(String),

    #[error("Local storage: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to save to database: {0}")]
    Remote(#[from] RemoteError),

    #[error("Java virtual machine is still loading! Please wait...")]
    NotReady,

    #[error("Compilation failed.")]
    CompilationFailed(i32),

    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}

/// What `Workspace::export()` hands back for download.
#[derive(Debug, PartialEq)]
pub enum Export {
    File(SourceFile),
    Zip { filename: String, bytes: Vec<u8> },
}

fn adapter_file(target_class: &str) -> SourceFile {
    SourceFile::new(INPUT_ADAPTER_FILENAME, input_adapter_source(target_class))
}

fn default_files() -> Vec<SourceFile> {
    vec![
        SourceFile::new(MAIN_FILENAME, DEFAULT_MAIN),
        adapter_file(class_name_from_file(MAIN_FILENAME)),
    ]
}

pub struct Workspace {
    project: String,
    files: Vec<SourceFile>,
    active_file: String,
    output: OutputLog,
    saved_local: bool,
    saved_remote: bool,
    /// RFC 3339 time of the last local save (or of the loaded record).
    last_local_save: Option<String>,
    project_list: Vec<String>,
    storage: Box<dyn StoragePort>,
    remote: Option<Box<dyn RemoteProjects>>,
}

impl Workspace {
    /// A fresh workspace on the default project; nothing is loaded.
    pub fn new(storage: Box<dyn StoragePort>) -> Self {
        Self {
            project: DEFAULT_PROJECT.to_owned(),
            files: default_files(),
            active_file: MAIN_FILENAME.to_owned(),
            output: OutputLog::default(),
            saved_local: true,
            saved_remote: true,
            last_local_save: None,
            project_list: vec![DEFAULT_PROJECT.to_owned()],
            storage,
            remote: None,
        }
    }

    /// A workspace on `project`, loaded from `storage` if it's there.
    pub fn open(project: &str, storage: Box<dyn StoragePort>) -> Self {
        let mut ws = Self::new(storage);
        ws.switch_project(project);
        ws
    }

    pub fn into_storage(self) -> Box<dyn StoragePort> { self.storage }

    pub fn project(&self) -> &str { &self.project }
    pub fn project_list(&self) -> &[String] { &self.project_list }
    pub fn active_file(&self) -> &str { &self.active_file }
    pub fn output(&self) -> &[OutputItem] { self.output.items() }
    pub fn clear_output(&mut self) { self.output.clear(); }
    pub fn is_saved_local(&self) -> bool { self.saved_local }
    pub fn is_saved_remote(&self) -> bool { self.saved_remote }
    pub fn last_local_save(&self) -> Option<&str> { self.last_local_save.as_deref() }
    pub fn signed_in(&self) -> bool { self.remote.is_some() }

    /// All files, including the input adapter.
    pub fn files(&self) -> &[SourceFile] { &self.files }

    /// The files that get persisted: everything but the input adapter.
    pub fn user_files(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.iter().filter(|f| !f.is_input_adapter())
    }

    pub fn file(&self, filename: &str) -> Option<&SourceFile> {
        self.files.iter().find(|f| f.filename == filename)
    }

    fn position(&self, filename: &str) -> Option<usize> {
        self.files.iter().position(|f| f.filename == filename)
    }

    /// A remote store makes `save_project()` push, and
    /// `load_project_list()` fetch.
    pub fn sign_in(&mut self, remote: Box<dyn RemoteProjects>) {
        self.remote = Some(remote);
    }

    pub fn sign_out(&mut self) {
        self.remote = None;
        self.saved_remote = true;
    }

    /// Unsaved locally, or (when signed in) not yet pushed.
    pub fn has_unsaved_changes(&self) -> bool {
        !self.saved_local || (self.signed_in() && !self.saved_remote)
    }

    fn mark_unsaved(&mut self) {
        self.saved_local = false;
        self.saved_remote = false;
    }

    fn fail<T>(&mut self, e: WorkspaceError) -> Result<T, WorkspaceError> {
        log::debug!("Workspace {:?}: {}", &self.project, &e);
        self.output.push(e.to_string(), OutputKind::Error);
        Err(e)
    }

    pub fn set_active_file(&mut self, filename: &str) -> Result<(), WorkspaceError> {
        if self.position(filename).is_none() {
            return self.fail(WorkspaceError::NoSuchFile(filename.to_owned()));
        }
        self.active_file = filename.to_owned();
        Ok(())
    }

    /**
    Make `project` the current project: start from the default files, then
    load its local record if there is one.
    */
    pub fn switch_project(&mut self, project: &str) -> bool {
        log::trace!("Workspace::switch_project( {:?} ) called.", project);

        self.project = project.to_owned();
        self.files = default_files();
        self.active_file = MAIN_FILENAME.to_owned();
        self.saved_local = true;
        self.saved_remote = true;
        self.last_local_save = None;
        if !self.project_list.iter().any(|p| p == project) {
            self.project_list.push(project.to_owned());
        }

        self.load()
    }

    /**
    Replace the files with the current project's local record.

    Returns false, leaving everything as it was, if there's no record or it
    can't be read.
    */
    pub fn load(&mut self) -> bool {
        let key = project_key(&self.project);
        log::trace!("Workspace::load() called; key {:?}", &key);

        let raw = match self.storage.get_item(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => { return false; },
            Err(e) => {
                log::error!("Error reading {:?} from local storage: {}", &key, &e);
                let _: Result<(), _> = self.fail(e.into());
                return false;
            },
        };

        let saved: SavedProject = match serde_json::from_str(&raw) {
            Ok(saved) => saved,
            Err(e) => {
                log::error!("Error loading {:?} from local storage: {}", &key, &e);
                return false;
            },
        };

        self.install_files(saved.files, saved.active_file);
        self.saved_local = true;

        let saved_at = match OffsetDateTime::parse(&saved.timestamp, &Rfc3339) {
            Ok(t) => clock_time(t),
            Err(_) => saved.timestamp.clone(),
        };
        self.output.push(
            format!("✓ Project loaded from local storage (saved: {})", &saved_at),
            OutputKind::System,
        );
        self.last_local_save = Some(saved.timestamp);
        true
    }

    /**
    Replace the file list with `files` plus a fresh input adapter.

    Any adapter among `files` is dropped. With no files left, the project
    gets the default `Main.java`, so the adapter always has a real class to
    run. `active` becomes the active file if it's there; otherwise the first
    file does.
    */
    fn install_files(&mut self, files: Vec<SourceFile>, active: Option<String>) {
        let mut files: Vec<SourceFile> = files.into_iter()
            .filter(|f| !f.is_input_adapter())
            .collect();
        if files.is_empty() {
            log::debug!("Project {:?} has no files; using the default.", &self.project);
            files.push(SourceFile::new(MAIN_FILENAME, DEFAULT_MAIN));
        }

        let active = match active {
            Some(a) if files.iter().any(|f| f.filename == a) => a,
            _ => match files.first() {
                Some(f) => f.filename.clone(),
                None => MAIN_FILENAME.to_owned(),
            },
        };
        files.push(adapter_file(class_name_from_file(&active)));

        self.files = files;
        self.active_file = active;
    }

    /// Write the current project (without the input adapter) to local
    /// storage, overwriting any previous record.
    pub fn save_local(&mut self) -> Result<(), WorkspaceError> {
        log::trace!("Workspace::save_local() called; project {:?}", &self.project);

        let now = OffsetDateTime::now_utc();
        let saved = SavedProject {
            project: self.project.clone(),
            files: self.user_files().cloned().collect(),
            timestamp: rfc3339(now),
            active_file: Some(self.active_file.clone()),
        };

        let json = match serde_json::to_string(&saved) {
            Ok(json) => json,
            Err(e) => {
                return self.fail(StorageError::Other(e.to_string()).into());
            },
        };
        if let Err(e) = self.storage.set_item(&project_key(&self.project), &json) {
            return self.fail(e.into());
        }

        self.saved_local = true;
        self.last_local_save = Some(saved.timestamp);
        self.output.push(
            format!("✓ Project saved to local storage at {}", clock_time(now)),
            OutputKind::System,
        );
        Ok(())
    }

    /// Save locally, then push to the remote store if signed in.
    pub async fn save_project(&mut self) -> Result<(), WorkspaceError> {
        if let Err(e) = self.save_local() {
            self.output.push("✗ Failed to save to local storage", OutputKind::Error);
            return Err(e);
        }

        let project = RemoteProject {
            project: self.project.clone(),
            files: self.user_files().cloned().collect(),
        };
        let res = match &self.remote {
            None => { return Ok(()); },
            Some(remote) => remote.save(&project).await,
        };

        match res {
            Ok(()) => {
                self.saved_remote = true;
                self.output.push(
                    format!(
                        "✓ Project saved to database at {} | Files: {} | Total Lines: {}",
                        clock_time(OffsetDateTime::now_utc()),
                        project.files.len(),
                        project.total_lines(),
                    ),
                    OutputKind::System,
                );
                Ok(())
            },
            Err(e) => {
                let e = WorkspaceError::from(e);
                log::warn!("Remote save of {:?} failed: {}", &self.project, &e);
                self.output.push(format!("✗ {}", &e), OutputKind::Error);
                Err(e)
            },
        }
    }

    /// Refresh the project list from the remote store. Does nothing when
    /// signed out; failures are only logged.
    pub async fn load_project_list(&mut self) {
        let res = match &self.remote {
            None => { return; },
            Some(remote) => remote.list().await,
        };

        match res {
            Ok(names) => { self.project_list = names; },
            Err(e) => { log::warn!("Failed to load projects: {}", &e); },
        }
    }

    /**
    Replace the files with the remote copy of `project` and make it current.

    The result counts as unsaved locally (the local record is now stale) but
    saved remotely. Returns false if the remote store has no such project.
    */
    pub async fn pull_remote(&mut self, project: &str) -> Result<bool, WorkspaceError> {
        let res = match &self.remote {
            None => { return Ok(false); },
            Some(remote) => remote.fetch(project).await,
        };

        let remote_project = match res {
            Ok(Some(p)) => p,
            Ok(None) => { return Ok(false); },
            Err(e) => {
                log::warn!("Fetching {:?} failed: {}", project, &e);
                let e = WorkspaceError::from(e);
                return self.fail(e);
            },
        };

        self.project = remote_project.project;
        self.install_files(remote_project.files, Some(MAIN_FILENAME.to_owned()));
        self.saved_local = false;
        self.saved_remote = true;
        self.output.push(
            format!("✓ Project {:?} loaded from database", &self.project),
            OutputKind::System,
        );
        Ok(true)
    }

    pub fn update_file_content(&mut self, contents: &str) -> Result<(), WorkspaceError> {
        let active = self.active_file.clone();
        self.update_file(&active, contents)
    }

    pub fn update_file(&mut self, filename: &str, contents: &str) -> Result<(), WorkspaceError> {
        match self.position(filename) {
            Some(n) => {
                self.files[n].contents = contents.to_owned();
                self.mark_unsaved();
                Ok(())
            },
            None => self.fail(WorkspaceError::NoSuchFile(filename.to_owned())),
        }
    }

    /// Add an empty class with the next free `Class<N>.java` name and make it
    /// active. Returns the new file name.
    pub fn add_file(&mut self) -> String {
        let mut next: u32 = 0;
        for f in self.files.iter() {
            let suffix = match f.filename.strip_prefix("Class")
                .and_then(|s| s.strip_suffix(".java"))
            {
                Some(s) if s.chars().all(|c| c.is_ascii_digit()) => s,
                _ => { continue; },
            };
            let n: u32 = suffix.parse().unwrap_or(0);
            if n >= next {
                next = n.saturating_add(1);
            }
        }

        let filename = match next {
            0 => "Class.java".to_owned(),
            n => format!("Class{}.java", n),
        };
        let class = class_name_from_file(&filename).to_owned();
        self.files.push(SourceFile::new(
            filename.clone(),
            format!("public class {} {{\n\n}}", &class),
        ));
        self.active_file = filename.clone();
        self.mark_unsaved();
        filename
    }

    pub fn remove_file(&mut self, filename: &str) -> Result<(), WorkspaceError> {
        let n = match self.position(filename) {
            Some(n) => n,
            None => { return self.fail(WorkspaceError::NoSuchFile(filename.to_owned())); },
        };
        if !self.files[n].is_input_adapter() && self.user_files().count() == 1 {
            return self.fail(WorkspaceError::LastFile);
        }

        self.files.remove(n);
        if self.active_file == filename {
            let next = self.user_files().next().or(self.files.first());
            if let Some(f) = next {
                self.active_file = f.filename.clone();
            }
        }
        self.output.push("File deleted", OutputKind::System);
        self.mark_unsaved();
        Ok(())
    }

    /// A blank new name is ignored.
    pub fn rename_file(&mut self, old: &str, new: &str) -> Result<(), WorkspaceError> {
        if new.trim().is_empty() {
            return Ok(());
        }
        if self.position(new).is_some() {
            return self.fail(WorkspaceError::FileExists(new.to_owned()));
        }
        let n = match self.position(old) {
            Some(n) => n,
            None => { return self.fail(WorkspaceError::NoSuchFile(old.to_owned())); },
        };

        self.files[n].filename = new.to_owned();
        if self.active_file == old {
            self.active_file = new.to_owned();
        }
        self.mark_unsaved();
        Ok(())
    }

    /// Adds the file, or replaces the contents of the file with that name.
    fn put_file(&mut self, file: SourceFile) {
        match self.position(&file.filename) {
            Some(n) => { self.files[n] = file; },
            None => { self.files.push(file); },
        }
    }

    pub fn upload_file(&mut self, filename: &str, contents: &str) {
        self.put_file(SourceFile::new(filename, contents));
        self.active_file = filename.to_owned();
        self.output.push(format!("File \"{}\" uploaded", filename), OutputKind::System);
        self.mark_unsaved();
    }

    /// Add every file in a ZIP archive. The first one becomes active.
    pub fn import_zip(&mut self, bytes: &[u8]) -> Result<usize, WorkspaceError> {
        let imported = match archive::read_zip(bytes) {
            Ok(files) => files,
            Err(e) => {
                log::error!("Failed to read zip file: {}", &e);
                return self.fail(WorkspaceError::Zip(e));
            },
        };

        let n = imported.len();
        let first = imported.first().map(|f| f.filename.clone());
        for f in imported.into_iter() {
            self.put_file(f);
        }
        if let Some(first) = first {
            self.active_file = first;
            self.mark_unsaved();
        }

        self.output.push(format!("Imported {} files from ZIP", &n), OutputKind::System);
        Ok(n)
    }

    /// One user file exports as itself; anything else as a ZIP archive.
    pub fn export(&mut self) -> Result<Export, WorkspaceError> {
        let mut files: Vec<SourceFile> = self.user_files().cloned().collect();

        if files.len() == 1 {
            if let Some(file) = files.pop() {
                self.output.push(
                    format!("File exported as {}", &file.filename),
                    OutputKind::System,
                );
                return Ok(Export::File(file));
            }
        }

        match archive::write_zip(&files) {
            Ok(bytes) => {
                self.output.push(
                    format!("Project exported as {}", archive::EXPORT_ZIP_NAME),
                    OutputKind::System,
                );
                Ok(Export::Zip {
                    filename: archive::EXPORT_ZIP_NAME.to_owned(),
                    bytes,
                })
            },
            Err(e) => self.fail(WorkspaceError::Archive(e)),
        }
    }

    /// One autosave cycle: saves locally iff there's something unsaved.
    /// Returns whether it saved.
    pub fn autosave_tick(&mut self) -> bool {
        if self.saved_local || self.files.is_empty() {
            return false;
        }

        match self.save_local() {
            Ok(()) => {
                self.output.push(
                    format!(
                        "⚡ Auto-saved to local storage at {}",
                        clock_time(OffsetDateTime::now_utc())
                    ),
                    OutputKind::System,
                );
                true
            },
            Err(_) => false,
        }
    }

    /**
    Compile every file and run the active one.

    A fresh input adapter targeting the active class is compiled in place of
    whatever adapter is in the file list. Returns the program's exit code.

    The program reads its standard input from `stdin`; lines it consumes are
    echoed to the output. `stdin` is dropped when the run ends, however it
    ends, so a pending `StdinHost::next_request()` returns `None` and further
    `StdinHost::submit()`s fail. Every run needs a fresh `stdin::channel()`.
    */
    pub async fn run(
        &mut self,
        runtime: &mut dyn JavaRuntime,
        mut stdin: StdinGuest,
    ) -> Result<i32, WorkspaceError> {
        if !runtime.is_ready() {
            return self.fail(WorkspaceError::NotReady);
        }

        let active = self.active_file.clone();
        let class = class_name_from_file(&active).to_owned();
        self.output.push(format!("Compiling {}...", &active), OutputKind::System);

        let mut to_compile: Vec<SourceFile> = self.user_files().cloned().collect();
        to_compile.push(adapter_file(&class));

        let res = self.compile_and_run(runtime, &mut stdin, &to_compile, &active, &class).await;
        drop(stdin);

        match res {
            Ok(code) => Ok(code),
            Err(e) => self.fail(e),
        }
    }

    async fn compile_and_run(
        &mut self,
        runtime: &mut dyn JavaRuntime,
        stdin: &mut StdinGuest,
        files: &[SourceFile],
        active: &str,
        class: &str,
    ) -> Result<i32, WorkspaceError> {
        for f in files.iter() {
            let path = format!("{}{}", SOURCE_DIR, &f.filename);
            runtime.add_string_file(&path, f.contents.as_bytes()).await?;
        }

        let args = javac_args(files.iter().map(|f| f.filename.as_str()));
        let code = {
            let mut io = ProgramIo::new(&mut self.output, stdin, STDIN_TIMEOUT);
            runtime.run_main(JAVAC_MAIN, CLASSPATH, &args, &mut io).await?
        };
        if code != 0 {
            return Err(WorkspaceError::CompilationFailed(code));
        }

        self.output.push(format!("Running {}...", active), OutputKind::System);
        let mut io = ProgramIo::new(&mut self.output, stdin, STDIN_TIMEOUT);
        let code = runtime.run_main(
            INPUT_ADAPTER_CLASS,
            CLASSPATH,
            &[class.to_owned()],
            &mut io,
        ).await?;

        Ok(code)
    }
}

/**
Save `workspace` locally every `period`, whenever it has unsaved changes.

The task holds only a weak reference and ends once the workspace is
dropped. The first save can happen no sooner than one `period` from now.
*/
pub fn spawn_autosave(
    workspace: &Arc<Mutex<Workspace>>,
    period: Duration,
) -> JoinHandle<()> {
    let weak: Weak<Mutex<Workspace>> = Arc::downgrade(workspace);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        interval.tick().await;

        loop {
            interval.tick().await;
            let ws = match weak.upgrade() {
                Some(ws) => ws,
                None => { break; },
            };
            let mut ws = ws.lock().await;
            if ws.autosave_tick() {
                log::trace!("Autosaved {:?}.", ws.project());
            }
        }

        log::trace!("Autosave task exits.");
    })
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;

    use crate::tests::ensure_logging;
    use stdin::InputError;
    use storage::{DirStorage, MemoryStorage};

    fn workspace() -> Workspace {
        Workspace::new(Box::new(MemoryStorage::new()))
    }

    fn last_output(ws: &Workspace) -> &OutputItem {
        ws.output().last().unwrap()
    }

    fn user_files(ws: &Workspace) -> Vec<SourceFile> {
        ws.user_files().cloned().collect()
    }

    /// A run whose program gets no input at all.
    fn no_input() -> StdinGuest {
        stdin::channel().1
    }

    #[derive(Default)]
    struct FakeRuntime {
        loading: bool,
        javac_exit: i32,
        reads_input: bool,
        files: Vec<(String, String)>,
        runs: Vec<(String, Vec<String>)>,
    }

    #[async_trait]
    impl JavaRuntime for FakeRuntime {
        fn is_ready(&self) -> bool { !self.loading }

        async fn add_string_file(
            &mut self,
            path: &str,
            contents: &[u8],
        ) -> Result<(), RuntimeError> {
            self.files.push((
                path.to_owned(),
                String::from_utf8_lossy(contents).into_owned(),
            ));
            Ok(())
        }

        async fn run_main(
            &mut self,
            class: &str,
            _classpath: &str,
            args: &[String],
            io: &mut ProgramIo<'_>,
        ) -> Result<i32, RuntimeError> {
            self.runs.push((class.to_owned(), args.to_vec()));
            if class == JAVAC_MAIN {
                if self.javac_exit != 0 {
                    io.stderr("Main.java:1: error: ';' expected");
                }
                Ok(self.javac_exit)
            } else if self.reads_input {
                io.stdout("Enter an integer");
                match io.request_line().await {
                    Some(line) => {
                        io.stdout(&format!("Your integer: {}", line.trim()));
                        Ok(0)
                    },
                    None => {
                        io.stderr("java.util.NoSuchElementException");
                        Ok(1)
                    },
                }
            } else {
                io.stdout("Hello from Main");
                Ok(0)
            }
        }
    }

    #[derive(Clone, Default)]
    struct FakeRemote {
        projects: Arc<StdMutex<Vec<RemoteProject>>>,
        broken: bool,
    }

    #[async_trait]
    impl RemoteProjects for FakeRemote {
        async fn save(&self, project: &RemoteProject) -> Result<(), RemoteError> {
            if self.broken {
                return Err(RemoteError::Status(500, "Database save failed".to_owned()));
            }
            let mut projects = self.projects.lock().unwrap();
            projects.retain(|p| p.project != project.project);
            projects.insert(0, project.clone());
            Ok(())
        }

        async fn list(&self) -> Result<Vec<String>, RemoteError> {
            let projects = self.projects.lock().unwrap();
            Ok(projects.iter().map(|p| p.project.clone()).collect())
        }

        async fn fetch(&self, name: &str) -> Result<Option<RemoteProject>, RemoteError> {
            let projects = self.projects.lock().unwrap();
            Ok(projects.iter().find(|p| p.project == name).cloned())
        }
    }

    #[test]
    fn fresh_workspace() {
        let ws = workspace();
        assert_eq!(DEFAULT_PROJECT, ws.project());
        assert_eq!("Main.java", ws.active_file());
        let names: Vec<&str> = ws.files().iter()
            .map(|f| f.filename.as_str())
            .collect();
        assert_eq!(vec!["Main.java", INPUT_ADAPTER_FILENAME], names);
        assert_eq!(1, ws.user_files().count());
        assert!(!ws.has_unsaved_changes());
    }

    #[test]
    fn save_and_reload() {
        ensure_logging();

        let mut ws = workspace();
        ws.add_file();
        ws.update_file_content("public class Class {\n    int x;\n}").unwrap();
        ws.upload_file("notes.txt", "remember the milk");
        ws.set_active_file("Class.java").unwrap();
        assert!(ws.has_unsaved_changes());

        ws.save_local().unwrap();
        assert!(!ws.has_unsaved_changes());
        assert!(ws.last_local_save().is_some());
        assert!(last_output(&ws).text.starts_with("✓ Project saved to local storage at "));

        let expected = user_files(&ws);
        assert_eq!(3, expected.len());

        let ws = Workspace::open(DEFAULT_PROJECT, ws.into_storage());
        assert_eq!(expected, user_files(&ws));
        assert_eq!("Class.java", ws.active_file());
        let adapter = ws.file(INPUT_ADAPTER_FILENAME).unwrap();
        assert!(adapter.contents.contains("Class.main(new String[0]);"));
        assert!(last_output(&ws).text.starts_with("✓ Project loaded from local storage"));
    }

    #[test]
    fn saved_record_omits_adapter() {
        let mut ws = workspace();
        ws.save_local().unwrap();

        let storage = ws.into_storage();
        let raw = storage.get_item(&project_key(DEFAULT_PROJECT)).unwrap().unwrap();
        let saved: SavedProject = serde_json::from_str(&raw).unwrap();
        assert_eq!(vec![SourceFile::new("Main.java", DEFAULT_MAIN)], saved.files);
        assert_eq!(Some("Main.java".to_owned()), saved.active_file);
        assert!(OffsetDateTime::parse(&saved.timestamp, &Rfc3339).is_ok());
    }

    #[test]
    fn empty_record_loads_default_main() {
        let mut storage = MemoryStorage::new();
        storage.set_item(
            &project_key("Empty"),
            r#"{"project":"Empty","files":[],"timestamp":"2024-03-01T12:00:00Z"}"#,
        ).unwrap();

        let ws = Workspace::open("Empty", Box::new(storage));
        assert_eq!("Main.java", ws.active_file());
        assert_eq!(vec![SourceFile::new("Main.java", DEFAULT_MAIN)], user_files(&ws));
        let adapter = ws.file(INPUT_ADAPTER_FILENAME).unwrap();
        assert!(adapter.contents.contains("Main.main(new String[0]);"));
    }

    #[test]
    fn projects_persist_on_disk() {
        let dir = tempfile::tempdir().unwrap();

        let mut ws = Workspace::open(
            "Rockets",
            Box::new(DirStorage::new(dir.path()).unwrap()),
        );
        ws.update_file_content("public class Main {}").unwrap();
        ws.save_local().unwrap();
        drop(ws);

        let ws = Workspace::open(
            "Rockets",
            Box::new(DirStorage::new(dir.path()).unwrap()),
        );
        assert_eq!("public class Main {}", ws.file("Main.java").unwrap().contents);

        let other = Workspace::open(
            "Gliders",
            Box::new(DirStorage::new(dir.path()).unwrap()),
        );
        assert_eq!(DEFAULT_MAIN, other.file("Main.java").unwrap().contents);
    }

    #[test]
    fn unreadable_record_is_ignored() {
        let mut storage = MemoryStorage::new();
        storage.set_item(&project_key("Broken"), "{ not json").unwrap();

        let ws = Workspace::open("Broken", Box::new(storage));
        assert_eq!(DEFAULT_MAIN, ws.file("Main.java").unwrap().contents);
        assert!(ws.last_local_save().is_none());
    }

    #[test]
    fn new_file_names() {
        let mut ws = workspace();
        assert_eq!("Class.java", ws.add_file());
        assert_eq!("Class1.java", ws.add_file());
        assert_eq!("Class2.java", ws.add_file());
        ws.rename_file("Class1.java", "Class7.java").unwrap();
        assert_eq!("Class8.java", ws.add_file());

        assert_eq!("Class8.java", ws.active_file());
        assert_eq!(
            "public class Class8 {\n\n}",
            ws.file("Class8.java").unwrap().contents
        );
    }

    #[test]
    fn last_file_stays() {
        let mut ws = workspace();
        assert!(matches!(ws.remove_file("Main.java"), Err(WorkspaceError::LastFile)));
        assert_eq!(OutputKind::Error, last_output(&ws).kind);
        assert_eq!("Cannot delete the last file", last_output(&ws).text);
        assert!(ws.file("Main.java").is_some());

        ws.add_file();
        ws.remove_file("Class.java").unwrap();
        assert_eq!("File deleted", last_output(&ws).text);
        assert_eq!("Main.java", ws.active_file());
        assert!(ws.file("Class.java").is_none());
    }

    #[test]
    fn rename_rules() {
        let mut ws = workspace();
        ws.add_file();

        assert!(matches!(
            ws.rename_file("Class.java", "Main.java"),
            Err(WorkspaceError::FileExists(_))
        ));
        ws.rename_file("Class.java", "   ").unwrap();
        assert!(ws.file("Class.java").is_some());

        ws.rename_file("Class.java", "Rocket.java").unwrap();
        assert_eq!("Rocket.java", ws.active_file());
        assert!(ws.file("Class.java").is_none());

        assert!(matches!(
            ws.rename_file("Nope.java", "Other.java"),
            Err(WorkspaceError::NoSuchFile(_))
        ));
    }

    #[test]
    fn upload_replaces_same_name() {
        let mut ws = workspace();
        ws.upload_file("Main.java", "class Main {}");
        assert_eq!(1, ws.user_files().count());
        assert_eq!("class Main {}", ws.file("Main.java").unwrap().contents);
        assert_eq!("File \"Main.java\" uploaded", last_output(&ws).text);
    }

    #[test]
    fn export_one_file_or_zip() {
        let mut ws = workspace();
        match ws.export().unwrap() {
            Export::File(f) => { assert_eq!("Main.java", f.filename); },
            x => panic!("expected a single file, got {:?}", &x),
        }

        ws.add_file();
        let bytes = match ws.export().unwrap() {
            Export::Zip { filename, bytes } => {
                assert_eq!("project-files.zip", filename);
                bytes
            },
            x => panic!("expected a ZIP archive, got {:?}", &x),
        };

        let mut other = workspace();
        assert_eq!(2, other.import_zip(&bytes).unwrap());
        assert_eq!(user_files(&ws), user_files(&other));
        assert_eq!("Main.java", other.active_file());
        assert_eq!("Imported 2 files from ZIP", last_output(&other).text);
    }

    #[test]
    fn bad_zip() {
        let mut ws = workspace();
        assert!(matches!(ws.import_zip(b"nope"), Err(WorkspaceError::Zip(_))));
        assert!(last_output(&ws).text.starts_with("Failed to open ZIP file"));
        assert!(!ws.has_unsaved_changes());
    }

    #[test]
    fn autosave_only_when_dirty() {
        let mut ws = workspace();
        assert!(!ws.autosave_tick());

        ws.update_file_content("class Main {}").unwrap();
        assert!(ws.autosave_tick());
        assert!(last_output(&ws).text.starts_with("⚡ Auto-saved to local storage at "));
        assert!(!ws.autosave_tick());
    }

    #[tokio::test(start_paused = true)]
    async fn autosave_task() {
        let ws = Arc::new(Mutex::new(workspace()));
        let handle = spawn_autosave(&ws, AUTOSAVE_PERIOD);
        ws.lock().await.update_file_content("class Main {}").unwrap();

        tokio::time::sleep(AUTOSAVE_PERIOD / 2).await;
        assert!(!ws.lock().await.is_saved_local());
        tokio::time::sleep(AUTOSAVE_PERIOD).await;
        assert!(ws.lock().await.is_saved_local());

        drop(ws);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn run_compiles_then_runs() {
        let mut ws = workspace();
        let mut rt = FakeRuntime::default();
        assert_eq!(0, ws.run(&mut rt, no_input()).await.unwrap());

        let paths: Vec<&str> = rt.files.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(vec!["/str/Main.java", "/str/CustomFileInputStream.java"], paths);
        assert_eq!(JAVAC_MAIN, rt.runs[0].0);
        assert_eq!(
            (INPUT_ADAPTER_CLASS.to_owned(), vec!["Main".to_owned()]),
            rt.runs[1]
        );

        let texts: Vec<&str> = ws.output().iter().map(|o| o.text.as_str()).collect();
        assert_eq!(
            vec!["Compiling Main.java...", "Running Main.java...", "Hello from Main"],
            texts
        );
    }

    #[tokio::test]
    async fn adapter_targets_active_class() {
        let mut ws = workspace();
        ws.add_file();
        let mut rt = FakeRuntime::default();
        ws.run(&mut rt, no_input()).await.unwrap();

        let (_, adapter) = rt.files.last().unwrap();
        assert!(adapter.contains("Class.main(new String[0]);"));
        assert_eq!(vec!["Class".to_owned()], rt.runs[1].1);
    }

    #[tokio::test]
    async fn run_refusals_and_failures() {
        let mut ws = workspace();

        let mut rt = FakeRuntime { loading: true, ..Default::default() };
        assert!(matches!(ws.run(&mut rt, no_input()).await, Err(WorkspaceError::NotReady)));
        assert_eq!(
            "Java virtual machine is still loading! Please wait...",
            last_output(&ws).text
        );
        assert!(rt.runs.is_empty());

        let mut rt = FakeRuntime { javac_exit: 1, ..Default::default() };
        assert!(matches!(
            ws.run(&mut rt, no_input()).await,
            Err(WorkspaceError::CompilationFailed(1))
        ));
        assert_eq!(1, rt.runs.len());
        assert_eq!("Compilation failed.", last_output(&ws).text);
        assert!(ws.output().iter().any(|o| o.kind == OutputKind::Error
            && o.text.contains("';' expected")));
    }

    #[tokio::test]
    async fn save_project_to_remote() {
        ensure_logging();

        let remote = FakeRemote::default();
        let mut ws = workspace();
        ws.update_file_content("class Main {}\n").unwrap();

        ws.save_project().await.unwrap();
        assert!(!ws.has_unsaved_changes());
        assert!(!ws.is_saved_remote());
        assert!(remote.projects.lock().unwrap().is_empty());

        ws.sign_in(Box::new(remote.clone()));
        assert!(ws.has_unsaved_changes());
        ws.save_project().await.unwrap();
        assert!(!ws.has_unsaved_changes());
        assert!(last_output(&ws).text.ends_with("| Files: 1 | Total Lines: 2"));
        assert_eq!(1, remote.projects.lock().unwrap()[0].files.len());

        ws.load_project_list().await;
        assert_eq!(vec![DEFAULT_PROJECT.to_owned()], ws.project_list().to_vec());
    }

    #[tokio::test]
    async fn failed_remote_save() {
        let mut ws = workspace();
        ws.sign_in(Box::new(FakeRemote { broken: true, ..Default::default() }));
        ws.update_file_content("x").unwrap();

        assert!(matches!(ws.save_project().await, Err(WorkspaceError::Remote(_))));
        assert!(ws.is_saved_local());
        assert!(ws.has_unsaved_changes());
        assert_eq!(
            "✗ Failed to save to database: Database save failed (500)",
            last_output(&ws).text
        );
    }

    #[tokio::test]
    async fn pull_adapter_only_project() {
        let remote = FakeRemote::default();
        remote.projects.lock().unwrap().push(RemoteProject {
            project: "Hollow".to_owned(),
            files: vec![SourceFile::new(INPUT_ADAPTER_FILENAME, "stale")],
        });

        let mut ws = workspace();
        ws.sign_in(Box::new(remote));
        assert!(ws.pull_remote("Hollow").await.unwrap());

        assert_eq!("Main.java", ws.active_file());
        assert_eq!(vec![SourceFile::new("Main.java", DEFAULT_MAIN)], user_files(&ws));
        let adapter = ws.file(INPUT_ADAPTER_FILENAME).unwrap();
        assert!(adapter.contents.contains("Main.main(new String[0]);"));
    }

    #[tokio::test]
    async fn pull_remote_project() {
        let remote = FakeRemote::default();
        remote.projects.lock().unwrap().push(RemoteProject {
            project: "Rockets".to_owned(),
            files: vec![
                SourceFile::new("Rocket.java", "public class Rocket {}"),
                SourceFile::new(INPUT_ADAPTER_FILENAME, "stale"),
            ],
        });

        let mut ws = workspace();
        assert!(!ws.pull_remote("Rockets").await.unwrap());

        ws.sign_in(Box::new(remote));
        assert!(!ws.pull_remote("Gliders").await.unwrap());
        assert!(ws.pull_remote("Rockets").await.unwrap());

        assert_eq!("Rockets", ws.project());
        assert_eq!("Rocket.java", ws.active_file());
        assert_eq!(1, ws.user_files().count());
        let adapter = ws.file(INPUT_ADAPTER_FILENAME).unwrap();
        assert!(adapter.contents.contains("Rocket.main(new String[0]);"));
        assert!(!ws.is_saved_local());
        assert!(ws.is_saved_remote());
    }

    #[tokio::test]
    async fn program_reads_input_while_running() {
        let mut ws = workspace();
        let mut rt = FakeRuntime { reads_input: true, ..Default::default() };
        let (mut host, guest) = stdin::channel();

        let answerer = tokio::spawn(async move {
            host.next_request().await.unwrap();
            host.submit("42").unwrap();
            host
        });
        assert_eq!(0, ws.run(&mut rt, guest).await.unwrap());
        let mut host = answerer.await.unwrap();

        let texts: Vec<&str> = ws.output().iter().map(|o| o.text.as_str()).collect();
        assert_eq!(
            vec![
                "Compiling Main.java...",
                "Running Main.java...",
                "Enter an integer",
                "> 42",
                "Your integer: 42",
            ],
            texts
        );
        assert_eq!(OutputKind::Input, ws.output()[3].kind);

        // Once the run is over its input channel is closed.
        assert_eq!(Err(InputError::Closed), host.submit("43"));
        assert_eq!(None, host.next_request().await);
    }

    #[tokio::test]
    async fn queued_input_is_read_on_request() {
        let mut ws = workspace();
        let mut rt = FakeRuntime { reads_input: true, ..Default::default() };
        let (host, guest) = stdin::channel();
        host.submit("7").unwrap();

        assert_eq!(0, ws.run(&mut rt, guest).await.unwrap());
        assert_eq!("Your integer: 7", last_output(&ws).text);
    }

    #[tokio::test]
    async fn cancelled_input_ends_the_program() {
        let mut ws = workspace();
        let mut rt = FakeRuntime { reads_input: true, ..Default::default() };
        let (mut host, guest) = stdin::channel();

        let canceller = tokio::spawn(async move {
            host.next_request().await.unwrap();
            host.cancel();
        });
        assert_eq!(1, ws.run(&mut rt, guest).await.unwrap());
        canceller.await.unwrap();

        assert_eq!("java.util.NoSuchElementException", last_output(&ws).text);
        assert!(ws.output().iter().all(|o| o.kind != OutputKind::Input));
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_input_times_out() {
        let mut ws = workspace();
        let mut rt = FakeRuntime { reads_input: true, ..Default::default() };
        let (_host, guest) = stdin::channel();

        assert_eq!(1, ws.run(&mut rt, guest).await.unwrap());
        assert_eq!("java.util.NoSuchElementException", last_output(&ws).text);
    }
}
