/*!
Where the workspace keeps projects between sessions.

`StoragePort` is the capability the workspace is handed: a string-keyed,
string-valued store shaped like browser local storage. `MemoryStorage` is
the in-process implementation; `DirStorage` keeps one file per key.
*/
use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::project::SourceFile;

/// Every project record's key starts with this.
pub const PROJECT_KEY_PREFIX: &str = "java_project_";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage error: {0}")]
    Other(String),
}

pub trait StoragePort: Send {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&mut self, key: &str) -> Result<(), StorageError>;
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

pub fn project_key(project: &str) -> String {
    format!("{}{}", PROJECT_KEY_PREFIX, project)
}

/// One project's local record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SavedProject {
    pub project: String,
    pub files: Vec<SourceFile>,
    /// RFC 3339.
    #[serde(default)]
    pub timestamp: String,
    #[serde(rename = "activeFile", default, skip_serializing_if = "Option::is_none")]
    pub active_file: Option<String>,
}

/// What `list_local_projects()` reports about each stored project.
#[derive(Clone, Debug, PartialEq)]
pub struct ProjectSummary {
    pub project: String,
    pub java_files: Vec<SourceFile>,
    pub timestamp: String,
    pub total_files: usize,
}

/**
Every locally-stored project that has at least one `.java` file.

Records that don't parse are logged and skipped. A record with no
`project` name gets its name from the key.
*/
pub fn list_local_projects(
    storage: &dyn StoragePort,
) -> Result<Vec<ProjectSummary>, StorageError> {
    log::trace!("list_local_projects() called.");

    let mut projects: Vec<ProjectSummary> = Vec::new();

    for key in storage.keys()?.iter() {
        let name_from_key = match key.strip_prefix(PROJECT_KEY_PREFIX) {
            Some(name) => name,
            None => { continue; },
        };
        let raw = match storage.get_item(key)? {
            Some(raw) => raw,
            None => { continue; },
        };

        #[derive(Deserialize)]
        struct Loose {
            project: Option<String>,
            files: Option<Vec<SourceFile>>,
            timestamp: Option<String>,
        }

        let loose: Loose = match serde_json::from_str(&raw) {
            Ok(l) => l,
            Err(e) => {
                log::warn!("Error parsing project {:?}: {}", key, &e);
                continue;
            },
        };
        let files = match loose.files {
            Some(files) => files,
            None => { continue; },
        };

        let total_files = files.len();
        let java_files: Vec<SourceFile> = files.into_iter()
            .filter(|f| f.is_java())
            .collect();
        if java_files.is_empty() {
            continue;
        }

        projects.push(ProjectSummary {
            project: match loose.project {
                Some(p) if !p.is_empty() => p,
                _ => name_from_key.to_owned(),
            },
            java_files,
            timestamp: loose.timestamp.unwrap_or_default(),
            total_files,
        });
    }

    Ok(projects)
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: BTreeMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self { Self::default() }
}

impl StoragePort for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<(), StorageError> {
        self.items.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.items.keys().cloned().collect())
    }
}

/**
One `<encoded key>.json` file per item in a directory.

Keys are encoded so any string is a safe file name: ASCII letters, digits,
and `-` pass through; every other byte becomes `_` plus two hex digits.
*/
#[derive(Debug)]
pub struct DirStorage {
    dir: PathBuf,
}

const DIR_STORAGE_EXT: &str = ".json";

fn encode_key(key: &str) -> String {
    let mut s = String::with_capacity(key.len() + DIR_STORAGE_EXT.len());
    for b in key.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' {
            s.push(b as char);
        } else {
            // Writing to a String can't fail.
            let _ = write!(&mut s, "_{:02x}", b);
        }
    }
    s.push_str(DIR_STORAGE_EXT);
    s
}

fn decode_key(file_name: &str) -> Option<String> {
    let stem = file_name.strip_suffix(DIR_STORAGE_EXT)?;
    let mut bytes: Vec<u8> = Vec::with_capacity(stem.len());
    let mut chars = stem.bytes();
    while let Some(b) = chars.next() {
        if b == b'_' {
            let hi = chars.next()?;
            let lo = chars.next()?;
            let hex = [hi, lo];
            let hex = std::str::from_utf8(&hex).ok()?;
            bytes.push(u8::from_str_radix(hex, 16).ok()?);
        } else {
            bytes.push(b);
        }
    }
    String::from_utf8(bytes).ok()
}

impl DirStorage {
    /// Creates `dir` if it doesn't exist.
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(encode_key(key))
    }
}

impl StoragePort for DirStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        // Write-then-rename so a crash never leaves half a record.
        let path = self.path_for(key);
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<(), StorageError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let mut keys: Vec<String> = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            match name.to_str().and_then(decode_key) {
                Some(key) => keys.push(key),
                None => {
                    log::trace!("DirStorage: skipping {:?}", &name);
                },
            }
        }
        keys.sort();
        Ok(keys)
    }
}
