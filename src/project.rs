/*!
Java project data shared between the workspace client and the server-side
project store.
*/
use serde::{Deserialize, Serialize};

/// Name of the generated stdin adapter; it's rebuilt before every run and
/// never persisted.
pub const INPUT_ADAPTER_FILENAME: &str = "CustomFileInputStream.java";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub filename: String,
    pub contents: String,
}

impl SourceFile {
    pub fn new<N, C>(filename: N, contents: C) -> Self
    where
        N: Into<String>,
        C: Into<String>,
    {
        Self { filename: filename.into(), contents: contents.into() }
    }

    pub fn is_input_adapter(&self) -> bool {
        self.filename == INPUT_ADAPTER_FILENAME
    }

    pub fn is_java(&self) -> bool {
        self.filename.ends_with(".java")
    }

    pub fn line_count(&self) -> usize {
        // An empty file is one line.
        self.contents.split('\n').count()
    }
}

/// Body of a remote project save, and what a remote fetch returns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemoteProject {
    pub project: String,
    pub files: Vec<SourceFile>,
}

impl RemoteProject {
    pub fn total_lines(&self) -> usize {
        self.files.iter().map(|f| f.line_count()).sum()
    }
}
