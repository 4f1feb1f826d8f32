use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A regular file found in a directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub parent: PathBuf,
    pub name: String,
}

impl FileRef {
    pub fn path(&self) -> PathBuf {
        self.parent.join(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextFileContent {
    pub parent: PathBuf,
    pub name: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryFileContent {
    pub parent: PathBuf,
    pub name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageFileContent {
    pub parent: PathBuf,
    pub name: String,
    /// `data:image/...;base64,...`
    pub base64_url: String,
}
