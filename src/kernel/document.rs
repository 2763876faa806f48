// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! The active design document

use crate::io::{display_name, file_mtime};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Editor text plus the file it was loaded from
#[derive(Debug, Clone)]
pub struct Document {
    path: Option<PathBuf>,
    text: String,
    /// Modification time when the text was last read from disk
    mtime: SystemTime,
    /// Text of the last parse attempt
    compiled_text: Option<String>,
}

impl Default for Document {
    fn default() -> Self {
        Self::untitled(String::new())
    }
}

impl Document {
    pub fn untitled(text: impl Into<String>) -> Self {
        Self {
            path: None,
            text: text.into(),
            mtime: SystemTime::UNIX_EPOCH,
            compiled_text: None,
        }
    }

    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            text,
            mtime: file_mtime(path),
            compiled_text: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn name(&self) -> String {
        display_name(self.path())
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replace the text as an editor would; the file is not written
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// True if the backing file has a different modification time than when read
    pub fn changed_on_disk(&self) -> bool {
        match &self.path {
            Some(path) => {
                let mtime = file_mtime(path);
                mtime != SystemTime::UNIX_EPOCH && mtime != self.mtime
            }
            None => false,
        }
    }

    /// Re-read the backing file
    pub fn reload(&mut self) -> io::Result<()> {
        if let Some(path) = &self.path {
            self.text = fs::read_to_string(path)?;
            self.mtime = file_mtime(path);
        }
        Ok(())
    }

    /// True if the text differs from the last one handed to the parser
    pub fn is_modified_since_compile(&self) -> bool {
        self.compiled_text.as_deref() != Some(self.text.as_str())
    }

    pub fn mark_compiled(&mut self) {
        self.compiled_text = Some(self.text.clone());
    }
}
