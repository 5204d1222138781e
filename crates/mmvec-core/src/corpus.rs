use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// A text file to embed, keyed by its file stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDocument {
    pub key: String,
    pub path: PathBuf,
    pub text: String,
}

/// Collects every `*.txt` under `root`, sorted by path. Empty files are skipped.
pub fn load_text_documents(root: &Path) -> Result<Vec<TextDocument>> {
    let mut docs = Vec::new();
    for path in list_txt_files(root) {
        let text = read_file_content(&path)?;
        let text = text.trim();
        if text.is_empty() {
            tracing::debug!(path = %path.display(), "skipping empty text file");
            continue;
        }
        let key = path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
        docs.push(TextDocument { key, path, text: text.to_string() });
    }
    tracing::info!(count = docs.len(), root = %root.display(), "loaded text documents");
    Ok(docs)
}

fn read_file_content(file_path: &Path) -> Result<String> {
    match fs::read_to_string(file_path) {
        Ok(content) => Ok(content),
        Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
    }
}

fn list_txt_files(root: &Path) -> Vec<PathBuf> {
    let mut txt_files = Vec::new();
    for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("txt") {
            txt_files.push(path.to_path_buf());
        }
    }
    txt_files.sort();
    txt_files
}
