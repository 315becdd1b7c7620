//! Corpus loading and chunking.
//!
//! Accepts a JSON array of documents, a JSON Lines file, a plain `.txt`
//! file, or a directory walked recursively for all three. Long documents are
//! split on paragraph boundaries; every chunk keeps its parent's metadata.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::types::{Document, DocumentMetadata};

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_chars: 1000, overlap_chars: 150 }
    }
}

#[derive(Default)]
pub struct DataProcessor {
    chunking_config: ChunkingConfig,
}

impl DataProcessor {
    pub fn new() -> Self { Self::default() }

    pub fn with_chunking(chunking_config: ChunkingConfig) -> Self { Self { chunking_config } }

    /// Load every document under `path` (file or directory) and chunk it.
    pub fn load(&self, path: &Path) -> Result<Vec<Document>> {
        if !path.exists() {
            return Err(Error::NotFound(path.display().to_string()));
        }
        let files = if path.is_dir() { self.list_corpus_files(path) } else { vec![path.to_path_buf()] };
        if files.is_empty() {
            warn!("No corpus files found under {}", path.display());
            return Ok(vec![]);
        }
        let mut all_chunks = Vec::new();
        for (file_index, file_path) in files.iter().enumerate() {
            debug!("Processing file {}/{}: {}", file_index + 1, files.len(), file_path.display());
            let prefix = self.doc_id_prefix(path, file_path);
            let documents = self.read_documents(file_path)?;
            let mut chunk_index = 0usize;
            for document in documents {
                for content in self.chunk_text(&document.content) {
                    all_chunks.push(Document { id: format!("{prefix}:{chunk_index}"), content, metadata: document.metadata.clone() });
                    chunk_index += 1;
                }
            }
        }
        info!("Processed {} files into {} chunks", files.len(), all_chunks.len());
        Ok(all_chunks)
    }

    fn read_documents(&self, file_path: &Path) -> Result<Vec<Document>> {
        let raw = self.read_file_content(file_path)?;
        let parse_err = |message: String| Error::Parse { path: file_path.display().to_string(), message };
        let source = file_path.to_string_lossy().to_string();
        let mut documents = match file_path.extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::from_str::<Vec<Document>>(&raw).map_err(|e| parse_err(e.to_string()))?,
            Some("jsonl") => raw
                .lines()
                .enumerate()
                .filter(|(_, line)| !line.trim().is_empty())
                .map(|(n, line)| serde_json::from_str::<Document>(line).map_err(|e| parse_err(format!("line {}: {e}", n + 1))))
                .collect::<Result<Vec<_>>>()?,
            _ => vec![Document {
                id: String::new(),
                metadata: DocumentMetadata { title: extract_title(&raw), ..DocumentMetadata::default() },
                content: raw,
            }],
        };
        for document in &mut documents {
            if document.metadata.source.is_none() { document.metadata.source = Some(source.clone()); }
        }
        Ok(documents)
    }

    fn read_file_content(&self, file_path: &Path) -> Result<String> {
        let bytes = fs::read(file_path).map_err(|source| Error::Io { path: file_path.display().to_string(), source })?;
        Ok(match String::from_utf8(bytes) {
            Ok(content) => content,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).to_string(),
        })
    }

    /// Path relative to the corpus root with `/` separators, or the file
    /// name when a single file is loaded. Unique per corpus file.
    fn doc_id_prefix(&self, root: &Path, file_path: &Path) -> String {
        let relative = match file_path.strip_prefix(root) {
            Ok(rel) if !rel.as_os_str().is_empty() => rel,
            _ => file_path.file_name().map(Path::new).unwrap_or(file_path),
        };
        let prefix = relative.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/");
        if prefix.is_empty() { "doc".to_string() } else { prefix }
    }

    /// Pack paragraphs into chunks of at most `max_chars` characters.
    pub fn chunk_text(&self, content: &str) -> Vec<String> {
        let max = self.chunking_config.max_chars.max(1);
        let mut chunks = Vec::new();
        let mut current = String::new();
        for paragraph in content.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
            let len = paragraph.chars().count();
            if len > max {
                if !current.is_empty() { chunks.push(std::mem::take(&mut current)); }
                chunks.extend(self.split_paragraph_with_overlap(paragraph));
                continue;
            }
            if !current.is_empty() && current.chars().count() + 2 + len > max {
                chunks.push(std::mem::take(&mut current));
            }
            if !current.is_empty() { current.push_str("\n\n"); }
            current.push_str(paragraph);
        }
        if !current.is_empty() { chunks.push(current); }
        chunks
    }

    fn split_paragraph_with_overlap(&self, paragraph: &str) -> Vec<String> {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        let max = self.chunking_config.max_chars.max(1);
        let overlap = self.chunking_config.overlap_chars;
        let mut chunks = Vec::new();
        let mut start = 0;
        while start < words.len() {
            let mut end = start;
            let mut len = 0usize;
            while end < words.len() {
                let add = words[end].chars().count() + usize::from(end > start);
                if end > start && len + add > max { break; }
                len += add;
                end += 1;
            }
            chunks.push(words[start..end].join(" "));
            if end >= words.len() { break; }
            let mut next = end;
            let mut carried = 0usize;
            while next > start + 1 && carried + words[next - 1].chars().count() + 1 <= overlap {
                carried += words[next - 1].chars().count() + 1;
                next -= 1;
            }
            start = next;
        }
        chunks
    }

    fn list_corpus_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
            let path = entry.path();
            if matches!(path.extension().and_then(|s| s.to_str()), Some("txt" | "json" | "jsonl")) { files.push(path.to_path_buf()); }
        }
        files.sort();
        files
    }
}

/// First line long enough to be informative.
fn extract_title(text: &str) -> Option<String> {
    text.lines().map(str::trim).find(|line| line.chars().count() > 10).map(str::to_string)
}
