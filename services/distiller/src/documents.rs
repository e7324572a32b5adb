//! Source documents and chunking
//!
//! Only plain-text formats are loaded; anything else in the input directory is
//! skipped. Long texts are split into overlapping chunks that prefer to end on
//! a sentence boundary near the target size.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

/// File extensions read as plain text.
const TEXT_EXTENSIONS: &[&str] = &["txt", "md"];

/// Sentence boundaries tried in priority order when cutting a chunk.
const BOUNDARIES: &[&str] = &["。\n", "。", "！", "？", "\n\n", ". "];

/// How far around the target size a boundary is searched for, in characters.
const BOUNDARY_WINDOW: usize = 200;

/// One loaded source document.
#[derive(Debug, Clone)]
pub struct Document {
    pub path: PathBuf,
    /// File stem, used to name the output file
    pub stem: String,
    pub text: String,
}

/// Load every text document in `dir`, sorted by file name.
pub fn load_documents(dir: &Path) -> common::Result<Vec<Document>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && is_text_file(path))
        .collect();
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let text = std::fs::read_to_string(&path)?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        debug!(path = %path.display(), chars = text.chars().count(), "loaded document");
        documents.push(Document { path, stem, text });
    }
    info!(dir = %dir.display(), documents = documents.len(), "documents loaded");
    Ok(documents)
}

fn is_text_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            TEXT_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
}

/// Split `text` into chunks of roughly `chunk_size` characters, consecutive
/// chunks sharing `overlap` characters. Chunks are trimmed; empty ones dropped.
pub fn split_into_chunks(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    if len <= chunk_size {
        let trimmed = text.trim();
        return if trimmed.is_empty() {
            Vec::new()
        } else {
            vec![trimmed.to_string()]
        };
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < len {
        let mut end = (start + chunk_size).min(len);
        if end < len {
            let search_start = start + chunk_size.saturating_sub(BOUNDARY_WINDOW);
            let search_end = (start + chunk_size + BOUNDARY_WINDOW).min(len);
            let window = &chars[search_start..search_end];
            for boundary in BOUNDARIES {
                let pattern: Vec<char> = boundary.chars().collect();
                if let Some(pos) = rfind(window, &pattern) {
                    end = search_start + pos + pattern.len();
                    break;
                }
            }
        }

        let chunk: String = chars[start..end].iter().collect();
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }

        start = if end < len {
            end.saturating_sub(overlap).max(start + 1)
        } else {
            end
        };
    }
    chunks
}

fn rfind(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_single_trimmed_chunk() {
        assert_eq!(split_into_chunks("  hello world \n", 100, 10), vec!["hello world"]);
        assert!(split_into_chunks("   \n", 100, 10).is_empty());
    }

    #[test]
    fn long_text_cuts_at_sentence_boundary() {
        let sentence = "This is a sentence about key rotation. ";
        let text = sentence.repeat(50);
        let chunks = split_into_chunks(&text, 400, 0);

        assert!(chunks.len() > 1);
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(chunk.ends_with('.'), "chunk should end on a sentence: {chunk:?}");
            assert!(chunk.chars().count() <= 400 + BOUNDARY_WINDOW);
        }
    }

    #[test]
    fn chunks_overlap_and_cover_text() {
        let text: String = (0..3000).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let chunks = split_into_chunks(&text, 1000, 100);

        // No boundaries in the text, so cuts fall exactly on chunk_size.
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0], text[..1000]);
        assert_eq!(chunks[1], text[900..1900]);
        assert_eq!(chunks[2], text[1800..2800]);
        assert_eq!(chunks[3], text[2700..]);
    }

    #[test]
    fn multibyte_text_is_split_by_characters() {
        let text = "密钥轮换。".repeat(400);
        let chunks = split_into_chunks(&text, 500, 50);
        assert!(chunks.len() > 1);
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(chunk.ends_with('。'), "got: {chunk}");
        }
    }

    #[test]
    fn large_overlap_still_makes_progress() {
        let text = "ab\n\n".repeat(200);
        let chunks = split_into_chunks(&text, 250, 249);
        assert!(!chunks.is_empty());
        assert!(chunks.len() < text.len());
    }

    #[test]
    fn load_documents_reads_text_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "second").unwrap();
        std::fs::write(dir.path().join("a.MD"), "first").unwrap();
        std::fs::write(dir.path().join("c.pdf"), "%PDF").unwrap();
        std::fs::create_dir(dir.path().join("nested.txt")).unwrap();

        let docs = load_documents(dir.path()).unwrap();
        let stems: Vec<&str> = docs.iter().map(|d| d.stem.as_str()).collect();
        assert_eq!(stems, vec!["a", "b"]);
        assert_eq!(docs[0].text, "first");
    }

    #[test]
    fn load_documents_missing_dir_is_io_error() {
        let err = load_documents(Path::new("/nonexistent/docs")).unwrap_err();
        assert!(matches!(err, common::Error::Io(_)));
    }
}
