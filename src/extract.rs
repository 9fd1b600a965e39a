//! Text extraction for `shelf add --file`.
//!
//! PDFs go through `pdf-extract`; everything else must be UTF-8 text.
//! Malformed input comes back as an [`ExtractError`] and the caller
//! writes nothing.

use std::path::Path;

use docshelf_core::models::NewDocument;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_TEXT: &str = "text/plain";

/// Largest file `add --file` will read.
pub const MAX_FILE_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug)]
pub enum ExtractError {
    UnsupportedContentType(String),
    Pdf(String),
    NotUtf8,
    Empty,
    TooLarge(u64),
    Io(std::io::Error),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::UnsupportedContentType(ct) => {
                write!(f, "unsupported content-type: {}", ct)
            }
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
            ExtractError::NotUtf8 => write!(f, "file is neither a PDF nor UTF-8 text"),
            ExtractError::Empty => write!(f, "no text could be extracted"),
            ExtractError::TooLarge(n) => {
                write!(f, "file is {} bytes, limit is {}", n, MAX_FILE_BYTES)
            }
            ExtractError::Io(e) => write!(f, "read failed: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Content type from the file extension; anything not `.pdf` is text.
pub fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("pdf") => MIME_PDF,
        _ => MIME_TEXT,
    }
}

/// Extract plain UTF-8 text from `bytes`.
pub fn extract_text(bytes: &[u8], content_type: &str) -> Result<String, ExtractError> {
    let text = match content_type {
        MIME_PDF => extract_pdf(bytes)?,
        MIME_TEXT => String::from_utf8(bytes.to_vec()).map_err(|_| ExtractError::NotUtf8)?,
        _ => {
            return Err(ExtractError::UnsupportedContentType(
                content_type.to_string(),
            ))
        }
    };
    let text = text.trim();
    if text.is_empty() {
        return Err(ExtractError::Empty);
    }
    Ok(text.to_string())
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    // pdf-extract panics on some malformed inputs.
    match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
        Ok(result) => result.map_err(|e| ExtractError::Pdf(e.to_string())),
        Err(_) => Err(ExtractError::Pdf("malformed PDF".to_string())),
    }
}

/// Read `path` into a new document. The title is the file stem and PDFs
/// get `doc_type = "pdf"`; `source` records the path.
pub fn document_from_file(path: &Path) -> Result<NewDocument, ExtractError> {
    let size = std::fs::metadata(path).map_err(ExtractError::Io)?.len();
    if size > MAX_FILE_BYTES {
        return Err(ExtractError::TooLarge(size));
    }
    let bytes = std::fs::read(path).map_err(ExtractError::Io)?;
    let content_type = content_type_for(path);
    let content = extract_text(&bytes, content_type)?;

    let title = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("untitled")
        .to_string();

    let mut doc = NewDocument::new(title, content).with_source(path.display().to_string());
    if content_type == MIME_PDF {
        doc = doc.with_doc_type("pdf");
    }
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_content_type_returns_error() {
        let err = extract_text(b"foo", "application/octet-stream").unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedContentType(_)));
    }

    #[test]
    fn invalid_pdf_returns_error() {
        let err = extract_text(b"not a pdf", MIME_PDF).unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn binary_text_is_rejected() {
        let err = extract_text(&[0xff, 0xfe, 0x00, 0x80], MIME_TEXT).unwrap_err();
        assert!(matches!(err, ExtractError::NotUtf8));
    }

    #[test]
    fn blank_text_is_rejected() {
        assert!(matches!(
            extract_text(b"  \n\t", MIME_TEXT),
            Err(ExtractError::Empty)
        ));
    }

    #[test]
    fn content_type_follows_extension() {
        assert_eq!(content_type_for(Path::new("a/b/Report.PDF")), MIME_PDF);
        assert_eq!(content_type_for(Path::new("notes.md")), MIME_TEXT);
        assert_eq!(content_type_for(Path::new("README")), MIME_TEXT);
    }

    #[test]
    fn document_from_text_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("meeting-notes.txt");
        std::fs::write(&path, "  agenda and action items \n").unwrap();

        let doc = document_from_file(&path).unwrap();
        assert_eq!(doc.title, "meeting-notes");
        assert_eq!(doc.content, "agenda and action items");
        assert_eq!(doc.doc_type, None);
        assert_eq!(doc.source.as_deref(), Some(path.display().to_string().as_str()));
    }
}
