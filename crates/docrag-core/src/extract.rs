//! Turns an uploaded file into raw text: plain text as-is, digital PDFs via
//! pdf-extract, scanned PDFs and images via the `tesseract` binary.
//!
//! Extraction never fails outright. Any problem yields an empty string tagged
//! as [Outcome::Degraded] so the caller can report it.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, warn};

use crate::outcome::Outcome;

/// Digital PDF text shorter than this is treated as a scan and OCR'd instead.
const MIN_DIGITAL_CHARS: usize = 50;
const OCR_DPI: u32 = 300;

pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff", "bmp", "webp"];

/// Whether [extract_text] knows how to handle this file.
pub fn is_supported(path: &Path) -> bool {
    matches!(extension(path).as_deref(), Some("txt" | "pdf"))
        || extension(path).is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.as_str()))
}

/// Extract text from `path`. `lang` is the tesseract language code (e.g. `eng`).
pub fn extract_text(path: &Path, lang: &str) -> Outcome<String> {
    match try_extract(path, lang) {
        Ok(text) => Outcome::Complete(text),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "text extraction failed");
            Outcome::degraded(String::new(), e.to_string())
        }
    }
}

fn try_extract(path: &Path, lang: &str) -> Result<String, ExtractError> {
    let ext = extension(path).unwrap_or_default();
    match ext.as_str() {
        "txt" => {
            let bytes = std::fs::read(path).map_err(|e| ExtractError::Read(path.to_path_buf(), e))?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
        "pdf" => {
            let digital = pdf_digital_text(path);
            if !digital.is_empty() {
                return Ok(digital);
            }
            debug!(path = %path.display(), "no digital text, falling back to OCR");
            ocr_pdf(path, lang)
        }
        e if IMAGE_EXTENSIONS.contains(&e) => ocr_image(path, lang),
        _ => Err(ExtractError::Unsupported(ext.clone())),
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// Selectable text of a PDF, or empty if it has none worth using.
fn pdf_digital_text(path: &Path) -> String {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read PDF");
            return String::new();
        }
    };
    match pdf_extract::extract_text_from_mem(&bytes) {
        Ok(text) => {
            let text = text.trim().to_string();
            if text.chars().count() > MIN_DIGITAL_CHARS {
                text
            } else {
                String::new()
            }
        }
        Err(e) => {
            debug!(path = %path.display(), error = %e, "pdf-extract failed");
            String::new()
        }
    }
}

/// Rasterises each page with `pdftoppm`, then OCRs the pages in order.
fn ocr_pdf(path: &Path, lang: &str) -> Result<String, ExtractError> {
    let pages_dir = tempfile::tempdir().map_err(|e| ExtractError::Read(path.to_path_buf(), e))?;
    let prefix = pages_dir.path().join("page");
    run_tool(
        Command::new("pdftoppm")
            .arg("-r")
            .arg(OCR_DPI.to_string())
            .arg("-png")
            .arg(path)
            .arg(&prefix),
        "pdftoppm",
    )?;

    let mut pages: Vec<PathBuf> = std::fs::read_dir(pages_dir.path())
        .map_err(|e| ExtractError::Read(pages_dir.path().to_path_buf(), e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|e| e == "png"))
        .collect();
    // pdftoppm zero-pads page numbers, so lexical order is page order
    pages.sort();

    let texts = pages
        .iter()
        .map(|p| ocr_image(p, lang))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(texts.join("\n\n"))
}

fn ocr_image(path: &Path, lang: &str) -> Result<String, ExtractError> {
    run_tool(
        Command::new("tesseract").arg(path).arg("stdout").arg("-l").arg(lang),
        "tesseract",
    )
}

fn run_tool(cmd: &mut Command, name: &'static str) -> Result<String, ExtractError> {
    let out = cmd
        .output()
        .map_err(|e| ExtractError::Tool(name, e.to_string()))?;
    if !out.status.success() {
        let stderr = String::from_utf8_lossy(&out.stderr);
        return Err(ExtractError::Tool(name, stderr.trim().to_string()));
    }
    Ok(String::from_utf8_lossy(&out.stdout).into_owned())
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("unsupported file type: .{0}")]
    Unsupported(String),
    #[error("read error for {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("{0} failed: {1}")]
    Tool(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_plain_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("letter.TXT");
        std::fs::write(&path, "EMI: 10,250\n").unwrap();
        assert_eq!(extract_text(&path, "eng"), Outcome::Complete("EMI: 10,250\n".to_string()));
    }

    #[test]
    fn unsupported_type_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("letter.docx");
        std::fs::write(&path, "irrelevant").unwrap();
        let out = extract_text(&path, "eng");
        assert!(out.is_degraded());
        assert_eq!(out.value(), "");
        assert!(out.reason().unwrap().contains("unsupported"));
    }

    #[test]
    fn missing_file_degrades_to_empty() {
        let out = extract_text(Path::new("/definitely/not/here.txt"), "eng");
        assert!(out.is_degraded());
        assert_eq!(out.into_value(), "");
    }

    #[test]
    fn supported_extensions() {
        assert!(is_supported(Path::new("a.pdf")));
        assert!(is_supported(Path::new("scan.JPEG")));
        assert!(is_supported(Path::new("notes.txt")));
        assert!(!is_supported(Path::new("sheet.xlsx")));
        assert!(!is_supported(Path::new("README")));
    }
}
