//! Service-side text extraction from binary document containers.
//!
//! Backs the `/api/process-file` route for the formats the ingestion client
//! does not decode locally: PDF, DOCX, and images. Image OCR shells out to
//! an external command when one is configured; extraction never panics —
//! every failure returns an error the route converts into a human-readable
//! message.

use std::io::Read;
use std::path::PathBuf;

use crate::config::ExtractionConfig;

/// Maximum decompressed bytes read from a single ZIP entry. DOCX bodies
/// larger than this are rejected rather than inflated into memory.
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Extraction failure on the service side.
#[derive(Debug)]
pub enum DocTextError {
    Pdf(String),
    Docx(String),
    Ocr(String),
}

impl std::fmt::Display for DocTextError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocTextError::Pdf(e) => write!(f, "Failed to process PDF: {}", e),
            DocTextError::Docx(e) => write!(f, "Failed to process Word document: {}", e),
            DocTextError::Ocr(e) => write!(f, "Failed to perform OCR on image: {}", e),
        }
    }
}

impl std::error::Error for DocTextError {}

/// Extract plain text from a PDF.
pub fn pdf_text(bytes: &[u8]) -> Result<String, DocTextError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| DocTextError::Pdf(e.to_string()))
}

/// Extract plain text from a DOCX container.
///
/// Reads `word/document.xml` (bounded) and joins the contents of every
/// `<w:t>` run with spaces.
pub fn docx_text(bytes: &[u8]) -> Result<String, DocTextError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| DocTextError::Docx(e.to_string()))?;

    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| DocTextError::Docx("word/document.xml not found".to_string()))?;

    let mut document_xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut document_xml)
        .map_err(|e| DocTextError::Docx(e.to_string()))?;
    if document_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(DocTextError::Docx(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }

    collect_text_nodes(&document_xml)
}

/// Join the text content of every `<t>` element (any namespace) in the
/// given XML with single spaces.
fn collect_text_nodes(xml: &[u8]) -> Result<String, DocTextError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut pieces: Vec<String> = Vec::new();
    let mut buf = Vec::new();
    let mut in_text_node = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                in_text_node = e.local_name().as_ref() == b"t";
            }
            Ok(quick_xml::events::Event::Text(t)) if in_text_node => {
                let text = t.unescape().unwrap_or_default().into_owned();
                if !text.is_empty() {
                    pieces.push(text);
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text_node = false;
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(DocTextError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(pieces.join(" "))
}

/// Run the configured OCR command over an image.
///
/// The image is written to a scratch file and the command is invoked as
/// `<ocr_command> <path> stdout` (the tesseract calling convention). Stdout
/// is the recognized text.
pub async fn image_text(
    config: &ExtractionConfig,
    bytes: &[u8],
    extension: &str,
) -> Result<String, DocTextError> {
    let command = match &config.ocr_command {
        Some(command) => command.clone(),
        None => {
            return Err(DocTextError::Ocr(
                "no OCR command configured; set [extraction].ocr_command (e.g. \"tesseract\")"
                    .to_string(),
            ))
        }
    };

    let scratch: PathBuf = std::env::temp_dir().join(format!(
        "noteflow-ocr-{}.{}",
        uuid::Uuid::new_v4(),
        extension
    ));
    tokio::fs::write(&scratch, bytes)
        .await
        .map_err(|e| DocTextError::Ocr(e.to_string()))?;

    let output = tokio::process::Command::new(&command)
        .arg(&scratch)
        .arg("stdout")
        .output()
        .await;

    let _ = tokio::fs::remove_file(&scratch).await;

    let output = output.map_err(|e| DocTextError::Ocr(format!("{}: {}", command, e)))?;
    if !output.status.success() {
        return Err(DocTextError::Ocr(format!(
            "{} exited with {}: {}",
            command,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn docx_with_text(runs: &[&str]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut archive = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            archive
                .start_file("word/document.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            let body = runs
                .iter()
                .map(|run| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", run))
                .collect::<String>();
            let xml = format!(
                "<?xml version=\"1.0\"?><w:document \
                 xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
                 <w:body>{}</w:body></w:document>",
                body
            );
            archive.write_all(xml.as_bytes()).unwrap();
            archive.finish().unwrap();
        }
        buf
    }

    #[test]
    fn docx_runs_join_with_spaces() {
        let bytes = docx_with_text(&["meeting notes", "for tuesday"]);
        assert_eq!(docx_text(&bytes).unwrap(), "meeting notes for tuesday");
    }

    #[test]
    fn docx_without_document_xml_fails() {
        let mut buf = Vec::new();
        {
            let mut archive = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            archive
                .start_file("other.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            archive.write_all(b"<x/>").unwrap();
            archive.finish().unwrap();
        }
        assert!(matches!(docx_text(&buf), Err(DocTextError::Docx(_))));
    }

    #[test]
    fn not_a_zip_fails_for_docx() {
        assert!(matches!(docx_text(b"plain bytes"), Err(DocTextError::Docx(_))));
    }

    #[test]
    fn invalid_pdf_fails() {
        assert!(matches!(pdf_text(b"not a pdf"), Err(DocTextError::Pdf(_))));
    }

    #[tokio::test]
    async fn image_without_ocr_command_fails_with_guidance() {
        let config = ExtractionConfig::default();
        let err = image_text(&config, &[0u8; 4], "png").await.unwrap_err();
        assert!(err.to_string().contains("ocr_command"));
    }
}
