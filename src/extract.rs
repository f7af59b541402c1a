//! Format dispatch and local text extraction for uploaded files.
//!
//! Every supported upload format is a [`FileFormat`] variant, so adding a
//! format is an exhaustive-match change rather than a string-suffix chain.
//! Text formats (txt, csv, json) are extracted in-process; binary container
//! formats (docx, pdf) and images are delegated to the remote extraction
//! service (see [`crate::remote`]).

use crate::models::ExtractionResult;

/// Placeholder body used when a file yields no extractable text.
pub const EMPTY_CONTENT_PLACEHOLDER: &str =
    "(No text content could be extracted from this file)";

/// Extensions accepted by the upload surface, lowercase.
pub const SUPPORTED_EXTENSIONS: &[&str] =
    &["json", "csv", "txt", "docx", "pdf", "jpg", "jpeg", "png"];

/// Extraction error. Per-file: one failing file never aborts the batch.
#[derive(Debug)]
pub enum ExtractError {
    /// The file extension is not in the supported set.
    UnsupportedFormat(String),
    /// The bytes were not valid UTF-8 for a text format.
    Decode(String),
    /// CSV payload could not be interpreted.
    Csv(String),
    /// JSON payload could not be parsed.
    Json(String),
    /// The remote extraction service failed or was unreachable.
    Remote(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::UnsupportedFormat(ext) => {
                write!(f, "unsupported file type: {}", ext)
            }
            ExtractError::Decode(e) => write!(f, "text decoding failed: {}", e),
            ExtractError::Csv(e) => write!(f, "CSV extraction failed: {}", e),
            ExtractError::Json(e) => write!(f, "JSON extraction failed: {}", e),
            ExtractError::Remote(e) => write!(f, "remote extraction failed: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Closed set of upload formats, resolved from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Txt,
    Csv,
    Json,
    Docx,
    Pdf,
    Jpg,
    Jpeg,
    Png,
}

impl FileFormat {
    /// Resolve a format from a filename. Fails with
    /// [`ExtractError::UnsupportedFormat`] for unknown extensions.
    pub fn from_name(name: &str) -> Result<Self, ExtractError> {
        let ext = name.rsplit('.').next().unwrap_or("").to_lowercase();
        match ext.as_str() {
            "txt" => Ok(FileFormat::Txt),
            "csv" => Ok(FileFormat::Csv),
            "json" => Ok(FileFormat::Json),
            "docx" => Ok(FileFormat::Docx),
            "pdf" => Ok(FileFormat::Pdf),
            "jpg" => Ok(FileFormat::Jpg),
            "jpeg" => Ok(FileFormat::Jpeg),
            "png" => Ok(FileFormat::Png),
            _ => Err(ExtractError::UnsupportedFormat(if ext.is_empty() {
                name.to_string()
            } else {
                ext
            })),
        }
    }

    /// Whether extraction is delegated to the remote service.
    pub fn is_remote(&self) -> bool {
        match self {
            FileFormat::Txt | FileFormat::Csv | FileFormat::Json => false,
            FileFormat::Docx | FileFormat::Pdf => true,
            FileFormat::Jpg | FileFormat::Jpeg | FileFormat::Png => true,
        }
    }

    /// Declared media type forwarded to the remote service.
    pub fn media_type(&self) -> &'static str {
        match self {
            FileFormat::Txt => "text/plain",
            FileFormat::Csv => "text/csv",
            FileFormat::Json => "application/json",
            FileFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            FileFormat::Pdf => "application/pdf",
            FileFormat::Jpg | FileFormat::Jpeg => "image/jpeg",
            FileFormat::Png => "image/png",
        }
    }

    /// Human-readable source label recorded on imported notes.
    pub fn source_label(&self) -> &'static str {
        match self {
            FileFormat::Txt => "TXT File",
            FileFormat::Csv => "CSV File",
            FileFormat::Json => "JSON File",
            FileFormat::Docx => "Word Document",
            FileFormat::Pdf => "PDF Document",
            FileFormat::Jpg | FileFormat::Jpeg | FileFormat::Png => "Image (OCR)",
        }
    }
}

/// Filename minus its extension, used as the note title.
pub fn title_from_name(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => name.to_string(),
    }
}

/// Extract a text-format file in-process.
///
/// Only valid for formats where [`FileFormat::is_remote`] is false; the
/// dispatcher routes binary formats to the remote service before this point.
pub fn extract_local(
    format: FileFormat,
    file_name: &str,
    bytes: &[u8],
) -> Result<ExtractionResult, ExtractError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| ExtractError::Decode(e.to_string()))?
        .to_string();

    let content = match format {
        FileFormat::Txt => text,
        FileFormat::Csv => csv_to_lines(&text),
        FileFormat::Json => json_to_text(&text)?,
        FileFormat::Docx | FileFormat::Pdf | FileFormat::Jpg | FileFormat::Jpeg
        | FileFormat::Png => {
            unreachable!("binary formats are handled by the extraction service")
        }
    };

    Ok(ExtractionResult {
        title: title_from_name(file_name),
        content,
        source: format.source_label().to_string(),
    })
}

/// Substitute the placeholder when extraction produced no usable text.
pub fn finalize_content(content: String) -> String {
    if content.trim().is_empty() {
        EMPTY_CONTENT_PLACEHOLDER.to_string()
    } else {
        content
    }
}

/// Render CSV as one `header: value, ...` line per data row.
///
/// The first line is the header row; blank data lines are skipped. Rows
/// shorter than the header are padded with empty values.
fn csv_to_lines(text: &str) -> String {
    let mut lines = text.lines();
    let headers: Vec<&str> = match lines.next() {
        Some(header) => header.split(',').map(str::trim).collect(),
        None => return String::new(),
    };

    lines
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let values: Vec<&str> = line.split(',').map(str::trim).collect();
            headers
                .iter()
                .enumerate()
                .map(|(i, header)| {
                    format!("{}: {}", header, values.get(i).copied().unwrap_or(""))
                })
                .collect::<Vec<_>>()
                .join(", ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render a JSON payload as readable text.
///
/// Arrays become pretty-printed elements joined by blank lines, objects are
/// pretty-printed as-is, scalars are stringified.
fn json_to_text(text: &str) -> Result<String, ExtractError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| ExtractError::Json(e.to_string()))?;

    let rendered = match value {
        serde_json::Value::Array(items) => items
            .iter()
            .map(|item| serde_json::to_string_pretty(item).unwrap_or_default())
            .collect::<Vec<_>>()
            .join("\n\n"),
        serde_json::Value::Object(_) => {
            serde_json::to_string_pretty(&value).unwrap_or_default()
        }
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    };

    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_extension_is_unsupported() {
        let err = FileFormat::from_name("notes.xyz").unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedFormat(ref e) if e == "xyz"));

        let err = FileFormat::from_name("no-extension").unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedFormat(_)));
    }

    #[test]
    fn every_supported_extension_resolves() {
        for ext in SUPPORTED_EXTENSIONS {
            let name = format!("file.{}", ext);
            assert!(FileFormat::from_name(&name).is_ok(), "failed for {}", ext);
        }
    }

    #[test]
    fn extension_matching_is_case_insensitive() {
        assert_eq!(FileFormat::from_name("SCAN.PDF").unwrap(), FileFormat::Pdf);
        assert_eq!(FileFormat::from_name("a.Txt").unwrap(), FileFormat::Txt);
    }

    #[test]
    fn txt_is_extracted_verbatim() {
        let result = extract_local(FileFormat::Txt, "journal.txt", b"line one\nline two").unwrap();
        assert_eq!(result.title, "journal");
        assert_eq!(result.content, "line one\nline two");
        assert_eq!(result.source, "TXT File");
    }

    #[test]
    fn csv_rows_zip_against_headers() {
        let csv = "name,role\nSarah,designer\n\nLee,engineer\n";
        let result = extract_local(FileFormat::Csv, "team.csv", csv.as_bytes()).unwrap();
        assert_eq!(
            result.content,
            "name: Sarah, role: designer\nname: Lee, role: engineer"
        );
    }

    #[test]
    fn csv_short_row_pads_empty_values() {
        let csv = "a,b,c\n1,2\n";
        let result = extract_local(FileFormat::Csv, "t.csv", csv.as_bytes()).unwrap();
        assert_eq!(result.content, "a: 1, b: 2, c: ");
    }

    #[test]
    fn json_array_renders_blocks_separated_by_blank_line() {
        let json = r#"[{"a":1},{"b":2}]"#;
        let result = extract_local(FileFormat::Json, "data.json", json.as_bytes()).unwrap();
        let blocks: Vec<&str> = result.content.split("\n\n").collect();
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].contains("\"a\": 1"));
        assert!(blocks[1].contains("\"b\": 2"));
    }

    #[test]
    fn json_object_renders_pretty() {
        let json = r#"{"k":"v"}"#;
        let result = extract_local(FileFormat::Json, "obj.json", json.as_bytes()).unwrap();
        assert_eq!(result.content, "{\n  \"k\": \"v\"\n}");
    }

    #[test]
    fn json_scalars_stringify() {
        let result = extract_local(FileFormat::Json, "s.json", b"\"hello\"").unwrap();
        assert_eq!(result.content, "hello");
        let result = extract_local(FileFormat::Json, "n.json", b"42").unwrap();
        assert_eq!(result.content, "42");
    }

    #[test]
    fn invalid_json_is_a_json_error() {
        let err = extract_local(FileFormat::Json, "bad.json", b"{nope").unwrap_err();
        assert!(matches!(err, ExtractError::Json(_)));
    }

    #[test]
    fn invalid_utf8_is_a_decode_error() {
        let err = extract_local(FileFormat::Txt, "bin.txt", &[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(err, ExtractError::Decode(_)));
    }

    #[test]
    fn whitespace_only_content_becomes_placeholder() {
        assert_eq!(finalize_content("  \n\t ".to_string()), EMPTY_CONTENT_PLACEHOLDER);
        assert_eq!(finalize_content("kept".to_string()), "kept");
    }

    #[test]
    fn title_strips_only_the_final_extension() {
        assert_eq!(title_from_name("report.v2.pdf"), "report.v2");
        assert_eq!(title_from_name("plain"), "plain");
    }
}
