//! Text extraction for uploaded resume files. Everything happens in
//! memory; uploads are never written to disk.

/// Extensions the analyze endpoint accepts.
pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "txt", "doc", "docx"];

/// Lowercased extension of `filename`, if it has one.
pub fn file_extension(filename: &str) -> Option<String> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// Best-effort text extraction. Parse failures degrade to an explanatory
/// placeholder so the analysis can still tell the user what went wrong.
pub fn extract_text(filename: &str, bytes: &[u8]) -> String {
    match file_extension(filename).as_deref() {
        Some("txt") => String::from_utf8_lossy(bytes).into_owned(),
        Some("pdf") => match pdf_extract::extract_text_from_mem(bytes) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("PDF parsing failed for {filename}: {e}");
                "Unable to parse PDF content. Please try uploading a TXT file.".to_string()
            }
        },
        _ => "File type not fully supported. Please upload a PDF or TXT file for best results."
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_is_lowercased() {
        assert_eq!(file_extension("Resume.PDF").as_deref(), Some("pdf"));
        assert_eq!(file_extension("cv.tar.gz").as_deref(), Some("gz"));
        assert_eq!(file_extension("no_extension"), None);
        assert_eq!(file_extension("trailing."), None);
    }

    #[test]
    fn test_txt_extraction_reads_bytes() {
        let text = extract_text("resume.txt", "plain resume text".as_bytes());
        assert_eq!(text, "plain resume text");
    }

    #[test]
    fn test_doc_falls_back_to_placeholder() {
        let text = extract_text("resume.docx", b"\xd0\xcf\x11\xe0");
        assert!(text.contains("not fully supported"));
    }

    #[test]
    fn test_invalid_pdf_falls_back_to_placeholder() {
        let text = extract_text("resume.pdf", b"this is not a pdf");
        assert!(text.contains("Unable to parse PDF"));
    }
}
