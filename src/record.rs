//! File records and the kind tags derived from names / MIME types.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::credential_store::CredentialId;
use crate::recency::Modified;

/// Where a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "credential_id")]
pub enum SourceRef {
    Local,
    Credential(CredentialId),
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceRef::Local => write!(f, "local"),
            SourceRef::Credential(id) => write!(f, "credential:{}", id),
        }
    }
}

/// Coarse file category used for the type label and the icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Document,
    Spreadsheet,
    Presentation,
    Pdf,
    Image,
    Video,
    Audio,
    Archive,
    Code,
    Other,
}

/// Archive subtypes mime_guess reports under `application/*`
const ARCHIVE_SUBTYPES: &[&str] = &[
    "zip", "x-zip-compressed", "gzip", "x-gzip", "x-tar", "x-7z-compressed", "vnd.rar",
    "x-rar-compressed", "x-bzip2", "x-xz",
];

const CODE_EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "ts", "tsx", "jsx", "java", "kt", "go", "c", "h", "cpp", "cs", "rb", "sh",
    "json", "toml", "yaml", "yml", "xml", "sql",
];

impl FileKind {
    /// Classify by MIME type, falling back to the file name extension.
    pub fn classify(name: &str, mime_type: Option<&str>) -> Self {
        let guessed;
        let mime = match mime_type {
            Some(m) if !m.is_empty() => m,
            _ => {
                guessed = mime_guess::from_path(name).first_or_octet_stream().to_string();
                guessed.as_str()
            }
        };
        let mime = mime.to_ascii_lowercase();
        let (top, sub) = mime.split_once('/').unwrap_or((mime.as_str(), ""));

        match top {
            "image" => return FileKind::Image,
            "video" => return FileKind::Video,
            "audio" => return FileKind::Audio,
            _ => {}
        }
        if sub == "pdf" {
            return FileKind::Pdf;
        }
        if sub.contains("spreadsheet") || sub.contains("ms-excel") || sub == "csv" {
            return FileKind::Spreadsheet;
        }
        if sub.contains("presentation") || sub.contains("ms-powerpoint") {
            return FileKind::Presentation;
        }
        if sub.contains("wordprocessing") || sub == "msword" || sub.contains("opendocument.text") {
            return FileKind::Document;
        }
        if ARCHIVE_SUBTYPES.contains(&sub) {
            return FileKind::Archive;
        }

        let extension = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        if CODE_EXTENSIONS.contains(&extension.as_str()) {
            return FileKind::Code;
        }
        if top == "text" {
            return FileKind::Document;
        }
        FileKind::Other
    }

    pub fn icon(self) -> &'static str {
        match self {
            FileKind::Document => "📄",
            FileKind::Spreadsheet => "📊",
            FileKind::Presentation => "📽️",
            FileKind::Pdf => "📕",
            FileKind::Image => "🖼️",
            FileKind::Video => "🎬",
            FileKind::Audio => "🎵",
            FileKind::Archive => "🗜️",
            FileKind::Code => "💻",
            FileKind::Other => "📁",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FileKind::Document => "Document",
            FileKind::Spreadsheet => "Spreadsheet",
            FileKind::Presentation => "Presentation",
            FileKind::Pdf => "PDF",
            FileKind::Image => "Image",
            FileKind::Video => "Video",
            FileKind::Audio => "Audio",
            FileKind::Archive => "Archive",
            FileKind::Code => "Code",
            FileKind::Other => "File",
        }
    }
}

/// One entry of the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Unique within `source`
    pub id: String,
    pub name: String,
    /// Type/category label shown next to the name
    pub file_type: String,
    pub kind: FileKind,
    pub modified_by: String,
    pub modified: Modified,
    /// Local overlay; sources never see it
    #[serde(default)]
    pub favorite: bool,
    pub source: SourceRef,
}

impl FileRecord {
    pub fn icon(&self) -> &'static str {
        self.kind.icon()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_mime() {
        assert_eq!(FileKind::classify("x", Some("image/png")), FileKind::Image);
        assert_eq!(FileKind::classify("x", Some("application/pdf")), FileKind::Pdf);
        assert_eq!(
            FileKind::classify(
                "x",
                Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet")
            ),
            FileKind::Spreadsheet
        );
        assert_eq!(
            FileKind::classify(
                "x",
                Some("application/vnd.openxmlformats-officedocument.presentationml.presentation")
            ),
            FileKind::Presentation
        );
    }

    #[test]
    fn test_classify_by_extension() {
        assert_eq!(FileKind::classify("report.pdf", None), FileKind::Pdf);
        assert_eq!(FileKind::classify("photo.JPG", None), FileKind::Image);
        assert_eq!(FileKind::classify("notes.txt", None), FileKind::Document);
        assert_eq!(FileKind::classify("main.rs", None), FileKind::Code);
        assert_eq!(FileKind::classify("backup.zip", None), FileKind::Archive);
        assert_eq!(FileKind::classify("Makefile", None), FileKind::Other);
    }

    #[test]
    fn test_source_ref_display() {
        assert_eq!(SourceRef::Local.to_string(), "local");
        let id = CredentialId::new();
        assert_eq!(SourceRef::Credential(id).to_string(), format!("credential:{}", id));
    }
}
