use serde::{Deserialize, Serialize};

/// Broad document family, detected from the filename extension. Drives the
/// extraction strategy in the AI gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    Pdf,
    Image,
    Text,
    Office,
}

impl FileKind {
    pub fn from_filename(filename: &str) -> Option<Self> {
        let extension = filename.rsplit('.').next()?.to_lowercase();
        match extension.as_str() {
            "pdf" => Some(FileKind::Pdf),
            "jpg" | "jpeg" | "png" => Some(FileKind::Image),
            "txt" => Some(FileKind::Text),
            "docx" => Some(FileKind::Office),
            _ => None,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            FileKind::Pdf => "application/pdf",
            FileKind::Image => "image/png",
            FileKind::Text => "text/plain",
            FileKind::Office => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Pdf => "pdf",
            FileKind::Image => "image",
            FileKind::Text => "text",
            FileKind::Office => "office",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_from_filename() {
        assert_eq!(FileKind::from_filename("report.pdf"), Some(FileKind::Pdf));
        assert_eq!(FileKind::from_filename("scan.JPEG"), Some(FileKind::Image));
        assert_eq!(FileKind::from_filename("notes.txt"), Some(FileKind::Text));
        assert_eq!(
            FileKind::from_filename("letter.docx"),
            Some(FileKind::Office)
        );
        assert_eq!(FileKind::from_filename("payload.sh"), None);
        assert_eq!(FileKind::from_filename("noextension"), None);
    }
}
