//! Input validation: make sure a configured path is a readable PDF.
//!
//! pdfium reports a missing file and a corrupt file with the same opaque
//! error, so the cheap checks run first: existence, read permission, and the
//! `%PDF` magic bytes. Callers get a specific [`DdrError`] for each.

use crate::error::DdrError;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Check that `path` exists, is readable, and starts with `%PDF`.
pub fn validate_pdf(path: &Path) -> Result<(), DdrError> {
    if !path.is_file() {
        return Err(DdrError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let mut file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(DdrError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(_) => {
            return Err(DdrError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    };

    let mut magic = [0u8; 4];
    match file.read_exact(&mut magic) {
        Ok(()) if &magic == b"%PDF" => {}
        Ok(()) => {
            return Err(DdrError::NotAPdf {
                path: path.to_path_buf(),
                magic,
            });
        }
        Err(_) => {
            // Shorter than four bytes.
            return Err(DdrError::NotAPdf {
                path: path.to_path_buf(),
                magic,
            });
        }
    }

    debug!("Validated PDF input: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn missing_file_is_document_open_error() {
        let err = validate_pdf(Path::new("/definitely/not/here.pdf")).unwrap_err();
        assert!(matches!(err, DdrError::FileNotFound { .. }));
        assert_eq!(err.kind(), ErrorKind::DocumentOpen);
    }

    #[test]
    fn directory_is_not_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = validate_pdf(dir.path()).unwrap_err();
        assert!(matches!(err, DdrError::FileNotFound { .. }));
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        std::fs::write(&path, b"PK\x03\x04 not a pdf").unwrap();

        match validate_pdf(&path).unwrap_err() {
            DdrError::NotAPdf { magic, .. } => assert_eq!(&magic, b"PK\x03\x04"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn truncated_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.pdf");
        std::fs::write(&path, b"%P").unwrap();
        assert_eq!(validate_pdf(&path).unwrap_err().kind(), ErrorKind::DocumentOpen);
    }

    #[test]
    fn pdf_magic_passes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ok.pdf");
        std::fs::write(&path, b"%PDF-1.7\n").unwrap();
        validate_pdf(&path).unwrap();
    }
}
