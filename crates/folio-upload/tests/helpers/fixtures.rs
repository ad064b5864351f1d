use folio_core::UploadFile;

/// Small JPEG-typed file, below the compression threshold
pub fn small_jpeg(name: &str) -> UploadFile {
    UploadFile::new(name, "image/jpeg", vec![b'x'; 2048])
}

/// JPEG-typed file large enough to be compressed but not decodable
pub fn undecodable_jpeg(name: &str) -> UploadFile {
    UploadFile::new(name, "image/jpeg", vec![b'z'; 300 * 1024])
}

pub fn pdf(name: &str) -> UploadFile {
    UploadFile::new(name, "application/pdf", b"%PDF-1.7".to_vec())
}
