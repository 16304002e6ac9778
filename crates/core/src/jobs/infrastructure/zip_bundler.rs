use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::jobs::domain::artifact::Artifact;
use crate::shared::constants::{ARCHIVE_CONTENT_TYPE, ARCHIVE_FILENAME};

/// Packs several artifacts into one deflated ZIP held in memory.
pub fn bundle(artifacts: &[Artifact]) -> zip::result::ZipResult<Artifact> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for artifact in artifacts {
        zip.start_file(artifact.filename.as_str(), options)?;
        zip.write_all(&artifact.bytes)?;
    }

    let bytes = zip.finish()?.into_inner();
    Ok(Artifact {
        filename: ARCHIVE_FILENAME.to_string(),
        content_type: ARCHIVE_CONTENT_TYPE.to_string(),
        bytes,
        duration_seconds: None,
    })
}
