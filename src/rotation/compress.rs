//! Compression of rotated backups

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;

use super::{Compression, RotateError};

/// Compress `path` next to itself and remove the original.
///
/// Returns the path of the compressed file.
pub(super) fn compress(path: &Path, compression: Compression) -> Result<PathBuf, RotateError> {
    let compressed_path = {
        let mut name = path.as_os_str().to_owned();
        name.push(format!(".{}", compression.extension()));
        PathBuf::from(name)
    };

    let failed = |err: io::Error| RotateError::CompressFailed {
        path: path.to_path_buf(),
        error: err.to_string(),
    };

    let mut reader = BufReader::new(File::open(path).map_err(failed)?);
    let writer = BufWriter::new(File::create(&compressed_path).map_err(failed)?);

    match compression {
        Compression::Gzip => {
            let mut encoder = GzEncoder::new(writer, flate2::Compression::default());
            io::copy(&mut reader, &mut encoder).map_err(failed)?;
            let mut writer = encoder.finish().map_err(failed)?;
            io::Write::flush(&mut writer).map_err(failed)?;
        }
    }

    fs::remove_file(path).map_err(|err| RotateError::RemoveFileError {
        path: path.to_path_buf(),
        error: err.to_string(),
    })?;
    Ok(compressed_path)
}
