use crate::error::CorruptArchive;
use anyhow::Error;
use flate2::{read::GzDecoder, Compression, GzBuilder};
use std::{
    fs::File,
    io::{BufReader, BufWriter, ErrorKind, Write},
    path::Path,
};
use tempfile::TempPath;

/// Inflate the first gzip member of `source` into a temporary tar file.
///
/// Any data following the first member is ignored. The returned path removes the file when it
/// is dropped.
#[culpa::throws]
#[fn_error_context::context("decompressing {}", source.display())]
pub(crate) fn decompress(source: &Path) -> TempPath {
    tracing::info!("gunzip of {} ...", source.display());

    let mut decoder = GzDecoder::new(BufReader::new(File::open(source)?));
    let mut temp = tempfile::Builder::new()
        .prefix("tarmagic-")
        .suffix(".tar")
        .tempfile()?;
    tracing::debug!("created temp file {}", temp.path().display());

    std::io::copy(&mut decoder, temp.as_file_mut()).map_err(|err| match err.kind() {
        ErrorKind::InvalidInput | ErrorKind::InvalidData | ErrorKind::UnexpectedEof => {
            Error::new(CorruptArchive(err, source.display().to_string()))
        }
        _ => Error::new(err),
    })?;
    temp.as_file_mut().flush()?;

    tracing::info!("gunzip of {} done", source.display());
    temp.into_temp_path()
}

/// Gzip `source` into `dest`, naming the embedded member after `dest`'s file name.
#[culpa::throws]
#[fn_error_context::context("compressing {} into {}", source.display(), dest.display())]
pub(crate) fn compress(source: &Path, dest: &Path) {
    tracing::info!("gzip of {} ...", dest.display());

    let mut reader = BufReader::new(File::open(source)?);
    let writer = BufWriter::new(File::create(dest)?);
    let name = dest
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut encoder = GzBuilder::new()
        .filename(name)
        .write(writer, Compression::default());
    std::io::copy(&mut reader, &mut encoder)?;
    encoder
        .finish()?
        .into_inner()
        .map_err(|err| err.into_error())?
        .sync_all()?;

    tracing::info!("gzip of {} done", dest.display());
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use std::io::Read;

    fn gzipped(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn decompress_inflates_into_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in.tar.gz");
        std::fs::write(&source, gzipped(b"tar bytes")).unwrap();

        let temp = decompress(&source).unwrap();
        assert_eq!(std::fs::read(&temp).unwrap(), b"tar bytes");

        let path = temp.to_path_buf();
        drop(temp);
        assert!(!path.exists());
    }

    #[test]
    fn decompress_reads_only_the_first_member() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("multi.gz");
        let mut data = gzipped(b"first");
        data.extend(gzipped(b"second"));
        std::fs::write(&source, data).unwrap();

        let temp = decompress(&source).unwrap();
        assert_eq!(std::fs::read(&temp).unwrap(), b"first");
    }

    #[test]
    fn decompress_rejects_non_gzip_input() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("plain.gz");
        std::fs::write(&source, b"definitely not gzip data").unwrap();

        let err = decompress(&source).unwrap_err();
        assert!(err.downcast_ref::<CorruptArchive>().is_some(), "{err:?}");
    }

    #[test]
    fn decompress_missing_source_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = decompress(&dir.path().join("absent.gz")).unwrap_err();
        assert_eq!(
            err.downcast_ref::<std::io::Error>().map(|err| err.kind()),
            Some(ErrorKind::NotFound)
        );
    }

    #[test]
    fn compress_names_member_after_destination() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("plain.tar");
        let dest = dir.path().join("packed.tar.gz");
        std::fs::write(&source, b"payload").unwrap();

        compress(&source, &dest).unwrap();

        let mut decoder = GzDecoder::new(File::open(&dest).unwrap());
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"payload");
        assert_eq!(
            decoder.header().and_then(|header| header.filename()),
            Some(&b"packed.tar.gz"[..])
        );
    }
}
