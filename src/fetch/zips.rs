// src/fetch/zips.rs

use anyhow::{Context, Result};
use reqwest::Client;
use std::{
    fs::File,
    io::Read,
    path::{Path, PathBuf},
};
use tokio::fs;
use url::Url;
use zip::ZipArchive;

use crate::error::ProviderError;

/// Download the given ZIP URL and save it under `dest_dir` as `file_name`.
/// Returns the full path of the saved file.
pub async fn download_zip(
    client: &Client,
    url: &Url,
    dest_dir: impl AsRef<Path>,
    file_name: &str,
) -> Result<PathBuf> {
    let dest_path = dest_dir.as_ref().join(file_name);
    let bytes = super::get_bytes(client, url).await?;
    fs::write(&dest_path, &bytes)
        .await
        .with_context(|| format!("writing {}", dest_path.display()))?;
    Ok(dest_path)
}

/// Read the first entry of the archive at `zip_path` into memory.
/// Returns the entry name alongside its bytes.
pub fn read_first_entry(zip_path: &Path) -> Result<(String, Vec<u8>), ProviderError> {
    let file = File::open(zip_path)?;
    let mut archive = ZipArchive::new(file)?;
    if archive.is_empty() {
        return Err(ProviderError::EmptyArchive);
    }
    let mut entry = archive.by_index(0)?;
    let name = entry.name().to_string();
    let mut buf = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut buf)?;
    Ok((name, buf))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::{write::SimpleFileOptions, ZipWriter};

    /// Writes a ZIP holding the given `(name, contents)` entries.
    pub(crate) fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut zw = ZipWriter::new(file);
        for (name, contents) in entries {
            zw.start_file(*name, SimpleFileOptions::default()).unwrap();
            zw.write_all(contents.as_bytes()).unwrap();
        }
        zw.finish().unwrap();
    }

    #[test]
    fn test_read_first_entry() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("data.zip");
        write_zip(&path, &[("a.csv", "first"), ("b.csv", "second")]);

        let (name, bytes) = read_first_entry(&path).unwrap();
        assert_eq!(name, "a.csv");
        assert_eq!(bytes, b"first");
    }

    #[test]
    fn test_empty_archive() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("empty.zip");
        write_zip(&path, &[]);
        assert!(matches!(
            read_first_entry(&path),
            Err(ProviderError::EmptyArchive)
        ));
    }

    #[test]
    fn test_not_a_zip() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("broken.zip");
        std::fs::write(&path, b"<html>maintenance</html>").unwrap();
        assert!(matches!(
            read_first_entry(&path),
            Err(ProviderError::Zip(_) | ProviderError::Io(_))
        ));
    }
}
