//! Argos Translate language pack downloads.
//!
//! Fetches the public package index, picks the packages for the configured
//! language pairs, streams each `.argosmodel` into the download directory and
//! unpacks it into the Argos `packages/` directory.

use crate::error::{Result, SmartsumError};
use futures_util::{Stream, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use std::fmt::Display;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// One entry of the Argos package index.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ArgosPackage {
    pub from_code: String,
    pub to_code: String,
    #[serde(default)]
    pub from_name: Option<String>,
    #[serde(default)]
    pub to_name: Option<String>,
    #[serde(default)]
    pub package_version: Option<String>,
    #[serde(default)]
    pub links: Vec<String>,
}

impl ArgosPackage {
    /// File name the package is stored under.
    pub fn filename(&self) -> String {
        let version = self
            .package_version
            .as_deref()
            .unwrap_or("0")
            .replace('.', "_");
        format!(
            "translate-{}_{}-{}.argosmodel",
            self.from_code, self.to_code, version
        )
    }

    pub fn pair(&self) -> String {
        format!("{} -> {}", self.from_code, self.to_code)
    }
}

/// Download and parse the package index.
pub async fn fetch_index(url: &str) -> Result<Vec<ArgosPackage>> {
    log::info!("Fetching language pack index from {}", url);
    let response = reqwest::get(url)
        .await
        .map_err(|e| SmartsumError::Other(format!("Failed to fetch package index: {e}")))?;

    if !response.status().is_success() {
        return Err(SmartsumError::Other(format!(
            "Package index request failed with status: {}",
            response.status()
        )));
    }

    response
        .json::<Vec<ArgosPackage>>()
        .await
        .map_err(|e| SmartsumError::Other(format!("Failed to parse package index: {e}")))
}

/// Pick the package for each `(from, to)` pair, in pair order.
///
/// # Errors
/// Fails naming the first pair the index has no package for.
pub fn select_packages<'a>(
    index: &'a [ArgosPackage],
    pairs: &[(&str, &str)],
) -> Result<Vec<&'a ArgosPackage>> {
    pairs
        .iter()
        .map(|(from, to)| {
            index
                .iter()
                .find(|p| p.from_code == *from && p.to_code == *to)
                .ok_or_else(|| {
                    SmartsumError::Other(format!("No language pack for {from} -> {to} in index"))
                })
        })
        .collect()
}

/// Stream one package into `dir`. Already downloaded packages are skipped.
pub async fn download_package(
    package: &ArgosPackage,
    dir: &Path,
    progress: bool,
) -> Result<PathBuf> {
    let output_path = dir.join(package.filename());
    if output_path.exists() {
        log::info!(
            "Language pack {} already present at {}",
            package.pair(),
            output_path.display()
        );
        return Ok(output_path);
    }

    let url = package.links.first().ok_or_else(|| {
        SmartsumError::Other(format!("Language pack {} has no download link", package.pair()))
    })?;

    fs::create_dir_all(dir)
        .map_err(|e| SmartsumError::Other(format!("Failed to create package directory: {e}")))?;

    if progress {
        eprintln!("Downloading {}...", package.pair());
    }

    let response = reqwest::get(url)
        .await
        .map_err(|e| SmartsumError::Other(format!("Failed to start download: {e}")))?;

    if !response.status().is_success() {
        return Err(SmartsumError::Other(format!(
            "Download failed with status: {}",
            response.status()
        )));
    }

    let total_size = response.content_length().unwrap_or(0);

    let pb = if progress {
        let pb = ProgressBar::new(total_size);
        pb.set_style(
            // SAFETY: hardcoded template string, always valid
            #[allow(clippy::expect_used)]
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                .expect("hardcoded progress bar template")
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    // Write to a partial file so an interrupted download is never mistaken for a package
    let partial_path = output_path.with_extension("part");
    save_stream(response.bytes_stream(), &partial_path, pb.as_ref()).await?;

    if let Some(pb) = pb {
        pb.finish_with_message("Downloaded");
    }

    fs::rename(&partial_path, &output_path)?;
    log::info!(
        "Language pack {} saved to {}",
        package.pair(),
        output_path.display()
    );

    Ok(output_path)
}

/// Write a byte stream to `partial_path`.
///
/// The partial file is removed again when reading or writing fails.
async fn save_stream<S, B, E>(
    mut stream: S,
    partial_path: &Path,
    pb: Option<&ProgressBar>,
) -> Result<()>
where
    S: Stream<Item = std::result::Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Display,
{
    let mut file = fs::File::create(partial_path)
        .map_err(|e| SmartsumError::Other(format!("Failed to create output file: {e}")))?;

    let mut written = Ok(());
    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                written = Err(SmartsumError::Other(format!(
                    "Failed to read download chunk: {e}"
                )));
                break;
            }
        };
        let bytes = chunk.as_ref();
        if let Err(e) = file.write_all(bytes) {
            written = Err(SmartsumError::Other(format!("Failed to write to file: {e}")));
            break;
        }
        if let Some(pb) = pb {
            pb.inc(bytes.len() as u64);
        }
    }

    if written.is_err() {
        drop(file);
        if let Err(e) = fs::remove_file(partial_path) {
            log::debug!(
                "Could not remove partial download {}: {}",
                partial_path.display(),
                e
            );
        }
    }
    written
}

/// Unpack a downloaded `.argosmodel` archive into `install_dir`.
///
/// The archive is extracted into a `<name>.extracting` staging directory
/// first. A single top-level directory inside it becomes the installed
/// package, replacing an earlier install of the same name.
pub fn install_package(archive: &Path, install_dir: &Path) -> Result<PathBuf> {
    let name = archive
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| {
            SmartsumError::Other(format!("Bad language pack name: {}", archive.display()))
        })?;
    let staging = install_dir.join(format!("{name}.extracting"));
    let target = install_dir.join(name);

    if staging.exists() {
        log::debug!("Cleaning up previous extraction {}", staging.display());
        fs::remove_dir_all(&staging)?;
    }
    fs::create_dir_all(&staging)?;

    if let Err(e) = extract_zip(archive, &staging) {
        if let Err(cleanup) = fs::remove_dir_all(&staging) {
            log::debug!("Could not remove {}: {}", staging.display(), cleanup);
        }
        return Err(e);
    }

    let dirs: Vec<PathBuf> = fs::read_dir(&staging)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_ok_and(|ft| ft.is_dir()))
        .map(|entry| entry.path())
        .collect();

    if target.exists() {
        fs::remove_dir_all(&target)?;
    }
    match dirs.as_slice() {
        [single] => {
            fs::rename(single, &target)?;
            fs::remove_dir_all(&staging)?;
        }
        _ => fs::rename(&staging, &target)?,
    }

    if !target.join("metadata.json").exists() {
        log::warn!(
            "Language pack {} has no metadata.json, Argos may not load it",
            target.display()
        );
    }
    log::info!("Language pack installed to {}", target.display());
    Ok(target)
}

fn extract_zip(archive: &Path, dir: &Path) -> Result<()> {
    let file = fs::File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| {
        SmartsumError::Other(format!("Failed to open {}: {e}", archive.display()))
    })?;
    zip.extract(dir).map_err(|e| {
        SmartsumError::Other(format!("Failed to extract {}: {e}", archive.display()))
    })
}

/// Fetch every pair in `pairs` into `download_dir` and install it into
/// `install_dir`. Returns the installed package directories.
pub async fn fetch_language_packs(
    index_url: &str,
    pairs: &[(&str, &str)],
    download_dir: &Path,
    install_dir: &Path,
    progress: bool,
) -> Result<Vec<PathBuf>> {
    let index = fetch_index(index_url).await?;
    log::debug!("Package index lists {} packages", index.len());

    let mut installed = Vec::with_capacity(pairs.len());
    for package in select_packages(&index, pairs)? {
        let archive = download_package(package, download_dir, progress).await?;
        let install_dir = install_dir.to_path_buf();
        let path = tokio::task::spawn_blocking(move || install_package(&archive, &install_dir))
            .await
            .map_err(|e| SmartsumError::Other(format!("Install task failed: {e}")))??;
        installed.push(path);
    }
    Ok(installed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::LANGUAGE_PAIRS;

    fn package(from: &str, to: &str) -> ArgosPackage {
        ArgosPackage {
            from_code: from.to_string(),
            to_code: to.to_string(),
            from_name: None,
            to_name: None,
            package_version: Some("1.9".to_string()),
            links: vec![format!("https://example.invalid/{from}_{to}.argosmodel")],
        }
    }

    #[test]
    fn test_index_entry_parses() {
        let json = r#"[{
            "package_version": "1.9",
            "argos_version": "1.0",
            "from_code": "he",
            "from_name": "Hebrew",
            "to_code": "en",
            "to_name": "English",
            "links": ["https://argos-net.com/v1/translate-he_en-1_9.argosmodel"]
        }]"#;
        let index: Vec<ArgosPackage> = serde_json::from_str(json).unwrap();
        assert_eq!(index[0].from_code, "he");
        assert_eq!(index[0].from_name.as_deref(), Some("Hebrew"));
        assert_eq!(index[0].links.len(), 1);
        assert_eq!(index[0].filename(), "translate-he_en-1_9.argosmodel");
    }

    #[test]
    fn test_select_packages_keeps_pair_order() {
        let index = vec![
            package("en", "fa"),
            package("fa", "he"),
            package("he", "en"),
            package("fa", "en"),
        ];
        let selected = select_packages(&index, LANGUAGE_PAIRS).unwrap();
        let pairs: Vec<_> = selected.iter().map(|p| p.pair()).collect();
        assert_eq!(pairs, vec!["he -> en", "fa -> en", "en -> fa"]);
    }

    #[test]
    fn test_select_packages_reports_missing_pair() {
        let index = vec![package("he", "en")];
        let err = select_packages(&index, &[("he", "en"), ("fa", "en")]).unwrap_err();
        assert!(err.to_string().contains("fa -> en"));
    }

    #[tokio::test]
    async fn test_existing_package_is_not_downloaded_again() {
        let dir = tempfile::TempDir::new().unwrap();
        let pkg = package("he", "en");
        let existing = dir.path().join(pkg.filename());
        fs::write(&existing, b"model").unwrap();

        let path = download_package(&pkg, dir.path(), false).await.unwrap();
        assert_eq!(path, existing);
    }

    fn make_archive(path: &Path, top: &str) {
        use zip::write::SimpleFileOptions;

        let file = fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = SimpleFileOptions::default();
        zip.add_directory(format!("{top}/"), options).unwrap();
        zip.start_file(format!("{top}/metadata.json"), options).unwrap();
        zip.write_all(br#"{"from_code": "he", "to_code": "en"}"#).unwrap();
        zip.add_directory(format!("{top}/model/"), options).unwrap();
        zip.start_file(format!("{top}/model/model.bin"), options).unwrap();
        zip.write_all(b"weights").unwrap();
        zip.finish().unwrap();
    }

    #[test]
    fn test_archive_is_installed_into_packages_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let archive = dir.path().join("translate-he_en-1_9.argosmodel");
        make_archive(&archive, "translate-he_en-1_9");
        let packages = dir.path().join("packages");

        let installed = install_package(&archive, &packages).unwrap();

        assert_eq!(installed, packages.join("translate-he_en-1_9"));
        let metadata = fs::read_to_string(installed.join("metadata.json")).unwrap();
        assert!(metadata.contains("\"to_code\": \"en\""));
        assert_eq!(
            fs::read(installed.join("model/model.bin")).unwrap(),
            b"weights"
        );
        assert!(!packages.join("translate-he_en-1_9.extracting").exists());
    }

    #[test]
    fn test_reinstall_replaces_previous_package() {
        let dir = tempfile::TempDir::new().unwrap();
        let archive = dir.path().join("translate-he_en-1_9.argosmodel");
        make_archive(&archive, "translate-he_en-1_9");
        let packages = dir.path().join("packages");
        let stale = packages.join("translate-he_en-1_9");
        fs::create_dir_all(&stale).unwrap();
        fs::write(stale.join("stale.txt"), b"old").unwrap();

        let installed = install_package(&archive, &packages).unwrap();

        assert!(!installed.join("stale.txt").exists());
        assert!(installed.join("metadata.json").exists());
    }

    #[test]
    fn test_corrupt_archive_leaves_no_staging_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let archive = dir.path().join("translate-fa_en-1_9.argosmodel");
        fs::write(&archive, b"not a zip").unwrap();
        let packages = dir.path().join("packages");

        assert!(install_package(&archive, &packages).is_err());
        assert!(!packages.join("translate-fa_en-1_9.extracting").exists());
        assert!(!packages.join("translate-fa_en-1_9").exists());
    }

    #[tokio::test]
    async fn test_failed_stream_removes_partial_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let partial = dir.path().join("translate-he_en-1_9.part");
        let chunks: Vec<std::result::Result<Vec<u8>, String>> = vec![
            Ok(b"first chunk".to_vec()),
            Err("connection reset".to_string()),
        ];

        let result = save_stream(futures_util::stream::iter(chunks), &partial, None).await;

        let err = result.unwrap_err();
        assert!(err.to_string().contains("connection reset"));
        assert!(!partial.exists());
    }

    #[tokio::test]
    async fn test_complete_stream_is_written() {
        let dir = tempfile::TempDir::new().unwrap();
        let partial = dir.path().join("translate-he_en-1_9.part");
        let chunks: Vec<std::result::Result<Vec<u8>, String>> =
            vec![Ok(b"mo".to_vec()), Ok(b"del".to_vec())];

        save_stream(futures_util::stream::iter(chunks), &partial, None)
            .await
            .unwrap();

        assert_eq!(fs::read(&partial).unwrap(), b"model");
    }

    #[tokio::test]
    async fn test_package_without_link_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut pkg = package("he", "en");
        pkg.links.clear();
        assert!(download_package(&pkg, dir.path(), false).await.is_err());
    }
}
