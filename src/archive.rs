//! Packing solver input for upload and unpacking downloaded results.
//!
//! Only files whose extension is in [`INPUT_EXTENSIONS`] are uploaded; mesh
//! and result artifacts that accumulate in a working directory stay local.

use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::cluster::ClientError;
use crate::error::Result;

/// Extensions (lowercase, without dot) that describe the model.
pub const INPUT_EXTENSIONS: &[&str] = &["brep", "step", "geo", "json"];

/// File name used when the server does not name the result archive.
pub const DEFAULT_RESULT_NAME: &str = "job_result.zip";

/// An upload-ready zip held in memory.
#[derive(Debug, Clone)]
pub struct JobArchive {
    file_name: String,
    bytes: Vec<u8>,
    entries: Vec<String>,
    skipped: Vec<PathBuf>,
}

impl JobArchive {
    pub fn new(file_name: String, bytes: Vec<u8>, entries: Vec<String>) -> Self {
        Self {
            file_name,
            bytes,
            entries,
            skipped: Vec::new(),
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Archive entry names, in insertion order.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Files left out because an entry with the same name was already added.
    pub fn skipped(&self) -> &[PathBuf] {
        &self.skipped
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn is_input_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| INPUT_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Recursively lists the whitelisted files under `dir`, sorted by path.
pub fn collect_inputs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = entry?;
        if entry.file_type().is_file() && is_input_file(entry.path()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Zips `files` (deflate) into memory as `<name>.zip`, storing entries flat
/// by file name.
pub fn build_archive(name: &str, files: &[PathBuf]) -> Result<JobArchive> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut seen = HashSet::new();
    let mut entries = Vec::new();
    let mut skipped = Vec::new();

    for file in files {
        let Some(entry) = file.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if !seen.insert(entry.clone()) {
            tracing::warn!("Skipping {}: an entry named {entry} is already archived", file.display());
            skipped.push(file.clone());
            continue;
        }
        let data = std::fs::read(file)?;
        writer.start_file(entry.as_str(), options)?;
        writer.write_all(&data)?;
        entries.push(entry);
    }

    let bytes = writer.finish()?.into_inner();
    tracing::debug!(entries = entries.len(), bytes = bytes.len(), "job archive built");

    Ok(JobArchive {
        file_name: format!("{name}.zip"),
        bytes,
        entries,
        skipped,
    })
}

/// Picks a local name for a downloaded result archive.
///
/// The server's name is used as is unless it, or the directory it would
/// unpack into, already exists. Then `<stem>_<n><ext>` is used, with `n`
/// starting at the number of directory entries whose stem contains `stem`.
pub fn result_file_name(dir: &Path, suggested: Option<&str>) -> Result<String> {
    let base = suggested
        .and_then(|s| Path::new(s).file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| DEFAULT_RESULT_NAME.to_string());

    let base_path = Path::new(&base);
    let stem = base_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| base.clone());
    let ext = base_path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let taken = |file: &str, folder: &str| dir.join(file).exists() || dir.join(folder).exists();
    if !taken(&base, &stem) {
        return Ok(base);
    }

    let mut n = 0usize;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = PathBuf::from(entry.file_name());
        if name
            .file_stem()
            .map(|s| s.to_string_lossy().contains(stem.as_str()))
            .unwrap_or(false)
        {
            n += 1;
        }
    }

    loop {
        let folder = format!("{stem}_{n}");
        let candidate = format!("{folder}{ext}");
        if !taken(&candidate, &folder) {
            return Ok(candidate);
        }
        n += 1;
    }
}

/// Streams a response body to `path`, chunk by chunk. Returns bytes written.
///
/// A body that breaks off part way leaves no file behind, so a retry gets
/// the same name.
pub async fn save_response(response: reqwest::Response, path: &Path) -> Result<u64> {
    match write_body(response, path).await {
        Ok(written) => Ok(written),
        Err(e) => {
            match tokio::fs::remove_file(path).await {
                Ok(()) => tracing::debug!("removed partial download {}", path.display()),
                Err(rm) if rm.kind() == std::io::ErrorKind::NotFound => {}
                Err(rm) => tracing::warn!("could not remove {}: {rm}", path.display()),
            }
            Err(e)
        }
    }
}

async fn write_body(mut response: reqwest::Response, path: &Path) -> Result<u64> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut written = 0u64;
    while let Some(chunk) = response.chunk().await.map_err(ClientError::from)? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

/// Unpacks a zip into `dest`, creating it. Returns the number of entries.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<usize> {
    let file = std::fs::File::open(archive)?;
    let mut zip = ZipArchive::new(file)?;
    std::fs::create_dir_all(dest)?;
    zip.extract(dest)?;
    Ok(zip.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn touch(dir: &Path, rel: &str, content: &str) -> PathBuf {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn whitelist_is_case_insensitive() {
        assert!(is_input_file(Path::new("model.STEP")));
        assert!(is_input_file(Path::new("a/b/model.json")));
        assert!(!is_input_file(Path::new("mesh.msh")));
        assert!(!is_input_file(Path::new("results.vtu")));
        assert!(!is_input_file(Path::new("Makefile")));
    }

    #[test]
    fn collect_walks_recursively_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "part.brep", "b");
        touch(dir.path(), "sub/part.geo", "g");
        touch(dir.path(), "mesh.msh", "big");
        touch(dir.path(), "sub/deep/out.vtu", "big");

        let files = collect_inputs(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["part.brep", "part.geo"]);
    }

    #[test]
    fn archive_contains_exactly_the_selected_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = touch(dir.path(), "bracket.json", r#"{"k": 1}"#);

        let archive = build_archive("bracket", &[file]).unwrap();
        assert_eq!(archive.file_name(), "bracket.zip");
        assert_eq!(archive.entries(), ["bracket.json"]);

        let mut zip = ZipArchive::new(Cursor::new(archive.bytes().to_vec())).unwrap();
        assert_eq!(zip.len(), 1);
        let mut content = String::new();
        zip.by_name("bracket.json")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, r#"{"k": 1}"#);
    }

    #[test]
    fn duplicate_names_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let a = touch(dir.path(), "a/model.json", "1");
        let b = touch(dir.path(), "b/model.json", "2");

        let archive = build_archive("doc", &[a, b.clone()]).unwrap();
        assert_eq!(archive.entries(), ["model.json"]);
        assert_eq!(archive.skipped(), [b]);
    }

    #[test]
    fn empty_file_list_gives_empty_archive() {
        let archive = build_archive("doc", &[]).unwrap();
        assert!(archive.is_empty());
    }

    #[test]
    fn result_name_kept_when_free() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(result_file_name(dir.path(), Some("run.zip")).unwrap(), "run.zip");
        assert_eq!(result_file_name(dir.path(), None).unwrap(), DEFAULT_RESULT_NAME);
    }

    #[test]
    fn result_name_strips_path_components() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            result_file_name(dir.path(), Some("../../etc/run.zip")).unwrap(),
            "run.zip"
        );
    }

    #[test]
    fn result_name_disambiguates_with_counter() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "run.zip", "old");
        assert_eq!(result_file_name(dir.path(), Some("run.zip")).unwrap(), "run_1.zip");

        std::fs::create_dir(dir.path().join("run_1")).unwrap();
        assert_eq!(result_file_name(dir.path(), Some("run.zip")).unwrap(), "run_2.zip");
    }

    #[test]
    fn result_name_counts_previous_extraction_folder() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("run")).unwrap();
        assert_eq!(result_file_name(dir.path(), Some("run.zip")).unwrap(), "run_1.zip");
    }

    #[tokio::test]
    async fn truncated_body_leaves_no_partial_file() {
        use tokio::io::AsyncReadExt;

        // Promises more bytes than it sends, then hangs up.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 1000\r\n\r\npartial")
                .await
                .unwrap();
        });

        let response = reqwest::get(format!("http://{addr}/download/")).await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.zip");

        assert!(save_response(response, &path).await.is_err());
        assert!(!path.exists());
        assert_eq!(result_file_name(dir.path(), Some("run.zip")).unwrap(), "run.zip");
    }

    #[test]
    fn extract_unpacks_into_destination() {
        let dir = tempfile::tempdir().unwrap();
        let src = touch(dir.path(), "src/result.txt", "displacement");
        let archive = build_archive("res", &[src]).unwrap();
        let zip_path = dir.path().join("res.zip");
        std::fs::write(&zip_path, archive.bytes()).unwrap();

        let dest = dir.path().join("res");
        assert_eq!(extract_archive(&zip_path, &dest).unwrap(), 1);
        assert_eq!(
            std::fs::read_to_string(dest.join("result.txt")).unwrap(),
            "displacement"
        );
    }
}
