//! Uploaded and generated files.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::UNIX_EPOCH;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::Result;

/// MIME types accepted for upload, by exact type or `type/` prefix.
const ALLOWED_MIME: [&str; 10] = [
    "text/",
    "image/",
    "audio/",
    "application/pdf",
    "application/json",
    "application/msword",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.",
    "application/rtf",
    "application/xml",
];

const MAX_DEPTH: usize = 8;

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\-.]").expect("valid filename regex"))
}

/// Reduce an uploaded file name to a safe base name.
pub fn sanitize_filename(name: &str) -> String {
    sanitize_filename_or(name, "upload")
}

/// Like [`sanitize_filename`], with `fallback` when nothing usable is left.
pub fn sanitize_filename_or(name: &str, fallback: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let clean = unsafe_chars().replace_all(base, "_");
    let clean = clean.trim_start_matches('.');
    if clean.is_empty() {
        fallback.to_string()
    } else {
        clean.to_string()
    }
}

/// Whether a file with this name may be uploaded, judged by its extension.
pub fn is_allowed_upload(name: &str) -> bool {
    match mime_guess::from_path(name).first() {
        Some(mime) => {
            let essence = mime.essence_str();
            ALLOWED_MIME.iter().any(|allowed| {
                if allowed.ends_with('/') || allowed.ends_with('.') {
                    essence.starts_with(allowed)
                } else {
                    essence == *allowed
                }
            })
        }
        None => false,
    }
}

/// A file stored from an upload.
#[derive(Debug, Clone, Serialize)]
pub struct SavedUpload {
    pub filename: String,
    pub path: String,
    pub size: u64,
}

/// Validate and store one upload under `dir`.
pub async fn save_upload(dir: &Path, name: &str, bytes: &[u8]) -> Result<SavedUpload> {
    if !is_allowed_upload(name) {
        return Err(Error::Upload(format!("File type not allowed: {}", name)));
    }

    let filename = sanitize_filename(name);
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(&filename);
    tokio::fs::write(&path, bytes).await?;
    info!("Saved upload {} ({} bytes)", path.display(), bytes.len());

    Ok(SavedUpload {
        filename,
        path: path.display().to_string(),
        size: bytes.len() as u64,
    })
}

/// Human-readable file size.
pub fn human_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// Icon shown next to a file, by lowercase extension (with the dot).
pub fn file_icon(extension: &str) -> &'static str {
    match extension {
        ".xlsx" => "📊",
        ".jpg" | ".jpeg" | ".png" | ".gif" | ".bmp" => "🖼️",
        ".pdf" => "📄",
        ".doc" | ".docx" => "📝",
        ".txt" | ".md" => "📃",
        ".csv" => "📋",
        ".py" => "🐍",
        _ => "📁",
    }
}

/// A file listed in the UI's files panel.
#[derive(Debug, Clone, Serialize)]
pub struct FileEntry {
    pub path: String,
    pub name: String,
    pub size: String,
    pub modified: String,
    pub modified_timestamp: f64,
    pub icon: &'static str,
    pub extension: String,
}

impl FileEntry {
    fn from_path(path: &Path) -> Option<Self> {
        let meta = std::fs::metadata(path).ok()?;
        let modified = meta.modified().ok()?;
        let name = path.file_name()?.to_string_lossy().into_owned();
        let extension = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .unwrap_or_default();

        Some(Self {
            path: path.display().to_string(),
            name,
            size: human_size(meta.len()),
            modified: chrono::DateTime::<chrono::Local>::from(modified)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            modified_timestamp: modified
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0),
            icon: file_icon(&extension),
            extension,
        })
    }
}

/// Every non-hidden file under `dirs`, de-duplicated, newest first.
pub fn list_files(dirs: &[PathBuf]) -> Vec<FileEntry> {
    let mut entries: Vec<FileEntry> = Vec::new();

    for dir in dirs {
        let mut found = Vec::new();
        if let Err(e) = collect_files(dir, &mut found, 0) {
            warn!("Failed to list {}: {}", dir.display(), e);
        }
        for path in found {
            if entries.iter().any(|e| Path::new(&e.path) == path.as_path()) {
                continue;
            }
            if let Some(entry) = FileEntry::from_path(&path) {
                entries.push(entry);
            }
        }
    }

    entries.sort_by(|a, b| b.modified_timestamp.total_cmp(&a.modified_timestamp));
    entries
}

fn collect_files(dir: &Path, results: &mut Vec<PathBuf>, depth: usize) -> std::io::Result<()> {
    if depth > MAX_DEPTH || !dir.is_dir() {
        return Ok(());
    }

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .map_or(true, |n| n.starts_with('.'));
        if hidden {
            continue;
        }

        if path.is_dir() {
            collect_files(&path, results, depth + 1)?;
        } else if path.is_file() {
            results.push(path);
        }
    }

    Ok(())
}

/// Delete the files directly inside each directory. Returns what was removed.
pub fn clear_dirs(dirs: &[PathBuf]) -> Vec<PathBuf> {
    let mut cleared = Vec::new();

    for dir in dirs.iter().filter(|d| d.is_dir()) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            continue;
        };
        for path in entries.flatten().map(|e| e.path()).filter(|p| p.is_file()) {
            match std::fs::remove_file(&path) {
                Ok(()) => cleared.push(path),
                Err(e) => warn!("Error removing {}: {}", path.display(), e),
            }
        }
    }

    info!("Cleared {} files from output directories", cleared.len());
    cleared
}

/// Resolve a requested download to a file inside one of `dirs`.
pub fn resolve_download(dirs: &[PathBuf], requested: &str) -> Result<PathBuf> {
    let not_found = || Error::NotFound(format!("File not found: {}", requested));

    let path = Path::new(requested).canonicalize().map_err(|_| not_found())?;
    if !path.is_file() {
        return Err(not_found());
    }

    let allowed = dirs
        .iter()
        .filter_map(|dir| dir.canonicalize().ok())
        .any(|dir| path.starts_with(dir));
    if !allowed {
        debug!("Rejected download outside file dirs: {}", requested);
        return Err(not_found());
    }

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("report 2024 (final).pdf"), "report_2024__final_.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\notes.txt"), "notes.txt");
        assert_eq!(sanitize_filename("..."), "upload");
        assert_eq!(sanitize_filename("données.csv"), "données.csv");
    }

    #[test]
    fn test_allowed_uploads() {
        assert!(is_allowed_upload("notes.txt"));
        assert!(is_allowed_upload("data.csv"));
        assert!(is_allowed_upload("paper.pdf"));
        assert!(is_allowed_upload("sheet.xlsx"));
        assert!(is_allowed_upload("photo.JPG"));
        assert!(!is_allowed_upload("setup.exe"));
        assert!(!is_allowed_upload("no_extension"));
    }

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(2048), "2.0 KB");
        assert_eq!(human_size(5 * 1024 * 1024 + 100), "5.0 MB");
    }

    #[test]
    fn test_file_icon() {
        assert_eq!(file_icon(".xlsx"), "📊");
        assert_eq!(file_icon(".csv"), "📋");
        assert_eq!(file_icon(".bin"), "📁");
    }

    #[tokio::test]
    async fn test_save_upload() {
        let tmp = TempDir::new().unwrap();
        let saved = save_upload(tmp.path(), "my notes.txt", b"hello").await.unwrap();
        assert_eq!(saved.filename, "my_notes.txt");
        assert_eq!(saved.size, 5);
        assert_eq!(std::fs::read_to_string(tmp.path().join("my_notes.txt")).unwrap(), "hello");

        let err = save_upload(tmp.path(), "virus.exe", b"MZ").await.unwrap_err();
        assert!(matches!(err, Error::Upload(_)));
    }

    #[test]
    fn test_list_files() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("output");
        std::fs::create_dir_all(out.join("nested")).unwrap();
        std::fs::write(out.join("a.csv"), "a").unwrap();
        std::fs::write(out.join("nested").join("b.txt"), "bb").unwrap();
        std::fs::write(out.join(".hidden"), "x").unwrap();

        // the parent dir also contains output/, entries must not repeat
        let files = list_files(&[out.clone(), tmp.path().to_path_buf(), tmp.path().join("missing")]);
        let mut names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["a.csv", "b.txt"]);

        let csv = files.iter().find(|f| f.name == "a.csv").unwrap();
        assert_eq!(csv.icon, "📋");
        assert_eq!(csv.extension, ".csv");
        assert_eq!(csv.size, "1 B");
        assert!(files.windows(2).all(|w| w[0].modified_timestamp >= w[1].modified_timestamp));
    }

    #[test]
    fn test_clear_dirs() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("keep")).unwrap();
        std::fs::write(tmp.path().join("t_1.csv"), "x").unwrap();

        let cleared = clear_dirs(&[tmp.path().to_path_buf(), tmp.path().join("missing")]);
        assert_eq!(cleared.len(), 1);
        assert!(!tmp.path().join("t_1.csv").exists());
        assert!(tmp.path().join("keep").is_dir());
    }

    #[test]
    fn test_resolve_download() {
        let tmp = TempDir::new().unwrap();
        let allowed = tmp.path().join("output");
        std::fs::create_dir_all(&allowed).unwrap();
        let file = allowed.join("t_1.csv");
        std::fs::write(&file, "x").unwrap();
        let outside = tmp.path().join("secret.txt");
        std::fs::write(&outside, "x").unwrap();

        let dirs = vec![allowed.clone()];
        let resolved = resolve_download(&dirs, file.to_str().unwrap()).unwrap();
        assert_eq!(resolved, file.canonicalize().unwrap());

        let sneaky = allowed.join("..").join("secret.txt");
        assert!(matches!(resolve_download(&dirs, sneaky.to_str().unwrap()), Err(Error::NotFound(_))));
        assert!(resolve_download(&dirs, outside.to_str().unwrap()).is_err());
        assert!(resolve_download(&dirs, allowed.join("nope.csv").to_str().unwrap()).is_err());
    }
}
