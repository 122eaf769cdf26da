// Library layout on disk
//
// <output>/<library>/markdown/<url path>.md
// <output>/<library>/media/<url path>

use crate::config::Settings;
use crate::error::{StorageError, StorageResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{error, info};
use url::Url;

const SANITIZE_PATTERN: &str = r#"[<>:"/\\|?*\x00-\x1F]"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Markdown,
    Image,
    Video,
    Audio,
    Other,
}

impl FileKind {
    /// Classify a media file by its extension.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "md" => FileKind::Markdown,
            "jpg" | "jpeg" | "png" | "gif" | "bmp" | "svg" | "webp" => FileKind::Image,
            "mp4" | "avi" | "mov" | "wmv" | "flv" | "webm" => FileKind::Video,
            "mp3" | "wav" | "ogg" | "flac" | "aac" => FileKind::Audio,
            _ => FileKind::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub path: PathBuf,
    pub filename: String,
    pub size: u64,
    pub kind: FileKind,
    pub url: String,
}

pub struct Storage {
    library_dir: PathBuf,
    markdown_dir: PathBuf,
    media_dir: PathBuf,
    include_media: bool,
    overwrite: bool,
    sanitizer: Regex,
}

impl Storage {
    /// Create the library directories under `output`. The media directory is
    /// only created when media is included.
    pub fn new(
        output: &Path,
        library: &str,
        include_media: bool,
        overwrite: bool,
    ) -> StorageResult<Self> {
        let sanitizer = Regex::new(SANITIZE_PATTERN)?;
        let library_dir = output.join(sanitizer.replace_all(library, "_").as_ref());
        let markdown_dir = library_dir.join("markdown");
        let media_dir = library_dir.join("media");

        ensure_dir(output)?;
        ensure_dir(&library_dir)?;
        ensure_dir(&markdown_dir)?;
        if include_media {
            ensure_dir(&media_dir)?;
        }

        Ok(Self {
            library_dir,
            markdown_dir,
            media_dir,
            include_media,
            overwrite,
            sanitizer,
        })
    }

    pub fn from_settings(settings: &Settings) -> StorageResult<Self> {
        Self::new(
            &settings.output_dir(),
            &settings.library,
            settings.include_media,
            settings.overwrite_files,
        )
    }

    pub fn library_dir(&self) -> &Path {
        &self.library_dir
    }

    pub fn markdown_dir(&self) -> &Path {
        &self.markdown_dir
    }

    pub fn media_dir(&self) -> &Path {
        &self.media_dir
    }

    pub fn include_media(&self) -> bool {
        self.include_media
    }

    /// Replace characters that are unsafe in file names with `_`.
    pub fn sanitize(&self, name: &str) -> String {
        self.sanitizer.replace_all(name, "_").into_owned()
    }

    /// Where the markdown for `page_url` goes. The root path maps to
    /// `index.md`; everything else mirrors the URL path with `.md` appended.
    pub fn markdown_path(&self, page_url: &str) -> PathBuf {
        let parsed = match Url::parse(page_url) {
            Ok(url) => url,
            Err(e) => {
                error!(url = %page_url, error = %e, "Failed to parse page URL");
                return self.markdown_dir.join("index.md");
            }
        };

        let segments = self.path_segments(parsed.path());
        let Some((last, parents)) = segments.split_last() else {
            return self.markdown_dir.join("index.md");
        };

        let mut path = self.markdown_dir.clone();
        path.extend(parents);
        if last.ends_with(".md") {
            path.push(last);
        } else {
            path.push(format!("{}.md", last));
        }
        path
    }

    /// Where a media file goes: the sanitised URL path, or `filename` when the
    /// URL has no usable path.
    pub fn media_path(&self, media_url: &str, filename: &str) -> PathBuf {
        let segments = match Url::parse(media_url) {
            Ok(url) => self.path_segments(url.path()),
            Err(e) => {
                error!(url = %media_url, error = %e, "Failed to parse media URL");
                Vec::new()
            }
        };

        if segments.is_empty() {
            return self.media_dir.join(self.sanitize(filename));
        }
        let mut path = self.media_dir.clone();
        path.extend(segments);
        path
    }

    pub fn save_markdown(&self, content: &str, page_url: &str) -> StorageResult<FileInfo> {
        let path = self.markdown_path(page_url);
        self.check_overwrite(&path)?;
        if let Some(dir) = path.parent() {
            ensure_dir(dir)?;
        }

        info!(path = %path.display(), "Saving markdown content");
        fs::write(&path, content).map_err(|source| StorageError::Write {
            path: path.clone(),
            source,
        })?;

        Ok(FileInfo {
            filename: file_name(&path),
            size: content.len() as u64,
            kind: FileKind::Markdown,
            url: page_url.to_string(),
            path,
        })
    }

    /// Copy `reader` into the media directory. Returns `None` when media is
    /// not being archived.
    pub fn save_media_file<R: Read>(
        &self,
        reader: &mut R,
        media_url: &str,
        filename: &str,
    ) -> StorageResult<Option<FileInfo>> {
        if !self.include_media {
            return Ok(None);
        }

        let path = self.media_path(media_url, filename);
        self.check_overwrite(&path)?;
        if let Some(dir) = path.parent() {
            ensure_dir(dir)?;
        }

        info!(path = %path.display(), "Saving media file");
        let write_err = |source| StorageError::Write {
            path: path.clone(),
            source,
        };
        let mut file = File::create(&path).map_err(write_err)?;
        let size = io::copy(reader, &mut file).map_err(write_err)?;
        file.flush().map_err(write_err)?;

        Ok(Some(FileInfo {
            filename: file_name(&path),
            size,
            kind: FileKind::from_path(&path),
            url: media_url.to_string(),
            path,
        }))
    }

    fn check_overwrite(&self, path: &Path) -> StorageResult<()> {
        if !self.overwrite && path.exists() {
            return Err(StorageError::AlreadyExists {
                path: path.to_path_buf(),
            });
        }
        Ok(())
    }

    /// Non-empty path segments, sanitised. `.` and `..` are dropped so a URL
    /// cannot climb out of the library.
    fn path_segments(&self, url_path: &str) -> Vec<String> {
        url_path
            .split('/')
            .filter(|s| !s.is_empty() && *s != "." && *s != "..")
            .map(|s| self.sanitize(s))
            .collect()
    }
}

fn ensure_dir(path: &Path) -> StorageResult<()> {
    if !path.exists() {
        info!(path = %path.display(), "Creating directory");
        fs::create_dir_all(path).map_err(|source| StorageError::CreateDir {
            path: path.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn storage(include_media: bool, overwrite: bool) -> (TempDir, Storage) {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path(), "My:Docs", include_media, overwrite).unwrap();
        (dir, storage)
    }

    #[test]
    fn test_library_name_is_sanitised() {
        let (dir, storage) = storage(true, false);
        assert_eq!(storage.library_dir(), dir.path().join("My_Docs"));
        assert!(storage.markdown_dir().is_dir());
        assert!(storage.media_dir().is_dir());
    }

    #[test]
    fn test_media_dir_skipped_without_media() {
        let (_dir, storage) = storage(false, false);
        assert!(!storage.media_dir().exists());
    }

    #[test]
    fn test_markdown_paths() {
        let (_dir, storage) = storage(true, false);
        let md = storage.markdown_dir();
        assert_eq!(storage.markdown_path("https://site.test/"), md.join("index.md"));
        assert_eq!(storage.markdown_path("https://site.test"), md.join("index.md"));
        assert_eq!(
            storage.markdown_path("https://site.test/docs/intro"),
            md.join("docs").join("intro.md")
        );
        assert_eq!(
            storage.markdown_path("https://site.test/docs/"),
            md.join("docs.md")
        );
        assert_eq!(
            storage.markdown_path("https://site.test/notes.md"),
            md.join("notes.md")
        );
        assert_eq!(storage.markdown_path("::nope::"), md.join("index.md"));
    }

    #[test]
    fn test_markdown_path_cannot_escape_library() {
        let (_dir, storage) = storage(true, false);
        let path = storage.markdown_path("https://site.test/a/%2e%2e/b");
        assert!(path.starts_with(storage.markdown_dir()));
    }

    #[test]
    fn test_media_paths() {
        let (_dir, storage) = storage(true, false);
        let media = storage.media_dir();
        assert_eq!(
            storage.media_path("https://site.test/img/logo.png", "logo.png"),
            media.join("img").join("logo.png")
        );
        assert_eq!(
            storage.media_path("https://site.test/", "a|b.png"),
            media.join("a_b.png")
        );
    }

    #[test]
    fn test_save_markdown_refuses_overwrite() {
        let (_dir, storage) = storage(true, false);
        let info = storage
            .save_markdown("# Intro", "https://site.test/docs/intro")
            .unwrap();
        assert_eq!(info.filename, "intro.md");
        assert_eq!(info.size, 7);
        assert_eq!(info.kind, FileKind::Markdown);
        assert_eq!(fs::read_to_string(&info.path).unwrap(), "# Intro");

        let err = storage
            .save_markdown("# Again", "https://site.test/docs/intro")
            .unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists { .. }));
    }

    #[test]
    fn test_save_markdown_overwrites_when_allowed() {
        let (_dir, storage) = storage(true, true);
        storage.save_markdown("one", "https://site.test/").unwrap();
        let info = storage.save_markdown("two", "https://site.test/").unwrap();
        assert_eq!(fs::read_to_string(info.path).unwrap(), "two");
    }

    #[test]
    fn test_save_media_file() {
        let (_dir, storage) = storage(true, false);
        let mut data: &[u8] = b"\x89PNG....";
        let info = storage
            .save_media_file(&mut data, "https://site.test/img/logo.png", "logo.png")
            .unwrap()
            .unwrap();
        assert_eq!(info.kind, FileKind::Image);
        assert_eq!(info.size, 8);
        assert!(info.path.ends_with("img/logo.png"));
    }

    #[test]
    fn test_save_media_file_disabled() {
        let (_dir, storage) = storage(false, false);
        let mut data: &[u8] = b"abc";
        let saved = storage
            .save_media_file(&mut data, "https://site.test/a.png", "a.png")
            .unwrap();
        assert!(saved.is_none());
    }

    #[test]
    fn test_file_kind_from_extension() {
        assert_eq!(FileKind::from_path(Path::new("a.JPG")), FileKind::Image);
        assert_eq!(FileKind::from_path(Path::new("a.webm")), FileKind::Video);
        assert_eq!(FileKind::from_path(Path::new("a.flac")), FileKind::Audio);
        assert_eq!(FileKind::from_path(Path::new("a.pdf")), FileKind::Other);
        assert_eq!(FileKind::from_path(Path::new("noext")), FileKind::Other);
    }
}
