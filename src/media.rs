use async_trait::async_trait;
use axum::body::Bytes;
use image::{DynamicImage, ImageFormat, imageops::FilterType};
use std::{
    io,
    path::{Component, Path, PathBuf},
    sync::Arc,
};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Largest accepted upload, in bytes (10 MiB).
pub const MAX_UPLOAD_SIZE: u64 = 10 * 1024 * 1024;

/// MIME types accepted after content sniffing.
pub const ALLOWED_MIME_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/gif", "image/webp"];

/// Number of leading bytes inspected when sniffing the content type.
const SNIFF_LEN: usize = 512;

/// SizeClass
///
/// A named thumbnail bounding box. Thumbnails are fitted inside the box with
/// their aspect ratio preserved; they are never cropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeClass {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
}

pub const THUMBNAIL_SIZES: [SizeClass; 3] = [
    SizeClass { label: "small", width: 150, height: 150 },
    SizeClass { label: "medium", width: 300, height: 300 },
    SizeClass { label: "large", width: 600, height: 600 },
];

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("file size {size} exceeds maximum allowed size of {max} bytes")]
    TooLarge { size: u64, max: u64 },
    #[error("file type {0} is not allowed")]
    UnsupportedType(String),
    #[error("path {0} is outside the upload directory")]
    OutsideRoot(String),
    #[error("media i/o failed: {0}")]
    Io(#[from] io::Error),
}

/// Upload
///
/// A file as received from the client. `file_name` is kept for the record only;
/// it never decides the stored name or the accepted type.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Bytes,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// ValidatedUpload
///
/// An upload that passed size and content-type checks. Storing requires one,
/// so nothing reaches the disk without being validated first.
#[derive(Debug, Clone)]
pub struct ValidatedUpload {
    upload: Upload,
    format: ImageFormat,
}

impl ValidatedUpload {
    pub fn file_name(&self) -> &str {
        &self.upload.file_name
    }

    pub fn size(&self) -> u64 {
        self.upload.size()
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.to_mime_type()
    }

    /// Extension of the sniffed format, used for every file written.
    pub fn extension(&self) -> &'static str {
        self.format.extensions_str().first().copied().unwrap_or("bin")
    }
}

/// MediaPolicy
///
/// The acceptance rules shared by every storage backend.
#[derive(Debug, Clone)]
pub struct MediaPolicy {
    pub max_size: u64,
    pub allowed_types: Vec<&'static str>,
    pub thumbnail_sizes: Vec<SizeClass>,
}

impl Default for MediaPolicy {
    fn default() -> Self {
        Self {
            max_size: MAX_UPLOAD_SIZE,
            allowed_types: ALLOWED_MIME_TYPES.to_vec(),
            thumbnail_sizes: THUMBNAIL_SIZES.to_vec(),
        }
    }
}

impl MediaPolicy {
    /// validate
    ///
    /// Rejects oversized files and any file whose leading bytes do not identify
    /// one of the allowed image types.
    pub fn validate(&self, upload: Upload) -> Result<ValidatedUpload, MediaError> {
        if upload.size() > self.max_size {
            return Err(MediaError::TooLarge {
                size: upload.size(),
                max: self.max_size,
            });
        }

        let head = &upload.bytes[..upload.bytes.len().min(SNIFF_LEN)];
        let format = match image::guess_format(head) {
            Ok(format) if self.allowed_types.contains(&format.to_mime_type()) => format,
            Ok(format) => return Err(MediaError::UnsupportedType(format.to_mime_type().into())),
            Err(_) => return Err(MediaError::UnsupportedType(sniff_fallback(head).into())),
        };

        Ok(ValidatedUpload { upload, format })
    }
}

/// Best-effort label for content that is not a recognised image.
fn sniff_fallback(head: &[u8]) -> &'static str {
    if !head.is_empty() && std::str::from_utf8(head).is_ok() {
        "text/plain"
    } else {
        "application/octet-stream"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub path: String,
    pub file_name: String,
    pub mime_type: String,
    pub extension: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailFile {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailFailure {
    pub label: String,
    pub reason: String,
}

/// The outcome of the thumbnail phase. Failures are reported, never raised.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DerivedAssets {
    pub dimensions: Option<(u32, u32)>,
    pub thumbnails: Vec<ThumbnailFile>,
    pub failures: Vec<ThumbnailFailure>,
}

/// StoredMedia
///
/// Two-phase upload result: the primary write succeeded (otherwise `store`
/// returns an error), and `derived` says how the thumbnail phase went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMedia {
    pub primary: StoredFile,
    pub derived: DerivedAssets,
}

impl StoredMedia {
    /// True when every configured thumbnail was produced.
    pub fn is_complete(&self) -> bool {
        self.derived.failures.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteReport {
    /// False when the primary file was already gone.
    pub primary_removed: bool,
    pub thumbnails_removed: usize,
    pub errors: Vec<String>,
}

/// MediaStorage
///
/// Contract of the media pipeline: validate, store with derived thumbnails,
/// delete with derived thumbnails, and map stored paths to public URLs.
#[async_trait]
pub trait MediaStorage: Send + Sync {
    fn policy(&self) -> &MediaPolicy;

    fn validate(&self, upload: Upload) -> Result<ValidatedUpload, MediaError> {
        self.policy().validate(upload)
    }

    async fn store(
        &self,
        upload: ValidatedUpload,
        owner_id: Uuid,
    ) -> Result<StoredMedia, MediaError>;

    /// Removes the primary file and every derived thumbnail. Files that are
    /// already absent count as removed.
    async fn delete(&self, primary_path: &str) -> Result<DeleteReport, MediaError>;

    fn public_url(&self, path: &str) -> String;
}

/// MediaState
///
/// The concrete type used to share the media pipeline across the application state.
pub type MediaState = Arc<dyn MediaStorage>;

/// LocalMediaStore
///
/// Filesystem backend. Files live under `<root>/<owner_id>/` with generated
/// names, and thumbnails sit next to their original as `<stem>_<label>.<ext>`.
#[derive(Debug, Clone)]
pub struct LocalMediaStore {
    root: PathBuf,
    base_url: String,
    policy: MediaPolicy,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self::with_policy(root, base_url, MediaPolicy::default())
    }

    pub fn with_policy(
        root: impl Into<PathBuf>,
        base_url: impl Into<String>,
        policy: MediaPolicy,
    ) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into(),
            policy,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn ensure_inside_root(&self, path: &Path) -> Result<(), MediaError> {
        let escapes = path
            .components()
            .any(|c| matches!(c, Component::ParentDir));
        if escapes || !path.starts_with(&self.root) {
            return Err(MediaError::OutsideRoot(path.display().to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl MediaStorage for LocalMediaStore {
    fn policy(&self) -> &MediaPolicy {
        &self.policy
    }

    async fn store(
        &self,
        upload: ValidatedUpload,
        owner_id: Uuid,
    ) -> Result<StoredMedia, MediaError> {
        let dir = self.root.join(owner_id.to_string());
        tokio::fs::create_dir_all(&dir).await?;

        let stem = Uuid::new_v4().simple().to_string();
        let extension = upload.extension();
        let path = dir.join(format!("{stem}.{extension}"));

        // create_new: a name clash fails loudly instead of overwriting another upload.
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        let written = async {
            file.write_all(&upload.upload.bytes).await?;
            file.sync_all().await
        }
        .await;
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(e.into());
        }

        let primary = StoredFile {
            path: path.to_string_lossy().into_owned(),
            file_name: upload.file_name().to_string(),
            mime_type: upload.mime_type().to_string(),
            extension: extension.to_string(),
            size: upload.size(),
        };
        tracing::debug!(owner = %owner_id, path = %primary.path, "primary file stored");

        let sizes = self.policy.thumbnail_sizes.clone();
        let bytes = upload.upload.bytes.clone();
        let format = upload.format;
        let derived = tokio::task::spawn_blocking(move || {
            render_thumbnails(&bytes, format, &dir, &stem, extension, &sizes)
        })
        .await
        .unwrap_or_else(|e| DerivedAssets {
            dimensions: None,
            thumbnails: vec![],
            failures: vec![ThumbnailFailure {
                label: "*".to_string(),
                reason: format!("thumbnail task failed: {e}"),
            }],
        });

        for failure in &derived.failures {
            tracing::warn!(
                path = %primary.path,
                size = %failure.label,
                reason = %failure.reason,
                "thumbnail generation failed"
            );
        }
        tracing::info!(
            owner = %owner_id,
            path = %primary.path,
            thumbnails = derived.thumbnails.len(),
            "upload complete"
        );

        Ok(StoredMedia { primary, derived })
    }

    async fn delete(&self, primary_path: &str) -> Result<DeleteReport, MediaError> {
        let primary = Path::new(primary_path);
        self.ensure_inside_root(primary)?;

        let mut report = DeleteReport::default();
        match tokio::fs::remove_file(primary).await {
            Ok(()) => report.primary_removed = true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %primary_path, "primary file already absent");
            }
            Err(e) => return Err(e.into()),
        }

        for class in &self.policy.thumbnail_sizes {
            let Some(thumb) = thumbnail_path(primary, class.label) else {
                continue;
            };
            match tokio::fs::remove_file(&thumb).await {
                Ok(()) => report.thumbnails_removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %thumb.display(), error = %e, "failed to delete thumbnail");
                    report
                        .errors
                        .push(format!("failed to delete thumbnail {}: {e}", thumb.display()));
                }
            }
        }

        Ok(report)
    }

    fn public_url(&self, path: &str) -> String {
        let path = Path::new(path);
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let relative = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(segment) => segment.to_str(),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/");
        format!("{}/media/{}", self.base_url.trim_end_matches('/'), relative)
    }
}

/// thumbnail_path
///
/// Derives the path of a thumbnail from its original: `a/b/<stem>.<ext>`
/// becomes `a/b/<stem>_<label>.<ext>`.
pub fn thumbnail_path(primary: &Path, label: &str) -> Option<PathBuf> {
    let stem = primary.file_stem()?.to_str()?;
    let name = match primary.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}_{label}.{ext}"),
        None => format!("{stem}_{label}"),
    };
    Some(primary.with_file_name(name))
}

/// Scales `image` to fit inside `width`×`height`. Images already inside the
/// box are left at their size.
pub fn fit_within(image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    if image.width() <= width && image.height() <= height {
        image.clone()
    } else {
        image.resize(width, height, FilterType::Lanczos3)
    }
}

fn render_thumbnails(
    bytes: &[u8],
    format: ImageFormat,
    dir: &Path,
    stem: &str,
    extension: &str,
    sizes: &[SizeClass],
) -> DerivedAssets {
    let mut derived = DerivedAssets::default();

    let source = match image::load_from_memory_with_format(bytes, format) {
        Ok(image) => image,
        Err(e) => {
            derived.failures = sizes
                .iter()
                .map(|class| ThumbnailFailure {
                    label: class.label.to_string(),
                    reason: format!("decode failed: {e}"),
                })
                .collect();
            return derived;
        }
    };
    derived.dimensions = Some((source.width(), source.height()));

    for class in sizes {
        let thumb = fit_within(&source, class.width, class.height);
        let path = dir.join(format!("{stem}_{}.{extension}", class.label));
        match thumb.save_with_format(&path, format) {
            Ok(()) => derived.thumbnails.push(ThumbnailFile {
                label: class.label.to_string(),
                width: thumb.width(),
                height: thumb.height(),
                path: path.to_string_lossy().into_owned(),
            }),
            Err(e) => {
                let _ = std::fs::remove_file(&path);
                derived.failures.push(ThumbnailFailure {
                    label: class.label.to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }

    derived
}

/// MockMediaStore
///
/// In-memory stand-in used by handler tests. Nothing touches the disk; with
/// `should_fail` every delete reports an I/O error.
#[derive(Debug, Clone, Default)]
pub struct MockMediaStore {
    pub should_fail: bool,
    policy: MediaPolicy,
}

impl MockMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl MediaStorage for MockMediaStore {
    fn policy(&self) -> &MediaPolicy {
        &self.policy
    }

    async fn store(
        &self,
        upload: ValidatedUpload,
        owner_id: Uuid,
    ) -> Result<StoredMedia, MediaError> {
        let path = format!(
            "mock/{owner_id}/{}.{}",
            Uuid::new_v4().simple(),
            upload.extension()
        );
        Ok(StoredMedia {
            primary: StoredFile {
                path,
                file_name: upload.file_name().to_string(),
                mime_type: upload.mime_type().to_string(),
                extension: upload.extension().to_string(),
                size: upload.size(),
            },
            derived: DerivedAssets::default(),
        })
    }

    async fn delete(&self, primary_path: &str) -> Result<DeleteReport, MediaError> {
        if self.should_fail {
            return Err(MediaError::Io(io::Error::other(format!(
                "mock delete failure for {primary_path}"
            ))));
        }
        Ok(DeleteReport {
            primary_removed: true,
            ..DeleteReport::default()
        })
    }

    fn public_url(&self, path: &str) -> String {
        format!("http://localhost/media/{path}")
    }
}
