//! Filesystem storage for book attachments (PDFs and cover images).

use std::error::Error as StdError;
use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use futures::{StreamExt, pin_mut, stream};
use slug::slugify;
use thiserror::Error;
use tokio::fs;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};
use uuid::Uuid;

const COVER_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

/// What a stored file is attached as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Pdf,
    Cover,
}

impl AttachmentKind {
    /// Multipart field name carrying this attachment.
    pub fn field_name(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Cover => "coverImage",
        }
    }

    pub fn from_field(name: &str) -> Option<Self> {
        match name {
            "pdf" => Some(Self::Pdf),
            "coverImage" => Some(Self::Cover),
            _ => None,
        }
    }

    /// Accept a file when either its declared content type or its extension fits.
    pub fn accepts(self, file_name: &str, content_type: Option<&str>) -> bool {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|value| value.to_str())
            .map(str::to_ascii_lowercase);
        let content_type = content_type.map(str::to_ascii_lowercase);

        match self {
            Self::Pdf => {
                content_type.as_deref() == Some("application/pdf")
                    || extension.as_deref() == Some("pdf")
            }
            Self::Cover => {
                content_type
                    .as_deref()
                    .is_some_and(|value| value.starts_with("image/"))
                    || extension
                        .as_deref()
                        .is_some_and(|ext| COVER_EXTENSIONS.contains(&ext))
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum UploadStorageError {
    #[error("invalid stored path")]
    InvalidPath,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("uploaded file exceeds configured body limit")]
    PayloadTooLarge {
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
    #[error("uploaded file stream failed")]
    PayloadStream {
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
    #[error("uploaded file is empty")]
    EmptyPayload,
    #[error("uploaded file size exceeds supported range")]
    SizeOverflow,
}

#[derive(Debug, Clone)]
pub struct StoredUpload {
    /// Name relative to the storage root; also the public `/uploads/` path.
    pub stored_path: String,
}

/// Flat directory of attachments served under `/uploads`.
#[derive(Debug)]
pub struct UploadStorage {
    root: PathBuf,
}

impl UploadStorage {
    /// Use `root`, creating it if necessary.
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stream a payload to disk under a fresh unique name.
    ///
    /// The partially written file is removed on any failure or when the payload turns out empty.
    pub async fn store_stream<S>(
        &self,
        original_name: &str,
        stream: S,
    ) -> Result<StoredUpload, UploadStorageError>
    where
        S: futures::Stream<Item = Result<Bytes, UploadStorageError>>,
    {
        let stored_path = build_stored_name(original_name);
        let absolute = self.resolve(&stored_path)?;

        let mut file = fs::File::create(&absolute).await?;
        let written = write_chunks(&mut file, stream).await;
        drop(file);

        let total_bytes = match written {
            Ok(0) => Err(UploadStorageError::EmptyPayload),
            other => other,
        };
        let total_bytes = match total_bytes {
            Ok(total_bytes) => total_bytes,
            Err(err) => {
                if let Err(remove_err) = fs::remove_file(&absolute).await {
                    warn!(stored_path = %stored_path, error = %remove_err, "failed to remove partial upload");
                }
                return Err(err);
            }
        };

        debug!(stored_path = %stored_path, size_bytes = total_bytes, "stored upload");
        Ok(StoredUpload { stored_path })
    }

    /// Store a fully buffered payload.
    pub async fn store(
        &self,
        original_name: &str,
        data: Bytes,
    ) -> Result<StoredUpload, UploadStorageError> {
        let stream = stream::once(async move { Ok::<_, UploadStorageError>(data) });
        self.store_stream(original_name, stream).await
    }

    pub async fn read(&self, stored_path: &str) -> Result<Bytes, UploadStorageError> {
        let absolute = self.resolve(stored_path)?;
        let data = fs::read(absolute).await?;
        Ok(Bytes::from(data))
    }

    /// Remove a stored file. Missing files count as removed.
    pub async fn delete(&self, stored_path: &str) -> Result<(), UploadStorageError> {
        let absolute = self.resolve(stored_path)?;
        match fs::remove_file(&absolute).await {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(UploadStorageError::Io(err)),
        }
    }

    /// Remove several files, logging instead of failing.
    pub async fn delete_quietly<I, P>(&self, stored_paths: I)
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        for path in stored_paths {
            let path = path.as_ref();
            if let Err(err) = self.delete(path).await {
                warn!(stored_path = %path, error = %err, "failed to remove stored upload");
            }
        }
    }

    /// Map a stored name to a path under the root, rejecting escapes.
    pub fn resolve(&self, stored_path: &str) -> Result<PathBuf, UploadStorageError> {
        let relative = Path::new(stored_path);
        if stored_path.is_empty()
            || relative.is_absolute()
            || relative.components().any(|component| {
                matches!(
                    component,
                    Component::ParentDir | Component::Prefix(_) | Component::RootDir
                )
            })
        {
            return Err(UploadStorageError::InvalidPath);
        }

        Ok(self.root.join(relative))
    }
}

fn build_stored_name(original_name: &str) -> String {
    let identifier = Uuid::new_v4();
    let filename = sanitize_filename(original_name);
    format!("{identifier}-{filename}")
}

fn sanitize_filename(original: &str) -> String {
    let path = Path::new(original);
    let stem = path
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("upload");
    let mut base = slugify(stem);
    if base.is_empty() {
        base = "upload".to_string();
    }

    let extension = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.trim_matches('.').to_ascii_lowercase())
        .filter(|value| !value.is_empty() && value.chars().all(|ch| ch.is_ascii_alphanumeric()));

    match extension {
        Some(ext) => format!("{base}.{ext}"),
        None => base,
    }
}

/// Copy every non-empty chunk into `file`, returning the byte count.
async fn write_chunks<S, W>(file: &mut W, stream: S) -> Result<u64, UploadStorageError>
where
    S: futures::Stream<Item = Result<Bytes, UploadStorageError>>,
    W: AsyncWrite + Unpin,
{
    let mut total_bytes: u64 = 0;

    pin_mut!(stream);
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if chunk.is_empty() {
            continue;
        }

        total_bytes = total_bytes
            .checked_add(chunk.len() as u64)
            .ok_or(UploadStorageError::SizeOverflow)?;
        file.write_all(&chunk).await?;
    }

    file.flush().await?;
    Ok(total_bytes)
}
