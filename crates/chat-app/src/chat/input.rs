use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use snafu::{ResultExt, Snafu, ensure};

use super::message::Part;

/// Inline request ceiling of the hosted model API.
pub const DEFAULT_MAX_ATTACHMENT_BYTES: u64 = 20 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputLimits {
    pub max_attachment_bytes: u64,
}

impl Default for InputLimits {
    fn default() -> Self {
        Self {
            max_attachment_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
        }
    }
}

/// Image file selected by the user for the next send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub path: PathBuf,
    pub name: String,
    pub mime_type: String,
}

impl Attachment {
    /// Guesses the MIME type from the file extension and accepts images only.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self, InputError> {
        let path = path.into();
        let mime_type = mime_guess::from_path(&path)
            .first_raw()
            .unwrap_or("application/octet-stream");
        Self::with_mime_type(path, mime_type)
    }

    pub fn with_mime_type(
        path: impl Into<PathBuf>,
        mime_type: impl Into<String>,
    ) -> Result<Self, InputError> {
        let path = path.into();
        let mime_type = mime_type.into().trim().to_ascii_lowercase();

        ensure!(
            mime_type.starts_with("image/"),
            NotAnImageSnafu {
                stage: "attachment-mime-type",
                path: path.clone(),
                mime_type,
            }
        );

        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            path,
            name,
            mime_type,
        })
    }
}

/// Raw input as captured by the input surface.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserInput {
    pub text: String,
    pub attachment: Option<Attachment>,
}

impl UserInput {
    pub fn new(text: impl Into<String>, attachment: Option<Attachment>) -> Self {
        Self {
            text: text.into(),
            attachment,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(text, None)
    }

    /// True when there is neither non-blank text nor an attachment.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.attachment.is_none()
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum InputError {
    #[snafu(display("'{mime_type}' at {path:?} is not an image"))]
    NotAnImage {
        stage: &'static str,
        path: PathBuf,
        mime_type: String,
    },
    #[snafu(display("failed to inspect attachment {path:?} on `{stage}`: {source}"))]
    ReadMetadata {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to read attachment {path:?} on `{stage}`: {source}"))]
    ReadFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("attachment {path:?} is {size} bytes, limit is {limit}"))]
    TooLarge {
        stage: &'static str,
        path: PathBuf,
        size: u64,
        limit: u64,
    },
    #[snafu(display("attachment {path:?} is empty"))]
    EmptyFile { stage: &'static str, path: PathBuf },
}

/// Reads the attachment into memory and encodes it as an inline image part.
pub async fn read_image_part(
    attachment: &Attachment,
    limits: InputLimits,
) -> Result<Part, InputError> {
    let path = attachment.path.as_path();
    let metadata = tokio::fs::metadata(path).await.context(ReadMetadataSnafu {
        stage: "attachment-metadata",
        path: path.to_path_buf(),
    })?;
    check_size(path, metadata.len(), limits, "attachment-metadata-size")?;

    let bytes = tokio::fs::read(path).await.context(ReadFileSnafu {
        stage: "attachment-read",
        path: path.to_path_buf(),
    })?;
    // The file may have grown between the metadata check and the read.
    check_size(path, bytes.len() as u64, limits, "attachment-read-size")?;

    tracing::debug!(
        path = %path.display(),
        mime_type = %attachment.mime_type,
        bytes = bytes.len(),
        "encoded attachment as inline image"
    );

    Ok(Part::inline_image(
        attachment.mime_type.clone(),
        BASE64_STANDARD.encode(bytes),
    ))
}

/// Converts raw input into ordered parts: image first, then trimmed text.
///
/// Callers reject empty input before calling; an attachment read failure aborts
/// without producing any part.
pub async fn normalize(input: &UserInput, limits: InputLimits) -> Result<Vec<Part>, InputError> {
    let mut parts = Vec::with_capacity(2);

    if let Some(attachment) = &input.attachment {
        parts.push(read_image_part(attachment, limits).await?);
    }

    if let Some(text) = Part::text(input.text.trim()) {
        parts.push(text);
    }

    Ok(parts)
}

fn check_size(
    path: &Path,
    size: u64,
    limits: InputLimits,
    stage: &'static str,
) -> Result<(), InputError> {
    ensure!(
        size > 0,
        EmptyFileSnafu {
            stage,
            path: path.to_path_buf(),
        }
    );
    ensure!(
        size <= limits.max_attachment_bytes,
        TooLargeSnafu {
            stage,
            path: path.to_path_buf(),
            size,
            limit: limits.max_attachment_bytes,
        }
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn image_file(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".png")
            .tempfile()
            .expect("temp file");
        file.write_all(bytes).expect("write image bytes");
        file
    }

    #[test]
    fn attachment_mime_is_guessed_from_extension() {
        let attachment = Attachment::from_path("/tmp/paddy-field.JPG").expect("image");
        assert_eq!(attachment.mime_type, "image/jpeg");
        assert_eq!(attachment.name, "paddy-field.JPG");
    }

    #[test]
    fn non_image_attachments_are_refused() {
        let error = Attachment::from_path("/tmp/notes.txt").expect_err("text file");
        assert!(matches!(error, InputError::NotAnImage { .. }));

        let error = Attachment::from_path("/tmp/no-extension").expect_err("unknown type");
        assert!(matches!(error, InputError::NotAnImage { .. }));
    }

    #[test]
    fn blank_text_without_attachment_is_empty() {
        assert!(UserInput::text("  \n\t ").is_empty());
        assert!(!UserInput::text(" হ্যালো ").is_empty());

        let attachment = Attachment::with_mime_type("/tmp/leaf", "image/webp").expect("image");
        assert!(!UserInput::new("   ", Some(attachment)).is_empty());
    }

    #[tokio::test]
    async fn text_only_input_is_trimmed() {
        let parts = normalize(&UserInput::text("  হ্যালো  "), InputLimits::default())
            .await
            .expect("parts");
        assert_eq!(parts, vec![Part::Text("হ্যালো".to_string())]);
    }

    #[tokio::test]
    async fn image_part_precedes_text_part() {
        let file = image_file(b"hello");
        let attachment = Attachment::from_path(file.path()).expect("png attachment");
        let input = UserInput::new("what is this?", Some(attachment));

        let parts = normalize(&input, InputLimits::default())
            .await
            .expect("parts");

        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], Part::inline_image("image/png", "aGVsbG8="));
        assert_eq!(parts[1], Part::Text("what is this?".to_string()));
    }

    #[tokio::test]
    async fn image_without_text_yields_single_part() {
        let file = image_file(&[0x89, 0x50, 0x4e, 0x47]);
        let attachment = Attachment::from_path(file.path()).expect("png attachment");

        let parts = normalize(&UserInput::new("   ", Some(attachment)), InputLimits::default())
            .await
            .expect("parts");

        assert_eq!(parts.len(), 1);
        assert!(parts[0].as_image().is_some());
    }

    #[tokio::test]
    async fn missing_file_fails_without_parts() {
        let attachment =
            Attachment::from_path("/definitely/not/here/leaf.png").expect("png attachment");
        let error = normalize(&UserInput::new("text", Some(attachment)), InputLimits::default())
            .await
            .expect_err("missing file");
        assert!(matches!(error, InputError::ReadMetadata { .. }));
    }

    #[tokio::test]
    async fn oversized_file_is_rejected_before_reading() {
        let file = image_file(&[7u8; 64]);
        let attachment = Attachment::from_path(file.path()).expect("png attachment");
        let limits = InputLimits {
            max_attachment_bytes: 16,
        };

        let error = read_image_part(&attachment, limits)
            .await
            .expect_err("too large");
        match error {
            InputError::TooLarge { size, limit, .. } => {
                assert_eq!(size, 64);
                assert_eq!(limit, 16);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn empty_file_is_rejected() {
        let file = image_file(&[]);
        let attachment = Attachment::from_path(file.path()).expect("png attachment");
        let error = read_image_part(&attachment, InputLimits::default())
            .await
            .expect_err("empty file");
        assert!(matches!(error, InputError::EmptyFile { .. }));
    }
}
