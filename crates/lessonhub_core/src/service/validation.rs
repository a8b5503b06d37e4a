//! Form validation shared by the lesson, profile and feedback actions.
//!
//! Validation runs before any store call; a failure has no side effects.

use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is blank.
    Required(&'static str),
    /// A choice field holds a value outside its allowed set.
    InvalidChoice { field: &'static str, value: String },
    /// Attachment MIME type is not accepted by the form.
    AttachmentType(String),
    AttachmentTooLarge { size: u64, max: u64 },
    PasswordTooShort { min_len: usize },
    /// Staged insight changes are empty.
    NothingToSave,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Required(field) => write!(f, "{field} is required."),
            Self::InvalidChoice { field, value } => {
                write!(f, "`{value}` is not a valid {field}.")
            }
            Self::AttachmentType(mime) => {
                write!(f, "Files of type `{mime}` cannot be attached.")
            }
            Self::AttachmentTooLarge { size, max } => write!(
                f,
                "File is too large ({}); the limit is {}.",
                format_size(*size),
                format_size(*max)
            ),
            Self::PasswordTooShort { min_len } => {
                write!(f, "Password must be at least {min_len} characters.")
            }
            Self::NothingToSave => write!(f, "No changes to save."),
        }
    }
}

impl Error for ValidationError {}

/// File picked in a form, already read into a data URL by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub mime: String,
    pub size: u64,
    pub data_url: String,
}

impl Attachment {
    pub fn new(mime: impl Into<String>, size: u64, data_url: impl Into<String>) -> Self {
        Self {
            mime: mime.into(),
            size,
            data_url: data_url.into(),
        }
    }

    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }

    pub fn is_video(&self) -> bool {
        self.mime.starts_with("video/")
    }
}

/// Media kinds a form accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaRule {
    ImageOnly,
    ImageOrVideo,
}

pub fn validate_attachment(
    attachment: &Attachment,
    rule: MediaRule,
    max_bytes: u64,
) -> Result<(), ValidationError> {
    let accepted = match rule {
        MediaRule::ImageOnly => attachment.is_image(),
        MediaRule::ImageOrVideo => attachment.is_image() || attachment.is_video(),
    };
    if !accepted {
        return Err(ValidationError::AttachmentType(attachment.mime.clone()));
    }
    if attachment.size > max_bytes {
        return Err(ValidationError::AttachmentTooLarge {
            size: attachment.size,
            max: max_bytes,
        });
    }
    Ok(())
}

/// Trimmed value of a required field.
pub fn required<'a>(field: &'static str, value: &'a str) -> Result<&'a str, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        Err(ValidationError::Required(field))
    } else {
        Ok(value)
    }
}

pub fn validate_password(secret: &str, min_len: usize) -> Result<(), ValidationError> {
    if secret.chars().count() < min_len {
        return Err(ValidationError::PasswordTooShort { min_len });
    }
    Ok(())
}

/// Human-readable byte size: `512 B`, `1.5 KB`, `5 MB`.
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    let value = bytes as f64;
    let (scaled, unit) = if value >= MB {
        (value / MB, "MB")
    } else if value >= KB {
        (value / KB, "KB")
    } else {
        return format!("{bytes} B");
    };
    let rounded = (scaled * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{rounded:.0} {unit}")
    } else {
        format!("{rounded:.1} {unit}")
    }
}

#[cfg(test)]
mod tests {
    use super::{
        format_size, required, validate_attachment, validate_password, Attachment, MediaRule,
        ValidationError,
    };

    #[test]
    fn attachments_are_checked_for_type_then_size() {
        let video = Attachment::new("video/mp4", 1024, "data:video/mp4;base64,AA");
        assert!(validate_attachment(&video, MediaRule::ImageOrVideo, 4096).is_ok());
        assert_eq!(
            validate_attachment(&video, MediaRule::ImageOnly, 4096),
            Err(ValidationError::AttachmentType("video/mp4".to_string()))
        );

        let pdf = Attachment::new("application/pdf", 10, "data:application/pdf;base64,AA");
        assert!(matches!(
            validate_attachment(&pdf, MediaRule::ImageOrVideo, 4096),
            Err(ValidationError::AttachmentType(_))
        ));

        let big = Attachment::new("image/png", 6 * 1024 * 1024, "data:image/png;base64,AA");
        let err = validate_attachment(&big, MediaRule::ImageOnly, 5 * 1024 * 1024)
            .expect_err("oversized");
        assert_eq!(err.to_string(), "File is too large (6 MB); the limit is 5 MB.");
    }

    #[test]
    fn required_fields_are_trimmed() {
        assert_eq!(required("Title", "  Intro "), Ok("Intro"));
        assert_eq!(required("Title", "   "), Err(ValidationError::Required("Title")));
    }

    #[test]
    fn password_length_is_counted_in_characters() {
        assert!(validate_password("ñññññ", 5).is_ok());
        assert_eq!(
            validate_password("abc", 6),
            Err(ValidationError::PasswordTooShort { min_len: 6 })
        );
    }

    #[test]
    fn sizes_render_compactly() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5 MB");
    }
}
