//! Image-selection seam for progress photos.

use async_trait::async_trait;

use crate::errors::AppError;

/// Message shown when the photo library permission is refused.
pub const PHOTO_PERMISSION_MESSAGE: &str =
    "Photo library access is needed to add progress photos. You can enable it in Settings.";

/// Result of asking the platform for one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickResult {
    /// URI of the selected image
    Picked(String),
    /// The user closed the picker
    Cancelled,
    /// The user (or OS policy) refused library access
    PermissionDenied,
}

/// Platform image picker: pick one image, return a URI.
#[async_trait]
pub trait ImagePicker: Send + Sync {
    async fn pick_image(&self) -> Result<PickResult, AppError>;
}
