//! Video quality presets and the capture constraints derived from them.

use serde::{Deserialize, Serialize};

/// A named resolution and frame-rate preset requested from the camera.
///
/// Profiles only come from the catalog, so the label is a `&'static str` and
/// the type is serialize-only. Deserialize by label with [`Self::by_label`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MediaQualityProfile {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub label: &'static str,
}

/// 1280x720 at 30 fps.
pub const HD: MediaQualityProfile = MediaQualityProfile {
    width: 1280,
    height: 720,
    frame_rate: 30,
    label: "HD",
};

/// 640x480 at 30 fps.
pub const SD: MediaQualityProfile = MediaQualityProfile {
    width: 640,
    height: 480,
    frame_rate: 30,
    label: "SD",
};

/// 480x360 at 24 fps.
pub const LOW: MediaQualityProfile = MediaQualityProfile {
    width: 480,
    height: 360,
    frame_rate: 24,
    label: "Low",
};

/// Selectable presets, best first. This order is the menu order only; the
/// default is [`DEFAULT_PROFILE`].
pub const QUALITY_PROFILES: [MediaQualityProfile; 3] = [HD, SD, LOW];

/// Profile used when nothing else is requested.
pub const DEFAULT_PROFILE: MediaQualityProfile = HD;

impl MediaQualityProfile {
    /// Look up a catalog profile by its label (case-insensitive).
    #[must_use]
    pub fn by_label(label: &str) -> Option<Self> {
        let label = label.trim();
        QUALITY_PROFILES
            .iter()
            .find(|p| p.label.eq_ignore_ascii_case(label))
            .copied()
    }

    /// Capture constraints for this profile: front camera plus audio.
    #[must_use]
    pub fn constraints(&self) -> CaptureConstraints {
        CaptureConstraints {
            video: VideoConstraints {
                width: self.width,
                height: self.height,
                frame_rate: self.frame_rate,
                facing_mode: FacingMode::User,
            },
            audio: true,
        }
    }
}

impl Default for MediaQualityProfile {
    fn default() -> Self {
        DEFAULT_PROFILE
    }
}

/// Which camera to prefer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Front camera.
    User,
    /// Rear camera.
    Environment,
}

/// Ideal video settings requested from the capture collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoConstraints {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub facing_mode: FacingMode,
}

/// A complete capture request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConstraints {
    pub video: VideoConstraints,
    pub audio: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profile_is_explicit_hd() {
        assert_eq!(MediaQualityProfile::default(), HD);
        assert_eq!(DEFAULT_PROFILE.label, "HD");
    }

    #[test]
    fn test_catalog_order_and_values() {
        let labels: Vec<_> = QUALITY_PROFILES.iter().map(|p| p.label).collect();
        assert_eq!(labels, vec!["HD", "SD", "Low"]);
        assert_eq!((LOW.width, LOW.height, LOW.frame_rate), (480, 360, 24));
    }

    #[test]
    fn test_by_label() {
        assert_eq!(MediaQualityProfile::by_label("SD"), Some(SD));
        assert_eq!(MediaQualityProfile::by_label(" low "), Some(LOW));
        assert_eq!(MediaQualityProfile::by_label("4K"), None);
    }

    #[test]
    fn test_constraints_follow_profile() {
        let c = SD.constraints();
        assert_eq!(c.video.width, 640);
        assert_eq!(c.video.height, 480);
        assert_eq!(c.video.frame_rate, 30);
        assert_eq!(c.video.facing_mode, FacingMode::User);
        assert!(c.audio);
    }
}
