//! Local media: quality presets, stream handles, the capture seam and the
//! device stream manager that owns the local stream.

pub mod capture;
pub mod device;
pub mod profile;
pub mod stream;

pub use capture::MediaCapture;
pub use device::{DeviceStreamManager, LocalStreamState};
pub use profile::{
    CaptureConstraints, FacingMode, MediaQualityProfile, VideoConstraints, DEFAULT_PROFILE, HD,
    LOW, QUALITY_PROFILES, SD,
};
pub use stream::{MediaStream, MediaTrack, TrackKind, TrackSettings, TrackState};
