//! Local media acquisition
//!
//! Builds capture constraints from the session configuration and asks the
//! platform for a local stream, degrading to audio-only and then to no local
//! media when devices are unavailable.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::{Result, SessionError};

/// Kind of a media track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

/// A local or remote media track handle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaTrack {
    pub id: String,
    pub kind: TrackKind,
}

/// Captured local stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalStream {
    pub id: String,
    pub tracks: Vec<MediaTrack>,
}

impl LocalStream {
    pub fn has_video(&self) -> bool {
        self.tracks.iter().any(|t| t.kind == TrackKind::Video)
    }

    pub fn has_audio(&self) -> bool {
        self.tracks.iter().any(|t| t.kind == TrackKind::Audio)
    }
}

/// Ideal capture resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoResolution {
    pub width: u32,
    pub height: u32,
}

impl VideoResolution {
    pub const WIDESCREEN: VideoResolution = VideoResolution { width: 1280, height: 720 };
    pub const STANDARD: VideoResolution = VideoResolution { width: 640, height: 480 };
}

/// What the session wants to send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaOptions {
    pub send_video: bool,
    pub send_audio: bool,
    pub widescreen: bool,
}

impl Default for MediaOptions {
    fn default() -> Self {
        Self {
            send_video: true,
            send_audio: true,
            widescreen: true,
        }
    }
}

/// Constraints passed to the capture API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaConstraints {
    /// `None` means no video is requested
    pub video: Option<VideoResolution>,
    pub audio: bool,
}

impl MediaConstraints {
    pub fn from_options(options: &MediaOptions) -> Self {
        let resolution = if options.widescreen {
            VideoResolution::WIDESCREEN
        } else {
            VideoResolution::STANDARD
        };
        Self {
            video: options.send_video.then_some(resolution),
            audio: options.send_audio,
        }
    }

    /// Whether anything is requested at all
    pub fn requests_media(&self) -> bool {
        self.video.is_some() || self.audio
    }

    fn audio_only(&self) -> Self {
        Self {
            video: None,
            audio: self.audio,
        }
    }
}

/// Platform capture API
#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn get_user_media(&self, constraints: &MediaConstraints) -> Result<LocalStream>;
}

/// Outcome of local media acquisition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaAcquisition {
    pub stream: Option<LocalStream>,
    /// Device errors met on the way, in order
    pub errors: Vec<String>,
}

impl MediaAcquisition {
    pub fn degraded(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Capture local media, falling back to audio-only and then to nothing.
///
/// Device failures never abort the session; they are returned in
/// [`MediaAcquisition::errors`].
pub async fn acquire_local_media(devices: &dyn MediaDevices, constraints: MediaConstraints) -> MediaAcquisition {
    let mut errors = Vec::new();

    if !constraints.requests_media() {
        return MediaAcquisition { stream: None, errors };
    }

    match devices.get_user_media(&constraints).await {
        Ok(stream) => return MediaAcquisition { stream: Some(stream), errors },
        Err(e) => {
            warn!("Could not capture local media with {:?}: {}", constraints, e);
            errors.push(device_message(e));
        }
    }

    let fallback = constraints.audio_only();
    if constraints.video.is_some() && fallback.requests_media() {
        match devices.get_user_media(&fallback).await {
            Ok(stream) => {
                info!("Continuing with audio-only local media");
                return MediaAcquisition { stream: Some(stream), errors };
            }
            Err(e) => {
                warn!("Could not capture audio-only local media: {}", e);
                errors.push(device_message(e));
            }
        }
    }

    info!("Continuing without local media");
    MediaAcquisition { stream: None, errors }
}

fn device_message(error: SessionError) -> String {
    match error {
        SessionError::Device { message } => message,
        other => other.to_string(),
    }
}
