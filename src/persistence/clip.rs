// src/persistence/clip.rs
//
// Alert clip encoding. A clip is the snapshot of the rolling frame buffer
// taken when an alert episode starts.

use crate::types::SharedFrame;
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Everything a worker needs to persist one alert episode. The frames are
/// an immutable snapshot; the live buffer keeps rolling independently.
#[derive(Debug, Clone)]
pub struct ClipRequest {
    pub track_id: u32,
    pub label: String,
    pub camera: String,
    pub captured_at: DateTime<Local>,
    pub frames: Vec<SharedFrame>,
}

impl ClipRequest {
    /// Timestamp format used in file names and log entries
    pub fn timestamp(&self) -> String {
        self.captured_at.format("%Y%m%d_%H%M%S").to_string()
    }

    /// `{camera}_{label}_{timestamp}_id{track}`, label stripped of ':' and
    /// with spaces turned into underscores
    pub fn file_stem(&self) -> String {
        let safe_label = self.label.replace(':', "").replace(' ', "_");
        format!(
            "{}_{}_{}_id{}",
            self.camera,
            safe_label,
            self.timestamp(),
            self.track_id
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EncodedClip {
    pub path: PathBuf,
    pub frames_written: usize,
}

pub trait ClipEncoder: Send + Sync {
    /// Where the clip for `request` will be written, known before encoding
    fn clip_path(&self, request: &ClipRequest, output_dir: &Path) -> PathBuf;

    fn encode(&self, request: &ClipRequest, output_dir: &Path) -> Result<EncodedClip>;
}

// ============================================================================
// JPEG SEQUENCE
// ============================================================================

/// Writes each frame as `frame_NNNNN.jpg` inside a per-clip directory.
/// Frames without pixel data (replays without video) are skipped.
#[derive(Debug, Clone)]
pub struct JpegSequenceEncoder {
    quality: u8,
}

impl JpegSequenceEncoder {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }
}

impl ClipEncoder for JpegSequenceEncoder {
    fn clip_path(&self, request: &ClipRequest, output_dir: &Path) -> PathBuf {
        output_dir.join(request.file_stem())
    }

    fn encode(&self, request: &ClipRequest, output_dir: &Path) -> Result<EncodedClip> {
        let dir = self.clip_path(request, output_dir);
        let mut frames_written = 0;

        for frame in request.frames.iter().filter(|f| f.has_pixels()) {
            if frames_written == 0 {
                fs::create_dir_all(&dir)
                    .with_context(|| format!("Failed to create clip dir {}", dir.display()))?;
            }
            let path = dir.join(format!("frame_{:05}.jpg", frames_written));
            write_jpeg(&path, &frame.data, frame.width, frame.height, self.quality)?;
            frames_written += 1;
        }

        if frames_written == 0 {
            warn!("Clip {} has no pixel data, nothing encoded", request.file_stem());
        } else {
            debug!("Wrote {} frames to {}", frames_written, dir.display());
        }

        Ok(EncodedClip {
            path: dir,
            frames_written,
        })
    }
}

fn write_jpeg(path: &Path, rgb: &[u8], width: usize, height: usize, quality: u8) -> Result<()> {
    use image::codecs::jpeg::JpegEncoder;
    use image::{ImageBuffer, RgbImage};

    let expected_len = width * height * 3;
    let img: RgbImage = ImageBuffer::from_raw(width as u32, height as u32, rgb[..expected_len].to_vec())
        .context("Frame buffer does not match its dimensions")?;

    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let encoder = JpegEncoder::new_with_quality(BufWriter::new(file), quality);
    img.write_with_encoder(encoder)
        .with_context(|| format!("Failed to encode {}", path.display()))?;
    Ok(())
}

// ============================================================================
// MP4 (OpenCV)
// ============================================================================

#[cfg(feature = "opencv")]
pub use mp4::Mp4ClipEncoder;

#[cfg(feature = "opencv")]
mod mp4 {
    use super::*;
    use opencv::{
        core::{self, Mat},
        imgproc,
        prelude::*,
        videoio::VideoWriter,
    };

    /// `mp4v` video at the configured clip frame rate.
    #[derive(Debug, Clone)]
    pub struct Mp4ClipEncoder {
        fps: f64,
    }

    impl Mp4ClipEncoder {
        pub fn new(fps: u32) -> Self {
            Self { fps: fps as f64 }
        }
    }

    impl ClipEncoder for Mp4ClipEncoder {
        fn clip_path(&self, request: &ClipRequest, output_dir: &Path) -> PathBuf {
            output_dir.join(format!("{}.mp4", request.file_stem()))
        }

        fn encode(&self, request: &ClipRequest, output_dir: &Path) -> Result<EncodedClip> {
            let path = self.clip_path(request, output_dir);
            let frames: Vec<_> = request.frames.iter().filter(|f| f.has_pixels()).collect();
            let Some(first) = frames.first() else {
                warn!("Clip {} has no pixel data, nothing encoded", request.file_stem());
                return Ok(EncodedClip {
                    path,
                    frames_written: 0,
                });
            };

            fs::create_dir_all(output_dir)?;
            let path_str = path.to_str().context("Clip path is not valid UTF-8")?;
            let fourcc = VideoWriter::fourcc('m', 'p', '4', 'v')?;
            let mut writer = VideoWriter::new(
                path_str,
                fourcc,
                self.fps,
                core::Size::new(first.width as i32, first.height as i32),
                true,
            )?;

            let mut frames_written = 0;
            for frame in frames {
                let mat = Mat::from_slice(&frame.data[..frame.width * frame.height * 3])?;
                let mat = mat.reshape(3, frame.height as i32)?;
                let mut bgr = Mat::default();
                imgproc::cvt_color(&mat, &mut bgr, imgproc::COLOR_RGB2BGR, 0)?;
                writer.write(&bgr)?;
                frames_written += 1;
            }
            writer.release()?;

            Ok(EncodedClip {
                path,
                frames_written,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Frame;
    use std::sync::Arc;

    fn request(frames: Vec<SharedFrame>) -> ClipRequest {
        let captured_at = Local::now();
        ClipRequest {
            track_id: 3,
            label: "CRIME: FAST (SNATCH)".to_string(),
            camera: "lobby".to_string(),
            captured_at,
            frames,
        }
    }

    fn solid_frame(index: u64) -> SharedFrame {
        Arc::new(Frame {
            data: vec![120; 8 * 4 * 3],
            width: 8,
            height: 4,
            index,
            timestamp: index as f64 / 15.0,
        })
    }

    #[test]
    fn test_file_stem_sanitizes_label() {
        let req = request(Vec::new());
        let stem = req.file_stem();
        assert!(stem.starts_with("lobby_CRIME_FAST_(SNATCH)_"));
        assert!(stem.ends_with("_id3"));
        assert!(!stem.contains(':'));
        assert!(!stem.contains(' '));
    }

    #[test]
    fn test_jpeg_sequence_writes_every_frame() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = JpegSequenceEncoder::new(85);
        let req = request(vec![solid_frame(0), solid_frame(1), solid_frame(2)]);

        let clip = encoder.encode(&req, dir.path()).unwrap();
        assert_eq!(clip.frames_written, 3);
        assert!(clip.path.join("frame_00000.jpg").exists());
        assert!(clip.path.join("frame_00002.jpg").exists());
    }

    #[test]
    fn test_jpeg_sequence_skips_blank_frames() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = JpegSequenceEncoder::new(85);
        let req = request(vec![Arc::new(Frame::blank(640, 360, 0, 0.0))]);

        let clip = encoder.encode(&req, dir.path()).unwrap();
        assert_eq!(clip.frames_written, 0);
        assert!(!clip.path.exists());
    }
}
