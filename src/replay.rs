// src/replay.rs
//
// Tracker seam plus offline replay. A recording is JSON lines, one line per
// frame:
//
//   {"frame_index": 0, "timestamp": 12.5, "width": 640, "height": 360,
//    "people": [{"id": 3, "bbox": {...}, "keypoints": [[x, y], ...]}]}
//
// Replays run without video: frames carry geometry and time only, so clips
// written during a replay contain no images but still produce log entries.

use crate::source::FrameSource;
use crate::types::{Frame, Observation};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::io::BufRead;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Produces tracked people for a frame. Pose estimation and identity
/// tracking live outside this crate; implementations adapt their output.
pub trait PoseTracker: Send {
    /// People on `frame`, or `None` when the tracker has not processed it.
    /// `Some(vec![])` means tracked, nobody there.
    fn track(&mut self, frame: &Frame) -> Result<Option<Vec<Observation>>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedFrame {
    pub frame_index: u64,
    pub timestamp: f64,
    pub width: usize,
    pub height: usize,
    #[serde(default)]
    pub people: Vec<Observation>,
}

pub struct Recording {
    frames: Vec<RecordedFrame>,
}

impl Recording {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open recording {}", path.display()))?;
        let recording = Self::from_reader(std::io::BufReader::new(file))
            .with_context(|| format!("Failed to read recording {}", path.display()))?;
        info!(
            "✓ Loaded recording {} ({} frames)",
            path.display(),
            recording.len()
        );
        Ok(recording)
    }

    pub fn from_reader(reader: impl BufRead) -> Result<Self> {
        let mut frames = Vec::new();
        for (n, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let frame: RecordedFrame = serde_json::from_str(&line)
                .with_context(|| format!("Invalid recording line {}", n + 1))?;
            frames.push(frame);
        }
        Ok(Self { frames })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Split into a frame source and a tracker that answers for those frames.
    pub fn into_parts(self) -> (ReplaySource, ReplayTracker) {
        let mut by_index = HashMap::with_capacity(self.frames.len());
        let mut frames = VecDeque::with_capacity(self.frames.len());
        for recorded in self.frames {
            frames.push_back(Frame::blank(
                recorded.width,
                recorded.height,
                recorded.frame_index,
                recorded.timestamp,
            ));
            by_index.insert(recorded.frame_index, recorded.people);
        }
        (ReplaySource { frames }, ReplayTracker { by_index })
    }
}

/// Pixel-less frames in recording order.
pub struct ReplaySource {
    frames: VecDeque<Frame>,
}

impl ReplaySource {
    pub fn is_exhausted(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FrameSource for ReplaySource {
    fn read(&mut self) -> Result<Option<Frame>> {
        Ok(self.frames.pop_front())
    }

    fn reopen(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Serves the recorded people for each frame index.
pub struct ReplayTracker {
    by_index: HashMap<u64, Vec<Observation>>,
}

impl PoseTracker for ReplayTracker {
    fn track(&mut self, frame: &Frame) -> Result<Option<Vec<Observation>>> {
        Ok(self.by_index.remove(&frame.index))
    }
}

// ============================================================================
// LIVE TRACKER FEED
// ============================================================================

/// Observations pushed by an external tracker process as JSON lines in the
/// recording format. Each `track` call hands out the newest unread line, or
/// `None` if the tracker has not produced a new one since.
pub struct StreamTracker {
    latest: Arc<Mutex<Option<RecordedFrame>>>,
}

impl StreamTracker {
    pub fn spawn(reader: impl BufRead + Send + 'static) -> Result<Self> {
        let latest = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&latest);
        std::thread::Builder::new()
            .name("tracker-feed".to_string())
            .spawn(move || read_feed(reader, &slot))
            .context("Failed to spawn tracker feed thread")?;
        Ok(Self { latest })
    }
}

fn read_feed(reader: impl BufRead, slot: &Mutex<Option<RecordedFrame>>) {
    for (n, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Tracker feed read failed: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<RecordedFrame>(&line) {
            Ok(frame) => {
                if let Ok(mut guard) = slot.lock() {
                    *guard = Some(frame);
                }
            }
            Err(e) => warn!("Skipping tracker line {}: {}", n + 1, e),
        }
    }
    debug!("Tracker feed closed");
}

impl PoseTracker for StreamTracker {
    fn track(&mut self, frame: &Frame) -> Result<Option<Vec<Observation>>> {
        let mut guard = self
            .latest
            .lock()
            .map_err(|_| anyhow::anyhow!("tracker feed lock poisoned"))?;
        Ok(guard.take().map(|tracked| {
            debug!(
                "Tracker frame {} paired with grabbed frame {} ({:.3}s apart)",
                tracked.frame_index,
                frame.index,
                frame.timestamp - tracked.timestamp
            );
            tracked.people
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use std::time::{Duration, Instant};

    const TWO_FRAMES: &str = r#"{"frame_index": 0, "timestamp": 0.0, "width": 640, "height": 360, "people": [{"id": 1, "bbox": {"x1": 0, "y1": 0, "x2": 10, "y2": 20}, "keypoints": [[0.5, 0.5]]}]}

{"frame_index": 1, "timestamp": 0.066, "width": 640, "height": 360}
"#;

    #[test]
    fn test_replay_serves_people_by_frame() {
        let recording = Recording::from_reader(Cursor::new(TWO_FRAMES)).unwrap();
        assert_eq!(recording.len(), 2);
        let (mut source, mut tracker) = recording.into_parts();

        let first = source.read().unwrap().unwrap();
        assert_eq!((first.width, first.height), (640, 360));
        assert!(!first.has_pixels());
        let people = tracker.track(&first).unwrap().unwrap();
        assert_eq!(people.len(), 1);
        assert_eq!(people[0].id, 1);
        assert_eq!(people[0].keypoints.len(), 1);

        let second = source.read().unwrap().unwrap();
        assert_eq!(second.timestamp, 0.066);
        // Tracked, but nobody in frame
        let nobody = tracker.track(&second).unwrap();
        assert!(nobody.is_some_and(|people| people.is_empty()));
        // Unknown frames were never tracked
        assert!(tracker
            .track(&Frame::blank(640, 360, 99, 9.0))
            .unwrap()
            .is_none());

        assert!(source.is_exhausted());
        assert!(source.read().unwrap().is_none());
    }

    #[test]
    fn test_bad_line_reports_line_number() {
        let input = "{\"frame_index\": 0, \"timestamp\": 0, \"width\": 1, \"height\": 1}\nnot json\n";
        let err = Recording::from_reader(Cursor::new(input))
            .err()
            .expect("should fail");
        assert!(format!("{:#}", err).contains("line 2"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TWO_FRAMES.as_bytes()).unwrap();
        let recording = Recording::load(file.path()).unwrap();
        assert_eq!(recording.len(), 2);
        assert!(Recording::load("/nonexistent/recording.jsonl").is_err());
    }

    #[test]
    fn test_stream_tracker_hands_out_each_line_once() {
        let first_line = format!("{}\n", TWO_FRAMES.lines().next().unwrap());
        let mut tracker = StreamTracker::spawn(Cursor::new(first_line)).unwrap();
        let frame = Frame::blank(640, 360, 0, 0.0);

        let deadline = Instant::now() + Duration::from_secs(2);
        let mut people = None;
        while people.is_none() && Instant::now() < deadline {
            people = tracker.track(&frame).unwrap();
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(people.map(|p| p.len()), Some(1));
        assert!(tracker.track(&frame).unwrap().is_none());
    }
}
