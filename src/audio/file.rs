// File-backed capture sources
//
// A WAV file stands in for a capture device: it is decoded up front, converted
// to the track's layout, and then replayed as a stream of PCM buffers, paced at
// wall-clock speed when `realtime` is set.

use hound::{SampleFormat, WavReader};
use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::backend::{AudioBackend, AudioBackendFactory, TrackEndedNotifier, TrackKind};
use crate::error::{RecorderError, Result};
use crate::storage::RecordingConfig;

/// Default PCM buffer size in frames (one delivery from the capture thread)
pub const DEFAULT_BUFFER_FRAMES: usize = 4096;

pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    /// Interleaved 16-bit samples
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let file = File::open(path).map_err(|e| match e.kind() {
            ErrorKind::PermissionDenied => {
                RecorderError::PermissionDenied(format!("{}: {}", path.display(), e))
            }
            _ => RecorderError::DeviceUnavailable(format!("{}: {}", path.display(), e)),
        })?;

        let reader = WavReader::new(BufReader::new(file))
            .map_err(|e| RecorderError::DeviceUnavailable(format!("{}: {}", path.display(), e)))?;

        let spec = reader.spec();
        let samples: Vec<i16> = match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Int, 16) => reader
                .into_samples::<i16>()
                .collect::<std::result::Result<Vec<_>, _>>(),
            (SampleFormat::Float, 32) => reader
                .into_samples::<f32>()
                .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * 32767.0) as i16))
                .collect::<std::result::Result<Vec<_>, _>>(),
            (format, bits) => {
                return Err(RecorderError::DeviceUnavailable(format!(
                    "{}: unsupported sample format {:?}/{} bits",
                    path.display(),
                    format,
                    bits
                )))
            }
        }
        .map_err(|e| RecorderError::file_read(path, e))?;

        let duration_seconds =
            samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// Convert to the requested layout.
    ///
    /// Channels: N -> 1 averages, 1 -> 2 duplicates, N -> 2 keeps the first pair.
    /// Rates: only integer-ratio downsampling (decimation) is supported.
    pub fn convert(&self, target_channels: u16, target_sample_rate: u32) -> Result<Vec<i16>> {
        if self.channels == 0 || target_channels == 0 {
            return Err(RecorderError::NoAudioTrack(format!(
                "{}: no channels",
                self.path
            )));
        }

        let step = if self.sample_rate == target_sample_rate {
            1
        } else if target_sample_rate > 0
            && self.sample_rate > target_sample_rate
            && self.sample_rate % target_sample_rate == 0
        {
            (self.sample_rate / target_sample_rate) as usize
        } else {
            return Err(RecorderError::DeviceUnavailable(format!(
                "{} is {}Hz; cannot convert to {}Hz",
                self.path, self.sample_rate, target_sample_rate
            )));
        };

        let src_channels = self.channels as usize;
        let mut out = Vec::with_capacity(
            self.samples.len() / src_channels / step * target_channels as usize,
        );

        for frame in self.samples.chunks_exact(src_channels).step_by(step) {
            match (src_channels, target_channels) {
                (n, t) if n == t as usize => out.extend_from_slice(frame),
                (_, 1) => {
                    let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                    out.push((sum / src_channels as i32) as i16);
                }
                (1, t) => out.extend(std::iter::repeat(frame[0]).take(t as usize)),
                (n, t) if n > t as usize => out.extend_from_slice(&frame[..t as usize]),
                (_, t) => {
                    // Pad missing channels with the last available one
                    let last = frame[src_channels - 1];
                    out.extend_from_slice(frame);
                    out.extend(std::iter::repeat(last).take(t as usize - src_channels));
                }
            }
        }

        Ok(out)
    }
}

/// Replays a WAV file as a live track
pub struct FileBackend {
    path: PathBuf,
    track: TrackKind,
    sample_rate: u32,
    buffer_frames: usize,
    realtime: bool,
    task: Option<JoinHandle<()>>,
}

impl FileBackend {
    pub fn new(
        path: PathBuf,
        track: TrackKind,
        sample_rate: u32,
        buffer_frames: usize,
        realtime: bool,
    ) -> Self {
        Self {
            path,
            track,
            sample_rate,
            buffer_frames: buffer_frames.max(1),
            realtime,
            task: None,
        }
    }
}

#[async_trait::async_trait]
impl AudioBackend for FileBackend {
    async fn start(&mut self, ended: TrackEndedNotifier) -> Result<mpsc::Receiver<Vec<u8>>> {
        if self.task.is_some() {
            return Err(RecorderError::DeviceUnavailable(format!(
                "{} source is already capturing",
                self.track
            )));
        }

        let path = self.path.clone();
        let audio = tokio::task::spawn_blocking(move || AudioFile::open(path))
            .await
            .map_err(|e| RecorderError::DeviceUnavailable(e.to_string()))??;

        let channels = self.track.channels();
        let samples = audio.convert(channels, self.sample_rate)?;
        if samples.is_empty() {
            return Err(RecorderError::NoAudioTrack(format!(
                "{} contains no audio frames",
                self.path.display()
            )));
        }

        let (tx, rx) = mpsc::channel(64);
        let samples_per_buffer = self.buffer_frames * channels as usize;
        let buffer_duration =
            Duration::from_secs_f64(self.buffer_frames as f64 / self.sample_rate as f64);
        let realtime = self.realtime;
        let track = self.track;

        self.task = Some(tokio::spawn(async move {
            let mut ticker = realtime.then(|| tokio::time::interval(buffer_duration));

            for buffer in samples.chunks(samples_per_buffer) {
                if let Some(ticker) = ticker.as_mut() {
                    ticker.tick().await;
                }
                let pcm: Vec<u8> = buffer.iter().flat_map(|s| s.to_le_bytes()).collect();
                if tx.send(pcm).await.is_err() {
                    return;
                }
            }

            debug!("{} source reached end of file", track);
            ended.notify();
        }));

        info!("{} capture started from {}", self.track, self.path.display());

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(task) = self.task.take() {
            task.abort();
            info!("{} capture stopped", self.track);
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn name(&self) -> &str {
        "WAV file"
    }
}

/// Maps tracks to WAV files.
///
/// The mic track uses `micDeviceId` from the recording config as its path when
/// set, falling back to `mic_source`.
#[derive(Debug, Clone, Default)]
pub struct FileBackendFactory {
    pub mic_source: Option<PathBuf>,
    pub system_source: Option<PathBuf>,
    pub buffer_frames: usize,
    pub realtime: bool,
}

impl FileBackendFactory {
    pub fn new(mic_source: Option<PathBuf>, system_source: Option<PathBuf>) -> Self {
        Self {
            mic_source,
            system_source,
            buffer_frames: DEFAULT_BUFFER_FRAMES,
            realtime: false,
        }
    }
}

impl AudioBackendFactory for FileBackendFactory {
    fn create(&self, track: TrackKind, config: &RecordingConfig) -> Result<Box<dyn AudioBackend>> {
        let path = match track {
            TrackKind::Mic => config
                .mic_device_id
                .as_ref()
                .map(PathBuf::from)
                .or_else(|| self.mic_source.clone()),
            TrackKind::System => self.system_source.clone(),
        }
        .ok_or_else(|| {
            RecorderError::DeviceUnavailable(format!("no source configured for {} track", track))
        })?;

        Ok(Box::new(FileBackend::new(
            path,
            track,
            config.sample_rate,
            self.buffer_frames,
            self.realtime,
        )))
    }
}
