// Per-session track files
//
// Each live session owns one open file per declared track. Files carry a valid
// placeholder header from the moment they are created, so an interrupted
// recording is still a playable (if zero-length) WAV. Finalize rewrites the
// headers with the real sizes, closes every file, and only then renames the
// session directory to its timestamp name.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, error, info, warn};

use super::types::{RecordingConfig, RecordingMetadata, TrackInfo};
use crate::audio::{duration_ms, TrackKind, TrackSpec, WavHeader, MAX_DATA_SIZE, WAV_HEADER_SIZE};
use crate::error::{RecorderError, Result};

/// Name of the recordings directory under the data directory
pub const RECORDINGS_DIR: &str = "recordings";

/// Open WAV file for one track of a live session
#[derive(Debug)]
pub struct TrackFile {
    file: File,
    path: PathBuf,
    bytes_written: u64,
    chunks_written: u64,
    channels: u16,
}

/// What is left of a track once its file is closed
#[derive(Debug, Clone, Copy)]
struct ClosedTrack {
    bytes_written: u64,
    chunks_written: u64,
    channels: u16,
}

impl TrackFile {
    /// Create the file and write a placeholder header (data size 0)
    fn create(path: PathBuf, channels: u16, config: &RecordingConfig) -> Result<Self> {
        let mut file = File::create(&path).map_err(|e| RecorderError::file_write(&path, e))?;

        let header = WavHeader::new(config.sample_rate, channels, config.bit_depth, 0);
        file.write_all(&header.encode())
            .map_err(|e| RecorderError::file_write(&path, e))?;

        Ok(Self {
            file,
            path,
            bytes_written: 0,
            chunks_written: 0,
            channels,
        })
    }

    fn append(&mut self, pcm: &[u8]) -> Result<u64> {
        let new_total = self.bytes_written + pcm.len() as u64;
        if new_total > MAX_DATA_SIZE {
            return Err(RecorderError::file_write(
                &self.path,
                "track would exceed the 4 GiB WAV data limit",
            ));
        }

        if let Err(e) = self.file.write_all(pcm) {
            // Drop any partial write so the data chunk matches bytes_written
            let end = WAV_HEADER_SIZE as u64 + self.bytes_written;
            if let Err(rollback) = self
                .file
                .set_len(end)
                .and_then(|_| self.file.seek(SeekFrom::Start(end)).map(|_| ()))
            {
                warn!("Failed to roll back partial write to {:?}: {}", self.path, rollback);
            }
            return Err(RecorderError::file_write(&self.path, e));
        }

        self.bytes_written = new_total;
        self.chunks_written += 1;
        Ok(pcm.len() as u64)
    }

    /// Rewrite the header with the final data size and close the file
    fn finish(mut self, config: &RecordingConfig) -> Result<ClosedTrack> {
        let header = WavHeader::new(
            config.sample_rate,
            self.channels,
            config.bit_depth,
            self.bytes_written as u32,
        );

        self.file
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.file.write_all(&header.encode()))
            .and_then(|_| self.file.sync_all())
            .map_err(|e| RecorderError::file_write(&self.path, e))?;

        Ok(self.close())
    }

    /// Close without touching the header
    fn close(self) -> ClosedTrack {
        let closed = ClosedTrack {
            bytes_written: self.bytes_written,
            chunks_written: self.chunks_written,
            channels: self.channels,
        };
        drop(self.file);
        closed
    }
}

#[derive(Debug)]
struct SessionFiles {
    session_dir: PathBuf,
    tracks: BTreeMap<TrackKind, TrackFile>,
}

/// Owns the live-session registry and every open track file
#[derive(Debug)]
pub struct StorageEngine {
    recordings_dir: PathBuf,
    sessions: HashMap<String, SessionFiles>,
}

impl StorageEngine {
    pub fn new(recordings_dir: impl Into<PathBuf>) -> Self {
        Self {
            recordings_dir: recordings_dir.into(),
            sessions: HashMap::new(),
        }
    }

    /// Engine rooted at `<data_dir>/recordings`
    pub fn for_data_dir(data_dir: impl AsRef<Path>) -> Self {
        Self::new(data_dir.as_ref().join(RECORDINGS_DIR))
    }

    pub fn recordings_dir(&self) -> &Path {
        &self.recordings_dir
    }

    pub fn is_active(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub fn bytes_written(&self, session_id: &str, track: TrackKind) -> Option<u64> {
        self.sessions
            .get(session_id)?
            .tracks
            .get(&track)
            .map(|t| t.bytes_written)
    }

    /// Create the session directory and one placeholder WAV per track.
    ///
    /// Returns the session directory.
    pub fn start_session(
        &mut self,
        session_id: &str,
        config: &RecordingConfig,
        tracks: &[TrackSpec],
    ) -> Result<PathBuf> {
        validate_session_id(session_id)?;
        if self.sessions.contains_key(session_id) {
            return Err(RecorderError::SessionAlreadyExists(session_id.to_string()));
        }
        for spec in tracks {
            WavHeader::new(config.sample_rate, spec.channels, config.bit_depth, 0).validate()?;
        }

        let session_dir = self.recordings_dir.join(session_id);
        fs::create_dir_all(&session_dir).map_err(|e| RecorderError::file_write(&session_dir, e))?;

        let mut files = BTreeMap::new();
        for spec in tracks {
            if files.contains_key(&spec.track_kind) {
                warn!("Ignoring duplicate {} track in session {}", spec.track_kind, session_id);
                continue;
            }

            let path = session_dir.join(spec.track_kind.file_name());
            match TrackFile::create(path, spec.channels, config) {
                Ok(file) => {
                    files.insert(spec.track_kind, file);
                }
                Err(e) => {
                    for file in files.into_values() {
                        file.close();
                    }
                    if let Err(cleanup) = fs::remove_dir_all(&session_dir) {
                        warn!("Failed to remove {:?}: {}", session_dir, cleanup);
                    }
                    return Err(e);
                }
            }
        }

        info!(
            "Session {} started: {} track(s) in {:?}",
            session_id,
            files.len(),
            session_dir
        );

        self.sessions.insert(
            session_id.to_string(),
            SessionFiles {
                session_dir: session_dir.clone(),
                tracks: files,
            },
        );

        Ok(session_dir)
    }

    /// Append raw PCM to a track. Returns the number of bytes written.
    pub fn write_chunk(&mut self, session_id: &str, track: TrackKind, pcm: &[u8]) -> Result<u64> {
        let session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| RecorderError::SessionNotFound(session_id.to_string()))?;

        let file = session
            .tracks
            .get_mut(&track)
            .ok_or_else(|| RecorderError::TrackNotFound {
                session_id: session_id.to_string(),
                track,
            })?;

        let written = file.append(pcm)?;
        debug!(
            "Session {} {}: +{} bytes ({} total)",
            session_id, track, written, file.bytes_written
        );
        Ok(written)
    }

    /// Rewrite headers, close files, rename the directory, and describe the result
    pub fn finalize_recording(
        &mut self,
        session_id: &str,
        config: &RecordingConfig,
        total_chunks: &BTreeMap<TrackKind, u64>,
    ) -> Result<RecordingMetadata> {
        let SessionFiles {
            session_dir,
            tracks,
        } = self
            .sessions
            .remove(session_id)
            .ok_or_else(|| RecorderError::SessionNotFound(session_id.to_string()))?;

        // Every handle is closed here, including after a failed rewrite
        let mut closed = Vec::with_capacity(tracks.len());
        let mut failure = None;
        for (kind, file) in tracks {
            match file.finish(config) {
                Ok(track) => closed.push((kind, track)),
                Err(e) => {
                    error!("Failed to finalize {} track of {}: {}", kind, session_id, e);
                    failure.get_or_insert(e);
                }
            }
        }
        if let Some(e) = failure {
            return Err(e);
        }

        for (kind, track) in &closed {
            let expected = total_chunks.get(kind).copied().unwrap_or(0);
            if expected != track.chunks_written {
                warn!(
                    "Session {} {}: {} chunks reported, {} received",
                    session_id, kind, expected, track.chunks_written
                );
            }
        }

        let now = Utc::now();
        let (file_name, final_dir) = self.unique_timestamp_dir(now);
        fs::rename(&session_dir, &final_dir)
            .map_err(|e| RecorderError::file_write(&session_dir, e))?;

        let mut track_infos = Vec::with_capacity(closed.len());
        let mut total_size = 0u64;
        let mut longest: Option<ClosedTrack> = None;

        for (kind, track) in &closed {
            let path = final_dir.join(kind.file_name());
            let size = fs::metadata(&path)
                .map_err(|e| RecorderError::file_read(&path, e))?
                .len();
            total_size += size;

            track_infos.push(TrackInfo {
                track_kind: *kind,
                file_name: kind.file_name(),
                file_path: path.display().to_string(),
                channels: track.channels,
                file_size_bytes: size,
            });

            if longest.map_or(true, |l| track.bytes_written > l.bytes_written) {
                longest = Some(*track);
            }
        }

        let duration = longest.map_or(0, |t| {
            duration_ms(t.bytes_written, config.sample_rate, t.channels, config.bit_depth)
        });

        info!(
            "Session {} finalized as {} ({} ms, {} bytes)",
            session_id, file_name, duration, total_size
        );

        Ok(RecordingMetadata {
            id: session_id.to_string(),
            file_name,
            file_path: final_dir.display().to_string(),
            tracks: track_infos,
            created_at: now,
            duration_ms: duration,
            file_size_bytes: total_size,
            config: config.clone(),
        })
    }

    /// Close any open files and delete the session directory.
    ///
    /// Unknown sessions succeed; a leftover `recordings/<id>` directory from an
    /// earlier failed finalize is removed as well.
    pub fn cancel_session(&mut self, session_id: &str) -> Result<()> {
        let session_dir = match self.sessions.remove(session_id) {
            Some(session) => {
                for file in session.tracks.into_values() {
                    file.close();
                }
                Some(session.session_dir)
            }
            None => validate_session_id(session_id)
                .ok()
                .map(|_| self.recordings_dir.join(session_id))
                .filter(|dir| dir.is_dir()),
        };

        if let Some(dir) = session_dir {
            if dir.exists() {
                fs::remove_dir_all(&dir).map_err(|e| RecorderError::file_write(&dir, e))?;
            }
            info!("Session {} cancelled", session_id);
        } else {
            debug!("Cancel for unknown session {}", session_id);
        }

        Ok(())
    }

    fn unique_timestamp_dir(&self, now: DateTime<Utc>) -> (String, PathBuf) {
        let base = timestamp_dir_name(now);
        let mut name = base.clone();
        let mut suffix = 1;
        while self.recordings_dir.join(&name).exists() {
            name = format!("{}-{}", base, suffix);
            suffix += 1;
        }
        let path = self.recordings_dir.join(&name);
        (name, path)
    }
}

/// ISO-8601 UTC timestamp, whole seconds, with ':' replaced by '-'
pub fn timestamp_dir_name(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H-%M-%S").to_string()
}

/// A session id must be a single plain path component
fn validate_session_id(session_id: &str) -> Result<()> {
    let mut components = Path::new(session_id).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) if name == session_id => Ok(()),
        _ => Err(RecorderError::InvalidSessionId(session_id.to_string())),
    }
}
