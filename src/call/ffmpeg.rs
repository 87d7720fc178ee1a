//! ffmpeg-based stream backend
//!
//! Each active chat gets one ffmpeg child that reads the media file in real
//! time (`-re`) and pushes FLV to the chat's RTMP ingest URL. Seeking and
//! resuming restart the child with `-ss`.
//!
//! A child that exits non-zero is a transport failure, not the end of the
//! track: `start` watches it for `start_grace_ms` before reporting success,
//! and `status` reports later failures as `StreamStatus::Failed`.

use super::{StreamBackend, StreamStatus};
use crate::config::StreamConfig;
use crate::media::MediaStream;
use crate::{Result, VcError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use teloxide::types::ChatId;
use tracing::{debug, info, warn};

const START_POLL: Duration = Duration::from_millis(50);

pub struct RtmpBackend {
    config: StreamConfig,
    children: Mutex<HashMap<ChatId, Child>>,
}

impl RtmpBackend {
    pub fn new(config: StreamConfig) -> Self {
        Self {
            config,
            children: Mutex::new(HashMap::new()),
        }
    }

    /// ffmpeg command line for a stream starting at `offset_secs`
    pub fn ffmpeg_args(&self, stream: &MediaStream, offset_secs: u64, url: &str) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-nostdin".into(),
            "-re".into(),
        ];

        if offset_secs > 0 {
            args.push("-ss".into());
            args.push(offset_secs.to_string());
        }

        args.push("-i".into());
        args.push(stream.path.to_string_lossy().into_owned());

        match stream.video {
            Some(video) => {
                args.extend([
                    "-c:v".into(),
                    "libx264".into(),
                    "-preset".into(),
                    "veryfast".into(),
                    "-vf".into(),
                    format!("scale=-2:{}", video.height()),
                    "-r".into(),
                    video.fps().to_string(),
                    "-b:v".into(),
                    self.config.video_bitrate.clone(),
                    "-g".into(),
                    (video.fps() * 2).to_string(),
                ]);
            }
            None => args.push("-vn".into()),
        }

        args.extend([
            "-c:a".into(),
            "aac".into(),
            "-ar".into(),
            stream.audio.sample_rate().to_string(),
            "-ac".into(),
            stream.audio.channels().to_string(),
            "-b:a".into(),
            self.config.audio_bitrate.clone(),
            "-f".into(),
            "flv".into(),
            url.to_string(),
        ]);

        args
    }

    fn reap(chat: ChatId, mut child: Child) {
        if let Err(e) = child.kill() {
            debug!("ffmpeg for chat {} already gone: {}", chat, e);
        }
        if let Err(e) = child.wait() {
            warn!("Failed to reap ffmpeg for chat {}: {}", chat, e);
        }
    }

    fn stderr_tail(child: &mut Child) -> String {
        let mut output = String::new();
        if let Some(mut stderr) = child.stderr.take() {
            let _ = stderr.read_to_string(&mut output);
        }
        output.trim().lines().last().unwrap_or_default().to_string()
    }

    fn exit_error(status: ExitStatus, child: &mut Child) -> VcError {
        VcError::TelegramServer(format!(
            "ffmpeg exited with {}: {}",
            status,
            Self::stderr_tail(child)
        ))
    }

    /// Watch a fresh child for the grace period. A clean exit is left for
    /// `status` to report as the end of the track.
    fn await_startup(&self, chat: ChatId, child: &mut Child) -> Result<()> {
        let deadline = Instant::now() + Duration::from_millis(self.config.start_grace_ms);
        loop {
            match child.try_wait() {
                Ok(Some(status)) if status.success() => return Ok(()),
                Ok(Some(status)) => return Err(Self::exit_error(status, child)),
                Ok(None) if Instant::now() >= deadline => return Ok(()),
                Ok(None) => thread::sleep(START_POLL),
                Err(e) => {
                    return Err(VcError::Stream(format!(
                        "failed to poll ffmpeg for chat {}: {}",
                        chat, e
                    )))
                }
            }
        }
    }
}

impl StreamBackend for RtmpBackend {
    fn start(&self, chat: ChatId, stream: &MediaStream, offset_secs: u64) -> Result<()> {
        let url = self.config.endpoint(chat).ok_or_else(|| {
            VcError::NoActiveCall(format!("no stream endpoint configured for chat {}", chat))
        })?;
        let args = self.ffmpeg_args(stream, offset_secs, url);

        if let Some(previous) = self.children.lock().remove(&chat) {
            Self::reap(chat, previous);
        }

        let mut child = Command::new(&self.config.ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| VcError::Stream(format!("failed to launch {}: {}", self.config.ffmpeg, e)))?;

        if let Err(e) = self.await_startup(chat, &mut child) {
            Self::reap(chat, child);
            return Err(e);
        }

        info!(
            "Streaming {} to chat {} from {}s",
            stream.path.display(),
            chat,
            offset_secs
        );
        if let Some(stale) = self.children.lock().insert(chat, child) {
            Self::reap(chat, stale);
        }
        Ok(())
    }

    fn stop(&self, chat: ChatId) -> Result<()> {
        if let Some(child) = self.children.lock().remove(&chat) {
            Self::reap(chat, child);
            info!("Stopped stream in chat {}", chat);
        }
        Ok(())
    }

    fn status(&self, chat: ChatId) -> StreamStatus {
        let mut children = self.children.lock();
        let Some(child) = children.get_mut(&chat) else {
            return StreamStatus::Running;
        };

        let status = match child.try_wait() {
            Ok(None) => return StreamStatus::Running,
            Ok(Some(status)) if status.success() => {
                debug!("Stream in chat {} reached its end", chat);
                StreamStatus::Ended
            }
            Ok(Some(status)) => {
                let error = Self::exit_error(status, child);
                warn!("Stream in chat {} failed: {}", chat, error);
                StreamStatus::Failed(error)
            }
            Err(e) => {
                warn!("Failed to poll ffmpeg for chat {}: {}", chat, e);
                StreamStatus::Failed(VcError::Stream(format!("failed to poll ffmpeg: {}", e)))
            }
        };
        children.remove(&chat);
        status
    }
}

impl Drop for RtmpBackend {
    fn drop(&mut self) {
        for (chat, child) in self.children.get_mut().drain() {
            Self::reap(chat, child);
        }
    }
}
