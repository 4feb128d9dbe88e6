use std::{
    collections::HashMap,
    fs,
    io::Cursor,
    sync::{
        mpsc::{self, RecvTimeoutError},
        Arc,
    },
    thread,
    time::Duration,
};

use futures::channel::oneshot;
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};
use serde::Deserialize;

const WORKER_TICK: Duration = Duration::from_millis(250);
const MAX_TRACK_BYTES: u64 = 64 * 1024 * 1024;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("playback requires a user interaction first")]
    AutoplayBlocked,
    #[error("audio output unavailable: {0}")]
    OutputUnavailable(String),
    #[error("failed to fetch {locator}: {reason}")]
    Fetch { locator: String, reason: String },
    #[error("failed to decode {locator}: {reason}")]
    Decode { locator: String, reason: String },
    #[error("no track loaded")]
    NothingLoaded,
    #[error("audio worker is not running")]
    WorkerGone,
}

/// Resolves once the backend either started playback or refused to.
pub type PlayAttempt = oneshot::Receiver<Result<(), PlaybackError>>;

/// What caused a play request. Autoplay requests are subject to the
/// configured [`AutoplayPolicy`]; user requests always count as a gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayTrigger {
    Autoplay,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AutoplayPolicy {
    #[default]
    Allowed,
    RequireInteraction,
}

impl AutoplayPolicy {
    pub fn permits(self, trigger: PlayTrigger, unlocked: bool) -> bool {
        match self {
            AutoplayPolicy::Allowed => true,
            AutoplayPolicy::RequireInteraction => unlocked || trigger == PlayTrigger::User,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Timeline {
    pub position_secs: f64,
    pub end_secs: f64,
    pub can_seek: bool,
    /// Times playback stopped without being asked to (source ran out with
    /// looping off, or a loop restart failed). Only ever grows.
    pub interruptions: u64,
}

impl Timeline {
    pub fn duration_secs(&self) -> f64 {
        self.end_secs.max(0.0)
    }
}

/// Single audio output handle driven by the playback controller.
pub trait AudioBackend {
    /// Replaces the current source. Playback stops until the next `play`.
    fn load(&mut self, locator: &str);
    fn play(&mut self, trigger: PlayTrigger) -> PlayAttempt;
    fn pause(&mut self);
    fn set_volume(&mut self, volume: f32);
    fn set_looping(&mut self, looping: bool);
    fn seek(&mut self, position: Duration);
    /// Latest progress report, if any arrived since the previous call.
    fn poll_timeline(&mut self) -> Option<Timeline>;
}

/// Builds an attempt that has already resolved.
pub fn settled(result: Result<(), PlaybackError>) -> PlayAttempt {
    let (tx, rx) = oneshot::channel();
    let _ = tx.send(result);
    rx
}

enum AudioCommand {
    Load(String),
    Play {
        trigger: PlayTrigger,
        reply: oneshot::Sender<Result<(), PlaybackError>>,
    },
    Pause,
    SetVolume(f32),
    SetLooping(bool),
    Seek(Duration),
    Shutdown,
}

/// rodio-backed output. All blocking work (fetching, decoding, opening the
/// device) happens on a dedicated worker thread.
pub struct RodioBackend {
    command_tx: Option<mpsc::Sender<AudioCommand>>,
    timeline_rx: mpsc::Receiver<Timeline>,
}

impl RodioBackend {
    pub fn spawn(policy: AutoplayPolicy) -> std::io::Result<Self> {
        let (command_tx, command_rx) = mpsc::channel();
        let (timeline_tx, timeline_rx) = mpsc::channel();

        thread::Builder::new()
            .name("audio-worker".into())
            .spawn(move || AudioWorker::new(policy, timeline_tx).run(command_rx))?;

        Ok(Self {
            command_tx: Some(command_tx),
            timeline_rx,
        })
    }

    fn send(&mut self, command: AudioCommand) {
        let Some(tx) = self.command_tx.as_ref() else {
            return;
        };
        if tx.send(command).is_err() {
            tracing::error!("audio worker disconnected");
            self.command_tx = None;
        }
    }
}

impl AudioBackend for RodioBackend {
    fn load(&mut self, locator: &str) {
        self.send(AudioCommand::Load(locator.to_owned()));
    }

    fn play(&mut self, trigger: PlayTrigger) -> PlayAttempt {
        if self.command_tx.is_none() {
            return settled(Err(PlaybackError::WorkerGone));
        }
        let (reply, attempt) = oneshot::channel();
        // A dropped command also drops `reply`, which the controller reads as
        // a cancelled attempt.
        self.send(AudioCommand::Play { trigger, reply });
        attempt
    }

    fn pause(&mut self) {
        self.send(AudioCommand::Pause);
    }

    fn set_volume(&mut self, volume: f32) {
        self.send(AudioCommand::SetVolume(volume));
    }

    fn set_looping(&mut self, looping: bool) {
        self.send(AudioCommand::SetLooping(looping));
    }

    fn seek(&mut self, position: Duration) {
        self.send(AudioCommand::Seek(position));
    }

    fn poll_timeline(&mut self) -> Option<Timeline> {
        self.timeline_rx.try_iter().last()
    }
}

impl Drop for RodioBackend {
    fn drop(&mut self) {
        if let Some(tx) = self.command_tx.take() {
            let _ = tx.send(AudioCommand::Shutdown);
        }
    }
}

struct AudioWorker {
    policy: AutoplayPolicy,
    unlocked: bool,
    // Keeps the device open for as long as the sink lives.
    _stream: Option<OutputStream>,
    sink: Option<Sink>,
    locator: Option<String>,
    needs_source: bool,
    duration: Option<Duration>,
    cache: HashMap<String, Arc<[u8]>>,
    volume: f32,
    looping: bool,
    playing: bool,
    interruptions: u64,
    timeline_tx: mpsc::Sender<Timeline>,
    last_timeline: Option<Timeline>,
}

impl AudioWorker {
    fn new(policy: AutoplayPolicy, timeline_tx: mpsc::Sender<Timeline>) -> Self {
        Self {
            policy,
            unlocked: false,
            _stream: None,
            sink: None,
            locator: None,
            needs_source: false,
            duration: None,
            cache: HashMap::new(),
            volume: 1.0,
            looping: false,
            playing: false,
            interruptions: 0,
            timeline_tx,
            last_timeline: None,
        }
    }

    fn run(mut self, commands: mpsc::Receiver<AudioCommand>) {
        tracing::debug!(policy = ?self.policy, "audio worker started");
        loop {
            match commands.recv_timeout(WORKER_TICK) {
                Ok(AudioCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Ok(command) => self.handle(command),
                Err(RecvTimeoutError::Timeout) => {}
            }
            self.tick();
        }
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        tracing::debug!("audio worker stopped");
    }

    fn handle(&mut self, command: AudioCommand) {
        match command {
            AudioCommand::Load(locator) => {
                if let Some(sink) = self.sink.as_ref() {
                    sink.clear();
                }
                tracing::debug!(%locator, "source replaced");
                self.locator = Some(locator);
                self.needs_source = true;
                self.duration = None;
                self.playing = false;
            }
            AudioCommand::Play { trigger, reply } => {
                let result = if self.policy.permits(trigger, self.unlocked) {
                    self.start()
                } else {
                    Err(PlaybackError::AutoplayBlocked)
                };
                if result.is_ok() && trigger == PlayTrigger::User {
                    self.unlocked = true;
                }
                let _ = reply.send(result);
            }
            AudioCommand::Pause => {
                if let Some(sink) = self.sink.as_ref() {
                    sink.pause();
                }
                self.playing = false;
            }
            AudioCommand::SetVolume(volume) => {
                self.volume = volume;
                if let Some(sink) = self.sink.as_ref() {
                    sink.set_volume(volume);
                }
            }
            AudioCommand::SetLooping(looping) => self.looping = looping,
            AudioCommand::Seek(position) => {
                if let Some(sink) = self.sink.as_ref() {
                    if let Err(err) = sink.try_seek(position) {
                        tracing::warn!(?position, "seek failed: {err}");
                    }
                }
            }
            AudioCommand::Shutdown => {}
        }
    }

    fn start(&mut self) -> Result<(), PlaybackError> {
        let locator = self.locator.clone().ok_or(PlaybackError::NothingLoaded)?;

        let source = if self.needs_source {
            let bytes = self.load_bytes(&locator)?;
            Some(decode_source(&locator, bytes)?)
        } else {
            None
        };

        self.ensure_sink()?;
        let Some(sink) = self.sink.as_ref() else {
            return Err(PlaybackError::OutputUnavailable("sink missing".into()));
        };
        if let Some(source) = source {
            self.duration = source.total_duration();
            sink.clear();
            sink.append(source);
            self.needs_source = false;
        }
        sink.play();
        self.playing = true;
        tracing::info!(%locator, "playback started");
        Ok(())
    }

    fn ensure_sink(&mut self) -> Result<(), PlaybackError> {
        if self.sink.is_none() {
            let mut stream = OutputStreamBuilder::open_default_stream()
                .map_err(|err| PlaybackError::OutputUnavailable(err.to_string()))?;
            stream.log_on_drop(false);
            let sink = Sink::connect_new(stream.mixer());
            sink.set_volume(self.volume);
            self._stream = Some(stream);
            self.sink = Some(sink);
            tracing::debug!("audio output opened");
        }
        Ok(())
    }

    fn load_bytes(&mut self, locator: &str) -> Result<Arc<[u8]>, PlaybackError> {
        if let Some(bytes) = self.cache.get(locator) {
            return Ok(bytes.clone());
        }
        let bytes: Arc<[u8]> = read_locator(locator)?.into();
        self.cache.insert(locator.to_owned(), bytes.clone());
        Ok(bytes)
    }

    fn tick(&mut self) {
        let Some(sink) = self.sink.as_ref() else {
            return;
        };

        if self.playing && sink.empty() {
            if self.looping {
                self.needs_source = true;
                if let Err(err) = self.start() {
                    tracing::warn!("restarting loop failed: {err}");
                    self.playing = false;
                    self.interruptions += 1;
                }
            } else {
                self.playing = false;
                self.interruptions += 1;
            }
        }

        let Some(sink) = self.sink.as_ref() else {
            return;
        };
        let timeline = Timeline {
            position_secs: sink.get_pos().as_secs_f64(),
            end_secs: self.duration.map(|d| d.as_secs_f64()).unwrap_or(0.0),
            can_seek: self.duration.is_some(),
            interruptions: self.interruptions,
        };
        if self.last_timeline.as_ref() != Some(&timeline) {
            let _ = self.timeline_tx.send(timeline.clone());
            self.last_timeline = Some(timeline);
        }
    }
}

/// Reads a track from an `http(s)://` URL, a `file://` URL or a plain path.
pub fn read_locator(locator: &str) -> Result<Vec<u8>, PlaybackError> {
    let fetch_error = |reason: String| PlaybackError::Fetch {
        locator: locator.to_owned(),
        reason,
    };

    if locator.starts_with("http://") || locator.starts_with("https://") {
        let mut response = ureq::get(locator)
            .call()
            .map_err(|err| fetch_error(err.to_string()))?;
        response
            .body_mut()
            .with_config()
            .limit(MAX_TRACK_BYTES)
            .read_to_vec()
            .map_err(|err| fetch_error(err.to_string()))
    } else {
        let path = locator.strip_prefix("file://").unwrap_or(locator);
        fs::read(path).map_err(|err| fetch_error(err.to_string()))
    }
}

fn decode_source(
    locator: &str,
    bytes: Arc<[u8]>,
) -> Result<Decoder<Cursor<Arc<[u8]>>>, PlaybackError> {
    Decoder::new(Cursor::new(bytes)).map_err(|err| PlaybackError::Decode {
        locator: locator.to_owned(),
        reason: err.to_string(),
    })
}
