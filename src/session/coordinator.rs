//! Session coordinator: the state machine orchestrating capture
//! acquisition, audio mixing, the recorder and the two tick timers across
//! one recording session's lifecycle.
//!
//! The coordinator runs as a task owning all mutable session state and
//! consuming a single command queue. User commands, timer ticks,
//! acquisition completions and stream-ended notifications all arrive on
//! that one queue, so no two transitions ever interleave.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::settings::{RecordingSettings, SettingsUpdate};
use super::state::{SessionEvent, SessionSnapshot, SessionState};
use crate::audio::{build_mixed_stream, MixerSettings};
use crate::capture::{CaptureBackend, CaptureError, MicStream, ScreenStream, StreamGuard};
use crate::recorder::{
    ChunkedRecorder, ContainerEncoder, Recording, RecorderConfig, RecorderHandle,
};
use crate::timer::Ticker;

/// Runtime tuning for one coordinator
#[derive(Clone)]
pub struct CoordinatorConfig {
    /// Period of the countdown and elapsed-clock tickers
    pub tick_period: Duration,
    pub recorder: RecorderConfig,
    /// Running inside a restrictive embedding context; affects error
    /// messaging only, never the state machine.
    pub embedded_context: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_secs(1),
            recorder: RecorderConfig::default(),
            embedded_context: false,
        }
    }
}

/// Creates one container encoder per recording attempt
pub trait EncoderFactory: Send + Sync {
    fn create(&self) -> Box<dyn ContainerEncoder>;
}

impl<F> EncoderFactory for F
where
    F: Fn() -> Box<dyn ContainerEncoder> + Send + Sync,
{
    fn create(&self) -> Box<dyn ContainerEncoder> {
        self()
    }
}

type AcquisitionOutcome = Result<(ScreenStream, Option<MicStream>), CaptureError>;

enum Command {
    Start(oneshot::Sender<SessionSnapshot>),
    Pause(oneshot::Sender<SessionSnapshot>),
    Resume(oneshot::Sender<SessionSnapshot>),
    Stop(oneshot::Sender<SessionSnapshot>),
    Reset(oneshot::Sender<SessionSnapshot>),
    UpdateSettings(SettingsUpdate, oneshot::Sender<SessionSnapshot>),
    Snapshot(oneshot::Sender<SessionSnapshot>),
    GetRecording(oneshot::Sender<Option<Recording>>),
    CountdownTick,
    ElapsedTick,
    AcquisitionReady(Box<AcquisitionOutcome>),
    StreamEnded,
}

/// Cloneable handle for issuing commands to a running coordinator
#[derive(Clone)]
pub struct SessionHandle {
    cmd_tx: mpsc::Sender<Command>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    pub async fn start(&self) -> Result<SessionSnapshot> {
        self.request(Command::Start).await
    }

    pub async fn pause(&self) -> Result<SessionSnapshot> {
        self.request(Command::Pause).await
    }

    pub async fn resume(&self) -> Result<SessionSnapshot> {
        self.request(Command::Resume).await
    }

    pub async fn stop(&self) -> Result<SessionSnapshot> {
        self.request(Command::Stop).await
    }

    pub async fn reset(&self) -> Result<SessionSnapshot> {
        self.request(Command::Reset).await
    }

    pub async fn update_settings(&self, update: SettingsUpdate) -> Result<SessionSnapshot> {
        self.request(|reply| Command::UpdateSettings(update, reply))
            .await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        self.request(Command::Snapshot).await
    }

    /// Clone of the finished recording, if the session is stopped.
    pub async fn recording(&self) -> Result<Option<Recording>> {
        self.request(Command::GetRecording).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    async fn request<T, F>(&self, make: F) -> Result<T>
    where
        F: FnOnce(oneshot::Sender<T>) -> Command,
    {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(tx))
            .await
            .map_err(|_| anyhow!("session coordinator is gone"))?;
        rx.await.map_err(|_| anyhow!("session coordinator is gone"))
    }
}

/// The session coordinator actor
pub struct SessionCoordinator {
    config: CoordinatorConfig,
    backend: Arc<dyn CaptureBackend>,
    encoder_factory: Arc<dyn EncoderFactory>,

    state: SessionState,
    settings: RecordingSettings,
    countdown_remaining: u32,
    elapsed_secs: u64,
    last_error: Option<String>,
    result: Option<Recording>,
    started_at: Option<DateTime<Utc>>,

    countdown_ticker: Ticker<Command>,
    elapsed_ticker: Ticker<Command>,

    /// An acquisition task is in flight
    acquiring: bool,
    /// Stop/reset arrived while acquiring; discard resources on resolve
    discard_acquisition: bool,

    stream_guard: Option<StreamGuard>,
    recorder: Option<RecorderHandle>,
    ended_watcher: Option<JoinHandle<()>>,

    cmd_tx: mpsc::Sender<Command>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionCoordinator {
    /// Spawn the coordinator task and return its command handle.
    pub fn spawn(
        backend: Arc<dyn CaptureBackend>,
        encoder_factory: Arc<dyn EncoderFactory>,
        settings: RecordingSettings,
        config: CoordinatorConfig,
    ) -> SessionHandle {
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let (events, _) = broadcast::channel(64);

        let coordinator = Self {
            countdown_ticker: Ticker::new(config.tick_period),
            elapsed_ticker: Ticker::new(config.tick_period),
            config,
            backend,
            encoder_factory,
            state: SessionState::Idle,
            settings,
            countdown_remaining: 0,
            elapsed_secs: 0,
            last_error: None,
            result: None,
            started_at: None,
            acquiring: false,
            discard_acquisition: false,
            stream_guard: None,
            recorder: None,
            ended_watcher: None,
            cmd_tx: cmd_tx.clone(),
            events: events.clone(),
        };
        tokio::spawn(coordinator.run(cmd_rx));

        SessionHandle { cmd_tx, events }
    }

    async fn run(mut self, mut cmd_rx: mpsc::Receiver<Command>) {
        info!("Session coordinator started (embedded: {})", self.config.embedded_context);

        while let Some(cmd) = cmd_rx.recv().await {
            match cmd {
                Command::Start(reply) => {
                    self.handle_start();
                    let _ = reply.send(self.snapshot());
                }
                Command::Pause(reply) => {
                    self.handle_pause().await;
                    let _ = reply.send(self.snapshot());
                }
                Command::Resume(reply) => {
                    self.handle_resume().await;
                    let _ = reply.send(self.snapshot());
                }
                Command::Stop(reply) => {
                    self.handle_stop().await;
                    let _ = reply.send(self.snapshot());
                }
                Command::Reset(reply) => {
                    self.handle_reset();
                    let _ = reply.send(self.snapshot());
                }
                Command::UpdateSettings(update, reply) => {
                    self.handle_update_settings(update);
                    let _ = reply.send(self.snapshot());
                }
                Command::Snapshot(reply) => {
                    let _ = reply.send(self.snapshot());
                }
                Command::GetRecording(reply) => {
                    let _ = reply.send(self.result.clone());
                }
                Command::CountdownTick => self.handle_countdown_tick(),
                Command::ElapsedTick => self.handle_elapsed_tick(),
                Command::AcquisitionReady(outcome) => self.handle_acquisition_ready(*outcome),
                Command::StreamEnded => {
                    if matches!(self.state, SessionState::Recording | SessionState::Paused) {
                        info!("Screen capture ended externally; stopping session");
                        self.handle_stop().await;
                    }
                }
            }
        }

        // Queue closed: tear down whatever is still held
        self.release_resources();
        debug!("Session coordinator shut down");
    }

    fn handle_start(&mut self) {
        if self.state != SessionState::Idle || self.acquiring {
            debug!("Ignoring start in state {:?}", self.state);
            return;
        }

        self.last_error = None;
        self.result = None;

        if self.settings.countdown_secs > 0 {
            self.countdown_remaining = self.settings.countdown_secs;
            self.state = SessionState::CountingDown;
            let tx = self.cmd_tx.clone();
            self.countdown_ticker.start(tx, || Command::CountdownTick);
            info!("Countdown started: {}s", self.countdown_remaining);
        } else {
            self.begin_acquisition();
        }
    }

    fn handle_countdown_tick(&mut self) {
        if self.state != SessionState::CountingDown {
            // Stale tick queued before cancellation
            return;
        }

        self.countdown_remaining = self.countdown_remaining.saturating_sub(1);
        self.emit(SessionEvent::CountdownTick {
            remaining: self.countdown_remaining,
        });

        if self.countdown_remaining == 0 {
            self.countdown_ticker.stop();
            self.state = SessionState::Idle;
            self.begin_acquisition();
        }
    }

    fn handle_elapsed_tick(&mut self) {
        if self.state == SessionState::Recording {
            self.elapsed_secs += 1;
        }
    }

    /// Launch stream acquisition off the actor loop. The outcome comes back
    /// through the command queue, so any stop issued meanwhile is recorded
    /// first and honored when the acquisition resolves.
    fn begin_acquisition(&mut self) {
        self.acquiring = true;
        self.discard_acquisition = false;

        let backend = Arc::clone(&self.backend);
        let constraints = self.settings.video_quality.constraints();
        let want_system = self.settings.audio_source.wants_system();
        let want_mic = self.settings.audio_source.wants_microphone();
        let tx = self.cmd_tx.clone();

        tokio::spawn(async move {
            let outcome: AcquisitionOutcome = async {
                let screen = backend.acquire_screen(constraints, want_system).await?;
                let mic = if want_mic {
                    match backend.acquire_microphone().await {
                        Ok(stream) => Some(stream),
                        Err(e) => {
                            // Audio degrades gracefully; video failure aborts
                            warn!("Microphone access failed: {e}");
                            None
                        }
                    }
                } else {
                    None
                };
                Ok((screen, mic))
            }
            .await;
            let _ = tx.send(Command::AcquisitionReady(Box::new(outcome))).await;
        });
    }

    fn handle_acquisition_ready(&mut self, outcome: AcquisitionOutcome) {
        self.acquiring = false;

        if self.discard_acquisition {
            self.discard_acquisition = false;
            if let Ok((screen, mic)) = outcome {
                info!("Discarding acquired streams: session was stopped while acquiring");
                screen.release();
                if let Some(m) = mic {
                    m.release();
                }
            }
            self.state = SessionState::Idle;
            return;
        }

        let (screen, mic) = match outcome {
            Ok(streams) => streams,
            Err(e) => {
                let message = self.capture_error_message(&e);
                warn!("Recording start failed: {e}");
                self.last_error = Some(message.clone());
                self.state = SessionState::Idle;
                self.emit(SessionEvent::Failed { message });
                return;
            }
        };

        let mixer_settings = MixerSettings::new(
            self.settings.audio_source,
            self.settings.microphone_volume,
            self.settings.system_volume,
        );
        let composite = build_mixed_stream(screen, mic, &mixer_settings);
        let (feed, guard) = composite.split();

        let recorder = ChunkedRecorder::start(
            feed,
            self.encoder_factory.create(),
            self.config.recorder.clone(),
        );

        // One ended-subscription per acquired stream, dropped on release
        let mut ended = guard.ended_signal();
        let tx = self.cmd_tx.clone();
        self.ended_watcher = Some(tokio::spawn(async move {
            loop {
                if ended.changed().await.is_err() {
                    break;
                }
                if *ended.borrow() {
                    let _ = tx.send(Command::StreamEnded).await;
                    break;
                }
            }
        }));

        self.stream_guard = Some(guard);
        self.recorder = Some(recorder);
        self.elapsed_secs = 0;
        self.started_at = Some(Utc::now());
        self.state = SessionState::Recording;
        let tx = self.cmd_tx.clone();
        self.elapsed_ticker.start(tx, || Command::ElapsedTick);
        self.emit(SessionEvent::Started);
        info!("Recording started");
    }

    async fn handle_pause(&mut self) {
        if self.state != SessionState::Recording {
            debug!("Ignoring pause in state {:?}", self.state);
            return;
        }
        let Some(recorder) = self.recorder.as_ref() else {
            return;
        };
        if let Err(e) = recorder.pause().await {
            self.fail_session(format!("Recorder failed: {e}"));
            return;
        }
        self.elapsed_ticker.stop();
        self.state = SessionState::Paused;
        self.emit(SessionEvent::Paused);
        info!("Recording paused at {}s", self.elapsed_secs);
    }

    async fn handle_resume(&mut self) {
        if self.state != SessionState::Paused {
            debug!("Ignoring resume in state {:?}", self.state);
            return;
        }
        let Some(recorder) = self.recorder.as_ref() else {
            return;
        };
        if let Err(e) = recorder.resume().await {
            self.fail_session(format!("Recorder failed: {e}"));
            return;
        }
        let tx = self.cmd_tx.clone();
        self.elapsed_ticker.start(tx, || Command::ElapsedTick);
        self.state = SessionState::Recording;
        self.emit(SessionEvent::Resumed);
        info!("Recording resumed at {}s", self.elapsed_secs);
    }

    /// Stop is safe from any state, including mid-countdown and
    /// mid-acquisition, and leaves no dangling platform resource.
    async fn handle_stop(&mut self) {
        match self.state {
            SessionState::CountingDown => {
                self.countdown_ticker.stop();
                self.countdown_remaining = 0;
                self.state = SessionState::Idle;
                info!("Countdown cancelled");
            }
            SessionState::Idle => {
                if self.acquiring {
                    self.discard_acquisition = true;
                    info!("Stop recorded while acquisition pending");
                }
            }
            SessionState::Recording | SessionState::Paused => {
                self.finish_recording().await;
            }
            SessionState::Stopped => {}
        }
    }

    async fn finish_recording(&mut self) {
        self.elapsed_ticker.stop();

        let recorder = self.recorder.take();
        let result = match recorder {
            Some(handle) => handle.stop().await,
            None => Err(crate::recorder::RecorderError::NotRunning),
        };

        // Resource release is atomic with leaving Recording/Paused
        self.release_resources();

        match result {
            Ok(recording) => {
                info!(
                    "Recording stopped: {}ms across {} chunks",
                    recording.duration_ms, recording.chunk_count
                );
                self.result = Some(recording);
                self.state = SessionState::Stopped;
                self.emit(SessionEvent::Stopped);
            }
            Err(e) => {
                self.fail_session(format!("Recorder failed: {e}"));
            }
        }
    }

    fn handle_reset(&mut self) {
        if self.acquiring {
            self.discard_acquisition = true;
        }
        self.countdown_ticker.stop();
        self.elapsed_ticker.stop();
        // Dropping the handle tells a live recorder task to discard its buffer
        self.recorder = None;
        self.release_resources();

        self.state = SessionState::Idle;
        self.countdown_remaining = 0;
        self.elapsed_secs = 0;
        self.last_error = None;
        self.result = None;
        self.started_at = None;
        self.emit(SessionEvent::Reset);
        info!("Session reset");
    }

    fn handle_update_settings(&mut self, update: SettingsUpdate) {
        if self.state != SessionState::Idle || self.acquiring {
            warn!("Settings update rejected in state {:?}", self.state);
            return;
        }
        self.settings.apply(&update);
        debug!("Settings updated: {:?}", self.settings);
    }

    fn fail_session(&mut self, message: String) {
        warn!("{message}");
        self.elapsed_ticker.stop();
        self.countdown_ticker.stop();
        self.recorder = None;
        self.release_resources();
        self.last_error = Some(message.clone());
        self.state = SessionState::Idle;
        self.emit(SessionEvent::Failed { message });
    }

    fn release_resources(&mut self) {
        if let Some(mut guard) = self.stream_guard.take() {
            guard.release();
        }
        if let Some(watcher) = self.ended_watcher.take() {
            watcher.abort();
        }
    }

    fn capture_error_message(&self, error: &CaptureError) -> String {
        match error {
            CaptureError::PolicyRestricted if self.config.embedded_context => {
                "Screen capture is blocked in this embedded preview. Open the recorder in a top-level window.".to_string()
            }
            _ => "Failed to start recording. Please check capture permissions and try again."
                .to_string(),
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            elapsed_secs: self.elapsed_secs,
            countdown_remaining: self.countdown_remaining,
            is_counting_down: self.state == SessionState::CountingDown,
            settings: self.settings,
            last_error: self.last_error.clone(),
            recording: self.result.as_ref().map(|r| r.info()),
            embedded_context: self.config.embedded_context,
            started_at: self.started_at,
        }
    }
}
