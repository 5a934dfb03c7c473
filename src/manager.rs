//! The session lifecycle: connect, live session, teardown and reconnect.

use std::cell::Cell;
use std::fmt;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use futures::future::BoxFuture;
use secrecy::SecretString;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use crate::callbacks::SessionCallbacks;
use crate::config::Config;
use crate::diagnostics::{analyze, log_stats, ConnectionStats, QualityIssue, StatsPoller};
use crate::error::{Result, SessionError};
use crate::media::{AudioOutput, AudioSource, MediaDevices, NullOutput, Playback};
use crate::negotiator::{HttpNegotiator, NegotiationRequest, Negotiator};
use crate::notify::{Notice, Notifier, TracingNotifier};
use crate::router::{ConversationHistory, EventRouter, RouterOutput};
use crate::settings::{SettingsSource, SettingsStore};
use crate::transport::{
    ConnectionState, IceConfig, SideChannel, Transport, TransportEvent, TransportEvents, TransportFactory,
};
use crate::types::{ClientEvent, ConversationTurn, SessionConfig};

const API_KEY_MISSING: &str = "OpenAI API key not found in environment variables";

thread_local! {
    static DISPATCHING: Cell<bool> = const { Cell::new(false) };
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SessionState {
    #[default]
    Idle,
    Connecting,
    Connected,
    Disconnecting,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Disconnecting => "disconnecting",
        };
        f.write_str(s)
    }
}

/// What a UI needs to render the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: SessionState,
    /// Speech is flowing in either direction. Only meaningful while connected.
    pub streaming: bool,
}

impl SessionStatus {
    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }
}

pub struct SessionManagerBuilder {
    config: Config,
    settings: Option<Arc<dyn SettingsSource>>,
    media: Option<Arc<dyn MediaDevices>>,
    transports: Option<Arc<dyn TransportFactory>>,
    negotiator: Option<Arc<dyn Negotiator>>,
    output: Arc<dyn AudioOutput>,
    notifier: Arc<dyn Notifier>,
    callbacks: SessionCallbacks,
}

impl SessionManagerBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            settings: None,
            media: None,
            transports: None,
            negotiator: None,
            output: Arc::new(NullOutput),
            notifier: Arc::new(TracingNotifier),
            callbacks: SessionCallbacks::default(),
        }
    }

    pub fn with_settings(mut self, settings: Arc<dyn SettingsSource>) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn with_media(mut self, media: Arc<dyn MediaDevices>) -> Self {
        self.media = Some(media);
        self
    }

    pub fn with_transport(mut self, transports: Arc<dyn TransportFactory>) -> Self {
        self.transports = Some(transports);
        self
    }

    pub fn with_negotiator(mut self, negotiator: Arc<dyn Negotiator>) -> Self {
        self.negotiator = Some(negotiator);
        self
    }

    pub fn with_output(mut self, output: Arc<dyn AudioOutput>) -> Self {
        self.output = output;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_callbacks(mut self, callbacks: SessionCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn build(self) -> Result<SessionManager> {
        let media = match self.media {
            Some(media) => media,
            None => default_media()?,
        };
        let transports = match self.transports {
            Some(transports) => transports,
            None => default_transport()?,
        };
        let negotiator = self
            .negotiator
            .unwrap_or_else(|| Arc::new(HttpNegotiator::new(self.config.base_url())));
        let settings = self
            .settings
            .unwrap_or_else(|| Arc::new(SettingsStore::default()));
        let (status, _) = watch::channel(SessionStatus::default());

        Ok(SessionManager {
            inner: Arc::new(Inner {
                config: self.config,
                settings,
                media,
                transports,
                negotiator,
                output: self.output,
                notifier: self.notifier,
                callbacks: self.callbacks,
                history: ConversationHistory::new(),
                generation: AtomicU64::new(0),
                slot: Mutex::new(Slot::default()),
                dispatch: Mutex::new(()),
                status,
            }),
        })
    }
}

#[cfg(feature = "utils")]
fn default_media() -> Result<Arc<dyn MediaDevices>> {
    Ok(Arc::new(crate::media::NativeMediaDevices::default()))
}

#[cfg(not(feature = "utils"))]
fn default_media() -> Result<Arc<dyn MediaDevices>> {
    Err(SessionError::configuration("No media devices configured"))
}

#[cfg(feature = "webrtc")]
fn default_transport() -> Result<Arc<dyn TransportFactory>> {
    Ok(Arc::new(crate::transport::webrtc::WebRtcTransportFactory))
}

#[cfg(not(feature = "webrtc"))]
fn default_transport() -> Result<Arc<dyn TransportFactory>> {
    Err(SessionError::configuration("No transport configured"))
}

/// Owns at most one live voice session.
///
/// Dropping the manager disconnects it.
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn builder(config: Config) -> SessionManagerBuilder {
        SessionManagerBuilder::new(config)
    }

    /// Starts a session, or ends the current one if a session is already
    /// connecting or connected.
    pub async fn connect(&self) -> Result<()> {
        self.inner.connect().await
    }

    /// Ends the session and releases every resource it holds. Safe to call in
    /// any state.
    pub fn disconnect(&self) {
        self.inner.disconnect();
    }

    pub fn status(&self) -> SessionStatus {
        *self.inner.status.borrow()
    }

    pub fn state(&self) -> SessionState {
        self.status().state
    }

    pub fn is_connected(&self) -> bool {
        self.status().is_connected()
    }

    pub fn is_streaming(&self) -> bool {
        self.status().is_streaming()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.inner.status.subscribe()
    }

    pub fn history(&self) -> Vec<ConversationTurn> {
        self.inner.history.snapshot()
    }

    /// Current transport statistics, if a transport exists.
    pub async fn stats(&self) -> Option<ConnectionStats> {
        let (_, transport) = self.inner.current_transport()?;
        Some(transport.stats().await)
    }

    /// Checks connection quality once per session. Returns `None` when there
    /// is no session or it has already been checked.
    pub async fn run_diagnostics(&self) -> Option<Vec<QualityIssue>> {
        let (attempt, transport) = self.inner.current_transport()?;
        let stats = transport.stats().await;
        log_stats(&stats);
        self.inner.diagnose(attempt, &stats)
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.inner.disconnect();
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

struct Inner {
    config: Config,
    settings: Arc<dyn SettingsSource>,
    media: Arc<dyn MediaDevices>,
    transports: Arc<dyn TransportFactory>,
    negotiator: Arc<dyn Negotiator>,
    output: Arc<dyn AudioOutput>,
    notifier: Arc<dyn Notifier>,
    callbacks: SessionCallbacks,
    history: ConversationHistory,
    /// Bumped by every connect and disconnect. An attempt is current while the
    /// counter still equals the value its connect produced.
    generation: AtomicU64,
    slot: Mutex<Slot>,
    /// Held while an attempt's callbacks run. Taken before `slot` when both
    /// are needed.
    dispatch: Mutex<()>,
    status: watch::Sender<SessionStatus>,
}

/// Proof that the attempt was current when its callbacks started. Callbacks
/// run on this thread may call `disconnect` without waiting on themselves.
struct Dispatch<'a> {
    _gate: MutexGuard<'a, ()>,
}

impl Drop for Dispatch<'_> {
    fn drop(&mut self) {
        DISPATCHING.with(|d| d.set(false));
    }
}

#[derive(Default)]
struct Slot {
    state: SessionState,
    streaming: bool,
    session: Option<Session>,
}

/// Resources of one attempt, stored as soon as they are acquired.
struct Session {
    attempt: u64,
    source: Option<Box<dyn AudioSource>>,
    transport: Option<Arc<dyn Transport>>,
    channel: Option<Arc<dyn SideChannel>>,
    playback: Option<Box<dyn Playback>>,
    tasks: Vec<JoinHandle<()>>,
    poller: Option<StatsPoller>,
    connected: bool,
    diagnosed: bool,
}

enum Resource {
    Source(Box<dyn AudioSource>),
    Transport(Arc<dyn Transport>),
    Channel(Arc<dyn SideChannel>),
    Playback(Box<dyn Playback>),
    Task(JoinHandle<()>),
}

impl Resource {
    fn release(self) {
        match self {
            Resource::Source(source) => source.stop(),
            Resource::Transport(transport) => transport.close(),
            Resource::Channel(channel) => channel.close(),
            Resource::Playback(mut playback) => playback.stop(),
            Resource::Task(task) => task.abort(),
        }
    }
}

impl Session {
    fn new(attempt: u64) -> Self {
        Self {
            attempt,
            source: None,
            transport: None,
            channel: None,
            playback: None,
            tasks: Vec::new(),
            poller: None,
            connected: false,
            diagnosed: false,
        }
    }

    fn hold(&mut self, resource: Resource) {
        match resource {
            Resource::Source(source) => self.source = Some(source),
            Resource::Transport(transport) => self.transport = Some(transport),
            Resource::Channel(channel) => self.channel = Some(channel),
            Resource::Playback(playback) => {
                if let Some(mut previous) = self.playback.replace(playback) {
                    previous.stop();
                }
            }
            Resource::Task(task) => self.tasks.push(task),
        }
    }

    /// Tasks go first so nothing observes the half-released session.
    fn release(mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.poller = None;
        if let Some(mut playback) = self.playback.take() {
            playback.stop();
        }
        if let Some(channel) = self.channel.take() {
            channel.close();
        }
        if let Some(transport) = self.transport.take() {
            transport.close();
        }
        if let Some(source) = self.source.take() {
            source.stop();
            tracing::debug!(device = source.label(), "audio source released");
        }
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn is_current(&self, attempt: u64) -> bool {
        self.generation() == attempt
    }

    /// Enters the dispatch gate if `attempt` is still current.
    fn dispatch(&self, attempt: u64) -> Option<Dispatch<'_>> {
        let gate = self.dispatch.lock().unwrap_or_else(|e| e.into_inner());
        if !self.is_current(attempt) {
            return None;
        }
        DISPATCHING.with(|d| d.set(true));
        Some(Dispatch { _gate: gate })
    }

    /// Waits for callbacks already running on other threads.
    fn drain_dispatch(&self) {
        if !DISPATCHING.with(Cell::get) {
            drop(self.dispatch.lock().unwrap_or_else(|e| e.into_inner()));
        }
    }

    fn publish(&self, slot: &Slot) {
        self.status.send_replace(SessionStatus {
            state: slot.state,
            streaming: slot.streaming,
        });
    }

    fn report(&self, err: &SessionError) {
        tracing::error!("{}: {}", err.title(), err);
        let message = err.to_string();
        self.notifier.notify(Notice::destructive(err.title(), &message));
        self.callbacks.error(&message);
    }

    /// Named return type so the reconnect task does not make `connect`'s
    /// future type recursive.
    fn connect_boxed(self: Arc<Self>) -> BoxFuture<'static, Result<()>> {
        Box::pin(async move { self.connect().await })
    }

    async fn connect(self: &Arc<Self>) -> Result<()> {
        let (attempt, api_key, config) = {
            let mut slot = self.lock();
            if slot.state != SessionState::Idle {
                drop(slot);
                tracing::debug!("connect requested while active, disconnecting");
                self.disconnect();
                return Ok(());
            }
            let Some(api_key) = self.config.api_key().cloned() else {
                drop(slot);
                let err = SessionError::configuration(API_KEY_MISSING);
                self.report(&err);
                return Err(err);
            };
            let config = self.settings.current();
            let attempt = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            slot.state = SessionState::Connecting;
            slot.streaming = false;
            slot.session = Some(Session::new(attempt));
            self.publish(&slot);
            (attempt, api_key, config)
        };

        tracing::info!(attempt, voice = %config.voice, model = %config.model, "connecting");
        match self.establish(attempt, api_key, config).await {
            Ok(()) => Ok(()),
            Err(SessionError::Superseded) => {
                tracing::info!(attempt, "connection attempt superseded");
                Err(SessionError::Superseded)
            }
            Err(err) => {
                if let Some(dispatch) = self.dispatch(attempt) {
                    self.report(&err);
                    drop(dispatch);
                    self.disconnect();
                }
                Err(err)
            }
        }
    }

    async fn establish(self: &Arc<Self>, attempt: u64, api_key: SecretString, config: SessionConfig) -> Result<()> {
        let source = self.media.acquire_audio().await?;
        let frames = source.take_frames();
        tracing::info!(attempt, device = source.label(), "microphone acquired");
        self.install(attempt, Resource::Source(source))?;

        let ice = IceConfig {
            servers: self.config.ice_servers().to_vec(),
            candidate_pool_size: self.config.ice_candidate_pool_size(),
        };
        let transport = self.transports.create(&ice).await?;
        self.install(attempt, Resource::Transport(transport.clone()))?;
        let events = transport
            .take_events()
            .ok_or_else(|| SessionError::transport("Transport events already taken"))?;

        match frames {
            Some(frames) => transport.add_audio_track(frames).await?,
            None => tracing::warn!(attempt, "audio source has no outbound frames"),
        }
        let channel = transport
            .create_side_channel(self.config.data_channel_label())
            .await?;
        self.install(attempt, Resource::Channel(channel.clone()))?;

        let task = tokio::spawn(event_loop(
            Arc::downgrade(self),
            attempt,
            config.clone(),
            events,
            channel,
            transport.clone(),
        ));
        self.install(attempt, Resource::Task(task))?;

        let offer = transport.create_offer().await.map_err(|e| match e {
            SessionError::OfferCreation(_) | SessionError::Superseded => e,
            other => SessionError::OfferCreation(other.to_string()),
        })?;
        self.ensure_current(attempt)?;

        let request = NegotiationRequest {
            api_key,
            config,
            history: self.history.snapshot(),
        };
        let answer = self.negotiator.negotiate(&offer, &request).await?;
        // A disconnect during the request makes the answer stale.
        self.ensure_current(attempt)?;

        transport.apply_answer(&answer).await?;
        self.finish_connect(attempt, &transport)
    }

    fn ensure_current(&self, attempt: u64) -> Result<()> {
        if self.is_current(attempt) {
            Ok(())
        } else {
            Err(SessionError::Superseded)
        }
    }

    /// Stores a resource in the attempt's session, or releases it right away
    /// if the attempt is no longer current.
    fn install(&self, attempt: u64, resource: Resource) -> Result<()> {
        let mut slot = self.lock();
        let current = self.is_current(attempt);
        if let Some(session) = slot.session.as_mut().filter(|s| current && s.attempt == attempt) {
            session.hold(resource);
            return Ok(());
        }
        drop(slot);
        resource.release();
        Err(SessionError::Superseded)
    }

    fn finish_connect(&self, attempt: u64, transport: &Arc<dyn Transport>) -> Result<()> {
        let Some(_dispatch) = self.dispatch(attempt) else {
            return Err(SessionError::Superseded);
        };
        {
            let mut slot = self.lock();
            if !self.is_current(attempt) {
                return Err(SessionError::Superseded);
            }
            let Some(session) = slot.session.as_mut() else {
                return Err(SessionError::Superseded);
            };
            session.connected = true;
            session.poller = Some(StatsPoller::start(transport.clone(), self.config.stats_interval()));
            slot.state = SessionState::Connected;
            self.publish(&slot);
        }
        tracing::info!(attempt, "connected");
        self.notifier
            .notify(Notice::info("Connected to OpenAI", "Voice streaming is ready"));
        self.callbacks.stream_started();
        Ok(())
    }

    fn disconnect(&self) {
        let was_connected = {
            let mut slot = self.lock();
            self.generation.fetch_add(1, Ordering::SeqCst);
            if slot.state == SessionState::Idle {
                drop(slot);
                self.drain_dispatch();
                return;
            }
            slot.state = SessionState::Disconnecting;
            self.publish(&slot);

            let session = slot.session.take();
            let was_connected = session.as_ref().is_some_and(|s| s.connected);
            if let Some(session) = session {
                session.release();
            }

            slot.state = SessionState::Idle;
            slot.streaming = false;
            self.publish(&slot);
            was_connected
        };
        self.drain_dispatch();

        tracing::info!("disconnected");
        if was_connected {
            self.notifier
                .notify(Notice::info("Disconnected", "Voice streaming has ended"));
            self.callbacks.stream_ended();
        }
    }

    fn set_streaming(&self, attempt: u64, streaming: bool) {
        let mut slot = self.lock();
        if !self.is_current(attempt) || slot.streaming == streaming {
            return;
        }
        slot.streaming = streaming;
        self.publish(&slot);
    }

    fn current_transport(&self) -> Option<(u64, Arc<dyn Transport>)> {
        let slot = self.lock();
        let session = slot.session.as_ref()?;
        Some((session.attempt, session.transport.clone()?))
    }

    fn diagnose(&self, attempt: u64, stats: &ConnectionStats) -> Option<Vec<QualityIssue>> {
        {
            let mut slot = self.lock();
            let session = slot.session.as_mut().filter(|s| s.attempt == attempt)?;
            if session.diagnosed {
                return None;
            }
            session.diagnosed = true;
        }

        let issues = analyze(stats);
        for issue in &issues {
            tracing::warn!(attempt, "audio issue: {issue}");
        }
        if let Some(first) = issues.first() {
            self.notifier
                .notify(Notice::destructive("Audio Issues Detected", &first.to_string()));
        }
        Some(issues)
    }

    async fn transport_failed(&self, attempt: u64, state: ConnectionState, transport: &Arc<dyn Transport>) {
        let stats = transport.stats().await;
        log_stats(&stats);
        let Some(dispatch) = self.dispatch(attempt) else {
            return;
        };
        self.diagnose(attempt, &stats);
        self.report(&SessionError::TransportFailure(state));
        drop(dispatch);
        self.disconnect();
    }

    async fn handle_event(
        &self,
        attempt: u64,
        event: TransportEvent,
        router: &mut EventRouter,
        channel: &Arc<dyn SideChannel>,
        transport: &Arc<dyn Transport>,
    ) -> ControlFlow<()> {
        match event {
            TransportEvent::StateChanged(state) => {
                tracing::info!(attempt, %state, "connection state changed");
                if state.is_terminal() {
                    self.transport_failed(attempt, state, transport).await;
                    return ControlFlow::Break(());
                }
            }
            TransportEvent::Track(track) => {
                tracing::info!(attempt, track = %track.id, "remote audio track received");
                let playback = self.output.play(track);
                if self.install(attempt, Resource::Playback(playback)).is_err() {
                    return ControlFlow::Break(());
                }
            }
            TransportEvent::ChannelOpen => {
                tracing::info!(attempt, label = channel.label(), "side channel open");
                for event in router.channel_opened() {
                    send_event(channel.as_ref(), &event).await;
                }
            }
            TransportEvent::ChannelMessage(text) => {
                tracing::debug!(attempt, "received: {text}");
                for output in router.route(&text) {
                    if !self.is_current(attempt) {
                        return ControlFlow::Break(());
                    }
                    match output {
                        RouterOutput::Send(event) => send_event(channel.as_ref(), &event).await,
                        RouterOutput::StreamingChanged(streaming) => self.set_streaming(attempt, streaming),
                        RouterOutput::Error(message) => {
                            let Some(_dispatch) = self.dispatch(attempt) else {
                                return ControlFlow::Break(());
                            };
                            self.report(&SessionError::Protocol(message));
                        }
                        RouterOutput::Message(message) => {
                            let Some(_dispatch) = self.dispatch(attempt) else {
                                return ControlFlow::Break(());
                            };
                            self.callbacks.message_received(message);
                        }
                    }
                }
            }
            TransportEvent::ChannelClosed => {
                tracing::info!(attempt, label = channel.label(), "side channel closed");
                router.channel_closed();
            }
        }
        ControlFlow::Continue(())
    }
}

async fn send_event(channel: &dyn SideChannel, event: &ClientEvent) {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!("failed to serialize client event: {e}");
            return;
        }
    };
    tracing::debug!("sending: {text}");
    if let Err(e) = channel.send(text).await {
        tracing::warn!(label = channel.label(), "failed to send client event: {e}");
    }
}

/// Drives one attempt: routes transport events and watches settings.
async fn event_loop(
    weak: Weak<Inner>,
    attempt: u64,
    mut config: SessionConfig,
    mut events: TransportEvents,
    channel: Arc<dyn SideChannel>,
    transport: Arc<dyn Transport>,
) {
    let (mut settings, debounce, mut router) = {
        let Some(inner) = weak.upgrade() else { return };
        let settings = inner.settings.subscribe();
        let router = EventRouter::new(&config.instructions, inner.history.clone());
        (settings, inner.config.settings_debounce(), router)
    };
    // Edits made between the connect snapshot and the subscription count too.
    let mut settle_at = (*settings.borrow_and_update() != config).then(|| Instant::now() + debounce);
    let mut watching = true;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    tracing::debug!(attempt, "transport event stream ended");
                    break;
                };
                let Some(inner) = weak.upgrade() else { break };
                if !inner.is_current(attempt) {
                    break;
                }
                if inner.handle_event(attempt, event, &mut router, &channel, &transport).await.is_break() {
                    break;
                }
            }
            changed = settings.changed(), if watching => {
                if changed.is_err() {
                    watching = false;
                    continue;
                }
                settle_at.get_or_insert_with(|| Instant::now() + debounce);
            }
            _ = sleep_until(settle_at.unwrap_or_else(Instant::now)), if settle_at.is_some() => {
                settle_at = None;
                let latest = settings.borrow_and_update().clone();
                let Some(inner) = weak.upgrade() else { break };
                if !inner.is_current(attempt) {
                    break;
                }
                if latest.requires_reconnect(&config) {
                    tracing::info!(attempt, voice = %latest.voice, model = %latest.model, "voice settings changed, reconnecting");
                    tokio::spawn(reconnect(weak.clone(), attempt));
                    break;
                }
                if latest.instructions_changed(&config) {
                    tracing::info!(attempt, "instructions changed, updating session");
                    if let Some(update) = router.update_instructions(&latest.instructions) {
                        send_event(channel.as_ref(), &update).await;
                    }
                }
                config = latest;
            }
        }
    }
}

/// Disconnects, pauses, then starts a fresh attempt unless anything else
/// touched the session in the meantime.
async fn reconnect(weak: Weak<Inner>, attempt: u64) {
    let (generation, delay) = {
        let Some(inner) = weak.upgrade() else { return };
        if !inner.is_current(attempt) {
            return;
        }
        inner.disconnect();
        (inner.generation(), inner.config.reconnect_delay())
    };

    tokio::time::sleep(delay).await;

    let Some(inner) = weak.upgrade() else { return };
    if inner.generation() != generation {
        tracing::debug!(attempt, "reconnect cancelled");
        return;
    }
    if let Err(e) = inner.connect_boxed().await {
        tracing::warn!(attempt, "reconnect failed: {e}");
    }
}
