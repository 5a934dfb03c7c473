#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use voice_session::diagnostics::ConnectionStats;
use voice_session::media::{AudioFrame, AudioSource, MediaDevices};
use voice_session::negotiator::{NegotiationRequest, Negotiator};
use voice_session::transport::{
    ConnectionState, IceConfig, SideChannel, Transport, TransportEvent, TransportEvents, TransportFactory,
};
use voice_session::types::VoiceMessage;
use voice_session::{Config, MediaError, Notice, Notifier, Result, SessionCallbacks, SessionError};

pub const ANSWER: &str = "v=0\r\nfake-answer";

pub fn config() -> Config {
    Config::builder()
        .with_api_key("sk-test")
        .with_ice_servers(Vec::new())
        .build()
}

/// Lets spawned tasks run to completion of their current work.
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

#[derive(Default)]
pub struct CountingMedia {
    acquired: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
    deny: AtomicBool,
}

impl CountingMedia {
    pub fn denying() -> Self {
        let media = Self::default();
        media.deny.store(true, Ordering::SeqCst);
        media
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    /// Sources acquired and not yet stopped.
    pub fn live(&self) -> usize {
        self.acquired() - self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaDevices for CountingMedia {
    async fn acquire_audio(&self) -> std::result::Result<Box<dyn AudioSource>, MediaError> {
        if self.deny.load(Ordering::SeqCst) {
            return Err(MediaError::PermissionDenied("microphone access was refused".to_string()));
        }
        self.acquired.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(8);
        Ok(Box::new(CountingSource {
            released: self.released.clone(),
            stopped: AtomicBool::new(false),
            _tx: tx,
            frames: Mutex::new(Some(rx)),
        }))
    }
}

struct CountingSource {
    released: Arc<AtomicUsize>,
    stopped: AtomicBool,
    _tx: mpsc::Sender<AudioFrame>,
    frames: Mutex<Option<mpsc::Receiver<AudioFrame>>>,
}

impl AudioSource for CountingSource {
    fn label(&self) -> &str {
        "fake microphone"
    }

    fn take_frames(&self) -> Option<mpsc::Receiver<AudioFrame>> {
        self.frames.lock().unwrap().take()
    }

    fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }
}

pub struct FakeTransport {
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    events: Mutex<Option<TransportEvents>>,
    sent: Arc<Mutex<Vec<String>>>,
    answers: Mutex<Vec<String>>,
    closed: Arc<AtomicBool>,
    stats: Mutex<ConnectionStats>,
    stats_calls: AtomicUsize,
}

impl FakeTransport {
    fn new() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            events_tx,
            events: Mutex::new(Some(events_rx)),
            sent: Arc::default(),
            answers: Mutex::default(),
            closed: Arc::default(),
            stats: Mutex::default(),
            stats_calls: AtomicUsize::new(0),
        }
    }

    pub fn emit(&self, event: TransportEvent) {
        let _ = self.events_tx.send(event);
    }

    pub fn message(&self, json: &str) {
        self.emit(TransportEvent::ChannelMessage(json.to_string()));
    }

    /// Everything written to the side-channel, parsed.
    pub fn sent(&self) -> Vec<serde_json::Value> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|s| serde_json::from_str(s).unwrap())
            .collect()
    }

    pub fn answers(&self) -> Vec<String> {
        self.answers.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn stats_calls(&self) -> usize {
        self.stats_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    fn take_events(&self) -> Option<TransportEvents> {
        self.events.lock().unwrap().take()
    }

    async fn add_audio_track(&self, _frames: mpsc::Receiver<AudioFrame>) -> Result<()> {
        Ok(())
    }

    async fn create_side_channel(&self, label: &str) -> Result<Arc<dyn SideChannel>> {
        Ok(Arc::new(FakeChannel {
            label: label.to_string(),
            sent: self.sent.clone(),
            closed: self.closed.clone(),
        }))
    }

    async fn create_offer(&self) -> Result<String> {
        Ok("v=0\r\nfake-offer".to_string())
    }

    async fn apply_answer(&self, answer: &str) -> Result<()> {
        self.answers.lock().unwrap().push(answer.to_string());
        Ok(())
    }

    fn state(&self) -> ConnectionState {
        if self.is_closed() {
            ConnectionState::Closed
        } else {
            ConnectionState::Connected
        }
    }

    async fn stats(&self) -> ConnectionStats {
        self.stats_calls.fetch_add(1, Ordering::SeqCst);
        self.stats.lock().unwrap().clone()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

struct FakeChannel {
    label: String,
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl SideChannel for FakeChannel {
    fn label(&self) -> &str {
        &self.label
    }

    fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    async fn send(&self, text: String) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SessionError::transport("channel closed"));
        }
        self.sent.lock().unwrap().push(text);
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeTransports {
    created: Mutex<Vec<Arc<FakeTransport>>>,
    ice: Mutex<Vec<IceConfig>>,
}

impl FakeTransports {
    pub fn count(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    pub fn last(&self) -> Arc<FakeTransport> {
        self.created.lock().unwrap().last().cloned().expect("no transport created")
    }

    pub fn ice(&self) -> Vec<IceConfig> {
        self.ice.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransportFactory for FakeTransports {
    async fn create(&self, ice: &IceConfig) -> Result<Arc<dyn Transport>> {
        let transport = Arc::new(FakeTransport::new());
        self.created.lock().unwrap().push(transport.clone());
        self.ice.lock().unwrap().push(ice.clone());
        Ok(transport)
    }
}

/// Answers every offer, optionally holding the answer until released.
#[derive(Default)]
pub struct FakeNegotiator {
    requests: Mutex<Vec<NegotiationRequest>>,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
}

impl FakeNegotiator {
    pub fn gated() -> (Self, oneshot::Sender<()>) {
        let (tx, rx) = oneshot::channel();
        let negotiator = Self {
            requests: Mutex::default(),
            gate: Mutex::new(Some(rx)),
        };
        (negotiator, tx)
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> NegotiationRequest {
        self.requests.lock().unwrap().last().cloned().expect("no negotiation")
    }
}

#[async_trait]
impl Negotiator for FakeNegotiator {
    async fn negotiate(&self, _offer: &str, request: &NegotiationRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        Ok(ANSWER.to_string())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn titles(&self) -> Vec<String> {
        self.notices.lock().unwrap().iter().map(|n| n.title.clone()).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}

#[derive(Default)]
pub struct Recorder {
    pub starts: AtomicUsize,
    pub ends: AtomicUsize,
    pub errors: Mutex<Vec<String>>,
    pub messages: Mutex<Vec<VoiceMessage>>,
}

impl Recorder {
    pub fn callbacks(self: &Arc<Self>) -> SessionCallbacks {
        let (a, b, c, d) = (self.clone(), self.clone(), self.clone(), self.clone());
        SessionCallbacks::new()
            .on_stream_start(move || {
                a.starts.fetch_add(1, Ordering::SeqCst);
            })
            .on_stream_end(move || {
                b.ends.fetch_add(1, Ordering::SeqCst);
            })
            .on_error(move |e| c.errors.lock().unwrap().push(e.to_string()))
            .on_message_received(move |m| d.messages.lock().unwrap().push(m))
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn ends(&self) -> usize {
        self.ends.load(Ordering::SeqCst)
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<VoiceMessage> {
        self.messages.lock().unwrap().clone()
    }
}

