//! [`Transport`] backed by the `webrtc` crate.

use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MediaEngine, MIME_TYPE_OPUS};
use webrtc::api::APIBuilder;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::data_channel_state::RTCDataChannelState;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::media::Sample;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::stats::StatsReportType;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

use super::{ConnectionState, IceConfig, SideChannel, Transport, TransportEvent, TransportEvents, TransportFactory};
use crate::diagnostics::ConnectionStats;
use crate::error::{Result, SessionError};
use crate::media::{AudioFrame, RemoteTrack};

const REMOTE_FRAME_CAPACITY: usize = 256;
const REMOTE_FRAME_DURATION: Duration = Duration::from_millis(20);

impl From<RTCPeerConnectionState> for ConnectionState {
    fn from(state: RTCPeerConnectionState) -> Self {
        match state {
            RTCPeerConnectionState::Connecting => ConnectionState::Connecting,
            RTCPeerConnectionState::Connected => ConnectionState::Connected,
            RTCPeerConnectionState::Disconnected => ConnectionState::Disconnected,
            RTCPeerConnectionState::Failed => ConnectionState::Failed,
            RTCPeerConnectionState::Closed => ConnectionState::Closed,
            _ => ConnectionState::New,
        }
    }
}

fn transport_err(e: impl Display) -> SessionError {
    SessionError::Transport(e.to_string())
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WebRtcTransportFactory;

#[async_trait]
impl TransportFactory for WebRtcTransportFactory {
    async fn create(&self, ice: &IceConfig) -> Result<Arc<dyn Transport>> {
        Ok(Arc::new(WebRtcTransport::new(ice).await?))
    }
}

pub struct WebRtcTransport {
    pc: Arc<RTCPeerConnection>,
    state: Arc<Mutex<ConnectionState>>,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    events: Mutex<Option<TransportEvents>>,
    pumps: Arc<Mutex<Vec<JoinHandle<()>>>>,
    closed: AtomicBool,
}

impl WebRtcTransport {
    pub async fn new(ice: &IceConfig) -> Result<Self> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs().map_err(transport_err)?;

        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media_engine).map_err(transport_err)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: ice
                .servers
                .iter()
                .map(|url| RTCIceServer {
                    urls: vec![url.clone()],
                    ..Default::default()
                })
                .collect(),
            ice_candidate_pool_size: ice.candidate_pool_size,
            ..Default::default()
        };
        let pc = Arc::new(api.new_peer_connection(rtc_config).await.map_err(transport_err)?);

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let state = Arc::new(Mutex::new(ConnectionState::New));
        let pumps = Arc::new(Mutex::new(Vec::new()));

        pc.on_ice_candidate(Box::new(|candidate| {
            if let Some(c) = candidate {
                tracing::debug!(candidate = ?c, "local ICE candidate");
            }
            Box::pin(async {})
        }));

        pc.on_ice_connection_state_change(Box::new(|state| {
            tracing::debug!(ice_state = %state, "ICE connection state changed");
            Box::pin(async {})
        }));

        let tx = events_tx.clone();
        let shared_state = state.clone();
        pc.on_peer_connection_state_change(Box::new(move |s| {
            let s = ConnectionState::from(s);
            *shared_state.lock().unwrap_or_else(|e| e.into_inner()) = s;
            let _ = tx.send(TransportEvent::StateChanged(s));
            Box::pin(async {})
        }));

        let tx = events_tx.clone();
        let track_pumps = pumps.clone();
        pc.on_track(Box::new(move |track, _receiver, _transceiver| {
            if track.kind() == RTPCodecType::Audio {
                let (frames_tx, frames_rx) = mpsc::channel(REMOTE_FRAME_CAPACITY);
                let id = track.id();
                tracing::info!(track = %id, codec = %track.codec().capability.mime_type, "remote audio track");
                let pump = tokio::spawn(read_remote_track(track, frames_tx));
                track_pumps.lock().unwrap_or_else(|e| e.into_inner()).push(pump);
                let _ = tx.send(TransportEvent::Track(RemoteTrack { id, frames: frames_rx }));
            }
            Box::pin(async {})
        }));

        Ok(Self {
            pc,
            state,
            events_tx,
            events: Mutex::new(Some(events_rx)),
            pumps,
            closed: AtomicBool::new(false),
        })
    }

    fn track_pump(&self, pump: JoinHandle<()>) {
        self.pumps.lock().unwrap_or_else(|e| e.into_inner()).push(pump);
    }
}

async fn read_remote_track(track: Arc<TrackRemote>, frames: mpsc::Sender<AudioFrame>) {
    while let Ok((packet, _)) = track.read_rtp().await {
        if packet.payload.is_empty() {
            continue;
        }
        let frame = AudioFrame {
            data: packet.payload.to_vec(),
            duration: REMOTE_FRAME_DURATION,
        };
        if frames.send(frame).await.is_err() {
            break;
        }
    }
    tracing::debug!("remote track reader finished");
}

#[async_trait]
impl Transport for WebRtcTransport {
    fn take_events(&self) -> Option<TransportEvents> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    async fn add_audio_track(&self, mut frames: mpsc::Receiver<AudioFrame>) -> Result<()> {
        let track = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: 48000,
                channels: 1,
                ..Default::default()
            },
            "audio".to_owned(),
            "voice-session".to_owned(),
        ));
        let sender = self
            .pc
            .add_track(Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(transport_err)?;

        // RTCP has to be drained for the interceptors to work.
        self.track_pump(tokio::spawn(async move {
            let mut buf = vec![0u8; 1500];
            while sender.read(&mut buf).await.is_ok() {}
        }));

        self.track_pump(tokio::spawn(async move {
            while let Some(frame) = frames.recv().await {
                let sample = Sample {
                    data: Bytes::from(frame.data),
                    duration: frame.duration,
                    ..Default::default()
                };
                if let Err(e) = track.write_sample(&sample).await {
                    tracing::warn!("failed to write audio sample: {}", e);
                }
            }
            tracing::debug!("outbound audio ended");
        }));
        Ok(())
    }

    async fn create_side_channel(&self, label: &str) -> Result<Arc<dyn SideChannel>> {
        let dc = self.pc.create_data_channel(label, None).await.map_err(transport_err)?;

        let tx = self.events_tx.clone();
        dc.on_open(Box::new(move || {
            let _ = tx.send(TransportEvent::ChannelOpen);
            Box::pin(async {})
        }));

        let tx = self.events_tx.clone();
        dc.on_message(Box::new(move |msg: DataChannelMessage| {
            match String::from_utf8(msg.data.to_vec()) {
                Ok(text) => {
                    let _ = tx.send(TransportEvent::ChannelMessage(text));
                }
                Err(e) => tracing::warn!("dropping non-utf8 side channel message: {}", e),
            }
            Box::pin(async {})
        }));

        let tx = self.events_tx.clone();
        dc.on_close(Box::new(move || {
            let _ = tx.send(TransportEvent::ChannelClosed);
            Box::pin(async {})
        }));

        Ok(Arc::new(WebRtcSideChannel {
            label: label.to_string(),
            dc,
        }))
    }

    async fn create_offer(&self) -> Result<String> {
        let offer = self
            .pc
            .create_offer(None)
            .await
            .map_err(|e| SessionError::OfferCreation(e.to_string()))?;

        // The answer comes back over plain HTTP, so every candidate has to be
        // in the offer.
        let mut gathered = self.pc.gathering_complete_promise().await;
        self.pc
            .set_local_description(offer)
            .await
            .map_err(|e| SessionError::OfferCreation(e.to_string()))?;
        let _ = gathered.recv().await;

        self.pc
            .local_description()
            .await
            .map(|desc| desc.sdp)
            .ok_or_else(|| SessionError::OfferCreation("no local description".to_string()))
    }

    async fn apply_answer(&self, answer: &str) -> Result<()> {
        let desc = RTCSessionDescription::answer(answer.to_string()).map_err(transport_err)?;
        self.pc.set_remote_description(desc).await.map_err(transport_err)
    }

    fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn stats(&self) -> ConnectionStats {
        let mut stats = ConnectionStats {
            connection_state: self.state(),
            ice_state: Some(self.pc.ice_connection_state().to_string()),
            ..Default::default()
        };

        for report in self.pc.get_stats().await.reports.into_values() {
            match report {
                StatsReportType::InboundRTP(s) if s.kind == "audio" => {
                    stats.inbound_packets += s.packets_received;
                    stats.inbound_bytes += s.bytes_received;
                }
                StatsReportType::OutboundRTP(s) if s.kind == "audio" => {
                    stats.outbound_packets += s.packets_sent;
                    stats.outbound_bytes += s.bytes_sent;
                }
                StatsReportType::RemoteInboundRTP(s) if s.kind == "audio" => {
                    *stats.outbound_packets_lost.get_or_insert(0) += s.packets_lost;
                    if s.round_trip_time.is_some() {
                        stats.round_trip_time = s.round_trip_time;
                    }
                }
                _ => {}
            }
        }
        stats
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        for pump in self.pumps.lock().unwrap_or_else(|e| e.into_inner()).drain(..) {
            pump.abort();
        }
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = ConnectionState::Closed;

        let pc = self.pc.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = pc.close().await {
                        tracing::warn!("failed to close peer connection: {}", e);
                    }
                });
            }
            Err(_) => tracing::warn!("no runtime to close peer connection on"),
        }
    }
}

impl Drop for WebRtcTransport {
    fn drop(&mut self) {
        self.close();
    }
}

struct WebRtcSideChannel {
    label: String,
    dc: Arc<RTCDataChannel>,
}

#[async_trait]
impl SideChannel for WebRtcSideChannel {
    fn label(&self) -> &str {
        &self.label
    }

    fn is_open(&self) -> bool {
        self.dc.ready_state() == RTCDataChannelState::Open
    }

    async fn send(&self, text: String) -> Result<()> {
        self.dc.send_text(text).await.map(|_| ()).map_err(transport_err)
    }

    fn close(&self) {
        let dc = self.dc.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                let _ = dc.close().await;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_only() -> IceConfig {
        IceConfig {
            servers: Vec::new(),
            candidate_pool_size: 0,
        }
    }

    #[tokio::test]
    async fn test_offer_carries_audio_and_side_channel() {
        let transport = WebRtcTransport::new(&local_only()).await.unwrap();
        assert!(transport.take_events().is_some());
        assert!(transport.take_events().is_none());

        let (_tx, rx) = mpsc::channel(4);
        transport.add_audio_track(rx).await.unwrap();
        let channel = transport.create_side_channel("oai-events").await.unwrap();
        assert_eq!(channel.label(), "oai-events");
        assert!(!channel.is_open());

        let offer = transport.create_offer().await.unwrap();
        assert!(offer.contains("m=audio"));
        assert!(offer.contains("m=application"));
        assert!(offer.to_lowercase().contains("opus"));

        transport.close();
        assert_eq!(transport.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_rejects_garbage_answer() {
        let transport = WebRtcTransport::new(&local_only()).await.unwrap();
        transport.create_side_channel("oai-events").await.unwrap();
        transport.create_offer().await.unwrap();
        assert!(transport.apply_answer("not sdp").await.is_err());
    }
}
