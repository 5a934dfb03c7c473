pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";

pub const BASE_URL: &str = "https://api.openai.com/v1";
pub const REALTIME_PATH: &str = "realtime";

pub const AUTHORIZATION_HEADER: &str = "Authorization";
pub const CONTENT_TYPE_HEADER: &str = "Content-Type";
pub const OPENAI_BETA_HEADER: &str = "OpenAI-Beta";
pub const VOICE_HEADER: &str = "X-Voice";
pub const MODEL_HEADER: &str = "X-Model";
pub const CONTEXT_HEADER: &str = "X-Context";

/// Encoded size budget for the context header. Oldest turns are dropped to
/// stay under it.
pub const CONTEXT_HEADER_MAX_BYTES: usize = 6 * 1024;
pub const CONTEXT_HISTORY_MAX_TURNS: usize = 50;

pub const SDP_CONTENT_TYPE: &str = "application/sdp";
pub const OPENAI_BETA_VALUE: &str = "realtime-speech";

pub const DATA_CHANNEL_LABEL: &str = "oai-events";

pub const DEFAULT_ICE_SERVERS: [&str; 5] = [
    "stun:stun.l.google.com:19302",
    "stun:stun1.l.google.com:19302",
    "stun:stun2.l.google.com:19302",
    "stun:stun3.l.google.com:19302",
    "stun:stun4.l.google.com:19302",
];
pub const ICE_CANDIDATE_POOL_SIZE: u8 = 10;

pub const STATS_INTERVAL_SECS: u64 = 10;
pub const RECONNECT_DELAY_MS: u64 = 500;
pub const SETTINGS_DEBOUNCE_MS: u64 = 50;

/// Above this inbound loss rate the call quality is reported as degraded.
pub const PACKET_LOSS_WARN_RATE: f64 = 0.1;
