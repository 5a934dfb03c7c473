pub mod audio;
pub mod capture;
pub mod device;
pub mod playback;

pub use capture::{CaptureError, EncodedFrame, Microphone};
pub use playback::Speaker;
