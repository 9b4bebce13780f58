//! Capability contracts for media capture.
//!
//! The negotiation core never manages capture hardware; it only reads
//! track presence and a device label through [`MediaCaptureSource`], or
//! consumes a raw desktop source through [`NativeCaptureAddon`]. Real
//! implementations live with the audio-graph layer, outside this crate.

/// A source of zero or more local audio/video tracks.
pub trait MediaCaptureSource: Send + Sync {
    /// Human-readable device label, for diagnostics only.
    fn label(&self) -> String;

    fn audio_track_count(&self) -> usize;

    fn video_track_count(&self) -> usize;
}

/// Desktop-only raw audio source (loopback capture addon).
pub trait NativeCaptureAddon: Send {
    /// Names of the capture devices the addon can open.
    fn devices(&self) -> Vec<String>;

    /// Select the capture device; `false` if the device was rejected.
    fn set_input(&mut self, device: &str) -> bool;

    fn start_capture(&mut self) -> anyhow::Result<()>;

    fn stop_capture(&mut self);

    /// Fill `buffer` with captured samples, returning how many were written.
    fn read_buffer(&mut self, buffer: &mut [f32]) -> usize;
}
