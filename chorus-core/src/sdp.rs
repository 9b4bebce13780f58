//! Session description normalization.
//!
//! Both sides of a negotiation run their local description through
//! [`SdpPolicy::transform`] before transmitting it, forcing every session
//! down to a single stereo audio codec at a fixed bitrate. The transform
//! is a pure line rewrite: deterministic, idempotent, and best-effort on
//! input it cannot parse (unrecognized lines pass through untouched).

/// Payload type Chrome was assigning to opus as of April 2019. Used when
/// the rtpmap line carries no parseable id.
pub const DEFAULT_OPUS_PAYLOAD_TYPE: u16 = 111;

/// Fixed audio bandwidth written into `b=AS:` lines, in kbps.
pub const DEFAULT_AUDIO_BITRATE_KBPS: u32 = 128;

/// Format parameters that enable stereo on the opus encoder.
pub const STEREO_PARAMS: [&str; 2] = ["stereo=1", "sprop-stereo=1"];

/// Codec/bitrate policy applied to negotiated session descriptions.
#[derive(Debug, Clone)]
pub struct SdpPolicy {
    /// Codec name kept in the audio section; every other mapping is removed.
    pub target_codec: String,
    /// Payload type assumed for the target codec when none can be parsed.
    pub fallback_payload_type: u16,
    /// Bandwidth written into `b=AS:` lines.
    pub bitrate_kbps: u32,
}

impl Default for SdpPolicy {
    fn default() -> Self {
        Self {
            target_codec: "opus".to_owned(),
            fallback_payload_type: DEFAULT_OPUS_PAYLOAD_TYPE,
            bitrate_kbps: DEFAULT_AUDIO_BITRATE_KBPS,
        }
    }
}

/// Transform a session description with the default policy.
pub fn transform(sdp: &str) -> String {
    SdpPolicy::default().transform(sdp)
}

impl SdpPolicy {
    /// Rewrite `sdp` so that the audio section offers only the target
    /// codec, in stereo, at the fixed bitrate.
    ///
    /// CRLF line structure and line order are preserved; only the lines
    /// named in the steps below are touched:
    /// 1. non-target `a=rtpmap:` lines are deleted and their payload ids
    ///    remembered,
    /// 2. the target rtpmap line gains a `/2` channel suffix,
    /// 3. its `a=fmtp:` line gains any missing stereo parameters while
    ///    `a=fmtp:` lines of removed ids are deleted,
    /// 4. `b=AS:` lines are rewritten to the fixed bitrate,
    /// 5. removed ids are stripped from the `m=audio` payload list.
    pub fn transform(&self, sdp: &str) -> String {
        let mut removed_ids: Vec<String> = Vec::new();
        let mut target_id = self.fallback_payload_type.to_string();
        let mut audio_line: Option<usize> = None;
        let mut out: Vec<String> = Vec::new();

        for line in sdp.split("\r\n") {
            if line.contains("m=audio") {
                audio_line = Some(out.len());
            }

            if line.contains("rtpmap:") {
                if !line.contains(self.target_codec.as_str()) {
                    if let Some(id) = payload_id(line) {
                        removed_ids.push(id);
                    }
                    continue;
                }

                if let Some(id) = payload_id(line) {
                    target_id = id;
                }
                out.push(force_stereo_channels(line));
                continue;
            }

            if line.contains(&format!("fmtp:{target_id}")) {
                out.push(ensure_stereo_params(line));
                continue;
            } else if line.contains("fmtp:") {
                if let Some(id) = payload_id(line) {
                    if removed_ids.contains(&id) {
                        continue;
                    }
                }
            }

            if line.contains("b=AS:") {
                out.push(format!("b=AS:{}", self.bitrate_kbps));
                continue;
            }

            out.push(line.to_owned());
        }

        if let Some(i) = audio_line {
            out[i] = strip_payload_ids(&out[i], &removed_ids);
        }

        out.join("\r\n")
    }
}

/// First `:NNN` payload id in the line, up to three digits.
fn payload_id(line: &str) -> Option<String> {
    let bytes = line.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b != b':' {
            continue;
        }
        let digits: String = line[i + 1..]
            .chars()
            .take_while(char::is_ascii_digit)
            .take(3)
            .collect();
        if !digits.is_empty() {
            return Some(digits);
        }
    }
    None
}

/// Append the `/2` channel-count suffix to an rtpmap value if absent,
/// e.g. `a=rtpmap:111 opus/48000` -> `a=rtpmap:111 opus/48000/2`.
fn force_stereo_channels(line: &str) -> String {
    let Some((key, value)) = line.split_once('=') else {
        return line.to_owned();
    };
    let mut parts: Vec<&str> = value.split('/').collect();
    if !parts.contains(&"2") {
        parts.push("2");
    }
    format!("{}={}", key, parts.join("/"))
}

/// Append any missing stereo-enabling parameters to an fmtp line,
/// leaving the existing parameters and their order intact.
fn ensure_stereo_params(line: &str) -> String {
    let Some((prefix, params)) = line.split_once(' ') else {
        return line.to_owned();
    };
    let mut parts: Vec<&str> = params.split(';').collect();
    for param in STEREO_PARAMS {
        if !parts.contains(&param) {
            parts.push(param);
        }
    }
    format!("{} {}", prefix, parts.join(";"))
}

/// Drop removed payload ids from the media-description line while keeping
/// the media type and port tokens and the order of everything else.
fn strip_payload_ids(line: &str, removed: &[String]) -> String {
    let parts: Vec<&str> = line.split(' ').collect();
    let mut kept: Vec<&str> = Vec::with_capacity(parts.len());
    for (i, part) in parts.iter().enumerate() {
        if i >= 2 && removed.iter().any(|id| id == part) {
            continue;
        }
        kept.push(part);
    }
    kept.join(" ")
}
