//! Transcoder argument profiles
//!
//! The default profile asks ffmpeg for a low-latency MPEG-TS stream with
//! MPEG-1 video and no audio, written to stdout. Browser-side MPEG-1
//! decoders (jsmpeg and friends) consume this directly.

/// Placeholder replaced by the source URI in custom profiles
pub const SOURCE_PLACEHOLDER: &str = "{source}";

/// Encoding knobs for the ffmpeg profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FfmpegProfile {
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// Video bitrate in kbit/s
    pub bitrate_kbps: u32,
    /// Quantizer quality (lower is better)
    pub quality: u32,
    /// Output frame rate
    pub frame_rate: u32,
}

impl Default for FfmpegProfile {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            bitrate_kbps: 1000,
            quality: 5,
            frame_rate: 25,
        }
    }
}

impl FfmpegProfile {
    /// Set the output resolution
    pub fn resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the video bitrate
    pub fn bitrate_kbps(mut self, kbps: u32) -> Self {
        self.bitrate_kbps = kbps;
        self
    }

    /// Set the output frame rate
    pub fn frame_rate(mut self, fps: u32) -> Self {
        self.frame_rate = fps;
        self
    }

    /// Build the ffmpeg command line for `source_uri`
    pub fn args(&self, source_uri: &str) -> Vec<String> {
        let size = format!("{}x{}", self.width, self.height);
        let bitrate = format!("{}k", self.bitrate_kbps);
        let quality = self.quality.to_string();
        let frame_rate = self.frame_rate.to_string();

        #[rustfmt::skip]
        let args: Vec<&str> = vec![
            // Input: interleaved TCP transport, no input buffering
            "-rtsp_transport", "tcp",
            "-fflags", "nobuffer",
            "-flags", "low_delay",
            "-i", source_uri,
            // Output: MPEG-TS with MPEG-1 video, no B-frames, no audio
            "-f", "mpegts",
            "-codec:v", "mpeg1video",
            "-s", &size,
            "-b:v", &bitrate,
            "-bf", "0",
            "-q:v", &quality,
            "-r", &frame_rate,
            "-an",
            "-flush_packets", "1",
            "pipe:1",
        ];

        args.into_iter().map(String::from).collect()
    }
}

/// How the transcoder is invoked
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscoderProfile {
    /// The standard ffmpeg low-latency profile
    Ffmpeg(FfmpegProfile),
    /// Arbitrary arguments; `{source}` is substituted with the source URI
    Custom {
        /// Argument template
        args: Vec<String>,
    },
}

impl Default for TranscoderProfile {
    fn default() -> Self {
        TranscoderProfile::Ffmpeg(FfmpegProfile::default())
    }
}

impl TranscoderProfile {
    /// Create a custom profile from an argument template
    pub fn custom<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TranscoderProfile::Custom {
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Build the full argument list for `source_uri`
    pub fn args(&self, source_uri: &str) -> Vec<String> {
        match self {
            TranscoderProfile::Ffmpeg(profile) => profile.args(source_uri),
            TranscoderProfile::Custom { args } => args
                .iter()
                .map(|a| a.replace(SOURCE_PLACEHOLDER, source_uri))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn test_default_ffmpeg_args() {
        let args = TranscoderProfile::default().args("rtsp://cam/stream");

        assert_eq!(value_after(&args, "-rtsp_transport"), Some("tcp"));
        assert_eq!(value_after(&args, "-fflags"), Some("nobuffer"));
        assert_eq!(value_after(&args, "-i"), Some("rtsp://cam/stream"));
        assert_eq!(value_after(&args, "-f"), Some("mpegts"));
        assert_eq!(value_after(&args, "-codec:v"), Some("mpeg1video"));
        assert_eq!(value_after(&args, "-s"), Some("640x480"));
        assert_eq!(value_after(&args, "-b:v"), Some("1000k"));
        assert_eq!(value_after(&args, "-flush_packets"), Some("1"));
        assert!(args.iter().any(|a| a == "-an"));
        assert_eq!(args.last().map(String::as_str), Some("pipe:1"));
    }

    #[test]
    fn test_ffmpeg_builder() {
        let profile = FfmpegProfile::default()
            .resolution(1280, 720)
            .bitrate_kbps(2500)
            .frame_rate(30);
        let args = profile.args("rtsp://cam");

        assert_eq!(value_after(&args, "-s"), Some("1280x720"));
        assert_eq!(value_after(&args, "-b:v"), Some("2500k"));
        assert_eq!(value_after(&args, "-r"), Some("30"));
    }

    #[test]
    fn test_custom_substitutes_source() {
        let profile = TranscoderProfile::custom(["-c", "cat {source}"]);
        let args = profile.args("/tmp/feed.ts");

        assert_eq!(args, vec!["-c".to_string(), "cat /tmp/feed.ts".to_string()]);
    }
}
