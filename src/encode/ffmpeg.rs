use std::process::Stdio;

use tokio::process::Command;

use crate::foundation::error::{BrawlError, BrawlResult};

/// Fixed encoder contract: raw RGB24 frames on stdin, constant-bitrate low-latency H.264 in an
/// FLV container pushed to `{ingest_url}/{stream_key}`.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EncoderProfile {
    /// Executable to spawn.
    pub program: String,
    /// Arguments placed before the generated ones. Lets tests and wrappers stand in for ffmpeg.
    pub leading_args: Vec<String>,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub bitrate_kbps: u32,
    pub ingest_url: String,
}

impl Default for EncoderProfile {
    fn default() -> Self {
        Self {
            program: "ffmpeg".to_string(),
            leading_args: Vec::new(),
            width: 1280,
            height: 720,
            fps: 30,
            bitrate_kbps: 2048,
            ingest_url: "rtmp://restreamer:1935/live".to_string(),
        }
    }
}

impl EncoderProfile {
    pub fn validate(&self) -> BrawlResult<()> {
        if self.program.trim().is_empty() {
            return Err(BrawlError::validation("encoder program must not be empty"));
        }
        if self.width == 0 || self.height == 0 {
            return Err(BrawlError::validation("output width/height must be non-zero"));
        }
        if !self.width.is_multiple_of(2) || !self.height.is_multiple_of(2) {
            return Err(BrawlError::validation(
                "output width/height must be even (required for yuv420p)",
            ));
        }
        if self.fps == 0 {
            return Err(BrawlError::validation("fps must be non-zero"));
        }
        if self.bitrate_kbps == 0 {
            return Err(BrawlError::validation("bitrate must be non-zero"));
        }
        Ok(())
    }

    /// Size in bytes of one raw input frame.
    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    pub fn output_url(&self, stream_key: &str) -> String {
        format!("{}/{}", self.ingest_url.trim_end_matches('/'), stream_key)
    }

    /// The full argument list after [`leading_args`](Self::leading_args).
    pub fn args(&self, stream_key: &str) -> Vec<String> {
        let size = format!("{}x{}", self.width, self.height);
        let fps = self.fps.to_string();
        let rate = format!("{}k", self.bitrate_kbps);
        let gop = (self.fps * 2).to_string();
        let (size, fps, rate, gop) = (size.as_str(), fps.as_str(), rate.as_str(), gop.as_str());

        let mut args: Vec<String> = self.leading_args.clone();
        // raw input on stdin
        args.extend(
            [
                "-f", "rawvideo", "-vcodec", "rawvideo", "-s", size, "-pix_fmt", "rgb24", "-r", fps,
                "-i", "pipe:0",
            ]
            .map(String::from),
        );
        args.extend(
            [
                "-c:v", "libx264", "-preset", "veryfast", "-tune", "zerolatency", "-b:v", rate,
                "-minrate", rate, "-maxrate", rate, "-bufsize", rate, "-nal-hrd", "cbr",
                "-pix_fmt", "yuv420p", "-profile:v", "main", "-level", "3.1", "-g", gop, "-an",
            ]
            .map(String::from),
        );
        args.extend(["-f", "flv", "-flvflags", "no_duration_filesize"].map(String::from));
        args.push(self.output_url(stream_key));
        args
    }

    /// Human-readable command line, for logs and the `args` subcommand.
    pub fn command_line(&self, stream_key: &str) -> String {
        std::iter::once(self.program.clone())
            .chain(self.args(stream_key).into_iter().map(|a| shell_quote(&a)))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// A ready-to-spawn encoder process with piped stdin and stderr.
    pub fn command(&self, stream_key: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.args(stream_key))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=+,@%".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
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
    fn default_args_match_contract() {
        let p = EncoderProfile::default();
        let args = p.args("key1");
        assert_eq!(value_after(&args, "-s"), Some("1280x720"));
        assert_eq!(value_after(&args, "-r"), Some("30"));
        assert_eq!(value_after(&args, "-i"), Some("pipe:0"));
        assert_eq!(value_after(&args, "-tune"), Some("zerolatency"));
        assert_eq!(value_after(&args, "-b:v"), Some("2048k"));
        assert_eq!(value_after(&args, "-nal-hrd"), Some("cbr"));
        assert_eq!(value_after(&args, "-g"), Some("60"));
        assert!(args.iter().any(|a| a == "-an"));
        assert_eq!(
            args.last().map(String::as_str),
            Some("rtmp://restreamer:1935/live/key1")
        );
        // input pixel format comes before the input, output format after it
        let pix: Vec<_> = args
            .iter()
            .enumerate()
            .filter(|(_, a)| *a == "-pix_fmt")
            .map(|(i, _)| args[i + 1].as_str())
            .collect();
        assert_eq!(pix, ["rgb24", "yuv420p"]);
    }

    #[test]
    fn leading_args_come_first() {
        let p = EncoderProfile {
            program: "sh".into(),
            leading_args: vec!["-c".into(), "cat >/dev/null".into()],
            ..EncoderProfile::default()
        };
        let args = p.args("k");
        assert_eq!(&args[..2], ["-c", "cat >/dev/null"]);
        assert!(p.command_line("k").starts_with("sh -c 'cat >/dev/null' -f rawvideo"));
    }

    #[test]
    fn trailing_slash_in_ingest_is_ignored() {
        let p = EncoderProfile {
            ingest_url: "rtmp://host/live/".into(),
            ..EncoderProfile::default()
        };
        assert_eq!(p.output_url("abc"), "rtmp://host/live/abc");
    }

    #[test]
    fn validate_rejects_odd_sizes_and_zero_rates() {
        assert!(EncoderProfile::default().validate().is_ok());
        let odd = EncoderProfile {
            width: 1281,
            ..EncoderProfile::default()
        };
        assert!(odd.validate().is_err());
        let still = EncoderProfile {
            fps: 0,
            ..EncoderProfile::default()
        };
        assert!(still.validate().is_err());
        assert_eq!(EncoderProfile::default().frame_bytes(), 1280 * 720 * 3);
    }
}
