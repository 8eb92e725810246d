use std::fs;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use board_view::{FrameDecoder, OutboundMessage, PixelPoint, ViewerMessage};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 46100;
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_RETRY_MS: u64 = 100;
pub const DEFAULT_QUIET_MS: u64 = 250;
pub const DEFAULT_WIDTH: u32 = 1000;
pub const DEFAULT_HEIGHT: u32 = 800;
const MAX_RETRY_BACKOFF_MS: u64 = 1_000;
const READ_CHUNK_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommonOptions {
    pub host: String,
    pub port: u16,
    pub timeout_ms: u64,
    pub retry_ms: u64,
    pub width: u32,
    pub height: u32,
    /// Where received frames are written as PNG files. Frames are only
    /// summarised when unset.
    pub out_dir: Option<PathBuf>,
}

impl Default for CommonOptions {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            retry_ms: DEFAULT_RETRY_MS,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            out_dir: None,
        }
    }
}

pub enum CommandKind {
    Watch,
    Click { x: i32, y: i32 },
    Text { value: String },
    Script { path: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    Click(PixelPoint),
    Text(String),
    Resize { width: u32, height: u32 },
    Wait(Duration),
    Quit,
}

pub fn parse_script_commands(content: &str) -> Vec<String> {
    let mut commands = Vec::new();
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        commands.push(trimmed.to_string());
    }
    commands
}

pub fn parse_script(content: &str) -> Result<Vec<ScriptStep>, String> {
    parse_script_commands(content)
        .iter()
        .map(|line| parse_script_step(line))
        .collect::<Result<Vec<_>, _>>()
}

pub fn parse_script_step(line: &str) -> Result<ScriptStep, String> {
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };
    match verb {
        "click" => {
            let (x, y) = parse_two::<i32>(verb, rest)?;
            Ok(ScriptStep::Click(PixelPoint::new(x, y)))
        }
        "text" => {
            if rest.is_empty() {
                return Err("text requires a value".to_string());
            }
            Ok(ScriptStep::Text(rest.to_string()))
        }
        "resize" => {
            let (width, height) = parse_two::<u32>(verb, rest)?;
            Ok(ScriptStep::Resize { width, height })
        }
        "wait" => {
            let millis = rest
                .parse::<u64>()
                .map_err(|_| format!("invalid wait value '{rest}' (expected milliseconds)"))?;
            Ok(ScriptStep::Wait(Duration::from_millis(millis)))
        }
        "quit" if rest.is_empty() => Ok(ScriptStep::Quit),
        "quit" => Err("quit takes no arguments".to_string()),
        other => Err(format!("unknown script command '{other}'")),
    }
}

fn parse_two<T: std::str::FromStr>(verb: &str, rest: &str) -> Result<(T, T), String> {
    let parts = rest.split_whitespace().collect::<Vec<_>>();
    let [first, second] = parts.as_slice() else {
        return Err(format!("{verb} requires two numbers, got '{rest}'"));
    };
    let parse = |raw: &str| {
        raw.parse::<T>()
            .map_err(|_| format!("invalid {verb} value '{raw}'"))
    };
    Ok((parse(*first)?, parse(*second)?))
}

/// One-line description of a `STATE` payload.
pub fn summarize_state(payload: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(payload) else {
        return format!("{} bytes (unparsed)", payload.len());
    };
    let count = |key: &str| {
        value
            .get(key)
            .and_then(serde_json::Value::as_array)
            .map_or(0, Vec::len)
    };
    format!(
        "game={} turn={} players={} tiles={} adventurers={}",
        value
            .get("game_id")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("?"),
        value
            .get("turn")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(0),
        count("players"),
        count("play_area"),
        count("adventurers"),
    )
}

/// Writes `IMAGE` payloads to numbered PNG files.
#[derive(Debug)]
pub struct FrameSink {
    out_dir: Option<PathBuf>,
    frames: u32,
}

impl FrameSink {
    pub fn new(out_dir: Option<PathBuf>) -> Self {
        Self { out_dir, frames: 0 }
    }

    pub fn frames(&self) -> u32 {
        self.frames
    }

    /// Decodes one frame. Returns the file written, if any.
    pub fn save(&mut self, encoded: &str) -> Result<Option<PathBuf>, String> {
        let png = STANDARD
            .decode(encoded)
            .map_err(|error| format!("frame is not valid base64: {error}"))?;
        self.frames = self.frames.saturating_add(1);
        let Some(dir) = self.out_dir.as_deref() else {
            return Ok(None);
        };
        let path = frame_path(dir, self.frames);
        fs::write(&path, &png)
            .map_err(|error| format!("failed to write frame '{}': {error}", path.display()))?;
        Ok(Some(path))
    }
}

fn frame_path(dir: &Path, index: u32) -> PathBuf {
    dir.join(format!("frame_{index:04}.png"))
}

struct Session {
    stream: TcpStream,
    decoder: FrameDecoder,
    sink: FrameSink,
}

pub fn run<W: Write>(kind: CommandKind, opts: CommonOptions, stdout: &mut W) -> Result<(), String> {
    let timeout = Duration::from_millis(opts.timeout_ms);
    let retry_base = Duration::from_millis(opts.retry_ms.max(1));
    let quiet = Duration::from_millis(DEFAULT_QUIET_MS);
    if let Some(dir) = &opts.out_dir {
        fs::create_dir_all(dir).map_err(|error| {
            format!("failed to create output directory '{}': {error}", dir.display())
        })?;
    }

    let stream = connect_with_retry(&opts.host, opts.port, timeout, retry_base)?;
    let mut session = Session {
        stream,
        decoder: FrameDecoder::new(),
        sink: FrameSink::new(opts.out_dir.clone()),
    };
    send_message(
        &mut session.stream,
        &ViewerMessage::Start {
            width: opts.width,
            height: opts.height,
        },
    )?;

    match kind {
        CommandKind::Watch => watch(&mut session, timeout, stdout),
        CommandKind::Click { x, y } => {
            read_until_quiet(&mut session, timeout, quiet, stdout)?;
            send_message(
                &mut session.stream,
                &ViewerMessage::Coords(PixelPoint::new(x, y)),
            )?;
            read_until_quiet(&mut session, timeout, quiet, stdout)
        }
        CommandKind::Text { value } => {
            read_until_quiet(&mut session, timeout, quiet, stdout)?;
            send_message(&mut session.stream, &ViewerMessage::Text(value))?;
            read_until_quiet(&mut session, timeout, quiet, stdout)
        }
        CommandKind::Script { path } => {
            let content = fs::read_to_string(&path)
                .map_err(|error| format!("failed to read script file '{path}': {error}"))?;
            let steps = parse_script(&content)?;
            read_until_quiet(&mut session, timeout, quiet, stdout)?;
            for step in steps {
                match step {
                    ScriptStep::Click(point) => {
                        send_message(&mut session.stream, &ViewerMessage::Coords(point))?
                    }
                    ScriptStep::Text(value) => {
                        send_message(&mut session.stream, &ViewerMessage::Text(value))?
                    }
                    ScriptStep::Resize { width, height } => send_message(
                        &mut session.stream,
                        &ViewerMessage::Resize { width, height },
                    )?,
                    ScriptStep::Wait(duration) => {
                        read_until_quiet(&mut session, duration, duration, stdout)?;
                        continue;
                    }
                    ScriptStep::Quit => {
                        send_message(&mut session.stream, &ViewerMessage::Quit)?;
                        return Ok(());
                    }
                }
                read_until_quiet(&mut session, timeout, quiet, stdout)?;
            }
            Ok(())
        }
    }
}

fn connect_with_retry(
    host: &str,
    port: u16,
    timeout: Duration,
    retry_base: Duration,
) -> Result<TcpStream, String> {
    let deadline = Instant::now() + timeout;
    let mut attempt = 0u32;

    while Instant::now() < deadline {
        if let Ok(stream) = TcpStream::connect((host, port)) {
            stream
                .set_read_timeout(Some(Duration::from_millis(100)))
                .map_err(|error| format!("failed to set socket read timeout: {error}"))?;
            return Ok(stream);
        }

        let shift = attempt.min(8);
        let backoff_ms = (retry_base.as_millis() as u64)
            .saturating_mul(1u64 << shift)
            .min(MAX_RETRY_BACKOFF_MS);
        let sleep_for = Duration::from_millis(backoff_ms.max(1));
        if Instant::now() + sleep_for >= deadline {
            break;
        }
        thread::sleep(sleep_for);
        attempt = attempt.saturating_add(1);
    }

    Err(format!("timed out connecting to board host on {host}:{port}"))
}

/// Prints everything until the host goes away or `timeout` passes.
fn watch<W: Write>(session: &mut Session, timeout: Duration, stdout: &mut W) -> Result<(), String> {
    let deadline = Instant::now() + timeout;
    loop {
        match read_one_frame(session, deadline) {
            ReadOutcome::Frame(message) => emit_message(stdout, &mut session.sink, &message)?,
            ReadOutcome::NoData => {}
            ReadOutcome::Disconnected | ReadOutcome::DeadlineExceeded => return Ok(()),
            ReadOutcome::Malformed(error) => {
                return Err(format!("malformed frame from host: {error}"))
            }
            ReadOutcome::IoError(error) => {
                return Err(format!("socket read error while watching: {error}"))
            }
        }
    }
}

fn read_until_quiet<W: Write>(
    session: &mut Session,
    timeout: Duration,
    quiet_window: Duration,
    stdout: &mut W,
) -> Result<(), String> {
    let deadline = Instant::now() + timeout;
    let mut last_frame_at = Instant::now();
    let mut saw_any_frame = false;

    loop {
        match read_one_frame(session, deadline) {
            ReadOutcome::Frame(message) => {
                emit_message(stdout, &mut session.sink, &message)?;
                saw_any_frame = true;
                last_frame_at = Instant::now();
            }
            ReadOutcome::NoData => {
                let now = Instant::now();
                if (saw_any_frame && now.saturating_duration_since(last_frame_at) >= quiet_window)
                    || (!saw_any_frame && now + quiet_window >= deadline)
                {
                    return Ok(());
                }
            }
            ReadOutcome::Disconnected => {
                return Err("host disconnected while waiting for frames".to_string())
            }
            ReadOutcome::DeadlineExceeded => return Ok(()),
            ReadOutcome::Malformed(error) => {
                return Err(format!("malformed frame from host: {error}"))
            }
            ReadOutcome::IoError(error) => {
                return Err(format!("socket read error while waiting for frames: {error}"))
            }
        }
    }
}

fn emit_message<W: Write>(
    stdout: &mut W,
    sink: &mut FrameSink,
    message: &OutboundMessage,
) -> Result<(), String> {
    match message {
        OutboundMessage::Image(encoded) => match sink.save(encoded)? {
            Some(path) => {
                let _ = writeln!(stdout, "image: {}", path.display());
            }
            None => {
                let _ = writeln!(stdout, "image: frame {} ({} bytes)", sink.frames(), encoded.len());
            }
        },
        OutboundMessage::Prompt(text) => {
            let _ = writeln!(stdout, "prompt: {text}");
        }
        OutboundMessage::State(payload) => {
            let _ = writeln!(stdout, "state: {}", summarize_state(payload));
        }
    }
    Ok(())
}

fn send_message(stream: &mut TcpStream, message: &ViewerMessage) -> Result<(), String> {
    stream
        .write_all(message.to_frame().as_bytes())
        .map_err(|error| format!("failed to send message: {error}"))?;
    stream
        .flush()
        .map_err(|error| format!("failed to flush message: {error}"))
}

enum ReadOutcome {
    Frame(OutboundMessage),
    NoData,
    Disconnected,
    DeadlineExceeded,
    Malformed(String),
    IoError(io::Error),
}

fn read_one_frame(session: &mut Session, deadline: Instant) -> ReadOutcome {
    loop {
        match session.decoder.next_frame() {
            Ok(Some(frame)) => {
                return match OutboundMessage::from_frame(frame) {
                    Ok(message) => ReadOutcome::Frame(message),
                    Err(error) => ReadOutcome::Malformed(error.to_string()),
                }
            }
            Ok(None) => {}
            Err(error) => return ReadOutcome::Malformed(error.to_string()),
        }
        if Instant::now() >= deadline {
            return ReadOutcome::DeadlineExceeded;
        }

        let mut chunk = vec![0u8; READ_CHUNK_BYTES];
        match session.stream.read(&mut chunk) {
            Ok(0) => return ReadOutcome::Disconnected,
            Ok(read) => session.decoder.push_bytes(&chunk[..read]),
            Err(error)
                if error.kind() == io::ErrorKind::WouldBlock
                    || error.kind() == io::ErrorKind::TimedOut =>
            {
                return ReadOutcome::NoData
            }
            Err(error) => return ReadOutcome::IoError(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use super::*;

    #[test]
    fn parse_script_commands_ignores_blank_and_comment_lines() {
        let content = r#"
            # opening move
            click 120 340

            text 3
            # done
            quit
        "#;
        assert_eq!(
            parse_script_commands(content),
            vec![
                "click 120 340".to_string(),
                "text 3".to_string(),
                "quit".to_string()
            ]
        );
    }

    #[test]
    fn script_steps_parse_into_viewer_actions() {
        let steps = parse_script("click 10 -4\ntext  two words \nresize 640 480\nwait 50\nquit")
            .expect("parse");
        assert_eq!(
            steps,
            vec![
                ScriptStep::Click(PixelPoint::new(10, -4)),
                ScriptStep::Text("two words".to_string()),
                ScriptStep::Resize {
                    width: 640,
                    height: 480
                },
                ScriptStep::Wait(Duration::from_millis(50)),
                ScriptStep::Quit,
            ]
        );
    }

    #[test]
    fn bad_script_lines_are_reported() {
        assert!(parse_script_step("click 10").is_err());
        assert!(parse_script_step("click a b").is_err());
        assert!(parse_script_step("resize -1 2").is_err());
        assert!(parse_script_step("text").is_err());
        assert!(parse_script_step("wait soon").is_err());
        assert!(parse_script_step("quit now").is_err());
        assert_eq!(
            parse_script_step("jump 1 2"),
            Err("unknown script command 'jump'".to_string())
        );
    }

    #[test]
    fn state_summary_counts_collections() {
        let payload = r#"{"game_id":"g1","turn":4,"players":[{},{}],"play_area":[{},{},{}],"adventurers":[{}]}"#;
        assert_eq!(
            summarize_state(payload),
            "game=g1 turn=4 players=2 tiles=3 adventurers=1"
        );
        assert_eq!(summarize_state("not json"), "8 bytes (unparsed)");
    }

    #[test]
    fn frame_sink_writes_numbered_pngs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut sink = FrameSink::new(Some(dir.path().to_path_buf()));
        let png = [0x89, b'P', b'N', b'G'];
        let encoded = STANDARD.encode(png);

        let first = sink.save(&encoded).expect("save").expect("path");
        let second = sink.save(&encoded).expect("save").expect("path");
        assert_eq!(first, dir.path().join("frame_0001.png"));
        assert_eq!(second, dir.path().join("frame_0002.png"));
        assert_eq!(fs::read(&second).expect("read"), png.to_vec());
        assert!(sink.save("***").is_err());
    }

    #[test]
    fn frame_sink_without_directory_only_counts() {
        let mut sink = FrameSink::new(None);
        assert_eq!(sink.save(&STANDARD.encode(b"x")).expect("save"), None);
        assert_eq!(sink.frames(), 1);
    }

    #[test]
    fn click_command_sends_start_then_coords_and_prints_frames() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let host = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            stream
                .set_read_timeout(Some(Duration::from_secs(2)))
                .expect("timeout");
            let mut decoder = FrameDecoder::new();
            let mut received = Vec::new();
            let mut chunk = [0u8; 256];
            let greeting = OutboundMessage::Prompt("Your move".to_string()).to_frame();
            stream.write_all(greeting.as_bytes()).expect("write");
            loop {
                let read = stream.read(&mut chunk).expect("read");
                if read == 0 {
                    break;
                }
                decoder.push_bytes(&chunk[..read]);
                while let Some(frame) = decoder.next_frame().expect("frame") {
                    received.push(ViewerMessage::from_frame(frame).expect("message"));
                    if received.len() == 2 {
                        let ack = OutboundMessage::Prompt("Moved".to_string()).to_frame();
                        stream.write_all(ack.as_bytes()).expect("write");
                    }
                }
            }
            received
        });

        let options = CommonOptions {
            port,
            timeout_ms: 1_000,
            ..CommonOptions::default()
        };
        let mut output = Vec::new();
        run(CommandKind::Click { x: 5, y: 7 }, options, &mut output).expect("run");

        let received = host.join().expect("host thread");
        assert_eq!(
            received,
            vec![
                ViewerMessage::Start {
                    width: DEFAULT_WIDTH,
                    height: DEFAULT_HEIGHT
                },
                ViewerMessage::Coords(PixelPoint::new(5, 7)),
            ]
        );
        let printed = String::from_utf8(output).expect("utf8");
        assert!(printed.contains("prompt: Your move"));
        assert!(printed.contains("prompt: Moved"));
    }
}
