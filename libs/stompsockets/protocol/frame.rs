//! STOMP 1.2 frame encoding and decoding
//!
//! ```text
//! COMMAND\n
//! header1:value1\n
//! header2:value2\n
//! \n
//! body^@
//! ```
//!
//! A WebSocket text message may carry several frames back to back, and bare
//! EOLs between frames are heart-beats.

use crate::error::{Result, StompError};
use std::fmt;
use std::str::FromStr;

/// Protocol versions advertised in CONNECT
pub const ACCEPT_VERSION: &str = "1.2,1.1,1.0";

/// Heart-beat frame (a single EOL)
pub const HEARTBEAT: &str = "\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Connect,
    Connected,
    Send,
    Subscribe,
    Unsubscribe,
    Disconnect,
    Message,
    Receipt,
    Error,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Connected => "CONNECTED",
            Command::Send => "SEND",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Disconnect => "DISCONNECT",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Error => "ERROR",
        }
    }

    /// CONNECT and CONNECTED headers are never escaped
    fn escapes_headers(&self) -> bool {
        !matches!(self, Command::Connect | Command::Connected)
    }
}

impl FromStr for Command {
    type Err = StompError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            // STOMP is the 1.2 alias of CONNECT
            "CONNECT" | "STOMP" => Ok(Command::Connect),
            "CONNECTED" => Ok(Command::Connected),
            "SEND" => Ok(Command::Send),
            "SUBSCRIBE" => Ok(Command::Subscribe),
            "UNSUBSCRIBE" => Ok(Command::Unsubscribe),
            "DISCONNECT" => Ok(Command::Disconnect),
            "MESSAGE" => Ok(Command::Message),
            "RECEIPT" => Ok(Command::Receipt),
            "ERROR" => Ok(Command::Error),
            other => Err(StompError::Frame(format!("unknown command '{}'", other))),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single STOMP frame
///
/// Headers keep wire order; when a header repeats, the first value wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// CONNECT frame; caller headers cannot shadow the protocol ones
    pub fn connect<'a>(
        host: &str,
        heart_beat: (u64, u64),
        extra: impl IntoIterator<Item = (&'a String, &'a String)>,
    ) -> Self {
        let mut frame = Frame::new(Command::Connect)
            .header("accept-version", ACCEPT_VERSION)
            .header("host", host)
            .header("heart-beat", format!("{},{}", heart_beat.0, heart_beat.1));
        for (k, v) in extra {
            if frame.get_header(k).is_none() {
                frame.headers.push((k.clone(), v.clone()));
            }
        }
        frame
    }

    pub fn send(destination: &str, json_body: String) -> Self {
        Frame::new(Command::Send)
            .header("destination", destination)
            .header("content-type", "application/json")
            .body(json_body)
    }

    pub fn subscribe(id: &str, destination: &str) -> Self {
        Frame::new(Command::Subscribe)
            .header("id", id)
            .header("destination", destination)
            .header("ack", "auto")
    }

    pub fn unsubscribe(id: &str) -> Self {
        Frame::new(Command::Unsubscribe).header("id", id)
    }

    pub fn disconnect(receipt: &str) -> Self {
        Frame::new(Command::Disconnect).header("receipt", receipt)
    }

    /// Serialize to wire text, NUL terminated
    ///
    /// A `content-length` header is added for non-empty bodies unless one
    /// is already present.
    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(64 + self.body.len());
        out.push_str(self.command.as_str());
        out.push('\n');

        for (k, v) in &self.headers {
            if escape {
                out.push_str(&escape_header(k));
                out.push(':');
                out.push_str(&escape_header(v));
            } else {
                out.push_str(k);
                out.push(':');
                out.push_str(v);
            }
            out.push('\n');
        }

        if !self.body.is_empty() && self.get_header("content-length").is_none() {
            out.push_str("content-length:");
            out.push_str(&self.body.len().to_string());
            out.push('\n');
        }

        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }
}

/// Decode every frame contained in one WebSocket text message
///
/// Heart-beat EOLs produce no frames, so a pure heart-beat yields an empty
/// vector.
pub fn decode(data: &str) -> Result<Vec<Frame>> {
    let mut frames = Vec::new();
    let mut rest = data;

    loop {
        rest = rest.trim_start_matches(['\n', '\r']);
        if rest.is_empty() {
            break;
        }
        let (frame, consumed) = decode_one(rest)?;
        frames.push(frame);
        rest = &rest[consumed..];
    }

    Ok(frames)
}

fn decode_one(input: &str) -> Result<(Frame, usize)> {
    let mut pos = 0;
    let mut lines = Vec::new();

    loop {
        let nl = input[pos..]
            .find('\n')
            .ok_or_else(|| StompError::Frame("unterminated header block".into()))?;
        let line = input[pos..pos + nl].trim_end_matches('\r');
        pos += nl + 1;
        if line.is_empty() {
            break;
        }
        lines.push(line);
    }

    let mut lines = lines.into_iter();
    let command: Command = lines
        .next()
        .ok_or_else(|| StompError::Frame("missing command".into()))?
        .parse()?;

    let mut frame = Frame::new(command);
    for line in lines {
        let (k, v) = line
            .split_once(':')
            .ok_or_else(|| StompError::Frame(format!("malformed header '{}'", line)))?;
        if command.escapes_headers() {
            frame.headers.push((unescape_header(k)?, unescape_header(v)?));
        } else {
            frame.headers.push((k.to_string(), v.to_string()));
        }
    }

    let (body_end, consumed) = match frame.get_header("content-length") {
        Some(len) => {
            let len: usize = len
                .trim()
                .parse()
                .map_err(|_| StompError::Frame(format!("invalid content-length '{}'", len)))?;
            let end = pos
                .checked_add(len)
                .ok_or_else(|| StompError::Frame(format!("content-length {} out of range", len)))?;
            if input.as_bytes().get(end) != Some(&0) {
                return Err(StompError::Frame(
                    "body does not end with NUL at content-length".into(),
                ));
            }
            (end, end + 1)
        }
        None => {
            let nul = input[pos..]
                .find('\0')
                .ok_or_else(|| StompError::Frame("missing NUL terminator".into()))?;
            (pos + nul, pos + nul + 1)
        }
    };

    frame.body = input
        .get(pos..body_end)
        .ok_or_else(|| StompError::Frame("content-length splits a UTF-8 character".into()))?
        .to_string();

    Ok((frame, consumed))
}

fn escape_header(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            c => out.push(c),
        }
    }
    out
}

fn unescape_header(s: &str) -> Result<String> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            other => {
                return Err(StompError::Frame(format!(
                    "undefined escape sequence '\\{}'",
                    other.map(String::from).unwrap_or_default()
                )))
            }
        }
    }
    Ok(out)
}
