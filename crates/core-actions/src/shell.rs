//! Shell command pipeline: parse the source/body/sink grammar, run the
//! body under `/bin/sh -c`, capture bounded output.
//!
//! ```text
//! command := [source] command_body [sink]
//! source  := '.' (current line) | '%' (entire buffer) | absent (selection)
//! sink    := '>' (replace source) | '+>' (insert at cursor)
//!          | 'n>' (new document)  | absent (scratch output)
//! ```
//!
//! A leading `| ` is stripped. The sink is recognized only as a trailing
//! token outside single/double quotes. Cancellation sends SIGTERM, then
//! SIGKILL after 100 ms.

use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Captured stdout is cut off beyond this.
pub const STDOUT_CAP: usize = 8 * 1024 * 1024;

/// Escalation delay between SIGTERM and SIGKILL.
pub const CANCEL_KILL_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellSource {
    /// No marker: the active selection.
    Selection,
    /// `.`: the current line.
    Line,
    /// `%`: the entire buffer.
    Buffer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellSink {
    /// No marker: output goes to the scratch output document.
    Scratch,
    /// `>`: replace the source span.
    Replace,
    /// `+>`: insert at the cursor.
    InsertAtCursor,
    /// `n>`: a new document.
    NewDocument,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellSpec {
    pub source: ShellSource,
    pub body: String,
    pub sink: ShellSink,
}

#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    #[error("empty shell command")]
    EmptyCommand,
    #[error("shell spawn failed: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Parse a pipeline command line into source, body and sink.
pub fn parse(input: &str) -> ShellSpec {
    let mut rest = input.trim();

    let source = match rest.as_bytes().first() {
        Some(b'.') if source_marker(rest) => {
            rest = rest[1..].trim_start();
            ShellSource::Line
        }
        Some(b'%') if source_marker(rest) => {
            rest = rest[1..].trim_start();
            ShellSource::Buffer
        }
        _ => ShellSource::Selection,
    };

    // Optional pipe prefix between source and body.
    if let Some(stripped) = rest.strip_prefix('|') {
        rest = stripped.trim_start();
    }

    let (body, sink) = split_sink(rest);
    ShellSpec {
        source,
        body: body.to_string(),
        sink,
    }
}

/// A source marker must be a standalone token, not the start of a command
/// word such as `./script`.
fn source_marker(rest: &str) -> bool {
    match rest.as_bytes().get(1) {
        None => true,
        Some(&b) => b == b' ' || b == b'\t' || b == b'|',
    }
}

/// Scan for a trailing sink token outside quotes.
fn split_sink(body: &str) -> (&str, ShellSink) {
    let tokens = tokenize(body);
    if let Some(last) = tokens.last() {
        if !last.quoted {
            let sink = match last.text {
                ">" => Some(ShellSink::Replace),
                "+>" => Some(ShellSink::InsertAtCursor),
                "n>" => Some(ShellSink::NewDocument),
                _ => None,
            };
            if let Some(sink) = sink {
                return (body[..last.start].trim_end(), sink);
            }
        }
    }
    (body.trim_end(), ShellSink::Scratch)
}

struct Token<'a> {
    text: &'a str,
    start: usize,
    quoted: bool,
}

/// Whitespace tokenizer honouring single and double quotes. Quotes stay in
/// the token text; `quoted` marks tokens containing any quoted span.
fn tokenize(input: &str) -> Vec<Token<'_>> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        while i < bytes.len() && (bytes[i] == b' ' || bytes[i] == b'\t') {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }
        let start = i;
        let mut quoted = false;
        let mut quote: Option<u8> = None;
        while i < bytes.len() {
            let b = bytes[i];
            match quote {
                Some(q) => {
                    if b == q {
                        quote = None;
                    }
                }
                None => {
                    if b == b'\'' || b == b'"' {
                        quote = Some(b);
                        quoted = true;
                    } else if b == b' ' || b == b'\t' {
                        break;
                    }
                }
            }
            i += 1;
        }
        tokens.push(Token {
            text: &input[start..i],
            start,
            quoted,
        });
    }
    tokens
}

#[derive(Debug)]
pub struct ShellOutput {
    pub stdout: Vec<u8>,
    /// First line of stderr, for the status line.
    pub stderr_line: String,
    pub status: i32,
    pub truncated: bool,
    pub cancelled: bool,
}

impl ShellOutput {
    pub fn ok(&self) -> bool {
        self.status == 0 && !self.cancelled
    }
}

/// Run `body` under `/bin/sh -c` with `stdin` piped in. `cancel` is polled
/// while waiting; when it reports true the child gets SIGTERM and, after
/// [`CANCEL_KILL_DELAY`], SIGKILL.
pub fn run(
    body: &str,
    stdin: &[u8],
    cancel: &mut dyn FnMut() -> bool,
) -> Result<ShellOutput, ShellError> {
    if body.trim().is_empty() {
        return Err(ShellError::EmptyCommand);
    }
    debug!(target: "actions.shell", body_len = body.len(), stdin_len = stdin.len(), "spawn");
    let mut child = Command::new("/bin/sh")
        .arg("-c")
        .arg(body)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let pid = child.id() as libc::pid_t;

    // Feed stdin from a helper thread so a child that floods stdout before
    // draining stdin cannot deadlock the main loop.
    let mut stdin_pipe = child.stdin.take().expect("stdin piped");
    let input = stdin.to_vec();
    let feeder = std::thread::spawn(move || {
        let _ = stdin_pipe.write_all(&input);
    });

    let mut stdout_pipe = child.stdout.take().expect("stdout piped");
    let mut stderr_pipe = child.stderr.take().expect("stderr piped");
    let stdout_reader = std::thread::spawn(move || {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 8192];
        let mut truncated = false;
        loop {
            match stdout_pipe.read(&mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if buf.len() < STDOUT_CAP {
                        let take = n.min(STDOUT_CAP - buf.len());
                        buf.extend_from_slice(&chunk[..take]);
                        truncated |= take < n;
                    } else {
                        truncated = true;
                    }
                }
            }
        }
        (buf, truncated)
    });
    let stderr_reader = std::thread::spawn(move || {
        let mut s = String::new();
        let _ = stderr_pipe.read_to_string(&mut s);
        s
    });

    // Wait for exit, polling for cancellation.
    let mut cancelled = false;
    let mut term_sent_at: Option<Instant> = None;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        match term_sent_at {
            None => {
                if cancel() {
                    cancelled = true;
                    // SAFETY: pid names our still-running child.
                    unsafe {
                        libc::kill(pid, libc::SIGTERM);
                    }
                    term_sent_at = Some(Instant::now());
                    warn!(target: "actions.shell", "cancelled_sigterm");
                }
            }
            Some(at) if at.elapsed() >= CANCEL_KILL_DELAY => {
                let _ = child.kill();
                term_sent_at = Some(at + Duration::from_secs(3600));
            }
            Some(_) => {}
        }
        std::thread::sleep(Duration::from_millis(5));
    };

    let _ = feeder.join();
    let (stdout, truncated) = stdout_reader.join().unwrap_or((Vec::new(), false));
    let stderr = stderr_reader.join().unwrap_or_default();
    let stderr_line = stderr.lines().next().unwrap_or("").to_string();

    Ok(ShellOutput {
        stdout,
        stderr_line,
        status: status.code().unwrap_or(-1),
        truncated,
        cancelled,
    })
}
