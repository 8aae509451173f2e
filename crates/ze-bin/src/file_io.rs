//! File loading and saving: encoding autodetection, line-ending
//! normalization, atomic writes.
//!
//! The core consumes normalized UTF-8 with bare LF line endings; this
//! module converts on the way in and restores the recorded convention
//! (and BOM) on the way out. Saves go through a temp file in the target
//! directory, fsync, then rename, so a failed write never corrupts the
//! original.

use anyhow::{bail, Context, Result};
use core_actions::LoadedFile;
use core_model::{Buffer, Encoding, FileMeta, LineEnding};
use core_state::Document;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

/// A NUL anywhere in this prefix marks the file as binary.
const BINARY_SCAN: usize = 8 * 1024;

/// Line-ending detection samples at most this many line breaks.
const LINE_SAMPLE: usize = 100;

pub fn load_file(path: &Path) -> Result<LoadedFile> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(LoadedFile::empty());
        }
        Err(e) => return Err(e).with_context(|| format!("cannot read {}", path.display())),
    };
    let meta = file_meta(path)?;

    if bytes[..bytes.len().min(BINARY_SCAN)].contains(&0) {
        bail!("{} looks like a binary file", path.display());
    }

    let (text, encoding, had_bom) = decode(&bytes, path)?;
    let line_ending = detect_line_ending(&text);
    let normalized = normalize_newlines(text);
    info!(
        target: "files.load",
        path = %path.display(),
        bytes = bytes.len(),
        ?encoding,
        ?line_ending,
        had_bom,
        "loaded"
    );
    Ok(LoadedFile {
        buffer: Buffer::from_bytes(normalized.into_bytes()),
        encoding,
        line_ending,
        had_bom,
        meta,
        new_file: false,
    })
}

fn decode(bytes: &[u8], path: &Path) -> Result<(String, Encoding, bool)> {
    if bytes.starts_with(&[0xFF, 0xFE]) {
        return Ok((decode_utf16(&bytes[2..], true, path)?, Encoding::Utf16Le, true));
    }
    if bytes.starts_with(&[0xFE, 0xFF]) {
        return Ok((decode_utf16(&bytes[2..], false, path)?, Encoding::Utf16Be, true));
    }
    let (body, had_bom) = match bytes.strip_prefix(&[0xEF, 0xBB, 0xBF][..]) {
        Some(rest) => (rest, true),
        None => (bytes, false),
    };
    let text = std::str::from_utf8(body)
        .map_err(|e| anyhow::anyhow!("{} is not valid UTF-8: {e}", path.display()))?
        .to_string();
    Ok((text, Encoding::Utf8, had_bom))
}

fn decode_utf16(bytes: &[u8], little: bool, path: &Path) -> Result<String> {
    if bytes.len() % 2 != 0 {
        bail!("{} has a truncated UTF-16 stream", path.display());
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| {
            if little {
                u16::from_le_bytes([c[0], c[1]])
            } else {
                u16::from_be_bytes([c[0], c[1]])
            }
        })
        .collect();
    char::decode_utf16(units.into_iter())
        .collect::<Result<String, _>>()
        .map_err(|e| anyhow::anyhow!("{} does not decode as UTF-16: {e}", path.display()))
}

/// Majority vote over the first [`LINE_SAMPLE`] line breaks.
fn detect_line_ending(text: &str) -> LineEnding {
    let mut crlf = 0usize;
    let mut lf = 0usize;
    let mut cr = 0usize;
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() && crlf + lf + cr < LINE_SAMPLE {
        match bytes[i] {
            b'\r' if bytes.get(i + 1) == Some(&b'\n') => {
                crlf += 1;
                i += 2;
            }
            b'\r' => {
                cr += 1;
                i += 1;
            }
            b'\n' => {
                lf += 1;
                i += 1;
            }
            _ => i += 1,
        }
    }
    if crlf > lf && crlf >= cr {
        LineEnding::CrLf
    } else if cr > lf && cr > crlf {
        LineEnding::Cr
    } else {
        LineEnding::Lf
    }
}

fn normalize_newlines(text: String) -> String {
    if !text.contains('\r') {
        return text;
    }
    text.replace("\r\n", "\n").replace('\r', "\n")
}

fn file_meta(path: &Path) -> Result<FileMeta> {
    let meta = fs::metadata(path)
        .with_context(|| format!("cannot stat {}", path.display()))?;
    Ok(FileMeta {
        mtime: meta.modified().ok(),
        size: meta.len(),
    })
}

/// Re-apply the document's line ending and BOM, write to a temp file in
/// the same directory, fsync, then rename over the destination.
pub fn save_file(doc: &Document) -> Result<FileMeta> {
    let path = doc
        .path
        .as_ref()
        .context("document has no file name")?;
    let text = doc.buffer.slice_string(0, doc.buffer.len());
    let with_endings = match doc.line_ending {
        LineEnding::Lf => text,
        LineEnding::CrLf => text.replace('\n', "\r\n"),
        LineEnding::Cr => text.replace('\n', "\r"),
    };
    let payload = encode(&with_endings, doc.encoding, doc.had_bom);

    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    let mut tmp = match dir {
        Some(dir) => tempfile::NamedTempFile::new_in(dir),
        None => tempfile::NamedTempFile::new_in("."),
    }
    .context("cannot create temporary save file")?;
    tmp.write_all(&payload).context("short write")?;
    tmp.as_file().sync_all().context("fsync failed")?;
    tmp.persist(path)
        .with_context(|| format!("cannot replace {}", path.display()))?;
    debug!(target: "files.save", path = %path.display(), bytes = payload.len(), "saved");
    file_meta(path)
}

fn encode(text: &str, encoding: Encoding, had_bom: bool) -> Vec<u8> {
    match encoding {
        Encoding::Utf8 => {
            let mut out = Vec::with_capacity(text.len() + 3);
            if had_bom {
                out.extend_from_slice(&[0xEF, 0xBB, 0xBF]);
            }
            out.extend_from_slice(text.as_bytes());
            out
        }
        Encoding::Utf16Le | Encoding::Utf16Be => {
            let little = encoding == Encoding::Utf16Le;
            let mut out = Vec::with_capacity(text.len() * 2 + 2);
            if had_bom {
                out.extend_from_slice(if little {
                    &[0xFF, 0xFE]
                } else {
                    &[0xFE, 0xFF]
                });
            }
            for unit in text.encode_utf16() {
                out.extend_from_slice(&if little {
                    unit.to_le_bytes()
                } else {
                    unit.to_be_bytes()
                });
            }
            out
        }
    }
}
