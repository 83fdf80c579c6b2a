//! Plain-text input vector format consumed by both softmax implementations.
//!
//! Layout:
//! - line 1: element count `N` as a decimal integer
//! - then `N` decimal values with a fixed number of fractional digits, separated by single
//!   spaces, followed by one trailing space and a newline.
//!
//! Values are formatted in batches so that writing a 10^8 element file needs one batch
//! of text in memory, not the whole body.

use std::{
    fmt::Write as _,
    fs::{self, File},
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
};

use anyhow::{bail, ensure, Context, Result};

use crate::synth::VectorSynth;

pub const DEFAULT_BATCH_SIZE: usize = 10_000;
pub const DEFAULT_PRECISION: usize = 6;
/// Longest token the scanner accepts before declaring the body malformed.
const MAX_TOKEN_LEN: usize = 64;

/// Streams every value of `synth` into `writer`. Returns the number of values written.
pub fn write_vector<W: Write>(
    writer: &mut W,
    synth: &mut VectorSynth,
    batch_size: usize,
    precision: usize,
) -> Result<usize> {
    ensure!(batch_size > 0, "batch size must be positive");
    let total = synth.len();
    writeln!(writer, "{total}")?;

    let mut batch = Vec::with_capacity(batch_size.min(total));
    let mut text = String::new();
    let mut written = 0;
    loop {
        let count = synth.next_batch(&mut batch, batch_size);
        if count == 0 {
            break;
        }
        written += count;
        format_batch(&mut text, &batch, precision, written < total);
        writer.write_all(text.as_bytes())?;
    }
    writer.write_all(b" \n")?;
    Ok(written)
}

/// Writes an in-memory vector in the same format as [`write_vector`].
pub fn write_values<W: Write>(
    writer: &mut W,
    values: &[f32],
    batch_size: usize,
    precision: usize,
) -> Result<()> {
    ensure!(batch_size > 0, "batch size must be positive");
    writeln!(writer, "{}", values.len())?;
    let mut text = String::new();
    let mut written = 0;
    for chunk in values.chunks(batch_size) {
        written += chunk.len();
        format_batch(&mut text, chunk, precision, written < values.len());
        writer.write_all(text.as_bytes())?;
    }
    writer.write_all(b" \n")?;
    Ok(())
}

fn format_batch(text: &mut String, batch: &[f32], precision: usize, more_follow: bool) {
    text.clear();
    for (idx, value) in batch.iter().enumerate() {
        if idx > 0 {
            text.push(' ');
        }
        let _ = write!(text, "{value:.precision$}");
    }
    if more_follow {
        text.push(' ');
    }
}

/// Creates (or truncates) `path` and streams the synthesized vector into it.
pub fn write_vector_file(
    path: impl AsRef<Path>,
    synth: &mut VectorSynth,
    batch_size: usize,
    precision: usize,
) -> Result<usize> {
    let path = path.as_ref();
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let written = write_vector(&mut writer, synth, batch_size, precision)
        .with_context(|| format!("failed to write vector to {}", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("failed to flush {}", path.display()))?;
    Ok(written)
}

/// Reads an input vector file back, checking the declared count against the values present.
/// Holds the whole file in memory; use [`scan_vector_file`] for large vectors.
pub fn read_vector_file(path: impl AsRef<Path>) -> Result<Vec<f64>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_vector_text(&text).with_context(|| format!("malformed vector file {}", path.display()))
}

/// Parses the text form. Values are returned as `f64` so the decimal text survives unchanged.
pub fn parse_vector_text(text: &str) -> Result<Vec<f64>> {
    let (header, body) = match text.split_once('\n') {
        Some(parts) => parts,
        None => (text, ""),
    };
    let declared = parse_header(header)?;

    let mut values = Vec::with_capacity(declared);
    for token in body.split_whitespace() {
        values.push(parse_value(token, values.len())?);
    }
    check_count(declared, values.len())?;
    Ok(values)
}

/// Validates a vector file in one streaming pass and returns its element count.
///
/// Every value is parsed but none are kept, so memory stays at one read buffer no matter
/// how large the vector is.
pub fn scan_vector_file(path: impl AsRef<Path>) -> Result<usize> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    scan_vector(BufReader::new(file))
        .with_context(|| format!("malformed vector file {}", path.display()))
}

/// Streaming counterpart of [`parse_vector_text`] over any buffered reader.
pub fn scan_vector<R: BufRead>(mut reader: R) -> Result<usize> {
    let mut header = String::new();
    reader
        .read_line(&mut header)
        .context("failed to read element count line")?;
    let declared = parse_header(&header)?;

    let mut count = 0usize;
    let mut token: Vec<u8> = Vec::with_capacity(MAX_TOKEN_LEN);
    loop {
        let chunk = reader.fill_buf().context("failed to read vector body")?;
        if chunk.is_empty() {
            break;
        }
        let consumed = chunk.len();
        for &byte in chunk {
            if byte.is_ascii_whitespace() {
                if !token.is_empty() {
                    parse_token_bytes(&token, count)?;
                    count += 1;
                    token.clear();
                }
            } else {
                ensure!(
                    token.len() < MAX_TOKEN_LEN,
                    "value at index {count} is longer than {MAX_TOKEN_LEN} bytes"
                );
                token.push(byte);
            }
        }
        reader.consume(consumed);
    }
    if !token.is_empty() {
        parse_token_bytes(&token, count)?;
        count += 1;
    }
    check_count(declared, count)?;
    Ok(count)
}

fn parse_header(line: &str) -> Result<usize> {
    let header = line.trim();
    if header.is_empty() {
        bail!("missing element count line");
    }
    header
        .parse()
        .with_context(|| format!("invalid element count '{header}'"))
}

fn parse_value(token: &str, index: usize) -> Result<f64> {
    token
        .parse()
        .with_context(|| format!("invalid value '{token}' at index {index}"))
}

fn parse_token_bytes(token: &[u8], index: usize) -> Result<f64> {
    let text = std::str::from_utf8(token)
        .with_context(|| format!("value at index {index} is not valid UTF-8"))?;
    parse_value(text, index)
}

fn check_count(declared: usize, found: usize) -> Result<()> {
    if declared != found {
        bail!("file declared {declared} values but contains {found}");
    }
    Ok(())
}
