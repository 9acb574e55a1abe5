//! Section splitting, in both execution modes.
//!
//! Blocking: the whole input is split into per-section line buffers which
//! are then decoded one after another. Incremental: a task is started per
//! recognized section as soon as its header is seen, and each line is
//! pushed to that task's queue while reading continues; the reader never
//! waits on a decoder and decoders never block the reader.

use chart_model::Song;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    config::DecodeConfig,
    error::DecodeError,
    sections::{self, SectionDecoder},
};

pub(crate) struct RawSection<'a> {
    pub header: &'a str,
    pub lines: Vec<&'a str>,
}

fn parse_header(line: &str) -> Option<&str> {
    line.strip_prefix('[')?.strip_suffix(']')
}

/// Split raw input into sections delimited by a `[Header]` line, an
/// opening `{`, and a closing `}`. Reaching end of input inside a section
/// is a hard error naming the offending header.
pub(crate) fn split_sections(src: &str) -> Result<Vec<RawSection<'_>>, DecodeError> {
    let mut out: Vec<RawSection> = Vec::new();
    let mut pending: Option<&str> = None;
    let mut inside = false;

    for raw in src.lines() {
        let line = raw.trim();
        if inside {
            if line == "}" {
                inside = false;
                pending = None;
            } else if !line.is_empty() {
                if let Some(section) = out.last_mut() {
                    section.lines.push(raw);
                }
            }
            continue;
        }
        if let Some(header) = pending {
            if line.is_empty() {
                continue;
            }
            if line == "{" {
                out.push(RawSection {
                    header,
                    lines: Vec::new(),
                });
                inside = true;
            } else {
                // Closing marker never seen for this header.
                return Err(DecodeError::UnterminatedSection {
                    section: header.to_string(),
                });
            }
            continue;
        }
        if let Some(header) = parse_header(line) {
            pending = Some(header);
        } else if !line.is_empty() {
            debug!(line, "skipping content outside any section");
        }
    }

    if inside || pending.is_some() {
        let header = out
            .last()
            .filter(|_| inside)
            .map(|s| s.header)
            .or(pending)
            .unwrap_or_default();
        return Err(DecodeError::UnterminatedSection {
            section: header.to_string(),
        });
    }
    Ok(out)
}

/// Decode the already-split input sequentially (blocking mode).
pub(crate) fn decode_sections(
    src: &str,
    config: &DecodeConfig,
) -> Result<Song, DecodeError> {
    let raw_sections = split_sections(src)?;
    let mut decoders: Vec<Box<dyn SectionDecoder>> = Vec::new();
    for raw in raw_sections {
        let Some(mut decoder) = sections::decoder_for(raw.header, config) else {
            debug!(header = raw.header, "skipping unrecognized section");
            continue;
        };
        for line in raw.lines {
            decoder.feed(line)?;
        }
        decoder.finalize()?;
        decoders.push(decoder);
    }
    assemble(decoders)
}

fn assemble(decoders: Vec<Box<dyn SectionDecoder>>) -> Result<Song, DecodeError> {
    let mut song = Song::default();
    for decoder in decoders {
        decoder.apply(&mut song)?;
    }
    Ok(song)
}

struct SectionTask {
    sender: Option<mpsc::UnboundedSender<String>>,
    handle: JoinHandle<Result<Option<Box<dyn SectionDecoder>>, DecodeError>>,
}

fn spawn_section_task(
    mut decoder: Box<dyn SectionDecoder>,
    header: String,
    cancel: CancellationToken,
) -> SectionTask {
    let (sender, mut receiver) = mpsc::unbounded_channel::<String>();
    let handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(header, "section decode task cancelled");
                    return Ok(None);
                }
                line = receiver.recv() => match line {
                    Some(line) => decoder.feed(&line)?,
                    // Channel closed: no more input for this section.
                    None => break,
                }
            }
        }
        decoder.finalize()?;
        Ok(Some(decoder))
    });
    SectionTask {
        sender: Some(sender),
        handle,
    }
}

/// Decode incrementally from an async source, one concurrent decode task
/// per section, pushing lines while reading. Cancelling the token stops
/// the reader loop and all in-flight tasks promptly; already-finalized
/// sections are still assembled, cancelled ones are never queried.
pub(crate) async fn decode_stream<R>(
    reader: R,
    config: &DecodeConfig,
    cancel: CancellationToken,
) -> Result<Song, DecodeError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut tasks: Vec<SectionTask> = Vec::new();
    // Header of the section currently being fed, plus the index into
    // `tasks` for it; the index is None while inside an unrecognized
    // (skipped) section.
    let mut inside: Option<String> = None;
    let mut feeding: Option<usize> = None;
    let mut pending: Option<String> = None;
    let mut first_error: Option<DecodeError> = None;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("streaming read cancelled");
                break;
            }
            next = lines.next_line() => next,
        };
        let raw = match next {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                if let Some(header) = inside.take().or_else(|| pending.take()) {
                    first_error = Some(DecodeError::UnterminatedSection { section: header });
                }
                break;
            }
            Err(e) => {
                first_error = Some(e.into());
                break;
            }
        };
        let line = raw.trim();

        if inside.is_some() {
            if line == "}" {
                if let Some(i) = feeding.take() {
                    // Dropping the sender signals end-of-section.
                    tasks[i].sender = None;
                }
                inside = None;
            } else if !line.is_empty() {
                if let Some(i) = feeding {
                    if let Some(sender) = &tasks[i].sender {
                        // The task only stops receiving on cancellation,
                        // which the loop above also observes.
                        let _ = sender.send(raw);
                    }
                }
            }
            continue;
        }

        if let Some(header) = pending.take() {
            if line.is_empty() {
                pending = Some(header);
                continue;
            }
            if line == "{" {
                feeding = match sections::decoder_for(&header, config) {
                    Some(decoder) => {
                        tasks.push(spawn_section_task(
                            decoder,
                            header.clone(),
                            cancel.clone(),
                        ));
                        Some(tasks.len() - 1)
                    }
                    None => {
                        debug!(header, "skipping unrecognized section");
                        None
                    }
                };
                inside = Some(header);
            } else {
                first_error = Some(DecodeError::UnterminatedSection { section: header });
                break;
            }
            continue;
        }

        if let Some(header) = parse_header(line) {
            pending = Some(header.to_string());
        } else if !line.is_empty() {
            debug!(line, "skipping content outside any section");
        }
    }

    // Close every remaining queue so in-flight tasks run to completion,
    // then join them all; one failed section must not prevent the others
    // from finishing, but the first fatal error wins.
    let mut decoders: Vec<Box<dyn SectionDecoder>> = Vec::new();
    for mut task in tasks {
        task.sender = None;
        match task.handle.await {
            Ok(Ok(Some(decoder))) => decoders.push(decoder),
            Ok(Ok(None)) => {}
            Ok(Err(e)) => {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
            Err(join) => {
                if first_error.is_none() {
                    first_error = Some(DecodeError::Worker(join.to_string()));
                }
            }
        }
    }

    if let Some(error) = first_error {
        return Err(error);
    }
    assemble(decoders)
}
