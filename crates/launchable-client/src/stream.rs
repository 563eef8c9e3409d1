//! Streaming upload payload construction.
//!
//! The payload is `{"events": [e0,e1,...]}` where each element is a
//! serialized [`TestCaseEvent`]. Events arrive from a lazy iterator and
//! leave as compressed bytes; nothing ever holds the whole payload, so
//! memory stays bounded at one event regardless of how many reports were
//! scanned.

use std::io::{self, Read};

use flate2::read::GzEncoder;
use flate2::Compression;

use launchable_core::TestCaseEvent;

enum State {
    Head,
    Body { first: bool },
    Done,
}

/// Adapts an event iterator into the JSON-array envelope as an
/// [`io::Read`] byte stream.
///
/// Comma placement is driven by a first-element flag rather than
/// lookahead, so the upstream iterator is pulled exactly once per event.
/// The output is valid JSON only once the closing `]}` has been read. An
/// `Err` from the iterator surfaces as an I/O error, which aborts the
/// in-flight request body.
pub struct EventStream<I> {
    events: I,
    state: State,
    buf: Vec<u8>,
    pos: usize,
}

impl<I> EventStream<I>
where
    I: Iterator<Item = anyhow::Result<TestCaseEvent>>,
{
    pub fn new(events: I) -> Self {
        EventStream {
            events,
            state: State::Head,
            buf: Vec::new(),
            pos: 0,
        }
    }

    /// Refill the internal buffer with the next fragment. Empty buffer
    /// afterwards means the stream is exhausted.
    fn refill(&mut self) -> io::Result<()> {
        self.buf.clear();
        self.pos = 0;

        match self.state {
            State::Head => {
                self.buf.extend_from_slice(b"{\"events\": [");
                self.state = State::Body { first: true };
            }
            State::Body { first } => match self.events.next() {
                Some(Ok(event)) => {
                    if !first {
                        self.buf.push(b',');
                    }
                    let serialized = serde_json::to_vec(&event)
                        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                    self.buf.extend_from_slice(&serialized);
                    self.state = State::Body { first: false };
                }
                Some(Err(e)) => {
                    self.state = State::Done;
                    return Err(io::Error::new(io::ErrorKind::InvalidData, format!("{:#}", e)));
                }
                None => {
                    self.buf.extend_from_slice(b"]}");
                    self.state = State::Done;
                }
            },
            State::Done => {}
        }
        Ok(())
    }
}

impl<I> Read for EventStream<I>
where
    I: Iterator<Item = anyhow::Result<TestCaseEvent>>,
{
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        while self.pos >= self.buf.len() {
            if matches!(self.state, State::Done) {
                return Ok(0);
            }
            self.refill()?;
        }

        let n = (self.buf.len() - self.pos).min(out.len());
        out[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Wrap an event iterator into a gzip-compressed payload reader, ready to
/// become a request body.
pub fn gzip_events<I>(events: I) -> GzEncoder<EventStream<I>>
where
    I: Iterator<Item = anyhow::Result<TestCaseEvent>>,
{
    GzEncoder::new(EventStream::new(events), Compression::default())
}
