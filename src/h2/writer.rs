use crate::types::{Frame, FrameSink, ProtocolError};
use bytes::Bytes;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, trace};

/// How the request body is cut into DATA frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChunkingPolicy {
    /// One DATA frame for the whole body (split only if it exceeds MAX_FRAME_SIZE).
    #[default]
    Whole,
    /// One DATA frame per body byte, sleeping `pacing` between frames.
    PerByte { pacing: Duration },
    /// One DATA frame per line, newline included, sleeping `pacing` between frames.
    PerLine { pacing: Duration },
}

impl ChunkingPolicy {
    pub fn pacing(&self) -> Option<Duration> {
        match self {
            ChunkingPolicy::Whole => None,
            ChunkingPolicy::PerByte { pacing } | ChunkingPolicy::PerLine { pacing } => {
                Some(*pacing).filter(|d| !d.is_zero())
            }
        }
    }

    /// Cuts `body` into logical units. Concatenating the units yields `body`.
    pub fn split(&self, body: &Bytes) -> Vec<Bytes> {
        if body.is_empty() {
            return Vec::new();
        }

        match self {
            ChunkingPolicy::Whole => vec![body.clone()],
            ChunkingPolicy::PerByte { .. } => {
                (0..body.len()).map(|i| body.slice(i..i + 1)).collect()
            }
            ChunkingPolicy::PerLine { .. } => {
                let mut units = Vec::new();
                let mut start = 0;
                for (i, byte) in body.iter().enumerate() {
                    if *byte == b'\n' {
                        units.push(body.slice(start..=i));
                        start = i + 1;
                    }
                }
                if start < body.len() {
                    units.push(body.slice(start..));
                }
                units
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Completed { frames: usize, body_bytes: usize },
    /// The response side terminated, or the deadline passed, before the body
    /// was fully sent.
    Interrupted { frames: usize, body_bytes: usize },
}

impl WriteOutcome {
    pub fn frames(&self) -> usize {
        match self {
            WriteOutcome::Completed { frames, .. } | WriteOutcome::Interrupted { frames, .. } => {
                *frames
            }
        }
    }

    pub fn body_bytes(&self) -> usize {
        match self {
            WriteOutcome::Completed { body_bytes, .. }
            | WriteOutcome::Interrupted { body_bytes, .. } => *body_bytes,
        }
    }
}

/// Emits one request on a single stream: HEADERS, then the body as DATA.
#[derive(Debug, Clone)]
pub struct RequestStreamWriter {
    stream_id: u32,
    chunking: ChunkingPolicy,
    end_stream: bool,
    max_frame_size: usize,
    send_budget: Option<u64>,
    deadline: Option<Instant>,
}

impl RequestStreamWriter {
    pub fn new(stream_id: u32, chunking: ChunkingPolicy, max_frame_size: u32) -> Self {
        Self {
            stream_id,
            chunking,
            end_stream: false,
            max_frame_size: max_frame_size as usize,
            send_budget: None,
            deadline: None,
        }
    }

    pub fn end_stream(mut self, end_stream: bool) -> Self {
        self.end_stream = end_stream;
        self
    }

    /// Flow-control credit available for the body; larger bodies are refused.
    pub fn send_budget(mut self, budget: u64) -> Self {
        self.send_budget = Some(budget);
        self
    }

    /// No frame is started after `deadline`, and a write still pending when it
    /// passes is abandoned.
    pub fn deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    fn expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Writes one frame, returning false if the deadline passed first.
    async fn write_before_deadline<S>(
        &self,
        sink: &mut S,
        frame: Frame,
    ) -> Result<bool, ProtocolError>
    where
        S: FrameSink + ?Sized,
    {
        match self.deadline {
            Some(deadline) => {
                match tokio::time::timeout_at(deadline, sink.write_frame(frame)).await {
                    Ok(result) => result.map(|()| true),
                    Err(_) => Ok(false),
                }
            }
            None => sink.write_frame(frame).await.map(|()| true),
        }
    }

    async fn pause(&self, delay: Duration) {
        let wake = Instant::now() + delay;
        match self.deadline {
            Some(deadline) => tokio::time::sleep_until(wake.min(deadline)).await,
            None => tokio::time::sleep_until(wake).await,
        }
    }

    /// Splits the body into DATA payloads: logical units first, then any unit
    /// larger than the peer's MAX_FRAME_SIZE.
    pub fn data_payloads(&self, body: &Bytes) -> Vec<Bytes> {
        let max = self.max_frame_size.max(1);
        let mut payloads = Vec::new();
        for mut unit in self.chunking.split(body) {
            while unit.len() > max {
                payloads.push(unit.split_to(max));
            }
            payloads.push(unit);
        }
        payloads
    }

    fn header_frames(&self, mut block: Bytes) -> Vec<Frame> {
        let max = self.max_frame_size.max(1);
        let mut frames = Vec::new();
        let mut first = true;

        loop {
            let chunk = block.split_to(block.len().min(max));
            let is_last = block.is_empty();
            if first {
                frames.push(Frame::headers(self.stream_id, chunk, false, is_last));
            } else {
                frames.push(Frame::continuation(self.stream_id, chunk, is_last));
            }
            if is_last {
                break;
            }
            first = false;
        }

        frames
    }

    /// Writes HEADERS and every DATA frame in order. When `closed` flips to
    /// true or the deadline passes, the remaining frames are not sent.
    pub async fn send<S>(
        &self,
        sink: &mut S,
        header_block: Bytes,
        body: &Bytes,
        closed: Option<&watch::Receiver<bool>>,
    ) -> Result<WriteOutcome, ProtocolError>
    where
        S: FrameSink + ?Sized,
    {
        if let Some(budget) = self.send_budget {
            if body.len() as u64 > budget {
                return Err(ProtocolError::FlowControl(format!(
                    "body of {} bytes exceeds the {} bytes of flow-control credit granted by the peer",
                    body.len(),
                    budget
                )));
            }
        }

        let is_closed = || closed.map(|rx| *rx.borrow()).unwrap_or(false);
        let mut frames = 0usize;
        let mut body_bytes = 0usize;

        debug!(
            stream_id = self.stream_id,
            block_len = header_block.len(),
            content_length = body.len(),
            "sending headers"
        );
        for frame in self.header_frames(header_block) {
            if self.expired() || !self.write_before_deadline(sink, frame).await? {
                debug!(stream_id = self.stream_id, "deadline passed while sending headers");
                return Ok(WriteOutcome::Interrupted { frames, body_bytes });
            }
            frames += 1;
        }

        let payloads = self.data_payloads(body);
        if payloads.is_empty() {
            if self.end_stream && !is_closed() {
                let frame = Frame::data(self.stream_id, Bytes::new(), true);
                if self.expired() || !self.write_before_deadline(sink, frame).await? {
                    return Ok(WriteOutcome::Interrupted { frames, body_bytes });
                }
                frames += 1;
            }
            return Ok(WriteOutcome::Completed { frames, body_bytes });
        }

        let pacing = self.chunking.pacing();
        let count = payloads.len();
        for (index, payload) in payloads.into_iter().enumerate() {
            if is_closed() || self.expired() {
                debug!(
                    stream_id = self.stream_id,
                    sent = body_bytes,
                    remaining = body.len() - body_bytes,
                    "stopping body"
                );
                return Ok(WriteOutcome::Interrupted { frames, body_bytes });
            }

            let is_last = index + 1 == count;
            let len = payload.len();
            let frame = Frame::data(self.stream_id, payload, self.end_stream && is_last);
            if !self.write_before_deadline(sink, frame).await? {
                debug!(
                    stream_id = self.stream_id,
                    sent = body_bytes,
                    "deadline passed mid-write"
                );
                return Ok(WriteOutcome::Interrupted { frames, body_bytes });
            }
            frames += 1;
            body_bytes += len;
            trace!(stream_id = self.stream_id, len, body_bytes, "sent data frame");

            if let (Some(delay), false) = (pacing, is_last) {
                self.pause(delay).await;
            }
        }

        Ok(WriteOutcome::Completed { frames, body_bytes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_line_keeps_newlines_and_tail() {
        let body = Bytes::from_static(b"a=1\nb=2\ntail");
        let units = ChunkingPolicy::PerLine {
            pacing: Duration::ZERO,
        }
        .split(&body);
        assert_eq!(
            units,
            vec![
                Bytes::from_static(b"a=1\n"),
                Bytes::from_static(b"b=2\n"),
                Bytes::from_static(b"tail"),
            ]
        );
    }

    #[test]
    fn per_byte_yields_one_unit_per_byte() {
        let body = Bytes::from_static(b"line1\n");
        let units = ChunkingPolicy::PerByte {
            pacing: Duration::from_millis(1),
        }
        .split(&body);
        assert_eq!(units.len(), 6);
        assert_eq!(units[5], Bytes::from_static(b"\n"));
    }

    #[test]
    fn whole_body_is_split_at_max_frame_size() {
        let body = Bytes::from(vec![b'x'; 40_000]);
        let writer = RequestStreamWriter::new(3, ChunkingPolicy::Whole, 16_384);
        let sizes: Vec<usize> = writer.data_payloads(&body).iter().map(|p| p.len()).collect();
        assert_eq!(sizes, vec![16_384, 16_384, 7_232]);
    }

    #[test]
    fn zero_pacing_means_no_sleep() {
        let policy = ChunkingPolicy::PerLine {
            pacing: Duration::ZERO,
        };
        assert_eq!(policy.pacing(), None);
        assert_eq!(ChunkingPolicy::Whole.pacing(), None);
    }
}
