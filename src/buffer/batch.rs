use crate::domain::Binding;
use bytes::{Bytes, BytesMut};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Serialized line protocol ready for transmission. The body never changes
/// after construction; only the attempt counter is touched by the worker.
#[derive(Debug, Clone)]
pub struct Payload {
    id: Uuid,
    body: Bytes,
    line_count: usize,
    binding: Binding,
    enqueued_at: Instant,
    attempts: u32,
}

impl Payload {
    pub fn new(body: impl Into<Bytes>, binding: Binding) -> Self {
        let body = body.into();
        let line_count = body
            .split(|b| *b == b'\n')
            .filter(|line| !line.is_empty())
            .count();
        Self {
            id: Uuid::new_v4(),
            body,
            line_count,
            binding,
            enqueued_at: Instant::now(),
            attempts: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn line_count(&self) -> usize {
        self.line_count
    }

    pub fn binding(&self) -> Binding {
        self.binding
    }

    pub fn enqueued_at(&self) -> Instant {
        self.enqueued_at
    }

    pub fn age(&self) -> Duration {
        self.enqueued_at.elapsed()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// Payloads coalesced into one request body.
#[derive(Debug, Clone)]
pub struct Batch {
    id: Uuid,
    payloads: Vec<Payload>,
    body: Bytes,
}

impl Batch {
    pub fn new(payloads: Vec<Payload>) -> Self {
        let body = match payloads.as_slice() {
            [single] => single.body.clone(),
            _ => {
                let size = payloads.iter().map(|p| p.body.len() + 1).sum();
                let mut joined = BytesMut::with_capacity(size);
                for payload in &payloads {
                    if payload.body.is_empty() {
                        continue;
                    }
                    if !joined.is_empty() && !joined.ends_with(b"\n") {
                        joined.extend_from_slice(b"\n");
                    }
                    joined.extend_from_slice(&payload.body);
                }
                joined.freeze()
            }
        };
        Self {
            id: Uuid::new_v4(),
            payloads,
            body,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn payloads(&self) -> &[Payload] {
        &self.payloads
    }

    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    pub fn line_count(&self) -> usize {
        self.payloads.iter().map(Payload::line_count).sum()
    }

    /// Attempts made so far for this batch.
    pub fn attempts(&self) -> u32 {
        self.payloads.iter().map(Payload::attempts).max().unwrap_or(0)
    }

    pub fn record_attempt(&mut self) {
        for payload in &mut self.payloads {
            payload.attempts += 1;
        }
    }

    /// Age of the oldest payload.
    pub fn oldest_age(&self) -> Duration {
        self.payloads
            .iter()
            .map(Payload::age)
            .max()
            .unwrap_or_default()
    }
}
