//! Asynchronous agent status probe.
//!
//! The request lifecycle is an explicit state machine ([`ProbeMachine`]): the
//! transport adapter feeds it events and performs whatever [`ProbeAction`] it
//! returns. At most one probe is outstanding at a time; the shared slot in
//! [`StatusProbe`] is claimed before the request is sent and released when
//! the request finishes, fails, or is abandoned.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Local;
use log::{debug, info, warn};

use crate::platform::StatusSurface;
use crate::transport::{Connection, Timeouts, timed};

/// Size of the response buffer. Payloads this large or larger are rejected.
pub const RESPONSE_CAPACITY: usize = 128;

/// Shown whenever the agent cannot be reached or answers with garbage.
pub const NOT_RESPONDING: &str = "Agent not responding";

const STATUS_PREFIX: &[u8] = b"status: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    Sent,
    HeadersReceived,
    Reading,
    Complete,
    Failed,
}

impl ProbeState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ProbeState::Complete | ProbeState::Failed)
    }
}

/// Notifications delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeEvent {
    SendComplete,
    HeadersAvailable,
    /// Bytes ready to be read. Zero means the body is empty.
    DataAvailable(usize),
    /// Part of the body; may arrive several times per read.
    Chunk(Vec<u8>),
    ReadComplete,
    RequestError(String),
}

/// What the transport adapter must do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeAction {
    ReceiveResponse,
    QueryDataAvailable,
    Read(usize),
    ContinueReading,
    Finish(ProbeOutcome),
    /// The request already finished; the event is dropped.
    Ignore,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Status(String),
    NotResponding,
    /// Finished with an error that leaves the display untouched.
    NoData,
}

impl ProbeOutcome {
    pub fn display_text(&self) -> Option<&str> {
        match self {
            ProbeOutcome::Status(status) => Some(status),
            ProbeOutcome::NotResponding => Some(NOT_RESPONDING),
            ProbeOutcome::NoData => None,
        }
    }
}

/// Pure transition function of one status request.
#[derive(Debug)]
pub struct ProbeMachine {
    state: ProbeState,
    accumulator: Vec<u8>,
}

impl Default for ProbeMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ProbeMachine {
    pub fn new() -> Self {
        Self {
            state: ProbeState::Sent,
            accumulator: Vec::with_capacity(RESPONSE_CAPACITY),
        }
    }

    pub fn state(&self) -> ProbeState {
        self.state
    }

    pub fn handle(&mut self, event: ProbeEvent) -> ProbeAction {
        if self.state.is_terminal() {
            return ProbeAction::Ignore;
        }

        match (self.state, event) {
            (_, ProbeEvent::RequestError(reason)) => {
                debug!("Probe request error: {reason}");
                self.fail(ProbeOutcome::NotResponding)
            }
            (ProbeState::Sent, ProbeEvent::SendComplete) => ProbeAction::ReceiveResponse,
            (ProbeState::Sent, ProbeEvent::HeadersAvailable) => {
                self.state = ProbeState::HeadersReceived;
                ProbeAction::QueryDataAvailable
            }
            (ProbeState::HeadersReceived, ProbeEvent::DataAvailable(0)) => {
                self.fail(ProbeOutcome::NoData)
            }
            (ProbeState::HeadersReceived, ProbeEvent::DataAvailable(size)) => {
                if size >= RESPONSE_CAPACITY {
                    debug!("Probe response of {size} bytes exceeds buffer");
                    return self.fail(ProbeOutcome::NotResponding);
                }
                self.state = ProbeState::Reading;
                ProbeAction::Read(size)
            }
            (ProbeState::Reading, ProbeEvent::Chunk(bytes)) => {
                if self.accumulator.len() + bytes.len() >= RESPONSE_CAPACITY {
                    debug!("Probe read overran the response buffer");
                    return self.fail(ProbeOutcome::NotResponding);
                }
                self.accumulator.extend_from_slice(&bytes);
                ProbeAction::ContinueReading
            }
            (ProbeState::Reading, ProbeEvent::ReadComplete) => {
                match parse_status(&self.accumulator) {
                    Some(status) => {
                        self.state = ProbeState::Complete;
                        ProbeAction::Finish(ProbeOutcome::Status(status))
                    }
                    None => {
                        debug!("Malformed probe payload ({} bytes)", self.accumulator.len());
                        self.fail(ProbeOutcome::NotResponding)
                    }
                }
            }
            (state, event) => {
                debug!("Probe event {event:?} not expected in state {state:?}");
                self.fail(ProbeOutcome::NotResponding)
            }
        }
    }

    fn fail(&mut self, outcome: ProbeOutcome) -> ProbeAction {
        self.state = ProbeState::Failed;
        ProbeAction::Finish(outcome)
    }
}

/// Extract the status word from a `status: <word>` payload.
///
/// Anything not longer than the prefix, or not starting with it, is rejected.
/// Bytes are decoded as ISO-8859-1.
pub fn parse_status(payload: &[u8]) -> Option<String> {
    if payload.len() >= RESPONSE_CAPACITY || payload.len() <= STATUS_PREFIX.len() {
        return None;
    }
    let body = payload.strip_prefix(STATUS_PREFIX)?;
    let end = body
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |i| i + 1);
    if end == 0 {
        return None;
    }
    Some(body[..end].iter().map(|&b| char::from(b)).collect())
}

/// Snapshot of the outstanding probe.
#[derive(Debug, Clone)]
pub struct ProbeRequest {
    pub id: u64,
    pub state: ProbeState,
}

type Slot = Arc<Mutex<Option<ProbeRequest>>>;

fn lock(slot: &Slot) -> std::sync::MutexGuard<'_, Option<ProbeRequest>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Releases the slot when the request task ends, however it ends.
struct SlotGuard {
    slot: Slot,
    id: u64,
}

impl SlotGuard {
    fn record(&self, state: ProbeState) {
        if let Some(request) = lock(&self.slot).as_mut()
            && request.id == self.id
        {
            request.state = state;
        }
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let mut slot = lock(&self.slot);
        if slot.as_ref().is_some_and(|r| r.id == self.id) {
            *slot = None;
        }
    }
}

/// Issues status requests, never more than one at a time.
pub struct StatusProbe {
    path: String,
    slot: Slot,
    next_id: AtomicU64,
    /// Bumped by [`StatusProbe::invalidate`]. Held while a result is
    /// delivered so the check and the write are one step.
    generation: Arc<Mutex<u64>>,
}

impl StatusProbe {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            slot: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(1),
            generation: Arc::new(Mutex::new(0)),
        }
    }

    /// Discard the result of any request issued before this call.
    ///
    /// Once this returns, no such result reaches the surface.
    pub fn invalidate(&self) {
        let mut generation = self.generation.lock().unwrap_or_else(PoisonError::into_inner);
        *generation += 1;
        if let Some(request) = self.in_flight() {
            debug!("Probe #{} outdated; its result will be dropped", request.id);
        }
    }

    /// The outstanding request, if any.
    pub fn in_flight(&self) -> Option<ProbeRequest> {
        lock(&self.slot).clone()
    }

    /// Start a probe unless one is already outstanding.
    ///
    /// Returns whether a request was issued. The result is delivered to
    /// `surface` from a transport thread.
    pub fn probe(&self, conn: &Connection, surface: Arc<dyn StatusSurface>) -> bool {
        let id = {
            let mut slot = lock(&self.slot);
            if let Some(current) = slot.as_ref() {
                debug!(
                    "Probe #{} still {:?}; skipping this tick",
                    current.id, current.state
                );
                return false;
            }
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            *slot = Some(ProbeRequest {
                id,
                state: ProbeState::Sent,
            });
            id
        };

        let guard = SlotGuard {
            slot: Arc::clone(&self.slot),
            id,
        };
        let client = conn.client().clone();
        let timeouts = conn.timeouts().clone();
        let url = conn.url(&self.path);
        let generation = Arc::clone(&self.generation);
        let issued = *generation.lock().unwrap_or_else(PoisonError::into_inner);

        debug!("Probe #{id}: GET {url}");
        conn.spawn(async move {
            let outcome = run(&client, &url, &timeouts, &guard).await;
            match &outcome {
                ProbeOutcome::Status(status) => info!("Probe #{id}: agent status '{status}'"),
                ProbeOutcome::NotResponding => warn!("Probe #{id}: agent not responding"),
                ProbeOutcome::NoData => debug!("Probe #{id}: empty response"),
            }
            if let Some(text) = outcome.display_text() {
                let current = generation.lock().unwrap_or_else(PoisonError::into_inner);
                if *current == issued {
                    surface.set_agent_status(text, Local::now());
                } else {
                    debug!("Probe #{id}: result outdated, not shown");
                }
            }
            drop(guard);
        })
    }
}

/// Drive one request through the machine until it finishes.
async fn run(
    client: &reqwest::Client,
    url: &str,
    timeouts: &Timeouts,
    guard: &SlotGuard,
) -> ProbeOutcome {
    let mut machine = ProbeMachine::new();
    let mut response = None;
    // Chunk pulled early to learn the size of a body sent without a length.
    let mut pending: Option<Vec<u8>> = None;
    let mut remaining = 0usize;
    // No length announced: keep reading until the agent closes the body.
    let mut until_eof = false;

    // `send` resolves only once the headers are in, so it spends the receive
    // budget too.
    let mut event = match timed(timeouts.request(), client.get(url).send()).await {
        Ok(r) => {
            response = Some(r);
            ProbeEvent::SendComplete
        }
        Err(reason) => ProbeEvent::RequestError(reason),
    };

    loop {
        let action = machine.handle(event);
        debug!("Probe #{}: {:?} -> {action:?}", guard.id, machine.state());
        guard.record(machine.state());

        event = match action {
            ProbeAction::Finish(outcome) => return outcome,
            ProbeAction::Ignore => return ProbeOutcome::NoData,
            // `send` resolves once the status line and headers are parsed.
            ProbeAction::ReceiveResponse => ProbeEvent::HeadersAvailable,
            ProbeAction::QueryDataAvailable => match response.as_mut() {
                None => ProbeEvent::RequestError("no response".to_string()),
                Some(r) => match r.content_length() {
                    Some(len) => ProbeEvent::DataAvailable(usize::try_from(len).unwrap_or(usize::MAX)),
                    None => match next_chunk(r, timeouts.receive).await {
                        Ok(Some(chunk)) => {
                            until_eof = true;
                            let size = chunk.len();
                            pending = Some(chunk);
                            ProbeEvent::DataAvailable(size)
                        }
                        Ok(None) => ProbeEvent::DataAvailable(0),
                        Err(reason) => ProbeEvent::RequestError(reason),
                    },
                },
            },
            ProbeAction::Read(size) => {
                remaining = size;
                match pending.take() {
                    Some(chunk) => {
                        remaining = remaining.saturating_sub(chunk.len());
                        ProbeEvent::Chunk(chunk)
                    }
                    None => read_more(response.as_mut(), &mut remaining, timeouts.receive).await,
                }
            }
            ProbeAction::ContinueReading => {
                if remaining == 0 && !until_eof {
                    ProbeEvent::ReadComplete
                } else {
                    read_more(response.as_mut(), &mut remaining, timeouts.receive).await
                }
            }
        };
    }
}

async fn read_more(
    response: Option<&mut reqwest::Response>,
    remaining: &mut usize,
    limit: Duration,
) -> ProbeEvent {
    let Some(response) = response else {
        return ProbeEvent::RequestError("no response".to_string());
    };
    match next_chunk(response, limit).await {
        Ok(Some(chunk)) => {
            *remaining = remaining.saturating_sub(chunk.len());
            ProbeEvent::Chunk(chunk)
        }
        Ok(None) => ProbeEvent::ReadComplete,
        Err(reason) => ProbeEvent::RequestError(reason),
    }
}

async fn next_chunk(
    response: &mut reqwest::Response,
    limit: Duration,
) -> Result<Option<Vec<u8>>, String> {
    timed(limit, response.chunk())
        .await
        .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at_reading(size: usize) -> ProbeMachine {
        let mut m = ProbeMachine::new();
        assert_eq!(m.handle(ProbeEvent::SendComplete), ProbeAction::ReceiveResponse);
        assert_eq!(
            m.handle(ProbeEvent::HeadersAvailable),
            ProbeAction::QueryDataAvailable
        );
        assert_eq!(m.handle(ProbeEvent::DataAvailable(size)), ProbeAction::Read(size));
        assert_eq!(m.state(), ProbeState::Reading);
        m
    }

    #[test]
    fn reads_status_word_after_prefix() {
        let mut m = at_reading(RESPONSE_CAPACITY - 1);
        assert_eq!(
            m.handle(ProbeEvent::Chunk(b"status: OK".to_vec())),
            ProbeAction::ContinueReading
        );
        assert_eq!(
            m.handle(ProbeEvent::ReadComplete),
            ProbeAction::Finish(ProbeOutcome::Status("OK".to_string()))
        );
        assert_eq!(m.state(), ProbeState::Complete);
    }

    #[test]
    fn partial_reads_are_accumulated() {
        let mut m = at_reading(16);
        m.handle(ProbeEvent::Chunk(b"stat".to_vec()));
        m.handle(ProbeEvent::Chunk(b"us: wait".to_vec()));
        m.handle(ProbeEvent::Chunk(b"ing\r\n".to_vec()));
        assert_eq!(
            m.handle(ProbeEvent::ReadComplete),
            ProbeAction::Finish(ProbeOutcome::Status("waiting".to_string()))
        );
    }

    #[test]
    fn oversized_announcement_is_not_responding() {
        let mut m = ProbeMachine::new();
        m.handle(ProbeEvent::SendComplete);
        m.handle(ProbeEvent::HeadersAvailable);
        assert_eq!(
            m.handle(ProbeEvent::DataAvailable(RESPONSE_CAPACITY + 5)),
            ProbeAction::Finish(ProbeOutcome::NotResponding)
        );
        assert_eq!(m.state(), ProbeState::Failed);

        let mut m = ProbeMachine::new();
        m.handle(ProbeEvent::HeadersAvailable);
        assert_eq!(
            m.handle(ProbeEvent::DataAvailable(RESPONSE_CAPACITY)),
            ProbeAction::Finish(ProbeOutcome::NotResponding)
        );
    }

    #[test]
    fn oversized_read_is_not_responding() {
        let mut m = at_reading(10);
        let action = m.handle(ProbeEvent::Chunk(vec![b'x'; RESPONSE_CAPACITY]));
        assert_eq!(action, ProbeAction::Finish(ProbeOutcome::NotResponding));
        assert_eq!(
            ProbeOutcome::NotResponding.display_text(),
            Some(NOT_RESPONDING)
        );
    }

    #[test]
    fn empty_body_finishes_without_display() {
        let mut m = ProbeMachine::new();
        m.handle(ProbeEvent::SendComplete);
        m.handle(ProbeEvent::HeadersAvailable);
        let action = m.handle(ProbeEvent::DataAvailable(0));
        assert_eq!(action, ProbeAction::Finish(ProbeOutcome::NoData));
        assert_eq!(ProbeOutcome::NoData.display_text(), None);
    }

    #[test]
    fn request_error_fails_from_any_live_state() {
        for steps in 0..3 {
            let mut m = ProbeMachine::new();
            let setup = [
                ProbeEvent::HeadersAvailable,
                ProbeEvent::DataAvailable(12),
            ];
            for event in setup.into_iter().take(steps) {
                m.handle(event);
            }
            assert_eq!(
                m.handle(ProbeEvent::RequestError("reset".to_string())),
                ProbeAction::Finish(ProbeOutcome::NotResponding)
            );
            assert_eq!(m.state(), ProbeState::Failed);
        }
    }

    #[test]
    fn out_of_order_event_is_a_protocol_error() {
        let mut m = ProbeMachine::new();
        assert_eq!(
            m.handle(ProbeEvent::ReadComplete),
            ProbeAction::Finish(ProbeOutcome::NotResponding)
        );
    }

    #[test]
    fn events_after_finish_are_ignored() {
        let mut m = at_reading(12);
        m.handle(ProbeEvent::Chunk(b"status: OK".to_vec()));
        m.handle(ProbeEvent::ReadComplete);
        assert_eq!(
            m.handle(ProbeEvent::RequestError("late".to_string())),
            ProbeAction::Ignore
        );
        assert_eq!(m.state(), ProbeState::Complete);
    }

    #[test]
    fn short_or_foreign_payloads_are_rejected() {
        assert_eq!(parse_status(b""), None);
        assert_eq!(parse_status(b"status"), None);
        assert_eq!(parse_status(b"status: "), None);
        assert_eq!(parse_status(b"status:   \n"), None);
        assert_eq!(parse_status(b"health: ok"), None);
    }

    #[test]
    fn payload_is_decoded_as_latin1() {
        assert_eq!(parse_status(b"status: pr\xeat"), Some("prêt".to_string()));
        assert_eq!(parse_status(b"status: OK"), Some("OK".to_string()));
    }

    #[test]
    fn idle_probe_has_no_request() {
        let probe = StatusProbe::new("/status");
        assert!(probe.in_flight().is_none());
    }
}
