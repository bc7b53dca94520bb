use crate::constraints::Constraints;
use crate::parser::{Handler, ParseEvent, Parser};
use crate::part::{PartMeta, PartShared};
use crate::relay::{Acceptance, ByteRelay, RelayRead};
use bytes::{Bytes, BytesMut};
use futures_util::stream::Stream;
use http::header::{HeaderName, HeaderValue};
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

pub(crate) type ByteStream<'r> = Pin<Box<dyn Stream<Item = crate::Result<Bytes>> + Send + 'r>>;

pub(crate) type ProgressHandler<'r> = Box<dyn FnMut(u64) + Send + 'r>;

/// Everything `Multipart` and its parts share: the transport, the parser
/// cursor and the registry of open parts.
pub(crate) struct MultipartState<'r> {
    pub(crate) stream: ByteStream<'r>,
    pub(crate) parser: Parser,
    pub(crate) registry: Registry<'r>,
    pub(crate) parsed: u64,
    pub(crate) total: Option<u64>,
}

impl<'r> MultipartState<'r> {
    pub(crate) fn new(stream: ByteStream<'r>, boundary: &str, total: Option<u64>, constraints: Constraints) -> Self {
        let mut state = MultipartState {
            stream,
            parser: Parser::new(boundary),
            registry: Registry::new(constraints),
            parsed: 0,
            total,
        };

        if boundary.is_empty() {
            state.registry.fail(crate::Error::NoBoundary);
        }

        state
    }

    /// Pulls and parses at most one chunk.
    ///
    /// `Ready(true)` means some progress was made, `Ready(false)` that there
    /// is nothing left to pull. `Pending` means the transport has no chunk
    /// yet or a part reader has to drain first; the task is woken in both
    /// cases.
    pub(crate) fn poll_drive(&mut self, cx: &mut Context<'_>) -> Poll<bool> {
        if self.registry.input_ended {
            if !self.registry.draining {
                return Poll::Ready(false);
            }
            return self.poll_drain(cx);
        }

        if self.registry.is_stalled() {
            self.registry.park_driver(cx.waker());
            return Poll::Pending;
        }

        match self.stream.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                self.process_chunk(chunk);
                Poll::Ready(true)
            }
            Poll::Ready(Some(Err(err))) => {
                self.registry.fail(err);
                Poll::Ready(true)
            }
            Poll::Ready(None) => {
                // The closing delimiter was never seen, so this is a truncated body.
                debug!("stream ended in parser state {}", self.parser.state().name());
                self.registry.fail(crate::Error::IncompleteStream);
                Poll::Ready(true)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    /// Pulls the epilogue after the closing delimiter so that `parsed`
    /// accounts for the whole body. A transport error here is not reported,
    /// every part has already been parsed.
    fn poll_drain(&mut self, cx: &mut Context<'_>) -> Poll<bool> {
        match self.stream.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                self.process_chunk(chunk);
                Poll::Ready(true)
            }
            Poll::Ready(Some(Err(err))) => {
                debug!("stream failed after the closing delimiter: {}", err);
                self.registry.finish_drain();
                Poll::Ready(true)
            }
            Poll::Ready(None) => {
                trace!("stream ended after {} bytes", self.parsed);
                self.registry.finish_drain();
                Poll::Ready(true)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn process_chunk(&mut self, chunk: Bytes) {
        self.parsed += chunk.len() as u64;
        self.registry.push_signal(Signal::Progress {
            parsed: self.parsed,
            total: self.total,
        });

        let limit = self.registry.constraints.size_limit.whole_stream;
        if self.parsed > limit {
            self.registry.fail(crate::Error::StreamSizeExceeded { limit });
            return;
        }

        if self.parser.is_done() {
            trace!("discarding {} bytes after the closing delimiter", chunk.len());
            return;
        }

        match self.parser.write(&chunk, &mut self.registry) {
            Ok(Acceptance::Accepted) => {}
            Ok(Acceptance::Pending) => trace!("chunk of {} bytes waits for part readers to drain", chunk.len()),
            Err(err) => return self.registry.fail(err),
        }

        if self.parser.is_done() {
            trace!("closing delimiter reached after {} bytes", self.parsed);
        }
    }
}

/// What `Multipart` hands out to its caller, in order.
pub(crate) enum Signal {
    Progress {
        parsed: u64,
        total: Option<u64>,
    },
    Part {
        id: usize,
        meta: PartMeta,
        shared: Arc<PartShared>,
    },
    Error(crate::Error),
    End,
}

struct PartSlot<'r> {
    id: usize,
    relay: ByteRelay,
    meta: PartMeta,
    shared: Arc<PartShared>,
    size_limit: u64,
    on_progress: Option<ProgressHandler<'r>>,
}

/// Binds parser events to part lifecycles and keeps the insertion ordered
/// set of parts that haven't ended yet.
pub(crate) struct Registry<'r> {
    slots: Vec<PartSlot<'r>>,
    current: Option<usize>,
    next_id: usize,
    header_field: BytesMut,
    header_value: BytesMut,
    stalled: Vec<usize>,
    drivers: Vec<Waker>,
    signals: VecDeque<Signal>,
    signal_waker: Option<Waker>,
    input_ended: bool,
    draining: bool,
    end_queued: bool,
    detached: bool,
    constraints: Constraints,
}

impl<'r> Registry<'r> {
    fn new(constraints: Constraints) -> Self {
        Registry {
            slots: Vec::new(),
            current: None,
            next_id: 0,
            header_field: BytesMut::new(),
            header_value: BytesMut::new(),
            stalled: Vec::new(),
            drivers: Vec::new(),
            signals: VecDeque::new(),
            signal_waker: None,
            input_ended: false,
            draining: false,
            end_queued: false,
            detached: false,
            constraints,
        }
    }

    pub(crate) fn pop_signal(&mut self) -> Option<Signal> {
        self.signals.pop_front()
    }

    pub(crate) fn park_signal_waiter(&mut self, waker: &Waker) {
        match self.signal_waker {
            Some(ref existing) if existing.will_wake(waker) => {}
            _ => self.signal_waker = Some(waker.clone()),
        }
    }

    /// Reads the next payload chunk of part `id`.
    ///
    /// `End` is also returned once the part has left the registry; the
    /// caller tells a normal end from an abort through [`PartShared`].
    pub(crate) fn read(&mut self, id: usize, waker: &Waker) -> RelayRead {
        let pos = match self.position(id) {
            Some(pos) => pos,
            None => return RelayRead::End,
        };

        let slot = &mut self.slots[pos];
        match slot.relay.read() {
            RelayRead::Chunk(bytes) => {
                let drained = slot.relay.take_drained();
                let exhausted = slot.relay.is_finished() && slot.relay.is_empty();

                if drained {
                    trace!("part {} drained", id);
                    self.unstall(id);
                }
                if exhausted {
                    self.remove(pos);
                }

                RelayRead::Chunk(bytes)
            }
            RelayRead::End => {
                self.remove(pos);
                RelayRead::End
            }
            RelayRead::Empty => {
                slot.relay.register_reader(waker);
                RelayRead::Empty
            }
        }
    }

    /// Ends part `id` on behalf of its consumer, dropping whatever it didn't read.
    pub(crate) fn release(&mut self, id: usize) {
        if let Some(pos) = self.position(id) {
            trace!("part {} released by its reader", id);
            self.remove(pos);
        }
    }

    pub(crate) fn set_progress_handler(&mut self, id: usize, handler: ProgressHandler<'r>) {
        if let Some(pos) = self.position(id) {
            self.slots[pos].on_progress = Some(handler);
        }
    }

    /// Called once the `Multipart` handle is gone: parts it never handed out
    /// can't be read by anyone, so they must not hold the parser back.
    pub(crate) fn detach(&mut self) {
        self.detached = true;
        self.signal_waker = None;

        let orphans = self
            .signals
            .drain(..)
            .filter_map(|signal| match signal {
                Signal::Part { id, .. } => Some(id),
                _ => None,
            })
            .collect::<Vec<_>>();

        for id in orphans {
            self.release(id);
        }
    }

    /// Aborts every part still receiving payload and queues `err`, followed
    /// by the end signal once the remaining parts drain.
    pub(crate) fn fail(&mut self, err: crate::Error) {
        debug!("multipart stream failed: {}", err);

        self.input_ended = true;
        self.draining = false;
        self.current = None;
        self.push_signal(Signal::Error(err));

        let mut pos = 0;
        while pos < self.slots.len() {
            if self.slots[pos].relay.is_finished() {
                pos += 1;
                continue;
            }
            self.slots[pos].shared.aborted.store(true, Ordering::SeqCst);
            self.remove(pos);
        }

        self.wake_drivers();
        self.maybe_finish();
    }

    fn is_stalled(&self) -> bool {
        !self.stalled.is_empty()
    }

    fn park_driver(&mut self, waker: &Waker) {
        if !self.drivers.iter().any(|parked| parked.will_wake(waker)) {
            self.drivers.push(waker.clone());
        }
    }

    fn wake_drivers(&mut self) {
        for waker in self.drivers.drain(..) {
            waker.wake();
        }
    }

    fn push_signal(&mut self, signal: Signal) {
        // Nobody polled in between, only the latest figure matters.
        let coalesce = matches!(signal, Signal::Progress { .. })
            && matches!(self.signals.back(), Some(Signal::Progress { .. }));
        if coalesce {
            self.signals.pop_back();
        }
        self.signals.push_back(signal);

        if let Some(waker) = self.signal_waker.take() {
            waker.wake();
        }
    }

    fn position(&self, id: usize) -> Option<usize> {
        self.slots.iter().position(|slot| slot.id == id)
    }

    fn current_position(&self) -> Option<usize> {
        self.current.and_then(|id| self.position(id))
    }

    fn remove(&mut self, pos: usize) {
        let mut slot = self.slots.remove(pos);
        slot.relay.discard();
        self.unstall(slot.id);

        trace!("part {} ended, {} still open", slot.id, self.slots.len());

        // The reader of this part may have been the last task polling the transport.
        if let Some(waker) = self.signal_waker.take() {
            waker.wake();
        }
        self.wake_drivers();
        self.maybe_finish();
    }

    fn unstall(&mut self, id: usize) {
        let before = self.stalled.len();
        self.stalled.retain(|&stalled| stalled != id);

        if before > 0 && self.stalled.is_empty() {
            self.wake_drivers();
        }
    }

    fn finish_drain(&mut self) {
        self.draining = false;
        self.maybe_finish();
    }

    fn maybe_finish(&mut self) {
        if self.input_ended && !self.draining && self.slots.is_empty() && !self.end_queued {
            self.end_queued = true;
            self.push_signal(Signal::End);
        }
    }

    fn begin_part(&mut self) {
        let id = self.next_id;
        self.next_id += 1;

        self.slots.push(PartSlot {
            id,
            relay: ByteRelay::new(self.constraints.high_water_mark),
            meta: PartMeta::new(id),
            shared: Arc::new(PartShared::default()),
            size_limit: self.constraints.size_limit.per_part,
            on_progress: None,
        });
        self.current = Some(id);
        self.header_field.clear();
        self.header_value.clear();

        trace!("part {} began", id);
    }

    fn assign_header(&mut self) -> crate::Result<()> {
        let raw_name = self.header_field.split().freeze();
        let raw_value = self.header_value.split().freeze();

        let pos = match self.current_position() {
            Some(pos) => pos,
            None => return Ok(()),
        };

        let encoding = self.constraints.header_encoding;
        let (name, _) = encoding.decode_without_bom_handling(&raw_name);
        let (value, _) = encoding.decode_without_bom_handling(&raw_value);

        let header_name =
            HeaderName::from_bytes(name.to_ascii_lowercase().as_bytes()).map_err(|err| crate::Error::DecodeHeaderName {
                name: name.clone().into_owned(),
                cause: err.into(),
            })?;

        let header_value = HeaderValue::from_str(&value).map_err(|err| crate::Error::DecodeHeaderValue {
            value: raw_value.to_vec(),
            cause: err.into(),
        })?;

        self.slots[pos].meta.apply_header(header_name, header_value, &value);

        Ok(())
    }

    fn announce_part(&mut self) {
        self.header_field.clear();
        self.header_value.clear();

        let pos = match self.current_position() {
            Some(pos) => pos,
            None => return,
        };

        let size_limit = self
            .constraints
            .size_limit
            .extract_size_limit_for(self.slots[pos].meta.name.as_deref());
        self.slots[pos].size_limit = size_limit;

        if self.detached {
            self.remove(pos);
            return;
        }

        let slot = &self.slots[pos];
        let signal = Signal::Part {
            id: slot.id,
            meta: slot.meta.clone(),
            shared: Arc::clone(&slot.shared),
        };
        self.push_signal(signal);
    }

    fn forward(&mut self, bytes: Bytes) -> crate::Result<Acceptance> {
        let pos = match self.current_position() {
            Some(pos) => pos,
            // The reader let go of this part, its payload goes nowhere.
            None => return Ok(Acceptance::Accepted),
        };

        let slot = &mut self.slots[pos];
        let len = bytes.len() as u64;
        let loaded = slot.shared.loaded.load(Ordering::SeqCst) + len;

        if loaded > slot.size_limit {
            return Err(crate::Error::PartSizeExceeded {
                limit: slot.size_limit,
                part_name: slot.meta.name.clone(),
            });
        }
        slot.shared.loaded.store(loaded, Ordering::SeqCst);

        if let Some(on_progress) = slot.on_progress.as_mut() {
            on_progress(loaded);
        }

        let acceptance = slot.relay.accept(bytes);
        if acceptance == Acceptance::Pending {
            let id = slot.id;
            if !self.stalled.contains(&id) {
                trace!("part {} is saturated", id);
                self.stalled.push(id);
            }
        }

        Ok(acceptance)
    }

    fn end_part(&mut self) {
        let pos = match self.current.take().and_then(|id| self.position(id)) {
            Some(pos) => pos,
            None => return,
        };

        let relay = &mut self.slots[pos].relay;
        relay.finish();
        if relay.is_empty() {
            self.remove(pos);
        }
    }
}

impl<'r> Handler for Registry<'r> {
    fn on_event(&mut self, event: ParseEvent) -> crate::Result<Acceptance> {
        match event {
            ParseEvent::PartBegin => self.begin_part(),
            ParseEvent::HeaderField(bytes) => self.header_field.extend_from_slice(&bytes),
            ParseEvent::HeaderValue(bytes) => self.header_value.extend_from_slice(&bytes),
            ParseEvent::HeaderEnd => self.assign_header()?,
            ParseEvent::HeadersEnd => self.announce_part(),
            ParseEvent::PartData(bytes) => return self.forward(bytes),
            ParseEvent::PartEnd => self.end_part(),
            ParseEvent::End => {
                self.input_ended = true;
                self.draining = true;
                self.wake_drivers();
                // Whoever waits for the end signal pulls the epilogue.
                if let Some(waker) = self.signal_waker.take() {
                    waker.wake();
                }
            }
        }

        Ok(Acceptance::Accepted)
    }
}
