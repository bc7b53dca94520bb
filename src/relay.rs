use bytes::Bytes;
use std::collections::VecDeque;
use std::task::Waker;

/// Outcome of handing bytes to a [`ByteRelay`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Acceptance {
    /// The consumer can take more bytes right away.
    Accepted,
    /// The bytes were queued, but the consumer is saturated. The producer must
    /// wait for a drain before handing over the next chunk.
    Pending,
}

impl Acceptance {
    pub(crate) fn and(self, other: Acceptance) -> Acceptance {
        if self == Acceptance::Pending || other == Acceptance::Pending {
            Acceptance::Pending
        } else {
            Acceptance::Accepted
        }
    }
}

#[derive(Debug)]
pub(crate) enum RelayRead {
    Chunk(Bytes),
    Empty,
    End,
}

/// A byte conduit between the parser (producer) and the reader of one part
/// (consumer).
///
/// Bytes are queued in arrival order. Once the queue holds `high_water_mark`
/// bytes or more, [`accept`](ByteRelay::accept) reports
/// [`Acceptance::Pending`] and the relay owes the producer a drain
/// notification, collected with [`take_drained`](ByteRelay::take_drained).
#[derive(Debug)]
pub(crate) struct ByteRelay {
    queue: VecDeque<Bytes>,
    queued_len: usize,
    high_water_mark: usize,
    finished: bool,
    owes_drain: bool,
    reader_waker: Option<Waker>,
}

impl ByteRelay {
    pub(crate) fn new(high_water_mark: usize) -> Self {
        ByteRelay {
            queue: VecDeque::new(),
            queued_len: 0,
            high_water_mark,
            finished: false,
            owes_drain: false,
            reader_waker: None,
        }
    }

    pub(crate) fn accept(&mut self, bytes: Bytes) -> Acceptance {
        if self.finished || bytes.is_empty() {
            return Acceptance::Accepted;
        }

        self.queued_len += bytes.len();
        self.queue.push_back(bytes);
        self.wake_reader();

        if self.is_saturated() {
            self.owes_drain = true;
            Acceptance::Pending
        } else {
            Acceptance::Accepted
        }
    }

    pub(crate) fn read(&mut self) -> RelayRead {
        match self.queue.pop_front() {
            Some(bytes) => {
                self.queued_len -= bytes.len();
                RelayRead::Chunk(bytes)
            }
            None if self.finished => RelayRead::End,
            None => RelayRead::Empty,
        }
    }

    /// Returns `true` exactly once after a pending acceptance, as soon as the
    /// queue is back under the high water mark.
    pub(crate) fn take_drained(&mut self) -> bool {
        if self.owes_drain && !self.is_saturated() {
            self.owes_drain = false;
            true
        } else {
            false
        }
    }

    /// Marks the readable side as ended. Queued bytes stay readable.
    pub(crate) fn finish(&mut self) {
        self.finished = true;
        self.wake_reader();
    }

    /// Drops everything still queued and refuses further bytes.
    pub(crate) fn discard(&mut self) {
        self.queue.clear();
        self.queued_len = 0;
        self.owes_drain = false;
        self.finish();
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub(crate) fn register_reader(&mut self, waker: &Waker) {
        match self.reader_waker {
            Some(ref existing) if existing.will_wake(waker) => {}
            _ => self.reader_waker = Some(waker.clone()),
        }
    }

    fn is_saturated(&self) -> bool {
        !self.queue.is_empty() && self.queued_len >= self.high_water_mark
    }

    fn wake_reader(&mut self) {
        if let Some(waker) = self.reader_waker.take() {
            waker.wake();
        }
    }
}
