//! Session producer: the event-generation main loop

use crate::attrs::AttributeSampler;
use crate::curves::CurveIntensityModel;
use crate::intensity::IntensityModel;
use crate::sampler;
use common::{
    EventRecord, Rng, SessionResult, SimEvent, TradingSession, FLAG_REINIT, FLAG_SHIFT_DOWN,
    FLAG_SHIFT_UP,
};
use lob::MultiLevelBook;
use storage::{EventSink, StorageError};
use tracing::debug;

/// Drives one session: samples inter-arrival gaps and event categories from
/// the intensity model, applies each event to the book, and appends a
/// record per event to the sink. Borrows its collaborators for the session;
/// owns only loop state.
pub struct Producer<'a> {
    rng: &'a mut dyn Rng,
    book: &'a mut MultiLevelBook,
    model: &'a mut dyn IntensityModel,
    attr_sampler: &'a mut AttributeSampler,
    session_seconds: f64,
    t: f64,
    order_id: u64,
    events_written: u64,
    shift_count: u64,
    theta_reinit: f64,
    reinit_mean: f64,
}

impl<'a> Producer<'a> {
    /// Wire up a producer from its collaborators.
    pub fn new(
        rng: &'a mut dyn Rng,
        book: &'a mut MultiLevelBook,
        model: &'a mut dyn IntensityModel,
        attr_sampler: &'a mut AttributeSampler,
    ) -> Self {
        Self {
            rng,
            book,
            model,
            attr_sampler,
            session_seconds: 0.0,
            t: 0.0,
            order_id: 1,
            events_written: 0,
            shift_count: 0,
            theta_reinit: 0.0,
            reinit_mean: 10.0,
        }
    }

    /// Reseed the RNG, reseed the book, and reset all loop state for
    /// `session`.
    pub fn start_session(&mut self, session: &TradingSession) {
        self.rng.seed(session.seed);
        self.book.seed(&session.into());
        self.session_seconds = f64::from(session.session_seconds);
        self.t = 0.0;
        self.order_id = 1;
        self.events_written = 0;
        self.shift_count = 0;
        self.theta_reinit = session.queue_reactive.theta_reinit;
        self.reinit_mean = if session.queue_reactive.reinit_depth_mean > 0.0 {
            session.queue_reactive.reinit_depth_mean
        } else {
            10.0
        };
        debug!(seed = session.seed, seconds = session.session_seconds, "session started");
    }

    /// Advance one event and append its record. Returns `Ok(false)` once
    /// simulated time passes the session end; the event whose gap crosses
    /// the boundary is not emitted.
    ///
    /// # Errors
    ///
    /// Propagates the first sink failure, which aborts the session.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn step_one_event(&mut self, sink: &mut dyn EventSink) -> Result<bool, StorageError> {
        if self.t >= self.session_seconds {
            return Ok(false);
        }

        let state = self.book.state();
        let intens = self.model.compute(&state);
        let lambda_total = intens.total();

        self.t += sampler::sample_delta_t(self.rng, lambda_total);
        if self.t >= self.session_seconds {
            return Ok(false);
        }

        let (event_type, level_hint) = match self.model.per_level_weights() {
            Some(weights) if !weights.is_empty() => {
                let idx = sampler::sample_index_from_weights(self.rng, weights);
                let k = (weights.len() - 2) / 4;
                CurveIntensityModel::decode_weight_index(idx, k)
            }
            _ => (sampler::sample_type(self.rng, &intens), None),
        };

        let attrs =
            self.attr_sampler.sample(self.rng, event_type, self.book, &state.features, level_hint);

        let ev = SimEvent {
            event_type,
            side: attrs.side,
            price_ticks: attrs.price_ticks,
            qty: attrs.qty,
            order_id: self.order_id,
        };
        self.order_id += 1;

        let prev_bid = self.book.best_bid().price_ticks;
        let prev_ask = self.book.best_ask().price_ticks;
        self.book.apply(&ev);
        let new_bid = self.book.best_bid().price_ticks;
        let new_ask = self.book.best_ask().price_ticks;

        let mut flags = 0u32;
        if new_bid < prev_bid {
            flags |= FLAG_SHIFT_DOWN;
        }
        if new_ask > prev_ask {
            flags |= FLAG_SHIFT_UP;
        }
        if flags != 0 {
            self.shift_count += 1;
            if self.theta_reinit > 0.0 && self.rng.uniform() < self.theta_reinit {
                self.book.reinitialize(self.rng, self.reinit_mean);
                flags |= FLAG_REINIT;
            }
        }

        let rec = EventRecord {
            ts_ns: (self.t * 1e9).round() as u64,
            event_type,
            side: attrs.side,
            price_ticks: attrs.price_ticks,
            qty: attrs.qty,
            order_id: ev.order_id,
            flags,
        };
        sink.append(&rec)?;
        self.events_written += 1;
        Ok(true)
    }

    /// Run a whole session against `sink` and report the close.
    ///
    /// # Errors
    ///
    /// Propagates the first sink failure.
    pub fn run_session(
        &mut self,
        session: &TradingSession,
        sink: &mut dyn EventSink,
    ) -> Result<SessionResult, StorageError> {
        self.start_session(session);
        while self.step_one_event(sink)? {}
        Ok(self.finish())
    }

    /// Close out the current session: mid price at the close plus the count
    /// of emitted events.
    #[must_use]
    pub fn finish(&self) -> SessionResult {
        let close_ticks =
            (self.book.best_bid().price_ticks + self.book.best_ask().price_ticks) / 2;
        SessionResult { close_ticks, events_written: self.events_written }
    }

    /// Current simulated time in seconds.
    #[must_use]
    pub const fn current_time(&self) -> f64 {
        self.t
    }

    /// Events emitted this session.
    #[must_use]
    pub const fn events_written(&self) -> u64 {
        self.events_written
    }

    /// Best-price shifts observed this session.
    #[must_use]
    pub const fn shift_count(&self) -> u64 {
        self.shift_count
    }
}
