//! Debounced recomputation of a valuation from rapidly changing input.
//!
//! The controller owns the only mutable timing state: one optional timer
//! task. Every input event cancels that timer and arms a new one, so a burst
//! of edits ends in a single pipeline run using the last values. Pipeline
//! runs are never aborted once started; each gets a generation id and a
//! result is only delivered while its generation is still the newest.

use super::engine::Valuation;
use super::error::EngineError;
use super::loan::{InputEvent, LoanForm};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::debug;

/// Delay between the last input event and the recomputation it triggers.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(2);

/// The resolve and compute chain run when the timer fires.
#[async_trait]
pub trait Recompute: Send + Sync + 'static {
    async fn recompute(&self, form: LoanForm) -> Result<Valuation, EngineError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    PendingRecompute,
}

/// A finished pipeline run, delivered to the presentation layer.
#[derive(Debug)]
pub struct Recomputation {
    pub generation: u64,
    pub outcome: Result<Valuation, EngineError>,
}

pub struct ReactiveController<R: Recompute> {
    pipeline: Arc<R>,
    delay: Duration,
    form: LoanForm,
    timer: Option<JoinHandle<()>>,
    latest_generation: Arc<AtomicU64>,
    results: UnboundedSender<Recomputation>,
}

impl<R: Recompute> ReactiveController<R> {
    pub fn new(pipeline: Arc<R>, delay: Duration, results: UnboundedSender<Recomputation>) -> Self {
        Self {
            pipeline,
            delay,
            form: LoanForm::default(),
            timer: None,
            latest_generation: Arc::new(AtomicU64::new(0)),
            results,
        }
    }

    /// Seeds the form before the first event, e.g. with a default currency.
    pub fn with_form(mut self, form: LoanForm) -> Self {
        self.form = form;
        self
    }

    pub fn form(&self) -> &LoanForm {
        &self.form
    }

    pub fn state(&self) -> ControllerState {
        match &self.timer {
            Some(timer) if !timer.is_finished() => ControllerState::PendingRecompute,
            _ => ControllerState::Idle,
        }
    }

    /// Applies the event and (re)arms the timer. Must be called from within
    /// a tokio runtime.
    pub fn handle(&mut self, event: InputEvent) {
        debug!(field = %event.field, value = %event.value, "Input changed");
        self.form.apply(event);

        if let Some(previous) = self.timer.take() {
            if !previous.is_finished() {
                debug!("Cancelling pending recomputation");
            }
            previous.abort();
        }

        let delay = self.delay;
        let form = self.form.clone();
        let pipeline = Arc::clone(&self.pipeline);
        let latest = Arc::clone(&self.latest_generation);
        let results = self.results.clone();

        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let generation = latest.fetch_add(1, Ordering::SeqCst) + 1;
            debug!(generation, "Debounce elapsed, recomputing");
            tokio::spawn(run_pipeline(pipeline, form, generation, latest, results));
        }));
    }

    /// Waits until an armed timer has fired and its pipeline run was started.
    pub async fn settle(&mut self) {
        if let Some(timer) = self.timer.take() {
            let _ = timer.await;
        }
    }
}

impl<R: Recompute> Drop for ReactiveController<R> {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

async fn run_pipeline<R: Recompute>(
    pipeline: Arc<R>,
    form: LoanForm,
    generation: u64,
    latest: Arc<AtomicU64>,
    results: UnboundedSender<Recomputation>,
) {
    let outcome = pipeline.recompute(form).await;
    if latest.load(Ordering::SeqCst) != generation {
        debug!(generation, "Discarding stale recomputation");
        return;
    }
    if results.send(Recomputation { generation, outcome }).is_err() {
        debug!(generation, "No receiver for recomputation");
    }
}
