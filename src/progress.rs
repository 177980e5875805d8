//! Progress reporting hooks for transfers.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;

const BAR_TEMPLATE: &str = "{msg} [{bar:40.cyan/blue}] {pos}/{len} ({elapsed})";

/// Receives progress events from the driver and the batch writer.
///
/// Observers only watch; nothing they do changes how documents are batched
/// or written. `on_document` may be called from concurrent writes.
pub trait ProgressObserver: Send + Sync {
    fn on_transfer_start(&self, _collection: &str, _rows: usize) {}

    /// Called once per document handed to the store.
    fn on_document(&self, _collection: &str) {}

    fn on_transfer_finish(&self, _collection: &str) {}

    /// Called instead of `on_transfer_finish` when a write error ends the
    /// transfer.
    fn on_transfer_failed(&self, _collection: &str) {}
}

/// Ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {}

/// Terminal progress bar, one per collection, labelled `Collection: <name>`.
#[derive(Default)]
pub struct ProgressBars {
    current: Mutex<Option<ProgressBar>>,
}

impl ProgressBars {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressObserver for ProgressBars {
    fn on_transfer_start(&self, collection: &str, rows: usize) {
        let style = ProgressStyle::with_template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        let bar = ProgressBar::new(rows as u64)
            .with_style(style.progress_chars("#>-"))
            .with_message(format!("Collection: {collection}"));
        if let Ok(mut current) = self.current.lock() {
            if let Some(previous) = current.replace(bar) {
                previous.abandon();
            }
        }
    }

    fn on_document(&self, _collection: &str) {
        if let Ok(current) = self.current.lock() {
            if let Some(bar) = current.as_ref() {
                bar.inc(1);
            }
        }
    }

    fn on_transfer_finish(&self, _collection: &str) {
        if let Ok(mut current) = self.current.lock() {
            if let Some(bar) = current.take() {
                bar.finish();
            }
        }
    }

    fn on_transfer_failed(&self, _collection: &str) {
        if let Ok(mut current) = self.current.lock() {
            if let Some(bar) = current.take() {
                bar.abandon();
            }
        }
    }
}
