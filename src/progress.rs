//! Progress events emitted by the training stages.
//!
//! Stages never print; they hand [`ProgressEvent`]s to a
//! [`ProgressReporter`]. [`LogReporter`] forwards them to the `log` facade,
//! [`NullReporter`] drops them.
use log::{debug, info, warn};

#[derive(Clone, Debug, PartialEq)]
pub enum ProgressEvent {
    /// About to allocate the training matrix.
    Allocating {
        rows: usize,
        columns: usize,
        bytes: u128,
    },
    /// One image of the stream has been scanned.
    ImageHarvested {
        pass: usize,
        image_index: usize,
        image_count: usize,
        filled: usize,
        target: usize,
    },
    /// The stream was exhausted before the matrix filled; starting over.
    Wraparound {
        pass: usize,
        filled: usize,
        target: usize,
    },
    /// Columns normalized so far.
    Normalized { done: usize, total: usize },
    /// A solver round finished.
    LearnRound { completed: usize, total: usize },
    /// Random-sampling dictionary picked `k` of `from` columns.
    DictionarySampled { k: usize, from: usize },
}

pub trait ProgressReporter {
    fn report(&mut self, event: &ProgressEvent);
}

/// Forwards events to `log`; wraparound is a warning.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogReporter;

impl ProgressReporter for LogReporter {
    fn report(&mut self, event: &ProgressEvent) {
        match *event {
            ProgressEvent::Allocating {
                rows,
                columns,
                bytes,
            } => info!(
                "allocating data store {}x{}: {:.02} GB",
                rows,
                columns,
                bytes as f64 / 1e9
            ),
            ProgressEvent::ImageHarvested {
                pass,
                image_index,
                image_count,
                filled,
                target,
            } => debug!(
                "harvest pass {} image {}/{}: {} of {} ({:.1}%)",
                pass,
                image_index + 1,
                image_count,
                filled,
                target,
                100.0 * filled as f64 / target.max(1) as f64
            ),
            ProgressEvent::Wraparound {
                pass,
                filled,
                target,
            } => warn!(
                "wrapping around dataset (pass {}, {} of {} columns filled)",
                pass, filled, target
            ),
            ProgressEvent::Normalized { done, total } => {
                debug!("normalized {} of {} columns", done, total)
            }
            ProgressEvent::LearnRound { completed, total } => {
                info!("dictionary learning: {} of {} iterations", completed, total)
            }
            ProgressEvent::DictionarySampled { k, from } => {
                info!("sampled {} of {} columns as dictionary", k, from)
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NullReporter;

impl ProgressReporter for NullReporter {
    fn report(&mut self, _event: &ProgressEvent) {}
}

impl ProgressReporter for Vec<ProgressEvent> {
    fn report(&mut self, event: &ProgressEvent) {
        self.push(event.clone());
    }
}
