//! Client-side activation queue for adapters that emulate update batching

use crate::{BatchError, Result};

/// Parameters of one queued activation, indexed by position - 1.
/// Positions that were never staged are `None` and bind as NULL.
pub type Activation<P> = Vec<Option<P>>;

/// Queue of statement activations with an Oracle-style batch threshold.
///
/// Generic over the adapter's native parameter type. The queue only decides
/// *when* a driver batch is due; sending it is left to the adapter.
#[derive(Debug, Clone)]
pub struct ActivationQueue<P> {
    parameter_count: usize,
    threshold: usize,
    staged: Activation<P>,
    pending: Vec<Activation<P>>,
}

impl<P> ActivationQueue<P> {
    /// Queue for a statement taking `parameter_count` positional parameters,
    /// starting with a threshold of 1.
    pub fn new(parameter_count: usize) -> Self {
        Self {
            parameter_count,
            threshold: 1,
            staged: Self::empty_activation(parameter_count),
            pending: Vec::new(),
        }
    }

    pub fn parameter_count(&self) -> usize {
        self.parameter_count
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Change the threshold, returning the activations queued under the old
    /// one. The adapter must send them before queueing more.
    pub fn set_threshold(&mut self, threshold: usize) -> Result<Vec<Activation<P>>> {
        if threshold == 0 {
            return Err(BatchError::invalid_batch_size(threshold));
        }
        self.threshold = threshold;
        Ok(self.drain())
    }

    /// Stage a parameter of the current activation (1-based position)
    pub fn stage(&mut self, position: usize, value: P) -> Result<()> {
        if position == 0 || position > self.parameter_count {
            return Err(BatchError::Configuration(format!(
                "Parameter position {} is out of range, statement takes {}",
                position, self.parameter_count
            )));
        }
        self.staged[position - 1] = Some(value);
        Ok(())
    }

    /// Queue the staged activation. Returns the whole queue once it has
    /// reached the threshold.
    pub fn push(&mut self) -> Option<Vec<Activation<P>>> {
        let activation = std::mem::replace(
            &mut self.staged,
            Self::empty_activation(self.parameter_count),
        );
        self.pending.push(activation);
        if self.pending.len() >= self.threshold {
            Some(self.drain())
        } else {
            None
        }
    }

    /// Take every queued activation
    pub fn drain(&mut self) -> Vec<Activation<P>> {
        std::mem::take(&mut self.pending)
    }

    /// Number of queued activations
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn empty_activation(parameter_count: usize) -> Activation<P> {
        std::iter::repeat_with(|| None).take(parameter_count).collect()
    }
}
