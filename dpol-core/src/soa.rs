//! Structure of Arrays (`SoA`) storage for momentum pairs.
//!
//! The bulk cut and acceptance stages operate on `EventBatch`, which keeps
//! the six momentum components in parallel vectors. This is also the
//! per-stage output handed to external renderers.

use crate::event::{Event, Momentum};
use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A batch of proton/neutron momentum pairs in `SoA` format.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EventBatch {
    pub pxp: Vec<f64>,
    pub pyp: Vec<f64>,
    pub pzp: Vec<f64>,
    pub pxn: Vec<f64>,
    pub pyn: Vec<f64>,
    pub pzn: Vec<f64>,
}

impl EventBatch {
    /// Creates a new empty batch with specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pxp: Vec::with_capacity(capacity),
            pyp: Vec::with_capacity(capacity),
            pzp: Vec::with_capacity(capacity),
            pxn: Vec::with_capacity(capacity),
            pyn: Vec::with_capacity(capacity),
            pzn: Vec::with_capacity(capacity),
        }
    }

    /// Builds a batch from event records, preserving order.
    #[must_use]
    pub fn from_events(events: &[Event]) -> Self {
        let mut batch = Self::with_capacity(events.len());
        for event in events {
            batch.push(event.proton, event.neutron);
        }
        batch
    }

    /// Builds a batch from six equally long component columns.
    ///
    /// # Errors
    /// Returns [`Error::LengthMismatch`] if the columns differ in length.
    pub fn from_columns(
        pxp: Vec<f64>,
        pyp: Vec<f64>,
        pzp: Vec<f64>,
        pxn: Vec<f64>,
        pyn: Vec<f64>,
        pzn: Vec<f64>,
    ) -> Result<Self> {
        let expected = pxp.len();
        for column in [&pyp, &pzp, &pxn, &pyn, &pzn] {
            if column.len() != expected {
                return Err(Error::LengthMismatch {
                    expected,
                    actual: column.len(),
                });
            }
        }
        Ok(Self {
            pxp,
            pyp,
            pzp,
            pxn,
            pyn,
            pzn,
        })
    }

    /// Returns the number of events in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pxp.len()
    }

    /// Returns true if the batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pxp.is_empty()
    }

    /// Pushes a single momentum pair into the batch.
    pub fn push(&mut self, proton: Momentum, neutron: Momentum) {
        self.pxp.push(proton.px);
        self.pyp.push(proton.py);
        self.pzp.push(proton.pz);
        self.pxn.push(neutron.px);
        self.pyn.push(neutron.py);
        self.pzn.push(neutron.pz);
    }

    /// Appends all events from another batch to this one.
    pub fn append(&mut self, other: &EventBatch) {
        self.pxp.extend_from_slice(&other.pxp);
        self.pyp.extend_from_slice(&other.pyp);
        self.pzp.extend_from_slice(&other.pzp);
        self.pxn.extend_from_slice(&other.pxn);
        self.pyn.extend_from_slice(&other.pyn);
        self.pzn.extend_from_slice(&other.pzn);
    }

    /// Proton momentum of event `i`.
    ///
    /// # Panics
    /// Panics if `i` is out of bounds.
    #[inline]
    #[must_use]
    pub fn proton(&self, i: usize) -> Momentum {
        Momentum::new(self.pxp[i], self.pyp[i], self.pzp[i])
    }

    /// Neutron momentum of event `i`.
    ///
    /// # Panics
    /// Panics if `i` is out of bounds.
    #[inline]
    #[must_use]
    pub fn neutron(&self, i: usize) -> Momentum {
        Momentum::new(self.pxn[i], self.pyn[i], self.pzn[i])
    }

    /// Iterates over `(proton, neutron)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (Momentum, Momentum)> + '_ {
        (0..self.len()).map(|i| (self.proton(i), self.neutron(i)))
    }

    /// Returns a new batch holding the events where `mask` is true.
    ///
    /// # Errors
    /// Returns [`Error::LengthMismatch`] if the mask length differs from the batch.
    pub fn select(&self, mask: &[bool]) -> Result<Self> {
        if mask.len() != self.len() {
            return Err(Error::LengthMismatch {
                expected: self.len(),
                actual: mask.len(),
            });
        }
        let kept = mask.iter().filter(|&&m| m).count();
        let mut out = Self::with_capacity(kept);
        for (i, _) in mask.iter().enumerate().filter(|(_, &m)| m) {
            out.push(self.proton(i), self.neutron(i));
        }
        Ok(out)
    }
}

impl FromIterator<(Momentum, Momentum)> for EventBatch {
    fn from_iter<I: IntoIterator<Item = (Momentum, Momentum)>>(iter: I) -> Self {
        let mut batch = Self::default();
        for (p, n) in iter {
            batch.push(p, n);
        }
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_batch_operations() {
        let mut batch = EventBatch::with_capacity(4);
        assert!(batch.is_empty());

        batch.push(Momentum::new(1.0, 2.0, 3.0), Momentum::new(4.0, 5.0, 6.0));
        batch.push(Momentum::new(-1.0, -2.0, 30.0), Momentum::new(7.0, 8.0, 9.0));
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.proton(1), Momentum::new(-1.0, -2.0, 30.0));
        assert_eq!(batch.neutron(0), Momentum::new(4.0, 5.0, 6.0));

        let selected = batch.select(&[false, true]).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected.pzp, vec![30.0]);

        let mut merged = batch.clone();
        merged.append(&selected);
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn test_select_rejects_wrong_mask_length() {
        let batch: EventBatch = std::iter::once((Momentum::default(), Momentum::default())).collect();
        assert!(matches!(
            batch.select(&[true, false]),
            Err(Error::LengthMismatch { expected: 1, actual: 2 })
        ));
    }

    #[test]
    fn test_from_columns_checks_lengths() {
        let ok = EventBatch::from_columns(
            vec![1.0],
            vec![2.0],
            vec![3.0],
            vec![4.0],
            vec![5.0],
            vec![6.0],
        );
        assert_eq!(ok.unwrap().len(), 1);

        let bad = EventBatch::from_columns(vec![1.0], vec![], vec![3.0], vec![4.0], vec![5.0], vec![6.0]);
        assert!(bad.is_err());
    }
}
