//! Signed asymmetry ratio of the rotated px difference.
//!
//! Convention, used by every caller: for `d = px_p,rot - px_n,rot`,
//!
//! ```text
//! ratio = count(d > 0) / count(d < 0)
//! ```
//!
//! Events with `d == 0` count towards `n_total` only. A zero denominator
//! gives `ratio = None`. The error `ratio * sqrt(1/n+ + 1/n-)` is present only
//! when both counts are non-zero.

use serde::{Deserialize, Serialize};

/// Ratio record consumed by the report writers.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RatioStatistic {
    /// `n_positive / n_negative`, absent when `n_negative == 0`.
    pub ratio: Option<f64>,
    /// Events with `px_p,rot > px_n,rot`.
    pub n_positive: u64,
    /// Events with `px_p,rot < px_n,rot`.
    pub n_negative: u64,
    /// All events, including ties.
    pub n_total: u64,
    /// Propagated Poisson uncertainty on the ratio.
    pub error: Option<f64>,
}

impl RatioStatistic {
    /// Builds the statistic from `px_p,rot - px_n,rot` values.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_differences<I>(differences: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let mut stat = Self::default();
        for d in differences {
            stat.n_total += 1;
            if d > 0.0 {
                stat.n_positive += 1;
            } else if d < 0.0 {
                stat.n_negative += 1;
            }
        }
        if stat.n_negative > 0 {
            let pos = stat.n_positive as f64;
            let neg = stat.n_negative as f64;
            let ratio = pos / neg;
            stat.ratio = Some(ratio);
            if stat.n_positive > 0 {
                stat.error = Some(ratio * (1.0 / pos + 1.0 / neg).sqrt());
            }
        }
        stat
    }

    /// Builds the statistic from parallel proton and neutron px columns.
    #[must_use]
    pub fn from_px(pxp: &[f64], pxn: &[f64]) -> Self {
        Self::from_differences(pxp.iter().zip(pxn).map(|(p, n)| p - n))
    }

    /// Returns true if the ratio is defined.
    #[must_use]
    pub fn is_defined(&self) -> bool {
        self.ratio.is_some()
    }
}
