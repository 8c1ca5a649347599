//! Event sources for the two raw-data layouts.
//!
//! A source turns `(target, gamma, charge ordering)` into a lazy
//! [`EventStream`]. Files are mapped and parsed one at a time, so only a
//! single file's events are held in memory while streaming.
//!
//! Missing folders and files are logged and recorded in the stream's
//! [`LoadReport`]; they never abort a load. Malformed lines are counted in
//! aggregate only.

use crate::paths::{DataRoot, DatasetKey};
use crate::reader::{data_lines, parse_discrete_line, parse_random_plane_line, MappedTextFile};
use crate::{Error, Result};
use dpol_core::{
    ChargeOrder, DatasetLayout, Event, EventBatch, EventTag, PolarizationType, PolarizationVariant,
};
use serde::Serialize;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

/// Event-number budget of the discrete layout: an event of file `b` is kept
/// iff `event_no < DISCRETE_EVENT_BUDGET * b / bmax_for_event_filter`.
pub const DISCRETE_EVENT_BUDGET: f64 = 10_000.0;

/// Aggregate bookkeeping of one or more loads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Files that were opened and parsed.
    pub files_read: usize,
    /// Folders or files that were expected but absent (or unreadable).
    pub missing: Vec<PathBuf>,
    /// Data lines skipped for wrong column count or non-numeric fields.
    pub malformed_lines: usize,
    /// Well-formed events dropped by the layout's event or `b` filter.
    pub filtered_events: usize,
    /// Events yielded.
    pub events: usize,
}

impl LoadReport {
    /// Folds another report into this one.
    pub fn merge(&mut self, other: LoadReport) {
        self.files_read += other.files_read;
        self.missing.extend(other.missing);
        self.malformed_lines += other.malformed_lines;
        self.filtered_events += other.filtered_events;
        self.events += other.events;
    }

    /// True if nothing could be read because every expected input was absent.
    #[must_use]
    pub fn all_missing(&self) -> bool {
        self.files_read == 0 && !self.missing.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
enum FileKind {
    Discrete { event_limit: f64, b: f64 },
    RandomPlane { b_window: Option<(f64, f64)> },
}

#[derive(Debug)]
struct PendingFile {
    path: PathBuf,
    tag: Arc<EventTag>,
    kind: FileKind,
}

/// Lazy stream of events over the files of one dataset.
pub struct EventStream {
    pending: VecDeque<PendingFile>,
    buffered: std::vec::IntoIter<Event>,
    report: LoadReport,
}

impl EventStream {
    fn planned(pending: VecDeque<PendingFile>, report: LoadReport) -> Self {
        Self {
            pending,
            buffered: Vec::new().into_iter(),
            report,
        }
    }

    /// A stream over events that are already in memory.
    #[must_use]
    pub fn from_events(events: Vec<Event>) -> Self {
        Self {
            pending: VecDeque::new(),
            buffered: events.into_iter(),
            report: LoadReport::default(),
        }
    }

    /// Report accumulated so far; complete once the stream is exhausted.
    #[must_use]
    pub fn report(&self) -> &LoadReport {
        &self.report
    }

    #[must_use]
    pub fn into_report(self) -> LoadReport {
        self.report
    }

    fn read_file(&mut self, file: &PendingFile) -> Vec<Event> {
        let mapped = match MappedTextFile::open(&file.path) {
            Ok(mapped) => mapped,
            Err(err) => {
                log::warn!(
                    "[{}] unreadable: {} ({err})",
                    file.tag.layout.tag(),
                    file.path.display()
                );
                self.report.missing.push(file.path.clone());
                return Vec::new();
            }
        };
        self.report.files_read += 1;

        let text = mapped.text();
        let mut events = Vec::new();
        for line in data_lines(&text) {
            match file.kind {
                FileKind::Discrete { event_limit, b } => {
                    let Some(rec) = parse_discrete_line(line) else {
                        self.report.malformed_lines += 1;
                        continue;
                    };
                    #[allow(clippy::cast_precision_loss)]
                    let event_no = rec.event_no as f64;
                    if event_no >= event_limit {
                        self.report.filtered_events += 1;
                        continue;
                    }
                    events.push(
                        Event::new(file.tag.clone(), rec.event_no, rec.proton, rec.neutron)
                            .with_impact_parameter(b),
                    );
                }
                FileKind::RandomPlane { b_window } => {
                    let Some(rec) = parse_random_plane_line(line) else {
                        self.report.malformed_lines += 1;
                        continue;
                    };
                    if let Some((lo, hi)) = b_window {
                        if !(lo <= rec.b && rec.b <= hi) {
                            self.report.filtered_events += 1;
                            continue;
                        }
                    }
                    events.push(
                        Event::new(file.tag.clone(), rec.event_no, rec.proton, rec.neutron)
                            .with_impact_parameter(rec.b)
                            .with_reaction_plane(rec.rpphi_deg),
                    );
                }
            }
        }
        events
    }
}

impl Iterator for EventStream {
    type Item = Event;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(event) = self.buffered.next() {
                self.report.events += 1;
                return Some(event);
            }
            let file = self.pending.pop_front()?;
            self.buffered = self.read_file(&file).into_iter();
        }
    }
}

/// Events of one dataset, fully loaded, with their load report.
#[derive(Debug, Clone, Default)]
pub struct DatasetLoad {
    pub events: Vec<Event>,
    pub report: LoadReport,
}

impl DatasetLoad {
    /// Drains a stream into memory.
    #[must_use]
    pub fn collect(mut stream: EventStream) -> Self {
        let events: Vec<Event> = stream.by_ref().collect();
        Self {
            events,
            report: stream.into_report(),
        }
    }

    /// Momenta of the loaded events in `SoA` form.
    #[must_use]
    pub fn batch(&self) -> EventBatch {
        EventBatch::from_events(&self.events)
    }

    /// Appends another load, keeping event order.
    pub fn extend(&mut self, other: DatasetLoad) {
        self.events.extend(other.events);
        self.report.merge(other.report);
    }
}

/// A source of raw breakup events for one polarization layout.
pub trait EventSource: Send + Sync {
    /// Polarization type this source serves.
    fn pol_type(&self) -> PolarizationType;

    /// Opens a lazy stream over one dataset.
    fn stream(&self, target: &str, gamma: &str, order: ChargeOrder) -> EventStream;

    /// Loads one dataset into memory.
    fn load(&self, target: &str, gamma: &str, order: ChargeOrder) -> DatasetLoad {
        DatasetLoad::collect(self.stream(target, gamma, order))
    }
}

/// Loads both charge orderings (`np` then `pn`) of a dataset and merges them.
pub fn load_merged(source: &dyn EventSource, target: &str, gamma: &str) -> DatasetLoad {
    let mut merged = DatasetLoad::default();
    for order in [ChargeOrder::Np, ChargeOrder::Pn] {
        merged.extend(source.load(target, gamma, order));
    }
    merged
}

fn dataset_tag(
    layout: DatasetLayout,
    target: &str,
    gamma: &str,
    variant: PolarizationVariant,
) -> Arc<EventTag> {
    Arc::new(EventTag {
        layout,
        target: target.to_string(),
        gamma: gamma.to_string(),
        variant,
    })
}

/// Reader for `z_pol/b_discrete`: one `dbreakbNN.dat` per integer `b`.
#[derive(Debug, Clone)]
pub struct DiscreteImpactSource {
    root: DataRoot,
    energy: String,
    b_min: i32,
    b_max: i32,
    bmax_for_event_filter: u32,
}

impl DiscreteImpactSource {
    /// Creates a reader for the inclusive impact-parameter range `[b_min, b_max]`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] if `bmax_for_event_filter` is zero.
    pub fn new(
        root: DataRoot,
        energy: impl Into<String>,
        b_range: (i32, i32),
        bmax_for_event_filter: u32,
    ) -> Result<Self> {
        if bmax_for_event_filter == 0 {
            return Err(Error::InvalidConfig(
                "bmax_for_event_filter must be positive".to_string(),
            ));
        }
        Ok(Self {
            root,
            energy: energy.into(),
            b_min: b_range.0,
            b_max: b_range.1,
            bmax_for_event_filter,
        })
    }

    /// File name for impact parameter `b`, zero padded to two digits.
    #[must_use]
    pub fn file_name(b: i32) -> String {
        format!("dbreakb{b:02}.dat")
    }

    /// Exclusive event-number limit for file `b`.
    #[must_use]
    pub fn event_limit(&self, b: i32) -> f64 {
        DISCRETE_EVENT_BUDGET * f64::from(b) / f64::from(self.bmax_for_event_filter)
    }
}

impl EventSource for DiscreteImpactSource {
    fn pol_type(&self) -> PolarizationType {
        PolarizationType::Z
    }

    fn stream(&self, target: &str, gamma: &str, order: ChargeOrder) -> EventStream {
        let variant = PolarizationVariant::new(PolarizationType::Z, order);
        let key = DatasetKey::new(target, self.energy.clone(), gamma, variant);
        let folder = self.root.dataset_dir(&key);
        let mut report = LoadReport::default();
        let mut pending = VecDeque::new();

        if !folder.is_dir() {
            log::warn!("[zpol] missing folder: {}", folder.display());
            report.missing.push(folder);
            return EventStream::planned(pending, report);
        }

        let tag = dataset_tag(DatasetLayout::DiscreteImpact, target, gamma, variant);
        for b in self.b_min..=self.b_max {
            let path = folder.join(Self::file_name(b));
            if !path.is_file() {
                log::warn!("[zpol] missing: {}", path.display());
                report.missing.push(path);
                continue;
            }
            pending.push_back(PendingFile {
                path,
                tag: tag.clone(),
                kind: FileKind::Discrete {
                    event_limit: self.event_limit(b),
                    b: f64::from(b),
                },
            });
        }
        EventStream::planned(pending, report)
    }
}

/// Reader for `y_pol/phi_random`: a single `dbreak.dat` per dataset.
#[derive(Debug, Clone)]
pub struct RandomPlaneSource {
    root: DataRoot,
    energy: String,
    b_window: Option<(f64, f64)>,
}

impl RandomPlaneSource {
    pub const FILE_NAME: &'static str = "dbreak.dat";

    pub fn new(root: DataRoot, energy: impl Into<String>) -> Self {
        Self {
            root,
            energy: energy.into(),
            b_window: None,
        }
    }

    /// Keeps only events with `b_min <= b <= b_max`.
    #[must_use]
    pub fn with_b_window(mut self, b_min: f64, b_max: f64) -> Self {
        self.b_window = Some((b_min, b_max));
        self
    }
}

impl EventSource for RandomPlaneSource {
    fn pol_type(&self) -> PolarizationType {
        PolarizationType::Y
    }

    fn stream(&self, target: &str, gamma: &str, order: ChargeOrder) -> EventStream {
        let variant = PolarizationVariant::new(PolarizationType::Y, order);
        let key = DatasetKey::new(target, self.energy.clone(), gamma, variant);
        let folder = self.root.dataset_dir(&key);
        let mut report = LoadReport::default();
        let mut pending = VecDeque::new();

        if !folder.is_dir() {
            log::warn!("[ypol] missing folder: {}", folder.display());
            report.missing.push(folder);
            return EventStream::planned(pending, report);
        }
        let path = folder.join(Self::FILE_NAME);
        if !path.is_file() {
            log::warn!("[ypol] missing: {}", path.display());
            report.missing.push(path);
            return EventStream::planned(pending, report);
        }

        pending.push_back(PendingFile {
            path,
            tag: dataset_tag(DatasetLayout::RandomReactionPlane, target, gamma, variant),
            kind: FileKind::RandomPlane {
                b_window: self.b_window,
            },
        });
        EventStream::planned(pending, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_limit_formula() {
        let source =
            DiscreteImpactSource::new(DataRoot::new("/nonexistent"), "190", (5, 10), 10).unwrap();
        assert!((source.event_limit(5) - 5000.0).abs() < f64::EPSILON);
        assert!((source.event_limit(10) - 10_000.0).abs() < f64::EPSILON);
        assert_eq!(DiscreteImpactSource::file_name(7), "dbreakb07.dat");
        assert_eq!(DiscreteImpactSource::file_name(12), "dbreakb12.dat");
    }

    #[test]
    fn test_zero_bmax_rejected() {
        assert!(DiscreteImpactSource::new(DataRoot::new("/x"), "190", (5, 10), 0).is_err());
    }

    #[test]
    fn test_missing_folder_is_reported_not_fatal() {
        let source = RandomPlaneSource::new(DataRoot::new("/nonexistent/root"), "190");
        let load = source.load("Pb208", "050", ChargeOrder::Np);
        assert!(load.events.is_empty());
        assert_eq!(load.report.missing.len(), 1);
        assert!(load.report.all_missing());
    }

    #[test]
    fn test_report_merge() {
        let mut a = LoadReport {
            files_read: 1,
            missing: vec![PathBuf::from("a")],
            malformed_lines: 2,
            filtered_events: 3,
            events: 4,
        };
        a.merge(LoadReport {
            files_read: 1,
            missing: vec![],
            malformed_lines: 1,
            filtered_events: 0,
            events: 6,
        });
        assert_eq!(a.files_read, 2);
        assert_eq!(a.malformed_lines, 3);
        assert_eq!(a.events, 10);
        assert!(!a.all_missing());
    }
}
