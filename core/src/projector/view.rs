use crate::projector::dates::{self, DateFormatError};
use crate::record::{Detection, Snapshot};
use chrono::{DateTime, FixedOffset, Utc};
use std::collections::BTreeSet;

/// Maximum number of rows a viewer renders.
pub const VIEW_LIMIT: usize = 100;

/// One table row, with date and time recomputed in the viewer's zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayRow {
    pub timestamp: DateTime<Utc>,
    pub location: String,
    pub source: i64,
    pub date: String,
    pub time: String,
}

impl DisplayRow {
    /// The stored `date`/`time` strings are ignored on purpose.
    pub fn from_detection(detection: &Detection, zone: &FixedOffset) -> Self {
        Self {
            timestamp: detection.timestamp,
            location: detection.location.clone(),
            source: detection.source,
            date: dates::display_date(&detection.timestamp, zone),
            time: dates::display_time(&detection.timestamp, zone),
        }
    }
}

/// Location and date filters. Empty means "match everything".
///
/// The date is held in display form (`DD/MM/YYYY`) and edited in input
/// form (`YYYY-MM-DD`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    location: String,
    date: String,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn set_location(&mut self, location: impl Into<String>) {
        self.location = location.into();
    }

    /// Sets the date filter from the edit control value. On error the
    /// previous filter is left in place.
    pub fn set_date_input(&mut self, input: &str) -> Result<(), DateFormatError> {
        self.date = dates::input_to_display_date(input)?;
        Ok(())
    }

    /// Current date filter in edit control form.
    pub fn date_input(&self) -> String {
        dates::display_to_input_date(&self.date).unwrap_or_default()
    }

    pub fn clear(&mut self) {
        self.location.clear();
        self.date.clear();
    }

    pub fn matches(&self, row: &DisplayRow) -> bool {
        (self.location.is_empty() || row.location == self.location)
            && (self.date.is_empty() || row.date == self.date)
    }
}

/// Derived state published to the table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectedView {
    /// Distinct locations of the whole snapshot, ascending.
    pub locations: Vec<String>,
    /// Filtered rows in feed order, at most [`VIEW_LIMIT`].
    pub rows: Vec<DisplayRow>,
}

pub fn project(snapshot: &Snapshot, filters: &Filters, zone: &FixedOffset) -> ProjectedView {
    let locations = snapshot
        .records()
        .iter()
        .map(|detection| detection.location.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_owned)
        .collect();

    let rows = snapshot
        .records()
        .iter()
        .map(|detection| DisplayRow::from_detection(detection, zone))
        .filter(|row| filters.matches(row))
        .take(VIEW_LIMIT)
        .collect();

    ProjectedView { locations, rows }
}

#[derive(thiserror::Error, Debug)]
pub enum ProjectionError {
    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(#[from] serde_json::Error),
}

/// Latest snapshot plus the user's filters and the view derived from
/// them. Every update rebuilds the view from scratch.
#[derive(Debug, Clone)]
pub struct ViewerState {
    snapshot: Snapshot,
    filters: Filters,
    zone: FixedOffset,
    view: ProjectedView,
}

impl ViewerState {
    pub fn new(zone: FixedOffset) -> Self {
        Self {
            snapshot: Snapshot::default(),
            filters: Filters::default(),
            zone,
            view: ProjectedView::default(),
        }
    }

    /// Replaces the snapshot with one decoded from a pushed message.
    /// A message that does not decode leaves the current view untouched.
    pub fn apply_message(&mut self, payload: &str) -> Result<&ProjectedView, ProjectionError> {
        let snapshot = Snapshot::from_json(payload)?;
        self.apply_snapshot(snapshot);
        Ok(&self.view)
    }

    pub fn apply_snapshot(&mut self, snapshot: Snapshot) {
        self.snapshot = snapshot;
        self.refresh();
    }

    pub fn set_location_filter(&mut self, location: impl Into<String>) {
        self.filters.set_location(location);
        self.refresh();
    }

    pub fn set_date_filter_input(&mut self, input: &str) -> Result<(), DateFormatError> {
        self.filters.set_date_input(input)?;
        self.refresh();
        Ok(())
    }

    pub fn clear_filters(&mut self) {
        self.filters.clear();
        self.refresh();
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    pub fn view(&self) -> &ProjectedView {
        &self.view
    }

    pub fn snapshot_len(&self) -> usize {
        self.snapshot.len()
    }

    fn refresh(&mut self) {
        self.view = project(&self.snapshot, &self.filters, &self.zone);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn gate_snapshot() -> Snapshot {
        Snapshot::from_ordered(vec![
            Detection::new(
                Utc.with_ymd_and_hms(2024, 3, 5, 10, 15, 0).unwrap(),
                "Gate1",
                0,
                "stale",
                "stale",
            ),
            Detection::new(
                Utc.with_ymd_and_hms(2024, 3, 5, 9, 0, 0).unwrap(),
                "Gate2",
                1,
                "stale",
                "stale",
            ),
        ])
    }

    fn burst(count: usize, start: DateTime<Utc>) -> Snapshot {
        let records = (0..count)
            .map(|i| {
                let ts = start - Duration::seconds(i as i64 * 30);
                Detection::new(ts, format!("Gate{}", i % 3), 0, "", "")
            })
            .collect();
        Snapshot::from_unordered(records)
    }

    #[test]
    fn unfiltered_view_keeps_snapshot_order() {
        let view = project(&gate_snapshot(), &Filters::new(), &utc());
        assert_eq!(view.locations, ["Gate1", "Gate2"]);
        let rows: Vec<_> = view.rows.iter().map(|r| r.location.as_str()).collect();
        assert_eq!(rows, ["Gate1", "Gate2"]);
        assert_eq!(view.rows[0].date, "05/03/2024");
        assert_eq!(view.rows[0].time, "10:15");
    }

    #[test]
    fn location_filter_is_exact() {
        let mut filters = Filters::new();
        filters.set_location("Gate2");
        let view = project(&gate_snapshot(), &filters, &utc());
        assert_eq!(view.rows.len(), 1);
        assert_eq!(view.rows[0].location, "Gate2");
        // Options still cover the whole snapshot.
        assert_eq!(view.locations, ["Gate1", "Gate2"]);

        filters.set_location("gate2");
        assert!(project(&gate_snapshot(), &filters, &utc()).rows.is_empty());
        filters.set_location("Gate");
        assert!(project(&gate_snapshot(), &filters, &utc()).rows.is_empty());
    }

    #[test]
    fn location_filter_is_idempotent() {
        let snapshot = burst(40, Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap());
        let mut filters = Filters::new();
        filters.set_location("Gate1");
        let once = project(&snapshot, &filters, &utc());
        filters.set_location("Gate1");
        let twice = project(&snapshot, &filters, &utc());
        assert_eq!(once, twice);
        assert!(once.rows.iter().all(|r| r.location == "Gate1"));
    }

    #[test]
    fn date_filter_compares_recomputed_dates() {
        let snapshot = Snapshot::from_ordered(vec![
            Detection::new(
                Utc.with_ymd_and_hms(2024, 3, 6, 0, 30, 0).unwrap(),
                "Gate1",
                0,
                "05/03/2024",
                "",
            ),
            Detection::new(
                Utc.with_ymd_and_hms(2024, 3, 5, 8, 0, 0).unwrap(),
                "Gate1",
                0,
                "05/03/2024",
                "",
            ),
        ]);
        let mut filters = Filters::new();
        filters.set_date_input("2024-03-05").unwrap();
        assert_eq!(filters.date(), "05/03/2024");
        assert_eq!(filters.date_input(), "2024-03-05");

        let view = project(&snapshot, &filters, &utc());
        assert_eq!(view.rows.len(), 1);
        assert_eq!(view.rows[0].time, "08:00");

        // Same instants seen from UTC-1 both fall on the 5th.
        let minus_one = FixedOffset::west_opt(3600).unwrap();
        assert_eq!(project(&snapshot, &filters, &minus_one).rows.len(), 2);
    }

    #[test]
    fn filters_combine_and_clear() {
        let snapshot = burst(12, Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap());
        let mut filters = Filters::new();
        filters.set_location("Gate0");
        filters.set_date_input("2024-03-05").unwrap();
        assert_eq!(project(&snapshot, &filters, &utc()).rows.len(), 4);

        filters.set_date_input("2024-03-04").unwrap();
        assert!(project(&snapshot, &filters, &utc()).rows.is_empty());

        filters.set_date_input("").unwrap();
        assert_eq!(project(&snapshot, &filters, &utc()).rows.len(), 4);

        filters.clear();
        assert_eq!(project(&snapshot, &filters, &utc()).rows.len(), 12);
    }

    #[test]
    fn invalid_date_input_keeps_previous_filter() {
        let mut filters = Filters::new();
        filters.set_date_input("2024-03-05").unwrap();
        assert!(filters.set_date_input("2024-13-01").is_err());
        assert_eq!(filters.date(), "05/03/2024");
    }

    #[test]
    fn view_is_capped_to_most_recent() {
        let newest = Utc.with_ymd_and_hms(2024, 3, 5, 23, 0, 0).unwrap();
        let snapshot = burst(150, newest);
        let view = project(&snapshot, &Filters::new(), &utc());
        assert_eq!(view.rows.len(), VIEW_LIMIT);
        assert_eq!(view.rows[0].timestamp, newest);
        let oldest_shown = view.rows.last().unwrap().timestamp;
        assert_eq!(oldest_shown, newest - Duration::seconds(99 * 30));
        assert!(view.rows.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
    }

    #[test]
    fn neutral_filters_equal_truncated_snapshot() {
        let snapshot = burst(130, Utc.with_ymd_and_hms(2024, 3, 5, 20, 0, 0).unwrap());
        let view = project(&snapshot, &Filters::new(), &utc());
        let expected: Vec<_> = snapshot
            .records()
            .iter()
            .take(VIEW_LIMIT)
            .map(|d| DisplayRow::from_detection(d, &utc()))
            .collect();
        assert_eq!(view.rows, expected);
    }

    #[test]
    fn cap_holds_for_every_filter_combination() {
        let snapshot = burst(400, Utc.with_ymd_and_hms(2024, 3, 5, 23, 59, 0).unwrap());
        for location in ["", "Gate0", "Gate1", "Gate9"] {
            for date in ["", "2024-03-05", "2024-03-04"] {
                let mut filters = Filters::new();
                filters.set_location(location);
                filters.set_date_input(date).unwrap();
                assert!(project(&snapshot, &filters, &utc()).rows.len() <= VIEW_LIMIT);
            }
        }
    }

    #[test]
    fn empty_snapshot_projects_to_empty_view() {
        let view = project(&Snapshot::default(), &Filters::new(), &utc());
        assert!(view.locations.is_empty());
        assert!(view.rows.is_empty());
    }

    #[test]
    fn viewer_state_keeps_last_good_view_on_malformed_message() {
        let mut state = ViewerState::new(utc());
        let payload = gate_snapshot().to_json().unwrap();
        state.apply_message(&payload).unwrap();
        assert_eq!(state.view().rows.len(), 2);

        let err = state.apply_message("{not json").unwrap_err();
        assert!(matches!(err, ProjectionError::MalformedSnapshot(_)));
        assert!(state.apply_message(r#"{"error":"Error fetching detections"}"#).is_err());
        assert_eq!(state.view().rows.len(), 2);
        assert_eq!(state.snapshot_len(), 2);
    }

    #[test]
    fn viewer_state_filters_persist_across_snapshots() {
        let mut state = ViewerState::new(utc());
        state.set_location_filter("Gate2");
        state.apply_snapshot(gate_snapshot());
        assert_eq!(state.view().rows.len(), 1);

        let shrunk = Snapshot::from_ordered(vec![gate_snapshot().records()[0].clone()]);
        state.apply_snapshot(shrunk);
        assert!(state.view().rows.is_empty());
        assert_eq!(state.view().locations, ["Gate1"]);
        assert_eq!(state.filters().location(), "Gate2");

        state.set_location_filter("");
        assert_eq!(state.view().rows.len(), 1);
    }

    #[test]
    fn clearing_filters_empties_the_date_input() {
        let mut state = ViewerState::new(utc());
        state.set_location_filter("Gate1");
        state.set_date_filter_input("2024-03-05").unwrap();
        assert_eq!(state.filters().date_input(), "2024-03-05");

        state.clear_filters();
        assert_eq!(state.filters().date_input(), "");
        assert_eq!(state.filters().location(), "");
    }
}
