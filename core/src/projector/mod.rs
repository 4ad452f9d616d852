//! Viewer-side projection of snapshots into the rendered table.
//!
//! Everything here is pure: given the same snapshot, filters and zone
//! the projection is identical, so it can be unit tested without a UI.

pub mod dates;
pub mod view;

pub use dates::{display_to_input_date, input_to_display_date, DateFormatError};
pub use view::{
    project, DisplayRow, Filters, ProjectedView, ProjectionError, ViewerState, VIEW_LIMIT,
};
