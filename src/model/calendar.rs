//! Calendar event summary extracted from a `text/calendar` part.

use chrono::NaiveDateTime;

/// One VEVENT. Every field is optional; a field that is absent or fails to
/// decode is simply `None` (or an empty attendee list).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalendarEvent {
    /// Organizer address, lower-cased, without the `mailto:` scheme.
    pub organizer: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    /// Start time as written in the calendar (wall clock, no zone conversion).
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    /// Attendee addresses in declaration order.
    pub attendees: Vec<String>,
}
