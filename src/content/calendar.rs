//! Summaries of embedded `text/calendar` invitations.

use chrono::{NaiveDate, NaiveDateTime};
use ical::parser::ical::component::IcalEvent;

use crate::content::html_escape;
use crate::diagnostics::Diagnostics;
use crate::i18n;
use crate::model::calendar::CalendarEvent;
use crate::parser::transfer;
use crate::walker::MimeWalker;

/// Extract the events of every `text/calendar` leaf, in traversal order.
///
/// Calendar data that cannot be parsed is reported as one warning per part;
/// the events of the blocks that did parse are kept. Calendar parts are not
/// consumed; they remain attachment candidates.
pub fn extract_events(walker: &MimeWalker<'_>, diag: &mut Diagnostics) -> Vec<CalendarEvent> {
    let mut events = Vec::new();
    for leaf in walker.find_all_by_content_type("text/calendar") {
        let text = transfer::decode_text(leaf.part, diag);
        let parsed = parse_calendar(&text);
        tracing::debug!(
            leaf = leaf.id.0,
            events = parsed.events.len(),
            errors = parsed.errors.len(),
            "Parsed calendar part"
        );
        if let Some(reason) = parsed.errors.first() {
            diag.warn(format!("Could not parse calendar part: {reason}"));
        }
        events.extend(parsed.events);
    }
    events
}

/// Events of one calendar part plus the errors of the blocks that failed.
#[derive(Debug, Default)]
pub struct ParsedCalendar {
    pub events: Vec<CalendarEvent>,
    pub errors: Vec<String>,
}

/// Parse iCalendar text into its VEVENTs. A VCALENDAR block that fails is
/// skipped; text without any VCALENDAR is an error.
pub fn parse_calendar(text: &str) -> ParsedCalendar {
    let mut parsed = ParsedCalendar::default();
    let mut calendars = 0;
    for calendar in ical::IcalParser::new(text.as_bytes()) {
        match calendar {
            Ok(calendar) => {
                calendars += 1;
                parsed.events.extend(calendar.events.iter().map(convert_event));
            }
            Err(e) => parsed.errors.push(e.to_string()),
        }
    }
    if calendars == 0 && parsed.errors.is_empty() {
        parsed.errors.push("no VCALENDAR found".into());
    }
    parsed
}

fn convert_event(event: &IcalEvent) -> CalendarEvent {
    let mut out = CalendarEvent::default();
    for property in &event.properties {
        let Some(value) = property.value.as_deref() else {
            continue;
        };
        match property.name.to_ascii_uppercase().as_str() {
            "ORGANIZER" => out.organizer = Some(normalize_address(value)),
            "SUMMARY" => out.summary = Some(unescape_text(value)),
            "DESCRIPTION" => out.description = Some(unescape_text(value)),
            "LOCATION" => out.location = Some(unescape_text(value)),
            "DTSTART" => out.start = parse_datetime(value),
            "DTEND" => out.end = parse_datetime(value),
            "ATTENDEE" => out.attendees.push(normalize_address(value)),
            _ => {}
        }
    }
    out
}

/// Lower-case an address and strip the `mailto:` scheme.
fn normalize_address(value: &str) -> String {
    value.trim().to_lowercase().replace("mailto:", "")
}

/// Undo RFC 5545 TEXT escaping.
pub fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Parse a DATE-TIME (`20240131T093000`, optionally `Z`-suffixed) or DATE
/// (`20240131`, taken as midnight) value.
pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    let value = value.strip_suffix(['Z', 'z']).unwrap_or(value);
    NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y%m%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Render events as one HTML table each. Missing fields give empty rows.
pub fn render_events(events: &[CalendarEvent]) -> String {
    events.iter().map(render_event).collect()
}

/// Extract and render all calendar parts of a message.
pub fn render_calendar(walker: &MimeWalker<'_>, diag: &mut Diagnostics) -> String {
    render_events(&extract_events(walker, diag))
}

fn render_event(event: &CalendarEvent) -> String {
    let text = |v: &Option<String>| {
        v.as_deref()
            .map(|s| html_escape(s).replace('\n', "<br>"))
            .unwrap_or_default()
    };
    let when = |v: &Option<NaiveDateTime>| {
        v.map(|dt| dt.format(i18n::cal_datetime_format()).to_string())
            .unwrap_or_default()
    };
    let attendees = event
        .attendees
        .iter()
        .map(|a| html_escape(a))
        .collect::<Vec<_>>()
        .join(",<br>");

    let mut table = String::from(
        "<table style=\"width:60%; border: 1px solid blue; text-align: left; padding: 0px;\">",
    );
    table.push_str(&format!(
        "<tr style=\"text-align: center;\"><td colspan=2 bgcolor=\"#E6E6FA\" \
         style=\"padding: 0px; margin: 0px\">{}</td></tr>",
        i18n::cal_appointment()
    ));
    table.push_str(&row(i18n::cal_title(), &text(&event.summary)));
    table.push_str(&row(i18n::cal_description(), &text(&event.description)));
    table.push_str(&row(i18n::cal_location(), &text(&event.location)));
    table.push_str(&row(
        i18n::cal_when(),
        &format!("{} - {}", when(&event.start), when(&event.end)),
    ));
    table.push_str(&row(
        i18n::cal_organizer(),
        &event.organizer.as_deref().map(html_escape).unwrap_or_default(),
    ));
    table.push_str(&row(i18n::cal_attendees(), &attendees));
    table.push_str("</table>");
    table
}

fn row(label: &str, content: &str) -> String {
    format!(
        "<tr><td style=\"vertical-align:top; background-color: #E6E6FA\">{label}:</td>\
         <td style=\"vertical-align:top;\">{content}</td></tr>"
    )
}
