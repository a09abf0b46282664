//! Input validation and sanitization

use beef_util::MissId;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use thiserror::Error;

/// Maximum note length, in characters, after sanitization
pub const MAX_NOTE_LENGTH: usize = 500;

/// Maximum number of stored records
pub const MAX_RECORDS: usize = 1000;

/// Longest password the login endpoint will compare
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Entities produced by [`sanitize_html`], in escape order
const HTML_ENTITIES: [(char, &str); 6] = [
    ('&', "&amp;"),
    ('<', "&lt;"),
    ('>', "&gt;"),
    ('"', "&quot;"),
    ('\'', "&#x27;"),
    ('/', "&#x2F;"),
];

/// Reasons an add request is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid request body")]
    InvalidBody,

    #[error("Date is required")]
    DateRequired,

    #[error("Invalid date format. Use YYYY-MM-DD")]
    InvalidDateFormat,

    #[error("Date cannot be in the future")]
    FutureDate,

    #[error("Note must be a string")]
    NoteNotString,
}

/// Validated, sanitized add request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedMissInput {
    pub date: String,
    pub note: String,
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let bytes = s.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return None;
    }
    let digits_ok = bytes
        .iter()
        .enumerate()
        .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if !digits_ok {
        return None;
    }

    let year: i32 = s[0..4].parse().ok()?;
    let month: u32 = s[5..7].parse().ok()?;
    let day: u32 = s[8..10].parse().ok()?;

    // Rejects month 13, day 32, Feb 30, Feb 29 outside leap years
    NaiveDate::from_ymd_opt(year, month, day)
}

/// `YYYY-MM-DD` naming a real calendar date
pub fn is_valid_date(s: &str) -> bool {
    parse_date(s).is_some()
}

/// The date is today or earlier (UTC)
pub fn is_not_future_date(s: &str) -> bool {
    is_not_future_date_at(s, beef_util::now())
}

pub fn is_not_future_date_at(s: &str, now: DateTime<Utc>) -> bool {
    match parse_date(s) {
        Some(date) => date <= now.date_naive(),
        None => false,
    }
}

/// Escape the characters `& < > " ' /` as HTML entities
pub fn sanitize_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match entity_for(c) {
            Some(entity) => out.push_str(entity),
            None => out.push(c),
        }
    }
    out
}

fn entity_for(c: char) -> Option<&'static str> {
    HTML_ENTITIES
        .iter()
        .find(|(raw, _)| *raw == c)
        .map(|(_, entity)| *entity)
}

fn is_stripped_control(c: char) -> bool {
    matches!(c, '\u{00}'..='\u{08}' | '\u{0B}'..='\u{1F}' | '\u{7F}')
}

/// Sanitize a free-text note.
///
/// Non-string input yields `""`. Control characters other than newline and
/// tab are removed, surrounding whitespace trimmed, and the rest escaped with
/// the entities of [`sanitize_html`]. Entities already present in the input
/// are kept as-is and the escaped output never exceeds [`MAX_NOTE_LENGTH`]
/// characters, so sanitizing a sanitized note is a no-op.
pub fn sanitize_note(note: &Value) -> String {
    match note {
        Value::String(s) => sanitize_note_str(s),
        _ => String::new(),
    }
}

pub fn sanitize_note_str(note: &str) -> String {
    let stripped: String = note.chars().filter(|c| !is_stripped_control(*c)).collect();
    let trimmed = stripped.trim();

    let mut out = String::with_capacity(trimmed.len());
    let mut len = 0;
    let mut rest = trimmed;

    while let Some(c) = rest.chars().next() {
        let (piece, consumed) = match existing_entity(rest) {
            Some(entity) => (entity, entity.len()),
            None => match entity_for(c) {
                Some(entity) => (entity, c.len_utf8()),
                None => (&rest[..c.len_utf8()], c.len_utf8()),
            },
        };

        let piece_len = piece.chars().count();
        if len + piece_len > MAX_NOTE_LENGTH {
            break;
        }
        out.push_str(piece);
        len += piece_len;
        rest = &rest[consumed..];
    }

    // A cut can land right after whitespace
    out.truncate(out.trim_end().len());
    out
}

fn existing_entity(s: &str) -> Option<&'static str> {
    if !s.starts_with('&') {
        return None;
    }
    HTML_ENTITIES
        .iter()
        .map(|(_, entity)| *entity)
        .find(|entity| s.starts_with(entity))
}

/// Validate and sanitize the body of an add request
pub fn validate_miss_input(body: &Value) -> Result<ValidatedMissInput, ValidationError> {
    let fields = body.as_object().ok_or(ValidationError::InvalidBody)?;

    let date = match fields.get("date") {
        Some(Value::String(date)) if !date.is_empty() => date,
        _ => return Err(ValidationError::DateRequired),
    };

    if !is_valid_date(date) {
        return Err(ValidationError::InvalidDateFormat);
    }

    if !is_not_future_date(date) {
        return Err(ValidationError::FutureDate);
    }

    let note = match fields.get("note") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(note)) => sanitize_note_str(note),
        Some(_) => return Err(ValidationError::NoteNotString),
    };

    Ok(ValidatedMissInput {
        date: date.clone(),
        note,
    })
}

/// Exactly 10 characters of `[A-Za-z0-9_-]`
pub fn is_valid_id(id: &str) -> bool {
    MissId::is_well_formed(id)
}
