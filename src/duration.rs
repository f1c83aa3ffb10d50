//! ISO-8601 durations as reported in `contentDetails.duration`.
//!
//! Only the calendar-independent subset is accepted: weeks, days, hours, minutes and
//! seconds (`P1W`, `P2DT3H`, `PT4M5.5S`). Years and months have no fixed length and
//! are never emitted for videos, so they are rejected.

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum DurationError {
    #[error("duration {0:?} does not start with 'P'")]
    MissingPrefix(String),
    #[error("duration {0:?} has no components")]
    Empty(String),
    #[error("duration {input:?}: unsupported designator '{designator}'")]
    Designator { input: String, designator: char },
    #[error("duration {input:?}: unit '{designator}' is repeated or out of order")]
    Order { input: String, designator: char },
    #[error("duration {input:?}: bad number {number:?}")]
    Number { input: String, number: String },
}

const DATE_UNITS: &[(char, f64)] = &[('W', 604_800.0), ('D', 86_400.0)];
const TIME_UNITS: &[(char, f64)] = &[('H', 3_600.0), ('M', 60.0), ('S', 1.0)];

/// Parses an ISO-8601 duration into total seconds.
pub fn parse_iso8601(input: &str) -> Result<f64, DurationError> {
    let body = input
        .strip_prefix('P')
        .ok_or_else(|| DurationError::MissingPrefix(input.to_string()))?;

    let (date_part, time_part) = match body.split_once('T') {
        Some((date, time)) => {
            if time.is_empty() {
                return Err(DurationError::Empty(input.to_string()));
            }
            (date, Some(time))
        }
        None => (body, None),
    };

    if date_part.is_empty() && time_part.is_none() {
        return Err(DurationError::Empty(input.to_string()));
    }

    let mut total = parse_section(input, date_part, DATE_UNITS)?;
    if let Some(time) = time_part {
        total += parse_section(input, time, TIME_UNITS)?;
    }
    Ok(total)
}

/// Minutes, as the filter compares them.
pub fn parse_minutes(input: &str) -> Result<f64, DurationError> {
    parse_iso8601(input).map(|secs| secs / 60.0)
}

fn parse_section(input: &str, section: &str, units: &[(char, f64)]) -> Result<f64, DurationError> {
    let mut total = 0.0;
    let mut number = String::new();
    // Index into `units` of the next allowed designator; enforces order and uniqueness.
    let mut next_unit = 0;

    for c in section.chars() {
        if c.is_ascii_digit() || c == '.' || c == ',' {
            number.push(if c == ',' { '.' } else { c });
            continue;
        }

        let pos = units
            .iter()
            .position(|(d, _)| *d == c)
            .ok_or(DurationError::Designator {
                input: input.to_string(),
                designator: c,
            })?;
        if pos < next_unit {
            return Err(DurationError::Order {
                input: input.to_string(),
                designator: c,
            });
        }
        let value: f64 = number.parse().map_err(|_| DurationError::Number {
            input: input.to_string(),
            number: number.clone(),
        })?;
        total += value * units[pos].1;
        next_unit = pos + 1;
        number.clear();
    }

    if !number.is_empty() {
        return Err(DurationError::Number {
            input: input.to_string(),
            number,
        });
    }
    Ok(total)
}
