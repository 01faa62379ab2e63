//! Field extraction from single response lines.
//!
//! These helpers work on one line that a wait has already matched; they do
//! not try to recognise responses in the stream.

use crate::error::{AtError, AtResult};

/// Prefix of the connection status line.
pub const STATUS_PREFIX: &str = "STATUS:";

/// Prefix of the SNTP time line.
pub const SNTP_TIME_PREFIX: &str = "+CIPSNTPTIME:";

/// Status codes starting with this digit mean the station has no AP.
pub const STATUS_NOT_CONNECTED: char = '5';

/// Year the module reports before its first successful SNTP sync.
pub const UNSYNCHRONIZED_YEAR: u16 = 1970;

/// Connection status from an `AT+CIPSTATUS` query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStatus {
    /// Whether a status line was received at all.
    pub reported: bool,
    /// Status code, if the line carried a parsable one.
    pub code: Option<u32>,
    /// Whether the line read `STATUS:5`, with or without further digits.
    pub not_connected: bool,
}

impl ConnectionStatus {
    /// Interpret the line returned by waiting for `STATUS:`.
    ///
    /// An empty line (nothing matched) yields a status without a code.
    pub fn parse(line: &str) -> ConnectionStatus {
        let digits: Option<&str> = line.find(STATUS_PREFIX).map(|start| {
            let rest = &line[start + STATUS_PREFIX.len()..];
            let end = rest
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(rest.len());
            &rest[..end]
        });

        ConnectionStatus {
            reported: !line.is_empty(),
            code: digits.and_then(|digits| digits.parse().ok()),
            not_connected: digits.is_some_and(|digits| digits.starts_with(STATUS_NOT_CONNECTED)),
        }
    }

    /// Whether the station is associated with an access point.
    ///
    /// Not connected if no status line arrived or the code starts with 5.
    pub fn is_connected(&self) -> bool {
        self.reported && !self.not_connected
    }
}

/// Time reported by `AT+CIPSNTPTIME?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SntpTime {
    /// Day of week, 1 (Monday) to 7 (Sunday).
    pub weekday: u8,
    /// Day of month (1-31).
    pub day: u8,
    /// Month (1-12).
    pub month: u8,
    /// Year (e.g., 2024).
    pub year: u16,
    /// Hours (0-23).
    pub hour: u8,
    /// Minutes (0-59).
    pub minute: u8,
    /// Seconds (0-59).
    pub second: u8,
}

impl SntpTime {
    /// Parse a line such as `+CIPSNTPTIME:Mon Dec 12 02:33:32 2016`.
    ///
    /// Anything up to the first `:` is ignored and runs of spaces between
    /// fields are tolerated.
    pub fn parse(line: &str) -> AtResult<SntpTime> {
        let body = match line.find(':') {
            Some(colon) => &line[colon + 1..],
            None => line,
        };

        let fields: Vec<&str> = body.split_whitespace().collect();
        if fields.len() < 5 {
            return Err(AtError::Parse(format!(
                "expected 5 time fields, got {}: {:?}",
                fields.len(),
                line
            )));
        }

        let weekday = parse_weekday(fields[0])
            .ok_or_else(|| AtError::Parse(format!("invalid weekday: {}", fields[0])))?;
        let month = parse_month(fields[1])
            .ok_or_else(|| AtError::Parse(format!("invalid month: {}", fields[1])))?;
        let day: u8 = fields[2]
            .parse()
            .map_err(|_| AtError::Parse(format!("invalid day: {}", fields[2])))?;

        let time_parts: Vec<&str> = fields[3].split(':').collect();
        if time_parts.len() != 3 {
            return Err(AtError::Parse(format!("invalid time: {}", fields[3])));
        }
        let hour: u8 = time_parts[0]
            .parse()
            .map_err(|_| AtError::Parse(format!("invalid hour: {}", time_parts[0])))?;
        let minute: u8 = time_parts[1]
            .parse()
            .map_err(|_| AtError::Parse(format!("invalid minute: {}", time_parts[1])))?;
        let second: u8 = time_parts[2]
            .parse()
            .map_err(|_| AtError::Parse(format!("invalid second: {}", time_parts[2])))?;

        let year: u16 = fields[4]
            .parse()
            .map_err(|_| AtError::Parse(format!("invalid year: {}", fields[4])))?;

        Ok(SntpTime {
            weekday,
            day,
            month,
            year,
            hour,
            minute,
            second,
        })
    }

    /// Whether the module has synchronised with an NTP server yet.
    pub fn is_synchronized(&self) -> bool {
        self.year != UNSYNCHRONIZED_YEAR
    }
}

fn parse_weekday(name: &str) -> Option<u8> {
    match name {
        "Mon" => Some(1),
        "Tue" => Some(2),
        "Wed" => Some(3),
        "Thu" => Some(4),
        "Fri" => Some(5),
        "Sat" => Some(6),
        "Sun" => Some(7),
        _ => None,
    }
}

fn parse_month(name: &str) -> Option<u8> {
    match name {
        "Jan" => Some(1),
        "Feb" => Some(2),
        "Mar" => Some(3),
        "Apr" => Some(4),
        "May" => Some(5),
        "Jun" => Some(6),
        "Jul" => Some(7),
        "Aug" => Some(8),
        "Sep" => Some(9),
        "Oct" => Some(10),
        "Nov" => Some(11),
        "Dec" => Some(12),
        _ => None,
    }
}
