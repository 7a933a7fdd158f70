//! Alerts structure
//!
//! The controller stores alert times as seconds counted from
//! 2000-01-01 00:00:00 on a fixed calendar of 31-day months. The
//! conversion must use that calendar, not the real one, or timestamps
//! drift by days.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::cursor::{Cursor, PayloadWriter};
use crate::error::{Result, WireError};

/// Sentinel for "alert still active"
const UNTIL_SENTINEL: u32 = u32::MAX;

const SECONDS_PER_MINUTE: u32 = 60;
const SECONDS_PER_HOUR: u32 = 60 * 60;
const SECONDS_PER_DAY: u32 = 60 * 60 * 24;
const SECONDS_PER_MONTH: u32 = SECONDS_PER_DAY * 31;
const SECONDS_PER_YEAR: u32 = SECONDS_PER_MONTH * 12;

/// One alert record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub code: u8,
    pub from: NaiveDateTime,
    /// `None` while the alert is still active
    pub to: Option<NaiveDateTime>,
}

/// Payload of the alerts response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Alerts {
    /// Number of alerts in the controller log
    pub total: u8,
    pub start: u8,
    pub alerts: Vec<Alert>,
}

/// Convert a controller timestamp to a calendar datetime
pub fn datetime_from_seconds(timestamp: u32) -> Result<NaiveDateTime> {
    let mut remaining = timestamp;
    let mut component = |seconds: u32| {
        let value = remaining / seconds;
        remaining -= value * seconds;
        value
    };

    let year = component(SECONDS_PER_YEAR) + 2000;
    let month = component(SECONDS_PER_MONTH) + 1;
    let day = component(SECONDS_PER_DAY) + 1;
    let hour = component(SECONDS_PER_HOUR);
    let minute = component(SECONDS_PER_MINUTE);
    let second = remaining;

    chrono::NaiveDate::from_ymd_opt(year as i32, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, second))
        .ok_or_else(|| WireError::malformed(format!("invalid alert timestamp: {timestamp}")))
}

/// Convert a calendar datetime back to a controller timestamp
pub fn seconds_from_datetime(datetime: &NaiveDateTime) -> u32 {
    use chrono::{Datelike, Timelike};
    let years = datetime.year().saturating_sub(2000) as u32;
    years * SECONDS_PER_YEAR
        + (datetime.month() - 1) * SECONDS_PER_MONTH
        + (datetime.day() - 1) * SECONDS_PER_DAY
        + datetime.hour() * SECONDS_PER_HOUR
        + datetime.minute() * SECONDS_PER_MINUTE
        + datetime.second()
}

pub fn decode(cursor: &mut Cursor<'_>) -> Result<Alerts> {
    let total = cursor.read_u8()?;
    let start = cursor.read_u8()?;
    let count = cursor.read_u8()?;

    let mut alerts = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        let code = cursor.read_u8()?;
        let from = datetime_from_seconds(cursor.read_u32()?)?;
        let to_seconds = cursor.read_u32()?;
        let to = if to_seconds == UNTIL_SENTINEL {
            None
        } else {
            Some(datetime_from_seconds(to_seconds)?)
        };
        alerts.push(Alert { code, from, to });
    }

    Ok(Alerts {
        total,
        start,
        alerts,
    })
}

pub fn encode(writer: &mut PayloadWriter, alerts: &Alerts) {
    writer.put_u8(alerts.total);
    writer.put_u8(alerts.start);
    writer.put_u8(alerts.alerts.len() as u8);
    for alert in &alerts.alerts {
        writer.put_u8(alert.code);
        writer.put_u32(seconds_from_datetime(&alert.from));
        writer.put_u32(
            alert
                .to
                .as_ref()
                .map(seconds_from_datetime)
                .unwrap_or(UNTIL_SENTINEL),
        );
    }
}

/// Payload of the alerts request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertsRequest {
    pub start: u8,
    pub count: u8,
}

impl Default for AlertsRequest {
    fn default() -> Self {
        Self { start: 0, count: 10 }
    }
}

pub fn decode_request(cursor: &mut Cursor<'_>) -> Result<AlertsRequest> {
    Ok(AlertsRequest {
        start: cursor.read_u8()?,
        count: cursor.read_u8()?,
    })
}

pub fn encode_request(writer: &mut PayloadWriter, request: &AlertsRequest) {
    writer.put_u8(request.start);
    writer.put_u8(request.count);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datetime_zero_is_epoch() {
        let datetime = datetime_from_seconds(0).unwrap();
        assert_eq!(datetime.to_string(), "2000-01-01 00:00:00");
    }

    #[test]
    fn test_datetime_components() {
        // 1 year + 1 month + 1 day + 1 hour + 1 minute + 1 second on the
        // controller's 31-day-month calendar
        let seconds =
            SECONDS_PER_YEAR + SECONDS_PER_MONTH + SECONDS_PER_DAY + SECONDS_PER_HOUR + 61;
        let datetime = datetime_from_seconds(seconds).unwrap();
        assert_eq!(datetime.to_string(), "2001-02-02 01:01:01");
    }

    #[test]
    fn test_datetime_roundtrip() {
        for seconds in [0u32, 1, 59, 674_180_463, 700_000_000] {
            let datetime = datetime_from_seconds(seconds).unwrap();
            assert_eq!(seconds_from_datetime(&datetime), seconds);
        }
    }

    #[test]
    fn test_alerts_roundtrip() {
        let alerts = Alerts {
            total: 4,
            start: 0,
            alerts: vec![
                Alert {
                    code: 26,
                    from: datetime_from_seconds(674_180_463).unwrap(),
                    to: Some(datetime_from_seconds(674_181_463).unwrap()),
                },
                Alert {
                    code: 0,
                    from: datetime_from_seconds(674_182_000).unwrap(),
                    to: None,
                },
            ],
        };

        let mut writer = PayloadWriter::new();
        encode(&mut writer, &alerts);

        let bytes = writer.into_bytes();
        assert_eq!(bytes.len(), 3 + 2 * 9);

        let mut cursor = Cursor::new(&bytes);
        assert_eq!(decode(&mut cursor).unwrap(), alerts);
    }

    #[test]
    fn test_empty_alerts() {
        let alerts = Alerts {
            total: 0,
            start: 0,
            alerts: vec![],
        };
        let mut writer = PayloadWriter::new();
        encode(&mut writer, &alerts);

        let bytes = writer.into_bytes();
        let mut cursor = Cursor::new(&bytes);
        assert_eq!(decode(&mut cursor).unwrap(), alerts);
    }

    #[test]
    fn test_request_roundtrip() {
        let request = AlertsRequest { start: 2, count: 5 };
        let mut writer = PayloadWriter::new();
        encode_request(&mut writer, &request);

        let bytes = writer.into_bytes();
        let mut cursor = Cursor::new(&bytes);
        assert_eq!(decode_request(&mut cursor).unwrap(), request);
    }
}
