//! Date/time codecs (spec §4.7): `DATE`, `TIME`, `DATETIME`/`TIMESTAMP`, and
//! the zero-date policy (spec §6 `zeroDate`) for MySQL's `0000-00-00` and
//! `*-*-00` values, which have no `chrono`/`time` equivalent.
//!
//! Grounded on `sqlx_core/src/mysql/types/{date,time,datetime}.rs`'s
//! variable-length binary encoding (a length byte selecting between the
//! date-only/date+time/date+time+micros shapes) and
//! `sqlx_core/src/mysql/connection/mod.rs`'s zero-date handling branch on
//! `MySqlDatabaseError`. The plain structs below exist independent of the
//! optional `chrono` feature so the crate has a working temporal
//! representation with zero extra dependencies; the feature adds
//! `From`/`TryFrom` conversions to `chrono`'s types for callers who want
//! them.

use bytes::{Buf, BytesMut};

use crate::codec::type_id;
use crate::error::{protocol_err, Result};
use crate::io::MySqlBufMutExt;
use crate::message::client::EncodedParam;
use crate::options::ZeroDate;
use crate::value::MySqlValueFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MySqlDate {
    pub year: u16,
    pub month: u8,
    pub day: u8,
}

impl std::fmt::Display for MySqlDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MySqlTime {
    pub is_negative: bool,
    pub days: u32,
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub micros: u32,
}

impl std::fmt::Display for MySqlTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_negative {
            write!(f, "-")?;
        }
        let total_hours = self.days as u64 * 24 + self.hours as u64;
        write!(f, "{:02}:{:02}:{:02}", total_hours, self.minutes, self.seconds)?;
        if self.micros != 0 {
            write!(f, ".{:06}", self.micros)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MySqlDateTime {
    pub date: MySqlDate,
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub micros: u32,
}

impl std::fmt::Display for MySqlDateTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {:02}:{:02}:{:02}", self.date, self.hours, self.minutes, self.seconds)?;
        if self.micros != 0 {
            write!(f, ".{:06}", self.micros)?;
        }
        Ok(())
    }
}

fn is_zero_date(d: &MySqlDate) -> bool {
    d.year == 0 && d.month == 0 && d.day == 0
}

/// Applies the zero-date policy (spec §6 `zeroDate`) to a date that decoded
/// structurally fine but is the sentinel "no date" value.
fn apply_zero_date_policy(date: MySqlDate, zero_date: ZeroDate) -> Result<Option<MySqlDate>> {
    if !is_zero_date(&date) {
        return Ok(Some(date));
    }
    match zero_date {
        ZeroDate::UseNull => Ok(None),
        ZeroDate::UseRound => Ok(Some(MySqlDate {
            year: date.year.max(1),
            month: date.month.max(1),
            day: date.day.max(1),
        })),
        ZeroDate::Exception => Err(protocol_err!("zero date encountered with zeroDate=EXCEPTION")),
    }
}

pub(crate) fn decode_date(
    bytes: &[u8],
    format: MySqlValueFormat,
    zero_date: ZeroDate,
) -> Result<MySqlDate> {
    let date = match format {
        MySqlValueFormat::Text => parse_text_date(std::str::from_utf8(bytes).map_err(|_| protocol_err!("DATE value was not valid UTF-8"))?)?,
        MySqlValueFormat::Binary => decode_binary_date_prefix(bytes)?.0,
    };
    match apply_zero_date_policy(date, zero_date)? {
        Some(d) => Ok(d),
        None => Ok(MySqlDate::default()),
    }
}

fn parse_text_date(s: &str) -> Result<MySqlDate> {
    let mut parts = s.split('-');
    let year = parts.next().and_then(|s| s.parse().ok()).ok_or_else(|| protocol_err!("malformed DATE {s:?}"))?;
    let month = parts.next().and_then(|s| s.parse().ok()).ok_or_else(|| protocol_err!("malformed DATE {s:?}"))?;
    let day = parts.next().and_then(|s| s.parse().ok()).ok_or_else(|| protocol_err!("malformed DATE {s:?}"))?;
    Ok(MySqlDate { year, month, day })
}

/// Parses the shared date-prefix binary shape (`length, year(u16), month,
/// day, [hour, min, sec, [micros(u32)]]`), returning the date plus whatever
/// time fields followed.
fn decode_binary_date_prefix(mut bytes: &[u8]) -> Result<(MySqlDate, u8, u8, u8, u32)> {
    if bytes.is_empty() {
        return Err(protocol_err!("empty DATE/DATETIME binary value"));
    }
    let len = bytes.get_u8();
    if len == 0 {
        return Ok((MySqlDate::default(), 0, 0, 0, 0));
    }
    if bytes.len() < 4 {
        return Err(protocol_err!("truncated DATE/DATETIME binary value"));
    }
    let year = bytes.get_u16_le();
    let month = bytes.get_u8();
    let day = bytes.get_u8();
    let date = MySqlDate { year, month, day };

    if len == 4 {
        return Ok((date, 0, 0, 0, 0));
    }
    if bytes.len() < 3 {
        return Err(protocol_err!("truncated DATETIME binary value"));
    }
    let hour = bytes.get_u8();
    let minute = bytes.get_u8();
    let second = bytes.get_u8();

    if len == 7 {
        return Ok((date, hour, minute, second, 0));
    }
    if bytes.len() < 4 {
        return Err(protocol_err!("truncated DATETIME microseconds"));
    }
    let micros = bytes.get_u32_le();
    Ok((date, hour, minute, second, micros))
}

pub(crate) fn decode_datetime(
    bytes: &[u8],
    format: MySqlValueFormat,
    zero_date: ZeroDate,
) -> Result<MySqlDateTime> {
    let (date, hours, minutes, seconds, micros) = match format {
        MySqlValueFormat::Text => parse_text_datetime(
            std::str::from_utf8(bytes).map_err(|_| protocol_err!("DATETIME value was not valid UTF-8"))?,
        )?,
        MySqlValueFormat::Binary => decode_binary_date_prefix(bytes)?,
    };

    let date = match apply_zero_date_policy(date, zero_date)? {
        Some(d) => d,
        None => MySqlDate::default(),
    };

    Ok(MySqlDateTime {
        date,
        hours,
        minutes,
        seconds,
        micros,
    })
}

fn parse_text_datetime(s: &str) -> Result<(MySqlDate, u8, u8, u8, u32)> {
    let (date_part, time_part) = s
        .split_once(' ')
        .ok_or_else(|| protocol_err!("malformed DATETIME {s:?}"))?;
    let date = parse_text_date(date_part)?;
    let (hms, micros) = match time_part.split_once('.') {
        Some((hms, frac)) => {
            let padded = format!("{frac:0<6}");
            (hms, padded[..6].parse().unwrap_or(0))
        }
        None => (time_part, 0),
    };
    let mut parts = hms.split(':');
    let hours = parts.next().and_then(|s| s.parse().ok()).ok_or_else(|| protocol_err!("malformed DATETIME time {s:?}"))?;
    let minutes = parts.next().and_then(|s| s.parse().ok()).ok_or_else(|| protocol_err!("malformed DATETIME time {s:?}"))?;
    let seconds = parts.next().and_then(|s| s.parse().ok()).ok_or_else(|| protocol_err!("malformed DATETIME time {s:?}"))?;
    Ok((date, hours, minutes, seconds, micros))
}

pub(crate) fn decode_time(bytes: &[u8], format: MySqlValueFormat) -> Result<MySqlTime> {
    match format {
        MySqlValueFormat::Text => parse_text_time(
            std::str::from_utf8(bytes).map_err(|_| protocol_err!("TIME value was not valid UTF-8"))?,
        ),
        MySqlValueFormat::Binary => decode_binary_time(bytes),
    }
}

fn decode_binary_time(mut bytes: &[u8]) -> Result<MySqlTime> {
    if bytes.is_empty() {
        return Err(protocol_err!("empty TIME binary value"));
    }
    let len = bytes.get_u8();
    if len == 0 {
        return Ok(MySqlTime::default());
    }
    if bytes.len() < 8 {
        return Err(protocol_err!("truncated TIME binary value"));
    }
    let is_negative = bytes.get_u8() != 0;
    let days = bytes.get_u32_le();
    let hours = bytes.get_u8();
    let minutes = bytes.get_u8();
    let seconds = bytes.get_u8();

    let micros = if len == 12 {
        if bytes.len() < 4 {
            return Err(protocol_err!("truncated TIME microseconds"));
        }
        bytes.get_u32_le()
    } else {
        0
    };

    Ok(MySqlTime {
        is_negative,
        days,
        hours,
        minutes,
        seconds,
        micros,
    })
}

fn parse_text_time(s: &str) -> Result<MySqlTime> {
    let (is_negative, s) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };

    let (main, frac) = match s.split_once('.') {
        Some((main, frac)) => (main, format!("{frac:0<6}")[..6].parse().unwrap_or(0)),
        None => (s, 0),
    };

    let segments: Vec<&str> = main.split(':').collect();
    let (days, hours, minutes, seconds) = match segments.len() {
        3 => {
            let total_hours: u32 = segments[0]
                .parse()
                .map_err(|_| protocol_err!("malformed TIME {s:?}"))?;
            (
                total_hours / 24,
                (total_hours % 24) as u8,
                segments[1].parse().map_err(|_| protocol_err!("malformed TIME {s:?}"))?,
                segments[2].parse().map_err(|_| protocol_err!("malformed TIME {s:?}"))?,
            )
        }
        _ => return Err(protocol_err!("malformed TIME {s:?}")),
    };

    Ok(MySqlTime {
        is_negative,
        days,
        hours,
        minutes,
        seconds,
        micros: frac,
    })
}

pub(crate) fn encode_date(d: &MySqlDate) -> EncodedParam {
    let mut payload = BytesMut::new();
    if is_zero_date(d) {
        payload.put_uint_lenenc(0);
    } else {
        let mut body = BytesMut::new();
        body.extend_from_slice(&d.year.to_le_bytes());
        body.extend_from_slice(&[d.month, d.day]);
        payload.put_bytes_lenenc(&body);
    }
    EncodedParam {
        type_id: type_id::DATE,
        is_unsigned: false,
        is_null: false,
        payload: payload.to_vec(),
    }
}

pub(crate) fn encode_datetime(dt: &MySqlDateTime) -> EncodedParam {
    let mut payload = BytesMut::new();
    let has_time = dt.hours != 0 || dt.minutes != 0 || dt.seconds != 0 || dt.micros != 0;

    if is_zero_date(&dt.date) && !has_time {
        payload.put_uint_lenenc(0);
    } else {
        let mut body = BytesMut::new();
        body.extend_from_slice(&dt.date.year.to_le_bytes());
        body.extend_from_slice(&[dt.date.month, dt.date.day, dt.hours, dt.minutes, dt.seconds]);
        if dt.micros != 0 {
            body.extend_from_slice(&dt.micros.to_le_bytes());
        }
        payload.put_bytes_lenenc(&body);
    }

    EncodedParam {
        type_id: type_id::DATETIME,
        is_unsigned: false,
        is_null: false,
        payload: payload.to_vec(),
    }
}

pub(crate) fn encode_time(t: &MySqlTime) -> EncodedParam {
    let mut payload = BytesMut::new();
    if t.days == 0 && t.hours == 0 && t.minutes == 0 && t.seconds == 0 && t.micros == 0 {
        payload.put_uint_lenenc(0);
    } else {
        let mut body = BytesMut::new();
        body.put_u8(t.is_negative as u8);
        body.extend_from_slice(&t.days.to_le_bytes());
        body.extend_from_slice(&[t.hours, t.minutes, t.seconds]);
        if t.micros != 0 {
            body.extend_from_slice(&t.micros.to_le_bytes());
        }
        payload.put_bytes_lenenc(&body);
    }
    EncodedParam {
        type_id: type_id::TIME,
        is_unsigned: false,
        is_null: false,
        payload: payload.to_vec(),
    }
}

#[cfg(feature = "chrono")]
mod chrono_interop {
    use super::{MySqlDate, MySqlDateTime, MySqlTime};

    impl From<chrono::NaiveDate> for MySqlDate {
        fn from(d: chrono::NaiveDate) -> Self {
            use chrono::Datelike;
            MySqlDate {
                year: d.year() as u16,
                month: d.month() as u8,
                day: d.day() as u8,
            }
        }
    }

    impl TryFrom<MySqlDate> for chrono::NaiveDate {
        type Error = crate::error::Error;

        fn try_from(d: MySqlDate) -> Result<Self, Self::Error> {
            chrono::NaiveDate::from_ymd_opt(d.year as i32, d.month as u32, d.day as u32)
                .ok_or_else(|| crate::error::protocol_err!("date {d} is not representable by chrono"))
        }
    }

    impl From<chrono::NaiveDateTime> for MySqlDateTime {
        fn from(dt: chrono::NaiveDateTime) -> Self {
            use chrono::Timelike;
            MySqlDateTime {
                date: dt.date().into(),
                hours: dt.hour() as u8,
                minutes: dt.minute() as u8,
                seconds: dt.second() as u8,
                micros: dt.nanosecond() / 1000,
            }
        }
    }

    impl From<chrono::NaiveTime> for MySqlTime {
        fn from(t: chrono::NaiveTime) -> Self {
            use chrono::Timelike;
            MySqlTime {
                is_negative: false,
                days: 0,
                hours: t.hour() as u8,
                minutes: t.minute() as u8,
                seconds: t.second() as u8,
                micros: t.nanosecond() / 1000,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_zero_date_use_null_as_default() {
        let date = decode_date(b"0000-00-00", MySqlValueFormat::Text, ZeroDate::UseNull).unwrap();
        assert_eq!(date, MySqlDate::default());
    }

    #[test]
    fn decodes_zero_date_exception_errors() {
        let err = decode_date(b"0000-00-00", MySqlValueFormat::Text, ZeroDate::Exception);
        assert!(err.is_err());
    }

    #[test]
    fn decodes_binary_datetime_with_micros() {
        let mut bytes = vec![11u8];
        bytes.extend_from_slice(&2024u16.to_le_bytes());
        bytes.extend_from_slice(&[6, 15, 10, 30, 0]);
        bytes.extend_from_slice(&500_000u32.to_le_bytes());

        let dt = decode_datetime(&bytes, MySqlValueFormat::Binary, ZeroDate::UseRound).unwrap();
        assert_eq!(dt.date, MySqlDate { year: 2024, month: 6, day: 15 });
        assert_eq!(dt.hours, 10);
        assert_eq!(dt.micros, 500_000);
    }

    #[test]
    fn parses_text_time_with_overflowing_hours() {
        let t = parse_text_time("30:15:00").unwrap();
        assert_eq!(t.days, 1);
        assert_eq!(t.hours, 6);
    }

    #[test]
    fn displays_date_and_datetime() {
        let d = MySqlDate { year: 2024, month: 1, day: 2 };
        assert_eq!(d.to_string(), "2024-01-02");
    }
}
