use std::str::FromStr;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

use crate::ingest::workbook::RawCell;

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%m/%d/%Y", "%m-%d-%Y", "%d %b %Y"];
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%m/%d/%Y %H:%M:%S"];

/// Serial for 9999-12-31, the last day a spreadsheet can represent.
const MAX_DATE_SERIAL: f64 = 2_958_465.0;

/// Spreadsheet serial dates count days from 1899-12-30.
fn excel_epoch() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1899, 12, 30)
}

pub fn date(cell: &RawCell) -> Result<NaiveDate, String> {
    match cell {
        RawCell::Number(serial) if *serial > MAX_DATE_SERIAL => {
            Err(format!("serial date {serial} is out of range"))
        }
        RawCell::Number(serial) if serial.is_finite() && *serial >= 1.0 => excel_epoch()
            .and_then(|epoch| epoch.checked_add_signed(Duration::days(serial.floor() as i64)))
            .ok_or_else(|| format!("serial date {serial} is out of range")),
        RawCell::Text(text) => parse_date_text(text.trim())
            .ok_or_else(|| format!("`{}` is not a recognized date", text.trim())),
        RawCell::Empty => Err("date is blank".to_string()),
        other => Err(format!("`{}` is not a date", other.display())),
    }
}

pub fn parse_date_text(text: &str) -> Option<NaiveDate> {
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|timestamp| timestamp.date())
        .or_else(|| DATE_FORMATS.iter().find_map(|format| NaiveDate::parse_from_str(text, format).ok()))
}

/// Currency amount; blank cells are zero and negative amounts are rejected.
pub fn money(cell: &RawCell) -> Result<Decimal, String> {
    let amount = match cell {
        RawCell::Empty => return Ok(Decimal::ZERO),
        RawCell::Number(value) => Decimal::try_from(*value)
            .map_err(|_| format!("{value} is not a representable amount"))?,
        RawCell::Text(text) => {
            let cleaned: String = text
                .chars()
                .filter(|ch| !matches!(ch, '$' | '₹' | '€' | '£' | ',') && !ch.is_whitespace())
                .collect();
            if cleaned.is_empty() {
                return Ok(Decimal::ZERO);
            }
            Decimal::from_str(&cleaned).map_err(|_| format!("`{}` is not an amount", text.trim()))?
        }
        other => return Err(format!("`{}` is not an amount", other.display())),
    };

    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(format!("amount {amount} is negative"));
    }
    Ok(amount.normalize())
}

/// Non-negative whole count; blank cells are zero.
pub fn count(cell: &RawCell) -> Result<u32, String> {
    match cell {
        RawCell::Empty => Ok(0),
        RawCell::Number(value) => whole_count(*value),
        RawCell::Text(text) => {
            let cleaned: String = text.chars().filter(|ch| *ch != ',').collect();
            let cleaned = cleaned.trim();
            if cleaned.is_empty() {
                return Ok(0);
            }
            let value =
                f64::from_str(cleaned).map_err(|_| format!("`{cleaned}` is not a count"))?;
            whole_count(value)
        }
        other => Err(format!("`{}` is not a count", other.display())),
    }
}

fn whole_count(value: f64) -> Result<u32, String> {
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value > f64::from(u32::MAX) {
        return Err(format!("{value} is not a non-negative whole count"));
    }
    Ok(value as u32)
}

/// Rate as a fraction; `"3.5%"` becomes 0.035 while bare numbers are taken as exported.
pub fn rate(cell: &RawCell) -> Result<f64, String> {
    let value = match cell {
        RawCell::Empty => return Ok(0.0),
        RawCell::Number(value) => *value,
        RawCell::Text(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Ok(0.0);
            }
            match trimmed.strip_suffix('%') {
                Some(percent) => {
                    f64::from_str(percent.trim()).map_err(|_| format!("`{trimmed}` is not a rate"))?
                        / 100.0
                }
                None => f64::from_str(trimmed).map_err(|_| format!("`{trimmed}` is not a rate"))?,
            }
        }
        other => return Err(format!("`{}` is not a rate", other.display())),
    };

    if !value.is_finite() || value < 0.0 {
        return Err(format!("rate {value} must be a non-negative number"));
    }
    Ok(value)
}

pub fn text(cell: &RawCell) -> String {
    cell.display().trim().to_string()
}

/// Direct/indirect sale marker.
pub fn flag(cell: &RawCell) -> Result<bool, String> {
    match cell {
        RawCell::Empty => Ok(false),
        RawCell::Bool(value) => Ok(*value),
        RawCell::Number(value) => Ok(*value != 0.0),
        RawCell::Text(value) => match value.trim().to_ascii_lowercase().as_str() {
            "" | "no" | "n" | "false" | "0" | "indirect" | "indirect sale" => Ok(false),
            "yes" | "y" | "true" | "1" | "direct" | "direct sale" => Ok(true),
            other => Err(format!("`{other}` is not a direct/indirect marker")),
        },
        RawCell::Error(value) => Err(format!("cell error #{value}")),
    }
}
