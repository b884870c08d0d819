//! Duration and size literals: `<number><unit>`

use serde::Serialize;

use super::{parse_plain, CoercionError, ValueKind};

const DURATION_UNITS: &str = "ms, s, m, min, h, hr, d, day, w, wk";
const SIZE_UNITS: &str = "bit, nb, b, bytes, kb, mb, gb, tb, pb, eb, zb, yb, kib, mib, gib, tib, pib, eib, zib, yib";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationUnit {
    Millisecond,
    Second,
    Minute,
    Hour,
    Day,
    Week,
}

impl DurationUnit {
    /// Parse a unit suffix (e.g., "ms", "h", "day"), case-insensitively
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix.to_ascii_lowercase().as_str() {
            "ms" => Some(DurationUnit::Millisecond),
            "s" => Some(DurationUnit::Second),
            "m" | "min" => Some(DurationUnit::Minute),
            "h" | "hr" => Some(DurationUnit::Hour),
            "d" | "day" => Some(DurationUnit::Day),
            "w" | "wk" => Some(DurationUnit::Week),
            _ => None,
        }
    }

    /// Milliseconds in one unit
    pub fn ms(&self) -> f64 {
        match self {
            DurationUnit::Millisecond => 1.0,
            DurationUnit::Second => 1_000.0,
            DurationUnit::Minute => 60_000.0,
            DurationUnit::Hour => 3_600_000.0,
            DurationUnit::Day => 86_400_000.0,
            DurationUnit::Week => 604_800_000.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DurationUnit::Millisecond => "ms",
            DurationUnit::Second => "s",
            DurationUnit::Minute => "m",
            DurationUnit::Hour => "h",
            DurationUnit::Day => "d",
            DurationUnit::Week => "w",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DurationValue {
    pub value: f64,
    pub unit: DurationUnit,
    pub ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SizeValue {
    pub value: f64,
    /// Lowercased unit suffix as written
    pub unit: String,
    pub bytes: f64,
}

/// Bytes in one unit of the given suffix
fn size_multiplier(unit: &str) -> Option<f64> {
    const K: f64 = 1000.0;
    const KI: f64 = 1024.0;

    let multiplier = match unit {
        "bit" => 0.125,
        "nb" => 0.5,
        "b" | "bytes" => 1.0,
        "kb" => K,
        "mb" => K.powi(2),
        "gb" => K.powi(3),
        "tb" => K.powi(4),
        "pb" => K.powi(5),
        "eb" => K.powi(6),
        "zb" => K.powi(7),
        "yb" => K.powi(8),
        "kib" => KI,
        "mib" => KI.powi(2),
        "gib" => KI.powi(3),
        "tib" => KI.powi(4),
        "pib" => KI.powi(5),
        "eib" => KI.powi(6),
        "zib" => KI.powi(7),
        "yib" => KI.powi(8),
        _ => return None,
    };
    Some(multiplier)
}

/// Split `<number><unit>` at the first character that cannot belong to the number
fn split_number_unit(text: &str) -> (&str, &str) {
    let unit_start = text
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || (i == 0 && (c == '-' || c == '+'))))
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    text.split_at(unit_start)
}

fn parse_magnitude(kind: ValueKind, text: &str, number: &str) -> Result<f64, CoercionError> {
    if number.is_empty() || number == "-" || number == "+" {
        return Err(CoercionError::MissingNumber {
            kind,
            text: text.to_string(),
        });
    }
    let value = parse_plain(number).ok_or_else(|| CoercionError::MissingNumber {
        kind,
        text: text.to_string(),
    })?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(CoercionError::NonFinite(text.to_string()))
    }
}

/// Parse a duration literal (e.g., "1h", "250ms", "1.5d") into milliseconds
pub fn parse_duration(text: &str) -> Result<DurationValue, CoercionError> {
    let (number, suffix) = split_number_unit(text);
    let value = parse_magnitude(ValueKind::Duration, text, number)?;

    if suffix.is_empty() {
        return Err(CoercionError::MissingUnit {
            kind: ValueKind::Duration,
            text: text.to_string(),
            expected: DURATION_UNITS,
        });
    }

    let unit = DurationUnit::from_suffix(suffix).ok_or_else(|| CoercionError::UnknownUnit {
        kind: ValueKind::Duration,
        unit: suffix.to_string(),
        expected: DURATION_UNITS,
    })?;

    let ms = value * unit.ms();
    if !ms.is_finite() {
        return Err(CoercionError::NonFinite(text.to_string()));
    }

    Ok(DurationValue { value, unit, ms })
}

/// Parse a size literal (e.g., "10kb", "1.5GiB") into bytes
pub fn parse_size(text: &str) -> Result<SizeValue, CoercionError> {
    let (number, suffix) = split_number_unit(text);
    let value = parse_magnitude(ValueKind::Size, text, number)?;

    if suffix.is_empty() {
        return Err(CoercionError::MissingUnit {
            kind: ValueKind::Size,
            text: text.to_string(),
            expected: SIZE_UNITS,
        });
    }

    let unit = suffix.to_ascii_lowercase();
    let multiplier = size_multiplier(&unit).ok_or_else(|| CoercionError::UnknownUnit {
        kind: ValueKind::Size,
        unit: suffix.to_string(),
        expected: SIZE_UNITS,
    })?;

    let bytes = value * multiplier;
    if !bytes.is_finite() {
        return Err(CoercionError::NonFinite(text.to_string()));
    }

    Ok(SizeValue { value, unit, bytes })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_each_unit() {
        let cases = [
            ("5ms", 5.0),
            ("5s", 5_000.0),
            ("5m", 300_000.0),
            ("5min", 300_000.0),
            ("1h", 3_600_000.0),
            ("2hr", 7_200_000.0),
            ("1d", 86_400_000.0),
            ("1day", 86_400_000.0),
            ("1w", 604_800_000.0),
            ("2wk", 1_209_600_000.0),
        ];
        for (text, ms) in cases {
            assert_eq!(parse_duration(text).unwrap().ms, ms, "for {}", text);
        }
    }

    #[test]
    fn test_duration_fractional_and_case() {
        let d = parse_duration("1.5H").unwrap();
        assert_eq!(d.unit, DurationUnit::Hour);
        assert_eq!(d.value, 1.5);
        assert_eq!(d.ms, 5_400_000.0);
    }

    #[test]
    fn test_duration_matches_unit_table() {
        for unit in ["ms", "s", "m", "h", "d", "w"] {
            for n in [0.0, 1.0, 2.5, 90.0] {
                let text = format!("{}{}", n, unit);
                let parsed = parse_duration(&text).unwrap();
                let expected = n * DurationUnit::from_suffix(unit).unwrap().ms();
                assert_eq!(parsed.ms, expected, "for {}", text);
            }
        }
    }

    #[test]
    fn test_duration_errors() {
        assert!(matches!(
            parse_duration("10parsecs"),
            Err(CoercionError::UnknownUnit { .. })
        ));
        assert!(matches!(
            parse_duration("10"),
            Err(CoercionError::MissingUnit { .. })
        ));
        assert!(matches!(
            parse_duration("h"),
            Err(CoercionError::MissingNumber { .. })
        ));
        assert!(matches!(
            parse_duration("1.2.3s"),
            Err(CoercionError::MissingNumber { .. })
        ));

        let err = parse_duration("3fortnights").unwrap_err();
        assert!(err.to_string().contains("fortnights"));
        assert!(err.to_string().contains("ms, s, m"));
    }

    #[test]
    fn test_size_decimal_and_binary() {
        assert_eq!(parse_size("1b").unwrap().bytes, 1.0);
        assert_eq!(parse_size("10bytes").unwrap().bytes, 10.0);
        assert_eq!(parse_size("1kb").unwrap().bytes, 1000.0);
        assert_eq!(parse_size("2MB").unwrap().bytes, 2_000_000.0);
        assert_eq!(parse_size("1KiB").unwrap().bytes, 1024.0);
        assert_eq!(parse_size("1gib").unwrap().bytes, 1024.0 * 1024.0 * 1024.0);
        assert_eq!(parse_size("16bit").unwrap().bytes, 2.0);
        assert_eq!(parse_size("4nb").unwrap().bytes, 2.0);
    }

    #[test]
    fn test_size_keeps_unit() {
        let size = parse_size("1.5GB").unwrap();
        assert_eq!(size.unit, "gb");
        assert_eq!(size.value, 1.5);
        assert_eq!(size.bytes, 1.5e9);
    }

    #[test]
    fn test_size_errors() {
        assert!(matches!(
            parse_size("10xb"),
            Err(CoercionError::UnknownUnit { .. })
        ));
        assert!(matches!(
            parse_size("1024"),
            Err(CoercionError::MissingUnit { .. })
        ));
        assert!(parse_size("kb").is_err());
    }
}
