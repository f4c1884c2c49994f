use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer, de::Error};

fn strip_hex_prefix(value: &str) -> &str {
    value.strip_prefix("0x").unwrap_or(value)
}

fn parse_hex_bytes<E: Error>(value: &str) -> Result<::bytes::Bytes, E> {
    hex::decode(strip_hex_prefix(value))
        .map(Into::into)
        .map_err(|err| E::custom(format!("invalid hex data: {err}")))
}

/// `0x` prefixed hex quantities.
pub mod u64 {
    use super::*;

    fn parse_hex_u64<E: Error>(value: &str) -> Result<u64, E> {
        u64::from_str_radix(strip_hex_prefix(value), 16)
            .map_err(|err| E::custom(format!("invalid hex quantity {value:?}: {err}")))
    }

    pub mod hex_str {
        use super::*;

        pub fn deserialize<'de, D>(d: D) -> Result<u64, D::Error>
        where
            D: Deserializer<'de>,
        {
            parse_hex_u64(&String::deserialize(d)?)
        }

        pub fn serialize<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            serializer.serialize_str(&format!("{value:#x}"))
        }
    }

    /// Like [`hex_str`], with missing, `null` and empty values read as `None`.
    pub mod hex_str_opt {
        use super::*;

        pub fn deserialize<'de, D>(d: D) -> Result<Option<u64>, D::Error>
        where
            D: Deserializer<'de>,
        {
            Option::<String>::deserialize(d)?
                .filter(|value| !value.is_empty())
                .map(|value| parse_hex_u64(&value))
                .transpose()
        }

        pub fn serialize<S>(value: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match value {
                Some(value) => serializer.serialize_str(&format!("{value:#x}")),
                None => serializer.serialize_none(),
            }
        }
    }
}

/// Serializes to and deserializes from 0x prefixed hex string
pub mod bytes {
    use ::bytes::Bytes;

    use super::*;

    pub fn deserialize<'de, D>(d: D) -> Result<Bytes, D::Error>
    where
        D: Deserializer<'de>,
    {
        parse_hex_bytes(&String::deserialize(d)?)
    }

    pub fn serialize<S>(value: &Bytes, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{}", hex::encode(value)))
    }

    pub mod opt {
        use super::*;

        pub fn deserialize<'de, D>(d: D) -> Result<Option<Bytes>, D::Error>
        where
            D: Deserializer<'de>,
        {
            Option::<String>::deserialize(d)?
                .map(|value| parse_hex_bytes(&value))
                .transpose()
        }

        pub fn serialize<S>(value: &Option<Bytes>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match value {
                Some(value) => serializer.serialize_str(&format!("0x{}", hex::encode(value))),
                None => serializer.serialize_none(),
            }
        }
    }
}

/// Durations written the way Go's `time.ParseDuration` reads them.
pub mod duration {
    use super::*;

    pub fn deserialize<'de, D>(d: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(d)?;
        parse_duration(&value).ok_or_else(|| D::Error::custom(format!("invalid duration {value:?}")))
    }

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}ms", value.as_millis()))
    }
}

/// Nanoseconds per unit, longest unit names first so `ms` wins over `m`.
const DURATION_UNITS: [(&str, f64); 7] = [
    ("ms", 1e6),
    ("us", 1e3),
    ("µs", 1e3),
    ("ns", 1.0),
    ("h", 3.6e12),
    ("m", 6e10),
    ("s", 1e9),
];

/// Parses a sequence of unsigned decimal numbers, each followed by a unit (`h`, `m`, `s`,
/// `ms`, `us`/`µs`, `ns`), such as `"1h30m"` or `"1.5s"`. `"0"` is the only value
/// accepted without a unit.
pub fn parse_duration(input: &str) -> Option<Duration> {
    if input == "0" {
        return Some(Duration::ZERO);
    }
    let mut rest = input;
    let mut nanos = 0_f64;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let amount: f64 = rest[..number_len].parse().ok()?;
        rest = &rest[number_len..];
        let (unit, scale) = DURATION_UNITS
            .iter()
            .find(|(unit, _)| rest.starts_with(unit))?;
        rest = &rest[unit.len()..];
        nanos += amount * scale;
    }
    (!input.is_empty()).then(|| Duration::from_nanos(nanos.round() as u64))
}
