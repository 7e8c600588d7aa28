//! A human-readable duration type for operation timeouts, like `6m` or
//! `1h20m30s`.
//!
//! App CRs carry per-phase timeouts in their spec, so [`Duration`] round-trips
//! through YAML as the compact string form. It dereferences to
//! [`std::time::Duration`], which keeps all the usual accessors available
//! without re-implementing them.

use std::{fmt, num::ParseIntError, ops::Deref, str::FromStr};

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use snafu::{ResultExt, Snafu};
use strum::IntoEnumIterator;

#[derive(Debug, PartialEq, Snafu)]
pub enum DurationParseError {
    #[snafu(display("invalid input, either empty or contains non-ascii characters"))]
    InvalidInput,

    #[snafu(display("unexpected character {chr:?}, fragments must end with a unit"))]
    UnexpectedCharacter { chr: char },

    #[snafu(display("duration fragment with value '{value}' has no unit"))]
    NoUnit { value: u64 },

    #[snafu(display("unknown duration unit {unit:?}"))]
    UnknownUnit { unit: String },

    #[snafu(display("failed to parse fragment value as integer"))]
    ParseValue { source: ParseIntError },
}

/// A duration parsed from and formatted as fragments of whole days, hours,
/// minutes and seconds, e.g. `1h10m`.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Duration(std::time::Duration);

impl FromStr for Duration {
    type Err = DurationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();

        if input.is_empty() || !input.is_ascii() {
            return InvalidInputSnafu.fail();
        }

        let mut chars = input.char_indices().peekable();
        let mut total = std::time::Duration::ZERO;

        fn take_group<'a>(
            input: &'a str,
            chars: &mut std::iter::Peekable<std::str::CharIndices>,
            matches: fn(char) -> bool,
        ) -> Option<&'a str> {
            let &(from, _) = chars.peek()?;
            let mut to = from;

            while let Some((i, _)) = chars.next_if(|(_, c)| matches(*c)) {
                to = i;
            }

            // A group that matched nothing still yields its first character,
            // which then fails the value or unit parse of the caller.
            Some(&input[from..=to])
        }

        while let Some(value) = take_group(input, &mut chars, char::is_numeric) {
            let value = value.parse::<u64>().context(ParseValueSnafu)?;

            let Some(unit) = take_group(input, &mut chars, char::is_alphabetic) else {
                match chars.peek() {
                    Some(&(_, chr)) => return UnexpectedCharacterSnafu { chr }.fail(),
                    None => return NoUnitSnafu { value }.fail(),
                }
            };

            let unit = unit
                .parse::<DurationUnit>()
                .map_err(|_| UnknownUnitSnafu { unit }.build())?;

            total += std::time::Duration::from_secs(value * unit.secs());
        }

        Ok(Self(total))
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_zero() {
            return write!(f, "0{}", DurationUnit::Seconds);
        }

        let mut secs = self.0.as_secs();

        // Units iterate from the largest down, so each fragment consumes the
        // whole multiples it can represent.
        for unit in DurationUnit::iter() {
            let whole = secs / unit.secs();

            if whole > 0 {
                write!(f, "{whole}{unit}")?;
            }

            secs %= unit.secs();
        }

        Ok(())
    }
}

impl Serialize for Duration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Duration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

impl JsonSchema for Duration {
    fn schema_name() -> String {
        "Duration".to_owned()
    }

    fn json_schema(_: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        schemars::schema::SchemaObject {
            instance_type: Some(schemars::schema::InstanceType::String.into()),
            ..Default::default()
        }
        .into()
    }
}

impl Deref for Duration {
    type Target = std::time::Duration;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<std::time::Duration> for Duration {
    fn from(value: std::time::Duration) -> Self {
        Self(value)
    }
}

impl Duration {
    /// Creates a new [`Duration`] from the specified number of whole seconds.
    pub const fn from_secs(secs: u64) -> Self {
        Self(std::time::Duration::from_secs(secs))
    }
}

/// Supported duration units, largest first. The variant order drives the
/// [`fmt::Display`] decomposition of [`Duration`].
#[derive(Debug, strum::Display, strum::EnumIter, strum::EnumString)]
pub enum DurationUnit {
    #[strum(serialize = "d")]
    Days,

    #[strum(serialize = "h")]
    Hours,

    #[strum(serialize = "m")]
    Minutes,

    #[strum(serialize = "s")]
    Seconds,
}

impl DurationUnit {
    fn secs(&self) -> u64 {
        use DurationUnit::*;

        match self {
            Days => 24 * Hours.secs(),
            Hours => 60 * Minutes.secs(),
            Minutes => 60 * Seconds.secs(),
            Seconds => 1,
        }
    }
}
