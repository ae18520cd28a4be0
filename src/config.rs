use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{DataError, DataResult};
use crate::source::Source;

/// Last date considered during alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MaxDate {
    #[default]
    Last,
    Through(NaiveDate),
}

impl FromStr for MaxDate {
    type Err = DataError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("last") {
            return Ok(MaxDate::Last);
        }
        parse_date(value)
            .map(MaxDate::Through)
            .ok_or_else(|| DataError::Schema(format!("unrecognized max_date {value:?}")))
    }
}

impl TryFrom<String> for MaxDate {
    type Error = DataError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MaxDate> for String {
    fn from(value: MaxDate) -> Self {
        value.to_string()
    }
}

impl fmt::Display for MaxDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaxDate::Last => f.write_str("last"),
            MaxDate::Through(date) => write!(f, "{date}"),
        }
    }
}

/// Accepts ISO dates and the `M/D/YY` headers used by the JHU files.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%m/%d/%y"))
        .ok()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceOptions {
    #[serde(rename = "N")]
    pub n: i64,
    pub max_date: MaxDate,
    pub only_contiguous: bool,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            n: 1,
            max_date: MaxDate::Last,
            only_contiguous: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    pub jhu: SourceOptions,
    pub jhu_global: SourceOptions,
    pub brasil_io: SourceOptions,
}

impl Options {
    pub fn load(path: &Path) -> DataResult<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|err| DataError::Schema(format!("{}: {err}", path.display())))
    }

    pub fn for_source(&self, source: Source) -> &SourceOptions {
        match source {
            Source::Jhu => &self.jhu,
            Source::JhuGlobal => &self.jhu_global,
            Source::BrasilIo => &self.brasil_io,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_date_accepts_both_date_styles() {
        let expected = NaiveDate::from_ymd_opt(2020, 4, 18).unwrap();
        assert_eq!("last".parse::<MaxDate>().unwrap(), MaxDate::Last);
        assert_eq!("2020-04-18".parse::<MaxDate>().unwrap(), MaxDate::Through(expected));
        assert_eq!("4/18/20".parse::<MaxDate>().unwrap(), MaxDate::Through(expected));
        assert!(matches!("yesterday".parse::<MaxDate>(), Err(DataError::Schema(_))));
    }

    #[test]
    fn options_file_fills_missing_fields_with_defaults() {
        let options: Options = serde_json::from_str(
            r#"{"jhu": {"N": 50, "only_contiguous": false}, "brasil_io": {"max_date": "2020-04-10"}}"#,
        )
        .unwrap();

        assert_eq!(options.jhu.n, 50);
        assert!(!options.jhu.only_contiguous);
        assert_eq!(options.jhu.max_date, MaxDate::Last);
        assert_eq!(options.jhu_global, SourceOptions::default());
        assert_eq!(
            options.for_source(Source::BrasilIo).max_date,
            MaxDate::Through(NaiveDate::from_ymd_opt(2020, 4, 10).unwrap())
        );
    }
}
