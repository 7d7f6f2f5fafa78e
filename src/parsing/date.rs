//! Date templates (`DD/MM/YYYY`, `Do MMMM YYYY`, `M/D/YY`, ...)
//!
//! A template is compiled once per configuration into an anchored regex.
//! Parsing distinguishes a blank cell from one with unparseable text so the
//! mapper can flag the latter.

use chrono::{Datelike, Month, NaiveDate};
use regex::{Captures, Regex};
use tracing::debug;

use crate::types::{ReconResult, ReconciliationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Year4,
    Year2,
    MonthName,
    MonthAbbr,
    Month2,
    Month1,
    Day2,
    Day1,
    DayOrdinal,
    Weekday,
}

/// Longest tokens first so `MMMM` wins over `MM`
const TOKEN_ORDER: &[(&str, Token)] = &[
    ("YYYY", Token::Year4),
    ("MMMM", Token::MonthName),
    ("dddd", Token::Weekday),
    ("MMM", Token::MonthAbbr),
    ("MM", Token::Month2),
    ("DD", Token::Day2),
    ("YY", Token::Year2),
    ("Do", Token::DayOrdinal),
    ("M", Token::Month1),
    ("D", Token::Day1),
];

impl Token {
    fn pattern(self) -> &'static str {
        match self {
            Token::Year4 => r"([0-9]{4})",
            Token::Year2 => r"([0-9]{2})",
            Token::MonthName => r"([A-Za-z]+)",
            Token::MonthAbbr => r"([A-Za-z]{3,4})",
            Token::Month2 => r"([0-9]{2})",
            Token::Month1 => r"([0-9]{1,2})",
            Token::Day2 => r"([0-9]{2})",
            Token::Day1 => r"([0-9]{1,2})",
            // Suffix folds ASCII case only
            Token::DayOrdinal => r"([0-9]{1,2})(?i-u:st|nd|rd|th)",
            Token::Weekday => r"([A-Za-z]+)",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Token(Token),
    Literal(char),
}

/// Result of parsing one date cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedDate {
    /// The cell was empty
    Blank,
    Date(NaiveDate),
    /// The cell had text the template could not turn into a real date
    Unparseable,
}

impl ParsedDate {
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            ParsedDate::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn is_unparseable(&self) -> bool {
        matches!(self, ParsedDate::Unparseable)
    }
}

/// A compiled date template
#[derive(Debug, Clone)]
pub struct DateTemplate {
    template: String,
    parts: Vec<Part>,
    captures: Vec<Token>,
    regex: Regex,
}

impl DateTemplate {
    /// Compile a template; blank templates are a configuration error
    pub fn compile(template: &str) -> ReconResult<Self> {
        let trimmed = template.trim();
        if trimmed.is_empty() {
            return Err(ReconciliationError::Configuration(
                "date_format must not be empty".to_string(),
            ));
        }

        let parts = tokenize(trimmed);
        let mut pattern = String::from("^");
        let mut captures = Vec::new();
        for part in &parts {
            match part {
                Part::Token(token) => {
                    pattern.push_str(token.pattern());
                    captures.push(*token);
                }
                Part::Literal(c) if c.is_whitespace() => pattern.push_str(r"\s+"),
                Part::Literal(c) => pattern.push_str(&regex::escape(&c.to_string())),
            }
        }
        pattern.push('$');

        let regex = Regex::new(&pattern).map_err(|e| {
            ReconciliationError::Configuration(format!("invalid date_format {trimmed:?}: {e}"))
        })?;

        Ok(Self {
            template: trimmed.to_string(),
            parts,
            captures,
            regex,
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Whether the template names a year, a month and a day
    pub fn is_complete(&self) -> bool {
        let has = |wanted: &[Token]| self.captures.iter().any(|t| wanted.contains(t));
        has(&[Token::Year4, Token::Year2])
            && has(&[Token::MonthName, Token::MonthAbbr, Token::Month2, Token::Month1])
            && has(&[Token::Day2, Token::Day1, Token::DayOrdinal])
    }

    /// Parse a cell against the template
    pub fn parse(&self, text: &str) -> ParsedDate {
        let value = text.trim();
        if value.is_empty() {
            return ParsedDate::Blank;
        }

        let resolved = self
            .regex
            .captures(value)
            .and_then(|caps| self.resolve(&caps));

        match resolved {
            Some(date) => ParsedDate::Date(date),
            None => {
                debug!(value, template = %self.template, "Date does not fit template");
                ParsedDate::Unparseable
            }
        }
    }

    fn resolve(&self, caps: &Captures<'_>) -> Option<NaiveDate> {
        let mut year: Option<i32> = None;
        let mut month: Option<u32> = None;
        let mut day: Option<u32> = None;

        for (idx, token) in self.captures.iter().enumerate() {
            let Some(m) = caps.get(idx + 1) else {
                continue;
            };
            let raw = m.as_str();
            match token {
                Token::Year4 => assign(&mut year, raw.parse().ok()?)?,
                Token::Year2 => assign(&mut year, 2000 + raw.parse::<i32>().ok()?)?,
                Token::MonthName | Token::MonthAbbr => assign(&mut month, month_from_name(raw)?)?,
                Token::Month2 | Token::Month1 => assign(&mut month, raw.parse().ok()?)?,
                Token::Day2 | Token::Day1 | Token::DayOrdinal => {
                    assign(&mut day, raw.parse().ok()?)?
                }
                Token::Weekday => {}
            }
        }

        NaiveDate::from_ymd_opt(year?, month?, day?)
    }

    /// Render a date back into the template
    pub fn format(&self, date: NaiveDate) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Literal(c) => out.push(*c),
                Part::Token(token) => out.push_str(&match token {
                    Token::Year4 => format!("{:04}", date.year()),
                    Token::Year2 => format!("{:02}", date.year().rem_euclid(100)),
                    Token::MonthName => date.format("%B").to_string(),
                    Token::MonthAbbr => date.format("%b").to_string(),
                    Token::Month2 => format!("{:02}", date.month()),
                    Token::Month1 => date.month().to_string(),
                    Token::Day2 => format!("{:02}", date.day()),
                    Token::Day1 => date.day().to_string(),
                    Token::DayOrdinal => ordinal(date.day()),
                    Token::Weekday => date.format("%A").to_string(),
                }),
            }
        }
        out
    }
}

fn tokenize(template: &str) -> Vec<Part> {
    let mut parts = Vec::new();
    let mut rest = template;
    'outer: while !rest.is_empty() {
        for (text, token) in TOKEN_ORDER {
            if let Some(after) = rest.strip_prefix(text) {
                parts.push(Part::Token(*token));
                rest = after;
                continue 'outer;
            }
        }
        let Some(c) = rest.chars().next() else {
            break;
        };
        parts.push(Part::Literal(c));
        rest = &rest[c.len_utf8()..];
    }
    parts
}

/// Set a component, failing when the template already set it to something else
fn assign<T: PartialEq>(slot: &mut Option<T>, value: T) -> Option<()> {
    match slot {
        Some(existing) if *existing != value => None,
        _ => {
            *slot = Some(value);
            Some(())
        }
    }
}

fn month_from_name(raw: &str) -> Option<u32> {
    let lower = raw.trim().to_ascii_lowercase();
    if lower == "sept" {
        return Some(9);
    }
    if let Ok(month) = lower.parse::<Month>() {
        return Some(month.number_from_month());
    }
    lower
        .get(..3)
        .and_then(|prefix| prefix.parse::<Month>().ok())
        .map(|m| m.number_from_month())
}

fn ordinal(day: u32) -> String {
    let suffix = match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{day}{suffix}")
}
