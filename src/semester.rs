use std::{fmt, str::FromStr};

use chrono::{Datelike, Local, NaiveDate};

use crate::error::CmuApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Term {
    Spring,
    Fall,
}

impl Term {
    fn letter(self) -> char {
        match self {
            Term::Spring => 'S',
            Term::Fall => 'F',
        }
    }
}

/// A term token as the scheduling API spells it, e.g. `F24`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Semester {
    pub term: Term,
    /// Two-digit year.
    pub year: u16,
}

impl Semester {
    pub fn new(term: Term, year: u16) -> Self {
        Self {
            term,
            year: year % 100,
        }
    }

    /// The most recent semester the API has data for on `date`.
    pub fn for_date(date: NaiveDate) -> Self {
        let term = match date.month() {
            // From january to may
            1..=5 => Term::Spring,
            // From june to december
            _ => Term::Fall,
        };
        Self::new(term, date.year().rem_euclid(100) as u16)
    }

    pub fn current() -> Self {
        Self::for_date(Local::now().date_naive())
    }
}

impl fmt::Display for Semester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:02}", self.term.letter(), self.year)
    }
}

impl FromStr for Semester {
    type Err = CmuApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CmuApiError::Validation(format!("{s:?} is not a semester token"));
        let mut chars = s.chars();
        let term = match chars.next().map(|c| c.to_ascii_uppercase()) {
            Some('S') => Term::Spring,
            Some('F') => Term::Fall,
            _ => return Err(invalid()),
        };
        let digits = chars.as_str();
        if digits.len() != 2 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let year = digits.parse().map_err(|_| invalid())?;
        Ok(Self::new(term, year))
    }
}
