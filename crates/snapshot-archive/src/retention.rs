use chrono::{Datelike, NaiveDate, Weekday};

/// Outcome of evaluating one archived date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Keep,
    Delete,
}

/// Tiered retention by age in days (business calendar):
///
/// | age                          | kept when              |
/// |------------------------------|------------------------|
/// | `<= keep_all_days`           | always                 |
/// | `<= weekly_until_days`       | the date is a Monday   |
/// | `<= monthly_until_days`      | the date is the 1st    |
/// | older                        | never                  |
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    pub keep_all_days: i64,
    pub weekly_until_days: i64,
    pub monthly_until_days: i64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            keep_all_days: 7,
            weekly_until_days: 30,
            monthly_until_days: 365,
        }
    }
}

impl RetentionPolicy {
    pub fn evaluate(&self, date: NaiveDate, today: NaiveDate) -> Verdict {
        let age = (today - date).num_days();
        // Today and anything dated ahead of it are never touched
        if age <= self.keep_all_days {
            return Verdict::Keep;
        }

        let keep = if age <= self.weekly_until_days {
            date.weekday() == Weekday::Mon
        } else if age <= self.monthly_until_days {
            date.day() == 1
        } else {
            false
        };

        if keep {
            Verdict::Keep
        } else {
            Verdict::Delete
        }
    }
}
