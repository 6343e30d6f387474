//! Contiguous date windows for rollups.

use anyhow::{Context, Result, anyhow, bail};
use chrono::{Datelike, Days, Months, NaiveDate, Weekday};
use std::fmt;

/// Inclusive range of UTC days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Day(NaiveDate),
    /// ISO week, identified by its Monday.
    IsoWeek { monday: NaiveDate },
    /// `days` days ending on `end`.
    RollingDays { end: NaiveDate, days: u32 },
    /// From the day after `end` minus `months` months, through `end`.
    RollingMonths { end: NaiveDate, months: u32 },
    Range { start: NaiveDate, end: NaiveDate },
}

impl Window {
    /// The ISO week containing `date`.
    pub fn week_of(date: NaiveDate) -> Self {
        let week = date.iso_week();
        let monday = NaiveDate::from_isoywd_opt(week.year(), week.week(), Weekday::Mon)
            .unwrap_or(date);
        Window::IsoWeek { monday }
    }

    /// Daily, weekly, rolling 7 and 30 day, and rolling 3 month windows
    /// ending on `end`.
    pub fn standard(end: NaiveDate) -> Vec<Window> {
        vec![
            Window::Day(end),
            Window::week_of(end),
            Window::RollingDays { end, days: 7 },
            Window::RollingDays { end, days: 30 },
            Window::RollingMonths { end, months: 3 },
        ]
    }

    /// Parses `day:YYYY-MM-DD`, `week:YYYY-Www`, `days:N`, `months:N` or
    /// `range:YYYY-MM-DD..YYYY-MM-DD`. Rolling windows end on `end`.
    pub fn parse(spec: &str, end: NaiveDate) -> Result<Self> {
        let (kind, arg) = spec
            .split_once(':')
            .ok_or_else(|| anyhow!("window '{spec}' must look like kind:value"))?;

        let window = match kind {
            "day" => Window::Day(parse_day(arg)?),
            "week" => {
                let (year, week) = arg
                    .split_once("-W")
                    .ok_or_else(|| anyhow!("week '{arg}' must look like YYYY-Www"))?;
                let year: i32 = year.parse().with_context(|| format!("bad year in '{arg}'"))?;
                let week: u32 = week.parse().with_context(|| format!("bad week in '{arg}'"))?;
                let monday = NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)
                    .ok_or_else(|| anyhow!("ISO week {year}-W{week:02} does not exist"))?;
                Window::IsoWeek { monday }
            }
            "days" => Window::RollingDays {
                end,
                days: parse_count(arg)?,
            },
            "months" => Window::RollingMonths {
                end,
                months: parse_count(arg)?,
            },
            "range" => {
                let (start, stop) = arg
                    .split_once("..")
                    .ok_or_else(|| anyhow!("range '{arg}' must look like START..END"))?;
                let (start, stop) = (parse_day(start)?, parse_day(stop)?);
                if stop < start {
                    bail!("range '{arg}' ends before it starts");
                }
                Window::Range { start, end: stop }
            }
            other => bail!("unknown window kind '{other}'"),
        };
        Ok(window)
    }

    /// First and last day, both inclusive.
    pub fn bounds(&self) -> (NaiveDate, NaiveDate) {
        match *self {
            Window::Day(d) => (d, d),
            Window::IsoWeek { monday } => (monday, monday + Days::new(6)),
            Window::RollingDays { end, days } => {
                let back = u64::from(days.saturating_sub(1));
                (end.checked_sub_days(Days::new(back)).unwrap_or(NaiveDate::MIN), end)
            }
            Window::RollingMonths { end, months } => {
                let start = end
                    .checked_sub_months(Months::new(months))
                    .and_then(|d| d.succ_opt())
                    .unwrap_or(NaiveDate::MIN);
                (start, end)
            }
            Window::Range { start, end } => (start, end),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        let (start, end) = self.bounds();
        start <= date && date <= end
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Window::Day(_) => "day",
            Window::IsoWeek { .. } => "iso-week",
            Window::RollingDays { .. } => "rolling-days",
            Window::RollingMonths { .. } => "rolling-months",
            Window::Range { .. } => "range",
        }
    }

    /// Every day in the window, ascending.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let (start, end) = self.bounds();
        start.iter_days().take_while(move |d| *d <= end)
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Window::Day(d) => write!(f, "{d}"),
            Window::IsoWeek { monday } => {
                let w = monday.iso_week();
                write!(f, "{}-W{:02}", w.year(), w.week())
            }
            Window::RollingDays { days, .. } => write!(f, "rolling-{days}d"),
            Window::RollingMonths { months, .. } => write!(f, "rolling-{months}m"),
            Window::Range { start, end } => write!(f, "{start}..{end}"),
        }
    }
}

fn parse_day(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").with_context(|| format!("bad date '{s}'"))
}

fn parse_count(s: &str) -> Result<u32> {
    let n: u32 = s.trim().parse().with_context(|| format!("bad count '{s}'"))?;
    if n == 0 {
        bail!("window length must be at least 1");
    }
    Ok(n)
}
