//! 取得対象期間 (ローンチ日ウィンドウ)

use chrono::{Datelike, Duration, NaiveDate};

use crate::error::ScraperError;

/// 週番号の上限
pub const MAX_WEEK: u32 = 52;

/// ローンチ日の範囲 (両端含む)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl LaunchWindow {
    /// 1日分
    pub fn day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    /// 月曜始まりの週。第1週は年内最初の月曜日から始まる
    pub fn week(year: i32, week: u32) -> Result<Self, ScraperError> {
        if !(1..=MAX_WEEK).contains(&week) {
            return Err(ScraperError::InvalidWeek(week));
        }

        let jan1 = NaiveDate::from_ymd_opt(year, 1, 1)
            .ok_or_else(|| ScraperError::InvalidDate(format!("year {}", year)))?;
        let offset = (7 - jan1.weekday().num_days_from_monday()) % 7;
        let start = jan1 + Duration::days(i64::from(offset) + i64::from(week - 1) * 7);

        Ok(Self {
            start,
            end: start + Duration::days(6),
        })
    }

    /// GraphQL `postedAfter`
    pub fn posted_after(&self) -> String {
        format!("{}T00:00:00Z", self.start.format("%Y-%m-%d"))
    }

    /// GraphQL `postedBefore`
    pub fn posted_before(&self) -> String {
        format!("{}T23:59:59Z", self.end.format("%Y-%m-%d"))
    }
}

/// `today` が属する週番号 (1〜52に丸める)
pub fn current_week(today: NaiveDate) -> u32 {
    let week = (today.ordinal0() + 7 - today.weekday().num_days_from_monday()) / 7;
    week.clamp(1, MAX_WEEK)
}

/// start..=end の全日付。start > end なら空
pub fn date_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|d| *d <= end).collect()
}

/// YYYY-MM-DD を解析
pub fn parse_date(value: &str) -> Result<NaiveDate, ScraperError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| ScraperError::InvalidDate(format!("{}: {}", value, e)))
}
