use chrono::{DateTime, NaiveDate, TimeZone, Timelike, Utc};
use uuid::Uuid;

use crate::disk::{codec, Sector};

/// AmigaDOS 时间戳：自 1978-01-01 起的天数、当天分钟数、分钟内的 tick（1/50 秒）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AmigaDate {
    pub days: u32,
    pub mins: u32,
    pub ticks: u32,
}

impl AmigaDate {
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        let epoch = NaiveDate::from_ymd_opt(1978, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|d| Utc.from_utc_datetime(&d))
            .unwrap_or_default();
        if at < epoch {
            return Self::default();
        }
        let days = (at - epoch).num_days() as u32;
        let mins = at.hour() * 60 + at.minute();
        let ticks = at.second() * 50 + at.nanosecond() / 20_000_000;
        Self { days, mins, ticks }
    }

    pub fn now() -> Self {
        Self::from_datetime(current_timestamp())
    }

    pub fn write(&self, sector: &mut Sector, offset: usize) {
        codec::write_u32(sector, offset, self.days);
        codec::write_u32(sector, offset + 4, self.mins);
        codec::write_u32(sector, offset + 8, self.ticks);
    }

    pub fn read(sector: &Sector, offset: usize) -> Self {
        Self {
            days: codec::read_u32(sector, offset),
            mins: codec::read_u32(sector, offset + 4),
            ticks: codec::read_u32(sector, offset + 8),
        }
    }
}

/// 当前时间；设置了 `SOURCE_DATE_EPOCH` 时使用它，便于生成可复现的镜像。
pub fn current_timestamp() -> DateTime<Utc> {
    std::env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|secs| secs.trim().parse::<i64>().ok())
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .unwrap_or_else(Utc::now)
}

/// 生成一个随机唯一 ID
pub fn generate_uuid() -> String {
    Uuid::new_v4().to_string()
}
