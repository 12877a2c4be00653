pub mod date;
pub mod models;
pub mod symbol;

pub use date::CalendarDate;
pub use models::{
    CachedRangeRecord, CatalystCacheRecord, CatalystEvent, CatalystEventType, EventSource,
    ExtractedCatalyst, HistoricalBar,
};
pub use symbol::Symbol;
