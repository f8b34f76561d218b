pub mod analytics;

pub use analytics::{AnalyticsService, DateRange};
