#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::doc_markdown,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::return_self_not_must_use,
    clippy::uninlined_format_args
)]

//! TradeLens AI client: request orchestration for the trading-journal
//! backend's AI endpoints — retrying transport, credit-limit
//! classification, result caching, and usage-limit bookkeeping.

pub mod api;
pub mod cache;
pub mod config;
pub mod limits;
pub mod notify;

pub use api::transport::RetryConfig;
pub use api::{AnalysisClient, AnalysisResult, AnalyzeOptions, ApiError};
pub use cache::AnalysisCache;
pub use config::Config;
pub use limits::{Subscription, UsageLimits, UsageLimitsService};
pub use notify::{MemoryNotices, Notice, NoticeSink, TracingNotices};
