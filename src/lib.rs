//! A personal alarm clock and notification feed.
//!
//! Alarms fire spoken briefings built from cached infection-rate, weather
//! and news data; the same data feeds a deduplicated notification list
//! shown on a single web page. All state changes are journalled and the
//! journal is replayed on startup.

pub mod briefing;
pub mod config;
pub mod entry;
pub mod error;
pub mod journal;
pub mod notifications;
pub mod process;
pub mod refresh;
pub mod scheduler;
pub mod upstream;
pub mod utils;
pub mod web;

pub use error::{PlannerError, Result};
pub use process::{Planner, SharedPlanner};
