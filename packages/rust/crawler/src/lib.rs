//! Site Crawler — bounded breadth-first capture of one blog's pages.
//!
//! This crate provides:
//! - [`Crawler`] — same-origin BFS crawler with an attempt-counted page
//!   budget, explicit frontier, and per-page error isolation
//! - [`CrawlOutcome`] / [`PageCapture`] — one job's captured pages in
//!   discovery order, plus the failures the crawl survived

pub mod engine;

pub use engine::{CrawlOutcome, Crawler, PageCapture};
