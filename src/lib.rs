pub mod browser;
pub mod config;
pub mod downloader;
pub mod models;
pub mod pipeline;
pub mod scraper;
pub mod storage;
pub mod utils;
