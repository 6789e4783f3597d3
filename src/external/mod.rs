pub mod provider;
pub mod rss_feed;
pub mod newsapi;
