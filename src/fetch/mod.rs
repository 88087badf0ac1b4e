pub mod feeds;
pub mod search;

pub use feeds::{FeedBackend, FeedItem, HttpFeedBackend};
pub use search::{SearchBackend, SearchResult, TavilySearch};
