pub mod api;
pub mod rate_limiter;


pub use api::{
    mention_from_child, parse_listing, search_type, RedditListing, RedditListingChild,
    RedditSearchClient, SearchPage,
};
pub use rate_limiter::{RateLimitConfig, RateLimitPermit, RateLimitStatus, RateLimiter, TokenBucket};

use mentionwatch_core::{CoreError, MentionKind, RawMention};

/// Where the pipeline gets unclassified mentions from.
pub trait MentionSource {
    async fn fetch(&self, query: &str, kind: MentionKind) -> Result<Vec<RawMention>, CoreError>;
}

impl MentionSource for RedditSearchClient {
    async fn fetch(&self, query: &str, kind: MentionKind) -> Result<Vec<RawMention>, CoreError> {
        self.search_all(query, kind).await
    }
}
