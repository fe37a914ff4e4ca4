pub mod job_feed;

pub use job_feed::JobFeedProvider;
