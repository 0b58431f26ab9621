pub mod ai;
pub mod catalog;
pub mod chunker;
pub mod compile;
pub mod coordinator;
pub mod encoding;
pub mod merge;
pub mod pipeline;
pub mod prompt;
pub mod report;
pub mod response;
pub mod store;
