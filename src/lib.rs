pub mod analyzers;
pub mod channel;
pub mod config;
pub mod error;
pub mod fetch;
pub mod normalize;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod report;
pub mod scenario;
pub mod series;
pub mod store;
