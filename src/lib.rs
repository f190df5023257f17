pub mod aggregate;
pub mod config;
pub mod fetch;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod record;
pub mod store;
pub mod timerange;
