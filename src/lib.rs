pub mod analyzers;
pub mod call;
pub mod classify;
pub mod features;
pub mod fetch;
pub mod llm;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod routing;
pub mod store;
