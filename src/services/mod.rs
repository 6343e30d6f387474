pub mod call_source;
