pub mod sse;
pub mod stream_accumulator;
