// Streaming SQL tests: parsing, evaluation and the function runtime

pub mod functions;
pub mod parser;
