// Penprint: authorship signatures for short social posts
//
// This is the library root. Each module corresponds to a major subsystem:
// loading corpora, embedding text, fitting signatures, and measuring how
// well they separate an author from everyone else.

pub mod config;
pub mod corpus;
pub mod embedding;
pub mod evaluation;
pub mod models;
pub mod output;
