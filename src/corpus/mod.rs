pub mod parser;

pub use parser::{load_corpus, CorpusError, Review};
