//! Definition source readers.

pub mod reader;

pub use reader::SourceReader;
