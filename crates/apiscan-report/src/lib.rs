pub mod jsonl;

pub use jsonl::{completed_names, write_error, write_record, ErrorEntry};
