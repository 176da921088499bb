pub mod documents;
pub mod extractions;
pub mod health;
