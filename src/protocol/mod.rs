pub mod backend;
pub mod openai;
