pub mod llm;
pub mod persona;
pub mod registry;
pub mod tool;
pub mod tools;
pub mod transcript;
