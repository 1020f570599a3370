pub mod openai;
pub mod compatible;
pub mod ollama;
pub mod zhipu;
