pub mod groq;
pub mod jira;
pub mod llm;
pub mod ollama;
pub mod pdftotext;
pub mod wordml;
