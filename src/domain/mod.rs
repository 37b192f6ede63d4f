pub mod document;
pub mod rich_text;
pub mod template;
pub mod ticket;
