pub mod actions;
pub mod args;
pub mod cli;
pub mod driver;
pub mod editor;
pub mod errors;
pub mod files;
pub mod iterator;
pub mod printf;
pub mod scenario;
pub mod settings;
pub mod setup;
pub mod template;
pub mod xml;
mod xml_lexer;
