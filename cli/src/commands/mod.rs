pub mod cli;
pub mod render;
pub mod scrape;
pub mod tasks;
