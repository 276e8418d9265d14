pub mod web;

pub use web::{fetch_page_text, flatten_html};
