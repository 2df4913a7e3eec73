//! Storage layer integration tests: templates and working memory.

mod facts;
mod templates;
