// Role classification and template selection.
// Implements: keyword extraction, role scoring, template selection with fallback,
// template customization. The only network call is the optional semantic hint.

pub mod catalog;
pub mod customizer;
pub mod handlers;
pub mod keywords;
pub mod pipeline;
pub mod prompts;
pub mod scoring;
pub mod selector;
pub mod semantic;
pub mod templates;
