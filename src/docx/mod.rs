//! OOXML package plumbing shared by every template engine.

pub mod content_types;
pub mod ns;
pub mod package;
pub mod query;
pub mod rels;
pub mod repair;
pub mod xml;
