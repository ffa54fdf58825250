//! Chapter detection and tree building.

pub mod builder;
pub mod strategy;

pub use builder::{BuiltStructure, RECOVERED_PARAGRAPH_CONFIDENCE, StructureBuilder};
pub use strategy::{
    ChapterBoundary, ChapterContext, ChapterStrategy, HeadingLevelStrategy, PatternStrategy,
};
