pub mod frontmatter;
pub mod intent;
pub mod metadata;
pub mod paths;
