pub mod mixer;
pub mod version;
