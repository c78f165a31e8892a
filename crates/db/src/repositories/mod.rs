pub mod mixer_repo;
pub mod version_repo;

pub use mixer_repo::MixerRepo;
pub use version_repo::VersionRepo;
