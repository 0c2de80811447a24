pub mod detection;
pub mod info;
pub mod package_manager;
pub mod version;

#[allow(unused_imports)]
pub use detection::{default_brew_path, detect_architecture, Architecture};

#[allow(unused_imports)]
pub use package_manager::{Homebrew, DEFAULT_ENV, DEFAULT_PREFIX};

#[allow(unused_imports)]
pub use version::{strip_brew_revision, PackageVersion, VersionError};
