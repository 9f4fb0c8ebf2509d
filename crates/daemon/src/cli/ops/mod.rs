pub mod daemon;
pub mod health;
pub mod init;
pub mod pin;
pub mod principal;
pub mod version;

pub use daemon::Daemon;
pub use health::Health;
pub use init::Init;
pub use pin::Pin;
pub use principal::Principal;
pub use version::Version;
