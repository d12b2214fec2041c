// ABOUTME: Command module aggregator for the fleetswap CLI.
// ABOUTME: Re-exports one handler per subcommand plus the shared invocation context.

mod backend;
mod deploy;
mod init;
mod inspect;
mod rollback;
mod scale_down;

pub use backend::Invocation;
pub use deploy::{deploy, list_releases};
pub use init::init;
pub use inspect::{status, validate};
pub use rollback::{rollback, switch};
pub use scale_down::{cleanup, shutdown};
