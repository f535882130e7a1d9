//! Library half of the `optbuild` command, kept separate from `main` so the
//! driver can be exercised from tests.

pub mod driver;

pub use driver::{Cli, PersistenceModeArg, resolve_buildconfig, run, write_buildconfig};
