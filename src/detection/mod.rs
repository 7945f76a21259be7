//! Detection implementation submodule.
//!
//! Internal building blocks for [`detect`](crate::detect):
//!
//! - `command`: short-lived probe commands and file reads under a timeout
//! - `host`: identity, sandbox, device, network and resource probes
//! - `parser`: parsing of probe output
//! - `path_finder`: PATH-based executable lookup with fallbacks

mod command;
pub(crate) mod host;
mod parser;
mod path_finder;

pub(crate) use command::{run_probe, ProbeError};
pub(crate) use parser::{parse_version, tailscale_connected};
pub(crate) use path_finder::find_executable;
