mod commands;
mod parse;

pub(crate) use commands::{run_build, run_publish};
pub(crate) use parse::{parse_invocation, Invocation};
