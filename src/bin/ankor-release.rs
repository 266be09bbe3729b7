use std::process::ExitCode;

use ankor_release::config::Environment;
use anyhow::Result;
use tracing_subscriber::EnvFilter;

mod workflows;

use workflows::Invocation;

fn usage() -> &'static str {
    "Usage:\n  ankor-release build [version]\n  ankor-release publish [deb_dir] [repo_dir]\n  ankor-release help\n\n\
     build environment:   VERSION PACKAGE_NAME ARCH MAINTAINER\n\
     publish environment: DIST COMPONENT ARCHS ORIGIN LABEL DESCRIPTION GPG_KEY_ID KEEP_VERSIONS\n\n\
     Defaults may also be set in ./packaging.toml."
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let env = Environment::from_process();

    match workflows::parse_invocation(&args)? {
        Invocation::Help => {
            println!("{}", usage());
            Ok(())
        }
        Invocation::Build { version } => workflows::run_build(version.as_deref(), &env),
        Invocation::Publish { deb_dir, repo_dir } => {
            workflows::run_publish(deb_dir.as_deref(), repo_dir.as_deref(), &env)
        }
    }
}
