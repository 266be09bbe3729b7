use anyhow::{bail, Result};

/// A parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Invocation {
    Help,
    Build {
        version: Option<String>,
    },
    Publish {
        deb_dir: Option<String>,
        repo_dir: Option<String>,
    },
}

fn is_help(arg: &str) -> bool {
    matches!(arg, "-h" | "--help" | "help")
}

pub(crate) fn parse_invocation(args: &[String]) -> Result<Invocation> {
    let Some((command, rest)) = args.split_first() else {
        bail!(crate::usage());
    };

    if is_help(command) || rest.iter().any(|a| is_help(a)) {
        return Ok(Invocation::Help);
    }

    if let Some(flag) = rest.iter().find(|a| a.starts_with('-')) {
        bail!("unknown option '{}'\n\n{}", flag, crate::usage());
    }

    match (command.as_str(), rest) {
        ("build", []) => Ok(Invocation::Build { version: None }),
        ("build", [version]) => Ok(Invocation::Build {
            version: Some(version.clone()),
        }),
        ("publish", []) => Ok(Invocation::Publish {
            deb_dir: None,
            repo_dir: None,
        }),
        ("publish", [deb_dir]) => Ok(Invocation::Publish {
            deb_dir: Some(deb_dir.clone()),
            repo_dir: None,
        }),
        ("publish", [deb_dir, repo_dir]) => Ok(Invocation::Publish {
            deb_dir: Some(deb_dir.clone()),
            repo_dir: Some(repo_dir.clone()),
        }),
        ("build" | "publish", _) => bail!(
            "too many arguments for `{}`\n\n{}",
            command,
            crate::usage()
        ),
        (other, _) => bail!("unknown command '{}'\n\n{}", other, crate::usage()),
    }
}
