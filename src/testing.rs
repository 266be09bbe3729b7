//! In-process stand-ins for the host tools, used by unit tests.
//!
//! Formats are simplified but keep the properties the pipelines rely on:
//! archives carry their control file, indices list every pooled archive,
//! compressed files decode back to their input, and signatures are tied to
//! the exact bytes they were produced from.

use anyhow::Result;
use sha2::{Digest, Sha256};
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::process::{Cmd, ToolOutput, ToolRunner};

const DEB_MAGIC: &[u8] = b"!fake-deb\n";
const GZ_MAGIC: &[u8] = b"\x1f\x8bfake\n";
const XZ_MAGIC: &[u8] = b"\xfd7zXZfake\n";
const SIG_BEGIN: &str = "-----BEGIN PGP SIGNATURE-----\n";
const SIG_END: &str = "-----END PGP SIGNATURE-----\n";
const CLEARSIGN_HEADER: &str = "-----BEGIN PGP SIGNED MESSAGE-----\nHash: SHA256\n\n";

#[derive(Debug, Default)]
pub(crate) struct FakeTools {
    missing: BTreeSet<String>,
    failing: Vec<(String, Option<String>)>,
    corrupt_xz: bool,
    tamper_on_sign: bool,
    calls: RefCell<Vec<String>>,
}

impl FakeTools {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn without_tool(mut self, tool: &str) -> Self {
        self.missing.insert(tool.to_string());
        self
    }

    /// Every invocation of `tool` exits non-zero.
    pub(crate) fn failing(mut self, tool: &str) -> Self {
        self.failing.push((tool.to_string(), None));
        self
    }

    /// Invocations of `tool` that include `arg` exit non-zero.
    pub(crate) fn failing_with(mut self, tool: &str, arg: &str) -> Self {
        self.failing.push((tool.to_string(), Some(arg.to_string())));
        self
    }

    /// `xz` output decodes to different bytes than its input.
    pub(crate) fn corrupting_xz(mut self) -> Self {
        self.corrupt_xz = true;
        self
    }

    /// `gpg` appends to the file it signs.
    pub(crate) fn tampering_on_sign(mut self) -> Self {
        self.tamper_on_sign = true;
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    /// Control file embedded in an archive written by the fake `dpkg-deb`.
    pub(crate) fn deb_control(archive: &Path) -> String {
        let bytes = fs::read(archive).unwrap();
        let body = bytes.strip_prefix(DEB_MAGIC).expect("not a fake deb");
        String::from_utf8(body.to_vec()).unwrap()
    }

    /// Decode a file written by the fake `gzip` or `xz`.
    pub(crate) fn decode(path: &Path) -> Vec<u8> {
        let bytes = fs::read(path).unwrap();
        bytes
            .strip_prefix(GZ_MAGIC)
            .or_else(|| bytes.strip_prefix(XZ_MAGIC))
            .expect("not a fake compressed file")
            .to_vec()
    }

    /// Message embedded in a clear-signed file.
    pub(crate) fn signed_payload(path: &Path) -> Vec<u8> {
        let text = fs::read_to_string(path).unwrap();
        let body = text.strip_prefix(CLEARSIGN_HEADER).expect("not clear-signed");
        let end = body.rfind(SIG_BEGIN).expect("no signature block");
        body[..end].as_bytes().to_vec()
    }

    /// Digest recorded in a detached signature.
    pub(crate) fn detached_digest(path: &Path) -> String {
        let text = fs::read_to_string(path).unwrap();
        text.strip_prefix(SIG_BEGIN)
            .and_then(|t| t.strip_suffix(SIG_END))
            .expect("not a detached signature")
            .trim()
            .to_string()
    }

    fn should_fail(&self, cmd: &Cmd) -> bool {
        let argv = cmd.argv();
        self.failing.iter().any(|(tool, arg)| {
            tool == cmd.program() && arg.as_ref().map_or(true, |a| argv.contains(a))
        })
    }

    fn resolve(cmd: &Cmd, arg: &str) -> PathBuf {
        match cmd.working_dir() {
            Some(dir) => dir.join(arg),
            None => PathBuf::from(arg),
        }
    }

    fn dpkg_deb(cmd: &Cmd) -> Result<Vec<u8>> {
        let argv = cmd.argv();
        let [.., staging, output] = argv.as_slice() else {
            anyhow::bail!("dpkg-deb: missing arguments");
        };
        let control = fs::read(Self::resolve(cmd, staging).join("DEBIAN/control"))?;
        let mut archive = DEB_MAGIC.to_vec();
        archive.extend(control);
        fs::write(Self::resolve(cmd, output), archive)?;
        Ok(Vec::new())
    }

    fn dpkg_scanpackages(cmd: &Cmd) -> Result<Vec<u8>> {
        let argv = cmd.argv();
        let pool_rel = argv
            .iter()
            .find(|a| a.starts_with("pool/"))
            .ok_or_else(|| anyhow::anyhow!("dpkg-scanpackages: no pool argument"))?;
        let pool = Self::resolve(cmd, pool_rel);

        let mut names: Vec<String> = fs::read_dir(&pool)?
            .map(|e| e.map(|e| e.file_name().to_string_lossy().into_owned()))
            .collect::<std::io::Result<_>>()?;
        names.retain(|n| n.ends_with(".deb"));
        names.sort();

        let mut out = String::new();
        for name in names {
            let path = pool.join(&name);
            let control = Self::deb_control(&path);
            let size = fs::metadata(&path)?.len();
            out.push_str(control.trim_end());
            out.push_str(&format!("\nFilename: {pool_rel}/{name}\nSize: {size}\n\n"));
        }
        Ok(out.into_bytes())
    }

    fn compress(&self, cmd: &Cmd, magic: &[u8]) -> Result<Vec<u8>> {
        let argv = cmd.argv();
        let input = Self::resolve(cmd, argv.last().map(String::as_str).unwrap_or_default());
        let bytes = fs::read(&input)?;

        if argv.iter().any(|a| a == "-d") {
            return bytes
                .strip_prefix(magic)
                .map(<[u8]>::to_vec)
                .ok_or_else(|| anyhow::anyhow!("{}: not in fake format", input.display()));
        }

        let mut out = magic.to_vec();
        out.extend(bytes);
        if self.corrupt_xz && magic == XZ_MAGIC {
            out.extend_from_slice(b"garbage");
        }
        Ok(out)
    }

    fn apt_ftparchive(cmd: &Cmd) -> Result<Vec<u8>> {
        let argv = cmd.argv();
        let mut out = String::new();
        for pair in argv.windows(2).filter(|w| w[0] == "-o") {
            if let Some((key, value)) = pair[1]
                .strip_prefix("APT::FTPArchive::Release::")
                .and_then(|kv| kv.split_once('='))
            {
                out.push_str(&format!("{key}: {value}\n"));
            }
        }

        let dir = Self::resolve(cmd, argv.last().map(String::as_str).unwrap_or_default());
        out.push_str("SHA256:\n");
        let mut files: Vec<PathBuf> = walkdir::WalkDir::new(&dir)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect();
        files.sort();
        for file in files {
            let bytes = fs::read(&file)?;
            let rel = file.strip_prefix(&dir)?.to_string_lossy().into_owned();
            out.push_str(&format!(" {} {} {}\n", sha256_hex(&bytes), bytes.len(), rel));
        }
        Ok(out.into_bytes())
    }

    fn gpg(&self, cmd: &Cmd) -> Result<Vec<u8>> {
        let argv = cmd.argv();
        let output = argv
            .iter()
            .position(|a| a == "--output")
            .and_then(|i| argv.get(i + 1))
            .ok_or_else(|| anyhow::anyhow!("gpg: no --output"))?;
        let input = Self::resolve(cmd, argv.last().map(String::as_str).unwrap_or_default());
        let message = fs::read(&input)?;
        let digest = sha256_hex(&message);

        let signature = format!("{SIG_BEGIN}{digest}\n{SIG_END}");
        let body = if argv.iter().any(|a| a == "--clearsign") {
            format!(
                "{CLEARSIGN_HEADER}{}{signature}",
                String::from_utf8_lossy(&message)
            )
        } else {
            signature
        };
        fs::write(Self::resolve(cmd, output), body)?;

        if self.tamper_on_sign {
            let mut tampered = message;
            tampered.extend_from_slice(b"X-Tampered: yes\n");
            fs::write(&input, tampered)?;
        }
        Ok(Vec::new())
    }
}

impl ToolRunner for FakeTools {
    fn is_available(&self, tool: &str) -> bool {
        !self.missing.contains(tool)
    }

    fn run(&self, cmd: &Cmd) -> Result<ToolOutput> {
        self.calls
            .borrow_mut()
            .push(format!("{} {}", cmd.program(), cmd.argv().join(" ")));

        if self.should_fail(cmd) {
            return Ok(ToolOutput {
                status: Some(2),
                stdout: Vec::new(),
                stderr: format!("{}: simulated failure", cmd.program()),
            });
        }

        let stdout = match cmd.program() {
            "dpkg-deb" => Self::dpkg_deb(cmd)?,
            "dpkg-scanpackages" => Self::dpkg_scanpackages(cmd)?,
            "gzip" => self.compress(cmd, GZ_MAGIC)?,
            "xz" => self.compress(cmd, XZ_MAGIC)?,
            "apt-ftparchive" => Self::apt_ftparchive(cmd)?,
            "gpg" => self.gpg(cmd)?,
            other => {
                return Ok(ToolOutput {
                    status: Some(127),
                    stdout: Vec::new(),
                    stderr: format!("{other}: command not found"),
                })
            }
        };

        Ok(ToolOutput {
            status: Some(0),
            stdout,
            stderr: String::new(),
        })
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Write an archive the fake tools understand into `dir`.
pub(crate) fn fake_deb(dir: &Path, package: &str, version: &str, arch: &str) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    let path = dir.join(format!("{package}_{version}_{arch}.deb"));
    let mut bytes = DEB_MAGIC.to_vec();
    bytes.extend(
        format!("Package: {package}\nVersion: {version}\nArchitecture: {arch}\n").into_bytes(),
    );
    fs::write(&path, bytes).unwrap();
    path
}

/// Lay out the source assets the package builder expects under `root`.
pub(crate) fn write_project(root: &Path) {
    let files: Vec<(&str, Vec<u8>)> = vec![
        ("main.py", b"print('ankor')\n".to_vec()),
        (
            "packaging/ankor-device-info.desktop",
            b"[Desktop Entry]\nName=Ankor Device Info\nExec=ankor-device-info\n".to_vec(),
        ),
        (
            "packaging/ankor-device-info.png",
            vec![0x89, b'P', b'N', b'G', 0, 1, 2, 3],
        ),
        ("README.md", b"# Ankor Device Info\n".to_vec()),
        (
            "packaging/debian/control.in",
            include_bytes!("../packaging/debian/control.in").to_vec(),
        ),
        (
            "snap/snapcraft.yaml",
            b"name: ankor-device-info\nversion: '0.9.0'\n".to_vec(),
        ),
    ];
    for (rel, body) in files {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn records_calls_and_reports_unknown_tools() {
        let fake = FakeTools::new();
        let out = fake.run(&Cmd::new("mystery").arg("x")).unwrap();
        assert_eq!(out.status, Some(127));
        assert_eq!(fake.calls(), ["mystery x"]);
    }

    #[test]
    fn compression_round_trips() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("Packages");
        fs::write(&file, "Package: a\n").unwrap();
        let fake = FakeTools::new();

        let gz = fake
            .run(&Cmd::new("gzip").args(["-9", "-c"]).arg_path(&file))
            .unwrap();
        let gz_path = temp.path().join("Packages.gz");
        fs::write(&gz_path, &gz.stdout).unwrap();
        assert_eq!(FakeTools::decode(&gz_path), b"Package: a\n");
    }
}
