use anyhow::{Context, Result};
use base64ct::{Base64Url, Encoding};
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};
use tracing::info;

use crate::auth::CredentialEntry;

const PASSWORD_LEN: usize = 32;

#[derive(Debug)]
pub struct Args {
    pub username: String,
    pub password: Option<SecretString>,
    pub output: Option<PathBuf>,
}

/// A random password, URL-safe base64 encoded.
#[must_use]
pub fn generate_password() -> SecretString {
    let mut bytes = [0u8; PASSWORD_LEN];
    OsRng.fill_bytes(&mut bytes);
    SecretString::from(Base64Url::encode_string(&bytes))
}

/// Text shown to the operator after generating an entry.
#[must_use]
pub fn render(entry: &CredentialEntry, password: &SecretString) -> String {
    format!(
        "String to be appended to rpcauth.conf:\nrpcauth={}\nYour password:\n{}",
        entry.encode(),
        password.expose_secret()
    )
}

/// Append `entry` as one line of a credential file, creating it if needed.
///
/// # Errors
/// Returns an error if the file cannot be opened or written.
pub fn append(path: &Path, entry: &CredentialEntry) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Unable to open {}", path.display()))?;
    writeln!(file, "{}", entry.encode())
        .with_context(|| format!("Unable to write {}", path.display()))?;
    Ok(())
}

/// Execute the gen action.
/// # Errors
/// Returns an error if the output file cannot be written.
pub fn execute(args: &Args) -> Result<()> {
    let generated;
    let password = match &args.password {
        Some(password) => password,
        None => {
            generated = generate_password();
            &generated
        }
    };

    let entry = CredentialEntry::generate(&args.username, password.expose_secret());

    if let Some(output) = &args.output {
        append(output, &entry)?;
        info!("Appended entry for {} to {}", args.username, output.display());
    }

    println!("{}", render(&entry, password));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::directive::{parse_entry, parse_file};
    use crate::auth::{CredentialRegistry, Directive};

    #[test]
    fn generated_password_is_urlsafe() {
        let password = generate_password();
        let password = password.expose_secret();
        assert_eq!(password.len(), 44);
        assert!(!password.contains('+') && !password.contains('/'));
        assert_ne!(password, generate_password().expose_secret());
    }

    #[test]
    fn render_format() {
        let entry = CredentialEntry::generate("alice", "secret");
        let text = render(&entry, &SecretString::from("secret".to_string()));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "String to be appended to rpcauth.conf:");
        assert_eq!(lines[1], format!("rpcauth={}", entry.encode()));
        assert_eq!(lines[2], "Your password:");
        assert_eq!(lines[3], "secret");
        let parsed = parse_entry(lines[1].trim_start_matches("rpcauth=")).expect("entry");
        assert_eq!(parsed, entry);
    }

    #[test]
    fn append_builds_a_credential_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("users.txt");
        let alice = CredentialEntry::generate("alice", "pa");
        let bob = CredentialEntry::generate("bob", "pb");
        append(&path, &alice).expect("append alice");
        append(&path, &bob).expect("append bob");

        assert_eq!(parse_file(&path).expect("parse"), vec![alice, bob]);
        let registry =
            CredentialRegistry::build(vec![Directive::AddFile(path)], None).expect("registry");
        assert!(crate::auth::verifier::verify(&registry, "bob", "pb"));
    }

    #[test]
    fn execute_with_output() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("users.txt");
        execute(&Args {
            username: "carol".to_string(),
            password: None,
            output: Some(path.clone()),
        })
        .expect("execute");
        let entries = parse_file(&path).expect("parse");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].username(), "carol");
    }
}
