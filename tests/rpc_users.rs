use reqwest::{header::WWW_AUTHENTICATE, StatusCode};
use rpcauth::{
    auth::CredentialEntry,
    rpc::{self, RunningServer, ServerConfig, StartupError},
    settings::Settings,
};
use serde_json::{json, Value};
use std::{
    fs,
    net::{Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
};
use tempfile::TempDir;

const RT_ENTRY: &str =
    "rt:93648e835a54c573682c2eb19f882535$7681e9c5b74bdd85e78166031d2058e1069b3ed7ed967c93fc63abba06f31144";
const RT_PASSWORD: &str = "cA773lm788buwYe4g4WT+05pKyNruVKjQ25x3n0DQcM=";

const DEF_ENTRY: &str =
    "def:$fd7adb152c05ef80dccf50a1fa4c05d5a3ec6da95575fc312ae7c5d091836351";
const DEF_PASSWORD: &str = "abc";

struct Node {
    datadir: TempDir,
}

impl Node {
    fn new(config: &str) -> Self {
        let datadir = tempfile::tempdir().expect("tempdir");
        fs::write(datadir.path().join("rpcauth.conf"), config).expect("write config");
        Self { datadir }
    }

    fn path(&self) -> &Path {
        self.datadir.path()
    }

    fn cookie_path(&self) -> PathBuf {
        self.path().join(".cookie")
    }

    async fn start(&self, overrides: &[&str]) -> Result<RunningServer, StartupError> {
        let config = Settings::load_config(&self.path().join("rpcauth.conf"), false)?;
        let settings = Settings::new(config, Settings::parse_overrides(overrides)?);
        let config = ServerConfig::from_settings(
            SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
            self.path(),
            &settings,
        )?;
        rpc::start(config).await
    }

    fn write_users(&self, name: &str, entries: &[&CredentialEntry]) -> PathBuf {
        let path = self.path().join(name);
        let contents: String = entries.iter().map(|e| format!("{}\n", e.encode())).collect();
        fs::write(&path, contents).expect("write users");
        path
    }
}

async fn call(server: &RunningServer, user: &str, password: &str) -> StatusCode {
    reqwest::Client::new()
        .post(format!("http://{}/", server.local_addr()))
        .basic_auth(user, Some(password))
        .json(&json!({ "method": "getrpcinfo", "id": 1 }))
        .send()
        .await
        .expect("request")
        .status()
}

async fn accepted(server: &RunningServer, user: &str, password: &str) -> bool {
    match call(server, user, password).await {
        StatusCode::OK => true,
        StatusCode::UNAUTHORIZED => false,
        other => panic!("unexpected status {other}"),
    }
}

#[tokio::test]
async fn inline_entries_accept_only_exact_credentials() {
    let node = Node::new(&format!("rpcauth={RT_ENTRY}\nrpcauth={DEF_ENTRY}\n"));
    let server = node.start(&[]).await.expect("start");

    assert!(accepted(&server, "rt", RT_PASSWORD).await);
    assert!(accepted(&server, "def", DEF_PASSWORD).await);
    assert!(!accepted(&server, "rt", &format!("{RT_PASSWORD}wrong")).await);
    assert!(!accepted(&server, "rtwrong", RT_PASSWORD).await);
    assert!(!accepted(&server, "rt", &RT_PASSWORD[1..]).await);
    assert!(!accepted(&server, "def", "abd").await);

    server.stop().await.expect("stop");
}

#[tokio::test]
async fn rejection_is_bare_401_with_challenge() {
    let node = Node::new(&format!("rpcauth={RT_ENTRY}\n"));
    let server = node.start(&[]).await.expect("start");
    let url = format!("http://{}/", server.local_addr());

    let response = reqwest::Client::new()
        .post(&url)
        .json(&json!({ "method": "uptime" }))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get(WWW_AUTHENTICATE).is_some());
    assert!(response.bytes().await.expect("body").is_empty());

    let unknown = reqwest::Client::new()
        .post(&url)
        .basic_auth("nobody", Some("x"))
        .send()
        .await
        .expect("request");
    let wrong = reqwest::Client::new()
        .post(&url)
        .basic_auth("rt", Some("x"))
        .send()
        .await
        .expect("request");
    assert_eq!(unknown.status(), wrong.status());
    assert_eq!(
        unknown.headers().get(WWW_AUTHENTICATE),
        wrong.headers().get(WWW_AUTHENTICATE)
    );

    server.stop().await.expect("stop");
}

#[tokio::test]
async fn health_needs_no_credentials() {
    let node = Node::new("");
    let server = node.start(&[]).await.expect("start");

    let response = reqwest::get(format!("http://{}/health", server.local_addr()))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-request-id").is_some());
    let body: Value = response.json().await.expect("json");
    assert_eq!(body["name"], json!(env!("CARGO_PKG_NAME")));

    server.stop().await.expect("stop");
}

#[tokio::test]
async fn legacy_pair_with_non_ascii_credentials() {
    let node = Node::new("rpcuser=rpcuser💻\nrpcpassword=rpcpassword🔑\n");
    let server = node.start(&[]).await.expect("start");

    assert!(accepted(&server, "rpcuser💻", "rpcpassword🔑").await);
    assert!(!accepted(&server, "rpcuser💻", "rpcpassword🔑wrong").await);
    assert!(!accepted(&server, "rpcuser", "rpcpassword🔑").await);
    assert!(server.cookie_path().is_none());
    assert!(!node.cookie_path().exists());

    server.stop().await.expect("stop");
}

#[tokio::test]
async fn credential_files_merge_in_any_order() {
    let node = Node::new("");
    let a = CredentialEntry::generate("alice", "pa");
    let b = CredentialEntry::generate("bob", "pb");
    let c = CredentialEntry::generate("carol", "pc");
    node.write_users("one.txt", &[&a, &b]);
    fs::write(
        node.path().join("two.txt"),
        format!("{}\n\n{}", c.encode(), RT_ENTRY),
    )
    .expect("write users");

    for overrides in [
        ["-rpcauthfile=one.txt", "-rpcauthfile=two.txt"],
        ["-rpcauthfile=two.txt", "-rpcauthfile=one.txt"],
    ] {
        let server = node.start(&overrides).await.expect("start");
        assert_eq!(server.authenticator().registry().len(), 4);
        assert!(accepted(&server, "alice", "pa").await);
        assert!(accepted(&server, "bob", "pb").await);
        assert!(accepted(&server, "carol", "pc").await);
        assert!(accepted(&server, "rt", RT_PASSWORD).await);
        assert!(!accepted(&server, "carol", "pa").await);
        server.stop().await.expect("stop");
    }
}

#[tokio::test]
async fn clear_and_reenable_across_restarts() {
    let node = Node::new(&format!("rpcauth={RT_ENTRY}\nrpcauthfile=users.txt\n"));
    let alice = CredentialEntry::generate("alice", "pa");
    let fresh = CredentialEntry::generate("fresh", "pf");
    node.write_users("users.txt", &[&alice]);

    // Clear drops everything configured so far.
    let server = node.start(&["-norpcauth"]).await.expect("start");
    assert!(!accepted(&server, "rt", RT_PASSWORD).await);
    assert!(!accepted(&server, "alice", "pa").await);
    server.stop().await.expect("stop");

    // Clear then re-enable restores the previous set unchanged.
    let server = node
        .start(&["-norpcauth", "-rpcauth"])
        .await
        .expect("start");
    assert!(accepted(&server, "rt", RT_PASSWORD).await);
    assert!(accepted(&server, "alice", "pa").await);
    server.stop().await.expect("stop");

    // Re-enable plus a fresh entry accepts both.
    let fresh_entry = format!("-rpcauth={}", fresh.encode());
    let server = node
        .start(&["-norpcauth", "-rpcauth", &fresh_entry])
        .await
        .expect("start");
    assert!(accepted(&server, "rt", RT_PASSWORD).await);
    assert!(accepted(&server, "fresh", "pf").await);
    server.stop().await.expect("stop");

    // An entry added after the clear survives the re-enable.
    let server = node
        .start(&["-norpcauth", &fresh_entry, "-rpcauth"])
        .await
        .expect("start");
    assert!(accepted(&server, "rt", RT_PASSWORD).await);
    assert!(accepted(&server, "fresh", "pf").await);
    server.stop().await.expect("stop");

    // A blank add next to a clear is just a clear.
    let server = node
        .start(&["-rpcauth=", "-norpcauth"])
        .await
        .expect("start");
    assert!(!accepted(&server, "rt", RT_PASSWORD).await);
    assert_eq!(server.authenticator().registry().len(), 0);
    server.stop().await.expect("stop");

    // Back to the plain config.
    let server = node.start(&[]).await.expect("start");
    assert!(accepted(&server, "rt", RT_PASSWORD).await);
    server.stop().await.expect("stop");
}

#[tokio::test]
async fn later_entry_for_same_user_wins() {
    let node = Node::new("");
    let old = CredentialEntry::generate("alice", "old");
    let new = CredentialEntry::generate("alice", "new");
    let old = format!("-rpcauth={}", old.encode());
    let new = format!("-rpcauth={}", new.encode());

    let server = node.start(&[&old, &new]).await.expect("start");
    assert!(accepted(&server, "alice", "new").await);
    assert!(!accepted(&server, "alice", "old").await);
    server.stop().await.expect("stop");
}

#[tokio::test]
async fn malformed_entries_prevent_startup() {
    let node = Node::new(&format!("rpcauth={RT_ENTRY}\n"));
    for bad in ["foo", "foo:bar", "foo:bar:baz", "foo$bar:baz", "foo$bar$baz"] {
        let token = format!("-rpcauth={bad}");
        let err = node.start(&[&token]).await.expect_err(bad);
        assert!(err.is_invalid_credential_format(), "{bad}: {err}");
        assert!(!node.cookie_path().exists(), "{bad}");

        // Still fatal when a later clear would have dropped the entry.
        let err = node
            .start(&[&token, "-norpcauth"])
            .await
            .expect_err(bad);
        assert!(err.is_invalid_credential_format(), "{bad}: {err}");
    }

    fs::write(node.path().join("bad.txt"), format!("{RT_ENTRY}\nfoo:bar\n")).expect("write");
    let err = node
        .start(&["-rpcauthfile=bad.txt"])
        .await
        .expect_err("bad file");
    assert!(err.is_invalid_credential_format(), "{err}");

    let err = node
        .start(&["-rpcauthfile=missing.txt"])
        .await
        .expect_err("missing file");
    assert!(err.is_invalid_credential_format(), "{err}");
}

#[tokio::test]
async fn cookie_authenticates_and_is_removed_on_stop() {
    let node = Node::new("");
    let server = node.start(&[]).await.expect("start");

    let contents = fs::read_to_string(node.cookie_path()).expect("cookie");
    let (user, secret) = contents.split_once(':').expect("user:secret");
    assert_eq!(user, "__cookie__");
    assert!(accepted(&server, user, secret).await);
    assert!(!accepted(&server, user, &secret[1..]).await);
    assert!(!node.path().join(".cookie.tmp").exists());

    server.stop().await.expect("stop");
    assert!(!node.cookie_path().exists());

    let server = node.start(&[]).await.expect("restart");
    assert!(!accepted(&server, user, secret).await);
    server.stop().await.expect("stop");
}

#[tokio::test]
async fn disabled_cookie_is_not_written() {
    let node = Node::new("");
    let server = node.start(&["-norpccookiefile"]).await.expect("start");
    assert!(server.cookie_path().is_none());
    assert!(!node.cookie_path().exists());
    server.stop().await.expect("stop");
}

#[tokio::test]
async fn occupied_cookie_temp_path_is_fatal() {
    let node = Node::new(&format!("rpcauth={RT_ENTRY}\n"));
    fs::create_dir(node.path().join(".cookie.tmp")).expect("mkdir");

    let err = node.start(&[]).await.expect_err("must fail");
    assert!(err.is_cookie_write_failure(), "{err}");
    assert!(!node.cookie_path().exists());
}

#[tokio::test]
async fn occupied_cookie_path_is_fatal() {
    let node = Node::new(&format!("rpcauth={RT_ENTRY}\n"));
    fs::create_dir(node.cookie_path()).expect("mkdir");

    let err = node.start(&[]).await.expect_err("must fail");
    assert!(err.is_cookie_write_failure(), "{err}");
    assert!(node.cookie_path().is_dir());
    assert!(!node.path().join(".cookie.tmp").exists());
}

#[cfg(unix)]
mod permissions {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn mode(path: &Path) -> u32 {
        fs::metadata(path).expect("stat").permissions().mode() & 0o7777
    }

    async fn cookie_mode(node: &Node, overrides: &[&str]) -> u32 {
        let server = node.start(overrides).await.expect("start");
        let mode = mode(&node.cookie_path());
        server.stop().await.expect("stop");
        mode
    }

    #[tokio::test]
    async fn default_is_owner_read_write() {
        let node = Node::new("");
        assert_eq!(cookie_mode(&node, &[]).await, 0o600);
        assert_eq!(cookie_mode(&node, &["-rpccookieperms"]).await, 0o600);
    }

    #[tokio::test]
    async fn explicit_modes_are_exact() {
        let node = Node::new("");
        for (value, expected) in [("440", 0o440), ("640", 0o640), ("444", 0o444), ("1660", 0o1660)] {
            let token = format!("-rpccookieperms={value}");
            assert_eq!(cookie_mode(&node, &[&token]).await, expected, "{value}");
        }
    }

    #[tokio::test]
    async fn negation_uses_os_default() {
        let node = Node::new("");
        let reference = node.path().join("reference");
        fs::write(&reference, b"x").expect("write reference");
        let os_default = mode(&reference);

        assert_eq!(cookie_mode(&node, &["-norpccookieperms"]).await, os_default);
    }

    #[tokio::test]
    async fn last_specified_wins() {
        let node = Node::new("");
        let reference = node.path().join("reference");
        fs::write(&reference, b"x").expect("write reference");
        let os_default = mode(&reference);

        for value in ["440", "640", "444", "1660"] {
            let token = format!("-rpccookieperms={value}");
            let expected = u32::from_str_radix(value, 8).expect("octal");
            assert_eq!(
                cookie_mode(&node, &[&token, "-norpccookieperms"]).await,
                os_default,
                "{value} then negation"
            );
            assert_eq!(
                cookie_mode(&node, &["-norpccookieperms", &token]).await,
                expected,
                "negation then {value}"
            );
        }
    }

    #[tokio::test]
    async fn invalid_mode_is_fatal() {
        let node = Node::new("");
        let err = node
            .start(&["-rpccookieperms=rw-r-----"])
            .await
            .expect_err("invalid");
        assert!(matches!(
            err,
            StartupError::Auth(rpcauth::auth::Error::InvalidPermissions(_))
        ));
        assert!(!node.cookie_path().exists());
    }
}

#[tokio::test]
async fn whitelist_limits_methods() {
    let alice = CredentialEntry::generate("alice", "pa");
    let bob = CredentialEntry::generate("bob", "pb");
    let node = Node::new(&format!(
        "rpcauth={}\nrpcauth={}\nrpcwhitelist=alice:uptime,help\n",
        alice.encode(),
        bob.encode()
    ));
    let server = node.start(&[]).await.expect("start");
    let url = format!("http://{}/", server.local_addr());

    let send = |user: &'static str, password: &'static str, method: &'static str| {
        let url = url.clone();
        async move {
            reqwest::Client::new()
                .post(url)
                .basic_auth(user, Some(password))
                .json(&json!({ "method": method, "id": 1 }))
                .send()
                .await
                .expect("request")
                .status()
        }
    };

    assert_eq!(send("alice", "pa", "uptime").await, StatusCode::OK);
    assert_eq!(send("alice", "pa", "echo").await, StatusCode::FORBIDDEN);
    assert_eq!(send("bob", "pb", "uptime").await, StatusCode::FORBIDDEN);
    assert_eq!(send("alice", "wrong", "uptime").await, StatusCode::UNAUTHORIZED);

    server.stop().await.expect("stop");

    let server = node
        .start(&["-norpcwhitelistdefault"])
        .await
        .expect("start");
    let url = format!("http://{}/", server.local_addr());
    let status = reqwest::Client::new()
        .post(url)
        .basic_auth("bob", Some("pb"))
        .json(&json!({ "method": "echo" }))
        .send()
        .await
        .expect("request")
        .status();
    assert_eq!(status, StatusCode::OK);
    server.stop().await.expect("stop");
}

#[tokio::test]
async fn json_rpc_methods() {
    let node = Node::new(&format!("rpcauth={RT_ENTRY}\n"));
    let server = node.start(&[]).await.expect("start");
    let url = format!("http://{}/", server.local_addr());
    let client = reqwest::Client::new();

    let echo: Value = client
        .post(&url)
        .basic_auth("rt", Some(RT_PASSWORD))
        .json(&json!({ "jsonrpc": "2.0", "method": "echo", "params": [1, "two"], "id": 7 }))
        .send()
        .await
        .expect("request")
        .json()
        .await
        .expect("json");
    assert_eq!(echo, json!({ "jsonrpc": "2.0", "result": [1, "two"], "id": 7 }));

    let missing = client
        .post(&url)
        .basic_auth("rt", Some(RT_PASSWORD))
        .json(&json!({ "method": "stop", "id": 8 }))
        .send()
        .await
        .expect("request");
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    let body: Value = missing.json().await.expect("json");
    assert_eq!(body["error"]["code"], json!(-32601));

    let garbage = client
        .post(&url)
        .basic_auth("rt", Some(RT_PASSWORD))
        .body("{")
        .send()
        .await
        .expect("request");
    assert_eq!(garbage.status(), StatusCode::BAD_REQUEST);

    drop(client);
    server.stop().await.expect("stop");
}
