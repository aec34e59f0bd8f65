//! Integration tests for shellcache

mod common {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    /// Minimal HTTP/1.1 origin on a loopback port
    pub struct Origin {
        pub base: String,
        hits: Arc<AtomicUsize>,
    }

    impl Origin {
        pub fn start() -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let base = format!("http://{}/", listener.local_addr().unwrap());
            let hits = Arc::new(AtomicUsize::new(0));

            let counter = hits.clone();
            thread::spawn(move || {
                for stream in listener.incoming().flatten() {
                    counter.fetch_add(1, Ordering::SeqCst);
                    let _ = respond(stream);
                }
            });

            Self { base, hits }
        }

        pub fn hits(&self) -> usize {
            self.hits.load(Ordering::SeqCst)
        }
    }

    fn respond(mut stream: TcpStream) -> std::io::Result<()> {
        let mut reader = BufReader::new(stream.try_clone()?);
        let mut request_line = String::new();
        reader.read_line(&mut request_line)?;

        let mut content_length = 0usize;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line)?;
            if line.trim().is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                if name.eq_ignore_ascii_case("content-length") {
                    content_length = value.trim().parse().unwrap_or(0);
                }
            }
        }
        let mut body = vec![0u8; content_length];
        reader.read_exact(&mut body)?;

        let mut parts = request_line.split_whitespace();
        let method = parts.next().unwrap_or("");
        let path = parts.next().unwrap_or("/");

        let (status, payload) = match path.split('?').next().unwrap_or("/") {
            "/" | "/index.html" => ("200 OK", "<html>versys shell</html>".to_string()),
            "/app.css" => ("200 OK", "body{color:teal}".to_string()),
            "/api/orders" => (
                "200 OK",
                format!("{} {}", method, String::from_utf8_lossy(&body)),
            ),
            _ => ("404 Not Found", "missing".to_string()),
        };

        write!(
            stream,
            "HTTP/1.1 {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            payload.len(),
            payload
        )?;
        stream.flush()
    }

    /// Isolated home, config and store for one test
    pub struct Sandbox {
        pub dir: TempDir,
        pub config: PathBuf,
    }

    impl Sandbox {
        pub fn new(origin: &str, generation: &str) -> Self {
            let dir = TempDir::new().unwrap();
            let config = dir.path().join("config.toml");
            let store = dir.path().join("generations");
            std::fs::write(
                &config,
                format!(
                    "[origin]\nbase_url = \"{}\"\ntimeout_secs = 5\n\n\
                     [cache]\ngeneration = \"{}\"\ndir = \"{}\"\n\n\
                     [manifest]\nassets = [\"/\", \"/index.html\", \"/app.css\"]\n",
                    origin,
                    generation,
                    store.display()
                ),
            )
            .unwrap();
            Self { dir, config }
        }

        pub fn home(&self) -> &Path {
            self.dir.path()
        }

        pub fn cmd(&self) -> Command {
            let mut cmd = cargo_bin_cmd!("shellcache");
            cmd.env("HOME", self.home())
                .env("XDG_CONFIG_HOME", self.home().join("config"))
                .env("XDG_DATA_HOME", self.home().join("data"))
                .env_remove("SHELLCACHE_CONFIG")
                .arg("--no-local")
                .arg("--config")
                .arg(&self.config);
            cmd
        }
    }
}

mod cli_tests {
    use super::common::Sandbox;
    use predicates::prelude::*;

    fn sandbox() -> Sandbox {
        Sandbox::new("https://versys.example/", "v1")
    }

    #[test]
    fn help_displays() {
        sandbox()
            .cmd()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("offline application-shell cache"));
    }

    #[test]
    fn version_displays() {
        sandbox()
            .cmd()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("shellcache"));
    }

    #[test]
    fn config_path_is_the_given_file() {
        let sandbox = sandbox();
        sandbox
            .cmd()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        sandbox()
            .cmd()
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[origin]"))
            .stdout(predicate::str::contains("versys.example"));
    }

    #[test]
    fn config_set_unknown_key_fails() {
        sandbox()
            .cmd()
            .args(["config", "set", "vm.name", "x"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown configuration key"))
            .stderr(predicate::str::contains("cache.generation"));
    }

    #[test]
    fn config_set_persists() {
        let sandbox = sandbox();
        sandbox
            .cmd()
            .args(["config", "set", "cache.generation", "v5"])
            .assert()
            .success();

        let content = std::fs::read_to_string(&sandbox.config).unwrap();
        assert!(content.contains("generation = \"v5\""));
    }

    #[test]
    fn generations_empty() {
        sandbox()
            .cmd()
            .args(["generations", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[]"));
    }

    #[test]
    fn status_without_active_generation() {
        sandbox()
            .cmd()
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("Active"))
            .stdout(predicate::str::contains("none"));
    }

    #[test]
    fn check_third_party_storage_bypasses() {
        sandbox()
            .cmd()
            .args([
                "check",
                "https://firebasestorage.googleapis.com/v0/b/versys/o/logo.png",
            ])
            .assert()
            .success()
            .stdout(predicate::str::starts_with("bypass (third-party-storage)"));
    }

    #[test]
    fn check_dev_sources_bypass() {
        sandbox()
            .cmd()
            .args(["check", "http://localhost:5173/src/main.tsx"])
            .assert()
            .success()
            .stdout(predicate::str::starts_with("bypass (dev-source-paths)"));

        sandbox()
            .cmd()
            .args(["check", "https://versys.example/assets/chunk.ts"])
            .assert()
            .success()
            .stdout(predicate::str::starts_with("bypass (dev-source-extensions)"));
    }

    #[test]
    fn check_cache_busted_module_bypasses() {
        sandbox()
            .cmd()
            .args(["check", "https://versys.example/assets/app.js?v=42"])
            .assert()
            .success()
            .stdout(predicate::str::starts_with("bypass (cache-busted-modules)"));
    }

    #[test]
    fn check_non_get_bypasses() {
        sandbox()
            .cmd()
            .args(["check", "-X", "post", "https://versys.example/index.html"])
            .assert()
            .success()
            .stdout(predicate::str::starts_with("bypass (non-get)"));
    }

    #[test]
    fn check_shell_asset_is_intercepted() {
        sandbox()
            .cmd()
            .args(["check", "https://versys.example/index.html#top"])
            .assert()
            .success()
            .stdout(predicate::str::starts_with("intercept"))
            .stdout(predicate::str::contains(
                "key: https://versys.example/index.html\n",
            ));
    }

    #[test]
    fn check_rejects_relative_url() {
        sandbox()
            .cmd()
            .args(["check", "/index.html"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid URL"));
    }

    #[test]
    fn activate_unknown_generation_fails() {
        sandbox()
            .cmd()
            .args(["activate", "--generation", "v9"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Generation v9 is not installed"))
            .stderr(predicate::str::contains("shellcache install"));
    }

    #[test]
    fn clear_without_generations() {
        sandbox()
            .cmd()
            .args(["clear", "--yes"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No generations stored"));
    }
}

mod lifecycle_tests {
    use super::common::{Origin, Sandbox};
    use predicates::prelude::*;

    #[test]
    fn install_activate_and_serve_from_cache() {
        let origin = Origin::start();
        let sandbox = Sandbox::new(&origin.base, "v2");

        sandbox
            .cmd()
            .arg("install")
            .assert()
            .success()
            .stdout(predicate::str::contains("Installed generation v2"));
        sandbox.cmd().arg("activate").assert().success();

        let before = origin.hits();
        sandbox
            .cmd()
            .args(["fetch", "-i", &format!("{}app.css", origin.base)])
            .assert()
            .success()
            .stdout(predicate::str::contains("HTTP 200"))
            .stdout(predicate::str::contains("x-shellcache-source: cache"))
            .stdout(predicate::str::ends_with("body{color:teal}"))
            .stderr(predicate::str::contains("200 cache"));
        assert_eq!(origin.hits(), before);
    }

    #[test]
    fn activation_evicts_previous_generation() {
        let origin = Origin::start();
        let sandbox = Sandbox::new(&origin.base, "v2");

        sandbox.cmd().arg("install").assert().success();
        sandbox.cmd().arg("activate").assert().success();
        sandbox
            .cmd()
            .args(["install", "--generation", "v3"])
            .assert()
            .success();

        sandbox
            .cmd()
            .args(["generations", "--format", "plain"])
            .assert()
            .success()
            .stdout("v2\nv3\n");

        sandbox
            .cmd()
            .args(["activate", "--generation", "v3"])
            .assert()
            .success()
            .stdout(predicate::str::contains("1 evicted"));

        sandbox
            .cmd()
            .args(["generations", "--format", "plain"])
            .assert()
            .success()
            .stdout("v3\n");

        let audit = std::fs::read_to_string(
            sandbox.home().join("data").join("shellcache").join("audit.log"),
        )
        .unwrap();
        assert!(audit.contains("\"generation.installed\""));
        assert!(audit.contains("\"generation.activated\""));
    }

    #[test]
    fn missing_manifest_entry_fails_install_and_stores_nothing() {
        let origin = Origin::start();
        let sandbox = Sandbox::new(&origin.base, "v2");
        let manifest = sandbox.home().join("manifest.json");
        std::fs::write(&manifest, r#"["/", "/missing.js"]"#).unwrap();

        sandbox
            .cmd()
            .arg("install")
            .arg("--manifest")
            .arg(&manifest)
            .assert()
            .failure()
            .stderr(predicate::str::contains("missing.js"))
            .stderr(predicate::str::contains("404"));

        sandbox
            .cmd()
            .args(["generations", "--format", "plain"])
            .assert()
            .success()
            .stdout("");
    }

    #[test]
    fn post_bypasses_cache_and_reaches_origin() {
        let origin = Origin::start();
        let sandbox = Sandbox::new(&origin.base, "v2");
        sandbox.cmd().arg("install").assert().success();
        sandbox.cmd().arg("activate").assert().success();

        let before = origin.hits();
        sandbox
            .cmd()
            .args([
                "fetch",
                "-i",
                "-X",
                "POST",
                "-d",
                "qty=2",
                &format!("{}api/orders", origin.base),
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("x-shellcache-source: bypass (non-get)"))
            .stdout(predicate::str::ends_with("POST qty=2"));
        assert_eq!(origin.hits(), before + 1);
    }

    #[test]
    fn miss_falls_back_to_origin() {
        let origin = Origin::start();
        let sandbox = Sandbox::new(&origin.base, "v2");
        sandbox.cmd().arg("install").assert().success();
        sandbox.cmd().arg("activate").assert().success();

        sandbox
            .cmd()
            .args(["fetch", "-i", &format!("{}api/orders", origin.base)])
            .assert()
            .success()
            .stdout(predicate::str::contains("x-shellcache-source: network"))
            .stdout(predicate::str::ends_with("GET "));
    }

    #[test]
    fn fetch_before_activation_passes_through() {
        let origin = Origin::start();
        let sandbox = Sandbox::new(&origin.base, "v2");
        sandbox.cmd().arg("install").assert().success();

        sandbox
            .cmd()
            .args(["fetch", "-i", &origin.base])
            .assert()
            .success()
            .stdout(predicate::str::contains("x-shellcache-source: inactive"));
    }

    #[test]
    fn clear_removes_all_generations() {
        let origin = Origin::start();
        let sandbox = Sandbox::new(&origin.base, "v2");
        sandbox.cmd().arg("install").assert().success();

        sandbox
            .cmd()
            .args(["clear", "--yes"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Removed 1 generation(s)"));
        sandbox
            .cmd()
            .args(["generations", "--format", "plain"])
            .assert()
            .success()
            .stdout("");
    }
}
