//! Integration tests for trellis-shell

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn trellis() -> Command {
        cargo_bin_cmd!("trellis-shell")
    }

    /// Config file with the journal off and the origin at `origin`
    fn write_config(dir: &Path, origin: &str) -> std::path::PathBuf {
        let config_path = dir.join("config.toml");
        fs::write(
            &config_path,
            format!(
                "[general]\njournal = false\n\n[network]\norigin = \"{}\"\n",
                origin
            ),
        )
        .unwrap();
        config_path
    }

    #[test]
    fn help_displays() {
        trellis()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("offline precache worker"));
    }

    #[test]
    fn version_displays() {
        trellis()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("trellis-shell"));
    }

    #[test]
    fn config_path_honours_flag() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("custom.toml");
        trellis()
            .args(["config", "path", "--config"])
            .arg(&config)
            .assert()
            .success()
            .stdout(predicate::str::contains("custom.toml"));
    }

    #[test]
    fn config_show() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path(), "http://localhost:9999");
        trellis()
            .args(["config", "show", "--config"])
            .arg(&config)
            .assert()
            .success()
            .stdout(predicate::str::contains("[worker]"))
            .stdout(predicate::str::contains("http://localhost:9999"));
    }

    #[test]
    fn invalid_config_is_reported() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("config.toml");
        fs::write(&config, "[worker\n").unwrap();
        trellis()
            .args(["config", "show", "--config"])
            .arg(&config)
            .assert()
            .failure()
            .stderr(predicate::str::contains("Error:"));
    }

    #[test]
    fn cache_list_empty() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path(), "http://localhost:9999");
        trellis()
            .args(["cache", "list", "--config"])
            .arg(&config)
            .arg("--cache-dir")
            .arg(dir.path().join("cache"))
            .assert()
            .success()
            .stdout(predicate::str::contains("No cached entries"));
    }

    #[test]
    fn manifest_generation() {
        let dist = TempDir::new().unwrap();
        fs::write(dist.path().join("index.html"), "<html></html>").unwrap();
        fs::write(dist.path().join("app.4c1d9e2f.wasm"), "\0asm").unwrap();
        fs::write(dist.path().join("app.js.map"), "{}").unwrap();

        let output = trellis()
            .arg("manifest")
            .arg(dist.path())
            .output()
            .unwrap();
        assert!(output.status.success());

        let manifest: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        let entries = manifest.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["url"], "/app.4c1d9e2f.wasm");
        assert!(entries[0]["revision"].is_null());
        assert_eq!(entries[1]["url"], "/index.html");
        assert_eq!(entries[1]["revision"].as_str().unwrap().len(), 12);
    }

    #[test]
    fn manifest_missing_dist_fails() {
        trellis()
            .args(["manifest", "/nonexistent/dist/dir"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Error:"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn precache_then_fetch_from_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/app.wasm"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"\0asm".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path(), &server.uri());
        let cache_dir = dir.path().join("cache");
        let manifest = dir.path().join("precache.json");
        fs::write(&manifest, r#"[{"url": "/app.wasm", "revision": "abc"}]"#).unwrap();

        trellis()
            .arg("precache")
            .arg(&manifest)
            .arg("--config")
            .arg(&config)
            .arg("--cache-dir")
            .arg(&cache_dir)
            .assert()
            .success()
            .stdout(predicate::str::contains("1 entr(ies) cached"));

        trellis()
            .args(["cache", "list", "--format", "plain", "--config"])
            .arg(&config)
            .arg("--cache-dir")
            .arg(&cache_dir)
            .assert()
            .success()
            .stdout(predicate::str::contains("/app.wasm"));

        trellis()
            .args(["fetch", "/app.wasm", "--manifest"])
            .arg(&manifest)
            .arg("--config")
            .arg(&config)
            .arg("--cache-dir")
            .arg(&cache_dir)
            .assert()
            .success()
            .stdout(predicate::str::contains("Served from: cache"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn precache_failure_exits_nonzero() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/app.wasm"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path(), &server.uri());
        let manifest = dir.path().join("precache.json");
        fs::write(&manifest, r#"["/app.wasm"]"#).unwrap();

        trellis()
            .arg("precache")
            .arg(&manifest)
            .arg("--config")
            .arg(&config)
            .arg("--cache-dir")
            .arg(dir.path().join("cache"))
            .assert()
            .failure()
            .stderr(predicate::str::contains("Install failed"));
    }
}

mod lifecycle_tests {
    use std::sync::Arc;
    use tempfile::TempDir;
    use trellis_shell::config::schema::NetworkConfig;
    use trellis_shell::config::Config;
    use trellis_shell::bootstrap::{
        BootstrapLoader, InProcessContainer, PageLoad, RegistrationOutcome,
        ServiceWorkerContainer,
    };
    use trellis_shell::manifest::{PrecacheEntry, PrecacheManifest};
    use trellis_shell::network::{HttpNetwork, Request};
    use trellis_shell::store::{scope_namespace, CacheStore, DiskCacheStorage, DiskCacheStore};
    use trellis_shell::worker::{Registration, ServedFrom, WorkerController};
    use trellis_shell::{ShellError, ShellResult};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Site {
        server: MockServer,
        config: Config,
        network: Arc<HttpNetwork>,
    }

    impl Site {
        async fn start() -> Self {
            let server = MockServer::start().await;
            let mut config = Config::default();
            config.network.origin = server.uri();
            let network = Arc::new(HttpNetwork::new(&config.network).unwrap());
            Self {
                server,
                config,
                network,
            }
        }

        async fn serve(&self, url: &str, body: &str, times: u64) {
            Mock::given(method("GET"))
                .and(path(url))
                .respond_with(ResponseTemplate::new(200).set_body_string(body))
                .expect(times)
                .mount(&self.server)
                .await;
        }

        fn controller(&self, manifest: &str, store: Arc<DiskCacheStore>) -> WorkerController {
            WorkerController::from_config(
                PrecacheManifest::from_json(manifest).unwrap(),
                store,
                self.network.clone(),
                &self.config,
            )
            .unwrap()
        }
    }

    fn key(url: &str, revision: Option<&str>) -> String {
        PrecacheEntry::new(url, revision).cache_key()
    }

    async fn store(dir: &TempDir) -> Arc<DiskCacheStore> {
        Arc::new(DiskCacheStore::open(dir.path(), "precache").await.unwrap())
    }

    #[tokio::test]
    async fn precached_asset_is_served_without_network() {
        let site = Site::start().await;
        site.serve("/app.wasm", "wasm-bytes", 1).await;
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;
        let registration = Registration::new("/", site.network.clone());

        registration
            .install(site.controller(r#"[{"url": "/app.wasm", "revision": "abc"}]"#, store.clone()))
            .await
            .unwrap();
        let entry = store.get(&key("/app.wasm", Some("abc"))).await.unwrap().unwrap();
        assert_eq!(entry.stored_revision.as_deref(), Some("abc"));
        assert_eq!(store.keys().await.unwrap(), vec![key("/app.wasm", Some("abc"))]);

        registration.activate().await.unwrap();
        assert_eq!(store.keys().await.unwrap(), vec![key("/app.wasm", Some("abc"))]);

        let served = registration.fetch(Request::get("/app.wasm")).await.unwrap();
        assert_eq!(served.source, ServedFrom::Cache);
        assert_eq!(served.response.body, b"wasm-bytes");
    }

    #[tokio::test]
    async fn shrinking_manifest_drops_removed_assets() {
        let site = Site::start().await;
        site.serve("/a", "a", 1).await;
        site.serve("/b", "b", 1).await;
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;
        let registration = Registration::new("/", site.network.clone());

        registration
            .update(site.controller(r#"[{"url": "/a"}, {"url": "/b"}]"#, store.clone()))
            .await
            .unwrap();
        registration
            .update(site.controller(r#"[{"url": "/b"}]"#, store.clone()))
            .await
            .unwrap();

        assert!(store.get("/a").await.unwrap().is_none());
        assert!(store.get("/b").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn network_error_during_install_keeps_previous_generation() {
        let site = Site::start().await;
        site.serve("/app.wasm", "v1", 1).await;
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;
        let registration = Registration::new("/", site.network.clone());
        registration
            .update(site.controller(r#"[{"url": "/app.wasm", "revision": "1"}]"#, store.clone()))
            .await
            .unwrap();
        let active = registration.active().await.unwrap().id();

        let unreachable = Arc::new(
            HttpNetwork::new(&NetworkConfig {
                origin: "http://127.0.0.1:9".to_string(),
                timeout_secs: 2,
                ..NetworkConfig::default()
            })
            .unwrap(),
        );
        let broken = WorkerController::from_config(
            PrecacheManifest::from_json(
                r#"[{"url": "/app.wasm", "revision": "2"}, {"url": "/extra.js", "revision": "2"}]"#,
            )
            .unwrap(),
            store.clone(),
            unreachable,
            &site.config,
        )
        .unwrap();

        let err = registration.install(broken).await.unwrap_err();

        assert!(matches!(err, ShellError::InstallFailed { .. }));
        assert!(registration.waiting().await.is_none());
        assert_eq!(registration.active().await.unwrap().id(), active);
        assert_eq!(store.keys().await.unwrap(), vec![key("/app.wasm", Some("1"))]);
        let entry = store.get(&key("/app.wasm", Some("1"))).await.unwrap().unwrap();
        assert_eq!(entry.stored_revision.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn unlisted_request_passes_through_verbatim() {
        let site = Site::start().await;
        site.serve("/app.wasm", "wasm", 1).await;
        Mock::given(method("GET"))
            .and(path("/api/data"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(r#"{"items":[1,2,3]}"#, "application/json"),
            )
            .expect(1)
            .mount(&site.server)
            .await;
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;
        let registration = Registration::new("/", site.network.clone());
        registration
            .update(site.controller(r#"["/app.wasm"]"#, store.clone()))
            .await
            .unwrap();

        let served = registration.fetch(Request::get("/api/data")).await.unwrap();

        assert_eq!(served.source, ServedFrom::Network);
        assert_eq!(served.response.body, br#"{"items":[1,2,3]}"#);
        assert_eq!(served.response.header("content-type"), Some("application/json"));
        assert!(store.get("/api/data").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reinstall_after_restart_reuses_disk_cache() {
        let site = Site::start().await;
        site.serve("/app.wasm", "wasm", 1).await;
        let dir = TempDir::new().unwrap();
        let manifest = r#"[{"url": "/app.wasm", "revision": "abc"}]"#;

        {
            let registration = Registration::new("/", site.network.clone());
            registration
                .update(site.controller(manifest, store(&dir).await))
                .await
                .unwrap();
        }

        let reopened = store(&dir).await;
        let registration = Registration::new("/", site.network.clone());
        registration
            .update(site.controller(manifest, reopened.clone()))
            .await
            .unwrap();

        assert_eq!(reopened.keys().await.unwrap(), vec![key("/app.wasm", Some("abc"))]);
    }

    #[tokio::test]
    async fn pass_through_keeps_repeated_headers() {
        let site = Site::start().await;
        site.serve("/app.wasm", "wasm", 1).await;
        Mock::given(method("GET"))
            .and(path("/api/session"))
            .respond_with(
                ResponseTemplate::new(200)
                    .append_header("set-cookie", "session=abc; Path=/")
                    .append_header("set-cookie", "theme=dark; Path=/"),
            )
            .expect(1)
            .mount(&site.server)
            .await;
        let dir = TempDir::new().unwrap();
        let registration = Registration::new("/", site.network.clone());
        registration
            .update(site.controller(r#"["/app.wasm"]"#, store(&dir).await))
            .await
            .unwrap();

        let served = registration.fetch(Request::get("/api/session")).await.unwrap();

        assert_eq!(served.source, ServedFrom::Network);
        assert_eq!(
            served.response.header_all("set-cookie").collect::<Vec<_>>(),
            vec!["session=abc; Path=/", "theme=dark; Path=/"]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn page_boot_registers_worker_after_load() {
        let site = Site::start().await;
        Mock::given(method("GET"))
            .and(path("/service_worker.js"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"[{"url": "/app.wasm", "revision": "abc"}, "/index.0123abcd.js"]"#,
                "application/json",
            ))
            .expect(1)
            .mount(&site.server)
            .await;
        site.serve("/app.wasm", "wasm", 1).await;
        site.serve("/index.0123abcd.js", "run()", 1).await;

        let dir = TempDir::new().unwrap();
        let container = Arc::new(
            InProcessContainer::new(
                site.network.clone(),
                Arc::new(DiskCacheStorage::new(dir.path())),
                site.config.clone(),
            )
            .unwrap(),
        );
        let loader = BootstrapLoader::new(
            site.config.bootstrap.clone(),
            Some(container.clone() as Arc<dyn ServiceWorkerContainer>),
        );

        let (trigger, load) = PageLoad::pending();
        let mut started = false;
        let mut handle = loader.boot(load, &mut || -> ShellResult<()> {
            started = true;
            Ok(())
        });
        assert!(started);
        assert!(handle.app_result.is_ok());

        trigger.fire();
        match handle.registration().await {
            RegistrationOutcome::Registered(info) => {
                assert_eq!(info.scope, "/");
                assert!(info.updated);
            }
            other => panic!("unexpected outcome: {}", other),
        }

        let served = container.fetch(Request::get("/app.wasm")).await.unwrap();
        assert_eq!(served.source, ServedFrom::Cache);
        assert_eq!(served.response.body, b"wasm");

        let namespace = scope_namespace(&site.config.worker.cache_name, "/");
        let store = DiskCacheStore::open(dir.path(), &namespace).await.unwrap();
        assert_eq!(
            store.keys().await.unwrap(),
            vec![key("/app.wasm", Some("abc")), "/index.0123abcd.js".to_string()]
        );
    }
}
