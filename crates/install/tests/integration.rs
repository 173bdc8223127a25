//! Integration tests for install crate

#[cfg(test)]
mod tests {
    use kiln_builder::{create_package, index_channel};
    use kiln_errors::{Error, InstallError, ResolveError};
    use kiln_events::{AppEvent, EventReceiver, InstallEvent};
    use kiln_install::*;
    use kiln_resolver::ChannelResolver;
    use kiln_types::{BuildArtifact, PackageIndex, Platform, Version};
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use tempfile::{tempdir, TempDir};
    use tokio_util::sync::CancellationToken;

    struct Fixture {
        work: TempDir,
        channel: TempDir,
        env: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                work: tempdir().unwrap(),
                channel: tempdir().unwrap(),
                env: tempdir().unwrap(),
            }
        }

        fn env_root(&self) -> &Path {
            self.env.path()
        }

        fn installer(&self) -> Installer {
            let config = InstallConfig::new(self.work.path().join("pkgs"));
            let resolver = ChannelResolver::new(vec![self.channel.path().to_path_buf()]);
            let fetcher = ChannelFetcher::new(config.pkgs_dir.clone(), config.retry.clone());
            Installer::new(config, Arc::new(resolver), Arc::new(fetcher))
        }

        fn installer_with_events(&self) -> (Installer, EventReceiver) {
            let (tx, rx) = kiln_events::channel();
            (self.installer().with_event_sender(tx), rx)
        }

        /// Package `files` into an artifact under `dir`
        async fn artifact(
            &self,
            dir: &Path,
            name: &str,
            version: &str,
            depends: &[&str],
            files: &[(&str, &str)],
        ) -> BuildArtifact {
            let payload = self.work.path().join(format!("payload-{name}-{version}"));
            for (path, content) in files {
                let dest = payload.join(path);
                std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
                std::fs::write(dest, content).unwrap();
            }
            let index = PackageIndex {
                name: name.into(),
                version: Version::parse(version).unwrap(),
                build: "h0000000_0".into(),
                build_number: 0,
                platform: Platform::NoArch,
                depends: depends.iter().map(ToString::to_string).collect(),
            };
            create_package(&payload, &index, dir, 3).await.unwrap()
        }

        async fn local(
            &self,
            name: &str,
            version: &str,
            depends: &[&str],
            files: &[(&str, &str)],
        ) -> PathBuf {
            let out = self.work.path().join("out");
            std::fs::create_dir_all(&out).unwrap();
            self.artifact(&out, name, version, depends, files)
                .await
                .path
        }

        async fn publish(&self, name: &str, version: &str, depends: &[&str], files: &[(&str, &str)]) {
            self.artifact(self.channel.path(), name, version, depends, files)
                .await;
            index_channel(self.channel.path()).await.unwrap();
        }

        async fn records(&self) -> Vec<kiln_types::InstalledRecord> {
            MetadataStore::new(self.env_root()).load_all().await.unwrap()
        }
    }

    fn install_events(rx: &mut EventReceiver) -> Vec<InstallEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let AppEvent::Install(event) = event {
                events.push(event);
            }
        }
        events
    }

    #[tokio::test]
    async fn test_install_writes_files_and_record() {
        let fx = Fixture::new();
        let artifact = fx
            .local("smokey", "0.1.0", &[], &[("bin/smokey", "#!/bin/sh\necho hi\n")])
            .await;

        let report = fx
            .installer()
            .install(&InstallRequest::from_artifacts(vec![artifact]), fx.env_root())
            .await
            .unwrap();

        assert_eq!(report.installed.len(), 1);
        assert!(!report.is_noop());
        assert!(fx.env_root().join("bin/smokey").is_file());

        let records = fx.records().await;
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.name, "smokey");
        assert_eq!(record.version, Version::new(0, 1, 0));
        assert_eq!(record.install_path, fx.env_root());
        assert_eq!(record.files, vec!["bin/smokey"]);
        assert!(fx
            .env_root()
            .join(META_DIR)
            .join("smokey-0.1.0-h0000000_0.json")
            .is_file());
    }

    #[tokio::test]
    async fn test_second_install_is_noop() {
        let fx = Fixture::new();
        let artifact = fx
            .local("smokey", "0.1.0", &[], &[("bin/smokey", "echo hi\n")])
            .await;
        let request = InstallRequest::from_artifacts(vec![artifact]);

        fx.installer().install(&request, fx.env_root()).await.unwrap();
        let record_path = fx
            .env_root()
            .join(META_DIR)
            .join("smokey-0.1.0-h0000000_0.json");
        let before = std::fs::read(&record_path).unwrap();

        let (installer, mut rx) = fx.installer_with_events();
        let report = installer.install(&request, fx.env_root()).await.unwrap();

        assert!(report.is_noop());
        assert_eq!(report.records.len(), 1);
        assert_eq!(std::fs::read(&record_path).unwrap(), before);
        assert!(install_events(&mut rx)
            .iter()
            .any(|e| matches!(e, InstallEvent::UpToDate { packages: 1, .. })));
    }

    #[tokio::test]
    async fn test_rebuilt_artifact_replaces_same_build() {
        let fx = Fixture::new();
        let first = fx
            .local("smokey", "0.1.0", &[], &[("bin/smokey", "echo v1\n")])
            .await;
        fx.installer()
            .install(&InstallRequest::from_artifacts(vec![first]), fx.env_root())
            .await
            .unwrap();

        // Same name, version and build string, different payload
        let rebuilt = fx
            .local("smokey", "0.1.0", &[], &[("bin/smokey", "echo v2\n")])
            .await;
        let report = fx
            .installer()
            .install(&InstallRequest::from_artifacts(vec![rebuilt.clone()]), fx.env_root())
            .await
            .unwrap();

        assert!(!report.is_noop());
        assert_eq!(report.replaced.len(), 1);
        assert_eq!(
            std::fs::read_to_string(fx.env_root().join("bin/smokey")).unwrap(),
            "echo v2\n"
        );
        let records = fx.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].hash,
            kiln_hash::Hash::hash_file(&rebuilt).await.unwrap().to_hex()
        );
    }

    #[tokio::test]
    async fn test_untracked_file_is_not_overwritten() {
        let fx = Fixture::new();
        std::fs::create_dir_all(fx.env_root().join("bin")).unwrap();
        std::fs::write(fx.env_root().join("bin/smokey"), "mine").unwrap();
        let artifact = fx
            .local("smokey", "0.1.0", &[], &[("bin/smokey", "echo hi\n")])
            .await;

        let err = fx
            .installer()
            .install(&InstallRequest::from_artifacts(vec![artifact]), fx.env_root())
            .await
            .unwrap_err();

        match err {
            Error::Install(InstallError::UntrackedFile { path, package }) => {
                assert_eq!(path, "bin/smokey");
                assert_eq!(package, "smokey-0.1.0");
            }
            other => panic!("expected untracked file error, got {other:?}"),
        }
        assert_eq!(
            std::fs::read_to_string(fx.env_root().join("bin/smokey")).unwrap(),
            "mine"
        );
        assert!(fx.records().await.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_install_changes_nothing() {
        let fx = Fixture::new();
        let artifact = fx
            .local("smokey", "0.1.0", &[], &[("bin/smokey", "echo hi\n")])
            .await;
        let token = CancellationToken::new();
        token.cancel();

        let err = fx
            .installer()
            .with_cancellation(token)
            .install(&InstallRequest::from_artifacts(vec![artifact]), fx.env_root())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled));
        assert!(!fx.env_root().join("bin/smokey").exists());
        assert!(!fx.env_root().join(META_DIR).exists());
    }

    #[tokio::test]
    async fn test_runtime_dependencies_come_from_channel() {
        let fx = Fixture::new();
        fx.publish(
            "boltons",
            "24.0.0",
            &[],
            &[("site-packages/boltons/__init__.py", "")],
        )
        .await;
        let app = fx
            .local(
                "flask-hello-world",
                "0.1.0",
                &["boltons>=24"],
                &[("site-packages/flask-hello-world/app.py", "print('hi')\n")],
            )
            .await;

        let (installer, mut rx) = fx.installer_with_events();
        let report = installer
            .install(&InstallRequest::from_artifacts(vec![app]), fx.env_root())
            .await
            .unwrap();

        let names: Vec<&str> = report.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["boltons", "flask-hello-world"]);
        assert_eq!(fx.records().await.len(), 2);
        assert!(fx
            .env_root()
            .join("site-packages/boltons/__init__.py")
            .is_file());
        assert!(fx
            .work
            .path()
            .join("pkgs/boltons-24.0.0-h0000000_0.conda")
            .is_file());

        let events = install_events(&mut rx);
        assert!(events
            .iter()
            .any(|e| matches!(e, InstallEvent::FetchCompleted { cached: false, .. })));
        assert!(events
            .iter()
            .any(|e| matches!(e, InstallEvent::Completed { installed: 2, .. })));
    }

    #[tokio::test]
    async fn test_missing_dependency_installs_nothing() {
        let fx = Fixture::new();
        let app = fx
            .local("app", "1.0.0", &["nonexistent-pkg"], &[("bin/app", "x")])
            .await;

        let err = fx
            .installer()
            .install(&InstallRequest::from_artifacts(vec![app]), fx.env_root())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Resolve(ResolveError::PackageNotFound { .. })
        ));
        assert!(fx.records().await.is_empty());
        assert!(!fx.env_root().join("bin/app").exists());
    }

    #[tokio::test]
    async fn test_conflicting_files_leave_env_untouched() {
        let fx = Fixture::new();
        let a = fx.local("tool-a", "1.0.0", &[], &[("bin/tool", "a")]).await;
        let b = fx.local("tool-b", "1.0.0", &[], &[("bin/tool", "b")]).await;

        let (installer, mut rx) = fx.installer_with_events();
        let err = installer
            .install(&InstallRequest::from_artifacts(vec![a, b]), fx.env_root())
            .await
            .unwrap_err();

        match err {
            Error::Install(InstallError::Conflict {
                path,
                first,
                second,
            }) => {
                assert_eq!(path, "bin/tool");
                assert_eq!(first, "tool-a-1.0.0");
                assert_eq!(second, "tool-b-1.0.0");
            }
            other => panic!("expected conflict, got {other:?}"),
        }
        assert!(fx.records().await.is_empty());
        assert!(!fx.env_root().join("bin").exists());
        assert!(install_events(&mut rx)
            .iter()
            .any(|e| matches!(e, InstallEvent::ConflictDetected { .. })));
    }

    #[tokio::test]
    async fn test_conflict_with_installed_package() {
        let fx = Fixture::new();
        let a = fx.local("tool-a", "1.0.0", &[], &[("bin/tool", "a")]).await;
        fx.installer()
            .install(&InstallRequest::from_artifacts(vec![a]), fx.env_root())
            .await
            .unwrap();

        let b = fx.local("tool-b", "1.0.0", &[], &[("bin/tool", "b")]).await;
        let err = fx
            .installer()
            .install(&InstallRequest::from_artifacts(vec![b]), fx.env_root())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Install(InstallError::Conflict { .. })));
        assert_eq!(std::fs::read_to_string(fx.env_root().join("bin/tool")).unwrap(), "a");
        assert_eq!(fx.records().await.len(), 1);
    }

    #[tokio::test]
    async fn test_new_version_replaces_old() {
        let fx = Fixture::new();
        let v1 = fx
            .local("smokey", "0.1.0", &[], &[("share/smokey/v1.txt", "1")])
            .await;
        fx.installer()
            .install(&InstallRequest::from_artifacts(vec![v1]), fx.env_root())
            .await
            .unwrap();

        let v2 = fx
            .local("smokey", "0.2.0", &[], &[("share/smokey/v2.txt", "2")])
            .await;
        let report = fx
            .installer()
            .install(&InstallRequest::from_artifacts(vec![v2]), fx.env_root())
            .await
            .unwrap();

        assert_eq!(report.replaced.len(), 1);
        assert_eq!(report.replaced[0].version, Version::new(0, 1, 0));
        assert!(!fx.env_root().join("share/smokey/v1.txt").exists());
        assert!(fx.env_root().join("share/smokey/v2.txt").is_file());

        let records = fx.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].version, Version::new(0, 2, 0));
    }

    #[tokio::test]
    async fn test_failed_commit_rolls_back() {
        let fx = Fixture::new();
        let old = fx.local("data", "1.0.0", &[], &[("share/old.txt", "old")]).await;
        fx.installer()
            .install(&InstallRequest::from_artifacts(vec![old]), fx.env_root())
            .await
            .unwrap();

        // `share/data` is a file in one package and a directory in the other
        let new = fx.local("data", "2.0.0", &[], &[("share/data", "new")]).await;
        let clash = fx
            .local("extra", "1.0.0", &[], &[("share/data/x.txt", "x")])
            .await;

        let (installer, mut rx) = fx.installer_with_events();
        let err = installer
            .install(&InstallRequest::from_artifacts(vec![new, clash]), fx.env_root())
            .await
            .unwrap_err();

        assert!(!matches!(
            err,
            Error::Install(InstallError::RollbackFailed { .. })
        ));
        assert!(!fx.env_root().join("share/data").exists());
        assert_eq!(
            std::fs::read_to_string(fx.env_root().join("share/old.txt")).unwrap(),
            "old"
        );

        let records = fx.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].version, Version::new(1, 0, 0));
        assert!(install_events(&mut rx)
            .iter()
            .any(|e| matches!(e, InstallEvent::RolledBack { .. })));
    }

    #[tokio::test]
    async fn test_local_constraints_checked_against_each_other() {
        let fx = Fixture::new();
        let lib = fx.local("lib", "1.0.0", &[], &[("lib/lib.txt", "")]).await;
        let app = fx
            .local("app", "1.0.0", &["lib>=2.0"], &[("bin/app", "")])
            .await;

        let err = fx
            .installer()
            .install(&InstallRequest::from_artifacts(vec![lib, app]), fx.env_root())
            .await
            .unwrap_err();

        match err {
            Error::Resolve(resolve) => {
                assert_eq!(resolve.conflicting_packages(), ["app-1.0.0".to_string()]);
            }
            other => panic!("expected resolve error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_request() {
        let fx = Fixture::new();
        let err = fx
            .installer()
            .install(&InstallRequest::from_artifacts(vec![]), fx.env_root())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Install(InstallError::NothingToInstall)));
    }
}
