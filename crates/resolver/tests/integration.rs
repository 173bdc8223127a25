//! Integration tests for resolver crate

#[cfg(test)]
mod tests {
    use kiln_errors::{Error, ResolveError};
    use kiln_resolver::*;
    use kiln_types::{PackageSpec, Platform, Version};
    use std::path::Path;
    use tempfile::tempdir;

    async fn write_index(dir: &Path, json: &str) {
        tokio::fs::write(dir.join(CHANNEL_INDEX), json).await.unwrap();
    }

    fn spec(s: &str) -> PackageSpec {
        PackageSpec::parse(s).unwrap()
    }

    const WEB_CHANNEL: &str = r#"{
        "flask": {
            "2.3.0": {"build": "h1_0", "platform": "noarch", "file": "flask-2.3.0-h1_0.conda", "hash": "01",
                      "depends": ["werkzeug>=2.3", "jinja2"]},
            "3.0.0": {"build": "h1_0", "platform": "noarch", "file": "flask-3.0.0-h1_0.conda", "hash": "02",
                      "depends": ["werkzeug>=3.0", "jinja2"]}
        },
        "werkzeug": {
            "2.3.7": {"build": "h2_0", "platform": "noarch", "file": "werkzeug-2.3.7-h2_0.conda", "hash": "03"},
            "3.0.1": {"build": "h2_0", "platform": "noarch", "file": "werkzeug-3.0.1-h2_0.conda", "hash": "04"}
        },
        "jinja2": {
            "3.1.2": {"build": "h3_0", "platform": "noarch", "file": "jinja2-3.1.2-h3_0.conda", "hash": "05",
                      "depends": ["markupsafe"]}
        },
        "markupsafe": {
            "2.1.3": {"build": "h4_0", "platform": "linux-64", "file": "markupsafe-2.1.3-h4_0.conda", "hash": "06"}
        },
        "boltons": {
            "24.0.0": {"build": "h5_0", "platform": "noarch", "file": "boltons-24.0.0-h5_0.conda", "hash": "07"}
        }
    }"#;

    #[tokio::test]
    async fn test_resolves_closure_in_dependency_order() {
        let channel = tempdir().unwrap();
        write_index(channel.path(), WEB_CHANNEL).await;

        let resolver = ChannelResolver::new(vec![channel.path().to_path_buf()]);
        let request = ResolveRequest::new(Platform::Linux64)
            .require(spec("flask"), "app")
            .require(spec("boltons"), "app");
        let set = resolver.resolve(&request).await.unwrap();

        assert_eq!(set.len(), 5);
        let flask = set.get("flask").unwrap();
        assert_eq!(flask.id.version, Version::new(3, 0, 0));
        assert_eq!(flask.artifact, channel.path().join("flask-3.0.0-h1_0.conda"));
        assert_eq!(set.get("werkzeug").unwrap().id.version, Version::new(3, 0, 1));

        let names = set.names();
        let pos = |n: &str| names.iter().position(|x| x.starts_with(n)).unwrap();
        assert!(pos("markupsafe") < pos("jinja2"));
        assert!(pos("jinja2") < pos("flask"));
        assert!(pos("werkzeug") < pos("flask"));
    }

    #[tokio::test]
    async fn test_later_constraint_downgrades_earlier_pick() {
        let channel = tempdir().unwrap();
        write_index(channel.path(), WEB_CHANNEL).await;

        // werkzeug<3 only reconciles with flask 2.x
        let resolver = ChannelResolver::new(vec![channel.path().to_path_buf()]);
        let request = ResolveRequest::new(Platform::Linux64)
            .require(spec("flask<3"), "app")
            .require(spec("werkzeug<3"), "app");
        let set = resolver.resolve(&request).await.unwrap();

        assert_eq!(set.get("flask").unwrap().id.version, Version::new(2, 3, 0));
        assert_eq!(set.get("werkzeug").unwrap().id.version, Version::new(2, 3, 7));
    }

    #[tokio::test]
    async fn test_unsatisfiable_reports_conflicting_packages() {
        let channel = tempdir().unwrap();
        write_index(channel.path(), WEB_CHANNEL).await;

        let resolver = ChannelResolver::new(vec![channel.path().to_path_buf()]);
        let request = ResolveRequest::new(Platform::Linux64)
            .require(spec("flask>=3"), "app")
            .require(spec("werkzeug<3"), "legacy-plugin");
        let err = resolver.resolve(&request).await.unwrap_err();

        match err {
            Error::Resolve(resolve) => {
                assert!(matches!(
                    resolve,
                    ResolveError::Unsatisfiable { ref package, .. } if package == "werkzeug"
                ));
                let conflicting = resolve.conflicting_packages();
                assert!(conflicting.contains(&"legacy-plugin".to_string()));
                assert!(conflicting.contains(&"flask".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_package() {
        let channel = tempdir().unwrap();
        write_index(channel.path(), WEB_CHANNEL).await;

        let resolver = ChannelResolver::new(vec![channel.path().to_path_buf()]);
        let request = ResolveRequest::new(Platform::Linux64).require(spec("numpy"), "app");
        let err = resolver.resolve(&request).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Resolve(ResolveError::PackageNotFound { ref name }) if name == "numpy"
        ));
    }

    #[tokio::test]
    async fn test_platform_filtering() {
        let channel = tempdir().unwrap();
        write_index(channel.path(), WEB_CHANNEL).await;

        // markupsafe only exists for linux-64
        let resolver = ChannelResolver::new(vec![channel.path().to_path_buf()]);
        let request = ResolveRequest::new(Platform::OsxArm64).require(spec("jinja2"), "app");
        let err = resolver.resolve(&request).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Resolve(ResolveError::Unsatisfiable { .. })
        ));
    }

    #[tokio::test]
    async fn test_provided_names_are_skipped_and_first_channel_wins() {
        let primary = tempdir().unwrap();
        let secondary = tempdir().unwrap();
        write_index(
            primary.path(),
            r#"{"boltons": {"23.0.0": {"build": "hp_0", "platform": "noarch", "file": "p.conda", "hash": "aa"}}}"#,
        )
        .await;
        write_index(secondary.path(), WEB_CHANNEL).await;

        let resolver = ChannelResolver::new(vec![
            primary.path().to_path_buf(),
            secondary.path().to_path_buf(),
        ]);
        let request = ResolveRequest::new(Platform::NoArch)
            .require(spec("boltons"), "smokey")
            .require(spec("smokey"), "user")
            .provide("smokey");
        let set = resolver.resolve(&request).await.unwrap();

        assert_eq!(set.len(), 1);
        assert_eq!(set.packages[0].build, "hp_0");
    }

    #[tokio::test]
    async fn test_cycle_in_channel() {
        let channel = tempdir().unwrap();
        write_index(
            channel.path(),
            r#"{
                "a": {"1.0.0": {"build": "h_0", "platform": "noarch", "file": "a.conda", "hash": "00", "depends": ["b"]}},
                "b": {"1.0.0": {"build": "h_0", "platform": "noarch", "file": "b.conda", "hash": "00", "depends": ["a"]}}
            }"#,
        )
        .await;

        let resolver = ChannelResolver::new(vec![channel.path().to_path_buf()]);
        let request = ResolveRequest::new(Platform::NoArch).require(spec("a"), "app");
        let err = resolver.resolve(&request).await.unwrap_err();
        assert!(matches!(err, Error::Resolve(ResolveError::Cycle { .. })));
    }

    #[tokio::test]
    async fn test_empty_request_resolves_to_nothing() {
        let resolver = ChannelResolver::new(vec![]);
        let set = resolver
            .resolve(&ResolveRequest::new(Platform::NoArch))
            .await
            .unwrap();
        assert!(set.is_empty());
    }
}
