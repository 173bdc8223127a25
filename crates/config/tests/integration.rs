//! Integration tests for config

#[cfg(test)]
mod tests {
    use kiln_config::*;
    use kiln_types::{ColorChoice, OutputFormat};
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to ensure env var tests don't run concurrently
    static ENV_TEST_MUTEX: Mutex<()> = Mutex::new(());

    const ENV_VARS: [&str; 6] = [
        "KILN_COLOR",
        "KILN_BUILD_JOBS",
        "KILN_PARALLEL_FETCHES",
        "KILN_FETCH_RETRIES",
        "KILN_CACHE_DIR",
        "KILN_CHANNELS",
    ];

    fn clear_env() {
        for var in ENV_VARS {
            std::env::remove_var(var);
        }
    }

    #[tokio::test]
    async fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[general]
default_output = "plain"
color = "never"

[build]
jobs = 4
compression_level = 19

[install]
parallel_fetches = 8
fetch_retries = 1

[paths]
cache_dir = "/tmp/kiln-cache"
channels = ["/srv/channel"]
        "#
        )
        .unwrap();

        let config = Config::load_from_file(temp_file.path()).await.unwrap();
        assert_eq!(config.general.default_output, OutputFormat::Plain);
        assert_eq!(config.general.color, ColorChoice::Never);
        assert_eq!(config.build_jobs(), 4);
        assert_eq!(config.build.compression_level, 19);
        assert_eq!(config.install.parallel_fetches, 8);
        assert_eq!(config.install.retry_delay_ms, 200);
        assert_eq!(config.pkgs_dir(), PathBuf::from("/tmp/kiln-cache/pkgs"));
        assert_eq!(config.paths.channels, vec![PathBuf::from("/srv/channel")]);
    }

    #[tokio::test]
    async fn test_out_of_range_level_rejected() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[build]\ncompression_level = 40").unwrap();

        assert!(Config::load_from_file(temp_file.path()).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_explicit_file_is_error() {
        let result = Config::load_or_default(Some(std::path::Path::new("/no/such/kiln.toml"))).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_merge_env() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();
        clear_env();

        std::env::set_var("KILN_COLOR", "always");
        std::env::set_var("KILN_PARALLEL_FETCHES", "2");
        std::env::set_var("KILN_CACHE_DIR", "/var/cache/kiln");

        let mut config = Config::default();
        config.merge_env().unwrap();

        assert_eq!(config.general.color, ColorChoice::Always);
        assert_eq!(config.install.parallel_fetches, 2);
        assert_eq!(config.cache_dir(), PathBuf::from("/var/cache/kiln"));

        clear_env();
    }

    #[test]
    fn test_merge_env_invalid_value() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();
        clear_env();

        std::env::set_var("KILN_BUILD_JOBS", "lots");
        let mut config = Config::default();
        assert!(config.merge_env().is_err());

        clear_env();
    }

    #[test]
    fn test_calculate_build_jobs() {
        assert_eq!(calculate_build_jobs(3), 3);
        assert!(calculate_build_jobs(0) >= 1);
    }
}
