//! Integration tests for root crate

#[cfg(test)]
mod tests {
    use kiln_root::*;
    use tempfile::tempdir;
    use tokio::fs;

    async fn entry_names(dir: &std::path::Path) -> Vec<String> {
        let mut entries = fs::read_dir(dir).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_atomic_write_replaces_and_leaves_no_temp() {
        let temp = tempdir().unwrap();
        let target = temp.path().join("kiln.toml");

        atomic_write(&target, b"first").await.unwrap();
        atomic_write(&target, b"second").await.unwrap();

        assert_eq!(fs::read(&target).await.unwrap(), b"second");
        assert_eq!(entry_names(temp.path()).await, vec!["kiln.toml"]);
    }

    #[tokio::test]
    async fn test_atomic_write_missing_dir_fails_cleanly() {
        let temp = tempdir().unwrap();
        let target = temp.path().join("missing").join("record.json");

        assert!(atomic_write(&target, b"{}").await.is_err());
        assert!(!exists(&target).await);
    }

    #[tokio::test]
    async fn test_ensure_empty_dir() {
        let temp = tempdir().unwrap();
        let test_dir = temp.path().join("ensure_test");

        fs::create_dir(&test_dir).await.unwrap();
        fs::write(test_dir.join("file.txt"), b"content").await.unwrap();

        ensure_empty_dir(&test_dir).await.unwrap();
        assert!(is_dir(&test_dir).await);
        assert!(entry_names(&test_dir).await.is_empty());
    }

    #[tokio::test]
    async fn test_remove_missing_is_ok() {
        let temp = tempdir().unwrap();
        remove_file(&temp.path().join("nope")).await.unwrap();
        remove_dir_all(&temp.path().join("nope")).await.unwrap();
    }

    #[tokio::test]
    async fn test_move_and_prune() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("staging/lib/a.txt");
        fs::create_dir_all(src.parent().unwrap()).await.unwrap();
        fs::write(&src, b"a").await.unwrap();

        let dst = temp.path().join("a.txt");
        move_file(&src, &dst).await.unwrap();
        assert_eq!(fs::read(&dst).await.unwrap(), b"a");

        prune_empty_dirs(src.parent().unwrap(), temp.path()).await;
        assert!(!exists(&temp.path().join("staging")).await);
        assert!(exists(temp.path()).await);
    }
}
