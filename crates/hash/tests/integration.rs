//! Integration tests for content hashing

#[cfg(test)]
mod tests {
    use kiln_hash::Hash;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_copy_hash_matches_file_hash() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("artifact.conda");
        tokio::fs::write(&src, b"payload bytes").await.unwrap();

        let reader = tokio::fs::File::open(&src).await.unwrap();
        let dst = dir.path().join("copy.conda");
        let writer = tokio::fs::File::create(&dst).await.unwrap();
        let (copied, bytes) = Hash::hash_and_copy(reader, writer).await.unwrap();

        assert_eq!(bytes, 13);
        assert_eq!(copied, Hash::hash_file(&dst).await.unwrap());
        assert_eq!(copied, Hash::hash_file(&src).await.unwrap());
    }

    #[test]
    fn test_hex_round_trip() {
        let hash = Hash::from_parts(["smokey", "0.1.0", "recipe"]);
        assert_eq!(Hash::from_hex(&hash.to_hex()).unwrap(), hash);
    }
}
