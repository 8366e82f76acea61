fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use skydrive_protocol::{ErrorBody, ErrorDetail};

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    /// Deserializes a fixture into a Rust type, re-serializes it, and compares
    /// the JSON values (key-order independent).
    fn roundtrip_test<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));

        assert_eq!(
            fixture, reserialized,
            "roundtrip mismatch for {name}:\n  server: {fixture}\n  client: {reserialized}"
        );
        parsed
    }

    // --- Request bodies ---

    #[test]
    fn fixture_check_fast_upload_request() {
        let req = roundtrip_test::<skydrive_protocol::CheckFastUploadRequest>(
            "check_fast_upload_request.json",
        );
        assert_eq!(req.relative_path.as_deref(), Some("docs/2024/report.pdf"));
    }

    #[test]
    fn fixture_init_upload_request() {
        // Top-level uploads carry no relative_path key at all.
        let req =
            roundtrip_test::<skydrive_protocol::InitUploadRequest>("init_upload_request.json");
        assert!(req.relative_path.is_none());
        assert_eq!(req.total_chunks, 5);
    }

    #[test]
    fn fixture_merge_request() {
        let req = roundtrip_test::<skydrive_protocol::MergeRequest>("merge_request.json");
        assert!(req.auto_rename);
    }

    // --- Response bodies ---

    #[test]
    fn fixture_check_fast_upload_response() {
        let resp = roundtrip_test::<skydrive_protocol::CheckFastUploadResponse>(
            "check_fast_upload_response.json",
        );
        assert!(resp.can_fast_upload);
        assert_eq!(resp.file_meta.map(|m| m.id), Some(341));
    }

    #[test]
    fn fixture_init_upload_response() {
        let resp =
            roundtrip_test::<skydrive_protocol::InitUploadResponse>("init_upload_response.json");
        assert_eq!(resp.uploaded_chunks, vec![0, 1, 3]);
    }

    #[test]
    fn fixture_upload_chunk_ack() {
        let ack = roundtrip_test::<skydrive_protocol::UploadChunkAck>("upload_chunk_ack.json");
        assert_eq!(ack.chunk_index, 3);
    }

    #[test]
    fn fixture_file_meta() {
        let meta = roundtrip_test::<skydrive_protocol::FileMeta>("file_meta.json");
        assert_eq!(meta.file_name, "backup (1).tar");
        assert!(meta.deleted_at.is_none());
    }

    // --- Error bodies ---

    #[test]
    fn fixture_error_conflict() {
        let body = roundtrip_test::<ErrorBody>("error_conflict.json");
        assert_eq!(body.conflicting_file_id(), Some(77));
    }

    #[test]
    fn fixture_error_message() {
        let body = roundtrip_test::<ErrorBody>("error_message.json");
        assert_eq!(body.message(), Some("Upload session not found"));
        assert_eq!(body.conflicting_file_id(), None);
    }

    #[test]
    fn fixture_error_validation() {
        let body = roundtrip_test::<ErrorBody>("error_validation.json");
        assert!(matches!(body.detail, ErrorDetail::Other(_)));
        assert_eq!(body.message(), None);
    }
}
