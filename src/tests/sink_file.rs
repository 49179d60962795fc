#[cfg(test)]
mod test {
    use std::fs;
    use std::time::Duration;

    use anyhow::anyhow;

    use crate::config::sources::SinkConfig;
    use crate::resilience::retry::RetrySettings;
    use crate::sinks::manager::SinkManager;
    use crate::sinks::sink_file::FileSink;
    use crate::tests::common::{calls, clock, provider, token_valid_for, ScriptedSource};

    #[tokio::test]
    async fn atomic_write_and_permissions() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("bearer.token");
        let sink = FileSink::new(&SinkConfig { path: path.display().to_string() });

        sink.write("token-value-123").await.expect("first write");
        sink.write("token-value-456").await.expect("second write");

        assert_eq!(fs::read_to_string(&path).expect("read file"), "token-value-456");
        assert!(!path.with_extension("tmp").exists(), "tmp file renamed away");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).expect("meta").permissions().mode() & 0o777;
            assert_eq!(mode, 0o600, "permissions mismatch (expected 0600)");
        }
    }

    #[tokio::test]
    async fn clear_removes_file_and_tolerates_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bearer.token");
        let sink = FileSink::new(&SinkConfig { path: path.display().to_string() });

        sink.write("v").await.unwrap();
        sink.clear().await.unwrap();
        assert!(!path.exists());
        sink.clear().await.unwrap();
    }

    #[tokio::test]
    async fn manager_propagates_tokens_and_resubscribes_after_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bearer.token");
        let clock = clock();
        let script_clock = clock.clone();
        // first generation fails, the next one succeeds
        let (source, counter) = ScriptedSource::new(move |n: usize| {
            if n == 0 { Err(anyhow!("cold start")) } else { Ok(token_valid_for(script_clock.as_ref(), "propagated", 3600)) }
        });
        let (provider, _login) = provider(source, true, clock, RetrySettings::new(0, 0));
        let manager = SinkManager::new(
            Some(FileSink::new(&SinkConfig { path: path.display().to_string() })),
            Duration::from_millis(20),
        );

        let runner = manager.clone();
        let handle = tokio::spawn(async move { runner.run(provider).await });

        let mut content = None;
        for _ in 0..200 {
            if let Ok(v) = fs::read_to_string(&path) {
                content = Some(v);
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();

        assert_eq!(content.as_deref(), Some("propagated"));
        assert_eq!(calls(&counter), 2);

        manager.cleanup().await;
        assert!(!path.exists());
    }
}
