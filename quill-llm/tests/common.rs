use std::sync::OnceLock;

use quill_common::observability::{LogConfig, LogFormat};

static INIT_PATH: OnceLock<std::path::PathBuf> = OnceLock::new();
static LOG_DIR: OnceLock<tempfile::TempDir> = OnceLock::new();

pub fn init_test_tracing() {
    let _ = INIT_PATH.get_or_init(|| {
        let dir = LOG_DIR.get_or_init(|| tempfile::tempdir().expect("temp log dir"));
        let config = LogConfig {
            app_name: "quill-tests",
            log_dir: Some(dir.path().to_path_buf()),
            emit_stderr: true,
            format: LogFormat::from_env(),
            default_filter: "debug",
        };

        quill_common::observability::init_logging(config).unwrap_or_default()
    });
}
