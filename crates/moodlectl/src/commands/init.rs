use anyhow::Result;
use std::path::Path;

const DEFAULT_CONFIG: &str = r#"# Moodle gateway configuration
# Every value can be overridden by a MOODLE_* environment variable.

# Active environment: "dev" (default) or "prod"
env = "dev"

[dev]
url = "https://sandbox.moodledemo.net"
# token = "..."            # prefer MOODLE_DEV_TOKEN

[prod]
# url = "https://moodle.example.edu"
# token = "..."            # prefer MOODLE_PROD_TOKEN

[write_policy]
# Courses that accept writes in dev (MOODLE_DEV_COURSE_WHITELIST="7299,8100")
dev_course_whitelist = [7299]
# Master switch for writes in prod (MOODLE_PROD_ALLOW_WRITES)
prod_allow_writes = false

[http]
timeout_secs = 30
max_connections = 100
max_keepalive_connections = 20

[response]
max_response_bytes = 50000
"#;

/// Initialize a new config file
pub fn run_init(path: &Path) -> Result<()> {
    if path.exists() {
        anyhow::bail!("Config already exists at {:?}", path);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, DEFAULT_CONFIG)?;
    println!("Created config at {:?}", path);
    Ok(())
}
