use clap::{Parser, Subcommand, ValueEnum};
use moodle_gateway::ResponseEncoding;
use serde_json::Value;
use std::path::PathBuf;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum OutputFormat {
    /// Pretty JSON
    Json,
    /// Titled, indented text
    Markdown,
}

impl From<OutputFormat> for ResponseEncoding {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => ResponseEncoding::Structured,
            OutputFormat::Markdown => ResponseEncoding::Readable,
        }
    }
}

#[derive(Parser)]
#[command(name = "moodlectl")]
#[command(about = "Moodle web-service gateway", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Environment to use (dev or prod); overrides MOODLE_ENV
    #[arg(long, global = true)]
    pub env: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new config file
    Init {
        /// Path for new config file
        #[arg(default_value = "moodle-gateway.toml")]
        path: PathBuf,
    },
    /// Show the active environment and verify the token against site info
    Check {
        #[arg(long, value_enum, default_value = "markdown")]
        format: OutputFormat,
    },
    /// Call a raw web-service function
    Call {
        /// Function name, e.g. core_course_get_courses
        function: String,
        /// Parameter as key=value; dotted keys nest, values parse as JSON when possible
        #[arg(long = "param", short = 'p', value_parser = parse_param)]
        params: Vec<(String, Value)>,
        /// Treat the call as a write (subject to the write policy)
        #[arg(long)]
        mutating: bool,
        /// Parameter holding the course id checked by the write policy
        #[arg(long, requires = "mutating")]
        scope_param: Option<String>,
        #[arg(long)]
        offset: Option<usize>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, value_enum, default_value = "markdown")]
        format: OutputFormat,
        /// Heading for markdown output (defaults to the function name)
        #[arg(long)]
        title: Option<String>,
    },
    /// Run a catalog tool with a JSON input object
    Tool {
        /// Tool name, see `moodlectl tools`
        name: String,
        #[arg(long, default_value = "{}")]
        input: String,
    },
    /// List catalog tools
    Tools,
}

/// Parse `key=value`. The value is JSON when it parses as JSON, otherwise a
/// plain string.
pub fn parse_param(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty parameter name in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}
