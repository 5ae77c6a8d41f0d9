//! Output formatting for CLI commands.
//!
//! Provides abstraction layer for outputting results in text or JSON format.

use anyhow::Result;
use carkit_core::{Cid, Codec};
use serde::Serialize;
use std::io::{self, Write};

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Writer for command output with format abstraction.
pub struct OutputWriter {
    format: OutputFormat,
    stdout: io::Stdout,
}

impl OutputWriter {
    /// Create a new OutputWriter.
    pub fn new(json: bool) -> Self {
        Self {
            format: if json {
                OutputFormat::Json
            } else {
                OutputFormat::Text
            },
            stdout: io::stdout(),
        }
    }

    /// Write output using the configured format.
    ///
    /// The `data` parameter must be a serializable struct that includes
    /// `success: bool` and `result_code: u8` fields.
    ///
    /// The `text_fn` closure is called only in text mode to generate the
    /// human-readable output.
    pub fn write<T: Serialize>(&self, data: &T, text_fn: impl FnOnce() -> String) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(data)?;
                writeln!(&self.stdout, "{}", json)?;
            }
            OutputFormat::Text => {
                let text = text_fn();
                if !text.is_empty() {
                    write!(&self.stdout, "{}", text)?;
                }
            }
        }
        Ok(())
    }

    /// Write an error message to stderr.
    ///
    /// In JSON mode, writes a JSON error object with success=false.
    /// In text mode, writes the error message and its causes.
    pub fn write_error(&self, error: &anyhow::Error, result_code: u8) {
        match self.format {
            OutputFormat::Json => {
                let error_output = ErrorOutput {
                    success: false,
                    result_code,
                    error: format!("{:#}", error),
                };
                if let Ok(json) = serde_json::to_string_pretty(&error_output) {
                    let _ = writeln!(io::stderr(), "{}", json);
                }
            }
            OutputFormat::Text => {
                let _ = writeln!(io::stderr(), "Error: {:#}", error);
            }
        }
    }
}

/// Codec name for display; unknown codecs are shown as hex codes.
pub fn codec_name(cid: &Cid) -> String {
    match Codec::of(cid) {
        Ok(codec) => codec.as_str().to_string(),
        Err(_) => format!("0x{:x}", cid.codec()),
    }
}

/// CIDs as strings for JSON output.
pub fn cid_strings(cids: &[Cid]) -> Vec<String> {
    cids.iter().map(Cid::to_string).collect()
}

// ============================================================================
// Data Transfer Objects (DTOs) for JSON output
// ============================================================================

/// Error output structure.
#[derive(Debug, Serialize)]
pub struct ErrorOutput {
    pub success: bool,
    pub result_code: u8,
    pub error: String,
}

/// Output for `init` command.
#[derive(Debug, Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub result_code: u8,
    pub root: String,
    pub algorithm: String,
}

/// Output for `put` command.
#[derive(Debug, Serialize)]
pub struct PutOutput {
    pub success: bool,
    pub result_code: u8,
    pub cid: String,
    pub codec: String,
    pub size: u64,
}

/// Output for `export` command.
#[derive(Debug, Serialize)]
pub struct ExportOutput {
    pub success: bool,
    pub result_code: u8,
    pub path: String,
    pub roots: Vec<String>,
    pub blocks: usize,
    pub bytes: u64,
}

/// Output for `import` command.
#[derive(Debug, Serialize)]
pub struct ImportOutput {
    pub success: bool,
    pub result_code: u8,
    pub path: String,
    pub roots: Vec<String>,
    pub blocks: usize,
    pub bytes: u64,
}

/// Block frame information for `ls` command.
#[derive(Debug, Clone, Serialize)]
pub struct EntryInfo {
    pub offset: u64,
    pub cid: String,
    pub codec: String,
    pub size: u64,
}

/// Output for `ls` command.
#[derive(Debug, Serialize)]
pub struct LsOutput {
    pub success: bool,
    pub result_code: u8,
    pub version: u64,
    pub roots: Vec<String>,
    pub entries: Vec<EntryInfo>,
}

/// Output for `verify` command.
#[derive(Debug, Serialize)]
pub struct VerifyOutput {
    pub success: bool,
    pub result_code: u8,
    pub roots: Vec<String>,
    pub blocks: usize,
    pub bytes: u64,
    pub complete: bool,
    pub missing: Vec<String>,
}

/// Block information for `walk` command.
#[derive(Debug, Clone, Serialize)]
pub struct WalkedBlock {
    pub cid: String,
    pub codec: String,
    pub size: u64,
    pub links: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
}

/// Output for `walk` command.
#[derive(Debug, Serialize)]
pub struct WalkOutput {
    pub success: bool,
    pub result_code: u8,
    pub roots: Vec<String>,
    pub blocks: Vec<WalkedBlock>,
}
