//! Typed tool arguments
//!
//! The model sends arguments as a loose JSON object. Each tool gets one
//! struct here, parsed once at the dispatch boundary so the tool bodies work
//! with real types. Missing required fields surface as serde's
//! "missing field `x`" message, which names the field for the model.
//!
//! Optional scalars are read leniently: models routinely send `"30"` or
//! `30.0` for an integer and `"true"` for a boolean, and a value of the wrong
//! shape falls back to the default rather than failing the call.

use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::ToolError;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunCommandArgs {
    pub command: String,
    #[serde(default)]
    pub working_dir: Option<String>,
    /// Seconds; `None` or `0` means the registry default
    #[serde(default, deserialize_with = "lenient_u64")]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReadFileArgs {
    pub path: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub max_lines: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WriteFileArgs {
    pub path: String,
    pub content: String,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub append: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ListDirectoryArgs {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub show_hidden: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChangeDirectoryArgs {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeleteFileArgs {
    pub path: String,
    /// Anything but an explicit `true` refuses the deletion
    #[serde(default, deserialize_with = "lenient_bool")]
    pub confirm: bool,
}

/// Arguments shared by `copy_file` and `move_file`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TransferArgs {
    pub source: String,
    pub destination: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskCompleteArgs {
    pub summary: String,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub files_modified: Vec<String>,
}

/// Parsed arguments for one tool call
#[derive(Debug, Clone, PartialEq)]
pub enum ToolArgs {
    RunCommand(RunCommandArgs),
    ReadFile(ReadFileArgs),
    WriteFile(WriteFileArgs),
    ListDirectory(ListDirectoryArgs),
    GetCurrentDirectory,
    ChangeDirectory(ChangeDirectoryArgs),
    DeleteFile(DeleteFileArgs),
    CopyFile(TransferArgs),
    MoveFile(TransferArgs),
    TaskComplete(TaskCompleteArgs),
}

impl ToolArgs {
    /// Parse the argument map for `tool`
    pub fn parse(tool: &str, args: &Map<String, Value>) -> Result<Self, ToolError> {
        let parsed = match tool {
            "run_command" => Self::RunCommand(typed(tool, args)?),
            "read_file" => Self::ReadFile(typed(tool, args)?),
            "write_file" => Self::WriteFile(typed(tool, args)?),
            "list_directory" => Self::ListDirectory(typed(tool, args)?),
            "get_current_directory" => Self::GetCurrentDirectory,
            "change_directory" => Self::ChangeDirectory(typed(tool, args)?),
            "delete_file" => Self::DeleteFile(typed(tool, args)?),
            "copy_file" => Self::CopyFile(typed(tool, args)?),
            "move_file" => Self::MoveFile(typed(tool, args)?),
            "task_complete" => Self::TaskComplete(typed(tool, args)?),
            _ => return Err(ToolError::UnknownTool(tool.to_string())),
        };
        Ok(parsed)
    }
}

fn typed<T: DeserializeOwned>(tool: &str, args: &Map<String, Value>) -> Result<T, ToolError> {
    serde_json::from_value(Value::Object(args.clone())).map_err(|e| ToolError::InvalidArguments {
        tool: tool.to_string(),
        reason: e.to_string(),
    })
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| *f >= 0.0).map(|f| f as u64),
        _ => None,
    })
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(b) => b,
        Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    })
}

fn lenient_strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}
