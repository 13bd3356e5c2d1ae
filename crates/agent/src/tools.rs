use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use tailor_core::domain::command::ProfileCommand;
use tailor_core::domain::profile::{ListTarget, StringTarget};
use tailor_core::errors::DomainError;

pub const SET_STRING_TOOL: &str = "SetStringField";
pub const ADD_TO_LIST_TOOL: &str = "AddToListField";
pub const REMOVE_FROM_LIST_TOOL: &str = "RemoveFromListField";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ToolCallError {
    #[error("unknown tool `{name}`")]
    UnknownTool { name: String },
    #[error("bad tool arguments: {0}")]
    BadArguments(String),
    #[error(transparent)]
    InvalidField(#[from] DomainError),
}

/// Tool definitions advertised to the model, in chat-completions function
/// format.
pub fn specs() -> Value {
    json!([
        {
            "type": "function",
            "function": {
                "name": SET_STRING_TOOL,
                "description": "Set a string field. Args: field_name, value",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "field_name": { "type": "string" },
                        "value": { "type": "string" }
                    },
                    "required": ["field_name", "value"]
                }
            }
        },
        {
            "type": "function",
            "function": {
                "name": ADD_TO_LIST_TOOL,
                "description": "Add an item to a list field. Args: field_name, item",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "field_name": { "type": "string" },
                        "item": { "type": "string" }
                    },
                    "required": ["field_name", "item"]
                }
            }
        },
        {
            "type": "function",
            "function": {
                "name": REMOVE_FROM_LIST_TOOL,
                "description": "Remove an item from a list field. Args: field_name, item",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "field_name": { "type": "string" },
                        "item": { "type": "string" }
                    },
                    "required": ["field_name", "item"]
                }
            }
        }
    ])
}

/// Decode a wire tool call into a [`ProfileCommand`]. Field names are checked
/// here so a bad call never reaches a record.
pub fn decode(tool_name: &str, arguments: &str) -> Result<ProfileCommand, ToolCallError> {
    match tool_name {
        SET_STRING_TOOL => {
            let args: SetStringArgs = parse_args(arguments)?;
            let field = StringTarget::parse(&args.field_name)?;
            Ok(ProfileCommand::SetString { field, value: args.value })
        }
        ADD_TO_LIST_TOOL => {
            let args: ListItemArgs = parse_args(arguments)?;
            let field = ListTarget::parse(&args.field_name)?;
            Ok(ProfileCommand::AddToList { field, item: args.item })
        }
        REMOVE_FROM_LIST_TOOL => {
            let args: ListItemArgs = parse_args(arguments)?;
            let field = ListTarget::parse(&args.field_name)?;
            Ok(ProfileCommand::RemoveFromList { field, item: args.item })
        }
        other => Err(ToolCallError::UnknownTool { name: other.to_string() }),
    }
}

#[derive(Deserialize)]
struct SetStringArgs {
    field_name: String,
    value: String,
}

#[derive(Deserialize)]
struct ListItemArgs {
    field_name: String,
    item: String,
}

fn parse_args<T: serde::de::DeserializeOwned>(arguments: &str) -> Result<T, ToolCallError> {
    serde_json::from_str(arguments).map_err(|err| ToolCallError::BadArguments(err.to_string()))
}
