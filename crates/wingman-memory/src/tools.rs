// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `memory_read`, `memory_update` and `memory_append`: let the model curate
//! its own long-term memory files.

use std::str::FromStr;
use std::sync::Arc;

use serde_json::{json, Value};
use wingman_core::WingmanError;
use wingman_skill::{required_str, ToolOutput, ToolRegistry};

use crate::workspace::{MemoryFile, MemoryStore};

fn parse_key(input: &Value) -> Result<Result<MemoryFile, ToolOutput>, WingmanError> {
    let key = required_str(input, "key")?;
    Ok(MemoryFile::from_str(key).map_err(|_| {
        ToolOutput::error(format!(
            "❌ Unknown memory file '{key}'. Valid: [{}]",
            MemoryFile::valid_keys()
        ))
    }))
}

fn key_schema(extra: Option<(&str, &str)>) -> Value {
    let mut properties = json!({
        "key": {
            "type": "string",
            "enum": ["agents", "soul", "identity", "user", "memory", "tools"],
            "description": "Which memory file"
        }
    });
    let mut required = vec!["key"];
    if let Some((name, description)) = extra {
        properties[name] = json!({ "type": "string", "description": description });
        required.push(name);
    }
    json!({ "type": "object", "properties": properties, "required": required })
}

/// Registers the three memory tools against `store`.
pub fn register_memory_tools(registry: &mut ToolRegistry, store: Arc<MemoryStore>) {
    let read_store = store.clone();
    registry.register_fn(
        "memory_read",
        "Read one of your memory files (agents, soul, identity, user, memory, tools)",
        key_schema(None),
        move |input| {
            let store = read_store.clone();
            async move {
                let file = match parse_key(&input)? {
                    Ok(file) => file,
                    Err(out) => return Ok(out),
                };
                let content = store.read(file).await?;
                if content.trim().is_empty() {
                    return Ok(ToolOutput::ok(format!(
                        "(empty: {} has no content yet)",
                        file.file_name()
                    )));
                }
                Ok(ToolOutput::ok(content))
            }
        },
    );

    let update_store = store.clone();
    registry.register_fn(
        "memory_update",
        "Replace the full content of one of your memory files",
        key_schema(Some(("content", "New file content"))),
        move |input| {
            let store = update_store.clone();
            async move {
                let file = match parse_key(&input)? {
                    Ok(file) => file,
                    Err(out) => return Ok(out),
                };
                let content = required_str(&input, "content")?;
                store.write(file, content).await?;
                Ok(ToolOutput::ok(format!("✅ Updated {}", file.file_name())))
            }
        },
    );

    registry.register_fn(
        "memory_append",
        "Append a note to the end of one of your memory files",
        key_schema(Some(("content", "Text to append"))),
        move |input| {
            let store = store.clone();
            async move {
                let file = match parse_key(&input)? {
                    Ok(file) => file,
                    Err(out) => return Ok(out),
                };
                let content = required_str(&input, "content")?;
                store.append(file, &format!("\n{content}\n")).await?;
                Ok(ToolOutput::ok(format!("✅ Appended to {}", file.file_name())))
            }
        },
    );
}
