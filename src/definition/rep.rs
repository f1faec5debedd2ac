use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Serialized form of a flow, exactly as it arrives over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionRep {
    pub name: String,

    #[serde(default, rename = "model", skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,

    #[serde(default)]
    pub explicit_reply: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<AttributeRep>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_task: Option<TaskRep>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_handler_task: Option<TaskRep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeRep {
    pub name: String,
    #[serde(rename = "type", default)]
    pub attr_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRep {
    pub id: String,

    #[serde(rename = "type", default)]
    pub type_id: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_ref: Option<String>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub settings: HashMap<String, Value>,

    /// child tasks contained by this one
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<TaskRep>,

    /// links between the child tasks
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<LinkRep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRep {
    #[serde(rename = "type", default)]
    pub link_type: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(rename = "from")]
    pub from_id: String,

    #[serde(rename = "to")]
    pub to_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}
