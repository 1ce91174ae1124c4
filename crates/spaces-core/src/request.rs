//! Typed backend requests built from validated call arguments.

use std::path::PathBuf;

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::catalog::{FieldType, Operation};
use crate::errors::{json_type_name, ArgumentError, FieldProblem};

/// Default number of log lines fetched by `get-space-logs`.
pub const DEFAULT_LOG_LINES: u64 = 100;

/// Parameters shared by `create-space` and `duplicate-space`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NewSpace {
    pub name: String,
    pub organization: Option<String>,
    pub private: Option<bool>,
    pub sdk: Option<String>,
    pub hardware: Option<String>,
}

/// Mutable metadata accepted by `update-space`, forwarded as-is.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pinned: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdk: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hardware_type: Option<String>,
}

/// One backend call, one variant per catalog operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpaceRequest {
    ListMySpaces,
    ListByUser { user: String },
    Get { space_id: String },
    Create(NewSpace),
    Duplicate { source_space_id: String, space: NewSpace },
    Update { space_id: String, changes: SpaceUpdate },
    Delete { space_id: String },
    ListHardware,
    ListFiles { space_id: String, path: String },
    ReadFile { space_id: String, path: String },
    WriteTextFile { space_id: String, path: String, content: String },
    UploadFile { space_id: String, path: String, local_path: PathBuf },
    DeleteFile { space_id: String, path: String },
    Logs { space_id: String, count: u64 },
    Restart { space_id: String, hardware: Option<String> },
    Pause { space_id: String },
    Search { query: String },
    Rename { space_id: String, new_name: String },
    ListRuntimes,
}

/// Typed accessors over an argument object.
struct Args<'a>(&'a Map<String, Value>);

impl<'a> Args<'a> {
    fn string(&self, key: &str) -> Result<String, ArgumentError> {
        self.optional_string(key)?
            .ok_or_else(|| ArgumentError::Fields(vec![FieldProblem::Missing(key.to_owned())]))
    }

    fn optional_string(&self, key: &str) -> Result<Option<String>, ArgumentError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(wrong_type(key, FieldType::String, other)),
        }
    }

    fn optional_bool(&self, key: &str) -> Result<Option<bool>, ArgumentError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(wrong_type(key, FieldType::Boolean, other)),
        }
    }

    /// Non-negative integral count; fractional or negative numbers are rejected.
    fn optional_count(&self, key: &str) -> Result<Option<u64>, ArgumentError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => match n.as_u64() {
                Some(count) => Ok(Some(count)),
                None => Err(ArgumentError::Fields(vec![FieldProblem::WrongType {
                    field: key.to_owned(),
                    expected: FieldType::Number,
                    found: "non-integral or negative number",
                }])),
            },
            Some(other) => Err(wrong_type(key, FieldType::Number, other)),
        }
    }

    fn space_id(&self) -> Result<String, ArgumentError> {
        self.segmented("spaceId")
    }

    /// Required id or repository path whose segments are all usable.
    fn segmented(&self, key: &str) -> Result<String, ArgumentError> {
        let value = self.string(key)?;
        checked_path(key, value)
    }

    /// Optional repository path; absent or empty means the repository root.
    fn optional_segmented(&self, key: &str) -> Result<String, ArgumentError> {
        match self.optional_string(key)? {
            None => Ok(String::new()),
            Some(value) if value.is_empty() => Ok(value),
            Some(value) => checked_path(key, value),
        }
    }

    fn new_space(&self) -> Result<NewSpace, ArgumentError> {
        Ok(NewSpace {
            name: self.string("name")?,
            organization: self.optional_string("organization")?,
            private: self.optional_bool("private")?,
            sdk: self.optional_string("sdk")?,
            hardware: self.optional_string("hardwareType")?,
        })
    }
}

fn checked_path(key: &str, value: String) -> Result<String, ArgumentError> {
    if path_segments(&value).is_none() {
        return Err(ArgumentError::Fields(vec![FieldProblem::InvalidPath(key.to_owned())]));
    }
    Ok(value)
}

/// Split an id or repository path on `/`. `None` when any segment is empty,
/// `.` or `..`.
pub fn path_segments(value: &str) -> Option<Vec<&str>> {
    let segments: Vec<&str> = value.split('/').collect();
    if segments.iter().any(|s| s.is_empty() || *s == "." || *s == "..") {
        return None;
    }
    Some(segments)
}

fn wrong_type(key: &str, expected: FieldType, found: &Value) -> ArgumentError {
    ArgumentError::Fields(vec![FieldProblem::WrongType {
        field: key.to_owned(),
        expected,
        found: json_type_name(found),
    }])
}

impl SpaceRequest {
    /// Build the request for `operation` from its (already validated)
    /// argument object.
    pub fn from_arguments(operation: Operation, args: &Value) -> Result<Self, ArgumentError> {
        let empty = Map::new();
        let map = match args {
            Value::Null => &empty,
            Value::Object(map) => map,
            other => return Err(ArgumentError::NotAnObject(json_type_name(other))),
        };
        let args = Args(map);

        let request = match operation {
            Operation::ListMySpaces => Self::ListMySpaces,
            Operation::GetSpacesByUser => Self::ListByUser {
                user: args.string("user")?,
            },
            Operation::GetSpace => Self::Get {
                space_id: args.space_id()?,
            },
            Operation::CreateSpace => Self::Create(args.new_space()?),
            Operation::DuplicateSpace => Self::Duplicate {
                source_space_id: args.segmented("sourceSpaceId")?,
                space: args.new_space()?,
            },
            Operation::UpdateSpace => Self::Update {
                space_id: args.space_id()?,
                changes: SpaceUpdate {
                    private: args.optional_bool("private")?,
                    title: args.optional_string("title")?,
                    emoji: args.optional_string("emoji")?,
                    color_from: args.optional_string("colorFrom")?,
                    color_to: args.optional_string("colorTo")?,
                    pinned: args.optional_bool("pinned")?,
                    sdk: args.optional_string("sdk")?,
                    hardware_type: args.optional_string("hardwareType")?,
                },
            },
            Operation::DeleteSpace => Self::Delete {
                space_id: args.space_id()?,
            },
            Operation::GetSpaceHardware => Self::ListHardware,
            Operation::ListSpaceFiles => Self::ListFiles {
                space_id: args.space_id()?,
                path: args.optional_segmented("path")?,
            },
            Operation::GetSpaceFile => Self::ReadFile {
                space_id: args.space_id()?,
                path: args.segmented("path")?,
            },
            Operation::UploadTextFile => Self::WriteTextFile {
                space_id: args.space_id()?,
                path: args.segmented("path")?,
                content: args.string("content")?,
            },
            Operation::UploadFile => Self::UploadFile {
                space_id: args.space_id()?,
                path: args.segmented("path")?,
                local_path: PathBuf::from(args.string("filePath")?),
            },
            Operation::DeleteSpaceFile => Self::DeleteFile {
                space_id: args.space_id()?,
                path: args.segmented("path")?,
            },
            Operation::GetSpaceLogs => Self::Logs {
                space_id: args.space_id()?,
                count: args.optional_count("count")?.unwrap_or(DEFAULT_LOG_LINES),
            },
            Operation::RestartSpace => Self::Restart {
                space_id: args.space_id()?,
                hardware: args.optional_string("hardwareType")?,
            },
            Operation::PauseSpace => Self::Pause {
                space_id: args.space_id()?,
            },
            Operation::SearchSpaces => Self::Search {
                query: args.string("query")?,
            },
            Operation::RenameSpace => Self::Rename {
                space_id: args.space_id()?,
                new_name: args.string("newName")?,
            },
            Operation::GetSpaceRuntimes => Self::ListRuntimes,
        };
        Ok(request)
    }

    pub fn operation(&self) -> Operation {
        match self {
            Self::ListMySpaces => Operation::ListMySpaces,
            Self::ListByUser { .. } => Operation::GetSpacesByUser,
            Self::Get { .. } => Operation::GetSpace,
            Self::Create(_) => Operation::CreateSpace,
            Self::Duplicate { .. } => Operation::DuplicateSpace,
            Self::Update { .. } => Operation::UpdateSpace,
            Self::Delete { .. } => Operation::DeleteSpace,
            Self::ListHardware => Operation::GetSpaceHardware,
            Self::ListFiles { .. } => Operation::ListSpaceFiles,
            Self::ReadFile { .. } => Operation::GetSpaceFile,
            Self::WriteTextFile { .. } => Operation::UploadTextFile,
            Self::UploadFile { .. } => Operation::UploadFile,
            Self::DeleteFile { .. } => Operation::DeleteSpaceFile,
            Self::Logs { .. } => Operation::GetSpaceLogs,
            Self::Restart { .. } => Operation::RestartSpace,
            Self::Pause { .. } => Operation::PauseSpace,
            Self::Search { .. } => Operation::SearchSpaces,
            Self::Rename { .. } => Operation::RenameSpace,
            Self::ListRuntimes => Operation::GetSpaceRuntimes,
        }
    }

    /// Wrap the backend's domain value into the call result object.
    ///
    /// The domain value is embedded untouched under an operation-specific
    /// key; mutating operations that return nothing report `success` and a
    /// confirmation message instead.
    pub fn shape_result(&self, value: Value) -> Value {
        match self {
            Self::ListMySpaces | Self::ListByUser { .. } => json!({ "spaces": value }),
            Self::Get { .. } => json!({ "space": value }),
            Self::Create(space) => {
                let message = format!(
                    "Space {} created successfully",
                    space_label(&value, &space.name)
                );
                json!({ "space": value, "message": message })
            }
            Self::Duplicate {
                source_space_id,
                space,
            } => {
                let message = format!(
                    "Space {} duplicated successfully from {source_space_id}",
                    space_label(&value, &space.name)
                );
                json!({ "space": value, "message": message })
            }
            Self::Update { space_id, .. } => json!({
                "space": value,
                "message": format!("Space {space_id} updated successfully"),
            }),
            Self::Delete { space_id } => confirmation(format!("Space {space_id} deleted successfully")),
            Self::ListHardware => json!({ "hardware": value }),
            Self::ListFiles { space_id, path } => json!({
                "files": value,
                "path": path,
                "spaceId": space_id,
            }),
            Self::ReadFile { space_id, path } => json!({
                "content": value,
                "path": path,
                "spaceId": space_id,
            }),
            Self::WriteTextFile { space_id, path, .. } => {
                confirmation(format!("File {path} uploaded successfully to {space_id}"))
            }
            Self::UploadFile {
                space_id,
                path,
                local_path,
            } => confirmation(format!(
                "File from {} uploaded successfully to {space_id} at {path}",
                local_path.display()
            )),
            Self::DeleteFile { space_id, path } => {
                confirmation(format!("File {path} deleted successfully from {space_id}"))
            }
            Self::Logs { space_id, .. } => json!({ "logs": value, "spaceId": space_id }),
            Self::Restart { space_id, .. } => {
                confirmation(format!("Space {space_id} restarted successfully"))
            }
            Self::Pause { space_id } => confirmation(format!("Space {space_id} paused successfully")),
            Self::Search { query } => json!({ "spaces": value, "query": query }),
            Self::Rename { space_id, new_name } => json!({
                "space": value,
                "message": format!("Space {space_id} renamed successfully to {new_name}"),
            }),
            Self::ListRuntimes => json!({ "runtimes": value }),
        }
    }
}

fn confirmation(message: String) -> Value {
    json!({ "success": true, "message": message })
}

fn space_label(space: &Value, fallback: &str) -> String {
    space
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or(fallback)
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_operation_builds_and_maps_back() {
        let args = json!({
            "user": "u", "spaceId": "u/s", "name": "n", "sourceSpaceId": "u/src",
            "path": "app.py", "content": "print(1)", "filePath": "/tmp/x", "query": "q",
            "newName": "renamed",
        });
        for op in Operation::ALL {
            let request = SpaceRequest::from_arguments(op, &args).unwrap();
            assert_eq!(request.operation(), op);
        }
    }

    #[test]
    fn create_keeps_optional_fields() {
        let request = SpaceRequest::from_arguments(
            Operation::CreateSpace,
            &json!({"name": "demo", "organization": "acme", "private": true, "hardwareType": "t4-small"}),
        )
        .unwrap();
        assert_eq!(
            request,
            SpaceRequest::Create(NewSpace {
                name: "demo".into(),
                organization: Some("acme".into()),
                private: Some(true),
                sdk: None,
                hardware: Some("t4-small".into()),
            })
        );
    }

    #[test]
    fn logs_default_count() {
        let request =
            SpaceRequest::from_arguments(Operation::GetSpaceLogs, &json!({"spaceId": "a/b"})).unwrap();
        assert_eq!(
            request,
            SpaceRequest::Logs {
                space_id: "a/b".into(),
                count: DEFAULT_LOG_LINES
            }
        );
    }

    #[test]
    fn logs_reject_fractional_count() {
        let err = SpaceRequest::from_arguments(
            Operation::GetSpaceLogs,
            &json!({"spaceId": "a/b", "count": 2.5}),
        )
        .unwrap_err();
        assert_eq!(err.fields(), vec!["count"]);

        let err = SpaceRequest::from_arguments(
            Operation::GetSpaceLogs,
            &json!({"spaceId": "a/b", "count": -3}),
        )
        .unwrap_err();
        assert_eq!(err.fields(), vec!["count"]);
    }

    #[test]
    fn traversal_segments_name_the_field() {
        let err = SpaceRequest::from_arguments(Operation::GetSpace, &json!({"spaceId": "../admin"}))
            .unwrap_err();
        assert_eq!(err, ArgumentError::Fields(vec![FieldProblem::InvalidPath("spaceId".into())]));

        let err = SpaceRequest::from_arguments(
            Operation::GetSpaceFile,
            &json!({"spaceId": "a/b", "path": "src//main.py"}),
        )
        .unwrap_err();
        assert_eq!(err.fields(), vec!["path"]);

        let err = SpaceRequest::from_arguments(
            Operation::DuplicateSpace,
            &json!({"sourceSpaceId": "a/./b", "name": "copy"}),
        )
        .unwrap_err();
        assert_eq!(err.fields(), vec!["sourceSpaceId"]);
    }

    #[test]
    fn path_segments_split_clean_paths() {
        assert_eq!(path_segments("user/demo"), Some(vec!["user", "demo"]));
        assert_eq!(path_segments("user/../other"), None);
        assert_eq!(path_segments(""), None);
    }

    #[test]
    fn list_files_defaults_to_root() {
        let request =
            SpaceRequest::from_arguments(Operation::ListSpaceFiles, &json!({"spaceId": "a/b"})).unwrap();
        assert_eq!(
            request,
            SpaceRequest::ListFiles {
                space_id: "a/b".into(),
                path: String::new()
            }
        );
    }

    #[test]
    fn update_serializes_only_supplied_fields() {
        let changes = SpaceUpdate {
            title: Some("Demo".into()),
            color_from: Some("red".into()),
            pinned: Some(false),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&changes).unwrap(),
            json!({"title": "Demo", "colorFrom": "red", "pinned": false})
        );
    }

    #[test]
    fn get_wraps_space_unchanged() {
        let space = json!({"id": "user/demo", "owner": "user", "private": false});
        let request = SpaceRequest::Get {
            space_id: "user/demo".into(),
        };
        assert_eq!(request.shape_result(space.clone()), json!({ "space": space }));
    }

    #[test]
    fn create_message_uses_returned_id() {
        let request = SpaceRequest::Create(NewSpace {
            name: "demo".into(),
            ..Default::default()
        });
        let shaped = request.shape_result(json!({"id": "user/demo"}));
        assert_eq!(shaped["message"], "Space user/demo created successfully");
        assert_eq!(shaped["space"]["id"], "user/demo");
    }

    #[test]
    fn mutations_report_success() {
        let request = SpaceRequest::Delete {
            space_id: "user/demo".into(),
        };
        assert_eq!(
            request.shape_result(Value::Null),
            json!({"success": true, "message": "Space user/demo deleted successfully"})
        );
    }

    #[test]
    fn file_results_echo_location() {
        let request = SpaceRequest::ReadFile {
            space_id: "user/demo".into(),
            path: "app.py".into(),
        };
        assert_eq!(
            request.shape_result(json!("import gradio")),
            json!({"content": "import gradio", "path": "app.py", "spaceId": "user/demo"})
        );
    }
}
