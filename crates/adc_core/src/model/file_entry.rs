//! File system entries owned by users.

use crate::model::entity::{Entity, EntityId, EntityValidationError};
use crate::model::security::User;
use crate::query::include::Relation;
use serde::{Deserialize, Serialize};

/// Kind of file system entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileSystemEntryType {
    Folder,
    File,
}

impl FileSystemEntryType {
    pub fn as_db(self) -> &'static str {
        match self {
            Self::Folder => "folder",
            Self::File => "file",
        }
    }

    pub fn parse_db(value: &str) -> Option<Self> {
        match value {
            "folder" => Some(Self::Folder),
            "file" => Some(Self::File),
            _ => None,
        }
    }
}

/// Stored file or folder metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSystemEntry {
    pub id: EntityId,
    /// Upload finished and content is usable.
    pub ready: bool,
    pub name: String,
    pub content: Option<String>,
    /// Unix epoch milliseconds.
    pub create_date: i64,
    /// Unix epoch milliseconds.
    pub change_date: i64,
    pub file_size: i64,
    pub file_type: FileSystemEntryType,
    pub user_id: EntityId,
    #[serde(default)]
    pub user: Option<Box<User>>,
}

impl FileSystemEntry {
    pub const USER: Relation<FileSystemEntry, User> = Relation::new("user");

    pub fn new(user_id: EntityId, name: impl Into<String>, file_type: FileSystemEntryType) -> Self {
        Self {
            id: 0,
            ready: false,
            name: name.into(),
            content: None,
            create_date: 0,
            change_date: 0,
            file_size: 0,
            file_type,
            user_id,
            user: None,
        }
    }
}

impl Entity for FileSystemEntry {
    const NAME: &'static str = "FileSystemEntry";

    fn id(&self) -> EntityId {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn validate(&self) -> Result<(), EntityValidationError> {
        if self.name.trim().is_empty() {
            return Err(EntityValidationError::new(
                Self::NAME,
                "name",
                "must not be blank",
            ));
        }
        if self.file_size < 0 {
            return Err(EntityValidationError::new(
                Self::NAME,
                "file_size",
                "must not be negative",
            ));
        }
        if self.change_date < self.create_date {
            return Err(EntityValidationError::new(
                Self::NAME,
                "change_date",
                "must not be earlier than create_date",
            ));
        }
        Ok(())
    }
}
