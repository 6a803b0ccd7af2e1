//! Meeting entities shown in list views.

use crate::filter::OptionSource;
use crate::record::{Attr, Record, RowId};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Participant group (e.g. "Delegates").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Group {
    pub id: RowId,
    pub name: String,
    /// Built-in groups that are hidden from filter menus.
    #[serde(default)]
    pub is_default: bool,
}

impl OptionSource for Group {
    fn option_id(&self) -> Value {
        json!(self.id)
    }

    fn title(&self) -> String {
        self.name.clone()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Participant {
    pub id: RowId,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub username: String,
    #[serde(default)]
    pub pronoun: Option<String>,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub structure_level: Option<String>,
    #[serde(default)]
    pub group_ids: Vec<RowId>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_present: bool,
}

fn default_true() -> bool {
    true
}

impl Participant {
    /// Display name: first and last name, falling back to the username.
    pub fn full_name(&self) -> String {
        let name = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let name = name.trim();
        if name.is_empty() {
            self.username.clone()
        } else {
            name.to_string()
        }
    }
}

impl Record for Participant {
    fn id(&self) -> RowId {
        self.id
    }

    fn attr(&self, name: &str) -> Option<Attr<'_>> {
        let value = match name {
            "full_name" => return Some(Attr::Getter(Box::new(|| json!(self.full_name())))),
            "first_name" => json!(self.first_name),
            "last_name" => json!(self.last_name),
            "username" => json!(self.username),
            "pronoun" => json!(self.pronoun),
            "number" => json!(self.number),
            "structure_level" => json!(self.structure_level),
            "group_ids" => json!(self.group_ids),
            "is_active" => json!(self.is_active),
            "is_present" => json!(self.is_present),
            _ => return None,
        };
        Some(Attr::Value(value))
    }
}

/// Motion category; categories nest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MotionCategory {
    pub id: RowId,
    pub name: String,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub children: Vec<MotionCategory>,
}

impl MotionCategory {
    /// `"<prefix> - <name>"` when a prefix is set.
    pub fn prefixed_name(&self) -> String {
        match self.prefix.as_deref().filter(|p| !p.is_empty()) {
            Some(prefix) => format!("{prefix} - {}", self.name),
            None => self.name.clone(),
        }
    }
}

impl Record for MotionCategory {
    fn id(&self) -> RowId {
        self.id
    }

    fn attr(&self, name: &str) -> Option<Attr<'_>> {
        match name {
            "name" => Some(Attr::Value(json!(self.name))),
            "prefix" => Some(Attr::Value(json!(self.prefix))),
            "prefixed_name" => Some(Attr::Getter(Box::new(|| json!(self.prefixed_name())))),
            _ => None,
        }
    }
}

impl OptionSource for MotionCategory {
    fn option_id(&self) -> Value {
        json!(self.id)
    }

    fn title(&self) -> String {
        self.prefixed_name()
    }

    fn children(&self) -> &[Self] {
        &self.children
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Motion {
    pub id: RowId,
    #[serde(default)]
    pub number: Option<String>,
    pub title: String,
    #[serde(default)]
    pub submitters: Vec<String>,
    #[serde(default)]
    pub category: Option<MotionCategory>,
    #[serde(default)]
    pub tag_ids: Vec<RowId>,
    #[serde(default)]
    pub state: Option<String>,
}

impl Record for Motion {
    fn id(&self) -> RowId {
        self.id
    }

    fn attr(&self, name: &str) -> Option<Attr<'_>> {
        match name {
            "number" => Some(Attr::Value(json!(self.number))),
            "title" => Some(Attr::Value(json!(self.title))),
            "submitters" => Some(Attr::Value(json!(self.submitters))),
            "category" => Some(match &self.category {
                Some(category) => Attr::Record(category),
                None => Attr::Value(Value::Null),
            }),
            "tag_ids" => Some(Attr::Value(json!(self.tag_ids))),
            "state" => Some(Attr::Value(json!(self.state))),
            _ => None,
        }
    }
}
