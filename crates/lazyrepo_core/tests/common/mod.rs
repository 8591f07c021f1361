#![allow(dead_code)]

use lazyrepo_core::{Record, RecordId, RecordMeta};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub title: String,
    pub done: bool,
}

impl Task {
    pub fn new(title: &str) -> Self {
        Self {
            meta: RecordMeta::default(),
            title: title.to_string(),
            done: false,
        }
    }

    pub fn with_id(id: RecordId, title: &str) -> Self {
        Self {
            meta: RecordMeta::with_id(id),
            ..Self::new(title)
        }
    }
}

impl Record for Task {
    const COLLECTION: &'static str = "tasks";

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub name: String,
}

impl Project {
    pub fn with_id(id: RecordId, name: &str) -> Self {
        Self {
            meta: RecordMeta::with_id(id),
            name: name.to_string(),
        }
    }
}

impl Record for Project {
    const COLLECTION: &'static str = "projects";

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }
}
