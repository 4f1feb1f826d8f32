use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    Image,
    Audio,
    Link,
}

/// A sub-resource referenced from a fetched page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkData {
    pub id: String,
    pub url: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: LinkKind,
}

/// A remote page converted to markdown. Read-only once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub url: String,
    pub title: String,
    pub content: String,
    pub links: Vec<LinkData>,
}
