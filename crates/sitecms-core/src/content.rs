//! Content types and documents.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;

/// A content document: a JSON object identified by its `name` field.
pub type Document = Map<String, Value>;

/// Category of content stored under the content root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// Site branding, SEO metadata and assets, keyed by host name.
    Site,
    /// Renderable page.
    Page,
    /// Generic content node.
    Node,
    /// Navigation menu, optionally role-scoped as `{name}@{role}`.
    Menu,
    /// Link with icon, display text and target.
    Link,
    /// Opaque metadata payload.
    Meta,
}

impl ContentType {
    /// Every content type, in population order.
    pub const ALL: [ContentType; 6] = [
        Self::Site,
        Self::Meta,
        Self::Link,
        Self::Menu,
        Self::Node,
        Self::Page,
    ];

    /// Singular tag of this content type.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Site => "site",
            Self::Page => "page",
            Self::Node => "node",
            Self::Menu => "menu",
            Self::Link => "link",
            Self::Meta => "meta",
        }
    }

    /// Folder name under the content root (the plural of the tag).
    pub fn folder(&self) -> &'static str {
        match self {
            Self::Site => "sites",
            Self::Page => "pages",
            Self::Node => "nodes",
            Self::Menu => "menus",
            Self::Link => "links",
            Self::Meta => "metas",
        }
    }

    /// JSON schema source every document of this type must satisfy.
    pub fn schema_source(&self) -> &'static str {
        match self {
            Self::Site => include_str!("../schemas/site.json"),
            Self::Page => include_str!("../schemas/page.json"),
            Self::Node => include_str!("../schemas/node.json"),
            Self::Menu => include_str!("../schemas/menu.json"),
            Self::Link => include_str!("../schemas/link.json"),
            Self::Meta => include_str!("../schemas/meta.json"),
        }
    }

    /// Placeholder returned when no document named `name` exists.
    pub fn default_document(&self, name: &str) -> Document {
        let mut doc = Document::new();
        doc.insert("name".to_string(), Value::from(name));
        match self {
            Self::Link => {
                doc.insert("icon".to_string(), Value::from("fa fa-file"));
                doc.insert("text".to_string(), Value::from(name));
                doc.insert("link".to_string(), Value::from("#"));
            }
            Self::Meta => {
                doc.insert("data".to_string(), Value::from(""));
            }
            Self::Site | Self::Page | Self::Node | Self::Menu => {}
        }
        doc
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for ContentType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "site" => Ok(Self::Site),
            "page" => Ok(Self::Page),
            "node" => Ok(Self::Node),
            "menu" => Ok(Self::Menu),
            "link" => Ok(Self::Link),
            "meta" => Ok(Self::Meta),
            _ => Err(CoreError::UnknownContentType(s.to_string())),
        }
    }
}

/// Get the `name` identity of a document, if it has one.
pub fn document_name(doc: &Document) -> Option<&str> {
    doc.get("name").and_then(Value::as_str)
}

/// Audience a role-scoped menu is selected for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Anonymous visitor.
    #[default]
    Guest,
    /// Signed-in user without admin rights.
    Users,
    /// Administrator.
    Admin,
}

impl Role {
    /// Derive the menu role for an optional signed-in user role.
    pub fn for_user(user_role: Option<&str>) -> Self {
        match user_role {
            None => Self::Guest,
            Some("admin") => Self::Admin,
            Some(_) => Self::Users,
        }
    }

    /// Suffix used in role-scoped menu keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Guest => "guest",
            Self::Users => "users",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_folder_is_plural_tag() {
        for ty in ContentType::ALL {
            assert_eq!(ty.folder(), format!("{}s", ty.tag()));
        }
    }

    #[test]
    fn test_content_type_from_str() {
        assert_eq!("page".parse::<ContentType>().unwrap(), ContentType::Page);
        assert_eq!("MENU".parse::<ContentType>().unwrap(), ContentType::Menu);
        assert!("widget".parse::<ContentType>().is_err());
    }

    #[test]
    fn test_link_default_document() {
        let doc = ContentType::Link.default_document("github");
        assert_eq!(
            Value::Object(doc),
            json!({"name": "github", "icon": "fa fa-file", "text": "github", "link": "#"})
        );
    }

    #[test]
    fn test_meta_default_document() {
        let doc = ContentType::Meta.default_document("tagline");
        assert_eq!(Value::Object(doc), json!({"name": "tagline", "data": ""}));
    }

    #[test]
    fn test_plain_default_document() {
        for ty in [ContentType::Site, ContentType::Page, ContentType::Node, ContentType::Menu] {
            let doc = ty.default_document("x");
            assert_eq!(Value::Object(doc), json!({"name": "x"}));
        }
    }

    #[test]
    fn test_document_name() {
        let doc = ContentType::Page.default_document("about");
        assert_eq!(document_name(&doc), Some("about"));
        assert_eq!(document_name(&Document::new()), None);
    }

    #[test]
    fn test_role_for_user() {
        assert_eq!(Role::for_user(None), Role::Guest);
        assert_eq!(Role::for_user(Some("admin")), Role::Admin);
        assert_eq!(Role::for_user(Some("editor")), Role::Users);
        assert_eq!(Role::Admin.to_string(), "admin");
    }
}
