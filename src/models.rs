//! Wire shapes returned by the local API and the display entities they map
//! into.
//!
//! `Raw*` types mirror the JSON exactly. Display types carry resolved icons,
//! defaulted names and hex colours, and are what views and tools consume.

use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::icons::DisplayIcon;
use crate::pagination::Pagination;

pub const UNTITLED: &str = "Untitled";

pub const TAG_PROPERTY_KEY: &str = "tag";
pub const LAST_MODIFIED_DATE_KEY: &str = "last_modified_date";

// ---------------------------------------------------------------------------
// Icons
// ---------------------------------------------------------------------------

/// Icon descriptor as sent by the API. One tag is active per instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum ObjectIcon {
    Emoji { emoji: String },
    File { file: String },
    Icon { name: String, color: String },
    #[serde(other)]
    Unknown,
}

/// Reads an optional icon without failing the enclosing payload: a
/// descriptor missing its fields becomes [`ObjectIcon::Unknown`].
pub fn lenient_icon<'de, D>(deserializer: D) -> Result<Option<ObjectIcon>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.filter(|value| !value.is_null()).map(|value| {
        serde_json::from_value(value).unwrap_or_else(|err| {
            debug!(?err, "malformed icon descriptor");
            ObjectIcon::Unknown
        })
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectLayout {
    #[default]
    Basic,
    Profile,
    Action,
    Note,
    Bookmark,
    Set,
    Collection,
    Participant,
    Image,
    File,
    Video,
    Audio,
    Pdf,
    #[serde(other)]
    Unknown,
}

// ---------------------------------------------------------------------------
// Sorting
// ---------------------------------------------------------------------------

/// The list sort the user picked. Passed explicitly into mapping and
/// composition rather than read from ambient preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortPreference {
    Name,
    CreatedDate,
    #[default]
    LastModifiedDate,
    LastOpenedDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortPreference {
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "name" => Some(Self::Name),
            "created_date" => Some(Self::CreatedDate),
            "last_modified_date" => Some(Self::LastModifiedDate),
            "last_opened_date" => Some(Self::LastOpenedDate),
            _ => None,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::CreatedDate => "created_date",
            Self::LastModifiedDate => LAST_MODIFIED_DATE_KEY,
            Self::LastOpenedDate => "last_opened_date",
        }
    }

    /// Property whose date backs the list-row date accessory. Name sorting
    /// keeps the modification date as its secondary signal.
    pub fn date_key(&self) -> &'static str {
        match self {
            Self::Name => LAST_MODIFIED_DATE_KEY,
            other => other.key(),
        }
    }

    pub fn date_label(&self) -> &'static str {
        match self {
            Self::CreatedDate => "Created Date",
            Self::LastOpenedDate => "Last Opened Date",
            Self::Name | Self::LastModifiedDate => "Last Modified Date",
        }
    }

    pub fn short_label(&self) -> &'static str {
        match self {
            Self::CreatedDate => "Created",
            Self::LastOpenedDate => "Opened",
            Self::Name | Self::LastModifiedDate => "Modified",
        }
    }

    pub fn direction(&self) -> SortDirection {
        match self {
            Self::Name => SortDirection::Asc,
            _ => SortDirection::Desc,
        }
    }
}

// ---------------------------------------------------------------------------
// Members
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberStatus {
    Joining,
    Active,
    Removed,
    Declined,
    Removing,
    Canceled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Viewer,
    Editor,
    Owner,
    NoPermission,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawMember {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_icon")]
    pub icon: Option<ObjectIcon>,
    #[serde(default)]
    pub identity: String,
    #[serde(default)]
    pub global_name: String,
    pub status: MemberStatus,
    pub role: MemberRole,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Member {
    pub id: String,
    pub name: String,
    pub icon: DisplayIcon,
    pub identity: String,
    pub global_name: String,
    pub status: MemberStatus,
    pub role: MemberRole,
}

// ---------------------------------------------------------------------------
// Spaces
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct RawSpace {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_icon")]
    pub icon: Option<ObjectIcon>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub gateway_url: String,
    #[serde(default)]
    pub network_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Space {
    pub id: String,
    pub name: String,
    pub icon: DisplayIcon,
    pub description: String,
    pub gateway_url: String,
    pub network_id: String,
}

// ---------------------------------------------------------------------------
// Tags & properties
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTag {
    pub id: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tag {
    pub id: String,
    pub key: String,
    pub name: String,
    /// Hex colour, or the raw colour name when it has no table entry.
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyFormat {
    Text,
    Number,
    Select,
    MultiSelect,
    Date,
    Files,
    Checkbox,
    Url,
    Email,
    Phone,
    Objects,
    #[serde(untagged)]
    Other(String),
}

impl PropertyFormat {
    pub fn parse(value: &str) -> Self {
        match value {
            "text" => Self::Text,
            "number" => Self::Number,
            "select" => Self::Select,
            "multi_select" => Self::MultiSelect,
            "date" => Self::Date,
            "files" => Self::Files,
            "checkbox" => Self::Checkbox,
            "url" => Self::Url,
            "email" => Self::Email,
            "phone" => Self::Phone,
            "objects" => Self::Objects,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Select => "select",
            Self::MultiSelect => "multi_select",
            Self::Date => "date",
            Self::Files => "files",
            Self::Checkbox => "checkbox",
            Self::Url => "url",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Objects => "objects",
            Self::Other(other) => other,
        }
    }
}

/// Property definition without a value, as listed per space or per type.
#[derive(Debug, Clone, Deserialize)]
pub struct RawProperty {
    pub id: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub name: String,
    pub format: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Property {
    pub id: String,
    pub key: String,
    pub name: String,
    pub format: PropertyFormat,
}

/// Property carrying a value. The wire shape keeps every value slot
/// optional; `format` says which one is meaningful.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPropertyWithValue {
    pub id: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub name: String,
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<RawTag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multi_select: Option<Vec<RawTag>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkbox: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objects: Option<Vec<String>>,
}

/// A property value keyed by its format. Each variant carries only the slot
/// that format uses.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Text(String),
    Number(f64),
    Select(Option<Tag>),
    MultiSelect(Vec<Tag>),
    Date(String),
    Files(Vec<String>),
    Checkbox(bool),
    Url(String),
    Email(String),
    Phone(String),
    Objects(Vec<String>),
    Unknown { format: String },
}

impl PropertyValue {
    pub fn format(&self) -> PropertyFormat {
        match self {
            Self::Text(_) => PropertyFormat::Text,
            Self::Number(_) => PropertyFormat::Number,
            Self::Select(_) => PropertyFormat::Select,
            Self::MultiSelect(_) => PropertyFormat::MultiSelect,
            Self::Date(_) => PropertyFormat::Date,
            Self::Files(_) => PropertyFormat::Files,
            Self::Checkbox(_) => PropertyFormat::Checkbox,
            Self::Url(_) => PropertyFormat::Url,
            Self::Email(_) => PropertyFormat::Email,
            Self::Phone(_) => PropertyFormat::Phone,
            Self::Objects(_) => PropertyFormat::Objects,
            Self::Unknown { format } => PropertyFormat::Other(format.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyWithValue {
    pub id: String,
    pub key: String,
    pub name: String,
    pub value: PropertyValue,
}

impl PropertyWithValue {
    pub fn format(&self) -> PropertyFormat {
        self.value.format()
    }

    pub fn date(&self) -> Option<&str> {
        match &self.value {
            PropertyValue::Date(value) if !value.is_empty() => Some(value),
            _ => None,
        }
    }

    pub fn tags(&self) -> &[Tag] {
        match &self.value {
            PropertyValue::MultiSelect(tags) => tags,
            _ => &[],
        }
    }

    /// Rebuilds the flat wire record. Select values are written back as the
    /// tag record the API sent.
    pub fn to_raw(&self) -> RawPropertyWithValue {
        let mut raw = RawPropertyWithValue {
            id: self.id.clone(),
            key: self.key.clone(),
            name: self.name.clone(),
            format: self.format().as_str().to_string(),
            ..Default::default()
        };
        match &self.value {
            PropertyValue::Text(value) => raw.text = Some(value.clone()),
            PropertyValue::Number(value) => raw.number = Some(*value),
            PropertyValue::Select(tag) => raw.select = tag.as_ref().map(tag_to_raw),
            PropertyValue::MultiSelect(tags) => {
                raw.multi_select = Some(tags.iter().map(tag_to_raw).collect())
            }
            PropertyValue::Date(value) => raw.date = Some(value.clone()),
            PropertyValue::Files(value) => raw.files = Some(value.clone()),
            PropertyValue::Checkbox(value) => raw.checkbox = Some(*value),
            PropertyValue::Url(value) => raw.url = Some(value.clone()),
            PropertyValue::Email(value) => raw.email = Some(value.clone()),
            PropertyValue::Phone(value) => raw.phone = Some(value.clone()),
            PropertyValue::Objects(value) => raw.objects = Some(value.clone()),
            PropertyValue::Unknown { .. } => {}
        }
        raw
    }

    /// Body fragment accepted by create/update endpoints, where select
    /// values are referenced by tag id.
    pub fn to_request(&self) -> serde_json::Value {
        let mut body = serde_json::Map::new();
        body.insert("key".into(), self.key.clone().into());
        let value = match &self.value {
            PropertyValue::Text(v)
            | PropertyValue::Date(v)
            | PropertyValue::Url(v)
            | PropertyValue::Email(v)
            | PropertyValue::Phone(v) => Some(serde_json::Value::from(v.clone())),
            PropertyValue::Number(v) => Some(serde_json::Value::from(*v)),
            PropertyValue::Checkbox(v) => Some(serde_json::Value::from(*v)),
            PropertyValue::Select(tag) => tag.as_ref().map(|t| t.id.clone().into()),
            PropertyValue::MultiSelect(tags) => Some(
                tags.iter()
                    .map(|t| serde_json::Value::from(t.id.clone()))
                    .collect(),
            ),
            PropertyValue::Files(v) | PropertyValue::Objects(v) => {
                Some(v.iter().cloned().map(serde_json::Value::from).collect())
            }
            PropertyValue::Unknown { .. } => None,
        };
        if let Some(value) = value {
            body.insert(self.format().as_str().to_string(), value);
        }
        serde_json::Value::Object(body)
    }
}

fn tag_to_raw(tag: &Tag) -> RawTag {
    RawTag {
        id: tag.id.clone(),
        key: tag.key.clone(),
        name: tag.name.clone(),
        color: tag.color.clone(),
    }
}

// ---------------------------------------------------------------------------
// Types & objects
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct RawType {
    pub id: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub plural_name: String,
    #[serde(default, deserialize_with = "lenient_icon")]
    pub icon: Option<ObjectIcon>,
    #[serde(default)]
    pub layout: ObjectLayout,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub properties: Vec<RawProperty>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Type {
    pub id: String,
    pub key: String,
    pub name: String,
    pub plural_name: String,
    pub icon: DisplayIcon,
    pub layout: ObjectLayout,
    pub archived: bool,
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawSpaceObject {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_icon")]
    pub icon: Option<ObjectIcon>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub space_id: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub layout: ObjectLayout,
    #[serde(default, rename = "type")]
    pub object_type: Option<RawType>,
    #[serde(default)]
    pub properties: Vec<RawPropertyWithValue>,
    /// Present only on single-object fetches that request the body.
    #[serde(default)]
    pub markdown: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpaceObject {
    pub id: String,
    pub name: String,
    pub icon: DisplayIcon,
    pub archived: bool,
    pub space_id: String,
    pub snippet: String,
    pub layout: ObjectLayout,
    pub object_type: Option<Type>,
    pub properties: Vec<PropertyWithValue>,
    pub markdown: Option<String>,
}

impl SpaceObject {
    pub fn property(&self, key: &str) -> Option<&PropertyWithValue> {
        self.properties.iter().find(|p| p.key == key)
    }
}

/// Templates share the object shape.
pub type RawTemplate = RawSpaceObject;
pub type Template = SpaceObject;

// ---------------------------------------------------------------------------
// Envelopes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ListEnvelope<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpaceEnvelope {
    pub space: RawSpace,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectEnvelope {
    pub object: RawSpaceObject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemberEnvelope {
    pub member: RawMember,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PropertyEnvelope {
    pub property: RawProperty,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TagEnvelope {
    pub tag: RawTag,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TypeEnvelope {
    #[serde(rename = "type")]
    pub object_type: RawType,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateEnvelope {
    pub template: RawTemplate,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn malformed_icons_degrade_without_failing_the_list() {
        let envelope: ListEnvelope<RawMember> = serde_json::from_value(json!({
            "data": [
                {"id": "m1", "icon": {"format": "emoji"}, "status": "active", "role": "viewer"},
                {"id": "m2", "icon": {"format": "icon", "name": "person"},
                 "status": "joining", "role": "viewer"},
                {"id": "m3", "icon": null, "status": "active", "role": "owner"},
                {"id": "m4", "status": "active", "role": "owner"}
            ],
            "pagination": {"total": 4, "offset": 0, "limit": 10, "has_more": false}
        }))
        .unwrap();

        let icons: Vec<_> = envelope.data.iter().map(|m| m.icon.clone()).collect();
        assert_eq!(
            icons,
            vec![Some(ObjectIcon::Unknown), Some(ObjectIcon::Unknown), None, None]
        );

        let object: RawSpaceObject = serde_json::from_value(json!({
            "id": "o1",
            "icon": {"format": "file"},
            "type": {"id": "t1", "icon": {"format": "emoji", "emoji": "📄"}}
        }))
        .unwrap();
        assert_eq!(object.icon, Some(ObjectIcon::Unknown));
        assert_eq!(
            object.object_type.and_then(|t| t.icon),
            Some(ObjectIcon::Emoji { emoji: "📄".into() })
        );
    }

    #[test]
    fn icon_tags_deserialize_into_single_variants() {
        let emoji: ObjectIcon = serde_json::from_value(json!({"format": "emoji", "emoji": "📄"})).unwrap();
        assert_eq!(emoji, ObjectIcon::Emoji { emoji: "📄".into() });

        let named: ObjectIcon =
            serde_json::from_value(json!({"format": "icon", "name": "document", "color": "blue"}))
                .unwrap();
        assert_eq!(
            named,
            ObjectIcon::Icon {
                name: "document".into(),
                color: "blue".into()
            }
        );

        let unknown: ObjectIcon =
            serde_json::from_value(json!({"format": "sticker", "sticker": "x"})).unwrap();
        assert_eq!(unknown, ObjectIcon::Unknown);
    }

    #[test]
    fn unknown_layouts_do_not_fail_decoding() {
        let layout: ObjectLayout = serde_json::from_value(json!("chat")).unwrap();
        assert_eq!(layout, ObjectLayout::Unknown);
    }

    #[test]
    fn request_body_references_tags_by_id() {
        let property = PropertyWithValue {
            id: "p1".into(),
            key: "status".into(),
            name: "Status".into(),
            value: PropertyValue::Select(Some(Tag {
                id: "tag-done".into(),
                key: "done".into(),
                name: "Done".into(),
                color: "#5dd400".into(),
            })),
        };
        assert_eq!(
            property.to_request(),
            json!({"key": "status", "select": "tag-done"})
        );
        assert_eq!(property.to_raw().select.unwrap().id, "tag-done");
    }

    #[test]
    fn name_sort_uses_modified_date_for_accessories() {
        assert_eq!(SortPreference::Name.date_key(), LAST_MODIFIED_DATE_KEY);
        assert_eq!(SortPreference::CreatedDate.date_key(), "created_date");
        assert_eq!(SortPreference::Name.direction(), SortDirection::Asc);
    }
}
