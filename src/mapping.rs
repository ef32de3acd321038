//! Raw API payloads to display entities.
//!
//! Mapping never mutates its input. Batch variants keep order and fail as a
//! whole when any element fails.

use futures_util::future::try_join_all;
use tracing::warn;

use crate::errors::{AppError, AppResult};
use crate::icons::{color_hex, IconResolver};
use crate::models::{
    Member, ObjectLayout, Property, PropertyFormat, PropertyValue, PropertyWithValue, RawMember,
    RawProperty, RawPropertyWithValue, RawSpace, RawSpaceObject, RawTag, RawType, SortPreference,
    Space, SpaceObject, Tag, Type, LAST_MODIFIED_DATE_KEY, TAG_PROPERTY_KEY, UNTITLED,
};

const SNIPPET_ELLIPSIS: &str = "...";

pub fn normalize_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        UNTITLED.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Object title: the name, else the snippet's first line, else "Untitled".
pub fn object_name(name: &str, snippet: &str) -> String {
    let trimmed = name.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }
    if let Some((first_line, _)) = snippet.split_once('\n') {
        return format!("{first_line}{SNIPPET_ELLIPSIS}");
    }
    normalize_name(snippet)
}

fn ensure_id(kind: &str, id: &str) -> AppResult<()> {
    if id.trim().is_empty() {
        return Err(AppError::Mapping(format!("{kind} is missing an id")));
    }
    Ok(())
}

pub fn map_tag(raw: &RawTag) -> AppResult<Tag> {
    ensure_id("tag", &raw.id)?;
    Ok(Tag {
        id: raw.id.clone(),
        key: raw.key.clone(),
        name: normalize_name(&raw.name),
        color: color_hex(&raw.color)
            .map(str::to_string)
            .unwrap_or_else(|| raw.color.clone()),
    })
}

pub fn map_tags(raw: &[RawTag]) -> AppResult<Vec<Tag>> {
    raw.iter().map(map_tag).collect()
}

pub fn map_property(raw: &RawProperty) -> AppResult<Property> {
    ensure_id("property", &raw.id)?;
    let format = PropertyFormat::parse(&raw.format);
    if let PropertyFormat::Other(other) = &format {
        warn!(format = %other, key = %raw.key, "unknown property format");
    }
    Ok(Property {
        id: raw.id.clone(),
        key: raw.key.clone(),
        name: normalize_name(&raw.name),
        format,
    })
}

pub fn map_properties(raw: &[RawProperty]) -> AppResult<Vec<Property>> {
    raw.iter().map(map_property).collect()
}

pub fn map_property_value(raw: &RawPropertyWithValue) -> AppResult<PropertyWithValue> {
    ensure_id("property", &raw.id)?;
    let value = match PropertyFormat::parse(&raw.format) {
        PropertyFormat::Text => PropertyValue::Text(raw.text.clone().unwrap_or_default()),
        PropertyFormat::Number => PropertyValue::Number(raw.number.unwrap_or(0.0)),
        PropertyFormat::Checkbox => PropertyValue::Checkbox(raw.checkbox.unwrap_or(false)),
        PropertyFormat::Date => PropertyValue::Date(raw.date.clone().unwrap_or_default()),
        PropertyFormat::Url => PropertyValue::Url(trimmed_or_empty(raw.url.as_deref())),
        PropertyFormat::Email => PropertyValue::Email(trimmed_or_empty(raw.email.as_deref())),
        PropertyFormat::Phone => PropertyValue::Phone(trimmed_or_empty(raw.phone.as_deref())),
        PropertyFormat::Select => PropertyValue::Select(raw.select.as_ref().map(map_tag).transpose()?),
        PropertyFormat::MultiSelect => {
            PropertyValue::MultiSelect(map_tags(raw.multi_select.as_deref().unwrap_or_default())?)
        }
        PropertyFormat::Files => PropertyValue::Files(raw.files.clone().unwrap_or_default()),
        PropertyFormat::Objects => PropertyValue::Objects(raw.objects.clone().unwrap_or_default()),
        PropertyFormat::Other(format) => {
            warn!(format = %format, key = %raw.key, "unknown property format");
            PropertyValue::Unknown { format }
        }
    };

    Ok(PropertyWithValue {
        id: raw.id.clone(),
        key: raw.key.clone(),
        name: normalize_name(&raw.name),
        value,
    })
}

pub fn map_property_values(raw: &[RawPropertyWithValue]) -> AppResult<Vec<PropertyWithValue>> {
    raw.iter().map(map_property_value).collect()
}

fn trimmed_or_empty(value: Option<&str>) -> String {
    value.map(str::trim).unwrap_or_default().to_string()
}

/// Properties kept on list rows. Name sorting keeps only the modification
/// date; any date sort keeps its own date plus the tags.
pub fn list_properties(
    properties: &[RawPropertyWithValue],
    sort: SortPreference,
) -> Vec<&RawPropertyWithValue> {
    properties
        .iter()
        .filter(|property| match sort {
            SortPreference::Name => property.key == LAST_MODIFIED_DATE_KEY,
            other => property.key == other.key() || property.key == TAG_PROPERTY_KEY,
        })
        .collect()
}

pub async fn map_member(raw: &RawMember, icons: &IconResolver) -> AppResult<Member> {
    ensure_id("member", &raw.id)?;
    let icon = icons
        .resolve(raw.icon.as_ref(), ObjectLayout::Participant)
        .await;
    Ok(Member {
        id: raw.id.clone(),
        name: normalize_name(&raw.name),
        icon,
        identity: raw.identity.clone(),
        global_name: raw.global_name.clone(),
        status: raw.status,
        role: raw.role,
    })
}

pub async fn map_members(raw: &[RawMember], icons: &IconResolver) -> AppResult<Vec<Member>> {
    try_join_all(raw.iter().map(|member| map_member(member, icons))).await
}

pub async fn map_space(raw: &RawSpace, icons: &IconResolver) -> AppResult<Space> {
    ensure_id("space", &raw.id)?;
    let icon = icons.resolve(raw.icon.as_ref(), ObjectLayout::Basic).await;
    Ok(Space {
        id: raw.id.clone(),
        name: normalize_name(&raw.name),
        icon,
        description: raw.description.clone(),
        gateway_url: raw.gateway_url.clone(),
        network_id: raw.network_id.clone(),
    })
}

pub async fn map_spaces(raw: &[RawSpace], icons: &IconResolver) -> AppResult<Vec<Space>> {
    try_join_all(raw.iter().map(|space| map_space(space, icons))).await
}

pub async fn map_type(raw: &RawType, icons: &IconResolver) -> AppResult<Type> {
    ensure_id("type", &raw.id)?;
    let icon = icons.resolve(raw.icon.as_ref(), raw.layout).await;
    Ok(Type {
        id: raw.id.clone(),
        key: raw.key.clone(),
        name: normalize_name(&raw.name),
        plural_name: raw.plural_name.trim().to_string(),
        icon,
        layout: raw.layout,
        archived: raw.archived,
        properties: map_properties(&raw.properties)?,
    })
}

pub async fn map_types(raw: &[RawType], icons: &IconResolver) -> AppResult<Vec<Type>> {
    try_join_all(raw.iter().map(|object_type| map_type(object_type, icons))).await
}

/// Detail mapping: every property is kept and the body passes through.
pub async fn map_object(raw: &RawSpaceObject, icons: &IconResolver) -> AppResult<SpaceObject> {
    let properties = map_property_values(&raw.properties)?;
    build_object(raw, properties, icons).await
}

/// List mapping: properties are narrowed to what the row needs for `sort`.
pub async fn map_objects(
    raw: &[RawSpaceObject],
    icons: &IconResolver,
    sort: SortPreference,
) -> AppResult<Vec<SpaceObject>> {
    try_join_all(raw.iter().map(|object| async move {
        let properties = list_properties(&object.properties, sort)
            .into_iter()
            .map(map_property_value)
            .collect::<AppResult<Vec<_>>>()?;
        build_object(object, properties, icons).await
    }))
    .await
}

async fn build_object(
    raw: &RawSpaceObject,
    properties: Vec<PropertyWithValue>,
    icons: &IconResolver,
) -> AppResult<SpaceObject> {
    ensure_id("object", &raw.id)?;
    let icon = icons.resolve(raw.icon.as_ref(), raw.layout).await;
    let object_type = match &raw.object_type {
        Some(object_type) => Some(map_type(object_type, icons).await?),
        None => None,
    };

    Ok(SpaceObject {
        id: raw.id.clone(),
        name: object_name(&raw.name, &raw.snippet),
        icon,
        archived: raw.archived,
        space_id: raw.space_id.clone(),
        snippet: raw.snippet.clone(),
        layout: raw.layout,
        object_type,
        properties,
        markdown: raw.markdown.clone(),
    })
}
