use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracing::debug;

use crate::icons::{BuiltinIcon, DisplayIcon};
use crate::models::{SortPreference, SpaceObject, Tag, TAG_PROPERTY_KEY};

const NEVER_TEXT: &str = "—";

/// Refresh hook handed to a list row so actions can revalidate the lists
/// that show it.
pub type MutateCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Accessory {
    Icon { icon: DisplayIcon, tooltip: String },
    Text { text: String, tooltip: String },
    Date { date: DateTime<Utc>, tooltip: String },
    Tags { tags: Vec<Tag>, tooltip: String },
    /// Keeps the tag slot when an object carries no tags.
    Empty,
}

impl Accessory {
    pub fn tooltip(&self) -> Option<&str> {
        match self {
            Accessory::Icon { tooltip, .. }
            | Accessory::Text { tooltip, .. }
            | Accessory::Date { tooltip, .. }
            | Accessory::Tags { tooltip, .. } => Some(tooltip),
            Accessory::Empty => None,
        }
    }
}

#[derive(Clone)]
pub struct ListRow {
    pub object: SpaceObject,
    pub is_pinned: bool,
    pub accessories: Vec<Accessory>,
    pub mutate: Vec<MutateCallback>,
}

impl fmt::Debug for ListRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListRow")
            .field("object", &self.object.id)
            .field("is_pinned", &self.is_pinned)
            .field("accessories", &self.accessories)
            .field("mutate", &self.mutate.len())
            .finish()
    }
}

impl ListRow {
    pub fn revalidate(&self) {
        for mutate in &self.mutate {
            mutate();
        }
    }
}

/// Decorates a mapped object for the list view.
///
/// Slot order: pin star or date, tags, date (when the star took the first
/// slot), type.
pub fn process_object(
    object: SpaceObject,
    is_pinned: bool,
    mutate: Vec<Option<MutateCallback>>,
    sort: SortPreference,
) -> ListRow {
    let date = date_accessory(&object, sort);
    let mut accessories = Vec::with_capacity(4);

    if is_pinned {
        accessories.push(Accessory::Icon {
            icon: DisplayIcon::builtin(BuiltinIcon::Star),
            tooltip: "Pinned".to_string(),
        });
        accessories.push(tag_accessory(&object));
        accessories.push(date);
    } else {
        accessories.push(date);
        accessories.push(tag_accessory(&object));
    }
    accessories.push(type_accessory(&object));

    ListRow {
        object,
        is_pinned,
        accessories,
        mutate: mutate.into_iter().flatten().collect(),
    }
}

fn tag_accessory(object: &SpaceObject) -> Accessory {
    let tags = object
        .property(TAG_PROPERTY_KEY)
        .map(|property| property.tags().to_vec())
        .unwrap_or_default();
    if tags.is_empty() {
        return Accessory::Empty;
    }
    let names: Vec<&str> = tags.iter().map(|tag| tag.name.as_str()).collect();
    Accessory::Tags {
        tooltip: format!("Tags: {}", names.join(", ")),
        tags,
    }
}

fn date_accessory(object: &SpaceObject, sort: SortPreference) -> Accessory {
    let date = object
        .property(sort.date_key())
        .and_then(|property| property.date())
        .and_then(parse_date)
        .filter(|date| date.timestamp() != 0);

    match date {
        Some(date) => Accessory::Date {
            date,
            tooltip: format!(
                "{}: {}",
                sort.date_label(),
                date.to_rfc3339_opts(SecondsFormat::Secs, true)
            ),
        },
        None => Accessory::Text {
            text: NEVER_TEXT.to_string(),
            tooltip: format!("Never {}", sort.short_label()),
        },
    }
}

const NAIVE_DATE_TIME_FORMATS: [&str; 3] =
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"];

/// Accepts RFC 3339, zone-less date-times (read as UTC) and bare dates
/// (midnight UTC).
fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(date) = DateTime::parse_from_rfc3339(value) {
        return Some(date.with_timezone(&Utc));
    }
    if let Some(date) = NAIVE_DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
    {
        return Some(date.and_utc());
    }
    if let Some(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Some(date.and_utc());
    }
    debug!(value, "unparseable date property");
    None
}

fn type_accessory(object: &SpaceObject) -> Accessory {
    match &object.object_type {
        Some(object_type) => Accessory::Icon {
            icon: object_type.icon.clone(),
            tooltip: format!("Type: {}", object_type.name),
        },
        None => Accessory::Icon {
            icon: DisplayIcon::fallback_for(object.layout),
            tooltip: "Type: Unknown".to_string(),
        },
    }
}
