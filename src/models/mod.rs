use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Treat an explicit JSON `null` the same as a missing field.
fn null_as_default<'de, D, T>(de: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(de)?.unwrap_or_default())
}

/// Identity returned by the hosted auth service.
///
/// Only the fields the client reads are modelled; everything else the service
/// sends is ignored.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    pub user: User,
}

/// A row of the `notes` table.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Note {
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_favorite: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update of a note. `None` fields are left untouched.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct NotePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_favorite: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_deleted: Option<bool>,
}

impl NotePatch {
    pub fn favorite(flag: bool) -> Self {
        Self {
            is_favorite: Some(flag),
            ..Default::default()
        }
    }

    pub fn deleted(flag: bool) -> Self {
        Self {
            is_deleted: Some(flag),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.is_favorite.is_none()
            && self.is_deleted.is_none()
    }

    pub fn apply_to(&self, note: &mut Note, now: DateTime<Utc>) {
        if let Some(title) = &self.title {
            note.title = title.clone();
        }
        if let Some(content) = &self.content {
            note.content = content.clone();
        }
        if let Some(flag) = self.is_favorite {
            note.is_favorite = flag;
        }
        if let Some(flag) = self.is_deleted {
            note.is_deleted = flag;
        }
        note.updated_at = now;
    }

    /// Column payload sent to the `notes` table, including the refreshed `updated_at`.
    pub fn to_fields(&self, now: DateTime<Utc>) -> serde_json::Value {
        let mut fields = serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}));
        if let Some(obj) = fields.as_object_mut() {
            obj.insert("updated_at".to_string(), serde_json::json!(now));
        }
        fields
    }
}

/// A row of the `tags` table.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Tag {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TagFields {
    pub name: String,
    pub color: String,
}

/// A row of the `note_tags` association table.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NoteTag {
    pub note_id: String,
    pub tag_id: String,
}

/// Structural filter for the note list. Selecting one replaces the other,
/// so a tag selection and a favorites/trash selection never coexist.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum NoteFilter {
    #[default]
    All,
    Favorites,
    Trash,
    Tag(String),
}

impl NoteFilter {
    pub fn tag_id(&self) -> Option<&str> {
        match self {
            NoteFilter::Tag(id) => Some(id.as_str()),
            _ => None,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            NoteFilter::All => "All Notes",
            NoteFilter::Favorites => "Favorites",
            NoteFilter::Trash => "Trash",
            NoteFilter::Tag(_) => "Tagged",
        }
    }
}

/// Layout of the note list, persisted between visits.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, strum::Display, strum::EnumString, strum::EnumIter,
)]
#[strum(serialize_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Grid,
    List,
}

/// Dismissible announcement banner shown above the dashboard.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct BannerSettings {
    pub text: String,
    pub background_color: String,
    pub text_color: String,
    #[serde(default = "default_true")]
    pub visible: bool,
}

fn default_true() -> bool {
    true
}

impl Default for BannerSettings {
    fn default() -> Self {
        Self {
            text: "Welcome to Duo. Import your browser bookmarks to get started.".to_string(),
            background_color: "#4F46E5".to_string(),
            text_color: "white".to_string(),
            visible: true,
        }
    }
}
