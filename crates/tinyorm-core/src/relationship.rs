//! Relationship metadata for TinyORM Rust.
//!
//! Each model declares its relations as a static table of [`RelationshipInfo`]
//! entries. The table says *what kind* of relation a name refers to and which
//! keys to use; the model's relation visitor supplies the concrete related
//! type for the same name. Together they let the eager loader build the right
//! relation without runtime reflection.

/// The kind of relationship between two models.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RelationshipKind {
    /// Inverse one-to-many: a `TorrentPeer` belongs to one `Torrent`.
    #[default]
    BelongsTo,
    /// One-to-one: a `Torrent` has one `TorrentPeer`.
    HasOne,
    /// One-to-many: a `Torrent` has many `TorrentPreviewableFile`s.
    HasMany,
}

impl RelationshipKind {
    /// Whether the relation holds a collection.
    #[must_use]
    pub const fn is_many(self) -> bool {
        matches!(self, RelationshipKind::HasMany)
    }

    /// Lower camel case name, as used in diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            RelationshipKind::BelongsTo => "belongsTo",
            RelationshipKind::HasOne => "hasOne",
            RelationshipKind::HasMany => "hasMany",
        }
    }
}

/// Metadata about one named relation on a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationshipInfo {
    /// Relation name, as passed to `with`.
    pub name: &'static str,

    /// Base name of the related model (e.g. `"TorrentPeer"`).
    pub related: &'static str,

    /// Kind of relationship.
    pub kind: RelationshipKind,

    /// Foreign key column. On `BelongsTo` it lives on this model, otherwise on
    /// the related one. Guessed from model names when absent.
    pub foreign_key: Option<&'static str>,

    /// Parent key matched by a `HasOne`/`HasMany` foreign key.
    /// Defaults to this model's primary key.
    pub local_key: Option<&'static str>,

    /// Key on the related model matched by a `BelongsTo` foreign key.
    /// Defaults to the related primary key.
    pub owner_key: Option<&'static str>,
}

impl RelationshipInfo {
    /// Create a new relationship with required fields.
    #[must_use]
    pub const fn new(name: &'static str, related: &'static str, kind: RelationshipKind) -> Self {
        Self {
            name,
            related,
            kind,
            foreign_key: None,
            local_key: None,
            owner_key: None,
        }
    }

    /// Shorthand for a `BelongsTo` relation.
    #[must_use]
    pub const fn belongs_to(name: &'static str, related: &'static str) -> Self {
        Self::new(name, related, RelationshipKind::BelongsTo)
    }

    /// Shorthand for a `HasOne` relation.
    #[must_use]
    pub const fn has_one(name: &'static str, related: &'static str) -> Self {
        Self::new(name, related, RelationshipKind::HasOne)
    }

    /// Shorthand for a `HasMany` relation.
    #[must_use]
    pub const fn has_many(name: &'static str, related: &'static str) -> Self {
        Self::new(name, related, RelationshipKind::HasMany)
    }

    /// Set the foreign key column.
    #[must_use]
    pub const fn foreign_key(mut self, key: &'static str) -> Self {
        self.foreign_key = Some(key);
        self
    }

    /// Set the parent key (`HasOne`/`HasMany`).
    #[must_use]
    pub const fn local_key(mut self, key: &'static str) -> Self {
        self.local_key = Some(key);
        self
    }

    /// Set the owner key (`BelongsTo`).
    #[must_use]
    pub const fn owner_key(mut self, key: &'static str) -> Self {
        self.owner_key = Some(key);
        self
    }
}

impl Default for RelationshipInfo {
    fn default() -> Self {
        Self::new("", "", RelationshipKind::default())
    }
}

/// Find a relationship by name in a model's relation table.
#[must_use]
pub fn find_relationship<'a>(
    relations: &'a [RelationshipInfo],
    name: &str,
) -> Option<&'a RelationshipInfo> {
    relations.iter().find(|r| r.name == name)
}
