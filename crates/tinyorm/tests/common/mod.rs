#![allow(dead_code)]

use tinyorm::prelude::*;
use tinyorm::MockConnection;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Torrent {
    base: ModelBase,
}

impl HasTable for Torrent {
    const TABLE: &'static str = "torrents";
}

impl HasRelationRegistry for Torrent {
    const RELATIONS: &'static [RelationshipInfo] = &[
        RelationshipInfo::has_many("torrentFiles", "TorrentPreviewableFile"),
        RelationshipInfo::has_one("torrentPeer", "TorrentPeer"),
    ];

    fn visit_relation<V: RelationVisitor<Self>>(name: &str, visitor: V) -> Result<V::Output> {
        match name {
            "torrentFiles" => visitor.visit::<TorrentPreviewableFile>(),
            "torrentPeer" => visitor.visit::<TorrentPeer>(),
            _ => Err(relation_not_found::<Self>(name)),
        }
    }
}

impl Model for Torrent {
    fn base(&self) -> &ModelBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ModelBase {
        &mut self.base
    }

    fn from_base(base: ModelBase) -> Self {
        Self { base }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TorrentPreviewableFile {
    base: ModelBase,
}

impl HasTable for TorrentPreviewableFile {
    const TABLE: &'static str = "torrent_previewable_files";
}

impl HasRelationRegistry for TorrentPreviewableFile {
    const RELATIONS: &'static [RelationshipInfo] = &[
        RelationshipInfo::belongs_to("torrent", "Torrent"),
        RelationshipInfo::has_one("fileProperty", "TorrentPreviewableFileProperty")
            .foreign_key("previewable_file_id"),
    ];

    fn visit_relation<V: RelationVisitor<Self>>(name: &str, visitor: V) -> Result<V::Output> {
        match name {
            "torrent" => visitor.visit::<Torrent>(),
            "fileProperty" => visitor.visit::<TorrentPreviewableFileProperty>(),
            _ => Err(relation_not_found::<Self>(name)),
        }
    }
}

impl Model for TorrentPreviewableFile {
    fn base(&self) -> &ModelBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ModelBase {
        &mut self.base
    }

    fn from_base(base: ModelBase) -> Self {
        Self { base }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TorrentPreviewableFileProperty {
    base: ModelBase,
}

impl HasTable for TorrentPreviewableFileProperty {
    const TABLE: &'static str = "torrent_previewable_file_properties";
}

impl HasRelationRegistry for TorrentPreviewableFileProperty {
    const RELATIONS: &'static [RelationshipInfo] = &[RelationshipInfo::belongs_to(
        "torrentFile",
        "TorrentPreviewableFile",
    )
    .foreign_key("previewable_file_id")];

    fn visit_relation<V: RelationVisitor<Self>>(name: &str, visitor: V) -> Result<V::Output> {
        match name {
            "torrentFile" => visitor.visit::<TorrentPreviewableFile>(),
            _ => Err(relation_not_found::<Self>(name)),
        }
    }
}

impl Model for TorrentPreviewableFileProperty {
    fn base(&self) -> &ModelBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ModelBase {
        &mut self.base
    }

    fn from_base(base: ModelBase) -> Self {
        Self { base }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TorrentPeer {
    base: ModelBase,
}

impl HasTable for TorrentPeer {
    const TABLE: &'static str = "torrent_peers";
}

impl HasRelationRegistry for TorrentPeer {
    const RELATIONS: &'static [RelationshipInfo] =
        &[RelationshipInfo::belongs_to("torrent", "Torrent")];

    fn visit_relation<V: RelationVisitor<Self>>(name: &str, visitor: V) -> Result<V::Output> {
        match name {
            "torrent" => visitor.visit::<Torrent>(),
            _ => Err(relation_not_found::<Self>(name)),
        }
    }
}

impl Model for TorrentPeer {
    fn base(&self) -> &ModelBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ModelBase {
        &mut self.base
    }

    fn from_base(base: ModelBase) -> Self {
        Self { base }
    }
}

/// A connection wrapper plus a handle on the scripted driver behind it.
pub fn connect() -> (DatabaseConnection, MockConnection) {
    let mock = MockConnection::new();
    (DatabaseConnection::new(mock.clone()), mock)
}

pub fn row(pairs: &[(&str, Value)]) -> Row {
    Row::from_pairs(pairs.iter().cloned())
}

pub fn int(value: i64) -> Value {
    Value::BigInt(value)
}
