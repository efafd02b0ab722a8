//! Fixture models shared by the unit tests.

use tinyorm_core::{RelationshipInfo, Result};

use crate::model::{HasRelationRegistry, HasTable, Model, ModelBase};
use crate::registry::{RelationVisitor, relation_not_found};

macro_rules! fixture {
    ($name:ident, $table:literal) => {
        #[derive(Debug, Clone, Default, PartialEq)]
        pub struct $name {
            base: ModelBase,
        }

        impl HasTable for $name {
            const TABLE: &'static str = $table;
        }

        impl Model for $name {
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
    };
}

fixture!(Torrent, "torrents");
fixture!(TorrentPreviewableFile, "torrent_previewable_files");
fixture!(TorrentPreviewableFileProperty, "torrent_previewable_file_properties");
fixture!(TorrentPeer, "torrent_peers");

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

impl HasRelationRegistry for TorrentPreviewableFileProperty {}

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
