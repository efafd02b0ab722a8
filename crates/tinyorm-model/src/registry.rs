//! Relation name resolution.
//!
//! A model's `RELATIONS` table says what kind of relation a name is; its
//! `visit_relation` says which model type sits on the other side. The engine
//! never needs reflection: it looks the name up in the table, then asks the
//! model to call a [`RelationVisitor`] with the related type bound, and checks
//! that both views agree.

use tinyorm_core::{Error, RelationshipInfo, Result, find_relationship};

use crate::model::{HasRelationRegistry, HasTable, Model};

/// Continues a relation operation once the related type is known.
///
/// `P` is the owner model whose relation is being visited.
pub trait RelationVisitor<P> {
    type Output;

    fn visit<R: Model>(self) -> Result<Self::Output>;
}

/// The "undefined relation" error for `M`.
#[must_use]
pub fn relation_not_found<M: HasTable>(relation: &str) -> Error {
    Error::RelationNotFound {
        model: M::base_name().to_string(),
        relation: relation.to_string(),
    }
}

/// Registry entry for `relation`, or [`Error::RelationNotFound`].
pub fn get_relation_method<M: HasRelationRegistry>(
    relation: &str,
) -> Result<&'static RelationshipInfo> {
    find_relationship(M::RELATIONS, relation).ok_or_else(|| relation_not_found::<M>(relation))
}

/// Fail unless `R` is the related model declared by `info`.
pub fn ensure_related<P: HasTable, R: HasTable>(info: &RelationshipInfo) -> Result<()> {
    if info.related == R::base_name() {
        Ok(())
    } else {
        Err(Error::RelationTypeMismatch {
            model: P::base_name().to_string(),
            relation: info.name.to_string(),
            expected: info.related.to_string(),
            requested: R::base_name().to_string(),
        })
    }
}

/// Checks the visited type against the registry before forwarding.
struct Checked<V> {
    info: &'static RelationshipInfo,
    inner: V,
}

impl<P: HasTable, V: RelationVisitor<P>> RelationVisitor<P> for Checked<V> {
    type Output = V::Output;

    fn visit<R: Model>(self) -> Result<Self::Output> {
        ensure_related::<P, R>(self.info)?;
        self.inner.visit::<R>()
    }
}

/// Resolve `relation` on `M` and run `visitor` with the related type bound.
pub fn resolve_relation<M, V>(relation: &str, visitor: V) -> Result<V::Output>
where
    M: Model,
    V: RelationVisitor<M>,
{
    let info = get_relation_method::<M>(relation)?;
    M::visit_relation(relation, Checked { info, inner: visitor })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Torrent, TorrentPeer, TorrentPreviewableFileProperty};

    struct RelatedName;

    impl<P> RelationVisitor<P> for RelatedName {
        type Output = &'static str;

        fn visit<R: Model>(self) -> Result<&'static str> {
            Ok(R::base_name())
        }
    }

    #[test]
    fn test_resolve_is_stable() {
        let first = resolve_relation::<Torrent, _>("torrentFiles", RelatedName).unwrap();
        let second = resolve_relation::<Torrent, _>("torrentFiles", RelatedName).unwrap();
        assert_eq!(first, "TorrentPreviewableFile");
        assert_eq!(first, second);
        assert_eq!(
            resolve_relation::<TorrentPeer, _>("torrent", RelatedName).unwrap(),
            "Torrent"
        );
    }

    #[test]
    fn test_unknown_relation() {
        let err = resolve_relation::<Torrent, _>("torrentFile", RelatedName).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Undefined relation key (in relations) : torrentFile, on model Torrent"
        );
        assert!(get_relation_method::<Torrent>("torrentPeer").is_ok());
    }

    #[test]
    fn test_model_without_relations_visits_nothing() {
        let err =
            TorrentPreviewableFileProperty::visit_relation("torrentFile", RelatedName).unwrap_err();
        assert!(matches!(
            err,
            Error::RelationNotFound { ref model, ref relation }
                if model == "TorrentPreviewableFileProperty" && relation == "torrentFile"
        ));
    }

    #[test]
    fn test_type_mismatch_detected() {
        let info = get_relation_method::<Torrent>("torrentPeer").unwrap();
        assert!(ensure_related::<Torrent, TorrentPeer>(info).is_ok());
        assert!(matches!(
            ensure_related::<Torrent, Torrent>(info),
            Err(Error::RelationTypeMismatch { .. })
        ));
    }
}
