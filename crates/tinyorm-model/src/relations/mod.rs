//! Relations between models.
//!
//! A relation is built for one owner (lazy loading) or as an unconstrained
//! template (eager loading). In the second case the eager loader replaces the
//! single-owner predicate with a bulk `IN` over the keys of a whole page of
//! owners, runs one query and matches the results back client side.
//!
//! Relation kinds form a closed set ([`RelationObject`]); [`make_relation`]
//! picks the variant from the owner's [`RelationshipInfo`] and fills in the
//! default key names.

mod belongs_to;
mod has_one_or_many;

use std::cell::Cell;
use std::collections::BTreeSet;

pub use belongs_to::BelongsTo;
pub use has_one_or_many::HasOneOrMany;

use tinyorm_core::{Key, RelationshipInfo, RelationshipKind, Result};
use tinyorm_query::DatabaseConnection;

use crate::model::{Model, RelationSlot};
use crate::tiny_builder::TinyBuilder;

/// What a relation query returned.
#[derive(Debug, Clone, PartialEq)]
pub enum RelationResults<R> {
    Many(Vec<R>),
    One(Option<R>),
}

impl<R: Model> RelationResults<R> {
    /// Type-erase into a relation slot.
    #[must_use]
    pub fn into_slot(self) -> RelationSlot {
        match self {
            RelationResults::Many(models) => {
                RelationSlot::Many(models.into_iter().map(Model::into_base).collect())
            }
            RelationResults::One(model) => RelationSlot::One(model.map(Model::into_base)),
        }
    }
}

/// Operations every relation kind supports.
pub trait Relation<'db, P: Model, R: Model> {
    /// Add the single-owner predicate.
    fn add_constraints(&mut self);

    /// Add the bulk predicate for a page of owners.
    fn add_eager_constraints(&mut self, models: &[P]);

    /// Seed every owner's slot with the empty value for this arity.
    fn init_relation(&self, models: &mut [P], relation: &str);

    /// Assign `results` to their owners.
    fn match_models(&self, models: &mut [P], results: Vec<R>, relation: &str);

    /// Run the single-owner query. A null owner key yields the empty result
    /// without querying.
    fn get_results(&self) -> Result<RelationResults<R>>;

    /// The query of the related model.
    fn query(&self) -> &TinyBuilder<'db, R>;

    fn query_mut(&mut self) -> &mut TinyBuilder<'db, R>;

    /// Run the (eager constrained) query.
    fn get_eager(&self) -> Result<Vec<R>> {
        self.query().get(&["*"])
    }
}

/// One of the supported relation kinds.
#[derive(Debug, Clone)]
pub enum RelationObject<'db, P: Model, R: Model> {
    BelongsTo(BelongsTo<'db, P, R>),
    HasOne(HasOneOrMany<'db, P, R>),
    HasMany(HasOneOrMany<'db, P, R>),
}

/// Build the relation described by `info` for `parent`.
///
/// With `constraints` off the relation is a bare template: it carries no
/// single-owner predicate and is only used for eager loading.
pub fn make_relation<'db, P: Model, R: Model>(
    db: &'db DatabaseConnection,
    info: &RelationshipInfo,
    parent: P,
    constraints: bool,
) -> RelationObject<'db, P, R> {
    let query = TinyBuilder::<R>::new(db);
    let mut relation = match info.kind {
        RelationshipKind::BelongsTo => {
            let foreign_key = info.foreign_key.map_or_else(
                || format!("{}_{}", tinyorm_core::naming::to_snake(info.name), R::PRIMARY_KEY),
                str::to_string,
            );
            let owner_key = info.owner_key.unwrap_or(R::PRIMARY_KEY);
            RelationObject::BelongsTo(BelongsTo::new(
                query,
                parent,
                foreign_key,
                owner_key.to_string(),
                info.name,
            ))
        }
        RelationshipKind::HasOne | RelationshipKind::HasMany => {
            let foreign_key = info.foreign_key.map_or_else(P::foreign_key, str::to_string);
            let local_key = info.local_key.unwrap_or(P::PRIMARY_KEY);
            let relation = HasOneOrMany::new(
                query,
                parent,
                format!("{}.{foreign_key}", R::TABLE),
                local_key.to_string(),
                info.kind.is_many(),
            );
            if info.kind.is_many() {
                RelationObject::HasMany(relation)
            } else {
                RelationObject::HasOne(relation)
            }
        }
    };
    if constraints {
        relation.add_constraints();
    }
    relation
}

macro_rules! dispatch {
    ($self:expr, $relation:ident => $body:expr) => {
        match $self {
            RelationObject::BelongsTo($relation) => $body,
            RelationObject::HasOne($relation) | RelationObject::HasMany($relation) => $body,
        }
    };
}

impl<'db, P: Model, R: Model> Relation<'db, P, R> for RelationObject<'db, P, R> {
    fn add_constraints(&mut self) {
        dispatch!(self, r => r.add_constraints());
    }

    fn add_eager_constraints(&mut self, models: &[P]) {
        dispatch!(self, r => r.add_eager_constraints(models));
    }

    fn init_relation(&self, models: &mut [P], relation: &str) {
        dispatch!(self, r => r.init_relation(models, relation));
    }

    fn match_models(&self, models: &mut [P], results: Vec<R>, relation: &str) {
        dispatch!(self, r => r.match_models(models, results, relation));
    }

    fn get_results(&self) -> Result<RelationResults<R>> {
        dispatch!(self, r => r.get_results())
    }

    fn query(&self) -> &TinyBuilder<'db, R> {
        dispatch!(self, r => r.query())
    }

    fn query_mut(&mut self) -> &mut TinyBuilder<'db, R> {
        dispatch!(self, r => r.query_mut())
    }
}

/// Whether relation construction applies single-owner constraints.
///
/// Owned per model builder. [`Constraints::without`] turns them off for the
/// duration of one call and restores the previous state when the call returns,
/// errors and panics included.
#[derive(Debug, Clone)]
pub struct Constraints {
    enabled: Cell<bool>,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            enabled: Cell::new(true),
        }
    }
}

impl Constraints {
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled.get()
    }

    /// Run `scoped` with constraints disabled.
    pub fn without<T>(&self, scoped: impl FnOnce(bool) -> T) -> T {
        let _guard = ConstraintsGuard {
            constraints: self,
            previous: self.enabled.replace(false),
        };
        scoped(self.enabled())
    }
}

struct ConstraintsGuard<'a> {
    constraints: &'a Constraints,
    previous: bool,
}

impl Drop for ConstraintsGuard<'_> {
    fn drop(&mut self) {
        self.constraints.enabled.set(self.previous);
    }
}

/// Sorted, deduplicated non-null keys of `column` across `models`.
pub(crate) fn model_keys<M: Model>(models: &[M], column: &str) -> Vec<Key> {
    models
        .iter()
        .filter_map(|m| m.get_attribute(column).and_then(Key::from_value))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelBase;
    use crate::testing::{Torrent, TorrentPeer, TorrentPreviewableFile};
    use tinyorm_core::Value;
    use tinyorm_query::{BuildsWheres, MockConnection};

    fn torrent(id: i64) -> Torrent {
        let mut torrent = Torrent::default();
        torrent.set_attribute("id", id);
        torrent
    }

    #[test]
    fn test_model_keys_sorted_and_deduped() {
        let models = vec![torrent(3), torrent(1), torrent(3), Torrent::default(), torrent(2)];
        assert_eq!(
            model_keys(&models, "id"),
            vec![Key::Int(1), Key::Int(2), Key::Int(3)]
        );
    }

    #[test]
    fn test_constraints_restored_after_scoped_call() {
        let constraints = Constraints::default();
        let seen = constraints.without(|enabled| enabled);
        assert!(!seen);
        assert!(constraints.enabled());

        let result: std::result::Result<(), &str> = constraints.without(|_| Err("scoped call failed"));
        assert!(result.is_err());
        assert!(constraints.enabled());
    }

    #[test]
    fn test_constraints_restored_after_panic() {
        let constraints = Constraints::default();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _: () = constraints.without(|_| panic!("scoped call panicked"));
        }));
        assert!(outcome.is_err());
        assert!(constraints.enabled());
    }

    #[test]
    fn test_unconstrained_relation_has_no_wheres() {
        let db = DatabaseConnection::new(MockConnection::new());
        let info = find_info::<Torrent>("torrentFiles");
        let template = make_relation::<Torrent, TorrentPreviewableFile>(
            &db,
            info,
            Torrent::default(),
            false,
        );
        assert!(template.query().wheres().is_empty());
        assert!(matches!(template, RelationObject::HasMany(_)));
    }

    #[test]
    fn test_default_keys() {
        let db = DatabaseConnection::new(MockConnection::new());
        let relation = make_relation::<TorrentPeer, Torrent>(
            &db,
            find_info::<TorrentPeer>("torrent"),
            TorrentPeer::default(),
            false,
        );
        match relation {
            RelationObject::BelongsTo(r) => {
                assert_eq!(r.foreign_key(), "torrent_id");
                assert_eq!(r.owner_key(), "id");
            }
            other => panic!("expected belongsTo, got {other:?}"),
        }

        let relation = make_relation::<Torrent, TorrentPeer>(
            &db,
            find_info::<Torrent>("torrentPeer"),
            Torrent::default(),
            false,
        );
        match relation {
            RelationObject::HasOne(r) => {
                assert_eq!(r.foreign_key(), "torrent_peers.torrent_id");
                assert_eq!(r.local_key(), "id");
            }
            other => panic!("expected hasOne, got {other:?}"),
        }
    }

    #[test]
    fn test_into_slot() {
        let mut peer = TorrentPeer::default();
        peer.set_attribute("id", 1);
        let slot = RelationResults::One(Some(peer)).into_slot();
        assert_eq!(slot.len(), 1);
        let mut base = ModelBase::new();
        base.set_attribute("id", Value::Int(1));
        assert_eq!(slot, RelationSlot::One(Some(base)));
    }

    fn find_info<M: Model>(name: &str) -> &'static RelationshipInfo {
        crate::registry::get_relation_method::<M>(name).unwrap()
    }

    /// Deterministic linear congruential generator.
    struct Lcg(u64);

    impl Lcg {
        fn below(&mut self, bound: u64) -> u64 {
            self.0 = self
                .0
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            (self.0 >> 33) % bound
        }
    }

    fn model<M: Model>(pairs: &[(&str, Option<i64>)]) -> M {
        let mut model = M::default();
        model.fill(pairs.iter().map(|(k, v)| (*k, Value::from(*v))));
        model
    }

    fn key<M: Model>(model: &M) -> Option<Value> {
        model.get_key().cloned()
    }

    fn attr<M: Model>(model: &M, column: &str) -> Option<i64> {
        model.get_attribute(column).and_then(Value::as_i64)
    }

    /// Owners and related rows with random keys: unmatched foreign keys,
    /// duplicate owners, null keys and empty result sets all occur.
    fn scenario(rng: &mut Lcg) -> (u64, u64) {
        let owners = rng.below(21);
        let related = rng.below(51);
        (owners, related)
    }

    fn random_key(rng: &mut Lcg, owners: u64) -> Option<i64> {
        match rng.below(owners + 4) {
            0 => None,
            k => Some(k as i64),
        }
    }

    #[test]
    fn test_has_one_or_many_matching_against_filter() {
        let db = DatabaseConnection::new(MockConnection::new());
        let mut rng = Lcg(0x5eed);

        for _ in 0..200 {
            let (owners, related) = scenario(&mut rng);
            let mut torrents: Vec<Torrent> = (0..owners)
                .map(|_| model(&[("id", Some(rng.below(owners + 1) as i64 + 1))]))
                .collect();
            let files: Vec<TorrentPreviewableFile> = (0..related)
                .map(|id| {
                    model(&[
                        ("id", Some(id as i64)),
                        ("torrent_id", random_key(&mut rng, owners)),
                    ])
                })
                .collect();
            let peers: Vec<TorrentPeer> = files
                .iter()
                .map(|f| {
                    model(&[
                        ("id", attr(f, "id")),
                        ("torrent_id", attr(f, "torrent_id")),
                    ])
                })
                .collect();

            let many = make_relation::<Torrent, TorrentPreviewableFile>(
                &db,
                find_info::<Torrent>("torrentFiles"),
                Torrent::default(),
                false,
            );
            many.init_relation(&mut torrents, "torrentFiles");
            many.match_models(&mut torrents, files.clone(), "torrentFiles");

            let one = make_relation::<Torrent, TorrentPeer>(
                &db,
                find_info::<Torrent>("torrentPeer"),
                Torrent::default(),
                false,
            );
            one.init_relation(&mut torrents, "torrentPeer");
            one.match_models(&mut torrents, peers.clone(), "torrentPeer");

            for torrent in &torrents {
                let id = attr(torrent, "id");
                let expected: Vec<Option<Value>> = files
                    .iter()
                    .filter(|f| attr(*f, "torrent_id") == id)
                    .map(key)
                    .collect();
                let actual: Vec<Option<Value>> = torrent
                    .get_relation::<TorrentPreviewableFile>("torrentFiles")
                    .unwrap()
                    .iter()
                    .map(key)
                    .collect();
                assert_eq!(actual, expected);

                let expected = peers
                    .iter()
                    .rev()
                    .find(|p| attr(*p, "torrent_id") == id)
                    .and_then(key);
                let actual = torrent
                    .get_relation_one::<TorrentPeer>("torrentPeer")
                    .unwrap()
                    .and_then(|p| key(&p));
                assert_eq!(actual, expected);
            }
        }
    }

    #[test]
    fn test_belongs_to_matching_against_filter() {
        let db = DatabaseConnection::new(MockConnection::new());
        let mut rng = Lcg(0xfeed);

        for _ in 0..200 {
            let (owners, children) = scenario(&mut rng);
            let mut peers: Vec<TorrentPeer> = (0..children)
                .map(|id| {
                    model(&[
                        ("id", Some(id as i64)),
                        ("torrent_id", random_key(&mut rng, owners)),
                    ])
                })
                .collect();
            // Owner ids repeat; the owner row seen last must win.
            let torrents: Vec<Torrent> = (0..owners)
                .map(|row| {
                    model(&[
                        ("id", Some(rng.below(owners + 1) as i64 + 1)),
                        ("row", Some(row as i64)),
                    ])
                })
                .collect();

            let relation = make_relation::<TorrentPeer, Torrent>(
                &db,
                find_info::<TorrentPeer>("torrent"),
                TorrentPeer::default(),
                false,
            );
            relation.init_relation(&mut peers, "torrent");
            relation.match_models(&mut peers, torrents.clone(), "torrent");

            for peer in &peers {
                let foreign = attr(peer, "torrent_id");
                let expected = torrents
                    .iter()
                    .rev()
                    .find(|t| foreign.is_some() && attr(*t, "id") == foreign)
                    .and_then(|t| attr(t, "row"));
                let actual = peer
                    .get_relation_one::<Torrent>("torrent")
                    .unwrap()
                    .and_then(|t| attr(&t, "row"));
                assert_eq!(actual, expected);
            }
        }
    }
}
