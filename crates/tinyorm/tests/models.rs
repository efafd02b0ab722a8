mod common;

use common::{Torrent, TorrentPeer, TorrentPreviewableFile};
use common::{connect, int, row};
use tinyorm::prelude::*;

#[test]
fn lazy_belongs_to_with_null_key_runs_no_query() {
    let (db, mock) = connect();

    let mut peer = TorrentPeer::default();
    peer.fill([("id", int(1)), ("torrent_id", Value::Null)]);

    assert_eq!(peer.get_relation_value_one::<Torrent>(&db, "torrent").unwrap(), None);
    assert!(peer.relation_loaded("torrent"));
    assert!(mock.executed_sql().is_empty());
}

#[test]
fn lazy_has_many_loads_once_and_is_counted() {
    let (db, mock) = connect();
    mock.push_rows(vec![row(&[("id", int(1))])]);
    mock.push_rows(vec![
        row(&[("id", int(10)), ("torrent_id", int(1))]),
        row(&[("id", int(11)), ("torrent_id", int(1))]),
    ]);

    let mut torrent = Torrent::find_or_fail(&db, 1).unwrap();
    let files = torrent
        .get_relation_value::<TorrentPreviewableFile>(&db, "torrentFiles")
        .unwrap();
    assert_eq!(files.len(), 2);
    torrent
        .get_relation_value::<TorrentPreviewableFile>(&db, "torrentFiles")
        .unwrap();

    let sql = mock.executed_sql();
    assert_eq!(sql.len(), 2);
    assert_eq!(
        sql[1],
        r#"select * from "torrent_previewable_files" where "torrent_previewable_files"."torrent_id" = ? and "torrent_previewable_files"."torrent_id" is not null"#
    );
    assert_eq!(db.lazy_load_count("Torrent", "torrentFiles"), 1);
}

#[test]
fn find_or_fail_reports_the_model() {
    let (db, _mock) = connect();

    let err = Torrent::find_or_fail(&db, 5).unwrap_err();
    assert_eq!(err.to_string(), "No query results for model Torrent");
}

#[test]
fn wrong_related_type_is_rejected() {
    let (db, mock) = connect();
    mock.push_rows(vec![row(&[("id", int(1))])]);

    let torrents = Torrent::with(&db, ["torrentPeer"]).get(&["*"]).unwrap();

    assert!(matches!(
        torrents[0].get_relation_one::<Torrent>("torrentPeer"),
        Err(Error::RelationTypeMismatch { .. })
    ));
    assert!(torrents[0].get_relation::<TorrentPeer>("torrentPeer").is_err());
    assert!(matches!(
        torrents[0].get_relation_one::<TorrentPeer>("torrentFiles"),
        Err(Error::RelationTypeMismatch { .. })
    ));
}

#[test]
fn save_then_remove() {
    let (db, mock) = connect();
    mock.set_last_insert_id(4);

    let mut peer = TorrentPeer::default();
    peer.fill([("torrent_id", int(1)), ("seeds", int(3))]);
    peer.save(&db).unwrap();
    assert_eq!(peer.get_key(), Some(&int(4)));

    peer.set_attribute("seeds", 8);
    assert_eq!(peer.get_dirty().len(), 1);
    peer.save(&db).unwrap();
    assert!(peer.remove(&db).unwrap());
    assert!(!peer.exists());

    let executed = mock.executed();
    let executed = executed.borrow();
    assert_eq!(
        executed[0].0,
        r#"insert into "torrent_peers" ("torrent_id", "seeds") values (?, ?) returning "id""#
    );
    assert_eq!(
        executed[1].0,
        r#"update "torrent_peers" set "seeds" = ? where "id" = ?"#
    );
    assert_eq!(executed[1].1, vec![Value::Int(8), int(4)]);
    assert_eq!(executed[2].0, r#"delete from "torrent_peers" where "id" = ?"#);
}
