mod common;

use common::{Torrent, TorrentPeer, TorrentPreviewableFile, TorrentPreviewableFileProperty};
use common::{connect, int, row};
use tinyorm::prelude::*;

#[test]
fn two_parents_three_children_take_two_queries() {
    let (db, mock) = connect();
    mock.push_rows(vec![
        row(&[("id", int(1)), ("name", Value::from("alpha"))]),
        row(&[("id", int(2)), ("name", Value::from("beta"))]),
    ]);
    mock.push_rows(vec![
        row(&[("id", int(10)), ("torrent_id", int(2))]),
        row(&[("id", int(11)), ("torrent_id", int(1))]),
        row(&[("id", int(12)), ("torrent_id", int(2))]),
    ]);

    let torrents = Torrent::with(&db, ["torrentFiles"]).get(&["*"]).unwrap();

    let sql = mock.executed_sql();
    assert_eq!(sql.len(), 2);
    assert_eq!(sql[0], r#"select * from "torrents""#);
    assert_eq!(
        sql[1],
        r#"select * from "torrent_previewable_files" where "torrent_previewable_files"."torrent_id" in (?, ?)"#
    );

    let ids = |torrent: &Torrent| -> Vec<Value> {
        torrent
            .get_relation::<TorrentPreviewableFile>("torrentFiles")
            .unwrap()
            .iter()
            .filter_map(|f| f.get_key().cloned())
            .collect()
    };
    assert_eq!(ids(&torrents[0]), vec![int(11)]);
    assert_eq!(ids(&torrents[1]), vec![int(10), int(12)]);
}

#[test]
fn eager_keys_are_sorted_and_deduplicated() {
    let (db, mock) = connect();
    mock.push_rows(vec![
        row(&[("id", int(3)), ("torrent_id", int(7))]),
        row(&[("id", int(1)), ("torrent_id", int(5))]),
        row(&[("id", int(2)), ("torrent_id", int(7))]),
        row(&[("id", int(4)), ("torrent_id", Value::Null)]),
    ]);

    TorrentPeer::with(&db, ["torrent"]).get(&["*"]).unwrap();

    let executed = mock.executed();
    let executed = executed.borrow();
    assert_eq!(
        executed[1].0,
        r#"select * from "torrents" where "torrents"."id" in (?, ?)"#
    );
    assert_eq!(executed[1].1, vec![int(5), int(7)]);
}

#[test]
fn to_one_matching_is_last_wins() {
    let (db, mock) = connect();
    mock.push_rows(vec![row(&[("id", int(1))]), row(&[("id", int(2))])]);
    mock.push_rows(vec![
        row(&[("id", int(20)), ("torrent_id", int(1))]),
        row(&[("id", int(21)), ("torrent_id", int(1))]),
    ]);

    let torrents = Torrent::with(&db, ["torrentPeer"]).get(&["*"]).unwrap();

    let peer = torrents[0]
        .get_relation_one::<TorrentPeer>("torrentPeer")
        .unwrap()
        .unwrap();
    assert_eq!(peer.get_key(), Some(&int(21)));
    assert!(torrents[1].relation_loaded("torrentPeer"));
    assert_eq!(
        torrents[1].get_relation_one::<TorrentPeer>("torrentPeer").unwrap(),
        None
    );
}

#[test]
fn nested_relations_take_one_query_per_depth() {
    let (db, mock) = connect();
    mock.push_rows(vec![row(&[("id", int(1))]), row(&[("id", int(2))])]);
    mock.push_rows(vec![
        row(&[("id", int(10)), ("torrent_id", int(1))]),
        row(&[("id", int(11)), ("torrent_id", int(2))]),
    ]);
    mock.push_rows(vec![row(&[
        ("id", int(100)),
        ("previewable_file_id", int(11)),
        ("name", Value::from("video")),
    ])]);

    let torrents = Torrent::with(&db, ["torrentFiles.fileProperty"])
        .get(&["*"])
        .unwrap();

    let sql = mock.executed_sql();
    assert_eq!(sql.len(), 3);
    assert_eq!(
        sql[2],
        r#"select * from "torrent_previewable_file_properties" where "torrent_previewable_file_properties"."previewable_file_id" in (?, ?)"#
    );

    let files = torrents[1]
        .get_relation::<TorrentPreviewableFile>("torrentFiles")
        .unwrap();
    let property = files[0]
        .get_relation_one::<TorrentPreviewableFileProperty>("fileProperty")
        .unwrap()
        .unwrap();
    assert_eq!(property.get_attribute("name"), Some(&Value::from("video")));

    let files = torrents[0]
        .get_relation::<TorrentPreviewableFile>("torrentFiles")
        .unwrap();
    assert_eq!(
        files[0]
            .get_relation_one::<TorrentPreviewableFileProperty>("fileProperty")
            .unwrap(),
        None
    );
}

#[test]
fn constrained_eager_load() {
    let (db, mock) = connect();
    mock.push_rows(vec![row(&[("id", int(1))])]);

    let mut query = Torrent::query(&db);
    query
        .with(["torrentFiles:id,torrent_id"])
        .with_constrained("torrentPeer", |q| {
            q.where_("seeds", ">", 10)?;
            Ok(())
        });
    query.get(&["*"]).unwrap();

    let executed = mock.executed();
    let executed = executed.borrow();
    assert_eq!(
        executed[1].0,
        r#"select "torrent_previewable_files"."id", "torrent_previewable_files"."torrent_id" from "torrent_previewable_files" where "torrent_previewable_files"."torrent_id" in (?)"#
    );
    assert_eq!(
        executed[2].0,
        r#"select * from "torrent_peers" where "torrent_peers"."torrent_id" in (?) and "seeds" > ?"#
    );
    assert_eq!(executed[2].1, vec![int(1), Value::Int(10)]);
}

#[test]
fn no_parent_rows_means_no_eager_queries() {
    let (db, mock) = connect();

    let torrents = Torrent::with(&db, ["torrentFiles.fileProperty", "torrentPeer"])
        .get(&["*"])
        .unwrap();

    assert!(torrents.is_empty());
    assert_eq!(mock.executed_sql().len(), 1);
}

#[test]
fn unknown_relation_is_an_error() {
    let (db, mock) = connect();
    mock.push_rows(vec![row(&[("id", int(1))])]);

    let err = Torrent::with(&db, ["torrentFile"]).get(&["*"]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Undefined relation key (in relations) : torrentFile, on model Torrent"
    );
}

#[test]
fn relations_serialize_snake_cased() {
    let (db, mock) = connect();
    mock.push_rows(vec![row(&[("id", int(1))])]);
    mock.push_rows(vec![row(&[("id", int(10)), ("torrent_id", int(1))])]);

    let torrents = Torrent::with(&db, ["torrentFiles"]).get(&["*"]).unwrap();

    assert_eq!(
        torrents[0].to_json(),
        serde_json::json!({
            "id": 1,
            "torrent_files": [{ "id": 10, "torrent_id": 1 }],
        })
    );
}
