use bson::{Bson, doc};
use mangrove::errors::Error;
use mangrove::query::{OutTarget, QueryResult};
use mangrove::test_support::RecordingDriver;
use mangrove::{Collection, Database};
use std::sync::Arc;

fn fixture() -> (Arc<RecordingDriver>, Collection) {
    let driver = Arc::new(RecordingDriver::new());
    let db = Database::new("testdb", driver.clone());
    let collection = db.collection("users");
    (driver, collection)
}

#[test]
fn distinct_compiles_and_shapes_result() {
    let (driver, collection) = fixture();
    driver.push_reply(doc! {"ok": 1, "result": [18, 21, 65]});

    let query = collection
        .query()
        .distinct("age")
        .field("active")
        .equals(true)
        .unwrap()
        .query(doc! {"maxTimeMS": 500});
    let result = query.execute().unwrap();

    assert_eq!(
        driver.last_command().unwrap(),
        doc! {"distinct": "users", "key": "age", "query": {"active": true}, "maxTimeMS": 500}
    );
    match result {
        QueryResult::Values(values) => {
            assert_eq!(values, vec![Bson::Int32(18), Bson::Int32(21), Bson::Int32(65)]);
        }
        other => panic!("expected values, got {other:?}"),
    }
}

#[test]
fn distinct_defaults_to_empty_result() {
    let (driver, collection) = fixture();
    driver.push_reply(doc! {"ok": 1});
    let result = collection.query().distinct("age").query(doc! {}).execute().unwrap();
    match result {
        QueryResult::Values(values) => assert!(values.is_empty()),
        other => panic!("expected values, got {other:?}"),
    }
}

#[test]
fn find_and_update_command_shape() {
    let (driver, collection) = fixture();
    driver.push_reply(doc! {"ok": 1, "value": {"_id": 7, "name": "alice"}});

    let query = collection
        .query()
        .find_and_update()
        .field("name")
        .equals("alice")
        .unwrap()
        .field("visits")
        .inc(1)
        .unwrap()
        .sort("name", "asc")
        .select(["name"])
        .return_new(true)
        .upsert(true)
        .query(doc! {});
    let result = query.execute().unwrap();

    assert_eq!(
        driver.last_command().unwrap(),
        doc! {
            "findandmodify": "users",
            "query": {"name": "alice"},
            "update": {"$inc": {"visits": 1}},
            "sort": {"name": 1},
            "fields": {"name": 1},
            "new": true,
            "upsert": true
        }
    );
    assert_eq!(
        result.into_document(),
        Some(doc! {"_id": 7, "name": "alice"})
    );
}

#[test]
fn find_and_modify_not_found_is_not_an_error() {
    let (driver, collection) = fixture();
    driver.push_reply(doc! {"ok": 1, "value": null});
    let result = collection
        .query()
        .find_and_update()
        .field("name")
        .equals("nobody")
        .unwrap()
        .query(doc! {})
        .execute()
        .unwrap();
    match result {
        QueryResult::Document(value) => assert!(value.is_none()),
        other => panic!("expected document result, got {other:?}"),
    }
}

#[test]
fn find_and_remove_compiles_remove_flag() {
    let (driver, collection) = fixture();
    driver.push_reply(doc! {"ok": 1, "value": {"_id": 1}});
    collection
        .query()
        .find_and_remove()
        .field("name")
        .equals("bob")
        .unwrap()
        .query(doc! {})
        .execute()
        .unwrap();
    assert_eq!(
        driver.last_command().unwrap(),
        doc! {"findandmodify": "users", "query": {"name": "bob"}, "remove": true}
    );
}

#[test]
fn command_failure_carries_the_raw_reply() {
    let (driver, collection) = fixture();
    driver.push_reply(doc! {"ok": 0, "errmsg": "exploded"});
    let err = collection
        .query()
        .distinct("age")
        .query(doc! {})
        .execute()
        .unwrap_err();
    match err {
        Error::Command { message, reply } => {
            assert_eq!(message, "exploded");
            assert_eq!(reply, doc! {"ok": 0, "errmsg": "exploded"});
        }
        other => panic!("expected command error, got {other:?}"),
    }
}

#[test]
fn geo_near_infers_spherical_from_geojson() {
    let (driver, collection) = fixture();
    driver.push_reply(doc! {"ok": 1, "results": [{"dis": 1.0, "obj": {"_id": 1}}]});

    let point = doc! {"type": "Point", "coordinates": [1.0, 2.0]};
    let result = collection
        .query()
        .geo_near(point.clone())
        .query(doc! {})
        .execute()
        .unwrap();

    assert_eq!(
        driver.last_command().unwrap(),
        doc! {"geoNear": "users", "near": point, "spherical": true, "query": {}}
    );
    match result {
        QueryResult::Documents(docs) => assert_eq!(docs.len(), 1),
        other => panic!("expected documents, got {other:?}"),
    }
}

#[test]
fn geo_near_legacy_pair_is_not_spherical() {
    let (driver, collection) = fixture();
    driver.push_reply(doc! {"ok": 1, "results": []});
    collection
        .query()
        .geo_near((1.0, 2.0))
        .limit(10)
        .query(doc! {})
        .execute()
        .unwrap();
    assert_eq!(
        driver.last_command().unwrap(),
        doc! {"geoNear": "users", "near": [1.0, 2.0], "spherical": false, "query": {}, "num": 10i64}
    );
}

#[test]
fn geo_near_spherical_override_and_options() {
    let (driver, collection) = fixture();
    driver.push_reply(doc! {"ok": 1, "results": []});
    collection
        .query()
        .geo_near((1.0, 2.0))
        .spherical(true)
        .unwrap()
        .distance_multiplier(6378.0)
        .unwrap()
        .max_distance(0.5)
        .unwrap()
        .field("active")
        .equals(true)
        .unwrap()
        .query(doc! {})
        .execute()
        .unwrap();
    assert_eq!(
        driver.last_command().unwrap(),
        doc! {
            "geoNear": "users",
            "near": [1.0, 2.0],
            "spherical": true,
            "query": {"active": true},
            "distanceMultiplier": 6378.0,
            "maxDistance": 0.5
        }
    );
}

#[test]
fn map_reduce_wraps_plain_text_into_code() {
    let (driver, collection) = fixture();
    driver.push_reply(doc! {"ok": 1, "results": [{"_id": "a", "value": 2.0}]});

    let result = collection
        .query()
        .map_reduce(
            "function() { emit(this.k, 1); }",
            "function(k, vs) { return Array.sum(vs); }",
            OutTarget::Inline,
            doc! {},
        )
        .query(doc! {})
        .execute()
        .unwrap();

    assert_eq!(
        driver.last_command().unwrap(),
        doc! {
            "mapreduce": "users",
            "map": Bson::JavaScriptCode("function() { emit(this.k, 1); }".into()),
            "reduce": Bson::JavaScriptCode("function(k, vs) { return Array.sum(vs); }".into()),
            "query": {},
            "out": {"inline": true}
        }
    );
    match result {
        QueryResult::Documents(docs) => assert_eq!(docs.len(), 1),
        other => panic!("expected inline documents, got {other:?}"),
    }
}

#[test]
fn map_reduce_inline_defaults_to_empty() {
    let (driver, collection) = fixture();
    driver.push_reply(doc! {"ok": 1});
    let result = collection
        .query()
        .map_reduce("m", "r", OutTarget::Inline, doc! {})
        .query(doc! {})
        .execute()
        .unwrap();
    match result {
        QueryResult::Documents(docs) => assert!(docs.is_empty()),
        other => panic!("expected documents, got {other:?}"),
    }
}

#[test]
fn map_reduce_string_result_opens_cursor_in_current_db() {
    let (driver, collection) = fixture();
    driver.push_reply(doc! {"ok": 1, "result": "totals"});
    driver.push_find_result(vec![doc! {"_id": "a", "value": 3.0}]);

    let result = collection
        .query()
        .map_reduce("m", "r", OutTarget::Collection("totals".into()), doc! {})
        .query(doc! {})
        .execute()
        .unwrap();

    let cursor = result.into_cursor().expect("cursor over the output collection");
    assert_eq!(cursor.to_vec(), vec![doc! {"_id": "a", "value": 3.0}]);

    let find = driver.find_calls().pop().unwrap();
    assert_eq!(find.db, "testdb");
    assert_eq!(find.collection, "totals");
}

#[test]
fn map_reduce_db_pointer_switches_database_context() {
    let (driver, collection) = fixture();
    driver.push_reply(doc! {"ok": 1, "result": {"db": "otherdb", "collection": "res"}});
    driver.push_find_result(vec![]);

    collection
        .query()
        .map_reduce("m", "r", OutTarget::Custom(doc! {"replace": "res", "db": "otherdb"}), doc! {})
        .query(doc! {})
        .execute()
        .unwrap();

    let find = driver.find_calls().pop().unwrap();
    assert_eq!(find.db, "otherdb");
    assert_eq!(find.collection, "res");
}

#[test]
fn map_reduce_merges_sort_and_limit_options() {
    let (driver, collection) = fixture();
    driver.push_reply(doc! {"ok": 1, "results": []});
    collection
        .query()
        .map_reduce("m", "r", OutTarget::Inline, doc! {"jsMode": true})
        .sort("age", "desc")
        .limit(50)
        .query(doc! {})
        .execute()
        .unwrap();
    assert_eq!(
        driver.last_command().unwrap(),
        doc! {
            "mapreduce": "users",
            "map": Bson::JavaScriptCode("m".into()),
            "reduce": Bson::JavaScriptCode("r".into()),
            "query": {},
            "out": {"inline": true},
            "jsMode": true,
            "sort": {"age": -1},
            "limit": 50i64
        }
    );
}

#[test]
fn group_command_shape_and_retval() {
    let (driver, collection) = fixture();
    driver.push_reply(doc! {"ok": 1, "retval": [{"dept": "a", "total": 2.0}]});

    let result = collection
        .query()
        .group(doc! {"dept": 1}, doc! {"total": 0})
        .reduce("function(cur, res) { res.total += 1; }")
        .unwrap()
        .finalize("function(res) { return res; }")
        .unwrap()
        .field("active")
        .equals(true)
        .unwrap()
        .query(doc! {})
        .execute()
        .unwrap();

    assert_eq!(
        driver.last_command().unwrap(),
        doc! {
            "group": {
                "ns": "users",
                "initial": {"total": 0},
                "$reduce": Bson::JavaScriptCode("function(cur, res) { res.total += 1; }".into()),
                "key": {"dept": 1},
                // criteria pass through as a document, not re-encoded
                "cond": {"active": true},
                "finalize": Bson::JavaScriptCode("function(res) { return res; }".into())
            }
        }
    );
    match result {
        QueryResult::Documents(docs) => assert_eq!(docs.len(), 1),
        other => panic!("expected retval documents, got {other:?}"),
    }
}

#[test]
fn group_key_function_compiles_to_keyf() {
    let (driver, collection) = fixture();
    driver.push_reply(doc! {"ok": 1, "retval": []});
    collection
        .query()
        .group("function(doc) { return {d: doc.dept}; }", doc! {"n": 0})
        .reduce("r")
        .unwrap()
        .query(doc! {})
        .execute()
        .unwrap();
    let command = driver.last_command().unwrap();
    let group = command.get_document("group").unwrap();
    assert_eq!(
        group.get("$keyf"),
        Some(&Bson::JavaScriptCode("function(doc) { return {d: doc.dept}; }".into()))
    );
    assert!(group.get("key").is_none());
}

#[test]
fn group_without_retval_is_a_command_error() {
    let (driver, collection) = fixture();
    driver.push_reply(doc! {"ok": 1});
    let err = collection
        .query()
        .group(doc! {"dept": 1}, doc! {})
        .reduce("r")
        .unwrap()
        .query(doc! {})
        .execute()
        .unwrap_err();
    assert!(matches!(err, Error::Command { .. }));
}

#[test]
fn aggregate_array_and_staged_builder_compile_identically() {
    let (driver, collection) = fixture();
    driver.push_reply(doc! {"ok": 1, "result": []});
    driver.push_reply(doc! {"ok": 1, "result": []});

    let stage1 = doc! {"$match": {"active": true}};
    let stage2 = doc! {"$group": {"_id": "$dept", "n": {"$sum": 1}}};

    collection.aggregate(vec![stage1.clone(), stage2.clone()]).unwrap();
    collection
        .aggregation()
        .stage(stage1.clone())
        .stage(stage2.clone())
        .execute()
        .unwrap();

    let commands = driver.commands();
    assert_eq!(commands.len(), 2);
    assert_eq!(commands[0].1, commands[1].1);
    assert_eq!(
        commands[0].1,
        doc! {"aggregate": "users", "pipeline": [stage1, stage2]}
    );
}

#[test]
fn aggregate_shapes_result_documents() {
    let (driver, collection) = fixture();
    driver.push_reply(doc! {"ok": 1, "result": [{"_id": "a", "n": 3}]});
    let docs = collection.aggregate(vec![doc! {"$match": {}}]).unwrap();
    assert_eq!(docs, vec![doc! {"_id": "a", "n": 3}]);
}

#[test]
fn update_merges_multiple_and_upsert() {
    let (driver, collection) = fixture();
    collection
        .query()
        .update()
        .field("name")
        .equals("alice")
        .unwrap()
        .field("visits")
        .inc(1)
        .unwrap()
        .multiple(true)
        .upsert(true)
        .query(doc! {})
        .execute()
        .unwrap();

    let write = driver.write_calls().pop().unwrap();
    assert_eq!(write.kind, "update");
    assert_eq!(write.criteria, Some(doc! {"name": "alice"}));
    assert_eq!(write.document, Some(doc! {"$inc": {"visits": 1}}));
    assert_eq!(write.options, doc! {"multiple": true, "upsert": true});
}

#[test]
fn insert_sends_the_new_object() {
    let (driver, collection) = fixture();
    collection
        .query()
        .insert()
        .field("name")
        .set("alice", true)
        .unwrap()
        .field("age")
        .set(30, true)
        .unwrap()
        .query(doc! {})
        .execute()
        .unwrap();

    let write = driver.write_calls().pop().unwrap();
    assert_eq!(write.kind, "insert");
    assert_eq!(write.document, Some(doc! {"name": "alice", "age": 30}));
}

#[test]
fn remove_sends_criteria_and_options() {
    let (driver, collection) = fixture();
    collection
        .query()
        .remove()
        .field("name")
        .equals("bob")
        .unwrap()
        .query(doc! {"safe": true})
        .execute()
        .unwrap();

    let write = driver.write_calls().pop().unwrap();
    assert_eq!(write.kind, "remove");
    assert_eq!(write.criteria, Some(doc! {"name": "bob"}));
    assert_eq!(write.options, doc! {"w": 1});
}

#[test]
fn find_forwards_spec_and_cursor_options() {
    let (driver, collection) = fixture();
    driver.push_find_result(vec![doc! {"name": "alice"}, doc! {"name": "bob"}]);

    let result = collection
        .query()
        .find()
        .field("age")
        .gt(18)
        .select(["name"])
        .sort("name", "asc")
        .skip(5)
        .limit(10)
        .hint(doc! {"age": 1})
        .snapshot(true)
        .slave_okay(true)
        .query(doc! {})
        .execute()
        .unwrap();

    let cursor = result.into_cursor().unwrap();
    assert_eq!(cursor.to_vec(), vec![doc! {"name": "alice"}, doc! {"name": "bob"}]);

    let find = driver.find_calls().pop().unwrap();
    assert_eq!(find.spec.criteria, doc! {"age": {"$gt": 18}});
    assert_eq!(find.spec.projection, doc! {"name": 1});
    assert_eq!(find.spec.sort, doc! {"name": 1});
    assert_eq!(find.spec.skip, Some(5));
    assert_eq!(find.spec.limit, Some(10));
    assert_eq!(find.spec.options.get_document("hint").unwrap(), &doc! {"age": 1});
    assert_eq!(find.spec.options.get_bool("snapshot").unwrap(), true);
    assert_eq!(
        find.spec.options.get_document("readPreference").unwrap(),
        &doc! {"type": "secondaryPreferred"}
    );
}

#[test]
fn count_goes_through_the_driver() {
    let (driver, collection) = fixture();
    driver.push_count(42);
    let result = collection
        .query()
        .count()
        .field("active")
        .equals(true)
        .unwrap()
        .query(doc! {})
        .execute()
        .unwrap();
    match result {
        QueryResult::Count(count) => assert_eq!(count, 42),
        other => panic!("expected count, got {other:?}"),
    }
}

#[test]
fn find_one_returns_none_when_empty() {
    let (driver, collection) = fixture();
    driver.push_find_result(vec![]);
    assert!(collection.find_one(&doc! {"name": "nobody"}, &doc! {}).unwrap().is_none());

    driver.push_find_result(vec![doc! {"name": "alice"}]);
    assert_eq!(
        collection.find_one(&doc! {"name": "alice"}, &doc! {}).unwrap(),
        Some(doc! {"name": "alice"})
    );
}

#[test]
fn to_command_exposes_the_wire_document_without_dispatch() {
    let (driver, collection) = fixture();
    let query = collection
        .query()
        .distinct("age")
        .field("active")
        .equals(true)
        .unwrap()
        .query(doc! {});
    let command = query.to_command().unwrap().unwrap();
    assert_eq!(
        command,
        doc! {"distinct": "users", "key": "age", "query": {"active": true}}
    );
    // nothing was dispatched
    assert!(driver.commands().is_empty());

    // cursor types do not compile to a command
    let query = collection.query().find().query(doc! {});
    assert!(query.to_command().unwrap().is_none());
}
