use bson::doc;
use mangrove::Cursor;

#[test]
fn advance_walks_forward_only() {
    let mut cursor = Cursor::new(vec![doc! {"n": 1}, doc! {"n": 2}]);
    assert!(cursor.has_next());
    assert!(cursor.current().is_none());

    assert_eq!(cursor.advance(), Some(doc! {"n": 1}));
    assert_eq!(cursor.current(), Some(&doc! {"n": 1}));

    assert_eq!(cursor.advance(), Some(doc! {"n": 2}));
    assert!(!cursor.has_next());

    assert_eq!(cursor.advance(), None);
    assert!(cursor.current().is_none());
}

#[test]
fn to_vec_preserves_order() {
    let cursor = Cursor::new(vec![doc! {"n": 1}, doc! {"n": 2}, doc! {"n": 3}]);
    assert_eq!(
        cursor.to_vec(),
        vec![doc! {"n": 1}, doc! {"n": 2}, doc! {"n": 3}]
    );
}

#[test]
fn to_vec_drains_from_the_current_position() {
    let mut cursor = Cursor::new(vec![doc! {"n": 1}, doc! {"n": 2}, doc! {"n": 3}]);
    cursor.advance();
    assert_eq!(cursor.len_remaining(), 2);
    assert_eq!(cursor.to_vec(), vec![doc! {"n": 2}, doc! {"n": 3}]);
}

#[test]
fn cursor_iterates() {
    let cursor = Cursor::new(vec![doc! {"n": 1}, doc! {"n": 2}]);
    let ns: Vec<i32> = cursor.map(|d| d.get_i32("n").unwrap()).collect();
    assert_eq!(ns, vec![1, 2]);
}

#[test]
fn empty_cursor() {
    let mut cursor = Cursor::new(Vec::new());
    assert!(!cursor.has_next());
    assert_eq!(cursor.advance(), None);
    assert!(cursor.to_vec().is_empty());
}
