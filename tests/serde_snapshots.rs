#![cfg(feature = "serde")]

use rwcoll::{ConcurrentMap, ConcurrentQueue, ConcurrentSequence, ConcurrentStack};

#[test]
fn sequence_serializes_as_array() {
    let seq = ConcurrentSequence::from(vec![5, 3, 1]);
    let json = serde_json::to_string(&seq).unwrap();
    assert_eq!(json, "[5,3,1]");

    let back: ConcurrentSequence<i32> = serde_json::from_str(&json).unwrap();
    assert_eq!(back.to_vec(), vec![5, 3, 1]);
}

#[test]
fn queue_keeps_fifo_order() {
    let q: ConcurrentQueue<&str> = vec!["a", "b"].into_iter().collect();
    let json = serde_json::to_string(&q).unwrap();
    assert_eq!(json, r#"["a","b"]"#);

    let back: ConcurrentQueue<String> = serde_json::from_str(&json).unwrap();
    assert_eq!(back.dequeue(), Ok("a".to_string()));
}

#[test]
fn stack_serializes_top_first() {
    let s = ConcurrentStack::new();
    s.push_all(vec![1, 2, 3]);
    let json = serde_json::to_string(&s).unwrap();
    assert_eq!(json, "[3,2,1]");

    let back: ConcurrentStack<u8> = serde_json::from_str(&json).unwrap();
    assert_eq!(back.pop(), Ok(3));
    assert_eq!(back.to_vec(), vec![2, 1]);
}

#[test]
fn map_serializes_as_object() {
    let map: ConcurrentMap<String, u32> = ConcurrentMap::new();
    map.set("k".to_string(), 2);
    let json = serde_json::to_string(&map).unwrap();
    assert_eq!(json, r#"{"k":2}"#);

    let back: ConcurrentMap<String, u32> = serde_json::from_str(r#"{"a":1,"b":2}"#).unwrap();
    assert_eq!(back.len(), 2);
    assert_eq!(back.get("b"), Ok(2));
}
