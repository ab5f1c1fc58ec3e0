//! Integration tests for the core crate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use weather_relay_core::{
    CacheStore, FsCacheStore, MemoryCacheStore, OriginGate, ResourceName, ResourceSpec,
    ResourceStatus,
};

#[test]
fn test_resource_name_serde() {
    let serialized = serde_json::to_string(&ResourceName::Forecast).unwrap();
    assert_eq!(serialized, r#""forecast""#);
    let deserialized: ResourceName = serde_json::from_str(&serialized).unwrap();
    assert_eq!(deserialized, ResourceName::Forecast);
}

#[test]
fn test_resource_status_serde() {
    let status = ResourceStatus {
        name: ResourceName::Current,
        ready: false,
        last_fetch_ms: None,
        interval_minutes: 30,
    };
    let v = serde_json::to_value(&status).unwrap();
    assert_eq!(
        v,
        serde_json::json!({
            "name": "current",
            "ready": false,
            "last_fetch_ms": null,
            "interval_minutes": 30
        })
    );
}

#[test]
fn test_resource_spec_uses_standard_interval() {
    for name in ResourceName::ALL {
        let spec = ResourceSpec::new(name, "http://127.0.0.1/x");
        assert_eq!(spec.interval, name.refresh_interval());
    }
}

#[test]
fn test_current_query_keeps_key_before_location() {
    let q = ResourceName::Current.upstream_query("K", "Boston");
    let keys: Vec<_> = q.iter().map(|(k, _)| *k).collect();
    assert_eq!(
        keys,
        ["aggregateHours", "contentType", "unitGroup", "locationMode", "key", "locations"]
    );
    assert_eq!(ResourceName::History.upstream_path("Boston"), "timeline/Boston/last90days");
}

#[test]
fn test_fs_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = FsCacheStore::open(dir.path()).unwrap();
        store.put("history", br#"{"days":[]}"#.to_vec()).unwrap();
        store.put("forecast", br#"{"days":[1]}"#.to_vec()).unwrap();
    }

    let reopened = FsCacheStore::open(dir.path()).unwrap();
    assert_eq!(&reopened.get("history").unwrap().payload[..], br#"{"days":[]}"#);
    assert_eq!(&reopened.get("forecast").unwrap().payload[..], br#"{"days":[1]}"#);
    assert!(reopened.get("current").unwrap_err().is_not_found());
    assert!(reopened.get("history").unwrap().fetched_at_ms > 0);
}

#[test]
fn test_reopen_ignores_stale_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".current.json.tmp"), b"{\"half").unwrap();
    let store = FsCacheStore::open(dir.path()).unwrap();
    assert!(store.get("current").unwrap_err().is_not_found());
}

#[test]
fn test_keys_are_independent() {
    let store = MemoryCacheStore::new();
    store.put("history", b"1".to_vec()).unwrap();
    store.put("current", b"2".to_vec()).unwrap();
    store.put("current", b"3".to_vec()).unwrap();
    assert_eq!(&store.get("history").unwrap().payload[..], b"1");
    assert_eq!(&store.get("current").unwrap().payload[..], b"3");
}

fn assert_no_torn_reads(store: Arc<dyn CacheStore>) {
    let old = br#"{"v":"old"}"#.to_vec();
    let new = format!(r#"{{"v":"{}"}}"#, "n".repeat(64 * 1024)).into_bytes();
    store.put("forecast", old.clone()).unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let readers: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            let done = Arc::clone(&done);
            let (old, new) = (old.clone(), new.clone());
            thread::spawn(move || {
                let mut reads = 0u64;
                while !done.load(Ordering::Acquire) || reads == 0 {
                    let got = store.get("forecast").unwrap();
                    assert!(got.payload == old || got.payload == new, "torn read");
                    reads += 1;
                }
            })
        })
        .collect();

    for i in 0..20 {
        let body = if i % 2 == 0 { new.clone() } else { old.clone() };
        store.put("forecast", body).unwrap();
    }
    done.store(true, Ordering::Release);
    for r in readers {
        r.join().unwrap();
    }
}

#[test]
fn test_memory_store_never_tears() {
    assert_no_torn_reads(Arc::new(MemoryCacheStore::new()));
}

#[test]
fn test_fs_store_never_tears() {
    let dir = tempfile::tempdir().unwrap();
    assert_no_torn_reads(Arc::new(FsCacheStore::open(dir.path()).unwrap()));
}

#[test]
fn test_default_gate_has_two_origins() {
    let gate = OriginGate::default();
    assert_eq!(gate.allowed().len(), 2);
    assert!(gate.evaluate("https://pmbaker712.github.io").is_some());
}
