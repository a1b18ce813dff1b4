//! Integration tests for vaultdict
//!
//! Exercises the complete dictionary surface against the in-memory store:
//! typed round trips, TTL policy, pipelining, scans, and type extension.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use vaultdict::{
    Command, DictConfig, Extended, MemoryStore, Reply, Result, Store, Value, VaultDict,
    VaultDictError,
};

/// Helper to build a dictionary over a fresh in-memory store
fn test_dict(namespace: &str) -> VaultDict<MemoryStore> {
    VaultDict::in_memory(DictConfig::builder().namespace(namespace).build())
}

/// Raw wire form of a key, bypassing the dictionary (what a redis-cli GET
/// would show)
fn raw_wire(store: &MemoryStore, formatted_key: &str) -> Option<String> {
    match store
        .execute(Command::Get {
            key: formatted_key.to_string(),
        })
        .unwrap()
    {
        Reply::Value(wire) => wire,
        other => panic!("unexpected reply {:?}", other),
    }
}

#[test]
fn test_set_then_get() {
    let mut dict = test_dict("t");
    dict.set("a", 42).unwrap();
    assert_eq!(dict.get("a").unwrap(), Some(Value::Int(42)));
    assert_eq!(dict.get("missing").unwrap(), None);
}

#[test]
fn test_round_trip_all_builtin_types() {
    let mut dict = test_dict("types");
    let mut map = BTreeMap::new();
    map.insert("nested".to_string(), Value::List(vec![Value::Int(1)]));

    let cases: Vec<(&str, Value)> = vec![
        ("text", Value::Str("hello world".into())),
        ("text_colons", Value::Str("a:b:c".into())),
        ("int", Value::Int(-7)),
        ("float", Value::Float(3.25)),
        ("bool", Value::Bool(true)),
        ("none", Value::Null),
        ("list", Value::List(vec![Value::Str("x".into()), Value::Int(2)])),
        ("dict", Value::Dict(map)),
    ];
    for (key, value) in &cases {
        dict.set(key, value.clone()).unwrap();
    }
    for (key, value) in &cases {
        assert_eq!(dict.get(key).unwrap().as_ref(), Some(value), "key {}", key);
    }
}

#[test]
fn test_contains_and_fetch() {
    let mut dict = test_dict("contains");
    dict.set("present", "here").unwrap();
    assert!(dict.contains_key("present").unwrap());
    assert!(!dict.contains_key("absent").unwrap());
    assert_eq!(dict.fetch("present").unwrap(), Value::Str("here".into()));
    assert!(matches!(
        dict.fetch("absent"),
        Err(VaultDictError::KeyNotFound(_))
    ));
}

#[test]
fn test_delete_is_idempotent_by_default() {
    let mut dict = test_dict("del");
    dict.set("k", 1).unwrap();
    dict.delete("k").unwrap();
    dict.delete("k").unwrap();
}

#[test]
fn test_strict_delete_raises_on_absence() {
    let mut dict = VaultDict::in_memory(
        DictConfig::builder()
            .namespace("strictdel")
            .raise_on_missing_delete(true)
            .build(),
    );
    dict.set("k", 1).unwrap();
    dict.delete("k").unwrap();
    assert!(matches!(
        dict.delete("k"),
        Err(VaultDictError::KeyNotFound(key)) if key == "k"
    ));
}

#[test]
fn test_pop_with_and_without_default() {
    let mut dict = test_dict("pop");
    dict.set("k", "v").unwrap();
    assert_eq!(dict.pop("k").unwrap(), Value::Str("v".into()));
    // the take was atomic: the key is gone
    assert_eq!(dict.get("k").unwrap(), None);

    assert_eq!(
        dict.pop_or("missing", "d").unwrap(),
        Value::Str("d".into())
    );
    assert!(matches!(
        dict.pop("missing"),
        Err(VaultDictError::KeyNotFound(_))
    ));
}

#[test]
fn test_setdefault_returns_winner() {
    let mut dict = VaultDict::in_memory(
        DictConfig::builder()
            .namespace("sd")
            .expire(Duration::from_secs(3600))
            .build(),
    );
    assert_eq!(dict.setdefault("a", "x").unwrap(), Value::Str("x".into()));
    let ttl = dict.get_ttl("a").unwrap().unwrap();
    assert!(ttl > 3590 && ttl <= 3600);

    // second caller loses and must use the stored value
    assert_eq!(dict.setdefault("a", "y").unwrap(), Value::Str("x".into()));
    assert_eq!(dict.get("a").unwrap(), Some(Value::Str("x".into())));
}

#[test]
fn test_setdefault_racers_converge_on_one_ttl() {
    let store = MemoryStore::new();
    let mut first = VaultDict::new(
        store.clone(),
        DictConfig::builder()
            .namespace("race")
            .expire(Duration::from_secs(100))
            .build(),
    );
    let mut second = VaultDict::new(
        store.clone(),
        DictConfig::builder()
            .namespace("race")
            .expire(Duration::from_secs(9000))
            .build(),
    );

    assert_eq!(first.setdefault("k", "mine").unwrap(), Value::Str("mine".into()));
    // the loser sees the winner's value and the winner's TTL survives
    assert_eq!(
        second.setdefault("k", "theirs").unwrap(),
        Value::Str("mine".into())
    );
    let ttl = second.get_ttl("k").unwrap().unwrap();
    assert!(ttl <= 100, "winner TTL was replaced: {}", ttl);
}

#[test]
fn test_popitem_and_empty() {
    let mut dict = test_dict("popitem");
    dict.set("only", 1).unwrap();
    let (key, value) = dict.popitem().unwrap();
    assert_eq!(key, "only");
    assert_eq!(value, Value::Int(1));
    assert!(matches!(dict.popitem(), Err(VaultDictError::Empty)));
}

#[test]
fn test_len_keys_entries_values() {
    let mut dict = test_dict("iter");
    assert_eq!(dict.len().unwrap(), 0);
    assert!(dict.is_empty().unwrap());

    dict.set("a", 1).unwrap();
    dict.set("b", 2).unwrap();
    dict.set("c", 3).unwrap();

    assert_eq!(dict.len().unwrap(), 3);
    assert!(!dict.is_empty().unwrap());

    let mut keys: Vec<String> = dict.keys().collect::<Result<_>>().unwrap();
    keys.sort();
    assert_eq!(keys, vec!["a", "b", "c"]);

    let map = dict.to_map().unwrap();
    assert_eq!(map.len(), 3);
    assert_eq!(map["b"], Value::Int(2));

    let mut values: Vec<i64> = dict
        .values()
        .map(|value| value.unwrap().as_int().unwrap())
        .collect();
    values.sort();
    assert_eq!(values, vec![1, 2, 3]);
}

#[test]
fn test_update_and_clear() {
    let mut dict = test_dict("bulk");
    dict.update(vec![("a", 1), ("b", 2), ("c", 3)]).unwrap();
    assert_eq!(dict.len().unwrap(), 3);

    dict.clear().unwrap();
    assert_eq!(dict.len().unwrap(), 0);
}

#[test]
fn test_from_keys() {
    let mut dict = test_dict("fromkeys");
    dict.from_keys(vec!["x", "y"], 0).unwrap();
    assert_eq!(dict.get("x").unwrap(), Some(Value::Int(0)));
    assert_eq!(dict.get("y").unwrap(), Some(Value::Int(0)));
}

#[test]
fn test_union() {
    let mut dict = test_dict("union");
    dict.set("a", 1).unwrap();
    dict.set("b", 2).unwrap();
    let mut other = std::collections::HashMap::new();
    other.insert("b".to_string(), Value::Int(20));
    other.insert("c".to_string(), Value::Int(30));

    let merged = dict.union(&other).unwrap();
    assert_eq!(merged["a"], Value::Int(1));
    assert_eq!(merged["b"], Value::Int(20));
    assert_eq!(merged["c"], Value::Int(30));
}

#[test]
fn test_multi_dict_strips_search_prefix() {
    let mut dict = test_dict("md");
    dict.set("foobar", 1).unwrap();
    dict.set("foobaz", 2).unwrap();
    dict.set("goobar", 3).unwrap();

    let result = dict.multi_dict("foo").unwrap();
    assert_eq!(result.len(), 2);
    assert_eq!(result["bar"], Value::Int(1));
    assert_eq!(result["baz"], Value::Int(2));
}

#[test]
fn test_multi_get_and_multi_del() {
    let mut dict = test_dict("multi");
    dict.set("foobar", 1).unwrap();
    dict.set("foobaz", 2).unwrap();
    dict.set("other", 3).unwrap();

    let mut values: Vec<i64> = dict
        .multi_get("foo")
        .unwrap()
        .iter()
        .map(|value| value.as_int().unwrap())
        .collect();
    values.sort();
    assert_eq!(values, vec![1, 2]);

    assert_eq!(dict.multi_del("foo").unwrap(), 2);
    assert_eq!(dict.len().unwrap(), 1);

    // empty result sets are empty containers, never errors
    assert!(dict.multi_get("nothing").unwrap().is_empty());
    assert!(dict.multi_dict("nothing").unwrap().is_empty());
    assert_eq!(dict.multi_del("nothing").unwrap(), 0);
}

#[test]
fn test_chain_operations() {
    let mut dict = test_dict("chain");
    dict.chain_set(&["user", "1", "name"], "alice").unwrap();
    assert_eq!(
        dict.chain_get(&["user", "1", "name"]).unwrap(),
        Value::Str("alice".into())
    );
    dict.chain_set(&["user", "1", "age"], 30).unwrap();
    assert_eq!(dict.multi_chain_get(&["user", "1"]).unwrap().len(), 2);
    dict.chain_del(&["user", "1", "name"]).unwrap();
    assert!(matches!(
        dict.chain_get(&["user", "1", "name"]),
        Err(VaultDictError::KeyNotFound(_))
    ));
}

#[test]
fn test_size_boundary_is_inclusive() {
    let mut dict = VaultDict::in_memory(
        DictConfig::builder()
            .namespace("size")
            .max_string_size(8)
            .build(),
    );

    dict.set("k", "12345678").unwrap();
    let err = dict.set("k", "123456789").unwrap_err();
    assert!(matches!(
        err,
        VaultDictError::SizeExceeded {
            kind: "value",
            size: 9,
            limit: 8
        }
    ));

    dict.set("12345678", 1).unwrap();
    let err = dict.set("123456789", 1).unwrap_err();
    assert!(matches!(err, VaultDictError::SizeExceeded { kind: "key", .. }));

    // validation failed fast: nothing was written
    assert_eq!(dict.get("123456789").unwrap(), None);
}

#[test]
fn test_expire_config_lands_on_writes() {
    let mut dict = VaultDict::in_memory(
        DictConfig::builder()
            .namespace("exp")
            .expire(Duration::from_secs(3600))
            .build(),
    );
    dict.set("foobar1", "barbar").unwrap();
    let ttl = dict.get_ttl("foobar1").unwrap().unwrap();
    assert!(ttl > 3590 && ttl <= 3600);
}

#[test]
fn test_no_expire_means_no_ttl() {
    let mut dict = test_dict("noexp");
    dict.set("k", 1).unwrap();
    assert_eq!(dict.get_ttl("k").unwrap(), None);
    assert_eq!(dict.get_ttl("missing").unwrap(), None);
}

#[test]
fn test_preserve_expiration_keeps_deadline_on_overwrite() {
    let mut dict = VaultDict::in_memory(
        DictConfig::builder()
            .namespace("keep")
            .expire(Duration::from_secs(3600))
            .preserve_expiration(true)
            .build(),
    );
    dict.set("foo", "bar").unwrap();
    let before = dict.get_ttl("foo").unwrap().unwrap();

    // an overwrite must not reset the clock; a fresh key still gets one
    dict.set("foo", "value").unwrap();
    dict.set("bar", "value too").unwrap();

    let after = dict.get_ttl("foo").unwrap().unwrap();
    assert!(after <= before);
    let fresh = dict.get_ttl("bar").unwrap().unwrap();
    assert!(fresh > 3590 && fresh <= 3600);
}

#[test]
fn test_sub_second_expire_clamps_to_one_second() {
    let mut dict = VaultDict::in_memory(
        DictConfig::builder()
            .namespace("clamp")
            .expire(Duration::from_millis(250))
            .build(),
    );
    dict.set("k", 1).unwrap();
    // a TTL exists (not clamped away to an immediate expiry)
    let ttl = dict.get_ttl("k").unwrap();
    assert!(ttl.is_some());
    assert!(ttl.unwrap() <= 1);
    assert_eq!(dict.get("k").unwrap(), Some(Value::Int(1)));
}

#[test]
fn test_with_expire_scope() {
    let mut dict = test_dict("scoped");
    dict.with_expire(Duration::from_secs(600), |dict| dict.set("short", 1))
        .unwrap();
    dict.set("plain", 2).unwrap();

    let ttl = dict.get_ttl("short").unwrap().unwrap();
    assert!(ttl > 590 && ttl <= 600);
    assert_eq!(dict.get_ttl("plain").unwrap(), None);
}

#[test]
fn test_pipeline_batches_writes() {
    let mut dict = test_dict("pipe");
    dict.pipelined(|dict| {
        for i in 0..10 {
            dict.set(&format!("key{}", i), i)?;
        }
        // queued writes are not applied yet
        assert_eq!(dict.len()?, 0);
        Ok(())
    })
    .unwrap();
    assert_eq!(dict.len().unwrap(), 10);
}

#[test]
fn test_pipeline_flushes_queued_commands_on_error() {
    let mut dict = test_dict("pipeerr");
    let result: Result<()> = dict.pipelined(|dict| {
        dict.set("before", 1)?;
        Err(VaultDictError::Store("boom".into()))
    });
    assert!(matches!(result, Err(VaultDictError::Store(_))));
    // the command queued before the error was still sent
    assert_eq!(dict.get("before").unwrap(), Some(Value::Int(1)));
}

#[test]
fn test_envelope_wire_format() {
    let mut dict = test_dict("wire");
    let store = dict.store().clone();
    dict.set("n", 42).unwrap();
    dict.set("s", "hi").unwrap();
    assert_eq!(raw_wire(&store, "wire:n").unwrap(), "int:42");
    assert_eq!(raw_wire(&store, "wire:s").unwrap(), "str:hi");
}

// ---------------------------------------------------------------------------
// type extension
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
struct Customer {
    name: String,
    age: i64,
    address: String,
}

impl Extended for Customer {
    fn type_tag() -> &'static str {
        "Customer"
    }

    fn encode(&self) -> String {
        format!("{}\n{}\n{}", self.name, self.age, self.address)
    }

    fn decode(data: &str) -> Result<Self> {
        let mut lines = data.lines();
        let parse_err = || VaultDictError::Decode {
            tag: "Customer".to_string(),
            reason: "wrong field count".to_string(),
        };
        let name = lines.next().ok_or_else(parse_err)?.to_string();
        let age = lines
            .next()
            .ok_or_else(parse_err)?
            .parse()
            .map_err(|_| parse_err())?;
        let address = lines.next().ok_or_else(parse_err)?.to_string();
        Ok(Customer {
            name,
            age,
            address,
        })
    }
}

#[test]
fn test_extended_type_round_trip() {
    let mut dict = test_dict("ext");
    let store = dict.store().clone();
    dict.extend_type::<Customer>();

    let customer = Customer {
        name: "John Doe".to_string(),
        age: 31,
        address: "1234 Main St".to_string(),
    };
    dict.set("customer1", customer.into_value()).unwrap();

    // stored under the type's own tag
    let wire = raw_wire(&store, "ext:customer1").unwrap();
    assert!(wire.starts_with("Customer:"));

    let value = dict.fetch("customer1").unwrap();
    let restored = Customer::from_value(&value).unwrap();
    assert_eq!(restored.name, "John Doe");
    assert_eq!(restored.age, 31);
    assert_eq!(restored.address, "1234 Main St");
}

#[test]
fn test_encode_only_extension_leaves_default_decode_intact() {
    let mut dict = test_dict("oneside");
    let store = dict.store().clone();
    dict.extend_with(
        "Stamped",
        Some(Arc::new(|value: &Value| match value {
            Value::Ext { data, .. } => Ok(data.to_uppercase()),
            other => Ok(other.type_tag().to_string()),
        })),
        None,
    )
    .unwrap();

    // writing through the one-sided registration succeeds
    dict.set(
        "stamped",
        Value::Ext {
            tag: "Stamped".to_string(),
            data: "hello".to_string(),
        },
    )
    .unwrap();
    assert_eq!(raw_wire(&store, "oneside:stamped").unwrap(), "Stamped:HELLO");
    // without a decoder the tag degrades to the raw payload
    assert_eq!(
        dict.get("stamped").unwrap(),
        Some(Value::Str("HELLO".into()))
    );

    // an unrelated, unregistered tag still degrades instead of failing
    store
        .execute(Command::Set {
            key: "oneside:alien".to_string(),
            value: "Mystery:some payload".to_string(),
            expiry: vaultdict::SetExpiry::None,
        })
        .unwrap();
    assert_eq!(
        dict.get("alien").unwrap(),
        Some(Value::Str("some payload".into()))
    );
}

#[test]
fn test_shared_registry_is_visible_across_instances() {
    let store = MemoryStore::new();
    let first = VaultDict::with_registry(
        store.clone(),
        DictConfig::builder().namespace("shared").build(),
        vaultdict::TypeRegistry::shared(),
    );
    let second = VaultDict::with_registry(
        store.clone(),
        DictConfig::builder().namespace("shared").build(),
        first.registry().clone(),
    );
    first.extend_type::<Customer>();
    assert!(second.registry().read().has_decoder("Customer"));
    // shared() is opt-in: a plain constructor stays isolated
    let isolated = VaultDict::new(store, DictConfig::default());
    assert!(!isolated.registry().read().has_decoder("Customer"));
}

// ---------------------------------------------------------------------------
// stores without scan support
// ---------------------------------------------------------------------------

struct NoScanStore {
    inner: MemoryStore,
}

impl Store for NoScanStore {
    fn execute(&self, command: Command) -> Result<Reply> {
        self.inner.execute(command)
    }

    fn execute_batch(&self, commands: Vec<Command>) -> Result<Vec<Reply>> {
        self.inner.execute_batch(commands)
    }

    fn supports_scan(&self) -> bool {
        false
    }
}

#[test]
fn test_scan_operations_unsupported_without_scan() {
    let mut dict = VaultDict::new(
        NoScanStore {
            inner: MemoryStore::new(),
        },
        DictConfig::builder().namespace("noscan").build(),
    );
    dict.set("k", 1).unwrap();
    assert_eq!(dict.get("k").unwrap(), Some(Value::Int(1)));

    assert!(matches!(
        dict.multi_get("k"),
        Err(VaultDictError::Unsupported(_))
    ));
    assert!(matches!(dict.len(), Err(VaultDictError::Unsupported(_))));
    assert!(matches!(
        dict.popitem(),
        Err(VaultDictError::Unsupported(_))
    ));
}
