//! Store command vocabulary
//!
//! Commands issued against the backing store, and the TTL policy that
//! decides how a write expresses expiration. [`Command::to_args`] renders
//! the exact argument sequence a wire transport would send.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Expiration behavior attached to a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetExpiry {
    /// Store without a TTL (clears any existing one).
    None,
    /// Expire after this many seconds.
    Seconds(u64),
    /// Leave the key's existing TTL untouched.
    KeepTtl,
}

impl SetExpiry {
    /// Convert a configured duration into a TTL argument.
    ///
    /// Durations that round down to zero seconds are clamped to 1: the store
    /// treats a zero TTL as an error and a negative one as an immediate
    /// delete, neither of which is what a caller asking for a short expiry
    /// means.
    pub fn from_duration(expire: Duration) -> SetExpiry {
        SetExpiry::Seconds(expire.as_secs().max(1))
    }

    /// Resolve the write-path TTL policy.
    ///
    /// Preserving expiration only applies to keys that already exist; a
    /// first write still needs the configured TTL attached.
    pub fn for_write(expire: Option<Duration>, preserve: bool, exists: bool) -> SetExpiry {
        if preserve && exists {
            SetExpiry::KeepTtl
        } else {
            match expire {
                Some(duration) => SetExpiry::from_duration(duration),
                None => SetExpiry::None,
            }
        }
    }

    /// TTL policy for the conditional set-if-absent path.
    ///
    /// KEEPTTL wins when preservation is configured (the store ignores it
    /// for a fresh key); otherwise the configured expiry applies.
    pub fn for_set_if_absent(expire: Option<Duration>, preserve: bool) -> SetExpiry {
        if preserve {
            SetExpiry::KeepTtl
        } else {
            match expire {
                Some(duration) => SetExpiry::from_duration(duration),
                None => SetExpiry::None,
            }
        }
    }
}

/// Commands understood by a [`Store`](crate::Store).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    Get {
        key: String,
    },
    Set {
        key: String,
        value: String,
        expiry: SetExpiry,
    },
    /// Set only if the key is absent; always reply with the prior value.
    SetIfAbsent {
        key: String,
        value: String,
        expiry: SetExpiry,
    },
    /// Atomically read and remove.
    GetDel {
        key: String,
    },
    Exists {
        key: String,
    },
    Ttl {
        key: String,
    },
    Scan {
        cursor: u64,
        pattern: String,
        count: Option<usize>,
    },
    MGet {
        keys: Vec<String>,
    },
    Del {
        keys: Vec<String>,
    },
}

impl Command {
    /// Whether this command mutates the store and may be queued by a
    /// pipeline scope. Atomic read-modify commands (GETDEL, SET..NX..GET)
    /// are not queueable: their reply is part of the operation.
    pub fn is_write(&self) -> bool {
        matches!(self, Command::Set { .. } | Command::Del { .. })
    }

    /// Render the wire argument sequence for this command.
    pub fn to_args(&self) -> Vec<String> {
        match self {
            Command::Get { key } => vec!["GET".into(), key.clone()],
            Command::Set { key, value, expiry } => {
                let mut args = vec!["SET".into(), key.clone(), value.clone()];
                push_expiry(&mut args, *expiry);
                args
            }
            Command::SetIfAbsent { key, value, expiry } => {
                let mut args = vec![
                    "SET".into(),
                    key.clone(),
                    value.clone(),
                    "NX".into(),
                    "GET".into(),
                ];
                push_expiry(&mut args, *expiry);
                args
            }
            Command::GetDel { key } => vec!["GETDEL".into(), key.clone()],
            Command::Exists { key } => vec!["EXISTS".into(), key.clone()],
            Command::Ttl { key } => vec!["TTL".into(), key.clone()],
            Command::Scan {
                cursor,
                pattern,
                count,
            } => {
                let mut args = vec![
                    "SCAN".into(),
                    cursor.to_string(),
                    "MATCH".into(),
                    pattern.clone(),
                ];
                if let Some(count) = count {
                    args.push("COUNT".into());
                    args.push(count.to_string());
                }
                args
            }
            Command::MGet { keys } => {
                let mut args = vec!["MGET".to_string()];
                args.extend(keys.iter().cloned());
                args
            }
            Command::Del { keys } => {
                let mut args = vec!["DEL".to_string()];
                args.extend(keys.iter().cloned());
                args
            }
        }
    }
}

fn push_expiry(args: &mut Vec<String>, expiry: SetExpiry) {
    match expiry {
        SetExpiry::None => {}
        SetExpiry::Seconds(seconds) => {
            args.push("EX".into());
            args.push(seconds.to_string());
        }
        SetExpiry::KeepTtl => args.push("KEEPTTL".into()),
    }
}

/// Replies produced by a [`Store`](crate::Store).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Reply {
    Ok,
    Int(i64),
    /// A single optional wire value (GET, GETDEL, the NX GET prior value).
    Value(Option<String>),
    /// One optional wire value per requested key (MGET).
    Values(Vec<Option<String>>),
    /// A scan page: next cursor (0 when exhausted) and matching keys.
    Scan { cursor: u64, keys: Vec<String> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_set_args() {
        let command = Command::Set {
            key: "main:a".into(),
            value: "int:1".into(),
            expiry: SetExpiry::None,
        };
        assert_eq!(command.to_args(), vec!["SET", "main:a", "int:1"]);
    }

    #[test]
    fn test_set_with_expire_args() {
        let command = Command::Set {
            key: "main:a".into(),
            value: "int:1".into(),
            expiry: SetExpiry::Seconds(3600),
        };
        assert_eq!(
            command.to_args(),
            vec!["SET", "main:a", "int:1", "EX", "3600"]
        );
    }

    #[test]
    fn test_preserve_ttl_set_args() {
        let command = Command::Set {
            key: "main:a".into(),
            value: "int:1".into(),
            expiry: SetExpiry::KeepTtl,
        };
        assert_eq!(command.to_args(), vec!["SET", "main:a", "int:1", "KEEPTTL"]);
    }

    #[test]
    fn test_set_if_absent_args() {
        let command = Command::SetIfAbsent {
            key: "main:a".into(),
            value: "str:x".into(),
            expiry: SetExpiry::Seconds(60),
        };
        assert_eq!(
            command.to_args(),
            vec!["SET", "main:a", "str:x", "NX", "GET", "EX", "60"]
        );
        let keepttl = Command::SetIfAbsent {
            key: "main:a".into(),
            value: "str:x".into(),
            expiry: SetExpiry::KeepTtl,
        };
        assert_eq!(
            keepttl.to_args(),
            vec!["SET", "main:a", "str:x", "NX", "GET", "KEEPTTL"]
        );
    }

    #[test]
    fn test_scan_args() {
        let command = Command::Scan {
            cursor: 7,
            pattern: "main:foo*".into(),
            count: Some(200),
        };
        assert_eq!(
            command.to_args(),
            vec!["SCAN", "7", "MATCH", "main:foo*", "COUNT", "200"]
        );
        let uncapped = Command::Scan {
            cursor: 0,
            pattern: "main:*".into(),
            count: None,
        };
        assert_eq!(uncapped.to_args(), vec!["SCAN", "0", "MATCH", "main:*"]);
    }

    #[test]
    fn test_multi_key_args() {
        let mget = Command::MGet {
            keys: vec!["main:a".into(), "main:b".into()],
        };
        assert_eq!(mget.to_args(), vec!["MGET", "main:a", "main:b"]);
        let del = Command::Del {
            keys: vec!["main:a".into()],
        };
        assert_eq!(del.to_args(), vec!["DEL", "main:a"]);
    }

    #[test]
    fn test_expiry_clamps_to_one_second() {
        assert_eq!(
            SetExpiry::from_duration(Duration::from_millis(250)),
            SetExpiry::Seconds(1)
        );
        assert_eq!(
            SetExpiry::from_duration(Duration::from_secs(0)),
            SetExpiry::Seconds(1)
        );
        assert_eq!(
            SetExpiry::from_duration(Duration::from_secs(90)),
            SetExpiry::Seconds(90)
        );
    }

    #[test]
    fn test_write_classification() {
        assert!(Command::Set {
            key: "k".into(),
            value: "v".into(),
            expiry: SetExpiry::None
        }
        .is_write());
        assert!(Command::Del { keys: vec![] }.is_write());
        assert!(!Command::Get { key: "k".into() }.is_write());
        assert!(!Command::GetDel { key: "k".into() }.is_write());
        assert!(!Command::SetIfAbsent {
            key: "k".into(),
            value: "v".into(),
            expiry: SetExpiry::None
        }
        .is_write());
    }

    #[test]
    fn test_ttl_policy_resolution() {
        let hour = Some(Duration::from_secs(3600));
        assert_eq!(
            SetExpiry::for_write(hour, true, true),
            SetExpiry::KeepTtl
        );
        assert_eq!(
            SetExpiry::for_write(hour, true, false),
            SetExpiry::Seconds(3600)
        );
        assert_eq!(
            SetExpiry::for_write(hour, false, true),
            SetExpiry::Seconds(3600)
        );
        assert_eq!(SetExpiry::for_write(None, false, true), SetExpiry::None);
        assert_eq!(
            SetExpiry::for_set_if_absent(hour, true),
            SetExpiry::KeepTtl
        );
        assert_eq!(
            SetExpiry::for_set_if_absent(hour, false),
            SetExpiry::Seconds(3600)
        );
    }
}
