//! Command and reply wire model.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

macro_rules! command_names {
    ($($variant:ident => $wire:literal),* $(,)?) => {
        /// Store commands kvorm issues.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum CommandName {
            $($variant,)*
        }

        impl CommandName {
            /// Every supported command.
            pub const ALL: &'static [CommandName] = &[$(CommandName::$variant,)*];

            /// The command as sent on the wire.
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(CommandName::$variant => $wire,)*
                }
            }
        }
    };
}

command_names! {
    // keys
    Del => "DEL",
    Exists => "EXISTS",
    Expire => "EXPIRE",
    Ttl => "TTL",
    // strings
    Get => "GET",
    Set => "SET",
    SetEx => "SETEX",
    SetNx => "SETNX",
    GetSet => "GETSET",
    Append => "APPEND",
    StrLen => "STRLEN",
    GetRange => "GETRANGE",
    SetRange => "SETRANGE",
    IncrBy => "INCRBY",
    DecrBy => "DECRBY",
    // hashes
    HSet => "HSET",
    HGet => "HGET",
    HGetAll => "HGETALL",
    HDel => "HDEL",
    HExists => "HEXISTS",
    // lists
    LPush => "LPUSH",
    RPush => "RPUSH",
    LPushX => "LPUSHX",
    RPushX => "RPUSHX",
    LPop => "LPOP",
    RPop => "RPOP",
    LIndex => "LINDEX",
    LInsert => "LINSERT",
    LLen => "LLEN",
    LRange => "LRANGE",
    LRem => "LREM",
    LSet => "LSET",
    LTrim => "LTRIM",
    RPopLPush => "RPOPLPUSH",
    // sets
    SAdd => "SADD",
    SRem => "SREM",
    SCard => "SCARD",
    SIsMember => "SISMEMBER",
    SMembers => "SMEMBERS",
    SPop => "SPOP",
    SRandMember => "SRANDMEMBER",
    SMove => "SMOVE",
    SDiff => "SDIFF",
    SInter => "SINTER",
    SUnion => "SUNION",
    SDiffStore => "SDIFFSTORE",
    SInterStore => "SINTERSTORE",
    SUnionStore => "SUNIONSTORE",
    // sorted sets
    ZAdd => "ZADD",
    ZCard => "ZCARD",
    ZCount => "ZCOUNT",
    ZIncrBy => "ZINCRBY",
    ZRange => "ZRANGE",
    ZRevRange => "ZREVRANGE",
    ZRangeByScore => "ZRANGEBYSCORE",
    ZRevRangeByScore => "ZREVRANGEBYSCORE",
    ZRank => "ZRANK",
    ZRevRank => "ZREVRANK",
    ZRem => "ZREM",
    ZRemRangeByRank => "ZREMRANGEBYRANK",
    ZRemRangeByScore => "ZREMRANGEBYSCORE",
    ZScore => "ZSCORE",
    ZInterStore => "ZINTERSTORE",
    ZUnionStore => "ZUNIONSTORE",
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A command ready to send: a name and its positional arguments.
///
/// For every command kvorm issues, the first argument is the key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub name: CommandName,
    pub args: Vec<String>,
}

impl Command {
    /// Start a command with no arguments.
    pub fn new(name: CommandName) -> Self {
        Self {
            name,
            args: Vec::new(),
        }
    }

    /// Build a command from a name and a full argument list.
    pub fn with_args(name: CommandName, args: Vec<String>) -> Self {
        Self { name, args }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// The key this command targets, if any.
    pub fn key(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name.as_str())?;
        for arg in &self.args {
            write!(f, " {arg:?}")?;
        }
        Ok(())
    }
}

/// A reply from the store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Reply {
    /// Absent value.
    Nil,
    /// Status acknowledgement.
    Ok,
    Int(i64),
    Str(String),
    List(Vec<String>),
    Map(HashMap<String, String>),
    /// Members paired with their scores.
    Scored(Vec<(String, f64)>),
}

impl Reply {
    fn describe(&self) -> String {
        match self {
            Reply::Nil => "nil".into(),
            Reply::Ok => "OK".into(),
            Reply::Int(n) => format!("integer {n}"),
            Reply::Str(s) => format!("string {s:?}"),
            Reply::List(items) => format!("list of {}", items.len()),
            Reply::Map(map) => format!("map of {}", map.len()),
            Reply::Scored(items) => format!("scored list of {}", items.len()),
        }
    }

    fn unexpected(self, expected: &'static str) -> StoreError {
        StoreError::UnexpectedReply {
            expected,
            found: self.describe(),
        }
    }

    /// Returns `true` for a nil reply.
    pub fn is_nil(&self) -> bool {
        matches!(self, Reply::Nil)
    }

    /// Interpret as an optional string. Integers are rendered in decimal.
    pub fn into_opt_string(self) -> StoreResult<Option<String>> {
        match self {
            Reply::Nil => Ok(None),
            Reply::Str(s) => Ok(Some(s)),
            Reply::Int(n) => Ok(Some(n.to_string())),
            other => Err(other.unexpected("string or nil")),
        }
    }

    /// Interpret as an integer. String replies holding a decimal are accepted.
    pub fn into_int(self) -> StoreResult<i64> {
        match self {
            Reply::Int(n) => Ok(n),
            Reply::Str(s) => s.parse().map_err(|_| StoreError::NotInteger(s)),
            other => Err(other.unexpected("integer")),
        }
    }

    /// Interpret an integer reply as a flag (non-zero is `true`).
    pub fn into_bool(self) -> StoreResult<bool> {
        self.into_int().map(|n| n != 0)
    }

    /// Interpret as an optional float (scores).
    pub fn into_opt_float(self) -> StoreResult<Option<f64>> {
        match self {
            Reply::Nil => Ok(None),
            Reply::Int(n) => Ok(Some(n as f64)),
            Reply::Str(s) => parse_float(&s).map(Some),
            other => Err(other.unexpected("float or nil")),
        }
    }

    /// Interpret as a list of strings. Nil is an empty list.
    pub fn into_list(self) -> StoreResult<Vec<String>> {
        match self {
            Reply::Nil => Ok(Vec::new()),
            Reply::List(items) => Ok(items),
            other => Err(other.unexpected("list")),
        }
    }

    /// Interpret as a field-to-value map. Nil is an empty map.
    pub fn into_map(self) -> StoreResult<HashMap<String, String>> {
        match self {
            Reply::Nil => Ok(HashMap::new()),
            Reply::Map(map) => Ok(map),
            other => Err(other.unexpected("map")),
        }
    }

    /// Interpret as scored members. Nil is an empty list.
    pub fn into_scored(self) -> StoreResult<Vec<(String, f64)>> {
        match self {
            Reply::Nil => Ok(Vec::new()),
            Reply::Scored(items) => Ok(items),
            other => Err(other.unexpected("scored list")),
        }
    }
}

/// Parse a score, accepting `inf`, `+inf` and `-inf`. NaN is rejected.
pub(crate) fn parse_float(s: &str) -> StoreResult<f64> {
    match s.parse::<f64>() {
        Ok(v) if !v.is_nan() => Ok(v),
        _ => Err(StoreError::NotFloat(s.to_string())),
    }
}
