use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use rand::seq::{IteratorRandom, SliceRandom};

use crate::command::{parse_float, Command, CommandName, Reply};
use crate::error::{StoreError, StoreResult};
use crate::traits::CommandStore;

/// In-memory, HashMap-based key-value store.
///
/// Intended for tests and embedding. Implements the command families kvorm
/// uses with the usual key-value-store semantics:
/// - a command against a key of another type fails with `WrongType`
/// - collections that become empty are removed
/// - expirations are enforced lazily, when a key is next touched
pub struct InMemoryStore {
    keyspace: Mutex<Keyspace>,
}

impl InMemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            keyspace: Mutex::new(Keyspace::default()),
        }
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Keyspace>> {
        self.keyspace
            .lock()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn lock_recovering(&self) -> MutexGuard<'_, Keyspace> {
        self.keyspace.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sorted list of all live keys.
    pub fn keys(&self) -> Vec<String> {
        let mut keyspace = self.lock_recovering();
        keyspace.purge_all();
        let mut keys: Vec<String> = keyspace.entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let mut keyspace = self.lock_recovering();
        keyspace.purge_all();
        keyspace.entries.len()
    }

    /// Returns `true` if no live keys remain.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every key.
    pub fn flush(&self) {
        self.lock_recovering().entries.clear();
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandStore for InMemoryStore {
    fn execute(&self, command: &Command) -> StoreResult<Reply> {
        tracing::trace!(command = %command.name, key = ?command.key(), "in-memory execute");
        self.lock()?.dispatch(command)
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("key_count", &self.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Keyspace
// ---------------------------------------------------------------------------

/// Largest string value, in bytes.
const MAX_STRING_LEN: usize = 512 * 1024 * 1024;

#[derive(Clone, Debug)]
enum Data {
    Str(String),
    Hash(HashMap<String, String>),
    List(VecDeque<String>),
    Set(BTreeSet<String>),
    ZSet(HashMap<String, f64>),
}

impl Data {
    fn is_empty_collection(&self) -> bool {
        match self {
            Data::Str(_) => false,
            Data::Hash(h) => h.is_empty(),
            Data::List(l) => l.is_empty(),
            Data::Set(s) => s.is_empty(),
            Data::ZSet(z) => z.is_empty(),
        }
    }
}

#[derive(Clone, Debug)]
struct Entry {
    data: Data,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(data: Data) -> Self {
        Self {
            data,
            expires_at: None,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug, Default)]
struct Keyspace {
    entries: HashMap<String, Entry>,
}

macro_rules! typed_access {
    ($get:ident, $get_or_create:ident, $variant:ident, $ty:ty) => {
        fn $get(&mut self, key: &str) -> StoreResult<Option<&mut $ty>> {
            match self.live(key) {
                None => Ok(None),
                Some(Entry {
                    data: Data::$variant(value),
                    ..
                }) => Ok(Some(value)),
                Some(_) => Err(StoreError::WrongType {
                    key: key.to_string(),
                }),
            }
        }

        fn $get_or_create(&mut self, key: &str) -> StoreResult<&mut $ty> {
            self.purge(key);
            let entry = self
                .entries
                .entry(key.to_string())
                .or_insert_with(|| Entry::new(Data::$variant(Default::default())));
            match &mut entry.data {
                Data::$variant(value) => Ok(value),
                _ => Err(StoreError::WrongType {
                    key: key.to_string(),
                }),
            }
        }
    };
}

impl Keyspace {
    typed_access!(string, string_or_create, Str, String);
    typed_access!(hash, hash_or_create, Hash, HashMap<String, String>);
    typed_access!(list, list_or_create, List, VecDeque<String>);
    typed_access!(set, set_or_create, Set, BTreeSet<String>);
    typed_access!(zset, zset_or_create, ZSet, HashMap<String, f64>);

    fn purge(&mut self, key: &str) {
        let now = Instant::now();
        if self.entries.get(key).is_some_and(|e| e.is_expired(now)) {
            self.entries.remove(key);
        }
    }

    fn purge_all(&mut self) {
        let now = Instant::now();
        self.entries.retain(|_, e| !e.is_expired(now));
    }

    fn live(&mut self, key: &str) -> Option<&mut Entry> {
        self.purge(key);
        self.entries.get_mut(key)
    }

    fn drop_if_empty(&mut self, key: &str) {
        if self
            .entries
            .get(key)
            .is_some_and(|e| e.data.is_empty_collection())
        {
            self.entries.remove(key);
        }
    }

    /// Fail with `WrongType` if `key` exists and is not a list.
    fn expect_list_or_absent(&mut self, key: &str) -> StoreResult<()> {
        self.list(key).map(|_| ())
    }

    fn dispatch(&mut self, cmd: &Command) -> StoreResult<Reply> {
        use CommandName::*;

        let a = &cmd.args;
        match cmd.name {
            // ---- keys ----
            Del => {
                arity(cmd, 1, None)?;
                let mut removed = 0;
                for key in a {
                    self.purge(key);
                    if self.entries.remove(key).is_some() {
                        removed += 1;
                    }
                }
                Ok(Reply::Int(removed))
            }
            Exists => {
                arity(cmd, 1, None)?;
                let mut found = 0;
                for key in a {
                    if self.live(key).is_some() {
                        found += 1;
                    }
                }
                Ok(Reply::Int(found))
            }
            Expire => {
                arity(cmd, 2, Some(2))?;
                let secs = parse_int(&a[1])?;
                if self.live(&a[0]).is_none() {
                    return Ok(Reply::Int(0));
                }
                if secs <= 0 {
                    self.entries.remove(&a[0]);
                } else {
                    let at = deadline(cmd, secs)?;
                    if let Some(entry) = self.entries.get_mut(&a[0]) {
                        entry.expires_at = Some(at);
                    }
                }
                Ok(Reply::Int(1))
            }
            Ttl => {
                arity(cmd, 1, Some(1))?;
                let ttl = match self.live(&a[0]) {
                    None => -2,
                    Some(Entry {
                        expires_at: None, ..
                    }) => -1,
                    Some(Entry {
                        expires_at: Some(at),
                        ..
                    }) => {
                        let remaining = at.saturating_duration_since(Instant::now());
                        ((remaining.as_millis() + 500) / 1000) as i64
                    }
                };
                Ok(Reply::Int(ttl))
            }

            // ---- strings ----
            Get => {
                arity(cmd, 1, Some(1))?;
                Ok(self
                    .string(&a[0])?
                    .map_or(Reply::Nil, |s| Reply::Str(s.clone())))
            }
            Set => {
                arity(cmd, 2, Some(2))?;
                self.entries
                    .insert(a[0].clone(), Entry::new(Data::Str(a[1].clone())));
                Ok(Reply::Ok)
            }
            SetEx => {
                arity(cmd, 3, Some(3))?;
                let secs = parse_int(&a[1])?;
                if secs <= 0 {
                    return Err(StoreError::command("SETEX", "invalid expire time"));
                }
                let mut entry = Entry::new(Data::Str(a[2].clone()));
                entry.expires_at = Some(deadline(cmd, secs)?);
                self.entries.insert(a[0].clone(), entry);
                Ok(Reply::Ok)
            }
            SetNx => {
                arity(cmd, 2, Some(2))?;
                if self.live(&a[0]).is_some() {
                    return Ok(Reply::Int(0));
                }
                self.entries
                    .insert(a[0].clone(), Entry::new(Data::Str(a[1].clone())));
                Ok(Reply::Int(1))
            }
            GetSet => {
                arity(cmd, 2, Some(2))?;
                let old = self.string(&a[0])?.cloned();
                self.entries
                    .insert(a[0].clone(), Entry::new(Data::Str(a[1].clone())));
                Ok(old.map_or(Reply::Nil, Reply::Str))
            }
            Append => {
                arity(cmd, 2, Some(2))?;
                let s = self.string_or_create(&a[0])?;
                s.push_str(&a[1]);
                Ok(Reply::Int(s.len() as i64))
            }
            StrLen => {
                arity(cmd, 1, Some(1))?;
                Ok(Reply::Int(self.string(&a[0])?.map_or(0, |s| s.len()) as i64))
            }
            GetRange => {
                arity(cmd, 3, Some(3))?;
                let (start, stop) = (parse_int(&a[1])?, parse_int(&a[2])?);
                let out = match self.string(&a[0])? {
                    Some(s) => match normalize_range(start, stop, s.len()) {
                        Some((lo, hi)) => String::from_utf8_lossy(&s.as_bytes()[lo..=hi]).into_owned(),
                        None => String::new(),
                    },
                    None => String::new(),
                };
                Ok(Reply::Str(out))
            }
            SetRange => {
                arity(cmd, 3, Some(3))?;
                let (offset, end) = usize::try_from(parse_int(&a[1])?)
                    .ok()
                    .map(|offset| (offset, offset.saturating_add(a[2].len())))
                    .filter(|(_, end)| *end <= MAX_STRING_LEN)
                    .ok_or_else(|| StoreError::command("SETRANGE", "offset is out of range"))?;
                if a[2].is_empty() {
                    return Ok(Reply::Int(self.string(&a[0])?.map_or(0, |s| s.len()) as i64));
                }
                let s = self.string_or_create(&a[0])?;
                let mut bytes = std::mem::take(s).into_bytes();
                if bytes.len() < end {
                    bytes.resize(end, 0);
                }
                bytes[offset..end].copy_from_slice(a[2].as_bytes());
                *s = String::from_utf8_lossy(&bytes).into_owned();
                Ok(Reply::Int(s.len() as i64))
            }
            IncrBy | DecrBy => {
                arity(cmd, 2, Some(2))?;
                let delta = parse_int(&a[1])?;
                let delta = if cmd.name == DecrBy {
                    delta
                        .checked_neg()
                        .ok_or_else(|| StoreError::NotInteger(a[1].clone()))?
                } else {
                    delta
                };
                let current = match self.string(&a[0])? {
                    Some(s) => s
                        .parse::<i64>()
                        .map_err(|_| StoreError::NotInteger(s.clone()))?,
                    None => 0,
                };
                let next = current
                    .checked_add(delta)
                    .ok_or_else(|| StoreError::NotInteger(a[1].clone()))?;
                *self.string_or_create(&a[0])? = next.to_string();
                Ok(Reply::Int(next))
            }

            // ---- hashes ----
            HSet => {
                if a.len() < 3 || (a.len() - 1) % 2 != 0 {
                    return Err(arity_error(cmd));
                }
                let hash = self.hash_or_create(&a[0])?;
                let mut added = 0;
                for pair in a[1..].chunks(2) {
                    if hash.insert(pair[0].clone(), pair[1].clone()).is_none() {
                        added += 1;
                    }
                }
                Ok(Reply::Int(added))
            }
            HGet => {
                arity(cmd, 2, Some(2))?;
                Ok(self
                    .hash(&a[0])?
                    .and_then(|h| h.get(&a[1]).cloned())
                    .map_or(Reply::Nil, Reply::Str))
            }
            HGetAll => {
                arity(cmd, 1, Some(1))?;
                Ok(Reply::Map(self.hash(&a[0])?.cloned().unwrap_or_default()))
            }
            HDel => {
                arity(cmd, 2, None)?;
                let mut removed = 0;
                if let Some(hash) = self.hash(&a[0])? {
                    for field in &a[1..] {
                        if hash.remove(field).is_some() {
                            removed += 1;
                        }
                    }
                }
                self.drop_if_empty(&a[0]);
                Ok(Reply::Int(removed))
            }
            HExists => {
                arity(cmd, 2, Some(2))?;
                let found = self.hash(&a[0])?.is_some_and(|h| h.contains_key(&a[1]));
                Ok(Reply::Int(i64::from(found)))
            }

            // ---- lists ----
            LPush | RPush => {
                arity(cmd, 2, None)?;
                let list = self.list_or_create(&a[0])?;
                push_all(list, &a[1..], cmd.name == LPush);
                Ok(Reply::Int(list.len() as i64))
            }
            LPushX | RPushX => {
                arity(cmd, 2, None)?;
                match self.list(&a[0])? {
                    Some(list) => {
                        push_all(list, &a[1..], cmd.name == LPushX);
                        Ok(Reply::Int(list.len() as i64))
                    }
                    None => Ok(Reply::Int(0)),
                }
            }
            LPop | RPop => {
                arity(cmd, 1, Some(1))?;
                let popped = match self.list(&a[0])? {
                    Some(list) if cmd.name == LPop => list.pop_front(),
                    Some(list) => list.pop_back(),
                    None => None,
                };
                self.drop_if_empty(&a[0]);
                Ok(popped.map_or(Reply::Nil, Reply::Str))
            }
            LIndex => {
                arity(cmd, 2, Some(2))?;
                let index = parse_int(&a[1])?;
                Ok(self
                    .list(&a[0])?
                    .and_then(|list| {
                        normalize_index(index, list.len()).and_then(|i| list.get(i).cloned())
                    })
                    .map_or(Reply::Nil, Reply::Str))
            }
            LInsert => {
                arity(cmd, 4, Some(4))?;
                let after = match a[1].to_ascii_uppercase().as_str() {
                    "BEFORE" => false,
                    "AFTER" => true,
                    _ => return Err(StoreError::command("LINSERT", "syntax error")),
                };
                let Some(list) = self.list(&a[0])? else {
                    return Ok(Reply::Int(0));
                };
                match list.iter().position(|v| v == &a[2]) {
                    Some(pos) => {
                        list.insert(if after { pos + 1 } else { pos }, a[3].clone());
                        Ok(Reply::Int(list.len() as i64))
                    }
                    None => Ok(Reply::Int(-1)),
                }
            }
            LLen => {
                arity(cmd, 1, Some(1))?;
                Ok(Reply::Int(self.list(&a[0])?.map_or(0, |l| l.len()) as i64))
            }
            LRange => {
                arity(cmd, 3, Some(3))?;
                let (start, stop) = (parse_int(&a[1])?, parse_int(&a[2])?);
                let items = match self.list(&a[0])? {
                    Some(list) => match normalize_range(start, stop, list.len()) {
                        Some((lo, hi)) => list.range(lo..=hi).cloned().collect(),
                        None => Vec::new(),
                    },
                    None => Vec::new(),
                };
                Ok(Reply::List(items))
            }
            LRem => {
                arity(cmd, 3, Some(3))?;
                let count = parse_int(&a[1])?;
                let removed = match self.list(&a[0])? {
                    Some(list) => remove_occurrences(list, &a[2], count),
                    None => 0,
                };
                self.drop_if_empty(&a[0]);
                Ok(Reply::Int(removed))
            }
            LSet => {
                arity(cmd, 3, Some(3))?;
                let index = parse_int(&a[1])?;
                let Some(list) = self.list(&a[0])? else {
                    return Err(StoreError::command("LSET", "no such key"));
                };
                match normalize_index(index, list.len()).and_then(|i| list.get_mut(i)) {
                    Some(slot) => {
                        *slot = a[2].clone();
                        Ok(Reply::Ok)
                    }
                    None => Err(StoreError::command("LSET", "index out of range")),
                }
            }
            LTrim => {
                arity(cmd, 3, Some(3))?;
                let (start, stop) = (parse_int(&a[1])?, parse_int(&a[2])?);
                if let Some(list) = self.list(&a[0])? {
                    match normalize_range(start, stop, list.len()) {
                        Some((lo, hi)) => {
                            list.truncate(hi + 1);
                            list.drain(..lo);
                        }
                        None => list.clear(),
                    }
                }
                self.drop_if_empty(&a[0]);
                Ok(Reply::Ok)
            }
            RPopLPush => {
                arity(cmd, 2, Some(2))?;
                self.expect_list_or_absent(&a[1])?;
                let popped = self.list(&a[0])?.and_then(|l| l.pop_back());
                self.drop_if_empty(&a[0]);
                match popped {
                    Some(value) => {
                        self.list_or_create(&a[1])?.push_front(value.clone());
                        Ok(Reply::Str(value))
                    }
                    None => Ok(Reply::Nil),
                }
            }

            // ---- sets ----
            SAdd => {
                arity(cmd, 2, None)?;
                let set = self.set_or_create(&a[0])?;
                let added = a[1..].iter().filter(|m| set.insert((*m).clone())).count();
                Ok(Reply::Int(added as i64))
            }
            SRem => {
                arity(cmd, 2, None)?;
                let removed = match self.set(&a[0])? {
                    Some(set) => a[1..].iter().filter(|m| set.remove(*m)).count(),
                    None => 0,
                };
                self.drop_if_empty(&a[0]);
                Ok(Reply::Int(removed as i64))
            }
            SCard => {
                arity(cmd, 1, Some(1))?;
                Ok(Reply::Int(self.set(&a[0])?.map_or(0, |s| s.len()) as i64))
            }
            SIsMember => {
                arity(cmd, 2, Some(2))?;
                let found = self.set(&a[0])?.is_some_and(|s| s.contains(&a[1]));
                Ok(Reply::Int(i64::from(found)))
            }
            SMembers => {
                arity(cmd, 1, Some(1))?;
                Ok(Reply::List(
                    self.set(&a[0])?
                        .map(|s| s.iter().cloned().collect())
                        .unwrap_or_default(),
                ))
            }
            SPop => {
                arity(cmd, 1, Some(1))?;
                let popped = match self.set(&a[0])? {
                    Some(set) => {
                        let chosen = set.iter().choose(&mut rand::thread_rng()).cloned();
                        if let Some(member) = &chosen {
                            set.remove(member);
                        }
                        chosen
                    }
                    None => None,
                };
                self.drop_if_empty(&a[0]);
                Ok(popped.map_or(Reply::Nil, Reply::Str))
            }
            SRandMember => {
                arity(cmd, 1, Some(2))?;
                let mut rng = rand::thread_rng();
                let Some(count) = a.get(1) else {
                    return Ok(self
                        .set(&a[0])?
                        .and_then(|s| s.iter().choose(&mut rng).cloned())
                        .map_or(Reply::Nil, Reply::Str));
                };
                let count = parse_int(count)?;
                let members: Vec<String> = match self.set(&a[0])? {
                    None => Vec::new(),
                    Some(set) if count >= 0 => {
                        let amount = (count as usize).min(set.len());
                        let mut picked = set.iter().cloned().choose_multiple(&mut rng, amount);
                        picked.shuffle(&mut rng);
                        picked
                    }
                    Some(set) => {
                        let pool: Vec<&String> = set.iter().collect();
                        (0..count.unsigned_abs())
                            .filter_map(|_| pool.choose(&mut rng).map(|m| (*m).clone()))
                            .collect()
                    }
                };
                Ok(Reply::List(members))
            }
            SMove => {
                arity(cmd, 3, Some(3))?;
                self.set(&a[1])?;
                let moved = self.set(&a[0])?.is_some_and(|s| s.remove(&a[2]));
                self.drop_if_empty(&a[0]);
                if moved {
                    self.set_or_create(&a[1])?.insert(a[2].clone());
                }
                Ok(Reply::Int(i64::from(moved)))
            }
            SDiff | SInter | SUnion => {
                arity(cmd, 1, None)?;
                let result = self.set_algebra(cmd.name, a)?;
                Ok(Reply::List(result.into_iter().collect()))
            }
            SDiffStore | SInterStore | SUnionStore => {
                arity(cmd, 2, None)?;
                let op = match cmd.name {
                    SDiffStore => SDiff,
                    SInterStore => SInter,
                    _ => SUnion,
                };
                let result = self.set_algebra(op, &a[1..])?;
                let len = result.len() as i64;
                self.entries.remove(&a[0]);
                if !result.is_empty() {
                    self.entries
                        .insert(a[0].clone(), Entry::new(Data::Set(result)));
                }
                Ok(Reply::Int(len))
            }

            // ---- sorted sets ----
            ZAdd => {
                if a.len() < 3 || (a.len() - 1) % 2 != 0 {
                    return Err(arity_error(cmd));
                }
                let pairs = a[1..]
                    .chunks(2)
                    .map(|pair| -> StoreResult<(f64, String)> {
                        Ok((parse_float(&pair[0])?, pair[1].clone()))
                    })
                    .collect::<StoreResult<Vec<_>>>()?;
                let zset = self.zset_or_create(&a[0])?;
                let mut added = 0;
                for (score, member) in pairs {
                    if zset.insert(member, score).is_none() {
                        added += 1;
                    }
                }
                Ok(Reply::Int(added))
            }
            ZCard => {
                arity(cmd, 1, Some(1))?;
                Ok(Reply::Int(self.zset(&a[0])?.map_or(0, |z| z.len()) as i64))
            }
            ZCount => {
                arity(cmd, 3, Some(3))?;
                let min = ScoreBound::parse(&a[1])?;
                let max = ScoreBound::parse(&a[2])?;
                let count = self.zset(&a[0])?.map_or(0, |z| {
                    z.values()
                        .filter(|s| min.admits_from_below(**s) && max.admits_from_above(**s))
                        .count()
                });
                Ok(Reply::Int(count as i64))
            }
            ZIncrBy => {
                arity(cmd, 3, Some(3))?;
                let delta = parse_float(&a[1])?;
                let zset = self.zset_or_create(&a[0])?;
                let score = zset.entry(a[2].clone()).or_insert(0.0);
                let next = *score + delta;
                if next.is_nan() {
                    return Err(StoreError::NotFloat(a[1].clone()));
                }
                *score = next;
                Ok(Reply::Str(format_score(next)))
            }
            ZRange | ZRevRange => {
                arity(cmd, 3, Some(4))?;
                let (start, stop) = (parse_int(&a[1])?, parse_int(&a[2])?);
                let with_scores = match a.get(3) {
                    None => false,
                    Some(opt) if opt.eq_ignore_ascii_case("WITHSCORES") => true,
                    Some(_) => return Err(StoreError::command(cmd.name.as_str(), "syntax error")),
                };
                let mut members = self.zset(&a[0])?.map(sorted_members).unwrap_or_default();
                if cmd.name == ZRevRange {
                    members.reverse();
                }
                let selected = match normalize_range(start, stop, members.len()) {
                    Some((lo, hi)) => members[lo..=hi].to_vec(),
                    None => Vec::new(),
                };
                Ok(scored_reply(selected, with_scores))
            }
            ZRangeByScore | ZRevRangeByScore => {
                arity(cmd, 3, Some(7))?;
                let reverse = cmd.name == ZRevRangeByScore;
                let (min, max) = if reverse {
                    (ScoreBound::parse(&a[2])?, ScoreBound::parse(&a[1])?)
                } else {
                    (ScoreBound::parse(&a[1])?, ScoreBound::parse(&a[2])?)
                };
                let options = RangeOptions::parse(cmd, &a[3..])?;
                let mut members: Vec<(String, f64)> = self
                    .zset(&a[0])?
                    .map(sorted_members)
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|(_, s)| min.admits_from_below(*s) && max.admits_from_above(*s))
                    .collect();
                if reverse {
                    members.reverse();
                }
                let members = options.apply_limit(members);
                Ok(scored_reply(members, options.with_scores))
            }
            ZRank | ZRevRank => {
                arity(cmd, 2, Some(2))?;
                let mut members = self.zset(&a[0])?.map(sorted_members).unwrap_or_default();
                if cmd.name == ZRevRank {
                    members.reverse();
                }
                Ok(members
                    .iter()
                    .position(|(m, _)| m == &a[1])
                    .map_or(Reply::Nil, |pos| Reply::Int(pos as i64)))
            }
            ZRem => {
                arity(cmd, 2, None)?;
                let removed = match self.zset(&a[0])? {
                    Some(z) => a[1..].iter().filter(|m| z.remove(*m).is_some()).count(),
                    None => 0,
                };
                self.drop_if_empty(&a[0]);
                Ok(Reply::Int(removed as i64))
            }
            ZRemRangeByRank => {
                arity(cmd, 3, Some(3))?;
                let (start, stop) = (parse_int(&a[1])?, parse_int(&a[2])?);
                let removed = match self.zset(&a[0])? {
                    Some(z) => {
                        let members = sorted_members(z);
                        match normalize_range(start, stop, members.len()) {
                            Some((lo, hi)) => {
                                for (member, _) in &members[lo..=hi] {
                                    z.remove(member);
                                }
                                hi - lo + 1
                            }
                            None => 0,
                        }
                    }
                    None => 0,
                };
                self.drop_if_empty(&a[0]);
                Ok(Reply::Int(removed as i64))
            }
            ZRemRangeByScore => {
                arity(cmd, 3, Some(3))?;
                let min = ScoreBound::parse(&a[1])?;
                let max = ScoreBound::parse(&a[2])?;
                let removed = match self.zset(&a[0])? {
                    Some(z) => {
                        let before = z.len();
                        z.retain(|_, s| !(min.admits_from_below(*s) && max.admits_from_above(*s)));
                        before - z.len()
                    }
                    None => 0,
                };
                self.drop_if_empty(&a[0]);
                Ok(Reply::Int(removed as i64))
            }
            ZScore => {
                arity(cmd, 2, Some(2))?;
                Ok(self
                    .zset(&a[0])?
                    .and_then(|z| z.get(&a[1]).copied())
                    .map_or(Reply::Nil, |s| Reply::Str(format_score(s))))
            }
            ZInterStore | ZUnionStore => {
                arity(cmd, 3, None)?;
                let spec = CombineSpec::parse(cmd, &a[1..])?;
                let mut inputs = Vec::with_capacity(spec.keys.len());
                for key in spec.keys {
                    inputs.push(self.zset(key)?.cloned().unwrap_or_default());
                }
                let result = spec.combine(inputs, cmd.name == ZInterStore);
                let len = result.len() as i64;
                self.entries.remove(&a[0]);
                if !result.is_empty() {
                    self.entries
                        .insert(a[0].clone(), Entry::new(Data::ZSet(result)));
                }
                Ok(Reply::Int(len))
            }
        }
    }

    fn set_algebra(&mut self, op: CommandName, keys: &[String]) -> StoreResult<BTreeSet<String>> {
        let mut sets = Vec::with_capacity(keys.len());
        for key in keys {
            sets.push(self.set(key)?.cloned().unwrap_or_default());
        }
        let mut iter = sets.into_iter();
        let first = iter.next().unwrap_or_default();
        Ok(iter.fold(first, |acc, next| match op {
            CommandName::SDiff => acc.difference(&next).cloned().collect(),
            CommandName::SInter => acc.intersection(&next).cloned().collect(),
            _ => acc.union(&next).cloned().collect(),
        }))
    }
}

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

fn arity_error(cmd: &Command) -> StoreError {
    StoreError::Arity {
        command: cmd.name.as_str().to_string(),
    }
}

fn arity(cmd: &Command, min: usize, max: Option<usize>) -> StoreResult<()> {
    let n = cmd.args.len();
    if n < min || max.is_some_and(|max| n > max) {
        return Err(arity_error(cmd));
    }
    Ok(())
}

fn parse_int(s: &str) -> StoreResult<i64> {
    s.parse().map_err(|_| StoreError::NotInteger(s.to_string()))
}

/// Expiry instant `secs` seconds from now. Fails when the instant cannot be
/// represented.
fn deadline(cmd: &Command, secs: i64) -> StoreResult<Instant> {
    u64::try_from(secs)
        .ok()
        .and_then(|secs| Instant::now().checked_add(Duration::from_secs(secs)))
        .ok_or_else(|| StoreError::command(cmd.name.as_str(), "invalid expire time"))
}

fn format_score(score: f64) -> String {
    score.to_string()
}

/// Resolve a possibly negative index against a collection length.
fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let index = if index < 0 { len + index } else { index };
    (0..len).contains(&index).then_some(index as usize)
}

/// Resolve an inclusive `[start, stop]` range with negative indexes, clamped
/// to the collection. Returns `None` when the range selects nothing.
fn normalize_range(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len || stop < 0 {
        return None;
    }
    Some((start as usize, stop as usize))
}

fn push_all(list: &mut VecDeque<String>, values: &[String], front: bool) {
    for value in values {
        if front {
            list.push_front(value.clone());
        } else {
            list.push_back(value.clone());
        }
    }
}

fn remove_occurrences(list: &mut VecDeque<String>, value: &str, count: i64) -> i64 {
    let limit = if count == 0 {
        usize::MAX
    } else {
        count.unsigned_abs() as usize
    };
    let mut positions: Vec<usize> = list
        .iter()
        .enumerate()
        .filter(|(_, v)| *v == value)
        .map(|(i, _)| i)
        .collect();
    if count < 0 {
        positions.reverse();
    }
    positions.truncate(limit);
    positions.sort_unstable_by(|a, b| b.cmp(a));
    for pos in &positions {
        list.remove(*pos);
    }
    positions.len() as i64
}

fn sorted_members(zset: &mut HashMap<String, f64>) -> Vec<(String, f64)> {
    let mut members: Vec<(String, f64)> = zset.iter().map(|(m, s)| (m.clone(), *s)).collect();
    members.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
    members
}

fn scored_reply(members: Vec<(String, f64)>, with_scores: bool) -> Reply {
    if with_scores {
        Reply::Scored(members)
    } else {
        Reply::List(members.into_iter().map(|(m, _)| m).collect())
    }
}

/// One end of a score interval: `5`, `(5` (exclusive), `-inf`, `+inf`.
#[derive(Clone, Copy, Debug)]
struct ScoreBound {
    value: f64,
    exclusive: bool,
}

impl ScoreBound {
    fn parse(s: &str) -> StoreResult<Self> {
        match s.strip_prefix('(') {
            Some(rest) => Ok(Self {
                value: parse_float(rest)?,
                exclusive: true,
            }),
            None => Ok(Self {
                value: parse_float(s)?,
                exclusive: false,
            }),
        }
    }

    /// `score` lies above this bound used as a minimum.
    fn admits_from_below(&self, score: f64) -> bool {
        if self.exclusive {
            score > self.value
        } else {
            score >= self.value
        }
    }

    /// `score` lies below this bound used as a maximum.
    fn admits_from_above(&self, score: f64) -> bool {
        if self.exclusive {
            score < self.value
        } else {
            score <= self.value
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Aggregate {
    Sum,
    Min,
    Max,
}

impl Aggregate {
    fn fold(self, acc: f64, score: f64) -> f64 {
        match self {
            Aggregate::Sum => {
                let sum = acc + score;
                // inf + -inf
                if sum.is_nan() {
                    0.0
                } else {
                    sum
                }
            }
            Aggregate::Min => acc.min(score),
            Aggregate::Max => acc.max(score),
        }
    }
}

/// `numkeys key [key ...] [WEIGHTS w ...] [AGGREGATE SUM|MIN|MAX]` of
/// `ZINTERSTORE` / `ZUNIONSTORE`.
#[derive(Debug)]
struct CombineSpec<'a> {
    keys: &'a [String],
    weights: Vec<f64>,
    aggregate: Aggregate,
}

impl<'a> CombineSpec<'a> {
    fn parse(cmd: &Command, args: &'a [String]) -> StoreResult<Self> {
        let syntax = || StoreError::command(cmd.name.as_str(), "syntax error");
        let numkeys = usize::try_from(parse_int(&args[0])?)
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| StoreError::command(cmd.name.as_str(), "at least 1 input key is needed"))?;
        let keys = args.get(1..=numkeys).ok_or_else(syntax)?;
        let mut spec = Self {
            keys,
            weights: vec![1.0; numkeys],
            aggregate: Aggregate::Sum,
        };
        let mut rest = &args[numkeys + 1..];
        while let Some(option) = rest.first() {
            if option.eq_ignore_ascii_case("WEIGHTS") {
                let weights = rest.get(1..=numkeys).ok_or_else(syntax)?;
                spec.weights = weights
                    .iter()
                    .map(|w| parse_float(w))
                    .collect::<StoreResult<_>>()?;
                rest = &rest[numkeys + 1..];
            } else if option.eq_ignore_ascii_case("AGGREGATE") {
                let name = rest.get(1).ok_or_else(syntax)?;
                spec.aggregate = match name.to_ascii_uppercase().as_str() {
                    "SUM" => Aggregate::Sum,
                    "MIN" => Aggregate::Min,
                    "MAX" => Aggregate::Max,
                    _ => return Err(syntax()),
                };
                rest = &rest[2..];
            } else {
                return Err(syntax());
            }
        }
        Ok(spec)
    }

    /// Weighted merge of the input sorted sets. With `intersect`, only
    /// members present in every input survive.
    fn combine(&self, inputs: Vec<HashMap<String, f64>>, intersect: bool) -> HashMap<String, f64> {
        let mut merged: HashMap<String, (f64, usize)> = HashMap::new();
        for (zset, weight) in inputs.iter().zip(&self.weights) {
            for (member, score) in zset {
                let weighted = score * weight;
                let weighted = if weighted.is_nan() { 0.0 } else { weighted };
                merged
                    .entry(member.clone())
                    .and_modify(|(acc, seen)| {
                        *acc = self.aggregate.fold(*acc, weighted);
                        *seen += 1;
                    })
                    .or_insert((weighted, 1));
            }
        }
        merged
            .into_iter()
            .filter(|(_, (_, seen))| !intersect || *seen == inputs.len())
            .map(|(member, (score, _))| (member, score))
            .collect()
    }
}

/// Trailing `WITHSCORES` / `LIMIT offset count` options of score ranges.
#[derive(Debug, Default)]
struct RangeOptions {
    with_scores: bool,
    limit: Option<(usize, Option<usize>)>,
}

impl RangeOptions {
    fn parse(cmd: &Command, opts: &[String]) -> StoreResult<Self> {
        let syntax = || StoreError::command(cmd.name.as_str(), "syntax error");
        let mut options = Self::default();
        let mut i = 0;
        while i < opts.len() {
            if opts[i].eq_ignore_ascii_case("WITHSCORES") {
                options.with_scores = true;
                i += 1;
            } else if opts[i].eq_ignore_ascii_case("LIMIT") {
                let offset = parse_int(opts.get(i + 1).ok_or_else(syntax)?)?;
                let count = parse_int(opts.get(i + 2).ok_or_else(syntax)?)?;
                let offset = usize::try_from(offset).map_err(|_| syntax())?;
                let count = usize::try_from(count).ok();
                options.limit = Some((offset, count));
                i += 3;
            } else {
                return Err(syntax());
            }
        }
        Ok(options)
    }

    fn apply_limit(&self, members: Vec<(String, f64)>) -> Vec<(String, f64)> {
        match self.limit {
            None => members,
            Some((offset, count)) => members
                .into_iter()
                .skip(offset)
                .take(count.unwrap_or(usize::MAX))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(store: &InMemoryStore, name: CommandName, args: &[&str]) -> StoreResult<Reply> {
        let args = args.iter().map(|a| a.to_string()).collect();
        store.execute(&Command::with_args(name, args))
    }

    fn list(reply: Reply) -> Vec<String> {
        reply.into_list().unwrap()
    }

    // -----------------------------------------------------------------------
    // Strings and keys
    // -----------------------------------------------------------------------

    #[test]
    fn set_get_and_delete() {
        let store = InMemoryStore::new();
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
        assert!(store.exists("k").unwrap());
        assert_eq!(store.del(&["k", "missing"]).unwrap(), 1);
        assert_eq!(store.get("k").unwrap(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn incr_and_decr() {
        let store = InMemoryStore::new();
        assert_eq!(run(&store, CommandName::IncrBy, &["n", "11"]).unwrap(), Reply::Int(11));
        assert_eq!(run(&store, CommandName::IncrBy, &["n", "1"]).unwrap(), Reply::Int(12));
        assert_eq!(run(&store, CommandName::DecrBy, &["n", "2"]).unwrap(), Reply::Int(10));
        assert_eq!(store.get("n").unwrap().as_deref(), Some("10"));

        store.set("s", "abc").unwrap();
        assert!(matches!(
            run(&store, CommandName::IncrBy, &["s", "1"]),
            Err(StoreError::NotInteger(_))
        ));
    }

    #[test]
    fn setnx_getset_append() {
        let store = InMemoryStore::new();
        assert_eq!(run(&store, CommandName::SetNx, &["k", "a"]).unwrap(), Reply::Int(1));
        assert_eq!(run(&store, CommandName::SetNx, &["k", "b"]).unwrap(), Reply::Int(0));
        assert_eq!(
            run(&store, CommandName::GetSet, &["k", "c"]).unwrap(),
            Reply::Str("a".into())
        );
        assert_eq!(run(&store, CommandName::Append, &["k", "de"]).unwrap(), Reply::Int(3));
        assert_eq!(run(&store, CommandName::StrLen, &["k"]).unwrap(), Reply::Int(3));
        assert_eq!(
            run(&store, CommandName::GetRange, &["k", "1", "-1"]).unwrap(),
            Reply::Str("de".into())
        );
    }

    #[test]
    fn expiry_and_ttl() {
        let store = InMemoryStore::new();
        run(&store, CommandName::SetEx, &["k", "10", "v"]).unwrap();
        assert_eq!(run(&store, CommandName::Ttl, &["k"]).unwrap(), Reply::Int(10));
        store.set("p", "v").unwrap();
        assert_eq!(run(&store, CommandName::Ttl, &["p"]).unwrap(), Reply::Int(-1));
        assert_eq!(run(&store, CommandName::Ttl, &["none"]).unwrap(), Reply::Int(-2));

        assert_eq!(run(&store, CommandName::Expire, &["p", "0"]).unwrap(), Reply::Int(1));
        assert!(!store.exists("p").unwrap());
        assert_eq!(run(&store, CommandName::Expire, &["p", "5"]).unwrap(), Reply::Int(0));
    }

    #[test]
    fn unrepresentable_expiry_is_rejected() {
        let store = InMemoryStore::new();
        let huge = i64::MAX.to_string();
        store.set("k", "v").unwrap();

        let err = run(&store, CommandName::Expire, &["k", &huge]).unwrap_err();
        assert!(matches!(err, StoreError::Command { .. }));
        let err = run(&store, CommandName::SetEx, &["s", &huge, "v"]).unwrap_err();
        assert!(matches!(err, StoreError::Command { .. }));

        // the lock is still usable and nothing changed
        assert_eq!(run(&store, CommandName::Ttl, &["k"]).unwrap(), Reply::Int(-1));
        assert!(!store.exists("s").unwrap());
    }

    #[test]
    fn setrange_overwrites_and_pads() {
        let store = InMemoryStore::new();
        store.set("k", "Hello World").unwrap();
        assert_eq!(run(&store, CommandName::SetRange, &["k", "6", "Redis"]).unwrap(), Reply::Int(11));
        assert_eq!(store.get("k").unwrap().as_deref(), Some("Hello Redis"));

        assert_eq!(run(&store, CommandName::SetRange, &["p", "2", "ab"]).unwrap(), Reply::Int(4));
        assert_eq!(store.get("p").unwrap().as_deref(), Some("\0\0ab"));

        assert_eq!(run(&store, CommandName::SetRange, &["none", "3", ""]).unwrap(), Reply::Int(0));
        assert!(!store.exists("none").unwrap());
        assert!(run(&store, CommandName::SetRange, &["k", "-1", "x"]).is_err());
    }

    #[test]
    fn expired_keys_disappear() {
        let store = InMemoryStore::new();
        store.set("k", "v").unwrap();
        {
            let mut keyspace = store.lock().unwrap();
            keyspace.entries.get_mut("k").unwrap().expires_at = Some(Instant::now());
        }
        assert_eq!(store.get("k").unwrap(), None);
        assert!(store.keys().is_empty());
    }

    #[test]
    fn wrong_type_is_rejected() {
        let store = InMemoryStore::new();
        store.set("k", "v").unwrap();
        let err = run(&store, CommandName::LPush, &["k", "x"]).unwrap_err();
        assert_eq!(err, StoreError::WrongType { key: "k".into() });
        assert!(store.hgetall("k").is_err());
    }

    #[test]
    fn arity_is_checked() {
        let store = InMemoryStore::new();
        assert!(matches!(
            run(&store, CommandName::Get, &[]),
            Err(StoreError::Arity { .. })
        ));
        assert!(matches!(
            run(&store, CommandName::HSet, &["k", "f"]),
            Err(StoreError::Arity { .. })
        ));
    }

    // -----------------------------------------------------------------------
    // Hashes
    // -----------------------------------------------------------------------

    #[test]
    fn hash_members() {
        let store = InMemoryStore::new();
        assert!(store.hset("h", "name", "Alice").unwrap());
        assert!(!store.hset("h", "name", "Bob").unwrap());
        assert!(store.hset("h", "rating", "5").unwrap());
        assert_eq!(store.hget("h", "name").unwrap().as_deref(), Some("Bob"));

        let all = store.hgetall("h").unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all["rating"], "5");

        assert!(store.hdel("h", "name").unwrap());
        assert!(store.hdel("h", "rating").unwrap());
        assert!(!store.exists("h").unwrap());
        assert!(store.hgetall("h").unwrap().is_empty());
    }

    // -----------------------------------------------------------------------
    // Lists
    // -----------------------------------------------------------------------

    #[test]
    fn push_and_range() {
        let store = InMemoryStore::new();
        run(&store, CommandName::LPush, &["l", "a"]).unwrap();
        run(&store, CommandName::LPush, &["l", "b", "c"]).unwrap();
        run(&store, CommandName::RPush, &["l", "z"]).unwrap();
        assert_eq!(
            list(run(&store, CommandName::LRange, &["l", "0", "-1"]).unwrap()),
            vec!["c", "b", "a", "z"]
        );
        assert_eq!(
            list(run(&store, CommandName::LRange, &["l", "1", "2"]).unwrap()),
            vec!["b", "a"]
        );
        assert!(list(run(&store, CommandName::LRange, &["l", "-1", "-3"]).unwrap()).is_empty());
        assert!(list(run(&store, CommandName::LRange, &["l", "10", "20"]).unwrap()).is_empty());
    }

    #[test]
    fn pushx_requires_existing_list() {
        let store = InMemoryStore::new();
        assert_eq!(run(&store, CommandName::LPushX, &["l", "a"]).unwrap(), Reply::Int(0));
        assert!(!store.exists("l").unwrap());
        run(&store, CommandName::RPush, &["l", "a"]).unwrap();
        assert_eq!(run(&store, CommandName::RPushX, &["l", "b"]).unwrap(), Reply::Int(2));
    }

    #[test]
    fn pop_index_and_len() {
        let store = InMemoryStore::new();
        assert_eq!(run(&store, CommandName::LPop, &["l"]).unwrap(), Reply::Nil);
        run(&store, CommandName::RPush, &["l", "a", "b", "c"]).unwrap();
        assert_eq!(run(&store, CommandName::LIndex, &["l", "-1"]).unwrap(), Reply::Str("c".into()));
        assert_eq!(run(&store, CommandName::LIndex, &["l", "100"]).unwrap(), Reply::Nil);
        assert_eq!(run(&store, CommandName::LPop, &["l"]).unwrap(), Reply::Str("a".into()));
        assert_eq!(run(&store, CommandName::RPop, &["l"]).unwrap(), Reply::Str("c".into()));
        assert_eq!(run(&store, CommandName::LLen, &["l"]).unwrap(), Reply::Int(1));
        run(&store, CommandName::RPop, &["l"]).unwrap();
        assert!(!store.exists("l").unwrap());
    }

    #[test]
    fn insert_rem_set_trim() {
        let store = InMemoryStore::new();
        run(&store, CommandName::RPush, &["l", "a", "x", "b", "x", "x"]).unwrap();
        assert_eq!(
            run(&store, CommandName::LInsert, &["l", "BEFORE", "b", "n"]).unwrap(),
            Reply::Int(6)
        );
        assert_eq!(
            run(&store, CommandName::LInsert, &["l", "AFTER", "zz", "n"]).unwrap(),
            Reply::Int(-1)
        );
        assert_eq!(run(&store, CommandName::LRem, &["l", "-2", "x"]).unwrap(), Reply::Int(2));
        assert_eq!(
            list(run(&store, CommandName::LRange, &["l", "0", "-1"]).unwrap()),
            vec!["a", "x", "n", "b"]
        );
        run(&store, CommandName::LSet, &["l", "0", "A"]).unwrap();
        assert!(run(&store, CommandName::LSet, &["l", "9", "A"]).is_err());
        run(&store, CommandName::LTrim, &["l", "0", "1"]).unwrap();
        assert_eq!(
            list(run(&store, CommandName::LRange, &["l", "0", "-1"]).unwrap()),
            vec!["A", "x"]
        );
    }

    #[test]
    fn rpoplpush_moves_tail_to_head() {
        let store = InMemoryStore::new();
        run(&store, CommandName::RPush, &["src", "a", "b"]).unwrap();
        assert_eq!(
            run(&store, CommandName::RPopLPush, &["src", "dst"]).unwrap(),
            Reply::Str("b".into())
        );
        assert_eq!(list(run(&store, CommandName::LRange, &["dst", "0", "-1"]).unwrap()), vec!["b"]);
        assert_eq!(list(run(&store, CommandName::LRange, &["src", "0", "-1"]).unwrap()), vec!["a"]);
    }

    // -----------------------------------------------------------------------
    // Sets
    // -----------------------------------------------------------------------

    #[test]
    fn set_membership() {
        let store = InMemoryStore::new();
        assert_eq!(run(&store, CommandName::SAdd, &["s", "1", "1", "2"]).unwrap(), Reply::Int(2));
        assert_eq!(run(&store, CommandName::SCard, &["s"]).unwrap(), Reply::Int(2));
        assert_eq!(run(&store, CommandName::SIsMember, &["s", "1"]).unwrap(), Reply::Int(1));
        assert_eq!(run(&store, CommandName::SIsMember, &["s", "3"]).unwrap(), Reply::Int(0));
        assert_eq!(list(run(&store, CommandName::SMembers, &["s"]).unwrap()), vec!["1", "2"]);

        let popped = run(&store, CommandName::SPop, &["s"]).unwrap().into_opt_string().unwrap().unwrap();
        assert!(popped == "1" || popped == "2");
        assert_eq!(run(&store, CommandName::SCard, &["s"]).unwrap(), Reply::Int(1));
    }

    #[test]
    fn set_algebra_and_store() {
        let store = InMemoryStore::new();
        run(&store, CommandName::SAdd, &["a", "1", "2", "3"]).unwrap();
        run(&store, CommandName::SAdd, &["b", "2", "3", "4"]).unwrap();
        assert_eq!(list(run(&store, CommandName::SDiff, &["a", "b"]).unwrap()), vec!["1"]);
        assert_eq!(list(run(&store, CommandName::SInter, &["a", "b"]).unwrap()), vec!["2", "3"]);
        assert_eq!(
            list(run(&store, CommandName::SUnion, &["a", "b", "missing"]).unwrap()),
            vec!["1", "2", "3", "4"]
        );
        assert_eq!(run(&store, CommandName::SInterStore, &["c", "a", "b"]).unwrap(), Reply::Int(2));
        assert_eq!(list(run(&store, CommandName::SMembers, &["c"]).unwrap()), vec!["2", "3"]);
        assert_eq!(run(&store, CommandName::SMove, &["a", "b", "1"]).unwrap(), Reply::Int(1));
        assert_eq!(run(&store, CommandName::SMove, &["a", "b", "9"]).unwrap(), Reply::Int(0));
        assert_eq!(run(&store, CommandName::SCard, &["b"]).unwrap(), Reply::Int(4));
    }

    #[test]
    fn srandmember_with_count() {
        let store = InMemoryStore::new();
        run(&store, CommandName::SAdd, &["s", "a", "b", "c"]).unwrap();

        let mut distinct = list(run(&store, CommandName::SRandMember, &["s", "10"]).unwrap());
        distinct.sort();
        assert_eq!(distinct, vec!["a", "b", "c"]);
        assert_eq!(list(run(&store, CommandName::SRandMember, &["s", "2"]).unwrap()).len(), 2);

        let repeated = list(run(&store, CommandName::SRandMember, &["s", "-5"]).unwrap());
        assert_eq!(repeated.len(), 5);
        assert!(repeated.iter().all(|m| ["a", "b", "c"].contains(&m.as_str())));

        assert!(list(run(&store, CommandName::SRandMember, &["none", "3"]).unwrap()).is_empty());
        assert_eq!(run(&store, CommandName::SCard, &["s"]).unwrap(), Reply::Int(3));
    }

    // -----------------------------------------------------------------------
    // Sorted sets
    // -----------------------------------------------------------------------

    #[test]
    fn zadd_last_score_wins() {
        let store = InMemoryStore::new();
        assert_eq!(
            run(&store, CommandName::ZAdd, &["z", "100", "x", "300", "y", "200", "x"]).unwrap(),
            Reply::Int(2)
        );
        assert_eq!(run(&store, CommandName::ZCard, &["z"]).unwrap(), Reply::Int(2));
        assert_eq!(run(&store, CommandName::ZScore, &["z", "x"]).unwrap(), Reply::Str("200".into()));
        assert_eq!(
            list(run(&store, CommandName::ZRangeByScore, &["z", "201", "300"]).unwrap()),
            vec!["y"]
        );
    }

    #[test]
    fn zadd_rejects_bad_score_without_writing() {
        let store = InMemoryStore::new();
        assert!(matches!(
            run(&store, CommandName::ZAdd, &["z", "1", "a", "abc", "b"]),
            Err(StoreError::NotFloat(_))
        ));
        assert!(!store.exists("z").unwrap());
    }

    #[test]
    fn score_ranges_and_options() {
        let store = InMemoryStore::new();
        run(&store, CommandName::ZAdd, &["z", "1", "a", "2", "b", "3", "c", "4", "d"]).unwrap();
        assert_eq!(
            list(run(&store, CommandName::ZRangeByScore, &["z", "(1", "3"]).unwrap()),
            vec!["b", "c"]
        );
        assert_eq!(
            list(run(&store, CommandName::ZRevRangeByScore, &["z", "+inf", "-inf"]).unwrap()),
            vec!["d", "c", "b", "a"]
        );
        assert_eq!(
            list(run(&store, CommandName::ZRangeByScore, &["z", "-inf", "+inf", "LIMIT", "1", "2"]).unwrap()),
            vec!["b", "c"]
        );
        let scored = run(&store, CommandName::ZRangeByScore, &["z", "-inf", "2", "WITHSCORES"])
            .unwrap()
            .into_scored()
            .unwrap();
        assert_eq!(scored, vec![("a".to_string(), 1.0), ("b".to_string(), 2.0)]);
        assert_eq!(run(&store, CommandName::ZCount, &["z", "2", "+inf"]).unwrap(), Reply::Int(3));
    }

    #[test]
    fn rank_range_and_removal() {
        let store = InMemoryStore::new();
        run(&store, CommandName::ZAdd, &["z", "100", "a", "200", "b", "300", "c"]).unwrap();
        assert_eq!(list(run(&store, CommandName::ZRange, &["z", "1", "1"]).unwrap()), vec!["b"]);
        assert_eq!(
            list(run(&store, CommandName::ZRevRange, &["z", "0", "0"]).unwrap()),
            vec!["c"]
        );
        assert_eq!(run(&store, CommandName::ZRank, &["z", "c"]).unwrap(), Reply::Int(2));
        assert_eq!(run(&store, CommandName::ZRevRank, &["z", "c"]).unwrap(), Reply::Int(0));
        assert_eq!(run(&store, CommandName::ZRank, &["z", "q"]).unwrap(), Reply::Nil);
        assert_eq!(
            run(&store, CommandName::ZIncrBy, &["z", "50", "a"]).unwrap(),
            Reply::Str("150".into())
        );
        assert_eq!(
            run(&store, CommandName::ZRemRangeByScore, &["z", "100", "200"]).unwrap(),
            Reply::Int(2)
        );
        assert_eq!(run(&store, CommandName::ZRemRangeByRank, &["z", "0", "-1"]).unwrap(), Reply::Int(1));
        assert!(!store.exists("z").unwrap());
    }

    #[test]
    fn zinterstore_and_zunionstore() {
        let store = InMemoryStore::new();
        run(&store, CommandName::ZAdd, &["a", "1", "x", "2", "y"]).unwrap();
        run(&store, CommandName::ZAdd, &["b", "10", "y", "20", "z"]).unwrap();

        assert_eq!(
            run(&store, CommandName::ZInterStore, &["i", "2", "a", "b"]).unwrap(),
            Reply::Int(1)
        );
        assert_eq!(run(&store, CommandName::ZScore, &["i", "y"]).unwrap(), Reply::Str("12".into()));

        assert_eq!(
            run(&store, CommandName::ZUnionStore, &["u", "2", "a", "b", "WEIGHTS", "2", "1", "AGGREGATE", "MAX"])
                .unwrap(),
            Reply::Int(3)
        );
        let scored = run(&store, CommandName::ZRange, &["u", "0", "-1", "WITHSCORES"])
            .unwrap()
            .into_scored()
            .unwrap();
        assert_eq!(
            scored,
            vec![("x".to_string(), 2.0), ("y".to_string(), 10.0), ("z".to_string(), 20.0)]
        );

        assert_eq!(
            run(&store, CommandName::ZInterStore, &["i", "2", "a", "missing"]).unwrap(),
            Reply::Int(0)
        );
        assert!(!store.exists("i").unwrap());
        assert!(run(&store, CommandName::ZUnionStore, &["u", "3", "a", "b"]).is_err());
    }

    // -----------------------------------------------------------------------
    // Utility methods
    // -----------------------------------------------------------------------

    #[test]
    fn keys_are_sorted_and_flush_clears() {
        let store = InMemoryStore::new();
        store.set("b", "1").unwrap();
        store.set("a", "1").unwrap();
        assert_eq!(store.keys(), vec!["a", "b"]);
        assert_eq!(store.len(), 2);
        store.flush();
        assert!(store.is_empty());
    }

    #[test]
    fn debug_format() {
        let store = InMemoryStore::new();
        store.set("x", "1").unwrap();
        let debug = format!("{store:?}");
        assert!(debug.contains("InMemoryStore"));
        assert!(debug.contains("key_count"));
    }
}
