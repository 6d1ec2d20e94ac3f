//! List, set and sorted-set proxies.
//!
//! A proxy holds no data. Each method is one store round trip against the
//! field's key: arguments are converted (entities to primary keys, dates to
//! epoch seconds), and members in the reply are resolved back to entities of
//! the field's target type.

use std::ops::{Bound, RangeBounds};
use std::sync::Arc;

use kvorm_refs::TypeIndex;
use kvorm_store::{Command, CommandName, CommandStore, Reply, StoreError};

use crate::binding::FieldBinding;
use crate::error::{ModelError, ModelResult};
use crate::mapper::Mapper;
use crate::value::Value;

/// How a command's reply is post-processed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AnswerShape {
    /// One member or nothing.
    Single,
    /// A sequence of members, optionally paired with scores.
    List,
    /// Returned as is.
    Raw,
}

#[derive(Debug)]
enum Answer {
    Single(Option<Value>),
    List(Vec<Value>),
    Scored(Vec<(Value, f64)>),
    Raw(Reply),
}

impl Answer {
    fn mismatch(self, expected: &'static str) -> ModelError {
        let found = match self {
            Answer::Single(_) => "single member",
            Answer::List(_) => "member list",
            Answer::Scored(_) => "scored member list",
            Answer::Raw(_) => "raw reply",
        };
        ModelError::Store(StoreError::UnexpectedReply {
            expected,
            found: found.to_string(),
        })
    }

    fn single(self) -> ModelResult<Option<Value>> {
        match self {
            Answer::Single(value) => Ok(value),
            other => Err(other.mismatch("single member")),
        }
    }

    fn list(self) -> ModelResult<Vec<Value>> {
        match self {
            Answer::List(values) => Ok(values),
            Answer::Scored(items) if items.is_empty() => Ok(Vec::new()),
            other => Err(other.mismatch("member list")),
        }
    }

    fn scored(self) -> ModelResult<Vec<(Value, f64)>> {
        match self {
            Answer::Scored(items) => Ok(items),
            Answer::List(values) if values.is_empty() => Ok(Vec::new()),
            other => Err(other.mismatch("scored member list")),
        }
    }

    fn raw(self) -> ModelResult<Reply> {
        match self {
            Answer::Raw(reply) => Ok(reply),
            other => Err(other.mismatch("raw reply")),
        }
    }
}

/// State shared by all proxy kinds.
#[derive(Clone)]
struct ProxyCore {
    field: String,
    key: String,
    store: Arc<dyn CommandStore>,
    target: Option<TypeIndex>,
    mapper: Mapper,
}

impl ProxyCore {
    fn new(binding: &FieldBinding, target: Option<TypeIndex>, mapper: Mapper) -> Self {
        Self {
            field: binding.name.clone(),
            key: binding.key.clone(),
            store: Arc::clone(binding.store()),
            target,
            mapper,
        }
    }

    fn arg(&self, value: impl Into<Value>) -> ModelResult<String> {
        value.into().to_arg().ok_or_else(|| {
            ModelError::validation(&self.field, "null cannot be passed as a member")
        })
    }

    fn args<I, V>(&self, values: I) -> ModelResult<Vec<String>>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        values.into_iter().map(|v| self.arg(v)).collect()
    }

    /// Resolve a stored member back to a value of the target type.
    fn resolve(&self, raw: String) -> Value {
        if raw.is_empty() {
            return Value::Null;
        }
        match self.target {
            Some(index) => Value::from(self.mapper.entity(index, raw)),
            None => Value::Str(raw),
        }
    }

    /// Run `name` with the proxy's key prepended to `args`.
    fn invoke(&self, name: CommandName, args: Vec<String>, shape: AnswerShape) -> ModelResult<Answer> {
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push(self.key.clone());
        full.extend(args);
        let command = Command::with_args(name, full);
        tracing::trace!(field = %self.field, command = %name, key = %self.key, "dispatch");
        let reply = self.store.execute(&command)?;

        Ok(match shape {
            AnswerShape::Single => Answer::Single(
                reply
                    .into_opt_string()?
                    .filter(|s| !s.is_empty())
                    .map(|s| self.resolve(s)),
            ),
            AnswerShape::List => match reply {
                Reply::Scored(items) => Answer::Scored(
                    items
                        .into_iter()
                        .map(|(member, score)| (self.resolve(member), score))
                        .collect(),
                ),
                other => Answer::List(
                    other
                        .into_list()?
                        .into_iter()
                        .map(|member| self.resolve(member))
                        .collect(),
                ),
            },
            AnswerShape::Raw => Answer::Raw(reply),
        })
    }

    fn int(&self, name: CommandName, args: Vec<String>) -> ModelResult<i64> {
        Ok(self.invoke(name, args, AnswerShape::Raw)?.raw()?.into_int()?)
    }

    fn flag(&self, name: CommandName, args: Vec<String>) -> ModelResult<bool> {
        Ok(self.invoke(name, args, AnswerShape::Raw)?.raw()?.into_bool()?)
    }

    fn unit(&self, name: CommandName, args: Vec<String>) -> ModelResult<()> {
        self.invoke(name, args, AnswerShape::Raw)?;
        Ok(())
    }

    fn single(&self, name: CommandName, args: Vec<String>) -> ModelResult<Option<Value>> {
        self.invoke(name, args, AnswerShape::Single)?.single()
    }

    fn list(&self, name: CommandName, args: Vec<String>) -> ModelResult<Vec<Value>> {
        self.invoke(name, args, AnswerShape::List)?.list()
    }

    fn scored(&self, name: CommandName, args: Vec<String>) -> ModelResult<Vec<(Value, f64)>> {
        self.invoke(name, args, AnswerShape::List)?.scored()
    }
}

impl std::fmt::Debug for ProxyCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Proxy")
            .field("field", &self.field)
            .field("key", &self.key)
            .field("target", &self.target)
            .finish()
    }
}

/// `LRANGE` bounds for a Rust range. `None` if the range is empty by
/// construction (`..0`).
fn index_bounds(range: &impl RangeBounds<i64>) -> Option<(i64, i64)> {
    let start = match range.start_bound() {
        Bound::Unbounded => 0,
        Bound::Included(s) => *s,
        Bound::Excluded(s) => s.saturating_add(1),
    };
    let stop = match range.end_bound() {
        Bound::Unbounded => -1,
        Bound::Included(e) => *e,
        Bound::Excluded(0) => return None,
        Bound::Excluded(e) => e.saturating_sub(1),
    };
    Some((start, stop))
}

fn format_score(score: f64) -> String {
    if score == f64::INFINITY {
        "+inf".into()
    } else if score == f64::NEG_INFINITY {
        "-inf".into()
    } else {
        score.to_string()
    }
}

/// Score-range arguments: open ends become `-inf`/`+inf`, exclusive ends
/// take the `(` prefix.
fn score_bounds(range: &impl RangeBounds<f64>) -> (String, String) {
    let bound = |b: Bound<&f64>, open: &str| match b {
        Bound::Unbounded => open.to_string(),
        Bound::Included(v) => format_score(*v),
        Bound::Excluded(v) => format!("({}", format_score(*v)),
    };
    (
        bound(range.start_bound(), "-inf"),
        bound(range.end_bound(), "+inf"),
    )
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

/// Where `LINSERT` places the new element relative to the pivot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertPosition {
    Before,
    After,
}

impl InsertPosition {
    fn as_str(self) -> &'static str {
        match self {
            InsertPosition::Before => "BEFORE",
            InsertPosition::After => "AFTER",
        }
    }
}

/// Proxy for a list field.
#[derive(Clone, Debug)]
pub struct ListProxy {
    core: ProxyCore,
}

impl ListProxy {
    pub(crate) fn new(binding: &FieldBinding, target: Option<TypeIndex>, mapper: Mapper) -> Self {
        Self {
            core: ProxyCore::new(binding, target, mapper),
        }
    }

    pub fn key(&self) -> &str {
        &self.core.key
    }

    pub fn lindex(&self, index: i64) -> ModelResult<Option<Value>> {
        self.core.single(CommandName::LIndex, vec![index.to_string()])
    }

    /// Insert `value` next to the first occurrence of `pivot`. Returns the
    /// new length, or -1 if the pivot is missing.
    pub fn linsert(
        &self,
        position: InsertPosition,
        pivot: impl Into<Value>,
        value: impl Into<Value>,
    ) -> ModelResult<i64> {
        let args = vec![
            position.as_str().to_string(),
            self.core.arg(pivot)?,
            self.core.arg(value)?,
        ];
        self.core.int(CommandName::LInsert, args)
    }

    pub fn llen(&self) -> ModelResult<i64> {
        self.core.int(CommandName::LLen, Vec::new())
    }

    pub fn lpop(&self) -> ModelResult<Option<Value>> {
        self.core.single(CommandName::LPop, Vec::new())
    }

    pub fn rpop(&self) -> ModelResult<Option<Value>> {
        self.core.single(CommandName::RPop, Vec::new())
    }

    /// Push each value onto the head, in order. Returns the new length.
    pub fn lpush<I, V>(&self, values: I) -> ModelResult<i64>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.core.int(CommandName::LPush, self.core.args(values)?)
    }

    /// Like [`lpush`](Self::lpush), but only if the list exists.
    pub fn lpushx<I, V>(&self, values: I) -> ModelResult<i64>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.core.int(CommandName::LPushX, self.core.args(values)?)
    }

    pub fn rpush<I, V>(&self, values: I) -> ModelResult<i64>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.core.int(CommandName::RPush, self.core.args(values)?)
    }

    pub fn rpushx<I, V>(&self, values: I) -> ModelResult<i64>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.core.int(CommandName::RPushX, self.core.args(values)?)
    }

    /// Elements from `start` to `stop`, both inclusive; negative indexes
    /// count from the tail.
    pub fn lrange(&self, start: i64, stop: i64) -> ModelResult<Vec<Value>> {
        self.core
            .list(CommandName::LRange, vec![start.to_string(), stop.to_string()])
    }

    pub fn lrem(&self, count: i64, value: impl Into<Value>) -> ModelResult<i64> {
        let args = vec![count.to_string(), self.core.arg(value)?];
        self.core.int(CommandName::LRem, args)
    }

    pub fn lset(&self, index: i64, value: impl Into<Value>) -> ModelResult<()> {
        let args = vec![index.to_string(), self.core.arg(value)?];
        self.core.unit(CommandName::LSet, args)
    }

    pub fn ltrim(&self, start: i64, stop: i64) -> ModelResult<()> {
        self.core
            .unit(CommandName::LTrim, vec![start.to_string(), stop.to_string()])
    }

    /// Move the tail of this list to the head of `destination`.
    pub fn rpoplpush(&self, destination: &ListProxy) -> ModelResult<Option<Value>> {
        self.core
            .single(CommandName::RPopLPush, vec![destination.core.key.clone()])
    }

    pub fn len(&self) -> ModelResult<usize> {
        Ok(usize::try_from(self.llen()?).unwrap_or_default())
    }

    pub fn is_empty(&self) -> ModelResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Element at `index`, fetched as a one-element range.
    pub fn get(&self, index: i64) -> ModelResult<Option<Value>> {
        Ok(self.lrange(index, index)?.into_iter().next())
    }

    /// Elements within `range`. `a..b` excludes `b`; `a..=b` includes it.
    pub fn slice(&self, range: impl RangeBounds<i64>) -> ModelResult<Vec<Value>> {
        match index_bounds(&range) {
            Some((start, stop)) => self.lrange(start, stop),
            None => Ok(Vec::new()),
        }
    }
}

// ---------------------------------------------------------------------------
// Set
// ---------------------------------------------------------------------------

/// Proxy for a set field.
#[derive(Clone, Debug)]
pub struct SetProxy {
    core: ProxyCore,
}

impl SetProxy {
    pub(crate) fn new(binding: &FieldBinding, target: Option<TypeIndex>, mapper: Mapper) -> Self {
        Self {
            core: ProxyCore::new(binding, target, mapper),
        }
    }

    pub fn key(&self) -> &str {
        &self.core.key
    }

    fn keys_of(others: &[&SetProxy]) -> Vec<String> {
        others.iter().map(|p| p.core.key.clone()).collect()
    }

    /// Add members. Returns how many were new.
    pub fn sadd<I, V>(&self, values: I) -> ModelResult<i64>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.core.int(CommandName::SAdd, self.core.args(values)?)
    }

    pub fn srem<I, V>(&self, values: I) -> ModelResult<i64>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.core.int(CommandName::SRem, self.core.args(values)?)
    }

    pub fn scard(&self) -> ModelResult<i64> {
        self.core.int(CommandName::SCard, Vec::new())
    }

    pub fn sismember(&self, value: impl Into<Value>) -> ModelResult<bool> {
        let args = vec![self.core.arg(value)?];
        self.core.flag(CommandName::SIsMember, args)
    }

    pub fn smembers(&self) -> ModelResult<Vec<Value>> {
        self.core.list(CommandName::SMembers, Vec::new())
    }

    pub fn spop(&self) -> ModelResult<Option<Value>> {
        self.core.single(CommandName::SPop, Vec::new())
    }

    pub fn srandmember(&self) -> ModelResult<Option<Value>> {
        self.core.single(CommandName::SRandMember, Vec::new())
    }

    /// Up to `count` distinct random members.
    pub fn srandmember_count(&self, count: usize) -> ModelResult<Vec<Value>> {
        self.core.list(CommandName::SRandMember, vec![count.to_string()])
    }

    /// Move `member` from this set to `destination`.
    pub fn smove(&self, destination: &SetProxy, member: impl Into<Value>) -> ModelResult<bool> {
        let args = vec![destination.core.key.clone(), self.core.arg(member)?];
        self.core.flag(CommandName::SMove, args)
    }

    /// Members of this set not in any of `others`.
    pub fn sdiff(&self, others: &[&SetProxy]) -> ModelResult<Vec<Value>> {
        self.core.list(CommandName::SDiff, Self::keys_of(others))
    }

    pub fn sinter(&self, others: &[&SetProxy]) -> ModelResult<Vec<Value>> {
        self.core.list(CommandName::SInter, Self::keys_of(others))
    }

    pub fn sunion(&self, others: &[&SetProxy]) -> ModelResult<Vec<Value>> {
        self.core.list(CommandName::SUnion, Self::keys_of(others))
    }

    /// Replace this set with the difference of `sources`. Returns its size.
    pub fn sdiffstore(&self, sources: &[&SetProxy]) -> ModelResult<i64> {
        self.core.int(CommandName::SDiffStore, Self::keys_of(sources))
    }

    pub fn sinterstore(&self, sources: &[&SetProxy]) -> ModelResult<i64> {
        self.core.int(CommandName::SInterStore, Self::keys_of(sources))
    }

    pub fn sunionstore(&self, sources: &[&SetProxy]) -> ModelResult<i64> {
        self.core.int(CommandName::SUnionStore, Self::keys_of(sources))
    }

    pub fn len(&self) -> ModelResult<usize> {
        Ok(usize::try_from(self.scard()?).unwrap_or_default())
    }

    pub fn is_empty(&self) -> ModelResult<bool> {
        Ok(self.len()? == 0)
    }
}

// ---------------------------------------------------------------------------
// Sorted set
// ---------------------------------------------------------------------------

/// Proxy for a sorted-set field.
#[derive(Clone, Debug)]
pub struct SortedSetProxy {
    core: ProxyCore,
}

impl SortedSetProxy {
    pub(crate) fn new(binding: &FieldBinding, target: Option<TypeIndex>, mapper: Mapper) -> Self {
        Self {
            core: ProxyCore::new(binding, target, mapper),
        }
    }

    pub fn key(&self) -> &str {
        &self.core.key
    }

    /// Add `(score, member)` pairs. A repeated member keeps its last score.
    /// Returns how many members were new.
    pub fn zadd<I, V>(&self, pairs: I) -> ModelResult<i64>
    where
        I: IntoIterator<Item = (f64, V)>,
        V: Into<Value>,
    {
        let mut args = Vec::new();
        for (score, member) in pairs {
            args.push(format_score(score));
            args.push(self.core.arg(member)?);
        }
        self.core.int(CommandName::ZAdd, args)
    }

    /// [`zadd`](Self::zadd) taking `(member, score)` pairs.
    pub fn zadd_mapping<I, V>(&self, mapping: I) -> ModelResult<i64>
    where
        I: IntoIterator<Item = (V, f64)>,
        V: Into<Value>,
    {
        self.zadd(mapping.into_iter().map(|(member, score)| (score, member)))
    }

    pub fn zcard(&self) -> ModelResult<i64> {
        self.core.int(CommandName::ZCard, Vec::new())
    }

    pub fn zcount(&self, range: impl RangeBounds<f64>) -> ModelResult<i64> {
        let (min, max) = score_bounds(&range);
        self.core.int(CommandName::ZCount, vec![min, max])
    }

    /// Add `increment` to a member's score. Returns the new score.
    pub fn zincrby(&self, increment: f64, member: impl Into<Value>) -> ModelResult<f64> {
        let args = vec![format_score(increment), self.core.arg(member)?];
        let reply = self.core.invoke(CommandName::ZIncrBy, args, AnswerShape::Raw)?.raw()?;
        Ok(reply.into_opt_float()?.unwrap_or_default())
    }

    /// Members ranked `start..=stop` by ascending score.
    pub fn zrange(&self, start: i64, stop: i64) -> ModelResult<Vec<Value>> {
        self.core
            .list(CommandName::ZRange, vec![start.to_string(), stop.to_string()])
    }

    pub fn zrange_with_scores(&self, start: i64, stop: i64) -> ModelResult<Vec<(Value, f64)>> {
        self.core.scored(
            CommandName::ZRange,
            vec![start.to_string(), stop.to_string(), "WITHSCORES".into()],
        )
    }

    pub fn zrevrange(&self, start: i64, stop: i64) -> ModelResult<Vec<Value>> {
        self.core
            .list(CommandName::ZRevRange, vec![start.to_string(), stop.to_string()])
    }

    pub fn zrevrange_with_scores(&self, start: i64, stop: i64) -> ModelResult<Vec<(Value, f64)>> {
        self.core.scored(
            CommandName::ZRevRange,
            vec![start.to_string(), stop.to_string(), "WITHSCORES".into()],
        )
    }

    /// Members with scores in `range`, ascending.
    pub fn zrangebyscore(&self, range: impl RangeBounds<f64>) -> ModelResult<Vec<Value>> {
        let (min, max) = score_bounds(&range);
        self.core.list(CommandName::ZRangeByScore, vec![min, max])
    }

    pub fn zrangebyscore_with_scores(
        &self,
        range: impl RangeBounds<f64>,
    ) -> ModelResult<Vec<(Value, f64)>> {
        let (min, max) = score_bounds(&range);
        self.core
            .scored(CommandName::ZRangeByScore, vec![min, max, "WITHSCORES".into()])
    }

    /// Members with scores in `range`, descending.
    pub fn zrevrangebyscore(&self, range: impl RangeBounds<f64>) -> ModelResult<Vec<Value>> {
        let (min, max) = score_bounds(&range);
        self.core.list(CommandName::ZRevRangeByScore, vec![max, min])
    }

    pub fn zrevrangebyscore_with_scores(
        &self,
        range: impl RangeBounds<f64>,
    ) -> ModelResult<Vec<(Value, f64)>> {
        let (min, max) = score_bounds(&range);
        self.core
            .scored(CommandName::ZRevRangeByScore, vec![max, min, "WITHSCORES".into()])
    }

    pub fn zrank(&self, member: impl Into<Value>) -> ModelResult<Option<i64>> {
        self.rank(CommandName::ZRank, member)
    }

    pub fn zrevrank(&self, member: impl Into<Value>) -> ModelResult<Option<i64>> {
        self.rank(CommandName::ZRevRank, member)
    }

    fn rank(&self, name: CommandName, member: impl Into<Value>) -> ModelResult<Option<i64>> {
        let reply = self
            .core
            .invoke(name, vec![self.core.arg(member)?], AnswerShape::Raw)?
            .raw()?;
        if reply.is_nil() {
            return Ok(None);
        }
        Ok(Some(reply.into_int()?))
    }

    pub fn zrem<I, V>(&self, members: I) -> ModelResult<i64>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.core.int(CommandName::ZRem, self.core.args(members)?)
    }

    pub fn zremrangebyrank(&self, start: i64, stop: i64) -> ModelResult<i64> {
        self.core.int(
            CommandName::ZRemRangeByRank,
            vec![start.to_string(), stop.to_string()],
        )
    }

    pub fn zremrangebyscore(&self, range: impl RangeBounds<f64>) -> ModelResult<i64> {
        let (min, max) = score_bounds(&range);
        self.core.int(CommandName::ZRemRangeByScore, vec![min, max])
    }

    fn combine_args(sources: &[&SortedSetProxy]) -> Vec<String> {
        let mut args = Vec::with_capacity(sources.len() + 1);
        args.push(sources.len().to_string());
        args.extend(sources.iter().map(|p| p.core.key.clone()));
        args
    }

    /// Replace this sorted set with the members common to all `sources`,
    /// scores summed. Returns its size.
    pub fn zinterstore(&self, sources: &[&SortedSetProxy]) -> ModelResult<i64> {
        self.core.int(CommandName::ZInterStore, Self::combine_args(sources))
    }

    /// Replace this sorted set with the members of any of `sources`, scores
    /// summed. Returns its size.
    pub fn zunionstore(&self, sources: &[&SortedSetProxy]) -> ModelResult<i64> {
        self.core.int(CommandName::ZUnionStore, Self::combine_args(sources))
    }

    pub fn zscore(&self, member: impl Into<Value>) -> ModelResult<Option<f64>> {
        let reply = self
            .core
            .invoke(CommandName::ZScore, vec![self.core.arg(member)?], AnswerShape::Raw)?
            .raw()?;
        Ok(reply.into_opt_float()?)
    }

    pub fn len(&self) -> ModelResult<usize> {
        Ok(usize::try_from(self.zcard()?).unwrap_or_default())
    }

    pub fn is_empty(&self) -> ModelResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Members within a score range; `..` selects everything.
    pub fn slice(&self, range: impl RangeBounds<f64>) -> ModelResult<Vec<Value>> {
        self.zrangebyscore(range)
    }

    /// The member holding exactly `score`, if any.
    pub fn at(&self, score: f64) -> ModelResult<Option<Value>> {
        Ok(self.zrangebyscore(score..=score)?.into_iter().next())
    }
}
