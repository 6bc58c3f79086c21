//! Atomic Lua scripts backing every State Store transition (spec.md §4.5).
//!
//! Every script reads the current JSON-encoded state, checks the guard
//! from the spec, and either writes the mutated state back (plus any
//! index updates) or returns a sentinel meaning "guard failed, no
//! mutation happened." Redis serializes script execution, so each of
//! these is the atomic compare-and-swap the spec requires.

/// `KEYS = [state_key, active_set_key]`
/// `ARGV = [initial_state_json, battle_id]`
/// Returns 1 if created, 0 if the key already existed.
pub const TRY_INITIALIZE_BATTLE: &str = r#"
local created = redis.call('SET', KEYS[1], ARGV[1], 'NX')
if created then
  redis.call('SADD', KEYS[2], ARGV[2])
  return 1
end
return 0
"#;

/// `KEYS = [state_key, deadlines_key]`
/// `ARGV = [turn_index, deadline_unix_ms, battle_id]`
/// Returns 1 if the transition happened, 0 otherwise.
pub const TRY_OPEN_TURN: &str = r#"
local raw = redis.call('GET', KEYS[1])
if not raw then return 0 end
local state = cjson.decode(raw)
local turn_index = tonumber(ARGV[1])
local deadline = tonumber(ARGV[2])

if state.phase == 'ended' then return 0 end
if state.last_resolved_turn_index ~= (turn_index - 1) then return 0 end
if not (state.phase == 'arena_open' or state.phase == 'resolving') then return 0 end

state.phase = 'turn_open'
state.turn_index = turn_index
state.deadline_unix_ms = deadline
state.version = state.version + 1

redis.call('SET', KEYS[1], cjson.encode(state))
redis.call('ZADD', KEYS[2], deadline, ARGV[3])
return 1
"#;

/// `KEYS = [state_key]`
/// `ARGV = [turn_index]`
/// Returns 1 if the transition happened, 0 otherwise.
pub const TRY_MARK_TURN_RESOLVING: &str = r#"
local raw = redis.call('GET', KEYS[1])
if not raw then return 0 end
local state = cjson.decode(raw)
local turn_index = tonumber(ARGV[1])

if state.phase ~= 'turn_open' or state.turn_index ~= turn_index then return 0 end

state.phase = 'resolving'
state.version = state.version + 1
redis.call('SET', KEYS[1], cjson.encode(state))
return 1
"#;

/// `KEYS = [state_key, deadlines_key]`
/// `ARGV = [cur_turn, next_turn, next_deadline_ms, no_action_streak, hp_a, hp_b, battle_id]`
/// Returns 1 if the transition happened, 0 otherwise.
pub const MARK_TURN_RESOLVED_AND_OPEN_NEXT: &str = r#"
local raw = redis.call('GET', KEYS[1])
if not raw then return 0 end
local state = cjson.decode(raw)
local cur_turn = tonumber(ARGV[1])

if state.phase ~= 'resolving' or state.turn_index ~= cur_turn then return 0 end

local next_deadline = tonumber(ARGV[3])

state.last_resolved_turn_index = cur_turn
state.phase = 'turn_open'
state.turn_index = tonumber(ARGV[2])
state.deadline_unix_ms = next_deadline
state.no_action_streak_both = tonumber(ARGV[4])
state.player_a.current_hp = tonumber(ARGV[5])
state.player_b.current_hp = tonumber(ARGV[6])
state.version = state.version + 1

redis.call('SET', KEYS[1], cjson.encode(state))
redis.call('ZADD', KEYS[2], next_deadline, ARGV[7])
return 1
"#;

/// `KEYS = [state_key, active_set_key, deadlines_key]`
/// `ARGV = [turn_index, no_action_streak, hp_a, hp_b, battle_id, end_reason, winner_player_id_or_empty]`
/// Returns 2 = EndedNow, 1 = AlreadyEnded, 0 = NotCommitted.
pub const END_BATTLE_AND_MARK_RESOLVED: &str = r#"
local raw = redis.call('GET', KEYS[1])
if not raw then return 0 end
local state = cjson.decode(raw)

if state.phase == 'ended' then return 1 end

local turn_index = tonumber(ARGV[1])
if state.phase ~= 'resolving' or state.turn_index ~= turn_index then return 0 end

state.phase = 'ended'
state.last_resolved_turn_index = turn_index
state.no_action_streak_both = tonumber(ARGV[2])
state.player_a.current_hp = tonumber(ARGV[3])
state.player_b.current_hp = tonumber(ARGV[4])
state.end_reason = ARGV[6]
if ARGV[7] ~= '' then
  state.winner_player_id = ARGV[7]
else
  state.winner_player_id = cjson.null
end
state.version = state.version + 1

redis.call('SET', KEYS[1], cjson.encode(state))
redis.call('SREM', KEYS[2], ARGV[5])
redis.call('ZREM', KEYS[3], ARGV[5])
return 2
"#;

/// `KEYS = [deadlines_key]`
/// `ARGV = [now_unix_ms, limit, lease_ttl_ms, small_delay_ms]`
/// Returns a flat array `[battle_id, turn_index, battle_id, turn_index, ...]`.
pub const CLAIM_DUE_BATTLES: &str = r#"
local deadlines_key = KEYS[1]
local now = tonumber(ARGV[1])
local limit = tonumber(ARGV[2])
local lease_ttl_ms = tonumber(ARGV[3])
local small_delay_ms = tonumber(ARGV[4])

local candidates = redis.call('ZRANGEBYSCORE', deadlines_key, '-inf', now, 'LIMIT', 0, limit)
local claimed = {}

for _, battle_id in ipairs(candidates) do
  local state_key = 'battle:state:' .. battle_id
  local raw = redis.call('GET', state_key)

  if not raw then
    redis.call('ZREM', deadlines_key, battle_id)
  else
    local state = cjson.decode(raw)
    if state.phase ~= 'turn_open' and state.phase ~= 'ended' then
      redis.call('ZADD', deadlines_key, now + small_delay_ms, battle_id)
    else
      local lock_key = 'lock:battle:' .. battle_id .. ':turn:' .. tostring(state.turn_index)
      local acquired = redis.call('SET', lock_key, '1', 'NX', 'PX', lease_ttl_ms)
      if acquired then
        redis.call('ZADD', deadlines_key, now + lease_ttl_ms, battle_id)
        table.insert(claimed, battle_id)
        table.insert(claimed, tostring(state.turn_index))
      end
    end
  end
end

return claimed
"#;
