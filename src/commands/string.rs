//! String commands.
//!
//! GET, SET, APPEND, GETSET, MGET, MSET, SETNX, SETEX, PSETEX, STRLEN, INCR,
//! DECR, INCRBY, DECRBY, INCRBYFLOAT, GETRANGE, BITCOUNT, GETBIT, SETBIT and
//! BITOP.
//!
//! Writes with SET semantics (SET, MSET, SETNX, GETSET, BITOP, and APPEND or
//! INCR-family calls that create the key) leave the key without an expiry.
//! In-place updates of an existing key keep its expiry.

use crate::args;
use crate::commands::base::{AclCategory, Command, CommandContext, CommandFlags, CommandSpec};
use crate::commands::bitops::{self, BitOp, MAX_BIT_OFFSET};
use crate::commands::handler::CommandTable;
use crate::protocol::ResultCode;
use crate::storage::{unix_millis, KeyspaceError, KeyspaceService, StringValue};
use bytes::Bytes;

const READ: CommandFlags = CommandFlags::READONLY;
const READ_FAST: CommandFlags = CommandFlags::READONLY.union(CommandFlags::FAST);
const WRITE: CommandFlags = CommandFlags::WRITE;
const WRITE_FAST: CommandFlags = CommandFlags::WRITE.union(CommandFlags::FAST);
const ACL_READ: AclCategory = AclCategory::READ.union(AclCategory::STRING);
const ACL_WRITE: AclCategory = AclCategory::WRITE.union(AclCategory::STRING);

/// Registers every string command.
pub fn register(table: &mut CommandTable) {
    table.register(GetCmd);
    table.register(SetCmd);
    table.register(SetNxCmd);
    table.register(SetExCmd::setex());
    table.register(SetExCmd::psetex());
    table.register(AppendCmd);
    table.register(GetSetCmd);
    table.register(MGetCmd);
    table.register(MSetCmd);
    table.register(StrlenCmd);
    table.register(IncrCmd::incr());
    table.register(IncrCmd::decr());
    table.register(IncrByCmd::incrby());
    table.register(IncrByCmd::decrby());
    table.register(IncrByFloatCmd);
    table.register(GetRangeCmd);
    table.register(BitCountCmd);
    table.register(GetBitCmd);
    table.register(SetBitCmd);
    table.register(BitOpCmd);
}

/// Stores `value` with SET semantics: any previous value and expiry go away.
fn set_string(ks: &mut dyn KeyspaceService, key: &Bytes, value: StringValue) {
    ks.set_value(key.clone(), value.into());
    ks.clear_expire(key);
}

pub struct GetCmd;

impl GetCmd {
    const SPEC: CommandSpec = CommandSpec::new("get", 2, READ_FAST, ACL_READ);
}

impl Command for GetCmd {
    fn spec(&self) -> &CommandSpec {
        &Self::SPEC
    }

    fn execute(&self, ctx: &mut CommandContext<'_>, ks: &mut dyn KeyspaceService) {
        match ks.get_string(ctx.key()) {
            Ok(Some(value)) => ctx.reply.append_string(&value.decoded()),
            // An absent key reads as the empty string.
            Ok(None) => ctx.reply.append_string(b""),
            Err(_) => ctx.set_res(ResultCode::SyntaxErr, Some("get key error")),
        }
    }
}

pub struct SetCmd;

impl SetCmd {
    const SPEC: CommandSpec = CommandSpec::new("set", 3, WRITE, ACL_WRITE);
}

impl Command for SetCmd {
    fn spec(&self) -> &CommandSpec {
        &Self::SPEC
    }

    fn execute(&self, ctx: &mut CommandContext<'_>, ks: &mut dyn KeyspaceService) {
        set_string(ks, ctx.key(), StringValue::from_bytes(ctx.arg(2)));
        ctx.set_res(ResultCode::Ok, None);
    }
}

pub struct SetNxCmd;

impl SetNxCmd {
    const SPEC: CommandSpec = CommandSpec::new("setnx", 3, WRITE_FAST, ACL_WRITE);
}

impl Command for SetNxCmd {
    fn spec(&self) -> &CommandSpec {
        &Self::SPEC
    }

    fn execute(&self, ctx: &mut CommandContext<'_>, ks: &mut dyn KeyspaceService) {
        // Any live key blocks the write, whatever its type.
        if ks.get_value(ctx.key()).is_some() {
            ctx.reply.append_integer(0);
            return;
        }
        set_string(ks, ctx.key(), StringValue::from_bytes(ctx.arg(2)));
        ctx.reply.append_integer(1);
    }
}

/// SETEX and PSETEX, which differ only in the TTL unit.
pub struct SetExCmd {
    spec: CommandSpec,
    unit_ms: i64,
}

impl SetExCmd {
    pub fn setex() -> Self {
        Self {
            spec: CommandSpec::new("setex", 4, WRITE, ACL_WRITE),
            unit_ms: 1000,
        }
    }

    pub fn psetex() -> Self {
        Self {
            spec: CommandSpec::new("psetex", 4, WRITE, ACL_WRITE),
            unit_ms: 1,
        }
    }
}

impl Command for SetExCmd {
    fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    fn initial(&self, ctx: &mut CommandContext<'_>) -> bool {
        let Some(ttl) = ctx.int_arg(2) else {
            return false;
        };
        if ttl <= 0 {
            let msg = format!("invalid expire time in '{}' command", self.spec.name);
            ctx.set_res(ResultCode::ErrOther, Some(&msg));
            return false;
        }
        let Some(ttl_ms) = ttl.checked_mul(self.unit_ms) else {
            ctx.set_res(ResultCode::InvalidInt, None);
            return false;
        };

        ctx.push_operand(ttl_ms);
        ctx.set_keys(vec![ctx.key().clone()]);
        true
    }

    fn execute(&self, ctx: &mut CommandContext<'_>, ks: &mut dyn KeyspaceService) {
        let Some(at_ms) = i64::try_from(unix_millis())
            .ok()
            .and_then(|now| now.checked_add(ctx.operand(0)))
        else {
            ctx.set_res(ResultCode::InvalidInt, None);
            return;
        };

        let key = ctx.key();
        ks.set_value(key.clone(), StringValue::from_bytes(ctx.arg(3)).into());
        ks.set_expire(key, at_ms as u64);
        ctx.set_res(ResultCode::Ok, None);
    }
}

pub struct AppendCmd;

impl AppendCmd {
    const SPEC: CommandSpec = CommandSpec::new("append", 3, WRITE, ACL_WRITE);
}

impl Command for AppendCmd {
    fn spec(&self) -> &CommandSpec {
        &Self::SPEC
    }

    fn execute(&self, ctx: &mut CommandContext<'_>, ks: &mut dyn KeyspaceService) {
        let suffix = ctx.arg(2);
        match ks.get_string(ctx.key()) {
            Ok(Some(value)) => {
                let buf = value.raw_mut();
                buf.extend_from_slice(suffix);
                ctx.reply.append_integer(buf.len() as i64);
            }
            Ok(None) => {
                set_string(ks, ctx.key(), StringValue::from_bytes(suffix));
                ctx.reply.append_integer(suffix.len() as i64);
            }
            Err(_) => ctx.set_res(ResultCode::ErrOther, Some("append cmd error")),
        }
    }
}

pub struct GetSetCmd;

impl GetSetCmd {
    const SPEC: CommandSpec = CommandSpec::new("getset", 3, WRITE, ACL_WRITE);
}

impl Command for GetSetCmd {
    fn spec(&self) -> &CommandSpec {
        &Self::SPEC
    }

    fn execute(&self, ctx: &mut CommandContext<'_>, ks: &mut dyn KeyspaceService) {
        match ks.get_string(ctx.key()) {
            Ok(Some(old)) => ctx.reply.append_string(&old.decoded()),
            Ok(None) => ctx.reply.append_string(b""),
            Err(_) => {
                ctx.set_res(ResultCode::ErrOther, Some("getset cmd error"));
                return;
            }
        }
        set_string(ks, ctx.key(), StringValue::from_bytes(ctx.arg(2)));
    }
}

pub struct MGetCmd;

impl MGetCmd {
    const SPEC: CommandSpec = CommandSpec::new("mget", -2, READ_FAST, ACL_READ);
}

impl Command for MGetCmd {
    fn spec(&self) -> &CommandSpec {
        &Self::SPEC
    }

    fn initial(&self, ctx: &mut CommandContext<'_>) -> bool {
        ctx.set_keys(ctx.argv()[1..].to_vec());
        true
    }

    fn execute(&self, ctx: &mut CommandContext<'_>, ks: &mut dyn KeyspaceService) {
        let keys = &ctx.argv()[1..];
        ctx.reply.append_array_len(keys.len() as i64);
        for key in keys {
            match ks.get_string(key) {
                Ok(Some(value)) => ctx.reply.append_string(&value.decoded()),
                // Absent and wrong-typed keys are both nil.
                _ => ctx.reply.append_string_len(-1),
            }
        }
    }
}

pub struct MSetCmd;

impl MSetCmd {
    const SPEC: CommandSpec = CommandSpec::new("mset", -3, WRITE, ACL_WRITE);
}

impl Command for MSetCmd {
    fn spec(&self) -> &CommandSpec {
        &Self::SPEC
    }

    fn initial(&self, ctx: &mut CommandContext<'_>) -> bool {
        if ctx.argc() % 2 == 0 {
            ctx.set_res(ResultCode::WrongNum, Some(Self::SPEC.name));
            return false;
        }
        let keys = ctx.argv()[1..].iter().step_by(2).cloned().collect();
        ctx.set_keys(keys);
        true
    }

    fn execute(&self, ctx: &mut CommandContext<'_>, ks: &mut dyn KeyspaceService) {
        for pair in ctx.argv()[1..].chunks_exact(2) {
            set_string(ks, &pair[0], StringValue::from_bytes(&pair[1]));
        }
        ctx.set_res(ResultCode::Ok, None);
    }
}

pub struct StrlenCmd;

impl StrlenCmd {
    const SPEC: CommandSpec = CommandSpec::new("strlen", 2, READ_FAST, ACL_READ);
}

impl Command for StrlenCmd {
    fn spec(&self) -> &CommandSpec {
        &Self::SPEC
    }

    fn execute(&self, ctx: &mut CommandContext<'_>, ks: &mut dyn KeyspaceService) {
        match ks.get_string(ctx.key()) {
            Ok(Some(value)) => ctx.reply.append_integer(value.len() as i64),
            Ok(None) => ctx.reply.append_integer(0),
            Err(_) => ctx.set_res(ResultCode::ErrOther, None),
        }
    }
}

/// INCR and DECR.
pub struct IncrCmd {
    spec: CommandSpec,
    delta: i64,
}

impl IncrCmd {
    pub fn incr() -> Self {
        Self {
            spec: CommandSpec::new("incr", 2, WRITE_FAST, ACL_WRITE),
            delta: 1,
        }
    }

    pub fn decr() -> Self {
        Self {
            spec: CommandSpec::new("decr", 2, WRITE_FAST, ACL_WRITE),
            delta: -1,
        }
    }
}

impl Command for IncrCmd {
    fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    fn execute(&self, ctx: &mut CommandContext<'_>, ks: &mut dyn KeyspaceService) {
        match ks.get_string(ctx.key()) {
            Ok(Some(value)) => {
                let Some(n) = value.as_int_mut() else {
                    ctx.set_res(ResultCode::InvalidInt, None);
                    return;
                };
                match n.checked_add(self.delta) {
                    Some(result) => {
                        *n = result;
                        ctx.reply.append_integer(result);
                    }
                    None => ctx.set_res(ResultCode::InvalidInt, None),
                }
            }
            Ok(None) => {
                set_string(ks, ctx.key(), StringValue::Int(self.delta));
                ctx.reply.append_integer(self.delta);
            }
            Err(_) => ctx.set_res(ResultCode::ErrOther, None),
        }
    }
}

/// INCRBY and DECRBY.
pub struct IncrByCmd {
    spec: CommandSpec,
    negate: bool,
}

impl IncrByCmd {
    pub fn incrby() -> Self {
        Self {
            spec: CommandSpec::new("incrby", 3, WRITE_FAST, ACL_WRITE),
            negate: false,
        }
    }

    pub fn decrby() -> Self {
        Self {
            spec: CommandSpec::new("decrby", 3, WRITE_FAST, ACL_WRITE),
            negate: true,
        }
    }
}

impl Command for IncrByCmd {
    fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    fn initial(&self, ctx: &mut CommandContext<'_>) -> bool {
        let Some(delta) = ctx.int_arg(2) else {
            return false;
        };
        ctx.push_operand(delta);
        ctx.set_keys(vec![ctx.key().clone()]);
        true
    }

    fn execute(&self, ctx: &mut CommandContext<'_>, ks: &mut dyn KeyspaceService) {
        let key = ctx.key();
        let delta = ctx.operand(0);
        let result = if self.negate {
            ks.decrby(key, delta)
        } else {
            ks.incrby(key, delta)
        };

        match result {
            Ok(n) => ctx.reply.append_integer(n),
            Err(KeyspaceError::NotExist) => {
                let initial = if self.negate {
                    delta.checked_neg()
                } else {
                    Some(delta)
                };
                match initial {
                    Some(n) => {
                        set_string(ks, key, StringValue::Int(n));
                        ctx.reply.append_integer(n);
                    }
                    None => ctx.set_res(ResultCode::InvalidInt, None),
                }
            }
            Err(_) => ctx.set_res(ResultCode::InvalidInt, None),
        }
    }
}

pub struct IncrByFloatCmd;

impl IncrByFloatCmd {
    const SPEC: CommandSpec = CommandSpec::new("incrbyfloat", 3, WRITE_FAST, ACL_WRITE);
}

impl Command for IncrByFloatCmd {
    fn spec(&self) -> &CommandSpec {
        &Self::SPEC
    }

    fn initial(&self, ctx: &mut CommandContext<'_>) -> bool {
        if args::parse_long_double(ctx.arg(2)).is_none() {
            ctx.set_res(ResultCode::InvalidFloat, None);
            return false;
        }
        ctx.set_keys(vec![ctx.key().clone()]);
        true
    }

    fn execute(&self, ctx: &mut CommandContext<'_>, ks: &mut dyn KeyspaceService) {
        let key = ctx.key();
        let delta = ctx.arg(2);
        match ks.incrbyfloat(key, delta) {
            Ok(text) => ctx.reply.append_string(&text),
            Err(KeyspaceError::NotExist) => {
                set_string(ks, key, StringValue::raw(delta));
                ctx.reply.append_string(delta);
            }
            Err(_) => ctx.set_res(ResultCode::InvalidFloat, None),
        }
    }
}

pub struct GetRangeCmd;

impl GetRangeCmd {
    const SPEC: CommandSpec = CommandSpec::new("getrange", 4, READ, ACL_READ);
}

impl Command for GetRangeCmd {
    fn spec(&self) -> &CommandSpec {
        &Self::SPEC
    }

    fn initial(&self, ctx: &mut CommandContext<'_>) -> bool {
        let (Some(start), Some(end)) = (ctx.int_arg(2), ctx.int_arg(3)) else {
            return false;
        };
        ctx.push_operand(start);
        ctx.push_operand(end);
        ctx.set_keys(vec![ctx.key().clone()]);
        true
    }

    fn execute(&self, ctx: &mut CommandContext<'_>, ks: &mut dyn KeyspaceService) {
        let (start, end) = (ctx.operand(0), ctx.operand(1));
        match ks.get_string(ctx.key()) {
            Ok(Some(value)) => {
                let data = value.decoded();
                match args::normalize_range(start, end, data.len()) {
                    Some((from, to)) => ctx.reply.append_string(&data[from..=to]),
                    None => ctx.reply.append_string(b""),
                }
            }
            Ok(None) => ctx.reply.append_string(b""),
            Err(_) => ctx.set_res(ResultCode::ErrOther, Some("getrange cmd error")),
        }
    }
}

pub struct BitCountCmd;

impl BitCountCmd {
    const SPEC: CommandSpec = CommandSpec::new("bitcount", -2, READ, ACL_READ);
}

impl Command for BitCountCmd {
    fn spec(&self) -> &CommandSpec {
        &Self::SPEC
    }

    fn initial(&self, ctx: &mut CommandContext<'_>) -> bool {
        match ctx.argc() {
            2 => {}
            4 => {
                let (Some(start), Some(end)) = (ctx.int_arg(2), ctx.int_arg(3)) else {
                    return false;
                };
                ctx.push_operand(start);
                ctx.push_operand(end);
            }
            _ => {
                ctx.set_res(ResultCode::SyntaxErr, Some(Self::SPEC.name));
                return false;
            }
        }
        ctx.set_keys(vec![ctx.key().clone()]);
        true
    }

    fn execute(&self, ctx: &mut CommandContext<'_>, ks: &mut dyn KeyspaceService) {
        let value = match ks.get_string(ctx.key()) {
            Ok(Some(value)) => value,
            Ok(None) => {
                ctx.reply.append_integer(0);
                return;
            }
            Err(_) => {
                ctx.set_res(ResultCode::ErrOther, Some("bitcount get key error"));
                return;
            }
        };

        let data = value.decoded();
        let count = if ctx.argc() == 4 {
            match args::normalize_range(ctx.operand(0), ctx.operand(1), data.len()) {
                Some((from, to)) => bitops::popcount(&data[from..=to]),
                None => 0,
            }
        } else {
            bitops::popcount(&data)
        };
        ctx.reply.append_integer(count as i64);
    }
}

pub struct GetBitCmd;

impl GetBitCmd {
    const SPEC: CommandSpec = CommandSpec::new("getbit", 3, READ_FAST, ACL_READ);
}

impl Command for GetBitCmd {
    fn spec(&self) -> &CommandSpec {
        &Self::SPEC
    }

    fn initial(&self, ctx: &mut CommandContext<'_>) -> bool {
        let Some(offset) = ctx.int_arg(2) else {
            return false;
        };
        ctx.push_operand(offset);
        ctx.set_keys(vec![ctx.key().clone()]);
        true
    }

    fn execute(&self, ctx: &mut CommandContext<'_>, ks: &mut dyn KeyspaceService) {
        match ks.get_string(ctx.key()) {
            Ok(Some(value)) => {
                let bit = bitops::get_bit(&value.decoded(), ctx.operand(0));
                ctx.reply.append_integer(i64::from(bit));
            }
            Ok(None) => ctx.reply.append_integer(0),
            Err(_) => ctx.set_res(ResultCode::ErrOther, None),
        }
    }
}

pub struct SetBitCmd;

impl SetBitCmd {
    const SPEC: CommandSpec = CommandSpec::new("setbit", 4, WRITE, ACL_WRITE);
}

impl Command for SetBitCmd {
    fn spec(&self) -> &CommandSpec {
        &Self::SPEC
    }

    fn initial(&self, ctx: &mut CommandContext<'_>) -> bool {
        let offset = match args::parse_i64(ctx.arg(2)) {
            Some(offset) if (0..=MAX_BIT_OFFSET).contains(&offset) => offset,
            _ => {
                ctx.set_res(
                    ResultCode::ErrOther,
                    Some("bit offset is not an integer or out of range"),
                );
                return false;
            }
        };
        let on = match &ctx.arg(3)[..] {
            b"0" => 0,
            b"1" => 1,
            _ => {
                ctx.set_res(ResultCode::InvalidInt, None);
                return false;
            }
        };

        ctx.push_operand(offset);
        ctx.push_operand(on);
        ctx.set_keys(vec![ctx.key().clone()]);
        true
    }

    fn execute(&self, ctx: &mut CommandContext<'_>, ks: &mut dyn KeyspaceService) {
        let key = ctx.key();
        match ks.get_string(key) {
            Ok(Some(_)) => {}
            Ok(None) => {
                set_string(ks, key, StringValue::raw(b""));
            }
            Err(_) => {
                ctx.set_res(ResultCode::ErrOther, None);
                return;
            }
        }

        let Ok(Some(value)) = ks.get_string(key) else {
            ctx.set_res(ResultCode::ErrOther, None);
            return;
        };
        let old = bitops::set_bit(value.raw_mut(), ctx.operand(0) as u64, ctx.operand(1) == 1);
        ctx.reply.append_integer(i64::from(old));
    }
}

pub struct BitOpCmd;

impl BitOpCmd {
    const SPEC: CommandSpec = CommandSpec::new("bitop", -4, WRITE, ACL_WRITE);
}

impl Command for BitOpCmd {
    fn spec(&self) -> &CommandSpec {
        &Self::SPEC
    }

    fn initial(&self, ctx: &mut CommandContext<'_>) -> bool {
        match BitOp::parse(ctx.arg(1)) {
            Some(BitOp::Not) if ctx.argc() != 4 => {
                ctx.set_res(ResultCode::SyntaxErr, Some("operation error"));
                false
            }
            Some(_) => {
                ctx.set_keys(ctx.argv()[2..].to_vec());
                true
            }
            None => {
                ctx.set_res(ResultCode::SyntaxErr, Some("operation error"));
                false
            }
        }
    }

    fn execute(&self, ctx: &mut CommandContext<'_>, ks: &mut dyn KeyspaceService) {
        let Some(op) = BitOp::parse(ctx.arg(1)) else {
            ctx.set_res(ResultCode::SyntaxErr, None);
            return;
        };
        let dest = ctx.arg(2);

        // Missing and wrong-typed sources are skipped.
        let sources: Vec<Vec<u8>> = ctx.argv()[3..]
            .iter()
            .filter_map(|key| match ks.get_string(key) {
                Ok(Some(value)) => Some(value.decoded().into_owned()),
                _ => None,
            })
            .collect();
        let views: Vec<&[u8]> = sources.iter().map(Vec::as_slice).collect();

        let result = bitops::bitop(op, &views);
        let len = result.len();
        set_string(ks, dest, StringValue::raw(result));
        ctx.reply.append_integer(len as i64);
    }
}
