//! Keyspace and connection commands: PING, DEL, EXISTS, TYPE, TTL and PTTL.

use crate::commands::base::{AclCategory, Command, CommandContext, CommandFlags, CommandSpec};
use crate::commands::handler::CommandTable;
use crate::protocol::ResultCode;
use crate::storage::{unix_millis, KeyspaceService};

pub fn register(table: &mut CommandTable) {
    table.register(PingCmd);
    table.register(DelCmd);
    table.register(ExistsCmd);
    table.register(TypeCmd);
    table.register(TtlCmd::ttl());
    table.register(TtlCmd::pttl());
}

pub struct PingCmd;

impl PingCmd {
    const SPEC: CommandSpec = CommandSpec::new(
        "ping",
        -1,
        CommandFlags::FAST,
        AclCategory::CONNECTION.union(AclCategory::FAST),
    );
}

impl Command for PingCmd {
    fn spec(&self) -> &CommandSpec {
        &Self::SPEC
    }

    fn initial(&self, ctx: &mut CommandContext<'_>) -> bool {
        if ctx.argc() > 2 {
            ctx.set_res(ResultCode::WrongNum, Some(Self::SPEC.name));
            return false;
        }
        true
    }

    fn execute(&self, ctx: &mut CommandContext<'_>, _ks: &mut dyn KeyspaceService) {
        match ctx.argv().get(1) {
            Some(message) => ctx.reply.append_string(message),
            None => ctx.reply.append_status("PONG"),
        }
    }
}

pub struct DelCmd;

impl DelCmd {
    const SPEC: CommandSpec = CommandSpec::new(
        "del",
        -2,
        CommandFlags::WRITE,
        AclCategory::KEYSPACE.union(AclCategory::WRITE),
    );
}

impl Command for DelCmd {
    fn spec(&self) -> &CommandSpec {
        &Self::SPEC
    }

    fn initial(&self, ctx: &mut CommandContext<'_>) -> bool {
        ctx.set_keys(ctx.argv()[1..].to_vec());
        true
    }

    fn execute(&self, ctx: &mut CommandContext<'_>, ks: &mut dyn KeyspaceService) {
        let deleted = ctx.argv()[1..]
            .iter()
            .filter(|key| ks.delete(key))
            .count();
        ctx.reply.append_integer(deleted as i64);
    }
}

pub struct ExistsCmd;

impl ExistsCmd {
    const SPEC: CommandSpec = CommandSpec::new(
        "exists",
        -2,
        CommandFlags::READONLY.union(CommandFlags::FAST),
        AclCategory::KEYSPACE.union(AclCategory::READ),
    );
}

impl Command for ExistsCmd {
    fn spec(&self) -> &CommandSpec {
        &Self::SPEC
    }

    fn initial(&self, ctx: &mut CommandContext<'_>) -> bool {
        ctx.set_keys(ctx.argv()[1..].to_vec());
        true
    }

    fn execute(&self, ctx: &mut CommandContext<'_>, ks: &mut dyn KeyspaceService) {
        // A key named twice is counted twice.
        let count = ctx.argv()[1..]
            .iter()
            .filter(|key| ks.get_value(key).is_some())
            .count();
        ctx.reply.append_integer(count as i64);
    }
}

pub struct TypeCmd;

impl TypeCmd {
    const SPEC: CommandSpec = CommandSpec::new(
        "type",
        2,
        CommandFlags::READONLY.union(CommandFlags::FAST),
        AclCategory::KEYSPACE.union(AclCategory::READ),
    );
}

impl Command for TypeCmd {
    fn spec(&self) -> &CommandSpec {
        &Self::SPEC
    }

    fn execute(&self, ctx: &mut CommandContext<'_>, ks: &mut dyn KeyspaceService) {
        let name = ks
            .get_value(ctx.key())
            .map_or("none", |value| value.value_type().as_str());
        ctx.reply.append_status(name);
    }
}

/// TTL and PTTL.
pub struct TtlCmd {
    spec: CommandSpec,
    millis: bool,
}

impl TtlCmd {
    pub fn ttl() -> Self {
        Self {
            spec: Self::spec_named("ttl"),
            millis: false,
        }
    }

    pub fn pttl() -> Self {
        Self {
            spec: Self::spec_named("pttl"),
            millis: true,
        }
    }

    const fn spec_named(name: &'static str) -> CommandSpec {
        CommandSpec::new(
            name,
            2,
            CommandFlags::READONLY.union(CommandFlags::FAST),
            AclCategory::KEYSPACE.union(AclCategory::READ),
        )
    }
}

impl Command for TtlCmd {
    fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    fn execute(&self, ctx: &mut CommandContext<'_>, ks: &mut dyn KeyspaceService) {
        let reply = match ks.get_expire(ctx.key()) {
            Err(_) => -2,
            Ok(None) => -1,
            Ok(Some(at_ms)) => {
                let remaining = at_ms.saturating_sub(unix_millis());
                if self.millis {
                    remaining as i64
                } else {
                    ((remaining + 500) / 1000) as i64
                }
            }
        };
        ctx.reply.append_integer(reply);
    }
}
