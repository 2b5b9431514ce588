//! Set commands. Only SADD and SISMEMBER are provided, enough to hold a
//! non-string value in the keyspace.

use crate::commands::base::{AclCategory, Command, CommandContext, CommandFlags, CommandSpec};
use crate::commands::handler::CommandTable;
use crate::protocol::ResultCode;
use crate::storage::{KeyspaceService, Value, ValueType};
use std::collections::HashSet;

pub fn register(table: &mut CommandTable) {
    table.register(SAddCmd);
    table.register(SIsMemberCmd);
}

pub struct SAddCmd;

impl SAddCmd {
    const SPEC: CommandSpec = CommandSpec::new(
        "sadd",
        -3,
        CommandFlags::WRITE.union(CommandFlags::FAST),
        AclCategory::SET.union(AclCategory::WRITE),
    );
}

impl Command for SAddCmd {
    fn spec(&self) -> &CommandSpec {
        &Self::SPEC
    }

    fn execute(&self, ctx: &mut CommandContext<'_>, ks: &mut dyn KeyspaceService) {
        let key = ctx.key();
        match ks.get_value_by_type(key, ValueType::Set) {
            Ok(Some(_)) => {}
            Ok(None) => {
                ks.set_value(key.clone(), Value::Set(HashSet::new()));
            }
            Err(_) => {
                ctx.set_res(ResultCode::ErrOther, None);
                return;
            }
        }
        let Some(Value::Set(set)) = ks.get_value(key) else {
            ctx.set_res(ResultCode::ErrOther, None);
            return;
        };

        let added = ctx.argv()[2..]
            .iter()
            .filter(|member| set.insert((*member).clone()))
            .count();
        ctx.reply.append_integer(added as i64);
    }
}

pub struct SIsMemberCmd;

impl SIsMemberCmd {
    const SPEC: CommandSpec = CommandSpec::new(
        "sismember",
        3,
        CommandFlags::READONLY.union(CommandFlags::FAST),
        AclCategory::SET.union(AclCategory::READ),
    );
}

impl Command for SIsMemberCmd {
    fn spec(&self) -> &CommandSpec {
        &Self::SPEC
    }

    fn execute(&self, ctx: &mut CommandContext<'_>, ks: &mut dyn KeyspaceService) {
        let found = match ks.get_value(ctx.key()) {
            Some(Value::Set(set)) => set.contains(&ctx.arg(2)[..]),
            _ => false,
        };
        ctx.reply.append_integer(i64::from(found));
    }
}

#[cfg(test)]
mod tests {
    use crate::commands::CommandHandler;
    use crate::storage::StorageEngine;
    use bytes::Bytes;
    use std::sync::Arc;

    fn run(handler: &CommandHandler, args: &[&str]) -> Bytes {
        let argv: Vec<Bytes> = args.iter().map(|a| Bytes::from(a.to_string())).collect();
        handler.run(&argv)
    }

    #[test]
    fn test_sadd_and_sismember() {
        let h = CommandHandler::new(Arc::new(StorageEngine::new()));
        assert_eq!(run(&h, &["SADD", "s", "a", "b", "a"]), ":2\r\n");
        assert_eq!(run(&h, &["SADD", "s", "b", "c"]), ":1\r\n");
        assert_eq!(run(&h, &["SISMEMBER", "s", "c"]), ":1\r\n");
        assert_eq!(run(&h, &["SISMEMBER", "s", "z"]), ":0\r\n");
        assert_eq!(run(&h, &["SISMEMBER", "nope", "a"]), ":0\r\n");
    }

    #[test]
    fn test_sadd_wrong_type() {
        let h = CommandHandler::new(Arc::new(StorageEngine::new()));
        run(&h, &["SET", "k", "v"]);
        assert_eq!(
            run(&h, &["SADD", "k", "a"]),
            "-ERR Operation against a key holding the wrong kind of value\r\n"
        );
        assert_eq!(run(&h, &["SISMEMBER", "k", "v"]), ":0\r\n");
    }
}
