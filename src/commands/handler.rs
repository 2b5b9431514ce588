//! Command Dispatch
//!
//! [`CommandTable`] maps lowercase command names to their implementations.
//! [`CommandHandler`] drives one request through the lifecycle:
//!
//! ```text
//! argv ──> lookup ──> arity ──> initial() ──> lock keys ──> execute()
//!            │          │          │                           │
//!            ▼          ▼          ▼                           ▼
//!       unknown cmd  WrongNum   error reply              ReplyBuilder
//! ```
//!
//! Each command runs while holding the shards of every key it declared, so
//! multi-key commands are atomic with respect to other commands.

use crate::commands::base::{Command, CommandContext};
use crate::commands::{generic, set, string};
use crate::protocol::{ReplyBuilder, RespReply, ResultCode};
use crate::storage::StorageEngine;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// Registry of every command the server understands.
pub struct CommandTable {
    commands: HashMap<&'static str, Box<dyn Command>>,
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandTable {
    /// Creates a table holding all built-in commands.
    pub fn new() -> Self {
        let mut table = Self::empty();
        string::register(&mut table);
        generic::register(&mut table);
        set::register(&mut table);
        table
    }

    pub fn empty() -> Self {
        Self {
            commands: HashMap::new(),
        }
    }

    /// Adds a command, replacing any command with the same name.
    pub fn register<C: Command + 'static>(&mut self, command: C) {
        self.commands.insert(command.spec().name, Box::new(command));
    }

    /// Looks up a command by name, ignoring ASCII case.
    pub fn get(&self, name: &[u8]) -> Option<&dyn Command> {
        let name = std::str::from_utf8(name).ok()?.to_ascii_lowercase();
        self.commands.get(name.as_str()).map(|c| c.as_ref())
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Names of all registered commands, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.commands.keys().copied()
    }
}

/// Executes commands against a shared storage engine.
///
/// Cloning is cheap; every connection holds its own clone.
#[derive(Clone)]
pub struct CommandHandler {
    storage: Arc<StorageEngine>,
    table: Arc<CommandTable>,
}

impl CommandHandler {
    /// Creates a handler with the built-in command table.
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self::with_table(storage, Arc::new(CommandTable::new()))
    }

    pub fn with_table(storage: Arc<StorageEngine>, table: Arc<CommandTable>) -> Self {
        Self { storage, table }
    }

    pub fn storage(&self) -> &Arc<StorageEngine> {
        &self.storage
    }

    pub fn table(&self) -> &CommandTable {
        &self.table
    }

    /// Executes one request and appends its reply to `reply`.
    ///
    /// An empty `argv` produces no reply.
    pub fn execute(&self, argv: &[Bytes], reply: &mut RespReply) {
        reply.begin();
        let Some(name) = argv.first() else {
            return;
        };

        let Some(command) = self.table.get(name) else {
            reply.append_error(&format!(
                "ERR unknown command '{}'",
                String::from_utf8_lossy(name)
            ));
            return;
        };

        let spec = command.spec();
        if !spec.check_arity(argv.len()) {
            reply.set_res(ResultCode::WrongNum, Some(spec.name));
            return;
        }

        let mut ctx = CommandContext::new(argv, reply);
        if !command.initial(&mut ctx) {
            trace!(command = spec.name, "Rejected during initial");
            return;
        }

        let mut keyspace = self.storage.lock(ctx.keys());
        command.execute(&mut ctx, &mut keyspace);
        trace!(command = spec.name, keys = ctx.keys().len(), "Executed");
    }

    /// Executes one request and returns its encoded reply.
    pub fn run(&self, argv: &[Bytes]) -> Bytes {
        let mut reply = RespReply::new();
        self.execute(argv, &mut reply);
        reply.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::base::{AclCategory, CommandFlags, CommandSpec};
    use crate::storage::KeyspaceService;

    fn create_handler() -> CommandHandler {
        CommandHandler::new(Arc::new(StorageEngine::new()))
    }

    fn argv(args: &[&str]) -> Vec<Bytes> {
        args.iter().map(|a| Bytes::from(a.to_string())).collect()
    }

    fn run(handler: &CommandHandler, args: &[&str]) -> Bytes {
        handler.run(&argv(args))
    }

    #[test]
    fn test_table_contents() {
        let table = CommandTable::new();
        for name in [
            "get", "set", "setnx", "setex", "psetex", "append", "getset", "mget", "mset",
            "strlen", "incr", "decr", "incrby", "decrby", "incrbyfloat", "getrange",
            "bitcount", "getbit", "setbit", "bitop", "ping", "del", "exists", "type", "ttl",
            "pttl", "sadd", "sismember",
        ] {
            assert!(table.get(name.as_bytes()).is_some(), "missing {name}");
        }
        assert_eq!(table.len(), 28);
        assert!(table.names().all(|n| n == n.to_ascii_lowercase()));
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let h = create_handler();
        assert_eq!(run(&h, &["sEt", "k", "v"]), "+OK\r\n");
        assert_eq!(run(&h, &["get", "k"]), "$1\r\nv\r\n");
        assert_eq!(run(&h, &["GET", "k"]), "$1\r\nv\r\n");
    }

    #[test]
    fn test_unknown_command() {
        let h = create_handler();
        assert_eq!(
            run(&h, &["FLY", "away"]),
            "-ERR unknown command 'FLY'\r\n"
        );
    }

    #[test]
    fn test_arity_is_checked_before_initial() {
        let h = create_handler();
        let cases = [
            (vec!["GET"], "get"),
            (vec!["GET", "a", "b"], "get"),
            (vec!["SET", "k"], "set"),
            (vec!["SETEX", "k", "10"], "setex"),
            (vec!["MGET"], "mget"),
            (vec!["GETRANGE", "k", "0"], "getrange"),
            (vec!["SETBIT", "k", "1"], "setbit"),
            (vec!["BITOP", "AND", "d"], "bitop"),
        ];
        for (args, name) in cases {
            let expected = format!("-ERR wrong number of arguments for '{name}' command\r\n");
            assert_eq!(run(&h, &args), expected.as_str());
        }
    }

    #[test]
    fn test_empty_argv_has_no_reply() {
        let h = create_handler();
        assert!(h.run(&[]).is_empty());
    }

    #[test]
    fn test_pipelined_replies_accumulate() {
        let h = create_handler();
        let mut reply = RespReply::new();
        h.execute(&argv(&["SET", "k", "1"]), &mut reply);
        h.execute(&argv(&["INCRBY", "k", "nope"]), &mut reply);
        h.execute(&argv(&["INCR", "k"]), &mut reply);

        assert_eq!(
            reply.take(),
            "+OK\r\n-ERR value is not an integer or out of range\r\n:2\r\n"
        );
    }

    #[test]
    fn test_failed_initial_leaves_keyspace_untouched() {
        let h = create_handler();
        run(&h, &["SETEX", "k", "0", "v"]);
        run(&h, &["MSET", "a", "1", "b"]);
        run(&h, &["SETBIT", "c", "-1", "1"]);
        assert_eq!(h.storage().len(), 0);
    }

    struct EchoKeysCmd;

    impl EchoKeysCmd {
        const SPEC: CommandSpec =
            CommandSpec::new("echokeys", -2, CommandFlags::READONLY, AclCategory::READ);
    }

    impl Command for EchoKeysCmd {
        fn spec(&self) -> &CommandSpec {
            &Self::SPEC
        }

        fn initial(&self, ctx: &mut CommandContext<'_>) -> bool {
            ctx.set_keys(ctx.argv()[1..].to_vec());
            true
        }

        fn execute(&self, ctx: &mut CommandContext<'_>, ks: &mut dyn KeyspaceService) {
            let keys = ctx.argv()[1..].to_vec();
            ctx.reply.append_array_len(keys.len() as i64);
            for key in &keys {
                let present = ks.get_value(key).is_some();
                ctx.reply.append_integer(i64::from(present));
            }
        }
    }

    #[test]
    fn test_custom_command_registration() {
        let mut table = CommandTable::new();
        table.register(EchoKeysCmd);
        let h = CommandHandler::with_table(Arc::new(StorageEngine::new()), Arc::new(table));

        run(&h, &["SET", "x", "1"]);
        assert_eq!(
            run(&h, &["ECHOKEYS", "x", "y"]),
            "*2\r\n:1\r\n:0\r\n"
        );
    }

    #[test]
    fn test_concurrent_incr_through_handler() {
        let h = create_handler();
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let h = h.clone();
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        run(&h, &["INCR", "hits"]);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(run(&h, &["GET", "hits"]), "$4\r\n4000\r\n");
    }

    #[test]
    fn test_multi_key_commands_across_shards() {
        let h = create_handler();
        let mut args = vec!["MSET"];
        let keys: Vec<String> = (0..200).map(|i| format!("key:{i}")).collect();
        for key in &keys {
            args.push(key);
            args.push("v");
        }
        assert_eq!(run(&h, &args), "+OK\r\n");

        let mut del = vec!["DEL"];
        del.extend(keys.iter().map(String::as_str));
        assert_eq!(run(&h, &del), ":200\r\n");
        assert!(h.storage().is_empty());
    }
}
