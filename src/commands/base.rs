//! Shared command lifecycle.
//!
//! Every command runs in two phases:
//!
//! 1. [`Command::initial`] validates the argument shape, pre-parses numeric
//!    operands and records the keys the command will touch. Returning
//!    `false` means an error reply was already written.
//! 2. [`Command::execute`] runs against a keyspace scoped to those keys.
//!
//! The dispatcher checks [`CommandSpec::arity`] before either phase.

use crate::args;
use crate::protocol::{ReplyBuilder, ResultCode};
use crate::storage::KeyspaceService;
use bytes::Bytes;

bitflags::bitflags! {
    /// Behavioural flags of a command.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CommandFlags: u8 {
        /// Command never modifies the keyspace
        const READONLY = 1 << 0;
        /// Command may modify the keyspace
        const WRITE    = 1 << 1;
        /// Command runs in constant or near constant time
        const FAST     = 1 << 2;
    }
}

bitflags::bitflags! {
    /// ACL categories a command belongs to. Annotation only.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AclCategory: u16 {
        const READ       = 1 << 0;
        const WRITE      = 1 << 1;
        const STRING     = 1 << 2;
        const SET        = 1 << 3;
        const KEYSPACE   = 1 << 4;
        const CONNECTION = 1 << 5;
        const FAST       = 1 << 6;
    }
}

/// Static metadata of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    /// Lowercase command name
    pub name: &'static str,
    /// Positive: exact argument count. Negative: minimum argument count.
    /// The command name itself is counted.
    pub arity: i32,
    pub flags: CommandFlags,
    pub acl: AclCategory,
}

impl CommandSpec {
    pub const fn new(
        name: &'static str,
        arity: i32,
        flags: CommandFlags,
        acl: AclCategory,
    ) -> Self {
        Self {
            name,
            arity,
            flags,
            acl,
        }
    }

    /// Returns `true` if `argc` arguments satisfy the arity.
    pub fn check_arity(&self, argc: usize) -> bool {
        let argc = argc as i64;
        let arity = self.arity as i64;
        if arity >= 0 {
            argc == arity
        } else {
            argc >= -arity
        }
    }

    pub fn is_write(&self) -> bool {
        self.flags.contains(CommandFlags::WRITE)
    }
}

/// Per-invocation state shared by both phases of a command.
pub struct CommandContext<'a> {
    argv: &'a [Bytes],
    keys: Vec<Bytes>,
    /// Numeric operands parsed by `initial`, in parse order
    operands: Vec<i64>,
    pub reply: &'a mut dyn ReplyBuilder,
}

impl<'a> CommandContext<'a> {
    pub fn new(argv: &'a [Bytes], reply: &'a mut dyn ReplyBuilder) -> Self {
        Self {
            argv,
            keys: Vec::new(),
            operands: Vec::new(),
            reply,
        }
    }

    /// All arguments, command name included.
    pub fn argv(&self) -> &'a [Bytes] {
        self.argv
    }

    pub fn argc(&self) -> usize {
        self.argv.len()
    }

    pub fn arg(&self, idx: usize) -> &'a Bytes {
        &self.argv[idx]
    }

    /// The key of a single-key command, which is always the first argument.
    pub fn key(&self) -> &'a Bytes {
        &self.argv[1]
    }

    /// Keys recorded by `initial`.
    pub fn keys(&self) -> &[Bytes] {
        &self.keys
    }

    pub fn set_keys(&mut self, keys: Vec<Bytes>) {
        self.keys = keys;
    }

    pub fn push_operand(&mut self, value: i64) {
        self.operands.push(value);
    }

    /// Returns the `idx`-th operand pushed by `initial`.
    pub fn operand(&self, idx: usize) -> i64 {
        self.operands[idx]
    }

    /// Parses argument `idx` as an integer, replying `InvalidInt` on failure.
    pub fn int_arg(&mut self, idx: usize) -> Option<i64> {
        let parsed = args::parse_i64(&self.argv[idx]);
        if parsed.is_none() {
            self.set_res(ResultCode::InvalidInt, None);
        }
        parsed
    }

    pub fn set_res(&mut self, code: ResultCode, detail: Option<&str>) {
        self.reply.set_res(code, detail);
    }
}

/// A command implementation.
pub trait Command: Send + Sync {
    fn spec(&self) -> &CommandSpec;

    /// Validates arguments and records keys. The default registers the first
    /// argument as the only key.
    fn initial(&self, ctx: &mut CommandContext<'_>) -> bool {
        ctx.set_keys(vec![ctx.key().clone()]);
        true
    }

    fn execute(&self, ctx: &mut CommandContext<'_>, ks: &mut dyn KeyspaceService);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::RespReply;

    const GET: CommandSpec = CommandSpec::new(
        "get",
        2,
        CommandFlags::READONLY.union(CommandFlags::FAST),
        AclCategory::READ.union(AclCategory::STRING),
    );

    const MGET: CommandSpec = CommandSpec::new(
        "mget",
        -2,
        CommandFlags::READONLY,
        AclCategory::READ.union(AclCategory::STRING),
    );

    #[test]
    fn test_check_arity_exact() {
        assert!(!GET.check_arity(1));
        assert!(GET.check_arity(2));
        assert!(!GET.check_arity(3));
    }

    #[test]
    fn test_check_arity_minimum() {
        assert!(!MGET.check_arity(1));
        assert!(MGET.check_arity(2));
        assert!(MGET.check_arity(10));
    }

    #[test]
    fn test_flags() {
        assert!(!GET.is_write());
        assert!(GET.acl.contains(AclCategory::STRING));
        assert!(!GET.acl.contains(AclCategory::WRITE));
    }

    #[test]
    fn test_context_int_arg() {
        let argv = vec![Bytes::from("getbit"), Bytes::from("k"), Bytes::from("x7")];
        let mut reply = RespReply::new();
        let mut ctx = CommandContext::new(&argv, &mut reply);

        assert_eq!(ctx.key(), "k");
        assert_eq!(ctx.int_arg(2), None);
        drop(ctx);
        assert_eq!(
            reply.current(),
            b"-ERR value is not an integer or out of range\r\n"
        );
    }

    #[test]
    fn test_context_operands() {
        let argv = vec![Bytes::from("incrby"), Bytes::from("k"), Bytes::from("5")];
        let mut reply = RespReply::new();
        let mut ctx = CommandContext::new(&argv, &mut reply);

        let delta = ctx.int_arg(2).unwrap();
        ctx.push_operand(delta);
        assert_eq!(ctx.operand(0), 5);
        assert_eq!(ctx.argc(), 3);
    }
}
