//! Command Handler Module
//!
//! This module interprets decoded requests and runs them against the store.
//!
//! ## Supported Commands
//!
//! - `GET key` - Get a key's value (`NOT_FOUND` if absent)
//! - `SET key value` - Set a key, overwriting any previous value
//! - `DEL key` - Delete a key (succeeds whether or not it existed)
//!
//! Command names are matched case-insensitively. Anything else, including a
//! known command with the wrong number of arguments, is answered with an
//! `ERROR` response and the connection keeps going.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandHandler                          │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │  execute()  │───>│  dispatch() │───>│  cmd_*()    │     │
//! │  └─────────────┘    └─────────────┘    └─────────────┘     │
//! │                                               │             │
//! │                                               ▼             │
//! │                                       &mut Store            │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use crate::protocol::Response;
use crate::storage::Store;
use bytes::Bytes;
use tracing::trace;

/// Longest prefix of an unknown command name echoed back in the error.
const MAX_ECHOED_NAME: usize = 64;

/// Something that can turn a request into a response.
///
/// The reactor is generic over this trait, so a different command set can be
/// plugged in without touching the I/O path. The store is lent for the
/// duration of one call.
pub trait CommandProcessor {
    fn execute(&self, store: &mut Store, args: &[Bytes]) -> Response;
}

/// Handles GET/SET/DEL by dispatching them to the appropriate handlers.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandHandler;

impl CommandHandler {
    /// Creates a new command handler.
    pub fn new() -> Self {
        Self
    }

    /// Dispatches a command to its handler.
    ///
    /// `args` excludes the command name.
    fn dispatch(&self, store: &mut Store, name: &[u8], args: &[Bytes]) -> Response {
        match name {
            b"GET" => self.cmd_get(store, args),
            b"SET" => self.cmd_set(store, args),
            b"DEL" => self.cmd_del(store, args),
            _ => Response::error(format!(
                "ERR unknown command '{}'",
                String::from_utf8_lossy(&name[..name.len().min(MAX_ECHOED_NAME)])
            )),
        }
    }

    /// GET key
    fn cmd_get(&self, store: &mut Store, args: &[Bytes]) -> Response {
        if args.len() != 1 {
            return wrong_arity("get");
        }

        match store.get(&args[0]) {
            Some(value) => Response::value(value),
            None => Response::not_found(),
        }
    }

    /// SET key value
    fn cmd_set(&self, store: &mut Store, args: &[Bytes]) -> Response {
        if args.len() != 2 {
            return wrong_arity("set");
        }

        match store.set(args[0].clone(), args[1].clone()) {
            Ok(_) => Response::ok(),
            Err(e) => Response::error(format!("ERR {}", e)),
        }
    }

    /// DEL key
    fn cmd_del(&self, store: &mut Store, args: &[Bytes]) -> Response {
        if args.len() != 1 {
            return wrong_arity("del");
        }

        store.delete(&args[0]);
        Response::ok()
    }
}

impl CommandProcessor for CommandHandler {
    fn execute(&self, store: &mut Store, args: &[Bytes]) -> Response {
        let Some((name, rest)) = args.split_first() else {
            return Response::error("ERR empty command");
        };

        let name = name.to_ascii_uppercase();
        trace!(
            command = %String::from_utf8_lossy(&name),
            args = rest.len(),
            "Executing command"
        );

        self.dispatch(store, &name, rest)
    }
}

fn wrong_arity(cmd: &str) -> Response {
    Response::error(format!(
        "ERR wrong number of arguments for '{}' command",
        cmd
    ))
}
