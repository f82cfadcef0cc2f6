//! Line protocol definitions
//!
//! One command per `\n`-terminated line from the client, plain text notices
//! back. Matching is exact and byte-for-byte; nothing is case-normalized.

use std::fmt;

use crate::error::{MalformedReason, RelayError};

/// Broadcast body published when a session comes online
pub const ONLINE_BODY: &str = "already online~";

/// Broadcast body published when a session goes offline
pub const OFFLINE_BODY: &str = "already offline~";

/// Client → Server command
///
/// Borrowed from the inbound line; evaluated in declaration order.
#[derive(Debug, PartialEq, Eq)]
pub enum ClientCommand<'a> {
    /// `who`: list everyone online to the requester
    Who,
    /// `rename|<newName>`
    Rename { new_name: &'a str },
    /// `to|<target>|<body>`
    DirectMessage { target: &'a str, body: &'a str },
    /// Anything else, including the empty line
    Broadcast { body: &'a str },
}

impl<'a> ClientCommand<'a> {
    /// Interpret one inbound line
    ///
    /// The trailing line terminator (`\n` or `\r\n`) is stripped first.
    /// For `to|` the body keeps any further `|` characters.
    pub fn parse(line: &'a str) -> Self {
        let line = line.trim_end_matches(|c: char| c == '\r' || c == '\n');

        if line == "who" {
            return ClientCommand::Who;
        }

        if line.starts_with("rename|") {
            let new_name = line.split('|').nth(1).unwrap_or_default();
            return ClientCommand::Rename { new_name };
        }

        if line.starts_with("to|") {
            let mut fields = line.splitn(3, '|').skip(1);
            let target = fields.next().unwrap_or_default();
            let body = fields.next().unwrap_or_default();
            return ClientCommand::DirectMessage { target, body };
        }

        ClientCommand::Broadcast { body: line }
    }
}

/// Format a message for fan-out: `[addr]name:body`
pub fn format_broadcast(addr: &str, name: &str, body: &str) -> String {
    format!("[{}]{}:{}", addr, name, body)
}

/// Server → Client notice
///
/// Rendered through `Display`; the writer appends the line terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerNotice {
    /// One line of the `who` listing
    WhoEntry { addr: String, name: String },
    /// Rename accepted
    Renamed { name: String },
    /// Rename target empty or in use
    NameTaken,
    /// `to|` without a target
    BadDirectFormat,
    /// `to|` recipient is offline
    TargetNotFound,
    /// `to|` without a body
    EmptyBody,
    /// Inbound line exceeded the configured limit
    LineTooLong,
    /// Idle eviction
    ForcedLogout,
    /// Direct message received
    Direct { from: String, body: String },
    /// Server-side failure unrelated to the client's input
    InternalError,
}

impl fmt::Display for ServerNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerNotice::WhoEntry { addr, name } => write!(f, "({}:{}),在线...", addr, name),
            ServerNotice::Renamed { name } => write!(f, "您已经更新用户名:{}", name),
            ServerNotice::NameTaken => f.write_str("当前用户名被使用"),
            ServerNotice::BadDirectFormat => {
                f.write_str("消息格式不正确，请使用 \"to|张三|你好啊\"格式。")
            }
            ServerNotice::TargetNotFound => f.write_str("该用户名不存在"),
            ServerNotice::EmptyBody => f.write_str("无消息内容，请重发"),
            ServerNotice::LineTooLong => f.write_str("消息过长"),
            ServerNotice::ForcedLogout => f.write_str("你已被强制退出"),
            ServerNotice::Direct { from, body } => write!(f, "{}:{}", from, body),
            ServerNotice::InternalError => f.write_str("服务器内部错误"),
        }
    }
}

impl From<ServerNotice> for String {
    fn from(notice: ServerNotice) -> Self {
        notice.to_string()
    }
}

/// Convert RelayError to ServerNotice for client notification
impl From<RelayError> for ServerNotice {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::NameTaken(_) => ServerNotice::NameTaken,
            RelayError::TargetNotFound(_) => ServerNotice::TargetNotFound,
            RelayError::MalformedCommand(MalformedReason::MissingTarget) => {
                ServerNotice::BadDirectFormat
            }
            RelayError::MalformedCommand(MalformedReason::EmptyBody) => ServerNotice::EmptyBody,
            RelayError::MalformedCommand(MalformedReason::LineTooLong) => {
                ServerNotice::LineTooLong
            }
            RelayError::IdleTimeout => ServerNotice::ForcedLogout,
            RelayError::SessionGone(_)
            | RelayError::ConnectionClosed
            | RelayError::Io(_)
            | RelayError::Codec(_)
            | RelayError::Config(_)
            | RelayError::Json(_)
            | RelayError::ChannelSend => ServerNotice::InternalError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_who_exact_only() {
        assert_eq!(ClientCommand::parse("who"), ClientCommand::Who);
        assert_eq!(ClientCommand::parse("who\r\n"), ClientCommand::Who);
        assert_eq!(
            ClientCommand::parse("WHO"),
            ClientCommand::Broadcast { body: "WHO" }
        );
        assert_eq!(
            ClientCommand::parse("who "),
            ClientCommand::Broadcast { body: "who " }
        );
    }

    #[test]
    fn test_parse_rename_takes_second_field() {
        assert_eq!(
            ClientCommand::parse("rename|alice"),
            ClientCommand::Rename { new_name: "alice" }
        );
        assert_eq!(
            ClientCommand::parse("rename|alice|extra"),
            ClientCommand::Rename { new_name: "alice" }
        );
        assert_eq!(
            ClientCommand::parse("rename|"),
            ClientCommand::Rename { new_name: "" }
        );
    }

    #[test]
    fn test_parse_direct_message() {
        assert_eq!(
            ClientCommand::parse("to|bob|hello"),
            ClientCommand::DirectMessage {
                target: "bob",
                body: "hello"
            }
        );
        assert_eq!(
            ClientCommand::parse("to|bob|a|b"),
            ClientCommand::DirectMessage {
                target: "bob",
                body: "a|b"
            }
        );
        assert_eq!(
            ClientCommand::parse("to|bob"),
            ClientCommand::DirectMessage {
                target: "bob",
                body: ""
            }
        );
        assert_eq!(
            ClientCommand::parse("to|"),
            ClientCommand::DirectMessage {
                target: "",
                body: ""
            }
        );
    }

    #[test]
    fn test_parse_default_is_broadcast() {
        assert_eq!(ClientCommand::parse(""), ClientCommand::Broadcast { body: "" });
        assert_eq!(
            ClientCommand::parse("To|bob|hi"),
            ClientCommand::Broadcast { body: "To|bob|hi" }
        );
        assert_eq!(
            ClientCommand::parse("hello world\n"),
            ClientCommand::Broadcast { body: "hello world" }
        );
    }

    #[test]
    fn test_notice_rendering() {
        let entry = ServerNotice::WhoEntry {
            addr: "127.0.0.1:5000".to_string(),
            name: "alice".to_string(),
        };
        assert_eq!(entry.to_string(), "(127.0.0.1:5000:alice),在线...");

        let direct = ServerNotice::Direct {
            from: "alice".to_string(),
            body: "hi".to_string(),
        };
        assert_eq!(String::from(direct), "alice:hi");
        assert_eq!(format_broadcast("1.2.3.4:9", "bob", "yo"), "[1.2.3.4:9]bob:yo");
    }

    #[test]
    fn test_error_to_notice() {
        let notice: ServerNotice = RelayError::NameTaken("bob".to_string()).into();
        assert_eq!(notice, ServerNotice::NameTaken);

        let notice: ServerNotice = RelayError::MalformedCommand(MalformedReason::EmptyBody).into();
        assert_eq!(notice, ServerNotice::EmptyBody);

        let notice: ServerNotice = RelayError::IdleTimeout.into();
        assert_eq!(notice.to_string(), "你已被强制退出");
    }

    #[test]
    fn test_fatal_errors_never_look_like_input_errors() {
        for err in [
            RelayError::SessionGone("a".to_string()),
            RelayError::ConnectionClosed,
            RelayError::ChannelSend,
            RelayError::Config("bad".to_string()),
        ] {
            let notice: ServerNotice = err.into();
            assert_eq!(notice, ServerNotice::InternalError);
            assert_ne!(notice.to_string(), ServerNotice::BadDirectFormat.to_string());
        }
    }
}
