//! Prefixed chat commands

/// Per-chat feature switches stored as `<chat>.<key>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    /// Subject-code file search
    FileSharing,
    /// Link moderation
    AntiLink,
    /// Duplicate-message kicks
    AntiSpam,
    /// AI answers every group message
    HandleGroup,
}

impl Feature {
    /// Settings-store key suffix
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::FileSharing => "filesharing",
            Self::AntiLink => "antilink",
            Self::AntiSpam => "antispam",
            Self::HandleGroup => "auto_handle_group",
        }
    }

    /// Command name that toggles the feature
    #[must_use]
    pub const fn command(self) -> &'static str {
        match self {
            Self::FileSharing => "filesharing",
            Self::AntiLink => "antilink",
            Self::AntiSpam => "antispam",
            Self::HandleGroup => "handlegroup",
        }
    }

    /// Title shown in status replies
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::FileSharing => "📁 *File Sharing & Search*",
            Self::AntiLink => "🛡️ *Anti-Link System*",
            Self::AntiSpam => "🔥 *Anti-Spam System*",
            Self::HandleGroup => "🤖 *Group Handling Mode*",
        }
    }
}

/// `ai` sub-commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AiCommand {
    /// Enable AI answers in the chat
    On,
    /// Disable AI answers in the chat
    Off,
    /// Ask a question
    Ask(String),
    /// No arguments
    Usage,
}

/// Target of `resetwarn`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarnReset {
    /// Every member of the chat
    All,
    /// One member JID
    Member(String),
}

/// Supported commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Command list
    Help,
    /// Liveness check
    Ping,
    /// Local file listing
    Files,
    /// Local and Drive file counts (admins)
    AllFiles,
    /// Pause the chat's delivery
    Stop,
    /// Resume the chat's delivery for a subject code
    Resume(Option<String>),
    /// Raise the batch limit
    More,
    /// Usage statistics (admins)
    Stats,
    /// Show or set a feature switch; `None` shows the current state
    Toggle(Feature, Option<bool>),
    /// Set the chat's warning limit
    SetWarnLimit(Option<u32>),
    /// Lock a member by phone number
    Lock(Option<String>),
    /// Unlock a member by phone number
    Unlock(Option<String>),
    /// Warning count of one member
    ShowWarn(Option<String>),
    /// Every warned member of the chat
    WarnList,
    /// Clear warnings
    ResetWarn(Option<WarnReset>),
    /// Remove a member by phone number
    Kick(Option<String>),
    /// AI question or switch
    Ai(AiCommand),
}

impl Command {
    /// Parse a lower-cased command name and its arguments; `None` for
    /// unknown names
    #[must_use]
    pub fn parse(name: &str, args: &[&str]) -> Option<Self> {
        let first = args.first().map(|a| a.to_lowercase());
        let switch = match first.as_deref() {
            Some("on") => Some(true),
            Some("off") => Some(false),
            _ => None,
        };
        let target = args.first().and_then(|a| phone_jid(a));

        let command = match name {
            "help" | "menu" => Self::Help,
            "ping" => Self::Ping,
            "files" => Self::Files,
            "allfiles" => Self::AllFiles,
            "stop" => Self::Stop,
            "resume" => Self::Resume(args.first().map(|a| a.to_uppercase())),
            "more" => Self::More,
            "stats" => Self::Stats,
            "filesharing" => Self::Toggle(Feature::FileSharing, switch),
            "antilink" => Self::Toggle(Feature::AntiLink, switch),
            "antispam" => Self::Toggle(Feature::AntiSpam, switch),
            "handlegroup" => Self::Toggle(Feature::HandleGroup, switch),
            "setwarnlimit" => Self::SetWarnLimit(args.first().and_then(|a| a.parse().ok())),
            "lock" => Self::Lock(target),
            "unlock" => Self::Unlock(target),
            "showwarn" | "warnshow" => Self::ShowWarn(target),
            "warnlist" => Self::WarnList,
            "resetwarn" => Self::ResetWarn(if first.as_deref() == Some("all") {
                Some(WarnReset::All)
            } else {
                target.map(WarnReset::Member)
            }),
            "kick" => Self::Kick(target),
            "ai" => Self::Ai(match (first.as_deref(), args.len()) {
                (None, _) => AiCommand::Usage,
                (Some("on"), 1) => AiCommand::On,
                (Some("off"), 1) => AiCommand::Off,
                _ => AiCommand::Ask(args.join(" ")),
            }),
            _ => return None,
        };
        Some(command)
    }

    /// Returns true if only group admins and owners may run the command
    #[must_use]
    pub const fn requires_admin(&self) -> bool {
        matches!(
            self,
            Self::AllFiles
                | Self::Stats
                | Self::Toggle(_, Some(_))
                | Self::SetWarnLimit(_)
                | Self::Lock(_)
                | Self::Unlock(_)
                | Self::ShowWarn(_)
                | Self::WarnList
                | Self::ResetWarn(_)
                | Self::Kick(_)
                | Self::Ai(AiCommand::On | AiCommand::Off)
        )
    }

    /// Returns true if the command only makes sense in groups
    #[must_use]
    pub const fn group_only(&self) -> bool {
        matches!(
            self,
            Self::Toggle(..)
                | Self::SetWarnLimit(_)
                | Self::Lock(_)
                | Self::Unlock(_)
                | Self::ShowWarn(_)
                | Self::WarnList
                | Self::ResetWarn(_)
                | Self::Kick(_)
        )
    }
}

/// `@s.whatsapp.net` JID from a phone number or mention such as `@92300...`
fn phone_jid(arg: &str) -> Option<String> {
    let digits: String = arg.chars().filter(char::is_ascii_digit).collect();
    (digits.len() >= 7).then(|| format!("{digits}@s.whatsapp.net"))
}

/// Command list for the `help` reply
#[must_use]
pub fn help_text(bot_name: &str, prefix: &str, is_admin: bool) -> String {
    let mut menu = format!("🤖 *{bot_name}*\n\n👋 *Hello!* Here are the available commands:\n\n");

    menu.push_str("📚 *Files*\n");
    menu.push_str("• Type a subject code (e.g. `CS101 handouts`) to get files\n");
    menu.push_str("• `send all CS101 files` sends everything\n");
    menu.push_str(&format!("• {prefix}files\n  └ List available files\n"));
    menu.push_str(&format!("• {prefix}more\n  └ Send the next files\n"));
    menu.push_str(&format!("• {prefix}stop\n  └ Pause file sending\n"));
    menu.push_str(&format!("• {prefix}resume <code>\n  └ Continue file sending\n\n"));

    menu.push_str("💬 *General*\n");
    menu.push_str(&format!("• {prefix}ai <question>\n  └ Ask the AI assistant\n"));
    menu.push_str(&format!("• {prefix}ping\n  └ Check the bot is alive\n"));

    if is_admin {
        menu.push_str("\n⚡ *Admin*\n");
        menu.push_str(&format!("• {prefix}allfiles\n  └ File counts per source\n"));
        menu.push_str(&format!("• {prefix}stats\n  └ Bot statistics\n"));
        for feature in [
            Feature::FileSharing,
            Feature::AntiLink,
            Feature::AntiSpam,
            Feature::HandleGroup,
        ] {
            menu.push_str(&format!("• {prefix}{} on/off\n", feature.command()));
        }
        menu.push_str(&format!("• {prefix}setwarnlimit <1-10>\n"));
        menu.push_str(&format!("• {prefix}showwarn <number> / {prefix}warnlist\n"));
        menu.push_str(&format!("• {prefix}resetwarn <number|all>\n"));
        menu.push_str(&format!("• {prefix}kick <number>\n"));
        menu.push_str(&format!("• {prefix}lock <number> / {prefix}unlock <number>\n"));
        menu.push_str(&format!("• {prefix}ai on/off\n"));
    }
    menu
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("ping", &[]), Some(Command::Ping));
        assert_eq!(
            Command::parse("resume", &["cs101"]),
            Some(Command::Resume(Some("CS101".into())))
        );
        assert_eq!(Command::parse("resume", &[]), Some(Command::Resume(None)));
        assert_eq!(
            Command::parse("antilink", &["OFF"]),
            Some(Command::Toggle(Feature::AntiLink, Some(false)))
        );
        assert_eq!(
            Command::parse("filesharing", &[]),
            Some(Command::Toggle(Feature::FileSharing, None))
        );
        assert_eq!(Command::parse("unknown", &[]), None);
    }

    #[test]
    fn test_parse_ai() {
        assert_eq!(Command::parse("ai", &[]), Some(Command::Ai(AiCommand::Usage)));
        assert_eq!(Command::parse("ai", &["on"]), Some(Command::Ai(AiCommand::On)));
        assert_eq!(
            Command::parse("ai", &["on", "what", "grounds?"]),
            Some(Command::Ai(AiCommand::Ask("on what grounds?".into())))
        );
    }

    #[test]
    fn test_lock_target() {
        assert_eq!(
            Command::parse("lock", &["@923001234567"]),
            Some(Command::Lock(Some("923001234567@s.whatsapp.net".into())))
        );
        assert_eq!(Command::parse("lock", &["abc"]), Some(Command::Lock(None)));
    }

    #[test]
    fn test_warning_commands() {
        assert_eq!(
            Command::parse("resetwarn", &["ALL"]),
            Some(Command::ResetWarn(Some(WarnReset::All)))
        );
        assert_eq!(
            Command::parse("resetwarn", &["@923001234567"]),
            Some(Command::ResetWarn(Some(WarnReset::Member(
                "923001234567@s.whatsapp.net".into()
            ))))
        );
        assert_eq!(Command::parse("resetwarn", &[]), Some(Command::ResetWarn(None)));
        assert_eq!(Command::parse("warnshow", &[]), Some(Command::ShowWarn(None)));
        assert_eq!(
            Command::parse("setwarnlimit", &["42"]),
            Some(Command::SetWarnLimit(Some(42)))
        );
        assert_eq!(
            Command::parse("setwarnlimit", &["-1"]),
            Some(Command::SetWarnLimit(None))
        );
        assert!(Command::WarnList.requires_admin() && Command::WarnList.group_only());
        assert!(Command::Kick(None).requires_admin());
    }

    #[test]
    fn test_permissions() {
        assert!(Command::Stats.requires_admin());
        assert!(Command::Toggle(Feature::AntiLink, Some(true)).requires_admin());
        assert!(!Command::Toggle(Feature::AntiLink, None).requires_admin());
        assert!(!Command::More.requires_admin());
        assert!(Command::SetWarnLimit(Some(3)).group_only());
    }

    #[test]
    fn test_help_text() {
        let text = help_text("StudyShare Bot", "!", false);
        assert!(text.contains("!resume <code>"));
        assert!(!text.contains("!stats"));
        assert!(help_text("StudyShare Bot", "!", true).contains("!antilink on/off"));
    }
}
