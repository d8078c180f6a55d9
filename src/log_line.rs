use chrono::NaiveTime;

/// Severity keyword of a server log line.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Level {
    Trace,
    Debug,
    Info,
    Error,
    Fatal,
}

impl Level {
    fn parse(text: &str) -> Option<Self> {
        let level = match text.to_ascii_lowercase().as_str() {
            "trace" => Level::Trace,
            "debug" => Level::Debug,
            "info" => Level::Info,
            "error" => Level::Error,
            "fatal" => Level::Fatal,
            _ => return None,
        };
        Some(level)
    }
}

/// A structured view of one server log line carrying a player chat message:
///
/// ```text
/// [12:34:56] [Server thread/INFO]: <Alice> !shutdown
/// ```
///
/// Lines that do not follow this exact shape (startup noise, worker-thread
/// output, join/leave notices) are not commands and parse to `None`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct LogLine {
    pub time: NaiveTime,
    pub level: Level,
    pub player: String,
    pub command: String,
}

impl LogLine {
    pub fn parse(input: &str) -> Option<LogLine> {
        let rest = input.strip_prefix('[')?;
        let (time_text, rest) = rest.split_once(']')?;
        let time = parse_time_of_day(time_text)?;

        let rest = rest.strip_prefix(" [Server thread/")?;
        let (level_text, rest) = rest.split_once("]: ")?;
        let level = Level::parse(level_text)?;

        let rest = rest.strip_prefix('<')?;
        let (player, command) = rest.split_once("> ")?;
        if player.is_empty() || command.is_empty() {
            return None;
        }

        Some(LogLine {
            time,
            level,
            player: player.to_owned(),
            command: command.to_owned(),
        })
    }
}

fn parse_time_of_day(text: &str) -> Option<NaiveTime> {
    let mut fields = text.splitn(3, ':');
    let hour = parse_decimal_field(fields.next()?)?;
    let minute = parse_decimal_field(fields.next()?)?;
    let second = parse_decimal_field(fields.next()?)?;
    NaiveTime::from_hms_opt(hour, minute, second)
}

fn parse_decimal_field(text: &str) -> Option<u32> {
    // `u32::from_str` also accepts a leading `+`, which the log format
    // never produces.
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;

    use super::{Level, LogLine};

    fn time(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn test_parse_chat_line() {
        let line = LogLine::parse("[12:00:00] [Server thread/INFO]: <Alice> !shutdown").unwrap();
        assert_eq!(
            line,
            LogLine {
                time: time(12, 0, 0),
                level: Level::Info,
                player: "Alice".to_owned(),
                command: "!shutdown".to_owned(),
            }
        );
    }

    #[test]
    fn test_command_text_is_kept_verbatim() {
        let line = LogLine::parse("[8:5:3] [Server thread/ERROR]: <Bob_2> tp  Alice  ").unwrap();
        assert_eq!(line.time, time(8, 5, 3));
        assert_eq!(line.level, Level::Error);
        assert_eq!(line.player, "Bob_2");
        assert_eq!(line.command, "tp  Alice  ");
    }

    #[test]
    fn test_level_keyword_is_case_insensitive() {
        for text in ["INFO", "info", "InFo"] {
            let input = format!("[1:2:3] [Server thread/{text}]: <A> hi");
            assert_eq!(LogLine::parse(&input).unwrap().level, Level::Info);
        }
    }

    #[test]
    fn test_all_level_keywords() {
        let cases = [
            ("TRACE", Level::Trace),
            ("DEBUG", Level::Debug),
            ("INFO", Level::Info),
            ("ERROR", Level::Error),
            ("FATAL", Level::Fatal),
        ];
        for (text, level) in cases {
            let input = format!("[0:0:0] [Server thread/{text}]: <A> hi");
            assert_eq!(LogLine::parse(&input).unwrap().level, level);
        }
    }

    #[test]
    fn test_rejects_non_chat_lines() {
        let inputs = [
            "",
            "Starting minecraft server version 1.21",
            "[12:00:00] [Server thread/INFO]: Done (3.14s)! For help, type \"help\"",
            "[12:00:00] [Worker-Main-1/INFO]: <Alice> !shutdown",
            "[12:00:00][Server thread/INFO]: <Alice> !shutdown",
        ];
        for input in inputs {
            assert_eq!(LogLine::parse(input), None, "accepted: {input:?}");
        }
    }

    #[test]
    fn test_rejects_bad_time_tokens() {
        let inputs = [
            "[25:00:00] [Server thread/INFO]: <Alice> hi",
            "[12:61:00] [Server thread/INFO]: <Alice> hi",
            "[12:00:61] [Server thread/INFO]: <Alice> hi",
            "[12:00] [Server thread/INFO]: <Alice> hi",
            "[12:00:00:00] [Server thread/INFO]: <Alice> hi",
            "[+1:00:00] [Server thread/INFO]: <Alice> hi",
            "[aa:bb:cc] [Server thread/INFO]: <Alice> hi",
        ];
        for input in inputs {
            assert_eq!(LogLine::parse(input), None, "accepted: {input:?}");
        }
    }

    #[test]
    fn test_rejects_unknown_level_keyword() {
        assert_eq!(
            LogLine::parse("[12:00:00] [Server thread/WARN]: <Alice> hi"),
            None
        );
    }

    #[test]
    fn test_rejects_empty_player_or_command() {
        let inputs = [
            "[12:00:00] [Server thread/INFO]: <> hi",
            "[12:00:00] [Server thread/INFO]: <Alice> ",
            "[12:00:00] [Server thread/INFO]: <Alice>",
            "[12:00:00] [Server thread/INFO]: Alice says hi",
        ];
        for input in inputs {
            assert_eq!(LogLine::parse(input), None, "accepted: {input:?}");
        }
    }
}
