use crate::domain::message::Command;

pub const QUERY_KEYWORD: &str = "STOCK";
pub const HELP_KEYWORDS: [&str; 2] = ["help", "HELP"];

pub fn parse_command(text: &str) -> Command {
    let text = text.trim();
    if let Some(rest) = text.strip_prefix(QUERY_KEYWORD) {
        return Command::Query(rest.trim().to_string());
    }
    if HELP_KEYWORDS.contains(&text) {
        return Command::Help;
    }
    Command::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_with_and_without_separator() {
        assert_eq!(
            parse_command("  STOCK 300604.SZ \n"),
            Command::Query("300604.SZ".to_string())
        );
        assert_eq!(
            parse_command("STOCK002371.SZ"),
            Command::Query("002371.SZ".to_string())
        );
    }

    #[test]
    fn keyword_alone_is_empty_query() {
        assert_eq!(parse_command("STOCK   "), Command::Query(String::new()));
        assert_eq!(parse_command("STOCK"), Command::Query(String::new()));
    }

    #[test]
    fn help_spellings() {
        assert_eq!(parse_command("help"), Command::Help);
        assert_eq!(parse_command(" HELP "), Command::Help);
        assert_eq!(parse_command("Help me"), Command::Unknown);
    }

    #[test]
    fn everything_else_is_unknown() {
        assert_eq!(parse_command(""), Command::Unknown);
        assert_eq!(parse_command("stock 300604.SZ"), Command::Unknown);
        assert_eq!(parse_command("hello"), Command::Unknown);
    }
}
