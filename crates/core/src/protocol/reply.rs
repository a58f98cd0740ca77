use crate::domain::series::AdjustedRecord;

pub const MISSING_CODE: &str = "Please enter a stock code, for example: STOCK 300604.SZ";

pub const HELP: &str = "Welcome to the stock percentile assistant!\n\
Available commands:\n\
1. STOCK <code> - show the latest adjusted price and volume percentiles, e.g. STOCK 300604.SZ\n\
2. help - show this message";

pub const UNKNOWN: &str = "Send \"help\" to see the available commands.";

pub fn query_failed(security_id: &str) -> String {
    format!("Could not fetch data for {security_id}. Please check that the stock code is correct.")
}

pub fn unsupported_kind(kind: &str) -> String {
    format!("Messages of type \"{kind}\" are not supported yet. {UNKNOWN}")
}

pub fn malformed(reason: &str) -> String {
    format!("The message could not be understood ({reason}).")
}

/// Multi-line summary of the most recent record.
pub fn latest_summary(security_id: &str, record: &AdjustedRecord) -> String {
    format!(
        "{security_id} latest data:\n\
         Date: {date}\n\
         Adjusted close: {adj_close:.2}\n\
         Price percentile: {price}\n\
         Volume: {volume}\n\
         Volume percentile: {vol}",
        date = record.date,
        adj_close = record.adj_close,
        price = percent(record.price_percentile),
        volume = record.volume,
        vol = percent(record.volume_percentile),
    )
}

fn percent(rank: Option<f64>) -> String {
    match rank {
        Some(r) => format!("{:.2}%", r * 100.0),
        None => "not enough history".to_string(),
    }
}
