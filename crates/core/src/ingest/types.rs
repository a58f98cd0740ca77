use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct TushareRequest<'a> {
    pub api_name: &'a str,
    pub token: &'a str,
    pub params: TushareParams<'a>,
    pub fields: &'a str,
}

#[derive(Debug, Serialize)]
pub struct TushareParams<'a> {
    pub ts_code: &'a str,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TushareResponse {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub data: Option<TushareTable>,
}

/// Column-oriented result table: `items` rows follow the order of `fields`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TushareTable {
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub items: Vec<Vec<Value>>,
}

impl TushareTable {
    pub fn column(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == name)
    }
}
