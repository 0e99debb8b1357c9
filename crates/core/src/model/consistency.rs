use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reviewer's verdict on whether a question's content is consistent.
///
/// Shared by all users and kept one record per question, outside the
/// per-user aggregate. Fields are free text exactly as the client sent them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsistencyStatus {
    pub kind: String,
    pub qid: String,
    pub status_mark: String,
    pub status_label: String,
    pub classification_code: String,
    pub classification_detail: String,
    pub saved_at: String,
}

impl ConsistencyStatus {
    pub const KEY_PREFIX: &'static str = "consistency_status:";

    /// Read one submitted item: `{kind, qid, status: {status_mark, ...}}`.
    ///
    /// Missing or non-text fields become empty strings, numbers and booleans
    /// keep their JSON text.
    #[must_use]
    pub fn from_submission(item: &Value) -> Self {
        let status = &item["status"];
        Self {
            kind: text(&item["kind"]),
            qid: text(&item["qid"]).trim().to_owned(),
            status_mark: text(&status["status_mark"]),
            status_label: text(&status["status_label"]),
            classification_code: text(&status["classification_code"]),
            classification_detail: text(&status["classification_detail"]),
            saved_at: text(&status["saved_at"]),
        }
    }

    /// Items of a submission body, which is one item or an array of them.
    #[must_use]
    pub fn from_body(body: &Value) -> Vec<Self> {
        match body {
            Value::Array(items) => items.iter().map(Self::from_submission).collect(),
            item => vec![Self::from_submission(item)],
        }
    }

    /// Storage key of the record for `qid`.
    #[must_use]
    pub fn storage_key(qid: &str) -> String {
        format!("{}{qid}", Self::KEY_PREFIX)
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_nested_status_fields() {
        let status = ConsistencyStatus::from_submission(&json!({
            "kind": "consistency_status",
            "qid": " 2025年9月26日-010 ",
            "status": {
                "status_mark": "◎",
                "status_label": "変更必要なし",
                "classification_code": "S",
                "saved_at": "2025-11-20T09:26:43.413Z"
            }
        }));
        assert_eq!(status.qid, "2025年9月26日-010");
        assert_eq!(status.status_mark, "◎");
        assert_eq!(status.classification_code, "S");
        assert_eq!(status.classification_detail, "");
        assert_eq!(
            ConsistencyStatus::storage_key(&status.qid),
            "consistency_status:2025年9月26日-010"
        );
    }

    #[test]
    fn accepts_one_item_or_many() {
        assert_eq!(ConsistencyStatus::from_body(&json!({"qid": "a"})).len(), 1);
        let many = ConsistencyStatus::from_body(&json!([{"qid": "a"}, {"qid": 7}, "junk"]));
        assert_eq!(many.len(), 3);
        assert_eq!(many[1].qid, "7");
        assert_eq!(many[2], ConsistencyStatus::default());
    }
}
