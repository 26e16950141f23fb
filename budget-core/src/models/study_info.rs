use serde::{Deserialize, Serialize};

/// Free-text identification of the study a budget belongs to.
///
/// None of these fields take part in calculation; they are carried through
/// unchanged so reports can label the numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StudyInfo {
    pub protocol_number: String,
    pub study_title: String,
    pub pi_name: String,
    pub study_date: String,
    pub sponsor: String,
    pub site_name: String,
}

impl StudyInfo {
    /// The JSON keys of every study field, in display order.
    pub const FIELD_KEYS: [&'static str; 6] = [
        "protocolNumber",
        "studyTitle",
        "piName",
        "studyDate",
        "sponsor",
        "siteName",
    ];

    /// Returns `true` once a protocol number has been entered.
    pub fn has_protocol_number(&self) -> bool {
        !self.protocol_number.trim().is_empty()
    }
}
