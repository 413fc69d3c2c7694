use serde::Deserialize;

/// Off-chain description of a voting round, referenced by content hash from
/// the round's global state.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoundMetadata {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub information_url: Option<String>,
    #[serde(default)]
    pub questions: Vec<Question>,
    /// Content hash of the eligibility [`crate::Snapshot`].
    #[serde(default)]
    pub vote_gating_snapshot_cid: Option<String>,
}

/// A question put to voters. Its position in [`RoundMetadata::questions`] is
/// the index the contract uses.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Question {
    #[serde(default)]
    pub id: Option<String>,
    pub prompt: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl RoundMetadata {
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    /// Description shown next to the round when offering it to a voter.
    pub fn summary(&self) -> Option<String> {
        match (&self.description, &self.information_url) {
            (Some(description), Some(url)) => Some(format!(
                "{}\nSee {} for more information.",
                description, url
            )),
            (None, Some(url)) => Some(format!("See {} for more information.", url)),
            (description, None) => description.clone(),
        }
    }
}
