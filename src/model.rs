//! Render-ready view model. Presentation code only ever sees clones of it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::backend::{IdentityRecord, PersonalRecord, ProfileRecord};
use crate::id::{self, CanonicalId};
use crate::Result;

pub const EMPTY_PROFILE_MESSAGE: &str =
    "This user hasn't created a co-founder profile yet.";
pub const REQUEST_SENT_MESSAGE: &str = "Connection request sent!";
const FALLBACK_DISPLAY_NAME: &str = "User";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Identity {
    pub canonical_id: CanonicalId,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub external_profile_url: Option<String>,
}

impl Identity {
    /// Build an identity from an account record, letting the personal section
    /// of an authored profile override the account's display fields.
    pub fn from_record(
        record: &IdentityRecord,
        personal: Option<&PersonalRecord>,
    ) -> Result<Self> {
        let canonical_id = id::normalize(record)?;
        let personal = personal.cloned().unwrap_or_default();

        let display_name = non_blank(personal.name)
            .or_else(|| non_blank(record.github_username.clone()))
            .unwrap_or_else(|| FALLBACK_DISPLAY_NAME.to_owned());

        Ok(Self {
            canonical_id,
            display_name,
            avatar_url: non_blank(personal.avatar_url)
                .or_else(|| non_blank(record.github_avatar_url.clone())),
            external_profile_url: non_blank(personal.html_url)
                .or_else(|| non_blank(record.github_profile_url.clone())),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ProjectInsight {
    pub name: String,
    pub highlight: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ProfileContent {
    pub headline: Option<String>,
    pub summary: Option<String>,
    pub strengths: Vec<String>,
    pub roles: Vec<String>,
    /// Language name to share of code, in percent.
    pub language_stats: BTreeMap<String, f64>,
    pub project_insights: Vec<ProjectInsight>,
    pub technologies: Vec<String>,
    pub architectural_concepts: Vec<String>,
    pub experience_level: Option<String>,
}

impl From<&ProfileRecord> for ProfileContent {
    fn from(record: &ProfileRecord) -> Self {
        let technical = record.technical.clone().unwrap_or_default();
        Self {
            headline: non_blank(technical.headline),
            summary: non_blank(technical.co_founder_summary),
            strengths: technical.key_strengths,
            roles: technical.potential_roles,
            language_stats: technical.language_stats,
            project_insights: technical
                .project_insights
                .into_iter()
                .map(|p| ProjectInsight {
                    name: p.name,
                    highlight: p.highlight,
                })
                .collect(),
            technologies: technical.identified_technologies,
            architectural_concepts: technical.architectural_concepts,
            experience_level: non_blank(technical.estimated_experience),
        }
    }
}

/// Viewer's relationship to the subject.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// Not looked up yet, or the lookup failed. Never an error.
    #[default]
    Unknown,
    None,
    Pending,
    Accepted,
}

impl ConnectionState {
    /// Interpret the status string of the connection service. A missing
    /// status means there is no connection.
    pub fn from_status(status: Option<&str>) -> Option<Self> {
        match status.map(str::trim) {
            None | Some("") => Some(Self::None),
            Some(s) if s.eq_ignore_ascii_case("none") => Some(Self::None),
            Some(s) if s.eq_ignore_ascii_case("pending") => Some(Self::Pending),
            Some(s) if s.eq_ignore_ascii_case("accepted") => {
                Some(Self::Accepted)
            }
            Some(_) => None,
        }
    }

    /// No viewer-initiated transition leaves these states on this page.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Pending | Self::Accepted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Info,
    Error,
}

/// Short-lived, dismissible message about the connection action.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn info<S: Into<String>>(message: S) -> Self {
        Self {
            kind: NoticeKind::Info,
            message: message.into(),
        }
    }

    pub fn error<S: Into<String>>(message: S) -> Self {
        Self {
            kind: NoticeKind::Error,
            message: message.into(),
        }
    }
}

/// What the header should offer for the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectAction {
    Hidden,
    Available,
    Sending,
    RequestSent,
    Connected,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ViewModel {
    pub subject: Option<Identity>,
    pub viewer: Option<Identity>,
    pub content: Option<ProfileContent>,
    pub connection_state: ConnectionState,
    pub is_own_profile: bool,
    /// Set when the subject has no authored profile.
    pub empty_state: Option<String>,
    /// Fatal failure; no identity can be rendered.
    pub page_error: Option<String>,
    pub notice: Option<Notice>,
    pub sending_request: bool,
    /// Status reported by the connection service while a request was in
    /// flight; the request settles against it instead of the state it
    /// started from.
    pub confirmed_state: Option<ConnectionState>,
    pub loading: bool,
}

impl ViewModel {
    pub fn loading() -> Self {
        Self {
            loading: true,
            ..Default::default()
        }
    }

    pub fn fatal<S: Into<String>>(message: S) -> Self {
        Self {
            page_error: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn is_ready(&self) -> bool {
        !self.loading
            && self.page_error.is_none()
            && self.subject.is_some()
            && self.viewer.is_some()
    }

    /// Whether `request_connection` would start a transition right now.
    pub fn can_request_connection(&self) -> bool {
        self.is_ready()
            && !self.is_own_profile
            && !self.sending_request
            && !self.connection_state.is_terminal()
    }

    pub fn connect_action(&self) -> ConnectAction {
        if !self.is_ready() || self.is_own_profile {
            return ConnectAction::Hidden;
        }
        if self.sending_request {
            return ConnectAction::Sending;
        }
        match self.connection_state {
            ConnectionState::Pending => ConnectAction::RequestSent,
            ConnectionState::Accepted => ConnectAction::Connected,
            ConnectionState::None | ConnectionState::Unknown => {
                ConnectAction::Available
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TechnicalRecord;
    use rstest::rstest;
    use serde_json::json;

    fn account(id: u64, username: &str) -> IdentityRecord {
        IdentityRecord {
            user_id: Some(json!(id)),
            github_username: Some(username.to_owned()),
            github_avatar_url: Some(format!("https://avatars/{}", username)),
            github_profile_url: Some(format!("https://github.com/{}", username)),
            ..Default::default()
        }
    }

    fn ready(state: ConnectionState, own: bool) -> ViewModel {
        let identity =
            Identity::from_record(&account(1, "octo"), None).unwrap();
        ViewModel {
            subject: Some(identity.clone()),
            viewer: Some(identity),
            connection_state: state,
            is_own_profile: own,
            ..Default::default()
        }
    }

    #[test]
    fn personal_section_overrides_account_fields() {
        let personal = PersonalRecord {
            name: Some("Octo Cat".to_owned()),
            avatar_url: None,
            html_url: Some("https://octo.dev".to_owned()),
        };
        let identity =
            Identity::from_record(&account(5, "octo"), Some(&personal))
                .unwrap();
        assert_eq!(identity.canonical_id, "5");
        assert_eq!(identity.display_name, "Octo Cat");
        assert_eq!(identity.avatar_url.as_deref(), Some("https://avatars/octo"));
        assert_eq!(
            identity.external_profile_url.as_deref(),
            Some("https://octo.dev")
        );
    }

    #[test]
    fn display_name_falls_back_to_placeholder() {
        let record = IdentityRecord {
            id: Some(json!("u-1")),
            github_username: Some(" ".to_owned()),
            ..Default::default()
        };
        let identity = Identity::from_record(&record, None).unwrap();
        assert_eq!(identity.display_name, "User");
    }

    #[test]
    fn content_maps_technical_section() {
        let record = ProfileRecord {
            personal: None,
            technical: Some(TechnicalRecord {
                co_founder_summary: Some("Ships".to_owned()),
                key_strengths: vec!["Systems".to_owned()],
                identified_technologies: vec!["tokio".to_owned()],
                estimated_experience: Some("  ".to_owned()),
                ..Default::default()
            }),
        };
        let content = ProfileContent::from(&record);
        assert_eq!(content.summary.as_deref(), Some("Ships"));
        assert_eq!(content.strengths, vec!["Systems"]);
        assert_eq!(content.technologies, vec!["tokio"]);
        assert!(content.experience_level.is_none());
    }

    #[rstest]
    #[case(None, Some(ConnectionState::None))]
    #[case(Some("none"), Some(ConnectionState::None))]
    #[case(Some("Pending"), Some(ConnectionState::Pending))]
    #[case(Some("accepted"), Some(ConnectionState::Accepted))]
    #[case(Some("blocked"), None)]
    fn parses_status_strings(
        #[case] status: Option<&str>,
        #[case] expected: Option<ConnectionState>,
    ) {
        assert_eq!(ConnectionState::from_status(status), expected);
    }

    #[rstest]
    #[case(ConnectionState::Unknown, false, ConnectAction::Available)]
    #[case(ConnectionState::None, false, ConnectAction::Available)]
    #[case(ConnectionState::Pending, false, ConnectAction::RequestSent)]
    #[case(ConnectionState::Accepted, false, ConnectAction::Connected)]
    #[case(ConnectionState::Unknown, true, ConnectAction::Hidden)]
    fn connect_action_follows_state(
        #[case] state: ConnectionState,
        #[case] own: bool,
        #[case] expected: ConnectAction,
    ) {
        assert_eq!(ready(state, own).connect_action(), expected);
    }

    #[test]
    fn fatal_and_loading_views_offer_nothing() {
        assert_eq!(ViewModel::loading().connect_action(), ConnectAction::Hidden);
        let fatal = ViewModel::fatal("boom");
        assert!(!fatal.can_request_connection());
        assert_eq!(fatal.connection_state, ConnectionState::Unknown);
    }
}
