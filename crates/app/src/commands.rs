//! Inbound commands — topic classification and payload parsing.

use serde::Deserialize;

use geohub_domain::area::GeofenceArea;
use geohub_domain::error::ValidationError;
use geohub_domain::id::{AreaId, EntityId, RuleId};
use geohub_domain::location::LocationUpdate;
use geohub_domain::rule::GeofenceRule;
use geohub_domain::time::Timestamp;

/// Every channel the engine talks on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    RuleCreate,
    RuleUpdate,
    RuleDelete,
    AreaCreate,
    AreaUpdate,
    AreaDelete,
    RequestData,
    LocationUpdate,
    LocationRequest,
    /// Published: full area/rule snapshot.
    Data,
    /// Published: a rule fired.
    Event,
    /// Published: answer to a location request.
    Location,
}

impl Channel {
    /// Channels the engine subscribes to.
    pub const INBOUND: [Channel; 9] = [
        Channel::RuleCreate,
        Channel::RuleUpdate,
        Channel::RuleDelete,
        Channel::AreaCreate,
        Channel::AreaUpdate,
        Channel::AreaDelete,
        Channel::RequestData,
        Channel::LocationUpdate,
        Channel::LocationRequest,
    ];

    /// Topic path without prefix.
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::RuleCreate => "geofence/create",
            Self::RuleUpdate => "geofence/update",
            Self::RuleDelete => "geofence/delete",
            Self::AreaCreate => "geofence/area/create",
            Self::AreaUpdate => "geofence/area/update",
            Self::AreaDelete => "geofence/area/delete",
            Self::RequestData => "geofence/request_data",
            Self::LocationUpdate => "geofence/location/update",
            Self::LocationRequest => "geofence/location/request",
            Self::Data => "geofence/data",
            Self::Event => "geofence/event",
            Self::Location => "geofence/location",
        }
    }
}

/// Topic names, optionally under a common prefix.
#[derive(Debug, Clone, Default)]
pub struct Topics {
    prefix: String,
}

impl Topics {
    /// Build topics under `prefix` (`""` for none, `"home"` gives `home/geofence/...`).
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        while prefix.ends_with('/') {
            prefix.pop();
        }
        Self { prefix }
    }

    /// Full topic for a channel.
    #[must_use]
    pub fn topic(&self, channel: Channel) -> String {
        if self.prefix.is_empty() {
            channel.path().to_string()
        } else {
            format!("{}/{}", self.prefix, channel.path())
        }
    }

    /// Full topics of every inbound channel.
    #[must_use]
    pub fn inbound(&self) -> Vec<String> {
        Channel::INBOUND.iter().map(|c| self.topic(*c)).collect()
    }

    /// Map a received topic back to its inbound channel.
    #[must_use]
    pub fn classify(&self, topic: &str) -> Option<Channel> {
        let path = if self.prefix.is_empty() {
            topic
        } else {
            topic
                .strip_prefix(self.prefix.as_str())?
                .strip_prefix('/')?
        };
        Channel::INBOUND
            .into_iter()
            .find(|channel| channel.path() == path)
    }
}

/// A parsed inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateRule(GeofenceRule),
    UpdateRule(GeofenceRule),
    DeleteRule(RuleId),
    CreateArea(GeofenceArea),
    UpdateArea(GeofenceArea),
    DeleteArea(AreaId),
    RequestData,
    Location(LocationUpdate),
    LocationRequest(EntityId),
}

/// Why an inbound message was dropped.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("unknown topic {0}")]
    UnknownTopic(String),

    #[error("invalid JSON payload")]
    InvalidJson(#[from] serde_json::Error),

    #[error("invalid payload")]
    Invalid(#[from] ValidationError),
}

#[derive(Deserialize)]
struct IdPayload {
    id: String,
}

#[derive(Deserialize)]
struct UserPayload {
    #[serde(alias = "entity_id")]
    user_id: String,
}

impl Command {
    /// Parse the payload received on `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] when the channel is not inbound, the payload
    /// is not valid JSON for that channel, or a required field is missing.
    pub fn parse(
        channel: Channel,
        payload: &[u8],
        received_at: Timestamp,
    ) -> Result<Self, CommandError> {
        let command = match channel {
            Channel::RuleCreate => Self::CreateRule(serde_json::from_slice(payload)?),
            Channel::RuleUpdate => Self::UpdateRule(parse_with_id(payload)?),
            Channel::RuleDelete => Self::DeleteRule(RuleId::from(parse_id(payload)?)),
            Channel::AreaCreate => Self::CreateArea(serde_json::from_slice(payload)?),
            Channel::AreaUpdate => Self::UpdateArea(parse_with_id(payload)?),
            Channel::AreaDelete => Self::DeleteArea(AreaId::from(parse_id(payload)?)),
            Channel::RequestData => Self::RequestData,
            Channel::LocationUpdate => {
                let value: serde_json::Value = serde_json::from_slice(payload)?;
                Self::Location(LocationUpdate::from_json(&value, received_at)?)
            }
            Channel::LocationRequest => {
                let user: UserPayload = serde_json::from_slice(payload)?;
                if user.user_id.is_empty() {
                    return Err(ValidationError::MissingField("user_id").into());
                }
                Self::LocationRequest(EntityId::from(user.user_id))
            }
            Channel::Data | Channel::Event | Channel::Location => {
                return Err(CommandError::UnknownTopic(channel.path().to_string()));
            }
        };
        Ok(command)
    }
}

fn parse_id(payload: &[u8]) -> Result<String, CommandError> {
    let IdPayload { id } = serde_json::from_slice(payload)?;
    if id.is_empty() {
        return Err(ValidationError::EmptyId.into());
    }
    Ok(id)
}

/// Updates must name the object they replace; a generated id would never match.
fn parse_with_id<T: serde::de::DeserializeOwned>(payload: &[u8]) -> Result<T, CommandError> {
    let value: serde_json::Value = serde_json::from_slice(payload)?;
    match value.get("id").and_then(serde_json::Value::as_str) {
        Some(id) if !id.is_empty() => Ok(serde_json::from_value(value)?),
        _ => Err(ValidationError::MissingField("id").into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geohub_domain::time;

    #[test]
    fn should_build_topics_without_prefix() {
        let topics = Topics::default();
        assert_eq!(topics.topic(Channel::RuleCreate), "geofence/create");
        assert_eq!(topics.topic(Channel::Data), "geofence/data");
        assert_eq!(topics.inbound().len(), 9);
    }

    #[test]
    fn should_build_and_classify_prefixed_topics() {
        let topics = Topics::new("home/");
        assert_eq!(
            topics.topic(Channel::LocationUpdate),
            "home/geofence/location/update"
        );
        assert_eq!(
            topics.classify("home/geofence/location/update"),
            Some(Channel::LocationUpdate)
        );
        assert_eq!(topics.classify("geofence/location/update"), None);
        assert_eq!(topics.classify("home/geofence/data"), None);
    }

    #[test]
    fn should_parse_rule_create() {
        let payload = br#"{"id":"r1","name":"Garage","area_id":"home","trigger_type":"enter",
            "actions":[{"device_name":"garage","action_type":"on"}]}"#;
        let command = Command::parse(Channel::RuleCreate, payload, time::now()).unwrap();
        match command {
            Command::CreateRule(rule) => {
                assert_eq!(rule.id.as_str(), "r1");
                assert_eq!(rule.actions.len(), 1);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn should_reject_update_without_id() {
        let payload = br#"{"name":"Garage","area_id":"home","trigger_type":"enter"}"#;
        let err = Command::parse(Channel::RuleUpdate, payload, time::now()).unwrap_err();
        assert!(matches!(
            err,
            CommandError::Invalid(ValidationError::MissingField("id"))
        ));
    }

    #[test]
    fn should_parse_delete() {
        let command = Command::parse(Channel::AreaDelete, br#"{"id":"home"}"#, time::now()).unwrap();
        assert_eq!(command, Command::DeleteArea(AreaId::from("home")));
    }

    #[test]
    fn should_accept_any_payload_for_request_data() {
        let command = Command::parse(Channel::RequestData, b"", time::now()).unwrap();
        assert_eq!(command, Command::RequestData);
    }

    #[test]
    fn should_parse_location_update() {
        let now = time::now();
        let payload = br#"{"user_id":"alice","lat":0.001,"lng":0.001}"#;
        let command = Command::parse(Channel::LocationUpdate, payload, now).unwrap();
        match command {
            Command::Location(update) => {
                assert_eq!(update.entity_id.as_str(), "alice");
                assert_eq!(update.timestamp, now);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn should_reject_location_without_coordinates() {
        let err = Command::parse(
            Channel::LocationUpdate,
            br#"{"user_id":"alice","lat":1.0}"#,
            time::now(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CommandError::Invalid(ValidationError::MissingField("lng"))
        ));
    }

    #[test]
    fn should_reject_bad_json() {
        let err = Command::parse(Channel::RuleCreate, b"{not json", time::now()).unwrap_err();
        assert!(matches!(err, CommandError::InvalidJson(_)));
    }

    #[test]
    fn should_refuse_to_parse_outbound_channels() {
        let err = Command::parse(Channel::Data, b"{}", time::now()).unwrap_err();
        assert!(matches!(err, CommandError::UnknownTopic(_)));
    }
}
