//! Resource demands
//!
//! A [`Demand`] states which resources (audio, video, data) a participant wants in each
//! direction. Applications may describe a demand in several loose shapes; every shape is
//! funnelled through [`Demand::normalize`], which always yields both directions with all three
//! resources populated.
//!
//! ```
//! use parley_types::demand::{Demand, DemandValue};
//!
//! let demand = Demand::normalize("audio");
//! assert!(demand.incoming.audio.is_requested());
//! assert_eq!(demand.outgoing.video, DemandValue::Flag(false));
//!
//! let everything = Demand::normalize("all");
//! assert_eq!(everything, Demand::all());
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{EnumString, IntoStaticStr};

/// Constraint block attached to a media resource (e.g. `{"width": 1280}`)
pub type Constraints = Map<String, Value>;

/// The value held for a single resource in a single direction
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DemandValue {
    Flag(bool),
    Constraints(Constraints),
    /// Only ever held by the `data` resource. Selects the codec used on the data channel
    PayloadType(String),
}

impl DemandValue {
    /// Whether this value asks for the resource. Constraint blocks always count as a request
    pub fn is_requested(&self) -> bool {
        match self {
            DemandValue::Flag(flag) => *flag,
            DemandValue::Constraints(_) => true,
            DemandValue::PayloadType(payload_type) => !payload_type.is_empty(),
        }
    }

    pub fn payload_type(&self) -> Option<&str> {
        match self {
            DemandValue::PayloadType(payload_type) => Some(payload_type.as_str()),
            _ => None,
        }
    }

    fn from_json(resource: Resource, value: &Value) -> Self {
        match value {
            Value::Bool(flag) => DemandValue::Flag(*flag),
            Value::Object(constraints) => DemandValue::Constraints(constraints.clone()),
            Value::String(payload_type) if resource == Resource::Data => {
                DemandValue::PayloadType(payload_type.clone())
            }
            Value::Number(number) if resource == Resource::Data => {
                DemandValue::PayloadType(number.to_string())
            }
            _ => DemandValue::Flag(false),
        }
    }
}

impl Default for DemandValue {
    fn default() -> Self {
        DemandValue::Flag(false)
    }
}

impl From<bool> for DemandValue {
    fn from(flag: bool) -> Self {
        DemandValue::Flag(flag)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Resource {
    Audio,
    Video,
    Data,
}

impl Resource {
    pub const ALL: [Resource; 3] = [Resource::Audio, Resource::Video, Resource::Data];

    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::In, Direction::Out];

    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// The three resources for one direction
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectionalDemand {
    #[serde(default)]
    pub audio: DemandValue,
    #[serde(default)]
    pub video: DemandValue,
    #[serde(default)]
    pub data: DemandValue,
}

impl DirectionalDemand {
    fn uniform(flag: bool) -> Self {
        Self {
            audio: flag.into(),
            video: flag.into(),
            data: flag.into(),
        }
    }

    pub fn get(&self, resource: Resource) -> &DemandValue {
        match resource {
            Resource::Audio => &self.audio,
            Resource::Video => &self.video,
            Resource::Data => &self.data,
        }
    }

    pub fn get_mut(&mut self, resource: Resource) -> &mut DemandValue {
        match resource {
            Resource::Audio => &mut self.audio,
            Resource::Video => &mut self.video,
            Resource::Data => &mut self.data,
        }
    }

    /// True if audio or video is requested
    pub fn wants_media(&self) -> bool {
        self.audio.is_requested() || self.video.is_requested()
    }
}

/// A normalized, directional resource request. Both directions always carry all three resources
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value")]
pub struct Demand {
    #[serde(rename = "in")]
    pub incoming: DirectionalDemand,
    #[serde(rename = "out")]
    pub outgoing: DirectionalDemand,
}

/// Every shape an application may use to describe a demand
#[derive(Clone, Debug, PartialEq)]
pub enum RawDemand {
    /// No demand given; treated as "everything"
    Unspecified,
    Text(String),
    List(Vec<String>),
    Json(Value),
    Normalized(Demand),
}

impl From<&str> for RawDemand {
    fn from(text: &str) -> Self {
        RawDemand::Text(text.to_string())
    }
}

impl From<String> for RawDemand {
    fn from(text: String) -> Self {
        RawDemand::Text(text)
    }
}

impl From<Vec<String>> for RawDemand {
    fn from(list: Vec<String>) -> Self {
        RawDemand::List(list)
    }
}

impl From<Vec<&str>> for RawDemand {
    fn from(list: Vec<&str>) -> Self {
        RawDemand::List(list.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for RawDemand {
    fn from(list: [&str; N]) -> Self {
        RawDemand::List(list.iter().map(|item| item.to_string()).collect())
    }
}

impl From<Value> for RawDemand {
    fn from(value: Value) -> Self {
        RawDemand::Json(value)
    }
}

impl From<Demand> for RawDemand {
    fn from(demand: Demand) -> Self {
        RawDemand::Normalized(demand)
    }
}

impl From<&Demand> for RawDemand {
    fn from(demand: &Demand) -> Self {
        RawDemand::Normalized(demand.clone())
    }
}

impl<T: Into<RawDemand>> From<Option<T>> for RawDemand {
    fn from(raw: Option<T>) -> Self {
        raw.map(Into::into).unwrap_or(RawDemand::Unspecified)
    }
}

impl From<Value> for Demand {
    fn from(value: Value) -> Self {
        Demand::normalize(value)
    }
}

impl Demand {
    /// Demands every resource in both directions
    pub fn all() -> Self {
        Self {
            incoming: DirectionalDemand::uniform(true),
            outgoing: DirectionalDemand::uniform(true),
        }
    }

    /// Demands nothing
    pub fn none() -> Self {
        Self::default()
    }

    /// Builds a demand for a data channel only, using the same payload type in both directions
    pub fn data_only(payload_type: DemandValue) -> Self {
        let direction = DirectionalDemand {
            data: payload_type,
            ..Default::default()
        };

        Self {
            incoming: direction.clone(),
            outgoing: direction,
        }
    }

    /// Converts any supported representation into a fully populated demand.
    ///
    /// Unknown resource names are ignored rather than rejected; a string naming no known
    /// resource therefore demands nothing.
    pub fn normalize(raw: impl Into<RawDemand>) -> Self {
        match raw.into() {
            RawDemand::Unspecified => Self::all(),
            RawDemand::Normalized(demand) => demand,
            RawDemand::Text(text) => Self::from_text(&text),
            RawDemand::List(list) => Self::from_list(list.iter().map(String::as_str)),
            RawDemand::Json(value) => Self::from_json(&value),
        }
    }

    fn from_text(text: &str) -> Self {
        if text.is_empty() || text == "all" {
            return Self::all();
        }

        Self::from_list(std::iter::once(text))
    }

    fn from_list<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut names = names.into_iter().peekable();
        if names.peek().is_none() {
            return Self::all();
        }

        let mut demand = Self::none();
        for resource in names.filter_map(|name| name.parse::<Resource>().ok()) {
            demand.set_both(resource, DemandValue::Flag(true));
        }

        demand
    }

    fn from_json(value: &Value) -> Self {
        match value {
            Value::String(text) => Self::from_text(text),
            Value::Array(items) if items.is_empty() => Self::all(),
            Value::Array(items) => Self::from_list(items.iter().filter_map(Value::as_str)),
            Value::Object(map) if map.is_empty() => Self::all(),
            Value::Object(map)
                if map.contains_key(Direction::In.as_str())
                    || map.contains_key(Direction::Out.as_str()) =>
            {
                Self::from_directional_map(map)
            }
            Value::Object(map) => Self::from_flat_map(map),
            Value::Null | Value::Bool(_) | Value::Number(_) => Self::all(),
        }
    }

    fn from_directional_map(map: &Map<String, Value>) -> Self {
        let mut demand = Self::none();
        for direction in Direction::ALL {
            let Some(Value::Object(resources)) = map.get(direction.as_str()) else {
                continue;
            };

            for resource in Resource::ALL {
                if let Some(value) = resources.get(resource.as_str()) {
                    *demand.get_mut(direction, resource) = DemandValue::from_json(resource, value);
                }
            }
        }

        demand
    }

    fn from_flat_map(map: &Map<String, Value>) -> Self {
        let mut demand = Self::none();
        for resource in Resource::ALL {
            if let Some(value) = map.get(resource.as_str()) {
                demand.set_both(resource, DemandValue::from_json(resource, value));
            }
        }

        demand
    }

    fn set_both(&mut self, resource: Resource, value: DemandValue) {
        *self.incoming.get_mut(resource) = value.clone();
        *self.outgoing.get_mut(resource) = value;
    }

    pub fn direction(&self, direction: Direction) -> &DirectionalDemand {
        match direction {
            Direction::In => &self.incoming,
            Direction::Out => &self.outgoing,
        }
    }

    pub fn get(&self, direction: Direction, resource: Resource) -> &DemandValue {
        self.direction(direction).get(resource)
    }

    pub fn get_mut(&mut self, direction: Direction, resource: Resource) -> &mut DemandValue {
        match direction {
            Direction::In => self.incoming.get_mut(resource),
            Direction::Out => self.outgoing.get_mut(resource),
        }
    }

    /// True if audio or video is requested in either direction
    pub fn wants_media(&self) -> bool {
        self.incoming.wants_media() || self.outgoing.wants_media()
    }

    /// True if `resource` is requested in either direction
    pub fn wants(&self, resource: Resource) -> bool {
        self.incoming.get(resource).is_requested() || self.outgoing.get(resource).is_requested()
    }

    /// True if a data channel is requested in either direction
    pub fn wants_data(&self) -> bool {
        self.incoming.data.is_requested() || self.outgoing.data.is_requested()
    }

    pub fn is_empty(&self) -> bool {
        !self.wants_media() && !self.wants_data()
    }

    /// Returns `target` with every resource requested by `additional` copied over it
    pub fn merge_allow(target: impl Into<RawDemand>, additional: impl Into<RawDemand>) -> Self {
        let mut target = Self::normalize(target);
        let additional = Self::normalize(additional);

        for direction in Direction::ALL {
            for resource in Resource::ALL {
                let value = additional.get(direction, resource);
                if value.is_requested() {
                    *target.get_mut(direction, resource) = value.clone();
                }
            }
        }

        target
    }

    /// Returns `target` with every resource requested by `restrictive` switched off
    pub fn merge_disallow(target: impl Into<RawDemand>, restrictive: impl Into<RawDemand>) -> Self {
        let mut target = Self::normalize(target);
        let restrictive = Self::normalize(restrictive);

        for direction in Direction::ALL {
            for resource in Resource::ALL {
                if restrictive.get(direction, resource).is_requested() {
                    *target.get_mut(direction, resource) = DemandValue::Flag(false);
                }
            }
        }

        target
    }
}
