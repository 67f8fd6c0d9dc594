use std::fmt;
use std::str::FromStr;

/// A named time window over which points are summed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Window {
    /// The last 5 minutes.
    Short,
    /// The last hour.
    Medium,
    /// All recorded events.
    #[default]
    Unbounded,
}

impl Window {
    pub const ALL: [Window; 3] = [Window::Short, Window::Medium, Window::Unbounded];

    /// Canonical wire name.
    pub fn name(self) -> &'static str {
        match self {
            Window::Short => "short",
            Window::Medium => "medium",
            Window::Unbounded => "unbounded",
        }
    }

    /// Legacy wire name, still accepted when parsing.
    pub fn legacy_name(self) -> &'static str {
        match self {
            Window::Short => "5m",
            Window::Medium => "1h",
            Window::Unbounded => "all",
        }
    }

    /// How far back the window reaches, or `None` for no time filter.
    pub fn duration(self) -> Option<time::Duration> {
        match self {
            Window::Short => Some(time::Duration::minutes(5)),
            Window::Medium => Some(time::Duration::hours(1)),
            Window::Unbounded => None,
        }
    }

    /// Earliest instant an event may carry to fall inside the window
    /// evaluated at `now`.
    pub fn threshold(self, now: time::OffsetDateTime) -> Option<time::OffsetDateTime> {
        self.duration().map(|d| now - d)
    }

    /// Resolve the optional window name of a query; an omitted name means
    /// [`Window::Unbounded`].
    pub fn from_request(name: Option<&str>) -> Result<Self, InvalidWindowError> {
        name.map_or(Ok(Window::Unbounded), str::parse::<Window>)
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A window name that is none of the known windows.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid time window {0:?}, use 'short', 'medium' or 'unbounded'")]
pub struct InvalidWindowError(pub String);

impl FromStr for Window {
    type Err = InvalidWindowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Window::ALL
            .into_iter()
            .find(|w| w.name() == s || w.legacy_name() == s)
            .ok_or_else(|| InvalidWindowError(s.to_owned()))
    }
}

impl serde::Serialize for Window {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.name())
    }
}

impl<'de> serde::Deserialize<'de> for Window {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
