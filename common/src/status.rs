use serde::Serialize;

/// Coarse class of an HTTP check outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusClass {
    ConnectionError,
    Informational,
    Success,
    Redirect,
    ClientError,
    ServerError,
}

impl StatusClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConnectionError => "Connection Error",
            Self::Informational => "Informational",
            Self::Success => "Success",
            Self::Redirect => "Redirect",
            Self::ClientError => "Client Error",
            Self::ServerError => "Server Error",
        }
    }

    /// Any answer from the server counts as reachable, except a 5xx.
    pub fn is_up(self) -> bool {
        !matches!(self, Self::ConnectionError | Self::ServerError)
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            i32::MIN..=-1 => Self::ConnectionError,
            0..=199 => Self::Informational,
            200..=299 => Self::Success,
            300..=399 => Self::Redirect,
            400..=499 => Self::ClientError,
            _ => Self::ServerError,
        }
    }
}

pub fn classify(code: i32) -> (bool, StatusClass) {
    let class = StatusClass::from_code(code);
    (class.is_up(), class)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteVerdict {
    pub code: i32,
    pub is_up: bool,
    pub class: StatusClass,
}

impl SiteVerdict {
    pub fn from_code(code: i32) -> Self {
        let (is_up, class) = classify(code);
        Self { code, is_up, class }
    }
}
