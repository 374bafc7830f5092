// Copyright (c) 2022 The zchain developers

use serde::de::Unexpected;
use std::{fmt, str::FromStr};

use crate::ModelsError;

/// Software or smart-contract version, `major.minor.patch`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    major: u32,
    minor: u32,
    patch: u32,
}

impl Version {
    /// New version
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Version {
            major,
            minor,
            patch,
        }
    }
}

struct VersionVisitor;

impl<'de> serde::de::Visitor<'de> for VersionVisitor {
    type Value = Version;

    fn visit_str<E>(self, value: &str) -> Result<Version, E>
    where
        E: serde::de::Error,
    {
        Version::from_str(value).map_err(|_| E::invalid_value(Unexpected::Str(value), &self))
    }

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "a version identifier like 1.0.0")
    }
}

impl<'de> serde::Deserialize<'de> for Version {
    fn deserialize<D>(deserializer: D) -> Result<Version, D::Error>
    where
        D: serde::de::Deserializer<'de>,
    {
        deserializer.deserialize_str(VersionVisitor)
    }
}

impl serde::Serialize for Version {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = ModelsError;

    /// ```
    /// # use zchain_models::Version;
    /// # use std::str::FromStr;
    /// assert_eq!(Version::from_str("1.2.3").unwrap(), Version::new(1, 2, 3));
    /// assert!(Version::from_str("1.2").is_err());
    /// assert!(Version::from_str("1.x.3").is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .split('.')
            .map(u32::from_str)
            .collect::<Result<Vec<u32>, _>>()
            .map_err(|_| ModelsError::InvalidVersion(s.to_string()))?;
        match parts.as_slice() {
            [major, minor, patch] => Ok(Version::new(*major, *minor, *patch)),
            _ => Err(ModelsError::InvalidVersion(s.to_string())),
        }
    }
}
