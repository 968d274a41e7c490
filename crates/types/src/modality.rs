use std::str::FromStr;

/// Error returned for a modality code outside [`Modality::ALL`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("modality must be one of CR, CT, DX, MG, MR, NM, OT, PT, RF, US, XA (got '{0}')")]
pub struct ModalityError(pub String);

/// Imaging modality of an exam, using DICOM modality codes.
///
/// This enum is deliberately closed: any other code is rejected at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modality {
    /// Computed radiography
    CR,
    /// Computed tomography
    CT,
    /// Digital radiography
    DX,
    /// Mammography
    MG,
    /// Magnetic resonance
    MR,
    /// Nuclear medicine
    NM,
    /// Other
    OT,
    /// Positron emission tomography
    PT,
    /// Radio fluoroscopy
    RF,
    /// Ultrasound
    US,
    /// X-ray angiography
    XA,
}

impl Modality {
    pub const ALL: [Modality; 11] = [
        Modality::CR,
        Modality::CT,
        Modality::DX,
        Modality::MG,
        Modality::MR,
        Modality::NM,
        Modality::OT,
        Modality::PT,
        Modality::RF,
        Modality::US,
        Modality::XA,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::CR => "CR",
            Modality::CT => "CT",
            Modality::DX => "DX",
            Modality::MG => "MG",
            Modality::MR => "MR",
            Modality::NM => "NM",
            Modality::OT => "OT",
            Modality::PT => "PT",
            Modality::RF => "RF",
            Modality::US => "US",
            Modality::XA => "XA",
        }
    }
}

impl FromStr for Modality {
    type Err = ModalityError;

    /// Parses an exact, upper-case modality code.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Modality::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ModalityError(s.to_owned()))
    }
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl serde::Serialize for Modality {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for Modality {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_code_parses_back_to_itself() {
        for modality in Modality::ALL {
            assert_eq!(modality.as_str().parse::<Modality>(), Ok(modality));
        }
    }

    #[test]
    fn unknown_codes_are_rejected() {
        let err = "INVALID".parse::<Modality>().unwrap_err();
        assert!(err.to_string().starts_with("modality"));
        assert!(err.to_string().contains("INVALID"));
        assert!("ct".parse::<Modality>().is_err());
        assert!("".parse::<Modality>().is_err());
    }

    #[test]
    fn serializes_as_plain_code() {
        assert_eq!(serde_json::to_string(&Modality::PT).unwrap(), "\"PT\"");
        let parsed: Modality = serde_json::from_str("\"US\"").unwrap();
        assert_eq!(parsed, Modality::US);
    }
}
