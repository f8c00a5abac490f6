use std::fmt;

/// Closed set of receiver demodulation modes.
///
/// USB and LSB are distinct tags sharing one demodulator implementation
/// (`DemodKind::Ssb`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Iq,
    Nfm,
    Wfm,
    Am,
    Usb,
    Lsb,
    Vor,
}

impl Mode {
    pub const ALL: [Mode; 7] = [
        Mode::Iq,
        Mode::Nfm,
        Mode::Wfm,
        Mode::Am,
        Mode::Usb,
        Mode::Lsb,
        Mode::Vor,
    ];

    /// The wire/state tag for this mode.
    pub fn tag(self) -> &'static str {
        match self {
            Mode::Iq => "IQ",
            Mode::Nfm => "NFM",
            Mode::Wfm => "WFM",
            Mode::Am => "AM",
            Mode::Usb => "USB",
            Mode::Lsb => "LSB",
            Mode::Vor => "VOR",
        }
    }

    /// Parse a mode tag. Unrecognized tags yield `None`; callers turn
    /// that into their own error.
    pub fn parse(tag: &str) -> Option<Mode> {
        Mode::ALL.into_iter().find(|m| m.tag() == tag)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_round_trip() {
        for mode in Mode::ALL {
            assert_eq!(Mode::parse(mode.tag()), Some(mode));
        }
        assert_eq!(Mode::parse("CW"), None);
        assert_eq!(Mode::parse("usb"), None);
    }
}
