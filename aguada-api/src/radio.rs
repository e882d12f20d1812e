//! Radio channel plan shared by nodes and collectors.
//!
//! Nodes and collectors only hear each other when they agree on the channel number. On
//! hosts without a radio the link is carried over UDP broadcast, one port per channel.

/// Channel the deployed nodes and gateway are tuned to
pub const DEFAULT_CHANNEL: u8 = 11;

/// First UDP port of the channel plan when the link runs over IP
pub const DEFAULT_BASE_PORT: u16 = 47_000;

/// Highest usable 2.4 GHz channel
pub const MAX_CHANNEL: u8 = 14;

pub fn is_valid_channel(channel: u8) -> bool {
    (1..=MAX_CHANNEL).contains(&channel)
}

/// UDP port carrying frames for `channel`
pub fn channel_port(base_port: u16, channel: u8) -> u16 {
    base_port.saturating_add(channel as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_plan() {
        assert!(is_valid_channel(DEFAULT_CHANNEL));
        assert!(!is_valid_channel(0));
        assert!(!is_valid_channel(15));
        assert_eq!(channel_port(DEFAULT_BASE_PORT, 11), 47_011);
        assert_eq!(channel_port(u16::MAX, 1), u16::MAX);
    }
}
