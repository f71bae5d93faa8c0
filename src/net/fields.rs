// Token-level parsers for fields embedded in ss output
//
// Each function converts exactly one whitespace-free token (or the inner
// content of a users group) into a typed value.

use super::error::FormatError;
use super::{EndpointAddress, ProcessOwner};

/// Average and standard deviation of the round-trip time, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rtt {
    pub avg: f64,
    pub std_dev: f64,
}

/// Parse an `rtt:` value such as `"0.123/0.045"`
pub fn parse_rtt(text: &str) -> Result<Rtt, FormatError> {
    let err = || FormatError::Rtt {
        token: text.to_string(),
    };

    let (avg, std_dev) = text.split_once('/').ok_or_else(err)?;
    if std_dev.contains('/') {
        return Err(err());
    }

    let half = |text: &str| {
        text.parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or_else(err)
    };

    Ok(Rtt {
        avg: half(avg)?,
        std_dev: half(std_dev)?,
    })
}

/// Parse a rate such as `"1.5Mbps"` into bits per second
///
/// The magnitude may carry one SI prefix (`K` is accepted as `k`) and may
/// itself use exponent notation, e.g. `"1.2e+06bps"`.
pub fn parse_bandwidth(text: &str) -> Result<f64, FormatError> {
    let err = || FormatError::Bandwidth {
        token: text.to_string(),
    };

    let magnitude = text.strip_suffix("bps").ok_or_else(err)?;
    let last = magnitude.chars().next_back().ok_or_else(err)?;

    let (number, scale) = match si_scale(last) {
        Some(scale) => (&magnitude[..magnitude.len() - last.len_utf8()], scale),
        None => (magnitude, 1.0),
    };

    let value: f64 = number.parse().map_err(|_| err())?;
    if !value.is_finite() {
        return Err(err());
    }
    Ok(value * scale)
}

/// Multiplier for a trailing SI prefix character
fn si_scale(prefix: char) -> Option<f64> {
    let exponent = match prefix {
        'y' => -24,
        'z' => -21,
        'a' => -18,
        'f' => -15,
        'p' => -12,
        'n' => -9,
        'u' | 'µ' => -6,
        'm' => -3,
        'k' | 'K' => 3,
        'M' => 6,
        'G' => 9,
        'T' => 12,
        'P' => 15,
        'E' => 18,
        'Z' => 21,
        'Y' => 24,
        _ => return None,
    };
    Some(10f64.powi(exponent))
}

/// Split `host:port` at the last colon so IPv6 hosts survive intact
pub fn parse_address(text: &str) -> Result<EndpointAddress, FormatError> {
    let (host, port) = text.rsplit_once(':').ok_or_else(|| FormatError::Address {
        token: text.to_string(),
    })?;

    Ok(EndpointAddress {
        host: host.to_string(),
        port: port.to_string(),
    })
}

/// Parse the inside of `users:((...))`, entries separated by `),(`
pub fn parse_user_list(text: &str) -> Result<Vec<ProcessOwner>, FormatError> {
    text.split("),(").map(parse_user).collect()
}

/// Parse one `"name",pid=N,fd=N` entry
fn parse_user(entry: &str) -> Result<ProcessOwner, FormatError> {
    let err = || FormatError::UserEntry {
        entry: entry.to_string(),
    };

    let rest = entry.strip_prefix('"').ok_or_else(err)?;
    let (name, rest) = rest.split_once('"').ok_or_else(err)?;
    if name.is_empty() {
        return Err(err());
    }

    let rest = rest.strip_prefix(",pid=").ok_or_else(err)?;
    let (pid, fd) = rest.split_once(",fd=").ok_or_else(err)?;

    Ok(ProcessOwner {
        name: name.to_string(),
        pid: pid.parse().map_err(|_| err())?,
        fd: fd.parse().map_err(|_| err())?,
    })
}
